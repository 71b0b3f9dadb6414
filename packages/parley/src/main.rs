use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

use parley::AppState;
use parley::client::{self, ClientError};
use parley::config::{FileConfig, IdentityPolicy, Profile, ServerConfig, load_config};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Real-time chat with presence over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat server in the foreground
    Server(ServerArgs),

    /// Join a chat server from the terminal
    Connect(ConnectArgs),
}

#[derive(Parser)]
struct ServerArgs {
    /// Port for the web server (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Configuration preset
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Config file (defaults to ./parley.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct ConnectArgs {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:3030")]
    url: String,

    /// Username to log in with
    #[arg(short, long)]
    username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run_server(args).await,
        Commands::Connect(args) => match client::connect_command(&args.url, &args.username).await {
            Ok(()) => Ok(()),
            Err(ClientError::Unavailable) => {
                anyhow::bail!("No parley server reachable at {}", args.url)
            }
            Err(ClientError::Other(e)) => Err(e),
        },
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "parley=debug,tower_http=debug,info"
    } else {
        "parley=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: FileConfig = load_config(args.config.as_deref(), args.profile.as_ref())
        .extract()
        .context("Failed to load configuration")?;

    let host = args.host.unwrap_or(file_config.server.host.clone());
    let port = args.port.unwrap_or(file_config.server.port);
    let policy = IdentityPolicy::from_file(&file_config.identity);
    info!(
        allow_rename = policy.allow_rename,
        unique_usernames = policy.unique_usernames,
        "Starting parley"
    );

    let state = AppState::new(ServerConfig::from_file(&file_config.server), policy);

    let addr = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Parley listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET    /ws            - Chat WebSocket");
    info!("  GET    /online-users  - Logged-in users");
    info!("  GET    /health        - Health summary");
    info!("  GET    /metrics       - Metrics snapshot");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    // Run server with graceful shutdown
    parley::serve(listener, state, shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
