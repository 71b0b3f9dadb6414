use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Unified config (figment-deserialized from defaults / parley.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   parley.toml:     [identity]
//                    unique_usernames = true
//
//   env var:         PARLEY_IDENTITY__UNIQUE_USERNAMES=true   (double underscore = nesting)
//
//   (single underscore stays within field names: PARLEY_SERVER__SEND_CHANNEL_CAPACITY)

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

/// Named configuration presets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// host=127.0.0.1
    Local,
    /// host=0.0.0.0
    Server,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub identity: IdentityFileConfig,
}

/// Listener and queue tunables (lives under `[server]` in parley.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_channel_capacity: default_send_channel_capacity(),
        }
    }
}

/// Username policy (lives under `[identity]` in parley.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityFileConfig {
    /// A second `setUsername` on a logged-in connection overwrites the name.
    #[serde(default = "default_allow_rename")]
    pub allow_rename: bool,
    /// Refuse a username another live connection already holds.
    #[serde(default)]
    pub unique_usernames: bool,
}

impl Default for IdentityFileConfig {
    fn default() -> Self {
        Self {
            allow_rename: default_allow_rename(),
            unique_usernames: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3030
}
fn default_send_channel_capacity() -> usize {
    100
}
fn default_allow_rename() -> bool {
    true
}

/// Build a figment that layers: defaults → profile defaults → parley.toml → PARLEY_* env vars.
///
/// `config_path` replaces the default `parley.toml`; a missing file is not an
/// error. The CLI profile takes priority over the config file profile.
///
/// Env vars use double-underscore for nesting into sections:
///   `PARLEY_SERVER__PORT=4000`  →  `server.port = 4000`
///   `PARLEY_IDENTITY__ALLOW_RENAME=false`  →  `identity.allow_rename = false`
pub fn load_config(config_path: Option<&Path>, cli_profile: Option<&Profile>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    // Pass 1: peek at profile from the file/env (CLI overrides file)
    let base = Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("PARLEY_").split("__"));

    let profile: Option<Profile> = cli_profile
        .cloned()
        .or_else(|| base.extract_inner("profile").ok());

    // Pass 2: rebuild with profile defaults between struct defaults and the file
    let profile_layer = profile_to_file_config(profile.as_ref());

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Serialized::defaults(profile_layer))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("PARLEY_").split("__"))
}

/// Convert a profile into a `FileConfig` with the profile's default values filled in.
fn profile_to_file_config(profile: Option<&Profile>) -> FileConfig {
    match profile {
        Some(Profile::Local) => FileConfig {
            profile: Some(Profile::Local),
            server: ServerFileConfig {
                host: "127.0.0.1".to_string(),
                ..Default::default()
            },
            identity: Default::default(),
        },
        Some(Profile::Server) => FileConfig {
            profile: Some(Profile::Server),
            server: ServerFileConfig {
                host: "0.0.0.0".to_string(),
                ..Default::default()
            },
            identity: Default::default(),
        },
        None => FileConfig::default(),
    }
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// WebSocket-related settings
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Capacity of each connection's ordered outbound queue
    pub send_channel_capacity: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            websocket: WebSocketConfig {
                // A zero-capacity mpsc channel panics on creation.
                send_channel_capacity: fc.send_channel_capacity.max(1),
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&ServerFileConfig::default())
    }
}

/// Identity policy (runtime view). The default matches the permissive
/// behavior: renames overwrite, duplicates are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub allow_rename: bool,
    pub unique_usernames: bool,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::from_file(&IdentityFileConfig::default())
    }
}

impl IdentityPolicy {
    pub fn from_file(fc: &IdentityFileConfig) -> Self {
        Self {
            allow_rename: fc.allow_rename,
            unique_usernames: fc.unique_usernames,
        }
    }
}
