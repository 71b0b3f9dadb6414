use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use super::session::{ChatSession, SessionEffect, format_message};
use crate::ws::{OnlineUsersResponse, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }

    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

/// Where a server lives, derived from its base HTTP URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoints {
    pub base_url: String,
}

impl ServerEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn ws_url(&self) -> String {
        let rest = self
            .base_url
            .strip_prefix("https://")
            .map(|r| format!("wss://{r}"))
            .or_else(|| {
                self.base_url
                    .strip_prefix("http://")
                    .map(|r| format!("ws://{r}"))
            })
            .unwrap_or_else(|| format!("ws://{}", self.base_url));
        format!("{rest}/ws")
    }

    pub fn online_users_url(&self) -> String {
        format!("{}/online-users", self.base_url)
    }
}

/// Fetch the online-users view.
pub async fn fetch_online_users(
    http: &reqwest::Client,
    endpoints: &ServerEndpoints,
) -> Result<OnlineUsersResponse, ClientError> {
    http.get(endpoints.online_users_url())
        .send()
        .await
        .map_err(ClientError::from_reqwest)?
        .error_for_status()
        .map_err(ClientError::from_reqwest)?
        .json::<OnlineUsersResponse>()
        .await
        .map_err(ClientError::from_reqwest)
}

/// Run an interactive chat session on stdin/stdout.
pub async fn connect_command(base_url: &str, username: &str) -> Result<(), ClientError> {
    let endpoints = ServerEndpoints::new(base_url);

    // Connecting is the only step that reports Unavailable
    let (ws_stream, _) = tokio_tungstenite::connect_async(endpoints.ws_url())
        .await
        .map_err(ClientError::from_tungstenite)?;

    // Anything after the handshake maps to Other
    chat_session(ws_stream, &endpoints, username)
        .await
        .map_err(Into::into)
}

async fn chat_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    endpoints: &ServerEndpoints,
    username: &str,
) -> Result<()> {
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let http = reqwest::Client::new();
    let mut session = ChatSession::new();

    // Blocking stdin reader thread, one line per message
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(64);
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if stdin_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    eprintln!("[parley: connected to {} -- /who lists users, /quit exits]", endpoints.base_url);

    loop {
        tokio::select! {
            line = stdin_rx.recv() => {
                let Some(line) = line else { break };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/who" => print_online_users(&session),
                    text => match session.compose(text, chrono::Utc::now().timestamp_millis()) {
                        Ok(frame) => {
                            let json = serde_json::to_string(&frame)?;
                            ws_write
                                .send(tungstenite::Message::Text(json.into()))
                                .await
                                .context("Failed to send message")?;
                            if let Some(own) = session.messages().last() {
                                println!("{}", format_message(own));
                            }
                        }
                        Err(e) => eprintln!("[parley: {}]", e),
                    },
                }
            }

            msg = ws_read.next() => {
                let text = match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => text,
                    Some(Ok(tungstenite::Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(event) = serde_json::from_str::<ServerMessage>(&text) else {
                    continue;
                };

                let greeting = matches!(event, ServerMessage::Connected { .. });
                let incoming = match &event {
                    ServerMessage::Message(m) => Some(format_message(m)),
                    _ => None,
                };

                match session.apply(event) {
                    Some(SessionEffect::RefreshPresence) => {
                        match fetch_online_users(&http, endpoints).await {
                            Ok(resp) => {
                                session.set_online_users(resp.online_users);
                                print_online_users(&session);
                            }
                            Err(e) => eprintln!("[parley: could not fetch online users: {}]", e),
                        }
                    }
                    Some(SessionEffect::LoginRejected(r)) => {
                        eprintln!("[parley: login rejected: {}]", r.message);
                        break;
                    }
                    None => {}
                }

                if let Some(line) = incoming {
                    println!("{}", line);
                }

                if greeting {
                    let frame = session.login(username)?;
                    let json = serde_json::to_string(&frame)?;
                    ws_write
                        .send(tungstenite::Message::Text(json.into()))
                        .await
                        .context("Failed to send login")?;
                }
            }
        }
    }

    session.disconnected();
    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
    eprintln!("[parley: disconnected]");
    Ok(())
}

fn print_online_users(session: &ChatSession) {
    let names: Vec<&str> = session
        .online_users()
        .iter()
        .map(|u| u.username.as_str())
        .collect();
    eprintln!("[parley: online: {}]", names.join(", "));
}
