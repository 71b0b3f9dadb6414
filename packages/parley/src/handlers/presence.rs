use axum::{Json, extract::State};

use crate::AppState;
use crate::ws::OnlineUsersResponse;

/// Online users in login order. Clients call this whenever they receive a
/// presence-changed event.
pub async fn online_users_handler(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        online_users: state.chat.online_users().await,
    })
}
