use std::collections::HashMap;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::auth::verify_token;
use crate::session::Session;
use crate::state::AppState;
use crate::{auth, session};

/// Upgrades `/ws?token=<bearer>` to a WebSocket connection. Auth failures are
/// rejected at the HTTP layer with no upgrade and no frame; a storage lookup
/// failure while loading memberships is not fatal -- the session starts with
/// an empty room set, which the next `room.join` repopulates.
pub async fn ws_handler(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token") else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let Some(claims) = verify_token(&state.config.token_secret, token) else {
        warn!("websocket upgrade rejected: invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let auth::TokenClaims { user_id, username } = claims;

    let initial_rooms = state
        .storage
        .get_memberships(&user_id)
        .await
        .unwrap_or_else(|err| {
            warn!(user_id = %user_id, error = %err, "failed to load memberships at connect, starting empty");
            Vec::new()
        });

    ws.on_upgrade(move |socket| async move {
        let (session, outbound_rx) = Session::new(
            user_id.clone(),
            username,
            initial_rooms,
            state.config.outbound_queue_capacity,
        );
        state.hub.register(std::sync::Arc::clone(&session)).await;
        info!(user_id = %user_id, "websocket connected");
        session::run(socket, state.hub, state.storage, session, outbound_rx).await;
    })
}
