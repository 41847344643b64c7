//! WebSocket endpoint and per-connection event loop.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use api_shared::{ErrorRes, TokenService};
use clinic_core::{Actor, ClinicError, ClinicUuid};

use crate::RealtimeState;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Bearer token, for clients that cannot set headers on the upgrade request.
    pub token: Option<String>,
}

/// Rejection returned before the upgrade when the token is missing or invalid.
#[derive(Debug)]
pub struct Unauthorized(pub String);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let body = ErrorRes {
            code: "unauthenticated".into(),
            message: self.0,
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Resolves the connecting actor from the `Authorization` header, falling back to `?token=`.
///
/// # Errors
///
/// Returns [`Unauthorized`] when neither source carries a token that verifies.
pub fn authenticate(
    tokens: &TokenService,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Actor, Unauthorized> {
    let header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let result = match (header, query_token) {
        (Some(header), _) => tokens.verify_header(Some(header)),
        (None, Some(token)) => tokens.verify(token.trim()),
        (None, None) => tokens.verify_header(None),
    };
    result.map_err(|e| {
        tracing::warn!(error = %e, "websocket auth failed");
        Unauthorized(e.to_string())
    })
}

/// Upgrades an authenticated request to a WebSocket.
///
/// Nothing is registered for a request that fails authentication.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RealtimeState>,
    Query(params): Query<WsQuery>,
    headers: HeaderMap,
) -> Result<Response, Unauthorized> {
    let actor = authenticate(&state.tokens, &headers, params.token.as_deref())?;
    tracing::debug!(user_id = %actor.user_id, "websocket authenticated, upgrading");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, actor)))
}

async fn handle_socket(socket: WebSocket, state: RealtimeState, actor: Actor) {
    let connection_id = ClinicUuid::new();
    let service = &state.service;
    let mut outbox = service.open(&actor, connection_id).await;
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(
        user_id = %actor.user_id,
        connection_id = %connection_id,
        "websocket connected"
    );

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        service.handle_frame(&actor, connection_id, &text).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = ClinicError::bad_request("binary frames are not supported");
                        service.reply_error(connection_id, &err).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "client closed websocket");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "websocket error");
                        break;
                    }
                }
            }

            event = outbox.recv() => {
                let Some(event) = event else {
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = sender.send(Message::Text(json)).await {
                            tracing::debug!(connection_id = %connection_id, error = %e, "failed to send event");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(event = event.name(), error = %e, "failed to serialize event");
                    }
                }
            }
        }
    }

    service.close(&actor, connection_id).await;
    tracing::info!(
        user_id = %actor.user_id,
        connection_id = %connection_id,
        "websocket disconnected"
    );
}
