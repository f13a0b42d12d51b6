//! HTTP surface: the webhook sink and the client websocket.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::channel::{ChannelHub, ClientEvent, ServerEvent};
use crate::notify;
use crate::repository::SharedRepository;
use crate::webhook::WebhookRouter;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<WebhookRouter>,
    pub hub: Arc<ChannelHub>,
    pub repository: SharedRepository,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook", post(handle_webhook))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn healthz(State(_state): State<AppState>) -> &'static str {
    "ok"
}

/// Webhook sink. Handling failures still answer 200: the sender must not
/// retry-storm us over a notification we will not deliver anyway; the
/// failure is logged instead.
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(event_key) = headers
        .get("x-event-key")
        .and_then(|value| value.to_str().ok())
    else {
        return StatusCode::BAD_REQUEST;
    };

    if let Err(error) = state.router.handle_payload(event_key, &body).await {
        tracing::warn!(event_key, error = %error, "webhook handling failed");
    }
    StatusCode::OK
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_session(socket, state))
}

/// One connected client: hub events flow out through a per-client channel,
/// client events flow in and are routed to the fan-out operations.
async fn client_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(ClientEvent::Introduce(identity)) => {
                tracing::debug!(identity, "client introduced");
                notify::introduce(&identity, tx.clone(), &state.hub, &state.repository).await;
            }
            Ok(ClientEvent::Remind(pull_request)) => {
                notify::remind(&pull_request, &state.hub).await;
            }
            Err(error) => {
                tracing::debug!(error = %error, "ignoring unparseable client event");
            }
        }
    }

    writer.abort();
}
