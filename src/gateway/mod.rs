//! Webhook gateway.
//!
//! Three routes: the Meta verification handshake, the delivery intake, and
//! a liveness probe. Message-level faults never surface as HTTP errors —
//! the platform retry-storms on non-2xx responses, so every routed message
//! is acknowledged with 200 regardless of its processing outcome.

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::Config;
use crate::media::{LocalMediaStore, MediaAcquirer};
use crate::message::WebhookDelivery;
use crate::platform::GraphClient;
use crate::reply;
use crate::router::MessageRouter;

/// Webhook bodies are small JSON envelopes; anything bigger is abuse.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Generous ceiling covering the full synchronous pipeline (two network
/// hops plus the disk write) for every message in a delivery.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct AppState {
    router: Arc<MessageRouter>,
    client: Arc<GraphClient>,
    verify_token: Arc<str>,
}

pub async fn run_gateway(host: &str, port: u16, config: Config) -> anyhow::Result<()> {
    let client = Arc::new(GraphClient::new(&config.whatsapp, &config.acquire));

    let store = LocalMediaStore::new(&config.storage.root_path());
    store.init().await?;
    tracing::info!(root = %store.root().display(), "media storage initialized");

    let acquirer = MediaAcquirer::new(client.clone(), config.acquire.metadata_retries);
    let router = Arc::new(MessageRouter::new(acquirer, Arc::new(store)));

    let state = AppState {
        router,
        client,
        verify_token: config.whatsapp.verify_token.clone().into(),
    };

    let app = Router::new()
        .route("/webhook", get(handle_verify).post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "webhook gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Verification handshake ───────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum VerifyDecision {
    Accepted(String),
    Mismatch,
    MissingParams,
}

fn decide_verification(params: &VerifyParams, expected_token: &str) -> VerifyDecision {
    match (&params.mode, &params.verify_token) {
        (Some(mode), Some(token)) => {
            if mode == "subscribe" && token == expected_token {
                VerifyDecision::Accepted(params.challenge.clone().unwrap_or_default())
            } else {
                VerifyDecision::Mismatch
            }
        }
        _ => VerifyDecision::MissingParams,
    }
}

async fn handle_verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match decide_verification(&params, &state.verify_token) {
        VerifyDecision::Accepted(challenge) => {
            tracing::info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        VerifyDecision::Mismatch => {
            tracing::error!("webhook verification failed: token mismatch");
            (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({"status": "error", "message": "Verification failed"})),
            )
                .into_response()
        }
        VerifyDecision::MissingParams => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"status": "error", "message": "Missing parameters"})),
        )
            .into_response(),
    }
}

// ── Delivery intake ──────────────────────────────────────────────

async fn handle_webhook(State(state): State<AppState>, body: String) -> Response {
    let delivery: WebhookDelivery = match serde_json::from_str(&body) {
        Ok(delivery) => delivery,
        Err(err) => {
            tracing::error!(error = %err, "failed to decode webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"status": "error", "message": "Invalid JSON provided"})),
            )
                .into_response();
        }
    };

    if delivery.is_status_update() {
        tracing::debug!("received a status update");
        return ok_response();
    }

    let messages = delivery.into_messages();
    if messages.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"status": "error", "message": "Not a WhatsApp API event"})),
        )
            .into_response();
    }

    for msg in messages {
        // Read receipt before processing, matching the platform UX
        // expectation. Best-effort only.
        if let Some(message_id) = &msg.message_id {
            if let Err(err) = state.client.mark_read(message_id).await {
                tracing::warn!(message_id = %message_id, error = %err, "failed to mark message as read");
            }
        }

        let outcome = state.router.process(&msg).await;

        if msg.sender.is_empty() {
            tracing::warn!("delivery carried no sender id, skipping reply");
            continue;
        }

        let reply_text = reply::compose_reply(&outcome, msg.sender_name.as_deref());
        if let Err(err) = state.client.send_text(&msg.sender, &reply_text).await {
            tracing::error!(sender = %msg.sender, error = %err, "failed to send reply");
        }
    }

    ok_response()
}

fn ok_response() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

// ── Health ───────────────────────────────────────────────────────

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "wamedia"}))
}
