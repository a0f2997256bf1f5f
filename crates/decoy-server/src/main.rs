//! Thin HTTP binding for the Decoy honeypot.
//!
//! The transport layer does exactly four things: check the shared-secret
//! header, normalize the payload, call the engagement engine, and wrap the
//! outcome in a success envelope. Every semantic failure travels inside the
//! envelope; the only HTTP-level error is the authorization rejection.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use decoy_application::EngagementService;
use decoy_core::config::DecoyConfig;
use decoy_core::payload::normalize_payload;
use decoy_core::retrieval::{ContextRetriever, NoRetrieval};
use decoy_infrastructure::{HttpCaseReporter, InMemorySessionStore};
use decoy_interaction::{GeminiTextModel, TextModel};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    engagement: Arc<EngagementService>,
    api_key: Option<String>,
}

/// The success envelope every non-auth response uses.
#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "scamDetected")]
    scam_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "engagementComplete")]
    engagement_complete: Option<bool>,
}

impl Envelope {
    fn message(text: &str) -> Self {
        Self {
            status: "success",
            message: Some(text.to_string()),
            reply: None,
            scam_detected: None,
            engagement_complete: None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "decoy_server=info,decoy_application=info".to_string()),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = DecoyConfig::from_env();
    if config.api_key.is_none() {
        warn!("API_KEY is not set; inbound requests will not be authenticated");
    }

    let model: Arc<dyn TextModel> = Arc::new(GeminiTextModel::try_from_env()?);
    let reporter = Arc::new(HttpCaseReporter::new(
        config.report_url.clone(),
        config.report_timeout,
    )?);
    let retriever: Arc<dyn ContextRetriever> = Arc::new(NoRetrieval);
    if config.use_retrieval {
        warn!("USE_RETRIEVAL is set but no retrieval backend is wired; continuing without context");
    }
    let store = Arc::new(InMemorySessionStore::new());

    let api_key = config.api_key.clone();
    let engagement = Arc::new(EngagementService::new(
        store, model, reporter, retriever, config,
    ));

    let app = create_router(AppState {
        engagement,
        api_key,
    });

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);
    let addr = format!("0.0.0.0:{port}");
    info!("Starting honeypot server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/honeypot", get(honeypot_get).post(honeypot_post))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn honeypot_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(Envelope::message("Honeypot endpoint reachable")).into_response()
}

async fn honeypot_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    // The panel's tester probes with empty bodies; unparsable JSON gets the
    // same non-error treatment as any other unusable payload.
    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    if payload.is_null()
        || payload.as_object().is_some_and(|o| o.is_empty())
        || payload.as_array().is_some_and(|a| a.is_empty())
    {
        return Json(Envelope::message("Honeypot endpoint reachable")).into_response();
    }

    let normalized = normalize_payload(&payload);
    let (Some(session_id), Some(message)) = (normalized.session_id, normalized.message) else {
        return Json(Envelope::message("Invalid payload format")).into_response();
    };
    if session_id.is_empty() || message.is_empty() {
        return Json(Envelope::message("Invalid payload format")).into_response();
    }

    match state.engagement.handle_message(&session_id, &message).await {
        Ok(outcome) => Json(Envelope {
            status: "success",
            message: None,
            reply: Some(outcome.reply),
            scam_detected: Some(outcome.scam_detected),
            engagement_complete: Some(outcome.engagement_complete),
        })
        .into_response(),
        Err(err) => {
            // never surface internal faults to the counterparty
            tracing::error!("[Server] Engagement handling failed for {session_id}: {err}");
            Json(Envelope {
                status: "success",
                message: None,
                reply: Some(String::new()),
                scam_detected: None,
                engagement_complete: None,
            })
            .into_response()
        }
    }
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let provided = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    provided == state.api_key.as_deref()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Invalid API key"})),
    )
        .into_response()
}
