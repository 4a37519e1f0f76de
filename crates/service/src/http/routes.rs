use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use llmfanout_core::chat::parse_inbound_chat_request;
use llmfanout_core::config::ConfigSnapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::gateway::{handle_chat_request, ChatReply, GatewayError, GatewayState};
use crate::http::auth::client_key_matches;
use crate::http::proxy_response::{
    error_response, event_stream_response, json_response, text_response,
};

type SharedState = Arc<GatewayState>;

pub(crate) fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/admin/reload", post(reload_config))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat_completions(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    if !client_key_matches(&headers, &state.snapshot().server.api_key) {
        log::warn!("event=chat_request_rejected reason=unauthorized");
        return error_response(&GatewayError::Unauthorized);
    }
    let inbound = match parse_inbound_chat_request(&body) {
        Ok(inbound) => inbound,
        Err(reason) => {
            log::warn!("event=chat_request_rejected reason=bad_request detail={}", reason);
            return error_response(&GatewayError::BadRequest(reason));
        }
    };
    match handle_chat_request(&state, inbound).await {
        Ok(ChatReply::Completion(completion)) => json_response(StatusCode::OK, &completion),
        Ok(ChatReply::Stream(frames)) => event_stream_response(frames),
        Err(err) => {
            log::warn!("event=chat_request_failed code={} detail={}", err.code(), err);
            error_response(&err)
        }
    }
}

fn public_config(snapshot: &ConfigSnapshot) -> Value {
    json!({
        "host": snapshot.server.host,
        "port": snapshot.server.port,
        "min_response_length": snapshot.server.min_response_length,
        "request_timeout": snapshot.server.request_timeout_secs,
        "selection_policy": snapshot.arbitration.selection_policy.as_str(),
        "collection_window": snapshot.arbitration.collection_window_secs,
    })
}

fn group_summary(snapshot: &ConfigSnapshot) -> Vec<Value> {
    (0..snapshot.group_count())
        .filter_map(|index| snapshot.group(index))
        .map(|group| {
            json!({
                "name": group.name(),
                "configured": group.len(),
                "eligible": group.eligible_count(),
            })
        })
        .collect()
}

async fn service_info(State(state): State<SharedState>) -> Response<Body> {
    let snapshot = state.snapshot();
    json_response(
        StatusCode::OK,
        &json!({
            "service": "llmfanout",
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
            "config": public_config(&snapshot),
        }),
    )
}

/// Reports config and group sizes. Reads the rotation without advancing it.
async fn health(State(state): State<SharedState>) -> Response<Body> {
    let snapshot = state.snapshot();
    let next_group = state
        .next_group_index()
        .and_then(|index| snapshot.group(index))
        .map(|group| group.name().to_string());
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "next_group": next_group,
            "credential_groups": group_summary(&snapshot),
            "config": public_config(&snapshot),
        }),
    )
}

async fn reload_config(State(state): State<SharedState>, headers: HeaderMap) -> Response<Body> {
    if !client_key_matches(&headers, &state.snapshot().server.api_key) {
        return error_response(&GatewayError::Unauthorized);
    }
    match state.reload_config() {
        Ok(snapshot) => json_response(
            StatusCode::OK,
            &json!({
                "status": "reloaded",
                "path": state.config_path(),
                "credential_groups": group_summary(&snapshot),
                "config": public_config(&snapshot),
            }),
        ),
        Err(err) => {
            log::error!("event=config_reload_failed err={}", err);
            json_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &json!({
                    "error": {
                        "message": err,
                        "type": "invalid_request_error",
                        "code": "config_reload_failed",
                    }
                }),
            )
        }
    }
}

async fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "not found")
}
