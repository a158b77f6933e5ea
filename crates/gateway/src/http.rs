use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use catalog_contracts::ValidationError;
use serde::Serialize;
use tracing::Instrument;
use ulid::Ulid;

use crate::categories::CategoryGateway;
use crate::config::{GatewayConfig, StartupError};
use crate::episodes::EpisodeGateway;
use crate::error::GatewayError;
use crate::graphql::{GraphqlTransport, HttpTransport, HttpTransportConfig};

mod categories;
mod episodes;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    backend: Arc<dyn GraphqlTransport>,
    categories: CategoryGateway,
    episodes: EpisodeGateway,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let transport = HttpTransport::new(HttpTransportConfig {
        endpoint: config.graphql_endpoint.clone(),
        admin_secret: config.graphql_admin_secret.clone(),
        secret_header: config.graphql_secret_header.clone(),
        timeout: config.graphql_timeout(),
    })
    .map_err(|err| StartupError {
        code: "ERR_INVALID_CONFIG",
        message: format!("failed to initialize GraphQL client: {}", err),
    })?;

    // An unreachable backend is logged, not fatal; /readyz reports it until it recovers.
    match transport.probe().await {
        Ok(()) => tracing::info!(endpoint = %transport.endpoint(), "graphql backend reachable"),
        Err(err) => tracing::warn!(
            endpoint = %transport.endpoint(),
            error = %err,
            "graphql backend probe failed"
        ),
    }

    Ok(router_with_backend(config, Arc::new(transport)))
}

/// Builds the router around an already-constructed backend transport.
pub fn router_with_backend(config: GatewayConfig, backend: Arc<dyn GraphqlTransport>) -> Router {
    let categories = CategoryGateway::new(backend.clone());
    let episodes = EpisodeGateway::new(backend.clone(), categories.clone());

    let state = AppState {
        config,
        backend,
        categories,
        episodes,
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/episodes", get(episodes::list).post(episodes::create))
        .route("/episodes/featured", get(episodes::list_featured))
        .route(
            "/episodes/{id}",
            get(episodes::get)
                .put(episodes::update)
                .delete(episodes::delete),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    let graphql_ready = state.backend.probe().await.is_ok();
    checks.insert("graphql", graphql_ready);

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Runs one gateway call inside `span`, then maps it to a response and records
/// latency, outcome and request metrics.
async fn respond<T, Fut>(
    route: &'static str,
    method: &'static str,
    success: StatusCode,
    request_id: String,
    span: tracing::Span,
    call: Fut,
) -> Response
where
    T: Serialize,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let started = Instant::now();

    let result = async {
        let result = call.await;

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::Span::current().record("latency_ms", latency_ms);
        match &result {
            Ok(_) => {
                tracing::Span::current().record("outcome", "ok");
            }
            Err(err) => {
                tracing::Span::current().record("outcome", err.outcome());
            }
        }

        result
    }
    .instrument(span)
    .await;

    let (status, mut response) = match result {
        Ok(body) => (success, (success, Json(body)).into_response()),
        Err(err) => {
            let (status, body) = gateway_error_response(&err);
            (status, (status, body).into_response())
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    crate::metrics::observe_http_request(route, method, status.as_u16(), started.elapsed());
    response
}

fn decode_body(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<serde_json::Value, GatewayError> {
    body.map(|Json(value)| value)
        .map_err(|_| ValidationError::payload("invalid JSON body").into())
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let mut out = String::with_capacity(raw.len().min(MAX_LEN));

    for ch in raw.chars() {
        if out.len() >= MAX_LEN {
            break;
        }
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    (!out.is_empty()).then_some(out)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
        }),
    )
}

fn gateway_error_response(err: &GatewayError) -> ApiError {
    match err {
        GatewayError::Validation(validation) => json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            validation.message(),
        ),
        GatewayError::NotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "ERR_NOT_FOUND", err.to_string())
        }
        GatewayError::Backend(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_BACKEND_FAILURE",
            "backend request failed",
        ),
    }
}
