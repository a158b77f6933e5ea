use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use catalog_contracts::{CategoryPatch, NewCategory};

use super::{AppState, decode_body, extract_request_id, respond};

pub(super) async fn list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "category.list",
        request_id = %request_id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/categories",
        "GET",
        StatusCode::OK,
        request_id,
        span,
        async move { state.categories.list_all().await },
    )
    .await
}

pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "category.get",
        request_id = %request_id,
        category_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/categories/{id}",
        "GET",
        StatusCode::OK,
        request_id,
        span,
        async move { state.categories.get_by_id(&id).await },
    )
    .await
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "category.create",
        request_id = %request_id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/categories",
        "POST",
        StatusCode::CREATED,
        request_id,
        span,
        async move {
            let input = NewCategory::from_json(decode_body(body)?)?;
            state.categories.create(&input).await
        },
    )
    .await
}

pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "category.update",
        request_id = %request_id,
        category_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/categories/{id}",
        "PUT",
        StatusCode::OK,
        request_id,
        span,
        async move {
            let patch = CategoryPatch::from_json(decode_body(body)?)?;
            state.categories.update(&id, &patch).await
        },
    )
    .await
}

pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "category.delete",
        request_id = %request_id,
        category_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/categories/{id}",
        "DELETE",
        StatusCode::OK,
        request_id,
        span,
        async move { state.categories.delete(&id).await },
    )
    .await
}
