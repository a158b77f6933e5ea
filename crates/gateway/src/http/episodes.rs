use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use catalog_contracts::{EpisodePatch, NewEpisode, SortOrder, ValidationError};
use serde::Deserialize;

use super::{AppState, decode_body, extract_request_id, respond};

#[derive(Debug, Default, Deserialize)]
pub(super) struct ListParams {
    sort: Option<String>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "episode.list",
        request_id = %request_id,
        sort = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes",
        "GET",
        StatusCode::OK,
        request_id,
        span,
        async move {
            let Query(params) =
                params.map_err(|_| ValidationError::payload("invalid query string"))?;
            let sort = SortOrder::parse(params.sort.as_deref())?;
            tracing::Span::current().record("sort", sort.as_str());
            state.episodes.list_all(sort).await
        },
    )
    .await
}

pub(super) async fn list_featured(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "episode.list_featured",
        request_id = %request_id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes/featured",
        "GET",
        StatusCode::OK,
        request_id,
        span,
        async move { state.episodes.list_featured().await },
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
        "episode.get",
        request_id = %request_id,
        episode_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes/{id}",
        "GET",
        StatusCode::OK,
        request_id,
        span,
        async move { state.episodes.get_by_id(&id).await },
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
        "episode.create",
        request_id = %request_id,
        category_id = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes",
        "POST",
        StatusCode::CREATED,
        request_id,
        span,
        async move {
            let input = NewEpisode::from_json(decode_body(body)?)?;
            tracing::Span::current().record("category_id", input.categoryid.as_str());
            state.episodes.create(&input).await
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
        "episode.update",
        request_id = %request_id,
        episode_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes/{id}",
        "PUT",
        StatusCode::OK,
        request_id,
        span,
        async move {
            let patch = EpisodePatch::from_json(decode_body(body)?)?;
            state.episodes.update(&id, &patch).await
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
        "episode.delete",
        request_id = %request_id,
        episode_id = %id,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    respond(
        "/episodes/{id}",
        "DELETE",
        StatusCode::OK,
        request_id,
        span,
        async move { state.episodes.delete(&id).await },
    )
    .await
}
