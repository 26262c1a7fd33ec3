use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::stream;
use serde::Deserialize;
use tracing::debug;

use crate::store::LiveStore;

const COLLECTION_OPEN: &[u8] = br#"{"type":"FeatureCollection","features":["#;
const COLLECTION_CLOSE: &[u8] = b"]}";
const DENIED: &str = "Forbidden: Invalid or missing API token";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LiveStore>,
    pub token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(get_features)).with_state(state)
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    api_key: Option<String>,
}

async fn get_features(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &query, &state.token) {
        return (StatusCode::FORBIDDEN, DENIED).into_response();
    }

    let features = state.store.snapshot();
    debug!(features = features.len(), "serving snapshot");

    let chunks = collection_chunks(features);
    let body = Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, Infallible>)));
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// A bearer token in the Authorization header wins; the `api_key` query
/// parameter is only consulted when no bearer header is present.
fn authorized(headers: &HeaderMap, query: &AuthQuery, token: &str) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match bearer {
        Some(presented) => presented == token,
        None => query.api_key.as_deref() == Some(token),
    }
}

/// Wraps the snapshot payloads in the collection envelope. Each payload is
/// reproduced verbatim, comma-separated; nothing is re-serialized.
fn collection_chunks(features: Vec<Bytes>) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(features.len() * 2 + 2);
    chunks.push(Bytes::from_static(COLLECTION_OPEN));
    for (i, payload) in features.into_iter().enumerate() {
        if i > 0 {
            chunks.push(Bytes::from_static(b","));
        }
        chunks.push(payload);
    }
    chunks.push(Bytes::from_static(COLLECTION_CLOSE));
    chunks
}
