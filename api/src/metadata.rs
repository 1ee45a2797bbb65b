use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{error::AppError, AppState};

#[derive(Debug, Clone)]
struct CachedPayload {
    body: serde_json::Value,
    fetched_at: Instant,
}

static CACHE: LazyLock<RwLock<HashMap<String, CachedPayload>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
}

/// GET /api/metadata/search?query=...
pub async fn search_titles(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = format!("/search/multi?query={}", urlencoding::encode(&params.query));
    let body = fetch_cached(&state, &path).await?;
    Ok(Json(body))
}

/// GET /api/metadata/titles/:id
pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::BadRequest("invalid title id".into()));
    }
    let path = format!("/movie/{id}?append_to_response=credits,recommendations");
    let body = fetch_cached(&state, &path).await?;
    Ok(Json(body))
}

/// Read-through cache over the upstream metadata API. The cache key is the
/// request path, so search and detail responses share one map.
async fn fetch_cached(state: &AppState, path: &str) -> Result<serde_json::Value, AppError> {
    {
        let cache = CACHE.read().await;
        if let Some(cached) = cache.get(path) {
            if cached.fetched_at.elapsed() < CACHE_TTL {
                return Ok(cached.body.clone());
            }
        }
    }

    let body = fetch_upstream(state, path).await.map_err(|e| {
        warn!("metadata API error for {path}: {e}");
        AppError::Upstream
    })?;

    {
        let mut cache = CACHE.write().await;
        store(&mut cache, path, body.clone(), CACHE_TTL);
    }

    Ok(body)
}

/// Insert one payload, sweeping expired entries first. The key space is
/// user-controlled (search queries land in the path), so without the sweep
/// the map would grow by one permanent entry per distinct query.
fn store(
    cache: &mut HashMap<String, CachedPayload>,
    path: &str,
    body: serde_json::Value,
    ttl: Duration,
) {
    cache.retain(|_, v| v.fetched_at.elapsed() < ttl);
    cache.insert(
        path.to_string(),
        CachedPayload {
            body,
            fetched_at: Instant::now(),
        },
    );
}

async fn fetch_upstream(state: &AppState, path: &str) -> Result<serde_json::Value, String> {
    let client = reqwest::Client::builder()
        .user_agent("palaver-api")
        .build()
        .map_err(|e| e.to_string())?;

    let resp = client
        .get(format!("{}{path}", state.metadata_base_url))
        .bearer_auth(&state.metadata_token)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !resp.status().is_success() {
        return Err(format!("upstream returned {}", resp.status()));
    }

    resp.json().await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(age: Duration) -> CachedPayload {
        CachedPayload {
            body: serde_json::json!({"ok": true}),
            fetched_at: Instant::now().checked_sub(age).unwrap_or_else(Instant::now),
        }
    }

    #[test]
    fn store_sweeps_expired_entries() {
        let ttl = Duration::from_secs(1);
        let mut cache = HashMap::new();
        cache.insert(
            "/search/multi?query=old".to_string(),
            payload(Duration::from_secs(5)),
        );
        cache.insert(
            "/search/multi?query=warm".to_string(),
            payload(Duration::ZERO),
        );

        store(&mut cache, "/movie/42", serde_json::json!({"id": 42}), ttl);

        assert!(!cache.contains_key("/search/multi?query=old"));
        assert!(cache.contains_key("/search/multi?query=warm"));
        assert!(cache.contains_key("/movie/42"));
        assert_eq!(cache.len(), 2);
    }
}
