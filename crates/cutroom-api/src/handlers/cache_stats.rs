use crate::state::AppState;
use axum::{extract::State, Json};
use cutroom_core::CacheStats;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/cache/stats",
    tag = "proxies",
    responses(
        (status = 200, description = "Current cache usage", body = CacheStats)
    )
)]
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.store.stats().await)
}
