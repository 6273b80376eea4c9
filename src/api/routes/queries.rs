//! Query Routes
//!
//! Bucket statistics, addressed by a date prefix in one of the five
//! canonical forms (`2015`, `2015-08`, `2015-08-01`, `2015-08-01 00`,
//! `2015-08-01 00:04`).
//!
//! - GET /1/queries/count/:date_prefix - Distinct queries in the bucket
//! - GET /1/queries/popular/:date_prefix?size=N - Most popular queries
//!
//! A bucket nothing was ever recorded in answers with zero / an empty list.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CountResponse, PopularParams, PopularResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::indexer::TimeRange;

/// GET /1/queries/count/:date_prefix
pub async fn count_distinct(
    State(state): State<Arc<AppState>>,
    Path(date_prefix): Path<String>,
) -> ApiResult<Json<CountResponse>> {
    let range = TimeRange::parse(&date_prefix)?;

    let count = match state.aggregator.get_index(&range) {
        Some(index) => index.size().await?,
        None => 0,
    };

    Ok(Json(CountResponse { count }))
}

/// GET /1/queries/popular/:date_prefix?size=N
pub async fn popular(
    State(state): State<Arc<AppState>>,
    Path(date_prefix): Path<String>,
    Query(params): Query<PopularParams>,
) -> ApiResult<Json<PopularResponse>> {
    let range = TimeRange::parse(&date_prefix)?;
    let size = params.size().map_err(ApiError::Validation)?;

    let queries = match state.aggregator.get_index(&range) {
        Some(index) => index.top(size).await?,
        None => Vec::new(),
    };

    Ok(Json(PopularResponse { queries }))
}
