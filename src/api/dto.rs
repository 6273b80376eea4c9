//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use crate::indexer::TopQuery;
use crate::ingest::ProgressSnapshot;
use serde::{Deserialize, Serialize};

// ============================================
// QUERY DTOs
// ============================================

/// GET /1/queries/count/:date_prefix response
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    /// Distinct queries in the bucket
    pub count: usize,
}

/// GET /1/queries/popular/:date_prefix query string
///
/// Kept as text so a bad value gets the API's own error body.
#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub size: Option<String>,
}

impl PopularParams {
    pub fn size(&self) -> Result<usize, String> {
        let raw = self
            .size
            .as_deref()
            .ok_or_else(|| "missing required parameter: size".to_string())?;
        raw.trim()
            .parse()
            .map_err(|_| format!("size must be a non-negative integer, got {:?}", raw))
    }
}

/// GET /1/queries/popular/:date_prefix response
#[derive(Debug, Serialize, Deserialize)]
pub struct PopularResponse {
    /// Most frequent first
    pub queries: Vec<TopQuery>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy (ingestion done) or loading
    pub status: String,
    /// Buckets created so far
    pub buckets: usize,
    /// Distinct query texts seen
    pub distinct_queries: usize,
    pub progress: ProgressSnapshot,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: Option<&str>) -> PopularParams {
        PopularParams {
            size: size.map(str::to_string),
        }
    }

    #[test]
    fn test_popular_size() {
        assert_eq!(params(Some("3")).size(), Ok(3));
        assert_eq!(params(Some("0")).size(), Ok(0));
        assert!(params(None).size().is_err());
        assert!(params(Some("-1")).size().is_err());
        assert!(params(Some("three")).size().is_err());
    }
}
