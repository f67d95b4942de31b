//! Ports to the collaborators the engine does not implement itself.
//!
//! Object storage ([`StoragePort`]), reverse geocoding ([`GeocodePort`]), the
//! AI photo scorer ([`AiScorerPort`]) and the AI diary writer
//! ([`AiGeneratorPort`]). Every request and response crossing a port has an
//! explicit type. [`local_storage`] and [`http`] hold the concrete adapters.

pub mod http;
pub mod local_storage;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::types::ResolvedLocation;
use crate::error::{DiaryError, StorageError};

/// Metadata passed along with uploaded bytes.
#[derive(Debug, Clone, Default)]
pub struct ObjectMeta {
    pub owner_id: i64,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Binary object storage. URLs returned by `put` are the only handle the
/// engine keeps.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, meta: &ObjectMeta) -> Result<String, StorageError>;

    /// Fails with [`StorageError::InvalidUrl`] for URLs this store did not issue.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Coordinates → location hierarchy. `Ok(None)` means the provider had no answer.
#[async_trait]
pub trait GeocodePort: Send + Sync {
    async fn resolve(&self, latitude: f64, longitude: f64) -> Result<Option<ResolvedLocation>>;
}

/// One photo as seen by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringDescriptor {
    pub id: i64,
    pub url: String,
    /// ISO 8601, or `null` when the capture time is unknown.
    pub captured_at: Option<String>,
    pub resolved_location: Option<ResolvedLocation>,
    pub is_mandatory: bool,
}

/// Picks the photos worth keeping. `Ok(None)` means the scorer declined to answer.
#[async_trait]
pub trait AiScorerPort: Send + Sync {
    async fn score(&self, descriptors: &[ScoringDescriptor]) -> Result<Option<Vec<i64>>>;
}

/// Writes diary text from a list of photo URLs.
#[async_trait]
pub trait AiGeneratorPort: Send + Sync {
    async fn generate(&self, image_urls: &[String]) -> Result<String>;
}

/// Run an external call under `limit`.
///
/// Errors and timeouts are logged as [`DiaryError::ExternalServiceDegraded`]
/// and collapse to `None`; the caller applies its fallback.
pub async fn bounded<T, F>(service: &str, limit: Duration, call: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    let degraded = match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => DiaryError::ExternalServiceDegraded(format!("{service}: {e:#}")),
        Err(_) => DiaryError::ExternalServiceDegraded(format!("{service}: timed out after {limit:?}")),
    };
    tracing::warn!(service, error = %degraded, "external call failed, using fallback");
    None
}
