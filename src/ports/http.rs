//! JSON-over-HTTP adapters for the scorer, generator and geocoder.
//!
//! Wire shapes:
//! - scorer: `POST {photos: [ScoringDescriptor]}` → `{recommendedIds: [i64] | null}`
//! - generator: `POST {imageUrls: [String]}` → `{text: String}`
//! - geocoder: `GET ?lat=..&lon=..` → `{country, admin1, locality}`, 404 when unknown

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiGeneratorPort, AiScorerPort, GeocodePort, ScoringDescriptor};
use crate::config::ServicesConfig;
use crate::engine::types::ResolvedLocation;

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    photos: &'a [ScoringDescriptor],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
    recommended_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    image_urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    locality: Option<String>,
}

impl From<GeocodeResponse> for ResolvedLocation {
    fn from(resp: GeocodeResponse) -> Self {
        ResolvedLocation::new(
            resp.country.as_deref().unwrap_or_default(),
            resp.admin1.as_deref().unwrap_or_default(),
            resp.locality.as_deref().unwrap_or_default(),
        )
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("phodiary/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpScorer {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            url: config.scorer_url.clone(),
        })
    }
}

#[async_trait]
impl AiScorerPort for HttpScorer {
    async fn score(&self, descriptors: &[ScoringDescriptor]) -> Result<Option<Vec<i64>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest { photos: descriptors })
            .send()
            .await
            .context("scorer request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("scorer returned error: {}", response.status());
        }

        let body: ScoreResponse = response
            .json()
            .await
            .context("failed to parse scorer response")?;
        Ok(body.recommended_ids)
    }
}

pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            url: config.generator_url.clone(),
        })
    }
}

#[async_trait]
impl AiGeneratorPort for HttpGenerator {
    async fn generate(&self, image_urls: &[String]) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest { image_urls })
            .send()
            .await
            .context("generator request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("generator returned error: {}", response.status());
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("failed to parse generator response")?;
        anyhow::ensure!(!body.text.trim().is_empty(), "generator returned empty text");
        Ok(body.text)
    }
}

pub struct HttpGeocoder {
    client: reqwest::Client,
    url: String,
}

impl HttpGeocoder {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            url: config.geocode_url.clone(),
        })
    }
}

#[async_trait]
impl GeocodePort for HttpGeocoder {
    async fn resolve(&self, latitude: f64, longitude: f64) -> Result<Option<ResolvedLocation>> {
        let response = self
            .client
            .get(format!("{}?lat={latitude}&lon={longitude}", self.url))
            .send()
            .await
            .context("geocode request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("geocoder returned error: {}", response.status());
        }

        let body: Option<GeocodeResponse> = response
            .json()
            .await
            .context("failed to parse geocode response")?;
        Ok(body.map(ResolvedLocation::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_request_wraps_descriptors() {
        let photos = vec![ScoringDescriptor {
            id: 1,
            url: "u".into(),
            captured_at: Some("2026-05-01T10:00:00.000Z".into()),
            resolved_location: None,
            is_mandatory: false,
        }];
        let json = serde_json::to_value(ScoreRequest { photos: &photos }).unwrap();
        assert_eq!(json["photos"][0]["capturedAt"], "2026-05-01T10:00:00.000Z");
    }

    #[test]
    fn score_response_accepts_null_ids() {
        let body: ScoreResponse = serde_json::from_str(r#"{"recommendedIds": null}"#).unwrap();
        assert!(body.recommended_ids.is_none());
        let body: ScoreResponse = serde_json::from_str(r#"{"recommendedIds": [3, 1]}"#).unwrap();
        assert_eq!(body.recommended_ids, Some(vec![3, 1]));
    }

    #[test]
    fn generate_request_uses_camel_case() {
        let urls = vec!["a".to_string()];
        let json = serde_json::to_value(GenerateRequest { image_urls: &urls }).unwrap();
        assert_eq!(json["imageUrls"][0], "a");
    }

    #[test]
    fn geocode_response_fills_missing_levels() {
        let body: GeocodeResponse =
            serde_json::from_str(r#"{"country": " Korea ", "locality": "Seoul"}"#).unwrap();
        let location = ResolvedLocation::from(body);
        assert_eq!(location, ResolvedLocation::new("Korea", "", "Seoul"));
    }
}
