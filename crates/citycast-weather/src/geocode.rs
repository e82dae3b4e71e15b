//! Geocoding: free text to candidate places, and coordinates back to a label.
//! Uses the Open-Meteo geocoding API - free, no API key required.

use async_trait::async_trait;
use citycast_core::{ReqwestErrorExt, ServiceConfig};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::types::{compose_display_name, Candidate, Coordinates, GeocodeError};

pub(crate) const USER_AGENT: &str = "CityCast/0.1.0";

/// Label used when the current position cannot be named.
pub const FALLBACK_LABEL: &str = "Current location";

/// Place-name resolution used by the autocomplete field and card loading.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Up to `limit` candidates in the service's order. Never fails: blank
    /// queries and transport errors both yield an empty list.
    async fn suggest(&self, query: &str, limit: usize) -> Vec<Candidate>;

    /// The top match for a name.
    async fn resolve_best(&self, query: &str) -> Result<Candidate, GeocodeError>;

    /// A display label for a position, or [`FALLBACK_LABEL`].
    async fn reverse_resolve(&self, coordinates: Coordinates) -> String;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Option<Vec<GeoResult>>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    admin1: Option<String>,
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl From<GeoResult> for Candidate {
    fn from(r: GeoResult) -> Self {
        Candidate::new(
            r.name,
            r.admin1,
            r.country,
            Coordinates::new(r.latitude, r.longitude),
        )
    }
}

/// HTTP client for the geocoding API
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: Client,
    base_url: String,
    language: String,
    resolve_limit: usize,
}

impl GeocodingClient {
    pub fn new(config: &ServiceConfig, resolve_limit: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.geocoding_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            resolve_limit,
        })
    }

    async fn search(&self, name: &str, count: usize) -> Result<Vec<Candidate>, reqwest::Error> {
        let url = format!("{}/v1/search", self.base_url);
        let count = count.to_string();

        let body: SearchResponse = self
            .client
            .get(&url)
            .query(&[
                ("name", name),
                ("count", count.as_str()),
                ("language", self.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Candidate::from)
            .collect())
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, reqwest::Error> {
        let url = format!("{}/v1/reverse", self.base_url);
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();

        let body: SearchResponse = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("count", "1"),
                ("language", self.language.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.results.unwrap_or_default().into_iter().next().map(|r| {
            compose_display_name(&r.name, r.admin1.as_deref(), r.country.as_deref())
        }))
    }
}

#[async_trait]
impl Geocoder for GeocodingClient {
    #[instrument(skip(self), level = "debug")]
    async fn suggest(&self, query: &str, limit: usize) -> Vec<Candidate> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self.search(query, limit).await {
            Ok(mut candidates) => {
                candidates.truncate(limit);
                candidates
            }
            Err(e) => {
                tracing::warn!("Suggestion request failed: {}", e);
                Vec::new()
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn resolve_best(&self, query: &str) -> Result<Candidate, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::NotFound(String::new()));
        }

        let candidates = self
            .search(query, self.resolve_limit)
            .await
            .map_err(|e| {
                tracing::debug!("Geocoding request failed: {}", e);
                GeocodeError::ResolutionFailed(e.into_network_error().to_string())
            })?;

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))
    }

    #[instrument(skip(self), level = "debug")]
    async fn reverse_resolve(&self, coordinates: Coordinates) -> String {
        match self.reverse(coordinates).await {
            Ok(Some(label)) => {
                tracing::info!("Reverse geocoded to: {}", label);
                label
            }
            Ok(None) => FALLBACK_LABEL.to_string(),
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                FALLBACK_LABEL.to_string()
            }
        }
    }
}
