//! OSRM HTTP route provider
//!
//! Talks to the `route` service of an OSRM server (the public demo server by
//! default) and returns the full-resolution GeoJSON geometry of the first
//! route.

use crate::geometry::Coordinate;
use crate::provider::{ProviderError, RouteProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org";

/// Connection settings for an OSRM server
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OsrmConfig {
    /// Server root, without a trailing slash
    pub base_url: String,
    /// Routing profile, e.g. `driving`
    pub profile: String,
    /// HTTP timeout for a single request
    pub timeout: Duration,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: "driving".to_string(),
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Deserialize)]
struct RouteEntry {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    /// GeoJSON order: [longitude, latitude]
    coordinates: Vec<[f64; 2]>,
}

/// [`RouteProvider`] backed by an OSRM server
#[derive(Debug, Clone)]
pub struct OsrmProvider {
    client: Client,
    config: OsrmConfig,
}

impl OsrmProvider {
    pub fn new(config: OsrmConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("link-path-lib/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    #[inline]
    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn route_url(&self, source: Coordinate, target: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=geojson",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            source.lon(),
            source.lat(),
            target.lon(),
            target.lat()
        )
    }
}

/// Turn an OSRM response body into an ordered point list
fn parse_route(body: &str) -> Result<Vec<Coordinate>, ProviderError> {
    let response: RouteResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))?;

    if response.code != "Ok" {
        return Err(ProviderError::MalformedResponse(format!(
            "{}: {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("no route in response".to_string()))?;

    route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| {
            Coordinate::new(lat, lon).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl RouteProvider for OsrmProvider {
    async fn route(
        &self,
        source: Coordinate,
        target: Coordinate,
    ) -> Result<Vec<Coordinate>, ProviderError> {
        let url = self.route_url(source, target);
        tracing::trace!(%url, "Requesting route");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.config.timeout)
            } else {
                ProviderError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {status}")));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.config.timeout)
            } else {
                ProviderError::MalformedResponse(format!("Failed to read response body: {e}"))
            }
        })?;

        parse_route(&body)
    }

    fn name(&self) -> &str {
        "osrm"
    }
}
