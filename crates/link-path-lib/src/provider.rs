//! Routing provider abstraction
//!
//! A provider answers one question: the road-following point sequence between
//! two coordinates. Concrete transports live elsewhere (see the `osrm` module).

use crate::geometry::Coordinate;
use async_trait::async_trait;
use std::time::Duration;

/// Failure of a single route request
///
/// These never fail a batch; the affected link falls back to a straight line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Routing provider unavailable: {0}")]
    Unavailable(String),

    #[error("Routing request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed routing response: {0}")]
    MalformedResponse(String),
}

/// Source of road-following paths for a single link
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Ordered points from `source` to `target`
    async fn route(
        &self,
        source: Coordinate,
        target: Coordinate,
    ) -> Result<Vec<Coordinate>, ProviderError>;

    /// Short name used in log messages
    fn name(&self) -> &str {
        "route-provider"
    }
}
