//! Link Path Library - Road-Following Geometry for Network Links
//!
//! This library turns the straight lines of a network topology drawn on a map into paths
//! that follow real roads. Paths are fetched from an external routing provider, cached per
//! link, and can be hand-edited by an operator. Hand edits are never overwritten unless a
//! recomputation is explicitly forced.
//!
//! # Architecture
//!
//! - **[`geometry`]**: Pure distance and projection math on [`Coordinate`]s
//! - **[`LinkPath`]**: Immutable path record with its lifecycle [`PathState`]
//! - **[`PathStore`]**: Concurrent per-link cache with atomic record swaps
//! - **[`RouteProvider`]**: Async seam to the routing service ([`OsrmProvider`] by default)
//! - **[`RouteComputationService`]**: Bounded-concurrency batch computation with fallback
//! - **[`PathEditor`]**: Vertex insertion, moves, removal and reset
//! - **[`Topology`]**: Resolves link endpoints from the nodes' current positions
//!
//! # Failure Model
//!
//! A link whose route cannot be fetched is drawn as a straight line between its endpoints
//! and reported in the [`BatchOutcome`]. A failing link never blocks the rest of a batch.

mod compute;
mod editor;
mod export;
pub mod geometry;
#[cfg(feature = "osrm")]
mod osrm;
mod path;
mod provider;
mod store;
mod topology;

// Public API exports
pub use compute::{BatchHandle, BatchOutcome, Config, LinkRequest, RouteComputationService};
pub use editor::PathEditor;
pub use export::{to_gpx, write_gpx};
pub use geometry::Coordinate;
#[cfg(feature = "osrm")]
pub use osrm::{OsrmConfig, OsrmProvider};
pub use path::{LinkId, LinkPath, PathState};
pub use provider::{ProviderError, RouteProvider};
pub use store::PathStore;
pub use topology::{LinkEndpoint, NodeId, Topology, TopologyLink};

/// Error types for the link path library
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    #[error("Degenerate geometry for link {link_id}: {points} point(s), at least 2 required")]
    DegenerateGeometry { link_id: LinkId, points: usize },

    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Link {link_id} references unknown node {node_id}")]
    UnknownNode { link_id: LinkId, node_id: NodeId },

    #[error("Point index {index} out of range for link {link_id} with {len} points")]
    PointIndexOutOfRange {
        link_id: LinkId,
        index: usize,
        len: usize,
    },

    #[error("Point {index} is an endpoint of link {link_id}")]
    EndpointVertex { link_id: LinkId, index: usize },

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

pub type Result<T> = std::result::Result<T, PathError>;
