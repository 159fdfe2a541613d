//! Link path records
//!
//! A [`LinkPath`] is the geographic route drawn for one network link, together
//! with how it was obtained and its cached great-circle length.

use crate::geometry::{self, Coordinate};
use crate::{PathError, Result};
use chrono::{DateTime, Utc};
use geo::{LineString, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a network link, owned by the topology
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct LinkId(String);

impl LinkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LinkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the current points of a link path were obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathState {
    /// Straight placeholder, no routing attempted yet
    Uncomputed,
    /// Road-following path returned by the routing provider
    ComputedByProvider,
    /// Edited by an operator; survives ordinary recomputation
    ManuallyEdited,
    /// Straight line after a routing failure or an explicit reset
    FallbackStraight,
}

impl std::fmt::Display for PathState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uncomputed => "uncomputed",
            Self::ComputedByProvider => "computed",
            Self::ManuallyEdited => "manually edited",
            Self::FallbackStraight => "straight fallback",
        };
        f.write_str(name)
    }
}

/// The route drawn for a single link
///
/// Records are immutable: every mutation builds a new `LinkPath`, so `points`
/// and `distance_meters` can never disagree.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "LinkPathRepr", into = "LinkPathRepr")
)]
pub struct LinkPath {
    link_id: LinkId,
    points: Vec<Coordinate>,
    state: PathState,
    /// Cached sum of great-circle distances between consecutive points
    distance_meters: f64,
    last_updated: DateTime<Utc>,
}

/// Wire form of a [`LinkPath`]; the distance is recomputed on the way in
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct LinkPathRepr {
    link_id: LinkId,
    points: Vec<Coordinate>,
    state: PathState,
    #[serde(default)]
    distance_meters: f64,
    last_updated: DateTime<Utc>,
}

#[cfg(feature = "serde")]
impl TryFrom<LinkPathRepr> for LinkPath {
    type Error = PathError;

    fn try_from(repr: LinkPathRepr) -> Result<Self> {
        let mut path = LinkPath::new(repr.link_id, repr.points, repr.state)?;
        path.last_updated = repr.last_updated;
        Ok(path)
    }
}

#[cfg(feature = "serde")]
impl From<LinkPath> for LinkPathRepr {
    fn from(path: LinkPath) -> Self {
        LinkPathRepr {
            link_id: path.link_id,
            points: path.points,
            state: path.state,
            distance_meters: path.distance_meters,
            last_updated: path.last_updated,
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl LinkPath {
    /// Build a path record stamped with the current time
    ///
    /// Fails with [`PathError::DegenerateGeometry`] when fewer than two points
    /// are given.
    pub fn new(link_id: LinkId, points: Vec<Coordinate>, state: PathState) -> Result<Self> {
        if points.len() < 2 {
            return Err(PathError::DegenerateGeometry {
                link_id,
                points: points.len(),
            });
        }

        let distance_meters = geometry::path_length(&points);
        Ok(Self {
            link_id,
            points,
            state,
            distance_meters,
            last_updated: Utc::now(),
        })
    }

    /// Straight two-point path in the given state
    pub fn straight(
        link_id: LinkId,
        source: Coordinate,
        target: Coordinate,
        state: PathState,
    ) -> Self {
        let points = geometry::straight_line(source, target);
        Self {
            distance_meters: geometry::distance(source, target),
            link_id,
            points,
            state,
            last_updated: Utc::now(),
        }
    }

    #[inline]
    pub fn link_id(&self) -> &LinkId {
        &self.link_id
    }

    #[inline]
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    #[inline]
    pub fn state(&self) -> PathState {
        self.state
    }

    /// Great-circle length of the path in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    #[inline]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// First point of the path
    #[inline]
    pub fn source(&self) -> Coordinate {
        self.points[0]
    }

    /// Last point of the path
    #[inline]
    pub fn target(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Whether this record is a plain two-point line
    #[inline]
    pub fn is_straight(&self) -> bool {
        self.points.len() == 2
    }

    /// Bounding box in WGS84 degrees (x = longitude, y = latitude)
    pub fn bounding_box(&self) -> Rect<f64> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for point in &self.points {
            min_x = min_x.min(point.lon());
            min_y = min_y.min(point.lat());
            max_x = max_x.max(point.lon());
            max_y = max_y.max(point.lat());
        }

        Rect::new(
            geo::Coord { x: min_x, y: min_y },
            geo::Coord { x: max_x, y: max_y },
        )
    }

    /// The path as a `geo` line string (x = longitude, y = latitude)
    pub fn to_line_string(&self) -> LineString<f64> {
        self.points
            .iter()
            .map(|&point| geo::Coord::from(point))
            .collect()
    }
}
