//! Geometry helpers for link paths
//!
//! Pure functions over WGS84 coordinates. Reported distances always use the
//! Haversine great-circle formula; the point-to-segment helpers work on a flat
//! (lat, lon) plane and are only meant for picking where a new vertex goes.

use crate::{PathError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A (latitude, longitude) pair in degrees
///
/// Construction through [`Coordinate::new`] guarantees finite values inside
/// the valid WGS84 ranges, so every `Coordinate` in the engine is usable.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "CoordinateRepr", into = "CoordinateRepr")
)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct CoordinateRepr {
    lat: f64,
    lon: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<CoordinateRepr> for Coordinate {
    type Error = PathError;

    fn try_from(repr: CoordinateRepr) -> Result<Self> {
        Coordinate::new(repr.lat, repr.lon)
    }
}

#[cfg(feature = "serde")]
impl From<Coordinate> for CoordinateRepr {
    fn from(coord: Coordinate) -> Self {
        CoordinateRepr {
            lat: coord.lat,
            lon: coord.lon,
        }
    }
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(PathError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Latitude in degrees
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees
    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    #[inline]
    fn from(coord: Coordinate) -> Self {
        geo::Coord {
            x: coord.lon,
            y: coord.lat,
        }
    }
}

impl From<Coordinate> for geo::Point<f64> {
    #[inline]
    fn from(coord: Coordinate) -> Self {
        geo::Point::new(coord.lon, coord.lat)
    }
}

/// Great-circle distance between two coordinates in meters (Haversine)
#[inline]
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Sum of great-circle distances between consecutive points, in meters
///
/// Returns 0 for fewer than two points.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn path_length(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|pair| distance(pair[0], pair[1])).sum()
}

/// Distance from `point` to the segment `seg_start`-`seg_end`, in degrees
///
/// Treats (lat, lon) as a flat plane. The projection parameter is clamped to
/// the segment, and a zero-length segment degrades to the distance to its start.
#[inline]
pub fn distance_to_segment(point: Coordinate, seg_start: Coordinate, seg_end: Coordinate) -> f64 {
    let dx = seg_end.lat - seg_start.lat;
    let dy = seg_end.lon - seg_start.lon;
    let length_sq = dx * dx + dy * dy;

    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((point.lat - seg_start.lat) * dx + (point.lon - seg_start.lon) * dy) / length_sq)
            .clamp(0.0, 1.0)
    };

    let proj_lat = seg_start.lat + t * dx;
    let proj_lon = seg_start.lon + t * dy;
    ((point.lat - proj_lat).powi(2) + (point.lon - proj_lon).powi(2)).sqrt()
}

/// Index at which `new_point` should be inserted into `points`
///
/// Picks the segment closest to `new_point` and returns the index right after
/// its start vertex. Ties go to the lowest segment. Paths with fewer than two
/// points have no segments, so the point is appended.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn best_insertion_index(points: &[Coordinate], new_point: Coordinate) -> usize {
    if points.len() < 2 {
        return points.len();
    }

    let mut best_index = 1;
    let mut best_distance = f64::INFINITY;
    for (i, pair) in points.windows(2).enumerate() {
        let d = distance_to_segment(new_point, pair[0], pair[1]);
        if d < best_distance {
            best_distance = d;
            best_index = i + 1;
        }
    }
    best_index
}

/// Two-point path from `source` to `target`
#[inline]
pub fn straight_line(source: Coordinate, target: Coordinate) -> Vec<Coordinate> {
    vec![source, target]
}
