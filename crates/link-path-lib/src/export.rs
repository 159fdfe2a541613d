//! GPX export of link paths
//!
//! Each link becomes one GPX track named after its link id, holding a single
//! segment with the path's points.

use crate::{LinkPath, Result};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use std::io::Write;

/// Build a GPX 1.1 document with one track per link path
pub fn to_gpx<'a, I>(paths: I) -> Gpx
where
    I: IntoIterator<Item = &'a LinkPath>,
{
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(concat!("link-path-lib ", env!("CARGO_PKG_VERSION")).to_string()),
        ..Default::default()
    };

    for path in paths {
        let mut track = Track::default();
        track.name = Some(path.link_id().to_string());
        track.description = Some(format!(
            "{}, {:.0} m",
            path.state(),
            path.distance_meters()
        ));

        let mut segment = TrackSegment::default();
        segment.points.extend(
            path.points()
                .iter()
                .map(|&point| Waypoint::new(point.into())),
        );
        track.segments.push(segment);
        gpx.tracks.push(track);
    }

    gpx
}

/// Write link paths as GPX to `writer`
pub fn write_gpx<'a, I, W>(paths: I, writer: W) -> Result<()>
where
    I: IntoIterator<Item = &'a LinkPath>,
    W: Write,
{
    gpx::write(&to_gpx(paths), writer)?;
    Ok(())
}
