//! PathEditor - operator edits on a single link's path

use crate::geometry::{self, Coordinate};
use crate::{LinkId, LinkPath, PathError, PathStore, Result};
use std::sync::Arc;

/// Fine-grained manual edits, applied directly to the [`PathStore`]
///
/// Every edit except [`reset_to_straight`](Self::reset_to_straight) leaves the
/// link in `ManuallyEdited` state. Endpoints are owned by the topology, so only
/// interior vertices can be moved or removed.
#[derive(Debug, Clone)]
pub struct PathEditor {
    store: Arc<PathStore>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PathEditor {
    pub fn new(store: Arc<PathStore>) -> Self {
        Self { store }
    }

    /// Insert `new_point` into the segment it lies closest to
    ///
    /// Not idempotent: each call adds one more vertex.
    pub fn insert_point(&self, link_id: &LinkId, new_point: Coordinate) -> Result<Arc<LinkPath>> {
        let path = self.store.edit_points(link_id, |points| {
            let index = geometry::best_insertion_index(points, new_point);
            let mut edited = points.to_vec();
            edited.insert(index, new_point);
            Ok(edited)
        })?;
        tracing::debug!(link = %link_id, point = %new_point, points = path.points().len(), "Inserted point");
        Ok(path)
    }

    /// Move an interior vertex to `coordinate`
    pub fn move_point(
        &self,
        link_id: &LinkId,
        index: usize,
        coordinate: Coordinate,
    ) -> Result<Arc<LinkPath>> {
        self.store.edit_points(link_id, |points| {
            check_interior(link_id, points, index)?;
            let mut edited = points.to_vec();
            edited[index] = coordinate;
            Ok(edited)
        })
    }

    /// Remove an interior vertex
    ///
    /// Interior vertices only exist on paths of three or more points, so the
    /// result always keeps both endpoints.
    pub fn remove_point(&self, link_id: &LinkId, index: usize) -> Result<Arc<LinkPath>> {
        self.store.edit_points(link_id, |points| {
            check_interior(link_id, points, index)?;
            let mut edited = points.to_vec();
            edited.remove(index);
            Ok(edited)
        })
    }

    /// Discard every edit and draw the link as a straight line again
    ///
    /// The endpoints come from the caller since the topology owns them.
    /// Idempotent.
    pub fn reset_to_straight(
        &self,
        link_id: &LinkId,
        source: Coordinate,
        target: Coordinate,
    ) -> Result<Arc<LinkPath>> {
        let path = self.store.reset_to_straight(link_id, source, target)?;
        tracing::debug!(link = %link_id, "Reset to straight line");
        Ok(path)
    }
}

fn check_interior(link_id: &LinkId, points: &[Coordinate], index: usize) -> Result<()> {
    if index >= points.len() {
        return Err(PathError::PointIndexOutOfRange {
            link_id: link_id.clone(),
            index,
            len: points.len(),
        });
    }
    if index == 0 || index == points.len() - 1 {
        return Err(PathError::EndpointVertex {
            link_id: link_id.clone(),
            index,
        });
    }
    Ok(())
}
