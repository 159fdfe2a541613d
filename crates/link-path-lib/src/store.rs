//! PathStore - canonical table of link paths
//!
//! Every mutation touches exactly one link and swaps in a freshly built
//! [`LinkPath`], so readers never observe points and distance out of step.
//! Contention is per shard of the underlying map, never global.

use crate::geometry::Coordinate;
use crate::{LinkId, LinkPath, PathError, PathState, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Whether a provider-side write may replace an operator's edit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WritePolicy {
    /// Leave `ManuallyEdited` records untouched
    PreserveManualEdits,
    /// Replace whatever is stored
    Overwrite,
}

/// Result of a provider-side write
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    Applied(Arc<LinkPath>),
    PreservedManualEdit,
}

/// In-memory table of link paths keyed by [`LinkId`]
#[derive(Debug, Default)]
pub struct PathStore {
    paths: DashMap<LinkId, Arc<LinkPath>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a link
    pub fn get(&self, link_id: &LinkId) -> Result<Arc<LinkPath>> {
        self.paths
            .get(link_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PathError::LinkNotFound(link_id.clone()))
    }

    #[inline]
    pub fn contains(&self, link_id: &LinkId) -> bool {
        self.paths.contains_key(link_id)
    }

    /// Create an `Uncomputed` straight record if the link is not known yet
    ///
    /// Idempotent: an existing record is returned unchanged.
    pub fn ensure_exists(
        &self,
        link_id: LinkId,
        source: Coordinate,
        target: Coordinate,
    ) -> Arc<LinkPath> {
        let key = link_id.clone();
        let entry = self.paths.entry(key).or_insert_with(|| {
            tracing::debug!(link = %link_id, "Observed new link");
            Arc::new(LinkPath::straight(
                link_id,
                source,
                target,
                PathState::Uncomputed,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Store a provider-computed path, creating the record if needed
    pub fn upsert_computed(
        &self,
        link_id: LinkId,
        points: Vec<Coordinate>,
    ) -> Result<Arc<LinkPath>> {
        self.replace(link_id, points, PathState::ComputedByProvider)
    }

    /// Store a straight fallback after a failed route computation
    pub fn upsert_fallback(
        &self,
        link_id: LinkId,
        straight_points: Vec<Coordinate>,
    ) -> Result<Arc<LinkPath>> {
        self.replace(link_id, straight_points, PathState::FallbackStraight)
    }

    /// Replace the points of an existing link with an operator's edit
    pub fn apply_manual_edit(
        &self,
        link_id: &LinkId,
        points: Vec<Coordinate>,
    ) -> Result<Arc<LinkPath>> {
        self.edit_points(link_id, |_| Ok(points))
    }

    /// Reset an existing link to the straight line between its endpoints
    pub fn reset_to_straight(
        &self,
        link_id: &LinkId,
        source: Coordinate,
        target: Coordinate,
    ) -> Result<Arc<LinkPath>> {
        let mut entry = self
            .paths
            .get_mut(link_id)
            .ok_or_else(|| PathError::LinkNotFound(link_id.clone()))?;
        let path = Arc::new(LinkPath::straight(
            link_id.clone(),
            source,
            target,
            PathState::FallbackStraight,
        ));
        *entry = Arc::clone(&path);
        Ok(path)
    }

    /// Read-modify-write of one link's points as a manual edit
    ///
    /// The closure sees the current points and returns the new ones. The
    /// record stays locked for the duration, and nothing is written when the
    /// closure fails or the result is degenerate. The closure must not touch
    /// the store: the shard lock is held while it runs.
    pub(crate) fn edit_points<F>(&self, link_id: &LinkId, edit: F) -> Result<Arc<LinkPath>>
    where
        F: FnOnce(&[Coordinate]) -> Result<Vec<Coordinate>>,
    {
        let mut entry = self
            .paths
            .get_mut(link_id)
            .ok_or_else(|| PathError::LinkNotFound(link_id.clone()))?;
        let points = edit(entry.points())?;
        let path = Arc::new(
            LinkPath::new(link_id.clone(), points, PathState::ManuallyEdited)
                .inspect_err(|err| tracing::warn!(link = %link_id, "Rejected edit: {}", err))?,
        );
        *entry = Arc::clone(&path);
        Ok(path)
    }

    /// Provider-side write that can respect operator edits atomically
    pub(crate) fn write_provider_result(
        &self,
        link_id: &LinkId,
        points: Vec<Coordinate>,
        state: PathState,
        policy: WritePolicy,
    ) -> Result<WriteOutcome> {
        let path = Arc::new(LinkPath::new(link_id.clone(), points, state)?);
        match self.paths.entry(link_id.clone()) {
            Entry::Occupied(mut entry) => {
                if policy == WritePolicy::PreserveManualEdits
                    && entry.get().state() == PathState::ManuallyEdited
                {
                    return Ok(WriteOutcome::PreservedManualEdit);
                }
                entry.insert(Arc::clone(&path));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&path));
            }
        }
        Ok(WriteOutcome::Applied(path))
    }

    fn replace(
        &self,
        link_id: LinkId,
        points: Vec<Coordinate>,
        state: PathState,
    ) -> Result<Arc<LinkPath>> {
        match self.write_provider_result(&link_id, points, state, WritePolicy::Overwrite) {
            Ok(WriteOutcome::Applied(path)) => Ok(path),
            Ok(WriteOutcome::PreservedManualEdit) => self.get(&link_id),
            Err(err) => {
                tracing::warn!(link = %link_id, "Rejected {} write: {}", state, err);
                Err(err)
            }
        }
    }

    /// Drop a link's record, e.g. after the link was deleted from the topology
    pub fn remove(&self, link_id: &LinkId) -> Option<Arc<LinkPath>> {
        self.paths.remove(link_id).map(|(_, path)| path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All known link ids, sorted
    pub fn link_ids(&self) -> Vec<LinkId> {
        let mut ids: Vec<LinkId> = self.paths.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Every record, sorted by link id
    ///
    /// Each record is internally consistent; records for different links may
    /// come from different moments if writers are active.
    pub fn snapshot(&self) -> Vec<Arc<LinkPath>> {
        let mut paths: Vec<Arc<LinkPath>> = self
            .paths
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        paths.sort_by(|a, b| a.link_id().cmp(b.link_id()));
        paths
    }

    /// Load previously persisted records, replacing any with the same id
    pub fn restore<I>(&self, paths: I)
    where
        I: IntoIterator<Item = LinkPath>,
    {
        for path in paths {
            self.paths.insert(path.link_id().clone(), Arc::new(path));
        }
    }

    /// Combined length of every stored path in meters
    pub fn total_distance_meters(&self) -> f64 {
        self.paths
            .iter()
            .map(|entry| entry.value().distance_meters())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn road() -> Vec<Coordinate> {
        vec![c(0.0, 0.0), c(0.2, 0.3), c(0.1, 0.7), c(0.0, 1.0)]
    }

    #[test]
    fn test_get_missing_link() {
        let store = PathStore::new();
        let err = store.get(&"missing".into()).unwrap_err();
        assert!(matches!(err, PathError::LinkNotFound(id) if id.as_str() == "missing"));
    }

    #[test]
    fn test_ensure_exists_is_idempotent() {
        let store = PathStore::new();
        let first = store.ensure_exists("l1".into(), c(0.0, 0.0), c(0.0, 1.0));
        assert_eq!(first.state(), PathState::Uncomputed);
        assert!(first.is_straight());

        store.upsert_computed("l1".into(), road()).unwrap();
        let again = store.ensure_exists("l1".into(), c(5.0, 5.0), c(6.0, 6.0));
        assert_eq!(again.state(), PathState::ComputedByProvider);
        assert_eq!(again.points(), road().as_slice());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_computed_creates_and_caches_distance() {
        let store = PathStore::new();
        let path = store.upsert_computed("l1".into(), road()).unwrap();
        assert_eq!(path.state(), PathState::ComputedByProvider);
        assert_eq!(path.distance_meters(), geometry::path_length(&road()));
        assert_eq!(store.get(&"l1".into()).unwrap(), path);
    }

    #[test]
    fn test_upsert_fallback() {
        let store = PathStore::new();
        store.upsert_computed("l1".into(), road()).unwrap();
        let path = store
            .upsert_fallback("l1".into(), geometry::straight_line(c(0.0, 0.0), c(0.0, 1.0)))
            .unwrap();
        assert_eq!(path.state(), PathState::FallbackStraight);
        assert!(path.is_straight());
    }

    #[test]
    fn test_degenerate_writes_keep_prior_record() {
        let store = PathStore::new();
        let before = store.upsert_computed("l1".into(), road()).unwrap();

        let err = store.upsert_computed("l1".into(), vec![c(0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, PathError::DegenerateGeometry { points: 1, .. }));
        assert!(store.upsert_fallback("l1".into(), Vec::new()).is_err());
        assert!(store.apply_manual_edit(&"l1".into(), vec![c(1.0, 1.0)]).is_err());

        let after = store.get(&"l1".into()).unwrap();
        assert_eq!(*after, *before);
    }

    #[test]
    fn test_manual_edit_requires_existing_link() {
        let store = PathStore::new();
        let err = store.apply_manual_edit(&"l1".into(), road()).unwrap_err();
        assert!(matches!(err, PathError::LinkNotFound(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_manual_edit_sets_state() {
        let store = PathStore::new();
        store.ensure_exists("l1".into(), c(0.0, 0.0), c(0.0, 1.0));
        let path = store.apply_manual_edit(&"l1".into(), road()).unwrap();
        assert_eq!(path.state(), PathState::ManuallyEdited);
        assert_eq!(path.distance_meters(), geometry::path_length(&road()));
    }

    #[test]
    fn test_manual_edit_of_fallback_record() {
        let store = PathStore::new();
        let fallback = store
            .upsert_fallback("l1".into(), geometry::straight_line(c(0.0, 0.0), c(0.0, 1.0)))
            .unwrap();
        assert_eq!(fallback.state(), PathState::FallbackStraight);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let edited = store.apply_manual_edit(&"l1".into(), road()).unwrap();
        assert_eq!(edited.state(), PathState::ManuallyEdited);
        assert_eq!(edited.points(), road().as_slice());
        assert!(edited.last_updated() > fallback.last_updated());
        assert_eq!(store.get(&"l1".into()).unwrap(), edited);
    }

    #[test]
    fn test_reset_to_straight_from_any_state() {
        let store = PathStore::new();
        store.ensure_exists("l1".into(), c(0.0, 0.0), c(0.0, 1.0));
        store.apply_manual_edit(&"l1".into(), road()).unwrap();

        let first = store
            .reset_to_straight(&"l1".into(), c(0.0, 0.0), c(0.0, 1.0))
            .unwrap();
        let second = store
            .reset_to_straight(&"l1".into(), c(0.0, 0.0), c(0.0, 1.0))
            .unwrap();
        assert_eq!(first.points(), second.points());
        assert_eq!(first.state(), PathState::FallbackStraight);
        assert_eq!(second.state(), PathState::FallbackStraight);

        assert!(matches!(
            store.reset_to_straight(&"other".into(), c(0.0, 0.0), c(0.0, 1.0)),
            Err(PathError::LinkNotFound(_))
        ));
    }

    #[test]
    fn test_provider_write_preserves_manual_edits() {
        let store = PathStore::new();
        store.ensure_exists("l1".into(), c(0.0, 0.0), c(0.0, 1.0));
        let edited = store.apply_manual_edit(&"l1".into(), road()).unwrap();

        let outcome = store
            .write_provider_result(
                &"l1".into(),
                geometry::straight_line(c(0.0, 0.0), c(0.0, 1.0)),
                PathState::ComputedByProvider,
                WritePolicy::PreserveManualEdits,
            )
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::PreservedManualEdit));
        assert_eq!(store.get(&"l1".into()).unwrap(), edited);

        let outcome = store
            .write_provider_result(
                &"l1".into(),
                geometry::straight_line(c(0.0, 0.0), c(0.0, 1.0)),
                PathState::ComputedByProvider,
                WritePolicy::Overwrite,
            )
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Applied(_)));
        assert_eq!(
            store.get(&"l1".into()).unwrap().state(),
            PathState::ComputedByProvider
        );
    }

    #[test]
    fn test_edit_points_closure_error_keeps_record() {
        let store = PathStore::new();
        let before = store.ensure_exists("l1".into(), c(0.0, 0.0), c(0.0, 1.0));
        let err = store
            .edit_points(&"l1".into(), |_| Err(PathError::LinkNotFound("x".into())))
            .unwrap_err();
        assert!(matches!(err, PathError::LinkNotFound(_)));
        assert_eq!(store.get(&"l1".into()).unwrap(), before);
    }

    #[test]
    fn test_remove_snapshot_and_restore() {
        let store = PathStore::new();
        store.upsert_computed("b".into(), road()).unwrap();
        store.ensure_exists("a".into(), c(1.0, 1.0), c(2.0, 2.0));
        assert_eq!(store.link_ids(), vec![LinkId::from("a"), LinkId::from("b")]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].link_id().as_str(), "a");

        let total = store.total_distance_meters();
        assert!(total > geometry::path_length(&road()));

        assert!(store.remove(&"a".into()).is_some());
        assert!(store.remove(&"a".into()).is_none());
        assert_eq!(store.len(), 1);

        let restored = PathStore::new();
        restored.restore(snapshot.iter().map(|path| (**path).clone()));
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.total_distance_meters(), total);
    }

    #[test]
    fn test_concurrent_writes_do_not_cross_talk() {
        let store = Arc::new(PathStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let lat = i as f64;
                    for _ in 0..100 {
                        store
                            .upsert_computed(
                                LinkId::new(format!("l{i}")),
                                vec![c(lat, 0.0), c(lat, 0.5), c(lat, 1.0)],
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            let path = store.get(&LinkId::new(format!("l{i}"))).unwrap();
            assert!(path.points().iter().all(|p| p.lat() == i as f64));
        }
    }
}
