//! RouteComputationService - batch routing of links against a provider
//!
//! Each link in a batch becomes one task. Tasks run concurrently, bounded by a
//! shared semaphore, and every result is written to the [`PathStore`] on its
//! own. A failing link falls back to a straight line and never disturbs the
//! rest of the batch.

use crate::geometry::{self, Coordinate};
use crate::provider::{ProviderError, RouteProvider};
use crate::store::{WriteOutcome, WritePolicy};
use crate::{LinkId, PathState, PathStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for route computation
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Maximum number of route requests in flight at once, across all batches
    /// of one service. Values below 1 are treated as 1.
    /// Default: 8
    pub max_concurrent_requests: usize,
    /// Time allowed for a single route request once it has a slot.
    /// Default: 8 seconds
    pub request_timeout: Duration,
    /// Provider paths that start or end further than this from the link's
    /// endpoints get the exact endpoint added, so drawn paths always meet
    /// their nodes.
    /// Default: 1 meter
    pub endpoint_tolerance_meters: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 8,
            request_timeout: Duration::from_secs(8),
            endpoint_tolerance_meters: 1.0,
        }
    }
}

/// One link to route: its id and current endpoint coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRequest {
    pub link_id: LinkId,
    pub source: Coordinate,
    pub target: Coordinate,
}

impl LinkRequest {
    pub fn new(link_id: impl Into<LinkId>, source: Coordinate, target: Coordinate) -> Self {
        Self {
            link_id: link_id.into(),
            source,
            target,
        }
    }
}

/// What happened to each link of a batch, in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Links now holding a provider-computed path
    pub succeeded: Vec<LinkId>,
    /// Links the provider could not route; they hold a straight fallback
    pub failed: Vec<LinkId>,
    /// Links left alone because they carry an operator's edit
    pub skipped: Vec<LinkId>,
}

impl BatchOutcome {
    /// Number of links a route was requested for
    #[inline]
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Aggregate, non-fatal warning to show when some links fell back
    pub fn warning(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        Some(format!(
            "{} of {} links could not be routed by road; showing direct lines",
            self.failed.len(),
            self.attempted()
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Handle to a batch running in the background
///
/// Cancelling abandons every link that has not been written yet; those keep
/// whatever record they had before.
#[derive(Debug)]
pub struct BatchHandle {
    handle: JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    /// Abort the batch and all of its in-flight requests
    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch; `None` if it was cancelled
    ///
    /// Must not be awaited again once it has returned.
    pub async fn join(&mut self) -> Option<BatchOutcome> {
        match (&mut self.handle).await {
            Ok(outcome) => Some(outcome),
            Err(err) if err.is_cancelled() => {
                tracing::info!("Route batch cancelled");
                None
            }
            Err(err) => {
                tracing::error!("Route batch task failed: {}", err);
                None
            }
        }
    }
}

/// Computes road-following paths for batches of links
#[derive(Clone)]
pub struct RouteComputationService {
    provider: Arc<dyn RouteProvider>,
    store: Arc<PathStore>,
    config: Config,
    limiter: Arc<Semaphore>,
}

impl std::fmt::Debug for RouteComputationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteComputationService")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RouteComputationService {
    pub fn new(provider: Arc<dyn RouteProvider>, store: Arc<PathStore>, config: Config) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            provider,
            store,
            config,
            limiter,
        }
    }

    #[inline]
    pub fn store(&self) -> &Arc<PathStore> {
        &self.store
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Route every link in `links` and record the results
    ///
    /// A link id listed more than once is routed once, with the endpoints of
    /// its last entry, and reported at the position of its first entry.
    /// Links in `ManuallyEdited` state are skipped unless `force` is set, and
    /// a non-forced result that arrives after an operator edit is dropped.
    /// Dropping the returned future abandons the links still in flight.
    pub async fn compute_batch(&self, links: Vec<LinkRequest>, force: bool) -> BatchOutcome {
        let links = dedup_links(links);
        let policy = if force {
            WritePolicy::Overwrite
        } else {
            WritePolicy::PreserveManualEdits
        };

        let mut outcomes: Vec<Option<LinkOutcome>> = vec![None; links.len()];
        let mut tasks = JoinSet::new();

        for (position, link) in links.iter().enumerate() {
            let current = self
                .store
                .ensure_exists(link.link_id.clone(), link.source, link.target);
            if !force && current.state() == PathState::ManuallyEdited {
                tracing::debug!(link = %link.link_id, "Skipping manually edited link");
                outcomes[position] = Some(LinkOutcome::Skipped);
                continue;
            }

            let provider = Arc::clone(&self.provider);
            let limiter = Arc::clone(&self.limiter);
            let timeout = self.config.request_timeout;
            let link = link.clone();
            tasks.spawn(async move {
                let result = request_route(&*provider, &limiter, &link, timeout).await;
                (position, result)
            });
        }

        tracing::info!(
            links = links.len(),
            requests = tasks.len(),
            force,
            provider = self.provider.name(),
            "Route batch started"
        );

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => {
                    outcomes[position] = Some(self.apply(&links[position], result, policy));
                }
                Err(err) => tracing::error!("Route task failed: {}", err),
            }
        }

        let mut outcome = BatchOutcome::default();
        for (link, link_outcome) in links.iter().zip(outcomes) {
            // A task that died without reporting is a failure for its link only
            let link_outcome = link_outcome.unwrap_or_else(|| {
                self.apply(
                    link,
                    Err(ProviderError::Unavailable("route task aborted".to_string())),
                    policy,
                )
            });
            let bucket = match link_outcome {
                LinkOutcome::Succeeded => &mut outcome.succeeded,
                LinkOutcome::Failed => &mut outcome.failed,
                LinkOutcome::Skipped => &mut outcome.skipped,
            };
            bucket.push(link.link_id.clone());
        }

        tracing::info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            skipped = outcome.skipped.len(),
            "Route batch finished"
        );
        if let Some(warning) = outcome.warning() {
            tracing::warn!("{}", warning);
        }
        outcome
    }

    /// Run [`compute_batch`](Self::compute_batch) as a background task
    pub fn spawn_batch(&self, links: Vec<LinkRequest>, force: bool) -> BatchHandle {
        let service = self.clone();
        BatchHandle {
            handle: tokio::spawn(async move { service.compute_batch(links, force).await }),
        }
    }

    /// Write one link's provider result (or its fallback) to the store
    fn apply(
        &self,
        link: &LinkRequest,
        result: Result<Vec<Coordinate>, ProviderError>,
        policy: WritePolicy,
    ) -> LinkOutcome {
        let (points, state) = match result {
            Ok(points) => (
                anchor_endpoints(
                    points,
                    link.source,
                    link.target,
                    self.config.endpoint_tolerance_meters,
                ),
                PathState::ComputedByProvider,
            ),
            Err(err) => {
                tracing::warn!(
                    link = %link.link_id,
                    provider = self.provider.name(),
                    "Route request failed, using a straight line: {}",
                    err
                );
                (
                    geometry::straight_line(link.source, link.target),
                    PathState::FallbackStraight,
                )
            }
        };

        match self
            .store
            .write_provider_result(&link.link_id, points, state, policy)
        {
            Ok(WriteOutcome::Applied(path)) => {
                tracing::debug!(
                    link = %link.link_id,
                    state = %path.state(),
                    points = path.points().len(),
                    distance_m = path.distance_meters(),
                    "Stored link path"
                );
                if state == PathState::ComputedByProvider {
                    LinkOutcome::Succeeded
                } else {
                    LinkOutcome::Failed
                }
            }
            Ok(WriteOutcome::PreservedManualEdit) => {
                tracing::debug!(link = %link.link_id, "Link was edited meanwhile, keeping the edit");
                LinkOutcome::Skipped
            }
            Err(err) => {
                tracing::warn!(link = %link.link_id, "Could not store link path: {}", err);
                LinkOutcome::Failed
            }
        }
    }
}

/// Collapse repeated link ids, keeping the last request for each
fn dedup_links(links: Vec<LinkRequest>) -> Vec<LinkRequest> {
    let mut positions: HashMap<LinkId, usize> = HashMap::with_capacity(links.len());
    let mut unique: Vec<LinkRequest> = Vec::with_capacity(links.len());
    for link in links {
        match positions.get(&link.link_id) {
            Some(&position) => {
                tracing::warn!(link = %link.link_id, "Link listed twice in one batch, using its last endpoints");
                unique[position] = link;
            }
            None => {
                positions.insert(link.link_id.clone(), unique.len());
                unique.push(link);
            }
        }
    }
    unique
}

/// One rate-limited, time-limited provider call
async fn request_route(
    provider: &dyn RouteProvider,
    limiter: &Semaphore,
    link: &LinkRequest,
    timeout: Duration,
) -> Result<Vec<Coordinate>, ProviderError> {
    let _permit = limiter
        .acquire()
        .await
        .map_err(|_| ProviderError::Unavailable("request limiter closed".to_string()))?;

    let points = tokio::time::timeout(timeout, provider.route(link.source, link.target))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;

    if points.len() < 2 {
        return Err(ProviderError::MalformedResponse(format!(
            "expected at least 2 points, got {}",
            points.len()
        )));
    }
    Ok(points)
}

/// Make sure a provider path starts at `source` and ends at `target`
fn anchor_endpoints(
    mut points: Vec<Coordinate>,
    source: Coordinate,
    target: Coordinate,
    tolerance_meters: f64,
) -> Vec<Coordinate> {
    if let Some(&first) = points.first()
        && geometry::distance(first, source) > tolerance_meters
    {
        points.insert(0, source);
    }
    if let Some(&last) = points.last()
        && geometry::distance(last, target) > tolerance_meters
    {
        points.push(target);
    }
    points
}
