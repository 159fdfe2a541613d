//! Command execution: load state, run one subcommand, persist state.

use crate::settings::{Command, Settings};
use crate::storage::{self, SnapshotFile, StorageError};
use link_path_lib::{
    BatchOutcome, Coordinate, LinkId, LinkPath, LinkRequest, OsrmProvider, PathEditor, PathError,
    PathStore, ProviderError, RouteComputationService, RouteProvider, write_gpx,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Run the parsed command against the configured OSRM server, printing to stdout
pub async fn run(settings: &Settings) -> AppResult<()> {
    let provider = OsrmProvider::new(settings.osrm_config())?;
    tracing::debug!(
        "Routing via {} (profile {})",
        settings.osrm_url,
        settings.profile
    );
    execute(settings, Arc::new(provider), &mut std::io::stdout()).await
}

/// Run the parsed command with an explicit provider and output sink
pub async fn execute<W: Write>(
    settings: &Settings,
    provider: Arc<dyn RouteProvider>,
    out: &mut W,
) -> AppResult<()> {
    let topology = storage::load_topology(&settings.topology)?;
    let snapshot = SnapshotFile::new(&settings.snapshot);
    let store = Arc::new(PathStore::new());
    store.restore(snapshot.load()?);
    let editor = PathEditor::new(Arc::clone(&store));

    let mutated = match &settings.command {
        Command::Compute { links, force } => {
            let requests = if links.is_empty() {
                topology.link_requests()?
            } else {
                links
                    .iter()
                    .map(|id| topology.link_request(&LinkId::from(id.as_str())))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let service = RouteComputationService::new(
                provider,
                Arc::clone(&store),
                settings.compute_config(),
            );
            match compute_interruptible(&service, requests, *force).await {
                Some(outcome) => report_outcome(out, &outcome)?,
                None => writeln!(out, "Cancelled; links finished so far were kept")?,
            }
            true
        }
        Command::InsertPoint { link, lat, lon } => {
            let path = editor.insert_point(&LinkId::from(link.as_str()), Coordinate::new(*lat, *lon)?)?;
            describe(out, &path)?;
            true
        }
        Command::MovePoint {
            link,
            index,
            lat,
            lon,
        } => {
            let path = editor.move_point(
                &LinkId::from(link.as_str()),
                *index,
                Coordinate::new(*lat, *lon)?,
            )?;
            describe(out, &path)?;
            true
        }
        Command::RemovePoint { link, index } => {
            let path = editor.remove_point(&LinkId::from(link.as_str()), *index)?;
            describe(out, &path)?;
            true
        }
        Command::Reset { link } => {
            let request = topology.link_request(&LinkId::from(link.as_str()))?;
            store.ensure_exists(request.link_id.clone(), request.source, request.target);
            let path = editor.reset_to_straight(&request.link_id, request.source, request.target)?;
            describe(out, &path)?;
            true
        }
        Command::Show { links } => {
            let records = if links.is_empty() {
                store.snapshot()
            } else {
                links
                    .iter()
                    .map(|id| store.get(&LinkId::from(id.as_str())))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let records: Vec<&LinkPath> = records.iter().map(|path| &**path).collect();
            serde_json::to_writer_pretty(&mut *out, &records)?;
            writeln!(out)?;
            false
        }
    };

    if mutated {
        snapshot.save(store.snapshot().iter().map(|path| &**path))?;
    }

    if let Some(gpx_path) = &settings.gpx_out {
        let file = File::create(gpx_path)?;
        write_gpx(store.snapshot().iter().map(|path| &**path), BufWriter::new(file))?;
        tracing::info!("Wrote {} link paths to {}", store.len(), gpx_path.display());
    }

    Ok(())
}

/// Run a batch in the background, cancelling it on Ctrl-C
async fn compute_interruptible(
    service: &RouteComputationService,
    requests: Vec<LinkRequest>,
    force: bool,
) -> Option<BatchOutcome> {
    let mut handle = service.spawn_batch(requests, force);
    let interrupt = tokio::select! {
        outcome = handle.join() => return outcome,
        signal = tokio::signal::ctrl_c() => signal,
    };

    match interrupt {
        Ok(()) => {
            tracing::warn!("Interrupted, cancelling route batch");
            handle.cancel();
        }
        Err(e) => tracing::warn!("Unable to listen for Ctrl-C: {}", e),
    }
    handle.join().await
}

fn report_outcome<W: Write>(out: &mut W, outcome: &BatchOutcome) -> std::io::Result<()> {
    writeln!(
        out,
        "Computed {} links, {} fell back to straight lines, {} kept manual edits",
        outcome.succeeded.len(),
        outcome.failed.len(),
        outcome.skipped.len()
    )?;
    if let Some(warning) = outcome.warning() {
        writeln!(out, "Warning: {warning}")?;
        for link_id in &outcome.failed {
            writeln!(out, "  {link_id}")?;
        }
    }
    Ok(())
}

fn describe<W: Write>(out: &mut W, path: &LinkPath) -> std::io::Result<()> {
    writeln!(
        out,
        "{}: {} points, {:.0} m, {}",
        path.link_id(),
        path.points().len(),
        path.distance_meters(),
        path.state()
    )
}
