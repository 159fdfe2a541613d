//! File persistence for the CLI.
//!
//! - The topology is a read-only JSON document of node positions and links.
//! - The snapshot is a JSON array of link path records. It is loaded before
//!   each command and written back after every mutating one, so manual edits
//!   survive between invocations.

use link_path_lib::{LinkPath, Topology};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let s = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&s)
        .map_err(|e| StorageError::Json(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the topology document
pub fn load_topology(path: &Path) -> StorageResult<Topology> {
    let topology: Topology = read_json(path)?;
    tracing::debug!(
        "Loaded topology from {}: {} nodes, {} links",
        path.display(),
        topology.nodes.len(),
        topology.links.len()
    );
    Ok(topology)
}

/// JSON file holding every stored link path
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read all records; a missing or blank file is an empty snapshot
    pub fn load(&self) -> StorageResult<Vec<LinkPath>> {
        if !self.path.exists() {
            tracing::debug!("No snapshot at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path).map_err(|e| {
            StorageError::Io(format!("Failed to read snapshot {}: {}", self.path.display(), e))
        })?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&s).map_err(|e| {
            StorageError::Json(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Replace the file with `paths`
    ///
    /// Writes a sibling temporary file first and renames it into place, so a
    /// crash mid-write leaves the previous snapshot intact.
    pub fn save<'a, I>(&self, paths: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = &'a LinkPath>,
    {
        let records: Vec<&LinkPath> = paths.into_iter().collect();
        write_json_atomic(&self.path, &records)?;
        tracing::debug!(
            "Saved {} link paths to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            StorageError::Io(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }

    let s = serde_json::to_string_pretty(value).map_err(|e| StorageError::Json(e.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, s)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_path_lib::{Coordinate, PathState};

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("paths.json"));
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested").join("paths.json"));

        let edited = LinkPath::new(
            "l1".into(),
            vec![c(0.0, 0.0), c(0.5, 0.5), c(0.0, 1.0)],
            PathState::ManuallyEdited,
        )
        .unwrap();
        let straight =
            LinkPath::straight("l2".into(), c(1.0, 1.0), c(2.0, 2.0), PathState::FallbackStraight);

        file.save([&edited, &straight]).unwrap();
        let loaded = file.load().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].points(), edited.points());
        assert_eq!(loaded[0].state(), PathState::ManuallyEdited);
        assert_eq!(loaded[0].distance_meters(), edited.distance_meters());
        assert_eq!(loaded[1].state(), PathState::FallbackStraight);
        assert!(!dir.path().join("nested").join("paths.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paths.json");
        fs::write(&path, "[{\"link_id\": 3").unwrap();
        assert!(matches!(
            SnapshotFile::new(&path).load(),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn test_degenerate_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paths.json");
        fs::write(
            &path,
            r#"[{"link_id":"l1","points":[{"lat":0.0,"lon":0.0}],"state":"ManuallyEdited","last_updated":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        assert!(matches!(
            SnapshotFile::new(&path).load(),
            Err(StorageError::Json(msg)) if msg.contains("Degenerate")
        ));
    }

    #[test]
    fn test_load_topology() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        fs::write(
            &path,
            r#"{
                "nodes": {"a": {"lat": 40.0, "lon": -3.0}, "b": {"lat": 41.0, "lon": -3.5}},
                "links": [{"link_id": "a-b", "source": "a", "target": "b"}]
            }"#,
        )
        .unwrap();
        let topology = load_topology(&path).unwrap();
        let requests = topology.link_requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, c(41.0, -3.5));
    }
}
