use clap::{Parser, Subcommand};
use link_path_lib::{Config, OsrmConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Link Path - compute, cache and hand-edit road-following paths for network links
pub struct Settings {
    /// Topology JSON file with node positions and links
    #[clap(short, long, value_name = "FILE")]
    pub topology: PathBuf,

    /// Snapshot JSON file holding the stored link paths (created if missing)
    #[clap(short, long, value_name = "FILE", default_value = "link-paths.json")]
    pub snapshot: PathBuf,

    /// Base URL of the OSRM routing server
    #[clap(long, default_value = "https://router.project-osrm.org")]
    pub osrm_url: String,

    /// OSRM routing profile
    #[clap(long, default_value = "driving")]
    pub profile: String,

    /// Maximum number of route requests in flight at once
    #[clap(long, default_value = "8")]
    pub concurrency: usize,

    /// Per-request timeout in seconds (at least 1)
    #[clap(long, default_value = "8")]
    pub timeout_secs: u64,

    /// Also write the stored paths to this GPX file after the command
    #[clap(long, value_name = "FILE")]
    pub gpx_out: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Compute road-following paths (all topology links when none are given)
    Compute {
        /// Link ids to compute
        links: Vec<String>,

        /// Recompute links that carry manual edits too
        #[clap(long, default_value = "false")]
        force: bool,
    },

    /// Insert a vertex into the nearest segment of a link's path
    InsertPoint {
        link: String,
        #[clap(allow_negative_numbers = true)]
        lat: f64,
        #[clap(allow_negative_numbers = true)]
        lon: f64,
    },

    /// Move an interior vertex of a link's path
    MovePoint {
        link: String,
        index: usize,
        #[clap(allow_negative_numbers = true)]
        lat: f64,
        #[clap(allow_negative_numbers = true)]
        lon: f64,
    },

    /// Remove an interior vertex of a link's path
    RemovePoint { link: String, index: usize },

    /// Discard edits and draw a link as a straight line again
    Reset { link: String },

    /// Print stored paths as JSON (all when none are given)
    Show { links: Vec<String> },
}

impl Settings {
    /// Parse the command line, exiting with clap's message on bad arguments
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Per-request timeout, at least one second
    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn compute_config(&self) -> Config {
        Config {
            max_concurrent_requests: self.concurrency.max(1),
            request_timeout: self.request_timeout(),
            ..Config::default()
        }
    }

    pub fn osrm_config(&self) -> OsrmConfig {
        OsrmConfig {
            base_url: self.osrm_url.clone(),
            profile: self.profile.clone(),
            timeout: self.request_timeout(),
        }
    }
}
