//! Workspace discovery and on-disk layout.
//!
//! ```text
//! <root>/
//!   jobs/<name>/job.json     record
//!   jobs/<name>/src.svg      rendered artifact
//!   queue/<name>.notify      latest notification
//! ```

use std::path::{Path, PathBuf};

use plotty_core::{PlotError, PlotResult};

/// Directory name probed in the current directory and in `$HOME`.
pub const DEFAULT_WORKSPACE_DIR: &str = "plotty-workspace";

pub const JOBS_DIR: &str = "jobs";
pub const QUEUE_DIR: &str = "queue";
pub const JOB_FILE: &str = "job.json";
pub const ARTIFACT_FILE: &str = "src.svg";
pub const NOTIFY_EXTENSION: &str = "notify";

/// Longest accepted job name.
const MAX_NAME_LEN: usize = 128;

/// Allowed job name characters: alphanumeric, hyphen, underscore, dot.
/// Job names become directory names, so separators and `..` are refused.
pub fn is_safe_job_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Reject names that cannot safely become a record directory.
pub fn validate_job_name(name: &str) -> PlotResult<()> {
    if is_safe_job_name(name) {
        Ok(())
    } else {
        Err(PlotError::job(
            format!(
                "Invalid job name '{name}': use 1-{MAX_NAME_LEN} letters, digits, '-', '_' or '.'"
            ),
            name,
        ))
    }
}

/// A resolved workspace root with its directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Use `root` as the workspace, creating `jobs/` and `queue/` if needed.
    pub fn open(root: impl Into<PathBuf>) -> PlotResult<Self> {
        let ws = Self { root: root.into() };
        for dir in [ws.jobs_dir(), ws.queue_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| PlotError::from_io(e, Some(&dir)))?;
        }
        Ok(ws)
    }

    /// Resolve the workspace root and open it.
    ///
    /// An explicit path is used as-is (created if missing). Otherwise the
    /// first existing directory of `./plotty-workspace` and
    /// `$HOME/plotty-workspace` wins, and when neither exists the home
    /// candidate is created.
    pub fn discover(explicit: Option<&Path>) -> PlotResult<Self> {
        if let Some(path) = explicit {
            return Self::open(path);
        }

        let home = std::env::var_os("HOME").map(PathBuf::from);
        let candidates = discovery_candidates(std::env::current_dir().ok(), home.clone());

        if let Some(found) = candidates.into_iter().find(|c| c.is_dir()) {
            tracing::debug!(root = %found.display(), "Using existing workspace");
            return Self::open(found);
        }

        let Some(default) = home.map(|h| h.join(DEFAULT_WORKSPACE_DIR)) else {
            return Err(PlotError::not_found(
                "Workspace not found and $HOME is not set",
                None,
            ));
        };

        tracing::info!(root = %default.display(), "Creating workspace");
        Self::open(&default).map_err(|e| {
            PlotError::not_found(
                format!(
                    "Workspace not found and could not create default at {}: {e}",
                    default.display()
                ),
                Some(default.display().to_string()),
            )
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.root.join(QUEUE_DIR)
    }

    /// The record unit for one job.
    pub fn job_dir(&self, name: &str) -> PathBuf {
        self.jobs_dir().join(name)
    }

    pub fn job_file(&self, name: &str) -> PathBuf {
        self.job_dir(name).join(JOB_FILE)
    }

    pub fn artifact_file(&self, name: &str) -> PathBuf {
        self.job_dir(name).join(ARTIFACT_FILE)
    }

    pub fn notify_file(&self, name: &str) -> PathBuf {
        self.queue_dir().join(format!("{name}.{NOTIFY_EXTENSION}"))
    }
}

fn discovery_candidates(cwd: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
    [
        cwd.map(|d| d.join(DEFAULT_WORKSPACE_DIR)),
        home.map(|d| d.join(DEFAULT_WORKSPACE_DIR)),
    ]
    .into_iter()
    .flatten()
    .collect()
}
