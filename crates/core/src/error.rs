//! Error taxonomy shared by every plotty crate.
//!
//! Low-level failures (I/O, transport) are translated into [`PlotError`]
//! at the boundary where they occur. Every variant can produce a
//! human-readable recovery hint via [`PlotError::recovery_hint`], and the
//! transient kinds ([`PlotError::Connection`], [`PlotError::Timeout`])
//! additionally carry a retry-after hint consumed by
//! [`RetryPolicy`](crate::retry::RetryPolicy).

use std::io;
use std::time::Duration;

/// Retry-after hint attached to connection failures by default.
pub const DEFAULT_CONNECTION_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Timeout reported for OS-level timeouts that do not say how long they waited.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    /// Workspace, job or file missing (or unreadable as a record).
    #[error("{message}")]
    NotFound {
        message: String,
        path: Option<String>,
    },

    /// Unreadable or invalid configuration, or a permission failure.
    #[error("{message}")]
    Config {
        message: String,
        source_name: Option<String>,
    },

    /// Create/queue/load/save/remove failure for a specific job.
    #[error("{message}")]
    Job { message: String, job: String },

    /// Transport-level failure.
    #[error("{message}")]
    Connection {
        message: String,
        retry_after: Duration,
    },

    #[error("{message}")]
    Timeout { message: String, timeout: Duration },

    /// Resource exhaustion.
    #[error("{message}")]
    Resource { message: String, resource: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Convenience alias used throughout the workspace.
pub type PlotResult<T> = Result<T, PlotError>;

impl PlotError {
    pub fn not_found(message: impl Into<String>, path: Option<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            path,
        }
    }

    pub fn config(message: impl Into<String>, source_name: Option<String>) -> Self {
        Self::Config {
            message: message.into(),
            source_name,
        }
    }

    pub fn job(message: impl Into<String>, job: impl Into<String>) -> Self {
        Self::Job {
            message: message.into(),
            job: job.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            retry_after: DEFAULT_CONNECTION_RETRY_AFTER,
        }
    }

    pub fn timeout(message: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout,
        }
    }

    pub fn resource(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
            resource: resource.into(),
        }
    }

    /// Human-readable next step for the user.
    pub fn recovery_hint(&self) -> String {
        match self {
            Self::NotFound { path: Some(p), .. } => format!("Check that {p} exists"),
            Self::NotFound { path: None, .. } => "Verify the workspace path".to_string(),
            Self::Config {
                source_name: Some(s),
                ..
            } => format!("Check configuration: {s}"),
            Self::Config {
                source_name: None, ..
            } => "Verify configuration".to_string(),
            Self::Job { job, .. } => format!("Check job status with: plotty-status {job}"),
            Self::Connection { .. } => {
                "Check the status service is running and accessible".to_string()
            }
            Self::Timeout { .. } => "Increase timeout or check service performance".to_string(),
            Self::Resource { resource, .. } => {
                format!("Free up {resource} resources or wait for availability")
            }
            Self::Unexpected(_) => "Check the logs for details".to_string(),
        }
    }

    /// Minimum delay before the operation is worth re-attempting.
    ///
    /// Only the transient kinds carry one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Connection { retry_after, .. } => Some(*retry_after),
            Self::Timeout { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }

    /// Whether the retry wrapper may re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Translate an I/O error observed while touching `path`.
    pub fn from_io(err: io::Error, path: Option<&std::path::Path>) -> Self {
        let path = path.map(|p| p.display().to_string());
        match err.kind() {
            io::ErrorKind::NotFound => {
                Self::not_found(format!("Required file or directory not found: {err}"), path)
            }
            io::ErrorKind::PermissionDenied => Self::config(
                format!("Permission denied accessing workspace resources: {err}"),
                path,
            ),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::connection(format!("Failed to connect: {err}")),
            io::ErrorKind::TimedOut => {
                Self::timeout(format!("Operation timed out: {err}"), DEFAULT_IO_TIMEOUT)
            }
            io::ErrorKind::OutOfMemory => Self::resource(format!("Out of memory: {err}"), "memory"),
            io::ErrorKind::StorageFull => Self::resource(format!("Storage full: {err}"), "disk"),
            _ => Self::Unexpected(err.to_string()),
        }
    }
}

impl From<io::Error> for PlotError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn io_not_found_maps_to_not_found_with_path() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let mapped = PlotError::from_io(err, Some(std::path::Path::new("/ws/jobs")));
        assert_matches!(mapped, PlotError::NotFound { path: Some(ref p), .. } if p == "/ws/jobs");
        assert_eq!(mapped.recovery_hint(), "Check that /ws/jobs exists");
    }

    #[test]
    fn io_permission_denied_maps_to_config() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_matches!(PlotError::from(err), PlotError::Config { .. });
    }

    #[test]
    fn io_connection_refused_is_transient() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let mapped = PlotError::from(err);
        assert!(mapped.is_transient());
        assert_eq!(mapped.retry_after(), Some(DEFAULT_CONNECTION_RETRY_AFTER));
    }

    #[test]
    fn io_timeout_carries_duration_as_retry_hint() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let mapped = PlotError::from(err);
        assert_matches!(mapped, PlotError::Timeout { .. });
        assert_eq!(mapped.retry_after(), Some(DEFAULT_IO_TIMEOUT));
    }

    #[test]
    fn io_other_maps_to_unexpected() {
        let err = io::Error::new(io::ErrorKind::Other, "weird");
        assert_matches!(PlotError::from(err), PlotError::Unexpected(_));
    }

    #[test]
    fn job_error_hint_names_the_job() {
        let err = PlotError::job("Failed to queue job 'demo'", "demo");
        assert_eq!(err.recovery_hint(), "Check job status with: plotty-status demo");
        assert!(!err.is_transient());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn resource_hint_names_the_resource() {
        let err = PlotError::resource("no space", "disk");
        assert_eq!(
            err.recovery_hint(),
            "Free up disk resources or wait for availability"
        );
    }
}
