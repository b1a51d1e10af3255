//! Polling monitor over a job store.
//!
//! Each [`Monitor::update_display`] lists the store, renders one frame and
//! compares every job's state with the previous poll. Jobs that vanished
//! since the last poll are reported once and forgotten.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use plotty_core::{JobRecord, JobState, PlotError, PlotResult};
use plotty_store::JobStore;
use tokio_util::sync::CancellationToken;

use crate::formatter::{DeviceInfo, JobFormatter};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const HEADER_RULE_WIDTH: usize = 60;
const SNAPSHOT_RULE_WIDTH: usize = 40;

/// ANSI "clear screen, cursor home".
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Clamp a poll interval into the supported range.
pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Poll interval from a seconds value, clamped. NaN yields the default.
pub fn poll_interval_from_secs(secs: f64) -> Duration {
    if secs.is_nan() {
        return DEFAULT_POLL_INTERVAL;
    }
    let clamped = secs.clamp(MIN_POLL_INTERVAL.as_secs_f64(), MAX_POLL_INTERVAL.as_secs_f64());
    Duration::from_secs_f64(clamped)
}

/// Named poll rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedPreset {
    /// 100 ms, for watching a plot in progress.
    Fast,
    /// 5 s, for casual use.
    Slow,
}

impl SpeedPreset {
    pub fn interval(self) -> Duration {
        match self {
            SpeedPreset::Fast => Duration::from_millis(100),
            SpeedPreset::Slow => Duration::from_secs(5),
        }
    }
}

impl FromStr for SpeedPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(SpeedPreset::Fast),
            "slow" => Ok(SpeedPreset::Slow),
            other => Err(format!("Unknown speed preset '{other}' (expected fast or slow)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub job_id: String,
    pub from: JobState,
    pub to: JobState,
}

/// A job seen in an earlier poll and absent from the latest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub job_id: String,
    pub last_state: JobState,
}

/// What one [`Monitor::update_display`] call observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySummary {
    pub job_count: usize,
    pub transitions: Vec<StateTransition>,
    pub removed: Vec<Removal>,
    /// Set when the store could not be listed; the frame shows it inline.
    pub error: Option<String>,
}

pub struct Monitor<W: Write> {
    store: JobStore,
    formatter: JobFormatter,
    devices: Vec<DeviceInfo>,
    poll_interval: Duration,
    clear_screen: bool,
    out: W,
    last_job_states: HashMap<String, JobState>,
}

impl<W: Write> Monitor<W> {
    pub fn new(store: JobStore, out: W) -> Self {
        Self {
            store,
            formatter: JobFormatter::new(),
            devices: vec![DeviceInfo::default_plotter()],
            poll_interval: DEFAULT_POLL_INTERVAL,
            clear_screen: true,
            out,
            last_job_states: HashMap::new(),
        }
    }

    /// Set the poll interval, clamped to 100 ms ..= 10 s.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_poll_interval(interval);
        self
    }

    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_formatter(mut self, formatter: JobFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// State of every job as of the last poll, keyed by job id.
    pub fn last_job_states(&self) -> &HashMap<String, JobState> {
        &self.last_job_states
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    /// Print a snapshot header followed by exactly one frame.
    pub fn static_snapshot(&mut self) -> PlotResult<DisplaySummary> {
        let header = format!("📊 Job Status\n{}\n", "=".repeat(SNAPSHOT_RULE_WIDTH));
        self.emit(&header)?;
        self.update_display()
    }

    /// Render one frame and record the observed job states.
    ///
    /// Failing to list the store is shown inline and reported in the
    /// summary. Only failing to write the frame is an `Err`.
    pub fn update_display(&mut self) -> PlotResult<DisplaySummary> {
        let mut lines = Vec::new();
        let mut summary = DisplaySummary::default();

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        lines.push(format!(
            "🔍 Plot Monitor - {now} (updates every {:.1}s)",
            self.poll_interval.as_secs_f64()
        ));
        lines.push("=".repeat(HEADER_RULE_WIDTH));

        match self.store.list(None, None) {
            Ok(jobs) => {
                self.render_jobs(&jobs, &mut lines, &mut summary);
                self.render_footer(jobs.len(), &mut lines);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list jobs");
                lines.push(String::new());
                lines.push(format!("❌ Error updating display: {e}"));
                summary.error = Some(e.to_string());
            }
        }

        let mut frame = String::new();
        if self.clear_screen {
            frame.push_str(CLEAR_SCREEN);
        }
        frame.push_str(&lines.join("\n"));
        frame.push('\n');
        self.emit(&frame)?;

        Ok(summary)
    }

    fn render_jobs(
        &mut self,
        jobs: &[JobRecord],
        lines: &mut Vec<String>,
        summary: &mut DisplaySummary,
    ) {
        summary.job_count = jobs.len();
        lines.push(String::new());

        if jobs.is_empty() {
            lines.push("📋 No jobs found".to_string());
        } else {
            lines.push("📋 Jobs:".to_string());
        }

        let mut seen = HashSet::with_capacity(jobs.len());
        for job in jobs {
            lines.push(format!("  {}", self.formatter.format_job_status(job)));

            if let Some(&old) = self.last_job_states.get(&job.id) {
                if old != job.state {
                    lines.push(format!("    🔄 State changed: {old} → {}", job.state));
                    tracing::info!(job = %job.id, from = %old, to = %job.state, "State change detected");
                    summary.transitions.push(StateTransition {
                        job_id: job.id.clone(),
                        from: old,
                        to: job.state,
                    });
                }
            }

            self.last_job_states.insert(job.id.clone(), job.state);
            seen.insert(job.id.as_str());
        }

        let mut gone: Vec<Removal> = self
            .last_job_states
            .iter()
            .filter(|(id, _)| !seen.contains(id.as_str()))
            .map(|(id, &state)| Removal {
                job_id: id.clone(),
                last_state: state,
            })
            .collect();
        gone.sort_by(|a, b| a.job_id.cmp(&b.job_id));

        for removal in &gone {
            lines.push(format!(
                "  🗑 Job {} removed (last state: {})",
                removal.job_id, removal.last_state
            ));
            self.last_job_states.remove(&removal.job_id);
        }
        summary.removed = gone;
    }

    fn render_footer(&self, total: usize, lines: &mut Vec<String>) {
        lines.push(String::new());
        lines.push("🖊️  Devices:".to_string());
        for device in &self.devices {
            lines.push(format!("  {}", self.formatter.format_device_status(device)));
        }

        lines.push(String::new());
        lines.push(format!(
            "ℹ️  Workspace: {}",
            self.store.workspace().root().display()
        ));
        lines.push(format!("📊 Total jobs: {total}"));
    }

    /// Poll until `cancel` fires.
    ///
    /// Cancellation is checked between frames and while sleeping; a frame
    /// in progress always completes. A failed frame is reported and the
    /// next poll still runs.
    pub async fn start_monitoring(&mut self, cancel: CancellationToken) -> PlotResult<()> {
        let banner = format!(
            "🚀 Starting monitor (polling every {:.1}s)\n   Press Ctrl+C to stop monitoring\n\n",
            self.poll_interval.as_secs_f64()
        );
        self.emit(&banner)?;
        tracing::info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            workspace = %self.store.workspace().root().display(),
            "Monitor started",
        );

        while !cancel.is_cancelled() {
            if let Err(e) = self.update_display() {
                tracing::warn!(error = %e, "Monitor iteration failed");
                if let Err(e) = self.emit(&format!("❌ Monitor error: {e}\n")) {
                    tracing::debug!(error = %e, "Could not report monitor error");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.emit("\n\n👋 Monitor stopped by user\n")?;
        tracing::info!("Monitor stopped");
        Ok(())
    }

    fn emit(&mut self, text: &str) -> PlotResult<()> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(PlotError::from)
    }
}
