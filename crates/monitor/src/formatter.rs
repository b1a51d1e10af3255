//! One-line renderings of jobs and devices.

use plotty_core::{JobRecord, JobState};

/// Icon shown for states and statuses with no mapping.
pub const UNKNOWN_ICON: &str = "❓";

/// Length of the id prefix shown next to a job name.
const SHORT_ID_LEN: usize = 8;

/// A plotter as listed in the devices section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: String,
    pub status: String,
}

impl DeviceInfo {
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            status: status.into(),
        }
    }

    /// The auto-detected AxiDraw shown when no devices are configured.
    pub fn default_plotter() -> Self {
        Self::new("axidraw:auto", "AxiDraw", "connected")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobFormatter;

impl JobFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn state_icon(state: JobState) -> &'static str {
        match state {
            JobState::New => "🟡",
            JobState::Queued => "🔵",
            JobState::Running => "🟢",
            JobState::Completed => "✅",
            JobState::Failed => "❌",
            JobState::Cancelled => "⏹️",
        }
    }

    pub fn device_icon(status: &str) -> &'static str {
        match status.to_ascii_lowercase().as_str() {
            "connected" => "🟢",
            "disconnected" => "🔴",
            "busy" => "🟡",
            "error" => "❌",
            "offline" => "⚫",
            _ => UNKNOWN_ICON,
        }
    }

    /// `<icon> <name> (<short id>)<progress><timing> - <STATE>`
    ///
    /// Progress appears only when the record carries a numeric
    /// `metadata.progress`; timing is the UTC creation time.
    pub fn format_job_status(&self, record: &JobRecord) -> String {
        let short_id: String = record.id.chars().take(SHORT_ID_LEN).collect();
        let progress = record
            .progress()
            .map(|pct| format!(" ({pct:.1}%)"))
            .unwrap_or_default();
        let timing = format!(" [{}]", record.created_at.format("%H:%M:%S"));

        format!(
            "{} {} ({short_id}){progress}{timing} - {}",
            Self::state_icon(record.state),
            record.name,
            record.state,
        )
    }

    /// `<icon> <name> (<type>) - <status>`
    pub fn format_device_status(&self, device: &DeviceInfo) -> String {
        format!(
            "{} {} ({}) - {}",
            Self::device_icon(&device.status),
            device.name,
            device.device_type,
            device.status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use plotty_core::NewJob;

    fn record(name: &str, state: JobState) -> JobRecord {
        let created = chrono::Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let mut record = JobRecord::from_new_job(&NewJob::new(name), created);
        record.state = state;
        record
    }

    #[test]
    fn job_line_without_progress() {
        let line = JobFormatter::new().format_job_status(&record("demo", JobState::Queued));
        assert_eq!(line, "🔵 demo (demo) [09:26:53] - QUEUED");
    }

    #[test]
    fn job_line_truncates_id_and_shows_progress() {
        let mut rec = record("long-running-job", JobState::Running);
        rec.metadata
            .extra
            .insert("progress".into(), serde_json::json!(42.5));
        let line = JobFormatter::new().format_job_status(&rec);
        assert_eq!(
            line,
            "🟢 long-running-job (long-run) (42.5%) [09:26:53] - RUNNING"
        );
    }

    #[test]
    fn every_state_has_an_icon() {
        let icons: Vec<_> = JobState::ALL.into_iter().map(JobFormatter::state_icon).collect();
        assert_eq!(icons, ["🟡", "🔵", "🟢", "✅", "❌", "⏹️"]);
    }

    #[test]
    fn device_lines() {
        let fmt = JobFormatter::new();
        assert_eq!(
            fmt.format_device_status(&DeviceInfo::default_plotter()),
            "🟢 axidraw:auto (AxiDraw) - connected"
        );
        assert_eq!(
            fmt.format_device_status(&DeviceInfo::new("bench", "iDraw", "offline")),
            "⚫ bench (iDraw) - offline"
        );
        assert_eq!(
            fmt.format_device_status(&DeviceInfo::new("x", "y", "warming up")),
            "❓ x (y) - warming up"
        );
    }
}
