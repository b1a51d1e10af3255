//! Aggregated state built from pushed status messages.

use std::collections::{BTreeMap, VecDeque};

use plotty_core::JobState;
use plotty_live::messages::{DeviceStatus, JobProgress, SystemAlert};
use plotty_live::ServerMessage;

use crate::formatter::{DeviceInfo, JobFormatter, UNKNOWN_ICON};

/// Alerts retained for display.
pub const MAX_ALERTS: usize = 5;

const HEADER_RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct LiveView {
    formatter: JobFormatter,
    connected: bool,
    jobs: BTreeMap<String, JobState>,
    progress: BTreeMap<String, JobProgress>,
    devices: BTreeMap<String, DeviceStatus>,
    alerts: VecDeque<SystemAlert>,
    last_error: Option<String>,
}

impl LiveView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        self.jobs.get(job_id).copied()
    }

    pub fn progress(&self, job_id: &str) -> Option<&JobProgress> {
        self.progress.get(job_id)
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceStatus> {
        self.devices.get(device_id)
    }

    /// Oldest first.
    pub fn alerts(&self) -> impl Iterator<Item = &SystemAlert> {
        self.alerts.iter()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a connection-level failure reported outside the message stream.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::JobStateChange(change) => {
                self.jobs.insert(change.job_id.clone(), change.to_state);
                if change.to_state.is_terminal() {
                    self.progress.remove(&change.job_id);
                }
            }
            ServerMessage::JobProgress(progress) => {
                self.progress.insert(progress.job_id.clone(), progress.clone());
            }
            ServerMessage::DeviceStatus(device) => {
                self.devices.insert(device.device_id.clone(), device.clone());
            }
            ServerMessage::SystemAlert(alert) => {
                if self.alerts.len() == MAX_ALERTS {
                    self.alerts.pop_front();
                }
                self.alerts.push_back(alert.clone());
            }
            ServerMessage::Error(err) => {
                self.last_error = Some(err.message.clone());
            }
            ServerMessage::Pong(_) => {}
        }
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        let status = if self.connected { "Connected" } else { "Disconnected" };
        lines.push(format!("📡 Live Monitor - {status}"));
        lines.push("=".repeat(HEADER_RULE_WIDTH));

        lines.push(String::new());
        let mut job_ids: Vec<&String> = self.jobs.keys().chain(self.progress.keys()).collect();
        job_ids.sort();
        job_ids.dedup();
        if job_ids.is_empty() {
            lines.push("📋 No jobs found".to_string());
        } else {
            lines.push("📋 Jobs:".to_string());
            for id in job_ids {
                lines.push(format!("  {}", self.job_line(id)));
            }
        }

        lines.push(String::new());
        lines.push("🖊️  Devices:".to_string());
        if self.devices.is_empty() {
            lines.push("  No devices reported".to_string());
        }
        for device in self.devices.values() {
            let info = DeviceInfo::new(&device.device_id, &device.device_type, &device.status);
            let mut line = self.formatter.format_device_status(&info);
            if device.error_count > 0 {
                line.push_str(&format!(" [{} errors]", device.error_count));
            }
            lines.push(format!("  {line}"));
        }

        lines.push(String::new());
        lines.push("⚠️  System Alerts:".to_string());
        if self.alerts.is_empty() {
            lines.push("  No system alerts".to_string());
        }
        for alert in &self.alerts {
            lines.push(format!(
                "  • [{}] {}: {}",
                alert.severity.as_str(),
                alert.title,
                alert.message
            ));
        }

        if let Some(err) = &self.last_error {
            lines.push(String::new());
            lines.push(format!("❌ Last error: {err}"));
        }

        lines.join("\n")
    }

    fn job_line(&self, job_id: &str) -> String {
        let state = self.jobs.get(job_id).copied();
        let icon = state.map_or(UNKNOWN_ICON, JobFormatter::state_icon);
        let state_label = state.map_or("UNKNOWN", JobState::as_str);

        let mut progress = String::new();
        if let Some(p) = self.progress.get(job_id) {
            progress.push_str(&format!(" ({:.1}%)", p.progress_percentage));
            if let (Some(layer), Some(total)) = (p.current_layer, p.total_layers) {
                progress.push_str(&format!(" [layer {layer}/{total}]"));
            }
            if let Some(eta) = p.eta_seconds {
                progress.push_str(&format!(" ETA {}", format_seconds(eta)));
            }
        }

        format!("{icon} {job_id}{progress} - {state_label}")
    }
}

/// `MM:SS`, or `H:MM:SS` past the hour.
fn format_seconds(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotty_live::parse_server_message;

    fn feed(view: &mut LiveView, json: &str) {
        view.apply(&parse_server_message(json).unwrap());
    }

    #[test]
    fn empty_view_renders_placeholders() {
        let text = LiveView::new().render();
        assert!(text.contains("📡 Live Monitor - Disconnected"));
        assert!(text.contains("📋 No jobs found"));
        assert!(text.contains("No devices reported"));
        assert!(text.contains("No system alerts"));
    }

    #[test]
    fn state_changes_and_progress_are_merged() {
        let mut view = LiveView::new();
        view.set_connected(true);
        feed(
            &mut view,
            r#"{"type":"job_state_change","job_id":"demo","from_state":"QUEUED","to_state":"RUNNING"}"#,
        );
        feed(
            &mut view,
            r#"{"type":"job_progress","job_id":"demo","progress_percentage":25.0,
                "current_layer":1,"total_layers":4,"eta_seconds":125}"#,
        );

        assert_eq!(view.job_state("demo"), Some(JobState::Running));
        let text = view.render();
        assert!(text.contains("📡 Live Monitor - Connected"), "{text}");
        assert!(
            text.contains("🟢 demo (25.0%) [layer 1/4] ETA 02:05 - RUNNING"),
            "{text}"
        );
    }

    #[test]
    fn terminal_state_clears_progress() {
        let mut view = LiveView::new();
        feed(
            &mut view,
            r#"{"type":"job_progress","job_id":"demo","progress_percentage":99.0}"#,
        );
        feed(
            &mut view,
            r#"{"type":"job_state_change","job_id":"demo","from_state":"RUNNING","to_state":"COMPLETED"}"#,
        );
        assert!(view.progress("demo").is_none());
        assert!(view.render().contains("✅ demo - COMPLETED"));
    }

    #[test]
    fn progress_without_state_is_unknown() {
        let mut view = LiveView::new();
        feed(
            &mut view,
            r#"{"type":"job_progress","job_id":"orphan","progress_percentage":10.0}"#,
        );
        assert!(view.render().contains("❓ orphan (10.0%) - UNKNOWN"));
    }

    #[test]
    fn devices_are_keyed_by_id() {
        let mut view = LiveView::new();
        feed(
            &mut view,
            r#"{"type":"device_status","device_id":"axidraw:1","device_type":"AxiDraw","status":"busy"}"#,
        );
        feed(
            &mut view,
            r#"{"type":"device_status","device_id":"axidraw:1","device_type":"AxiDraw","status":"error","error_count":2}"#,
        );
        assert_eq!(view.device("axidraw:1").unwrap().status, "error");
        assert!(view
            .render()
            .contains("❌ axidraw:1 (AxiDraw) - error [2 errors]"));
    }

    #[test]
    fn only_last_five_alerts_are_kept() {
        let mut view = LiveView::new();
        for i in 0..7 {
            feed(
                &mut view,
                &format!(
                    r#"{{"type":"system_alert","severity":"warning","title":"A{i}","message":"m{i}"}}"#
                ),
            );
        }
        let titles: Vec<_> = view.alerts().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["A2", "A3", "A4", "A5", "A6"]);
        assert!(view.render().contains("• [warning] A6: m6"));
    }

    #[test]
    fn error_message_is_remembered() {
        let mut view = LiveView::new();
        feed(&mut view, r#"{"type":"error","message":"queue offline"}"#);
        feed(&mut view, r#"{"type":"pong"}"#);
        assert_eq!(view.last_error(), Some("queue offline"));
        assert!(view.render().contains("❌ Last error: queue offline"));
    }

    #[test]
    fn seconds_formatting() {
        assert_eq!(format_seconds(59.4), "00:59");
        assert_eq!(format_seconds(3725.0), "1:02:05");
        assert_eq!(format_seconds(-5.0), "00:00");
    }
}
