//! Job status display for plotty workspaces.
//!
//! Two alternative modes share one [`JobFormatter`]:
//!
//! - [`Monitor`] polls a [`JobStore`](plotty_store::JobStore), diffs
//!   successive snapshots and reports state transitions.
//! - [`LiveView`] aggregates messages pushed by the status service through
//!   a [`LiveClient`](plotty_live::LiveClient).

pub mod config;
pub mod formatter;
pub mod live_view;
pub mod monitor;

pub use config::MonitorConfig;
pub use formatter::{DeviceInfo, JobFormatter};
pub use live_view::LiveView;
pub use monitor::{DisplaySummary, Monitor, Removal, SpeedPreset, StateTransition};
