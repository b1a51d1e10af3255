//! "A job changed" marker written after every store mutation.
//!
//! Notifications are hints for pollers, not a delivery guarantee: each job
//! keeps only its latest one and nothing acknowledges them.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::job::JobRecord;
use crate::state::JobState;
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    Create,
    Update,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Job name (the key of its record unit).
    pub job: String,
    pub state: JobState,
    pub timestamp: Timestamp,
    pub action: NotifyAction,
}

impl Notification {
    pub fn for_record(name: &str, record: &JobRecord, action: NotifyAction) -> Self {
        Self {
            job: name.to_string(),
            state: record.state,
            timestamp: Utc::now(),
            action,
        }
    }
}
