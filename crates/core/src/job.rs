//! The persisted job record and the request used to create one.

use serde::{Deserialize, Serialize};

use crate::state::JobState;
use crate::types::{PenMapping, Timestamp};

/// Priority assigned when the caller does not choose one (1 = highest).
pub const DEFAULT_PRIORITY: i32 = 1;

pub const DEFAULT_PRESET: &str = "fast";

pub const DEFAULT_PAPER: &str = "A4";

/// Value written to `metadata.created_by` for jobs created through the store.
pub const CREATED_BY: &str = "vpype-plotty";

/// Value written to `metadata.source` for jobs created through the store.
pub const SOURCE: &str = "vpype document";

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// One plotting job as stored in `jobs/<name>/job.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Stable identity; never changes after creation. Records written
    /// without one load with an empty id.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Paper size code, e.g. `"A4"`.
    pub paper: String,
    pub state: JobState,
    /// Lower value = higher precedence.
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<Timestamp>,
    #[serde(default)]
    pub metadata: JobMetadata,
}

/// Open metadata map. Known keys are typed; anything else is kept in
/// `extra` so foreign keys survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_mapping: Option<PenMapping>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobRecord {
    /// Build a fresh record in state `NEW` from a creation request.
    pub fn from_new_job(job: &NewJob, now: Timestamp) -> Self {
        Self {
            id: job.name.clone(),
            name: job.name.clone(),
            paper: job.paper.clone(),
            state: JobState::New,
            priority: job.priority,
            created_at: now,
            updated_at: now,
            queued_at: None,
            metadata: JobMetadata {
                created_by: Some(CREATED_BY.to_string()),
                source: Some(SOURCE.to_string()),
                preset: Some(job.preset.clone()),
                pen_mapping: job.pen_mapping.clone(),
                extra: serde_json::Map::new(),
            },
        }
    }

    /// Progress percentage, if an external driver recorded one in metadata.
    pub fn progress(&self) -> Option<f64> {
        self.metadata.extra.get("progress").and_then(|v| v.as_f64())
    }
}

/// Parameters for creating a job.
///
/// Constructed via [`NewJob::new`] and refined with the builder methods;
/// unset fields take the documented defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub name: String,
    pub preset: String,
    pub paper: String,
    pub priority: i32,
    pub pen_mapping: Option<PenMapping>,
}

impl NewJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preset: DEFAULT_PRESET.to_string(),
            paper: DEFAULT_PAPER.to_string(),
            priority: DEFAULT_PRIORITY,
            pen_mapping: None,
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn with_paper(mut self, paper: impl Into<String>) -> Self {
        self.paper = paper.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_pen_mapping(mut self, mapping: PenMapping) -> Self {
        self.pen_mapping = Some(mapping);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn new_job_defaults() {
        let job = NewJob::new("demo");
        assert_eq!(job.preset, "fast");
        assert_eq!(job.paper, "A4");
        assert_eq!(job.priority, 1);
        assert!(job.pen_mapping.is_none());
    }

    #[test]
    fn record_from_new_job_starts_new_with_name_as_id() {
        let now = Utc::now();
        let record = JobRecord::from_new_job(&NewJob::new("demo").with_paper("A3"), now);
        assert_eq!(record.id, "demo");
        assert_eq!(record.state, JobState::New);
        assert_eq!(record.paper, "A3");
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.metadata.preset.as_deref(), Some("fast"));
        assert_eq!(record.metadata.created_by.as_deref(), Some(CREATED_BY));
    }

    #[test]
    fn missing_priority_and_metadata_take_defaults() {
        let json = r#"{
            "id": "a", "name": "a", "paper": "A4", "state": "NEW",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.priority, DEFAULT_PRIORITY);
        assert!(record.queued_at.is_none());
        assert_eq!(record.metadata, JobMetadata::default());
    }

    #[test]
    fn record_without_id_loads_with_empty_id() {
        let json = r#"{
            "name": "legacy", "paper": "A4", "state": "QUEUED",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(record.name, "legacy");
    }

    #[test]
    fn unknown_metadata_keys_are_preserved() {
        let json = r#"{
            "id": "a", "name": "a", "paper": "A4", "state": "RUNNING",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:05:00Z",
            "metadata": {"preset": "hq", "progress": 42.5, "standalone": true}
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.progress(), Some(42.5));
        assert_eq!(record.metadata.extra["standalone"], true);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["metadata"]["standalone"], true);
        assert_eq!(value["metadata"]["preset"], "hq");
    }

    #[test]
    fn pen_mapping_uses_string_keys_on_disk() {
        let mapping: PenMapping = [(0, 1), (1, 2)].into_iter().collect();
        let record = JobRecord::from_new_job(
            &NewJob::new("pens").with_pen_mapping(mapping.clone()),
            Utc::now(),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["metadata"]["pen_mapping"]["1"], 2);

        let back: JobRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.metadata.pen_mapping, Some(mapping));
    }
}
