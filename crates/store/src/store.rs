//! File-backed job repository.
//!
//! Each job lives in its own directory `jobs/<name>/` holding `job.json`
//! and the rendered `src.svg`. All operations are blocking. Read-modify-write
//! sequences are serialised per job name within one [`JobStore`]; separate
//! processes sharing a workspace are not coordinated.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use plotty_core::{
    JobRecord, JobState, NewJob, NotifyAction, PlotError, PlotResult, RetryPolicy,
};

use crate::fsio;
use crate::notifier::{ChangeNotifier, FileNotifier};
use crate::render::DocumentRenderer;
use crate::workspace::{validate_job_name, Workspace};

/// Retry policy for job creation.
pub fn default_add_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(1))
}

/// Retry policy for queue, state update and removal.
pub fn default_update_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(500))
}

pub struct JobStore {
    workspace: Workspace,
    notifier: Box<dyn ChangeNotifier>,
    add_retry: RetryPolicy,
    update_retry: RetryPolicy,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("workspace", &self.workspace)
            .field("add_retry", &self.add_retry)
            .field("update_retry", &self.update_retry)
            .finish_non_exhaustive()
    }
}

impl JobStore {
    /// Store over `workspace`, notifying through a [`FileNotifier`].
    pub fn new(workspace: Workspace) -> Self {
        let notifier = FileNotifier::new(&workspace);
        Self {
            workspace,
            notifier: Box::new(notifier),
            add_retry: default_add_retry(),
            update_retry: default_update_retry(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open (creating if needed) the workspace at `root`.
    pub fn open(root: impl AsRef<Path>) -> PlotResult<Self> {
        Workspace::open(root.as_ref()).map(Self::new)
    }

    pub fn with_notifier(mut self, notifier: Box<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Override the retry policies used for creation and for updates.
    pub fn with_retry(mut self, add: RetryPolicy, update: RetryPolicy) -> Self {
        self.add_retry = add;
        self.update_retry = update;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a job in state `NEW`, render its artifact and persist it.
    ///
    /// Returns the new job's id (equal to its name). Existing names are
    /// refused. A failure half-way leaves whatever was already written.
    pub fn add(&self, document: &dyn DocumentRenderer, job: &NewJob) -> PlotResult<String> {
        let name = job.name.as_str();
        validate_job_name(name)?;

        let lock = self.job_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.workspace.job_dir(name).exists() {
            return Err(PlotError::job(
                format!("Job '{name}' already exists"),
                name,
            ));
        }

        let record = self
            .add_retry
            .run("add", || self.create_unit(document, job))
            .map_err(|e| match e {
                PlotError::Job { .. } => e,
                other => PlotError::job(format!("Failed to add job '{name}': {other}"), name),
            })?;

        tracing::info!(job = %name, preset = %job.preset, paper = %job.paper, "Job added");
        self.notifier.notify(name, &record, NotifyAction::Create);
        Ok(record.id)
    }

    fn create_unit(&self, document: &dyn DocumentRenderer, job: &NewJob) -> PlotResult<JobRecord> {
        let dir = self.workspace.job_dir(&job.name);
        std::fs::create_dir_all(&dir).map_err(|e| PlotError::from_io(e, Some(&dir)))?;

        document.render(&self.workspace.artifact_file(&job.name))?;

        let record = JobRecord::from_new_job(job, Utc::now());
        fsio::write_json_atomic(&self.workspace.job_file(&job.name), &record)?;
        Ok(record)
    }

    /// Move a job to `QUEUED` with the given priority.
    ///
    /// Re-queueing an already queued job updates its priority.
    pub fn queue(&self, name: &str, priority: i32) -> PlotResult<JobRecord> {
        let record = self.transition(name, JobState::Queued, "queue", |record| {
            record.priority = priority;
            record.queued_at = Some(Utc::now());
        })?;
        tracing::info!(job = %name, priority, "Job queued");
        Ok(record)
    }

    /// Apply an externally driven state change (`RUNNING`, `COMPLETED`, ...).
    pub fn update_state(&self, name: &str, state: JobState) -> PlotResult<JobRecord> {
        let record = self.transition(name, state, "update_state", |_| {})?;
        tracing::info!(job = %name, state = %state, "Job state updated");
        Ok(record)
    }

    /// Shared load / validate / mutate / persist / notify path.
    fn transition<F>(
        &self,
        name: &str,
        to: JobState,
        label: &str,
        mut apply: F,
    ) -> PlotResult<JobRecord>
    where
        F: FnMut(&mut JobRecord),
    {
        validate_job_name(name)?;

        let lock = self.job_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let record = self.update_retry.run(label, || {
            let mut record = self.load(name)?;
            record.state.validate_transition(to).map_err(|msg| {
                PlotError::job(format!("Cannot {label} job '{name}': {msg}"), name)
            })?;

            apply(&mut record);
            record.state = to;
            record.updated_at = Utc::now();

            self.write_record(name, &record)?;
            Ok(record)
        })?;

        self.notifier.notify(name, &record, NotifyAction::Update);
        Ok(record)
    }

    /// Write `record` as the job's record, creating the job directory if
    /// needed. The record is stored exactly as given.
    pub fn save(&self, name: &str, record: &JobRecord) -> PlotResult<()> {
        validate_job_name(name)?;

        let lock = self.job_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.write_record(name, record)?;
        self.notifier.notify(name, record, NotifyAction::Update);
        Ok(())
    }

    fn write_record(&self, name: &str, record: &JobRecord) -> PlotResult<()> {
        let dir = self.workspace.job_dir(name);
        std::fs::create_dir_all(&dir).map_err(|e| PlotError::from_io(e, Some(&dir)))?;
        fsio::write_json_atomic(&self.workspace.job_file(name), record)
    }

    /// Delete the job directory and everything in it.
    pub fn remove(&self, name: &str) -> PlotResult<()> {
        validate_job_name(name)?;

        let lock = self.job_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.workspace.job_dir(name);
        if !dir.is_dir() {
            return Err(job_not_found(name, &dir));
        }

        // The last state rides along in the removal notice when readable.
        let last = self.load(name).ok();

        self.update_retry.run("remove", || {
            std::fs::remove_dir_all(&dir).map_err(|e| PlotError::from_io(e, Some(&dir)))
        })?;

        self.release_lock(name);

        tracing::info!(job = %name, "Job removed");
        if let Some(record) = last {
            self.notifier.notify(name, &record, NotifyAction::Remove);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read one job record. Missing, unreadable and corrupt records are all
    /// [`PlotError::NotFound`].
    pub fn load(&self, name: &str) -> PlotResult<JobRecord> {
        validate_job_name(name)?;

        let dir = self.workspace.job_dir(name);
        if !dir.is_dir() {
            return Err(job_not_found(name, &dir));
        }
        fsio::read_json(&self.workspace.job_file(name))
    }

    /// Alias of [`JobStore::load`].
    pub fn get(&self, name: &str) -> PlotResult<JobRecord> {
        self.load(name)
    }

    /// Records in directory-name order, optionally filtered by state and
    /// truncated to `limit`. Unreadable entries are skipped.
    pub fn list(&self, state: Option<JobState>, limit: Option<usize>) -> PlotResult<Vec<JobRecord>> {
        let jobs_dir = self.workspace.jobs_dir();
        let entries =
            std::fs::read_dir(&jobs_dir).map_err(|e| PlotError::from_io(e, Some(&jobs_dir)))?;

        let mut dirs: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();

        let limit = limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();

        for dir in dirs {
            if records.len() >= limit {
                break;
            }
            let file = dir.join(crate::workspace::JOB_FILE);
            let record: JobRecord = match fsio::read_json(&file) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable job");
                    continue;
                }
            };
            if state.map_or(true, |s| record.state == s) {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// The stored id for `name`, falling back to the name itself when the
    /// record has no id.
    pub fn find(&self, name: &str) -> PlotResult<String> {
        let record = self.load(name)?;
        if record.id.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(record.id)
        }
    }

    fn job_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Drop the lock entry for `name` unless another caller still holds a
    /// handle to it. Called with the caller's own handle alive, so a count
    /// of two means the map and the caller are the only owners.
    fn release_lock(&self, name: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(name).is_some_and(|lock| Arc::strong_count(lock) <= 2) {
            locks.remove(name);
        }
    }
}

fn job_not_found(name: &str, dir: &Path) -> PlotError {
    PlotError::not_found(
        format!("Job '{name}' not found"),
        Some(dir.display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ChangeNotifier;
    use crate::render::SvgDocument;

    struct Silent;

    impl ChangeNotifier for Silent {
        fn notify(&self, _name: &str, _record: &JobRecord, _action: NotifyAction) {}
    }

    fn store() -> (tempfile::TempDir, JobStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = JobStore::open(tmp.path())
            .unwrap()
            .with_notifier(Box::new(Silent))
            .with_retry(RetryPolicy::none(), RetryPolicy::none());
        (tmp, store)
    }

    fn lock_count(store: &JobStore) -> usize {
        store.locks.lock().unwrap().len()
    }

    #[test]
    fn remove_drops_unused_lock_entry() {
        let (_tmp, store) = store();
        store.add(&SvgDocument::new("<svg/>"), &NewJob::new("demo")).unwrap();
        assert_eq!(lock_count(&store), 1);

        store.remove("demo").unwrap();

        assert_eq!(lock_count(&store), 0);
    }

    #[test]
    fn remove_keeps_lock_entry_while_another_caller_holds_it() {
        let (_tmp, store) = store();
        store.add(&SvgDocument::new("<svg/>"), &NewJob::new("demo")).unwrap();
        let waiting = store.job_lock("demo");

        store.remove("demo").unwrap();

        assert!(Arc::ptr_eq(&waiting, &store.job_lock("demo")));
    }
}
