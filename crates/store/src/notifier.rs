//! Best-effort "job changed" side channel.
//!
//! The store calls [`ChangeNotifier::notify`] after every successful
//! mutation. Implementations must not fail the caller: the signature is
//! infallible and problems are logged, never propagated.

use plotty_core::{JobRecord, Notification, NotifyAction, PlotError};

use crate::fsio;
use crate::workspace::Workspace;

pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, name: &str, record: &JobRecord, action: NotifyAction);
}

/// Writes the latest notification per job to `queue/<name>.notify`.
///
/// Each write replaces the previous one; there is no history and no
/// acknowledgement.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    workspace: Workspace,
}

impl FileNotifier {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            workspace: workspace.clone(),
        }
    }

    /// The most recent notification for `name`, if one is present and readable.
    pub fn latest(&self, name: &str) -> Option<Notification> {
        fsio::read_json(&self.workspace.notify_file(name)).ok()
    }
}

impl ChangeNotifier for FileNotifier {
    fn notify(&self, name: &str, record: &JobRecord, action: NotifyAction) {
        let note = Notification::for_record(name, record, action);
        let queue_dir = self.workspace.queue_dir();
        let path = self.workspace.notify_file(name);

        let result = std::fs::create_dir_all(&queue_dir)
            .map_err(|e| PlotError::from_io(e, Some(&queue_dir)))
            .and_then(|()| fsio::write_json_atomic(&path, &note));

        match result {
            Ok(()) => tracing::debug!(
                job = %name,
                state = %record.state,
                action = ?action,
                "Notification written",
            ),
            Err(e) => tracing::warn!(
                job = %name,
                error = %e,
                "Failed to write notification",
            ),
        }
    }
}
