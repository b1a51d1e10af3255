//! File-backed job repository for plotty workspaces.
//!
//! - [`JobStore`]: CRUD plus state transitions over
//!   [`JobRecord`](plotty_core::JobRecord)s, one directory per job.
//! - [`ChangeNotifier`] / [`FileNotifier`]: best-effort "job changed"
//!   side channel invoked after every mutation.
//! - [`DocumentRenderer`]: seam to the external renderer that writes a
//!   job's plot artifact.
//! - [`workspace`]: workspace discovery and on-disk layout.

pub mod fsio;
pub mod notifier;
pub mod render;
pub mod store;
pub mod workspace;

pub use notifier::{ChangeNotifier, FileNotifier};
pub use render::{DocumentRenderer, SvgDocument};
pub use store::JobStore;
pub use workspace::Workspace;
