//! Shared domain types for the plotty job lifecycle.
//!
//! Holds the persisted [`JobRecord`], the [`JobState`] machine, the
//! best-effort [`Notification`] envelope, the [`PlotError`] taxonomy and
//! the retry wrapper used around transient failures. This crate has no
//! internal deps so the store, live client and monitor can all share it.

pub mod error;
pub mod job;
pub mod notification;
pub mod retry;
pub mod state;
pub mod types;

pub use error::{PlotError, PlotResult};
pub use job::{JobMetadata, JobRecord, NewJob};
pub use notification::{Notification, NotifyAction};
pub use retry::RetryPolicy;
pub use state::JobState;
