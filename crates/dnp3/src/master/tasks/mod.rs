//! Concrete master task state machines.

mod clear_restart;
mod command;
mod directory_listing;
mod event_scan;
pub(crate) mod file_common;
mod file_read;
mod file_write;
mod integrity;
mod time_sync;

pub use clear_restart::ClearRestartTask;
pub use command::{CommandMode, CommandTask};
pub use directory_listing::{DirectoryListingTask, GetFileInfoTask};
pub use event_scan::{AutoEventScanTask, EventScanTask};
pub use file_common::FileTaskError;
pub use file_read::FileReadTask;
pub use file_write::{FileWriteSource, FileWriteTask};
pub use integrity::{IntegrityPollTask, StartupIntegrityPoll};
pub use time_sync::TimeSyncTask;

/// Receives the raw object section of a completed response; the static
/// point database / SOE buffers that interpret it are external
/// collaborators.
pub type ObjectSink = Box<dyn FnMut(&[u8]) + Send>;
