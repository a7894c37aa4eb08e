//! Outstation stack: the per-request dispatch engine and its
//! file transfer worker.

pub mod engine;
pub mod file_worker;
pub mod unsolicited;

pub use engine::{CommandHandler, EngineOutcome, Handlers, OutstationEngine, ReadHandler, RestartHandler, WriteHandler};
pub use file_worker::{FileTransferWorker, FileWorkerConfig};
pub use unsolicited::{UnsolicitedOutcome, UnsolicitedScheduler};
