//! Application Layer: fragment header codec, master-side request
//! building/response validation, and outstation-side duplicate detection
//! and SELECT/OPERATE buffering.

pub mod header;
pub mod master;
pub mod outstation;

pub use header::{AppControl, AppError, FunctionCode, RequestFragment, ResponseFragment};
pub use master::{IinAction, MasterApplication, MasterOutcome, PendingConfirm};
pub use outstation::{DispatchDecision, OutstationApplication, SelectOperateError};
