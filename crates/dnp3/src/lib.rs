#![forbid(unsafe_code)]
//! A library implementation of the DNP3 (IEEE 1815) SCADA protocol stack:
//! link framing, transport segmentation, application-layer fragment
//! handling, the master task scheduler and its task state machines, the
//! outstation engine and file transfer worker, and a primary/backup
//! channel manager. Concrete socket I/O, the TLS library, the logging
//! sink, and the static point database are external collaborators
//! supplied by the host application.

pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod link;
pub mod master;
pub mod outstation;
pub mod stats;
pub mod sync_helpers;
pub mod transport_function;

pub use config::{ControlQualifierMode, EventBufferConfig, MasterConfig, OutstationConfig};
pub use error::Error;
pub use stats::StatisticsRegistry;

pub use dnp3_dtyp::{crc16_dnp, Permissions, StatisticsKind, Timestamp};
pub use dnp3_file as file;
pub use dnp3_objects as objects;
pub use dnp3_transport as transport;

/// DNP3 stack result type.
pub type Result<T> = std::result::Result<T, crate::Error>;
