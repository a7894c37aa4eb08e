//! Common wire-level data types shared across the DNP3 stack: the link-layer
//! CRC, the 48-bit timestamp format used throughout the application layer,
//! statistics counters, and file permission bits.

#![forbid(unsafe_code)]

pub mod crc;
pub mod permissions;
pub mod stats;
pub mod timestamp;

pub use crc::crc16_dnp;
pub use permissions::Permissions;
pub use stats::StatisticsKind;
pub use timestamp::Timestamp;
