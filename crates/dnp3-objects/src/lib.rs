//! Encode/decode for DNP3 application-layer objects: the generic object
//! header (qualifier + range/count/prefix), and the fixed catalogue of
//! Group/Variation objects.
//!
//! Each object type exposes a pair of free functions, `read`/`write`,
//! operating on little-endian byte buffers, rather than routing through
//! a single monolithic parser.

#![forbid(unsafe_code)]

pub mod class;
pub mod flags;
pub mod header;
pub mod iin;
pub mod points;

pub use class::ClassMask;
pub use flags::*;
pub use header::{ObjectHeader, Qualifier, Range};
pub use iin::Iin;
pub use points::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("buffer too short decoding group {group} variation {variation}")]
    TooShort { group: u8, variation: u8 },
    #[error("unsupported group {0}/variation {1}")]
    Unsupported(u8, u8),
    #[error("malformed object header")]
    BadHeader,
}

pub type Result<T> = std::result::Result<T, ObjectError>;
