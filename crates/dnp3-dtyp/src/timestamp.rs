//! The 48-bit absolute timestamp format used by Group 50/51/52 objects:
//! milliseconds since the Unix epoch, little-endian, 6 bytes on the wire.

use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, Write};
use std::time::Duration;
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, truncated to 48 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

const MASK_48: u64 = (1u64 << 48) - 1;

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis & MASK_48)
    }

    pub fn millis(&self) -> u64 {
        self.0
    }

    pub fn now() -> Self {
        let millis = (OffsetDateTime::now_utc() - OffsetDateTime::UNIX_EPOCH).whole_milliseconds();
        Self::from_millis(millis.max(0) as u64)
    }

    pub fn checked_add(&self, delta: Duration) -> Self {
        Self::from_millis(self.0.saturating_add(delta.as_millis() as u64))
    }

    pub fn checked_sub(&self, other: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

impl BinRead for Timestamp {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let mut bytes = [0u8; 6];
        reader.read_exact(&mut bytes)?;
        let mut widened = [0u8; 8];
        widened[..6].copy_from_slice(&bytes);
        let millis = match endian {
            binrw::Endian::Little => u64::from_le_bytes(widened),
            binrw::Endian::Big => {
                widened.rotate_right(2);
                u64::from_be_bytes(widened)
            }
        };
        Ok(Timestamp(millis & MASK_48))
    }
}

impl BinWrite for Timestamp {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let bytes = self.0.to_le_bytes();
        writer.write_all(&bytes[..6])?;
        Ok(())
    }
}
