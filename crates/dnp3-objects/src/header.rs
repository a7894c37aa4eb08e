//! The generic object header: group, variation, and qualifier-coded
//! range/count/prefix.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};

use crate::{ObjectError, Result};

/// A start/stop index range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u32,
    pub stop: u32,
}

impl Range {
    pub fn count(&self) -> u32 {
        self.stop.saturating_sub(self.start) + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.stop
    }
}

/// Wire shape of an 8-bit start/stop range (qualifier 0x00).
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct Range8Wire {
    start: u8,
    stop: u8,
}

/// Wire shape of a 16-bit start/stop range (qualifier 0x01).
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct Range16Wire {
    start: u16,
    stop: u16,
}

/// How the objects following a header are counted/addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    /// 8-bit start/stop index range (qualifier 0x00).
    Range8(Range),
    /// 16-bit start/stop index range (qualifier 0x01).
    Range16(Range),
    /// All instances of the object, no range/count field (qualifier 0x06).
    AllObjects,
    /// `count` objects, each index-prefixed with an 8-bit index (qualifier 0x17).
    IndexPrefix8(u16),
    /// `count` objects, each index-prefixed with a 16-bit index (qualifier 0x28).
    IndexPrefix16(u16),
    /// A single free-format object whose total byte length is `length`
    /// (qualifier 0x5B) — used by the Group 70 file family.
    FreeFormat(u16),
}

impl Qualifier {
    fn code(&self) -> u8 {
        match self {
            Qualifier::Range8(_) => 0x00,
            Qualifier::Range16(_) => 0x01,
            Qualifier::AllObjects => 0x06,
            Qualifier::IndexPrefix8(_) => 0x17,
            Qualifier::IndexPrefix16(_) => 0x28,
            Qualifier::FreeFormat(_) => 0x5B,
        }
    }
}

/// A single object header as it appears in an APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub group: u8,
    pub variation: u8,
    pub qualifier: Qualifier,
}

impl ObjectHeader {
    pub fn range8(group: u8, variation: u8, start: u8, stop: u8) -> Self {
        Self {
            group,
            variation,
            qualifier: Qualifier::Range8(Range {
                start: start as u32,
                stop: stop as u32,
            }),
        }
    }

    pub fn all_objects(group: u8, variation: u8) -> Self {
        Self {
            group,
            variation,
            qualifier: Qualifier::AllObjects,
        }
    }

    pub fn free_format(group: u8, variation: u8, length: u16) -> Self {
        Self {
            group,
            variation,
            qualifier: Qualifier::FreeFormat(length),
        }
    }

    /// Encodes the 3-byte group/variation/qualifier prefix plus the
    /// qualifier-specific range/count field, writing every field through
    /// `binrw` rather than pushing raw bytes.
    pub fn write(&self, out: &mut Vec<u8>) {
        let mut cursor = Cursor::new(Vec::new());
        self.group.write_le(&mut cursor).expect("write to Vec cannot fail");
        self.variation.write_le(&mut cursor).expect("write to Vec cannot fail");
        self.qualifier
            .code()
            .write_le(&mut cursor)
            .expect("write to Vec cannot fail");
        match self.qualifier {
            Qualifier::Range8(r) => Range8Wire {
                start: r.start as u8,
                stop: r.stop as u8,
            }
            .write_le(&mut cursor),
            Qualifier::Range16(r) => Range16Wire {
                start: r.start as u16,
                stop: r.stop as u16,
            }
            .write_le(&mut cursor),
            Qualifier::AllObjects => Ok(()),
            Qualifier::IndexPrefix8(count) => (count as u8).write_le(&mut cursor),
            Qualifier::IndexPrefix16(count) => count.write_le(&mut cursor),
            Qualifier::FreeFormat(len) => len.write_le(&mut cursor),
        }
        .expect("write to Vec cannot fail");
        out.extend_from_slice(&cursor.into_inner());
    }

    /// Decodes one header starting at `buf[0]`, returning the header and
    /// the number of bytes consumed.
    pub fn read(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 3 {
            return Err(ObjectError::BadHeader);
        }
        let mut cursor = Cursor::new(buf);
        let group = u8::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
        let variation = u8::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
        let qualifier_code = u8::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
        let qualifier = match qualifier_code {
            0x00 => {
                let w = Range8Wire::read(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
                Qualifier::Range8(Range {
                    start: w.start as u32,
                    stop: w.stop as u32,
                })
            }
            0x01 => {
                let w = Range16Wire::read(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
                Qualifier::Range16(Range {
                    start: w.start as u32,
                    stop: w.stop as u32,
                })
            }
            0x06 => Qualifier::AllObjects,
            0x17 => {
                let count = u8::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
                Qualifier::IndexPrefix8(count as u16)
            }
            0x28 => {
                let count = u16::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
                Qualifier::IndexPrefix16(count)
            }
            0x5B => {
                let len = u16::read_le(&mut cursor).map_err(|_| ObjectError::BadHeader)?;
                Qualifier::FreeFormat(len)
            }
            _ => return Err(ObjectError::BadHeader),
        };
        let consumed = cursor.position() as usize;
        Ok((
            Self {
                group,
                variation,
                qualifier,
            },
            consumed,
        ))
    }
}
