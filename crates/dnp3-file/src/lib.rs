//! Group 70 object family: the wire structures exchanged to open, read,
//! write, close, delete, and enumerate files over DNP3.

#![forbid(unsafe_code)]

use binrw::prelude::*;
use dnp3_dtyp::{Permissions, Timestamp};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileObjectError {
    #[error("buffer too short to contain a Group 70 var{0} object")]
    TooShort(u8),
    #[error("codec error: {0}")]
    Binrw(#[from] binrw::Error),
}

pub type Result<T> = std::result::Result<T, FileObjectError>;

/// Outcome of an OPEN/CLOSE/DELETE/GET_FILE_INFO/ABORT operation (Group 70 var4 `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCommandStatus {
    Success = 0x00,
    PermissionDenied = 0x01,
    InvalidMode = 0x02,
    NotFound = 0x03,
    FileLocked = 0x04,
    OpenCountExceeded = 0x05,
    FileNotOpen = 0x06,
    InvalidBlockSize = 0x07,
    LostCom = 0x08,
    FailedAbort = 0x09,
    /// Not part of the wire enumeration directly, but used by the master's
    /// handle-timeout recovery path for file writes.
    Timeout = 0x0A,
}

impl FileCommandStatus {
    pub fn try_from_u8(v: u8) -> Option<Self> {
        use FileCommandStatus::*;
        Some(match v {
            0x00 => Success,
            0x01 => PermissionDenied,
            0x02 => InvalidMode,
            0x03 => NotFound,
            0x04 => FileLocked,
            0x05 => OpenCountExceeded,
            0x06 => FileNotOpen,
            0x07 => InvalidBlockSize,
            0x08 => LostCom,
            0x09 => FailedAbort,
            0x0A => Timeout,
            _ => return None,
        })
    }
}

/// Outcome of a READ/WRITE block transfer (Group 70 var6 `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransportStatus {
    Success = 0x00,
    LostCom = 0x08,
    FileNotOpened = 0x10,
    HandleTimeout = 0x11,
    BufferOverflow = 0x12,
    FatalError = 0x13,
    OutOfSequence = 0x14,
}

impl FileTransportStatus {
    pub fn try_from_u8(v: u8) -> Option<Self> {
        use FileTransportStatus::*;
        Some(match v {
            0x00 => Success,
            0x08 => LostCom,
            0x10 => FileNotOpened,
            0x11 => HandleTimeout,
            0x12 => BufferOverflow,
            0x13 => FatalError,
            0x14 => OutOfSequence,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpeningMode {
    Delete = 0x00,
    Read = 0x01,
    Write = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnpFileType {
    SimpleFile = 0x01,
    Directory = 0x02,
}

/// Group 70 var3: file command (OPEN/DELETE/GET_FILE_INFO request).
///
/// Fixed 26-byte prefix followed by the UTF-8 path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommand {
    pub ctime: Timestamp,
    pub permissions: Permissions,
    pub auth_key: u32,
    pub file_size: u32,
    pub mode: FileOpeningMode,
    pub block_size: u16,
    pub request_id: u16,
    pub name: String,
}

/// Wire shape of the 26-byte fixed prefix ahead of `FileCommand`'s path.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct FileCommandWire {
    name_offset: u16,
    name_size: u16,
    ctime: Timestamp,
    permissions: Permissions,
    auth_key: u32,
    file_size: u32,
    mode: u16,
    block_size: u16,
    request_id: u16,
}

impl FileCommand {
    pub const FIXED_SIZE: usize = 26;

    pub fn encode(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let wire = FileCommandWire {
            name_offset: Self::FIXED_SIZE as u16,
            name_size: name_bytes.len() as u16,
            ctime: self.ctime,
            permissions: self.permissions,
            auth_key: self.auth_key,
            file_size: self.file_size,
            mode: self.mode as u16,
            block_size: self.block_size,
            request_id: self.request_id,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(Self::FIXED_SIZE + name_bytes.len()));
        wire.write_le(&mut cursor).expect("write to Vec cannot fail");
        let mut out = cursor.into_inner();
        out.extend_from_slice(name_bytes);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::FIXED_SIZE {
            return Err(FileObjectError::TooShort(3));
        }
        let mut cursor = Cursor::new(&buf[..Self::FIXED_SIZE]);
        let wire = FileCommandWire::read_le(&mut cursor)?;
        let mode = match wire.mode {
            0 => FileOpeningMode::Delete,
            1 => FileOpeningMode::Read,
            _ => FileOpeningMode::Write,
        };
        let name_start = (wire.name_offset as usize).max(Self::FIXED_SIZE);
        let name_end = name_start
            .checked_add(wire.name_size as usize)
            .filter(|&end| end <= buf.len())
            .ok_or(FileObjectError::TooShort(3))?;
        let name = String::from_utf8_lossy(&buf[name_start..name_end]).into_owned();
        Ok(Self {
            ctime: wire.ctime,
            permissions: wire.permissions,
            auth_key: wire.auth_key,
            file_size: wire.file_size,
            mode,
            block_size: wire.block_size,
            request_id: wire.request_id,
            name,
        })
    }
}

/// Group 70 var4: file command status (response to OPEN/CLOSE/DELETE/ABORT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCommandStatusObject {
    pub file_handle: u32,
    pub file_size: u32,
    pub block_size: u16,
    pub request_id: u16,
    pub status: FileCommandStatus,
}

/// Wire shape of `FileCommandStatusObject`: every field is fixed-width.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct FileCommandStatusWire {
    file_handle: u32,
    file_size: u32,
    block_size: u16,
    request_id: u16,
    status: u8,
}

impl FileCommandStatusObject {
    pub const SIZE: usize = 13;

    pub fn encode(&self) -> Vec<u8> {
        let wire = FileCommandStatusWire {
            file_handle: self.file_handle,
            file_size: self.file_size,
            block_size: self.block_size,
            request_id: self.request_id,
            status: self.status as u8,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(Self::SIZE));
        wire.write_le(&mut cursor).expect("write to Vec cannot fail");
        cursor.into_inner()
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FileObjectError::TooShort(4));
        }
        let mut cursor = Cursor::new(&buf[..Self::SIZE]);
        let wire = FileCommandStatusWire::read_le(&mut cursor)?;
        Ok(Self {
            file_handle: wire.file_handle,
            file_size: wire.file_size,
            block_size: wire.block_size,
            request_id: wire.request_id,
            status: FileCommandStatus::try_from_u8(wire.status).unwrap_or(FileCommandStatus::LostCom),
        })
    }
}

/// Group 70 var5: a single block of file data in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransport {
    pub file_handle: u32,
    pub block_number: u32,
    pub is_last_block: bool,
    pub data: Vec<u8>,
}

const LAST_BLOCK_BIT: u32 = 1 << 31;

/// Wire shape of the 8-byte `FileTransport` prefix: `block_number`'s top
/// bit doubles as the last-block flag, packed in by the caller.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct FileTransportWire {
    file_handle: u32,
    block_field: u32,
}

impl FileTransport {
    pub const FIXED_SIZE: usize = 8;

    pub fn encode(&self) -> Vec<u8> {
        let wire = FileTransportWire {
            file_handle: self.file_handle,
            block_field: self.block_number | if self.is_last_block { LAST_BLOCK_BIT } else { 0 },
        };
        let mut cursor = Cursor::new(Vec::with_capacity(Self::FIXED_SIZE + self.data.len()));
        wire.write_le(&mut cursor).expect("write to Vec cannot fail");
        let mut out = cursor.into_inner();
        out.extend_from_slice(&self.data);
        out
    }

    /// Decodes using the full free-format object length `buf.len()` as the
    /// implicit length of the trailing `data` field.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::FIXED_SIZE {
            return Err(FileObjectError::TooShort(5));
        }
        let mut cursor = Cursor::new(&buf[..Self::FIXED_SIZE]);
        let wire = FileTransportWire::read_le(&mut cursor)?;
        Ok(Self {
            file_handle: wire.file_handle,
            block_number: wire.block_field & !LAST_BLOCK_BIT,
            is_last_block: wire.block_field & LAST_BLOCK_BIT != 0,
            data: buf[Self::FIXED_SIZE..].to_vec(),
        })
    }
}

/// Group 70 var6: status of a file transport block (response to var5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransportStatusObject {
    pub file_handle: u32,
    pub block_number: u32,
    pub status: FileTransportStatus,
    pub info: Vec<u8>,
}

/// Wire shape of the 9-byte `FileTransportStatusObject` prefix.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct FileTransportStatusWire {
    file_handle: u32,
    block_number: u32,
    status: u8,
}

impl FileTransportStatusObject {
    pub const FIXED_SIZE: usize = 9;

    pub fn encode(&self) -> Vec<u8> {
        let wire = FileTransportStatusWire {
            file_handle: self.file_handle,
            block_number: self.block_number,
            status: self.status as u8,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(Self::FIXED_SIZE + self.info.len()));
        wire.write_le(&mut cursor).expect("write to Vec cannot fail");
        let mut out = cursor.into_inner();
        out.extend_from_slice(&self.info);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::FIXED_SIZE {
            return Err(FileObjectError::TooShort(6));
        }
        let mut cursor = Cursor::new(&buf[..Self::FIXED_SIZE]);
        let wire = FileTransportStatusWire::read_le(&mut cursor)?;
        Ok(Self {
            file_handle: wire.file_handle,
            block_number: wire.block_number,
            status: FileTransportStatus::try_from_u8(wire.status)
                .unwrap_or(FileTransportStatus::FatalError),
            info: buf[Self::FIXED_SIZE..].to_vec(),
        })
    }
}

/// Group 70 var7: one file descriptor, as streamed by a directory listing
///. 20-byte fixed prefix followed by the UTF-8 name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub file_type: DnpFileType,
    pub size: u32,
    pub ctime: Timestamp,
    pub permissions: Permissions,
    pub request_id: u16,
    pub name: String,
}

/// Wire shape of the 20-byte fixed prefix ahead of `FileDescriptor`'s name.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct FileDescriptorWire {
    name_offset: u16,
    name_size: u16,
    file_type: u16,
    size: u32,
    ctime: Timestamp,
    permissions: Permissions,
    request_id: u16,
}

impl FileDescriptor {
    pub const FIXED_SIZE: usize = 20;

    pub fn encode(&self) -> Vec<u8> {
        let name_bytes = self.name.as_bytes();
        let wire = FileDescriptorWire {
            name_offset: Self::FIXED_SIZE as u16,
            name_size: name_bytes.len() as u16,
            file_type: self.file_type as u16,
            size: self.size,
            ctime: self.ctime,
            permissions: self.permissions,
            request_id: self.request_id,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(Self::FIXED_SIZE + name_bytes.len()));
        wire.write_le(&mut cursor).expect("write to Vec cannot fail");
        let mut out = cursor.into_inner();
        out.extend_from_slice(name_bytes);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < Self::FIXED_SIZE {
            return Err(FileObjectError::TooShort(7));
        }
        let mut cursor = Cursor::new(&buf[..Self::FIXED_SIZE]);
        let wire = FileDescriptorWire::read_le(&mut cursor)?;
        let file_type = match wire.file_type {
            2 => DnpFileType::Directory,
            _ => DnpFileType::SimpleFile,
        };
        let name_start = (wire.name_offset as usize).max(Self::FIXED_SIZE);
        let name_end = name_start
            .checked_add(wire.name_size as usize)
            .filter(|&end| end <= buf.len())
            .ok_or(FileObjectError::TooShort(7))?;
        let name = String::from_utf8_lossy(&buf[name_start..name_end]).into_owned();
        Ok((
            Self {
                file_type,
                size: wire.size,
                ctime: wire.ctime,
                permissions: wire.permissions,
                request_id: wire.request_id,
                name,
            },
            name_end,
        ))
    }

    /// Decodes every descriptor packed back-to-back in a directory-listing
    /// data stream.
    pub fn decode_all(buf: &[u8]) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let (descriptor, consumed) = Self::decode(&buf[offset..])?;
            offset += consumed;
            out.push(descriptor);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_command_round_trips() {
        let cmd = FileCommand {
            ctime: Timestamp::from_millis(1_700_000_000_000),
            permissions: Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 3000,
            mode: FileOpeningMode::Write,
            block_size: 1024,
            request_id: 7,
            name: "/a.bin".to_string(),
        };
        let encoded = cmd.encode();
        let decoded = FileCommand::decode(&encoded).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn file_transport_last_block_bit() {
        let block = FileTransport {
            file_handle: 1,
            block_number: 5,
            is_last_block: true,
            data: vec![1, 2, 3],
        };
        let encoded = block.encode();
        let decoded = FileTransport::decode(&encoded).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.block_number, 5);
        assert!(decoded.is_last_block);
    }

    #[test]
    fn directory_listing_decodes_multiple_descriptors() {
        let a = FileDescriptor {
            file_type: DnpFileType::SimpleFile,
            size: 10,
            ctime: Timestamp::from_millis(0),
            permissions: Permissions::from_unix_mode(0o644),
            request_id: 1,
            name: "a.txt".into(),
        };
        let b = FileDescriptor {
            file_type: DnpFileType::Directory,
            size: 0,
            ctime: Timestamp::from_millis(0),
            permissions: Permissions::from_unix_mode(0o755),
            request_id: 1,
            name: "subdir".into(),
        };
        let mut buf = a.encode();
        buf.extend(b.encode());
        let decoded = FileDescriptor::decode_all(&buf).unwrap();
        assert_eq!(decoded, vec![a, b]);
    }
}
