//! Shared helpers for the file-transfer tasks: wrapping a
//! Group 70 object in its free-format header, and mapping a non-`SUCCESS`
//! `FileCommandStatus`/`FileTransportStatus` to the task completion taxonomy.

use dnp3_file::{FileCommandStatus, FileTransportStatus};
use dnp3_objects::ObjectHeader;
use thiserror::Error;

use crate::master::task::TaskCompletion;

/// A file-transfer task failure, carrying the wire status that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileTaskError {
    #[error("file command failed with status {0:?}")]
    Command(FileCommandStatus),
    #[error("file transport failed with status {0:?}")]
    Transport(FileTransportStatus),
}

impl From<FileTaskError> for TaskCompletion {
    fn from(_: FileTaskError) -> Self {
        TaskCompletion::FailureBadResponse
    }
}

/// Wraps `body` (an already-encoded Group 70 object) in a free-format
/// header addressed to `variation`.
pub fn wrap_free_format(variation: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + body.len());
    ObjectHeader::free_format(70, variation, body.len() as u16).write(&mut out);
    out.extend_from_slice(body);
    out
}

/// Strips the free-format header and returns the object body, checking
/// the group/variation match what was expected.
pub fn unwrap_free_format(expected_variation: u8, objects: &[u8]) -> Option<&[u8]> {
    let (header, consumed) = ObjectHeader::read(objects).ok()?;
    if header.group != 70 || header.variation != expected_variation {
        return None;
    }
    let dnp3_objects::Qualifier::FreeFormat(len) = header.qualifier else {
        return None;
    };
    let len = len as usize;
    objects.get(consumed..consumed + len)
}

/// Any `FileCommandStatus` other than `Success` aborts the task.
pub fn map_command_status(status: FileCommandStatus) -> Option<FileTaskError> {
    match status {
        FileCommandStatus::Success => None,
        other => Some(FileTaskError::Command(other)),
    }
}

/// `HANDLE_TIMEOUT` is recoverable by re-opening the file;
/// every other non-`Success` status aborts the task.
pub fn map_transport_status(status: FileTransportStatus) -> Option<FileTaskError> {
    match status {
        FileTransportStatus::Success => None,
        FileTransportStatus::HandleTimeout => None,
        other => Some(FileTaskError::Transport(other)),
    }
}
