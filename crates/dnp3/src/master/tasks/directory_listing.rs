//! Directory listing and single-file info lookups: both open a
//! path, read back Group 70 Var 7 file descriptors, and close.

use dnp3_file::{FileCommand, FileCommandStatusObject, FileDescriptor, FileOpeningMode, FileTransport};
use dnp3_objects::Iin;

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};
use crate::master::tasks::file_common::{map_command_status, unwrap_free_format, wrap_free_format};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Opening,
    Reading,
    Closing,
}

/// Streams every [`FileDescriptor`] found under a directory path to a
/// sink, one call per block received.
pub struct DirectoryListingTask {
    path: String,
    sink: Box<dyn FnMut(Vec<FileDescriptor>) + Send>,
    state: State,
    file_handle: u32,
}

impl DirectoryListingTask {
    pub fn new(path: impl Into<String>, sink: Box<dyn FnMut(Vec<FileDescriptor>) + Send>) -> Self {
        Self {
            path: path.into(),
            sink,
            state: State::Opening,
            file_handle: 0,
        }
    }

    fn open_request(&self) -> Vec<u8> {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 0,
            mode: FileOpeningMode::Read,
            block_size: 2048,
            request_id: 0,
            name: self.path.clone(),
        };
        wrap_free_format(3, &command.encode())
    }

    fn close_request(&self) -> Vec<u8> {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 0,
            mode: FileOpeningMode::Read,
            block_size: 2048,
            request_id: self.file_handle as u16,
            name: String::new(),
        };
        wrap_free_format(3, &command.encode())
    }
}

impl Task for DirectoryListingTask {
    fn task_type(&self) -> TaskType {
        TaskType::FileOp
    }

    fn name(&self) -> &str {
        "directory_listing"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn on_start(&mut self) {
        self.state = State::Opening;
        self.file_handle = 0;
    }

    fn build_request(&mut self) -> TaskRequest {
        TaskRequest {
            function: FunctionCode::OpenFile,
            objects: self.open_request(),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        match self.state {
            State::Opening => {
                let Some(body) = unwrap_free_format(4, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(status) = FileCommandStatusObject::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                if let Some(failure) = map_command_status(status.status) {
                    return TaskStep::Done(failure.into());
                }
                self.file_handle = status.file_handle;
                self.state = State::Reading;
                TaskStep::Continue(TaskRequest {
                    function: FunctionCode::Read,
                    objects: Vec::new(),
                    confirm: false,
                })
            }
            State::Reading => {
                let Some(body) = unwrap_free_format(5, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(block) = FileTransport::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(descriptors) = FileDescriptor::decode_all(&block.data) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                (self.sink)(descriptors);
                if block.is_last_block {
                    self.state = State::Closing;
                    TaskStep::Continue(TaskRequest {
                        function: FunctionCode::CloseFile,
                        objects: self.close_request(),
                        confirm: false,
                    })
                } else {
                    TaskStep::Continue(TaskRequest {
                        function: FunctionCode::Read,
                        objects: Vec::new(),
                        confirm: false,
                    })
                }
            }
            State::Closing => {
                let Some(body) = unwrap_free_format(4, objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let Ok(status) = FileCommandStatusObject::decode(body) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                match map_command_status(status.status) {
                    Some(failure) => TaskStep::Done(failure.into()),
                    None => TaskStep::Done(TaskCompletion::Success),
                }
            }
        }
    }
}

/// A single `GET_FILE_INFO` request/response round: no open handle
/// involved, unlike [`DirectoryListingTask`].
pub struct GetFileInfoTask {
    path: String,
    sink: Box<dyn FnMut(FileDescriptor) + Send>,
}

impl GetFileInfoTask {
    pub fn new(path: impl Into<String>, sink: Box<dyn FnMut(FileDescriptor) + Send>) -> Self {
        Self {
            path: path.into(),
            sink,
        }
    }
}

impl Task for GetFileInfoTask {
    fn task_type(&self) -> TaskType {
        TaskType::FileOp
    }

    fn name(&self) -> &str {
        "get_file_info"
    }

    fn is_recurring(&self) -> bool {
        false
    }

    fn build_request(&mut self) -> TaskRequest {
        let command = FileCommand {
            ctime: dnp3_dtyp::Timestamp::now(),
            permissions: dnp3_dtyp::Permissions::from_unix_mode(0o644),
            auth_key: 0,
            file_size: 0,
            mode: FileOpeningMode::Read,
            block_size: 0,
            request_id: 0,
            name: self.path.clone(),
        };
        TaskRequest {
            function: FunctionCode::GetFileInfo,
            objects: wrap_free_format(3, &command.encode()),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        let Some(body) = unwrap_free_format(7, objects) else {
            return TaskStep::Done(TaskCompletion::FailureBadResponse);
        };
        let Ok((descriptor, _)) = FileDescriptor::decode(body) else {
            return TaskStep::Done(TaskCompletion::FailureBadResponse);
        };
        (self.sink)(descriptor);
        TaskStep::Done(TaskCompletion::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_dtyp::{Permissions, Timestamp};
    use dnp3_file::DnpFileType;
    use std::sync::{Arc, Mutex};

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor {
            file_type: DnpFileType::SimpleFile,
            size: 10,
            ctime: Timestamp::from_millis(0),
            permissions: Permissions::from_unix_mode(0o644),
            request_id: 0,
            name: name.to_string(),
        }
    }

    fn open_status(status: dnp3_file::FileCommandStatus, handle: u32) -> Vec<u8> {
        let obj = FileCommandStatusObject {
            file_handle: handle,
            file_size: 0,
            block_size: 2048,
            request_id: 0,
            status,
        };
        wrap_free_format(4, &obj.encode())
    }

    #[test]
    fn lists_two_entries_then_closes() {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let entries2 = entries.clone();
        let mut task = DirectoryListingTask::new(
            "/",
            Box::new(move |descs| entries2.lock().unwrap().extend(descs)),
        );
        task.build_request();
        let opened = open_status(dnp3_file::FileCommandStatus::Success, 9);
        task.process_response(Iin::empty(), &opened);

        let mut data = descriptor("a.txt").encode();
        data.extend(descriptor("b.txt").encode());
        let block = FileTransport {
            file_handle: 9,
            block_number: 0,
            is_last_block: true,
            data,
        };
        let resp = wrap_free_format(5, &block.encode());
        let step = task.process_response(Iin::empty(), &resp);
        match step {
            TaskStep::Continue(req) => assert_eq!(req.function, FunctionCode::CloseFile),
            other => panic!("expected Continue, got {other:?}"),
        }
        assert_eq!(entries.lock().unwrap().len(), 2);

        let closed = open_status(dnp3_file::FileCommandStatus::Success, 9);
        assert_eq!(
            task.process_response(Iin::empty(), &closed),
            TaskStep::Done(TaskCompletion::Success)
        );
    }

    #[test]
    fn get_file_info_reports_single_descriptor() {
        let found = Arc::new(Mutex::new(None));
        let found2 = found.clone();
        let mut task = GetFileInfoTask::new("/a.bin", Box::new(move |d| *found2.lock().unwrap() = Some(d)));
        let req = task.build_request();
        assert_eq!(req.function, FunctionCode::GetFileInfo);

        let resp = wrap_free_format(7, &descriptor("a.bin").encode());
        assert_eq!(
            task.process_response(Iin::empty(), &resp),
            TaskStep::Done(TaskCompletion::Success)
        );
        assert_eq!(found.lock().unwrap().as_ref().unwrap().name, "a.bin");
    }
}
