//! Outstation dispatch engine: maps an incoming request's function
//! code onto duplicate-request handling, the command dispatcher, the file
//! transfer worker, and the time/restart/class-assignment side effects.
//! The engine holds no point database; static/event data, command
//! execution, and restart delays all come from externally-supplied
//! handlers, the same collaborator pattern as the master's
//! [`ObjectSink`](crate::master::tasks::ObjectSink).

use std::time::{Duration, Instant};

use dnp3_dtyp::Timestamp;
use dnp3_file::{FileCommand, FileCommandStatus, FileCommandStatusObject, FileOpeningMode, FileTransport, FileTransportStatusObject};
use dnp3_objects::{AnalogOutputCommand32, ClassMask, CommandStatus, Crob, Iin, ObjectHeader, Qualifier, TimeAndDate, TimeDelayFine};

use crate::app::header::{AppControl, FunctionCode, ResponseFragment};
use crate::app::outstation::{DispatchDecision, OutstationApplication, SelectOperateError};
use crate::config::EventBufferConfig;
use crate::master::tasks::file_common::{unwrap_free_format, wrap_free_format};
use crate::outstation::file_worker::FileTransferWorker;
use crate::outstation::unsolicited::{UnsolicitedOutcome, UnsolicitedScheduler};

/// Executes CROB / analog-output commands against the device for
/// SELECT/OPERATE/DIRECT_OPERATE.
pub trait CommandHandler {
    fn select_crob(&mut self, index: u32, crob: &Crob) -> CommandStatus;
    fn operate_crob(&mut self, index: u32, crob: &Crob) -> CommandStatus;
    fn select_analog(&mut self, index: u32, cmd: &AnalogOutputCommand32) -> CommandStatus;
    fn operate_analog(&mut self, index: u32, cmd: &AnalogOutputCommand32) -> CommandStatus;
}

/// Gathers static/event data for a READ, already encoded as
/// Group/Variation object data ready to append to the response.
pub trait ReadHandler {
    fn read(&mut self, class_mask: ClassMask) -> Vec<u8>;
}

/// Applies the side effects of a WRITE that isn't a file-transfer block
/// (time, class-mask).
pub trait WriteHandler {
    fn set_time(&mut self, time: Timestamp);
    /// A WRITE object group/range the engine doesn't interpret itself
    /// (anything other than Group 50 time or Group 80 restart-clear);
    /// `payload` is the raw object bytes following the header.
    fn assign_class(&mut self, group: u8, start: u32, stop: u32, payload: &[u8]);
}

pub trait RestartHandler {
    fn cold_restart(&mut self) -> Duration;
    fn warm_restart(&mut self) -> Duration;
}

/// Bundles the four collaborator traits for a single dispatch call.
pub struct Handlers<'a> {
    pub command: &'a mut dyn CommandHandler,
    pub read: &'a mut dyn ReadHandler,
    pub write: &'a mut dyn WriteHandler,
    pub restart: &'a mut dyn RestartHandler,
}

/// What the channel's strand should do with a just-dispatched request.
pub enum EngineOutcome {
    Respond { objects: Vec<u8>, iin: Iin },
    Retransmit(Vec<u8>),
    /// Broadcast requests are executed but never answered.
    NoReply,
}

/// Bit index of `DEVICE_RESTART` within the Group 80 Var 1 bitmap object,
/// matching `ClearRestartTask`'s master-side encoding.
const DEVICE_RESTART_INDEX: u32 = 7;

pub struct OutstationEngine {
    app: OutstationApplication,
    files: FileTransferWorker,
    active_read_handle: Option<u32>,
    indications: Iin,
    unsolicited: UnsolicitedScheduler,
}

impl OutstationEngine {
    pub fn new(select_timeout: Duration, files: FileTransferWorker) -> Self {
        Self {
            app: OutstationApplication::new(select_timeout),
            files,
            active_read_handle: None,
            indications: Iin::empty(),
            unsolicited: UnsolicitedScheduler::new(false, ClassMask::NONE, EventBufferConfig::default()),
        }
    }

    pub fn set_indication(&mut self, bit: u16, set: bool) {
        self.indications = self.indications.with(bit, set);
    }

    /// Applies the outstation's unsolicited-mode configuration
    /// (`OutstationConfig`), replacing the scheduler built by [`Self::new`].
    pub fn configure_unsolicited(&mut self, enabled: bool, classes: ClassMask, thresholds: EventBufferConfig) {
        self.unsolicited = UnsolicitedScheduler::new(enabled, classes, thresholds);
    }

    /// Notifies the scheduler that a new event was added to `class`'s
    /// buffer, so it can decide whether the count now exceeds the
    /// configured threshold.
    pub fn record_event(&mut self, class: u8) {
        self.unsolicited.record_event(class);
    }

    /// Asks the unsolicited scheduler whether anything is due, and if so
    /// builds the full response fragment: the startup NULL, or
    /// a class-1/2/3 unsolicited response gathered from `handlers.read`.
    pub async fn poll_unsolicited(&mut self, handlers: &mut Handlers<'_>) -> Option<ResponseFragment> {
        match self.unsolicited.poll() {
            UnsolicitedOutcome::None => None,
            UnsolicitedOutcome::Null => Some(self.build_unsolicited(Vec::new())),
            UnsolicitedOutcome::Data(classes) => {
                let objects = handlers.read.read(classes);
                Some(self.build_unsolicited(objects))
            }
        }
    }

    fn build_unsolicited(&mut self, objects: Vec<u8>) -> ResponseFragment {
        let seq = self.app.next_unsolicited_seq();
        ResponseFragment {
            control: AppControl {
                fir: true,
                fin: true,
                con: true,
                uns: true,
                seq,
            },
            function: FunctionCode::UnsolicitedResponse,
            iin: self.indications,
            objects,
        }
    }

    /// Dispatches one solicited request: duplicate detection first,
    /// then the function-code-specific handling.
    pub async fn dispatch(
        &mut self,
        now: Instant,
        seq: u8,
        function: FunctionCode,
        objects: &[u8],
        broadcast: bool,
        handlers: &mut Handlers<'_>,
    ) -> EngineOutcome {
        if !broadcast {
            if let DispatchDecision::Retransmit(bytes) = self.app.dispatch(seq, function) {
                return EngineOutcome::Retransmit(bytes);
            }
        }

        let (response_objects, iin) = self.execute(now, seq, function, objects, handlers).await;

        if broadcast {
            self.app.record_response(seq, function, Vec::new(), true);
            return EngineOutcome::NoReply;
        }
        self.app.record_response(seq, function, response_objects.clone(), false);
        EngineOutcome::Respond {
            objects: response_objects,
            iin,
        }
    }

    async fn execute(
        &mut self,
        now: Instant,
        seq: u8,
        function: FunctionCode,
        objects: &[u8],
        handlers: &mut Handlers<'_>,
    ) -> (Vec<u8>, Iin) {
        match function {
            FunctionCode::Read => self.handle_read(objects, handlers).await,
            FunctionCode::Write => self.handle_write(objects, handlers).await,
            FunctionCode::Select => (dispatch_commands(objects, handlers.command, true), self.indications),
            FunctionCode::Operate => self.handle_operate(objects, seq, now, handlers),
            FunctionCode::DirectOperate | FunctionCode::DirectOperateNoAck => {
                (dispatch_commands(objects, handlers.command, false), self.indications)
            }
            FunctionCode::EnableUnsolicited => {
                self.unsolicited.set_enabled(true, requested_classes(objects));
                (objects.to_vec(), self.indications)
            }
            FunctionCode::DisableUnsolicited => {
                self.unsolicited.set_enabled(false, ClassMask::NONE);
                (objects.to_vec(), self.indications)
            }
            FunctionCode::OpenFile => self.handle_open_file(objects).await,
            FunctionCode::CloseFile => self.handle_close_file(objects).await,
            FunctionCode::DeleteFile => self.handle_delete_file(objects).await,
            FunctionCode::GetFileInfo => self.handle_get_file_info(objects).await,
            FunctionCode::AbortFile => self.handle_abort_file(objects).await,
            FunctionCode::ColdRestart => {
                let delay = handlers.restart.cold_restart();
                (encode_restart_delay(delay), self.indications)
            }
            FunctionCode::WarmRestart => {
                let delay = handlers.restart.warm_restart();
                (encode_restart_delay(delay), self.indications)
            }
            other => {
                log::warn!("function code {other:?} is not supported by this outstation");
                (Vec::new(), self.indications.with(Iin::FUNC_NOT_SUPPORTED, true))
            }
        }
    }

    fn handle_operate(
        &mut self,
        objects: &[u8],
        seq: u8,
        now: Instant,
        handlers: &mut Handlers<'_>,
    ) -> (Vec<u8>, Iin) {
        match self.app.operate(objects, seq, now) {
            Ok(()) => (dispatch_commands(objects, handlers.command, false), self.indications),
            Err(SelectOperateError::NoSelect) => {
                (echo_with_status(objects, CommandStatus::NoSelect), self.indications)
            }
            Err(SelectOperateError::Timeout) => {
                (echo_with_status(objects, CommandStatus::Timeout), self.indications)
            }
        }
    }

    async fn handle_read(&mut self, objects: &[u8], handlers: &mut Handlers<'_>) -> (Vec<u8>, Iin) {
        if let Some(handle) = self.active_read_handle {
            let Ok((data, is_last)) = self.files.read_block(handle, self.files.config().preferred_tx_block as usize).await else {
                self.active_read_handle = None;
                return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
            };
            let block = FileTransport {
                file_handle: handle,
                block_number: 0,
                is_last_block: is_last,
                data,
            };
            if is_last {
                self.active_read_handle = None;
            }
            return (wrap_free_format(5, &block.encode()), self.indications);
        }

        let classes = requested_classes(objects);
        (handlers.read.read(classes), self.indications)
    }

    async fn handle_write(&mut self, objects: &[u8], handlers: &mut Handlers<'_>) -> (Vec<u8>, Iin) {
        let mut offset = 0;
        let mut iin = self.indications;
        while offset < objects.len() {
            let Ok((header, consumed)) = ObjectHeader::read(&objects[offset..]) else {
                iin = iin.with(Iin::PARAMETER_ERROR, true);
                break;
            };
            offset += consumed;

            match (header.group, header.variation) {
                (50, 1) => {
                    if let Ok(time) = TimeAndDate::read(&objects[offset..]) {
                        handlers.write.set_time(time.time);
                    }
                    offset += TimeAndDate::SIZE;
                }
                (80, 1) => {
                    let Qualifier::Range8(range) = header.qualifier else {
                        iin = iin.with(Iin::PARAMETER_ERROR, true);
                        break;
                    };
                    for index in range.iter() {
                        let Some(&value) = objects.get(offset) else { break };
                        offset += 1;
                        if index == DEVICE_RESTART_INDEX && value == 0 {
                            self.indications = self.indications.with(Iin::DEVICE_RESTART, false);
                            iin = iin.with(Iin::DEVICE_RESTART, false);
                        }
                    }
                }
                (70, 5) => {
                    let Some(len) = free_format_len(header.qualifier) else {
                        iin = iin.with(Iin::PARAMETER_ERROR, true);
                        break;
                    };
                    let Some(body) = objects.get(offset..offset + len) else {
                        iin = iin.with(Iin::PARAMETER_ERROR, true);
                        break;
                    };
                    offset += len;
                    if let Ok(block) = FileTransport::decode(body) {
                        let status = match self.files.write_block(block.file_handle, &block.data).await {
                            Ok(()) => dnp3_file::FileTransportStatus::Success,
                            Err(status) => status,
                        };
                        let response = FileTransportStatusObject {
                            file_handle: block.file_handle,
                            block_number: block.block_number,
                            status,
                            info: Vec::new(),
                        };
                        return (wrap_free_format(6, &response.encode()), self.indications);
                    }
                }
                (group, _) => {
                    let (start, stop) = match header.qualifier {
                        Qualifier::Range8(r) | Qualifier::Range16(r) => (r.start, r.stop),
                        _ => (0, 0),
                    };
                    handlers.write.assign_class(group, start, stop, &objects[offset..]);
                    break;
                }
            }
        }
        (Vec::new(), iin)
    }

    async fn handle_open_file(&mut self, objects: &[u8]) -> (Vec<u8>, Iin) {
        let Some(body) = unwrap_free_format(3, objects) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let Ok(command) = FileCommand::decode(body) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };

        let result = match command.mode {
            FileOpeningMode::Write => self.files.open_write(&command.name).await.map(|h| (h, 0)),
            _ => self.files.open_read(&command.name).await,
        };

        let response = match result {
            Ok((handle, size)) => {
                if command.mode != FileOpeningMode::Write {
                    self.active_read_handle = Some(handle);
                }
                FileCommandStatusObject {
                    file_handle: handle,
                    file_size: size,
                    block_size: self.files.config().preferred_tx_block,
                    request_id: command.request_id,
                    status: FileCommandStatus::Success,
                }
            }
            Err(status) => FileCommandStatusObject {
                file_handle: 0,
                file_size: 0,
                block_size: 0,
                request_id: command.request_id,
                status,
            },
        };
        (wrap_free_format(4, &response.encode()), self.indications)
    }

    async fn handle_close_file(&mut self, objects: &[u8]) -> (Vec<u8>, Iin) {
        let Some(body) = unwrap_free_format(3, objects) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let Ok(command) = FileCommand::decode(body) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let handle = command.request_id as u32;
        let status = self.files.close(handle).await;
        if self.active_read_handle == Some(handle) {
            self.active_read_handle = None;
        }
        let response = FileCommandStatusObject {
            file_handle: handle,
            file_size: 0,
            block_size: 0,
            request_id: command.request_id,
            status,
        };
        (wrap_free_format(4, &response.encode()), self.indications)
    }

    async fn handle_delete_file(&mut self, objects: &[u8]) -> (Vec<u8>, Iin) {
        let Some(body) = unwrap_free_format(3, objects) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let Ok(command) = FileCommand::decode(body) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let status = self.files.delete(&command.name).await;
        let response = FileCommandStatusObject {
            file_handle: 0,
            file_size: 0,
            block_size: 0,
            request_id: command.request_id,
            status,
        };
        (wrap_free_format(4, &response.encode()), self.indications)
    }

    async fn handle_get_file_info(&mut self, objects: &[u8]) -> (Vec<u8>, Iin) {
        let Some(body) = unwrap_free_format(3, objects) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let Ok(command) = FileCommand::decode(body) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        match self.files.file_info(&command.name).await {
            Ok(descriptor) => (wrap_free_format(7, &descriptor.encode()), self.indications),
            Err(status) => {
                let response = FileCommandStatusObject {
                    file_handle: 0,
                    file_size: 0,
                    block_size: 0,
                    request_id: command.request_id,
                    status,
                };
                (wrap_free_format(4, &response.encode()), self.indications)
            }
        }
    }

    async fn handle_abort_file(&mut self, objects: &[u8]) -> (Vec<u8>, Iin) {
        let Some(body) = unwrap_free_format(3, objects) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let Ok(command) = FileCommand::decode(body) else {
            return (Vec::new(), self.indications.with(Iin::PARAMETER_ERROR, true));
        };
        let handle = command.request_id as u32;
        let _ = self.files.close(handle).await;
        if self.active_read_handle == Some(handle) {
            self.active_read_handle = None;
        }
        let response = FileCommandStatusObject {
            file_handle: handle,
            file_size: 0,
            block_size: 0,
            request_id: command.request_id,
            status: FileCommandStatus::Success,
        };
        (wrap_free_format(4, &response.encode()), self.indications)
    }
}

fn free_format_len(qualifier: Qualifier) -> Option<usize> {
    match qualifier {
        Qualifier::FreeFormat(len) => Some(len as usize),
        _ => None,
    }
}

fn encode_restart_delay(delay: Duration) -> Vec<u8> {
    let mut out = Vec::new();
    ObjectHeader::range8(52, 2, 0, 0).write(&mut out);
    TimeDelayFine {
        delay_ms: delay.as_millis().min(u16::MAX as u128) as u16,
    }
    .write(&mut out);
    out
}

/// Group 60 headers in a READ name the requested classes
/// (`IntegrityPollTask` encodes the inverse of this).
fn requested_classes(objects: &[u8]) -> ClassMask {
    let mut mask = ClassMask::NONE;
    let mut offset = 0;
    while offset < objects.len() {
        let Ok((header, consumed)) = ObjectHeader::read(&objects[offset..]) else {
            break;
        };
        offset += consumed;
        if header.group == 60 {
            match header.variation {
                1 => mask.class0 = true,
                2 => mask.class1 = true,
                3 => mask.class2 = true,
                4 => mask.class3 = true,
                _ => {}
            }
        }
    }
    mask
}

/// Rewrites every command object's status byte in place, used to answer a
/// SELECT/OPERATE rejected before it reaches the command handler.
fn echo_with_status(objects: &[u8], status: CommandStatus) -> Vec<u8> {
    let mut out = objects.to_vec();
    let mut offset = 0;
    while offset < out.len() {
        let Ok((header, consumed)) = ObjectHeader::read(&out[offset..]) else {
            break;
        };
        let header_end = offset + consumed;
        let (count, index_width) = match header.qualifier {
            Qualifier::IndexPrefix8(c) => (c as usize, 1),
            Qualifier::IndexPrefix16(c) => (c as usize, 2),
            Qualifier::Range8(r) => (r.count() as usize, 0),
            Qualifier::Range16(r) => (r.count() as usize, 0),
            _ => break,
        };
        let object_size = match (header.group, header.variation) {
            (12, 1) => Crob::SIZE,
            (41, _) => AnalogOutputCommand32::SIZE,
            _ => break,
        };
        let mut cursor = header_end;
        for _ in 0..count {
            cursor += index_width;
            if cursor + object_size > out.len() {
                return out;
            }
            out[cursor + object_size - 1] = status as u8;
            cursor += object_size;
        }
        offset = cursor;
    }
    out
}

/// Walks CROB/analog-output command objects, calling `handler` per object
/// and writing its returned status back into the echoed response.
fn dispatch_commands(objects: &[u8], handler: &mut dyn CommandHandler, select: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < objects.len() {
        let Ok((header, consumed)) = ObjectHeader::read(&objects[offset..]) else {
            break;
        };
        header.write(&mut out);
        offset += consumed;

        let (count, index_width) = match header.qualifier {
            Qualifier::IndexPrefix8(c) => (c as usize, 1),
            Qualifier::IndexPrefix16(c) => (c as usize, 2),
            Qualifier::Range8(r) => (r.count() as usize, 0),
            Qualifier::Range16(r) => (r.count() as usize, 0),
            _ => break,
        };
        let range_start = match header.qualifier {
            Qualifier::Range8(r) | Qualifier::Range16(r) => r.start,
            _ => 0,
        };

        for i in 0..count {
            let index = if index_width > 0 {
                let idx = if index_width == 1 {
                    objects.get(offset).copied().unwrap_or(0) as u32
                } else {
                    let bytes = objects.get(offset..offset + 2).unwrap_or(&[0, 0]);
                    u16::from_le_bytes([bytes[0], bytes[1]]) as u32
                };
                out.extend_from_slice(&objects[offset..offset + index_width]);
                offset += index_width;
                idx
            } else {
                range_start + i as u32
            };

            match (header.group, header.variation) {
                (12, 1) => {
                    let Ok(mut crob) = Crob::read(&objects[offset..]) else { break };
                    offset += Crob::SIZE;
                    crob.status = if select {
                        handler.select_crob(index, &crob)
                    } else {
                        handler.operate_crob(index, &crob)
                    };
                    crob.write(&mut out);
                }
                (41, _) => {
                    let Ok(mut cmd) = AnalogOutputCommand32::read(&objects[offset..]) else { break };
                    offset += AnalogOutputCommand32::SIZE;
                    cmd.status = if select {
                        handler.select_analog(index, &cmd)
                    } else {
                        handler.operate_analog(index, &cmd)
                    };
                    cmd.write(&mut out);
                }
                _ => return out,
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outstation::file_worker::FileWorkerConfig;
    use dnp3_objects::{OpType, TripCloseCode};

    struct AcceptAll;

    impl CommandHandler for AcceptAll {
        fn select_crob(&mut self, _index: u32, _crob: &Crob) -> CommandStatus {
            CommandStatus::Success
        }
        fn operate_crob(&mut self, _index: u32, _crob: &Crob) -> CommandStatus {
            CommandStatus::Success
        }
        fn select_analog(&mut self, _index: u32, _cmd: &AnalogOutputCommand32) -> CommandStatus {
            CommandStatus::Success
        }
        fn operate_analog(&mut self, _index: u32, _cmd: &AnalogOutputCommand32) -> CommandStatus {
            CommandStatus::Success
        }
    }

    struct NoData;

    impl ReadHandler for NoData {
        fn read(&mut self, _class_mask: ClassMask) -> Vec<u8> {
            Vec::new()
        }
    }

    struct RecordingWrite {
        last_time: Option<Timestamp>,
    }

    impl WriteHandler for RecordingWrite {
        fn set_time(&mut self, time: Timestamp) {
            self.last_time = Some(time);
        }
        fn assign_class(&mut self, _group: u8, _start: u32, _stop: u32, _payload: &[u8]) {}
    }

    struct FixedRestart;

    impl RestartHandler for FixedRestart {
        fn cold_restart(&mut self) -> Duration {
            Duration::from_secs(2)
        }
        fn warm_restart(&mut self) -> Duration {
            Duration::from_millis(500)
        }
    }

    fn crob_request(index: u8, status: CommandStatus) -> Vec<u8> {
        let mut out = Vec::new();
        ObjectHeader {
            group: 12,
            variation: 1,
            qualifier: Qualifier::IndexPrefix8(1),
        }
        .write(&mut out);
        out.push(index);
        Crob {
            op_type: OpType::LatchOn,
            trip_close: TripCloseCode::Nul,
            clear: false,
            count: 1,
            on_time_ms: 0,
            off_time_ms: 0,
            status,
        }
        .write(&mut out);
        out
    }

    #[tokio::test]
    async fn duplicate_request_is_retransmitted_without_re_executing() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let now = Instant::now();
        let request = crob_request(5, CommandStatus::Success);
        let first = engine.dispatch(now, 3, FunctionCode::DirectOperate, &request, false, &mut handlers).await;
        let EngineOutcome::Respond { objects, .. } = first else {
            panic!("expected a fresh response");
        };

        let second = engine.dispatch(now, 3, FunctionCode::DirectOperate, &request, false, &mut handlers).await;
        match second {
            EngineOutcome::Retransmit(bytes) => assert_eq!(bytes, objects),
            _ => panic!("expected a retransmit"),
        }
    }

    #[tokio::test]
    async fn direct_operate_echoes_success_status() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let request = crob_request(5, CommandStatus::Timeout);
        let now = Instant::now();
        let outcome = engine
            .dispatch(now, 1, FunctionCode::DirectOperate, &request, false, &mut handlers)
            .await;
        let EngineOutcome::Respond { objects, .. } = outcome else {
            panic!("expected a response")
        };
        assert_eq!(*objects.last().unwrap(), CommandStatus::Success as u8);
    }

    #[tokio::test]
    async fn cold_restart_encodes_delay_as_time_delay_fine() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let outcome = engine
            .dispatch(Instant::now(), 1, FunctionCode::ColdRestart, &[], false, &mut handlers)
            .await;
        let EngineOutcome::Respond { objects, .. } = outcome else {
            panic!("expected a response")
        };
        assert_eq!(&objects[0..3], &[52, 2, 0x00]);
        let delay = TimeDelayFine::read(&objects[3..]).unwrap();
        assert_eq!(delay.delay_ms, 2000);
    }

    #[tokio::test]
    async fn write_of_time_invokes_write_handler() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let mut objects = Vec::new();
        ObjectHeader::range8(50, 1, 0, 0).write(&mut objects);
        TimeAndDate { time: Timestamp::from_millis(12345) }.write(&mut objects);

        engine.dispatch(Instant::now(), 1, FunctionCode::Write, &objects, false, &mut handlers).await;
        assert_eq!(write.last_time, Some(Timestamp::from_millis(12345)));
    }

    #[tokio::test]
    async fn broadcast_request_produces_no_reply() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let outcome = engine
            .dispatch(Instant::now(), 1, FunctionCode::DirectOperate, &crob_request(1, CommandStatus::Success), true, &mut handlers)
            .await;
        assert!(matches!(outcome, EngineOutcome::NoReply));
        assert!(engine.app.last_request_was_broadcast());
    }

    fn group60_request(variations: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in variations {
            ObjectHeader::all_objects(60, *v).write(&mut out);
        }
        out
    }

    #[tokio::test]
    async fn enable_unsolicited_then_startup_null_is_polled_once() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        let outcome = engine
            .dispatch(Instant::now(), 1, FunctionCode::EnableUnsolicited, &group60_request(&[2, 3, 4]), false, &mut handlers)
            .await;
        assert!(matches!(outcome, EngineOutcome::Respond { .. }));

        let first = engine.poll_unsolicited(&mut handlers).await.unwrap();
        assert_eq!(first.function, FunctionCode::UnsolicitedResponse);
        assert!(first.control.uns);
        assert!(first.objects.is_empty());
        assert!(engine.poll_unsolicited(&mut handlers).await.is_none());
    }

    #[tokio::test]
    async fn crossing_event_threshold_produces_an_unsolicited_data_response() {
        let files = FileTransferWorker::new(std::env::temp_dir(), FileWorkerConfig::default());
        let mut engine = OutstationEngine::new(Duration::from_secs(5), files);
        let mut command = AcceptAll;
        let mut read = NoData;
        let mut write = RecordingWrite { last_time: None };
        let mut restart = FixedRestart;
        let mut handlers = Handlers {
            command: &mut command,
            read: &mut read,
            write: &mut write,
            restart: &mut restart,
        };

        engine.configure_unsolicited(
            true,
            ClassMask::EVENTS,
            crate::config::EventBufferConfig {
                max_class1: 2,
                max_class2: 100,
                max_class3: 100,
            },
        );
        engine.poll_unsolicited(&mut handlers).await; // drain the startup NULL

        engine.record_event(1);
        assert!(engine.poll_unsolicited(&mut handlers).await.is_none());
        engine.record_event(1);
        let fired = engine.poll_unsolicited(&mut handlers).await;
        assert!(fired.is_some());
    }
}
