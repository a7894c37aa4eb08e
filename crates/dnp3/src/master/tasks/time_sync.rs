//! Non-LAN time sync: `DELAY_MEASURE`, then `WRITE` of Group 50 Var 1 with
//! `now + rtt/2`.

use std::time::Instant;

use dnp3_dtyp::Timestamp;
use dnp3_objects::{Iin, ObjectHeader, TimeAndDate, TimeDelayFine};

use crate::app::header::FunctionCode;
use crate::master::task::{Task, TaskCompletion, TaskRequest, TaskStep, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingDelay,
    AwaitingWriteAck,
}

pub struct TimeSyncTask {
    state: State,
    sent_at: Option<Instant>,
}

impl TimeSyncTask {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingDelay,
            sent_at: None,
        }
    }
}

impl Default for TimeSyncTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for TimeSyncTask {
    fn task_type(&self) -> TaskType {
        TaskType::TimeSync
    }

    fn name(&self) -> &str {
        "time_sync"
    }

    fn is_recurring(&self) -> bool {
        true
    }

    fn on_start(&mut self) {
        self.state = State::AwaitingDelay;
        self.sent_at = None;
    }

    fn build_request(&mut self) -> TaskRequest {
        self.sent_at = Some(Instant::now());
        TaskRequest {
            function: FunctionCode::DelayMeasure,
            objects: Vec::new(),
            confirm: false,
        }
    }

    fn process_response(&mut self, _iin: Iin, objects: &[u8]) -> TaskStep {
        match self.state {
            State::AwaitingDelay => {
                let Ok((header, consumed)) = ObjectHeader::read(objects) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                if header.group != 52 || header.variation != 2 {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                }
                let Ok(delay) = TimeDelayFine::read(&objects[consumed..]) else {
                    return TaskStep::Done(TaskCompletion::FailureBadResponse);
                };
                let rtt = self
                    .sent_at
                    .map(|sent| sent.elapsed())
                    .unwrap_or_default();
                let target = Timestamp::now().checked_add(rtt / 2 + std::time::Duration::from_millis(delay.delay_ms as u64) / 2);

                let mut write_objects = Vec::new();
                ObjectHeader::range8(50, 1, 0, 0).write(&mut write_objects);
                TimeAndDate { time: target }.write(&mut write_objects);

                self.state = State::AwaitingWriteAck;
                TaskStep::Continue(TaskRequest {
                    function: FunctionCode::Write,
                    objects: write_objects,
                    confirm: false,
                })
            }
            State::AwaitingWriteAck => TaskStep::Done(TaskCompletion::Success),
        }
    }
}
