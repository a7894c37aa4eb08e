//! Master-side application layer: fragment building, response
//! validation, multi-fragment accumulation, and IIN-driven scheduler hooks.

use crate::app::header::{AppControl, AppError, FunctionCode, RequestFragment, ResponseFragment};
use dnp3_objects::Iin;

/// A confirm the master owes the outstation, tagged by which response
/// category it answers ("matching the received category").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirm {
    Solicited(u8),
    Unsolicited(u8),
}

/// Scheduler-visible reactions to IIN bits in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IinAction {
    DemandClearRestartAndIntegrity,
    DemandIntegrity,
    DemandTimeSync,
    DemandEventScan,
}

#[derive(Debug, Clone, Copy)]
struct OutstandingRequest {
    seq: u8,
}

/// Outcome of feeding a response fragment to [`MasterApplication::on_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterOutcome {
    /// A complete APDU (possibly spanning several fragments) was assembled.
    Complete {
        iin: Iin,
        objects: Vec<u8>,
        needs_confirm: Option<u8>,
        unsolicited: bool,
    },
    /// FIR seen, more fragments expected before FIN.
    Partial,
    /// The fragment was logged and dropped (`BadSequence`).
    Dropped(&'static str),
}

/// Master-side application layer state.
pub struct MasterApplication {
    next_seq: u8,
    max_tx_fragment_size: usize,
    outstanding: Option<OutstandingRequest>,
    accumulator: Vec<u8>,
    accumulating: bool,
    event_scan_on_events_available: bool,
}

impl MasterApplication {
    pub fn new(max_tx_fragment_size: usize) -> Self {
        Self {
            next_seq: 0,
            max_tx_fragment_size,
            outstanding: None,
            accumulator: Vec::new(),
            accumulating: false,
            event_scan_on_events_available: true,
        }
    }

    pub fn set_event_scan_on_events_available(&mut self, enabled: bool) {
        self.event_scan_on_events_available = enabled;
    }

    /// Builds the next request fragment, advancing the sequence counter
    /// mod 16 and recording it as the outstanding request awaiting a
    /// solicited response.
    pub fn build_request(
        &mut self,
        function: FunctionCode,
        objects: Vec<u8>,
        confirm: bool,
    ) -> Result<RequestFragment, AppError> {
        if objects.len() + 2 > self.max_tx_fragment_size {
            return Err(AppError::BadObject(
                "request exceeds max_tx_fragment_size".into(),
            ));
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1) & 0x0F;
        self.outstanding = Some(OutstandingRequest { seq });
        Ok(RequestFragment {
            control: AppControl::single(seq, confirm, false),
            function,
            objects,
        })
    }

    /// Builds a bare `CONFIRM` fragment answering either a solicited or
    /// unsolicited response.
    pub fn build_confirm(&self, confirm: PendingConfirm) -> RequestFragment {
        let (seq, uns) = match confirm {
            PendingConfirm::Solicited(seq) => (seq, false),
            PendingConfirm::Unsolicited(seq) => (seq, true),
        };
        RequestFragment {
            control: AppControl {
                fir: true,
                fin: true,
                con: false,
                uns,
                seq: seq & 0x0F,
            },
            function: FunctionCode::Confirm,
            objects: Vec::new(),
        }
    }

    /// Clears the outstanding request, e.g. on task timeout/cancellation.
    pub fn clear_outstanding(&mut self) {
        self.outstanding = None;
        self.accumulator.clear();
        self.accumulating = false;
    }

    /// Processes one response fragment (function/SEQ validation,
    /// multi-fragment accumulation, confirm queuing).
    pub fn on_response(&mut self, resp: &ResponseFragment) -> MasterOutcome {
        if !resp.function.is_response() {
            return MasterOutcome::Dropped("function code is not a response");
        }

        let unsolicited = resp.function == FunctionCode::UnsolicitedResponse;
        if !unsolicited {
            match self.outstanding {
                Some(OutstandingRequest { seq }) if seq == resp.control.seq => {}
                _ => return MasterOutcome::Dropped("solicited sequence mismatch"),
            }
        }

        if resp.control.fir {
            self.accumulator.clear();
            self.accumulating = true;
        } else if !self.accumulating {
            return MasterOutcome::Dropped("non-FIR fragment with no fragment in progress");
        }

        self.accumulator.extend_from_slice(&resp.objects);

        if !resp.control.fin {
            return MasterOutcome::Partial;
        }

        self.accumulating = false;
        let objects = std::mem::take(&mut self.accumulator);
        if !unsolicited {
            self.outstanding = None;
        }

        let needs_confirm = resp.control.con.then_some(resp.control.seq);

        MasterOutcome::Complete {
            iin: resp.iin,
            objects,
            needs_confirm,
            unsolicited,
        }
    }

    /// Maps IIN bits to scheduler demands.
    pub fn iin_actions(&self, iin: Iin) -> Vec<IinAction> {
        let mut actions = Vec::new();
        if iin.has(Iin::DEVICE_RESTART) {
            actions.push(IinAction::DemandClearRestartAndIntegrity);
        }
        if iin.has(Iin::EVENT_BUFFER_OVERFLOW) {
            actions.push(IinAction::DemandIntegrity);
        }
        if iin.has(Iin::NEED_TIME) {
            actions.push(IinAction::DemandTimeSync);
        }
        if self.event_scan_on_events_available && iin.class_n_events() {
            actions.push(IinAction::DemandEventScan);
        }
        actions
    }
}
