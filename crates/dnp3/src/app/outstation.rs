//! Outstation-side application layer: duplicate-request retry
//! safety, broadcast tracking, and the SELECT/OPERATE buffer.

use std::time::{Duration, Instant};

use dnp3_dtyp::crc16_dnp;

use crate::app::header::FunctionCode;

/// Outcome of the SBO timeout/length/CRC check on an OPERATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOperateError {
    /// No prior SELECT, or it was for a different object set.
    NoSelect,
    /// More than `select_timeout` elapsed since the SELECT.
    Timeout,
}

#[derive(Debug, Clone, Copy)]
struct SelectState {
    seq_expected: u8,
    select_time: Instant,
    crc: u16,
    length: usize,
}

/// What the outstation should do with an incoming request, decided by
/// the duplicate-detection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Execute the request fresh and build a new response.
    Execute,
    /// Retransmit the previously-built response for this exact (seq, function)
    /// verbatim, without re-executing (the DNP3 retry-safety contract).
    Retransmit(Vec<u8>),
}

/// Outstation-side application layer state.
pub struct OutstationApplication {
    last_solicited_seq: Option<u8>,
    last_solicited_function: Option<FunctionCode>,
    last_solicited_response: Vec<u8>,
    unsolicited_seq: u8,
    last_broadcast: bool,
    select_buffer: Option<SelectState>,
    select_timeout: Duration,
}

impl OutstationApplication {
    pub fn new(select_timeout: Duration) -> Self {
        Self {
            last_solicited_seq: None,
            last_solicited_function: None,
            last_solicited_response: Vec::new(),
            unsolicited_seq: 0,
            last_broadcast: false,
            select_buffer: None,
            select_timeout,
        }
    }

    /// Decides whether a newly-arrived solicited request should be executed
    /// or answered by retransmitting the previous response.
    pub fn dispatch(&self, seq: u8, function: FunctionCode) -> DispatchDecision {
        if self.last_solicited_seq == Some(seq) && self.last_solicited_function == Some(function) {
            DispatchDecision::Retransmit(self.last_solicited_response.clone())
        } else {
            DispatchDecision::Execute
        }
    }

    /// Records the response built for a freshly-executed solicited request,
    /// so a retry of the same (seq, function) can be answered verbatim.
    pub fn record_response(&mut self, seq: u8, function: FunctionCode, response: Vec<u8>, broadcast: bool) {
        self.last_solicited_seq = Some(seq);
        self.last_solicited_function = Some(function);
        self.last_solicited_response = response;
        self.last_broadcast = broadcast;
    }

    /// Whether the just-processed request was a broadcast (broadcasts
    /// are never confirmed).
    pub fn last_request_was_broadcast(&self) -> bool {
        self.last_broadcast
    }

    pub fn next_unsolicited_seq(&mut self) -> u8 {
        let seq = self.unsolicited_seq;
        self.unsolicited_seq = self.unsolicited_seq.wrapping_add(1) & 0x0F;
        seq
    }

    /// Records a SELECT over `objects`, due to expire after `select_timeout`.
    pub fn select(&mut self, objects: &[u8], request_seq: u8, now: Instant) {
        self.select_buffer = Some(SelectState {
            seq_expected: request_seq.wrapping_add(1) & 0x0F,
            select_time: now,
            crc: crc16_dnp(objects),
            length: objects.len(),
        });
    }

    /// Validates an OPERATE against the stored SELECT:
    /// sequence, elapsed time, length, and CRC must all match.
    pub fn operate(
        &mut self,
        objects: &[u8],
        request_seq: u8,
        now: Instant,
    ) -> Result<(), SelectOperateError> {
        let select = self.select_buffer.take().ok_or(SelectOperateError::NoSelect)?;

        if select.seq_expected != request_seq
            || select.length != objects.len()
            || select.crc != crc16_dnp(objects)
        {
            return Err(SelectOperateError::NoSelect);
        }

        if now.duration_since(select.select_time) > self.select_timeout {
            return Err(SelectOperateError::Timeout);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_request_is_retransmitted_verbatim() {
        let mut app = OutstationApplication::new(Duration::from_secs(5));
        app.record_response(3, FunctionCode::Read, vec![9, 9, 9], false);
        assert_eq!(
            app.dispatch(3, FunctionCode::Read),
            DispatchDecision::Retransmit(vec![9, 9, 9])
        );
        assert_eq!(app.dispatch(4, FunctionCode::Read), DispatchDecision::Execute);
    }

    #[test]
    fn operate_after_select_timeout_fails() {
        let mut app = OutstationApplication::new(Duration::from_millis(10));
        let objects = vec![12, 1, 0x17, 1, 5];
        let t0 = Instant::now();
        app.select(&objects, 1, t0);
        let later = t0 + Duration::from_millis(50);
        let result = app.operate(&objects, 2, later);
        assert_eq!(result, Err(SelectOperateError::Timeout));
    }

    #[test]
    fn operate_with_matching_select_succeeds() {
        let mut app = OutstationApplication::new(Duration::from_secs(5));
        let objects = vec![12, 1, 0x17, 1, 5];
        let t0 = Instant::now();
        app.select(&objects, 1, t0);
        assert!(app.operate(&objects, 2, t0).is_ok());
        // the buffer is consumed; a second OPERATE with no new SELECT fails.
        assert_eq!(app.operate(&objects, 3, t0), Err(SelectOperateError::NoSelect));
    }

    #[test]
    fn operate_with_different_objects_is_rejected() {
        let mut app = OutstationApplication::new(Duration::from_secs(5));
        app.select(&[12, 1, 0x17, 1, 5], 1, Instant::now());
        let result = app.operate(&[12, 1, 0x17, 1, 6], 2, Instant::now());
        assert_eq!(result, Err(SelectOperateError::NoSelect));
    }
}
