//! Transport Function: splits an APDU into <=249-byte segments on
//! send, and reassembles segments back into an APDU on receive.

use modular_bitfield::prelude::*;
use thiserror::Error;

/// Maximum payload carried by a single transport segment.
pub const MAX_SEGMENT_PAYLOAD: usize = 249;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportFunctionError {
    #[error("received a non-FIR segment while expecting FIR")]
    ExpectedFir,
    #[error("transport sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u8, got: u8 },
    #[error("segment payload empty")]
    EmptySegment,
}

/// Bit layout of a transport segment header: `FIR(1)|FIN(1)|SEQ(6)`.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct SegmentHeaderBits {
    seq: B6,
    fin: bool,
    fir: bool,
}

/// One transport-layer segment header: `FIR(1)|FIN(1)|SEQ(6)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub fir: bool,
    pub fin: bool,
    pub seq: u8,
}

impl SegmentHeader {
    fn to_byte(self) -> u8 {
        SegmentHeaderBits::new()
            .with_seq(self.seq & 0x3F)
            .with_fin(self.fin)
            .with_fir(self.fir)
            .into_bytes()[0]
    }

    fn from_byte(b: u8) -> Self {
        let bits = SegmentHeaderBits::from_bytes([b]);
        Self {
            fir: bits.fir(),
            fin: bits.fin(),
            seq: bits.seq(),
        }
    }
}

/// Splits `apdu` into segments of at most [`MAX_SEGMENT_PAYLOAD`] bytes,
/// each prefixed with its one-byte transport header. `seq` is the
/// starting sequence number (mod 64) for the first (FIR) segment.
pub fn segment(apdu: &[u8], start_seq: u8) -> Vec<Vec<u8>> {
    if apdu.is_empty() {
        let header = SegmentHeader {
            fir: true,
            fin: true,
            seq: start_seq & 0x3F,
        };
        return vec![vec![header.to_byte()]];
    }

    let chunks: Vec<&[u8]> = apdu.chunks(MAX_SEGMENT_PAYLOAD).collect();
    let last = chunks.len() - 1;
    let mut seq = start_seq & 0x3F;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let header = SegmentHeader {
                fir: i == 0,
                fin: i == last,
                seq,
            };
            seq = seq.wrapping_add(1) & 0x3F;
            let mut out = Vec::with_capacity(1 + chunk.len());
            out.push(header.to_byte());
            out.extend_from_slice(chunk);
            out
        })
        .collect()
}

/// Reassembly state machine: `{ expecting_fir, next_seq, accumulator }`.
#[derive(Debug, Default)]
pub struct Reassembler {
    expecting_fir: bool,
    next_seq: u8,
    accumulator: Vec<u8>,
    in_progress: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            expecting_fir: true,
            next_seq: 0,
            accumulator: Vec::new(),
            in_progress: false,
        }
    }

    /// Feeds one raw segment (header byte + payload). Returns `Some(apdu)`
    /// when a FIN segment completes an APDU, `None` while still
    /// accumulating, or an error for a malformed sequence (which resets
    /// the reassembler to expect a fresh FIR).
    pub fn accept(&mut self, segment: &[u8]) -> Result<Option<Vec<u8>>, TransportFunctionError> {
        if segment.is_empty() {
            return Err(TransportFunctionError::EmptySegment);
        }
        let header = SegmentHeader::from_byte(segment[0]);
        let payload = &segment[1..];

        if header.fir {
            self.accumulator.clear();
            self.accumulator.extend_from_slice(payload);
            self.next_seq = header.seq.wrapping_add(1) & 0x3F;
            self.in_progress = true;
            self.expecting_fir = false;
            if header.fin {
                self.in_progress = false;
                self.expecting_fir = true;
                return Ok(Some(std::mem::take(&mut self.accumulator)));
            }
            return Ok(None);
        }

        if self.expecting_fir || !self.in_progress {
            self.reset();
            return Err(TransportFunctionError::ExpectedFir);
        }

        if header.seq != self.next_seq {
            let expected = self.next_seq;
            self.reset();
            return Err(TransportFunctionError::SequenceMismatch {
                expected,
                got: header.seq,
            });
        }

        self.accumulator.extend_from_slice(payload);
        self.next_seq = header.seq.wrapping_add(1) & 0x3F;

        if header.fin {
            self.in_progress = false;
            self.expecting_fir = true;
            return Ok(Some(std::mem::take(&mut self.accumulator)));
        }

        Ok(None)
    }

    fn reset(&mut self) {
        self.in_progress = false;
        self.expecting_fir = true;
        self.accumulator.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmentation_of_500_bytes() {
        let apdu: Vec<u8> = (0..500).map(|i| (i % 256) as u8).collect();
        let segments = segment(&apdu, 5);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 1 + 249);
        assert_eq!(segments[1].len(), 1 + 249);
        assert_eq!(segments[2].len(), 1 + 2);

        let h0 = SegmentHeader::from_byte(segments[0][0]);
        assert!(h0.fir && !h0.fin && h0.seq == 5);
        let h2 = SegmentHeader::from_byte(segments[2][0]);
        assert!(!h2.fir && h2.fin && h2.seq == 7);

        let mut reassembler = Reassembler::new();
        assert_eq!(reassembler.accept(&segments[0]).unwrap(), None);
        assert_eq!(reassembler.accept(&segments[1]).unwrap(), None);
        let result = reassembler.accept(&segments[2]).unwrap().unwrap();
        assert_eq!(result, apdu);
    }

    #[test]
    fn non_fir_while_expecting_fir_is_discarded() {
        let mut reassembler = Reassembler::new();
        let bad = SegmentHeader {
            fir: false,
            fin: true,
            seq: 0,
        };
        let mut buf = vec![bad.to_byte()];
        buf.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            reassembler.accept(&buf),
            Err(TransportFunctionError::ExpectedFir)
        );
    }

    #[test]
    fn sequence_mismatch_aborts_reassembly() {
        let mut reassembler = Reassembler::new();
        let fir = SegmentHeader {
            fir: true,
            fin: false,
            seq: 10,
        };
        reassembler.accept(&[fir.to_byte(), 1, 2]).unwrap();

        let wrong = SegmentHeader {
            fir: false,
            fin: true,
            seq: 12,
        };
        let result = reassembler.accept(&[wrong.to_byte(), 3]);
        assert_eq!(
            result,
            Err(TransportFunctionError::SequenceMismatch {
                expected: 11,
                got: 12
            })
        );

        // Reassembler should now expect a fresh FIR, not continue the old APDU.
        let fir2 = SegmentHeader {
            fir: true,
            fin: true,
            seq: 0,
        };
        let apdu = reassembler.accept(&[fir2.to_byte(), 9]).unwrap().unwrap();
        assert_eq!(apdu, vec![9]);
    }

    #[test]
    fn empty_apdu_segments_to_a_single_fir_fin() {
        let segments = segment(&[], 3);
        assert_eq!(segments.len(), 1);
        let mut reassembler = Reassembler::new();
        let apdu = reassembler.accept(&segments[0]).unwrap().unwrap();
        assert!(apdu.is_empty());
    }
}
