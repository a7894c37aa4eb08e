//! APDU request/response headers: the control byte
//! (`FIR|FIN|CON|UNS|SEQ(4)`), the function code catalogue, and the
//! fragment envelopes built on top of them.

use modular_bitfield::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("apdu too short to contain a control byte and function code")]
    Incomplete,
    #[error("unknown function code {0:#04x}")]
    UnknownFunctionCode(u8),
    #[error("sequence number {got} does not match the expected {expected}")]
    BadSequence { expected: u8, got: u8 },
    #[error("malformed object data: {0}")]
    BadObject(String),
}

/// Application-layer function codes. Not every code in IEEE 1815 Annex A
/// is named here; this enumerates the ones the master tasks and
/// outstation engine actually dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    Confirm,
    Read,
    Write,
    Select,
    Operate,
    DirectOperate,
    DirectOperateNoAck,
    ColdRestart,
    WarmRestart,
    DelayMeasure,
    RecordCurrentTime,
    EnableUnsolicited,
    DisableUnsolicited,
    AssignClass,
    OpenFile,
    CloseFile,
    DeleteFile,
    GetFileInfo,
    AbortFile,
    Response,
    UnsolicitedResponse,
}

impl FunctionCode {
    pub fn code(self) -> u8 {
        use FunctionCode::*;
        match self {
            Confirm => 0,
            Read => 1,
            Write => 2,
            Select => 3,
            Operate => 4,
            DirectOperate => 5,
            DirectOperateNoAck => 6,
            ColdRestart => 13,
            WarmRestart => 14,
            DelayMeasure => 23,
            RecordCurrentTime => 24,
            EnableUnsolicited => 20,
            DisableUnsolicited => 21,
            AssignClass => 22,
            OpenFile => 25,
            CloseFile => 26,
            DeleteFile => 27,
            GetFileInfo => 28,
            AbortFile => 30,
            Response => 129,
            UnsolicitedResponse => 130,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, AppError> {
        use FunctionCode::*;
        Ok(match code {
            0 => Confirm,
            1 => Read,
            2 => Write,
            3 => Select,
            4 => Operate,
            5 => DirectOperate,
            6 => DirectOperateNoAck,
            13 => ColdRestart,
            14 => WarmRestart,
            20 => EnableUnsolicited,
            21 => DisableUnsolicited,
            22 => AssignClass,
            23 => DelayMeasure,
            24 => RecordCurrentTime,
            25 => OpenFile,
            26 => CloseFile,
            27 => DeleteFile,
            28 => GetFileInfo,
            30 => AbortFile,
            129 => Response,
            130 => UnsolicitedResponse,
            other => return Err(AppError::UnknownFunctionCode(other)),
        })
    }

    pub fn is_response(self) -> bool {
        matches!(self, FunctionCode::Response | FunctionCode::UnsolicitedResponse)
    }
}

/// Bit layout of the APDU control byte: `FIR|FIN|CON|UNS|SEQ(4)`.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct AppControlBits {
    seq: B4,
    uns: bool,
    con: bool,
    fin: bool,
    fir: bool,
}

/// The APDU control byte: `FIR(1)|FIN(1)|CON(1)|UNS(1)|SEQ(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppControl {
    pub fir: bool,
    pub fin: bool,
    pub con: bool,
    pub uns: bool,
    pub seq: u8,
}

impl AppControl {
    pub fn single(seq: u8, confirm: bool, unsolicited: bool) -> Self {
        Self {
            fir: true,
            fin: true,
            con: confirm,
            uns: unsolicited,
            seq: seq & 0x0F,
        }
    }

    pub fn to_byte(self) -> u8 {
        AppControlBits::new()
            .with_seq(self.seq & 0x0F)
            .with_uns(self.uns)
            .with_con(self.con)
            .with_fin(self.fin)
            .with_fir(self.fir)
            .into_bytes()[0]
    }

    pub fn from_byte(b: u8) -> Self {
        let bits = AppControlBits::from_bytes([b]);
        Self {
            fir: bits.fir(),
            fin: bits.fin(),
            con: bits.con(),
            uns: bits.uns(),
            seq: bits.seq(),
        }
    }
}

/// A decoded or to-be-encoded request fragment (an APDU request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFragment {
    pub control: AppControl,
    pub function: FunctionCode,
    pub objects: Vec<u8>,
}

impl RequestFragment {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.objects.len());
        out.push(self.control.to_byte());
        out.push(self.function.code());
        out.extend_from_slice(&self.objects);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, AppError> {
        if buf.len() < 2 {
            return Err(AppError::Incomplete);
        }
        Ok(Self {
            control: AppControl::from_byte(buf[0]),
            function: FunctionCode::from_code(buf[1])?,
            objects: buf[2..].to_vec(),
        })
    }
}

/// A decoded or to-be-encoded response fragment, additionally carrying IIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFragment {
    pub control: AppControl,
    pub function: FunctionCode,
    pub iin: dnp3_objects::Iin,
    pub objects: Vec<u8>,
}

impl ResponseFragment {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.objects.len());
        out.push(self.control.to_byte());
        out.push(self.function.code());
        out.extend_from_slice(&self.iin.to_le_bytes());
        out.extend_from_slice(&self.objects);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, AppError> {
        if buf.len() < 4 {
            return Err(AppError::Incomplete);
        }
        let control = AppControl::from_byte(buf[0]);
        let function = FunctionCode::from_code(buf[1])?;
        if !function.is_response() {
            return Err(AppError::BadObject(format!(
                "function code {:?} is not a response",
                function
            )));
        }
        let iin = dnp3_objects::Iin::from_le_bytes([buf[2], buf[3]]);
        Ok(Self {
            control,
            function,
            iin,
            objects: buf[4..].to_vec(),
        })
    }
}
