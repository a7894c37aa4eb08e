//! Fixed catalogue of static/event point objects: Groups
//! 1,2,3,4,10,11,12,20,21,22,23,30,32,40,41,50,51,52.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use modular_bitfield::prelude::*;

use crate::{Flags, ObjectError, Result};
use dnp3_dtyp::Timestamp;

macro_rules! fixed_width_object {
    ($name:ident, $size:expr, $group:expr) => {
        impl $name {
            pub const SIZE: usize = $size;
        }
        impl $name {
            #[allow(dead_code)]
            const GROUP: u8 = $group;
        }
    };
}

/// Wraps a `binrw`-derived type's `read_le`/`write_le` in the
/// `Vec<u8>`-based `read`/`write` signature the object catalogue uses.
macro_rules! binrw_object {
    ($name:ident, $group:expr, $variation:expr) => {
        impl $name {
            pub fn write(&self, out: &mut Vec<u8>) {
                let mut cursor = Cursor::new(Vec::new());
                self.write_le(&mut cursor).expect("write to Vec cannot fail");
                out.extend_from_slice(&cursor.into_inner());
            }

            pub fn read(buf: &[u8]) -> Result<Self> {
                if buf.len() < Self::SIZE {
                    return Err(ObjectError::TooShort {
                        group: $group,
                        variation: $variation,
                    });
                }
                let mut cursor = Cursor::new(buf);
                Self::read_le(&mut cursor).map_err(|_| ObjectError::TooShort {
                    group: $group,
                    variation: $variation,
                })
            }
        }
    };
}

/// Group 1 var 2 / Group 3 var 2-style "with flags" boolean point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BinaryInput {
    pub flags: Flags,
}
fixed_width_object!(BinaryInput, 1, 1);
binrw_object!(BinaryInput, 1, 2);

/// Group 2 var 2: binary input event with absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BinaryInputEvent {
    pub flags: Flags,
    pub time: Timestamp,
}
fixed_width_object!(BinaryInputEvent, 7, 2);
binrw_object!(BinaryInputEvent, 2, 2);

/// Group 20 var 1: binary counter with flags, 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Counter32 {
    pub flags: Flags,
    pub value: u32,
}
fixed_width_object!(Counter32, 5, 20);
binrw_object!(Counter32, 20, 1);

/// Group 22 var 1: counter change event with 32-bit value, no time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct CounterEvent32 {
    pub flags: Flags,
    pub value: u32,
}
fixed_width_object!(CounterEvent32, 5, 22);
binrw_object!(CounterEvent32, 22, 1);

/// Group 30 var 1: analog input with flags, 32-bit signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AnalogInput32 {
    pub flags: Flags,
    pub value: i32,
}
fixed_width_object!(AnalogInput32, 5, 30);
binrw_object!(AnalogInput32, 30, 1);

/// Group 32 var 1: analog change event with 32-bit value, no time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AnalogInputEvent32 {
    pub flags: Flags,
    pub value: i32,
}
fixed_width_object!(AnalogInputEvent32, 5, 32);
binrw_object!(AnalogInputEvent32, 32, 1);

/// Group 40 var 1: analog output status with flags, 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AnalogOutputStatus32 {
    pub flags: Flags,
    pub value: i32,
}
fixed_width_object!(AnalogOutputStatus32, 5, 40);
binrw_object!(AnalogOutputStatus32, 40, 1);

/// Command result reported per-object in echoes of SELECT/OPERATE/DIRECT_OPERATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success = 0,
    Timeout = 1,
    NoSelect = 2,
    FormatError = 3,
    NotSupported = 4,
    AlreadyActive = 5,
    HardwareError = 6,
    Local = 7,
    TooManyOps = 8,
    NotAuthorized = 9,
    AutomationInhibit = 10,
    ProcessingLimited = 11,
    OutOfRange = 12,
    DownstreamLocal = 13,
    AlreadyComplete = 14,
    Blocked = 15,
    Cancelled = 16,
    BlockedOtherMaster = 17,
    DownstreamFail = 18,
    NonParticipating = 126,
    Undefined = 127,
}

impl CommandStatus {
    pub fn try_from_u8(v: u8) -> Self {
        use CommandStatus::*;
        match v {
            0 => Success,
            1 => Timeout,
            2 => NoSelect,
            3 => FormatError,
            4 => NotSupported,
            5 => AlreadyActive,
            6 => HardwareError,
            7 => Local,
            8 => TooManyOps,
            9 => NotAuthorized,
            10 => AutomationInhibit,
            11 => ProcessingLimited,
            12 => OutOfRange,
            13 => DownstreamLocal,
            14 => AlreadyComplete,
            15 => Blocked,
            16 => Cancelled,
            17 => BlockedOtherMaster,
            18 => DownstreamFail,
            126 => NonParticipating,
            _ => Undefined,
        }
    }
}

/// The control-code operation type selected in a CROB (bits 0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Nul = 0,
    PulseOn = 1,
    PulseOff = 2,
    LatchOn = 3,
    LatchOff = 4,
}

/// The trip/close code selected in a CROB (bits 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripCloseCode {
    Nul = 0,
    Close = 1,
    Trip = 2,
}

/// Bit layout of the CROB control-code byte: `TCC(2)|res|CR|OP_TYPE(4)`.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct ControlCodeBits {
    op_type: B4,
    #[skip]
    __: B1,
    clear: bool,
    trip_close: B2,
}

/// Group 12 var 1: Control Relay Output Block, the binary command object
/// used by DIRECT_OPERATE / SELECT / OPERATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crob {
    pub op_type: OpType,
    pub trip_close: TripCloseCode,
    pub clear: bool,
    pub count: u8,
    pub on_time_ms: u32,
    pub off_time_ms: u32,
    pub status: CommandStatus,
}
fixed_width_object!(Crob, 11, 12);

impl Crob {
    fn control_code(&self) -> u8 {
        ControlCodeBits::new()
            .with_op_type(self.op_type as u8)
            .with_clear(self.clear)
            .with_trip_close(self.trip_close as u8)
            .into_bytes()[0]
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let mut cursor = Cursor::new(Vec::new());
        self.control_code()
            .write_le(&mut cursor)
            .and_then(|_| self.count.write_le(&mut cursor))
            .and_then(|_| self.on_time_ms.write_le(&mut cursor))
            .and_then(|_| self.off_time_ms.write_le(&mut cursor))
            .and_then(|_| (self.status as u8).write_le(&mut cursor))
            .expect("write to Vec cannot fail");
        out.extend_from_slice(&cursor.into_inner());
    }

    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(ObjectError::TooShort {
                group: 12,
                variation: 1,
            });
        }
        let too_short = || ObjectError::TooShort {
            group: 12,
            variation: 1,
        };
        let mut cursor = Cursor::new(buf);
        let code = u8::read_le(&mut cursor).map_err(|_| too_short())?;
        let bits = ControlCodeBits::from_bytes([code]);
        let op_type = match bits.op_type() {
            1 => OpType::PulseOn,
            2 => OpType::PulseOff,
            3 => OpType::LatchOn,
            4 => OpType::LatchOff,
            _ => OpType::Nul,
        };
        let trip_close = match bits.trip_close() {
            1 => TripCloseCode::Close,
            2 => TripCloseCode::Trip,
            _ => TripCloseCode::Nul,
        };
        let count = u8::read_le(&mut cursor).map_err(|_| too_short())?;
        let on_time_ms = u32::read_le(&mut cursor).map_err(|_| too_short())?;
        let off_time_ms = u32::read_le(&mut cursor).map_err(|_| too_short())?;
        let status = u8::read_le(&mut cursor).map_err(|_| too_short())?;
        Ok(Self {
            op_type,
            trip_close,
            clear: bits.clear(),
            count,
            on_time_ms,
            off_time_ms,
            status: CommandStatus::try_from_u8(status),
        })
    }
}

/// Group 41 var 1: analog output command, 32-bit signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogOutputCommand32 {
    pub value: i32,
    pub status: CommandStatus,
}
fixed_width_object!(AnalogOutputCommand32, 5, 41);

impl AnalogOutputCommand32 {
    pub fn write(&self, out: &mut Vec<u8>) {
        let mut cursor = Cursor::new(Vec::new());
        self.value
            .write_le(&mut cursor)
            .and_then(|_| (self.status as u8).write_le(&mut cursor))
            .expect("write to Vec cannot fail");
        out.extend_from_slice(&cursor.into_inner());
    }

    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(ObjectError::TooShort {
                group: 41,
                variation: 1,
            });
        }
        let mut cursor = Cursor::new(buf);
        let value = i32::read_le(&mut cursor).map_err(|_| ObjectError::TooShort {
            group: 41,
            variation: 1,
        })?;
        let status = u8::read_le(&mut cursor).map_err(|_| ObjectError::TooShort {
            group: 41,
            variation: 1,
        })?;
        Ok(Self {
            value,
            status: CommandStatus::try_from_u8(status),
        })
    }
}

/// Group 50 var 1: absolute time and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct TimeAndDate {
    pub time: Timestamp,
}
fixed_width_object!(TimeAndDate, 6, 50);
binrw_object!(TimeAndDate, 50, 1);

/// Group 52 var 2: fine time delay, milliseconds as a u16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct TimeDelayFine {
    pub delay_ms: u16,
}
fixed_width_object!(TimeDelayFine, 2, 52);
binrw_object!(TimeDelayFine, 52, 2);
