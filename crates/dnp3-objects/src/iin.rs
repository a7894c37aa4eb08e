//! Internal Indications: the 16-bit bitmap carried in every outstation
//! response.

use binrw::{BinRead, BinWrite};
use modular_bitfield::prelude::*;

#[bitfield(bits = 16)]
#[derive(Clone, Copy, Default)]
struct IinBits {
    broadcast: bool,
    class1_events: bool,
    class2_events: bool,
    class3_events: bool,
    need_time: bool,
    local_control: bool,
    device_trouble: bool,
    device_restart: bool,
    func_not_supported: bool,
    object_unknown: bool,
    parameter_error: bool,
    event_buffer_overflow: bool,
    already_executing: bool,
    config_corrupt: bool,
    reserved_2: bool,
    reserved_1: bool,
}

/// Internal Indications bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Iin(pub u16);

impl Iin {
    pub const BROADCAST: u16 = 0x0001;
    pub const CLASS1_EVENTS: u16 = 0x0002;
    pub const CLASS2_EVENTS: u16 = 0x0004;
    pub const CLASS3_EVENTS: u16 = 0x0008;
    pub const NEED_TIME: u16 = 0x0010;
    pub const LOCAL_CONTROL: u16 = 0x0020;
    pub const DEVICE_TROUBLE: u16 = 0x0040;
    pub const DEVICE_RESTART: u16 = 0x0080;
    pub const FUNC_NOT_SUPPORTED: u16 = 0x0100;
    pub const OBJECT_UNKNOWN: u16 = 0x0200;
    pub const PARAMETER_ERROR: u16 = 0x0400;
    pub const EVENT_BUFFER_OVERFLOW: u16 = 0x0800;
    pub const ALREADY_EXECUTING: u16 = 0x1000;
    pub const CONFIG_CORRUPT: u16 = 0x2000;
    pub const RESERVED_2: u16 = 0x4000;
    pub const RESERVED_1: u16 = 0x8000;

    fn bits(self) -> IinBits {
        IinBits::from_bytes(self.0.to_le_bytes())
    }

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(self, bit: u16, set: bool) -> Self {
        if set {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    pub fn has(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn class_n_events(&self) -> bool {
        let bits = self.bits();
        bits.class1_events() || bits.class2_events() || bits.class3_events()
    }

    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}
