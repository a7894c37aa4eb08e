//! The standard single-byte quality/flags field carried by "with flags"
//! variations (Group 1 var 2, Group 30 var 1/3, Group 20 var 1, ...).

use binrw::{BinRead, BinWrite};
use modular_bitfield::prelude::*;

/// Bit layout of a flags byte. Bits 0-4 and 7 have a single fixed meaning
/// across all point types; bits 5 and 6 are context-dependent (chatter
/// filter/over-range/rollover, reference error/discontinuity) so they're
/// left unnamed here and exposed through [`Flags::has`] instead.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct FlagBits {
    online: bool,
    restart: bool,
    comm_lost: bool,
    remote_forced: bool,
    local_forced: bool,
    bit5: bool,
    bit6: bool,
    state: bool,
}

/// Quality flags plus the value bit, packed into one byte per IEEE 1815
/// Annex A. `STATE`/`VALUE` occupies bit 7; the rest are quality bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Flags(pub u8);

impl Flags {
    pub const ONLINE: u8 = 0x01;
    pub const RESTART: u8 = 0x02;
    pub const COMM_LOST: u8 = 0x04;
    pub const REMOTE_FORCED: u8 = 0x08;
    pub const LOCAL_FORCED: u8 = 0x10;
    pub const CHATTER_FILTER: u8 = 0x20;
    pub const OVER_RANGE: u8 = 0x20;
    pub const REFERENCE_ERR: u8 = 0x40;
    pub const ROLLOVER: u8 = 0x20;
    pub const DISCONTINUITY: u8 = 0x40;
    /// The binary STATE bit / analog-output-status reserved bit.
    pub const STATE: u8 = 0x80;

    fn bits(self) -> FlagBits {
        FlagBits::from_bytes([self.0])
    }

    pub fn new() -> Self {
        Self(Self::ONLINE)
    }

    pub fn with_state(self, state: bool) -> Self {
        Self(self.bits().with_state(state).into_bytes()[0])
    }

    pub fn with_bit(self, bit: u8, set: bool) -> Self {
        if set {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    pub fn online(&self) -> bool {
        self.bits().online()
    }

    pub fn state(&self) -> bool {
        self.bits().state()
    }

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

impl From<u8> for Flags {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

impl From<Flags> for u8 {
    fn from(f: Flags) -> Self {
        f.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_and_state_route_through_the_bitfield() {
        let f = Flags::new().with_state(true);
        assert!(f.online());
        assert!(f.state());
        assert_eq!(f.0, Flags::ONLINE | Flags::STATE);
    }

    #[test]
    fn context_dependent_bits_use_the_raw_mask() {
        let f = Flags::new().with_bit(Flags::CHATTER_FILTER, true);
        assert!(f.has(Flags::OVER_RANGE));
        assert!(f.has(Flags::ROLLOVER));
    }
}
