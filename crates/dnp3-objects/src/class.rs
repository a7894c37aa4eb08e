//! Class 0/1/2/3 grouping of static (0) and event (1..3) data.

use modular_bitfield::prelude::*;

/// Compact 4-bit packing of a [`ClassMask`], used for logging and for
/// comparing masks as a single value. DNP3 never puts this nibble on the
/// wire as its own object (Group 60 sends one object header per class);
/// it's an in-process convenience, not a wire format.
#[bitfield(bits = 8)]
#[derive(Clone, Copy, Default)]
struct ClassMaskBits {
    class0: bool,
    class1: bool,
    class2: bool,
    class3: bool,
    #[skip]
    __: B4,
}

/// A mask over the four DNP3 data classes, used both to request a scan
/// (READ of Group 60) and to gate unsolicited reporting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassMask {
    pub class0: bool,
    pub class1: bool,
    pub class2: bool,
    pub class3: bool,
}

impl ClassMask {
    fn bits(&self) -> ClassMaskBits {
        ClassMaskBits::new()
            .with_class0(self.class0)
            .with_class1(self.class1)
            .with_class2(self.class2)
            .with_class3(self.class3)
    }

    /// Packs the mask into its compact nibble representation.
    pub fn to_bits(&self) -> u8 {
        self.bits().into_bytes()[0]
    }

    /// Unpacks a mask from the compact nibble representation.
    pub fn from_bits(byte: u8) -> Self {
        let bits = ClassMaskBits::from_bytes([byte]);
        Self {
            class0: bits.class0(),
            class1: bits.class1(),
            class2: bits.class2(),
            class3: bits.class3(),
        }
    }

    pub const NONE: Self = Self {
        class0: false,
        class1: false,
        class2: false,
        class3: false,
    };

    pub const ALL: Self = Self {
        class0: true,
        class1: true,
        class2: true,
        class3: true,
    };

    pub const EVENTS: Self = Self {
        class0: false,
        class1: true,
        class2: true,
        class3: true,
    };

    pub fn any_events(&self) -> bool {
        self.class1 || self.class2 || self.class3
    }

    /// Group 60 variation for a single data class: var1=class0, var2=class1,
    /// var3=class2, var4=class3.
    pub fn group60_variations(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if self.class0 {
            out.push(1);
        }
        if self.class1 {
            out.push(2);
        }
        if self.class2 {
            out.push(3);
        }
        if self.class3 {
            out.push(4);
        }
        out
    }
}
