//! The 9-bit POSIX-like permission mask used on the wire by Group 70
//! file command and file descriptor objects.

use binrw::{BinRead, BinWrite};

/// Bit-exact permission mask transmitted in Group 70 var3/var7 objects.
///
/// Wraps a raw `u16`; only the low 9 bits are meaningful, the remaining
/// 7 bits are reserved and always written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Permissions(u16);

impl Permissions {
    pub const OWNER_READ: u16 = 0x100;
    pub const OWNER_WRITE: u16 = 0x080;
    pub const OWNER_EXECUTE: u16 = 0x040;
    pub const GROUP_READ: u16 = 0x020;
    pub const GROUP_WRITE: u16 = 0x010;
    pub const GROUP_EXECUTE: u16 = 0x008;
    pub const WORLD_READ: u16 = 0x004;
    pub const WORLD_WRITE: u16 = 0x002;
    pub const WORLD_EXECUTE: u16 = 0x001;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    fn with_bit(self, bit: u16, set: bool) -> Self {
        if set {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    fn has_bit(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn owner_read(&self) -> bool {
        self.has_bit(Self::OWNER_READ)
    }
    pub fn owner_write(&self) -> bool {
        self.has_bit(Self::OWNER_WRITE)
    }
    pub fn owner_execute(&self) -> bool {
        self.has_bit(Self::OWNER_EXECUTE)
    }
    pub fn group_read(&self) -> bool {
        self.has_bit(Self::GROUP_READ)
    }
    pub fn group_write(&self) -> bool {
        self.has_bit(Self::GROUP_WRITE)
    }
    pub fn group_execute(&self) -> bool {
        self.has_bit(Self::GROUP_EXECUTE)
    }
    pub fn world_read(&self) -> bool {
        self.has_bit(Self::WORLD_READ)
    }
    pub fn world_write(&self) -> bool {
        self.has_bit(Self::WORLD_WRITE)
    }
    pub fn world_execute(&self) -> bool {
        self.has_bit(Self::WORLD_EXECUTE)
    }

    pub fn with_owner_read(self, v: bool) -> Self {
        self.with_bit(Self::OWNER_READ, v)
    }
    pub fn with_owner_write(self, v: bool) -> Self {
        self.with_bit(Self::OWNER_WRITE, v)
    }
    pub fn with_owner_execute(self, v: bool) -> Self {
        self.with_bit(Self::OWNER_EXECUTE, v)
    }
    pub fn with_group_read(self, v: bool) -> Self {
        self.with_bit(Self::GROUP_READ, v)
    }
    pub fn with_group_write(self, v: bool) -> Self {
        self.with_bit(Self::GROUP_WRITE, v)
    }
    pub fn with_group_execute(self, v: bool) -> Self {
        self.with_bit(Self::GROUP_EXECUTE, v)
    }
    pub fn with_world_read(self, v: bool) -> Self {
        self.with_bit(Self::WORLD_READ, v)
    }
    pub fn with_world_write(self, v: bool) -> Self {
        self.with_bit(Self::WORLD_WRITE, v)
    }
    pub fn with_world_execute(self, v: bool) -> Self {
        self.with_bit(Self::WORLD_EXECUTE, v)
    }

    /// Builds a [`Permissions`] from a raw Unix-style mode (the low 9 bits of
    /// `st_mode`, as returned by `std::os::unix::fs::PermissionsExt::mode`).
    pub fn from_unix_mode(mode: u32) -> Self {
        Self::empty()
            .with_owner_read(mode & 0o400 != 0)
            .with_owner_write(mode & 0o200 != 0)
            .with_owner_execute(mode & 0o100 != 0)
            .with_group_read(mode & 0o040 != 0)
            .with_group_write(mode & 0o020 != 0)
            .with_group_execute(mode & 0o010 != 0)
            .with_world_read(mode & 0o004 != 0)
            .with_world_write(mode & 0o002 != 0)
            .with_world_execute(mode & 0o001 != 0)
    }
}
