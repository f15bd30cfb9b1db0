//! Segment descriptor encoding
//!
//! One descriptor is 8 bytes in every protected mode:
//!
//! ```text
//!  63      56 55   52 51    48 47     40 39                16 15        0
//! | base1    | flags | limit1 | access  |       base0        |  limit0   |
//! ```
//!
//! The 80286 layout stops at bit 47; bits 48-63 are reserved and zero.

use bitflags::bitflags;
use x86_64::PrivilegeLevel;

bitflags! {
    /// Access byte of a code or data segment descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentAccess: u8 {
        const ACCESSED = 1 << 0;
        /// Readable for code, writable for data
        const READ_WRITE = 1 << 1;
        const CONFORMING = 1 << 2;
        const EXECUTABLE = 1 << 3;
        /// Code/data rather than a system descriptor
        const CODE_OR_DATA = 1 << 4;
        const DPL_LOW = 1 << 5;
        const DPL_HIGH = 1 << 6;
        const PRESENT = 1 << 7;
    }
}

impl SegmentAccess {
    const DATA: u8 = 0x92;
    const CODE: u8 = 0x9A;

    /// Present, writable data segment at `dpl`
    pub const fn data(dpl: PrivilegeLevel) -> Self {
        Self::from_bits_retain(Self::DATA | (dpl as u8) << 5)
    }

    /// Present, readable code segment at `dpl`
    pub const fn code(dpl: PrivilegeLevel) -> Self {
        Self::from_bits_retain(Self::CODE | (dpl as u8) << 5)
    }

    pub fn privilege(self) -> PrivilegeLevel {
        privilege_from_bits(self.bits() >> 5)
    }

    pub fn is_code(self) -> bool {
        self.contains(Self::CODE_OR_DATA | Self::EXECUTABLE)
    }
}

bitflags! {
    /// High nibble of byte 6 (absent on the 80286)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u8 {
        const AVAILABLE = 1 << 0;
        /// 64-bit code segment
        const LONG_MODE = 1 << 1;
        /// 32-bit default operand size
        const DEFAULT_SIZE = 1 << 2;
        /// Limit counts 4 KiB pages
        const GRANULARITY = 1 << 3;
    }
}

/// Operand-size class of a segment. One value, so at most one size flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    Bits16,
    Bits32,
    Bits64,
}

impl OperandSize {
    pub const fn flags(self) -> SegmentFlags {
        match self {
            Self::Bits16 => SegmentFlags::empty(),
            Self::Bits32 => SegmentFlags::DEFAULT_SIZE,
            Self::Bits64 => SegmentFlags::LONG_MODE,
        }
    }
}

/// Largest limit stored without page granularity
pub const BYTE_GRANULAR_MAX: u32 = 0xFFF;

/// An encoded segment descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct SegmentDescriptor(u64);

impl SegmentDescriptor {
    /// Mandatory first GDT entry
    pub const NULL: Self = Self(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Full base address (24 bits on the 80286)
    pub fn base(self) -> u32 {
        let base0 = (self.0 >> 16) as u32 & 0x00FF_FFFF;
        let base1 = (self.0 >> 56) as u32;
        base0 | base1 << 24
    }

    /// The 20-bit limit field as stored
    pub fn raw_limit(self) -> u32 {
        (self.0 & 0xFFFF) as u32 | ((self.0 >> 48) as u32 & 0xF) << 16
    }

    /// Effective limit in bytes, scaled if the granularity flag is set
    pub fn limit(self) -> u32 {
        if self.granularity() {
            self.raw_limit() << 12 | 0xFFF
        } else {
            self.raw_limit()
        }
    }

    pub fn access(self) -> SegmentAccess {
        SegmentAccess::from_bits_retain((self.0 >> 40) as u8)
    }

    pub fn flags(self) -> SegmentFlags {
        SegmentFlags::from_bits_retain((self.0 >> 52) as u8 & 0xF)
    }

    pub fn granularity(self) -> bool {
        self.flags().contains(SegmentFlags::GRANULARITY)
    }

    pub fn is_present(self) -> bool {
        self.access().contains(SegmentAccess::PRESENT)
    }
}

/// Encode a 386 / long mode segment.
///
/// A limit above [`BYTE_GRANULAR_MAX`] sets the granularity flag and is
/// stored right-shifted by 12; otherwise the flag is cleared and the limit is
/// stored as given.
pub fn encode_segment(
    base: u32,
    limit: u32,
    access: SegmentAccess,
    size: OperandSize,
) -> SegmentDescriptor {
    let mut flags = size.flags();
    let limit = if limit > BYTE_GRANULAR_MAX {
        flags |= SegmentFlags::GRANULARITY;
        limit >> 12
    } else {
        flags.remove(SegmentFlags::GRANULARITY);
        limit
    };

    let mut raw = u64::from(limit & 0xFFFF);
    raw |= u64::from(base & 0x00FF_FFFF) << 16;
    raw |= u64::from(access.bits()) << 40;
    raw |= u64::from((limit >> 16) & 0xF) << 48;
    raw |= u64::from(flags.bits() & 0xF) << 52;
    raw |= u64::from(base >> 24) << 56;
    SegmentDescriptor(raw)
}

/// Encode an 80286 segment: 24-bit base, 16-bit byte-granular limit, no flags.
pub fn encode_segment_286(base: u32, limit: u16, access: SegmentAccess) -> SegmentDescriptor {
    debug_assert!(base <= 0x00FF_FFFF, "80286 base is 24 bits");

    let mut raw = u64::from(limit);
    raw |= u64::from(base & 0x00FF_FFFF) << 16;
    raw |= u64::from(access.bits()) << 40;
    SegmentDescriptor(raw)
}

pub(crate) fn privilege_from_bits(bits: u8) -> PrivilegeLevel {
    match bits & 0b11 {
        0 => PrivilegeLevel::Ring0,
        1 => PrivilegeLevel::Ring1,
        2 => PrivilegeLevel::Ring2,
        _ => PrivilegeLevel::Ring3,
    }
}
