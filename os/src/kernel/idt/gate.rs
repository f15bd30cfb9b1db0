//! Gate descriptor encoding, one layout per mode
//!
//! | Mode   | Size | Offset fields   |
//! |--------|------|-----------------|
//! | 8086   | 4    | 16 (far pointer, no gate) |
//! | 80286  | 8    | 16              |
//! | 80386  | 8    | 16 + 16         |
//! | x86-64 | 16   | 16 + 16 + 32    |
//!
//! Gates never use granularity scaling.

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

const PRESENT: u8 = 0x80;

/// How the CPU enters the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Clears IF on entry
    Interrupt,
    /// Leaves IF alone
    Trap,
}

/// Kind and DPL of a gate; encodes to the mode's attribute byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateAccess {
    pub kind: GateKind,
    pub dpl: PrivilegeLevel,
}

impl GateAccess {
    /// Ring-0 interrupt gate, used for every vector
    pub const INTERRUPT: Self = Self {
        kind: GateKind::Interrupt,
        dpl: PrivilegeLevel::Ring0,
    };

    pub const fn new(kind: GateKind, dpl: PrivilegeLevel) -> Self {
        Self { kind, dpl }
    }

    /// Attribute byte for a 16-bit (80286) gate: type 6 or 7
    pub const fn attributes_16(self) -> u8 {
        let ty = match self.kind {
            GateKind::Interrupt => 0x6,
            GateKind::Trap => 0x7,
        };
        PRESENT | (self.dpl as u8) << 5 | ty
    }

    /// Attribute byte for a 32/64-bit gate: type 0xE or 0xF
    pub const fn attributes_32(self) -> u8 {
        self.attributes_16() | 0x8
    }
}

/// Real-mode vector table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct FarPointer {
    offset: u16,
    segment: u16,
}

impl FarPointer {
    pub const NULL: Self = Self {
        offset: 0,
        segment: 0,
    };

    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { offset, segment }
    }

    pub const fn segment(&self) -> u16 {
        self.segment
    }

    pub const fn offset(&self) -> u16 {
        self.offset
    }

    /// 20-bit physical address the pointer resolves to
    pub const fn linear(&self) -> u32 {
        ((self.segment as u32) << 4) + self.offset as u32
    }
}

/// 80286 gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Gate16 {
    offset: u16,
    selector: u16,
    parameter_count: u8,
    attributes: u8,
    reserved: u16,
}

impl Gate16 {
    pub const MISSING: Self = Self {
        offset: 0,
        selector: 0,
        parameter_count: 0,
        attributes: 0,
        reserved: 0,
    };

    pub const fn new(selector: SegmentSelector, offset: u16, access: GateAccess) -> Self {
        Self {
            offset,
            selector: selector.0,
            parameter_count: 0,
            attributes: access.attributes_16(),
            reserved: 0,
        }
    }

    pub const fn offset(&self) -> u16 {
        self.offset
    }

    pub const fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub const fn attributes(&self) -> u8 {
        self.attributes
    }

    /// Always 0: interrupt and trap gates ignore it
    pub const fn parameter_count(&self) -> u8 {
        self.parameter_count
    }
}

/// 80386 gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Gate32 {
    offset_low: u16,
    selector: u16,
    reserved: u8,
    attributes: u8,
    offset_high: u16,
}

impl Gate32 {
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        reserved: 0,
        attributes: 0,
        offset_high: 0,
    };

    pub const fn new(selector: SegmentSelector, offset: u32, access: GateAccess) -> Self {
        Self {
            offset_low: offset as u16,
            selector: selector.0,
            reserved: 0,
            attributes: access.attributes_32(),
            offset_high: (offset >> 16) as u16,
        }
    }

    pub const fn offset(&self) -> u32 {
        self.offset_low as u32 | (self.offset_high as u32) << 16
    }

    pub const fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub const fn attributes(&self) -> u8 {
        self.attributes
    }
}

/// Long mode gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Gate64 {
    offset_low: u16,
    selector: u16,
    ist: u8,
    attributes: u8,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl Gate64 {
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        ist: 0,
        attributes: 0,
        offset_mid: 0,
        offset_high: 0,
        reserved: 0,
    };

    pub const fn new(selector: SegmentSelector, offset: u64, access: GateAccess) -> Self {
        Self {
            offset_low: offset as u16,
            selector: selector.0,
            ist: 0,
            attributes: access.attributes_32(),
            offset_mid: (offset >> 16) as u16,
            offset_high: (offset >> 32) as u32,
            reserved: 0,
        }
    }

    pub const fn offset(&self) -> u64 {
        self.offset_low as u64 | (self.offset_mid as u64) << 16 | (self.offset_high as u64) << 32
    }

    pub const fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub const fn attributes(&self) -> u8 {
        self.attributes
    }

    /// Interrupt stack table index; 0 keeps the current stack
    pub const fn stack_index(&self) -> u8 {
        self.ist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    const CS: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);

    #[test]
    fn layouts_have_hardware_sizes() {
        assert_eq!(size_of::<FarPointer>(), 4);
        assert_eq!(size_of::<Gate16>(), 8);
        assert_eq!(size_of::<Gate32>(), 8);
        assert_eq!(size_of::<Gate64>(), 16);
    }

    #[test]
    fn attribute_bytes() {
        assert_eq!(GateAccess::INTERRUPT.attributes_32(), 0x8E);
        assert_eq!(GateAccess::INTERRUPT.attributes_16(), 0x86);
        let user_trap = GateAccess::new(GateKind::Trap, PrivilegeLevel::Ring3);
        assert_eq!(user_trap.attributes_32(), 0xEF);
        assert_eq!(user_trap.attributes_16(), 0xE7);
    }

    #[test]
    fn offsets_reassemble_to_mode_width() {
        for offset in [0, 1, 0xFFFF, 0x1_0000, 0xDEAD_BEEF, u64::MAX, 0xFFFF_8000_0012_3456] {
            let g64 = Gate64::new(CS, offset, GateAccess::INTERRUPT);
            assert_eq!(g64.offset(), offset);

            let g32 = Gate32::new(CS, offset as u32, GateAccess::INTERRUPT);
            assert_eq!(g32.offset(), offset as u32);

            let g16 = Gate16::new(CS, offset as u16, GateAccess::INTERRUPT);
            assert_eq!(g16.offset(), offset as u16);
        }
    }

    #[test]
    fn gate64_fields() {
        let gate = Gate64::new(CS, 0x1234_5678_9ABC_DEF0, GateAccess::INTERRUPT);
        assert_eq!(gate.selector(), CS);
        assert_eq!(gate.attributes(), 0x8E);
        assert_eq!(gate.stack_index(), 0);
        assert_eq!(Gate64::MISSING.attributes() & PRESENT, 0);
    }

    #[test]
    fn gate16_has_zero_parameter_count() {
        let gate = Gate16::new(CS, 0x4321, GateAccess::INTERRUPT);
        assert_eq!(gate.parameter_count(), 0);
        assert_eq!(gate.selector().0, 0x08);
    }

    #[test]
    fn far_pointer_linear_address() {
        let vector = FarPointer::new(0xB800, 0x0010);
        assert_eq!(vector.linear(), 0xB8010);
        assert_eq!(vector.segment(), 0xB800);
        assert_eq!(vector.offset(), 0x0010);
    }
}
