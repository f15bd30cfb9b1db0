//! Execution modes of the x86 family.
//!
//! Every mode describes its vector-table entry and, where segments are
//! described by a GDT, its segment layout and encoder. The mode a kernel
//! runs in is fixed per build: see [`ActiveMode`].

use x86_64::structures::gdt::SegmentSelector;

use crate::kernel::gdt::descriptor::{self, OperandSize, SegmentAccess, SegmentDescriptor};
use crate::kernel::gdt::SegmentSpec;
use crate::kernel::idt::gate::{FarPointer, Gate16, Gate32, Gate64, GateAccess};

/// An execution mode with a 256-entry vector table
pub trait CpuMode {
    const NAME: &'static str;

    /// One vector-table slot
    type Vector: Copy + core::fmt::Debug + PartialEq;

    /// Slot value before the table is filled
    const EMPTY_VECTOR: Self::Vector;

    /// Fixed physical address of the table when no table register exists
    const FIXED_TABLE_BASE: Option<usize>;

    /// Point a slot at `handler` in `code_segment`, truncating the offset to
    /// the mode's code width.
    fn encode_vector(code_segment: SegmentSelector, handler: u64) -> Self::Vector;

    /// Handler offset stored in a slot
    fn vector_target(vector: &Self::Vector) -> u64;
}

/// A protected mode whose segments come from a GDT
pub trait SegmentedMode: CpuMode {
    /// Segments behind the null slot, in selector order
    const SEGMENTS: &'static [SegmentSpec];

    fn encode_segment(
        base: u32,
        limit: u32,
        access: SegmentAccess,
        size: OperandSize,
    ) -> SegmentDescriptor;
}

/// 8086 real mode: vectors are far pointers at physical 0
#[derive(Debug, Clone, Copy)]
pub struct Real86;

/// 80286 16-bit protected mode
#[derive(Debug, Clone, Copy)]
pub struct Protected16;

/// 80386 32-bit protected mode
#[derive(Debug, Clone, Copy)]
pub struct Protected32;

/// x86-64 long mode
#[derive(Debug, Clone, Copy)]
pub struct Long64;

/// The mode this build runs in
#[cfg(target_arch = "x86_64")]
pub type ActiveMode = Long64;

impl CpuMode for Real86 {
    const NAME: &'static str = "real mode (8086)";
    type Vector = FarPointer;
    const EMPTY_VECTOR: FarPointer = FarPointer::NULL;
    const FIXED_TABLE_BASE: Option<usize> = Some(0);

    fn encode_vector(code_segment: SegmentSelector, handler: u64) -> FarPointer {
        FarPointer::new(code_segment.0, handler as u16)
    }

    fn vector_target(vector: &FarPointer) -> u64 {
        u64::from(vector.offset())
    }
}

impl CpuMode for Protected16 {
    const NAME: &'static str = "16-bit protected mode (80286)";
    type Vector = Gate16;
    const EMPTY_VECTOR: Gate16 = Gate16::MISSING;
    const FIXED_TABLE_BASE: Option<usize> = None;

    fn encode_vector(code_segment: SegmentSelector, handler: u64) -> Gate16 {
        Gate16::new(code_segment, handler as u16, GateAccess::INTERRUPT)
    }

    fn vector_target(vector: &Gate16) -> u64 {
        u64::from(vector.offset())
    }
}

impl SegmentedMode for Protected16 {
    const SEGMENTS: &'static [SegmentSpec] = &[
        SegmentSpec::kernel_code(0xFFFF, OperandSize::Bits16),
        SegmentSpec::kernel_data(0xFFFF, OperandSize::Bits16),
        // No FS/GS on the 80286, so the text buffer gets its own selector
        SegmentSpec::video_alias(0x0B_8000, 0xFFFF, OperandSize::Bits16),
        SegmentSpec::user_code(0xFFFF, OperandSize::Bits16),
        SegmentSpec::user_data(0xFFFF, OperandSize::Bits16),
    ];

    /// No flags nibble: `size` is ignored and the limit is byte granular.
    fn encode_segment(
        base: u32,
        limit: u32,
        access: SegmentAccess,
        _size: OperandSize,
    ) -> SegmentDescriptor {
        debug_assert!(limit <= 0xFFFF, "80286 limit is 16 bits");
        descriptor::encode_segment_286(base, limit as u16, access)
    }
}

impl CpuMode for Protected32 {
    const NAME: &'static str = "32-bit protected mode (80386)";
    type Vector = Gate32;
    const EMPTY_VECTOR: Gate32 = Gate32::MISSING;
    const FIXED_TABLE_BASE: Option<usize> = None;

    fn encode_vector(code_segment: SegmentSelector, handler: u64) -> Gate32 {
        Gate32::new(code_segment, handler as u32, GateAccess::INTERRUPT)
    }

    fn vector_target(vector: &Gate32) -> u64 {
        u64::from(vector.offset())
    }
}

impl SegmentedMode for Protected32 {
    const SEGMENTS: &'static [SegmentSpec] = &[
        SegmentSpec::kernel_code(0xFFFF_FFFF, OperandSize::Bits32),
        SegmentSpec::kernel_data(0xFFFF_FFFF, OperandSize::Bits32),
        SegmentSpec::user_code(0xFFFF_FFFF, OperandSize::Bits32),
        SegmentSpec::user_data(0xFFFF_FFFF, OperandSize::Bits32),
    ];

    fn encode_segment(
        base: u32,
        limit: u32,
        access: SegmentAccess,
        size: OperandSize,
    ) -> SegmentDescriptor {
        descriptor::encode_segment(base, limit, access, size)
    }
}

impl CpuMode for Long64 {
    const NAME: &'static str = "64-bit long mode";
    type Vector = Gate64;
    const EMPTY_VECTOR: Gate64 = Gate64::MISSING;
    const FIXED_TABLE_BASE: Option<usize> = None;

    fn encode_vector(code_segment: SegmentSelector, handler: u64) -> Gate64 {
        Gate64::new(code_segment, handler, GateAccess::INTERRUPT)
    }

    fn vector_target(vector: &Gate64) -> u64 {
        vector.offset()
    }
}

impl SegmentedMode for Long64 {
    // Base and limit are ignored in long mode; data segments carry no size flag.
    const SEGMENTS: &'static [SegmentSpec] = &[
        SegmentSpec::kernel_code(0, OperandSize::Bits64),
        SegmentSpec::kernel_data(0, OperandSize::Bits16),
        SegmentSpec::user_code(0, OperandSize::Bits64),
        SegmentSpec::user_data(0, OperandSize::Bits16),
    ];

    fn encode_segment(
        base: u32,
        limit: u32,
        access: SegmentAccess,
        size: OperandSize,
    ) -> SegmentDescriptor {
        descriptor::encode_segment(base, limit, access, size)
    }
}

/// Returns true if the CPU is in 64-bit long mode (PE, PG, PAE, LME, LMA set).
#[cfg(target_arch = "x86_64")]
pub fn is_long_mode() -> bool {
    use x86_64::registers::control::{Cr0, Cr0Flags, Cr4, Cr4Flags};
    use x86_64::registers::model_specific::{Efer, EferFlags};

    let cr0 = Cr0::read();
    let cr4 = Cr4::read();
    let efer = Efer::read();
    cr0.contains(Cr0Flags::PROTECTED_MODE_ENABLE | Cr0Flags::PAGING)
        && cr4.contains(Cr4Flags::PHYSICAL_ADDRESS_EXTENSION)
        && efer.contains(EferFlags::LONG_MODE_ENABLE | EferFlags::LONG_MODE_ACTIVE)
}
