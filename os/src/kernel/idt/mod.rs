//! Interrupt Descriptor Table (IDT) subsystem
//!
//! All 256 vectors are populated: each slot points at its own entry stub,
//! and every stub funnels into one dispatcher. The table type is generic over
//! the execution mode, so the same builder produces a real-mode vector table,
//! a 286/386 IDT or the long mode IDT.

pub mod dispatch;
#[cfg(target_arch = "x86_64")]
pub mod entry;
pub mod frame;
pub mod gate;

use x86_64::structures::gdt::SegmentSelector;

use crate::arch::x86::mode::CpuMode;

/// Number of vectors
pub const IDT_ENTRIES: usize = 256;

/// A vector table for mode `M`
#[derive(Debug, Clone)]
#[repr(C, align(16))]
pub struct InterruptDescriptorTable<M: CpuMode> {
    entries: [M::Vector; IDT_ENTRIES],
}

impl<M: CpuMode> InterruptDescriptorTable<M> {
    /// Size in bytes covered by the table register
    pub const SIZE_BYTES: usize = IDT_ENTRIES * core::mem::size_of::<M::Vector>();

    /// A table with every slot empty
    pub const fn empty() -> Self {
        Self {
            entries: [M::EMPTY_VECTOR; IDT_ENTRIES],
        }
    }

    pub fn entries(&self) -> &[M::Vector; IDT_ENTRIES] {
        &self.entries
    }

    pub fn entry(&self, vector: u8) -> &M::Vector {
        &self.entries[usize::from(vector)]
    }

    /// Handler offset of `vector`
    pub fn target(&self, vector: u8) -> u64 {
        M::vector_target(self.entry(vector))
    }

    /// Copy the table to `base`, for modes that read their table from a fixed
    /// address instead of a table register.
    ///
    /// # Safety
    /// `base` must be valid for writing [`Self::SIZE_BYTES`] bytes and must not
    /// be in use by the CPU for interrupt delivery while the copy runs.
    pub unsafe fn install_at(&self, base: *mut M::Vector) {
        core::ptr::copy_nonoverlapping(self.entries.as_ptr(), base, IDT_ENTRIES);
    }

    /// Copy the table to the mode's fixed address, seen through a mapping of
    /// physical memory at `physical_offset`. Returns the address written, or
    /// `None` without writing when the mode loads its table from a register.
    ///
    /// # Safety
    /// As [`Self::install_at`], for `physical_offset + M::FIXED_TABLE_BASE`.
    pub unsafe fn install_fixed(&self, physical_offset: u64) -> Option<u64> {
        let address = physical_offset + M::FIXED_TABLE_BASE? as u64;
        self.install_at(address as *mut M::Vector);
        Some(address)
    }
}

/// Populate every vector. `handler` gives the entry point of each vector,
/// which is reached through `code_segment`.
pub fn build_idt<M: CpuMode>(
    code_segment: SegmentSelector,
    handler: impl Fn(u8) -> u64,
) -> InterruptDescriptorTable<M> {
    let mut idt = InterruptDescriptorTable::<M>::empty();
    for (vector, slot) in idt.entries.iter_mut().enumerate() {
        *slot = M::encode_vector(code_segment, handler(vector as u8));
    }
    idt
}

#[cfg(test)]
mod tests {
    use super::gate::{FarPointer, GateAccess};
    use super::*;
    use crate::arch::x86::mode::{Long64, Protected16, Protected32, Real86};
    use crate::kernel::gdt::KERNEL_CODE_SELECTOR;

    fn stub(vector: u8) -> u64 {
        0xFFFF_8000_0010_0000 + u64::from(vector) * 16
    }

    #[test]
    fn table_sizes() {
        assert_eq!(InterruptDescriptorTable::<Real86>::SIZE_BYTES, 1024);
        assert_eq!(InterruptDescriptorTable::<Protected16>::SIZE_BYTES, 2048);
        assert_eq!(InterruptDescriptorTable::<Protected32>::SIZE_BYTES, 2048);
        assert_eq!(InterruptDescriptorTable::<Long64>::SIZE_BYTES, 4096);
    }

    #[test]
    fn long_mode_table_has_no_gaps() {
        let idt = build_idt::<Long64>(KERNEL_CODE_SELECTOR, stub);
        for vector in 0..=255u8 {
            let gate = idt.entry(vector);
            assert_eq!(gate.offset(), stub(vector), "vector {vector}");
            assert_eq!(gate.selector(), KERNEL_CODE_SELECTOR);
            assert_eq!(gate.attributes(), GateAccess::INTERRUPT.attributes_32());
            assert_eq!(gate.stack_index(), 0);
        }
    }

    #[test]
    fn protected_mode_tables_truncate_offsets() {
        let narrow = build_idt::<Protected16>(KERNEL_CODE_SELECTOR, stub);
        let wide = build_idt::<Protected32>(KERNEL_CODE_SELECTOR, stub);
        for vector in 0..=255u8 {
            assert_eq!(narrow.target(vector), stub(vector) & 0xFFFF);
            assert_eq!(wide.target(vector), stub(vector) & 0xFFFF_FFFF);
            assert_eq!(narrow.entry(vector).attributes(), 0x86);
            assert_eq!(wide.entry(vector).attributes(), 0x8E);
        }
    }

    #[test]
    fn empty_table_is_not_present() {
        let idt = InterruptDescriptorTable::<Long64>::empty();
        assert!(idt.entries().iter().all(|gate| gate.attributes() & 0x80 == 0));
    }

    #[test]
    fn real_mode_table_installs_at_base() {
        let segment = SegmentSelector(0x0800);
        let ivt = build_idt::<Real86>(segment, |vector| 0x100 + u64::from(vector) * 8);

        let mut memory = [FarPointer::NULL; IDT_ENTRIES];
        unsafe { ivt.install_at(memory.as_mut_ptr()) };

        assert_eq!(memory[0], FarPointer::new(0x0800, 0x100));
        assert_eq!(memory[0x21], FarPointer::new(0x0800, 0x100 + 0x21 * 8));
        assert_eq!(memory[0x21].linear(), 0x8000 + 0x100 + 0x21 * 8);
        assert!(memory.iter().all(|vector| vector.segment() == 0x0800));
    }

    #[test]
    fn fixed_install_writes_real_mode_table_at_physical_zero() {
        let ivt = build_idt::<Real86>(SegmentSelector(0x0800), |vector| u64::from(vector) * 4);

        let mut memory = [FarPointer::NULL; IDT_ENTRIES];
        let offset = memory.as_mut_ptr() as u64;
        assert_eq!(unsafe { ivt.install_fixed(offset) }, Some(offset));
        assert_eq!(&memory, ivt.entries());
    }

    #[test]
    fn fixed_install_skips_register_loaded_modes() {
        let idt = build_idt::<Long64>(SegmentSelector(0x08), |vector| 0x1000 + u64::from(vector));
        assert_eq!(unsafe { idt.install_fixed(0) }, None);
        assert_eq!(Protected32::FIXED_TABLE_BASE, None);
        assert_eq!(Protected16::FIXED_TABLE_BASE, None);
    }
}
