//! Global Descriptor Table (GDT) subsystem
//!
//! The GDT holds a fixed set of flat segments, in selector order:
//!
//! - Kernel code segment (ring 0) at 0x08
//! - Kernel data/stack segment (ring 0) at 0x10
//! - Video alias segment (ring 0), 80286 only, which has no FS/GS
//! - User code segment (ring 3)
//! - User data segment (ring 3)
//!
//! Slot 0 is the null descriptor. Each mode lists its segments in
//! [`SegmentedMode::SEGMENTS`]; [`build_gdt`] encodes them.

pub mod descriptor;
pub mod loader;

#[cfg(test)]
mod tests;

use x86_64::structures::gdt::SegmentSelector;
use x86_64::PrivilegeLevel;

use crate::arch::x86::mode::SegmentedMode;
pub use descriptor::{OperandSize, SegmentAccess, SegmentDescriptor, SegmentFlags};

/// Kernel code is always the first real slot
pub const KERNEL_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(1, PrivilegeLevel::Ring0);

/// Kernel data/stack is always the second
pub const KERNEL_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, PrivilegeLevel::Ring0);

/// Segments beyond the null slot in the largest layout
pub const MAX_SEGMENTS: usize = 5;

/// Bytes per descriptor; selectors step by this
pub const DESCRIPTOR_SIZE: usize = core::mem::size_of::<SegmentDescriptor>();

/// What a GDT slot is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    KernelCode,
    KernelData,
    /// Data segment aliasing the text buffer
    KernelVideo,
    UserCode,
    UserData,
}

/// One segment of a mode's layout, before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    pub role: SegmentRole,
    pub base: u32,
    pub limit: u32,
    pub access: SegmentAccess,
    pub size: OperandSize,
}

impl SegmentSpec {
    pub const fn kernel_code(limit: u32, size: OperandSize) -> Self {
        let access = SegmentAccess::code(PrivilegeLevel::Ring0);
        Self::new(SegmentRole::KernelCode, 0, limit, access, size)
    }

    pub const fn kernel_data(limit: u32, size: OperandSize) -> Self {
        let access = SegmentAccess::data(PrivilegeLevel::Ring0);
        Self::new(SegmentRole::KernelData, 0, limit, access, size)
    }

    pub const fn user_code(limit: u32, size: OperandSize) -> Self {
        let access = SegmentAccess::code(PrivilegeLevel::Ring3);
        Self::new(SegmentRole::UserCode, 0, limit, access, size)
    }

    pub const fn user_data(limit: u32, size: OperandSize) -> Self {
        let access = SegmentAccess::data(PrivilegeLevel::Ring3);
        Self::new(SegmentRole::UserData, 0, limit, access, size)
    }

    const fn new(
        role: SegmentRole,
        base: u32,
        limit: u32,
        access: SegmentAccess,
        size: OperandSize,
    ) -> Self {
        Self {
            role,
            base,
            limit,
            access,
            size,
        }
    }

    pub const fn video_alias(base: u32, limit: u32, size: OperandSize) -> Self {
        let access = SegmentAccess::data(PrivilegeLevel::Ring0);
        Self::new(SegmentRole::KernelVideo, base, limit, access, size)
    }
}

/// A built GDT. Only the first `len` slots are handed to the CPU.
#[derive(Debug, Clone)]
#[repr(C, align(16))]
pub struct GlobalDescriptorTable {
    entries: [SegmentDescriptor; MAX_SEGMENTS + 1],
    roles: [Option<SegmentRole>; MAX_SEGMENTS + 1],
    len: usize,
}

impl GlobalDescriptorTable {
    /// Live descriptors, null slot included
    pub fn entries(&self) -> &[SegmentDescriptor] {
        &self.entries[..self.len]
    }

    /// Size in bytes covered by the table register
    pub fn size_bytes(&self) -> usize {
        self.len * DESCRIPTOR_SIZE
    }

    /// Byte offset of the slot holding `role`
    pub fn offset_of(&self, role: SegmentRole) -> Option<u16> {
        self.roles[..self.len]
            .iter()
            .position(|slot| *slot == Some(role))
            .map(|index| (index * DESCRIPTOR_SIZE) as u16)
    }

    /// Selector for `role`, with RPL equal to the segment's DPL
    pub fn selector(&self, role: SegmentRole) -> Option<SegmentSelector> {
        let offset = self.offset_of(role)?;
        let index = offset / DESCRIPTOR_SIZE as u16;
        let dpl = self.entries[usize::from(index)].access().privilege();
        Some(SegmentSelector::new(index, dpl))
    }

    /// The descriptor a selector points at
    pub fn descriptor(&self, selector: SegmentSelector) -> Option<SegmentDescriptor> {
        self.entries().get(usize::from(selector.index())).copied()
    }
}

/// Encode `M`'s segment layout behind the null descriptor.
pub fn build_gdt<M: SegmentedMode>() -> GlobalDescriptorTable {
    let mut gdt = GlobalDescriptorTable {
        entries: [SegmentDescriptor::NULL; MAX_SEGMENTS + 1],
        roles: [None; MAX_SEGMENTS + 1],
        len: 1,
    };

    for spec in M::SEGMENTS.iter().take(MAX_SEGMENTS) {
        gdt.entries[gdt.len] = M::encode_segment(spec.base, spec.limit, spec.access, spec.size);
        gdt.roles[gdt.len] = Some(spec.role);
        gdt.len += 1;
    }
    gdt
}

/// Log every live slot
pub fn log_gdt(gdt: &GlobalDescriptorTable) {
    for (index, descriptor) in gdt.entries().iter().enumerate().skip(1) {
        log::debug!(
            "gdt[{:#04x}] base={:#010x} limit={:#07x} access={:#04x} flags={:#x} raw={:#018x}",
            index * DESCRIPTOR_SIZE,
            descriptor.base(),
            descriptor.raw_limit(),
            descriptor.access().bits(),
            descriptor.flags().bits(),
            descriptor.raw()
        );
    }
}
