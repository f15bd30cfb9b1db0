//! Table loader and the GDT transition
//!
//! Loading a GDT moves the CPU through three states:
//!
//! 1. tables unloaded (bootloader's GDT active)
//! 2. code segment stale: GDTR points at the new table, CS still caches the
//!    old descriptor
//! 3. fully transitioned: CS reloaded by a far return, SS/DS/ES/FS/GS
//!    reloaded with the kernel data selector
//!
//! State 2 only exists inside [`load_gdt_and_reload_segments`], which issues
//! `lgdt` and the far return back to back.
//!
//! [`load_gdt_and_reload_segments`]: crate::arch::x86::instructions::load_gdt_and_reload_segments

use x86_64::structures::DescriptorTablePointer;
use x86_64::VirtAddr;

/// Table register value for a table of `size_bytes` at `base`: limit is size - 1.
pub fn table_register(base: u64, size_bytes: usize) -> DescriptorTablePointer {
    debug_assert!(size_bytes > 0 && size_bytes <= 0x1_0000);
    DescriptorTablePointer {
        limit: (size_bytes - 1) as u16,
        base: VirtAddr::new(base),
    }
}

#[cfg(target_arch = "x86_64")]
pub use self::hw::{load_gdt, load_idt};

#[cfg(target_arch = "x86_64")]
mod hw {
    use super::table_register;
    use crate::arch::x86::instructions;
    use crate::arch::x86::mode::CpuMode;
    use crate::kernel::gdt::{GlobalDescriptorTable, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
    use crate::kernel::idt::InterruptDescriptorTable;

    /// Load `gdt` and complete the segment transition.
    ///
    /// # Safety
    /// Interrupts must be disabled. `gdt` must have been built for long mode,
    /// so that 0x08 is 64-bit kernel code and 0x10 is kernel data.
    pub unsafe fn load_gdt(gdt: &'static GlobalDescriptorTable) {
        let gdtr = table_register(gdt.entries().as_ptr() as u64, gdt.size_bytes());
        log::debug!(
            "lgdt base={:#x} limit={:#x}",
            gdtr.base.as_u64(),
            gdtr.limit
        );
        instructions::load_gdt_and_reload_segments(
            &gdtr,
            KERNEL_CODE_SELECTOR,
            KERNEL_DATA_SELECTOR,
        );
    }

    /// Load `idt` into IDTR.
    ///
    /// # Safety
    /// Every gate must point at a live entry stub in a code segment of the
    /// currently loaded GDT.
    pub unsafe fn load_idt<M: CpuMode>(idt: &'static InterruptDescriptorTable<M>) {
        let idtr = table_register(
            idt.entries().as_ptr() as u64,
            InterruptDescriptorTable::<M>::SIZE_BYTES,
        );
        log::debug!(
            "lidt base={:#x} limit={:#x}",
            idtr.base.as_u64(),
            idtr.limit
        );
        instructions::lidt(&idtr);
    }
}
