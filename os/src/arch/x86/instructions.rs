//! Privileged instructions.
//!
//! The small unsafe surface everything else is built on. Interrupt-flag,
//! `hlt`, `lidt` and port access come from the `x86_64` crate; the GDT
//! transition and `int n` are written out here.

use core::arch::asm;

use x86_64::structures::gdt::SegmentSelector;
use x86_64::structures::DescriptorTablePointer;

pub use x86_64::instructions::hlt;
pub use x86_64::instructions::interrupts::{are_enabled, disable, enable, without_interrupts};
pub use x86_64::instructions::tables::{lidt, sgdt, sidt};

/// Load GDTR, then reload CS with a far return and every data segment
/// register with `data`.
///
/// The far-return frame is pushed before `lgdt` so that no instruction after
/// the load runs through the stale code segment.
///
/// # Safety
/// `gdtr` must describe a table that stays valid for as long as it is
/// loaded, and `code`/`data` must select a 64-bit code segment and a data
/// segment in that table.
#[inline(always)]
pub unsafe fn load_gdt_and_reload_segments(
    gdtr: &DescriptorTablePointer,
    code: SegmentSelector,
    data: SegmentSelector,
) {
    asm!(
        "push {code}",
        "lea {target}, [rip + 55f]",
        "push {target}",
        "lgdt [{gdtr}]",
        "retfq",
        "55:",
        "mov ss, {data:x}",
        "mov ds, {data:x}",
        "mov es, {data:x}",
        "mov fs, {data:x}",
        "mov gs, {data:x}",
        code = in(reg) u64::from(code.0),
        target = out(reg) _,
        gdtr = in(reg) gdtr,
        data = in(reg) u64::from(data.0),
        options(preserves_flags),
    );
}

/// Raise `VECTOR` as a software interrupt.
///
/// # Safety
/// An IDT covering `VECTOR` must be loaded, and its handler must return.
#[inline(always)]
pub unsafe fn raise<const VECTOR: u8>() {
    // The handler reads and writes memory and pushes a frame on this stack.
    asm!("int {vector}", vector = const VECTOR);
}

/// Stop for good: interrupts off, then halt forever.
pub fn halt_forever() -> ! {
    disable();
    loop {
        hlt();
    }
}
