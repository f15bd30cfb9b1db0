//! Boot-time self tests (called from kernel code, after `early_init`)
//!
//! Results go to the log; a failure is reported, never fatal.

use core::arch::asm;

use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
use x86_64::structures::gdt::SegmentSelector;

use super::gdt::{SegmentRole, KERNEL_CODE_SELECTOR, KERNEL_DATA_SELECTOR};
use super::idt::InterruptDescriptorTable;
use super::Machine;
use crate::arch::x86::instructions::{self, raise};
use crate::arch::x86::mode::ActiveMode;
use crate::config::SELF_TEST_VECTORS;

/// Run every check and log the outcome
pub fn run(machine: &Machine) {
    let checks: [(&str, fn(&Machine) -> bool); 4] = [
        ("segment registers", verify_segments),
        ("table registers", verify_tables),
        ("software interrupts", software_interrupts),
        ("register round trip", register_round_trip),
    ];

    let mut failed = 0;
    for (name, check) in checks {
        if check(machine) {
            log::info!("selftest: {name}: ok");
        } else {
            log::error!("selftest: {name}: FAILED");
            failed += 1;
        }
    }
    log::info!("selftest: {} of {} passed", checks.len() - failed, checks.len());
}

/// CS holds kernel code and every data segment register kernel data
fn verify_segments(_machine: &Machine) -> bool {
    let cs = CS::get_reg();
    let data = [DS::get_reg(), ES::get_reg(), SS::get_reg()];
    log::debug!("CS={:#x} DS={:#x} ES={:#x} SS={:#x}", cs.0, data[0].0, data[1].0, data[2].0);

    cs == KERNEL_CODE_SELECTOR && data.iter().all(|&selector| selector == KERNEL_DATA_SELECTOR)
}

/// GDTR and IDTR point at the machine's tables with limit = size - 1
fn verify_tables(machine: &Machine) -> bool {
    let gdtr = instructions::sgdt();
    let idtr = instructions::sidt();
    log::debug!(
        "GDTR base={:#x} limit={:#x}; IDTR base={:#x} limit={:#x}",
        gdtr.base.as_u64(),
        gdtr.limit,
        idtr.base.as_u64(),
        idtr.limit
    );

    let gdt = machine.gdt();
    let idt = machine.idt();
    gdtr.base.as_u64() == gdt.entries().as_ptr() as u64
        && usize::from(gdtr.limit) == gdt.size_bytes() - 1
        && idtr.base.as_u64() == idt.entries().as_ptr() as u64
        && usize::from(idtr.limit) == InterruptDescriptorTable::<ActiveMode>::SIZE_BYTES - 1
}

/// Each test vector is dispatched exactly once and sends no EOI
fn software_interrupts(machine: &Machine) -> bool {
    let dispatcher = machine.dispatcher();

    // No timer or keyboard interrupt may land between the counter reads.
    instructions::without_interrupts(|| {
        let before = SELF_TEST_VECTORS.map(|vector| dispatcher.count(vector));
        let acknowledged = dispatcher.acknowledged();

        // SAFETY: the IDT covers every vector and the dispatcher returns.
        unsafe {
            raise::<{ SELF_TEST_VECTORS[0] }>();
            raise::<{ SELF_TEST_VECTORS[1] }>();
        }

        let after = SELF_TEST_VECTORS.map(|vector| dispatcher.count(vector));
        log::debug!("vectors {:x?}: before {:?} after {:?}", SELF_TEST_VECTORS, before, after);

        before.iter().zip(after.iter()).all(|(b, a)| a - b == 1)
            && dispatcher.acknowledged() == acknowledged
    })
}

/// User data selector loaded into DS/ES across the round trip
const USER_DATA: u16 = 0x23;

/// Register `i` holds `SENTINEL + i` when the `int` is issued
const SENTINEL: u64 = 0x5EED_0000_0000_0000;

/// Order the sentinels are assigned and saved in
const PRESERVED: [&str; 15] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

/// Slots after the general registers: DS, ES, then the address `int` returns to
const SAVED_DS: usize = 15;
const SAVED_ES: usize = 16;
const RESUME_RIP: usize = 17;

/// Every general register and DS/ES come back unchanged from a software
/// interrupt, and the frame's RIP is the instruction after the `int`.
fn register_round_trip(machine: &Machine) -> bool {
    if machine.gdt().selector(SegmentRole::UserData) != Some(SegmentSelector(USER_DATA)) {
        log::error!("no user data segment at {:#x}", USER_DATA);
        return false;
    }

    let dispatcher = machine.dispatcher();
    let mut out = [0u64; 18];

    instructions::without_interrupts(|| {
        // SAFETY: the IDT covers every vector and the dispatcher returns;
        // the user data segment is present and writable, and the kernel
        // selectors are back in DS/ES before the block ends.
        unsafe {
            asm!(
                "push rbp",
                "push rbx",
                "push rdi",
                "mov ax, {user_data}",
                "mov ds, ax",
                "mov es, ax",
                "mov rax, {sentinel} + 0",
                "mov rbx, {sentinel} + 1",
                "mov rcx, {sentinel} + 2",
                "mov rdx, {sentinel} + 3",
                "mov rsi, {sentinel} + 4",
                "mov rdi, {sentinel} + 5",
                "mov rbp, {sentinel} + 6",
                "mov r8, {sentinel} + 7",
                "mov r9, {sentinel} + 8",
                "mov r10, {sentinel} + 9",
                "mov r11, {sentinel} + 10",
                "mov r12, {sentinel} + 11",
                "mov r13, {sentinel} + 12",
                "mov r14, {sentinel} + 13",
                "mov r15, {sentinel} + 14",
                "int {vector}",
                "2:",
                "push rax",
                "mov rax, [rsp + 8]",
                "pop qword ptr [rax]",
                "mov [rax + 8], rbx",
                "mov [rax + 16], rcx",
                "mov [rax + 24], rdx",
                "mov [rax + 32], rsi",
                "mov [rax + 40], rdi",
                "mov [rax + 48], rbp",
                "mov [rax + 56], r8",
                "mov [rax + 64], r9",
                "mov [rax + 72], r10",
                "mov [rax + 80], r11",
                "mov [rax + 88], r12",
                "mov [rax + 96], r13",
                "mov [rax + 104], r14",
                "mov [rax + 112], r15",
                "xor ecx, ecx",
                "mov cx, ds",
                "mov [rax + 120], rcx",
                "mov cx, es",
                "mov [rax + 128], rcx",
                "lea rcx, [rip + 2b]",
                "mov [rax + 136], rcx",
                "mov cx, {kernel_data}",
                "mov ds, cx",
                "mov es, cx",
                "pop rdi",
                "pop rbx",
                "pop rbp",
                user_data = const USER_DATA,
                kernel_data = const KERNEL_DATA_SELECTOR.0,
                sentinel = const SENTINEL,
                vector = const SELF_TEST_VECTORS[0],
                in("rdi") out.as_mut_ptr(),
                out("rax") _,
                out("rcx") _,
                out("rdx") _,
                out("rsi") _,
                out("r8") _,
                out("r9") _,
                out("r10") _,
                out("r11") _,
                out("r12") _,
                out("r13") _,
                out("r14") _,
                out("r15") _,
            );
        }
    });

    let mut ok = true;
    for (index, name) in PRESERVED.iter().enumerate() {
        let expected = SENTINEL + index as u64;
        if out[index] != expected {
            log::error!("{name}: expected {expected:#x}, found {:#x}", out[index]);
            ok = false;
        }
    }
    for (slot, name) in [(SAVED_DS, "ds"), (SAVED_ES, "es")] {
        if out[slot] != u64::from(USER_DATA) {
            log::error!("{name}: expected {USER_DATA:#x}, found {:#x}", out[slot]);
            ok = false;
        }
    }

    let last = dispatcher.last_frame();
    log::debug!("last frame {:x?}, resumed at {:#x}", last, out[RESUME_RIP]);
    ok && last.vector == SELF_TEST_VECTORS[0] && last.error_code == 0 && last.rip == out[RESUME_RIP]
}
