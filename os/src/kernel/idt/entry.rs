//! Interrupt entry stubs
//!
//! One 16-byte stub per vector, generated by the assembler. A stub pushes a
//! zero placeholder unless the CPU already pushed an error code, pushes its
//! vector number and jumps to the common entry. The common entry completes
//! an [`InterruptFrame`], switches DS/ES to the kernel data segment, calls
//! [`interrupt_entry`] and unwinds the frame with `iretq`.
//!
//! ```text
//! stub:    [push 0]  push vector  jmp common
//! common:  push rax..r15  push ds  push es  call  pop ..  add rsp, 16  iretq
//! ```

use core::arch::global_asm;

use super::frame::{InterruptFrame, ERROR_CODE_VECTORS};
use crate::kernel::gdt::KERNEL_DATA_SELECTOR;

/// Bytes between consecutive stubs
pub const STUB_STRIDE: usize = 16;

global_asm!(
    ".pushsection .text.os86_isr, \"ax\", @progbits",
    ".balign {stride}",
    ".global os86_isr_stubs",
    "os86_isr_stubs:",
    ".set os86_isr_vector, 0",
    ".rept 256",
    ".balign {stride}",
    // push imm8 0, unless the CPU supplies an error code
    ".if os86_isr_vector < 32",
    ".if (({error_code_vectors} >> os86_isr_vector) & 1) == 0",
    ".byte 0x6a, 0x00",
    ".endif",
    ".else",
    ".byte 0x6a, 0x00",
    ".endif",
    // push imm32 vector
    ".byte 0x68",
    ".long os86_isr_vector",
    "jmp 2f",
    ".set os86_isr_vector, os86_isr_vector + 1",
    ".endr",
    "",
    "2:",
    "push rax",
    "push rcx",
    "push rdx",
    "push rbx",
    "push rbp",
    "push rsi",
    "push rdi",
    "push r8",
    "push r9",
    "push r10",
    "push r11",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "xor eax, eax",
    "mov ax, ds",
    "push rax",
    "mov ax, es",
    "push rax",
    "mov ax, {kernel_data}",
    "mov ds, ax",
    "mov es, ax",
    "cld",
    "mov rdi, rsp",
    "call {dispatch}",
    "pop rax",
    "mov es, ax",
    "pop rax",
    "mov ds, ax",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop r11",
    "pop r10",
    "pop r9",
    "pop r8",
    "pop rdi",
    "pop rsi",
    "pop rbp",
    "pop rbx",
    "pop rdx",
    "pop rcx",
    "pop rax",
    // vector and error code
    "add rsp, 16",
    "iretq",
    ".popsection",
    stride = const STUB_STRIDE,
    error_code_vectors = const ERROR_CODE_VECTORS,
    kernel_data = const KERNEL_DATA_SELECTOR.0,
    dispatch = sym interrupt_entry,
);

extern "C" {
    fn os86_isr_stubs();
}

/// Entry point of the stub for `vector`
pub fn stub_address(vector: u8) -> u64 {
    os86_isr_stubs as usize as u64 + u64::from(vector) * STUB_STRIDE as u64
}

/// Called by the common entry with the frame it built on the interrupted
/// stack. Interrupts are off, since every gate is an interrupt gate.
extern "C" fn interrupt_entry(frame: &mut InterruptFrame) {
    crate::kernel::dispatch(frame);
}
