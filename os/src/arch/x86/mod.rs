//! x86 family support: port I/O, the 8259 PIC pair, the 8253/8254 PIT,
//! execution-mode descriptions and the privileged primitives.

pub mod mode;
pub mod pic;
pub mod pit;
pub mod port;

#[cfg(target_arch = "x86_64")]
pub mod instructions;
