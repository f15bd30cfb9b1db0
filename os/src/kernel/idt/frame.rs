//! Saved register frame
//!
//! Built on the interrupted stack by the entry stubs. Lowest address first,
//! so the reverse of push order:
//!
//! ```text
//! es ds | r15 .. r8 rdi rsi rbp rbx rdx rcx rax | vector error_code | rip cs rflags rsp ss
//!  common entry                                 |  stub             |  CPU
//! ```
//!
//! The CPU always pushes SS:RSP in long mode, privilege change or not.

/// Vectors for which the CPU pushes an error code (bit n = vector n):
/// 8, 10-14, 17, 21, 29, 30.
pub const ERROR_CODE_VECTORS: u32 = 1 << 8
    | 1 << 10
    | 1 << 11
    | 1 << 12
    | 1 << 13
    | 1 << 14
    | 1 << 17
    | 1 << 21
    | 1 << 29
    | 1 << 30;

/// Vectors 0-31 are CPU exceptions
pub const EXCEPTION_VECTORS: u8 = 32;

/// Whether the CPU supplies an error code for `vector`
pub const fn pushes_error_code(vector: u8) -> bool {
    vector < EXCEPTION_VECTORS && (ERROR_CODE_VECTORS >> vector) & 1 != 0
}

/// Register state at interrupt entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct InterruptFrame {
    pub es: u64,
    pub ds: u64,

    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rax: u64,

    /// Pushed by the stub
    pub vector: u64,
    /// CPU-supplied, or 0 pushed by the stub
    pub error_code: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Frame size; a multiple of 16, which keeps the stack aligned for the call
/// into Rust.
pub const FRAME_SIZE: usize = core::mem::size_of::<InterruptFrame>();

const _: () = assert!(FRAME_SIZE == 24 * 8);
const _: () = assert!(FRAME_SIZE % 16 == 0);

impl InterruptFrame {
    /// Vector number 0-255
    pub fn vector(&self) -> u8 {
        self.vector as u8
    }

    /// Whether the CPU pushed the error code rather than the stub
    pub fn has_cpu_error_code(&self) -> bool {
        pushes_error_code(self.vector())
    }
}

/// Mnemonic of an exception vector, for reports only
pub fn exception_name(vector: u8) -> Option<&'static str> {
    let name = match vector {
        0 => "#DE divide error",
        1 => "#DB debug",
        2 => "NMI",
        3 => "#BP breakpoint",
        4 => "#OF overflow",
        5 => "#BR bound range exceeded",
        6 => "#UD invalid opcode",
        7 => "#NM device not available",
        8 => "#DF double fault",
        9 => "coprocessor segment overrun",
        10 => "#TS invalid TSS",
        11 => "#NP segment not present",
        12 => "#SS stack-segment fault",
        13 => "#GP general protection",
        14 => "#PF page fault",
        16 => "#MF x87 floating-point",
        17 => "#AC alignment check",
        18 => "#MC machine check",
        19 => "#XM SIMD floating-point",
        20 => "#VE virtualization",
        21 => "#CP control protection",
        28 => "#HV hypervisor injection",
        29 => "#VC VMM communication",
        30 => "#SX security",
        15 | 22..=27 | 31 => "reserved",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn error_code_classification() {
        let with_code: [u8; 10] = [8, 10, 11, 12, 13, 14, 17, 21, 29, 30];
        for vector in 0..=255u8 {
            assert_eq!(
                pushes_error_code(vector),
                with_code.contains(&vector),
                "vector {vector}"
            );
        }
    }

    #[test]
    fn layout_matches_push_order() {
        assert_eq!(offset_of!(InterruptFrame, es), 0);
        assert_eq!(offset_of!(InterruptFrame, ds), 8);
        assert_eq!(offset_of!(InterruptFrame, r15), 16);
        assert_eq!(offset_of!(InterruptFrame, r8), 16 + 7 * 8);
        assert_eq!(offset_of!(InterruptFrame, rax), 16 + 14 * 8);
        assert_eq!(offset_of!(InterruptFrame, vector), 17 * 8);
        assert_eq!(offset_of!(InterruptFrame, error_code), 18 * 8);
        assert_eq!(offset_of!(InterruptFrame, rip), 19 * 8);
        assert_eq!(offset_of!(InterruptFrame, ss), 23 * 8);
        assert_eq!(FRAME_SIZE, 192);
    }

    #[test]
    fn vector_accessor_truncates_to_byte() {
        let frame = InterruptFrame {
            vector: 0x2C,
            ..Default::default()
        };
        assert_eq!(frame.vector(), 0x2C);
        assert!(!frame.has_cpu_error_code());

        let gp = InterruptFrame {
            vector: 13,
            error_code: 0x18,
            ..Default::default()
        };
        assert!(gp.has_cpu_error_code());
    }

    #[test]
    fn exception_names_cover_exception_range_only() {
        for vector in 0..EXCEPTION_VECTORS {
            assert!(exception_name(vector).is_some());
        }
        assert_eq!(exception_name(13), Some("#GP general protection"));
        assert_eq!(exception_name(32), None);
        assert_eq!(exception_name(0x80), None);
    }
}
