//! Bring-up errors
//!
//! Every failure here is detected before the CPU's descriptor or interrupt
//! state is touched. Once tables are loaded nothing is fallible.

/// Errors reported by `kernel::early_init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The boot stage did not leave the CPU in the mode this build targets
    UnexpectedMode {
        /// Name of the mode the kernel was built for
        expected: &'static str,
    },

    /// Bootloader did not map physical memory, so the text buffer is unreachable
    NoPhysicalMemoryMapping,

    /// A global logger was installed before ours
    LoggerAlreadySet,

    /// PIT reload value for the requested rate does not fit in 16 bits
    TimerFrequency {
        /// Requested interrupt rate in Hz
        requested: u32,
    },
}

impl InitError {
    /// Returns a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnexpectedMode { .. } => "CPU is not in the expected execution mode",
            Self::NoPhysicalMemoryMapping => "bootloader provided no physical memory mapping",
            Self::LoggerAlreadySet => "a global logger is already installed",
            Self::TimerFrequency { .. } => "timer frequency out of range",
        }
    }
}

/// Convenience type alias for Results with InitError
pub type InitResult<T> = Result<T, InitError>;

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedMode { expected } => {
                write!(f, "{}: expected {}", self.description(), expected)
            }
            Self::TimerFrequency { requested } => {
                write!(
                    f,
                    "{}: {} Hz needs a reload value outside 1..=0xFFFF",
                    self.description(),
                    requested
                )
            }
            _ => write!(f, "{}", self.description()),
        }
    }
}
