//! Port-mapped I/O.
//!
//! Everything that talks to a legacy device goes through [`PortIo`], so the
//! byte sequences can be checked on the host with [`testing::RecordingPorts`].

/// Unused port written to give slow devices time to latch a command byte
pub const IO_WAIT_PORT: u16 = 0x80;

/// Byte-wide access to the I/O address space
pub trait PortIo {
    /// Read one byte from `port`
    fn read_u8(&mut self, port: u16) -> u8;

    /// Write one byte to `port`
    fn write_u8(&mut self, port: u16, value: u8);

    /// Short delay between consecutive writes to a slow device
    fn io_wait(&mut self) {
        self.write_u8(IO_WAIT_PORT, 0);
    }
}

/// The real I/O address space
#[derive(Debug)]
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    /// Port writes reprogram hardware. The caller must run at a privilege
    /// level allowed to execute `in`/`out` and must be the only code driving
    /// the devices it touches through this handle.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl PortIo for HardwarePorts {
    #[inline(always)]
    fn read_u8(&mut self, port: u16) -> u8 {
        let mut port = x86_64::instructions::port::Port::<u8>::new(port);
        // SAFETY: construction of `HardwarePorts` is unsafe and carries the contract.
        unsafe { port.read() }
    }

    #[inline(always)]
    fn write_u8(&mut self, port: u16, value: u8) {
        let mut port = x86_64::instructions::port::Port::<u8>::new(port);
        // SAFETY: see `read_u8`.
        unsafe { port.write(value) }
    }
}

#[cfg(test)]
pub mod testing {
    use super::{PortIo, IO_WAIT_PORT};
    use std::collections::{HashMap, VecDeque};
    use std::vec::Vec;

    /// One port access, in program order
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Access {
        Read(u16),
        Write(u16, u8),
    }

    /// Records every access; reads return queued bytes (or 0)
    #[derive(Debug, Default)]
    pub struct RecordingPorts {
        pub log: Vec<Access>,
        pub input: HashMap<u16, VecDeque<u8>>,
    }

    impl RecordingPorts {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn queue(&mut self, port: u16, value: u8) {
            self.input.entry(port).or_default().push_back(value);
        }

        /// Writes in order, leaving out I/O delay writes
        pub fn writes(&self) -> Vec<(u16, u8)> {
            self.log
                .iter()
                .filter_map(|access| match *access {
                    Access::Write(port, value) if port != IO_WAIT_PORT => Some((port, value)),
                    _ => None,
                })
                .collect()
        }

        pub fn writes_to(&self, port: u16) -> Vec<u8> {
            self.writes()
                .into_iter()
                .filter(|&(p, _)| p == port)
                .map(|(_, v)| v)
                .collect()
        }

        pub fn clear(&mut self) {
            self.log.clear();
        }
    }

    impl PortIo for RecordingPorts {
        fn read_u8(&mut self, port: u16) -> u8 {
            self.log.push(Access::Read(port));
            self.input
                .get_mut(&port)
                .and_then(VecDeque::pop_front)
                .unwrap_or(0)
        }

        fn write_u8(&mut self, port: u16, value: u8) {
            self.log.push(Access::Write(port, value));
        }
    }
}
