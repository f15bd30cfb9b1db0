//! Serial port (COM1 @ 0x3F8) for debug output. Backs the logger.
//!
//! No state besides the UART itself, so interrupt-time code may write here
//! without taking a lock. Lines from different contexts can interleave.

use crate::arch::x86::port::PortIo;

pub const COM1: u16 = 0x3F8;

const IER_OFF: u16 = 1;
const LCR_OFF: u16 = 3;
const LCR_8N1: u8 = 0x03;
const MCR_OFF: u16 = 4;
const MCR_DTR_RTS: u8 = 0x03;
const LSR_OFF: u16 = 5;
const LSR_THRE: u8 = 0x20;

/// One 16550-compatible UART
#[derive(Debug)]
pub struct SerialPort<P: PortIo> {
    base: u16,
    ports: P,
}

impl<P: PortIo> SerialPort<P> {
    pub const fn new(base: u16, ports: P) -> Self {
        Self { base, ports }
    }

    /// 8N1, UART interrupts off. Every PIC line is unmasked later, so the
    /// UART must not raise IRQ 4.
    pub fn init(&mut self) {
        self.ports.write_u8(self.base + IER_OFF, 0);
        self.ports.write_u8(self.base + LCR_OFF, LCR_8N1);
        self.ports.write_u8(self.base + MCR_OFF, MCR_DTR_RTS);
    }

    fn is_transmit_empty(&mut self) -> bool {
        self.ports.read_u8(self.base + LSR_OFF) & LSR_THRE != 0
    }

    /// Write one byte. Blocks until THR empty.
    pub fn write_byte(&mut self, b: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }
        self.ports.write_u8(self.base, b);
    }
}

impl<P: PortIo> core::fmt::Write for SerialPort<P> {
    /// Newlines not translated
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.bytes() {
            self.write_byte(b);
        }
        Ok(())
    }
}

#[cfg(target_arch = "x86_64")]
pub use self::com1::{init, write_fmt};

#[cfg(target_arch = "x86_64")]
mod com1 {
    use super::{SerialPort, COM1};
    use crate::arch::x86::port::HardwarePorts;

    fn port() -> SerialPort<HardwarePorts> {
        // SAFETY: COM1 is only driven through this module.
        SerialPort::new(COM1, unsafe { HardwarePorts::new() })
    }

    /// Initialize COM1. Call once at boot, before the logger.
    pub fn init() {
        port().init();
    }

    pub fn write_fmt(args: core::fmt::Arguments) {
        use core::fmt::Write;
        let _ = port().write_fmt(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86::port::testing::{Access, RecordingPorts};
    use core::fmt::Write;

    #[test]
    fn init_disables_uart_interrupts() {
        let mut serial = SerialPort::new(COM1, RecordingPorts::new());
        serial.init();
        assert_eq!(
            serial.ports.writes(),
            vec![(0x3F9, 0x00), (0x3FB, 0x03), (0x3FC, 0x03)]
        );
    }

    #[test]
    fn write_waits_for_empty_holding_register() {
        let mut ports = RecordingPorts::new();
        ports.queue(0x3FD, 0x00);
        ports.queue(0x3FD, 0x00);
        ports.queue(0x3FD, LSR_THRE);
        let mut serial = SerialPort::new(COM1, ports);

        serial.write_byte(b'k');
        assert_eq!(
            serial.ports.log,
            vec![
                Access::Read(0x3FD),
                Access::Read(0x3FD),
                Access::Read(0x3FD),
                Access::Write(0x3F8, b'k'),
            ]
        );
    }

    #[test]
    fn formatted_output() {
        let mut ports = RecordingPorts::new();
        for _ in 0..6 {
            ports.queue(0x3FD, LSR_THRE);
        }
        let mut serial = SerialPort::new(COM1, ports);
        writeln!(serial, "v={:02x}", 0x2c).unwrap();
        assert_eq!(serial.ports.writes_to(0x3F8), b"v=2c\n".to_vec());
    }
}
