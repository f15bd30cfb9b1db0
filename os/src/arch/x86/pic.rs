//! 8259 PIC pair (master + cascaded slave).
//!
//! Remap moves IRQ 0-15 off the CPU exception vectors. After remap IRQ `n`
//! arrives on `master_base + n` (n < 8) or `slave_base + n - 8`.

use super::port::PortIo;

pub const MASTER_CMD: u16 = 0x20;
pub const MASTER_DATA: u16 = 0x21;
pub const SLAVE_CMD: u16 = 0xA0;
pub const SLAVE_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;
pub const EOI: u8 = 0x20;

/// Lines per controller
pub const LINES_PER_PIC: u8 = 8;

/// IRQs with a dedicated handler
pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_CASCADE: u8 = 2;

/// ICW3: the master takes a bit mask of lines with a slave, the slave its line number
const MASTER_CASCADE: u8 = 1 << IRQ_CASCADE;
const SLAVE_CASCADE: u8 = IRQ_CASCADE;

/// Which controller raised a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    /// IRQ 0-7
    Master(u8),
    /// IRQ 8-15
    Slave(u8),
}

impl IrqSource {
    /// IRQ line number 0-15
    pub fn line(self) -> u8 {
        match self {
            Self::Master(irq) | Self::Slave(irq) => irq,
        }
    }
}

/// Vector mapping for the cascaded pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainedPics {
    master_base: u8,
    slave_base: u8,
}

impl ChainedPics {
    /// Bases must each leave room for 8 vectors.
    pub const fn new(master_base: u8, slave_base: u8) -> Self {
        assert!(master_base <= u8::MAX - (LINES_PER_PIC - 1));
        assert!(slave_base <= u8::MAX - (LINES_PER_PIC - 1));
        Self {
            master_base,
            slave_base,
        }
    }

    pub const fn master_base(&self) -> u8 {
        self.master_base
    }

    pub const fn slave_base(&self) -> u8 {
        self.slave_base
    }

    /// Vector a given IRQ line arrives on, `None` for lines above 15
    pub fn vector_for_irq(&self, irq: u8) -> Option<u8> {
        match irq {
            0..=7 => Some(self.master_base + irq),
            8..=15 => Some(self.slave_base + irq - LINES_PER_PIC),
            _ => None,
        }
    }

    /// Which controller owns `vector`, if any
    pub fn irq_for_vector(&self, vector: u8) -> Option<IrqSource> {
        if let Some(offset) = vector.checked_sub(self.slave_base) {
            if offset < LINES_PER_PIC {
                return Some(IrqSource::Slave(offset + LINES_PER_PIC));
            }
        }
        match vector.checked_sub(self.master_base) {
            Some(offset) if offset < LINES_PER_PIC => Some(IrqSource::Master(offset)),
            _ => None,
        }
    }

    /// Run the ICW1-ICW4 sequence on both controllers, then unmask every line.
    ///
    /// Must complete, with the IDT already covering both vector ranges,
    /// before interrupts are enabled.
    pub fn remap<P: PortIo>(&self, io: &mut P) {
        // Start initialization (cascade mode, ICW4 follows)
        write_slow(io, MASTER_CMD, ICW1_INIT | ICW1_ICW4);
        write_slow(io, SLAVE_CMD, ICW1_INIT | ICW1_ICW4);

        // Vector bases
        write_slow(io, MASTER_DATA, self.master_base);
        write_slow(io, SLAVE_DATA, self.slave_base);

        // Cascade wiring
        write_slow(io, MASTER_DATA, MASTER_CASCADE);
        write_slow(io, SLAVE_DATA, SLAVE_CASCADE);

        // 8086 mode
        write_slow(io, MASTER_DATA, ICW4_8086);
        write_slow(io, SLAVE_DATA, ICW4_8086);

        self.set_masks(io, 0, 0);
    }

    /// Write both interrupt-mask registers (bit set = line masked)
    pub fn set_masks<P: PortIo>(&self, io: &mut P, master: u8, slave: u8) {
        io.write_u8(MASTER_DATA, master);
        io.write_u8(SLAVE_DATA, slave);
    }

    /// Acknowledge `vector`. Slave-range vectors need the slave's EOI first,
    /// then the master's; non-IRQ vectors need none. Returns how many EOI
    /// commands were sent.
    pub fn end_of_interrupt<P: PortIo>(&self, io: &mut P, vector: u8) -> usize {
        match self.irq_for_vector(vector) {
            Some(IrqSource::Slave(_)) => {
                io.write_u8(SLAVE_CMD, EOI);
                io.write_u8(MASTER_CMD, EOI);
                2
            }
            Some(IrqSource::Master(_)) => {
                io.write_u8(MASTER_CMD, EOI);
                1
            }
            None => 0,
        }
    }
}

fn write_slow<P: PortIo>(io: &mut P, port: u16, value: u8) {
    io.write_u8(port, value);
    io.io_wait();
}
