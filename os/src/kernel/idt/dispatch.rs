//! Interrupt dispatcher
//!
//! Every vector ends up in [`Dispatcher::dispatch`], which:
//!
//! 1. acknowledges the PIC (slave then master, master only, or nothing)
//! 2. reports the vector on the console status strip
//! 3. runs the timer or keyboard handler if the vector is theirs
//!
//! Nothing is fatal: every vector returns to the interrupted context,
//! faults included.

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use super::frame::{exception_name, InterruptFrame, EXCEPTION_VECTORS};
use super::IDT_ENTRIES;
use crate::arch::x86::pic::{ChainedPics, IrqSource, IRQ_KEYBOARD, IRQ_TIMER};
use crate::arch::x86::port::PortIo;
use crate::config::{
    STATUS_ATTRIBUTE, STATUS_KEY_COL, STATUS_ROW, STATUS_TICK_COL, STATUS_VECTOR_COL,
};
use crate::console::Console;

/// PS/2 controller output buffer
pub const KEYBOARD_DATA: u16 = 0x60;

/// Timer glyph cycle
const SPINNER: [u8; 4] = *b"|/-\\";

/// The parts of the most recent frame kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSnapshot {
    pub vector: u8,
    pub error_code: u64,
    /// Where the interrupted context resumes
    pub rip: u64,
}

/// Demultiplexes vectors; counters are readable from mainline code
pub struct Dispatcher {
    pics: ChainedPics,
    ticks: AtomicU64,
    acknowledged: AtomicU64,
    counts: [AtomicU64; IDT_ENTRIES],
    last_vector: AtomicU8,
    last_error_code: AtomicU64,
    last_rip: AtomicU64,
}

impl Dispatcher {
    pub const fn new(pics: ChainedPics) -> Self {
        Self {
            pics,
            ticks: AtomicU64::new(0),
            acknowledged: AtomicU64::new(0),
            counts: [const { AtomicU64::new(0) }; IDT_ENTRIES],
            last_vector: AtomicU8::new(0),
            last_error_code: AtomicU64::new(0),
            last_rip: AtomicU64::new(0),
        }
    }

    pub fn pics(&self) -> &ChainedPics {
        &self.pics
    }

    /// Timer interrupts since bring-up
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// EOI commands sent so far
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }

    /// Times `vector` has been dispatched
    pub fn count(&self, vector: u8) -> u64 {
        self.counts[usize::from(vector)].load(Ordering::Relaxed)
    }

    /// Vector, error code and return address of the last dispatched frame
    pub fn last_frame(&self) -> FrameSnapshot {
        FrameSnapshot {
            vector: self.last_vector.load(Ordering::Relaxed),
            error_code: self.last_error_code.load(Ordering::Relaxed),
            rip: self.last_rip.load(Ordering::Relaxed),
        }
    }

    /// Handle one interrupt. `frame` is left as the CPU and stubs built it.
    pub fn dispatch<P: PortIo, C: Console>(
        &self,
        frame: &mut InterruptFrame,
        io: &mut P,
        console: &mut C,
    ) {
        let vector = frame.vector();

        let sent = self.pics.end_of_interrupt(io, vector);
        self.acknowledged.fetch_add(sent as u64, Ordering::Relaxed);
        self.counts[usize::from(vector)].fetch_add(1, Ordering::Relaxed);
        self.last_vector.store(vector, Ordering::Relaxed);
        self.last_error_code.store(frame.error_code, Ordering::Relaxed);
        self.last_rip.store(frame.rip, Ordering::Relaxed);

        let saved = console.save_state();
        console.set_attribute(STATUS_ATTRIBUTE);
        console.move_cursor(STATUS_ROW, STATUS_VECTOR_COL);
        console.put_hex_byte(vector);

        match self.pics.irq_for_vector(vector) {
            Some(IrqSource::Master(IRQ_TIMER)) => self.timer_tick(console),
            Some(IrqSource::Master(IRQ_KEYBOARD)) => keyboard(io, console),
            _ => {}
        }
        console.restore_state(saved);

        if vector < EXCEPTION_VECTORS {
            report_exception(frame);
        } else {
            log::trace!("vector {:#04x}", vector);
        }
    }

    fn timer_tick<C: Console>(&self, console: &mut C) {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        console.move_cursor(STATUS_ROW, STATUS_TICK_COL);
        console.put_glyph(SPINNER[(ticks % SPINNER.len() as u64) as usize]);
    }
}

/// Read one scan code and show it
fn keyboard<P: PortIo, C: Console>(io: &mut P, console: &mut C) {
    let scan_code = io.read_u8(KEYBOARD_DATA);
    console.move_cursor(STATUS_ROW, STATUS_KEY_COL);
    console.put_hex_byte(scan_code);
}

fn report_exception(frame: &InterruptFrame) {
    let name = exception_name(frame.vector()).unwrap_or("unknown");
    if frame.has_cpu_error_code() {
        log::warn!(
            "exception {:#04x} ({}) error_code={:#x} rip={:#x} cs={:#x}; resuming",
            frame.vector,
            name,
            frame.error_code,
            frame.rip,
            frame.cs
        );
    } else {
        log::warn!(
            "exception {:#04x} ({}) rip={:#x} cs={:#x}; resuming",
            frame.vector,
            name,
            frame.rip,
            frame.cs
        );
    }
}
