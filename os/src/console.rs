//! Character-cell console
//!
//! [`Console`] is the narrow interface interrupt-time code draws through.
//! [`TextConsole`] implements it over an 80x25 colour text buffer: one
//! `u16` per cell, attribute in the high byte, glyph in the low byte.

use core::fmt;
use core::ptr::NonNull;

use crate::arch::x86::port::PortIo;

pub const WIDTH: usize = 80;
pub const HEIGHT: usize = 25;

/// Attribute after reset: light grey on black
pub const DEFAULT_ATTRIBUTE: u8 = 0x07;

/// CRT controller index/data ports
pub const CRTC_INDEX: u16 = 0x3D4;
pub const CRTC_DATA: u16 = 0x3D5;
const CURSOR_HIGH: u8 = 0x0E;
const CURSOR_LOW: u8 = 0x0F;

const TAB_WIDTH: usize = 8;

/// Visible state a writer must put back after drawing elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleState {
    pub row: usize,
    pub col: usize,
    pub attribute: u8,
}

pub trait Console {
    /// Write one byte at the cursor and advance
    fn put_glyph(&mut self, glyph: u8);

    /// Move the contents up by `lines`, blank-filling at the bottom
    fn scroll(&mut self, lines: usize);

    fn move_cursor(&mut self, row: usize, col: usize);

    fn set_attribute(&mut self, attribute: u8);

    fn save_state(&self) -> ConsoleState;

    fn restore_state(&mut self, state: ConsoleState);

    fn put_str(&mut self, text: &str) {
        for byte in text.bytes() {
            self.put_glyph(byte);
        }
    }

    /// Upper-case hex, no prefix, no leading zeros
    fn put_hex(&mut self, value: u64) {
        let mut digits = [0u8; 16];
        let mut len = 0;
        let mut rest = value;
        loop {
            digits[len] = hex_digit(rest as u8);
            len += 1;
            rest >>= 4;
            if rest == 0 {
                break;
            }
        }
        for &digit in digits[..len].iter().rev() {
            self.put_glyph(digit);
        }
    }

    /// Exactly two hex digits
    fn put_hex_byte(&mut self, value: u8) {
        self.put_glyph(hex_digit(value >> 4));
        self.put_glyph(hex_digit(value));
    }

    fn put_dec(&mut self, value: i64) {
        if value < 0 {
            self.put_glyph(b'-');
        }
        let mut digits = [0u8; 20];
        let mut len = 0;
        let mut rest = value.unsigned_abs();
        loop {
            digits[len] = b'0' + (rest % 10) as u8;
            len += 1;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        for &digit in digits[..len].iter().rev() {
            self.put_glyph(digit);
        }
    }
}

fn hex_digit(nibble: u8) -> u8 {
    b"0123456789ABCDEF"[usize::from(nibble & 0xF)]
}

/// Discards everything. Stands in when the real console is busy.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn put_glyph(&mut self, _glyph: u8) {}

    fn scroll(&mut self, _lines: usize) {}

    fn move_cursor(&mut self, _row: usize, _col: usize) {}

    fn set_attribute(&mut self, _attribute: u8) {}

    fn save_state(&self) -> ConsoleState {
        ConsoleState {
            row: 0,
            col: 0,
            attribute: DEFAULT_ATTRIBUTE,
        }
    }

    fn restore_state(&mut self, _state: ConsoleState) {}
}

/// Text-mode console over a cell buffer, cursor driven through the CRTC
pub struct TextConsole<P: PortIo> {
    cells: NonNull<u16>,
    row: usize,
    col: usize,
    attribute: u8,
    ports: P,
}

// SAFETY: the buffer is only reached through `&mut self`.
unsafe impl<P: PortIo + Send> Send for TextConsole<P> {}

impl<P: PortIo> TextConsole<P> {
    /// # Safety
    /// `cells` must point at `WIDTH * HEIGHT` writable cells that outlive the
    /// console and are not accessed through any other path.
    pub unsafe fn new(cells: NonNull<u16>, ports: P) -> Self {
        Self {
            cells,
            row: 0,
            col: 0,
            attribute: DEFAULT_ATTRIBUTE,
            ports,
        }
    }

    /// Blank every cell in the current attribute and home the cursor
    pub fn clear(&mut self) {
        let blank = self.blank();
        for index in 0..WIDTH * HEIGHT {
            self.write_cell(index, blank);
        }
        self.move_cursor(0, 0);
    }

    /// Raw cell value at `row`, `col`
    pub fn cell(&self, row: usize, col: usize) -> u16 {
        self.read_cell(row * WIDTH + col)
    }

    fn blank(&self) -> u16 {
        u16::from(self.attribute) << 8 | u16::from(b' ')
    }

    fn read_cell(&self, index: usize) -> u16 {
        debug_assert!(index < WIDTH * HEIGHT);
        // SAFETY: in bounds, see `new`.
        unsafe { self.cells.as_ptr().add(index).read_volatile() }
    }

    fn write_cell(&mut self, index: usize, value: u16) {
        debug_assert!(index < WIDTH * HEIGHT);
        // SAFETY: in bounds, see `new`.
        unsafe { self.cells.as_ptr().add(index).write_volatile(value) }
    }

    fn sync_cursor(&mut self) {
        let location = (self.row * WIDTH + self.col) as u16;
        self.ports.write_u8(CRTC_INDEX, CURSOR_HIGH);
        self.ports.write_u8(CRTC_DATA, (location >> 8) as u8);
        self.ports.write_u8(CRTC_INDEX, CURSOR_LOW);
        self.ports.write_u8(CRTC_DATA, location as u8);
    }
}

impl<P: PortIo> Console for TextConsole<P> {
    fn put_glyph(&mut self, glyph: u8) {
        match glyph {
            b'\x08' => self.col = self.col.saturating_sub(1),
            b'\t' => self.col = (self.col + TAB_WIDTH) & !(TAB_WIDTH - 1),
            b'\n' => {
                self.col = 0;
                self.row += 1;
            }
            b' '..=b'~' => {
                let cell = u16::from(self.attribute) << 8 | u16::from(glyph);
                self.write_cell(self.row * WIDTH + self.col, cell);
                self.col += 1;
            }
            _ => {}
        }

        if self.col >= WIDTH {
            self.row += self.col / WIDTH;
            self.col %= WIDTH;
        }
        if self.row >= HEIGHT {
            self.scroll(self.row + 1 - HEIGHT);
            self.row = HEIGHT - 1;
        }
        self.sync_cursor();
    }

    fn scroll(&mut self, lines: usize) {
        let lines = lines.min(HEIGHT);
        for index in 0..WIDTH * (HEIGHT - lines) {
            let moved = self.read_cell(index + WIDTH * lines);
            self.write_cell(index, moved);
        }
        let blank = self.blank();
        for index in WIDTH * (HEIGHT - lines)..WIDTH * HEIGHT {
            self.write_cell(index, blank);
        }
    }

    /// Clamped to the screen
    fn move_cursor(&mut self, row: usize, col: usize) {
        self.row = row.min(HEIGHT - 1);
        self.col = col.min(WIDTH - 1);
        self.sync_cursor();
    }

    fn set_attribute(&mut self, attribute: u8) {
        self.attribute = attribute;
    }

    fn save_state(&self) -> ConsoleState {
        ConsoleState {
            row: self.row,
            col: self.col,
            attribute: self.attribute,
        }
    }

    fn restore_state(&mut self, state: ConsoleState) {
        self.attribute = state.attribute;
        self.move_cursor(state.row, state.col);
    }
}

impl<P: PortIo> fmt::Write for TextConsole<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::{Console, ConsoleState, DEFAULT_ATTRIBUTE};
    use std::vec::Vec;

    /// One console call
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Op {
        Glyph(u8),
        Scroll(usize),
        Move(usize, usize),
        Attribute(u8),
        Restore(ConsoleState),
    }

    /// Records calls; tracks only the state save/restore reports
    #[derive(Debug)]
    pub struct RecordingConsole {
        pub ops: Vec<Op>,
        pub state: ConsoleState,
    }

    impl RecordingConsole {
        pub fn new() -> Self {
            Self {
                ops: Vec::new(),
                state: ConsoleState {
                    row: 12,
                    col: 34,
                    attribute: DEFAULT_ATTRIBUTE,
                },
            }
        }

        /// Glyphs written right after a move to `(row, col)`, one list per move
        pub fn renders_at(&self, row: usize, col: usize) -> Vec<Vec<u8>> {
            let mut renders = Vec::new();
            let mut current: Option<Vec<u8>> = None;
            for op in &self.ops {
                match *op {
                    Op::Move(r, c) => {
                        renders.extend(current.take());
                        if (r, c) == (row, col) {
                            current = Some(Vec::new());
                        }
                    }
                    Op::Glyph(glyph) => {
                        if let Some(glyphs) = current.as_mut() {
                            glyphs.push(glyph);
                        }
                    }
                    Op::Restore(_) => renders.extend(current.take()),
                    _ => {}
                }
            }
            renders.extend(current);
            renders
        }
    }

    impl Console for RecordingConsole {
        fn put_glyph(&mut self, glyph: u8) {
            self.ops.push(Op::Glyph(glyph));
        }

        fn scroll(&mut self, lines: usize) {
            self.ops.push(Op::Scroll(lines));
        }

        fn move_cursor(&mut self, row: usize, col: usize) {
            self.ops.push(Op::Move(row, col));
            self.state.row = row;
            self.state.col = col;
        }

        fn set_attribute(&mut self, attribute: u8) {
            self.ops.push(Op::Attribute(attribute));
            self.state.attribute = attribute;
        }

        fn save_state(&self) -> ConsoleState {
            self.state
        }

        fn restore_state(&mut self, state: ConsoleState) {
            self.ops.push(Op::Restore(state));
            self.state = state;
        }
    }
}
