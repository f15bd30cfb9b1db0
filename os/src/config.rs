//! Compile-time configuration.

use bootloader_api::config::{BootloaderConfig, Mapping};
use log::LevelFilter;

/// Periodic timer rate programmed into PIT channel 0.
pub const TIMER_HZ: u32 = 20;

/// First vector of the master PIC after remap (IRQ0-7).
pub const PIC_MASTER_BASE: u8 = 0x20;

/// First vector of the slave PIC after remap (IRQ8-15).
pub const PIC_SLAVE_BASE: u8 = 0x28;

/// Maximum level forwarded to the serial logger.
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Vectors raised with `int n` by the boot-time self test.
pub const SELF_TEST_VECTORS: [u8; 2] = [0x80, 0x81];

/// Row of the status strip the dispatcher draws into.
pub const STATUS_ROW: usize = 0;
/// Column of the two-digit report of the last dispatched vector.
pub const STATUS_VECTOR_COL: usize = 72;
/// Column of the two-digit report of the last keyboard scan code.
pub const STATUS_KEY_COL: usize = 75;
/// Column of the rotating timer glyph.
pub const STATUS_TICK_COL: usize = 79;
/// Attribute used for the status strip (yellow on blue).
pub const STATUS_ATTRIBUTE: u8 = 0x1E;

/// Physical address of the colour text buffer.
pub const TEXT_BUFFER_PHYS: u64 = 0xB8000;

/// The text buffer is reached through the bootloader's physical memory map.
pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};
