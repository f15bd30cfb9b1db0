//! os86: descriptor tables, interrupt entry and legacy PIC/PIT bring-up.
//!
//! The library holds every piece of the interrupt subsystem so it can be
//! unit tested on the host; `main.rs` is the thin kernel binary around it.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod console;
pub mod error;
pub mod kernel;
pub mod logger;
pub mod serial;

pub use error::{InitError, InitResult};
