//! 8253/8254 PIT (Programmable Interval Timer) channel 0.
//!
//! Generates IRQ0 at a programmable frequency. Drives the tick counter.

use super::port::PortIo;
use crate::error::{InitError, InitResult};

pub const CH0_DATA: u16 = 0x40;
pub const CMD: u16 = 0x43;

/// PIT input clock in Hz
pub const PIT_BASE_HZ: u32 = 1_193_182;

/// Command: channel 0, lo/hi bytes, mode 3 (square wave), binary
pub const CMD_CH0_SQUARE: u8 = 0x36;

/// Reload value for `frequency_hz`: the base oscillator divided by the rate.
///
/// Rates below ~19 Hz need more than 16 bits and are rejected, as is 0.
pub fn reload_value(frequency_hz: u32) -> InitResult<u16> {
    if frequency_hz == 0 {
        return Err(InitError::TimerFrequency { requested: 0 });
    }
    match u16::try_from(PIT_BASE_HZ / frequency_hz) {
        Ok(0) | Err(_) => Err(InitError::TimerFrequency {
            requested: frequency_hz,
        }),
        Ok(divisor) => Ok(divisor),
    }
}

/// Program channel 0 to fire at `frequency_hz`. Returns the reload value written.
///
/// Call after PIC remap, before enabling interrupts.
pub fn program_timer<P: PortIo>(io: &mut P, frequency_hz: u32) -> InitResult<u16> {
    let divisor = reload_value(frequency_hz)?;
    let [divisor_lo, divisor_hi] = divisor.to_le_bytes();

    io.write_u8(CMD, CMD_CH0_SQUARE);
    io.write_u8(CH0_DATA, divisor_lo);
    io.write_u8(CH0_DATA, divisor_hi);
    Ok(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86::port::testing::RecordingPorts;

    #[test]
    fn twenty_hz_reload() {
        assert_eq!(reload_value(20), Ok((PIT_BASE_HZ / 20) as u16));
        assert_eq!(reload_value(20), Ok(59_659));
        assert_eq!(reload_value(100), Ok(11_931));
    }

    #[test]
    fn out_of_range_rates() {
        assert_eq!(reload_value(0), Err(InitError::TimerFrequency { requested: 0 }));
        assert_eq!(reload_value(18), Err(InitError::TimerFrequency { requested: 18 }));
        assert_eq!(reload_value(19), Ok(62_799));
        assert_eq!(reload_value(PIT_BASE_HZ), Ok(1));
        assert_eq!(
            reload_value(PIT_BASE_HZ + 1),
            Err(InitError::TimerFrequency { requested: PIT_BASE_HZ + 1 })
        );
    }

    #[test]
    fn program_writes_command_then_low_then_high() {
        let mut io = RecordingPorts::new();
        let divisor = program_timer(&mut io, 20).unwrap();
        assert_eq!(
            io.writes(),
            [
                (CMD, 0x36),
                (CH0_DATA, (divisor & 0xFF) as u8),
                (CH0_DATA, (divisor >> 8) as u8),
            ]
        );
    }

    #[test]
    fn rejected_rate_touches_no_port() {
        let mut io = RecordingPorts::new();
        assert!(program_timer(&mut io, 1).is_err());
        assert!(io.log.is_empty());
    }
}
