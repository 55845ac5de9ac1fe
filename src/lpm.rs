//! Low Power Mode (LPM) control
//!
//! The MSP430 enters a low power mode by setting a combination of the SCG1, SCG0, OSCOFF and
//! CPUOFF bits in the status register. The CPU stays halted until an interrupt fires. On return
//! from the interrupt the saved status register is restored, so the CPU goes straight back to
//! sleep unless the handler cleared the mode bits on the stack (with msp430-rt this is what
//! `#[interrupt(wake_cpu)]` does).
//!
//! # LPM0
//! CPU and MCLK are off. SMCLK and ACLK keep running.
//!
//! # LPM1
//! As LPM0, and the DCO generator is off if it is not used for SMCLK.
//!
//! # LPM2
//! CPU, MCLK, SMCLK and the DCO are off. The DC generator stays on. ACLK keeps running.
//!
//! # LPM3
//! CPU, MCLK, SMCLK, DCO and the DC generator are off. ACLK keeps running, which is what the
//! uptime timer is normally clocked from.
//!
//! # LPM4
//! All clocks are off. Only external interrupts can wake the CPU.

use crate::arch;

// Status register:
// SCG1 SCG0 OSC_OFF CPU_OFF GIE N Z C
// 7    6    5       4       3   2 1 0
const SCG1: u16 = 1 << 7;
const SCG0: u16 = 1 << 6;
const OSC_OFF: u16 = 1 << 5;
const CPU_OFF: u16 = 1 << 4;
/// General interrupt enable bit of the status register
pub const GIE: u16 = 1 << 3;
/// Every status register bit that takes part in selecting a low power mode
pub const LPM_MASK: u16 = SCG1 | SCG0 | OSC_OFF | CPU_OFF;

/// Low power modes available on all MSP430 devices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowPowerMode {
    /// CPU off
    Lpm0,
    /// CPU off, DCO generator off if unused
    Lpm1,
    /// CPU, DCO and SMCLK off
    Lpm2,
    /// Everything but ACLK off
    Lpm3,
    /// Everything off
    Lpm4,
}

impl LowPowerMode {
    /// Status register bits that select this mode
    #[inline]
    pub const fn sr_bits(self) -> u16 {
        match self {
            LowPowerMode::Lpm0 => CPU_OFF,
            LowPowerMode::Lpm1 => SCG0 + CPU_OFF,
            LowPowerMode::Lpm2 => SCG1 + CPU_OFF,
            LowPowerMode::Lpm3 => SCG1 + SCG0 + CPU_OFF,
            LowPowerMode::Lpm4 => SCG1 + SCG0 + OSC_OFF + CPU_OFF,
        }
    }
}

/// Enter `mode` with interrupts enabled.
///
/// Returns once an interrupt handler has taken the CPU out of the low power mode. Whatever woke
/// the CPU may leave GIE set on return.
#[inline(always)]
pub fn enter_with_interrupts(mode: LowPowerMode) {
    arch::bis_sr(mode.sr_bits() | GIE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpm_bits_match_family_header() {
        assert_eq!(LowPowerMode::Lpm0.sr_bits(), 0x0010);
        assert_eq!(LowPowerMode::Lpm1.sr_bits(), 0x0050);
        assert_eq!(LowPowerMode::Lpm2.sr_bits(), 0x0090);
        assert_eq!(LowPowerMode::Lpm3.sr_bits(), 0x00D0);
        assert_eq!(LowPowerMode::Lpm4.sr_bits(), 0x00F0);
    }
}
