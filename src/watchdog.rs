//! Watchdog timer (WDT+)
//!
//! **Note**: MSP430 devices will reset after bootup if the watchdog is not stopped or fed within
//! its initial interval of 32768 SMCLK cycles (roughly 30 ms at the power-up DCO frequency). Call
//! `Wdt::constrain()` as early in the application as possible.

use crate::cpu::WatchdogFeed;
use crate::pac;

const PASSWORD: u16 = 0x5A00;

const WDTHOLD: u16 = 1 << 7;
const WDTTMSEL: u16 = 1 << 4;
const WDTCNTCL: u16 = 1 << 3;
const WDTSSEL: u16 = 1 << 2;
const WDTIS: u16 = 0b11;

/// Watchdog interval, in cycles of the selected clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WdtClkPeriods {
    /// 32768 cycles
    _32K = 0,
    /// 8192 cycles
    _8192 = 1,
    /// 512 cycles
    _512 = 2,
    /// 64 cycles
    _64 = 3,
}

/// Watchdog clock source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WdtClkSrc {
    /// SMCLK
    Smclk,
    /// ACLK
    Aclk,
}

/// Watchdog timer in watchdog mode
pub struct Wdt {
    periph: pac::WATCHDOG_TIMER,
}

impl Wdt {
    /// Take the watchdog peripheral and hold it
    pub fn constrain(wdt: pac::WATCHDOG_TIMER) -> Self {
        #[allow(unused_unsafe)]
        wdt.wdtctl.write(|w| unsafe { w.bits(PASSWORD | WDTHOLD) });
        Wdt { periph: wdt }
    }

    #[inline(always)]
    fn modify(&self, f: impl FnOnce(u16) -> u16) {
        #[allow(unused_unsafe)]
        self.periph.wdtctl.modify(|r, w| {
            // The upper byte reads back as 0x69, so only keep the control bits
            unsafe { w.bits(PASSWORD | f(r.bits() & 0x00FF)) }
        });
    }

    /// Start the watchdog with the given clock and interval, resetting the countdown
    pub fn start(&mut self, src: WdtClkSrc, periods: WdtClkPeriods) {
        let ssel = match src {
            WdtClkSrc::Smclk => 0,
            WdtClkSrc::Aclk => WDTSSEL,
        };
        self.modify(|_| ssel | WDTCNTCL | periods as u16);
    }

    /// Stop the countdown
    pub fn hold(&mut self) {
        self.modify(|bits| bits | WDTHOLD);
    }

    /// Check whether the watchdog is stopped
    pub fn is_held(&self) -> bool {
        self.periph.wdtctl.read().bits() & WDTHOLD != 0
    }

    /// Whether the watchdog is in interval timer mode rather than reset mode
    pub fn is_interval_mode(&self) -> bool {
        self.periph.wdtctl.read().bits() & WDTTMSEL != 0
    }

    /// Currently selected interval
    pub fn interval(&self) -> WdtClkPeriods {
        match self.periph.wdtctl.read().bits() & WDTIS {
            0 => WdtClkPeriods::_32K,
            1 => WdtClkPeriods::_8192,
            2 => WdtClkPeriods::_512,
            _ => WdtClkPeriods::_64,
        }
    }

    /// Release the watchdog peripheral
    pub fn free(self) -> pac::WATCHDOG_TIMER {
        self.periph
    }
}

impl WatchdogFeed for Wdt {
    #[inline]
    fn feed(&self) {
        self.modify(|bits| bits | WDTCNTCL);
    }
}
