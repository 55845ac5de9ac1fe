//! CPU services used by the clock and uptime code
//!
//! Clock configuration has to keep the watchdog fed while it waits for oscillators, and the delay
//! alarm needs to put the CPU to sleep. Both go through the [`Cpu`] trait so that the same code
//! runs on the device and against a simulated CPU in tests.

use crate::arch;
use crate::lpm::{self, LowPowerMode};

/// Operations the core needs from the processor itself
pub trait Cpu {
    /// Restart the watchdog countdown, if a watchdog is running
    fn feed_watchdog(&self);

    /// Busy-wait for at least `cycles` MCLK cycles
    fn delay_cycles(&self, cycles: u32);

    /// Enter `mode` with interrupts enabled. Returns with interrupts disabled once something
    /// wakes the CPU.
    fn enter_lpm(&self, mode: LowPowerMode);
}

impl<C: Cpu + ?Sized> Cpu for &C {
    #[inline]
    fn feed_watchdog(&self) {
        (**self).feed_watchdog()
    }

    #[inline]
    fn delay_cycles(&self, cycles: u32) {
        (**self).delay_cycles(cycles)
    }

    #[inline]
    fn enter_lpm(&self, mode: LowPowerMode) {
        (**self).enter_lpm(mode)
    }
}

/// Something that can restart a watchdog countdown
pub trait WatchdogFeed {
    /// Restart the countdown
    fn feed(&self);
}

/// Use when the watchdog is held, so there is nothing to feed
pub struct HeldWatchdog;

impl WatchdogFeed for HeldWatchdog {
    #[inline(always)]
    fn feed(&self) {}
}

/// The MSP430 core
pub struct Core<W: WatchdogFeed> {
    wdt: W,
}

impl<W: WatchdogFeed> Core<W> {
    /// Create the core services, feeding `wdt` whenever the core waits
    pub fn new(wdt: W) -> Self {
        Core { wdt }
    }

    /// Release the watchdog
    pub fn free(self) -> W {
        self.wdt
    }
}

impl<W: WatchdogFeed> Cpu for Core<W> {
    #[inline]
    fn feed_watchdog(&self) {
        self.wdt.feed();
    }

    #[inline]
    fn delay_cycles(&self, cycles: u32) {
        arch::delay_cycles(cycles);
    }

    #[inline]
    fn enter_lpm(&self, mode: LowPowerMode) {
        lpm::enter_with_interrupts(mode);
        // Only the delay alarm is known to clear GIE on its way out
        arch::disable_interrupts();
    }
}
