//! Sleep alarm on the uptime timer
//!
//! One capture/compare channel of the uptime timer can be set aside for sleeping until a given
//! uptime. [`Uptime::sleep_until`] arms the channel, enters a low power mode and reports how far
//! the clock is from the target when the CPU wakes. Any enabled interrupt can end the sleep, so
//! callers that need the full interval should use [`Uptime::delay_until`] or the
//! [`DelayNs`] implementation, which go back to sleep until the target is reached.
//!
//! Registration follows the state of the uptime timer: the alarm only takes part in interrupt
//! dispatch while the delay is enabled and the timer is running.

use crate::cpu::Cpu;
use crate::lpm::LowPowerMode;
use crate::timer::{Alarm, AlarmError, IsrResult, Timer, TimerEvent, TimerEventHandler};
use crate::uptime::{saturate, Uptime, UptimeState};
use crate::TimerA;
use core::cell::Cell;
use critical_section::{CriticalSection, Mutex};
use embedded_hal::delay::DelayNs;

/// Interrupt-side half of the delay alarm. Must live in a `static`.
pub struct DelayHandler {
    fired: Mutex<Cell<bool>>,
}

impl DelayHandler {
    /// Handler that has not fired
    pub const fn new() -> Self {
        DelayHandler {
            fired: Mutex::new(Cell::new(false)),
        }
    }

    /// Whether the alarm fired since it was last armed
    #[inline]
    pub fn fired(&self, cs: CriticalSection<'_>) -> bool {
        self.fired.borrow(cs).get()
    }
}

impl Default for DelayHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEventHandler for DelayHandler {
    fn on_event(&self, cs: CriticalSection<'_>, _event: TimerEvent) -> IsrResult {
        self.fired.borrow(cs).set(true);
        // Back to the sleeper with interrupts still off
        IsrResult::EXIT_LPM | IsrResult::CLEAR_GIE
    }
}

/// State of the delay alarm.
///
/// `registered` is only ever true while `valid`, `enabled` and `timer_active` all are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DelayFlags {
    /// The alarm channel was claimed
    pub valid: bool,
    /// The application wants the delay available
    pub enabled: bool,
    /// The alarm is hooked into interrupt dispatch
    pub registered: bool,
    /// The uptime timer is running
    pub timer_active: bool,
}

/// Delay control errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DelayError {
    /// No alarm channel was configured, or it couldn't be claimed
    Unavailable,
}

/// Sleep errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepError {
    /// The delay alarm is disabled, or the uptime timer is suspended
    NotRegistered,
    /// The alarm couldn't be armed
    Arm(AlarmError),
}

impl From<AlarmError> for SleepError {
    fn from(e: AlarmError) -> Self {
        SleepError::Arm(e)
    }
}

pub(crate) struct DelayAlarm {
    alarm: Alarm,
    handler: &'static DelayHandler,
    flags: DelayFlags,
}

impl DelayAlarm {
    /// Claim `ccidx` of `timer`. The alarm starts enabled, on a running timer.
    pub(crate) fn new<T: TimerA>(
        cs: CriticalSection<'_>,
        timer: &Timer<T>,
        ccidx: u8,
        handler: &'static DelayHandler,
    ) -> Result<Self, AlarmError> {
        let alarm = Alarm::new(cs, timer, ccidx, handler)?;
        Ok(DelayAlarm {
            alarm,
            handler,
            flags: DelayFlags {
                valid: true,
                enabled: true,
                registered: false,
                timer_active: true,
            },
        })
    }

    #[inline]
    pub(crate) fn flags(&self) -> DelayFlags {
        self.flags
    }

    pub(crate) fn set_enabled<T: TimerA>(
        &mut self,
        cs: CriticalSection<'_>,
        timer: &Timer<T>,
        on: bool,
    ) {
        self.flags.enabled = on;
        self.reconcile(cs, timer);
    }

    pub(crate) fn set_timer_active<T: TimerA>(
        &mut self,
        cs: CriticalSection<'_>,
        timer: &Timer<T>,
        active: bool,
    ) {
        self.flags.timer_active = active;
        self.reconcile(cs, timer);
    }

    // The only place `registered` changes
    fn reconcile<T: TimerA>(&mut self, cs: CriticalSection<'_>, timer: &Timer<T>) {
        let flags = &mut self.flags;
        let want = flags.valid && flags.enabled && flags.timer_active;
        if want != flags.registered {
            self.alarm.set_enabled(cs, timer, want);
            flags.registered = want;
            trace!("delay alarm registered: {=bool}", want);
        }
    }

    pub(crate) fn release<T: TimerA>(self, cs: CriticalSection<'_>, timer: &Timer<T>) {
        self.alarm.release(cs, timer);
    }
}

impl<T: TimerA, C: Cpu> Uptime<T, C> {
    /// State of the delay alarm. All flags are clear when there is no delay alarm.
    pub fn delay_flags(&self) -> DelayFlags {
        self.delay
            .as_ref()
            .map(DelayAlarm::flags)
            .unwrap_or_default()
    }

    /// Enable or disable the delay alarm.
    ///
    /// While disabled, [`sleep_until`](Uptime::sleep_until) returns immediately and the alarm's
    /// channel interrupt is left off.
    pub fn delay_set_enabled(
        &mut self,
        cs: CriticalSection<'_>,
        on: bool,
    ) -> Result<(), DelayError> {
        let delay = self.delay.as_mut().ok_or(DelayError::Unavailable)?;
        delay.set_enabled(cs, &self.timer, on);
        Ok(())
    }

    /// Sleep in `lpm` until the uptime reaches `target` or some other interrupt wakes the CPU.
    ///
    /// Returns the ticks remaining to `target` on wake: 0 or negative when the alarm fired,
    /// positive after an early wake. Interrupts are disabled on return.
    ///
    /// Only one sleep can be outstanding at a time.
    pub fn sleep_until(
        &mut self,
        cs: CriticalSection<'_>,
        target: u32,
        lpm: LowPowerMode,
    ) -> Result<i32, SleepError> {
        let delay = match &self.delay {
            Some(delay) if delay.flags.registered => delay,
            _ => return Err(SleepError::NotRegistered),
        };
        delay.handler.fired.borrow(cs).set(false);
        delay.alarm.set(cs, &self.timer, target)?;
        self.cpu.enter_lpm(lpm);
        if !delay.handler.fired(cs) {
            // Woken by something else, so the match is still pending
            delay.alarm.cancel(cs, &self.timer);
        }
        Ok(target.wrapping_sub(self.timer.counter(cs)) as i32)
    }

    /// Sleep until the uptime reaches `target`, going back to sleep after unrelated wakes.
    ///
    /// `exit_condition` is checked before every sleep, so an interrupt handler that makes it true
    /// ends the delay early. A target that has already passed returns at once.
    pub fn delay_until(
        &mut self,
        cs: CriticalSection<'_>,
        target: u32,
        lpm: LowPowerMode,
        mut exit_condition: impl FnMut() -> bool,
    ) -> Result<(), SleepError> {
        loop {
            if exit_condition() {
                return Ok(());
            }
            match self.sleep_until(cs, target, lpm) {
                Ok(remaining) if remaining > 0 => {}
                Ok(_) | Err(SleepError::Arm(AlarmError::Past)) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    // Busy-wait variant for when there is no alarm to sleep on. The counter must be running.
    fn poll_until(&self, target: u32) {
        while target.wrapping_sub(critical_section::with(|cs| self.timer.counter(cs))) as i32 > 0 {
            self.cpu.feed_watchdog();
        }
    }
}

impl<T: TimerA, C: Cpu> DelayNs for Uptime<T, C> {
    /// Sleeps in LPM0 on the delay alarm, or polls the uptime when the alarm isn't available.
    /// Rounds up to whole ticks.
    ///
    /// While suspended the uptime doesn't move, so the delay is a busy-wait of MCLK cycles at
    /// the rate seen by the last [`resume`](Uptime::resume).
    fn delay_ns(&mut self, ns: u32) {
        if self.state() != UptimeState::Running {
            let cycles = (ns as u64 * self.mclk_hz as u64).div_ceil(1_000_000_000);
            self.cpu.delay_cycles(saturate(cycles));
            return;
        }
        let ticks = self.ns_to_ticks(ns);
        let target = critical_section::with(|cs| self.now(cs)).wrapping_add(ticks);
        let rv = critical_section::with(|cs| {
            self.delay_until(cs, target, LowPowerMode::Lpm0, || false)
        });
        if rv.is_err() {
            self.poll_until(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{leak, run_isrs_until_wake, FixedRates, MockCpu, MockTimer};
    use crate::timer::{Tassel, TimerShared};
    use crate::uptime::UptimeConfig;

    const RATES: FixedRates = FixedRates {
        aclk: 32768,
        smclk: 1_000_000,
        mclk: 1_000_000,
    };

    fn uptime_with(
        cpu: impl FnOnce(&'static MockTimer, &'static TimerShared) -> MockCpu,
    ) -> Uptime<&'static MockTimer, MockCpu> {
        let regs = MockTimer::leaked();
        let shared = leak(TimerShared::new());
        let handler = leak(DelayHandler::new());
        let config = UptimeConfig::new(Tassel::Aclk).delay_alarm(1, handler);
        let cpu = cpu(regs, shared);
        critical_section::with(|cs| {
            Uptime::start(cs, Timer::new(regs, shared), cpu, &config, &RATES)
        })
    }

    fn uptime() -> Uptime<&'static MockTimer, MockCpu> {
        uptime_with(|regs, shared| MockCpu::new().on_lpm(run_isrs_until_wake(regs, shared)))
    }

    #[test]
    fn sleep_wakes_at_target() {
        let mut up = uptime();
        critical_section::with(|cs| {
            assert_eq!(up.sleep_until(cs, 1000, LowPowerMode::Lpm3), Ok(0));
            assert_eq!(up.now(cs), 1000);
            assert_eq!(up.cpu().last_lpm.get(), Some(LowPowerMode::Lpm3));
        });
    }

    #[test]
    fn sleep_across_overflows() {
        let mut up = uptime();
        critical_section::with(|cs| {
            assert_eq!(up.sleep_until(cs, 0x2_0010, LowPowerMode::Lpm3), Ok(0));
            assert_eq!(up.now(cs), 0x2_0010);
            assert_eq!(up.cpu().lpm_entries.get(), 1);
        });
    }

    #[test]
    fn disabled_delay_returns_without_sleeping() {
        let mut up = uptime();
        critical_section::with(|cs| {
            up.delay_set_enabled(cs, false).unwrap();
            assert!(!up.delay_flags().registered);
            assert_eq!(
                up.sleep_until(cs, 500, LowPowerMode::Lpm0),
                Err(SleepError::NotRegistered)
            );
            assert_eq!(up.cpu().lpm_entries.get(), 0);

            up.delay_set_enabled(cs, true).unwrap();
            assert!(up.delay_flags().registered);
            assert_eq!(up.sleep_until(cs, 500, LowPowerMode::Lpm0), Ok(0));
        });
    }

    #[test]
    fn past_target_is_an_arm_error() {
        let mut up = uptime();
        critical_section::with(|cs| {
            up.sleep_until(cs, 100, LowPowerMode::Lpm0).unwrap();
            assert_eq!(
                up.sleep_until(cs, 100, LowPowerMode::Lpm0),
                Err(SleepError::Arm(AlarmError::Past))
            );
            assert_eq!(up.cpu().lpm_entries.get(), 1);
        });
    }

    #[test]
    fn early_wake_cancels_alarm() {
        // Something other than the timer wakes the CPU straight away
        let mut up = uptime_with(|_, _| MockCpu::new());
        critical_section::with(|cs| {
            assert_eq!(up.sleep_until(cs, 300, LowPowerMode::Lpm0), Ok(300));
            // Re-arming works, so the first arming was cancelled
            assert_eq!(up.sleep_until(cs, 300, LowPowerMode::Lpm0), Ok(300));
        });
    }

    #[test]
    fn suspend_unregisters_and_resume_restores() {
        let mut up = uptime();
        critical_section::with(|cs| {
            up.suspend(cs);
            let flags = up.delay_flags();
            assert!(flags.enabled && !flags.registered && !flags.timer_active);
            assert_eq!(
                up.sleep_until(cs, 10, LowPowerMode::Lpm0),
                Err(SleepError::NotRegistered)
            );

            up.resume(cs, &RATES);
            up.resume(cs, &RATES);
            assert_eq!(
                up.delay_flags(),
                DelayFlags {
                    valid: true,
                    enabled: true,
                    registered: true,
                    timer_active: true,
                }
            );
            assert_eq!(up.sleep_until(cs, 10, LowPowerMode::Lpm0), Ok(0));
        });
    }

    #[test]
    fn delay_until_sleeps_through_exit_condition() {
        let mut up = uptime();
        let mut checks = 0;
        critical_section::with(|cs| {
            up.delay_until(cs, 2000, LowPowerMode::Lpm0, || {
                checks += 1;
                false
            })
            .unwrap();
            assert_eq!(up.now(cs), 2000);
            // Target already passed
            up.delay_until(cs, 1500, LowPowerMode::Lpm0, || false).unwrap();
            // Exit condition already true
            up.delay_until(cs, 9000, LowPowerMode::Lpm0, || true).unwrap();
            assert_eq!(up.now(cs), 2000);
        });
        assert_eq!(checks, 1);
    }

    #[test]
    fn missing_channel_leaves_delay_unavailable() {
        let regs = MockTimer::leaked();
        let shared = leak(TimerShared::new());
        let config = UptimeConfig::new(Tassel::Aclk).delay_alarm(5, leak(DelayHandler::new()));
        let mut up = critical_section::with(|cs| {
            Uptime::start(cs, Timer::new(regs, shared), MockCpu::new(), &config, &RATES)
        });
        assert_eq!(up.delay_flags(), DelayFlags::default());
        critical_section::with(|cs| {
            assert_eq!(up.delay_set_enabled(cs, true), Err(DelayError::Unavailable));
            assert_eq!(
                up.sleep_until(cs, 10, LowPowerMode::Lpm0),
                Err(SleepError::NotRegistered)
            );
        });
    }

    #[test]
    fn enable_while_suspended_waits_for_resume() {
        let mut up = uptime();
        critical_section::with(|cs| {
            up.delay_set_enabled(cs, false).unwrap();
            up.suspend(cs);
            up.delay_set_enabled(cs, true).unwrap();
            let flags = up.delay_flags();
            assert!(flags.enabled && !flags.registered);
            assert_eq!(
                up.sleep_until(cs, 10, LowPowerMode::Lpm0),
                Err(SleepError::NotRegistered)
            );

            up.resume(cs, &RATES);
            assert!(up.delay_flags().registered);
            assert_eq!(up.sleep_until(cs, 10, LowPowerMode::Lpm0), Ok(0));
        });
    }

    #[test]
    fn suspended_delay_counts_cycles() {
        let mut up = uptime();
        critical_section::with(|cs| up.suspend(cs));
        up.delay_us(100);
        // 100 us of a 1 MHz MCLK
        assert_eq!(up.cpu().delayed_cycles.get(), 100);
        assert_eq!(up.cpu().lpm_entries.get(), 0);
        assert_eq!(critical_section::with(|cs| up.now(cs)), 0);
    }

    #[test]
    fn delay_ms_sleeps_whole_ticks() {
        let mut up = uptime();
        up.delay_ms(10);
        // 327.68 ticks rounds up
        assert_eq!(critical_section::with(|cs| up.now(cs)), 328);
    }
}
