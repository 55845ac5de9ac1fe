//! Uptime clock
//!
//! A Timer_A peripheral dedicated to counting since boot. The timer runs in continuous mode with
//! its overflow interrupt enabled, and [`Timer`] extends the 16-bit counter to 32 bits. At the
//! usual 32 kiHz ACLK that is about 36 hours before the count wraps.
//!
//! The application owns the interrupt vectors and forwards them to the timer's shared state:
//!
//! ```ignore
//! static UPTIME: TimerShared = TimerShared::new();
//! static DELAY: DelayHandler = DelayHandler::new();
//!
//! #[interrupt(wake_cpu)]
//! fn TIMER0_A1() {
//!     critical_section::with(|cs| {
//!         let regs = unsafe { &*pac::TIMER0_A3::ptr() };
//!         Timer::new(regs, &UPTIME).dispatch_iv(cs);
//!     });
//! }
//! ```
//!
//! [`Uptime::start`] also sets up the sleep alarm described in [`crate::delay`].

use crate::clock::ClockRates;
use crate::cpu::Cpu;
use crate::delay::{DelayAlarm, DelayHandler};
use crate::timer::{Tassel, Timer, TimerDiv};
use crate::TimerA;
use core::fmt::Write;
use critical_section::CriticalSection;

/// `H:MM:SS.mmm` or `MM:SS.mmm` rendering of a duration
pub type DurationText = heapless::String<20>;

/// How to run the uptime timer
#[derive(Clone, Copy)]
pub struct UptimeConfig {
    source: Tassel,
    divider: TimerDiv,
    delay: Option<(u8, &'static DelayHandler)>,
}

impl UptimeConfig {
    /// Count `source` undivided, with no delay alarm
    pub const fn new(source: Tassel) -> Self {
        UptimeConfig {
            source,
            divider: TimerDiv::_1,
            delay: None,
        }
    }

    /// Divide the timer clock
    pub const fn divider(mut self, divider: TimerDiv) -> Self {
        self.divider = divider;
        self
    }

    /// Use channel `ccidx` for the delay alarm, reporting to `handler`
    pub const fn delay_alarm(mut self, ccidx: u8, handler: &'static DelayHandler) -> Self {
        self.delay = Some((ccidx, handler));
        self
    }
}

/// Whether the uptime clock is counting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UptimeState {
    /// Counting
    Running,
    /// Stopped, holding its count
    Suspended,
}

/// Monotonic tick counter on a dedicated timer
pub struct Uptime<T: TimerA, C: Cpu> {
    pub(crate) timer: Timer<T>,
    pub(crate) cpu: C,
    pub(crate) delay: Option<DelayAlarm>,
    conversion_hz: u32,
    // MCLK at the last resume, for delays while the timer is stopped
    pub(crate) mclk_hz: u32,
    state: UptimeState,
}

impl<T: TimerA, C: Cpu> Uptime<T, C> {
    /// Reset `timer` to zero and start counting.
    ///
    /// If `config` names a delay alarm channel that the timer lacks or that is taken, the uptime
    /// clock still starts but sleeping is unavailable.
    pub fn start(
        cs: CriticalSection<'_>,
        timer: Timer<T>,
        cpu: C,
        config: &UptimeConfig,
        clocks: &impl ClockRates,
    ) -> Self {
        let regs = timer.regs();
        regs.ctl_wr(0);
        timer.reset_counter(cs);
        regs.config_clock(config.source, config.divider);
        regs.taie_set();

        let delay = config.delay.and_then(|(ccidx, handler)| {
            match DelayAlarm::new(cs, &timer, ccidx, handler) {
                Ok(delay) => Some(delay),
                Err(_e) => {
                    warn!("no delay alarm on channel {=u8}: {}", ccidx, _e);
                    None
                }
            }
        });

        let mut uptime = Uptime {
            timer,
            cpu,
            delay,
            conversion_hz: 0,
            mclk_hz: 0,
            state: UptimeState::Suspended,
        };
        uptime.resume(cs, clocks);
        uptime
    }

    /// Continue counting after [`suspend`](Uptime::suspend). The conversion frequency is
    /// resampled from `clocks`, since they may have been reconfigured in between.
    pub fn resume(&mut self, cs: CriticalSection<'_>, clocks: &impl ClockRates) {
        self.conversion_hz = self.timer.frequency_hz(clocks);
        self.mclk_hz = clocks.mclk_hz();
        if let Some(delay) = self.delay.as_mut() {
            delay.set_timer_active(cs, &self.timer, true);
        }
        self.timer.regs().continuous();
        self.state = UptimeState::Running;
        debug!("uptime running at {=u32} Hz", self.conversion_hz);
    }

    /// Stop counting. The count is kept, and the delay alarm stops taking interrupts.
    pub fn suspend(&mut self, cs: CriticalSection<'_>) {
        self.timer.regs().stop();
        if let Some(delay) = self.delay.as_mut() {
            delay.set_timer_active(cs, &self.timer, false);
        }
        self.state = UptimeState::Suspended;
    }

    /// Whether the clock is counting
    #[inline]
    pub fn state(&self) -> UptimeState {
        self.state
    }

    /// Ticks since start
    #[inline]
    pub fn now(&self, cs: CriticalSection<'_>) -> u32 {
        self.timer.counter(cs)
    }

    /// Underlying timer
    #[inline]
    pub fn timer(&self) -> &Timer<T> {
        &self.timer
    }

    /// CPU services used for sleeping
    #[inline]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    /// Ticks per second assumed by the conversions
    #[inline]
    pub fn conversion_frequency(&self) -> u32 {
        self.conversion_hz
    }

    /// Override the ticks per second used by the conversions, returning the old value. The next
    /// [`resume`](Uptime::resume) samples the timer rate again.
    pub fn set_conversion_frequency(&mut self, hz: u32) -> u32 {
        core::mem::replace(&mut self.conversion_hz, hz)
    }

    /// Whole ticks in `ms` milliseconds, rounded down. Saturates at `u32::MAX`.
    pub fn ms_to_ticks(&self, ms: u32) -> u32 {
        saturate(ms as u64 * self.conversion_hz as u64 / 1_000)
    }

    /// Whole ticks in `us` microseconds, rounded down. Saturates at `u32::MAX`.
    pub fn us_to_ticks(&self, us: u32) -> u32 {
        saturate(us as u64 * self.conversion_hz as u64 / 1_000_000)
    }

    /// Ticks covering at least `ns` nanoseconds
    pub fn ns_to_ticks(&self, ns: u32) -> u32 {
        saturate((ns as u64 * self.conversion_hz as u64).div_ceil(1_000_000_000))
    }

    /// Milliseconds in `ticks`, or `None` if the conversion frequency is 0
    pub fn ticks_to_ms(&self, ticks: u32) -> Option<u32> {
        (ticks as u64 * 1_000)
            .checked_div(self.conversion_hz as u64)
            .map(|ms| ms as u32)
    }

    /// Render `ticks` as a duration, or `None` if the conversion frequency is 0
    pub fn format_duration(&self, ticks: u32) -> Option<DurationText> {
        format_duration(ticks, self.conversion_hz)
    }

    /// Render the current uptime
    pub fn as_text_now(&self, cs: CriticalSection<'_>) -> Option<DurationText> {
        self.format_duration(self.now(cs))
    }

    /// Stop the clock, give up the delay alarm channel, and hand back the timer and CPU
    pub fn free(mut self, cs: CriticalSection<'_>) -> (Timer<T>, C) {
        self.suspend(cs);
        if let Some(delay) = self.delay.take() {
            delay.release(cs, &self.timer);
        }
        (self.timer, self.cpu)
    }
}

#[inline]
pub(crate) fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Render `ticks` at `hz` ticks per second. Hours are only shown when nonzero.
pub fn format_duration(ticks: u32, hz: u32) -> Option<DurationText> {
    if hz == 0 {
        return None;
    }
    let secs = ticks / hz;
    let ms = ((ticks % hz) as u64 * 1_000 / hz as u64) as u32;
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);

    let mut text = DurationText::new();
    let rv = if h > 0 {
        write!(text, "{}:{:02}:{:02}.{:03}", h, m, s, ms)
    } else {
        write!(text, "{:2}:{:02}.{:03}", m, s, ms)
    };
    rv.ok().map(|()| text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{leak, FixedRates, MockCpu, MockTimer};
    use crate::timer::TimerShared;

    const RATES: FixedRates = FixedRates {
        aclk: 32768,
        smclk: 1_000_000,
        mclk: 8_000_000,
    };

    fn uptime(config: UptimeConfig) -> Uptime<&'static MockTimer, MockCpu> {
        let timer = Timer::new(MockTimer::leaked(), leak(TimerShared::new()));
        critical_section::with(|cs| Uptime::start(cs, timer, MockCpu::new(), &config, &RATES))
    }

    #[test]
    fn start_resets_and_runs_timer() {
        let regs = MockTimer::leaked();
        regs.tar_wr(1234);
        let timer = Timer::new(regs, leak(TimerShared::new()));
        let config = UptimeConfig::new(Tassel::Smclk).divider(TimerDiv::_4);
        let up = critical_section::with(|cs| {
            Uptime::start(cs, timer, MockCpu::new(), &config, &RATES)
        });
        assert_eq!(up.state(), UptimeState::Running);
        assert_eq!(up.conversion_frequency(), 250_000);
        assert_eq!(regs.tassel(), Tassel::Smclk);
        assert_eq!(regs.id_shift(), 2);
        assert!(!regs.is_stopped());
        assert_ne!(regs.ctl_rd() & crate::hw_traits::timera::TAIE, 0);
        assert_eq!(critical_section::with(|cs| up.now(cs)), 0);
    }

    #[test]
    fn now_is_monotonic_across_overflows() {
        let up = uptime(UptimeConfig::new(Tassel::Aclk));
        let regs = *up.timer().regs();
        let mut last = 0;
        critical_section::with(|cs| {
            for step in [0x8000, 0x7FFF, 1, 0xFFFF, 0x1234, 0xF000] {
                regs.advance(step);
                let now = up.now(cs);
                assert!(now > last);
                last = now;
                // Service the overflow halfway through, as the ISR would
                up.timer().dispatch_iv(cs);
                assert_eq!(up.now(cs), now);
            }
        });
        assert_eq!(last, 0x8000 + 0x7FFF + 1 + 0xFFFF + 0x1234 + 0xF000);
    }

    #[test]
    fn suspend_holds_count() {
        let mut up = uptime(UptimeConfig::new(Tassel::Aclk));
        critical_section::with(|cs| {
            up.timer().regs().advance(500);
            up.suspend(cs);
            assert_eq!(up.state(), UptimeState::Suspended);
            assert!(up.timer().regs().is_stopped());
            assert_eq!(up.now(cs), 500);

            up.set_conversion_frequency(1);
            up.resume(cs, &RATES);
            assert_eq!(up.conversion_frequency(), 32768);
            assert_eq!(up.now(cs), 500);
        });
    }

    #[test]
    fn conversions_follow_frequency() {
        let mut up = uptime(UptimeConfig::new(Tassel::Aclk));
        assert_eq!(up.ms_to_ticks(1000), 32768);
        assert_eq!(up.ms_to_ticks(1), 32);
        assert_eq!(up.us_to_ticks(500_000), 16384);
        assert_eq!(up.ns_to_ticks(1), 1);
        assert_eq!(up.ns_to_ticks(0), 0);
        assert_eq!(up.ticks_to_ms(16384), Some(500));
        // About 4.3 million seconds doesn't fit in 32 bits of ticks
        assert_eq!(up.ms_to_ticks(u32::MAX), u32::MAX);
        assert_eq!(up.us_to_ticks(u32::MAX), 140_737_488);

        assert_eq!(up.set_conversion_frequency(0), 32768);
        assert_eq!(up.ticks_to_ms(16384), None);
        assert_eq!(up.format_duration(16384), None);
    }

    #[test]
    fn durations_render_like_a_clock() {
        let text = |ticks, hz| format_duration(ticks, hz).unwrap();
        assert_eq!(text(32768, 32768), " 0:01.000");
        assert_eq!(text(32768 * 754 + 16384, 32768), "12:34.500");
        assert_eq!(text(3600, 1), "1:00:00.000");
        assert_eq!(text(36 * 3600 + 61, 1), "36:01:01.000");
        assert_eq!(text(u32::MAX, 1), "1193046:28:15.000");
        assert_eq!(text(1, 3), " 0:00.333");
    }

    #[test]
    fn as_text_now_uses_conversion_frequency() {
        let up = uptime(UptimeConfig::new(Tassel::Aclk));
        critical_section::with(|cs| {
            up.timer().regs().advance(32768 * 2);
            up.timer().dispatch_iv(cs);
            assert_eq!(up.as_text_now(cs).as_deref(), Some(" 0:02.000"));
        });
    }

    #[test]
    fn free_releases_delay_channel() {
        let handler = leak(DelayHandler::new());
        let up = uptime(UptimeConfig::new(Tassel::Aclk).delay_alarm(2, handler));
        let (timer, _cpu) = critical_section::with(|cs| up.free(cs));
        assert!(timer.regs().is_stopped());
        // The channel can be claimed again
        let again = critical_section::with(|cs| {
            Uptime::start(
                cs,
                timer,
                MockCpu::new(),
                &UptimeConfig::new(Tassel::Aclk).delay_alarm(2, handler),
                &RATES,
            )
        });
        assert!(again.delay_flags().registered);
    }
}
