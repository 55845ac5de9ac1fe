#![no_main]
#![no_std]
#![feature(abi_msp430_interrupt)]
#![feature(asm_experimental_arch)]

// Blinks the red LED on P1.0 once a second, sleeping in LPM3 on the delay alarm in between.
// The uptime counter runs from ACLK, which is the 32 kiHz crystal if one is fitted and VLOCLK
// otherwise.

use bsp430::{
    clock::{Bc2Clock, ClockCaps},
    cpu::Core,
    delay::DelayHandler,
    lpm::LowPowerMode,
    platform::{self, BootConfig, LaunchpadPins},
    timer::{Tassel, Timer, TimerShared},
    uptime::{Uptime, UptimeConfig},
    watchdog::Wdt,
};
use msp430_rt::entry;
use msp430g2553::{interrupt, Peripherals};
use panic_msp430 as _;

static UPTIME: TimerShared = TimerShared::new();
static DELAY: DelayHandler = DelayHandler::new();

#[entry]
fn main() -> ! {
    let periph = Peripherals::take().unwrap();

    let core = Core::new(Wdt::constrain(periph.WATCHDOG_TIMER));
    let mut pins = LaunchpadPins::new(periph.PORT_1_2);
    let mut clk = Bc2Clock::new(periph.SYSTEM_CLOCK, ClockCaps::from_info_flash());

    let mut uptime = critical_section::with(|cs| {
        let _ = platform::initialize(cs, &mut clk, &core, &mut pins, &BootConfig::default());
        let config = UptimeConfig::new(Tassel::Aclk).delay_alarm(1, &DELAY);
        Uptime::start(cs, Timer::new(periph.TIMER0_A3, &UPTIME), core, &config, &clk)
    });

    let port = pins.free();
    port.p1dir.modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
    port.p1out.modify(|r, w| unsafe { w.bits(r.bits() & !0x01) });

    let half_period = uptime.ms_to_ticks(500);
    let mut wake = critical_section::with(|cs| uptime.now(cs));
    loop {
        wake = wake.wrapping_add(half_period);
        let _ = critical_section::with(|cs| uptime.delay_until(cs, wake, LowPowerMode::Lpm3, || false));
        port.p1out.modify(|r, w| unsafe { w.bits(r.bits() ^ 0x01) });
    }
}

// Overflows and the delay alarm on CCR1 both arrive through TA0IV. Both vectors always leave LPM,
// so the dispatch result is not needed: delay_until goes back to sleep until its alarm fires.
#[interrupt(wake_cpu)]
fn TIMER0_A1() {
    critical_section::with(|cs| {
        // Safe because the uptime timer only touches registers of its own instance
        let periph = unsafe { Peripherals::steal() };
        Timer::new(&periph.TIMER0_A3, &UPTIME).dispatch_iv(cs);
    });
}

#[interrupt(wake_cpu)]
fn TIMER0_A0() {
    critical_section::with(|cs| {
        let periph = unsafe { Peripherals::steal() };
        Timer::new(&periph.TIMER0_A3, &UPTIME).dispatch_cc0(cs);
    });
}

#[no_mangle]
extern "C" fn abort() -> ! {
    panic!();
}
