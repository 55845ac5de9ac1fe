#![no_main]
#![no_std]

// Trims the DCO to 12 MHz against the watch crystal and puts ACLK on P1.0 and SMCLK on P1.4,
// so the result can be checked with a scope. The red LED turns on if the crystal failed to
// start.

use bsp430::{
    clock::{Bc2Clock, ClockCaps, ClockSource},
    cpu::Core,
    platform::{LaunchpadPins, PeriphConfig, Peripheral},
    prelude::*,
    timer::CapSelect,
    trim::TrimSource,
    watchdog::Wdt,
};
use msp430_rt::entry;
use msp430g2553::Peripherals;
use panic_msp430 as _;

const TARGET_HZ: u32 = 12_000_000;

#[entry]
fn main() -> ! {
    let periph = Peripherals::take().unwrap();

    let core = Core::new(Wdt::constrain(periph.WATCHDOG_TIMER));
    let mut pins = LaunchpadPins::new(periph.PORT_1_2);
    let mut clk = Bc2Clock::new(periph.SYSTEM_CLOCK, ClockCaps::from_info_flash());
    let timer = periph.TIMER0_A3;

    let crystal_ok = critical_section::with(|cs| {
        let crystal_ok = clk.configure_lfxt1(cs, &core, &mut pins, true, 1_000);
        let _ = clk.configure_aclk(cs, ClockSource::Xt1ClkOrVloClk, 0);
        // CCI0B of Timer0_A is wired to ACLK
        let trim = TrimSource::new(&timer, 0, CapSelect::InputB);
        clk.configure_mclk_trimmed(cs, &core, TARGET_HZ, &trim);
        clk.configure_smclk(cs, ClockSource::DcoClk, 0);
        let _ = pins.configure_peripheral_pins(cs, Peripheral::ExposedClocks, PeriphConfig::Default, true);
        crystal_ok
    });

    if !crystal_ok {
        // P1.0 is now ACLK, so fall back to plain I/O for the LED
        let port = pins.free();
        port.p1sel.modify(|r, w| unsafe { w.bits(r.bits() & !0x01) });
        port.p1dir.modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
        port.p1out.modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
    }

    loop {
        core.feed_watchdog();
    }
}

#[no_mangle]
extern "C" fn abort() -> ! {
    panic!();
}
