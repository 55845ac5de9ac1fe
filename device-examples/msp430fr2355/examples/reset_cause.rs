#![no_main]
#![no_std]

// Drains SYSRSTIV at startup. The red LED on P1.0 turns on if any pending cause was a brownout
// class reset, the green LED on P6.6 if a watchdog timeout was among them.

use bsp430::sysrst::{ResetCauses, FR2XX_TABLE};
use msp430_rt::entry;
use msp430fr2355::Peripherals;
use panic_msp430 as _;

const WDTPW: u16 = 0x5A00;
const WDTHOLD: u16 = 0x0080;
const LOCKLPM5: u16 = 0x0001;
const WDT_TIMEOUT: u16 = 0x16;

#[entry]
fn main() -> ! {
    let periph = Peripherals::take().unwrap();
    periph.WDT_A.wdtctl.write(|w| unsafe { w.bits(WDTPW | WDTHOLD) });

    let mut brownout = false;
    let mut watchdog = false;
    for cause in ResetCauses::new(&periph.SYS, FR2XX_TABLE) {
        brownout |= cause.brownout;
        watchdog |= cause.vector == WDT_TIMEOUT;
    }

    periph.P1.p1dir.modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
    periph.P6.p6dir.modify(|r, w| unsafe { w.bits(r.bits() | 0x40) });
    periph.P1.p1out.modify(|r, w| unsafe { w.bits((r.bits() & !0x01) | brownout as u8) });
    periph.P6.p6out.modify(|r, w| unsafe { w.bits((r.bits() & !0x40) | ((watchdog as u8) << 6)) });
    // Outputs only take effect once the GPIO lock from LPMx.5 is released
    periph.PMM.pm5ctl0.modify(|r, w| unsafe { w.bits(r.bits() & !LOCKLPM5) });

    loop {
        msp430::asm::nop();
    }
}

#[no_mangle]
extern "C" fn abort() -> ! {
    panic!();
}
