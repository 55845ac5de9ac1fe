//! Simulated registers and CPU for host tests

use crate::clock::ClockRates;
use crate::cpu::Cpu;
use crate::hw_traits::bc2::{
    Bc2, DIVS_MASK, DIVS_SHIFT, LFXT1OF, LFXT1S_2, LFXT1S_MASK, RSEL_MASK,
};
use crate::hw_traits::sysrst::ResetVectorReg;
use crate::hw_traits::timera::{
    TimerA, CAP, CCIE, CCIFG, MC_MASK, TACLR, TAIE, TAIFG, TAIV_TAIFG,
};
use crate::lpm::LowPowerMode;
use crate::platform::{PeriphConfig, Peripheral, PeripheralPins, PinError};
use crate::timer::{IsrResult, Timer, TimerShared};
use core::cell::{Cell, RefCell};
use critical_section::CriticalSection;
use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub struct FixedRates {
    pub aclk: u32,
    pub smclk: u32,
    pub mclk: u32,
}

impl ClockRates for FixedRates {
    fn aclk_hz(&self) -> u32 {
        self.aclk
    }
    fn smclk_hz(&self) -> u32 {
        self.smclk
    }
    fn mclk_hz(&self) -> u32 {
        self.mclk
    }
}

/// Basic Clock Module+ with power-up register values and a crystal that may be missing
pub struct MockBc2 {
    pub dcoctl: Cell<u8>,
    pub bcsctl1: Cell<u8>,
    pub bcsctl2: Cell<u8>,
    pub bcsctl3: Cell<u8>,
    pub crystal_ok: Cell<bool>,
    /// Number of further OFIFG clears that the flag survives
    pub osc_faults: Cell<u32>,
}

impl MockBc2 {
    pub fn new() -> Self {
        MockBc2 {
            dcoctl: Cell::new(0x60),
            bcsctl1: Cell::new(0x87),
            bcsctl2: Cell::new(0),
            bcsctl3: Cell::new(0x04),
            crystal_ok: Cell::new(true),
            osc_faults: Cell::new(0),
        }
    }

    pub fn leaked() -> &'static Self {
        leak(Self::new())
    }

    /// DCO setting as a single number that grows with frequency
    pub fn dco_count(&self) -> u32 {
        (self.bcsctl1.get() & RSEL_MASK) as u32 * 256 + self.dcoctl.get() as u32
    }

    /// [`dco_count`](MockBc2::dco_count) after the SMCLK divider
    pub fn smclk_count(&self) -> u32 {
        self.dco_count() >> ((self.bcsctl2.get() & DIVS_MASK) >> DIVS_SHIFT)
    }
}

impl Bc2 for MockBc2 {
    fn dcoctl_rd(&self) -> u8 {
        self.dcoctl.get()
    }
    fn dcoctl_wr(&self, bits: u8) {
        self.dcoctl.set(bits)
    }
    fn bcsctl1_rd(&self) -> u8 {
        self.bcsctl1.get()
    }
    fn bcsctl1_wr(&self, bits: u8) {
        self.bcsctl1.set(bits)
    }
    fn bcsctl2_rd(&self) -> u8 {
        self.bcsctl2.get()
    }
    fn bcsctl2_wr(&self, bits: u8) {
        self.bcsctl2.set(bits)
    }
    fn bcsctl3_rd(&self) -> u8 {
        let bits = self.bcsctl3.get();
        if bits & LFXT1S_MASK != LFXT1S_2 && !self.crystal_ok.get() {
            bits | LFXT1OF
        } else {
            bits
        }
    }
    fn bcsctl3_wr(&self, bits: u8) {
        self.bcsctl3.set(bits & !LFXT1OF)
    }
    fn ofifg_rd(&self) -> bool {
        self.osc_faults.get() > 0 || self.lfxt1_faulted()
    }
    fn ofifg_clr(&self) {
        self.osc_faults.set(self.osc_faults.get().saturating_sub(1));
    }
}

const CCR_COUNT: usize = 3;
// Capture events the simulated DCO measurement is spread across
const CAPTURE_EDGES: u32 = 10;

/// Which interrupt vector has a pending, enabled request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vector {
    Cc0,
    Iv,
    Idle,
}

impl Vector {
    pub fn is_cc0(self) -> bool {
        self == Vector::Cc0
    }
}

/// Timer_A3 whose counter only moves when a test says so
pub struct MockTimer {
    ctl: Cell<u16>,
    tar: Cell<u16>,
    cctl: [Cell<u16>; CCR_COUNT],
    ccr: [Cell<u16>; CCR_COUNT],
    capture_edges: [Cell<u32>; CCR_COUNT],
    capture_total: Cell<u32>,
    capture_source: Cell<Option<&'static MockBc2>>,
    drift_on_ccr_write: Cell<u16>,
    tar_step_on_read: Cell<u16>,
}

impl MockTimer {
    pub fn new() -> Self {
        MockTimer {
            ctl: Cell::new(0),
            tar: Cell::new(0),
            cctl: Default::default(),
            ccr: Default::default(),
            capture_edges: Default::default(),
            capture_total: Cell::new(0),
            capture_source: Cell::new(None),
            drift_on_ccr_write: Cell::new(0),
            tar_step_on_read: Cell::new(0),
        }
    }

    pub fn leaked() -> &'static Self {
        leak(Self::new())
    }

    /// Counts between the first and the last of every `CAPTURE_EDGES + 1` captures
    pub fn set_capture_total(&self, total: u32) {
        self.capture_total.set(total);
    }

    /// Derive capture spacing from the DCO setting of `bc2` instead of a fixed total
    pub fn set_capture_source(&self, bc2: &'static MockBc2) {
        self.capture_source.set(Some(bc2));
    }

    /// Counter moves on by `ticks` whenever a compare register is written
    pub fn set_drift_on_ccr_write(&self, ticks: u16) {
        self.drift_on_ccr_write.set(ticks);
    }

    /// Counter moves on by `ticks` after every read, like a timer clocked as fast as the CPU
    pub fn set_tar_step_on_read(&self, ticks: u16) {
        self.tar_step_on_read.set(ticks);
    }

    fn capture(&self, ccidx: usize) {
        let total = match self.capture_source.get() {
            Some(bc2) => bc2.smclk_count(),
            None => self.capture_total.get(),
        };
        let edge = self.capture_edges[ccidx].get();
        if edge == 0 {
            self.ccr[ccidx].set(self.tar.get());
        } else {
            let k = (edge - 1) % CAPTURE_EDGES + 1;
            let step = total * k / CAPTURE_EDGES - total * (k - 1) / CAPTURE_EDGES;
            self.ccr[ccidx].set(self.ccr[ccidx].get().wrapping_add(step as u16));
        }
        self.capture_edges[ccidx].set(edge + 1);
        self.cctl[ccidx].set(self.cctl[ccidx].get() | CCIFG);
    }

    /// Let `ticks` timer counts pass, raising compare and overflow flags along the way
    pub fn advance(&self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let tar = self.tar.get();
        for i in 0..CCR_COUNT {
            let cctl = self.cctl[i].get();
            if cctl & CAP != 0 {
                continue;
            }
            let mut distance = self.ccr[i].get().wrapping_sub(tar) as u32;
            if distance == 0 {
                distance = 0x1_0000;
            }
            if distance <= ticks {
                self.cctl[i].set(cctl | CCIFG);
            }
        }
        if tar as u32 + ticks > 0xFFFF {
            self.ctl.set(self.ctl.get() | TAIFG);
        }
        self.tar.set((tar as u32).wrapping_add(ticks) as u16);
    }

    pub fn pending_vector(&self) -> Vector {
        let requested = |i: usize| self.cctl[i].get() & (CCIE | CCIFG) == CCIE | CCIFG;
        if requested(0) {
            Vector::Cc0
        } else if (1..CCR_COUNT).any(requested) || self.ctl.get() & (TAIE | TAIFG) == TAIE | TAIFG
        {
            Vector::Iv
        } else {
            Vector::Idle
        }
    }

    /// Run the counter up to the next enabled interrupt and report its vector
    pub fn advance_to_next_event(&self) -> Vector {
        let pending = self.pending_vector();
        if pending != Vector::Idle || self.ctl.get() & MC_MASK == 0 {
            return pending;
        }
        let tar = self.tar.get();
        let mut ticks = 0x1_0000 - tar as u32;
        for i in 0..CCR_COUNT {
            let cctl = self.cctl[i].get();
            if cctl & CCIE != 0 && cctl & CAP == 0 {
                let mut distance = self.ccr[i].get().wrapping_sub(tar) as u32;
                if distance == 0 {
                    distance = 0x1_0000;
                }
                ticks = ticks.min(distance);
            }
        }
        self.advance(ticks);
        self.pending_vector()
    }
}

impl TimerA for MockTimer {
    const CCR_COUNT: u8 = CCR_COUNT as u8;

    fn ctl_rd(&self) -> u16 {
        self.ctl.get()
    }
    fn ctl_wr(&self, bits: u16) {
        if bits & TACLR != 0 {
            self.tar.set(0);
        }
        self.ctl.set(bits & !TACLR);
    }
    fn tar_rd(&self) -> u16 {
        let tar = self.tar.get();
        self.tar.set(tar.wrapping_add(self.tar_step_on_read.get()));
        tar
    }
    fn tar_wr(&self, count: u16) {
        self.tar.set(count)
    }
    fn cctl_rd(&self, ccidx: u8) -> u16 {
        let i = ccidx as usize;
        let cctl = self.cctl[i].get();
        if cctl & CAP != 0 && cctl & CCIFG == 0 {
            self.capture(i);
        }
        self.cctl[i].get()
    }
    fn cctl_wr(&self, ccidx: u8, bits: u16) {
        let i = ccidx as usize;
        if bits & CAP != 0 && self.cctl[i].get() & CAP == 0 {
            self.capture_edges[i].set(0);
        }
        self.cctl[i].set(bits);
    }
    fn ccr_rd(&self, ccidx: u8) -> u16 {
        self.ccr[ccidx as usize].get()
    }
    fn ccr_wr(&self, ccidx: u8, count: u16) {
        self.ccr[ccidx as usize].set(count);
        let drift = self.drift_on_ccr_write.get();
        if drift != 0 {
            let tar = self.tar.get();
            if tar as u32 + drift as u32 > 0xFFFF {
                self.ctl.set(self.ctl.get() | TAIFG);
            }
            self.tar.set(tar.wrapping_add(drift));
        }
    }
    fn iv_rd(&self) -> u16 {
        for i in 1..CCR_COUNT {
            let cctl = self.cctl[i].get();
            if cctl & (CCIE | CCIFG) == CCIE | CCIFG {
                self.cctl[i].set(cctl & !CCIFG);
                return 2 * i as u16;
            }
        }
        let ctl = self.ctl.get();
        if ctl & (TAIE | TAIFG) == TAIE | TAIFG {
            self.ctl.set(ctl & !TAIFG);
            return TAIV_TAIFG;
        }
        0
    }
}

/// Interrupt activity that takes place while the CPU sleeps: the timer runs to each enabled
/// event in turn and its ISRs are dispatched, until one asks to leave the low power mode.
pub fn run_isrs_until_wake(
    regs: &'static MockTimer,
    shared: &'static TimerShared,
) -> impl FnMut(LowPowerMode) {
    move |_mode| {
        let timer = Timer::new(regs, shared);
        for _ in 0..64 {
            let vector = regs.advance_to_next_event();
            let rv = critical_section::with(|cs| match vector {
                Vector::Cc0 => timer.dispatch_cc0(cs),
                Vector::Iv => timer.dispatch_iv(cs),
                Vector::Idle => IsrResult::empty(),
            });
            if vector == Vector::Idle || rv.contains(IsrResult::EXIT_LPM) {
                return;
            }
        }
    }
}

#[derive(Default)]
pub struct MockCpu {
    pub feeds: Cell<u32>,
    pub delays: Cell<u32>,
    pub delayed_cycles: Cell<u64>,
    pub lpm_entries: Cell<u32>,
    pub last_lpm: Cell<Option<LowPowerMode>>,
    on_delay: RefCell<Option<Box<dyn FnMut(u32)>>>,
    on_lpm: RefCell<Option<Box<dyn FnMut(LowPowerMode)>>>,
}

impl MockCpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the running delay count after each delay
    pub fn on_delay(self, f: impl FnMut(u32) + 'static) -> Self {
        *self.on_delay.borrow_mut() = Some(Box::new(f));
        self
    }

    /// Called instead of sleeping
    pub fn on_lpm(self, f: impl FnMut(LowPowerMode) + 'static) -> Self {
        *self.on_lpm.borrow_mut() = Some(Box::new(f));
        self
    }
}

impl Cpu for MockCpu {
    fn feed_watchdog(&self) {
        self.feeds.set(self.feeds.get() + 1);
    }

    fn delay_cycles(&self, cycles: u32) {
        let n = self.delays.get() + 1;
        self.delays.set(n);
        self.delayed_cycles
            .set(self.delayed_cycles.get() + cycles as u64);
        if let Some(f) = self.on_delay.borrow_mut().as_mut() {
            f(n);
        }
    }

    fn enter_lpm(&self, mode: LowPowerMode) {
        self.lpm_entries.set(self.lpm_entries.get() + 1);
        self.last_lpm.set(Some(mode));
        if let Some(f) = self.on_lpm.borrow_mut().as_mut() {
            f(mode);
        }
    }
}

pub struct MockResetReg {
    values: RefCell<VecDeque<u16>>,
}

impl MockResetReg {
    pub fn new(values: &[u16]) -> Self {
        MockResetReg {
            values: RefCell::new(values.iter().copied().collect()),
        }
    }
}

impl ResetVectorReg for MockResetReg {
    fn sysrstiv_rd(&self) -> u16 {
        self.values.borrow_mut().pop_front().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct MockPins {
    pub calls: Vec<(Peripheral, PeriphConfig, bool)>,
    pub fail: bool,
}

impl PeripheralPins for MockPins {
    fn configure_peripheral_pins(
        &mut self,
        _cs: CriticalSection<'_>,
        periph: Peripheral,
        config: PeriphConfig,
        enable: bool,
    ) -> Result<(), PinError> {
        self.calls.push((periph, config, enable));
        if self.fail {
            Err(PinError::Unsupported)
        } else {
            Ok(())
        }
    }
}
