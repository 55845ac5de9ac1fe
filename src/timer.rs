//! Timer abstraction
//!
//! A Timer_A peripheral counting in continuous mode is extended to 32 bits by counting overflows
//! in software. On top of that, each capture/compare channel can host one [`Alarm`] that fires at
//! a 32-bit counter value, however many overflows away that is.
//!
//! State shared with interrupt handlers lives in a `'static` [`TimerShared`], so the application
//! can hand the same block to a [`Timer`] owned by foreground code and to the ISRs that call
//! [`Timer::dispatch_cc0`] and [`Timer::dispatch_iv`]:
//!
//! ```ignore
//! static TA1: TimerShared = TimerShared::new();
//!
//! #[interrupt(wake_cpu)]
//! fn TIMER1_A1() {
//!     critical_section::with(|cs| {
//!         let regs = unsafe { &*pac::TIMER1_A3::ptr() };
//!         Timer::new(regs, &TA1).dispatch_iv(cs);
//!     });
//! }
//! ```

use crate::clock::ClockRates;
use crate::hw_traits::timera::{TimerA, TAIV_TAIFG};
use crate::lpm::{GIE, LPM_MASK};
use bitflags::bitflags;
use core::cell::Cell;
use critical_section::{CriticalSection, Mutex};

pub use crate::hw_traits::timera::{CapMode, CapSelect, Tassel, TimerDiv};

/// Most capture/compare channels on any Timer_A or Timer_B instance
pub const MAX_CCR: usize = 7;
/// How many handlers the overflow chain holds
pub const MAX_OVERFLOW_HANDLERS: usize = 4;
// Reads of an asynchronously clocked TAR before settling for the last one
const TAR_READ_ATTEMPTS: u8 = 4;

bitflags! {
    /// What an event handler wants done when the interrupt returns
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IsrResult: u16 {
        /// Leave the low power mode the interrupted code was sleeping in
        const EXIT_LPM = 1 << 0;
        /// Return to the interrupted code with interrupts disabled
        const CLEAR_GIE = 1 << 1;
        /// A higher priority task became ready
        const YIELD = 1 << 2;
        /// Remove the handler that returned this from further dispatch
        const DISABLE_INTERRUPT = 1 << 3;
        /// Skip the remaining handlers in the overflow chain
        const BREAK_CHAIN = 1 << 4;
    }
}

impl IsrResult {
    /// Status register bits the interrupt glue should clear in the saved SR before returning
    #[inline]
    pub fn sr_clear_bits(self) -> u16 {
        let mut bits = 0;
        if self.contains(IsrResult::EXIT_LPM) {
            bits |= LPM_MASK;
        }
        if self.contains(IsrResult::CLEAR_GIE) {
            bits |= GIE;
        }
        bits
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IsrResult {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "IsrResult({=u16:#x})", self.bits())
    }
}

/// Timer event delivered to a handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerEvent {
    /// The 16-bit counter wrapped
    Overflow,
    /// The alarm on this capture/compare channel reached its setting
    Alarm(u8),
}

/// Something that reacts to timer interrupts. Runs in interrupt context.
pub trait TimerEventHandler: Sync {
    /// Handle `event` and tell the dispatcher what to do next
    fn on_event(&self, cs: CriticalSection<'_>, event: TimerEvent) -> IsrResult;
}

type HandlerCell = Mutex<Cell<Option<&'static dyn TimerEventHandler>>>;

#[inline]
fn same_handler(a: &'static dyn TimerEventHandler, b: &'static dyn TimerEventHandler) -> bool {
    core::ptr::eq(
        a as *const dyn TimerEventHandler as *const (),
        b as *const dyn TimerEventHandler as *const (),
    )
}

struct AlarmSlot {
    handler: HandlerCell,
    enabled: Mutex<Cell<bool>>,
    armed: Mutex<Cell<bool>>,
    setting: Mutex<Cell<u32>>,
}

impl AlarmSlot {
    const EMPTY: AlarmSlot = AlarmSlot {
        handler: Mutex::new(Cell::new(None)),
        enabled: Mutex::new(Cell::new(false)),
        armed: Mutex::new(Cell::new(false)),
        setting: Mutex::new(Cell::new(0)),
    };
}

/// Timer state shared between foreground code and interrupt handlers
pub struct TimerShared {
    overflows: Mutex<Cell<u16>>,
    slots: [AlarmSlot; MAX_CCR],
    overflow_chain: [HandlerCell; MAX_OVERFLOW_HANDLERS],
}

impl TimerShared {
    const NO_HANDLER: HandlerCell = Mutex::new(Cell::new(None));

    /// Empty state, suitable for a `static`
    pub const fn new() -> Self {
        TimerShared {
            overflows: Mutex::new(Cell::new(0)),
            slots: [AlarmSlot::EMPTY; MAX_CCR],
            overflow_chain: [Self::NO_HANDLER; MAX_OVERFLOW_HANDLERS],
        }
    }
}

impl Default for TimerShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Alarm and overflow chain errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// The timer has no capture/compare channel with that index
    NoChannel,
    /// The channel already belongs to another alarm, or the alarm is already armed
    Busy,
    /// The alarm is not enabled
    Disabled,
    /// The requested time has already been reached
    Past,
    /// The overflow chain has no free entries
    ChainFull,
}

/// A Timer_A peripheral with a 32-bit software-extended counter
pub struct Timer<T: TimerA> {
    regs: T,
    shared: &'static TimerShared,
}

impl<T: TimerA> Timer<T> {
    /// Bind timer registers to their shared state. Several `Timer`s may be bound to the same
    /// registers and state, which is how interrupt handlers get at them.
    #[inline]
    pub fn new(regs: T, shared: &'static TimerShared) -> Self {
        Timer { regs, shared }
    }

    /// Timer registers
    #[inline]
    pub fn regs(&self) -> &T {
        &self.regs
    }

    /// Release the timer registers
    #[inline]
    pub fn free(self) -> T {
        self.regs
    }

    // TAR can be mid-update when the timer clock is asynchronous to MCLK, so read until two
    // consecutive reads agree. A timer on SMCLK moves between every pair of reads.
    #[inline]
    fn tar_stable(&self) -> u16 {
        let mut prev = self.regs.tar_rd();
        if self.regs.tassel() == Tassel::Smclk {
            return prev;
        }
        for _ in 0..TAR_READ_ATTEMPTS {
            let cur = self.regs.tar_rd();
            if cur == prev {
                break;
            }
            prev = cur;
        }
        prev
    }

    /// Current value of the 32-bit counter.
    ///
    /// An overflow that has happened but whose interrupt has not been serviced yet is accounted
    /// for, so the result never runs backwards across a wrap.
    pub fn counter(&self, cs: CriticalSection<'_>) -> u32 {
        let mut high = self.shared.overflows.borrow(cs).get();
        let mut low = self.tar_stable();
        if self.regs.taifg_rd() {
            // The flag can be raised after TAR was read, so read TAR again now that the wrap is
            // known to have happened
            high = high.wrapping_add(1);
            low = self.tar_stable();
        }
        ((high as u32) << 16) | low as u32
    }

    /// Zero the 32-bit counter
    pub fn reset_counter(&self, cs: CriticalSection<'_>) {
        self.shared.overflows.borrow(cs).set(0);
        self.regs.reset();
        self.regs.taifg_clr();
    }

    /// Count rate of the timer, given the clock frequencies it can be driven from. External
    /// clock inputs are unknown and reported as 0.
    pub fn frequency_hz(&self, clocks: &impl ClockRates) -> u32 {
        let src_hz = match self.regs.tassel() {
            Tassel::Aclk => clocks.aclk_hz(),
            Tassel::Smclk => clocks.smclk_hz(),
            Tassel::Taclk | Tassel::Inclk => 0,
        };
        src_hz >> self.regs.id_shift()
    }

    /// Append a handler to the chain that runs on every overflow
    pub fn add_overflow_handler(
        &self,
        cs: CriticalSection<'_>,
        handler: &'static dyn TimerEventHandler,
    ) -> Result<(), AlarmError> {
        for cell in self.shared.overflow_chain.iter() {
            let cell = cell.borrow(cs);
            if cell.get().is_none() {
                cell.set(Some(handler));
                return Ok(());
            }
        }
        Err(AlarmError::ChainFull)
    }

    /// Remove a handler from the overflow chain, keeping the order of the others. Returns
    /// whether it was present.
    pub fn remove_overflow_handler(
        &self,
        cs: CriticalSection<'_>,
        handler: &'static dyn TimerEventHandler,
    ) -> bool {
        let chain = &self.shared.overflow_chain;
        let Some(pos) = chain.iter().position(|cell| {
            cell.borrow(cs)
                .get()
                .is_some_and(|h| same_handler(h, handler))
        }) else {
            return false;
        };
        for i in pos..MAX_OVERFLOW_HANDLERS - 1 {
            let next = chain[i + 1].borrow(cs).get();
            chain[i].borrow(cs).set(next);
        }
        chain[MAX_OVERFLOW_HANDLERS - 1].borrow(cs).set(None);
        true
    }

    /// Service the CC0 interrupt vector
    pub fn dispatch_cc0(&self, cs: CriticalSection<'_>) -> IsrResult {
        // Hardware clears CCIFG when the CC0 vector is taken; clear it for software dispatch too
        self.regs.ccifg_clr(0);
        self.run_alarm(cs, 0)
    }

    /// Service the shared TAIV interrupt vector: one pending CC1+ alarm or overflow per call
    pub fn dispatch_iv(&self, cs: CriticalSection<'_>) -> IsrResult {
        match self.regs.iv_rd() {
            0 => IsrResult::empty(),
            TAIV_TAIFG => self.run_overflow(cs),
            iv => self.run_alarm(cs, (iv >> 1) as u8),
        }
    }

    fn run_overflow(&self, cs: CriticalSection<'_>) -> IsrResult {
        let overflows = self.shared.overflows.borrow(cs);
        overflows.set(overflows.get().wrapping_add(1));

        let mut result = IsrResult::empty();
        let mut i = 0;
        while i < MAX_OVERFLOW_HANDLERS {
            let Some(handler) = self.shared.overflow_chain[i].borrow(cs).get() else {
                break;
            };
            let rv = handler.on_event(cs, TimerEvent::Overflow);
            if rv.contains(IsrResult::DISABLE_INTERRUPT) {
                // Later handlers shift down into this position
                self.remove_overflow_handler(cs, handler);
            } else {
                i += 1;
            }
            result |= rv;
            if rv.contains(IsrResult::BREAK_CHAIN) {
                break;
            }
        }
        result - (IsrResult::BREAK_CHAIN | IsrResult::DISABLE_INTERRUPT)
    }

    fn run_alarm(&self, cs: CriticalSection<'_>, ccidx: u8) -> IsrResult {
        let Some(slot) = self.shared.slots.get(ccidx as usize) else {
            return IsrResult::empty();
        };
        if !(slot.enabled.borrow(cs).get() && slot.armed.borrow(cs).get()) {
            self.regs.ccie_clr(ccidx);
            return IsrResult::empty();
        }
        let setting = slot.setting.borrow(cs).get();
        if setting.wrapping_sub(self.counter(cs)) as i32 > 0 {
            // Low half matched in an earlier epoch; keep waiting
            return IsrResult::empty();
        }
        slot.armed.borrow(cs).set(false);
        self.regs.ccie_clr(ccidx);
        match slot.handler.borrow(cs).get() {
            Some(handler) => {
                handler.on_event(cs, TimerEvent::Alarm(ccidx)) - IsrResult::DISABLE_INTERRUPT
            }
            None => IsrResult::empty(),
        }
    }
}

/// Measure the number of timer counts spanned by `count` capture events on one channel.
///
/// The timer must already be counting. The channel is left in compare mode with its interrupt
/// disabled.
pub fn capture_delta<T: TimerA>(
    regs: &T,
    ccidx: u8,
    cm: CapMode,
    ccis: CapSelect,
    count: u16,
) -> u16 {
    regs.config_cap_mode(ccidx, cm, ccis);
    regs.ccifg_clr(ccidx);
    while !regs.ccifg_rd(ccidx) {}
    let start = regs.ccr_rd(ccidx);
    regs.ccifg_clr(ccidx);
    for _ in 0..count {
        while !regs.ccifg_rd(ccidx) {}
        regs.ccifg_clr(ccidx);
    }
    let end = regs.ccr_rd(ccidx);
    regs.config_cmp_mode(ccidx);
    end.wrapping_sub(start)
}

/// One-shot alarm on a capture/compare channel of a [`Timer`].
///
/// The alarm is a handle to its channel's slot in [`TimerShared`]; its operations take the
/// timer it was created on.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    ccidx: u8,
}

impl Alarm {
    /// Claim channel `ccidx` of `timer` for an alarm that calls `handler` when it fires. The
    /// alarm starts out disabled.
    pub fn new<T: TimerA>(
        cs: CriticalSection<'_>,
        timer: &Timer<T>,
        ccidx: u8,
        handler: &'static dyn TimerEventHandler,
    ) -> Result<Self, AlarmError> {
        if ccidx >= T::CCR_COUNT {
            return Err(AlarmError::NoChannel);
        }
        let slot = timer
            .shared
            .slots
            .get(ccidx as usize)
            .ok_or(AlarmError::NoChannel)?;
        let cell = slot.handler.borrow(cs);
        if cell.get().is_some() {
            return Err(AlarmError::Busy);
        }
        cell.set(Some(handler));
        slot.enabled.borrow(cs).set(false);
        slot.armed.borrow(cs).set(false);
        timer.regs.config_cmp_mode(ccidx);
        Ok(Alarm { ccidx })
    }

    /// Channel this alarm runs on
    #[inline]
    pub fn ccidx(&self) -> u8 {
        self.ccidx
    }

    #[inline]
    fn slot<'t, T: TimerA>(&self, timer: &'t Timer<T>) -> &'t AlarmSlot {
        &timer.shared.slots[self.ccidx as usize]
    }

    /// Whether the alarm reacts to its channel's interrupt
    pub fn is_enabled<T: TimerA>(&self, cs: CriticalSection<'_>, timer: &Timer<T>) -> bool {
        self.slot(timer).enabled.borrow(cs).get()
    }

    /// Enable or disable the alarm. Disabling cancels it.
    pub fn set_enabled<T: TimerA>(&self, cs: CriticalSection<'_>, timer: &Timer<T>, on: bool) {
        if !on {
            self.cancel(cs, timer);
        }
        self.slot(timer).enabled.borrow(cs).set(on);
    }

    /// Whether the alarm is waiting to fire
    pub fn is_armed<T: TimerA>(&self, cs: CriticalSection<'_>, timer: &Timer<T>) -> bool {
        self.slot(timer).armed.borrow(cs).get()
    }

    /// Arm the alarm to fire when the 32-bit counter reaches `setting`
    pub fn set<T: TimerA>(
        &self,
        cs: CriticalSection<'_>,
        timer: &Timer<T>,
        setting: u32,
    ) -> Result<(), AlarmError> {
        let slot = self.slot(timer);
        if !slot.enabled.borrow(cs).get() {
            return Err(AlarmError::Disabled);
        }
        if slot.armed.borrow(cs).get() {
            return Err(AlarmError::Busy);
        }
        if setting.wrapping_sub(timer.counter(cs)) as i32 <= 0 {
            return Err(AlarmError::Past);
        }
        slot.setting.borrow(cs).set(setting);
        slot.armed.borrow(cs).set(true);

        let regs = &timer.regs;
        regs.config_cmp_mode(self.ccidx);
        regs.ccr_wr(self.ccidx, setting as u16);
        regs.ccie_set(self.ccidx);
        // The counter may have passed the setting while the channel was being programmed
        if setting.wrapping_sub(timer.counter(cs)) as i32 <= 0 && !regs.ccifg_rd(self.ccidx) {
            regs.ccifg_set(self.ccidx);
        }
        trace!("alarm {=u8} set for {=u32}", self.ccidx, setting);
        Ok(())
    }

    /// Disarm the alarm. Returns whether it was armed.
    pub fn cancel<T: TimerA>(&self, cs: CriticalSection<'_>, timer: &Timer<T>) -> bool {
        let was_armed = self.slot(timer).armed.borrow(cs).replace(false);
        timer.regs.ccie_clr(self.ccidx);
        timer.regs.ccifg_clr(self.ccidx);
        was_armed
    }

    /// Disable the alarm and give its channel back
    pub fn release<T: TimerA>(self, cs: CriticalSection<'_>, timer: &Timer<T>) {
        self.set_enabled(cs, timer, false);
        self.slot(timer).handler.borrow(cs).set(None);
    }
}
