//! DCO trimming
//!
//! The factory calibrations only cover a handful of frequencies. To hit anything else, MCLK is
//! measured against ACLK with a timer capture channel and the DCO tap/modulator and range bits
//! are stepped one notch at a time until the measurement matches.

use crate::clock::{Bc2Clock, ClockError, ClockRates, ClockSource};
use crate::bits::BitsExt;
use crate::hw_traits::bc2::{
    Bc2, DIVA_MASK, DIVA_SHIFT, DIVM_MASK, DIVS_MASK, RSEL_MASK, SELM_MASK, SELS,
};
use crate::hw_traits::timera::{TimerA, MC_CONTINUOUS, TACLR, TASSEL_SHIFT};
use crate::timer::{capture_delta, CapMode, CapSelect, Tassel};
use critical_section::CriticalSection;

/// Upper bound on DCO adjustment steps
pub const MAX_ITERATIONS: u16 = 16 * 256;
/// ACLK periods per measurement
pub const SAMPLE_PERIOD_ACLK: u16 = 10;

/// Timer capture channel that sees ACLK, used to measure MCLK
pub struct TrimSource<'a, T: TimerA> {
    /// Timer to count SMCLK with. It is stopped when trimming finishes.
    pub timer: &'a T,
    /// Capture channel wired to ACLK
    pub ccidx: u8,
    /// Capture input of `ccidx` that carries ACLK
    pub input: CapSelect,
}

impl<'a, T: TimerA> TrimSource<'a, T> {
    /// Capture from `input` of channel `ccidx`
    pub fn new(timer: &'a T, ccidx: u8, input: CapSelect) -> Self {
        TrimSource {
            timer,
            ccidx,
            input,
        }
    }
}

/// Trim errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrimError {
    /// ACLK could not be set up as the reference
    Clock(ClockError),
    /// The target can't be measured: the count doesn't fit the 16-bit timer, or the capture
    /// channel doesn't exist
    OutOfRange,
    /// No DCO setting produced exactly the target count
    NotConverged,
}

impl From<ClockError> for TrimError {
    fn from(e: ClockError) -> Self {
        TrimError::Clock(e)
    }
}

impl<B: Bc2> Bc2Clock<B> {
    /// Adjust the DCO until MCLK measures `target_hz` against ACLK.
    ///
    /// MCLK and SMCLK are switched to the undivided DCO for the duration and get their
    /// selectors and dividers back afterwards. ACLK is switched to LFXT1 (or VLOCLK without a
    /// crystal) and restored afterwards, and the trim timer is left stopped. On success the
    /// configured MCLK frequency becomes `target_hz`. On failure the DCO goes back to the setting
    /// it had on entry.
    pub fn trim_to_mclk<T: TimerA>(
        &mut self,
        cs: CriticalSection<'_>,
        source: &TrimSource<'_, T>,
        target_hz: u32,
    ) -> Result<(), TrimError> {
        if source.ccidx >= T::CCR_COUNT {
            return Err(TrimError::OutOfRange);
        }
        let dcoctl = self.regs.dcoctl_rd();
        let bcsctl1 = self.regs.bcsctl1_rd();
        let bcsctl2 = self.regs.bcsctl2_rd();
        let bcsctl3 = self.regs.bcsctl3_rd();
        let result = self.trim_loop(cs, source, target_hz);
        source.timer.ctl_wr(0);
        if result.is_err() {
            // Same ordering as programming a calibration (erratum BCL12)
            self.regs.dcoctl_wr(0);
            self.regs.bcsctl1_wr(bcsctl1);
            self.regs.dcoctl_wr(dcoctl);
        }
        self.regs.bcsctl2_wr(bcsctl2);
        self.regs.bcsctl3_wr(bcsctl3);
        result
    }

    fn trim_loop<T: TimerA>(
        &mut self,
        cs: CriticalSection<'_>,
        source: &TrimSource<'_, T>,
        target_hz: u32,
    ) -> Result<(), TrimError> {
        let diva = (self.regs.bcsctl1_rd() & DIVA_MASK) >> DIVA_SHIFT;
        self.configure_aclk(cs, ClockSource::Xt1ClkOrVloClk, diva)?;
        let aclk_hz = self.aclk_hz();
        if aclk_hz == 0 {
            return Err(TrimError::OutOfRange);
        }
        let target = (SAMPLE_PERIOD_ACLK as u64 * target_hz as u64) / aclk_hz as u64;
        let target = u16::try_from(target).map_err(|_| TrimError::OutOfRange)?;

        let timer = source.timer;
        timer.ctl_wr(((Tassel::Smclk as u16) << TASSEL_SHIFT) | MC_CONTINUOUS | TACLR);
        // The timer counts SMCLK, so it has to match MCLK
        let bcsctl2 = self.regs.bcsctl2_rd() & !(SELM_MASK | DIVM_MASK | SELS | DIVS_MASK);
        self.regs.bcsctl2_wr(bcsctl2);

        for _ in 0..MAX_ITERATIONS {
            let measured = capture_delta(
                timer,
                source.ccidx,
                CapMode::FallingEdge,
                source.input,
                SAMPLE_PERIOD_ACLK,
            );
            if measured == target {
                self.configured_mclk_hz = target_hz;
                debug!("DCO trimmed to {=u32} Hz", target_hz);
                return Ok(());
            }
            let dcoctl = self.regs.dcoctl_rd();
            let bcsctl1 = self.regs.bcsctl1_rd();
            let rsel = bcsctl1 & RSEL_MASK;
            if measured > target {
                // Too fast: step down, borrowing from the range when the modulator wraps
                if dcoctl == 0 && rsel == 0 {
                    break;
                }
                let dcoctl = dcoctl.wrapping_sub(1);
                self.regs.dcoctl_wr(dcoctl);
                if dcoctl == 0xFF {
                    self.regs.bcsctl1_wr(bcsctl1.replace_mask(RSEL_MASK, rsel - 1));
                }
            } else {
                if dcoctl == 0xFF && rsel == RSEL_MASK {
                    break;
                }
                let dcoctl = dcoctl.wrapping_add(1);
                self.regs.dcoctl_wr(dcoctl);
                if dcoctl == 0 {
                    self.regs.bcsctl1_wr(bcsctl1.replace_mask(RSEL_MASK, rsel + 1));
                }
            }
        }
        Err(TrimError::NotConverged)
    }
}
