//! Clock configuration for the Basic Clock Module+ (BC2)
//!
//! The BC2 has three clock sources: the LFXT1 low-frequency crystal (with the internal VLO as a
//! substitute), an optional XT2 crystal, and the digitally controlled oscillator (DCO). These
//! feed ACLK, SMCLK and MCLK through individual selectors and power-of-two dividers.
//!
//! [`Bc2Clock`] configures each output with the crystal fault handling the family user's guide
//! recommends, and remembers the frequency MCLK was last set to, since the DCO's rate can't be
//! read back from its registers.

use crate::bits::BitsExt;
use crate::cpu::Cpu;
use crate::hw_traits::bc2::*;
use crate::platform::{PeriphConfig, Peripheral, PeripheralPins};
use crate::trim::TrimSource;
use crate::TimerA;
use critical_section::CriticalSection;

/// Nominal VLOCLK frequency
pub const VLOCLK_HZ: u32 = 12_000;
/// Nominal LFXT1 watch crystal frequency
pub const XT1CLK_HZ: u32 = 32_768;
/// Nominal MCLK frequency after power-up, with the DCO at DCOCTL=0x60, BCSCTL1=0x87
pub const PUC_MCLK_HZ: u32 = 1_100_000;

/// Clock sources, as requested from or reported by the configurator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// No source
    None,
    /// LFXT1 in low-frequency mode
    Xt1Clk,
    /// Internal very-low-power oscillator
    VloClk,
    /// Internal reference oscillator. Not present on BC2.
    RefoClk,
    /// DCO
    DcoClk,
    /// Divided DCO. Not present on BC2.
    DcoClkDiv,
    /// XT2 high-frequency crystal
    Xt2Clk,
    /// LFXT1, falling back to VLOCLK if the crystal is faulted
    Xt1ClkFallback,
    /// LFXT1 if it is running, otherwise VLOCLK
    Xt1ClkOrVloClk,
    /// LFXT1 if it is running, otherwise REFOCLK. Not available on BC2.
    Xt1ClkOrRefoClk,
    /// Reserved selector value
    Unknown,
}

/// Clock configuration errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// The clock can't be driven from the requested source
    UnsupportedSource,
}

/// Factory DCO calibration frequencies stored in information segment A
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalFreq {
    /// 1 MHz
    _1MHz = 0,
    /// 8 MHz
    _8MHz = 1,
    /// 12 MHz
    _12MHz = 2,
    /// 16 MHz
    _16MHz = 3,
}

impl CalFreq {
    /// All calibration frequencies, slowest first
    pub const ALL: [CalFreq; 4] = [
        CalFreq::_1MHz,
        CalFreq::_8MHz,
        CalFreq::_12MHz,
        CalFreq::_16MHz,
    ];

    /// Frequency in Hz
    #[inline]
    pub const fn hz(self) -> u32 {
        match self {
            CalFreq::_1MHz => 1_000_000,
            CalFreq::_8MHz => 8_000_000,
            CalFreq::_12MHz => 12_000_000,
            CalFreq::_16MHz => 16_000_000,
        }
    }
}

/// DCOCTL/BCSCTL1 pair that produces a known frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DcoCalibration {
    /// DCOCTL value
    pub dcoctl: u8,
    /// BCSCTL1 value
    pub bcsctl1: u8,
}

// Information segment A, CALDCO_16MHZ first
#[cfg(feature = "bc2")]
const CALIBRATION_BASE: usize = 0x10F8;

/// What the clock hardware of a particular device and board offers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockCaps {
    calibrations: [Option<DcoCalibration>; 4],
    /// Nominal XT2 frequency, if the device has XT2 and a crystal is fitted
    pub xt2_hz: Option<u32>,
    /// Nominal VLOCLK frequency
    pub vlo_hz: u32,
    /// Nominal LFXT1 frequency
    pub xt1_hz: u32,
    /// MCLK frequency after power-up
    pub puc_mclk_hz: u32,
    /// XCAP bits to use while LFXT1 is enabled
    pub lfxt1_xcap: u8,
    /// Cycles to wait for LFXT1 to settle between fault checks
    pub lfxt1_stabilization_cycles: u32,
    /// Microseconds to wait between oscillator fault checks
    pub fault_recheck_us: u32,
}

impl ClockCaps {
    /// No calibrations and no XT2, with the family's nominal rates
    pub const fn new() -> Self {
        ClockCaps {
            calibrations: [None; 4],
            xt2_hz: None,
            vlo_hz: VLOCLK_HZ,
            xt1_hz: XT1CLK_HZ,
            puc_mclk_hz: PUC_MCLK_HZ,
            lfxt1_xcap: 0x04,
            lfxt1_stabilization_cycles: 20_000,
            fault_recheck_us: 100,
        }
    }

    /// Add a DCO calibration
    pub const fn with_calibration(mut self, freq: CalFreq, cal: DcoCalibration) -> Self {
        self.calibrations[freq as usize] = Some(cal);
        self
    }

    /// Declare an XT2 crystal of the given frequency
    pub const fn with_xt2(mut self, hz: u32) -> Self {
        self.xt2_hz = Some(hz);
        self
    }

    /// Set the LFXT1 load capacitance bits
    pub const fn with_lfxt1_xcap(mut self, xcap: u8) -> Self {
        self.lfxt1_xcap = xcap & XCAP_MASK;
        self
    }

    /// Calibration for `freq`, if the device has one
    #[inline]
    pub fn calibration(&self, freq: CalFreq) -> Option<DcoCalibration> {
        self.calibrations[freq as usize]
    }

    /// Build from the 8 calibration bytes at the end of information segment A, in memory order
    /// (CALDCO_16MHZ first). Erased (0xFF/0xFF) pairs are treated as absent.
    pub fn from_calibration_bytes(bytes: &[u8; 8]) -> Self {
        let mut caps = Self::new();
        // Stored fastest first
        for (pair, freq) in bytes.chunks_exact(2).zip(CalFreq::ALL.iter().rev()) {
            let (dcoctl, bcsctl1) = (pair[0], pair[1]);
            if dcoctl == 0xFF && bcsctl1 == 0xFF {
                continue;
            }
            caps.calibrations[*freq as usize] = Some(DcoCalibration { dcoctl, bcsctl1 });
        }
        caps
    }

    /// Read the factory calibrations from information segment A
    #[cfg(feature = "bc2")]
    pub fn from_info_flash() -> Self {
        let mut bytes = [0u8; 8];
        for (i, b) in bytes.iter_mut().enumerate() {
            // Safety: information segment A is always mapped and readable on BC2 devices
            *b = unsafe { core::ptr::read_volatile((CALIBRATION_BASE + i) as *const u8) };
        }
        Self::from_calibration_bytes(&bytes)
    }
}

impl Default for ClockCaps {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequencies of the three system clocks
pub trait ClockRates {
    /// ACLK frequency in Hz
    fn aclk_hz(&self) -> u32;
    /// SMCLK frequency in Hz
    fn smclk_hz(&self) -> u32;
    /// MCLK frequency in Hz
    fn mclk_hz(&self) -> u32;
}

/// Basic Clock Module+ configurator
pub struct Bc2Clock<B: Bc2> {
    pub(crate) regs: B,
    caps: ClockCaps,
    pub(crate) configured_mclk_hz: u32,
}

impl<B: Bc2> Bc2Clock<B> {
    /// Take control of the clock module, assuming it is in its power-up configuration
    pub fn new(regs: B, caps: ClockCaps) -> Self {
        Bc2Clock {
            regs,
            configured_mclk_hz: caps.puc_mclk_hz,
            caps,
        }
    }

    /// Capabilities this configurator was created with
    #[inline]
    pub fn caps(&self) -> &ClockCaps {
        &self.caps
    }

    /// Undivided MCLK frequency last commanded by [`configure_mclk`](Bc2Clock::configure_mclk)
    /// or a successful trim
    #[inline]
    pub fn configured_mclk_hz(&self) -> u32 {
        self.configured_mclk_hz
    }

    /// Release the clock registers
    pub fn free(self) -> B {
        self.regs
    }

    /// Try to bring up the LFXT1 crystal.
    ///
    /// `retry_budget` is the number of settle-and-check rounds: negative retries forever, zero
    /// skips the attempt. If the crystal doesn't come up its pins are released and ACLK falls
    /// back to VLOCLK. Returns whether the crystal is running.
    pub fn configure_lfxt1<C: Cpu, P: PeripheralPins>(
        &mut self,
        cs: CriticalSection<'_>,
        cpu: &C,
        pins: &mut P,
        enable: bool,
        retry_budget: i16,
    ) -> bool {
        let mut ok = false;
        self.regs.ofifg_clr();
        if enable && retry_budget != 0 {
            let pins_ok = pins
                .configure_peripheral_pins(cs, Peripheral::Lfxt1, PeriphConfig::Default, true)
                .is_ok();
            if pins_ok {
                let step = if retry_budget > 0 { 1 } else { 0 };
                let mut remaining = retry_budget;
                // Check the crystal with the DCO still in its power-up configuration
                self.regs.bcsctl3_wr(LFXT1S_0 | self.caps.lfxt1_xcap);
                loop {
                    remaining -= step;
                    cpu.feed_watchdog();
                    cpu.delay_cycles(self.caps.lfxt1_stabilization_cycles);
                    if !self.regs.lfxt1_faulted() || remaining == 0 {
                        break;
                    }
                }
                ok = !self.regs.lfxt1_faulted();
            } else {
                warn!("LFXT1 pins unavailable");
            }
        }
        self.regs.ofifg_clr();
        if !ok {
            if let Err(_e) =
                pins.configure_peripheral_pins(cs, Peripheral::Lfxt1, PeriphConfig::Default, false)
            {
                warn!("LFXT1 pins not released: {}", _e);
            }
            self.regs.bcsctl3_wr(LFXT1S_2);
        }
        debug!("LFXT1 running: {=bool}", ok);
        ok
    }

    /// Select the ACLK source and divider (`dividing_shift` 0-3 divides by 1, 2, 4 or 8)
    pub fn configure_aclk(
        &mut self,
        _cs: CriticalSection<'_>,
        source: ClockSource,
        dividing_shift: u8,
    ) -> Result<(), ClockError> {
        let sela = match source {
            ClockSource::Xt1Clk => LFXT1S_0,
            ClockSource::VloClk => LFXT1S_2,
            ClockSource::Xt1ClkFallback | ClockSource::Xt1ClkOrVloClk => {
                // A crystal that already fell back to VLO stays there
                let on_vlo = self.regs.bcsctl3_rd() & LFXT1S_MASK == LFXT1S_2;
                if on_vlo || self.regs.lfxt1_faulted() {
                    LFXT1S_2
                } else {
                    LFXT1S_0
                }
            }
            _ => return Err(ClockError::UnsupportedSource),
        };
        let bcsctl1 = self
            .regs
            .bcsctl1_rd()
            .replace_mask(DIVA_MASK, dividing_shift << DIVA_SHIFT);
        self.regs.bcsctl1_wr(bcsctl1);
        let bcsctl3 = self.regs.bcsctl3_rd().replace_mask(LFXT1S_MASK, sela) & !LFXT1OF;
        self.regs.bcsctl3_wr(bcsctl3);
        Ok(())
    }

    /// Select the SMCLK source and divider. XT2 is used only if the device has it; any other
    /// request selects the DCO.
    pub fn configure_smclk(
        &mut self,
        _cs: CriticalSection<'_>,
        source: ClockSource,
        dividing_shift: u8,
    ) {
        let sels = if source == ClockSource::Xt2Clk && self.caps.xt2_hz.is_some() {
            SELS
        } else {
            0
        };
        let bcsctl2 = self
            .regs
            .bcsctl2_rd()
            .replace_mask(SELS | DIVS_MASK, sels | (dividing_shift << DIVS_SHIFT));
        self.regs.bcsctl2_wr(bcsctl2);
    }

    /// Run MCLK from the DCO at the factory calibration closest to `target_hz`, then wait for
    /// oscillator faults to clear. A target of 0 restores the power-up setting. The MCLK divider
    /// is reset to 1.
    ///
    /// Returns the nominal MCLK frequency.
    pub fn configure_mclk<C: Cpu>(
        &mut self,
        _cs: CriticalSection<'_>,
        cpu: &C,
        target_hz: u32,
    ) -> u32 {
        self.program_dco(target_hz);
        self.wait_for_oscillators(cpu);
        self.configured_mclk_hz
    }

    /// As [`configure_mclk`](Bc2Clock::configure_mclk), then trim the DCO towards `target_hz`
    /// using `trim`'s capture channel. If trimming fails MCLK stays at the calibrated value.
    pub fn configure_mclk_trimmed<C: Cpu, T: TimerA>(
        &mut self,
        cs: CriticalSection<'_>,
        cpu: &C,
        target_hz: u32,
        trim: &TrimSource<'_, T>,
    ) -> u32 {
        if let Some(target_hz) = self.program_dco(target_hz) {
            if let Err(_e) = self.trim_to_mclk(cs, trim, target_hz) {
                warn!("DCO trim to {=u32} Hz failed: {}", target_hz, _e);
            }
        }
        self.wait_for_oscillators(cpu);
        self.configured_mclk_hz
    }

    // Program the best DCO candidate for `target_hz`. Returns the target to trim towards, if
    // trimming makes sense.
    fn program_dco(&mut self, target_hz: u32) -> Option<u32> {
        let (target_hz, trim) = match target_hz {
            0 => (self.caps.puc_mclk_hz, false),
            hz => (hz, true),
        };

        let mut best = DcoCalibration {
            dcoctl: PUC_DCOCTL,
            bcsctl1: PUC_BCSCTL1,
        };
        let mut best_hz = self.caps.puc_mclk_hz;
        let mut best_error = best_hz.abs_diff(target_hz);
        for freq in CalFreq::ALL {
            let Some(cal) = self.caps.calibration(freq) else {
                continue;
            };
            let error = freq.hz().abs_diff(target_hz);
            if error < best_error {
                best = cal;
                best_hz = freq.hz();
                best_error = error;
            }
        }

        // Clearing the DCO bits first works around erratum BCL12
        self.regs.dcoctl_wr(0);
        self.regs.bcsctl1_wr(best.bcsctl1);
        self.regs.dcoctl_wr(best.dcoctl);
        let bcsctl2 = self.regs.bcsctl2_rd().clear_mask(SELM_MASK | DIVM_MASK);
        self.regs.bcsctl2_wr(bcsctl2);
        self.configured_mclk_hz = best_hz;
        debug!("MCLK {=u32} Hz for target {=u32} Hz", best_hz, target_hz);

        trim.then_some(target_hz)
    }

    // The fault flag can't clear while an oscillator is still settling, so this does not give up
    fn wait_for_oscillators<C: Cpu>(&self, cpu: &C) {
        loop {
            self.regs.ofifg_clr();
            cpu.feed_watchdog();
            // Assume MCLK could be as fast as 32 MHz
            cpu.delay_cycles(32 * self.caps.fault_recheck_us);
            if !self.regs.ofifg_rd() {
                break;
            }
        }
    }

    // Undivided rate of whatever LFXT1 is currently producing
    fn lfxt1_hz(&self) -> u32 {
        match self.regs.bcsctl3_rd() & LFXT1S_MASK {
            LFXT1S_2 => self.caps.vlo_hz,
            _ if self.regs.lfxt1_faulted() => self.caps.vlo_hz,
            _ => self.caps.xt1_hz,
        }
    }

    // XT2 when present, otherwise the selector falls through to LFXT1
    fn xt2_or_lfxt1_hz(&self) -> u32 {
        self.caps.xt2_hz.unwrap_or_else(|| self.lfxt1_hz())
    }

    /// Source currently driving ACLK
    pub fn aclk_source(&self) -> ClockSource {
        match self.regs.bcsctl3_rd() & LFXT1S_MASK {
            LFXT1S_0 => ClockSource::Xt1Clk,
            LFXT1S_1 => ClockSource::Unknown,
            LFXT1S_2 => ClockSource::VloClk,
            _ => ClockSource::Xt2Clk,
        }
    }

    /// Source currently driving SMCLK
    pub fn smclk_source(&self) -> ClockSource {
        if self.regs.bcsctl2_rd().check_mask(SELS) {
            ClockSource::Xt2Clk
        } else {
            ClockSource::DcoClk
        }
    }

    /// Source currently driving MCLK
    pub fn mclk_source(&self) -> ClockSource {
        match self.regs.bcsctl2_rd() & SELM_MASK {
            SELM_DCOCLK | SELM_DCOCLK_ALT => ClockSource::DcoClk,
            SELM_XT2CLK => ClockSource::Xt2Clk,
            _ => ClockSource::Xt1Clk,
        }
    }
}

impl<B: Bc2> ClockRates for Bc2Clock<B> {
    fn aclk_hz(&self) -> u32 {
        let div = (self.regs.bcsctl1_rd() & DIVA_MASK) >> DIVA_SHIFT;
        self.lfxt1_hz() >> div
    }

    fn smclk_hz(&self) -> u32 {
        let bcsctl2 = self.regs.bcsctl2_rd();
        let div = (bcsctl2 & DIVS_MASK) >> DIVS_SHIFT;
        let src_hz = if bcsctl2.check_mask(SELS) {
            self.xt2_or_lfxt1_hz()
        } else {
            self.configured_mclk_hz
        };
        src_hz >> div
    }

    fn mclk_hz(&self) -> u32 {
        let bcsctl2 = self.regs.bcsctl2_rd();
        let div = (bcsctl2 & DIVM_MASK) >> DIVM_SHIFT;
        let src_hz = match bcsctl2 & SELM_MASK {
            SELM_DCOCLK | SELM_DCOCLK_ALT => self.configured_mclk_hz,
            SELM_XT2CLK => self.xt2_or_lfxt1_hz(),
            _ => self.lfxt1_hz(),
        };
        src_hz >> div
    }
}
