//! Timer_A registers

use crate::bits::BitsExt;

// TAxCTL
pub const TASSEL_MASK: u16 = 0x0300;
pub const TASSEL_SHIFT: u16 = 8;
pub const ID_MASK: u16 = 0x00C0;
pub const ID_SHIFT: u16 = 6;
pub const MC_MASK: u16 = 0x0030;
pub const MC_CONTINUOUS: u16 = 0x0020;
pub const TACLR: u16 = 0x0004;
pub const TAIE: u16 = 0x0002;
pub const TAIFG: u16 = 0x0001;

// TAxCCTLn
pub const CM_SHIFT: u16 = 14;
pub const CCIS_SHIFT: u16 = 12;
pub const SCS: u16 = 0x0800;
pub const CAP: u16 = 0x0100;
pub const CCIE: u16 = 0x0010;
pub const CCIFG: u16 = 0x0001;

// TAxIV
pub const TAIV_TAIFG: u16 = 0x000A;

/// Timer clock source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tassel {
    /// External TACLK pin
    Taclk = 0,
    /// ACLK
    Aclk = 1,
    /// SMCLK
    Smclk = 2,
    /// External INCLK pin
    Inclk = 3,
}

impl Tassel {
    #[inline]
    pub(crate) fn from_ctl(ctl: u16) -> Self {
        match (ctl & TASSEL_MASK) >> TASSEL_SHIFT {
            0 => Tassel::Taclk,
            1 => Tassel::Aclk,
            2 => Tassel::Smclk,
            _ => Tassel::Inclk,
        }
    }
}

/// Timer clock divider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerDiv {
    /// No division
    _1 = 0,
    /// Divide by 2
    _2 = 1,
    /// Divide by 4
    _4 = 2,
    /// Divide by 8
    _8 = 3,
}

impl TimerDiv {
    /// Divider expressed as a right shift
    #[inline]
    pub fn from_shift(shift: u8) -> Self {
        match shift {
            0 => TimerDiv::_1,
            1 => TimerDiv::_2,
            2 => TimerDiv::_4,
            _ => TimerDiv::_8,
        }
    }
}

/// Capture edge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapMode {
    /// Capture disabled
    NoCap = 0,
    /// Capture on rising edge
    RisingEdge = 1,
    /// Capture on falling edge
    FallingEdge = 2,
    /// Capture on both edges
    BothEdges = 3,
}

/// Capture input select
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapSelect {
    /// CCIxA
    InputA = 0,
    /// CCIxB
    InputB = 1,
    /// GND
    Gnd = 2,
    /// VCC
    Vcc = 3,
}

/// Register access for one Timer_A peripheral.
///
/// Capture/compare channels are addressed by index at runtime, since alarms pick their channel
/// from configuration. Indices at or above [`CCR_COUNT`](TimerA::CCR_COUNT) are never passed in.
pub trait TimerA {
    /// Number of capture/compare channels
    const CCR_COUNT: u8;

    /// Read TAxCTL
    fn ctl_rd(&self) -> u16;
    /// Write TAxCTL
    fn ctl_wr(&self, bits: u16);

    /// Read the counter
    fn tar_rd(&self) -> u16;
    /// Write the counter
    fn tar_wr(&self, count: u16);

    /// Read TAxCCTLn
    fn cctl_rd(&self, ccidx: u8) -> u16;
    /// Write TAxCCTLn
    fn cctl_wr(&self, ccidx: u8, bits: u16);

    /// Read TAxCCRn
    fn ccr_rd(&self, ccidx: u8) -> u16;
    /// Write TAxCCRn
    fn ccr_wr(&self, ccidx: u8, count: u16);

    /// Read the interrupt vector register, which clears the highest priority pending flag
    fn iv_rd(&self) -> u16;

    /// Clear the counter, divider logic and count direction
    #[inline]
    fn reset(&self) {
        self.ctl_wr(self.ctl_rd().set_mask(TACLR));
    }

    /// Stop counting without touching the rest of the configuration
    #[inline]
    fn stop(&self) {
        self.ctl_wr(self.ctl_rd().clear_mask(MC_MASK));
    }

    /// Check if timer is stopped
    #[inline]
    fn is_stopped(&self) -> bool {
        !self.ctl_rd().check_mask(MC_MASK)
    }

    /// Start counting up to 0xFFFF and wrapping
    #[inline]
    fn continuous(&self) {
        self.ctl_wr(self.ctl_rd().replace_mask(MC_MASK, MC_CONTINUOUS));
    }

    /// Replace the clock select and divider settings. The timer is left stopped and the counter
    /// cleared.
    #[inline]
    fn config_clock(&self, tassel: Tassel, div: TimerDiv) {
        self.ctl_wr(((tassel as u16) << TASSEL_SHIFT) | ((div as u16) << ID_SHIFT) | TACLR);
    }

    /// Currently selected clock source
    #[inline]
    fn tassel(&self) -> Tassel {
        Tassel::from_ctl(self.ctl_rd())
    }

    /// Currently selected divider, as a right shift
    #[inline]
    fn id_shift(&self) -> u8 {
        ((self.ctl_rd() & ID_MASK) >> ID_SHIFT) as u8
    }

    /// Read the overflow flag
    #[inline]
    fn taifg_rd(&self) -> bool {
        self.ctl_rd().check_mask(TAIFG)
    }

    /// Clear the overflow flag
    #[inline]
    fn taifg_clr(&self) {
        self.ctl_wr(self.ctl_rd().clear_mask(TAIFG));
    }

    /// Enable the overflow interrupt
    #[inline]
    fn taie_set(&self) {
        self.ctl_wr(self.ctl_rd().set_mask(TAIE));
    }

    /// Read a channel's interrupt flag
    #[inline]
    fn ccifg_rd(&self, ccidx: u8) -> bool {
        self.cctl_rd(ccidx).check_mask(CCIFG)
    }

    /// Raise a channel's interrupt flag from software
    #[inline]
    fn ccifg_set(&self, ccidx: u8) {
        self.cctl_wr(ccidx, self.cctl_rd(ccidx).set_mask(CCIFG));
    }

    /// Clear a channel's interrupt flag
    #[inline]
    fn ccifg_clr(&self, ccidx: u8) {
        self.cctl_wr(ccidx, self.cctl_rd(ccidx).clear_mask(CCIFG));
    }

    /// Enable a channel's interrupt
    #[inline]
    fn ccie_set(&self, ccidx: u8) {
        self.cctl_wr(ccidx, self.cctl_rd(ccidx).set_mask(CCIE));
    }

    /// Disable a channel's interrupt
    #[inline]
    fn ccie_clr(&self, ccidx: u8) {
        self.cctl_wr(ccidx, self.cctl_rd(ccidx).clear_mask(CCIE));
    }

    /// Put a channel in synchronous capture mode with the interrupt disabled
    #[inline]
    fn config_cap_mode(&self, ccidx: u8, cm: CapMode, ccis: CapSelect) {
        self.cctl_wr(
            ccidx,
            ((cm as u16) << CM_SHIFT) | ((ccis as u16) << CCIS_SHIFT) | SCS | CAP,
        );
    }

    /// Put a channel in compare mode with its interrupt disabled and its flag cleared
    #[inline]
    fn config_cmp_mode(&self, ccidx: u8) {
        self.cctl_wr(ccidx, 0);
    }
}

impl<T: TimerA + ?Sized> TimerA for &T {
    const CCR_COUNT: u8 = T::CCR_COUNT;

    #[inline(always)]
    fn ctl_rd(&self) -> u16 {
        (**self).ctl_rd()
    }
    #[inline(always)]
    fn ctl_wr(&self, bits: u16) {
        (**self).ctl_wr(bits)
    }
    #[inline(always)]
    fn tar_rd(&self) -> u16 {
        (**self).tar_rd()
    }
    #[inline(always)]
    fn tar_wr(&self, count: u16) {
        (**self).tar_wr(count)
    }
    #[inline(always)]
    fn cctl_rd(&self, ccidx: u8) -> u16 {
        (**self).cctl_rd(ccidx)
    }
    #[inline(always)]
    fn cctl_wr(&self, ccidx: u8, bits: u16) {
        (**self).cctl_wr(ccidx, bits)
    }
    #[inline(always)]
    fn ccr_rd(&self, ccidx: u8) -> u16 {
        (**self).ccr_rd(ccidx)
    }
    #[inline(always)]
    fn ccr_wr(&self, ccidx: u8, count: u16) {
        (**self).ccr_wr(ccidx, count)
    }
    #[inline(always)]
    fn iv_rd(&self) -> u16 {
        (**self).iv_rd()
    }
}

#[cfg(feature = "timer_a3")]
mod pac_impl {
    use super::TimerA;
    use crate::pac;

    macro_rules! timera_impl {
        ($TAx:ident, $taxctl:ident, $taxr:ident, $taxiv:ident, $([$n:literal, $taxcctln:ident, $taxccrn:ident]),*) => {
            impl TimerA for pac::$TAx {
                const CCR_COUNT: u8 = [$($n),*].len() as u8;

                #[inline(always)]
                fn ctl_rd(&self) -> u16 {
                    self.$taxctl.read().bits()
                }

                #[inline(always)]
                #[allow(unused_unsafe)]
                fn ctl_wr(&self, bits: u16) {
                    self.$taxctl.write(|w| unsafe { w.bits(bits) });
                }

                #[inline(always)]
                fn tar_rd(&self) -> u16 {
                    self.$taxr.read().bits()
                }

                #[inline(always)]
                #[allow(unused_unsafe)]
                fn tar_wr(&self, count: u16) {
                    self.$taxr.write(|w| unsafe { w.bits(count) });
                }

                #[inline]
                fn cctl_rd(&self, ccidx: u8) -> u16 {
                    match ccidx {
                        $($n => self.$taxcctln.read().bits(),)*
                        _ => 0,
                    }
                }

                #[inline]
                #[allow(unused_unsafe)]
                fn cctl_wr(&self, ccidx: u8, bits: u16) {
                    match ccidx {
                        $($n => self.$taxcctln.write(|w| unsafe { w.bits(bits) }),)*
                        _ => (),
                    }
                }

                #[inline]
                fn ccr_rd(&self, ccidx: u8) -> u16 {
                    match ccidx {
                        $($n => self.$taxccrn.read().bits(),)*
                        _ => 0,
                    }
                }

                #[inline]
                #[allow(unused_unsafe)]
                fn ccr_wr(&self, ccidx: u8, count: u16) {
                    match ccidx {
                        $($n => self.$taxccrn.write(|w| unsafe { w.bits(count) }),)*
                        _ => (),
                    }
                }

                #[inline(always)]
                fn iv_rd(&self) -> u16 {
                    self.$taxiv.read().bits()
                }
            }
        };
    }

    timera_impl!(
        TIMER0_A3,
        ta0ctl,
        ta0r,
        ta0iv,
        [0, ta0cctl0, ta0ccr0],
        [1, ta0cctl1, ta0ccr1],
        [2, ta0cctl2, ta0ccr2]
    );

    timera_impl!(
        TIMER1_A3,
        ta1ctl,
        ta1r,
        ta1iv,
        [0, ta1cctl0, ta1ccr0],
        [1, ta1cctl1, ta1ccr1],
        [2, ta1cctl2, ta1ccr2]
    );
}
