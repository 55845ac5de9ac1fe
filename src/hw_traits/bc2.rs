//! Basic Clock Module+ registers

// BCSCTL1
pub const DIVA_MASK: u8 = 0x30;
pub const DIVA_SHIFT: u8 = 4;
pub const RSEL_MASK: u8 = 0x0F;

// BCSCTL2
pub const SELM_MASK: u8 = 0xC0;
pub const SELM_DCOCLK: u8 = 0x00;
pub const SELM_DCOCLK_ALT: u8 = 0x40;
pub const SELM_XT2CLK: u8 = 0x80;
pub const SELM_LFXT1CLK: u8 = 0xC0;
pub const DIVM_MASK: u8 = 0x30;
pub const DIVM_SHIFT: u8 = 4;
pub const SELS: u8 = 0x08;
pub const DIVS_MASK: u8 = 0x06;
pub const DIVS_SHIFT: u8 = 1;

// BCSCTL3
pub const LFXT1S_MASK: u8 = 0x30;
pub const LFXT1S_0: u8 = 0x00;
pub const LFXT1S_1: u8 = 0x10;
pub const LFXT1S_2: u8 = 0x20;
pub const XCAP_MASK: u8 = 0x0C;
pub const LFXT1OF: u8 = 0x01;

// Power-up values
pub const PUC_DCOCTL: u8 = 0x60;
pub const PUC_BCSCTL1: u8 = 0x87;

/// Register access for the Basic Clock Module+ and the oscillator fault flag it raises.
///
/// The oscillator fault flag OFIFG lives in the special function register IFG1 rather than in
/// the clock module, but nothing else in the clock code touches IFG1.
pub trait Bc2 {
    /// Read DCOCTL (DCO tap and modulator)
    fn dcoctl_rd(&self) -> u8;
    /// Write DCOCTL
    fn dcoctl_wr(&self, bits: u8);

    /// Read BCSCTL1 (XT2 enable, ACLK divider, DCO range)
    fn bcsctl1_rd(&self) -> u8;
    /// Write BCSCTL1
    fn bcsctl1_wr(&self, bits: u8);

    /// Read BCSCTL2 (MCLK and SMCLK selects and dividers)
    fn bcsctl2_rd(&self) -> u8;
    /// Write BCSCTL2
    fn bcsctl2_wr(&self, bits: u8);

    /// Read BCSCTL3 (LFXT1 mode, load capacitance, fault flags)
    fn bcsctl3_rd(&self) -> u8;
    /// Write BCSCTL3
    fn bcsctl3_wr(&self, bits: u8);

    /// Read the oscillator fault interrupt flag
    fn ofifg_rd(&self) -> bool;
    /// Clear the oscillator fault interrupt flag
    fn ofifg_clr(&self);

    /// Whether LFXT1 currently reports an oscillator fault
    #[inline(always)]
    fn lfxt1_faulted(&self) -> bool {
        self.bcsctl3_rd() & LFXT1OF != 0
    }
}

impl<B: Bc2 + ?Sized> Bc2 for &B {
    #[inline(always)]
    fn dcoctl_rd(&self) -> u8 {
        (**self).dcoctl_rd()
    }
    #[inline(always)]
    fn dcoctl_wr(&self, bits: u8) {
        (**self).dcoctl_wr(bits)
    }
    #[inline(always)]
    fn bcsctl1_rd(&self) -> u8 {
        (**self).bcsctl1_rd()
    }
    #[inline(always)]
    fn bcsctl1_wr(&self, bits: u8) {
        (**self).bcsctl1_wr(bits)
    }
    #[inline(always)]
    fn bcsctl2_rd(&self) -> u8 {
        (**self).bcsctl2_rd()
    }
    #[inline(always)]
    fn bcsctl2_wr(&self, bits: u8) {
        (**self).bcsctl2_wr(bits)
    }
    #[inline(always)]
    fn bcsctl3_rd(&self) -> u8 {
        (**self).bcsctl3_rd()
    }
    #[inline(always)]
    fn bcsctl3_wr(&self, bits: u8) {
        (**self).bcsctl3_wr(bits)
    }
    #[inline(always)]
    fn ofifg_rd(&self) -> bool {
        (**self).ofifg_rd()
    }
    #[inline(always)]
    fn ofifg_clr(&self) {
        (**self).ofifg_clr()
    }
}

#[cfg(feature = "bc2")]
mod pac_impl {
    use super::Bc2;
    use crate::pac;

    const OFIFG: u8 = 1 << 1;

    macro_rules! reg_methods {
        ($reg:ident, $rd:ident, $wr:ident) => {
            #[inline(always)]
            fn $rd(&self) -> u8 {
                self.$reg.read().bits()
            }

            #[inline(always)]
            #[allow(unused_unsafe)]
            fn $wr(&self, bits: u8) {
                self.$reg.write(|w| unsafe { w.bits(bits) });
            }
        };
    }

    impl Bc2 for pac::SYSTEM_CLOCK {
        reg_methods!(dcoctl, dcoctl_rd, dcoctl_wr);
        reg_methods!(bcsctl1, bcsctl1_rd, bcsctl1_wr);
        reg_methods!(bcsctl2, bcsctl2_rd, bcsctl2_wr);
        reg_methods!(bcsctl3, bcsctl3_rd, bcsctl3_wr);

        #[inline(always)]
        fn ofifg_rd(&self) -> bool {
            let sfr = unsafe { &*pac::SPECIAL_FUNCTION::ptr() };
            sfr.ifg1.read().bits() & OFIFG != 0
        }

        #[inline(always)]
        #[allow(unused_unsafe)]
        fn ofifg_clr(&self) {
            let sfr = unsafe { &*pac::SPECIAL_FUNCTION::ptr() };
            sfr.ifg1.modify(|r, w| unsafe { w.bits(r.bits() & !OFIFG) });
        }
    }
}
