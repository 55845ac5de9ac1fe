/// Source of reset cause vectors.
///
/// Every read of SYSRSTIV returns the highest priority pending reset cause and clears it, so the
/// register drains to 0 once all causes have been read.
pub trait ResetVectorReg {
    /// Read and clear the next pending reset cause. Returns 0 when none are left.
    fn sysrstiv_rd(&self) -> u16;
}

impl<R: ResetVectorReg + ?Sized> ResetVectorReg for &R {
    #[inline(always)]
    fn sysrstiv_rd(&self) -> u16 {
        (**self).sysrstiv_rd()
    }
}

#[cfg(feature = "sysrstiv")]
mod pac_impl {
    use super::ResetVectorReg;
    use crate::pac;

    impl ResetVectorReg for pac::SYS {
        #[inline(always)]
        fn sysrstiv_rd(&self) -> u16 {
            self.sysrstiv.read().bits()
        }
    }
}
