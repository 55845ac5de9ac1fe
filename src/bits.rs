pub(crate) trait BitsExt: Sized {
    fn set_mask(self, mask: Self) -> Self;
    fn clear_mask(self, mask: Self) -> Self;
    fn check_mask(self, mask: Self) -> bool;
    /// Replace the bits selected by `mask` with the corresponding bits of `value`
    fn replace_mask(self, mask: Self, value: Self) -> Self;
}

macro_rules! bits_impl {
    ($($ty:ty),*) => {
        $(
            impl BitsExt for $ty {
                #[inline(always)]
                fn set_mask(self, mask: Self) -> Self {
                    self | mask
                }

                #[inline(always)]
                fn clear_mask(self, mask: Self) -> Self {
                    self & !mask
                }

                #[inline(always)]
                fn check_mask(self, mask: Self) -> bool {
                    self & mask != 0
                }

                #[inline(always)]
                fn replace_mask(self, mask: Self, value: Self) -> Self {
                    (self & !mask) | (value & mask)
                }
            }
        )*
    };
}

bits_impl!(u8, u16);
