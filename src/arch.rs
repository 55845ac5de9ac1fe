//! Target specific instructions
//!
//! On the host these are placeholders so the rest of the crate can be built and unit tested.

#[cfg(target_arch = "msp430")]
mod inner {
    use core::arch::asm;

    use msp430::asm::nop;
    pub use msp430::interrupt::disable as disable_interrupts;

    /// For each set bit in `bits`, set the corresponding bit in the status register.
    ///
    /// Entering a low power mode this way halts the CPU until an interrupt clears the mode bits on
    /// return. Not `nomem`: the ISRs that ran in between may have written to memory.
    #[inline(always)]
    pub fn bis_sr(bits: u16) {
        unsafe { asm!("bis.w {0}, SR", "nop", in(reg) bits, options(nostack)) };
    }

    /// Busy-wait for at least `cycles` MCLK cycles
    #[inline(never)]
    pub fn delay_cycles(cycles: u32) {
        for _ in 0..cycles {
            nop();
        }
    }
}

#[cfg(not(target_arch = "msp430"))]
mod inner {
    /// Placeholder for setting status register bits
    pub fn bis_sr(_bits: u16) {}
    /// Placeholder for clearing GIE
    pub fn disable_interrupts() {}
    /// Placeholder for busy-waiting
    pub fn delay_cycles(_cycles: u32) {}
}

pub use inner::*;
