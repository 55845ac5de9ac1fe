//! Board support for MSP430 family microcontrollers.
//!
//! This crate covers the parts of bring-up every application needs before it can do anything
//! useful: configuring the Basic Clock Module+ (BC2) oscillators and dividers, trimming the DCO
//! towards an arbitrary MCLK frequency, running a Timer_A peripheral as a 32-bit uptime clock
//! with a sleep alarm, and decoding the reset cause register on devices that have one.
//!
//! Here are the [`Family User's guide`] and the [`MSP430G2553 datasheet`] for reference.
//!
//! [`Family User's guide`]: https://www.ti.com/lit/ug/slau144j/slau144j.pdf
//! [`MSP430G2553 datasheet`]: https://www.ti.com/lit/ds/symlink/msp430g2553.pdf
//!
//! # Usage
//!
//! Select a device with exactly one device feature (`msp430g2553` or `msp430fr2355`). The core
//! logic is written against the register traits in this crate rather than against a particular
//! PAC, so it also builds (and is tested) on the host without any device feature.
//!
//! Functions that must run with interrupts disabled take a [`CriticalSection`] token. Use
//! [`critical_section::with`] or an [`IrqGuard`](interrupt::IrqGuard) to obtain one.
//!
//! # Examples
//!
//! The `device-examples/` directory contains binary crates for each supported device. Flash them
//! with `mspdebug` with `tilib` support installed and in $PATH.
//!
//! [`CriticalSection`]: critical_section::CriticalSection

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "msp430", feature(asm_experimental_arch))]
#![deny(missing_docs)]

#[cfg(all(feature = "msp430g2553", feature = "msp430fr2355"))]
compile_error!("Select at most one device feature");

// This must go first so the logging macros are visible everywhere else
pub(crate) mod fmt;

pub mod clock;
pub mod cpu;
pub mod delay;
pub mod interrupt;
pub mod lpm;
pub mod platform;
pub mod prelude;
pub mod sysrst;
pub mod timer;
pub mod trim;
pub mod uptime;
#[cfg(feature = "msp430g2553")]
pub mod watchdog;

mod arch;
mod bits;
mod hw_traits;

#[cfg(test)]
mod mock;

pub use hw_traits::bc2::Bc2;
pub use hw_traits::sysrst::ResetVectorReg;
pub use hw_traits::timera::TimerA;

#[cfg(feature = "msp430g2553")]
pub use msp430g2553 as pac;
#[cfg(feature = "msp430fr2355")]
pub use msp430fr2355 as pac;
