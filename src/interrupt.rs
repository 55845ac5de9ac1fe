//! Scoped interrupt disable
//!
//! Functions in this crate that must not be interrupted take a [`CriticalSection`] token. An
//! [`IrqGuard`] disables interrupts for as long as it is alive and hands out that token, then
//! restores the previous interrupt state when dropped, including on early returns.

use core::marker::PhantomData;
use critical_section::{CriticalSection, RestoreState};

/// Interrupts stay disabled while this guard is alive
pub struct IrqGuard {
    state: RestoreState,
    // Must be released on the same context that acquired it
    _not_send: PhantomData<*mut ()>,
}

impl IrqGuard {
    /// Disable interrupts, remembering whether they were enabled
    #[inline]
    pub fn new() -> Self {
        // Safety: released exactly once in `Drop`. Nested guards must be dropped in reverse
        // creation order, which holds as long as they aren't moved out of their scope.
        let state = unsafe { critical_section::acquire() };
        IrqGuard {
            state,
            _not_send: PhantomData,
        }
    }

    /// Token proving interrupts are disabled for the lifetime of the borrow
    #[inline]
    pub fn cs(&self) -> CriticalSection<'_> {
        // Safety: the guard holds the critical section for at least as long as the borrow
        unsafe { CriticalSection::new() }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        unsafe { critical_section::release(self.state) };
    }
}
