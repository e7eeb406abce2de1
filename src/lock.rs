//! Reentrant lock discipline isolating PHY ISR events from class API calls.
//!
//! The C++ source this crate is modeled on guards a depth counter at
//! runtime and drains one deferred action when the counter drops back to
//! zero. Rust's borrow checker gives us a stronger guarantee for free:
//! [`crate::device::UsbDevice::on_event`] and every class-facing method take
//! `&mut self` and acquire the critical section exactly once, never nested,
//! so there is no depth counter to maintain here — `with_lock` simply wraps
//! a call in a `critical_section` region and then drains the single pending
//! [`crate::deferred::DeferredAction`] slot before returning.

use crate::device::UsbDevice;
use crate::{class_impl::ClassCallbacks, class_impl::ClassDescriptors, phy::Phy};

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDevice<P, C, D> {
    /// Runs `f` and drains any deferred action it scheduled, all inside one
    /// unbroken critical section.
    ///
    /// This is the single re-entry point for PHY events and class-facing
    /// API calls; nothing else in this crate calls `critical_section::with`.
    /// The lock must never be released between running `f` and draining
    /// `post_process`: a PHY interrupt landing in that gap could overwrite
    /// `self.control` before the deferred action meant for the old control
    /// transfer has run.
    pub(crate) fn with_lock<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        critical_section::with(|_cs| {
            let result = f(self);
            if let Some(action) = self.post_process.take() {
                self.run_deferred(action);
            }
            result
        })
    }
}
