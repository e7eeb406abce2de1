//! The one-shot deferred-action slot.
//!
//! A class-supplied completion call (`complete_request`,
//! `complete_set_configuration`, `complete_set_interface`,
//! `complete_request_xfer_done`) may arrive from a context where running the
//! next control-transfer step immediately would re-enter the PHY
//! inappropriately. Instead it records the continuation here and returns;
//! [`crate::lock`] drains the slot once the outermost lock is about to
//! release, guaranteeing at most one deferred action is ever pending and
//! that event → callback → continuation stays strictly serialized.

use crate::class_impl::RequestVerdict;

/// A continuation scheduled to run once the core lock's depth returns to
/// its outermost level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeferredAction {
    /// Resume the control transfer engine with the class's verdict on the
    /// current setup packet.
    CompleteRequest(RequestVerdict),
    /// Tell the class the outstanding transfer's data stage is done.
    CompleteRequestXferDone,
    /// Resume `SET_CONFIGURATION` processing with the class's success flag.
    CompleteSetConfiguration(bool),
    /// Resume `SET_INTERFACE` processing with the class's success flag.
    CompleteSetInterface(bool),
}
