//! USB device-core error types.

use core::result::Result as CoreResult;

/// Errors surfaced across the `Phy`-facing and construction-time API.
///
/// Protocol-level failures observed while processing a setup packet (stalls,
/// direction mismatches, unknown requests) are not represented here: they
/// have no caller waiting for a `Result` and are instead resolved internally
/// by calling [`crate::phy::Phy::ep0_stall`]. This type is for failures that
/// *do* have a caller: building the device, and PHY-reported hardware
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbError {
    /// The PHY negotiated an EP0 max packet size the core cannot work with
    /// (must be 8, 16, 32 or 64).
    InvalidEp0PacketSize,
    /// A supplied descriptor failed the consistency checks in invariant 5
    /// (bad `bLength`/`bDescriptorType`, or `wTotalLength` too short).
    InvalidDescriptor,
    /// A string descriptor's source text could not be represented (e.g. it
    /// would produce a `bLength` that does not fit in a `u8`).
    StringTooLong,
    /// The PHY reported a hardware failure while creating an endpoint.
    EndpointCreationFailed,
}

/// Result type for USB device-core operations.
pub type Result<T> = CoreResult<T, UsbError>;
