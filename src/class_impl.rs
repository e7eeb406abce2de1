//! The class-facing contract: callbacks and descriptor accessors a USB
//! function (HID, CDC, MSC, ...) implements and hands to [`crate::device::UsbDevice`].

use crate::setup::SetupPacket;

/// The class's verdict on a setup packet seen via
/// [`ClassCallbacks::callback_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestVerdict {
    /// The class has no opinion; run the standard dispatcher.
    Passthrough,
    /// The class will supply `len` bytes of data for the IN stage via
    /// [`crate::device::UsbDevice::complete_request`].
    Send(usize),
    /// The class will accept `len` bytes of data for the OUT stage via
    /// [`crate::device::UsbDevice::complete_request`].
    Receive(usize),
    /// The class rejects the request; stall EP0.
    Failure,
}

/// Behavioral callbacks a class implements.
///
/// Each `callback_*` method may resolve synchronously (return and let the
/// matching `complete_*` call land before `callback_*` itself returns, which
/// is still handled correctly since completions are never run inline — see
/// [`crate::deferred`]) or asynchronously from arbitrary later context.
pub trait ClassCallbacks: Send {
    /// The device's bus state changed.
    fn callback_state_change(&mut self, new_state: crate::state::DeviceState) {
        let _ = new_state;
    }

    /// The bus was reset.
    fn callback_reset(&mut self) {}

    /// A start-of-frame was observed (only delivered if SOF is enabled).
    fn callback_sof(&mut self, _frame: u16) {}

    /// Host is requesting configuration `n` (0 = deconfigure). The class
    /// must later resolve via `UsbDevice::complete_set_configuration`.
    fn callback_set_configuration(&mut self, configuration: u8);

    /// Host is requesting alternate setting `alt` on `interface`. The class
    /// must later resolve via `UsbDevice::complete_set_interface`.
    fn callback_set_interface(&mut self, interface: u8, alt: u8);

    /// Every setup packet is offered to the class before standard dispatch.
    /// The class must later resolve via `UsbDevice::complete_request`.
    fn callback_request(&mut self, setup: &SetupPacket);

    /// The data stage of a class-originated transfer finished (or was
    /// aborted). `data` holds the bytes the host sent for a class-owned OUT
    /// transfer (empty for IN transfers and aborts). The class must later
    /// resolve via `UsbDevice::complete_request_xfer_done`.
    fn callback_request_xfer_done(&mut self, setup: &SetupPacket, data: &[u8], aborted: bool);
}

/// Read-only descriptor byte producers a class supplies.
///
/// These are logically immutable data (unlike `ClassCallbacks`, which is
/// behavior), so they live on a sibling trait.
pub trait ClassDescriptors: Send {
    /// The 18-byte device descriptor.
    fn device_descriptor(&self) -> &[u8];

    /// The configuration descriptor bundle for configuration `index`
    /// (0-based): the configuration descriptor immediately followed by its
    /// nested interface/endpoint/class descriptors, `wTotalLength` bytes
    /// total.
    fn configuration_descriptor(&self, index: u8) -> Option<&[u8]>;

    /// String descriptor `index` (1-based; 0 is the language-ID descriptor,
    /// handled internally by the core), already encoded as a USB string
    /// descriptor (`bLength`, `bDescriptorType`, UTF-16LE payload).
    fn string_descriptor(&self, index: u8) -> Option<&[u8]>;
}
