//! Device-side setup packet decoding.
//!
//! A device never builds a `SETUP` packet, only decodes one handed to it by
//! the PHY as eight raw bytes. This is distinct from the byte layout in
//! [`crate::descriptor`]: this module owns turning those eight bytes into a
//! structured request the dispatcher in [`crate::request_dispatch`] can match on.

use crate::descriptor::{req_dir, req_recipient, req_type};

/// Direction of the data stage, decoded from `bmRequestType` bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host to device (OUT).
    HostToDevice,
    /// Device to host (IN).
    DeviceToHost,
}

/// Request type, decoded from `bmRequestType` bits 6:5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestKind {
    /// Standard USB request, handled by this crate's dispatcher.
    Standard,
    /// Class-specific request, forwarded to [`crate::class_impl::ClassCallbacks`].
    Class,
    /// Vendor-specific request, forwarded to [`crate::class_impl::ClassCallbacks`].
    Vendor,
    /// Reserved value (bits 6:5 == 0b11); always stalled.
    Reserved,
}

/// Recipient of the request, decoded from `bmRequestType` bits 4:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipient {
    /// The device as a whole.
    Device,
    /// One of the device's interfaces (low byte of `wIndex`).
    Interface,
    /// One of the device's endpoints (low byte of `wIndex`).
    Endpoint,
    /// Recipient "other", used by a handful of class requests.
    Other,
}

/// A decoded `SETUP` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    /// Raw `bmRequestType` byte, kept around for class callbacks that want it.
    pub request_type: u8,
    /// Data stage direction.
    pub direction: Direction,
    /// Request type (standard/class/vendor).
    pub kind: RequestKind,
    /// Request recipient.
    pub recipient: Recipient,
    /// `bRequest`.
    pub request: u8,
    /// `wValue`.
    pub value: u16,
    /// `wIndex`.
    pub index: u16,
    /// `wLength`: size of the data stage, 0 for no data stage.
    pub length: u16,
}

impl SetupPacket {
    /// Decodes a raw 8-byte `SETUP` packet as delivered by the PHY.
    ///
    /// Wire layout is little-endian: `bmRequestType`, `bRequest`, `wValue`,
    /// `wIndex`, `wLength`.
    pub fn decode(raw: [u8; 8]) -> Self {
        let request_type = raw[0];
        let direction = if request_type & req_dir::IN != 0 {
            Direction::DeviceToHost
        } else {
            Direction::HostToDevice
        };
        let kind = match request_type & 0x60 {
            req_type::STANDARD => RequestKind::Standard,
            req_type::CLASS => RequestKind::Class,
            req_type::VENDOR => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        };
        let recipient = match request_type & 0x1F {
            req_recipient::DEVICE => Recipient::Device,
            req_recipient::INTERFACE => Recipient::Interface,
            req_recipient::ENDPOINT => Recipient::Endpoint,
            _ => Recipient::Other,
        };
        SetupPacket {
            request_type,
            direction,
            kind,
            recipient,
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Returns the low byte of `wIndex`, the interface or endpoint number
    /// for interface/endpoint-recipient requests.
    pub fn index_low(&self) -> u8 {
        (self.index & 0xFF) as u8
    }

    /// Returns the high byte of `wValue`, used as a descriptor type in
    /// `GET_DESCRIPTOR`/`SET_DESCRIPTOR`.
    pub fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Returns the low byte of `wValue`, used as a descriptor index in
    /// `GET_DESCRIPTOR`/`SET_DESCRIPTOR`.
    pub fn value_low(&self) -> u8 {
        (self.value & 0xFF) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::request;

    #[test]
    fn decodes_get_descriptor_device() {
        // bmRequestType=0x80, bRequest=GET_DESCRIPTOR, wValue=0x0100
        // (DEVICE, index 0), wIndex=0, wLength=18
        let raw = [0x80, request::GET_DESCRIPTOR, 0x00, 0x01, 0x00, 0x00, 18, 0];
        let setup = SetupPacket::decode(raw);
        assert_eq!(setup.direction, Direction::DeviceToHost);
        assert_eq!(setup.kind, RequestKind::Standard);
        assert_eq!(setup.recipient, Recipient::Device);
        assert_eq!(setup.request, request::GET_DESCRIPTOR);
        assert_eq!(setup.value_high(), 1);
        assert_eq!(setup.value_low(), 0);
        assert_eq!(setup.length, 18);
    }

    #[test]
    fn decodes_set_address_host_to_device() {
        let raw = [0x00, request::SET_ADDRESS, 5, 0, 0, 0, 0, 0];
        let setup = SetupPacket::decode(raw);
        assert_eq!(setup.direction, Direction::HostToDevice);
        assert_eq!(setup.value, 5);
        assert_eq!(setup.length, 0);
    }

    #[test]
    fn decodes_class_request_to_interface() {
        let raw = [0x21, 0x0A, 0, 0, 2, 0, 0, 0];
        let setup = SetupPacket::decode(raw);
        assert_eq!(setup.kind, RequestKind::Class);
        assert_eq!(setup.recipient, Recipient::Interface);
        assert_eq!(setup.index_low(), 2);
    }

    #[test]
    fn decodes_reserved_request_type() {
        let raw = [0x60, 0, 0, 0, 0, 0, 0, 0];
        let setup = SetupPacket::decode(raw);
        assert_eq!(setup.kind, RequestKind::Reserved);
    }
}
