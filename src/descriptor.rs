//! USB descriptor types and structures.
//!
//! This module provides the standard descriptor byte layouts, class codes
//! and other constants a device-side stack needs to describe itself to the
//! host, plus the helpers used to walk a class's packed configuration bundle
//! when answering `GET_DESCRIPTOR`.

/// USB descriptor type constants.
pub mod desc_type {
    /// Device descriptor (18 bytes)
    pub const DEVICE: u8 = 1;
    /// Configuration descriptor (9 bytes + additional descriptors)
    pub const CONFIGURATION: u8 = 2;
    /// String descriptor (variable length UTF-16LE)
    pub const STRING: u8 = 3;
    /// Interface descriptor (9 bytes)
    pub const INTERFACE: u8 = 4;
    /// Endpoint descriptor (7 bytes)
    pub const ENDPOINT: u8 = 5;
    /// Device Qualifier descriptor (USB 2.0, 10 bytes)
    pub const DEVICE_QUALIFIER: u8 = 6;
    /// Other Speed Configuration descriptor (USB 2.0)
    pub const OTHER_SPEED_CONFIG: u8 = 7;
    /// Interface Power descriptor
    pub const INTERFACE_POWER: u8 = 8;

    // Class-specific descriptors
    /// HID descriptor
    pub const HID: u8 = 0x21;
    /// HID report descriptor
    pub const HID_REPORT: u8 = 0x22;
    /// HID physical descriptor
    pub const HID_PHYSICAL: u8 = 0x23;
}

/// USB device class codes.
pub mod class {
    /// Class specified at interface level
    pub const INTERFACE_SPECIFIC: u8 = 0x00;
    /// Audio class
    pub const AUDIO: u8 = 0x01;
    /// Communications and CDC control
    pub const CDC: u8 = 0x02;
    /// Human Interface Device
    pub const HID: u8 = 0x03;
    /// Printer class
    pub const PRINTER: u8 = 0x07;
    /// Mass storage class
    pub const MASS_STORAGE: u8 = 0x08;
    /// Hub class
    pub const HUB: u8 = 0x09;
    /// CDC-Data class
    pub const CDC_DATA: u8 = 0x0A;
    /// Miscellaneous class
    pub const MISC: u8 = 0xEF;
    /// Vendor specific class
    pub const VENDOR_SPECIFIC: u8 = 0xFF;
}

/// HID subclass codes.
pub mod hid_subclass {
    /// No subclass
    pub const NONE: u8 = 0;
    /// Boot interface subclass
    pub const BOOT: u8 = 1;
}

/// HID protocol codes.
pub mod hid_protocol {
    /// No protocol
    pub const NONE: u8 = 0;
    /// Keyboard
    pub const KEYBOARD: u8 = 1;
    /// Mouse
    pub const MOUSE: u8 = 2;
}

/// Endpoint transfer type codes.
pub mod ep_type {
    /// Control transfer
    pub const CONTROL: u8 = 0;
    /// Isochronous transfer
    pub const ISOCHRONOUS: u8 = 1;
    /// Bulk transfer
    pub const BULK: u8 = 2;
    /// Interrupt transfer
    pub const INTERRUPT: u8 = 3;
}

/// Endpoint synchronization types (for isochronous endpoints).
pub mod ep_sync {
    /// No synchronization
    pub const NONE: u8 = 0;
    /// Asynchronous
    pub const ASYNC: u8 = 1;
    /// Adaptive
    pub const ADAPTIVE: u8 = 2;
    /// Synchronous
    pub const SYNC: u8 = 3;
}

/// Endpoint usage types (for isochronous endpoints).
pub mod ep_usage {
    /// Data endpoint
    pub const DATA: u8 = 0;
    /// Feedback endpoint
    pub const FEEDBACK: u8 = 1;
    /// Implicit feedback data endpoint
    pub const IMPLICIT_FEEDBACK: u8 = 2;
}

/// Standard USB request codes.
pub mod request {
    /// Get device/interface/endpoint status
    pub const GET_STATUS: u8 = 0;
    /// Clear a feature
    pub const CLEAR_FEATURE: u8 = 1;
    /// Set a feature
    pub const SET_FEATURE: u8 = 3;
    /// Set device address
    pub const SET_ADDRESS: u8 = 5;
    /// Get descriptor
    pub const GET_DESCRIPTOR: u8 = 6;
    /// Set descriptor
    pub const SET_DESCRIPTOR: u8 = 7;
    /// Get configuration value
    pub const GET_CONFIGURATION: u8 = 8;
    /// Set configuration value
    pub const SET_CONFIGURATION: u8 = 9;
    /// Get interface alternate setting
    pub const GET_INTERFACE: u8 = 10;
    /// Set interface alternate setting
    pub const SET_INTERFACE: u8 = 11;
    /// Sync frame (isochronous)
    pub const SYNCH_FRAME: u8 = 12;
}

/// USB feature selectors.
pub mod feature {
    /// Endpoint halt (stall)
    pub const ENDPOINT_HALT: u16 = 0;
    /// Device remote wakeup
    pub const DEVICE_REMOTE_WAKEUP: u16 = 1;
    /// Test mode (USB 2.0)
    pub const TEST_MODE: u16 = 2;
}

/// Request type direction bit.
pub mod req_dir {
    /// Host to device
    pub const OUT: u8 = 0x00;
    /// Device to host
    pub const IN: u8 = 0x80;
}

/// Request type "type" bits.
pub mod req_type {
    /// Standard request
    pub const STANDARD: u8 = 0x00;
    /// Class-specific request
    pub const CLASS: u8 = 0x20;
    /// Vendor-specific request
    pub const VENDOR: u8 = 0x40;
}

/// Request type recipient bits.
pub mod req_recipient {
    /// Device recipient
    pub const DEVICE: u8 = 0x00;
    /// Interface recipient
    pub const INTERFACE: u8 = 0x01;
    /// Endpoint recipient
    pub const ENDPOINT: u8 = 0x02;
    /// Other recipient
    pub const OTHER: u8 = 0x03;
}

/// Language IDs for string descriptors.
pub mod lang_id {
    /// English (United States)
    pub const EN_US: u16 = 0x0409;
}

/// USB device descriptor (18 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceDesc {
    /// Descriptor length (18)
    pub length: u8,
    /// Descriptor type (1 for device)
    pub desc_type: u8,
    /// USB specification version (BCD)
    pub bcd_usb: u16,
    /// Device class code
    pub device_class: u8,
    /// Device subclass code
    pub device_subclass: u8,
    /// Device protocol code
    pub device_protocol: u8,
    /// Maximum packet size for endpoint 0 (8, 16, 32, or 64)
    pub max_packet_size0: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Product ID
    pub product_id: u16,
    /// Device release number (BCD)
    pub bcd_device: u16,
    /// Manufacturer string index
    pub manufacturer: u8,
    /// Product string index
    pub product: u8,
    /// Serial number string index
    pub serial_number: u8,
    /// Number of configurations
    pub num_configurations: u8,
}

impl DeviceDesc {
    /// Returns the USB version as a tuple (major, minor).
    pub fn usb_version(&self) -> (u8, u8) {
        ((self.bcd_usb >> 8) as u8, (self.bcd_usb & 0xFF) as u8)
    }

    /// Returns the device version as a tuple (major, minor).
    pub fn device_version(&self) -> (u8, u8) {
        ((self.bcd_device >> 8) as u8, (self.bcd_device & 0xFF) as u8)
    }

    /// Serializes this descriptor to its 18-byte wire representation.
    pub fn to_bytes(&self) -> [u8; 18] {
        let mut b = [0u8; 18];
        b[0] = self.length;
        b[1] = self.desc_type;
        b[2..4].copy_from_slice(&self.bcd_usb.to_le_bytes());
        b[4] = self.device_class;
        b[5] = self.device_subclass;
        b[6] = self.device_protocol;
        b[7] = self.max_packet_size0;
        b[8..10].copy_from_slice(&self.vendor_id.to_le_bytes());
        b[10..12].copy_from_slice(&self.product_id.to_le_bytes());
        b[12..14].copy_from_slice(&self.bcd_device.to_le_bytes());
        b[14] = self.manufacturer;
        b[15] = self.product;
        b[16] = self.serial_number;
        b[17] = self.num_configurations;
        b
    }
}

/// USB configuration descriptor (9 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigDesc {
    /// Descriptor length (9)
    pub length: u8,
    /// Descriptor type (2 for configuration)
    pub desc_type: u8,
    /// Total length of configuration data (includes all descriptors)
    pub total_length: u16,
    /// Number of interfaces
    pub num_interfaces: u8,
    /// Configuration value for SetConfiguration
    pub config_value: u8,
    /// Configuration string index
    pub configuration: u8,
    /// Configuration attributes (D7: reserved, D6: self-powered, D5: remote wakeup)
    pub attributes: u8,
    /// Maximum power consumption (2mA units)
    pub max_power: u8,
}

impl ConfigDesc {
    /// Returns true if the device is self-powered in this configuration.
    pub fn self_powered(&self) -> bool {
        (self.attributes & 0x40) != 0
    }

    /// Returns true if remote wakeup is supported in this configuration.
    pub fn remote_wakeup(&self) -> bool {
        (self.attributes & 0x20) != 0
    }

    /// Returns the maximum power in milliamps.
    pub fn max_power_ma(&self) -> u16 {
        self.max_power as u16 * 2
    }
}

/// USB interface descriptor (9 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct InterfaceDesc {
    /// Descriptor length (9)
    pub length: u8,
    /// Descriptor type (4 for interface)
    pub desc_type: u8,
    /// Interface number
    pub interface_number: u8,
    /// Alternate setting number
    pub alternate_setting: u8,
    /// Number of endpoints (excluding endpoint 0)
    pub num_endpoints: u8,
    /// Interface class code
    pub interface_class: u8,
    /// Interface subclass code
    pub interface_subclass: u8,
    /// Interface protocol code
    pub interface_protocol: u8,
    /// Interface string index
    pub interface: u8,
}

/// USB endpoint descriptor (7 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointDesc {
    /// Descriptor length (7)
    pub length: u8,
    /// Descriptor type (5 for endpoint)
    pub desc_type: u8,
    /// Endpoint address (D7: direction, D3-D0: endpoint number)
    pub endpoint_address: u8,
    /// Endpoint attributes (transfer type, sync type, usage type)
    pub attributes: u8,
    /// Maximum packet size
    pub max_packet_size: u16,
    /// Polling interval
    pub interval: u8,
}

impl EndpointDesc {
    /// Returns the endpoint number (0-15).
    pub fn number(&self) -> u8 {
        self.endpoint_address & 0x0F
    }

    /// Returns true if this is an IN endpoint.
    pub fn is_in(&self) -> bool {
        (self.endpoint_address & 0x80) != 0
    }

    /// Returns the transfer type.
    pub fn transfer_type(&self) -> u8 {
        self.attributes & 0x03
    }

    /// Returns the actual maximum packet size (without additional transaction bits).
    pub fn packet_size(&self) -> u16 {
        self.max_packet_size & 0x07FF
    }
}

/// HID descriptor.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct HidDesc {
    /// Descriptor length
    pub length: u8,
    /// Descriptor type (0x21 for HID)
    pub desc_type: u8,
    /// HID specification version (BCD)
    pub bcd_hid: u16,
    /// Country code
    pub country_code: u8,
    /// Number of HID class descriptors
    pub num_descriptors: u8,
    /// Report descriptor type
    pub report_desc_type: u8,
    /// Report descriptor length
    pub report_desc_length: u16,
}

/// Walks a packed bundle of descriptors (as returned for `GET_DESCRIPTOR
/// CONFIGURATION`, i.e. a configuration descriptor immediately followed by
/// its interface/endpoint/class descriptors back to back) looking for the
/// `index`'th occurrence of `desc_type`.
///
/// Each descriptor in the bundle starts with `bLength` then `bDescriptorType`,
/// so the walk does not need to understand any particular descriptor's
/// payload layout. Returns `None` if the bundle is malformed (a `bLength` of
/// 0, or a descriptor that would run past the end of `bytes`) or the index
/// is out of range.
pub fn find_descriptor(bytes: &[u8], desc_type: u8, index: u8) -> Option<&[u8]> {
    let mut pos = 0usize;
    let mut seen = 0u8;
    while pos + 2 <= bytes.len() {
        let len = bytes[pos] as usize;
        if len == 0 || pos + len > bytes.len() {
            return None;
        }
        let ty = bytes[pos + 1];
        if ty == desc_type {
            if seen == index {
                return Some(&bytes[pos..pos + len]);
            }
            seen += 1;
        }
        pos += len;
    }
    None
}

/// Maximum number of UTF-16 code units a string descriptor's source text may
/// encode to, bounded by `bLength` (`u8`) minus the 2-byte header, divided by
/// 2 bytes per code unit.
pub const MAX_STRING_DESC_CHARS: usize = (u8::MAX as usize - 2) / 2;

/// Encodes `text` as a USB string descriptor (header + UTF-16LE code units)
/// into `out`, returning the number of bytes written.
///
/// Returns `None` if `text` has more than [`MAX_STRING_DESC_CHARS`] UTF-16
/// code units, or if `out` is not large enough to hold the result.
pub fn encode_string_descriptor(text: &str, out: &mut [u8]) -> Option<usize> {
    let units = Utf16Iter::new(text);
    let count = units.clone().count();
    if count > MAX_STRING_DESC_CHARS {
        return None;
    }
    let total_len = 2 + count * 2;
    if out.len() < total_len {
        return None;
    }
    out[0] = total_len as u8;
    out[1] = desc_type::STRING;
    for (i, unit) in units.enumerate() {
        let b = unit.to_le_bytes();
        out[2 + i * 2] = b[0];
        out[2 + i * 2 + 1] = b[1];
    }
    Some(total_len)
}

/// Minimal UTF-16 code unit iterator so [`encode_string_descriptor`] does not
/// need `alloc` to build an intermediate buffer of code units.
#[derive(Clone)]
struct Utf16Iter<'a> {
    chars: core::str::Chars<'a>,
    pending_low: Option<u16>,
}

impl<'a> Utf16Iter<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars(),
            pending_low: None,
        }
    }
}

impl<'a> Iterator for Utf16Iter<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if let Some(low) = self.pending_low.take() {
            return Some(low);
        }
        let c = self.chars.next()?;
        let mut buf = [0u16; 2];
        let encoded = c.encode_utf16(&mut buf);
        if encoded.len() == 2 {
            self.pending_low = Some(encoded[1]);
        }
        Some(encoded[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_descriptor_by_type_and_index() {
        let bytes: [u8; 27] = [
            9, desc_type::CONFIGURATION, 0, 0, 1, 1, 0, 0, 0, // config
            9, desc_type::INTERFACE, 0, 0, 1, 0, 0, 0, 0, // interface 0
            9, desc_type::INTERFACE, 1, 0, 1, 0, 0, 0, 0, // interface 1
        ];

        let first = find_descriptor(&bytes, desc_type::INTERFACE, 0).unwrap();
        assert_eq!(first[2], 0);
        let second = find_descriptor(&bytes, desc_type::INTERFACE, 1).unwrap();
        assert_eq!(second[2], 1);
        assert!(find_descriptor(&bytes, desc_type::INTERFACE, 2).is_none());
    }

    #[test]
    fn rejects_malformed_bundle() {
        let bytes = [9u8, desc_type::CONFIGURATION, 0, 0, 1, 1, 0, 0, 0, 5];
        assert!(find_descriptor(&bytes, desc_type::INTERFACE, 0).is_none());
    }

    #[test]
    fn encodes_ascii_string_descriptor() {
        let mut out = [0u8; 32];
        let n = encode_string_descriptor("Hi", &mut out).unwrap();
        assert_eq!(n, 6);
        assert_eq!(out[0], 6);
        assert_eq!(out[1], desc_type::STRING);
        assert_eq!(&out[2..6], &[b'H', 0, b'i', 0]);
    }

    #[test]
    fn rejects_buffer_too_small() {
        let mut out = [0u8; 2];
        assert!(encode_string_descriptor("Hi", &mut out).is_none());
    }
}
