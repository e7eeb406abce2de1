//! Device-side USB 2.0 protocol stack core for bare-metal microcontrollers.
//!
//! This crate sits between a hardware transceiver (the [`Phy`] trait) and
//! one or more class-level functions (CDC serial, HID, MSC, ...). It
//! enumerates, answers the nine standard control requests, manages
//! endpoints, and drives the device-side USB state machine, while staying
//! agnostic to both the concrete transceiver and the class protocol running
//! on top of it.
//!
//! # Example
//!
//! ```ignore
//! let device = UsbDeviceBuilder::new(my_phy, my_class_callbacks, my_descriptors)
//!     .ep0_max_packet(64)
//!     .build()?;
//!
//! // From an ISR trampoline:
//! device.on_event(PhyEvent::Reset);
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod class_impl;
mod control;
mod deferred;
mod descriptor;
mod device;
mod endpoint;
mod error;
mod lock;
mod phy;
mod request_dispatch;
mod setup;
mod state;

pub use crate::class_impl::{ClassCallbacks, ClassDescriptors, RequestVerdict};
pub use crate::device::{UsbDevice, UsbDeviceBuilder, DEFAULT_EP0_MAX_PACKET};
pub use crate::endpoint::{EndpointAddress, EndpointCallback, MAX_ENDPOINTS};
pub use crate::error::{Result, UsbError};
pub use crate::phy::{Phy, PhyEvent};
pub use crate::setup::{Direction, Recipient, RequestKind, SetupPacket};
pub use crate::state::DeviceState;

pub use crate::descriptor::{
    // Descriptor structures
    ConfigDesc,
    DeviceDesc,
    EndpointDesc,
    HidDesc,
    InterfaceDesc,
    // Functions
    encode_string_descriptor,
    find_descriptor,
    // Constant modules
    class,
    desc_type,
    ep_sync,
    ep_type,
    ep_usage,
    feature,
    hid_protocol,
    hid_subclass,
    lang_id,
    req_dir,
    req_recipient,
    req_type,
    request,
    MAX_STRING_DESC_CHARS,
};

/// Mock `Phy`/`ClassCallbacks`/`ClassDescriptors` implementations for unit
/// and integration tests, in the spirit of `cotton-usb-host`'s `mocks.rs`.
#[cfg(feature = "std")]
pub mod test_support;
