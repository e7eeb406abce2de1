//! The top-level device type: wires the PHY, endpoint table, control engine
//! and class callbacks together behind a single event-driven entry point.

use crate::class_impl::{ClassCallbacks, ClassDescriptors, RequestVerdict};
use crate::control::ControlTransfer;
use crate::deferred::DeferredAction;
use crate::descriptor::lang_id;
use crate::endpoint::{EndpointAddress, EndpointTable};
use crate::error::{Result, UsbError};
use crate::phy::{Phy, PhyEvent};
use crate::setup::SetupPacket;
use crate::state::DeviceState;

/// Default EP0 packet size requested from the PHY during construction.
pub const DEFAULT_EP0_MAX_PACKET: u16 = 64;

/// The device-side USB protocol core.
///
/// Generic over the PHY implementation, the class's behavioral callbacks,
/// and the class's descriptor accessors, so the whole stack monomorphizes
/// down to a single concrete type per firmware image with no dynamic
/// dispatch at the `Phy`/`ClassCallbacks` boundary.
pub struct UsbDevice<P: Phy, C: ClassCallbacks, D: ClassDescriptors> {
    pub(crate) phy: P,
    pub(crate) class: C,
    pub(crate) descriptors: D,

    pub(crate) state: DeviceState,
    pub(crate) suspended: bool,
    pub(crate) configuration: u8,
    /// Ancillary bookkeeping for GET_INTERFACE/SET_INTERFACE, kept outside
    /// `DeviceState` since it is per-selection state, not bus state.
    pub(crate) current_interface: u8,
    pub(crate) current_alternate: u8,

    pub(crate) ep0_max_packet: u16,
    pub(crate) lang_id: u16,

    pub(crate) endpoints: EndpointTable,
    pub(crate) control: ControlTransfer,

    pub(crate) pending_address: Option<u8>,
    pub(crate) pending_configuration: Option<u8>,
    pub(crate) pending_interface: Option<(u8, u8)>,
    pub(crate) pending_abort: bool,
    pub(crate) pending_abort_setup: SetupPacket,

    /// Open only while a `SET_CONFIGURATION` is being processed by the
    /// class (from `callback_set_configuration` until the matching
    /// `complete_set_configuration`); `endpoint_add` is refused outside it.
    pub(crate) endpoint_add_window: bool,

    pub(crate) post_process: Option<DeferredAction>,
}

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDevice<P, C, D> {
    /// The device's current bus state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Whether the bus currently has the device suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The active configuration value, 0 if unconfigured.
    pub fn configuration(&self) -> u8 {
        self.configuration
    }

    /// Single entry point for PHY-raised events, typically called from an
    /// ISR trampoline.
    pub fn on_event(&mut self, event: PhyEvent) {
        self.with_lock(|dev| dev.dispatch_event(event));
    }

    fn dispatch_event(&mut self, event: PhyEvent) {
        match event {
            PhyEvent::Power(on) => self.on_power(on),
            PhyEvent::Suspend(on) => self.on_suspend(on),
            PhyEvent::Sof(frame) => self.class.callback_sof(frame),
            PhyEvent::Reset => self.on_reset(),
            PhyEvent::Ep0Setup => self.on_ep0_setup(),
            PhyEvent::Ep0In => self.on_ep0_in(),
            PhyEvent::Ep0Out => self.on_ep0_out(),
            PhyEvent::In(addr) => self.on_endpoint_in(addr),
            PhyEvent::Out(addr) => self.on_endpoint_out(addr),
        }
    }

    fn on_power(&mut self, present: bool) {
        let next = self.state.on_power(present);
        self.apply_state(next);
    }

    fn on_suspend(&mut self, on: bool) {
        self.suspended = on;
    }

    fn on_reset(&mut self) {
        self.abort_control_transfer();
        self.endpoint_add_window = false;
        self.endpoints.remove_all(&mut self.phy);
        self.current_interface = 0;
        self.current_alternate = 0;
        self.configuration = 0;
        let next = DeviceState::Default;
        self.apply_state(next);
        self.class.callback_reset();
    }

    fn on_endpoint_in(&mut self, raw: u8) {
        let addr = EndpointAddress::from_raw(raw | 0x80);
        self.endpoints.write_finish(addr);
    }

    fn on_endpoint_out(&mut self, raw: u8) {
        let addr = EndpointAddress::from_raw(raw & 0x0F);
        let phy = &self.phy;
        self.endpoints.read_finish(phy, addr);
    }

    /// Applies a state transition, handling the side effects §4.5 requires
    /// (closing the endpoint-add window, aborting control transfers) before
    /// notifying the class.
    pub(crate) fn apply_state(&mut self, next: DeviceState) {
        if self.state == next {
            return;
        }
        if self.state.leaves_configured(next) {
            self.endpoints.remove_all(&mut self.phy);
        }
        if self.state.leaves_default(next) {
            self.abort_control_transfer();
        }
        self.state = next;
        self.class.callback_state_change(next);
    }

    // -- Class-facing resolving halves of the deferred-completion pairs --
    //
    // A `callback_*` call begins a request; the class resolves it later by
    // calling the matching `complete_*` method below. The class does not
    // hold a reference back into `UsbDevice`, so in practice the integrator
    // (whatever task owns both the device and the class's async state)
    // calls `complete_*` once the class signals it is ready — e.g. via a
    // channel or flag the class exposes to its owner. This is the Rust
    // composition-friendly reading of the source's self-referential
    // `this->complete_request(...)` pattern.

    /// Resolves an outstanding `callback_request`.
    pub fn complete_request(&mut self, verdict: RequestVerdict, data: &[u8]) {
        self.with_lock(|dev| {
            if let RequestVerdict::Send(len) = verdict {
                let n = core::cmp::min(
                    len,
                    core::cmp::min(data.len(), crate::control::MAX_CONTROL_DATA),
                );
                dev.control.buf[..n].copy_from_slice(&data[..n]);
            }
            dev.post_process = Some(DeferredAction::CompleteRequest(verdict));
        });
    }

    /// Resolves an outstanding `callback_request_xfer_done`.
    pub fn complete_request_xfer_done(&mut self) {
        self.with_lock(|dev| {
            dev.post_process = Some(DeferredAction::CompleteRequestXferDone);
        });
    }

    /// Resolves an outstanding `callback_set_configuration`.
    pub fn complete_set_configuration(&mut self, ok: bool) {
        self.with_lock(|dev| {
            dev.post_process = Some(DeferredAction::CompleteSetConfiguration(ok));
        });
    }

    /// Resolves an outstanding `callback_set_interface`.
    pub fn complete_set_interface(&mut self, ok: bool) {
        self.with_lock(|dev| {
            dev.post_process = Some(DeferredAction::CompleteSetInterface(ok));
        });
    }

    // -- Endpoint manager passthrough, §4.4 --

    /// Adds and enables a non-control endpoint. Only valid while a
    /// `SET_CONFIGURATION` is being processed; refused otherwise.
    pub fn endpoint_add(
        &mut self,
        addr: EndpointAddress,
        max_packet_size: u16,
        transfer_type: u8,
        callback: Option<alloc::boxed::Box<dyn crate::endpoint::EndpointCallback>>,
    ) -> bool {
        if !self.endpoint_add_window {
            return false;
        }
        self.endpoints
            .add(&mut self.phy, addr, max_packet_size, transfer_type, callback)
    }

    /// Removes (disables) an endpoint.
    pub fn endpoint_remove(&mut self, addr: EndpointAddress) {
        self.endpoints.remove(&mut self.phy, addr);
    }

    /// Halts an endpoint.
    pub fn endpoint_stall(&mut self, addr: EndpointAddress) {
        self.endpoints.stall(&mut self.phy, addr);
    }

    /// Clears an endpoint's halt condition.
    pub fn endpoint_unstall(&mut self, addr: EndpointAddress) {
        self.endpoints.unstall(&mut self.phy, addr);
    }

    /// Issues an OUT read on a non-control endpoint.
    pub fn read_start(&mut self, addr: EndpointAddress, max: usize) -> bool {
        self.endpoints.read_start(&mut self.phy, addr, max)
    }

    /// Issues an IN write on a non-control endpoint.
    pub fn write_start(&mut self, addr: EndpointAddress, buf: &[u8], size: usize) -> bool {
        self.endpoints.write_start(&mut self.phy, addr, buf, size)
    }
}

/// Builder for [`UsbDevice`], collecting the device-identity fields common
/// to virtually every device before handing off to the PHY for EP0
/// negotiation.
pub struct UsbDeviceBuilder<P: Phy, C: ClassCallbacks, D: ClassDescriptors> {
    phy: P,
    class: C,
    descriptors: D,
    ep0_max_packet: u16,
    lang_id: u16,
}

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDeviceBuilder<P, C, D> {
    /// Starts a builder with the required collaborators and USB 2.0/en-US
    /// defaults for everything else.
    pub fn new(phy: P, class: C, descriptors: D) -> Self {
        Self {
            phy,
            class,
            descriptors,
            ep0_max_packet: DEFAULT_EP0_MAX_PACKET,
            lang_id: lang_id::EN_US,
        }
    }

    /// Requests a non-default EP0 packet size ceiling (must be 8, 16, 32 or
    /// 64; the PHY may negotiate down).
    pub fn ep0_max_packet(mut self, size: u16) -> Self {
        self.ep0_max_packet = size;
        self
    }

    /// Overrides the language ID reported by string descriptor 0.
    pub fn lang_id(mut self, id: u16) -> Self {
        self.lang_id = id;
        self
    }

    /// Negotiates EP0's packet size with the PHY and produces a ready
    /// device in the `Attached` state.
    pub fn build(mut self) -> Result<UsbDevice<P, C, D>> {
        let negotiated = self.phy.ep0_set_max_packet(self.ep0_max_packet);
        if !matches!(negotiated, 8 | 16 | 32 | 64) {
            return Err(UsbError::InvalidEp0PacketSize);
        }
        Ok(UsbDevice {
            phy: self.phy,
            class: self.class,
            descriptors: self.descriptors,
            state: DeviceState::Attached,
            suspended: false,
            configuration: 0,
            current_interface: 0,
            current_alternate: 0,
            ep0_max_packet: negotiated,
            lang_id: self.lang_id,
            endpoints: EndpointTable::new(),
            control: ControlTransfer::new(SetupPacket::decode([0u8; 8])),
            pending_address: None,
            pending_configuration: None,
            pending_interface: None,
            pending_abort: false,
            pending_abort_setup: SetupPacket::decode([0u8; 8]),
            endpoint_add_window: false,
            post_process: None,
        })
    }
}
