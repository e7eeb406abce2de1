//! The standard request dispatcher: the nine chapter-9 requests every USB
//! device must answer.

use crate::class_impl::{ClassCallbacks, ClassDescriptors};
use crate::control::{MAX_CONTROL_DATA, UserCallback};
use crate::descriptor::{desc_type, feature, request};
use crate::device::UsbDevice;
use crate::phy::Phy;
use crate::setup::{Recipient, SetupPacket};
use crate::state::DeviceState;

/// What the standard dispatcher decided to do with a request.
pub(crate) enum DispatchOutcome {
    /// Send the first `len` bytes of `control.buf` as the IN data stage.
    Reply(usize),
    /// Succeed with no data stage (status only).
    NoData,
    /// Reject the request; stall EP0.
    Stall,
    /// A class callback was started (`SET_CONFIGURATION`/`SET_INTERFACE`);
    /// the transfer stays parked until it resolves.
    Parked,
}

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDevice<P, C, D> {
    /// Dispatches the current control transfer's setup packet as a standard
    /// request. Only called when the class returned `Passthrough`.
    pub(crate) fn dispatch_standard(&mut self) -> DispatchOutcome {
        let setup = self.control.setup;
        match setup.request {
            request::GET_STATUS => self.handle_get_status(&setup),
            request::CLEAR_FEATURE => self.handle_feature(&setup, false),
            request::SET_FEATURE => self.handle_feature(&setup, true),
            request::SET_ADDRESS => self.handle_set_address(&setup),
            request::GET_DESCRIPTOR => self.handle_get_descriptor(&setup),
            request::SET_DESCRIPTOR => DispatchOutcome::Stall,
            request::GET_CONFIGURATION => self.handle_get_configuration(),
            request::SET_CONFIGURATION => self.handle_set_configuration(&setup),
            request::GET_INTERFACE => self.handle_get_interface(&setup),
            request::SET_INTERFACE => self.handle_set_interface(&setup),
            _ => DispatchOutcome::Stall,
        }
    }

    fn handle_get_status(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        if self.state != DeviceState::Configured && setup.index_low() != 0 {
            return DispatchOutcome::Stall;
        }
        let status: u16 = match setup.recipient {
            Recipient::Device => 0x0001, // Self-Powered bit set; remote wakeup unsupported
            Recipient::Interface => 0x0000,
            Recipient::Endpoint => {
                let addr = crate::endpoint::EndpointAddress::from_raw(setup.index_low());
                if addr.is_control() {
                    0x0000
                } else {
                    match self.endpoints.get(addr) {
                        Some(ep) if ep.is_stalled() => 0x0001,
                        Some(_) => 0x0000,
                        None => return DispatchOutcome::Stall,
                    }
                }
            }
            Recipient::Other => return DispatchOutcome::Stall,
        };
        self.control.buf[0..2].copy_from_slice(&status.to_le_bytes());
        DispatchOutcome::Reply(2)
    }

    fn handle_feature(&mut self, setup: &SetupPacket, set: bool) -> DispatchOutcome {
        if self.state != DeviceState::Configured && setup.index_low() != 0 {
            return DispatchOutcome::Stall;
        }
        if setup.recipient != Recipient::Endpoint {
            // Device remote wakeup is reserved and always refused; interface
            // recipients have no standard features.
            return DispatchOutcome::Stall;
        }
        if setup.value != feature::ENDPOINT_HALT {
            return DispatchOutcome::Stall;
        }
        let addr = crate::endpoint::EndpointAddress::from_raw(setup.index_low());
        if addr.is_control() {
            return DispatchOutcome::Stall;
        }
        if set {
            self.endpoints.stall(&mut self.phy, addr);
        } else {
            self.endpoints.unstall(&mut self.phy, addr);
        }
        DispatchOutcome::NoData
    }

    fn handle_set_address(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        if setup.value > 127 {
            return DispatchOutcome::Stall;
        }
        // Deviates from the distilled mbed-os source, which latches the
        // address immediately: USB 2.0 §9.4.6 requires it to take effect
        // only after the status stage completes.
        self.pending_address = Some(setup.value as u8);
        DispatchOutcome::NoData
    }

    fn handle_get_descriptor(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        let ty = setup.value_high();
        let index = setup.value_low();
        match ty {
            desc_type::DEVICE => {
                let bytes = self.descriptors.device_descriptor();
                Self::copy_into_control_buf(&mut self.control, bytes)
            }
            desc_type::CONFIGURATION => match self.descriptors.configuration_descriptor(index) {
                Some(bytes) => Self::copy_into_control_buf(&mut self.control, bytes),
                None => DispatchOutcome::Stall,
            },
            desc_type::STRING => {
                if index == 0 {
                    let lang = self.lang_id.to_le_bytes();
                    let reply = [4u8, desc_type::STRING, lang[0], lang[1]];
                    self.control.buf[..4].copy_from_slice(&reply);
                    DispatchOutcome::Reply(4)
                } else {
                    match self.descriptors.string_descriptor(index) {
                        Some(bytes) => Self::copy_into_control_buf(&mut self.control, bytes),
                        None => DispatchOutcome::Stall,
                    }
                }
            }
            // Interface and endpoint descriptors are not directly readable;
            // they only exist nested inside a configuration descriptor.
            _ => DispatchOutcome::Stall,
        }
    }

    fn copy_into_control_buf(
        control: &mut crate::control::ControlTransfer,
        bytes: &[u8],
    ) -> DispatchOutcome {
        let n = core::cmp::min(bytes.len(), MAX_CONTROL_DATA);
        control.buf[..n].copy_from_slice(&bytes[..n]);
        DispatchOutcome::Reply(n)
    }

    fn handle_get_configuration(&mut self) -> DispatchOutcome {
        self.control.buf[0] = self.configuration;
        DispatchOutcome::Reply(1)
    }

    fn handle_set_configuration(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        let n = setup.value_low();
        self.pending_configuration = Some(n);
        self.control.user_callback = UserCallback::SetConfiguration;
        self.endpoint_add_window = true;
        self.class.callback_set_configuration(n);
        DispatchOutcome::Parked
    }

    fn handle_get_interface(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        if self.state != DeviceState::Configured {
            return DispatchOutcome::Stall;
        }
        if setup.index_low() != self.current_interface {
            return DispatchOutcome::Stall;
        }
        self.control.buf[0] = self.current_alternate;
        DispatchOutcome::Reply(1)
    }

    fn handle_set_interface(&mut self, setup: &SetupPacket) -> DispatchOutcome {
        let iface = setup.index_low();
        let alt = setup.value_low();
        self.pending_interface = Some((iface, alt));
        self.control.user_callback = UserCallback::SetInterface;
        self.class.callback_set_interface(iface, alt);
        DispatchOutcome::Parked
    }

    pub(crate) fn resolve_set_configuration(&mut self, ok: bool) {
        self.control.user_callback = UserCallback::None;
        self.endpoint_add_window = false;
        let n = self.pending_configuration.take();
        if self.take_pending_abort() {
            return;
        }
        let Some(n) = n else {
            return;
        };
        if ok {
            if n == 0 {
                self.endpoints.remove_all(&mut self.phy);
                self.phy.unconfigure();
            } else {
                self.phy.configure();
            }
            self.configuration = n;
            let next = self.state.on_set_configuration(n);
            self.apply_state(next);
            self.begin_send(0);
        } else {
            self.stall_ep0();
        }
    }

    pub(crate) fn resolve_set_interface(&mut self, ok: bool) {
        self.control.user_callback = UserCallback::None;
        let pending = self.pending_interface.take();
        if self.take_pending_abort() {
            return;
        }
        let Some((iface, alt)) = pending else {
            return;
        };
        if ok {
            self.current_interface = iface;
            self.current_alternate = alt;
            self.begin_send(0);
        } else {
            self.stall_ep0();
        }
    }
}
