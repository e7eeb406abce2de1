//! The three-stage control transfer engine (Setup → Data → Status) that
//! drives endpoint 0.

use crate::class_impl::{ClassCallbacks, ClassDescriptors, RequestVerdict};
use crate::deferred::DeferredAction;
use crate::device::UsbDevice;
use crate::phy::Phy;
use crate::request_dispatch::DispatchOutcome;
use crate::setup::{Direction, SetupPacket};

/// Upper bound on how many bytes a single control transfer can move through
/// the core's internal buffer. Generous for a microcontroller's composite
/// configuration descriptor bundle and class vendor replies; larger
/// transfers are rejected with a stall rather than silently truncated.
pub(crate) const MAX_CONTROL_DATA: usize = 256;

/// Which side of the data stage a transfer is moving, once a verdict has
/// been resolved. Meaningless during `Stage::Setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferDirection {
    /// Device → host.
    Send,
    /// Host → device.
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Setup,
    DataIn,
    DataOut,
    Status,
}

/// Which class-visible callback, if any, the engine is currently waiting on
/// a `complete_*` resolution for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserCallback {
    None,
    Request,
    RequestXferDone,
    SetConfiguration,
    SetInterface,
}

/// The singleton control-transfer record. Rewritten on every Setup event;
/// there is never more than one in flight.
pub(crate) struct ControlTransfer {
    pub setup: SetupPacket,
    pub stage: Stage,
    pub direction: TransferDirection,
    /// Owned scratch buffer: descriptor bytes, class reply bytes, or
    /// received OUT data, depending on `direction`.
    pub buf: [u8; MAX_CONTROL_DATA],
    pub pos: usize,
    pub len: usize,
    pub zlp: bool,
    pub notify: bool,
    pub user_callback: UserCallback,
}

impl ControlTransfer {
    pub fn new(setup: SetupPacket) -> Self {
        Self {
            setup,
            stage: Stage::Setup,
            direction: TransferDirection::Send,
            buf: [0u8; MAX_CONTROL_DATA],
            pos: 0,
            len: 0,
            zlp: false,
            notify: false,
            user_callback: UserCallback::None,
        }
    }
}

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDevice<P, C, D> {
    /// Entry point for `PhyEvent::Ep0Setup`.
    pub(crate) fn on_ep0_setup(&mut self) {
        let mut raw = [0u8; 8];
        self.phy.ep0_setup_read_result(&mut raw);
        let setup = SetupPacket::decode(raw);

        if self.control.user_callback != UserCallback::None {
            self.flag_stale_transfer();
        }

        self.control = ControlTransfer::new(setup);
        self.control.user_callback = UserCallback::Request;
        self.class.callback_request(&setup);
    }

    /// Entry point for `PhyEvent::Ep0In`.
    pub(crate) fn on_ep0_in(&mut self) {
        match self.control.stage {
            Stage::DataIn => self.continue_data_in(),
            Stage::Status => self.finish_transfer(),
            Stage::Setup | Stage::DataOut => {}
        }
    }

    /// Entry point for `PhyEvent::Ep0Out`.
    pub(crate) fn on_ep0_out(&mut self) {
        match self.control.stage {
            Stage::DataOut => self.continue_data_out(),
            Stage::Status => self.finish_transfer(),
            Stage::Setup | Stage::DataIn => {}
        }
    }

    /// Marks whatever class callback is currently outstanding as stale: when
    /// it eventually resolves, the class is told the transfer was aborted
    /// rather than having its verdict acted on.
    fn flag_stale_transfer(&mut self) {
        self.pending_abort = true;
        self.pending_abort_setup = self.control.setup;
    }

    /// Cancels the in-progress control transfer, e.g. on bus reset. If a
    /// class callback is still outstanding it is allowed to resolve later
    /// (and told `aborted = true`); otherwise the transfer record is reset
    /// and EP0 is stalled immediately.
    pub(crate) fn abort_control_transfer(&mut self) {
        match self.control.user_callback {
            UserCallback::None => {
                if self.control.stage != Stage::Setup {
                    self.phy.ep0_stall();
                }
                self.control.stage = Stage::Setup;
            }
            _ => self.flag_stale_transfer(),
        }
    }

    /// Resolves the class's verdict on the current setup packet (the
    /// deferred half of `callback_request`).
    pub(crate) fn resolve_request(&mut self, verdict: RequestVerdict) {
        if self.take_pending_abort() {
            return;
        }
        match verdict {
            RequestVerdict::Passthrough => match self.dispatch_standard() {
                DispatchOutcome::Reply(len) => self.begin_send(len),
                DispatchOutcome::NoData => self.begin_send(0),
                DispatchOutcome::Stall => self.stall_ep0(),
                DispatchOutcome::Parked => {}
            },
            RequestVerdict::Send(len) => {
                if self.control.setup.direction != Direction::DeviceToHost {
                    self.stall_ep0();
                    return;
                }
                self.control.notify = true;
                self.begin_send(len);
            }
            RequestVerdict::Receive(len) => {
                if self.control.setup.direction != Direction::HostToDevice
                    || len != self.control.setup.length as usize
                {
                    self.stall_ep0();
                    return;
                }
                self.control.notify = true;
                self.begin_receive(len);
            }
            RequestVerdict::Failure => self.stall_ep0(),
        }
    }

    /// If a stale abort is pending for the *current* resolution, consumes it
    /// and notifies the class the transfer it thought it was completing was
    /// aborted. Returns `true` if it did so (caller should not proceed).
    pub(crate) fn take_pending_abort(&mut self) -> bool {
        if !self.pending_abort {
            return false;
        }
        self.pending_abort = false;
        let setup = self.pending_abort_setup;
        self.class.callback_request_xfer_done(&setup, &[], true);
        true
    }

    pub(crate) fn begin_send(&mut self, len: usize) {
        let wlen = self.control.setup.length as usize;
        let capped = core::cmp::min(len, core::cmp::min(wlen, MAX_CONTROL_DATA));
        self.control.len = capped;
        self.control.pos = 0;
        self.control.direction = TransferDirection::Send;
        if wlen == 0 {
            self.control.zlp = false;
            self.control.stage = Stage::Status;
            self.phy.ep0_write(&[], 0);
            return;
        }
        self.control.zlp = capped < wlen && capped % self.ep0_max_packet as usize == 0;
        self.control.stage = Stage::DataIn;
        self.continue_data_in();
    }

    fn begin_receive(&mut self, len: usize) {
        let len = core::cmp::min(len, MAX_CONTROL_DATA);
        self.control.len = len;
        self.control.pos = 0;
        self.control.direction = TransferDirection::Receive;
        if len == 0 {
            self.control.stage = Stage::Status;
            self.phy.ep0_write(&[], 0);
            return;
        }
        self.control.stage = Stage::DataOut;
        let chunk = core::cmp::min(len, self.ep0_max_packet as usize);
        self.phy.ep0_read(chunk);
    }

    fn continue_data_in(&mut self) {
        if self.control.pos < self.control.len {
            let remaining = self.control.len - self.control.pos;
            let chunk = core::cmp::min(remaining, self.ep0_max_packet as usize);
            let start = self.control.pos;
            self.phy.ep0_write(&self.control.buf[start..start + chunk], chunk);
            self.control.pos += chunk;
        } else if self.control.zlp {
            self.control.zlp = false;
            self.phy.ep0_write(&[], 0);
        } else {
            self.start_status();
        }
    }

    fn continue_data_out(&mut self) {
        let mut scratch = [0u8; 64];
        let n = self.phy.ep0_read_result(&mut scratch);
        let start = self.control.pos;
        let copy_len = core::cmp::min(n, self.control.len - start);
        self.control.buf[start..start + copy_len].copy_from_slice(&scratch[..copy_len]);
        self.control.pos += copy_len;

        if self.control.pos < self.control.len {
            let remaining = self.control.len - self.control.pos;
            let chunk = core::cmp::min(remaining, self.ep0_max_packet as usize);
            self.phy.ep0_read(chunk);
        } else {
            self.start_status();
        }
    }

    /// Starts the status stage immediately after the final data packet,
    /// rather than waiting for the next data-stage event (USB 2.0 §8.5.3.2).
    fn start_status(&mut self) {
        self.control.stage = Stage::Status;
        match self.control.direction {
            TransferDirection::Send => self.phy.ep0_read(0),
            TransferDirection::Receive => self.phy.ep0_write(&[], 0),
        }
    }

    pub(crate) fn stall_ep0(&mut self) {
        self.phy.ep0_stall();
        self.control.stage = Stage::Setup;
    }

    fn finish_transfer(&mut self) {
        self.control.stage = Stage::Setup;
        if let Some(addr) = self.pending_address.take() {
            self.phy.set_address(addr);
            let next = self.state.on_set_address(addr);
            self.apply_state(next);
        }
        if !self.control.notify {
            return;
        }
        self.control.user_callback = UserCallback::RequestXferDone;
        let setup = self.control.setup;
        if matches!(self.control.direction, TransferDirection::Receive) {
            let len = self.control.len;
            let data = self.control.buf;
            self.class.callback_request_xfer_done(&setup, &data[..len], false);
        } else {
            self.class.callback_request_xfer_done(&setup, &[], false);
        }
    }

    /// Resolves the class's acknowledgement that a data-stage completion was
    /// observed (the deferred half of `callback_request_xfer_done`).
    pub(crate) fn resolve_request_xfer_done(&mut self) {
        self.control.user_callback = UserCallback::None;
    }
}

impl<P: Phy, C: ClassCallbacks, D: ClassDescriptors> UsbDevice<P, C, D> {
    /// Runs the action scheduled by a `complete_*` call. Called by
    /// [`crate::lock`] once the outermost lock is about to release.
    pub(crate) fn run_deferred(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::CompleteRequest(verdict) => self.resolve_request(verdict),
            DeferredAction::CompleteRequestXferDone => self.resolve_request_xfer_done(),
            DeferredAction::CompleteSetConfiguration(ok) => self.resolve_set_configuration(ok),
            DeferredAction::CompleteSetInterface(ok) => self.resolve_set_interface(ok),
        }
    }
}
