//! In-memory mocks used by this crate's own tests, and exported for class
//! implementations that want to unit test against the core without real
//! hardware.
//!
//! Both mocks share their recorded state through an `Arc<Mutex<_>>` rather
//! than a plain `Rc<RefCell<_>>`: [`crate::phy::Phy`] and
//! [`crate::class_impl::ClassCallbacks`] both require `Send`, so a test keeps an
//! inspectable clone of each mock even after the other half is moved into a
//! [`crate::UsbDeviceBuilder`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::class_impl::{ClassCallbacks, ClassDescriptors};
use crate::setup::SetupPacket;
use crate::state::DeviceState;

/// One entry in a [`TestPhy`]'s transcript, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhyCall {
    /// `connect()` was called.
    Connect,
    /// `disconnect()` was called.
    Disconnect,
    /// `configure()` was called.
    Configure,
    /// `unconfigure()` was called.
    Unconfigure,
    /// `set_address(a)` was called.
    SetAddress(u8),
    /// `ep0_write(buf, n)` was called; `buf` is the slice actually written.
    Ep0Write(Vec<u8>),
    /// `ep0_read(n)` was called.
    Ep0Read(usize),
    /// `ep0_stall()` was called.
    Ep0Stall,
    /// `endpoint_add(addr, max_packet, ty)` was called.
    EndpointAdd(u8, u16, u8),
    /// `endpoint_remove(addr)` was called.
    EndpointRemove(u8),
    /// `endpoint_stall(addr)` was called.
    EndpointStall(u8),
    /// `endpoint_unstall(addr)` was called.
    EndpointUnstall(u8),
    /// `endpoint_abort(addr)` was called.
    EndpointAbort(u8),
    /// `endpoint_write(addr, bytes)` was called.
    EndpointWrite(u8, Vec<u8>),
    /// `endpoint_read(addr, n)` was called.
    EndpointRead(u8, usize),
}

#[derive(Default)]
struct TestPhyState {
    calls: Vec<PhyCall>,
    ep0_max_packet: u16,
    pending_setup: VecDeque<[u8; 8]>,
    pending_ep0_out: VecDeque<Vec<u8>>,
    pending_endpoint_out: std::collections::HashMap<u8, VecDeque<Vec<u8>>>,
    endpoint_read_refusals: std::collections::HashSet<u8>,
    endpoint_write_refusals: std::collections::HashSet<u8>,
}

/// A `Phy` implementation backed by in-memory queues, for black-box tests
/// against [`crate::UsbDevice::on_event`].
///
/// Cloning shares the underlying state, so a test can keep one handle for
/// inspection after moving the other into a [`crate::UsbDeviceBuilder`].
#[derive(Clone)]
pub struct TestPhy {
    state: Arc<Mutex<TestPhyState>>,
}

impl Default for TestPhy {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPhy {
    /// Creates an idle `TestPhy` with no queued data.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TestPhyState::default())),
        }
    }

    /// Queues a setup packet to be returned by the next
    /// `ep0_setup_read_result`.
    pub fn queue_setup(&self, raw: [u8; 8]) {
        self.state.lock().unwrap().pending_setup.push_back(raw);
    }

    /// Queues bytes to be returned by the next `ep0_read_result`.
    pub fn queue_ep0_out(&self, data: &[u8]) {
        self.state.lock().unwrap().pending_ep0_out.push_back(data.to_vec());
    }

    /// Queues bytes to be returned by `endpoint_read_result` for `addr`.
    pub fn queue_endpoint_out(&self, addr: u8, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .pending_endpoint_out
            .entry(addr)
            .or_default()
            .push_back(data.to_vec());
    }

    /// Makes the next `endpoint_read` call on `addr` report refusal (PHY
    /// resource exhaustion), for exercising error paths.
    pub fn refuse_endpoint_read(&self, addr: u8) {
        self.state.lock().unwrap().endpoint_read_refusals.insert(addr);
    }

    /// Makes the next `endpoint_write` call on `addr` report refusal (PHY
    /// resource exhaustion), for exercising error paths.
    pub fn refuse_endpoint_write(&self, addr: u8) {
        self.state.lock().unwrap().endpoint_write_refusals.insert(addr);
    }

    /// Returns the call transcript recorded so far.
    pub fn calls(&self) -> Vec<PhyCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Returns only the bytes written to EP0 across every `Ep0Write` call,
    /// concatenated in order.
    pub fn ep0_written_bytes(&self) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                PhyCall::Ep0Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl crate::phy::Phy for TestPhy {
    fn init(&mut self) {}
    fn deinit(&mut self) {}

    fn connect(&mut self) {
        self.state.lock().unwrap().calls.push(PhyCall::Connect);
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().calls.push(PhyCall::Disconnect);
    }

    fn configure(&mut self) {
        self.state.lock().unwrap().calls.push(PhyCall::Configure);
    }

    fn unconfigure(&mut self) {
        self.state.lock().unwrap().calls.push(PhyCall::Unconfigure);
    }

    fn sof_enable(&mut self) {}
    fn sof_disable(&mut self) {}

    fn set_address(&mut self, address: u8) {
        self.state.lock().unwrap().calls.push(PhyCall::SetAddress(address));
    }

    fn ep0_set_max_packet(&mut self, requested: u16) -> u16 {
        self.state.lock().unwrap().ep0_max_packet = requested;
        requested
    }

    fn ep0_setup_read_result(&mut self, buf: &mut [u8; 8]) {
        if let Some(raw) = self.state.lock().unwrap().pending_setup.pop_front() {
            *buf = raw;
        }
    }

    fn ep0_read(&mut self, n: usize) {
        self.state.lock().unwrap().calls.push(PhyCall::Ep0Read(n));
    }

    fn ep0_read_result(&mut self, buf: &mut [u8]) -> usize {
        let Some(data) = self.state.lock().unwrap().pending_ep0_out.pop_front() else {
            return 0;
        };
        let n = core::cmp::min(data.len(), buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        n
    }

    fn ep0_write(&mut self, buf: &[u8], n: usize) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(PhyCall::Ep0Write(buf[..n].to_vec()));
    }

    fn ep0_stall(&mut self) {
        self.state.lock().unwrap().calls.push(PhyCall::Ep0Stall);
    }

    fn endpoint_add(&mut self, addr: u8, max_packet_size: u16, transfer_type: u8) -> bool {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(PhyCall::EndpointAdd(addr, max_packet_size, transfer_type));
        true
    }

    fn endpoint_remove(&mut self, addr: u8) {
        self.state.lock().unwrap().calls.push(PhyCall::EndpointRemove(addr));
    }

    fn endpoint_stall(&mut self, addr: u8) {
        self.state.lock().unwrap().calls.push(PhyCall::EndpointStall(addr));
    }

    fn endpoint_unstall(&mut self, addr: u8) {
        self.state.lock().unwrap().calls.push(PhyCall::EndpointUnstall(addr));
    }

    fn endpoint_abort(&mut self, addr: u8) {
        self.state.lock().unwrap().calls.push(PhyCall::EndpointAbort(addr));
    }

    fn endpoint_read(&mut self, addr: u8, n: usize) -> bool {
        if self.state.lock().unwrap().endpoint_read_refusals.contains(&addr) {
            return false;
        }
        self.state.lock().unwrap().calls.push(PhyCall::EndpointRead(addr, n));
        true
    }

    fn endpoint_read_result(&self, addr: u8) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        let queue = state.pending_endpoint_out.get_mut(&addr)?;
        queue.pop_front().map(|d| d.len())
    }

    fn endpoint_write(&mut self, addr: u8, buf: &[u8], n: usize) -> bool {
        if self.state.lock().unwrap().endpoint_write_refusals.contains(&addr) {
            return false;
        }
        self.state
            .lock()
            .unwrap()
            .calls
            .push(PhyCall::EndpointWrite(addr, buf[..n].to_vec()));
        true
    }
}

/// One entry in a [`RecordingClass`]'s transcript, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassCall {
    /// `callback_state_change` was invoked.
    StateChange(DeviceState),
    /// `callback_reset` was invoked.
    Reset,
    /// `callback_set_configuration` was invoked.
    SetConfiguration(u8),
    /// `callback_set_interface` was invoked.
    SetInterface(u8, u8),
    /// `callback_request` was invoked.
    Request(SetupPacket),
    /// `callback_request_xfer_done` was invoked.
    RequestXferDone(SetupPacket, Vec<u8>, bool),
}

#[derive(Default)]
struct RecordingClassState {
    calls: Vec<ClassCall>,
}

/// A `ClassCallbacks` + `ClassDescriptors` implementation that logs every
/// callback it receives, for assertion in tests.
///
/// Cloning shares the underlying log, so a test can keep one handle for
/// inspection after moving the other into a [`crate::UsbDeviceBuilder`].
#[derive(Clone)]
pub struct RecordingClass {
    state: Arc<Mutex<RecordingClassState>>,
    device_desc: Arc<Vec<u8>>,
    config_desc: Arc<Vec<u8>>,
    strings: Arc<Vec<(u8, Vec<u8>)>>,
}

impl RecordingClass {
    /// Creates a recorder serving the given device and configuration
    /// descriptor bytes, with no string descriptors.
    pub fn new(device_desc: Vec<u8>, config_desc: Vec<u8>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingClassState::default())),
            device_desc: Arc::new(device_desc),
            config_desc: Arc::new(config_desc),
            strings: Arc::new(Vec::new()),
        }
    }

    /// Builder-style: adds a string descriptor to be served at `index`.
    pub fn with_string(mut self, index: u8, encoded: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.strings).push((index, encoded));
        self
    }

    /// Returns the callback transcript recorded so far.
    pub fn calls(&self) -> Vec<ClassCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Returns the most recent `callback_request` setup packet, if any.
    pub fn last_request(&self) -> Option<SetupPacket> {
        self.state.lock().unwrap().calls.iter().rev().find_map(|c| match c {
            ClassCall::Request(setup) => Some(*setup),
            _ => None,
        })
    }
}

impl ClassCallbacks for RecordingClass {
    fn callback_state_change(&mut self, new_state: DeviceState) {
        self.state.lock().unwrap().calls.push(ClassCall::StateChange(new_state));
    }

    fn callback_reset(&mut self) {
        self.state.lock().unwrap().calls.push(ClassCall::Reset);
    }

    fn callback_set_configuration(&mut self, configuration: u8) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(ClassCall::SetConfiguration(configuration));
    }

    fn callback_set_interface(&mut self, interface: u8, alt: u8) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(ClassCall::SetInterface(interface, alt));
    }

    fn callback_request(&mut self, setup: &SetupPacket) {
        self.state.lock().unwrap().calls.push(ClassCall::Request(*setup));
    }

    fn callback_request_xfer_done(&mut self, setup: &SetupPacket, data: &[u8], aborted: bool) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(ClassCall::RequestXferDone(*setup, data.to_vec(), aborted));
    }
}

impl ClassDescriptors for RecordingClass {
    fn device_descriptor(&self) -> &[u8] {
        &self.device_desc
    }

    fn configuration_descriptor(&self, index: u8) -> Option<&[u8]> {
        if index == 0 {
            Some(&self.config_desc)
        } else {
            None
        }
    }

    fn string_descriptor(&self, index: u8) -> Option<&[u8]> {
        self.strings
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, bytes)| bytes.as_slice())
    }
}
