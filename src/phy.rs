//! The hardware-facing PHY contract.
//!
//! A `Phy` implementation owns the transceiver registers and is driven
//! exclusively by the core under its own lock, so the trait itself carries
//! no internal synchronization requirement.

/// Events a PHY driver delivers to [`crate::device::UsbDevice::on_event`],
/// typically from an ISR trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyEvent {
    /// Bus voltage present/absent.
    Power(bool),
    /// Host requested bus suspend/resume.
    Suspend(bool),
    /// Start-of-frame, carrying the frame number.
    Sof(u16),
    /// Bus reset signaled by the host.
    Reset,
    /// A new setup packet is available on EP0.
    Ep0Setup,
    /// EP0 IN transfer completed (host accepted a packet).
    Ep0In,
    /// EP0 OUT transfer completed (host delivered a packet).
    Ep0Out,
    /// A non-control endpoint's IN transfer completed.
    In(u8),
    /// A non-control endpoint's OUT transfer completed.
    Out(u8),
}

/// The hardware transceiver interface the core drives.
///
/// Methods return `bool`/`Option<usize>` in place of the historical
/// out-parameter C++ contract. All methods are synchronous: a PHY must not
/// block inside any of them.
pub trait Phy: Send {
    /// Bus lifecycle: prepares the transceiver to start raising events.
    fn init(&mut self);
    /// Bus lifecycle: tears down the transceiver.
    fn deinit(&mut self);

    /// Drives the D+/D- pull-up, making the device visible to the host.
    fn connect(&mut self);
    /// Releases the pull-up.
    fn disconnect(&mut self);

    /// Performs post-SET_CONFIGURATION hardware housekeeping.
    fn configure(&mut self);
    /// Performs pre-SET_CONFIGURATION(0) hardware housekeeping.
    fn unconfigure(&mut self);

    /// Enables start-of-frame interrupts.
    fn sof_enable(&mut self);
    /// Disables start-of-frame interrupts.
    fn sof_disable(&mut self);

    /// Latches the device's USB bus address.
    fn set_address(&mut self, address: u8);

    /// Negotiates EP0's maximum packet size, returning what the hardware
    /// actually supports (must be 8, 16, 32 or 64).
    fn ep0_set_max_packet(&mut self, requested: u16) -> u16;

    /// Copies the most recently received 8-byte setup packet into `buf`.
    fn ep0_setup_read_result(&mut self, buf: &mut [u8; 8]);

    /// Issues a read for up to `n` bytes on EP0's OUT direction.
    fn ep0_read(&mut self, n: usize);
    /// Harvests the result of a prior `ep0_read`, the byte count delivered.
    fn ep0_read_result(&mut self, buf: &mut [u8]) -> usize;
    /// Writes up to `n` bytes from `buf` on EP0's IN direction; `n == 0`
    /// sends a zero-length packet (status stage or explicit ZLP).
    fn ep0_write(&mut self, buf: &[u8], n: usize);
    /// Stalls both directions of EP0.
    fn ep0_stall(&mut self);

    /// Creates a non-control endpoint's hardware resource.
    fn endpoint_add(&mut self, addr: u8, max_packet_size: u16, transfer_type: u8) -> bool;
    /// Destroys a non-control endpoint's hardware resource.
    fn endpoint_remove(&mut self, addr: u8);
    /// Halts a non-control endpoint.
    fn endpoint_stall(&mut self, addr: u8);
    /// Clears a non-control endpoint's halt condition.
    fn endpoint_unstall(&mut self, addr: u8);
    /// Cancels any in-flight transfer on a non-control endpoint.
    fn endpoint_abort(&mut self, addr: u8);

    /// Issues a read on a non-control OUT endpoint.
    fn endpoint_read(&mut self, addr: u8, n: usize) -> bool;
    /// Harvests the result of a prior `endpoint_read`.
    fn endpoint_read_result(&self, addr: u8) -> Option<usize>;
    /// Issues a write on a non-control IN endpoint.
    fn endpoint_write(&mut self, addr: u8, buf: &[u8], n: usize) -> bool;

    /// Drains any interrupts the ISR trampoline deferred to task context.
    fn process(&mut self) {}
}
