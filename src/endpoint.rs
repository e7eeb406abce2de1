//! Endpoint address arithmetic and the per-device endpoint table.

use crate::phy::Phy;

/// Maximum endpoint number supported by the table (USB allows 0..15).
pub const MAX_ENDPOINTS: usize = 16;

/// Width of the dense, direction-split endpoint table (excludes EP0).
const TABLE_WIDTH: usize = 2 * (MAX_ENDPOINTS - 1);

/// An 8-bit USB endpoint address: bits 0..3 the endpoint number, bit 7 the
/// direction, bits 4..6 reserved/zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    /// Direction bit.
    const DIR_IN: u8 = 0x80;

    /// Builds an address from an endpoint number (0..15) and direction.
    pub const fn new(number: u8, is_in: bool) -> Self {
        let dir = if is_in { Self::DIR_IN } else { 0 };
        Self((number & 0x0F) | dir)
    }

    /// The control endpoint, direction-agnostic (control is bidirectional).
    pub const CONTROL: Self = Self(0);

    /// Wraps a raw endpoint address byte as received on the wire.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw & 0x8F)
    }

    /// Returns the raw wire byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Endpoint number, 0..15.
    pub const fn number(self) -> u8 {
        self.0 & 0x0F
    }

    /// True if this is an IN (device-to-host) endpoint address.
    pub const fn is_in(self) -> bool {
        self.0 & Self::DIR_IN != 0
    }

    /// True if this is the control endpoint (number 0).
    pub const fn is_control(self) -> bool {
        self.number() == 0
    }

    /// Total function mapping a non-control endpoint address to a dense
    /// table index via `((num<<1)|dir)-2`. Returns `None` for the control
    /// endpoint, which has no table slot.
    pub fn index(self) -> Option<usize> {
        if self.is_control() {
            return None;
        }
        let dir_bit = if self.is_in() { 1 } else { 0 };
        let raw = ((self.number() as usize) << 1 | dir_bit).wrapping_sub(2);
        if raw < TABLE_WIDTH {
            Some(raw)
        } else {
            None
        }
    }
}

/// Per-endpoint callback invoked under the core lock when a transfer
/// completes. Receives the endpoint address and, for OUT endpoints, the
/// number of bytes the PHY delivered.
pub trait EndpointCallback: Send {
    /// Called after the PHY reports completion and `pending` has been
    /// decremented.
    fn on_complete(&mut self, addr: EndpointAddress, bytes: usize);
}

bitflags_lite::bitflags! {
    struct EndpointFlags: u8 {
        const ENABLED = 0b01;
        const STALLED = 0b10;
    }
}

/// Internal bitflags helper, hand-rolled to avoid pulling in the `bitflags`
/// crate for two bits.
mod bitflags_lite {
    macro_rules! bitflags {
        ($(#[$meta:meta])* struct $name:ident: $ty:ty { $(const $flag:ident = $val:expr;)* }) => {
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name($ty);

            impl $name {
                $(pub const $flag: $name = $name($val);)*

                pub const fn empty() -> Self {
                    $name(0)
                }

                pub const fn contains(self, other: Self) -> bool {
                    self.0 & other.0 == other.0
                }

                pub fn insert(&mut self, other: Self) {
                    self.0 |= other.0;
                }

                pub fn remove(&mut self, other: Self) {
                    self.0 &= !other.0;
                }
            }
        };
    }
    pub(crate) use bitflags;
}

/// Per-endpoint state record.
pub struct EndpointRecord {
    flags: EndpointFlags,
    max_packet_size: u16,
    pending: u8,
    transfer_size: usize,
    callback: Option<alloc::boxed::Box<dyn EndpointCallback>>,
}

impl Default for EndpointRecord {
    fn default() -> Self {
        Self {
            flags: EndpointFlags::empty(),
            max_packet_size: 0,
            pending: 0,
            transfer_size: 0,
            callback: None,
        }
    }
}

impl EndpointRecord {
    /// True if the endpoint has been added and not yet removed.
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(EndpointFlags::ENABLED)
    }

    /// True if the endpoint is currently halted.
    pub fn is_stalled(&self) -> bool {
        self.flags.contains(EndpointFlags::STALLED)
    }

    /// Negotiated maximum packet size.
    pub fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    /// Number of transfers issued to the PHY that have not yet completed
    /// (0 or 1 for this single-packet-in-flight model).
    pub fn pending(&self) -> u8 {
        self.pending
    }
}

/// Fixed-size table of non-control endpoint records, indexed by
/// [`EndpointAddress::index`].
pub struct EndpointTable {
    records: [EndpointRecord; TABLE_WIDTH],
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointTable {
    /// Creates an empty table (all endpoints disabled).
    pub fn new() -> Self {
        Self {
            records: core::array::from_fn(|_| EndpointRecord::default()),
        }
    }

    fn record(&self, addr: EndpointAddress) -> Option<&EndpointRecord> {
        addr.index().map(|i| &self.records[i])
    }

    fn record_mut(&mut self, addr: EndpointAddress) -> Option<&mut EndpointRecord> {
        addr.index().map(|i| &mut self.records[i])
    }

    /// Returns the record for `addr`, if it names a valid non-control slot.
    pub fn get(&self, addr: EndpointAddress) -> Option<&EndpointRecord> {
        self.record(addr)
    }

    /// Adds (enables) an endpoint, asking `phy` to create the hardware
    /// resource. Fails if the address is control, already enabled, or the
    /// packet size exceeds 1024 bytes, or if the PHY refuses.
    pub fn add(
        &mut self,
        phy: &mut dyn Phy,
        addr: EndpointAddress,
        max_packet_size: u16,
        transfer_type: u8,
        callback: Option<alloc::boxed::Box<dyn EndpointCallback>>,
    ) -> bool {
        if addr.is_control() || max_packet_size > 1024 {
            return false;
        }
        let Some(rec) = self.record_mut(addr) else {
            return false;
        };
        if rec.is_enabled() {
            return false;
        }
        if !phy.endpoint_add(addr.raw(), max_packet_size, transfer_type) {
            return false;
        }
        rec.flags.insert(EndpointFlags::ENABLED);
        rec.max_packet_size = max_packet_size;
        rec.pending = 0;
        rec.callback = callback;
        true
    }

    /// Removes (disables) an endpoint, aborting any pending transfer first.
    pub fn remove(&mut self, phy: &mut dyn Phy, addr: EndpointAddress) {
        if addr.is_control() {
            return;
        }
        phy.endpoint_abort(addr.raw());
        phy.endpoint_remove(addr.raw());
        if let Some(rec) = self.record_mut(addr) {
            *rec = EndpointRecord::default();
        }
    }

    /// Disables every enabled non-control endpoint.
    pub fn remove_all(&mut self, phy: &mut dyn Phy) {
        for i in 0..TABLE_WIDTH {
            if self.records[i].is_enabled() {
                let number = ((i + 2) >> 1) as u8;
                let is_in = (i + 2) & 1 != 0;
                let addr = EndpointAddress::new(number, is_in);
                self.remove(phy, addr);
            }
        }
    }

    /// Halts the endpoint, cancelling any pending transfer.
    pub fn stall(&mut self, phy: &mut dyn Phy, addr: EndpointAddress) {
        phy.endpoint_abort(addr.raw());
        phy.endpoint_stall(addr.raw());
        if let Some(rec) = self.record_mut(addr) {
            rec.flags.insert(EndpointFlags::STALLED);
            rec.pending = 0;
        }
    }

    /// Clears the halt condition. A pending transfer, if any, is cancelled:
    /// the host is expected to re-issue it.
    pub fn unstall(&mut self, phy: &mut dyn Phy, addr: EndpointAddress) {
        phy.endpoint_abort(addr.raw());
        phy.endpoint_unstall(addr.raw());
        if let Some(rec) = self.record_mut(addr) {
            rec.flags.remove(EndpointFlags::STALLED);
            rec.pending = 0;
        }
    }

    /// Asks the PHY to cancel any in-flight transfer and clears `pending`.
    pub fn abort(&mut self, phy: &mut dyn Phy, addr: EndpointAddress) {
        phy.endpoint_abort(addr.raw());
        if let Some(rec) = self.record_mut(addr) {
            rec.pending = 0;
        }
    }

    /// Issues an OUT read. Requires the buffer to be at least `max_packet`
    /// and no transfer already pending.
    pub fn read_start(&mut self, phy: &mut dyn Phy, addr: EndpointAddress, max: usize) -> bool {
        let Some(rec) = self.record_mut(addr) else {
            return false;
        };
        if !rec.is_enabled() || rec.is_stalled() || rec.pending != 0 {
            return false;
        }
        if max < rec.max_packet_size as usize {
            return false;
        }
        if !phy.endpoint_read(addr.raw(), max) {
            return false;
        }
        rec.pending = 1;
        true
    }

    /// Called from the endpoint's OUT-completion dispatch: decrements
    /// `pending` and returns the byte count the PHY reports, invoking the
    /// registered callback if one was supplied.
    pub fn read_finish(&mut self, phy: &dyn Phy, addr: EndpointAddress) -> usize {
        let n = phy.endpoint_read_result(addr.raw()).unwrap_or(0);
        if let Some(rec) = self.record_mut(addr) {
            rec.pending = rec.pending.saturating_sub(1);
            if let Some(cb) = rec.callback.as_mut() {
                cb.on_complete(addr, n);
            }
        }
        n
    }

    /// Issues an IN write. Requires `size <= max_packet` and no transfer
    /// already pending.
    pub fn write_start(
        &mut self,
        phy: &mut dyn Phy,
        addr: EndpointAddress,
        buf: &[u8],
        size: usize,
    ) -> bool {
        let Some(rec) = self.record_mut(addr) else {
            return false;
        };
        if !rec.is_enabled() || rec.is_stalled() || rec.pending != 0 {
            return false;
        }
        if size > rec.max_packet_size as usize {
            return false;
        }
        if !phy.endpoint_write(addr.raw(), buf, size) {
            return false;
        }
        rec.transfer_size = size;
        rec.pending = 1;
        true
    }

    /// Called from the endpoint's IN-completion dispatch: decrements
    /// `pending`, returns the size accepted, and invokes the callback.
    pub fn write_finish(&mut self, addr: EndpointAddress) -> usize {
        let Some(rec) = self.record_mut(addr) else {
            return 0;
        };
        rec.pending = rec.pending.saturating_sub(1);
        let size = rec.transfer_size;
        if let Some(cb) = rec.callback.as_mut() {
            cb.on_complete(addr, size);
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_index_is_bijective_on_valid_addresses() {
        let mut seen = alloc::vec::Vec::new();
        for number in 1..MAX_ENDPOINTS as u8 {
            for is_in in [false, true] {
                let addr = EndpointAddress::new(number, is_in);
                let idx = addr.index().expect("non-control endpoint has an index");
                assert!(!seen.contains(&idx), "duplicate index {idx}");
                seen.push(idx);
            }
        }
        assert_eq!(seen.len(), TABLE_WIDTH);
    }

    #[test]
    fn control_endpoint_has_no_index() {
        assert_eq!(EndpointAddress::CONTROL.index(), None);
    }

    #[test]
    fn number_and_direction_round_trip() {
        let addr = EndpointAddress::new(3, true);
        assert_eq!(addr.number(), 3);
        assert!(addr.is_in());
        assert_eq!(addr.raw(), 0x83);
    }
}
