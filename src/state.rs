//! The device-side USB bus state machine.

/// Bus-level device state, forming the strict partial order
/// `Attached < Powered < Default < Address < Configured`. `Suspended` is
/// orthogonal to the others and is tracked separately by
/// [`crate::device::UsbDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// No bus power observed yet.
    Attached,
    /// Bus power present, no reset seen yet.
    Powered,
    /// Post-reset, address 0, not yet addressed.
    Default,
    /// Addressed but not configured.
    Address,
    /// Configured and ready for class I/O.
    Configured,
}

impl DeviceState {
    /// Applies a bus-power event.
    pub fn on_power(self, present: bool) -> Self {
        if present {
            if self == DeviceState::Attached {
                DeviceState::Powered
            } else {
                self
            }
        } else {
            DeviceState::Attached
        }
    }

    /// Applies a bus reset: any state collapses to `Default`.
    pub fn on_reset(self) -> Self {
        DeviceState::Default
    }

    /// Applies a successful `SET_ADDRESS`.
    pub fn on_set_address(self, address: u8) -> Self {
        match (self, address) {
            (DeviceState::Default, a) if a != 0 => DeviceState::Address,
            (DeviceState::Address, 0) => DeviceState::Default,
            (s, _) => s,
        }
    }

    /// Applies a successful `SET_CONFIGURATION`.
    pub fn on_set_configuration(self, configuration: u8) -> Self {
        match (self, configuration) {
            (DeviceState::Address, c) if c != 0 => DeviceState::Configured,
            (DeviceState::Configured, 0) => DeviceState::Address,
            (s, _) => s,
        }
    }

    /// True if the endpoint table must be cleared and the endpoint-add
    /// window closed when transitioning from `self` to `next`.
    pub fn leaves_configured(self, next: DeviceState) -> bool {
        self == DeviceState::Configured && next != DeviceState::Configured
    }

    /// True if any in-progress control transfer must be aborted when
    /// transitioning from `self` to `next` (leaving `Default`, including via
    /// reset, or a reset while already past `Default`).
    pub fn leaves_default(self, next: DeviceState) -> bool {
        self >= DeviceState::Default && next == DeviceState::Default && self != next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_always_goes_to_default() {
        assert_eq!(DeviceState::Configured.on_reset(), DeviceState::Default);
        assert_eq!(DeviceState::Attached.on_reset(), DeviceState::Default);
    }

    #[test]
    fn set_address_round_trips_through_default() {
        let s = DeviceState::Default.on_set_address(7);
        assert_eq!(s, DeviceState::Address);
        assert_eq!(s.on_set_address(0), DeviceState::Default);
    }

    #[test]
    fn set_configuration_round_trips_through_address() {
        let s = DeviceState::Address.on_set_configuration(1);
        assert_eq!(s, DeviceState::Configured);
        assert_eq!(s.on_set_configuration(0), DeviceState::Address);
    }

    #[test]
    fn ordering_matches_partial_order() {
        assert!(DeviceState::Attached < DeviceState::Powered);
        assert!(DeviceState::Powered < DeviceState::Default);
        assert!(DeviceState::Default < DeviceState::Address);
        assert!(DeviceState::Address < DeviceState::Configured);
    }
}
