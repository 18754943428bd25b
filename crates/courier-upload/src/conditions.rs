//! Host signals that pause uploading.
//!
//! The scheduler asks [`HostConditions::uploads_discouraged`] before every
//! tick. While it answers `true` nothing is read or sent; data stays queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub trait HostConditions: Send + Sync {
    fn uploads_discouraged(&self) -> bool;
}

/// Never discourages uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllowed;

impl HostConditions for AlwaysAllowed {
    fn uploads_discouraged(&self) -> bool {
        false
    }
}

/// Push-style signal: the host flips the flag, the scheduler reads it.
#[derive(Debug, Clone, Default)]
pub struct SignalFlag {
    discouraged: Arc<AtomicBool>,
}

impl SignalFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_discouraged(&self, discouraged: bool) {
        self.discouraged.store(discouraged, Ordering::SeqCst);
    }
}

impl HostConditions for SignalFlag {
    fn uploads_discouraged(&self) -> bool {
        self.discouraged.load(Ordering::SeqCst)
    }
}

/// Device state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Percent, 0 to 100. `None` when the device has no battery.
    pub battery_level: Option<u8>,
    pub charging: bool,
    pub low_power_mode: bool,
    pub network_reachable: bool,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            battery_level: None,
            charging: false,
            low_power_mode: false,
            network_reachable: true,
        }
    }
}

/// Source of [`DeviceStatus`] snapshots.
pub trait DeviceStatusProvider: Send + Sync {
    fn current(&self) -> DeviceStatus;
}

/// Pull-style conditions evaluated from device status snapshots.
pub struct DeviceConditions<P> {
    provider: P,
    min_battery_level: u8,
}

impl<P: DeviceStatusProvider> DeviceConditions<P> {
    pub const DEFAULT_MIN_BATTERY_LEVEL: u8 = 10;

    pub fn new(provider: P) -> Self {
        Self {
            provider,
            min_battery_level: Self::DEFAULT_MIN_BATTERY_LEVEL,
        }
    }

    pub fn with_min_battery_level(mut self, percent: u8) -> Self {
        self.min_battery_level = percent;
        self
    }

    /// Battery above the floor or charging, not in low power mode, and a
    /// network route exists.
    pub fn allows(&self, status: &DeviceStatus) -> bool {
        let battery_ok = status.charging
            || status
                .battery_level
                .map_or(true, |level| level > self.min_battery_level);
        battery_ok && !status.low_power_mode && status.network_reachable
    }
}

impl<P: DeviceStatusProvider> HostConditions for DeviceConditions<P> {
    fn uploads_discouraged(&self) -> bool {
        let status = self.provider.current();
        let allowed = self.allows(&status);
        if !allowed {
            trace!(?status, "device conditions discourage upload");
        }
        !allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(DeviceStatus);

    impl DeviceStatusProvider for Fixed {
        fn current(&self) -> DeviceStatus {
            self.0.clone()
        }
    }

    fn discouraged(status: DeviceStatus) -> bool {
        DeviceConditions::new(Fixed(status)).uploads_discouraged()
    }

    #[test]
    fn test_healthy_device_allows() {
        assert!(!discouraged(DeviceStatus {
            battery_level: Some(80),
            ..DeviceStatus::default()
        }));
        assert!(!discouraged(DeviceStatus::default()));
    }

    #[test]
    fn test_low_battery_discourages_unless_charging() {
        let low = DeviceStatus {
            battery_level: Some(10),
            ..DeviceStatus::default()
        };
        assert!(discouraged(low.clone()));
        assert!(!discouraged(DeviceStatus {
            charging: true,
            ..low
        }));
        assert!(!discouraged(DeviceStatus {
            battery_level: Some(11),
            ..DeviceStatus::default()
        }));
    }

    #[test]
    fn test_low_power_mode_discourages() {
        assert!(discouraged(DeviceStatus {
            low_power_mode: true,
            charging: true,
            ..DeviceStatus::default()
        }));
    }

    #[test]
    fn test_unreachable_network_discourages() {
        assert!(discouraged(DeviceStatus {
            network_reachable: false,
            ..DeviceStatus::default()
        }));
    }

    #[test]
    fn test_custom_battery_floor() {
        let conditions = DeviceConditions::new(Fixed(DeviceStatus {
            battery_level: Some(25),
            ..DeviceStatus::default()
        }))
        .with_min_battery_level(30);
        assert!(conditions.uploads_discouraged());
    }

    #[test]
    fn test_signal_flag_clones_share_state() {
        let flag = SignalFlag::new();
        let handle = flag.clone();
        assert!(!flag.uploads_discouraged());
        handle.set_discouraged(true);
        assert!(flag.uploads_discouraged());
        assert!(!AlwaysAllowed.uploads_discouraged());
    }
}
