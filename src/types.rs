use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLE device address stored as a compact 6-byte array.
///
/// Cheap to copy and hash, and independent of whichever Bluetooth stack the
/// host platform links in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub [u8; 6]);

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// One raw advertisement as delivered by the transport during a scan.
///
/// A single device typically re-advertises every ~100ms, so the scanner sees
/// many of these per unique device.
#[derive(Debug, Clone)]
pub struct AdvertisementEvent {
    pub name: Option<String>,
    pub address: DeviceAddress,
    pub manufacturer_data: Vec<u8>,
    pub rssi: i8,
}

/// An advertised device that matched at least one registered vendor plugin.
///
/// Immutable once built from an advertisement; owns no transport resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: DeviceAddress,
    pub manufacturer_data: Vec<u8>,
}

impl DiscoveredDevice {
    pub fn from_advertisement(event: &AdvertisementEvent) -> Self {
        Self {
            name: event.name.clone().unwrap_or_default(),
            address: event.address,
            manufacturer_data: event.manufacturer_data.clone(),
        }
    }
}

/// Unit of measure reported by the scale's status frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnit {
    Grams,
    Ounces,
    Unrecognized,
}

/// Connection lifecycle of a scale instance.
///
/// `ReconnectPending` is reported while an active session has been flagged
/// for teardown by an advisory frame; the next `update()` tick performs the
/// single reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Active,
    ReconnectPending,
}

/// Weight reported before the first decoded reading arrives.
///
/// Deliberately far outside the range of any real scale so applications can
/// tell "no reading yet" apart from an actual measurement.
pub const WEIGHT_UNSET: f32 = -3000.0;
