//! BLE transport boundary.
//!
//! This crate never drives a radio directly. The traits here describe the
//! scanning and GATT primitives a host platform must supply (NimBLE on
//! ESP-IDF, BlueZ on Linux, a scripted mock in tests). Everything above this
//! boundary is platform independent.

use crate::types::{AdvertisementEvent, DeviceAddress};
use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Callback receiving raw advertisements during a continuous scan.
pub type AdvertisementSink = Box<dyn FnMut(AdvertisementEvent) + Send>;

/// Callback receiving notification payloads for a subscribed characteristic.
///
/// The host environment may invoke this while an `update()` tick for the
/// same scale is executing on another context; implementations on the crate
/// side guard their state accordingly.
pub type NotificationHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Opaque handle to a discovered GATT service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u16);

/// Opaque handle to a discovered GATT characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle(pub u16);

/// Radio timing for a scan. Tunables, not contract: the historical interval
/// and window constants varied between scan modes with no documented
/// rationale, so they are carried as configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    pub interval_ms: u16,
    pub window_ms: u16,
    pub active: bool,
}

#[derive(Debug)]
pub enum TransportError {
    ScanFailed(String),
    ConnectionFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ScanFailed(msg) => write!(f, "scan failed: {}", msg),
            TransportError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Scanning and connection primitives supplied by the host BLE stack.
pub trait ScaleTransport: Send + Sync {
    /// Start an open-ended background scan, feeding every advertisement to
    /// `sink` until `stop_scan` is called.
    fn start_continuous_scan(
        &self,
        params: &ScanParams,
        sink: AdvertisementSink,
    ) -> Result<(), TransportError>;

    fn stop_scan(&self) -> Result<(), TransportError>;

    /// Run a bounded scan, blocking the caller until `timeout` elapses, and
    /// return everything heard. The only deadline-bearing call in this crate.
    fn scan_windowed(
        &self,
        timeout: Duration,
        params: &ScanParams,
    ) -> Result<Vec<AdvertisementEvent>, TransportError>;

    /// Open a GATT connection. Blocks only for the duration of the
    /// transport's own connect timeout.
    fn connect(&self, address: DeviceAddress) -> Result<Box<dyn GattSession>, TransportError>;
}

/// One live GATT connection.
///
/// The session box is owned by the scale instance that opened it, so the
/// connection's lifetime is tied to the instance: dropping it on any exit
/// path (including a failed handshake) releases the link.
pub trait GattSession: Send {
    fn is_connected(&self) -> bool;

    /// Resolve a service by UUID; `None` when the peer does not expose it.
    fn service(&mut self, uuid: Uuid) -> Option<ServiceHandle>;

    /// Resolve a characteristic within a previously resolved service.
    fn characteristic(&mut self, service: ServiceHandle, uuid: Uuid)
        -> Option<CharacteristicHandle>;

    /// Subscribe to notifications, routing payloads to `on_data`.
    fn subscribe(&mut self, characteristic: CharacteristicHandle, on_data: NotificationHandler)
        -> bool;

    fn write(
        &mut self,
        characteristic: CharacteristicHandle,
        payload: &[u8],
        wait_for_response: bool,
    ) -> bool;

    /// Tear the connection down. All characteristic subscriptions become
    /// invalid. Safe to call more than once.
    fn disconnect(&mut self);
}
