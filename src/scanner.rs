//! BLE advertisement scanner with per-session deduplication.
//!
//! Raw advertisements arrive far faster than unique devices appear (a scale
//! readvertises every ~100ms), so each event is deduplicated against a
//! bounded recency cache *before* any registry matching. Only devices that
//! at least one registered plugin claims are kept in the discovered list.

use crate::cache::{RecencyCache, DEFAULT_CACHE_CAPACITY};
use crate::registry::ScalePluginRegistry;
use crate::transport::{AdvertisementSink, ScaleTransport, ScanParams, TransportError};
use crate::types::{AdvertisementEvent, DeviceAddress, DiscoveredDevice};
use embassy_time::Duration;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Scanner tuning. The interval/window pairs mirror the two historical scan
/// modes (slow passive background scan vs. short active one-shot scan); they
/// are configuration, not semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub cache_capacity: usize,
    pub continuous: ScanParams,
    pub windowed: ScanParams,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            continuous: ScanParams {
                interval_ms: 500,
                window_ms: 100,
                active: false,
            },
            windowed: ScanParams {
                interval_ms: 100,
                window_ms: 99,
                active: true,
            },
        }
    }
}

struct ScanState {
    running: bool,
    seen: RecencyCache<DeviceAddress>,
    discovered: Vec<DiscoveredDevice>,
}

/// Consumes raw advertisements, dedups them and keeps the devices that match
/// a registered vendor plugin.
pub struct ScaleScanner {
    transport: Arc<dyn ScaleTransport>,
    registry: Arc<ScalePluginRegistry>,
    config: ScanConfig,
    state: Arc<Mutex<ScanState>>,
}

impl ScaleScanner {
    pub fn new(transport: Arc<dyn ScaleTransport>, registry: Arc<ScalePluginRegistry>) -> Self {
        Self::with_config(transport, registry, ScanConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn ScaleTransport>,
        registry: Arc<ScalePluginRegistry>,
        config: ScanConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            state: Arc::new(Mutex::new(ScanState {
                running: false,
                seen: RecencyCache::new(config.cache_capacity),
                discovered: Vec::new(),
            })),
            config,
        }
    }

    /// Start (or keep running) the continuous background scan.
    ///
    /// Idempotent: calling while already scanning is a no-op. Starting a
    /// fresh session clears the discovered list and the recency cache, so
    /// every device counts as unseen again.
    pub fn start_continuous(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.running {
                return Ok(());
            }
            state.discovered.clear();
            state.seen.clear();
            state.running = true;
        }

        info!("🔍 Starting continuous scale scan");
        let result = self
            .transport
            .start_continuous_scan(&self.config.continuous, self.advertisement_sink());
        if result.is_err() {
            self.state.lock().unwrap().running = false;
        }
        result
    }

    /// Stop the continuous scan. Idempotent; clears the recency cache so a
    /// later restart treats all devices as unseen.
    pub fn stop(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.running {
                return Ok(());
            }
            state.running = false;
            state.seen.clear();
        }
        self.transport.stop_scan()
    }

    pub fn restart(&self) -> Result<(), TransportError> {
        self.stop()?;
        self.start_continuous()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Devices discovered so far in the current continuous session.
    pub fn discovered(&self) -> Vec<DiscoveredDevice> {
        self.state.lock().unwrap().discovered.clone()
    }

    /// One-shot scan: blocks until `timeout` elapses and returns the
    /// deduplicated, plugin-matched devices heard in that window. Uses its
    /// own recency cache and leaves any continuous session state untouched.
    pub fn scan_once(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let events = self.transport.scan_windowed(timeout, &self.config.windowed)?;

        let mut seen = RecencyCache::new(self.config.cache_capacity);
        let mut discovered = Vec::new();
        for event in events {
            Self::process_advertisement(&self.registry, &mut seen, &mut discovered, event);
        }
        Ok(discovered)
    }

    fn advertisement_sink(&self) -> AdvertisementSink {
        let state = Arc::clone(&self.state);
        let registry = Arc::clone(&self.registry);
        Box::new(move |event| {
            let mut state = state.lock().unwrap();
            if !state.running {
                return;
            }
            let ScanState {
                seen, discovered, ..
            } = &mut *state;
            Self::process_advertisement(&registry, seen, discovered, event);
        })
    }

    /// Dedup first, match second: registry lookups are bounded by unique
    /// addresses instead of raw advertisement volume.
    fn process_advertisement(
        registry: &ScalePluginRegistry,
        seen: &mut RecencyCache<DeviceAddress>,
        discovered: &mut Vec<DiscoveredDevice>,
        event: AdvertisementEvent,
    ) {
        if seen.check_and_update(&event.address) {
            return;
        }
        let device = DiscoveredDevice::from_advertisement(&event);
        if registry.contains_plugin_for(&device) {
            debug!("discovered scale candidate {} [{}]", device.name, device.address);
            discovered.push(device);
        }
    }
}
