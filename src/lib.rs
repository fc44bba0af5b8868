//! Discovery and streaming client for BLE smart scales.
//!
//! The crate splits into a platform-independent core and a thin transport
//! boundary:
//!
//! - [`transport`] — the scanning/GATT traits a host BLE stack implements
//! - [`scanner`] — continuous and one-shot discovery with dedup + filtering
//! - [`registry`] — vendor plugin registry and scale factory
//! - [`scale`] — the lifecycle contract every vendor implementation fulfils
//! - [`scales`] — vendor implementations (currently the Acaia family)
//!
//! A typical composition root registers the default plugins, starts a scan,
//! and creates a scale instance for a discovered device:
//!
//! ```no_run
//! use remote_scales::registry::{ScaleFactory, ScalePluginRegistry};
//! use remote_scales::scales::register_default_plugins;
//! # fn transport() -> std::sync::Arc<dyn remote_scales::transport::ScaleTransport> { unimplemented!() }
//!
//! let mut registry = ScalePluginRegistry::new();
//! register_default_plugins(&mut registry);
//! let factory = ScaleFactory::new(std::sync::Arc::new(registry), transport());
//! ```

pub mod cache;
pub mod registry;
pub mod scale;
pub mod scales;
pub mod scanner;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use registry::{ScaleFactory, ScalePlugin, ScalePluginRegistry};
pub use scale::{RemoteScale, WeightCallback, WeightCallbackPolicy};
pub use scanner::{ScaleScanner, ScanConfig};
pub use types::{
    AdvertisementEvent, ConnectionState, DeviceAddress, DiscoveredDevice, WeightUnit, WEIGHT_UNSET,
};
