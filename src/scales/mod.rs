//! Vendor scale implementations and their wire protocols.

pub mod acaia;
pub mod protocol;

pub use acaia::{acaia_plugin, AcaiaScale};

use crate::registry::ScalePluginRegistry;

/// Register every vendor plugin this crate ships. Callers with their own
/// plugins can register those before or after, order decides match priority.
pub fn register_default_plugins(registry: &mut ScalePluginRegistry) {
    registry.register(acaia_plugin());
}
