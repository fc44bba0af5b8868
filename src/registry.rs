//! Vendor plugin registry and scale factory.
//!
//! A plugin pairs a match predicate ("is this advertised device mine?") with
//! a factory for the vendor's scale implementation, so discovery and vendor
//! protocols stay decoupled. The registry is an explicitly constructed
//! object owned by the application's composition root and shared by
//! reference — there is no hidden global instance, which also lets tests
//! build isolated registries.

use crate::scale::RemoteScale;
use crate::transport::ScaleTransport;
use crate::types::DiscoveredDevice;
use log::{debug, info};
use std::fmt;
use std::sync::Arc;

pub type MatchFn = Box<dyn Fn(&DiscoveredDevice) -> bool + Send + Sync>;
pub type InitFn =
    Box<dyn Fn(DiscoveredDevice, Arc<dyn ScaleTransport>) -> Box<dyn RemoteScale> + Send + Sync>;

/// One vendor integration: a unique id, a match predicate and a factory.
pub struct ScalePlugin {
    pub id: &'static str,
    pub handles: MatchFn,
    pub initialise: InitFn,
}

impl fmt::Debug for ScalePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalePlugin").field("id", &self.id).finish()
    }
}

/// Registry of vendor plugins, matched in registration order.
#[derive(Default)]
pub struct ScalePluginRegistry {
    plugins: Vec<ScalePlugin>,
}

impl ScalePluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. First registration wins: a second plugin with an
    /// already-used id is ignored, so retries are harmless.
    pub fn register(&mut self, plugin: ScalePlugin) {
        if self.plugins.iter().any(|existing| existing.id == plugin.id) {
            debug!("plugin {} already registered, ignoring", plugin.id);
            return;
        }
        info!("Registered scale plugin: {}", plugin.id);
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Does any registered plugin claim this device?
    pub fn contains_plugin_for(&self, device: &DiscoveredDevice) -> bool {
        self.plugins.iter().any(|plugin| (plugin.handles)(device))
    }

    /// Instantiate the scale for the **first** plugin (in registration
    /// order) whose predicate accepts the device, so behavior stays
    /// reproducible when predicates overlap (e.g. name prefixes).
    pub fn initialise(
        &self,
        device: &DiscoveredDevice,
        transport: Arc<dyn ScaleTransport>,
    ) -> Option<Box<dyn RemoteScale>> {
        self.plugins
            .iter()
            .find(|plugin| (plugin.handles)(device))
            .map(|plugin| (plugin.initialise)(device.clone(), transport))
    }
}

/// Creates scale instances for discovered devices, handing each one the
/// shared transport so its connection lifetime stays scoped to the instance.
pub struct ScaleFactory {
    registry: Arc<ScalePluginRegistry>,
    transport: Arc<dyn ScaleTransport>,
}

impl ScaleFactory {
    pub fn new(registry: Arc<ScalePluginRegistry>, transport: Arc<dyn ScaleTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// `None` when no registered plugin matches the device.
    pub fn create(&self, device: &DiscoveredDevice) -> Option<Box<dyn RemoteScale>> {
        self.registry
            .initialise(device, Arc::clone(&self.transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ScaleCore;
    use crate::test_utils::MockTransport;
    use crate::types::{ConnectionState, DeviceAddress};

    struct TestScale {
        core: ScaleCore,
        tag: &'static str,
    }

    impl RemoteScale for TestScale {
        fn core(&self) -> &ScaleCore {
            &self.core
        }
        fn brand(&self) -> &'static str {
            self.tag
        }
        fn connection_state(&self) -> ConnectionState {
            ConnectionState::Disconnected
        }
        fn connect(&mut self) -> bool {
            false
        }
        fn disconnect(&mut self) {}
        fn is_connected(&self) -> bool {
            false
        }
        fn tare(&mut self) -> bool {
            false
        }
        fn update(&mut self) {}
    }

    fn prefix_plugin(id: &'static str, prefix: &'static str) -> ScalePlugin {
        ScalePlugin {
            id,
            handles: Box::new(move |device| device.name.starts_with(prefix)),
            initialise: Box::new(move |device, _transport| {
                Box::new(TestScale {
                    core: ScaleCore::new(device),
                    tag: id,
                })
            }),
        }
    }

    fn named_device(name: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            name: name.to_string(),
            address: DeviceAddress([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]),
            manufacturer_data: Vec::new(),
        }
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let mut registry = ScalePluginRegistry::new();
        registry.register(prefix_plugin("plugin-a", "ACAIA"));
        registry.register(prefix_plugin("plugin-a", "SOMETHING_ELSE"));
        assert_eq!(registry.len(), 1);

        // Behavior matches a single registration: the first predicate wins.
        assert!(registry.contains_plugin_for(&named_device("ACAIA-1234")));
        assert!(!registry.contains_plugin_for(&named_device("SOMETHING_ELSE")));
    }

    #[test]
    fn test_match_order_equals_registration_order() {
        let transport = Arc::new(MockTransport::new());
        let mut registry = ScalePluginRegistry::new();
        // Both prefixes match "ACAIA-1234"; registration order decides.
        registry.register(prefix_plugin("plugin-long", "ACAIA"));
        registry.register(prefix_plugin("plugin-short", "ACA"));

        let scale = registry
            .initialise(&named_device("ACAIA-1234"), transport)
            .expect("device should match");
        assert_eq!(scale.brand(), "plugin-long");
    }

    #[test]
    fn test_no_match_yields_none() {
        let transport: Arc<MockTransport> = Arc::new(MockTransport::new());
        let registry = {
            let mut registry = ScalePluginRegistry::new();
            registry.register(prefix_plugin("plugin-a", "ACAIA"));
            registry
        };
        let factory = ScaleFactory::new(Arc::new(registry), transport);
        assert!(factory.create(&named_device("BOOKOO_SC")).is_none());
    }

    #[test]
    fn test_factory_creates_for_match() {
        let transport: Arc<MockTransport> = Arc::new(MockTransport::new());
        let mut registry = ScalePluginRegistry::new();
        registry.register(prefix_plugin("plugin-a", "PYXIS"));
        let factory = ScaleFactory::new(Arc::new(registry), transport);

        let scale = factory.create(&named_device("PYXIS-7")).expect("match");
        assert_eq!(scale.name(), "PYXIS-7");
    }
}
