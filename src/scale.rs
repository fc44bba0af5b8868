//! Scale lifecycle contract shared by every vendor implementation.
//!
//! `RemoteScale` is the polymorphic interface the application programs
//! against; `ScaleCore` carries the state common to all vendors (identity,
//! current weight, weight-change notification, per-instance log sink) so
//! vendor modules only implement their own protocol.

use crate::types::{ConnectionState, DeviceAddress, DiscoveredDevice, WEIGHT_UNSET};
use log::debug;
use std::sync::{Arc, Mutex};

pub type WeightCallback = Box<dyn FnMut(f32) + Send>;

/// Sink for pre-formatted, per-instance-tagged log lines. When no sink is
/// configured the lines are silently discarded (no buffering).
pub type LogSink = Box<dyn Fn(&str) + Send>;

/// When the registered weight callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightCallbackPolicy {
    /// Fire on every decoded reading, including repeats.
    #[default]
    Always,
    /// Fire only when the value differs from the previous one. Exact float
    /// equality, no epsilon.
    OnChange,
}

struct WeightListener {
    callback: Option<WeightCallback>,
    policy: WeightCallbackPolicy,
}

/// State shared between the cooperative tick and transport notification
/// callbacks for one scale instance.
///
/// Cloning yields another handle onto the same instance state; vendor
/// implementations hand a clone to their notification handler. Interior
/// mutexes keep the two mutation contexts from interleaving destructively.
#[derive(Clone)]
pub struct ScaleCore {
    device: DiscoveredDevice,
    weight: Arc<Mutex<f32>>,
    listener: Arc<Mutex<WeightListener>>,
    log_sink: Arc<Mutex<Option<LogSink>>>,
}

impl ScaleCore {
    pub fn new(device: DiscoveredDevice) -> Self {
        Self {
            device,
            weight: Arc::new(Mutex::new(WEIGHT_UNSET)),
            listener: Arc::new(Mutex::new(WeightListener {
                callback: None,
                policy: WeightCallbackPolicy::default(),
            })),
            log_sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn device(&self) -> &DiscoveredDevice {
        &self.device
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }

    pub fn address(&self) -> DeviceAddress {
        self.device.address
    }

    pub fn weight(&self) -> f32 {
        *self.weight.lock().unwrap()
    }

    /// Record a new reading and apply the notification policy.
    ///
    /// The weight lock is released before the callback runs, so a callback
    /// may read the weight back without deadlocking.
    pub fn set_weight(&self, new_weight: f32) {
        let previous = {
            let mut weight = self.weight.lock().unwrap();
            let previous = *weight;
            *weight = new_weight;
            previous
        };

        let mut listener = self.listener.lock().unwrap();
        if listener.policy == WeightCallbackPolicy::OnChange && previous == new_weight {
            return;
        }
        if let Some(callback) = listener.callback.as_mut() {
            callback(new_weight);
        }
    }

    pub fn set_weight_callback(&self, callback: WeightCallback, policy: WeightCallbackPolicy) {
        let mut listener = self.listener.lock().unwrap();
        listener.callback = Some(callback);
        listener.policy = policy;
    }

    pub fn set_log_sink(&self, sink: LogSink) {
        *self.log_sink.lock().unwrap() = Some(sink);
    }

    /// Emit a per-instance-tagged log line: `Scale[<name>] <message>`.
    pub fn log(&self, message: &str) {
        debug!("Scale[{}] {}", self.device.name, message);
        let sink = self.log_sink.lock().unwrap();
        if let Some(sink) = sink.as_ref() {
            sink(&format!("Scale[{}] {}", self.device.name, message));
        }
    }
}

/// Capability set every vendor scale implementation provides.
///
/// `update()` is a cooperative tick the caller invokes periodically; it
/// drives heartbeat and reconnection logic and never blocks waiting for a
/// response. There is no internal thread.
pub trait RemoteScale: Send {
    fn core(&self) -> &ScaleCore;

    /// Short vendor tag, e.g. `"Acaia"`.
    fn brand(&self) -> &'static str;

    fn connection_state(&self) -> ConnectionState;

    /// Establish the vendor session (transport connection + handshake).
    /// Idempotent: returns `true` without re-handshaking when already
    /// connected. A failure leaves the instance disconnected.
    fn connect(&mut self) -> bool;

    /// Release all resources. Safe when not connected, including mid-handshake.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Request a zero-reset. Returns `false` with no side effects when not
    /// connected.
    fn tare(&mut self) -> bool;

    /// Cooperative tick; drives heartbeat and one-shot reconnection.
    fn update(&mut self);

    fn device(&self) -> &DiscoveredDevice {
        self.core().device()
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn address(&self) -> DeviceAddress {
        self.core().address()
    }

    /// Current weight in grams, signed. [`WEIGHT_UNSET`] before any reading.
    fn weight(&self) -> f32 {
        self.core().weight()
    }

    fn set_weight_callback(&self, callback: WeightCallback, policy: WeightCallbackPolicy) {
        self.core().set_weight_callback(callback, policy);
    }

    fn set_log_sink(&self, sink: LogSink) {
        self.core().set_log_sink(sink);
    }
}
