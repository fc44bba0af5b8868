//! Acaia smart scale client (Lunar / Pyxis / Prochef family).
//!
//! Implements the scale lifecycle contract on top of the frame codec in
//! [`super::protocol`]: connect + handshake, steady-state heartbeat from the
//! cooperative tick, passive decoding of notification data, and a one-shot
//! reconnect when the scale reports a desynchronized session.

use crate::registry::ScalePlugin;
use crate::scale::{RemoteScale, ScaleCore};
use crate::scales::protocol::{encode_event, encode_message, FrameDecoder, MessageType, ScaleEvent};
use crate::transport::{CharacteristicHandle, GattSession, NotificationHandler, ScaleTransport};
use crate::types::{ConnectionState, DiscoveredDevice, WeightUnit};
use embassy_time::{Duration, Instant};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);
pub const WEIGHT_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x49535343_1e4d_4bd9_ba61_23c647249616);
pub const COMMAND_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x49535343_8841_43f4_a8d4_ecbe34729bb3);

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(2000);

const IDENTIFY_PAYLOAD: [u8; 15] = [0x2D; 15];
const NOTIFICATION_REQUEST_PAYLOAD: [u8; 8] = [0, 1, 1, 2, 2, 5, 3, 4];

/// Inbound protocol state shared with the notification callback. Guarded by
/// one mutex so a callback firing mid-`update()` cannot interleave with the
/// tick destructively.
#[derive(Default)]
struct Inbound {
    decoder: FrameDecoder,
    battery: Option<u8>,
    unit: Option<WeightUnit>,
}

pub struct AcaiaScale {
    core: ScaleCore,
    transport: Arc<dyn ScaleTransport>,
    session: Option<Box<dyn GattSession>>,
    weight_characteristic: Option<CharacteristicHandle>,
    command_characteristic: Option<CharacteristicHandle>,
    state: ConnectionState,
    reconnect_pending: Arc<AtomicBool>,
    inbound: Arc<Mutex<Inbound>>,
    heartbeat_interval: Duration,
    last_heartbeat: Instant,
}

impl AcaiaScale {
    pub fn new(device: DiscoveredDevice, transport: Arc<dyn ScaleTransport>) -> Self {
        Self {
            core: ScaleCore::new(device),
            transport,
            session: None,
            weight_characteristic: None,
            command_characteristic: None,
            state: ConnectionState::Disconnected,
            reconnect_pending: Arc::new(AtomicBool::new(false)),
            inbound: Arc::new(Mutex::new(Inbound::default())),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            last_heartbeat: Instant::now(),
        }
    }

    /// Battery percentage from the last status frame, if any arrived yet.
    pub fn battery(&self) -> Option<u8> {
        self.inbound.lock().unwrap().battery
    }

    /// Unit of measure from the last status frame, if any arrived yet.
    pub fn weight_unit(&self) -> Option<WeightUnit> {
        self.inbound.lock().unwrap().unit
    }

    /// Heartbeat cadence is a tunable, not a protocol constant.
    pub fn set_heartbeat_interval(&mut self, interval: Duration) {
        self.heartbeat_interval = interval;
    }

    fn perform_handshake(&mut self) -> bool {
        self.state = ConnectionState::Handshaking;
        self.core.log("performing handshake");

        let weight_handler = self.notification_handler();
        let command_handler = self.notification_handler();
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return false,
        };

        let service = match session.service(SERVICE_UUID) {
            Some(service) => service,
            None => {
                self.core.log("scale service not found");
                return false;
            }
        };

        let weight = session.characteristic(service, WEIGHT_CHARACTERISTIC_UUID);
        let command = session.characteristic(service, COMMAND_CHARACTERISTIC_UUID);
        let (weight, command) = match (weight, command) {
            (Some(weight), Some(command)) => (weight, command),
            _ => {
                self.core.log("weight or command characteristic not found");
                return false;
            }
        };

        if !session.subscribe(weight, weight_handler)
            || !session.subscribe(command, command_handler)
        {
            self.core.log("notification subscription failed");
            return false;
        }
        self.weight_characteristic = Some(weight);
        self.command_characteristic = Some(command);

        // Identification exchange: the scale only starts streaming weight
        // events after an identify frame and a notification request.
        if !self.send_message(MessageType::Identify, &IDENTIFY_PAYLOAD) {
            self.core.log("failed to send identify frame");
            return false;
        }
        self.send_notification_request();
        true
    }

    fn notification_handler(&self) -> NotificationHandler {
        let core = self.core.clone();
        let inbound = Arc::clone(&self.inbound);
        let reconnect_pending = Arc::clone(&self.reconnect_pending);
        Box::new(move |data| {
            let events = {
                let mut inbound = inbound.lock().unwrap();
                let events = inbound.decoder.feed(data);
                for event in &events {
                    if let ScaleEvent::Status { battery, unit } = event {
                        inbound.battery = Some(*battery);
                        inbound.unit = Some(*unit);
                    }
                }
                events
            };

            // Weight and log callbacks run outside the inbound lock.
            for event in events {
                match event {
                    ScaleEvent::Weight(weight) => core.set_weight(weight),
                    ScaleEvent::SessionDesync => {
                        core.log("scale session desynchronized, scheduling reconnect");
                        reconnect_pending.store(true, Ordering::SeqCst);
                    }
                    ScaleEvent::Battery(level) => debug!("battery event: {}%", level),
                    ScaleEvent::Timer(seconds) => debug!("timer event: {:.1}s", seconds),
                    ScaleEvent::Key(key) => debug!("key event: {:02X}", key),
                    ScaleEvent::Status { .. } | ScaleEvent::Unrecognized(_) => {}
                }
            }
        })
    }

    fn send_message(&mut self, msg_type: MessageType, payload: &[u8]) -> bool {
        let characteristic = match self.command_characteristic {
            Some(characteristic) => characteristic,
            None => return false,
        };
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return false,
        };
        let frame = encode_message(msg_type, payload);
        session.write(characteristic, &frame, false)
    }

    fn send_event(&mut self, payload: &[u8]) -> bool {
        let characteristic = match self.command_characteristic {
            Some(characteristic) => characteristic,
            None => return false,
        };
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return false,
        };
        let frame = encode_event(payload);
        session.write(characteristic, &frame, false)
    }

    fn send_notification_request(&mut self) -> bool {
        self.send_event(&NOTIFICATION_REQUEST_PAYLOAD)
    }

    /// Steady-state keep-alive: a status request, a repeated notification
    /// request and a keep-alive frame, fire and forget.
    fn send_heartbeat(&mut self) {
        if !self.is_connected() {
            return;
        }
        if self.last_heartbeat.elapsed() < self.heartbeat_interval {
            return;
        }
        self.send_message(MessageType::System, &[0x02, 0x00]);
        self.send_notification_request();
        self.send_message(MessageType::Handshake, &[0x00]);
        self.last_heartbeat = Instant::now();
    }

    /// Release the session and every handle derived from it. Safe on any
    /// exit path, including a half-finished handshake.
    fn cleanup_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if session.is_connected() {
                self.core.log("disconnecting from device");
            }
            session.disconnect();
        }
        self.weight_characteristic = None;
        self.command_characteristic = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl RemoteScale for AcaiaScale {
    fn core(&self) -> &ScaleCore {
        &self.core
    }

    fn brand(&self) -> &'static str {
        "Acaia"
    }

    fn connection_state(&self) -> ConnectionState {
        if self.state == ConnectionState::Active && self.reconnect_pending.load(Ordering::SeqCst) {
            ConnectionState::ReconnectPending
        } else {
            self.state
        }
    }

    fn connect(&mut self) -> bool {
        if self.is_connected() {
            self.core.log("already connected");
            return true;
        }

        self.core.log(&format!(
            "connecting to {} [{}]",
            self.core.name(),
            self.core.address()
        ));
        self.state = ConnectionState::Connecting;
        match self.transport.connect(self.core.address()) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                self.core.log(&format!("connection failed: {}", e));
                self.state = ConnectionState::Disconnected;
                return false;
            }
        }

        if !self.perform_handshake() {
            self.cleanup_session();
            return false;
        }

        self.reconnect_pending.store(false, Ordering::SeqCst);
        self.state = ConnectionState::Active;
        self.last_heartbeat = Instant::now();
        self.core.set_weight(0.0);
        true
    }

    fn disconnect(&mut self) {
        self.cleanup_session();
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Active
            && self
                .session
                .as_ref()
                .map(|session| session.is_connected())
                .unwrap_or(false)
    }

    fn tare(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.send_message(MessageType::Tare, &[0x00])
    }

    fn update(&mut self) {
        if self.reconnect_pending.swap(false, Ordering::SeqCst) {
            // One-shot recovery: tear the session down and retry the
            // connection once. A failed retry leaves us disconnected.
            self.core.log("marked for reconnection, rebuilding session");
            self.cleanup_session();
            self.inbound.lock().unwrap().decoder.clear();
            if !self.connect() {
                warn!("Scale[{}] reconnect attempt failed", self.core.name());
            }
            return;
        }
        self.send_heartbeat();
    }
}

impl Drop for AcaiaScale {
    fn drop(&mut self) {
        self.cleanup_session();
    }
}

/// The Acaia vendor plugin: matches the family's advertised name prefixes.
pub fn acaia_plugin() -> ScalePlugin {
    ScalePlugin {
        id: "plugin-acaia",
        handles: Box::new(|device| {
            !device.name.is_empty()
                && ["ACAIA", "PYXIS", "LUNAR", "PROCH"]
                    .iter()
                    .any(|prefix| device.name.starts_with(prefix))
        }),
        initialise: Box::new(|device, transport| Box::new(AcaiaScale::new(device, transport))),
    }
}
