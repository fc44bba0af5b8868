//! Scripted in-memory BLE transport for tests.
//!
//! `MockTransport` presents the GATT layout of an Acaia scale by default and
//! records every scan, connect and write so tests can assert on the exact
//! traffic a component produced. Advertisements and notifications are pushed
//! in from the test body via [`MockTransport::emit`] and
//! [`MockTransport::notify`].

use crate::scales::acaia::{COMMAND_CHARACTERISTIC_UUID, SERVICE_UUID, WEIGHT_CHARACTERISTIC_UUID};
use crate::transport::{
    AdvertisementSink, CharacteristicHandle, GattSession, NotificationHandler, ScaleTransport,
    ScanParams, ServiceHandle, TransportError,
};
use crate::types::{AdvertisementEvent, DeviceAddress};
use embassy_time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const TEST_ADDRESS: DeviceAddress = DeviceAddress([0xE4, 0xA2, 0x00, 0x12, 0x34, 0x56]);

pub fn advertisement(name: &str, address: DeviceAddress) -> AdvertisementEvent {
    AdvertisementEvent {
        name: Some(name.to_string()),
        address,
        manufacturer_data: Vec::new(),
        rssi: -60,
    }
}

#[derive(Default)]
struct MockScan {
    sink: Option<AdvertisementSink>,
    windowed_results: Vec<AdvertisementEvent>,
    fail_next: bool,
    start_count: usize,
    stop_count: usize,
}

struct MockLink {
    connected: bool,
    fail_next_connect: bool,
    connect_count: usize,
    disconnect_count: usize,
    services: Vec<Uuid>,
    characteristics: HashMap<Uuid, CharacteristicHandle>,
    subscriptions: Vec<NotificationHandler>,
    writes: Vec<Vec<u8>>,
}

impl Default for MockLink {
    fn default() -> Self {
        let mut characteristics = HashMap::new();
        characteristics.insert(WEIGHT_CHARACTERISTIC_UUID, CharacteristicHandle(1));
        characteristics.insert(COMMAND_CHARACTERISTIC_UUID, CharacteristicHandle(2));
        Self {
            connected: false,
            fail_next_connect: false,
            connect_count: 0,
            disconnect_count: 0,
            services: vec![SERVICE_UUID],
            characteristics,
            subscriptions: Vec::new(),
            writes: Vec::new(),
        }
    }
}

pub struct MockTransport {
    scan: Mutex<MockScan>,
    link: Arc<Mutex<MockLink>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scan: Mutex::new(MockScan::default()),
            link: Arc::new(Mutex::new(MockLink::default())),
        }
    }

    /// Push one advertisement into the active continuous scan, if any.
    pub fn emit(&self, event: AdvertisementEvent) {
        let mut scan = self.scan.lock().unwrap();
        if let Some(sink) = scan.sink.as_mut() {
            sink(event);
        }
    }

    /// Script the result set of the next windowed scan.
    pub fn set_windowed_results(&self, events: Vec<AdvertisementEvent>) {
        self.scan.lock().unwrap().windowed_results = events;
    }

    /// Fail the next scan operation (continuous start or windowed).
    pub fn fail_next_scan(&self) {
        self.scan.lock().unwrap().fail_next = true;
    }

    pub fn fail_next_connect(&self) {
        self.link.lock().unwrap().fail_next_connect = true;
    }

    /// Strip the scale service from the mock peripheral.
    pub fn remove_service(&self) {
        self.link.lock().unwrap().services.clear();
    }

    pub fn remove_characteristic(&self, uuid: Uuid) {
        self.link.lock().unwrap().characteristics.remove(&uuid);
    }

    /// Push one notification payload into the peripheral stream. A real BLE
    /// notification arrives on exactly one characteristic, so the payload is
    /// delivered to a single subscribed handler, not duplicated to all.
    pub fn notify(&self, data: &[u8]) {
        let mut link = self.link.lock().unwrap();
        if let Some(handler) = link.subscriptions.first_mut() {
            handler(data);
        }
    }

    pub fn scan_start_count(&self) -> usize {
        self.scan.lock().unwrap().start_count
    }

    pub fn scan_stop_count(&self) -> usize {
        self.scan.lock().unwrap().stop_count
    }

    pub fn connect_count(&self) -> usize {
        self.link.lock().unwrap().connect_count
    }

    pub fn disconnect_count(&self) -> usize {
        self.link.lock().unwrap().disconnect_count
    }

    pub fn subscription_count(&self) -> usize {
        self.link.lock().unwrap().subscriptions.len()
    }

    /// Every frame written so far, oldest first.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.link.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.link.lock().unwrap().writes.clear();
    }
}

impl ScaleTransport for MockTransport {
    fn start_continuous_scan(
        &self,
        _params: &ScanParams,
        sink: AdvertisementSink,
    ) -> Result<(), TransportError> {
        let mut scan = self.scan.lock().unwrap();
        if std::mem::take(&mut scan.fail_next) {
            return Err(TransportError::ScanFailed("scripted failure".to_string()));
        }
        scan.start_count += 1;
        scan.sink = Some(sink);
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        let mut scan = self.scan.lock().unwrap();
        scan.stop_count += 1;
        scan.sink = None;
        Ok(())
    }

    fn scan_windowed(
        &self,
        _timeout: Duration,
        _params: &ScanParams,
    ) -> Result<Vec<AdvertisementEvent>, TransportError> {
        let mut scan = self.scan.lock().unwrap();
        if std::mem::take(&mut scan.fail_next) {
            return Err(TransportError::ScanFailed("scripted failure".to_string()));
        }
        Ok(scan.windowed_results.clone())
    }

    fn connect(&self, _address: DeviceAddress) -> Result<Box<dyn GattSession>, TransportError> {
        let mut link = self.link.lock().unwrap();
        if std::mem::take(&mut link.fail_next_connect) {
            return Err(TransportError::ConnectionFailed(
                "scripted failure".to_string(),
            ));
        }
        link.connect_count += 1;
        link.connected = true;
        link.subscriptions.clear();
        Ok(Box::new(MockSession {
            link: Arc::clone(&self.link),
        }))
    }
}

struct MockSession {
    link: Arc<Mutex<MockLink>>,
}

impl GattSession for MockSession {
    fn is_connected(&self) -> bool {
        self.link.lock().unwrap().connected
    }

    fn service(&mut self, uuid: Uuid) -> Option<ServiceHandle> {
        let link = self.link.lock().unwrap();
        link.services.contains(&uuid).then_some(ServiceHandle(1))
    }

    fn characteristic(
        &mut self,
        _service: ServiceHandle,
        uuid: Uuid,
    ) -> Option<CharacteristicHandle> {
        self.link.lock().unwrap().characteristics.get(&uuid).copied()
    }

    fn subscribe(
        &mut self,
        _characteristic: CharacteristicHandle,
        on_data: NotificationHandler,
    ) -> bool {
        let mut link = self.link.lock().unwrap();
        if !link.connected {
            return false;
        }
        link.subscriptions.push(on_data);
        true
    }

    fn write(
        &mut self,
        _characteristic: CharacteristicHandle,
        payload: &[u8],
        _wait_for_response: bool,
    ) -> bool {
        let mut link = self.link.lock().unwrap();
        if !link.connected {
            return false;
        }
        link.writes.push(payload.to_vec());
        true
    }

    fn disconnect(&mut self) {
        let mut link = self.link.lock().unwrap();
        link.connected = false;
        link.disconnect_count += 1;
        link.subscriptions.clear();
    }
}
