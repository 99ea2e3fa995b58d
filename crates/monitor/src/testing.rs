//! In-memory gateway used by the monitor and registry tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use idevtray_lockdown::{
    DeviceSession, Domain, GatewayFuture, PropertyBag, SessionError, SessionGateway, fields,
};
use plist::Value;

/// Scripted replies for one device. A `None` bag makes that query fail.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    pub general: Option<PropertyBag>,
    pub disk: Option<PropertyBag>,
    pub battery: Option<PropertyBag>,
    pub open_error: Option<SessionError>,
    pub open_delay: Duration,
}

#[derive(Debug, Default)]
struct FakeState {
    devices: HashMap<String, FakeDevice>,
    opened: HashMap<String, usize>,
    closed: HashMap<String, usize>,
    queries: HashMap<(String, Domain), usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_device(&self, device_id: &str, device: FakeDevice) {
        self.lock().devices.insert(device_id.to_string(), device);
    }

    pub fn update_device(&self, device_id: &str, f: impl FnOnce(&mut FakeDevice)) {
        if let Some(device) = self.lock().devices.get_mut(device_id) {
            f(device);
        }
    }

    pub fn opened(&self, device_id: &str) -> usize {
        self.lock().opened.get(device_id).copied().unwrap_or(0)
    }

    pub fn closed(&self, device_id: &str) -> usize {
        self.lock().closed.get(device_id).copied().unwrap_or(0)
    }

    pub fn queries(&self, device_id: &str, domain: Domain) -> usize {
        self.lock()
            .queries
            .get(&(device_id.to_string(), domain))
            .copied()
            .unwrap_or(0)
    }
}

impl SessionGateway for FakeGateway {
    fn open<'a>(
        &'a self,
        device_id: &'a str,
    ) -> GatewayFuture<'a, Result<Box<dyn DeviceSession>, SessionError>> {
        Box::pin(async move {
            let (delay, error) = {
                let state = self.lock();
                match state.devices.get(device_id) {
                    Some(d) => (d.open_delay, d.open_error.clone()),
                    None => (
                        Duration::ZERO,
                        Some(SessionError::Connect {
                            device_id: device_id.to_string(),
                            reason: "No device found.".into(),
                        }),
                    ),
                }
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(e) = error {
                return Err(e);
            }

            *self.lock().opened.entry(device_id.to_string()).or_default() += 1;
            let session: Box<dyn DeviceSession> = Box::new(FakeSession {
                device_id: device_id.to_string(),
                state: Arc::clone(&self.state),
            });
            Ok(session)
        })
    }
}

struct FakeSession {
    device_id: String,
    state: Arc<Mutex<FakeState>>,
}

impl DeviceSession for FakeSession {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn query(&mut self, domain: Domain) -> GatewayFuture<'_, Result<PropertyBag, SessionError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            *state
                .queries
                .entry((self.device_id.clone(), domain))
                .or_default() += 1;
            let reply = state.devices.get(&self.device_id).and_then(|d| match domain {
                Domain::General => d.general.clone(),
                Domain::DiskUsage => d.disk.clone(),
                Domain::Battery => d.battery.clone(),
            });
            reply.ok_or_else(|| SessionError::Query {
                domain,
                reason: "scripted failure".into(),
            })
        })
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        *state.closed.entry(self.device_id.clone()).or_default() += 1;
    }
}

pub fn general_bag(password_protected: bool) -> PropertyBag {
    let mut bag = PropertyBag::new();
    for (key, value) in [
        (fields::DEVICE_CLASS, "iPhone"),
        (fields::PRODUCT_NAME, "iPhone OS"),
        (fields::PRODUCT_VERSION, "17.4.1"),
        (fields::DEVICE_NAME, "Kim's iPhone"),
        (fields::MEID, "35345678901234"),
        (fields::IMEI, "353456789012345"),
        (fields::DEVICE_COLOR, "1"),
        (fields::PHONE_NUMBER, "+1 555 0100"),
        (fields::ACTIVATION_STATE, "Activated"),
    ] {
        bag.insert(key.to_string(), Value::String(value.to_string()));
    }
    bag.insert(
        fields::PASSWORD_PROTECTED.to_string(),
        Value::Boolean(password_protected),
    );
    bag
}

pub fn disk_bag(total: i64, available: i64) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.insert(
        fields::TOTAL_DISK_CAPACITY.to_string(),
        Value::Integer(total.into()),
    );
    bag.insert(
        fields::AMOUNT_DATA_AVAILABLE.to_string(),
        Value::Integer(available.into()),
    );
    bag
}

pub fn battery_bag(level: i64) -> PropertyBag {
    let mut bag = PropertyBag::new();
    bag.insert(
        fields::BATTERY_CURRENT_CAPACITY.to_string(),
        Value::Integer(level.into()),
    );
    bag
}

/// A device that answers every domain.
pub fn full_device() -> FakeDevice {
    FakeDevice {
        general: Some(general_bag(true)),
        disk: Some(disk_bag(64_000_000_000, 32_000_000_000)),
        battery: Some(battery_bag(87)),
        ..FakeDevice::default()
    }
}
