#![allow(dead_code)]

use async_trait::async_trait;
use herald_core::storage::keys;
use herald_core::{
    ActivationState, CustomDeregisterer, CustomRegisterer, LocalDevice, MachineSnapshot,
    MemoryStorage, Push, Storage,
};
use herald_protocol::{DeviceDetails, ErrorInfo, PublishRequest};
use herald_transport::{PushTransport, TransportError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a fake operation answers.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail(ErrorInfo),
    Hang,
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ErrorInfo> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Fail(reason) => Err(reason),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Transport with scripted replies that records every call.
pub struct FakeTransport {
    pub register: Mutex<Reply<String>>,
    pub update: Mutex<Reply<()>>,
    pub deregister: Mutex<Reply<()>>,
    pub calls: Mutex<Vec<String>>,
    pub published: Mutex<Vec<PublishRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            register: Mutex::new(Reply::Ok("T1".to_string())),
            update: Mutex::new(Reply::Ok(())),
            deregister: Mutex::new(Reply::Ok(())),
            calls: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn register(&self, device: &DeviceDetails) -> Result<String, TransportError> {
        self.record(format!("register {}", device.id));
        let reply = self.register.lock().unwrap().clone();
        reply.resolve().await.map_err(TransportError::Api)
    }

    async fn update_registration(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError> {
        self.record(format!("update {} {}", device.id, update_token));
        let reply = self.update.lock().unwrap().clone();
        reply.resolve().await.map_err(TransportError::Api)
    }

    async fn deregister(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), TransportError> {
        self.record(format!("deregister {} {}", device.id, update_token));
        let reply = self.deregister.lock().unwrap().clone();
        reply.resolve().await.map_err(TransportError::Api)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<(), TransportError> {
        self.published.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Custom registration strategy that records every call.
pub struct FakeRegisterer {
    pub token: String,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRegisterer {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CustomRegisterer for FakeRegisterer {
    async fn register(&self, device: &DeviceDetails) -> Result<String, ErrorInfo> {
        self.calls.lock().unwrap().push(format!("register {}", device.id));
        Ok(self.token.clone())
    }

    async fn update_registration(
        &self,
        device: &DeviceDetails,
        update_token: &str,
    ) -> Result<(), ErrorInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update {} {}", device.id, update_token));
        Ok(())
    }
}

#[async_trait]
impl CustomDeregisterer for FakeRegisterer {
    async fn deregister(&self, device: &DeviceDetails, update_token: &str) -> Result<(), ErrorInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("deregister {} {}", device.id, update_token));
        Ok(())
    }
}

/// Storage holding a device registered with token `T0`, resting in `state`.
pub fn registered_storage(state: ActivationState) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());

    let mut device = LocalDevice::new("dev-1");
    device.recipient = Some(json!({"transportType": "fcm", "registrationToken": "r0"}));
    device.update_token = Some("T0".to_string());

    storage
        .set(keys::LOCAL_DEVICE, &serde_json::to_string(&device).unwrap())
        .unwrap();
    storage.set(keys::ACTIVATION_STATE, state.name()).unwrap();
    storage
}

/// Poll until the machine reaches `state`.
pub async fn wait_for_state(push: &Push, state: ActivationState) -> MachineSnapshot {
    let mut last = None;
    for _ in 0..400 {
        let snapshot = push.snapshot().await.unwrap();
        if snapshot.state == state {
            return snapshot;
        }
        last = Some(snapshot);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Machine never reached {state}, last seen {last:?}");
}
