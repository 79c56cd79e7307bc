mod common;

use common::{registered_storage, wait_for_state, FakeTransport, Reply};
use herald_core::storage::keys;
use herald_core::{ActivationState, FileStorage, MemoryStorage, Push, StaticPlatform, Storage};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn transient_state_leaves_persisted_state_untouched() {
    let transport = Arc::new(FakeTransport::new());
    *transport.register.lock().unwrap() = Reply::Hang;
    let storage = Arc::new(MemoryStorage::new());

    let push = Push::builder(transport)
        .storage(storage.clone())
        .platform(Arc::new(StaticPlatform::new(json!({"transportType": "web"}))))
        .build();

    push.activate_with(true, |_| {}).unwrap();
    push.activate_with(false, |_| {}).unwrap();
    wait_for_state(&push, ActivationState::WaitingForUpdateToken).await;

    assert_eq!(
        storage.get(keys::ACTIVATION_STATE).as_deref(),
        Some("NotActivated")
    );
    // Flags are written on every persist, whatever the state.
    assert_eq!(
        storage.get(keys::USE_CUSTOM_REGISTERER).as_deref(),
        Some("false")
    );
}

#[tokio::test]
async fn restart_resumes_registered_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herald.json");

    let device_id = {
        let storage = Arc::new(FileStorage::open(&path).unwrap());
        let push = Push::builder(Arc::new(FakeTransport::new()))
            .storage(storage)
            .platform(Arc::new(StaticPlatform::new(json!({"transportType": "web"}))))
            .build();

        push.activate(false).await.unwrap();
        push.snapshot().await.unwrap().device.id
    };

    let transport = Arc::new(FakeTransport::new());
    let storage = Arc::new(FileStorage::open(&path).unwrap());
    let push = Push::builder(transport.clone()).storage(storage).build();

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::WaitingForNewPushDeviceDetails);
    assert_eq!(snapshot.device.id, device_id);
    assert_eq!(snapshot.device.update_token.as_deref(), Some("T1"));

    push.deactivate(false).await.unwrap();
    assert_eq!(transport.calls(), vec![format!("deregister {device_id} T1")]);
}

#[tokio::test]
async fn restart_during_update_resumes_at_quiescent_state() {
    let storage = registered_storage(ActivationState::WaitingForNewPushDeviceDetails);
    let transport = Arc::new(FakeTransport::new());
    *transport.update.lock().unwrap() = Reply::Hang;

    {
        let push = Push::builder(transport.clone())
            .storage(storage.clone())
            .build();
        push.raise(herald_core::Event::GotPushDeviceDetails { recipient: None })
            .unwrap();
        wait_for_state(&push, ActivationState::WaitingForRegistrationUpdate).await;
    }

    assert_eq!(
        storage.get(keys::ACTIVATION_STATE).as_deref(),
        Some("WaitingForNewPushDeviceDetails")
    );

    let push = Push::builder(transport).storage(storage).build();
    assert_eq!(
        push.snapshot().await.unwrap().state,
        ActivationState::WaitingForNewPushDeviceDetails
    );
}

#[tokio::test]
async fn custom_flags_survive_restart() {
    let storage = Arc::new(MemoryStorage::new());

    {
        let push = Push::builder(Arc::new(FakeTransport::new()))
            .storage(storage.clone())
            .build();
        push.deactivate(true).await.unwrap();
    }

    let push = Push::builder(Arc::new(FakeTransport::new()))
        .storage(storage)
        .build();
    let snapshot = push.snapshot().await.unwrap();
    assert!(snapshot.use_custom_deregisterer);
    assert!(!snapshot.use_custom_registerer);
}
