mod common;

use common::{registered_storage, wait_for_state, FakeRegisterer, FakeTransport, Reply};
use herald_core::storage::keys;
use herald_core::{
    ActivationState, DeregistrationFallback, Event, MemoryStorage, Push, PushError,
    StaticPlatform, Storage,
};
use herald_protocol::ErrorInfo;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

fn web_platform() -> Arc<StaticPlatform> {
    Arc::new(StaticPlatform::new(json!({
        "transportType": "web",
        "endpoint": "https://push.example/abc"
    })))
}

#[tokio::test]
async fn fresh_device_activates() {
    let transport = Arc::new(FakeTransport::new());
    let storage = Arc::new(MemoryStorage::new());
    let push = Push::builder(transport.clone())
        .storage(storage.clone())
        .platform(web_platform())
        .build();

    push.activate(false).await.unwrap();

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::WaitingForNewPushDeviceDetails);
    assert_eq!(snapshot.device.update_token.as_deref(), Some("T1"));
    assert!(snapshot.pending.is_empty());
    assert_eq!(
        transport.calls(),
        vec![format!("register {}", snapshot.device.id)]
    );
    assert_eq!(
        storage.get(keys::ACTIVATION_STATE).as_deref(),
        Some("WaitingForNewPushDeviceDetails")
    );
}

#[tokio::test]
async fn registered_device_activates_without_network() {
    let transport = Arc::new(FakeTransport::new());
    let push = Push::builder(transport.clone())
        .storage(registered_storage(ActivationState::NotActivated))
        .build();

    push.activate(false).await.unwrap();

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::WaitingForNewPushDeviceDetails);
    assert_eq!(snapshot.device.update_token.as_deref(), Some("T0"));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn device_details_failure_rejects_activation() {
    let reason = ErrorInfo::new(40000, 400, "permission denied");
    let storage = Arc::new(MemoryStorage::new());
    let push = Push::builder(Arc::new(FakeTransport::new()))
        .storage(storage.clone())
        .platform(Arc::new(StaticPlatform::failing(reason.clone())))
        .build();

    let err = push.activate(false).await.unwrap_err();
    assert!(matches!(err, PushError::Rejected(ref r) if *r == reason));

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::NotActivated);
    assert_eq!(snapshot.device.update_token, None);
    assert_eq!(
        storage.get(keys::ACTIVATION_STATE).as_deref(),
        Some("NotActivated")
    );
}

#[tokio::test]
async fn registration_failure_rejects_activation() {
    let transport = Arc::new(FakeTransport::new());
    *transport.register.lock().unwrap() = Reply::Fail(ErrorInfo::new(40100, 401, "bad key"));

    let push = Push::builder(transport.clone())
        .platform(web_platform())
        .build();

    let err = push.activate(false).await.unwrap_err();
    assert_eq!(err.info().map(|r| r.code), Some(40100));

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::NotActivated);
}

#[tokio::test]
async fn deactivate_clears_update_token() {
    let transport = Arc::new(FakeTransport::new());
    let storage = registered_storage(ActivationState::WaitingForNewPushDeviceDetails);
    let push = Push::builder(transport.clone())
        .storage(storage.clone())
        .build();

    push.deactivate(false).await.unwrap();

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::NotActivated);
    assert_eq!(snapshot.device.update_token, None);
    assert_eq!(transport.calls(), vec!["deregister dev-1 T0".to_string()]);
    assert_eq!(
        storage.get(keys::ACTIVATION_STATE).as_deref(),
        Some("NotActivated")
    );
}

#[tokio::test]
async fn failed_deactivation_keeps_registration() {
    let reason = ErrorInfo::internal("service down");
    let transport = Arc::new(FakeTransport::new());
    *transport.deregister.lock().unwrap() = Reply::Fail(reason.clone());

    let push = Push::builder(transport)
        .storage(registered_storage(
            ActivationState::WaitingForNewPushDeviceDetails,
        ))
        .build();

    let err = push.deactivate(false).await.unwrap_err();
    assert!(matches!(err, PushError::Rejected(ref r) if *r == reason));

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::WaitingForNewPushDeviceDetails);
    assert_eq!(snapshot.device.update_token.as_deref(), Some("T0"));
}

#[tokio::test]
async fn deactivate_when_not_activated_succeeds() {
    let transport = Arc::new(FakeTransport::new());
    let push = Push::builder(transport.clone()).build();

    push.deactivate(false).await.unwrap();

    assert_eq!(
        push.snapshot().await.unwrap().state,
        ActivationState::NotActivated
    );
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn repeated_activate_is_idempotent() {
    let transport = Arc::new(FakeTransport::new());
    let push = Push::builder(transport.clone())
        .storage(registered_storage(
            ActivationState::WaitingForNewPushDeviceDetails,
        ))
        .build();

    for _ in 0..3 {
        push.activate(false).await.unwrap();
        assert_eq!(
            push.snapshot().await.unwrap().state,
            ActivationState::WaitingForNewPushDeviceDetails
        );
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn deactivate_waits_for_update_in_flight() {
    let transport = Arc::new(FakeTransport::new());
    *transport.update.lock().unwrap() = Reply::Hang;

    let push = Push::builder(transport.clone())
        .storage(registered_storage(
            ActivationState::WaitingForNewPushDeviceDetails,
        ))
        .build();

    push.raise(Event::got_push_device_details(json!({"transportType": "fcm", "registrationToken": "r1"})))
        .unwrap();

    let (tx, rx) = oneshot::channel();
    push.deactivate_with(false, move |reason| {
        let _ = tx.send(reason);
    })
    .unwrap();

    let snapshot = wait_for_state(&push, ActivationState::WaitingForRegistrationUpdate).await;
    assert_eq!(snapshot.pending, vec!["CalledDeactivate"]);
    assert_eq!(
        snapshot.device.recipient,
        Some(json!({"transportType": "fcm", "registrationToken": "r1"}))
    );

    // Stand in for the update completing.
    push.raise(Event::RegistrationUpdated).unwrap();

    assert_eq!(rx.await.unwrap(), None);
    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::NotActivated);
    assert!(snapshot.pending.is_empty());
    assert_eq!(
        transport.calls(),
        vec![
            "update dev-1 T0".to_string(),
            "deregister dev-1 T0".to_string()
        ]
    );
}

#[tokio::test]
async fn repeated_deactivate_keeps_fallback() {
    let transport = Arc::new(FakeTransport::new());
    *transport.deregister.lock().unwrap() = Reply::Hang;

    let push = Push::builder(transport.clone())
        .storage(registered_storage(
            ActivationState::WaitingForNewPushDeviceDetails,
        ))
        .build();

    push.deactivate_with(false, |_| {}).unwrap();
    push.deactivate_with(false, |_| {}).unwrap();

    let snapshot = wait_for_state(
        &push,
        ActivationState::WaitingForDeregistration(
            DeregistrationFallback::WaitingForNewPushDeviceDetails,
        ),
    )
    .await;
    assert!(snapshot.pending.is_empty());
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn later_activate_supersedes_earlier_callback() {
    let transport = Arc::new(FakeTransport::new());
    *transport.register.lock().unwrap() = Reply::Hang;

    let push = Push::builder(transport)
        .platform(web_platform())
        .build();

    let first = tokio::spawn({
        let push = push.clone();
        async move { push.activate(false).await }
    });

    wait_for_state(&push, ActivationState::WaitingForUpdateToken).await;
    push.activate_with(false, |_| {}).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(PushError::Superseded)));
}

#[tokio::test]
async fn custom_registerer_replaces_transport() {
    let transport = Arc::new(FakeTransport::new());
    let registerer = Arc::new(FakeRegisterer::new("C1"));
    let storage = Arc::new(MemoryStorage::new());

    let push = Push::builder(transport.clone())
        .storage(storage.clone())
        .platform(web_platform())
        .registerer(registerer.clone())
        .deregisterer(registerer.clone())
        .build();

    push.activate(true).await.unwrap();

    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.device.update_token.as_deref(), Some("C1"));
    assert!(snapshot.use_custom_registerer);
    assert_eq!(
        storage.get(keys::USE_CUSTOM_REGISTERER).as_deref(),
        Some("true")
    );

    push.deactivate(true).await.unwrap();

    let id = snapshot.device.id;
    assert_eq!(
        registerer.calls(),
        vec![format!("register {id}"), format!("deregister {id} C1")]
    );
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn missing_custom_registerer_fails_loudly() {
    let push = Push::builder(Arc::new(FakeTransport::new()))
        .platform(web_platform())
        .build();

    let err = push.activate(true).await.unwrap_err();
    let reason = err.info().unwrap();
    assert_eq!(reason.code, 40000);
    assert_eq!(reason.status_code, 400);

    assert_eq!(
        push.snapshot().await.unwrap().state,
        ActivationState::NotActivated
    );
}

#[tokio::test]
async fn update_failure_reaches_callback() {
    let reason = ErrorInfo::new(40100, 401, "token revoked");
    let transport = Arc::new(FakeTransport::new());
    *transport.update.lock().unwrap() = Reply::Fail(reason.clone());

    let push = Push::builder(transport)
        .storage(registered_storage(
            ActivationState::WaitingForNewPushDeviceDetails,
        ))
        .build();

    let (tx, mut rx) = mpsc::unbounded_channel();
    push.on_registration_update_failed(move |reason| {
        let _ = tx.send(reason);
    })
    .unwrap();
    push.raise(Event::GotPushDeviceDetails { recipient: None })
        .unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(seen, Some(reason));

    // Degraded, not deregistered.
    let snapshot = push.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ActivationState::AfterRegistrationUpdateFailed);
    assert_eq!(snapshot.device.update_token.as_deref(), Some("T0"));
}

#[tokio::test]
async fn publish_forwards_to_transport() {
    let transport = Arc::new(FakeTransport::new());
    let push = Push::builder(transport.clone()).build();

    push.publish(
        json!({"clientId": "bob"}),
        json!({"notification": {"title": "Hi"}}),
    )
    .await
    .unwrap();

    let published = transport.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].recipient, json!({"clientId": "bob"}));

    let err = push
        .publish(json!({"clientId": "bob"}), json!("not an object"))
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Protocol(_)));
}
