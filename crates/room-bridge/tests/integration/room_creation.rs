use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use assert_matches2::{assert_let, assert_matches};
use http::StatusCode;
use room_bridge::{
    CreateRoomError, RoomCreationClient, RoomCreationRequest, RoomPreset, RoomVisibility,
    TransportError, config::RequestConfig,
};
use room_bridge_test::MockTransport;
use ruma::{
    api::client::{
        error::ErrorKind,
        room::{Visibility, create_room},
    },
    owned_room_id, owned_user_id,
};
use tokio::{runtime::Builder, sync::oneshot, time::sleep};
use tracing::{Event, Subscriber, field::Field};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::client_with_mock_transport;

/// Records the message of every event, along with the name of the span it was
/// emitted in.
#[derive(Clone, Default)]
struct EventSpans(Arc<Mutex<Vec<(String, Option<&'static str>)>>>);

impl<S> Layer<S> for EventSpans
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut |field: &Field, value: &dyn fmt::Debug| {
            if field.name() == "message" {
                message = format!("{value:?}");
            }
        });

        let span = ctx.event_span(event).map(|span| span.name());
        self.0.lock().unwrap().push((message, span));
    }
}

#[tokio::test]
async fn test_create_direct_room() {
    let (client, transport) = client_with_mock_transport();

    let calls = Arc::new(AtomicUsize::new(0));
    let (sender, receiver) = oneshot::channel();

    let request = RoomCreationRequest::builder()
        .preset(RoomPreset::TrustedPrivateChat)
        .is_direct(true)
        .invite(vec![owned_user_id!("@bob:server")])
        .build();

    let operation = client.create_room_with(request, {
        let calls = calls.clone();
        move |outcome| {
            calls.fetch_add(1, Ordering::SeqCst);
            sender.send(outcome).unwrap();
        }
    });

    // The request went out before the call returned, nothing has completed yet.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!operation.is_finished());
    assert!(!operation.is_cancelled());

    let sent = transport.sent_requests();
    assert_eq!(sent.len(), 1);
    assert_matches!(sent[0].preset, Some(create_room::v3::RoomPreset::TrustedPrivateChat));
    assert!(sent[0].is_direct);
    assert_eq!(sent[0].invite, vec![owned_user_id!("@bob:server")]);
    assert_eq!(sent[0].visibility, Visibility::Private);

    assert!(transport.respond_with_room(owned_room_id!("!dm:server")));

    assert_matches!(receiver.await, Ok(Ok(())));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Nothing else happens afterwards.
    sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(operation.is_finished());
    assert_eq!(transport.sent_requests().len(), 1);
}

#[tokio::test]
async fn test_create_public_room_with_handle() {
    let (client, transport) = client_with_mock_transport();

    let request = RoomCreationRequest::builder()
        .name("Rust")
        .alias("rust")
        .topic("All things Rust")
        .visibility(RoomVisibility::Public)
        .preset(RoomPreset::PublicChat)
        .build();

    let handle = client.create_room(request);

    let sent = transport.sent_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name.as_deref(), Some("Rust"));
    assert_eq!(sent[0].room_alias_name.as_deref(), Some("rust"));
    assert_eq!(sent[0].topic.as_deref(), Some("All things Rust"));
    assert_eq!(sent[0].visibility, Visibility::Public);

    transport.respond_with_room(owned_room_id!("!rust:example.org"));

    assert_matches!(handle.await, Some(Ok(())));
}

#[tokio::test]
async fn test_alias_in_use() {
    let (client, transport) = client_with_mock_transport();

    let handle = client.create_room(RoomCreationRequest::builder().alias("taken").build());

    transport.respond_with_error(
        StatusCode::BAD_REQUEST,
        "M_ROOM_IN_USE",
        "Room alias already taken",
    );

    assert_let!(Some(Err(error)) = handle.await);
    assert_matches!(error.client_api_error_kind(), Some(ErrorKind::RoomInUse));
    assert_let!(CreateRoomError::Validation(api_error) = error);
    assert_eq!(api_error.status_code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_alias() {
    let (client, transport) = client_with_mock_transport();

    let handle = client.create_room(RoomCreationRequest::builder().alias("not valid!").build());

    // Synapse doesn't use a dedicated error code for this one.
    transport.respond_with_error(
        StatusCode::BAD_REQUEST,
        "M_UNKNOWN",
        "Invalid characters in room alias",
    );

    assert_let!(Some(Err(error)) = handle.await);
    assert_matches!(error.client_api_error_kind(), Some(ErrorKind::Unknown));
    assert_matches!(error, CreateRoomError::Validation(_));
}

#[tokio::test]
async fn test_rate_limited() {
    let (client, transport) = client_with_mock_transport();

    let handle = client.create_room(RoomCreationRequest::default());

    transport.respond_with_error(StatusCode::TOO_MANY_REQUESTS, "M_LIMIT_EXCEEDED", "Slow down");

    assert_let!(Some(Err(error)) = handle.await);
    assert_matches!(error.client_api_error_kind(), Some(ErrorKind::LimitExceeded { .. }));
    assert_matches!(error, CreateRoomError::Transport(TransportError::Api(_)));
}

#[tokio::test]
async fn test_server_failure() {
    let (client, transport) = client_with_mock_transport();

    let handle = client.create_room(RoomCreationRequest::default());

    transport.respond_with_error(StatusCode::INTERNAL_SERVER_ERROR, "M_UNKNOWN", "Oops");

    assert_let!(Some(Err(error)) = handle.await);
    assert_matches!(error.client_api_error_kind(), Some(ErrorKind::Unknown));
    assert_let!(CreateRoomError::Transport(TransportError::Api(api_error)) = error);
    assert_eq!(api_error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_request_timeout() {
    let transport = MockTransport::new();
    let client = RoomCreationClient::new(Arc::new(transport.clone()))
        .with_request_config(RequestConfig::new().timeout(Duration::from_millis(20)));

    let handle = client.create_room(RoomCreationRequest::default());

    // The homeserver never answers.
    assert_let!(
        Some(Err(CreateRoomError::Transport(TransportError::Timeout(timeout)))) = handle.await
    );
    assert_eq!(timeout, Duration::from_millis(20));

    // There is no retry.
    assert_eq!(transport.sent_requests().len(), 1);
}

#[test]
fn test_runtime_without_timers() {
    let runtime = Builder::new_current_thread().build().unwrap();

    runtime.block_on(async {
        let transport = MockTransport::new();
        // The default config has a timeout, which the runtime can't provide.
        let client = RoomCreationClient::new(Arc::new(transport.clone()));

        let handle = client.create_room(RoomCreationRequest::default());
        assert!(!handle.operation().is_cancelled());
        assert_matches!(
            handle.await,
            Some(Err(CreateRoomError::Transport(TransportError::Interrupted(_))))
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = oneshot::channel();
        let _operation = client.create_room_with(RoomCreationRequest::default(), {
            let calls = calls.clone();
            move |outcome| {
                calls.fetch_add(1, Ordering::SeqCst);
                sender.send(outcome).unwrap();
            }
        });

        assert_matches!(
            receiver.await,
            Ok(Err(CreateRoomError::Transport(TransportError::Interrupted(_))))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn test_runtime_shutdown_before_completion() {
    let (client, transport) = client_with_mock_transport();

    let runtime = Builder::new_current_thread().build().unwrap();
    let handle = runtime.block_on(async { client.create_room(RoomCreationRequest::default()) });
    assert_eq!(transport.pending_requests(), 1);

    // The task waiting for the response goes away with its runtime.
    drop(runtime);
    assert!(!handle.operation().is_cancelled());

    let runtime = Builder::new_current_thread().build().unwrap();
    assert_matches!(
        runtime.block_on(handle),
        Some(Err(CreateRoomError::Transport(TransportError::Interrupted(_))))
    );
}

#[tokio::test]
async fn test_cancel_before_completion() {
    let (client, transport) = client_with_mock_transport();

    let calls = Arc::new(AtomicUsize::new(0));

    let operation = client.create_room_with(RoomCreationRequest::default(), {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    });

    operation.cancel();
    assert!(operation.is_cancelled());

    // The homeserver answers anyway, the outcome must not be delivered.
    transport.respond_with_room(owned_room_id!("!room:example.org"));
    sleep(Duration::from_millis(20)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(operation.is_finished());
    assert_eq!(transport.sent_requests().len(), 1);

    // Cancelling again is a no-op.
    operation.cancel();
    assert!(operation.is_cancelled());
}

#[tokio::test]
async fn test_cancelled_handle_resolves_to_none() {
    let (client, transport) = client_with_mock_transport();

    let handle = client.create_room(RoomCreationRequest::default());
    handle.cancel();

    assert!(handle.operation().is_cancelled());
    assert_matches!(handle.await, None);

    // The request was abandoned along with the task.
    assert!(!transport.respond_with_room(owned_room_id!("!room:example.org")));
}

#[tokio::test]
async fn test_cancel_after_completion() {
    let (client, transport) = client_with_mock_transport();

    let mut handle = client.create_room(RoomCreationRequest::default());
    transport.respond_with_room(owned_room_id!("!room:example.org"));

    assert_matches!((&mut handle).await, Some(Ok(())));

    handle.cancel();
    assert!(!handle.operation().is_cancelled());
}

#[tokio::test]
async fn test_concurrent_room_creations() {
    let (client, transport) = client_with_mock_transport();

    let first = client.create_room(RoomCreationRequest::builder().name("First").build());
    let second = client.create_room(RoomCreationRequest::builder().name("Second").build());
    let third = client.create_room(RoomCreationRequest::builder().name("Third").build());

    let names: Vec<_> =
        transport.sent_requests().into_iter().map(|request| request.name.unwrap()).collect();
    assert_eq!(names, ["First", "Second", "Third"]);
    assert_eq!(transport.pending_requests(), 3);

    // Cancelling one of them doesn't affect the others.
    second.cancel();

    transport.respond_with_room(owned_room_id!("!first:example.org"));
    transport.respond_with_room(owned_room_id!("!second:example.org"));
    transport.respond_with_error(StatusCode::BAD_REQUEST, "M_INVALID_PARAM", "Bad name");

    assert_matches!(first.await, Some(Ok(())));
    assert_matches!(second.await, None);
    assert_matches!(third.await, Some(Err(CreateRoomError::Validation(_))));
}

#[tokio::test]
async fn test_late_cancel_is_logged_in_the_room_creation_span() {
    let events = EventSpans::default();
    let _guard = tracing_subscriber::registry().with(events.clone()).set_default();

    let (client, transport) = client_with_mock_transport();

    let mut handle = client.create_room(RoomCreationRequest::default());
    transport.respond_with_room(owned_room_id!("!room:example.org"));
    assert_matches!((&mut handle).await, Some(Ok(())));

    // Cancelled from outside of any span.
    handle.cancel();

    let events = events.0.lock().unwrap();
    let (message, span) = events.last().unwrap();
    assert!(message.contains("already completed or been cancelled"), "{message}");
    assert_eq!(*span, Some("create_room_with"));
}
