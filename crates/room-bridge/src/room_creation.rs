// Copyright 2025 The Matrix.org Foundation C.I.C.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Creating rooms.

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
    time::Duration,
};

use futures_util::FutureExt;

use ruma::{
    OwnedUserId,
    api::client::{
        membership::{Invite3pid, Invite3pidInit},
        room::{Visibility, create_room},
    },
    thirdparty::Medium,
};
use tokio::{sync::oneshot, task::spawn};
use tracing::{Instrument, Span, debug, instrument, warn};

use crate::{
    CreateRoomError, CreateRoomTransport, Result, SendFuture, TransportError,
    config::RequestConfig,
    task_handle::{CancellableOperation, CompletionState},
};

/// Whether a room is shown in the homeserver's public room directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoomVisibility {
    /// The room is listed in the public room directory.
    Public,
    /// The room is hidden from the public room directory.
    #[default]
    Private,
}

impl From<RoomVisibility> for Visibility {
    fn from(value: RoomVisibility) -> Self {
        match value {
            RoomVisibility::Public => Visibility::Public,
            RoomVisibility::Private => Visibility::Private,
        }
    }
}

/// A bundle of default room policies the homeserver applies at creation time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoomPreset {
    /// Invite-only, history visible to members, guests can join.
    #[default]
    PrivateChat,
    /// Public join rule, history visible to members, no guests.
    PublicChat,
    /// Like `PrivateChat`, but every invitee gets the creator's power level.
    TrustedPrivateChat,
}

impl From<RoomPreset> for create_room::v3::RoomPreset {
    fn from(value: RoomPreset) -> Self {
        match value {
            RoomPreset::PrivateChat => Self::PrivateChat,
            RoomPreset::PublicChat => Self::PublicChat,
            RoomPreset::TrustedPrivateChat => Self::TrustedPrivateChat,
        }
    }
}

/// An invitation addressed to a third-party identifier, e.g. an email
/// address, which the identity server resolves to a Matrix user.
#[derive(Clone, Debug)]
pub struct ThirdPartyInvite {
    /// The hostname and optional port of the identity server to look the
    /// invitee up on.
    pub id_server: String,
    /// An access token registered with the identity server.
    pub id_access_token: String,
    /// The kind of address being invited.
    pub medium: Medium,
    /// The invitee's address.
    pub address: String,
}

impl From<ThirdPartyInvite> for Invite3pid {
    fn from(value: ThirdPartyInvite) -> Self {
        let ThirdPartyInvite { id_server, id_access_token, medium, address } = value;
        Invite3pidInit { id_server, id_access_token, medium, address }.into()
    }
}

/// Everything needed to create a room.
///
/// The content isn't validated locally, the homeserver is the judge of e.g.
/// whether the alias is still available.
#[derive(Clone, Debug, Default)]
pub struct RoomCreationRequest {
    /// The name of the room.
    pub name: Option<String>,
    /// Whether the room is listed in the public room directory.
    pub visibility: RoomVisibility,
    /// The localpart of the alias to publish for the room.
    pub alias: Option<String>,
    /// The topic of the room.
    pub topic: Option<String>,
    /// The users to invite, in order.
    pub invite: Vec<OwnedUserId>,
    /// The third-party identifiers to invite, in order.
    pub invite_3pid: Vec<ThirdPartyInvite>,
    /// Whether the room is a 1:1 conversation.
    pub is_direct: bool,
    /// The default policies of the room.
    pub preset: RoomPreset,
}

impl RoomCreationRequest {
    /// Start building a request.
    pub fn builder() -> RoomCreationRequestBuilder {
        RoomCreationRequestBuilder::default()
    }
}

impl From<RoomCreationRequest> for create_room::v3::Request {
    fn from(value: RoomCreationRequest) -> Self {
        let RoomCreationRequest {
            name,
            visibility,
            alias,
            topic,
            invite,
            invite_3pid,
            is_direct,
            preset,
        } = value;

        let mut request = create_room::v3::Request::new();
        request.name = name;
        request.visibility = visibility.into();
        request.room_alias_name = alias;
        request.topic = topic;
        request.invite = invite;
        request.invite_3pid = invite_3pid.into_iter().map(Into::into).collect();
        request.is_direct = is_direct;
        request.preset = Some(preset.into());
        request
    }
}

/// A builder for a [`RoomCreationRequest`].
///
/// # Examples
///
/// ```
/// use room_bridge::{RoomCreationRequest, RoomPreset, RoomVisibility};
///
/// let request = RoomCreationRequest::builder()
///     .name("Rust")
///     .topic("All things Rust")
///     .alias("rust")
///     .visibility(RoomVisibility::Public)
///     .preset(RoomPreset::PublicChat)
///     .build();
///
/// assert_eq!(request.alias.as_deref(), Some("rust"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RoomCreationRequestBuilder {
    request: RoomCreationRequest,
}

impl RoomCreationRequestBuilder {
    /// Set the name of the room.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.request.name = Some(name.into());
        self
    }

    /// Set whether the room is listed in the public room directory.
    #[must_use]
    pub fn visibility(mut self, visibility: RoomVisibility) -> Self {
        self.request.visibility = visibility;
        self
    }

    /// Set the localpart of the alias to publish for the room.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.request.alias = Some(alias.into());
        self
    }

    /// Set the topic of the room.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.request.topic = Some(topic.into());
        self
    }

    /// Set the users to invite.
    #[must_use]
    pub fn invite(mut self, invite: Vec<OwnedUserId>) -> Self {
        self.request.invite = invite;
        self
    }

    /// Set the third-party identifiers to invite.
    #[must_use]
    pub fn invite_3pid(mut self, invite: Vec<ThirdPartyInvite>) -> Self {
        self.request.invite_3pid = invite;
        self
    }

    /// Mark the room as a 1:1 conversation.
    #[must_use]
    pub fn is_direct(mut self, is_direct: bool) -> Self {
        self.request.is_direct = is_direct;
        self
    }

    /// Set the default policies of the room.
    #[must_use]
    pub fn preset(mut self, preset: RoomPreset) -> Self {
        self.request.preset = preset;
        self
    }

    /// Finish the request.
    pub fn build(self) -> RoomCreationRequest {
        self.request
    }
}

/// Creates rooms through a [`CreateRoomTransport`].
///
/// Every call sends exactly one request and reports exactly one outcome,
/// unless it's cancelled first. Calls don't share any state, so they can be
/// issued concurrently.
///
/// The outcome is awaited on a tokio task, so the methods must be called
/// from within a tokio runtime.
#[derive(Clone, Debug)]
pub struct RoomCreationClient {
    transport: Arc<dyn CreateRoomTransport>,
    request_config: RequestConfig,
}

impl RoomCreationClient {
    /// Create a new client sending its requests through `transport`, with the
    /// default [`RequestConfig`].
    pub fn new(transport: Arc<dyn CreateRoomTransport>) -> Self {
        Self { transport, request_config: RequestConfig::default() }
    }

    /// Use the given [`RequestConfig`] for all subsequent requests.
    #[must_use]
    pub fn with_request_config(mut self, request_config: RequestConfig) -> Self {
        self.request_config = request_config;
        self
    }

    /// The [`RequestConfig`] this client uses.
    pub fn request_config(&self) -> RequestConfig {
        self.request_config
    }

    /// Create a room, calling `on_complete` with the outcome.
    ///
    /// The request is handed to the transport before this method returns, and
    /// the returned handle can be used to cancel it. `on_complete` is called
    /// at most once, from the task waiting for the response, and never if the
    /// operation is cancelled before it completes.
    #[instrument(skip_all, fields(
        preset = ?request.preset,
        is_direct = request.is_direct,
        invites = request.invite.len() + request.invite_3pid.len(),
    ))]
    pub fn create_room_with<F>(
        &self,
        request: RoomCreationRequest,
        on_complete: F,
    ) -> CancellableOperation
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        debug!("Sending the room creation request");

        let response = self.transport.send(request.into());
        let timeout = self.request_config.timeout;

        let state = CompletionState::new();
        let task_state = state.clone();

        let handle = spawn(
            async move {
                // A panic while waiting, e.g. because the runtime has no timer,
                // must still produce an outcome.
                let result = AssertUnwindSafe(wait_for_response(response, timeout))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(TransportError::Interrupted(panic_message(&*panic)))
                    });

                if !task_state.try_complete() {
                    debug!("The room creation was cancelled, dropping its outcome");
                    return;
                }

                let outcome = match result {
                    Ok(response) => {
                        debug!(room_id = %response.room_id, "Room created");
                        Ok(())
                    }
                    Err(error) => {
                        let error = CreateRoomError::from(error);
                        warn!("Couldn't create the room: {error}");
                        Err(error)
                    }
                };

                on_complete(outcome);
            }
            .instrument(Span::current()),
        );

        CancellableOperation::new(handle, state, Span::current())
    }

    /// Create a room, returning a handle that resolves to the outcome.
    ///
    /// The handle resolves to `None` if the operation got cancelled before it
    /// completed.
    pub fn create_room(&self, request: RoomCreationRequest) -> CreateRoomHandle {
        let (sender, receiver) = oneshot::channel();

        let operation = self.create_room_with(request, move |outcome| {
            // The receiving side may have been dropped, nobody is interested in
            // the outcome then.
            let _ = sender.send(outcome);
        });

        CreateRoomHandle { operation, receiver }
    }
}

async fn wait_for_response(
    response: SendFuture,
    timeout: Option<Duration>,
) -> Result<create_room::v3::Response, TransportError> {
    match timeout {
        Some(duration) => tokio::time::timeout(duration, response)
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(duration))),
        None => response.await,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "the task waiting for the response panicked".to_owned()
    }
}

/// The completion channel of a room creation started with
/// [`RoomCreationClient::create_room`].
///
/// Awaiting it yields `Some(outcome)`, or `None` if the operation was
/// cancelled before completing. If the task waiting for the response goes
/// away without the operation being cancelled, e.g. because its runtime shut
/// down, the outcome is a [`TransportError::Interrupted`].
#[derive(Debug)]
pub struct CreateRoomHandle {
    operation: CancellableOperation,
    receiver: oneshot::Receiver<Result<()>>,
}

impl CreateRoomHandle {
    /// Cancel the room creation, see [`CancellableOperation::cancel`].
    pub fn cancel(&self) {
        self.operation.cancel();
    }

    /// The operation behind this handle.
    pub fn operation(&self) -> &CancellableOperation {
        &self.operation
    }
}

impl Future for CreateRoomHandle {
    type Output = Option<Result<()>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = ready!(Pin::new(&mut self.receiver).poll(cx));

        Poll::Ready(match outcome {
            Ok(outcome) => Some(outcome),
            Err(_) if self.operation.is_cancelled() => None,
            Err(_) => Some(Err(CreateRoomError::Transport(TransportError::Interrupted(
                "the task waiting for the response was dropped".to_owned(),
            )))),
        })
    }
}
