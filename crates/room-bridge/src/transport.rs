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

use std::fmt;

use futures_util::future::BoxFuture;
use ruma::api::client::room::create_room;

use crate::TransportError;

/// The future returned by [`CreateRoomTransport::send`].
pub type SendFuture =
    BoxFuture<'static, Result<create_room::v3::Response, TransportError>>;

/// The request-dispatch capability of a Matrix session, as far as room
/// creation is concerned.
///
/// Implementations own everything about the network: authentication, the
/// HTTP client and any scheduling policy.
pub trait CreateRoomTransport: fmt::Debug + Send + Sync + 'static {
    /// Hand a `createRoom` request over to the homeserver.
    ///
    /// The request is dispatched when this method is called. The returned
    /// future resolves with the homeserver's response; dropping it abandons
    /// the request.
    fn send(&self, request: create_room::v3::Request) -> SendFuture;
}
