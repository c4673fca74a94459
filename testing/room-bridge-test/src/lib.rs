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

//! Testing utilities - DO NOT USE IN PRODUCTION.

#[doc(hidden)]
pub mod __macro_support {
    pub use ctor;
    pub use tracing_subscriber;
}

/// Install a `tracing` subscriber writing to the test output before any test
/// of the calling crate runs.
///
/// The filter is read from the `RUST_LOG` environment variable.
#[macro_export]
macro_rules! init_tracing_for_tests {
    () => {
        #[cfg(not(target_family = "wasm"))]
        #[$crate::__macro_support::ctor::ctor]
        fn init_logging() {
            use $crate::__macro_support::tracing_subscriber::{
                self, layer::SubscriberExt, util::SubscriberInitExt,
            };

            tracing_subscriber::registry()
                .with(tracing_subscriber::EnvFilter::from_default_env())
                .with(tracing_subscriber::fmt::layer().with_test_writer())
                .init();
        }
    };
}

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use futures_util::FutureExt;
use http::StatusCode;
use room_bridge::{CreateRoomTransport, SendFuture, TransportError};
use ruma::{OwnedRoomId, api::client::room::create_room};
use serde_json::json;
use tokio::sync::oneshot;

type Responder = oneshot::Sender<Result<create_room::v3::Response, TransportError>>;

#[derive(Debug, Default)]
struct MockTransportInner {
    sent: Vec<create_room::v3::Request>,
    pending: VecDeque<Responder>,
}

/// A [`CreateRoomTransport`] that records every request and lets the test
/// decide when and how each of them is answered.
///
/// Requests are answered in the order they were sent.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    /// Create a new `MockTransport`, with no request sent yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// All the requests sent so far, in order.
    pub fn sent_requests(&self) -> Vec<create_room::v3::Request> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// The number of requests still waiting for an answer.
    pub fn pending_requests(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Answer the oldest pending request.
    ///
    /// Returns `false` if there was no pending request, or if the sender of
    /// the request doesn't wait for the answer anymore.
    pub fn respond(&self, result: Result<create_room::v3::Response, TransportError>) -> bool {
        let responder = self.inner.lock().unwrap().pending.pop_front();
        responder.is_some_and(|responder| responder.send(result).is_ok())
    }

    /// Answer the oldest pending request with the ID of the created room.
    pub fn respond_with_room(&self, room_id: OwnedRoomId) -> bool {
        self.respond(Ok(create_room::v3::Response::new(room_id)))
    }

    /// Answer the oldest pending request with an error response of the
    /// homeserver, with the given `errcode` and `error` fields.
    pub fn respond_with_error(
        &self,
        status_code: StatusCode,
        errcode: &str,
        message: &str,
    ) -> bool {
        let body = json!({ "errcode": errcode, "error": message });
        let response = http::Response::builder()
            .status(status_code)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body.to_string().into_bytes())
            .expect("the error response should be valid");

        self.respond(Err(TransportError::from_error_response(response)))
    }
}

impl CreateRoomTransport for MockTransport {
    fn send(&self, request: create_room::v3::Request) -> SendFuture {
        let (sender, receiver) = oneshot::channel();

        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(request);
        inner.pending.push_back(sender);

        async move {
            receiver.await.unwrap_or_else(|_| {
                Err(TransportError::connection(io::Error::other("the mock transport was dropped")))
            })
        }
        .boxed()
    }
}
