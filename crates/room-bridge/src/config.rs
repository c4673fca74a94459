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

//! Configuration of the requests the [`RoomCreationClient`] sends.
//!
//! [`RoomCreationClient`]: crate::RoomCreationClient

use std::time::Duration;

/// The default time a request is allowed to take.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for requests the [`RoomCreationClient`] sends.
///
/// Requests are never retried; this only sets how long a request is allowed
/// to take before it's reported as failed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use room_bridge::config::RequestConfig;
///
/// // Give up on a room creation after 10s.
/// let request_config = RequestConfig::new().timeout(Duration::from_secs(10));
/// ```
///
/// [`RoomCreationClient`]: crate::RoomCreationClient
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestConfig {
    pub(crate) timeout: Option<Duration>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout: Some(DEFAULT_REQUEST_TIMEOUT) }
    }
}

impl RequestConfig {
    /// Create a new default `RequestConfig`.
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the timeout duration of a request.
    ///
    /// Timeouts need a tokio runtime with the time driver enabled. In a
    /// runtime without one, requests fail with
    /// [`TransportError::Interrupted`](crate::TransportError::Interrupted).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Let requests take as long as the transport allows.
    #[must_use]
    pub fn disable_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// The configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
