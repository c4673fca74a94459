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

//! Error conditions.

use std::{error::Error as StdError, sync::Arc, time::Duration};

use as_variant::as_variant;
use http::StatusCode;
use ruma::api::{
    EndpointError,
    client::{
        Error as RumaApiError,
        error::{ErrorBody, ErrorKind, StandardErrorBody},
    },
};
use thiserror::Error;

/// Result type of a room creation.
pub type Result<T, E = CreateRoomError> = std::result::Result<T, E>;

/// An error reported by a [`CreateRoomTransport`](crate::CreateRoomTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The homeserver answered with an error response.
    #[error(transparent)]
    Api(#[from] RumaApiError),

    /// No response was received in time.
    #[error("the request timed out after {0:?}")]
    Timeout(Duration),

    /// The request couldn't be sent or the response couldn't be read.
    #[error("connection error: {0}")]
    Connection(#[source] Arc<dyn StdError + Send + Sync>),

    /// The task waiting for the response stopped before a response was
    /// received, without the operation being cancelled.
    #[error("the request was interrupted: {0}")]
    Interrupted(String),
}

impl TransportError {
    /// Wrap any error coming from the network layer.
    pub fn connection(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::Connection(Arc::new(error))
    }

    /// Parse an error response of the homeserver.
    ///
    /// The body is expected to be in the `errcode` + `error` JSON format of
    /// the client-server API; anything else is kept as is.
    pub fn from_error_response<T: AsRef<[u8]>>(response: http::Response<T>) -> Self {
        Self::Api(RumaApiError::from_http_response(response))
    }

    /// If `self` is `Api(e)`, returns `Some(e)`.
    ///
    /// Otherwise, returns `None`.
    pub fn as_ruma_api_error(&self) -> Option<&RumaApiError> {
        as_variant!(self, Self::Api)
    }

    /// Shorthand for
    /// <code>.[as_ruma_api_error](Self::as_ruma_api_error)().and_then(...)</code>.
    pub fn client_api_error_kind(&self) -> Option<&ErrorKind> {
        self.as_ruma_api_error().and_then(client_api_error_kind)
    }
}

/// The outcome of a failed room creation.
#[derive(Debug, Error)]
pub enum CreateRoomError {
    /// The homeserver rejected the content of the request, e.g. because the
    /// requested alias is already in use or malformed.
    #[error("the homeserver rejected the room creation request: {0}")]
    Validation(RumaApiError),

    /// The request failed on its way to or back from the homeserver, or the
    /// homeserver failed to process it.
    #[error(transparent)]
    Transport(TransportError),
}

impl CreateRoomError {
    /// If `self` is `Validation(e)`, returns `Some(e)`.
    ///
    /// Otherwise, returns `None`.
    pub fn as_validation_error(&self) -> Option<&RumaApiError> {
        as_variant!(self, Self::Validation)
    }

    /// If `self` is `Transport(e)`, returns `Some(e)`.
    ///
    /// Otherwise, returns `None`.
    pub fn as_transport_error(&self) -> Option<&TransportError> {
        as_variant!(self, Self::Transport)
    }

    /// The [`ErrorKind`] of the homeserver's error response, if this error
    /// comes from one.
    pub fn client_api_error_kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Validation(error) => client_api_error_kind(error),
            Self::Transport(error) => error.client_api_error_kind(),
        }
    }
}

impl From<TransportError> for CreateRoomError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Api(api_error) if is_validation_error(&api_error) => {
                Self::Validation(api_error)
            }
            error => Self::Transport(error),
        }
    }
}

fn client_api_error_kind(error: &RumaApiError) -> Option<&ErrorKind> {
    as_variant!(&error.body, ErrorBody::Standard(StandardErrorBody { kind, .. }) => kind)
}

/// Whether the homeserver rejected the request because of its content.
///
/// Every client error counts, except the ones about who sends the request
/// (authentication, permissions) or how often (rate limiting).
fn is_validation_error(error: &RumaApiError) -> bool {
    if !error.status_code.is_client_error() {
        return false;
    }

    if matches!(
        error.status_code,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) {
        return false;
    }

    !matches!(
        client_api_error_kind(error),
        Some(
            ErrorKind::Forbidden { .. }
                | ErrorKind::LimitExceeded { .. }
                | ErrorKind::MissingToken
                | ErrorKind::UnknownToken { .. }
                | ErrorKind::Unauthorized
                | ErrorKind::UserDeactivated
                | ErrorKind::UserLocked
                | ErrorKind::UserSuspended
        )
    )
}
