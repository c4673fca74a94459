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
#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use ruma;

pub mod config;
mod error;
pub mod membership;
pub mod room_creation;
mod task_handle;
mod transport;

pub use error::{CreateRoomError, Result, TransportError};
pub use membership::{
    MembershipStatus, RoomSummaryProvider, RoomSummarySnapshot, membership, membership_in,
};
pub use room_creation::{
    CreateRoomHandle, RoomCreationClient, RoomCreationRequest, RoomCreationRequestBuilder,
    RoomPreset, RoomVisibility, ThirdPartyInvite,
};
pub use task_handle::CancellableOperation;
pub use transport::{CreateRoomTransport, SendFuture};

#[cfg(test)]
room_bridge_test::init_tracing_for_tests!();
