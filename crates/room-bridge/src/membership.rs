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

//! Simplified view of our own membership in a room.

use std::collections::BTreeMap;

use ruma::{OwnedRoomId, RoomId, events::room::member::MembershipState};
use serde::{Deserialize, Serialize};

/// Enum keeping track of our relationship to a room, e.g. if our own user is
/// joined, invited, or has left the room.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MembershipStatus {
    /// We're not a member of the room, or our membership is unknown.
    #[default]
    None,
    /// We've been invited to the room.
    Invited,
    /// We're in the room.
    Joined,
    /// We've left the room, or have been kicked from it.
    Left,
    /// We've been banned from the room.
    Banned,
}

impl From<&MembershipState> for MembershipStatus {
    fn from(membership_state: &MembershipState) -> Self {
        match membership_state {
            MembershipState::Ban => Self::Banned,
            MembershipState::Invite => Self::Invited,
            MembershipState::Join => Self::Joined,
            MembershipState::Leave => Self::Left,
            // A knock doesn't give any access to the room, and neither does a
            // membership we don't understand.
            _ => Self::None,
        }
    }
}

/// What is known about a room at a given point in time, as far as our own
/// membership is concerned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSummarySnapshot {
    /// The ID of the room.
    pub room_id: OwnedRoomId,
    /// Our own membership in the room, if we know it.
    pub membership: Option<MembershipState>,
}

impl RoomSummarySnapshot {
    /// Create a new snapshot.
    pub fn new(room_id: OwnedRoomId, membership: Option<MembershipState>) -> Self {
        Self { room_id, membership }
    }
}

/// Get the simplified membership status of the given room summary.
pub fn membership(summary: &RoomSummarySnapshot) -> MembershipStatus {
    summary.membership.as_ref().map(MembershipStatus::from).unwrap_or_default()
}

/// A source of [`RoomSummarySnapshot`]s.
pub trait RoomSummaryProvider {
    /// Get the current summary of the given room, if the room is known.
    fn room_summary(&self, room_id: &RoomId) -> Option<RoomSummarySnapshot>;
}

impl RoomSummaryProvider for BTreeMap<OwnedRoomId, RoomSummarySnapshot> {
    fn room_summary(&self, room_id: &RoomId) -> Option<RoomSummarySnapshot> {
        self.get(room_id).cloned()
    }
}

/// Get the simplified membership status of a room from `provider`.
///
/// Rooms the provider doesn't know about are reported as
/// [`MembershipStatus::None`].
pub fn membership_in<P>(provider: &P, room_id: &RoomId) -> MembershipStatus
where
    P: RoomSummaryProvider + ?Sized,
{
    provider.room_summary(room_id).map(|summary| membership(&summary)).unwrap_or_default()
}
