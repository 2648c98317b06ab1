// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2025 Ridelink Contributors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Enumerations for the tracking domain.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The lifecycle status of a ride as reported over the wire.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Hash,
    PartialEq,
    Eq,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// The ride has been requested but not yet assigned.
    Requested,
    /// A driver has accepted the ride.
    Accepted,
    /// The ride is scheduled for a future time.
    Scheduled,
    /// The vehicle is en route with the passenger.
    InProgress,
    /// The passenger has requested an early stop.
    StopRequested,
    /// The ride finished normally.
    Completed,
    /// The ride was cancelled.
    Cancelled,
}

impl RideStatus {
    /// Returns true if no further status transitions can occur.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}
