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

//! Identifier types for the tracking domain.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A numeric ride identifier.
///
/// Matches the `rideId` field of the wire schema and is transparent in JSON.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RideId(u64);

impl RideId {
    /// Creates a new [`RideId`] instance.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the inner numeric value.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl Display for RideId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RideId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_display_and_inner() {
        let ride_id = RideId::new(42);
        assert_eq!(ride_id.to_string(), "42");
        assert_eq!(ride_id.inner(), 42);
    }

    #[rstest]
    fn test_serde_transparent() {
        let ride_id = RideId::new(7);
        let json = serde_json::to_string(&ride_id).unwrap();
        assert_eq!(json, "7");

        let parsed: RideId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, ride_id);
    }
}
