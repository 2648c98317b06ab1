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

//! Wire schemas for tracking events and outbound location updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{enums::RideStatus, geo::GeoPoint, identifiers::RideId};

/// A per-ride tracking event, produced by the simulator or received from the
/// network.
///
/// Every field except `ride_id` is optional: an unset numeric field means
/// "no update", never zero. Consumers merge updates into their last known
/// state rather than replacing it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingUpdate {
    pub ride_id: RideId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_to_destination_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RideStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_status: Option<RideStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl TrackingUpdate {
    /// Returns the vehicle position when both coordinates are present.
    #[must_use]
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.vehicle_latitude, self.vehicle_longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Returns the effective ride status.
    ///
    /// The `rideStatus` field takes precedence over `status`; the server
    /// populates both during a migration window and `rideStatus` is the
    /// authoritative one.
    #[must_use]
    pub fn effective_status(&self) -> Option<RideStatus> {
        self.ride_status.or(self.status)
    }

    /// Returns true if the effective status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.effective_status().is_some_and(|s| s.is_terminal())
    }
}

/// The outbound location publish payload.
///
/// Carried identically by the duplex publish path and the REST fallback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl LocationUpdate {
    /// Creates a new [`LocationUpdate`] stamped with the current time.
    #[must_use]
    pub fn now(point: GeoPoint, heading: Option<f64>) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            heading,
            speed: None,
            recorded_at: Utc::now(),
        }
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
    fn test_deserialize_sparse_update() {
        let json = r#"{"rideId": 12, "rideStatus": "COMPLETED"}"#;
        let update: TrackingUpdate = serde_json::from_str(json).unwrap();

        assert_eq!(update.ride_id, RideId::new(12));
        assert_eq!(update.vehicle_latitude, None);
        assert_eq!(update.estimated_time_to_destination_minutes, None);
        assert!(update.is_terminal());
    }

    #[rstest]
    fn test_position_requires_both_coordinates() {
        let update = TrackingUpdate {
            ride_id: RideId::new(1),
            vehicle_latitude: Some(45.0),
            ..Default::default()
        };
        assert_eq!(update.position(), None);

        let update = TrackingUpdate {
            vehicle_longitude: Some(19.0),
            ..update
        };
        assert_eq!(update.position(), Some(GeoPoint::new(45.0, 19.0)));
    }

    #[rstest]
    fn test_effective_status_prefers_ride_status() {
        let update = TrackingUpdate {
            ride_id: RideId::new(1),
            status: Some(RideStatus::InProgress),
            ride_status: Some(RideStatus::Completed),
            ..Default::default()
        };
        assert_eq!(update.effective_status(), Some(RideStatus::Completed));
    }

    #[rstest]
    fn test_serialize_skips_unset_fields() {
        let update = TrackingUpdate {
            ride_id: RideId::new(3),
            vehicle_latitude: Some(45.0),
            vehicle_longitude: Some(19.0),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();

        assert!(json.contains("\"rideId\":3"));
        assert!(json.contains("vehicleLatitude"));
        assert!(!json.contains("heading"));
        assert!(!json.contains("status"));
    }

    #[rstest]
    fn test_location_update_camel_case() {
        let update = LocationUpdate::now(GeoPoint::new(45.0, 19.0), Some(90.0));
        let json = serde_json::to_string(&update).unwrap();

        assert!(json.contains("\"latitude\":45.0"));
        assert!(json.contains("\"recordedAt\""));
        assert!(json.contains("\"heading\":90.0"));
    }
}
