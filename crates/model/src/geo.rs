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

//! Geographic primitives: coordinate pairs, great-circle bearing math, and
//! immutable route plans.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing or parsing a [`RoutePlan`].
#[derive(Debug, Error)]
pub enum RouteError {
    /// A waypoint carried a non-finite latitude or longitude.
    #[error("non-finite coordinate at waypoint {index}")]
    NonFiniteCoordinate { index: usize },
    /// A serialized waypoint was not a `[lat, lng]` pair.
    #[error("malformed waypoint at index {index}")]
    MalformedWaypoint { index: usize },
    /// The serialized route could not be parsed as JSON.
    #[error("invalid route JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A WGS-84 coordinate pair in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a new [`GeoPoint`] instance.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Computes the initial great-circle bearing from `from` to `to`.
///
/// Uses the standard formula
/// `atan2(sin Δλ · cos φ2, cos φ1 · sin φ2 − sin φ1 · cos φ2 · cos Δλ)`
/// and normalizes the result to degrees clockwise from north in `[0, 360)`.
#[must_use]
pub fn bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    let theta = y.atan2(x).to_degrees();

    (theta + 360.0) % 360.0
}

/// An immutable ordered sequence of route waypoints.
///
/// A plan is validated on construction: every waypoint must carry finite
/// coordinates. Once built it never changes, so a running simulation can hold
/// it without revalidating.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutePlan {
    waypoints: Vec<GeoPoint>,
}

impl RoutePlan {
    /// Creates a new [`RoutePlan`] from the given waypoints.
    ///
    /// # Errors
    ///
    /// Returns an error if any waypoint carries a non-finite coordinate.
    pub fn new(waypoints: Vec<GeoPoint>) -> Result<Self, RouteError> {
        for (index, point) in waypoints.iter().enumerate() {
            if !point.is_finite() {
                return Err(RouteError::NonFiniteCoordinate { index });
            }
        }
        Ok(Self { waypoints })
    }

    /// Parses a plan from the serialized `[[lat, lng], ...]` form the backend
    /// stores for a ride's route.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid, a pair is malformed, or a
    /// coordinate is non-finite. A partially valid route is rejected whole
    /// rather than silently truncated.
    pub fn parse_json(raw: &str) -> Result<Self, RouteError> {
        let pairs: Vec<Vec<f64>> = serde_json::from_str(raw)?;
        let mut waypoints = Vec::with_capacity(pairs.len());

        for (index, pair) in pairs.iter().enumerate() {
            if pair.len() < 2 {
                return Err(RouteError::MalformedWaypoint { index });
            }
            waypoints.push(GeoPoint::new(pair[0], pair[1]));
        }

        Self::new(waypoints)
    }

    /// Returns the waypoints in order.
    #[must_use]
    pub fn waypoints(&self) -> &[GeoPoint] {
        &self.waypoints
    }

    /// Returns the number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Returns true if the plan has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Returns the first waypoint, if any.
    #[must_use]
    pub fn first(&self) -> Option<GeoPoint> {
        self.waypoints.first().copied()
    }

    /// Returns the last waypoint, if any.
    #[must_use]
    pub fn last(&self) -> Option<GeoPoint> {
        self.waypoints.last().copied()
    }

    /// Returns the waypoint at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<GeoPoint> {
        self.waypoints.get(index).copied()
    }
}
