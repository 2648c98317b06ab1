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

//! Domain model for the Ridelink real-time tracking core.
//!
//! Pure data types shared across the transport and tracking crates: ride
//! identifiers, geographic primitives with great-circle bearing math, the
//! ride status state set, route plans, and the tracking/location wire
//! schemas. No I/O lives here.

pub mod enums;
pub mod events;
pub mod geo;
pub mod identifiers;

pub use enums::RideStatus;
pub use events::{LocationUpdate, TrackingUpdate};
pub use geo::{GeoPoint, RouteError, RoutePlan, bearing_degrees};
pub use identifiers::RideId;
