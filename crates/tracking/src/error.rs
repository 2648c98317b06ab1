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

use thiserror::Error;

/// Errors raised by the tracking client and its helpers.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A route plan could not be parsed or contains invalid coordinates.
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] ridelink_model::RouteError),

    /// The duplex connection is not established.
    #[error("Client is not connected")]
    NotConnected,

    /// A wire message could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] ridelink_network::error::NetworkError),

    /// The REST fallback path failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
