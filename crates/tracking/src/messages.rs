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

//! Wire message envelopes for the duplex channel.

use ridelink_model::{LocationUpdate, TrackingUpdate};
use serde::{Deserialize, Serialize};

/// An outbound request on the duplex channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientRequest {
    /// Subscribes to a topic; `id` is the client-generated subscription handle
    /// the server echoes on acknowledgment.
    Subscribe { id: u64, topic: String },
    /// Releases a previously acquired subscription.
    Unsubscribe { id: u64, topic: String },
    /// Publishes a location update onto a topic.
    Publish { topic: String, data: LocationUpdate },
}

/// An inbound data frame from the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServerFrame {
    /// The topic the frame was published on.
    pub topic: String,
    /// The tracking payload.
    pub data: TrackingUpdate,
}
