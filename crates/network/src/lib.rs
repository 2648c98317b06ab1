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

//! Duplex transport machinery for the Ridelink tracking core.
//!
//! Provides a WebSocket client with automatic reconnection (exponential
//! backoff with an attempt cap), a fixed-interval heartbeat, and a
//! synchronously readable connectivity signal. The transport is
//! domain-agnostic: topics and payloads are opaque text frames here, and the
//! multiplexing layer above decides what they mean.

pub mod backoff;
pub mod client;
pub mod error;
pub mod mode;

/// Sentinel text frame injected into the consumer channel after every
/// successful reconnection, so the consumer can replay its subscriptions.
pub const RECONNECTED: &str = "__RECONNECTED__";
