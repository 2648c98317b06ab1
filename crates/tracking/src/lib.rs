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

//! Real-time ride tracking client for the Ridelink platform.
//!
//! This crate provides the client side of the live position distribution
//! system:
//!
//! - [`LiveTrackingClient`](client::LiveTrackingClient) multiplexes any number
//!   of topic subscriptions over a single duplex WebSocket connection and
//!   restores them transparently after a reconnect.
//! - [`RouteSimulator`](simulator::RouteSimulator) advances a vehicle along a
//!   route plan on a fixed tick, publishing synthetic location updates.
//! - [`RideTracker`](tracker::RideTracker) consumes one ride's tracking topic
//!   and maintains the latest position snapshot until the ride reaches a
//!   terminal status.
//! - [`PollReconciler`](reconciler::PollReconciler) periodically fetches the
//!   ride state over REST and feeds it through the same consumer path when
//!   push delivery is silent.

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod reconciler;
pub mod registry;
pub mod rest;
pub mod simulator;
pub mod topics;
pub mod tracker;
