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

use std::time::Duration;

/// Configuration for the live tracking client.
#[derive(Clone, Debug)]
pub struct TrackingConfig {
    /// The base REST API URL, for example `https://api.ridelink.io/api/v1`.
    pub base_url: String,
    /// Optional bearer token attached to the WebSocket upgrade and REST calls.
    pub token: Option<String>,
    /// The heartbeat interval (seconds) on the duplex channel.
    pub heartbeat_secs: u64,
    /// The initial reconnection delay (milliseconds).
    pub reconnect_delay_initial_ms: u64,
    /// The maximum reconnection delay (milliseconds).
    pub reconnect_delay_max_ms: u64,
    /// The exponential backoff factor for reconnection delays.
    pub reconnect_backoff_factor: f64,
    /// The maximum random jitter (milliseconds) added to reconnection delays.
    pub reconnect_jitter_ms: u64,
    /// The maximum number of consecutive reconnection attempts before the
    /// duplex client closes; `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
    /// The simulator tick interval.
    pub simulation_tick: Duration,
    /// The polling reconciler interval.
    pub reconcile_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            token: None,
            heartbeat_secs: 10,
            reconnect_delay_initial_ms: 3_000,
            reconnect_delay_max_ms: 30_000,
            reconnect_backoff_factor: 2.0,
            reconnect_jitter_ms: 0,
            reconnect_max_attempts: Some(5),
            simulation_tick: Duration::from_millis(1_500),
            reconcile_interval: Duration::from_millis(5_000),
        }
    }
}

impl TrackingConfig {
    /// Creates a new [`TrackingConfig`] for the given base API URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the heartbeat interval in seconds.
    #[must_use]
    pub const fn with_heartbeat_secs(mut self, secs: u64) -> Self {
        self.heartbeat_secs = secs;
        self
    }

    /// Sets the maximum number of reconnection attempts.
    #[must_use]
    pub const fn with_reconnect_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }

    /// Sets the simulator tick interval.
    #[must_use]
    pub const fn with_simulation_tick(mut self, tick: Duration) -> Self {
        self.simulation_tick = tick;
        self
    }

    /// Sets the polling reconciler interval.
    #[must_use]
    pub const fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }
}
