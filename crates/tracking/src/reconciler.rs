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

//! Polling reconciler, the fallback read path when push delivery is silent.
//!
//! Periodically fetches the ride state over REST and injects the result into
//! the ride's local topic channel, so fallback reads flow through the same
//! consumer and the same recency rule as pushed frames.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ridelink_model::{RideId, TrackingUpdate};

use crate::{client::LiveTrackingClient, error::TrackingError, topics::ride_tracking_topic};

/// Read path for the current tracking state of a ride.
#[async_trait]
pub trait RideStateSource: Send + Sync {
    /// Fetches the latest tracking state, `None` when the server has nothing
    /// for the ride yet.
    async fn fetch(&self, ride_id: RideId) -> Result<Option<TrackingUpdate>, TrackingError>;
}

/// Handle to a running polling loop for one ride.
#[derive(Debug)]
pub struct PollReconciler {
    ride_id: RideId,
    task: tokio::task::JoinHandle<()>,
}

impl PollReconciler {
    /// Starts polling `source` every `interval` and injecting results into
    /// the ride's topic channel.
    ///
    /// Fetch errors are logged and polling continues.
    #[must_use]
    pub fn start(
        source: Arc<dyn RideStateSource>,
        client: LiveTrackingClient,
        ride_id: RideId,
        interval: Duration,
    ) -> Self {
        tracing::debug!("Started task 'reconcile' for ride {ride_id}");

        let task = tokio::task::spawn(async move {
            let topic = ride_tracking_topic(ride_id);
            let mut ticker = tokio::time::interval(interval);
            // The first interval tick fires immediately; the poller is a
            // fallback, so wait one full interval before the first fetch
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match source.fetch(ride_id).await {
                    Ok(Some(update)) => {
                        if !client.inject(&topic, update) {
                            tracing::debug!("No interest in ride {ride_id}, reconcile dropped");
                        }
                    }
                    Ok(None) => {
                        tracing::trace!("No tracking state for ride {ride_id} yet");
                    }
                    Err(e) => {
                        tracing::warn!("Reconcile fetch for ride {ride_id} failed: {e}");
                    }
                }
            }
        });

        Self { ride_id, task }
    }

    /// Returns the ride being reconciled.
    #[must_use]
    pub const fn ride_id(&self) -> RideId {
        self.ride_id
    }

    /// Stops the polling loop.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'reconcile' for ride {}", self.ride_id);
        }
    }
}

impl Drop for PollReconciler {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'reconcile'");
        }
    }
}
