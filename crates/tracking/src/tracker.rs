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

//! Per-ride tracking consumer.
//!
//! Subscribes to one ride's tracking topic and folds the update stream into a
//! position snapshot until the ride reaches a terminal status. Updates older
//! than the current snapshot (by `recorded_at`) are dropped, so the pushed
//! stream and the polling fallback can feed the same consumer without
//! position jumps.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use ridelink_model::{GeoPoint, RideId, RideStatus, TrackingUpdate};
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::{broadcast, watch};

use crate::{client::LiveTrackingClient, topics::ride_tracking_topic};

/// Lifecycle of a [`RideTracker`]; terminal states accept no transitions.
#[derive(Clone, Copy, Debug, Default, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerState {
    /// No tracking subscription yet.
    #[default]
    Idle,
    /// Consuming updates from the ride's topic.
    Tracking,
    /// The ride reached a terminal status.
    Completed,
    /// Tracking was stopped locally before the ride ended.
    Stopped,
}

impl TrackerState {
    /// Returns `true` for states that accept no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }
}

/// The latest known tracking state of one ride.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingSnapshot {
    /// The last reported vehicle position.
    pub position: Option<GeoPoint>,
    /// The last reported ETA in minutes.
    pub eta_minutes: Option<u32>,
    /// The last reported ride status.
    pub status: Option<RideStatus>,
    /// The server timestamp of the applied update.
    pub recorded_at: Option<DateTime<Utc>>,
    /// The tracker lifecycle state.
    pub state: TrackerState,
}

impl TrackingSnapshot {
    /// Returns `true` when an update with the given timestamp is older than
    /// this snapshot. Updates without a timestamp are treated as fresh.
    fn is_stale(&self, recorded_at: Option<DateTime<Utc>>) -> bool {
        match (self.recorded_at, recorded_at) {
            (Some(current), Some(incoming)) => incoming < current,
            _ => false,
        }
    }
}

/// Consumes one ride's tracking topic into a live snapshot.
#[derive(Debug)]
pub struct RideTracker {
    ride_id: RideId,
    topic: String,
    client: LiveTrackingClient,
    snapshot_tx: Arc<watch::Sender<TrackingSnapshot>>,
    task: tokio::task::JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

impl RideTracker {
    /// Starts tracking the given ride.
    ///
    /// Subscribes to the ride's topic and spawns the consume task. When a
    /// terminal status arrives the tracker unsubscribes, transitions to
    /// `Completed` and invokes `on_complete` exactly once.
    pub async fn track<F>(client: &LiveTrackingClient, ride_id: RideId, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let topic = ride_tracking_topic(ride_id);
        let rx = client.subscribe(&topic).await;

        let snapshot_tx = Arc::new(watch::channel(TrackingSnapshot::default()).0);
        snapshot_tx.send_modify(|snapshot| snapshot.state = TrackerState::Tracking);

        let finished = Arc::new(AtomicBool::new(false));

        let task = Self::spawn_consume_task(
            client.clone(),
            ride_id,
            topic.clone(),
            rx,
            snapshot_tx.clone(),
            finished.clone(),
            on_complete,
        );

        Self {
            ride_id,
            topic,
            client: client.clone(),
            snapshot_tx,
            task,
            finished,
        }
    }

    /// Returns the tracked ride.
    #[must_use]
    pub const fn ride_id(&self) -> RideId {
        self.ride_id
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Returns a watch receiver for snapshot transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TrackingSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Stops tracking without completion.
    ///
    /// Idempotent; no further topic traffic is produced afterwards. Has no
    /// effect once the tracker reached a terminal state.
    pub async fn stop_tracking(&self) {
        if self.finished.swap(true, Ordering::Relaxed) {
            return;
        }

        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'consume' for ride {}", self.ride_id);
        }

        self.snapshot_tx
            .send_modify(|snapshot| snapshot.state = TrackerState::Stopped);
        self.client.unsubscribe(&self.topic).await;

        tracing::debug!("Stopped tracking ride {}", self.ride_id);
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_consume_task<F>(
        client: LiveTrackingClient,
        ride_id: RideId,
        topic: String,
        mut rx: broadcast::Receiver<TrackingUpdate>,
        snapshot_tx: Arc<watch::Sender<TrackingSnapshot>>,
        finished: Arc<AtomicBool>,
        on_complete: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        tracing::debug!("Started task 'consume' for ride {ride_id}");

        tokio::task::spawn(async move {
            let mut on_complete = Some(on_complete);

            loop {
                let update = match rx.recv().await {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Consumer for ride {ride_id} lagged, skipped {skipped}");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Topic channel for ride {ride_id} closed");
                        break;
                    }
                };

                if snapshot_tx.borrow().is_stale(update.recorded_at) {
                    tracing::trace!("Dropping stale update for ride {ride_id}");
                    continue;
                }

                let terminal = update.is_terminal();

                snapshot_tx.send_modify(|snapshot| {
                    if let Some(position) = update.position() {
                        snapshot.position = Some(position);
                    }
                    if let Some(eta) = update.estimated_time_to_destination_minutes {
                        snapshot.eta_minutes = Some(eta);
                    }
                    if let Some(status) = update.effective_status() {
                        snapshot.status = Some(status);
                    }
                    if update.recorded_at.is_some() {
                        snapshot.recorded_at = update.recorded_at;
                    }
                    if terminal {
                        snapshot.state = TrackerState::Completed;
                    }
                });

                if terminal {
                    if !finished.swap(true, Ordering::Relaxed) {
                        client.unsubscribe(&topic).await;
                        if let Some(on_complete) = on_complete.take() {
                            on_complete();
                        }
                    }
                    break;
                }
            }

            tracing::debug!("Completed task 'consume' for ride {ride_id}");
        })
    }
}

impl Drop for RideTracker {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'consume'");
        }

        // Release the topic interest if the tracker is dropped mid-tracking,
        // otherwise the registry keeps the channel and server subscription
        if !self.finished.swap(true, Ordering::Relaxed)
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let client = self.client.clone();
            let topic = std::mem::take(&mut self.topic);
            handle.spawn(async move {
                client.unsubscribe(&topic).await;
            });
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use chrono::TimeZone;

    use super::*;
    use crate::config::TrackingConfig;

    const TOPIC: &str = "/topic/rides/42/tracking";

    fn offline_client() -> LiveTrackingClient {
        LiveTrackingClient::new(TrackingConfig::default())
    }

    fn update_at(latitude: f64, secs: i64) -> TrackingUpdate {
        TrackingUpdate {
            ride_id: RideId::new(42),
            vehicle_latitude: Some(latitude),
            vehicle_longitude: Some(19.83),
            ride_status: Some(RideStatus::InProgress),
            recorded_at: Some(Utc.timestamp_opt(secs, 0).unwrap()),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_snapshot_follows_updates() {
        let client = offline_client();
        let tracker = RideTracker::track(&client, RideId::new(42), || {}).await;

        assert_eq!(tracker.snapshot().state, TrackerState::Tracking);

        client.inject(TOPIC, update_at(45.25, 100));
        settle().await;

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.position,
            Some(GeoPoint::new(45.25, 19.83))
        );
        assert_eq!(snapshot.status, Some(RideStatus::InProgress));
        assert_eq!(snapshot.state, TrackerState::Tracking);
    }

    #[tokio::test]
    async fn test_stale_update_is_ignored() {
        let client = offline_client();
        let tracker = RideTracker::track(&client, RideId::new(42), || {}).await;

        client.inject(TOPIC, update_at(45.25, 200));
        settle().await;

        // Older timestamp, must not move the snapshot backwards
        client.inject(TOPIC, update_at(44.0, 100));
        settle().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.position.map(|p| p.latitude), Some(45.25));
        assert_eq!(
            snapshot.recorded_at,
            Some(Utc.timestamp_opt(200, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_update_without_timestamp_is_applied() {
        let client = offline_client();
        let tracker = RideTracker::track(&client, RideId::new(42), || {}).await;

        client.inject(TOPIC, update_at(45.25, 200));
        settle().await;

        let mut untimestamped = update_at(46.0, 0);
        untimestamped.recorded_at = None;
        client.inject(TOPIC, untimestamped);
        settle().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.position.map(|p| p.latitude), Some(46.0));
        // The previous timestamp is retained
        assert_eq!(
            snapshot.recorded_at,
            Some(Utc.timestamp_opt(200, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_terminal_update_completes_once() {
        let client = offline_client();
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let tracker = RideTracker::track(&client, RideId::new(42), move || {
            completions_clone.fetch_add(1, Ordering::Relaxed);
        })
        .await;

        let mut terminal = update_at(45.3, 300);
        terminal.ride_status = Some(RideStatus::Completed);
        client.inject(TOPIC, terminal);
        settle().await;

        assert_eq!(tracker.snapshot().state, TrackerState::Completed);
        assert_eq!(completions.load(Ordering::Relaxed), 1);

        // Unsubscribed: nothing listens on the topic any more
        assert!(!client.inject(TOPIC, update_at(45.4, 400)));

        // Stopping after completion is a no-op
        tracker.stop_tracking().await;
        assert_eq!(tracker.snapshot().state, TrackerState::Completed);
        assert_eq!(completions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stop_tracking_is_idempotent() {
        let client = offline_client();
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let tracker = RideTracker::track(&client, RideId::new(42), move || {
            completions_clone.fetch_add(1, Ordering::Relaxed);
        })
        .await;

        tracker.stop_tracking().await;
        tracker.stop_tracking().await;

        assert_eq!(tracker.snapshot().state, TrackerState::Stopped);
        assert_eq!(completions.load(Ordering::Relaxed), 0);

        // Unsubscribed: the topic has no remaining interest
        assert!(!client.inject(TOPIC, update_at(45.25, 100)));
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let client = offline_client();
        let tracker = RideTracker::track(&client, RideId::new(42), || {}).await;

        assert!(client.inject(TOPIC, update_at(45.25, 100)));

        drop(tracker);
        settle().await;

        // The dropped tracker must not leave the topic registered
        assert!(!client.inject(TOPIC, update_at(45.3, 200)));
    }

    #[tokio::test]
    async fn test_watch_observes_transitions() {
        let client = offline_client();
        let tracker = RideTracker::track(&client, RideId::new(42), || {}).await;
        let mut watch = tracker.watch();

        client.inject(TOPIC, update_at(45.25, 100));

        tokio::time::timeout(Duration::from_secs(1), watch.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            watch.borrow().position,
            Some(GeoPoint::new(45.25, 19.83))
        );
    }
}
