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

//! Route position simulator.
//!
//! Advances a vehicle along a route plan one waypoint per tick, publishing a
//! synthetic location update with the heading from the previous waypoint. The
//! pure state advance lives in [`RouteCursor`] so movement logic is testable
//! without timers or I/O.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use ridelink_model::{GeoPoint, LocationUpdate, RideId, RouteError, RoutePlan, bearing_degrees};

use crate::{client::LiveTrackingClient, error::TrackingError};

/// Outbound path for simulated location updates.
///
/// Implemented by the duplex publish path and by the REST fallback gateway.
#[async_trait]
pub trait LocationSink: Send + Sync {
    /// Publishes one location update for the given ride.
    async fn publish(&self, ride_id: RideId, update: LocationUpdate)
    -> Result<(), TrackingError>;
}

#[async_trait]
impl LocationSink for LiveTrackingClient {
    async fn publish(
        &self,
        ride_id: RideId,
        update: LocationUpdate,
    ) -> Result<(), TrackingError> {
        self.publish_location(ride_id, update).await
    }
}

/// One simulated movement step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimStep {
    /// The waypoint reached by this step.
    pub point: GeoPoint,
    /// The great-circle bearing from the previous waypoint, in degrees.
    pub heading_degrees: f64,
}

/// Pure cursor over a route plan; the index only ever increases.
#[derive(Clone, Debug)]
pub struct RouteCursor {
    plan: RoutePlan,
    index: usize,
}

impl RouteCursor {
    /// Creates a new [`RouteCursor`] positioned at the first waypoint.
    #[must_use]
    pub const fn new(plan: RoutePlan) -> Self {
        Self { plan, index: 0 }
    }

    /// Returns the current waypoint, if the plan is non-empty.
    #[must_use]
    pub fn current(&self) -> Option<GeoPoint> {
        self.plan.get(self.index)
    }

    /// Advances to the next waypoint.
    ///
    /// Returns the reached waypoint together with the heading from the
    /// previous one, or `None` when already at the final waypoint.
    pub fn advance(&mut self) -> Option<SimStep> {
        let from = self.plan.get(self.index)?;
        let to = self.plan.get(self.index + 1)?;
        self.index += 1;

        Some(SimStep {
            point: to,
            heading_degrees: bearing_degrees(from, to),
        })
    }

    /// Returns `true` when the cursor sits at the final waypoint (or the plan
    /// is empty).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.index + 1 >= self.plan.len()
    }
}

/// Handle to a running route simulation.
///
/// The simulation publishes the initial position immediately, then one step
/// per tick until the final waypoint, where `on_complete` fires exactly once.
/// Cancellation suppresses completion permanently.
#[derive(Debug)]
pub struct RouteSimulator {
    ride_id: RideId,
    task: tokio::task::JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
    last_position: Arc<Mutex<Option<GeoPoint>>>,
}

impl RouteSimulator {
    /// Starts simulating movement along `plan` for `ride_id`.
    ///
    /// Publish failures are logged and the simulation keeps moving, local
    /// movement stays authoritative. Zero- and one-waypoint plans never start
    /// a tick; a single-point plan emits the initial update only, then
    /// completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan contains non-finite coordinates.
    pub fn start<F>(
        ride_id: RideId,
        plan: RoutePlan,
        sink: Arc<dyn LocationSink>,
        tick: Duration,
        on_complete: F,
    ) -> Result<Self, TrackingError>
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(index) = plan.waypoints().iter().position(|p| !p.is_finite()) {
            return Err(TrackingError::InvalidRoute(
                RouteError::NonFiniteCoordinate { index },
            ));
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let last_position: Arc<Mutex<Option<GeoPoint>>> = Arc::new(Mutex::new(None));

        let task = Self::spawn_drive_task(
            ride_id,
            RouteCursor::new(plan),
            sink,
            tick,
            on_complete,
            last_position.clone(),
        );

        Ok(Self {
            ride_id,
            task,
            cancelled,
            last_position,
        })
    }

    /// Returns the ride being simulated.
    #[must_use]
    pub const fn ride_id(&self) -> RideId {
        self.ride_id
    }

    /// Returns the last published position, if any.
    #[must_use]
    pub fn last_position(&self) -> Option<GeoPoint> {
        *self.last_position.lock().expect("last position lock poisoned")
    }

    /// Returns `true` once the drive task has ended, by arrival or
    /// cancellation.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.task.is_finished()
    }

    /// Stops the simulation immediately and suppresses completion.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::Relaxed) {
            return;
        }

        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'drive' for ride {}", self.ride_id);
        }
    }

    fn spawn_drive_task<F>(
        ride_id: RideId,
        mut cursor: RouteCursor,
        sink: Arc<dyn LocationSink>,
        tick: Duration,
        on_complete: F,
        last_position: Arc<Mutex<Option<GeoPoint>>>,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        tracing::debug!("Started task 'drive' for ride {ride_id}");

        tokio::task::spawn(async move {
            // Initial update at waypoint 0, before the first tick
            if let Some(point) = cursor.current() {
                *last_position.lock().expect("last position lock poisoned") = Some(point);
                if let Err(e) = sink.publish(ride_id, LocationUpdate::now(point, None)).await {
                    tracing::warn!("Failed to publish initial position: {e}");
                }
            }

            if cursor.is_finished() {
                tracing::debug!("Route for ride {ride_id} has no further waypoints");
                on_complete();
                return;
            }

            let mut ticker = tokio::time::interval(tick);
            // The first interval tick fires immediately; the initial update
            // already went out, so consume it
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(step) = cursor.advance() else {
                    break;
                };

                *last_position.lock().expect("last position lock poisoned") = Some(step.point);

                let update = LocationUpdate::now(step.point, Some(step.heading_degrees));
                if let Err(e) = sink.publish(ride_id, update).await {
                    tracing::warn!("Failed to publish position for ride {ride_id}: {e}");
                }

                if cursor.is_finished() {
                    tracing::debug!("Ride {ride_id} reached its final waypoint");
                    on_complete();
                    break;
                }
            }

            tracing::debug!("Completed task 'drive' for ride {ride_id}");
        })
    }
}

impl Drop for RouteSimulator {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.task.abort();
            tracing::debug!("Aborted task 'drive'");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<(RideId, LocationUpdate)>>,
    }

    #[async_trait]
    impl LocationSink for RecordingSink {
        async fn publish(
            &self,
            ride_id: RideId,
            update: LocationUpdate,
        ) -> Result<(), TrackingError> {
            self.published.lock().unwrap().push((ride_id, update));
            Ok(())
        }
    }

    fn plan(points: &[(f64, f64)]) -> RoutePlan {
        RoutePlan::new(
            points
                .iter()
                .map(|(lat, lon)| GeoPoint {
                    latitude: *lat,
                    longitude: *lon,
                })
                .collect(),
        )
        .unwrap()
    }

    #[rstest]
    fn test_cursor_advances_once_per_step() {
        let mut cursor = RouteCursor::new(plan(&[(45.0, 19.0), (45.001, 19.0), (45.002, 19.0)]));

        assert!(!cursor.is_finished());
        assert_eq!(
            cursor.current(),
            Some(GeoPoint {
                latitude: 45.0,
                longitude: 19.0
            })
        );

        let step = cursor.advance().unwrap();
        assert_eq!(step.point.latitude, 45.001);
        // Due north
        assert!(step.heading_degrees.abs() < 1.0);

        let step = cursor.advance().unwrap();
        assert_eq!(step.point.latitude, 45.002);
        assert!(cursor.is_finished());

        assert!(cursor.advance().is_none());
        assert!(cursor.advance().is_none());
    }

    #[rstest]
    fn test_cursor_empty_plan() {
        let mut cursor = RouteCursor::new(RoutePlan::new(Vec::new()).unwrap());
        assert!(cursor.is_finished());
        assert_eq!(cursor.current(), None);
        assert!(cursor.advance().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_waypoint_plan_completes_once() {
        let sink = Arc::new(RecordingSink::default());
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let simulator = RouteSimulator::start(
            RideId::new(42),
            plan(&[(45.0, 19.0), (45.001, 19.0), (45.002, 19.0)]),
            sink.clone(),
            Duration::from_millis(1_500),
            move || {
                completions_clone.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        // Initial update plus one step per remaining waypoint
        let published = sink.published.lock().unwrap().clone();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].1.heading, None);
        assert!(published[1].1.heading.is_some());
        assert_eq!(completions.load(Ordering::Relaxed), 1);
        assert!(simulator.is_finished());
        assert_eq!(
            simulator.last_position(),
            Some(GeoPoint {
                latitude: 45.002,
                longitude: 19.0
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_point_plan_emits_initial_only() {
        let sink = Arc::new(RecordingSink::default());
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let _simulator = RouteSimulator::start(
            RideId::new(1),
            plan(&[(45.0, 19.0)]),
            sink.clone(),
            Duration::from_millis(1_500),
            move || {
                completions_clone.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(sink.published.lock().unwrap().len(), 1);
        assert_eq!(completions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_completion() {
        let sink = Arc::new(RecordingSink::default());
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let simulator = RouteSimulator::start(
            RideId::new(42),
            plan(&[(45.0, 19.0), (45.001, 19.0), (45.002, 19.0)]),
            sink.clone(),
            Duration::from_secs(60),
            move || {
                completions_clone.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        // Let the initial update go out, then cancel between ticks
        tokio::time::sleep(Duration::from_millis(10)).await;
        simulator.cancel();
        assert!(simulator.is_finished());

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(sink.published.lock().unwrap().len(), 1);
        assert_eq!(completions.load(Ordering::Relaxed), 0);

        // Cancelling again is a no-op
        simulator.cancel();
        assert_eq!(completions.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_plan_completes_without_publishing() {
        let sink = Arc::new(RecordingSink::default());
        let completions = Arc::new(AtomicUsize::new(0));

        let completions_clone = completions.clone();
        let _simulator = RouteSimulator::start(
            RideId::new(1),
            RoutePlan::new(Vec::new()).unwrap(),
            sink.clone(),
            Duration::from_millis(1_500),
            move || {
                completions_clone.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(sink.published.lock().unwrap().is_empty());
        assert_eq!(completions.load(Ordering::Relaxed), 1);
    }
}
