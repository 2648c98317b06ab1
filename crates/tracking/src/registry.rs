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

//! Subscription state for the topic multiplexer.
//!
//! The registry tracks, per topic: the broadcast channel local listeners
//! receive on, a reference count of local interest, and the optional
//! server-side subscription handle. Handles are cleared while disconnected and
//! reacquired on every successful connect, so after a reconnect exactly the
//! topics with remaining interest and no handle are resubscribed.

use std::{num::NonZeroUsize, sync::Arc};

use dashmap::DashMap;
use ridelink_model::TrackingUpdate;
use tokio::sync::broadcast;
use ustr::Ustr;

/// Capacity of each per-topic broadcast channel.
const TOPIC_CHANNEL_CAPACITY: usize = 100;

/// Refcounted table of topic subscriptions and their local fan-out channels.
#[derive(Clone, Debug)]
pub struct SubscriptionRegistry {
    channels: Arc<DashMap<Ustr, broadcast::Sender<TrackingUpdate>>>,
    reference_counts: Arc<DashMap<Ustr, NonZeroUsize>>,
    handles: Arc<DashMap<Ustr, u64>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates a new empty [`SubscriptionRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            reference_counts: Arc::new(DashMap::new()),
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Registers local interest in a topic.
    ///
    /// Returns a receiver on the topic's broadcast channel and `true` if this
    /// is the first listener, in which case the caller must issue the
    /// server-side subscribe. Exactly one channel exists per topic while any
    /// interest remains, so every listener sees every routed update.
    pub fn add_interest(&self, topic: &str) -> (broadcast::Receiver<TrackingUpdate>, bool) {
        let topic = Ustr::from(topic);
        let mut first = false;

        self.reference_counts
            .entry(topic)
            .and_modify(|count| {
                *count = NonZeroUsize::new(count.get() + 1).expect("reference count overflow");
            })
            .or_insert_with(|| {
                first = true;
                NonZeroUsize::MIN
            });

        let sender = self
            .channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0);

        (sender.subscribe(), first)
    }

    /// Releases local interest in a topic.
    ///
    /// Returns `true` if this was the last listener, in which case the channel
    /// is dropped and the caller must issue the server-side unsubscribe.
    pub fn remove_interest(&self, topic: &str) -> bool {
        let topic = Ustr::from(topic);

        if let Some(mut entry) = self.reference_counts.get_mut(&topic) {
            let current = entry.get();

            if current == 1 {
                // Last listener, drop the mutable reference before removing
                drop(entry);
                self.reference_counts.remove(&topic);
                self.channels.remove(&topic);
                return true;
            }

            *entry = NonZeroUsize::new(current - 1)
                .expect("reference count should never reach zero here");
        }

        false
    }

    /// Records the server-side handle acquired for a topic.
    pub fn assign_handle(&self, topic: &str, handle: u64) {
        self.handles.insert(Ustr::from(topic), handle);
    }

    /// Removes and returns the server-side handle for a topic, if any.
    pub fn take_handle(&self, topic: &str) -> Option<u64> {
        self.handles
            .remove(&Ustr::from(topic))
            .map(|(_, handle)| handle)
    }

    /// Clears every server-side handle. Called when the connection drops so
    /// the next connect resubscribes everything still wanted.
    pub fn clear_handles(&self) {
        self.handles.clear();
    }

    /// Returns the topics that have local interest but no server-side handle.
    #[must_use]
    pub fn topics_needing_subscribe(&self) -> Vec<Ustr> {
        self.channels
            .iter()
            .map(|entry| *entry.key())
            .filter(|topic| !self.handles.contains_key(topic))
            .collect()
    }

    /// Fans an update out to the topic's listeners.
    ///
    /// Returns `false` when the topic has no channel (no remaining interest);
    /// delivery to a channel whose receivers have all lagged away is not an
    /// error.
    pub fn route(&self, topic: &str, update: TrackingUpdate) -> bool {
        match self.channels.get(&Ustr::from(topic)) {
            Some(sender) => {
                if let Err(e) = sender.send(update) {
                    tracing::trace!("No active listeners for topic {topic}: {e}");
                }
                true
            }
            None => false,
        }
    }

    /// Returns the number of topics with local interest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no topic has local interest.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the current reference count for a topic.
    #[must_use]
    pub fn reference_count(&self, topic: &str) -> usize {
        self.reference_counts
            .get(&Ustr::from(topic))
            .map_or(0, |count| count.get())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use ridelink_model::RideId;
    use rstest::rstest;

    use super::*;

    const TOPIC: &str = "/topic/rides/42/tracking";

    fn update() -> TrackingUpdate {
        TrackingUpdate {
            ride_id: RideId::new(42),
            vehicle_latitude: Some(45.25),
            vehicle_longitude: Some(19.83),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_first_interest_triggers_subscribe() {
        let registry = SubscriptionRegistry::new();

        let (_rx1, first) = registry.add_interest(TOPIC);
        assert!(first);

        let (_rx2, first) = registry.add_interest(TOPIC);
        assert!(!first);

        assert_eq!(registry.reference_count(TOPIC), 2);
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn test_last_interest_triggers_unsubscribe() {
        let registry = SubscriptionRegistry::new();

        let (_rx1, _) = registry.add_interest(TOPIC);
        let (_rx2, _) = registry.add_interest(TOPIC);

        assert!(!registry.remove_interest(TOPIC));
        assert!(registry.remove_interest(TOPIC));
        assert!(registry.is_empty());

        // Removing interest in an unknown topic is a no-op
        assert!(!registry.remove_interest(TOPIC));
    }

    #[rstest]
    fn test_route_fans_out_to_all_listeners() {
        let registry = SubscriptionRegistry::new();

        let (mut rx1, _) = registry.add_interest(TOPIC);
        let (mut rx2, _) = registry.add_interest(TOPIC);

        assert!(registry.route(TOPIC, update()));

        assert_eq!(rx1.try_recv().unwrap().ride_id, RideId::new(42));
        assert_eq!(rx2.try_recv().unwrap().ride_id, RideId::new(42));
    }

    #[rstest]
    fn test_route_unknown_topic() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.route(TOPIC, update()));
    }

    #[rstest]
    fn test_resubscription_sweep_after_handle_clear() {
        let registry = SubscriptionRegistry::new();

        let (_rx1, _) = registry.add_interest(TOPIC);
        let other = "/topic/rides/7/tracking";
        let (_rx2, _) = registry.add_interest(other);

        registry.assign_handle(TOPIC, 1);
        registry.assign_handle(other, 2);
        assert!(registry.topics_needing_subscribe().is_empty());

        // Connection drop clears the handles; both topics still want a
        // subscription afterwards
        registry.clear_handles();
        let mut needing = registry.topics_needing_subscribe();
        needing.sort_unstable();
        assert_eq!(needing.len(), 2);

        // Reacquire one handle; only the other still needs a subscribe
        registry.assign_handle(TOPIC, 3);
        let needing = registry.topics_needing_subscribe();
        assert_eq!(needing, vec![Ustr::from(other)]);
    }

    #[rstest]
    fn test_take_handle() {
        let registry = SubscriptionRegistry::new();

        registry.assign_handle(TOPIC, 9);
        assert_eq!(registry.take_handle(TOPIC), Some(9));
        assert_eq!(registry.take_handle(TOPIC), None);
    }
}
