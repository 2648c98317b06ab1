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

//! The multiplexing live tracking client.
//!
//! A single duplex WebSocket connection carries any number of topic
//! subscriptions. Local listeners attach through the subscription registry's
//! broadcast channels, and a routing task fans every inbound server frame out
//! to the matching topic channel. After a reconnect the routing task re-issues
//! the subscribe request for every topic that still has local interest, so
//! listeners never observe the subscription gap.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use ridelink_model::{LocationUpdate, RideId, TrackingUpdate};
use ridelink_network::{
    RECONNECTED,
    client::{DuplexClient, DuplexConfig},
};
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::{
    config::TrackingConfig,
    error::TrackingError,
    messages::{ClientRequest, ServerFrame},
    registry::SubscriptionRegistry,
    topics::{bearer_headers, duplex_endpoint, ride_tracking_topic},
};

/// Multiplexes topic subscriptions over one duplex WebSocket connection.
#[derive(Clone, Debug)]
pub struct LiveTrackingClient {
    url: String,
    config: TrackingConfig,
    inner: Arc<RwLock<Option<DuplexClient>>>,
    registry: SubscriptionRegistry,
    signal: Arc<AtomicBool>,
    task_handle: Option<Arc<tokio::task::JoinHandle<()>>>,
    next_handle: Arc<AtomicU64>,
    connectivity: Option<watch::Receiver<bool>>,
}

impl LiveTrackingClient {
    /// Creates a new [`LiveTrackingClient`] instance from the given config.
    #[must_use]
    pub fn new(config: TrackingConfig) -> Self {
        let url = duplex_endpoint(&config.base_url);

        Self {
            url,
            config,
            inner: Arc::new(RwLock::new(None)),
            registry: SubscriptionRegistry::new(),
            signal: Arc::new(AtomicBool::new(false)),
            task_handle: None,
            next_handle: Arc::new(AtomicU64::new(1)),
            connectivity: None,
        }
    }

    /// Returns the WebSocket URL being used by the client.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a value indicating whether the client is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.inner.try_read() {
            Ok(guard) => match &*guard {
                Some(inner) => inner.is_active(),
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Returns a value indicating whether the client is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self.inner.try_read() {
            Ok(guard) => match &*guard {
                Some(inner) => inner.is_closed(),
                None => true,
            },
            Err(_) => true,
        }
    }

    /// Returns a watch receiver reporting transport connectivity, available
    /// once connected.
    #[must_use]
    pub fn connectivity(&self) -> Option<watch::Receiver<bool>> {
        self.connectivity.clone()
    }

    /// Connects to the server and spawns the routing task.
    ///
    /// Idempotent: returns early when the client is already active. After
    /// backoff exhaustion parks the duplex client in the closed state; calling
    /// this again constructs a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection attempt fails.
    pub async fn connect(&mut self) -> Result<(), TrackingError> {
        if self.is_active() {
            tracing::debug!("Already connected");
            return Ok(());
        }

        let duplex_config = DuplexConfig {
            url: self.url.clone(),
            headers: bearer_headers(self.config.token.as_deref()),
            heartbeat_secs: Some(self.config.heartbeat_secs),
            heartbeat_msg: None,
            reconnect_timeout_ms: None,
            reconnect_delay_initial_ms: Some(self.config.reconnect_delay_initial_ms),
            reconnect_delay_max_ms: Some(self.config.reconnect_delay_max_ms),
            reconnect_backoff_factor: Some(self.config.reconnect_backoff_factor),
            reconnect_jitter_ms: Some(self.config.reconnect_jitter_ms),
            reconnect_max_attempts: self.config.reconnect_max_attempts,
        };

        let (rx, client) = DuplexClient::connect(duplex_config).await?;
        let connectivity = client.connectivity();
        self.connectivity = Some(connectivity.clone());
        self.signal.store(false, Ordering::Relaxed);

        {
            let mut guard = self.inner.write().await;
            *guard = Some(client);
        }

        // Handles never survive a connection, sweep anything deferred while
        // disconnected
        self.registry.clear_handles();
        self.resubscribe_pending().await;

        let handle = Self::spawn_routing_task(
            rx,
            connectivity,
            self.inner.clone(),
            self.registry.clone(),
            self.signal.clone(),
            self.next_handle.clone(),
        );
        self.task_handle = Some(Arc::new(handle));

        Ok(())
    }

    /// Subscribes to a topic, returning a receiver of its tracking updates.
    ///
    /// The first local listener triggers the server-side subscribe; further
    /// listeners share the existing stream. While disconnected the server
    /// request is deferred and recovered on the next connect.
    pub async fn subscribe(
        &self,
        topic: &str,
    ) -> broadcast::Receiver<TrackingUpdate> {
        let (receiver, first) = self.registry.add_interest(topic);

        if first {
            let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
            let request = ClientRequest::Subscribe {
                id: handle,
                topic: topic.to_string(),
            };
            match self.send_request(&request).await {
                Ok(()) => self.registry.assign_handle(topic, handle),
                Err(e) => {
                    tracing::debug!("Subscribe to {topic} deferred: {e}");
                }
            }
        }

        receiver
    }

    /// Releases one local subscription on a topic.
    ///
    /// The server-side unsubscribe is issued only when the last listener goes
    /// away.
    pub async fn unsubscribe(&self, topic: &str) {
        if self.registry.remove_interest(topic)
            && let Some(handle) = self.registry.take_handle(topic)
        {
            let request = ClientRequest::Unsubscribe {
                id: handle,
                topic: topic.to_string(),
            };
            if let Err(e) = self.send_request(&request).await {
                tracing::debug!("Unsubscribe from {topic} not sent: {e}");
            }
        }
    }

    /// Publishes a location update onto the ride's tracking topic.
    ///
    /// Fire-and-forget: the update is not retried on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not connected or encoding fails.
    pub async fn publish_location(
        &self,
        ride_id: RideId,
        update: LocationUpdate,
    ) -> Result<(), TrackingError> {
        let request = ClientRequest::Publish {
            topic: ride_tracking_topic(ride_id),
            data: update,
        };
        self.send_request(&request).await
    }

    /// Routes an update into a topic's local channel without touching the
    /// wire. Used by the polling reconciler so fallback reads flow through the
    /// same consumer path as pushed frames.
    pub fn inject(&self, topic: &str, update: TrackingUpdate) -> bool {
        self.registry.route(topic, update)
    }

    /// Closes the client and stops the routing task.
    pub async fn close(&mut self) {
        tracing::debug!("Closing");
        self.signal.store(true, Ordering::Relaxed);

        if let Some(inner) = self.inner.write().await.take() {
            inner.disconnect().await;
        }

        if let Some(task_handle) = self.task_handle.take() {
            match Arc::try_unwrap(task_handle) {
                Ok(handle) => {
                    if let Err(e) = handle.await {
                        tracing::error!("Error awaiting routing task: {e}");
                    }
                }
                Err(handle) => {
                    handle.abort();
                    tracing::debug!("Aborted task 'routing'");
                }
            }
        }

        tracing::debug!("Closed");
    }

    async fn send_request(&self, request: &ClientRequest) -> Result<(), TrackingError> {
        let json = serde_json::to_string(request)?;

        let guard = self.inner.read().await;
        match &*guard {
            Some(inner) => {
                inner.send_text(json)?;
                Ok(())
            }
            None => Err(TrackingError::NotConnected),
        }
    }

    /// Re-issues subscribe requests for every topic still wanted but without
    /// a server handle.
    async fn resubscribe_pending(&self) {
        Self::resubscribe_sweep(&self.inner, &self.registry, &self.next_handle).await;
    }

    async fn resubscribe_sweep(
        inner: &Arc<RwLock<Option<DuplexClient>>>,
        registry: &SubscriptionRegistry,
        next_handle: &Arc<AtomicU64>,
    ) {
        for topic in registry.topics_needing_subscribe() {
            let handle = next_handle.fetch_add(1, Ordering::Relaxed);
            let request = ClientRequest::Subscribe {
                id: handle,
                topic: topic.to_string(),
            };

            let json = match serde_json::to_string(&request) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to encode subscribe request: {e}");
                    continue;
                }
            };

            let guard = inner.read().await;
            match &*guard {
                Some(client) => match client.send_text(json) {
                    Ok(()) => registry.assign_handle(&topic, handle),
                    Err(e) => tracing::warn!("Failed to resubscribe to {topic}: {e}"),
                },
                None => tracing::warn!("Cannot resubscribe to {topic} - not connected"),
            }
        }
    }

    fn spawn_routing_task(
        mut rx: mpsc::Receiver<Message>,
        mut connectivity: watch::Receiver<bool>,
        inner: Arc<RwLock<Option<DuplexClient>>>,
        registry: SubscriptionRegistry,
        signal: Arc<AtomicBool>,
        next_handle: Arc<AtomicU64>,
    ) -> tokio::task::JoinHandle<()> {
        tracing::debug!("Started task 'routing'");

        // Interval between checking the stop signal
        let check_interval = Duration::from_millis(10);

        tokio::task::spawn(async move {
            let mut connectivity_open = true;

            loop {
                if signal.load(Ordering::Relaxed) {
                    tracing::debug!("Stop signal received");
                    break;
                }

                let message = tokio::select! {
                    message = rx.recv() => match message {
                        Some(message) => message,
                        None => {
                            tracing::debug!("Frame channel closed - terminating");
                            break;
                        }
                    },
                    changed = connectivity.changed(), if connectivity_open => {
                        // Handles die with the connection: wipe them as soon
                        // as it drops so subscribes issued on the next
                        // connection are not mistaken for live ones
                        match changed {
                            Ok(()) => {
                                if !*connectivity.borrow_and_update() {
                                    tracing::debug!("Connection dropped, clearing handles");
                                    registry.clear_handles();
                                }
                            }
                            Err(_) => connectivity_open = false,
                        }
                        continue;
                    }
                    () = tokio::time::sleep(check_interval) => continue,
                };

                match message {
                    Message::Text(text) if text == RECONNECTED => {
                        // Handles were already cleared on the drop edge, so
                        // topics subscribed since the reconnect are skipped
                        tracing::info!("Reconnected, restoring subscriptions");
                        Self::resubscribe_sweep(&inner, &registry, &next_handle).await;
                    }
                    Message::Text(text) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => {
                            if !registry.route(&frame.topic, frame.data) {
                                tracing::trace!("No interest in topic {}", frame.topic);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Dropping malformed frame: {e}");
                        }
                    },
                    Message::Ping(_) | Message::Pong(_) => {}
                    message => {
                        tracing::trace!("Ignoring message: {message:?}");
                    }
                }
            }

            tracing::debug!("Completed task 'routing'");
        })
    }
}
