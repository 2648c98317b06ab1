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

//! Bi-directional WebSocket client with automatic reconnection, exponential
//! backoff, and connection state management.
//!
//! **Design**:
//! - Single reader, multiple writer model
//! - Read half runs in a dedicated task streaming into a consumer channel
//! - Write half runs in a dedicated task fed by a command channel
//! - Controller task manages the reconnect/disconnect lifecycle
//!
//! After a successful reconnection the client injects the [`RECONNECTED`]
//! sentinel text frame into the consumer channel so the layer above can
//! restore its subscriptions before any new server frames arrive.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use http::HeaderName;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest, http::HeaderValue},
};

use crate::{RECONNECTED, backoff::ExponentialBackoff, error::NetworkError, mode::ConnectionMode};

type MessageWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type MessageReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Configuration for a [`DuplexClient`].
#[derive(Clone, Debug, Default)]
pub struct DuplexConfig {
    /// The URL to connect to.
    pub url: String,
    /// Headers added to the upgrade request (for example a bearer token).
    pub headers: Vec<(String, String)>,
    /// The optional heartbeat interval (seconds).
    pub heartbeat_secs: Option<u64>,
    /// The optional heartbeat text message; a WebSocket ping is sent when `None`.
    pub heartbeat_msg: Option<String>,
    /// The timeout (milliseconds) for reconnection attempts.
    pub reconnect_timeout_ms: Option<u64>,
    /// The initial reconnection delay (milliseconds).
    pub reconnect_delay_initial_ms: Option<u64>,
    /// The maximum reconnection delay (milliseconds) for exponential backoff.
    pub reconnect_delay_max_ms: Option<u64>,
    /// The exponential backoff factor for reconnection delays.
    pub reconnect_backoff_factor: Option<f64>,
    /// The maximum jitter (milliseconds) added to reconnection delays.
    pub reconnect_jitter_ms: Option<u64>,
    /// The maximum number of consecutive reconnection attempts before the
    /// client gives up and closes; `None` retries forever.
    pub reconnect_max_attempts: Option<u32>,
}

/// Represents a command for the writer task.
#[derive(Debug)]
enum WriterCommand {
    /// Update the writer reference with a new one after reconnection.
    Update(MessageWriter),
    /// Send a message to the server.
    Send(Message),
}

/// Owns the connection tasks and performs the actual reconnects.
///
/// The client splits the connection into read and write halves. The read half
/// runs in a tokio task which keeps forwarding server frames into the consumer
/// channel returned from [`DuplexClient::connect`]. The write half runs in its
/// own task fed by an unbounded command channel so any scope holding the
/// client can send.
struct DuplexClientInner {
    config: DuplexConfig,
    consumer_tx: mpsc::Sender<Message>,
    read_task: Option<tokio::task::JoinHandle<()>>,
    write_task: tokio::task::JoinHandle<()>,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    heartbeat_task: Option<tokio::task::JoinHandle<()>>,
    connection_mode: Arc<AtomicU8>,
    connectivity_tx: watch::Sender<bool>,
    reconnect_timeout: Duration,
    backoff: ExponentialBackoff,
}

impl DuplexClientInner {
    pub async fn connect_url(
        config: DuplexConfig,
        consumer_tx: mpsc::Sender<Message>,
    ) -> Result<Self, NetworkError> {
        let (writer, reader) = Self::connect_with_server(&config.url, config.headers.clone()).await?;

        let connection_mode = Arc::new(AtomicU8::new(ConnectionMode::Active.as_u8()));
        let (connectivity_tx, _) = watch::channel(true);

        let read_task = Some(Self::spawn_read_task(
            connection_mode.clone(),
            reader,
            consumer_tx.clone(),
        ));

        let (writer_tx, writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
        let write_task = Self::spawn_write_task(connection_mode.clone(), writer, writer_rx);

        // Optionally spawn a heartbeat task to periodically ping the server
        let heartbeat_task = config.heartbeat_secs.map(|heartbeat_secs| {
            Self::spawn_heartbeat_task(
                connection_mode.clone(),
                heartbeat_secs,
                config.heartbeat_msg.clone(),
                writer_tx.clone(),
            )
        });

        let reconnect_timeout =
            Duration::from_millis(config.reconnect_timeout_ms.unwrap_or(10_000));
        let backoff = ExponentialBackoff::new(
            Duration::from_millis(config.reconnect_delay_initial_ms.unwrap_or(3_000)),
            Duration::from_millis(config.reconnect_delay_max_ms.unwrap_or(30_000)),
            config.reconnect_backoff_factor.unwrap_or(2.0),
            config.reconnect_jitter_ms.unwrap_or(0),
            false,
            config.reconnect_max_attempts,
        );

        Ok(Self {
            config,
            consumer_tx,
            read_task,
            write_task,
            writer_tx,
            heartbeat_task,
            connection_mode,
            connectivity_tx,
            reconnect_timeout,
            backoff,
        })
    }

    /// Connects with the server creating a tokio-tungstenite websocket stream.
    #[inline]
    async fn connect_with_server(
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<(MessageWriter, MessageReader), NetworkError> {
        let mut request = url.into_client_request()?;
        let req_headers = request.headers_mut();

        for (key, val) in headers {
            let header_value = HeaderValue::from_str(&val)
                .map_err(|e| NetworkError::InvalidHeader(format!("{key}: {e}")))?;
            let header_name: HeaderName = key
                .parse()
                .map_err(|e| NetworkError::InvalidHeader(format!("{key}: {e}")))?;
            req_headers.insert(header_name, header_value);
        }

        let (stream, _) = connect_async(request).await?;
        Ok(stream.split())
    }

    /// Makes a new connection with the server and swaps the read and write
    /// halves into the running tasks.
    pub async fn reconnect(&mut self) -> Result<(), NetworkError> {
        tracing::debug!("Reconnecting");

        tokio::time::timeout(self.reconnect_timeout, async {
            let (new_writer, reader) =
                Self::connect_with_server(&self.config.url, self.config.headers.clone()).await?;

            if let Err(e) = self.writer_tx.send(WriterCommand::Update(new_writer)) {
                tracing::error!("{e}");
            }

            // Delay before aborting the stale reader
            tokio::time::sleep(Duration::from_millis(100)).await;

            if let Some(ref read_task) = self.read_task.take()
                && !read_task.is_finished()
            {
                read_task.abort();
                tracing::debug!("Aborted task 'read'");
            }

            self.connection_mode
                .store(ConnectionMode::Active.as_u8(), Ordering::SeqCst);

            self.read_task = Some(Self::spawn_read_task(
                self.connection_mode.clone(),
                reader,
                self.consumer_tx.clone(),
            ));

            // Let the consumer restore its subscriptions before any new
            // server frames are routed.
            if let Err(e) = self
                .consumer_tx
                .send(Message::Text(RECONNECTED.to_string().into()))
                .await
            {
                tracing::error!("Failed to send reconnect sentinel: {e}");
            }

            tracing::debug!("Reconnect succeeded");
            Ok(())
        })
        .await
        .map_err(|_| NetworkError::ReconnectTimeout(self.reconnect_timeout.as_secs_f64()))?
    }

    /// Checks if the connection is still alive.
    ///
    /// The connection is alive while the read task has not finished. On any
    /// failure, client or server side, the read task terminates (possibly
    /// after some detection delay).
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match &self.read_task {
            Some(read_task) => !read_task.is_finished(),
            None => false,
        }
    }

    fn spawn_read_task(
        connection_state: Arc<AtomicU8>,
        mut reader: MessageReader,
        sender: mpsc::Sender<Message>,
    ) -> tokio::task::JoinHandle<()> {
        tracing::debug!("Started task 'read'");

        // Interval between checking the connection mode
        let check_interval = Duration::from_millis(10);

        tokio::task::spawn(async move {
            loop {
                if !ConnectionMode::from_atomic(&connection_state).is_active() {
                    break;
                }

                match tokio::time::timeout(check_interval, reader.next()).await {
                    Ok(Some(Ok(Message::Close(_)))) => {
                        tracing::debug!("Received close frame - terminating");
                        break;
                    }
                    Ok(Some(Ok(message))) => {
                        if let Err(e) = sender.send(message).await {
                            tracing::error!("Failed to forward message: {e}");
                        }
                    }
                    Ok(Some(Err(e))) => {
                        tracing::error!("Received error message - terminating: {e}");
                        break;
                    }
                    // Tungstenite considers the connection closed when polling
                    // for the next message in the stream returns None.
                    Ok(None) => {
                        tracing::debug!("No message received - terminating");
                        break;
                    }
                    Err(_) => {
                        // Timeout - continue loop and check connection mode
                        continue;
                    }
                }
            }
        })
    }

    fn spawn_write_task(
        connection_state: Arc<AtomicU8>,
        writer: MessageWriter,
        mut writer_rx: mpsc::UnboundedReceiver<WriterCommand>,
    ) -> tokio::task::JoinHandle<()> {
        tracing::debug!("Started task 'write'");

        // Interval between checking the connection mode
        let check_interval = Duration::from_millis(10);

        tokio::task::spawn(async move {
            let mut active_writer = writer;

            loop {
                match ConnectionMode::from_atomic(&connection_state) {
                    ConnectionMode::Disconnect => {
                        // Close the writer gracefully before exiting, ignoring
                        // any error as the writer may already be closed.
                        _ = active_writer.close().await;
                        break;
                    }
                    ConnectionMode::Closed => break,
                    _ => {}
                }

                match tokio::time::timeout(check_interval, writer_rx.recv()).await {
                    Ok(Some(cmd)) => {
                        // Re-check connection mode after receiving a command
                        let mode = ConnectionMode::from_atomic(&connection_state);
                        if matches!(mode, ConnectionMode::Disconnect | ConnectionMode::Closed) {
                            break;
                        }

                        match cmd {
                            WriterCommand::Update(new_writer) => {
                                tracing::debug!("Received new writer");

                                // Delay before closing the stale connection
                                tokio::time::sleep(Duration::from_millis(100)).await;
                                _ = active_writer.close().await;

                                active_writer = new_writer;
                                tracing::debug!("Updated writer");
                            }
                            _ if mode.is_reconnect() => {
                                tracing::warn!("Skipping message while reconnecting, {cmd:?}");
                                continue;
                            }
                            WriterCommand::Send(msg) => {
                                if let Err(e) = active_writer.send(msg).await {
                                    tracing::error!("Failed to send message: {e}");
                                    // Mode is active so trigger reconnection
                                    tracing::warn!("Writer triggering reconnect");
                                    connection_state
                                        .store(ConnectionMode::Reconnect.as_u8(), Ordering::SeqCst);
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("Writer channel closed, terminating writer task");
                        break;
                    }
                    Err(_) => {
                        // Timeout - just continue the loop
                        continue;
                    }
                }
            }

            // Close the writer gracefully before exiting, ignoring any error
            // as the writer may already be closed.
            _ = active_writer.close().await;

            tracing::debug!("Completed task 'write'");
        })
    }

    fn spawn_heartbeat_task(
        connection_state: Arc<AtomicU8>,
        heartbeat_secs: u64,
        message: Option<String>,
        writer_tx: mpsc::UnboundedSender<WriterCommand>,
    ) -> tokio::task::JoinHandle<()> {
        tracing::debug!("Started task 'heartbeat'");

        tokio::task::spawn(async move {
            let interval = Duration::from_secs(heartbeat_secs);

            loop {
                tokio::time::sleep(interval).await;

                match ConnectionMode::from_atomic(&connection_state) {
                    ConnectionMode::Active => {
                        let cmd = match &message {
                            Some(text) => WriterCommand::Send(Message::Text(text.clone().into())),
                            None => WriterCommand::Send(Message::Ping(vec![].into())),
                        };

                        match writer_tx.send(cmd) {
                            Ok(()) => tracing::trace!("Sent heartbeat to writer task"),
                            Err(e) => {
                                tracing::error!("Failed to send heartbeat to writer task: {e}");
                            }
                        }
                    }
                    ConnectionMode::Reconnect => continue,
                    ConnectionMode::Disconnect | ConnectionMode::Closed => break,
                }
            }

            tracing::debug!("Completed task 'heartbeat'");
        })
    }
}

impl Drop for DuplexClientInner {
    fn drop(&mut self) {
        if let Some(ref read_task) = self.read_task.take()
            && !read_task.is_finished()
        {
            read_task.abort();
            tracing::debug!("Aborted task 'read'");
        }

        if !self.write_task.is_finished() {
            self.write_task.abort();
            tracing::debug!("Aborted task 'write'");
        }

        if let Some(ref handle) = self.heartbeat_task.take()
            && !handle.is_finished()
        {
            handle.abort();
            tracing::debug!("Aborted task 'heartbeat'");
        }
    }
}

/// WebSocket client with automatic reconnection.
///
/// Connecting yields the consumer half of a bounded channel carrying every
/// server frame plus the [`RECONNECTED`] sentinel. The client assumes a single
/// reader and any number of writers. See the module docs for the task
/// architecture.
pub struct DuplexClient {
    controller_task: tokio::task::JoinHandle<()>,
    connection_mode: Arc<AtomicU8>,
    connectivity_rx: watch::Receiver<bool>,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
}

impl std::fmt::Debug for DuplexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DuplexClient))
            .field("mode", &self.connection_mode())
            .finish()
    }
}

impl DuplexClient {
    /// Connects to the server and returns the stream of incoming messages
    /// together with the client handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection attempt fails; reconnection
    /// only applies to an established client.
    pub async fn connect(
        config: DuplexConfig,
    ) -> Result<(mpsc::Receiver<Message>, Self), NetworkError> {
        tracing::debug!("Connecting");

        let (consumer_tx, consumer_rx) = mpsc::channel(100);
        let inner = DuplexClientInner::connect_url(config, consumer_tx).await?;

        let connection_mode = inner.connection_mode.clone();
        let connectivity_rx = inner.connectivity_tx.subscribe();
        let writer_tx = inner.writer_tx.clone();

        let controller_task = Self::spawn_controller_task(inner, connection_mode.clone());

        Ok((
            consumer_rx,
            Self {
                controller_task,
                connection_mode,
                connectivity_rx,
                writer_tx,
            },
        ))
    }

    /// Returns the current connection mode.
    #[must_use]
    pub fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::from_atomic(&self.connection_mode)
    }

    /// Checks if the client connection is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.connection_mode().is_active()
    }

    /// Checks if the client lost connection and is attempting to reestablish it.
    #[inline]
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.connection_mode().is_reconnect()
    }

    /// Checks if the client is in disconnect mode.
    #[inline]
    #[must_use]
    pub fn is_disconnecting(&self) -> bool {
        self.connection_mode().is_disconnect()
    }

    /// Checks if the client has been explicitly disconnected or has exhausted
    /// its reconnection attempts. A closed client cannot be reused.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection_mode().is_closed()
    }

    /// Checks if the controller task has finished.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.controller_task.is_finished()
    }

    /// Returns a watch receiver reporting whether the transport is currently
    /// usable. The value flips to `false` when a reconnect cycle starts and
    /// back to `true` once it completes.
    #[must_use]
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity_rx.clone()
    }

    /// Sends the given text `data` to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not active.
    pub fn send_text(&self, data: String) -> Result<(), NetworkError> {
        if !self.is_active() {
            return Err(NetworkError::Closed);
        }

        tracing::trace!("Sending text: {data:?}");

        let msg = Message::Text(data.into());
        if let Err(e) = self.writer_tx.send(WriterCommand::Send(msg)) {
            tracing::error!("Error sending message: {e}");
        }
        Ok(())
    }

    /// Sends a close frame to the server.
    pub fn send_close(&self) {
        if !self.is_active() {
            tracing::error!("Cannot send close frame - connection not active");
            return;
        }

        if let Err(e) = self.writer_tx.send(WriterCommand::Send(Message::Close(None))) {
            tracing::error!("Error sending close frame: {e}");
        }
    }

    /// Sets disconnect mode and waits for the controller task to shut the
    /// client down.
    pub async fn disconnect(&self) {
        tracing::debug!("Disconnecting");
        self.connection_mode
            .store(ConnectionMode::Disconnect.as_u8(), Ordering::SeqCst);

        match tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_disconnected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            if !self.controller_task.is_finished() {
                self.controller_task.abort();
                tracing::debug!("Aborted task 'controller'");
            }
        })
        .await
        {
            Ok(()) => tracing::debug!("Controller task finished"),
            Err(_) => tracing::error!("Timeout waiting for controller task to finish"),
        }
    }

    fn spawn_controller_task(
        mut inner: DuplexClientInner,
        connection_mode: Arc<AtomicU8>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::task::spawn(async move {
            tracing::debug!("Started task 'controller'");

            let check_interval = Duration::from_millis(10);

            loop {
                tokio::time::sleep(check_interval).await;
                let mode = ConnectionMode::from_atomic(&connection_mode);

                if mode.is_disconnect() {
                    tracing::debug!("Disconnecting");

                    let timeout = Duration::from_secs(5);
                    if tokio::time::timeout(timeout, async {
                        // Delay awaiting graceful shutdown
                        tokio::time::sleep(Duration::from_millis(100)).await;

                        if let Some(task) = &inner.read_task
                            && !task.is_finished()
                        {
                            task.abort();
                            tracing::debug!("Aborted task 'read'");
                        }

                        if let Some(task) = &inner.heartbeat_task
                            && !task.is_finished()
                        {
                            task.abort();
                            tracing::debug!("Aborted task 'heartbeat'");
                        }
                    })
                    .await
                    .is_err()
                    {
                        tracing::error!("Shutdown timed out after {}s", timeout.as_secs());
                    }

                    tracing::debug!("Closed");
                    break;
                }

                if mode.is_reconnect() || (mode.is_active() && !inner.is_alive()) {
                    connection_mode.store(ConnectionMode::Reconnect.as_u8(), Ordering::SeqCst);
                    inner.connectivity_tx.send_replace(false);

                    if inner.backoff.is_exhausted() {
                        tracing::error!(
                            "Giving up after {} reconnect attempts",
                            inner.backoff.attempts(),
                        );
                        break;
                    }

                    // The delay precedes the attempt: attempt k waits
                    // base * factor^(k-1), capped
                    let duration = inner.backoff.next_duration();
                    if !duration.is_zero() {
                        tracing::warn!(
                            "Backing off for {}s before reconnect attempt {}...",
                            duration.as_secs_f64(),
                            inner.backoff.attempts(),
                        );
                    }
                    tokio::time::sleep(duration).await;

                    match inner.reconnect().await {
                        Ok(()) => {
                            tracing::debug!("Reconnected successfully");
                            inner.backoff.reset();
                            inner.connectivity_tx.send_replace(true);
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Reconnect attempt {} failed: {e}",
                                inner.backoff.attempts(),
                            );
                        }
                    }
                }
            }

            inner
                .connection_mode
                .store(ConnectionMode::Closed.as_u8(), Ordering::SeqCst);
            inner.connectivity_tx.send_replace(false);

            tracing::debug!("Completed task 'controller'");
        })
    }
}

impl Drop for DuplexClient {
    fn drop(&mut self) {
        if !self.controller_task.is_finished() {
            self.controller_task.abort();
            tracing::debug!("Aborted task 'controller'");
        }
    }
}
