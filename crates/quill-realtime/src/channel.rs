//! Persistent notification channel with capped reconnection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use quill_cache::{CacheKey, CacheStore, CacheValue};

use crate::error::RealtimeError;
use crate::message::{PushMessage, decode_push};

/// Connection lifecycle of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not connected and not trying to.
    Disconnected = 0,
    /// Connection attempt in flight.
    Connecting = 1,
    /// Receiving frames.
    Connected = 2,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Connection settings for the notification channel.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Host (and optional port), e.g. `quill.example.com`.
    pub host: String,
    /// Optional base path the API is mounted under.
    pub base_path: Option<String>,
    /// Use `wss` (mirrors the page being served over TLS).
    pub tls: bool,
    /// Consecutive failed connection attempts before giving up.
    pub max_attempts: u32,
    /// Ceiling for the exponential reconnect backoff.
    pub max_backoff: Duration,
}

impl RealtimeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            base_path: None,
            tls: true,
            max_attempts: 10,
            max_backoff: Duration::from_secs(60),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// WebSocket client reconciling push messages into the cache store.
///
/// Runs for the lifetime of the authenticated session. Without a token it
/// never attempts a connection; [`NotificationChannel::disconnect`] tears
/// the loop down explicitly on logout so no reconnect loop outlives the
/// session.
pub struct NotificationChannel {
    store: Arc<CacheStore>,
    config: RealtimeConfig,
    token: Option<String>,
    state: AtomicU8,
    shutdown_tx: watch::Sender<bool>,
}

impl NotificationChannel {
    pub fn new(config: RealtimeConfig, token: Option<String>, store: Arc<CacheStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            config,
            token,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            shutdown_tx,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Stop the channel and its reconnect loop.
    ///
    /// Safe to call before `run()` is ever polled: the shutdown flag is
    /// stored in the channel even when no receiver exists yet, so a logout
    /// racing ahead of the channel task still wins.
    pub fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Build the full WebSocket URL with the token query parameter.
    fn build_url(&self, token: &str) -> String {
        let scheme = if self.config.tls { "wss" } else { "ws" };
        let mut url = format!("{}://{}", scheme, self.config.host);
        if let Some(base) = &self.config.base_path {
            let base = base.trim_matches('/');
            if !base.is_empty() {
                url.push('/');
                url.push_str(base);
            }
        }
        url.push_str("/ws/notifications?token=");
        url.push_str(&encode_query_value(token));
        url
    }

    /// Connect and start receiving frames.
    ///
    /// Runs in a reconnection loop with exponential backoff, giving up after
    /// `max_attempts` consecutive failures. Returns `Ok` on explicit
    /// shutdown. Without a token this returns immediately and the channel
    /// stays disconnected.
    pub async fn run(&self) -> Result<(), RealtimeError> {
        let Some(token) = self.token.as_deref() else {
            info!("no auth token, notification channel stays disconnected");
            return Ok(());
        };
        let url = self.build_url(token);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut backoff = Duration::from_secs(1);
        let mut attempts = 0u32;

        loop {
            if *shutdown_rx.borrow() {
                info!("notification channel shutting down");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);
            debug!(host = %self.config.host, attempt = attempts + 1, "connecting to notification channel");

            match connect_async(url.as_str()).await {
                Ok((ws_stream, _)) => {
                    // Successful connection resets the retry budget.
                    attempts = 0;
                    backoff = Duration::from_secs(1);
                    self.set_state(ConnectionState::Connected);
                    info!("notification channel connected");

                    match self.process(ws_stream, &mut shutdown_rx).await {
                        Ok(()) => {
                            self.set_state(ConnectionState::Disconnected);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(error = %e, "notification channel dropped, reconnecting");
                            self.set_state(ConnectionState::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "notification channel connection failed");
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            attempts += 1;
            if attempts >= self.config.max_attempts {
                return Err(RealtimeError::ReconnectExhausted { attempts });
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        self.set_state(ConnectionState::Disconnected);
                        return Ok(());
                    }
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    /// Process frames until the connection drops or shutdown is requested.
    async fn process(
        &self,
        ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), RealtimeError> {
        let (_, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("notification channel received shutdown signal");
                        return Ok(());
                    }
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite auto-responds to pings
                            trace!("received ping");
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err(RealtimeError::WebSocket("connection closed".to_string()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(RealtimeError::WebSocket(format!("read error: {e}")));
                        }
                        None => {
                            return Err(RealtimeError::WebSocket("stream ended".to_string()));
                        }
                    }
                }
            }
        }
    }

    /// Decode one text frame and reconcile it into the cache store.
    ///
    /// Malformed frames are dropped without touching the cache.
    fn handle_frame(&self, text: &str) {
        match decode_push(text) {
            Some(PushMessage::UnreadCount(count)) => {
                debug!(count, "unread count pushed");
                self.store.write(CacheKey::UnreadCount, CacheValue::Count(count));
            }
            Some(PushMessage::Notification) => {
                debug!("notification pushed, marking list stale");
                // The payload is never merged: pagination is owned by the
                // fetch layer, the list is simply refetched on next read.
                self.store.mark_stale(&CacheKey::Notifications);
            }
            None => {}
        }
    }
}

/// Percent-encode a query parameter value.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn channel(token: Option<&str>) -> (Arc<CacheStore>, NotificationChannel) {
        let store = CacheStore::new();
        let config = RealtimeConfig::new("quill.example.com");
        let channel = NotificationChannel::new(
            config,
            token.map(str::to_string),
            Arc::clone(&store),
        );
        (store, channel)
    }

    #[test]
    fn build_url_uses_wss_for_tls() {
        let (_, channel) = channel(Some("tok"));
        assert_eq!(
            channel.build_url("tok"),
            "wss://quill.example.com/ws/notifications?token=tok"
        );
    }

    #[test]
    fn build_url_uses_ws_without_tls() {
        let store = CacheStore::new();
        let config = RealtimeConfig::new("localhost:3000").with_tls(false);
        let channel = NotificationChannel::new(config, Some("tok".to_string()), store);
        assert_eq!(
            channel.build_url("tok"),
            "ws://localhost:3000/ws/notifications?token=tok"
        );
    }

    #[test]
    fn build_url_includes_base_path() {
        let store = CacheStore::new();
        let config = RealtimeConfig::new("quill.example.com").with_base_path("/app/");
        let channel = NotificationChannel::new(config, Some("tok".to_string()), store);
        assert_eq!(
            channel.build_url("tok"),
            "wss://quill.example.com/app/ws/notifications?token=tok"
        );
    }

    #[test]
    fn token_is_url_encoded() {
        let (_, channel) = channel(Some("a b+c/d"));
        assert_eq!(
            channel.build_url("a b+c/d"),
            "wss://quill.example.com/ws/notifications?token=a%20b%2Bc%2Fd"
        );
    }

    #[tokio::test]
    async fn disconnect_before_run_prevents_dialing() {
        // Logout can land before the channel task is first polled; the
        // shutdown must stick rather than be dropped with the unsubscribed
        // receiver. Unreachable host + one attempt: if the signal were
        // lost, run() would dial and return ReconnectExhausted.
        let store = CacheStore::new();
        let config = RealtimeConfig::new("127.0.0.1:1")
            .with_tls(false)
            .with_max_attempts(1);
        let channel = NotificationChannel::new(config, Some("tok".to_string()), store);

        channel.disconnect();
        channel.run().await.unwrap();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn no_token_stays_disconnected() {
        let (_, channel) = channel(None);
        channel.run().await.unwrap();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn unread_count_frame_writes_cache() {
        let (store, channel) = channel(Some("tok"));
        channel.handle_frame(r#"{"type":"unreadCount","count":4}"#);
        assert_eq!(
            store.read(&CacheKey::UnreadCount),
            Some(CacheValue::Count(4))
        );
    }

    #[test]
    fn malformed_count_leaves_prior_value() {
        let (store, channel) = channel(Some("tok"));
        store.write(CacheKey::UnreadCount, CacheValue::Count(5));

        channel.handle_frame(r#"{"type":"unreadCount","count":"abc"}"#);

        assert_eq!(
            store.read(&CacheKey::UnreadCount),
            Some(CacheValue::Count(5))
        );
        assert!(!store.is_stale(&CacheKey::UnreadCount));
    }

    #[test]
    fn notification_frame_marks_list_stale() {
        let (store, channel) = channel(Some("tok"));
        store.write(
            CacheKey::Notifications,
            CacheValue::Opaque(serde_json::json!([{ "id": 1 }])),
        );

        channel.handle_frame(r#"{"type":"notification","data":{"id":2}}"#);

        assert!(store.is_stale(&CacheKey::Notifications));
        // The displayed value is untouched: no empty flash, no merge.
        assert_eq!(
            store.read(&CacheKey::Notifications),
            Some(CacheValue::Opaque(serde_json::json!([{ "id": 1 }])))
        );
    }
}
