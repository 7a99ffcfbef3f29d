//! WebSocket client capability implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use tether_core::{
    BoxedConnectionHandler, ClientConfig, ConnectionHandle, ConnectionInfo, DisconnectReason,
    TransportError, TransportResult, WsClientCapability,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client capability implementation.
pub struct WsClientCapabilityImpl;

impl WsClientCapabilityImpl {
    /// Creates a new WebSocket client capability.
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsClientCapabilityImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WsClientCapability for WsClientCapabilityImpl {
    async fn connect(
        &self,
        handler: BoxedConnectionHandler,
        config: ClientConfig,
    ) -> TransportResult<ConnectionHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let finished = CancellationToken::new();

        let (stream, url) = open(&handler).await?;
        let conn_id = handler.on_connect(connection_info(&url)).await;

        info!(conn_id = %conn_id, "WebSocket client connected");

        let handle = ConnectionHandle::new(&conn_id, shutdown_tx, finished.clone());

        tokio::spawn(async move {
            run_client_loop(stream, conn_id, shutdown_rx, handler, config).await;
            finished.cancel();
        });

        Ok(handle)
    }
}

fn connection_info(url: &str) -> ConnectionInfo {
    ConnectionInfo::new("websocket").with_metadata("url", url)
}

/// Resolves a fresh endpoint and opens a socket to it.
async fn open(handler: &BoxedConnectionHandler) -> TransportResult<(WsStream, String)> {
    let url = handler.resolve_endpoint().await?;
    debug!("Connecting to WebSocket server");

    let (stream, _response) =
        connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                url: url.clone(),
                reason: format!("WebSocket connection failed: {e}"),
            })?;
    Ok((stream, url))
}

/// How one connected session ended.
enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Outcome of a reconnect cycle.
enum Reconnect {
    Connected(WsStream, String),
    Shutdown,
    GaveUp,
}

/// Runs sessions back to back until shutdown or the retry budget runs out.
async fn run_client_loop(
    stream: WsStream,
    conn_id: String,
    mut shutdown_rx: watch::Receiver<bool>,
    handler: BoxedConnectionHandler,
    config: ClientConfig,
) {
    let mut stream = stream;
    let mut conn_id = conn_id;

    loop {
        let end = run_session(
            stream,
            &conn_id,
            &mut shutdown_rx,
            &handler,
            config.heartbeat_interval,
        )
        .await;

        match end {
            SessionEnd::Shutdown => {
                info!(conn_id = %conn_id, "WebSocket client shutting down");
                handler
                    .on_disconnect(&conn_id, DisconnectReason::intentional())
                    .await;
                return;
            }
            SessionEnd::Lost(cause) => {
                warn!(conn_id = %conn_id, cause = %cause, "WebSocket connection lost");
                handler
                    .on_disconnect(&conn_id, DisconnectReason::lost(cause))
                    .await;
                if !config.auto_reconnect {
                    return;
                }
            }
        }

        match reconnect(&handler, &conn_id, &config, &mut shutdown_rx).await {
            Reconnect::Connected(new_stream, url) => {
                stream = new_stream;
                conn_id = handler.on_connect(connection_info(&url)).await;
                info!(conn_id = %conn_id, "Reconnected successfully");
            }
            Reconnect::Shutdown => {
                handler
                    .on_disconnect(&conn_id, DisconnectReason::intentional())
                    .await;
                return;
            }
            Reconnect::GaveUp => return,
        }
    }
}

/// Pumps one connected socket.
async fn run_session(
    stream: WsStream,
    conn_id: &str,
    shutdown_rx: &mut watch::Receiver<bool>,
    handler: &BoxedConnectionHandler,
    heartbeat_interval: Option<Duration>,
) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = stream.split();
    let mut heartbeat = heartbeat_interval
        .map(|every| tokio::time::interval_at(Instant::now() + every, every));

    loop {
        tokio::select! {
            _ = shutdown_requested(shutdown_rx) => {
                let _ = ws_tx.close().await;
                return SessionEnd::Shutdown;
            }

            _ = tick(&mut heartbeat) => {
                trace!(conn_id = %conn_id, "Sending heartbeat ping");
                if let Err(e) = ws_tx.send(Message::Ping(Default::default())).await {
                    return SessionEnd::Lost(format!("heartbeat failed: {e}"));
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(conn_id = %conn_id, len = text.len(), "Received text");
                        handler.on_message(conn_id, text.as_bytes()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!(conn_id = %conn_id, len = data.len(), "Received binary");
                        handler.on_message(conn_id, &data).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        trace!(conn_id = %conn_id, "Received ping, sending pong");
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        trace!(conn_id = %conn_id, "Received pong");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let cause = frame
                            .map(|f| {
                                format!("closed by server ({}): {}", u16::from(f.code), f.reason.as_str())
                            })
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Lost(cause);
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        let error = TransportError::ConnectionClosed { reason: e.to_string() };
                        handler.on_error(conn_id, &error).await;
                        return SessionEnd::Lost(e.to_string());
                    }
                    None => return SessionEnd::Lost("stream ended".to_string()),
                }
            }
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // A dropped sender counts as a request.
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Retries with exponential backoff, resolving a fresh endpoint each time.
async fn reconnect(
    handler: &BoxedConnectionHandler,
    conn_id: &str,
    config: &ClientConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Reconnect {
    let mut delay = config.initial_delay;
    let mut attempts = 0u32;

    loop {
        if let Some(max) = config.max_retries
            && attempts >= max
        {
            error!(conn_id = %conn_id, attempts, "Max retries reached, giving up");
            return Reconnect::GaveUp;
        }
        attempts += 1;

        warn!(conn_id = %conn_id, attempt = attempts, delay = ?delay, "Reconnecting...");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_requested(shutdown_rx) => return Reconnect::Shutdown,
        }

        match open(handler).await {
            Ok((stream, url)) => return Reconnect::Connected(stream, url),
            Err(e) => {
                handler.on_error(conn_id, &e).await;
                if let TransportError::AuthRejected { .. } = e {
                    error!(conn_id = %conn_id, error = %e, "Endpoint rejected our credentials, giving up");
                    return Reconnect::GaveUp;
                }
                warn!(conn_id = %conn_id, error = %e, "Reconnection failed");
                delay = config.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tether_core::ConnectionHandler;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Connect,
        Message(String),
        Disconnect(bool),
        Error,
    }

    struct Recorder {
        url: String,
        resolves: AtomicUsize,
        reject_after: Option<usize>,
        seen: std::sync::Mutex<Vec<Seen>>,
        notify: mpsc::UnboundedSender<Seen>,
    }

    impl Recorder {
        fn new(url: String) -> (Arc<Self>, mpsc::UnboundedReceiver<Seen>) {
            let (notify, rx) = mpsc::unbounded_channel();
            let recorder = Arc::new(Self {
                url,
                resolves: AtomicUsize::new(0),
                reject_after: None,
                seen: Default::default(),
                notify,
            });
            (recorder, rx)
        }

        fn record(&self, seen: Seen) {
            self.seen.lock().unwrap().push(seen.clone());
            let _ = self.notify.send(seen);
        }
    }

    #[async_trait]
    impl ConnectionHandler for Recorder {
        async fn resolve_endpoint(&self) -> TransportResult<String> {
            let n = self.resolves.fetch_add(1, Ordering::SeqCst);
            if self.reject_after.is_some_and(|limit| n >= limit) {
                return Err(TransportError::AuthRejected {
                    reason: "invalid_auth".into(),
                });
            }
            Ok(self.url.clone())
        }

        async fn on_connect(&self, _conn_info: ConnectionInfo) -> String {
            self.record(Seen::Connect);
            "test".into()
        }

        async fn on_message(&self, _conn_id: &str, data: &[u8]) {
            self.record(Seen::Message(String::from_utf8_lossy(data).into_owned()));
        }

        async fn on_disconnect(&self, _conn_id: &str, reason: DisconnectReason) {
            self.record(Seen::Disconnect(reason.intentional));
        }

        async fn on_error(&self, _conn_id: &str, _error: &TransportError) {
            self.record(Seen::Error);
        }
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    fn quick() -> ClientConfig {
        ClientConfig {
            heartbeat_interval: None,
            ..ClientConfig::default()
                .with_delays(Duration::from_millis(10), Duration::from_millis(20))
        }
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order_then_lost() {
        let (listener, url) = bind().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text("one".into())).await.unwrap();
            ws.send(Message::Text("two".into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (recorder, _rx) = Recorder::new(url);
        let handle = WsClientCapabilityImpl::new()
            .connect(
                recorder.clone(),
                ClientConfig {
                    heartbeat_interval: None,
                    ..ClientConfig::no_reconnect()
                },
            )
            .await
            .unwrap();

        handle.closed().await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                Seen::Connect,
                Seen::Message("one".into()),
                Seen::Message("two".into()),
                Seen::Disconnect(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_is_intentional() {
        let (listener, url) = bind().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (recorder, _rx) = Recorder::new(url);
        let handle = WsClientCapabilityImpl::new()
            .connect(recorder.clone(), quick())
            .await
            .unwrap();

        handle.close();
        handle.closed().await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Seen::Connect, Seen::Disconnect(true)]
        );
    }

    #[tokio::test]
    async fn test_reconnect_resolves_fresh_endpoint() {
        let (listener, url) = bind().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut first = accept_async(tcp).await.unwrap();
            first.close(None).await.unwrap();

            let (tcp, _) = listener.accept().await.unwrap();
            let mut second = accept_async(tcp).await.unwrap();
            second.send(Message::Text("again".into())).await.unwrap();
            while let Some(Ok(_)) = second.next().await {}
        });

        let (recorder, mut rx) = Recorder::new(url);
        let handle = WsClientCapabilityImpl::new()
            .connect(recorder.clone(), quick())
            .await
            .unwrap();

        while let Some(seen) = rx.recv().await {
            if seen == Seen::Message("again".into()) {
                break;
            }
        }
        assert_eq!(recorder.resolves.load(Ordering::SeqCst), 2);

        handle.close();
        handle.closed().await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                Seen::Connect,
                Seen::Disconnect(false),
                Seen::Connect,
                Seen::Message("again".into()),
                Seen::Disconnect(true),
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_rejection_on_reconnect_stops_client() {
        let (listener, url) = bind().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (notify, _rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder {
            url,
            resolves: AtomicUsize::new(0),
            reject_after: Some(1),
            seen: Default::default(),
            notify,
        });
        let handle = WsClientCapabilityImpl::new()
            .connect(recorder.clone(), quick())
            .await
            .unwrap();

        handle.closed().await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Seen::Connect, Seen::Disconnect(false), Seen::Error]
        );
    }

    #[tokio::test]
    async fn test_first_attempt_failure_is_returned() {
        let (listener, url) = bind().await;
        drop(listener);

        let (recorder, _rx) = Recorder::new(url);
        let result = WsClientCapabilityImpl::new()
            .connect(recorder.clone(), quick())
            .await;

        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_ping_is_answered() {
        let (listener, url) = bind().await;
        let (pong_tx, pong_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Ping(b"are-you-there".to_vec().into()))
                .await
                .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Pong(data) = msg {
                    let _ = pong_tx.send(data.to_vec());
                    break;
                }
            }
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (recorder, _rx) = Recorder::new(url);
        let handle = WsClientCapabilityImpl::new()
            .connect(recorder.clone(), quick())
            .await
            .unwrap();

        let pong = tokio::time::timeout(Duration::from_secs(2), pong_rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pong, b"are-you-there");

        handle.close();
        handle.closed().await;
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Seen::Connect, Seen::Disconnect(true)]
        );
    }
}
