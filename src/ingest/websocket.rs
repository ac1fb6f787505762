use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::client::event_parser::{detect_create_instruction, parse_stream_message, StreamMessage};
use crate::client::rpc::{JsonRpcRequest, TransactionSource};
use crate::config::MonitorConfig;
use crate::core::{LaunchDetails, LaunchEvent};
use crate::ingest::transaction::extract_launch;
use crate::util::display::print_launch_details;

/// Request id used for the logs subscription
const LOGS_SUBSCRIBE_ID: u64 = 1;

/// Connection state of the log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Counters for monitoring the stream
#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    pub connection_attempts: u64,
    pub messages_received: u64,
    pub create_events_detected: u64,
    pub launches_emitted: u64,
    pub launches_dropped: u64,
}

/// Watches the program's log stream and emits a launch event per create instruction
pub struct EventMonitor {
    config: MonitorConfig,
    transactions: Arc<dyn TransactionSource>,
    launch_sender: mpsc::UnboundedSender<LaunchEvent>,
    connection_state: Arc<RwLock<ConnectionState>>,
    subscription_id: Arc<AtomicU64>,
    stats: Arc<RwLock<MonitorStats>>,
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventMonitor {
    /// Creates a monitor and the receiver its launch events are delivered to
    pub fn new(
        config: MonitorConfig,
        transactions: Arc<dyn TransactionSource>,
    ) -> (Self, mpsc::UnboundedReceiver<LaunchEvent>) {
        let (launch_sender, launch_receiver) = mpsc::unbounded_channel();

        let monitor = Self {
            config,
            transactions,
            launch_sender,
            connection_state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscription_id: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(RwLock::new(MonitorStats::default())),
        };

        (monitor, launch_receiver)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }

    pub async fn stats(&self) -> MonitorStats {
        self.stats.read().await.clone()
    }

    /// Last subscription id acknowledged by the node, 0 before the first ack
    pub fn subscription_id(&self) -> u64 {
        self.subscription_id.load(Ordering::Relaxed)
    }

    /// Connection loop. Never returns; every disconnect is followed by a reconnect.
    #[instrument(skip(self), fields(url = %self.config.ws_url))]
    pub async fn run(&self) -> Result<()> {
        info!("Starting log stream monitor for program {}", self.config.program_id);

        loop {
            self.set_state(ConnectionState::Connecting).await;
            self.stats.write().await.connection_attempts += 1;

            match self.connect_and_handle().await {
                Ok(()) => info!("[WS] closed"),
                Err(e) => error!(error = %e, "[WS] connection failed"),
            }

            self.set_state(ConnectionState::Disconnected).await;

            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            debug!("Reconnecting in {:?}", delay);
            sleep(delay).await;
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.connection_state.write().await = state;
    }

    async fn connect_and_handle(&self) -> Result<()> {
        let url = Url::parse(&self.config.ws_url).context("Failed to parse WebSocket URL")?;

        let (ws_stream, response) = timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            connect_async(url.as_str()),
        )
        .await
        .context("Connection timeout")?
        .context("Failed to connect to WebSocket")?;

        info!("Connected to {} (HTTP {})", self.config.ws_url, response.status());

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let subscribe = logs_subscribe_request(&self.config.program_id);
        let text = serde_json::to_string(&subscribe).context("Failed to serialize logsSubscribe request")?;
        ws_sender.send(Message::Text(text)).await.context("Failed to send logsSubscribe")?;

        self.set_state(ConnectionState::Subscribed).await;
        info!("[WS] Subscribed");

        // Outgoing frames go through a channel so the keepalive can share the sink
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!(error = %e, "Failed to send WebSocket frame");
                    break;
                }
            }
        });

        let heartbeat_task = {
            let tx = tx.clone();
            let interval_duration = Duration::from_millis(self.config.heartbeat_interval_ms);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(interval_duration);
                // first tick completes immediately
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if tx.send(Message::Ping(vec![])).is_err() {
                        debug!("Heartbeat channel closed");
                        break;
                    }
                }
            })
        };

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.stats.write().await.messages_received += 1;
                    self.handle_message(&text).await;
                }
                Ok(Message::Close(frame)) => {
                    info!("WebSocket closed: {:?}", frame);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Binary(data)) => {
                    warn!("Received unexpected binary message: {} bytes", data.len());
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!(error = %e, "[WS] error");
                    break;
                }
            }
        }

        heartbeat_task.abort();
        writer_task.abort();

        Ok(())
    }

    async fn handle_message(&self, text: &str) {
        let Some(message) = parse_stream_message(text) else {
            warn!("[WS] Json parse error: {}", text);
            return;
        };

        match message {
            StreamMessage::SubscriptionConfirmed { request_id, subscription_id } if request_id == LOGS_SUBSCRIBE_ID => {
                self.subscription_id.store(subscription_id, Ordering::Relaxed);
                info!("[WS] subscription id = {}", subscription_id);
            }
            StreamMessage::SubscriptionConfirmed { request_id, .. } => {
                debug!("Ignoring acknowledgement for request {}", request_id);
            }
            StreamMessage::RequestFailed { request_id, message } => {
                error!("RPC error for request {:?}: {}", request_id, message);
            }
            StreamMessage::Logs(notification) => {
                if detect_create_instruction(&notification.logs, &self.config.program_id) {
                    debug!(slot = notification.slot, signature = %notification.signature, "Create instruction detected");
                    self.stats.write().await.create_events_detected += 1;
                    self.spawn_resolution(notification.signature);
                }
            }
            StreamMessage::Other => {}
        }
    }

    /// Resolve the transaction off the read loop so the stream keeps draining
    fn spawn_resolution(&self, signature: String) {
        let transactions = Arc::clone(&self.transactions);
        let program_id = self.config.program_id.clone();
        let sender = self.launch_sender.clone();
        let stats = Arc::clone(&self.stats);
        let log_launches = self.config.log_launches;

        tokio::spawn(async move {
            match resolve_launch(transactions.as_ref(), &program_id, &signature).await {
                Some(details) => {
                    if log_launches {
                        print_launch_details(&details);
                    }
                    stats.write().await.launches_emitted += 1;
                    if sender.send(details.to_event()).is_err() {
                        debug!("Launch receiver dropped");
                    }
                }
                None => {
                    stats.write().await.launches_dropped += 1;
                }
            }
        });
    }
}

/// `logsSubscribe` request scoped to transactions mentioning `program_id`
pub fn logs_subscribe_request(program_id: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(
        LOGS_SUBSCRIBE_ID,
        "logsSubscribe",
        serde_json::json!([
            { "mentions": [program_id] },
            { "commitment": "processed" }
        ]),
    )
}

/// Fetch a create transaction and extract its accounts.
/// Every failure is logged and yields `None`; nothing is retried.
pub async fn resolve_launch(
    transactions: &dyn TransactionSource,
    program_id: &str,
    signature: &str,
) -> Option<LaunchDetails> {
    let envelope = match transactions.fetch_transaction(signature).await {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            debug!("Transaction not found: {}", signature);
            return None;
        }
        Err(e) => {
            warn!(error = %e, signature, "RPC error while fetching transaction");
            return None;
        }
    };

    match extract_launch(&envelope, program_id, signature) {
        Ok(details) => Some(details),
        Err(e) => {
            warn!(error = %e, signature, "Dropping launch");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::rpc::RpcError;
    use crate::core::PUMP_FUN_PROGRAM;
    use crate::ingest::transaction::TransactionEnvelope;
    use async_trait::async_trait;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    struct FakeTransactions {
        envelope: Option<serde_json::Value>,
        fail: bool,
    }

    #[async_trait]
    impl TransactionSource for FakeTransactions {
        async fn fetch_transaction(&self, _signature: &str) -> Result<Option<TransactionEnvelope>, RpcError> {
            if self.fail {
                return Err(RpcError::Decode("timeout".to_string()));
            }
            Ok(self
                .envelope
                .clone()
                .map(|v| serde_json::from_value(v).unwrap()))
        }
    }

    fn create_envelope() -> serde_json::Value {
        serde_json::json!({
            "transaction": { "message": {
                "accountKeys": ["Payer", "Mint", "Auth", "Curve", PUMP_FUN_PROGRAM],
                "instructions": [ { "programIdIndex": 4, "accounts": [1, 2, 3] } ]
            } }
        })
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            ws_url: "ws://127.0.0.1:1".to_string(),
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn test_logs_subscribe_request() {
        let text = serde_json::to_string(&logs_subscribe_request(PUMP_FUN_PROGRAM)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["method"], "logsSubscribe");
        assert_eq!(value["id"], 1);
        assert_eq!(value["params"][0]["mentions"][0], PUMP_FUN_PROGRAM);
        assert_eq!(value["params"][1]["commitment"], "processed");
    }

    #[tokio::test]
    async fn test_resolve_launch() {
        let source = FakeTransactions { envelope: Some(create_envelope()), fail: false };
        let details = resolve_launch(&source, PUMP_FUN_PROGRAM, "sig").await.unwrap();
        assert_eq!(details.mint, "Mint");
        assert_eq!(details.bonding_curve, "Curve");

        let missing = FakeTransactions { envelope: None, fail: false };
        assert!(resolve_launch(&missing, PUMP_FUN_PROGRAM, "sig").await.is_none());

        let failing = FakeTransactions { envelope: None, fail: true };
        assert!(resolve_launch(&failing, PUMP_FUN_PROGRAM, "sig").await.is_none());

        let unrelated = FakeTransactions {
            envelope: Some(serde_json::json!({
                "transaction": { "message": {
                    "accountKeys": ["Payer", "Other"],
                    "instructions": [ { "programIdIndex": 1, "accounts": [0] } ]
                } }
            })),
            fail: false,
        };
        assert!(resolve_launch(&unrelated, PUMP_FUN_PROGRAM, "sig").await.is_none());
    }

    #[tokio::test]
    async fn test_create_notification_emits_launch() {
        let source = Arc::new(FakeTransactions { envelope: Some(create_envelope()), fail: false });
        let (monitor, mut launches) = EventMonitor::new(test_config(), source);

        assert_eq!(monitor.connection_state().await, ConnectionState::Disconnected);

        monitor.handle_message(r#"{"jsonrpc":"2.0","result":77,"id":1}"#).await;
        assert_eq!(monitor.subscription_id(), 77);

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": { "subscription": 77, "result": {
                "context": { "slot": 1 },
                "value": {
                    "signature": "sig",
                    "err": null,
                    "logs": [
                        format!("Program {} invoke [1]", PUMP_FUN_PROGRAM),
                        "Program log: Instruction: Create"
                    ]
                }
            } }
        })
        .to_string();
        monitor.handle_message(&notification).await;

        let event = tokio::time::timeout(Duration::from_secs(2), launches.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.mint, "Mint");
        assert_eq!(event.bonding_curve, "Curve");

        let stats = monitor.stats().await;
        assert_eq!(stats.create_events_detected, 1);
        assert_eq!(stats.messages_received, 0);
    }

    #[tokio::test]
    async fn test_non_create_notification_is_ignored() {
        let source = Arc::new(FakeTransactions { envelope: Some(create_envelope()), fail: false });
        let (monitor, mut launches) = EventMonitor::new(test_config(), source);

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": { "subscription": 77, "result": {
                "context": { "slot": 1 },
                "value": {
                    "signature": "sig",
                    "err": null,
                    "logs": [
                        format!("Program {} invoke [1]", PUMP_FUN_PROGRAM),
                        "Program log: Instruction: Sell"
                    ]
                }
            } }
        })
        .to_string();
        monitor.handle_message(&notification).await;

        let received = tokio::time::timeout(Duration::from_millis(100), launches.recv()).await;
        assert!(received.is_err());
        assert_eq!(monitor.stats().await.create_events_detected, 0);
    }

    async fn wait_for_state(monitor: &EventMonitor, expected: ConnectionState) {
        for _ in 0..1_000 {
            if monitor.connection_state().await == expected {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("monitor never reached {:?}", expected);
    }

    #[tokio::test]
    async fn test_monitor_resubscribes_after_stream_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, mut frames) = mpsc::unbounded_channel::<String>();
        let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            // first connection: subscription, one keepalive ping, then a server-side close
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                frames_tx.send(text).unwrap();
            }
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Ping(_) = msg {
                    frames_tx.send("ping".to_string()).unwrap();
                    break;
                }
            }
            close_rx.await.unwrap();
            let _ = ws.close(None).await;
            while let Some(Ok(_)) = ws.next().await {}

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                frames_tx.send(text).unwrap();
            }
            while let Some(Ok(_)) = ws.next().await {}
        });

        let config = MonitorConfig {
            ws_url: format!("ws://{}", addr),
            connect_timeout_ms: 2_000,
            reconnect_delay_ms: 300,
            heartbeat_interval_ms: 20,
            ..MonitorConfig::default()
        };
        let source = Arc::new(FakeTransactions { envelope: None, fail: false });
        let (monitor, _launches) = EventMonitor::new(config, source);
        let monitor = Arc::new(monitor);
        assert_eq!(monitor.connection_state().await, ConnectionState::Disconnected);

        let runner = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.run().await })
        };

        let first = timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
        let request: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(request["method"], "logsSubscribe");
        assert_eq!(request["params"][0]["mentions"][0], PUMP_FUN_PROGRAM);
        wait_for_state(&monitor, ConnectionState::Subscribed).await;

        let keepalive = timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
        assert_eq!(keepalive, "ping");
        assert_eq!(monitor.stats().await.connection_attempts, 1);

        close_tx.send(()).unwrap();
        wait_for_state(&monitor, ConnectionState::Disconnected).await;

        let second = timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
        assert_eq!(second, first);
        wait_for_state(&monitor, ConnectionState::Subscribed).await;
        assert!(monitor.stats().await.connection_attempts >= 2);

        runner.abort();
        server.abort();
    }

    #[tokio::test]
    async fn test_monitor_keeps_retrying_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = MonitorConfig {
            ws_url: format!("ws://{}", addr),
            connect_timeout_ms: 200,
            reconnect_delay_ms: 10,
            ..MonitorConfig::default()
        };
        let source = Arc::new(FakeTransactions { envelope: None, fail: false });
        let (monitor, _launches) = EventMonitor::new(config, source);

        let outcome = timeout(Duration::from_millis(500), monitor.run()).await;
        assert!(outcome.is_err(), "run must not give up on connection failures");
        assert!(monitor.stats().await.connection_attempts >= 3);
    }
}
