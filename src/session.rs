//! FIX 4.4 session engine: socket lifecycle, logon, heartbeat
//! acknowledgement, sequence numbering and reconnection.
//!
//! State machine: `Disconnected -> Connecting -> LoggedOn -> Disconnected`,
//! with an implicit `LoggingOn` sub-state between TCP-connect and receipt
//! of the counterparty's Logon response. Only this struct's `run` task
//! ever mutates the outbound sequence counter or the state field — every
//! other component learns about session state only through the messages
//! it hands off (tick jobs onto the queue), never by reading this struct.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::fix::{self, tags, describe_msg_type, FixDecoder, InboundMessage, OutboundMessage};
use crate::models::{Config, RawQuote, Side};
use crate::pipeline::{tick_worker::TickJob, WorkQueue};
use crate::store::Catalog;
use crate::subscription;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 1000;
const POST_LOGON_SUBSCRIBE_DELAY: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;
const HEART_BT_INT: &str = "30";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    LoggingOn,
    LoggedOn,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::LoggingOn => "LOGGING_ON",
            Self::LoggedOn => "LOGGED_ON",
        };
        write!(f, "{label}")
    }
}

/// What a single connect-and-serve attempt ended with.
enum Outcome {
    /// Socket closed, errored, or the peer logged us out. Reconnect.
    Disconnected,
    /// Shutdown signal observed; logout (if applicable) already sent.
    ShutdownRequested,
}

pub struct Session {
    config: Config,
    catalog: Catalog,
    pool: PgPool,
    cache: Arc<AsyncMutex<Cache>>,
    tick_queue: Arc<WorkQueue>,
    candle_queue: Arc<WorkQueue>,
    state: SessionState,
    outbound_seq: u64,
    reconnect_attempts: u32,
}

impl Session {
    pub fn new(
        config: Config,
        catalog: Catalog,
        pool: PgPool,
        cache: Arc<AsyncMutex<Cache>>,
        tick_queue: Arc<WorkQueue>,
        candle_queue: Arc<WorkQueue>,
    ) -> Self {
        Self {
            config,
            catalog,
            pool,
            cache,
            tick_queue,
            candle_queue,
            state: SessionState::Disconnected,
            outbound_seq: 0,
            reconnect_attempts: 0,
        }
    }

    /// Drives the session until a shutdown is requested on `shutdown` or
    /// the reconnect cap is exhausted. Never returns an `Err` on its own
    /// account: connection failures are logged and feed the reconnect
    /// loop rather than propagating, matching the no-fatal-on-network-
    /// error policy in the error handling design.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("shutdown already requested; session engine not connecting");
                return;
            }

            self.state = SessionState::Connecting;
            match self.connect_and_serve(&mut shutdown).await {
                Ok(Outcome::ShutdownRequested) => {
                    info!("session engine shut down gracefully");
                    return;
                }
                Ok(Outcome::Disconnected) => {
                    info!("session disconnected; will attempt reconnect");
                }
                Err(err) => {
                    error!(error = %err, "session attempt failed; will attempt reconnect");
                }
            }

            self.state = SessionState::Disconnected;
            self.reconnect_attempts += 1;
            if self.reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                error!(
                    attempts = self.reconnect_attempts,
                    "reconnect attempts exhausted; process remains alive without a session"
                );
                return;
            }

            info!(
                attempt = self.reconnect_attempts,
                delay_secs = RECONNECT_DELAY.as_secs(),
                "scheduling reconnect"
            );
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        info!("shutdown requested during reconnect backoff");
                        return;
                    }
                }
            }

            // Cache reconnect is idempotent (connect-only-if-disconnected);
            // safe to call unconditionally on every reconnect attempt. Spawned
            // rather than awaited here so it runs in parallel with the socket
            // reconnect about to start at the top of the next loop iteration,
            // instead of serializing a stalled Redis in front of every TCP
            // reconnect attempt.
            let cache = self.cache.clone();
            let catalog = self.catalog.clone();
            let pool = self.pool.clone();
            tokio::spawn(async move {
                {
                    let mut cache_guard = cache.lock().await;
                    if let Err(err) = cache_guard.ensure_connected().await {
                        warn!(error = %err, "cache reconnect failed; will retry on next pass");
                    }
                }
                if let Err(err) = catalog.reload(&pool).await {
                    warn!(error = %err, "reconnect warm-up: failed to reload currency pair catalog");
                }
                crate::bootstrap::warm_up(&catalog, &pool, cache).await;
            });
        }
    }

    async fn connect_and_serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Outcome> {
        let addr = format!("{}:{}", self.config.fix_server, self.config.fix_port);
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting to FIX server at {addr}"))?;
        info!(%addr, "TCP connected");

        let (mut read_half, write_half) = stream.into_split();
        let write_half = Arc::new(AsyncMutex::new(write_half));

        self.state = SessionState::LoggingOn;
        self.outbound_seq = 0;
        self.send_logon(&write_half).await?;

        let mut decoder = FixDecoder::new();
        let mut read_buf = vec![0u8; READ_CHUNK];
        let mut subscribe_deadline: Option<Instant> = None;

        loop {
            let sleep_until_subscribe = async {
                match subscribe_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                read_result = read_half.read(&mut read_buf) => {
                    let n = read_result.context("reading from FIX socket")?;
                    if n == 0 {
                        info!("FIX socket closed by peer (EOF)");
                        return Ok(Outcome::Disconnected);
                    }
                    decoder.feed(&read_buf[..n]);
                    while let Some(msg) = decoder.next_message() {
                        if let Some(outcome) = self
                            .dispatch(&msg, &write_half, &mut subscribe_deadline)
                            .await?
                        {
                            return Ok(outcome);
                        }
                    }
                }
                _ = sleep_until_subscribe, if subscribe_deadline.is_some() => {
                    subscribe_deadline = None;
                    self.dispatch_subscriptions(&write_half).await?;
                }
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        self.graceful_shutdown(&write_half).await;
                        return Ok(Outcome::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Returns `Some(outcome)` if this message ends the connect-and-serve
    /// loop (peer logout); `None` to keep reading.
    async fn dispatch(
        &mut self,
        msg: &InboundMessage,
        write_half: &Arc<AsyncMutex<OwnedWriteHalf>>,
        subscribe_deadline: &mut Option<Instant>,
    ) -> Result<Option<Outcome>> {
        let msg_type = msg.msg_type().to_string();
        debug!(msg_type = %describe_msg_type(&msg_type), seq = msg.seq_num(), "inbound FIX message");

        match msg_type.as_str() {
            "A" => {
                self.state = SessionState::LoggedOn;
                self.reconnect_attempts = 0;
                *subscribe_deadline = Some(Instant::now() + POST_LOGON_SUBSCRIBE_DELAY);
                info!("logon acknowledged; subscriptions will be dispatched shortly");
            }
            "W" | "X" => {
                self.handle_market_data(msg).await;
            }
            "3" => {
                warn!(reason = msg.text().unwrap_or("<none>"), "peer rejected a message");
            }
            "0" => {
                debug!("heartbeat received");
            }
            "5" => {
                info!("peer-initiated logout");
                return Ok(Some(Outcome::Disconnected));
            }
            _ => {
                debug!(label = %describe_msg_type(&msg_type), "unhandled message type");
            }
        }
        Ok(None)
    }

    async fn handle_market_data(&self, msg: &InboundMessage) {
        let Some(symbol) = msg.symbol().map(|s| s.to_string()) else {
            warn!("market data message without a symbol tag; dropping");
            return;
        };

        for entry in &msg.groups {
            if !entry.is_bid_or_ask() {
                continue;
            }
            let Some(price) = entry.px else {
                continue; // 270 absent: spec requires a present px to enqueue
            };
            let side = if entry.is_bid() { Side::Bid } else { Side::Ask };
            let source_time = entry
                .time
                .as_deref()
                .and_then(|t| chrono::NaiveTime::parse_from_str(t, "%H:%M:%S").ok());

            let quote = RawQuote {
                symbol: symbol.clone(),
                side,
                price,
                size: entry.size.unwrap_or(0.0),
                source_time,
                req_id: msg.field(tags::MD_REQ_ID).unwrap_or("").to_string(),
            };

            let now_ms = Utc::now().timestamp_millis();
            let job = TickJob::new(
                quote,
                self.catalog.clone(),
                self.pool.clone(),
                self.cache.clone(),
                self.candle_queue.clone(),
                now_ms,
            );
            if let Err(err) = self.tick_queue.enqueue(Box::new(job)).await {
                error!(%symbol, error = %err, "failed to enqueue tick job");
            }
        }
    }

    async fn send_logon(&mut self, write_half: &Arc<AsyncMutex<OwnedWriteHalf>>) -> Result<()> {
        self.outbound_seq += 1;
        let msg = OutboundMessage::new(
            "A",
            self.config.sender_comp_id.clone(),
            self.config.target_comp_id.clone(),
            self.outbound_seq,
            sending_time_now(),
        )
        .push(tags::ENCRYPT_METHOD, "0")
        .push(tags::HEART_BT_INT, HEART_BT_INT)
        .push(tags::RESET_SEQ_NUM_FLAG, "Y")
        .push(tags::USERNAME, self.config.username.clone())
        .push(tags::PASSWORD, self.config.password.clone());

        self.send(write_half, &msg).await.context("sending logon")
    }

    async fn dispatch_subscriptions(&mut self, write_half: &Arc<AsyncMutex<OwnedWriteHalf>>) -> Result<()> {
        let pairs = self.catalog.eligible_pairs();
        let mut seq = self.outbound_seq;
        let sending_time = sending_time_now();
        let requests = subscription::requests_for_eligible_pairs(
            &pairs,
            &self.config.sender_comp_id,
            &self.config.target_comp_id,
            &mut seq,
            &sending_time,
        );
        self.outbound_seq = seq;

        info!(pair_count = requests.len(), "dispatching market data subscriptions");
        for request in &requests {
            self.send(write_half, request).await.context("sending market data request")?;
        }
        Ok(())
    }

    async fn graceful_shutdown(&mut self, write_half: &Arc<AsyncMutex<OwnedWriteHalf>>) {
        info!(state = %self.state, "graceful shutdown requested");
        if self.state == SessionState::LoggedOn {
            self.outbound_seq += 1;
            let msg = OutboundMessage::new(
                "5",
                self.config.sender_comp_id.clone(),
                self.config.target_comp_id.clone(),
                self.outbound_seq,
                sending_time_now(),
            );
            if let Err(err) = self.send(write_half, &msg).await {
                warn!(error = %err, "failed to send logout during shutdown");
            }
        }
        let mut half = write_half.lock().await;
        if let Err(err) = half.shutdown().await {
            warn!(error = %err, "error half-closing FIX socket during shutdown");
        }
    }

    async fn send(&self, write_half: &Arc<AsyncMutex<OwnedWriteHalf>>, msg: &OutboundMessage) -> Result<()> {
        let bytes = fix::encode(msg);
        let mut half = write_half.lock().await;
        half.write_all(&bytes).await?;
        Ok(())
    }
}

fn sending_time_now() -> String {
    Utc::now().format("%Y%m%d-%H:%M:%S").to_string()
}
