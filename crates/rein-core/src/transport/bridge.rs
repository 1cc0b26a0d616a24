//! SocketBridge - 単一 peer との line-delimited JSON 接続
//!
//! # 役割分担
//! - accept loop: listener を所有し、peer が切れるたびに次の peer を accept
//! - reader: 現在の peer に紐づく唯一の producer（events / responses の両キューへ）
//! - send_query: send lock で直列化し、in-flight の query は常に 1 つ
//!
//! 応答の対応付けは位置ベース（FIFO）です。応答には受信した reader の
//! generation を付け、古いセッションの応答が新しい caller に渡らないようにします。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::domain::ids::PeerId;
use crate::domain::message::{Channel, Message, Outbound};
use crate::error::TransportError;
use crate::ports::{IdGenerator, RemoteLink, SystemClock, UlidGenerator};
use crate::transport::codec::{Decoded, decode_line, preview};
use crate::transport::queue::BoundedQueue;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How `start` treats the first peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Accept the first peer before returning. `None` waits forever.
    Blocking { timeout: Option<Duration> },
    /// Return right after binding; every peer is accepted in the background.
    Background,
}

/// A response plus the session that produced it.
#[derive(Debug)]
struct Tagged {
    generation: u64,
    message: Message,
}

struct Shared {
    events: BoundedQueue<Message>,
    responses: BoundedQueue<Tagged>,
    /// Write half of the current peer. Also guards generation changes.
    writer: Mutex<Option<OwnedWriteHalf>>,
    send_lock: Mutex<()>,
    connected: AtomicBool,
    generation: AtomicU64,
    seq: AtomicU64,
    peer: StdMutex<Option<PeerId>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    peer_lost: Notify,
    query_timeout: Duration,
    max_line_bytes: usize,
    ids: Box<dyn IdGenerator>,
}

pub struct SocketBridge {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    acceptor: StdMutex<Option<JoinHandle<()>>>,
}

impl SocketBridge {
    /// Bind and listen on `config.bind_addr()`.
    pub async fn start(config: &BridgeConfig, mode: StartMode) -> Result<Arc<Self>, TransportError> {
        Self::start_with_ids(config, mode, Box::new(UlidGenerator::new(SystemClock))).await
    }

    pub async fn start_with_ids(
        config: &BridgeConfig,
        mode: StartMode,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Arc<Self>, TransportError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");

        let shared = Arc::new(Shared {
            events: BoundedQueue::new(config.event_capacity),
            responses: BoundedQueue::new(config.response_capacity),
            writer: Mutex::new(None),
            send_lock: Mutex::new(()),
            connected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            peer: StdMutex::new(None),
            reader: StdMutex::new(None),
            peer_lost: Notify::new(),
            query_timeout: config.query_timeout(),
            max_line_bytes: config.max_line_bytes,
            ids,
        });

        if let StartMode::Blocking { timeout } = mode {
            info!(addr = %local_addr, "waiting for first peer");
            let accepted = match timeout {
                Some(waited) => tokio::time::timeout(waited, listener.accept())
                    .await
                    .map_err(|_| {
                        warn!(addr = %local_addr, ?waited, "no peer connected in time");
                        TransportError::ConnectTimeout {
                            addr: local_addr,
                            waited,
                        }
                    })?,
                None => listener.accept().await,
            };
            let (stream, remote) = accepted.map_err(TransportError::Accept)?;
            Shared::install(&shared, stream, remote).await;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let acceptor = tokio::spawn(accept_loop(listener, Arc::clone(&shared), shutdown_rx));

        Ok(Arc::new(Self {
            shared,
            local_addr,
            shutdown_tx,
            acceptor: StdMutex::new(Some(acceptor)),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Id of the current peer, if one is connected.
    pub fn peer_id(&self) -> Option<PeerId> {
        if !self.is_connected() {
            return None;
        }
        *self.shared.peer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Send one record and wait for its response.
    ///
    /// Fails fast without I/O when no peer is connected. Responses left over from
    /// an earlier timed-out query are discarded before the write.
    pub async fn send_query(&self, query: Outbound) -> Result<Message, TransportError> {
        let kind = query.kind().to_string();
        if self.is_stopped() {
            return Err(TransportError::Stopped);
        }
        if !self.is_connected() {
            debug!(query = %kind, "not connected, skipping query");
            return Err(TransportError::Disconnected { query: kind });
        }
        let bytes = query.encode()?;

        let _in_flight = self.shared.send_lock.lock().await;

        let generation = {
            let mut writer = self.shared.writer.lock().await;
            let generation = self.shared.generation.load(Ordering::Acquire);
            let Some(w) = writer.as_mut() else {
                return Err(TransportError::Disconnected { query: kind });
            };

            let stale = self.shared.responses.clear();
            if stale > 0 {
                warn!(query = %kind, stale, "discarded late responses");
            }

            let written = match w.write_all(&bytes).await {
                Ok(()) => w.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!(query = %kind, error = %e, "write failed");
                self.shared.lose_peer_locked(&mut writer, generation);
                return Err(TransportError::Io(e));
            }
            generation
        };

        let deadline = Instant::now() + self.shared.query_timeout;
        loop {
            match self.shared.responses.pop_until(deadline).await {
                Some(tagged) if tagged.generation == generation => return Ok(tagged.message),
                Some(tagged) => {
                    debug!(
                        query = %kind,
                        generation = tagged.generation,
                        "dropping response from a superseded session"
                    );
                }
                None => {
                    warn!(query = %kind, waited = ?self.shared.query_timeout, "no response");
                    return Err(TransportError::CorrelationTimeout {
                        query: kind,
                        waited: self.shared.query_timeout,
                    });
                }
            }
        }
    }

    /// Drain every buffered event, oldest first.
    pub fn poll_events(&self) -> Vec<Message> {
        self.shared.events.drain()
    }

    /// Stop accepting, close the current peer and wait for the acceptor to exit.
    pub async fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        {
            let mut writer = self.shared.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.shutdown().await;
            }
            self.shared.connected.store(false, Ordering::Release);
        }
        self.shared.retire_reader().await;

        let acceptor = self
            .acceptor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(join) = acceptor {
            let _ = join.await;
        }
        self.shared.events.clear();
        self.shared.responses.clear();
        info!(addr = %self.local_addr, "bridge stopped");
    }
}

#[async_trait]
impl RemoteLink for SocketBridge {
    fn is_connected(&self) -> bool {
        SocketBridge::is_connected(self)
    }

    async fn send_query(&self, query: Outbound) -> Result<Message, TransportError> {
        SocketBridge::send_query(self, query).await
    }

    fn poll_events(&self) -> Vec<Message> {
        SocketBridge::poll_events(self)
    }
}

impl Shared {
    /// Make `stream` the current peer: stop the old reader, close the stale
    /// socket, flush both queues and start a reader for the new session.
    async fn install(this: &Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        let peer = this.ids.generate_peer_id();
        let (read, write) = stream.into_split();

        // 旧 reader が flush 後にキューへ push しないよう、先に止めて終了を待つ
        this.retire_reader().await;

        let (generation, flushed) = {
            let mut writer = this.writer.lock().await;
            let generation = this.generation.fetch_add(1, Ordering::AcqRel) + 1;
            if let Some(mut stale) = writer.take() {
                let _ = stale.shutdown().await;
            }
            let flushed = this.events.clear() + this.responses.clear();
            *writer = Some(write);
            *this.peer.lock().unwrap_or_else(|e| e.into_inner()) = Some(peer);
            this.connected.store(true, Ordering::Release);
            (generation, flushed)
        };

        let reader = tokio::spawn(read_loop(Arc::clone(this), read, generation, peer));
        *this.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(reader);

        info!(peer = %peer, remote = %remote, generation, flushed, "peer connected");
    }

    /// Mark the session `generation` as gone. A no-op for superseded sessions.
    async fn lose_peer(&self, generation: u64) {
        let mut writer = self.writer.lock().await;
        self.lose_peer_locked(&mut writer, generation);
    }

    fn lose_peer_locked(&self, writer: &mut Option<OwnedWriteHalf>, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        if self.connected.swap(false, Ordering::AcqRel) {
            // Dropping the write half closes our side of the socket
            writer.take();
            let peer = *self.peer.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(peer) = peer {
                info!(peer = %peer, generation, "peer disconnected");
            }
            self.peer_lost.notify_one();
        }
    }

    /// Abort the current reader and wait until it has exited.
    async fn retire_reader(&self) {
        let old = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(old) = old {
            old.abort();
            let _ = old.await;
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        while shared.connected.load(Ordering::Acquire) {
            tokio::select! {
                _ = shutdown_rx.changed() => return,
                _ = shared.peer_lost.notified() => {}
            }
        }
        if *shutdown_rx.borrow() {
            return;
        }

        info!("waiting for peer to connect (or reconnect)");
        let accepted = tokio::select! {
            _ = shutdown_rx.changed() => return,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote)) => Shared::install(&shared, stream, remote).await,
            Err(e) => {
                let err = TransportError::Accept(e);
                error!(error = %err, "accept failed");
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                }
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>, read: OwnedReadHalf, generation: u64, peer: PeerId) {
    let mut reader = BufReader::new(read);
    let mut line = Vec::with_capacity(1024);
    let limit = shared.max_line_bytes;

    loop {
        line.clear();
        // 上限 + 1 バイトまでしか読まない（改行を含めて limit + 1）
        let read = (&mut reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut line)
            .await;
        match read {
            Ok(0) => {
                info!(peer = %peer, "connection closed by peer");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(peer = %peer, error = %e, "read failed");
                break;
            }
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        } else if line.len() > limit {
            warn!(peer = %peer, limit, line = %preview(&line), "record exceeds line limit, skipping");
            match skip_line(&mut reader).await {
                Ok(true) => continue,
                Ok(false) => {
                    info!(peer = %peer, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "read failed");
                    break;
                }
            }
        }

        let seq = shared.seq.fetch_add(1, Ordering::Relaxed);
        match decode_line(&line, seq) {
            Decoded::Blank => {}
            Decoded::Malformed(reason) => {
                warn!(peer = %peer, reason = %reason, line = %preview(&line), "skipping malformed record");
            }
            Decoded::Record(message) => match message.channel() {
                Channel::Event => {
                    if let Some(dropped) = shared.events.push(message) {
                        debug!(peer = %peer, dropped_seq = dropped.seq(), "event queue full, dropped oldest");
                    }
                }
                Channel::Response => {
                    shared.responses.push(Tagged {
                        generation,
                        message,
                    });
                }
            },
        }
    }

    shared.lose_peer(generation).await;
}

/// Consume input up to and including the next `\n`. `Ok(false)` on EOF.
async fn skip_line<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<bool> {
    loop {
        let (consumed, found) = {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(false);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            }
        };
        reader.consume(consumed);
        if found {
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::OwnedWriteHalf as PeerWriter;

    fn loopback(query_timeout_ms: u64) -> BridgeConfig {
        BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            connect_timeout_secs: 0,
            query_timeout_ms,
            event_capacity: 200,
            response_capacity: 64,
            max_line_bytes: 1 << 20,
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// A scripted remote peer.
    struct FakePeer {
        lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        writer: PeerWriter,
    }

    impl FakePeer {
        async fn connect(bridge: &SocketBridge) -> Self {
            let stream = TcpStream::connect(bridge.local_addr()).await.unwrap();
            let (read, writer) = stream.into_split();
            Self {
                lines: BufReader::new(read).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> serde_json::Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = loopback(100);
        cfg.port = taken.local_addr().unwrap().port();

        let err = SocketBridge::start(&cfg, StartMode::Background)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn blocking_start_times_out_without_peer() {
        let err = SocketBridge::start(
            &loopback(100),
            StartMode::Blocking {
                timeout: Some(Duration::from_millis(50)),
            },
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, TransportError::ConnectTimeout { .. }));
    }

    #[tokio::test]
    async fn query_while_disconnected_fails_fast() {
        let bridge = SocketBridge::start(&loopback(5_000), StartMode::Background)
            .await
            .unwrap();
        let started = Instant::now();
        let err = bridge
            .send_query(Outbound::query("QUERY_INVENTORY"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Disconnected { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
        bridge.stop().await;
    }

    #[tokio::test]
    async fn query_roundtrip_and_event_routing() {
        let bridge = SocketBridge::start(&loopback(2_000), StartMode::Background)
            .await
            .unwrap();
        let mut peer = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;
        assert!(bridge.peer_id().is_some());

        let remote = tokio::spawn(async move {
            peer.send(r#"{"type":"EVENT","event_type":"stuck"}"#).await;
            peer.send("{this is not json").await;
            peer.send("").await;
            peer.send(r#"{"type":"EVENT","event_type":"lowHealth"}"#).await;
            let query = peer.recv().await;
            assert_eq!(query["type"], "QUERY_INVENTORY");
            peer.send(r#"{"type":"INVENTORY","money":42}"#).await;
            peer
        });

        let response = bridge
            .send_query(Outbound::query("QUERY_INVENTORY"))
            .await
            .unwrap();
        assert_eq!(response.kind(), "INVENTORY");
        assert_eq!(response.i64_field("money"), Some(42));

        let events = bridge.poll_events();
        let names: Vec<_> = events.iter().filter_map(|e| e.str_field("event_type")).collect();
        assert_eq!(names, vec!["stuck", "lowHealth"]);
        assert!(bridge.poll_events().is_empty());
        assert!(bridge.is_connected(), "malformed line must not close the connection");

        let _peer = remote.await.unwrap();
        bridge.stop().await;
    }

    #[tokio::test]
    async fn unanswered_query_times_out_and_late_answer_is_purged() {
        let bridge = SocketBridge::start(&loopback(300), StartMode::Background)
            .await
            .unwrap();
        let mut peer = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;

        let remote = tokio::spawn(async move {
            let _first = peer.recv().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            peer.send(r#"{"type":"OBJECTIVE","tag":"late"}"#).await;
            let _second = peer.recv().await;
            peer.send(r#"{"type":"OBJECTIVE","tag":"fresh"}"#).await;
            peer
        });

        let err = bridge
            .send_query(Outbound::query("QUERY_OBJECTIVE"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::CorrelationTimeout { .. }));

        // Let the late answer land in the response queue
        tokio::time::sleep(Duration::from_millis(400)).await;

        let fresh = bridge
            .send_query(Outbound::query("QUERY_OBJECTIVE"))
            .await
            .unwrap();
        assert_eq!(fresh.str_field("tag"), Some("fresh"));

        let _peer = remote.await.unwrap();
        bridge.stop().await;
    }

    #[tokio::test]
    async fn reconnect_flushes_queues_and_never_delivers_stale_responses() {
        let bridge = SocketBridge::start(&loopback(2_000), StartMode::Background)
            .await
            .unwrap();

        let mut first = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;
        let first_id = bridge.peer_id().unwrap();
        first.send(r#"{"type":"EVENT","event_type":"combatEntered"}"#).await;
        first.send(r#"{"type":"INVENTORY","money":1,"tag":"stale"}"#).await;
        drop(first);
        wait_until(|| !bridge.is_connected()).await;

        let mut second = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;
        assert_ne!(bridge.peer_id().unwrap(), first_id);
        assert!(bridge.poll_events().is_empty());

        let remote = tokio::spawn(async move {
            let _query = second.recv().await;
            second.send(r#"{"type":"INVENTORY","money":2,"tag":"fresh"}"#).await;
            second
        });

        let response = bridge
            .send_query(Outbound::query("QUERY_INVENTORY"))
            .await
            .unwrap();
        assert_eq!(response.str_field("tag"), Some("fresh"));

        let _second = remote.await.unwrap();
        bridge.stop().await;
    }

    #[tokio::test]
    async fn superseded_reader_cannot_refill_flushed_queues() {
        let bridge = SocketBridge::start(&loopback(2_000), StartMode::Background)
            .await
            .unwrap();
        let mut first = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;
        let first_id = bridge.peer_id().unwrap();

        // 旧 peer は install の最中もイベントを流し続ける
        let flood = tokio::spawn(async move {
            for i in 0..5_000 {
                let line = format!(r#"{{"type":"EVENT","event_type":"stuck","n":{i}}}"#);
                if first.writer.write_all(line.as_bytes()).await.is_err()
                    || first.writer.write_all(b"\n").await.is_err()
                {
                    break;
                }
            }
            first
        });
        wait_until(|| !bridge.shared.events.is_empty()).await;

        let side = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(side.local_addr().unwrap()).await.unwrap();
        let (server, remote) = side.accept().await.unwrap();
        Shared::install(&bridge.shared, server, remote).await;

        assert!(bridge.poll_events().is_empty());
        let _first = flood.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(bridge.poll_events().is_empty(), "old session leaked events");
        assert_ne!(bridge.peer_id().unwrap(), first_id);

        drop(client);
        bridge.stop().await;
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_and_session_survives() {
        let mut cfg = loopback(2_000);
        cfg.max_line_bytes = 64;
        let bridge = SocketBridge::start(&cfg, StartMode::Background).await.unwrap();
        let mut peer = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;

        let remote = tokio::spawn(async move {
            let huge = format!(r#"{{"type":"EVENT","event_type":"{}"}}"#, "x".repeat(500));
            peer.send(&huge).await;
            peer.send(r#"{"type":"EVENT","event_type":"stuck"}"#).await;
            let query = peer.recv().await;
            assert_eq!(query["type"], "QUERY_INVENTORY");
            peer.send(r#"{"type":"INVENTORY","money":7}"#).await;
            peer
        });

        let response = bridge
            .send_query(Outbound::query("QUERY_INVENTORY"))
            .await
            .unwrap();
        assert_eq!(response.i64_field("money"), Some(7));

        let events = bridge.poll_events();
        let names: Vec<_> = events.iter().filter_map(|e| e.str_field("event_type")).collect();
        assert_eq!(names, vec!["stuck"]);
        assert!(bridge.is_connected());

        let _peer = remote.await.unwrap();
        bridge.stop().await;
    }

    #[tokio::test]
    async fn concurrent_queries_are_serialized_on_the_wire() {
        let bridge = SocketBridge::start(&loopback(2_000), StartMode::Background)
            .await
            .unwrap();
        let mut peer = FakePeer::connect(&bridge).await;
        wait_until(|| bridge.is_connected()).await;

        let remote = tokio::spawn(async move {
            for _ in 0..2 {
                // Each line must be one whole record
                let query = peer.recv().await;
                let kind = query["type"].as_str().unwrap().to_string();
                peer.send(&format!(r#"{{"type":"ECHO","echo":"{kind}"}}"#)).await;
            }
            peer
        });

        let a = Arc::clone(&bridge);
        let b = Arc::clone(&bridge);
        let (ra, rb) = tokio::join!(
            a.send_query(Outbound::query("QUERY_ALLIES")),
            b.send_query(Outbound::query("QUERY_OBJECTIVE")),
        );
        assert_eq!(ra.unwrap().str_field("echo"), Some("QUERY_ALLIES"));
        assert_eq!(rb.unwrap().str_field("echo"), Some("QUERY_OBJECTIVE"));

        let _peer = remote.await.unwrap();
        bridge.stop().await;
    }

    #[tokio::test]
    async fn blocking_start_accepts_first_peer() {
        let spare = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = spare.local_addr().unwrap().port();
        drop(spare);
        let mut cfg = loopback(500);
        cfg.port = port;

        let connector = tokio::spawn(async move {
            for _ in 0..100 {
                if let Ok(s) = TcpStream::connect(("127.0.0.1", port)).await {
                    return s;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("could not connect");
        });

        let bridge = SocketBridge::start(
            &cfg,
            StartMode::Blocking {
                timeout: Some(Duration::from_secs(3)),
            },
        )
        .await
        .unwrap();
        assert!(bridge.is_connected());

        let _stream = connector.await.unwrap();
        bridge.stop().await;
        assert!(!bridge.is_connected());
        let err = bridge
            .send_query(Outbound::query("QUERY_ALLIES"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Stopped));
    }
}
