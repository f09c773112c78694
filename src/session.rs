use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::audio::{AudioFrame, AudioSink};
use crate::config::SessionConfig;
use crate::outbound::{OutboundItem, OutboundQueue};
use crate::protocol::{Envelope, EventCodec, InboundEvent};
use crate::tools::ToolExecutor;
use crate::transport::{Connection, Transport, WireRx, WireTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Active,
    Closing,
    Closed,
    Faulted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("session closed")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("session is not active")]
    SessionNotActive,
    #[error("invalid audio frame: {0}")]
    InvalidFrame(&'static str),
}

/// Inbound dispatch surfaced to the orchestrator. Playback audio goes
/// straight to the registered sink and never through this channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    Reconnecting { attempt: u32 },
    Transcript(String),
    TurnComplete,
    Closed { reason: Option<String> },
}

#[derive(Debug, Clone)]
pub enum ToolCallState {
    Running,
    Succeeded(Value),
    Failed(String),
}

/// One outstanding tool call, tracked from request receipt until its result
/// envelope is enqueued or the session closes.
#[derive(Debug, Clone)]
pub struct PendingToolInvocation {
    pub invocation_id: String,
    pub tool_name: String,
    pub issued_at: Instant,
    pub state: ToolCallState,
}

#[derive(Default)]
struct Stats {
    frames_submitted: AtomicU64,
    frames_sent: AtomicU64,
    frames_evicted: AtomicU64,
    frames_invalid: AtomicU64,
    decode_faults: AtomicU64,
    reconnect_attempts: AtomicU64,
    tools_completed: AtomicU64,
    tools_abandoned: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub frames_submitted: u64,
    pub frames_sent: u64,
    pub frames_evicted: u64,
    pub frames_invalid: u64,
    pub decode_faults: u64,
    pub reconnect_attempts: u64,
    pub tools_completed: u64,
    pub tools_abandoned: u64,
    /// States entered, in order, starting at `Uninitialized`.
    pub transitions: Vec<ConnectionState>,
    /// Scheduled (pre-jitter) delay before each reconnect attempt.
    pub backoff_delays: Vec<Duration>,
}

enum LoopExit {
    Shutdown,
    Fault(String),
}

struct Shared {
    id: String,
    config: SessionConfig,
    codec: EventCodec,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn ToolExecutor>,
    sink: Arc<dyn AudioSink>,
    events: mpsc::Sender<SessionEvent>,
    outbound: OutboundQueue,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    pending: Mutex<HashMap<String, PendingToolInvocation>>,
    transitions: Mutex<Vec<ConnectionState>>,
    delays: Mutex<Vec<Duration>>,
    stats: Stats,
    last_activity: Mutex<Instant>,
    highest_sequence: AtomicU64,
    /// Turn counter, advanced on `TurnComplete`.
    current_turn: AtomicU64,
    /// Turn during which playback audio was last enqueued; drives barge-in.
    last_enqueue_turn: Mutex<Option<u64>>,
}

/// Handle to one logical conversation with the remote model. Owns the
/// connection lifecycle; created by [`Session::start`], destroyed by
/// [`Session::stop`] or an unrecoverable fault.
pub struct Session {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Establish the connection and perform the session-open handshake.
    /// Failed attempts are retried on the backoff schedule before this
    /// returns an error; the caller may retry again on top of that.
    pub async fn start(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        executor: Arc<dyn ToolExecutor>,
        sink: Arc<dyn AudioSink>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Session, SessionError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);
        let (shutdown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            id: Uuid::new_v4().to_string(),
            codec: EventCodec {
                max_audio_bytes: config.max_frame_bytes.max(64 * 1024),
            },
            outbound: OutboundQueue::new(config.queue_capacity),
            config,
            transport,
            executor,
            sink,
            events,
            state_tx,
            shutdown,
            pending: Mutex::new(HashMap::new()),
            transitions: Mutex::new(vec![ConnectionState::Uninitialized]),
            delays: Mutex::new(Vec::new()),
            stats: Stats::default(),
            last_activity: Mutex::new(Instant::now()),
            highest_sequence: AtomicU64::new(0),
            current_turn: AtomicU64::new(0),
            last_enqueue_turn: Mutex::new(None),
        });

        shared.set_state(ConnectionState::Connecting);
        let conn = match shared.handshake().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(session = %shared.id, error = %e, "initial handshake failed");
                shared.set_state(ConnectionState::Faulted);
                let mut shutdown_rx = shared.shutdown.subscribe();
                shared.reconnect(&mut shutdown_rx).await?
            }
        };
        shared.set_state(ConnectionState::Active);
        let _ = shared.events.try_send(SessionEvent::Connected);
        info!(session = %shared.id, "session active");

        tokio::spawn(run(shared.clone(), conn));
        Ok(Session { shared })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Enqueue one captured frame for transmission. Never blocks beyond
    /// queue insertion: a saturated queue evicts its oldest frame instead.
    pub fn submit_audio(&self, frame: AudioFrame) -> Result<(), SubmitError> {
        if self.shared.state() != ConnectionState::Active {
            return Err(SubmitError::SessionNotActive);
        }
        if let Err(reason) = frame.validate(
            &self.shared.config.audio_format,
            self.shared.config.max_frame_bytes,
        ) {
            self.shared.stats.frames_invalid.fetch_add(1, Ordering::Relaxed);
            return Err(SubmitError::InvalidFrame(reason));
        }
        // Gaps are acceptable, reordering is not.
        let prev = self
            .shared
            .highest_sequence
            .fetch_max(frame.sequence, Ordering::Relaxed);
        if frame.sequence < prev {
            self.shared.stats.frames_invalid.fetch_add(1, Ordering::Relaxed);
            return Err(SubmitError::InvalidFrame("sequence regression"));
        }

        let bytes = self
            .shared
            .codec
            .encode(&Envelope::audio_input(frame.sequence, &frame.payload));
        if let Some(evicted) = self.shared.outbound.push_audio(frame.sequence, bytes) {
            self.shared.stats.frames_evicted.fetch_add(1, Ordering::Relaxed);
            trace!(sequence = evicted, "evicted stale audio frame");
        }
        self.shared.stats.frames_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Graceful shutdown: drain running tool invocations within the grace
    /// period, send session-close, and transition `Closing -> Closed`.
    /// Idempotent; a no-op once closed.
    pub async fn stop(&self) -> Result<(), SessionError> {
        if self.shared.state() == ConnectionState::Closed {
            return Ok(());
        }
        let _ = self.shared.shutdown.send(true);
        let mut rx = self.shared.state_tx.subscribe();
        let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
        Ok(())
    }

    pub fn stats(&self) -> StatsSnapshot {
        let s = &self.shared.stats;
        StatsSnapshot {
            frames_submitted: s.frames_submitted.load(Ordering::Relaxed),
            frames_sent: s.frames_sent.load(Ordering::Relaxed),
            frames_evicted: s.frames_evicted.load(Ordering::Relaxed),
            frames_invalid: s.frames_invalid.load(Ordering::Relaxed),
            decode_faults: s.decode_faults.load(Ordering::Relaxed),
            reconnect_attempts: s.reconnect_attempts.load(Ordering::Relaxed),
            tools_completed: s.tools_completed.load(Ordering::Relaxed),
            tools_abandoned: s.tools_abandoned.load(Ordering::Relaxed),
            transitions: self
                .shared
                .transitions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            backoff_delays: self
                .shared
                .delays
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    pub fn idle_time(&self) -> Duration {
        self.shared
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|s| {
            if *s == next {
                false
            } else {
                *s = next;
                true
            }
        });
        if changed {
            debug!(session = %self.id, state = %next, "state transition");
            self.transitions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(next);
        }
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn advertise_tools(&self) -> Vec<Value> {
        self.executor
            .supported_tools()
            .iter()
            .filter_map(|name| self.executor.tool_schema(name))
            .collect()
    }

    /// Connect and transmit the session-open envelope within the handshake
    /// timeout. Re-sent in full on every reconnect attempt: the remote holds
    /// no session affinity across a fresh connection.
    async fn handshake(&self) -> Result<Connection, SessionError> {
        let deadline = self.config.handshake_timeout;
        let attempt = async {
            let mut conn = self
                .transport
                .connect()
                .await
                .map_err(|e| SessionError::TransportUnavailable(e.to_string()))?;
            let open = Envelope::SessionOpen {
                audio_format: self.config.audio_format,
                system_prompt: self.config.system_prompt.clone(),
                tool_schemas: self.advertise_tools(),
            };
            conn.tx
                .send(self.codec.encode(&open))
                .await
                .map_err(|e| SessionError::TransportUnavailable(e.to_string()))?;
            Ok(conn)
        };
        match timeout(deadline, attempt).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::HandshakeTimeout(deadline)),
        }
    }

    /// Re-handshake on the backoff schedule. Called with state `Faulted`;
    /// leaves state `Faulted` or `Connecting` between attempts, `Closed`
    /// once the budget is exhausted or shutdown is requested.
    async fn reconnect(
        self: &Arc<Self>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Connection, SessionError> {
        let policy = self.config.backoff.clone();
        let mut attempt: u32 = 1;
        let mut last_err = SessionError::TransportUnavailable("no attempt made".into());
        loop {
            if attempt > policy.max_attempts {
                warn!(session = %self.id, attempts = policy.max_attempts, "reconnect budget exhausted");
                self.abandon_pending("session lost");
                self.set_state(ConnectionState::Closed);
                return Err(last_err);
            }

            let scheduled = policy.delay_for_attempt(attempt);
            self.delays
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(scheduled);
            let _ = self.events.try_send(SessionEvent::Reconnecting { attempt });
            info!(session = %self.id, attempt, delay_ms = scheduled.as_millis() as u64, "reconnecting");

            tokio::select! {
                _ = sleep(policy.jittered_delay(attempt)) => {}
                _ = shutdown.changed() => {
                    self.abandon_pending("session closed");
                    self.set_state(ConnectionState::Closed);
                    return Err(SessionError::Closed);
                }
            }

            self.set_state(ConnectionState::Connecting);
            self.stats.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            match self.handshake().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!(session = %self.id, attempt, error = %e, "reconnect attempt failed");
                    self.set_state(ConnectionState::Faulted);
                    last_err = e;
                    attempt += 1;
                }
            }
        }
    }

    /// Event-receive loop. Buffers truncated envelopes, counts other decode
    /// faults in a sliding window, and exits on transport failure, remote
    /// stream error, writer fault or shutdown. Eviction handles queue
    /// pressure independently; only decode faults count toward the
    /// threshold.
    async fn stream_loop(
        self: &Arc<Self>,
        rx: &mut Box<dyn WireRx>,
        shutdown: &mut watch::Receiver<bool>,
        fault_rx: &mut mpsc::Receiver<String>,
    ) -> LoopExit {
        let mut partial: Vec<u8> = Vec::new();
        let mut fault_times: VecDeque<Instant> = VecDeque::new();
        loop {
            if *shutdown.borrow() {
                return LoopExit::Shutdown;
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return LoopExit::Shutdown;
                    }
                }
                Some(reason) = fault_rx.recv() => {
                    return LoopExit::Fault(reason);
                }
                msg = rx.recv() => match msg {
                    Ok(Some(bytes)) => {
                        self.touch();
                        partial.extend_from_slice(&bytes);
                        match self.codec.decode(&partial) {
                            Ok(event) => {
                                partial.clear();
                                if let Some(exit) = self.dispatch(event).await {
                                    return exit;
                                }
                            }
                            Err(e) if e.is_truncated() => {
                                // Await the rest of the envelope.
                                trace!(buffered = partial.len(), "partial envelope");
                            }
                            Err(e) => {
                                partial.clear();
                                self.stats.decode_faults.fetch_add(1, Ordering::Relaxed);
                                warn!(session = %self.id, error = %e, "dropped undecodable envelope");
                                let now = Instant::now();
                                fault_times.push_back(now);
                                while let Some(front) = fault_times.front() {
                                    if now.duration_since(*front) > self.config.decode_fault_window {
                                        fault_times.pop_front();
                                    } else {
                                        break;
                                    }
                                }
                                if fault_times.len() as u32 >= self.config.decode_fault_threshold {
                                    return LoopExit::Fault(format!(
                                        "{} decode faults within {:?}",
                                        fault_times.len(),
                                        self.config.decode_fault_window
                                    ));
                                }
                            }
                        }
                    }
                    Ok(None) => return LoopExit::Fault("connection closed by peer".into()),
                    Err(e) => return LoopExit::Fault(e.to_string()),
                }
            }
        }
    }

    async fn dispatch(self: &Arc<Self>, event: InboundEvent) -> Option<LoopExit> {
        match event {
            InboundEvent::AudioChunk(pcm) => {
                let turn = self.current_turn.load(Ordering::Relaxed);
                let needs_flush = {
                    let mut last = self
                        .last_enqueue_turn
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    let stale = matches!(*last, Some(t) if t != turn);
                    *last = Some(turn);
                    stale
                };
                if needs_flush {
                    // Barge-in: the previous turn's tail is discarded, not queued.
                    debug!(session = %self.id, turn, "flushing playback of interrupted turn");
                    self.sink.flush_playback().await;
                }
                self.sink.enqueue_playback(pcm).await;
                None
            }
            InboundEvent::TranscriptDelta(text) => {
                let turn = self.current_turn.load(Ordering::Relaxed);
                let needs_flush = {
                    let mut last = self
                        .last_enqueue_turn
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    if matches!(*last, Some(t) if t != turn) {
                        *last = None;
                        true
                    } else {
                        false
                    }
                };
                if needs_flush {
                    debug!(session = %self.id, turn, "barge-in transcript; flushing playback");
                    self.sink.flush_playback().await;
                }
                let _ = self.events.try_send(SessionEvent::Transcript(text));
                None
            }
            InboundEvent::ToolUseRequest {
                invocation_id,
                tool_name,
                input,
            } => {
                self.spawn_tool(invocation_id, tool_name, input);
                None
            }
            InboundEvent::TurnComplete => {
                self.current_turn.fetch_add(1, Ordering::Relaxed);
                let _ = self.events.try_send(SessionEvent::TurnComplete);
                None
            }
            InboundEvent::StreamError { code, message } => {
                warn!(session = %self.id, code, %message, "remote stream error");
                Some(LoopExit::Fault(format!("stream error {}: {}", code, message)))
            }
        }
    }

    /// Fire-and-forget tool dispatch. A slow tool never stalls audio flow;
    /// executor failures become structured error results for the model.
    fn spawn_tool(self: &Arc<Self>, invocation_id: String, tool_name: String, input: Value) {
        debug!(session = %self.id, tool = %tool_name, invocation = %invocation_id, "tool use requested");
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                invocation_id.clone(),
                PendingToolInvocation {
                    invocation_id: invocation_id.clone(),
                    tool_name: tool_name.clone(),
                    issued_at: Instant::now(),
                    state: ToolCallState::Running,
                },
            );

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = shared
                .executor
                .execute(&tool_name, input)
                .await
                .map_err(|e| e.to_string());
            if let Err(reason) = &result {
                info!(tool = %tool_name, %reason, "tool failed; returning structured error");
            }

            {
                let mut pending = shared.pending.lock().unwrap_or_else(|e| e.into_inner());
                match pending.get_mut(&invocation_id) {
                    Some(entry) => {
                        entry.state = match &result {
                            Ok(v) => ToolCallState::Succeeded(v.clone()),
                            Err(e) => ToolCallState::Failed(e.clone()),
                        };
                    }
                    // Abandoned while the tool ran; already accounted for,
                    // nothing left to deliver.
                    None => return,
                }
            }
            // The result envelope survives reconnection: it sits in the
            // outbound queue until a connection can carry it.
            let envelope = Envelope::tool_result(invocation_id.clone(), result);
            shared.outbound.push_control(shared.codec.encode(&envelope));
            shared
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&invocation_id);
            shared.stats.tools_completed.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn abandon_pending(&self, reason: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in pending.drain() {
            warn!(
                tool = %entry.tool_name,
                invocation = %entry.invocation_id,
                %reason,
                "abandoning pending tool invocation"
            );
            self.stats.tools_abandoned.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn wait_pending_drained(&self) {
        loop {
            if self
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_empty()
            {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    async fn wait_outbound_empty(&self) {
        while !self.outbound.is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn graceful_close(
        self: &Arc<Self>,
        writer: JoinHandle<()>,
        writer_stop: watch::Sender<bool>,
    ) {
        self.set_state(ConnectionState::Closing);
        if timeout(self.config.drain_grace, self.wait_pending_drained())
            .await
            .is_err()
        {
            warn!(session = %self.id, "drain grace expired with tools still running");
        }
        self.outbound
            .push_control(self.codec.encode(&Envelope::SessionClose));
        let _ = timeout(Duration::from_secs(1), self.wait_outbound_empty()).await;
        // Let the writer finish the close frame it may have just popped.
        sleep(Duration::from_millis(50)).await;
        let _ = writer_stop.send(true);
        let _ = writer.await;
        self.abandon_pending("session closed");
        self.set_state(ConnectionState::Closed);
        let _ = self.events.try_send(SessionEvent::Closed { reason: None });
        info!(session = %self.id, "session closed");
    }
}

/// Audio-send loop: single transmitter draining the outbound queue. Stopped
/// cooperatively, never aborted: a send may be holding a popped control entry,
/// which must be re-queued rather than dropped so tool results survive the
/// fault. A failed control send is re-queued at the front for the same reason.
async fn writer_loop(
    shared: Arc<Shared>,
    mut tx: Box<dyn WireTx>,
    fault_tx: mpsc::Sender<String>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            item = shared.outbound.pop() => item,
            _ = stop.changed() => break,
        };
        match item {
            OutboundItem::Audio { sequence, bytes } => {
                tokio::select! {
                    sent = tx.send(bytes) => {
                        if let Err(e) = sent {
                            let _ = fault_tx.try_send(e.to_string());
                            return;
                        }
                        shared.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                        shared.touch();
                        trace!(sequence, "transmitted audio frame");
                        if let Some(gap) = shared.config.frame_spacing {
                            sleep(gap).await;
                        }
                    }
                    // A frame interrupted mid-send is stale by recovery time.
                    _ = stop.changed() => break,
                }
            }
            OutboundItem::Control(bytes) => {
                tokio::select! {
                    sent = tx.send(bytes.clone()) => {
                        if let Err(e) = sent {
                            shared.outbound.push_control_front(bytes);
                            let _ = fault_tx.try_send(e.to_string());
                            return;
                        }
                        shared.touch();
                    }
                    _ = stop.changed() => {
                        // Still unsent; hand it to the next connection.
                        shared.outbound.push_control_front(bytes);
                        break;
                    }
                }
            }
        }
    }
    if shared.state() == ConnectionState::Closing {
        let _ = timeout(Duration::from_secs(1), tx.close()).await;
    }
}

async fn run(shared: Arc<Shared>, mut conn: Connection) {
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        let Connection { tx, mut rx } = conn;
        let (fault_tx, mut fault_rx) = mpsc::channel::<String>(1);
        let (writer_stop, writer_stop_rx) = watch::channel(false);
        let writer = tokio::spawn(writer_loop(shared.clone(), tx, fault_tx, writer_stop_rx));

        let exit = shared.stream_loop(&mut rx, &mut shutdown, &mut fault_rx).await;
        match exit {
            LoopExit::Shutdown => {
                shared.graceful_close(writer, writer_stop).await;
                return;
            }
            LoopExit::Fault(reason) => {
                let _ = writer_stop.send(true);
                let _ = writer.await;
                warn!(session = %shared.id, %reason, "session faulted");
                shared.set_state(ConnectionState::Faulted);
                match shared.reconnect(&mut shutdown).await {
                    Ok(new_conn) => {
                        shared.set_state(ConnectionState::Active);
                        let _ = shared.events.try_send(SessionEvent::Connected);
                        info!(session = %shared.id, "session recovered");
                        conn = new_conn;
                    }
                    Err(e) => {
                        let _ = shared.events.try_send(SessionEvent::Closed {
                            reason: Some(e.to_string()),
                        });
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_render_lowercase() {
        assert_eq!(ConnectionState::Faulted.to_string(), "faulted");
        assert_eq!(ConnectionState::Active.to_string(), "active");
    }

    #[test]
    fn submit_error_messages_are_stable() {
        assert_eq!(
            SubmitError::SessionNotActive.to_string(),
            "session is not active"
        );
        assert_eq!(
            SubmitError::InvalidFrame("empty frame").to_string(),
            "invalid audio frame: empty frame"
        );
    }
}
