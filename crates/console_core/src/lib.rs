//! Client-side engine for the VISCA bridge console.
//!
//! Three concerns live here, each with exactly one writer of its state:
//! the status synchronizer (polls `GET /api/stats` and mirrors the bridge's
//! snapshot), the preset registry (symbolic key → hex command), and the
//! command dispatcher (at most one in-flight `POST /api/cmd`, with a
//! transient, auto-expiring outcome). The presentation layer reads state
//! through the accessors and listens on [`ConsoleEngine::subscribe_events`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::protocol::{BridgeStats, CommandReply, PresetMap};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info};

pub mod config;
pub mod error;
pub mod transport;

pub use config::EngineConfig;
pub use error::DispatchError;
pub use transport::{BridgeApi, HttpBridgeApi, TransportError};

/// Reason string for any transport-level dispatch failure (DNS, refused
/// connection, timeout, malformed body). Server-reported failures carry the
/// server's own `err` text instead.
pub const NETWORK_ERROR_REASON: &str = "Network error";

const COMMAND_FAILED_REASON: &str = "command failed";
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transient result of one command dispatch. Cleared automatically
/// [`EngineConfig::outcome_ttl`] after being set, unless a newer dispatch
/// supersedes it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success {
        /// Hex-encoded device response, when the bridge captured one.
        response: Option<String>,
        /// Response byte length, when the bridge reports it instead.
        len: Option<u64>,
    },
    Failure {
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    InFlight,
}

/// Notifications for the presentation layer. State itself is read through
/// the engine's accessors; events only say that something changed.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StatsUpdated,
    PresetsUpdated,
    OutcomeChanged(Option<CommandOutcome>),
}

struct PollState {
    task: Option<JoinHandle<()>>,
    /// Sequence number handed to each issued stats request.
    issued: u64,
    /// Sequence number of the last request whose response was applied.
    applied: u64,
}

/// Releases an at-most-one-in-flight flag even when the owning future is
/// cancelled mid-request. Both the poll and dispatch paths rely on this so
/// a dropped future can never wedge the engine.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct DispatchSlot {
    outcome: Option<CommandOutcome>,
    /// Bumped on every published outcome; the clear timer only removes the
    /// outcome it was armed for.
    outcome_seq: u64,
    clear_task: Option<JoinHandle<()>>,
}

pub struct ConsoleEngine {
    api: Arc<dyn BridgeApi>,
    config: EngineConfig,
    stats: RwLock<BridgeStats>,
    presets: RwLock<PresetMap>,
    poll: Mutex<PollState>,
    poll_in_flight: AtomicBool,
    dispatch: Mutex<DispatchSlot>,
    dispatch_in_flight: AtomicBool,
    closed: AtomicBool,
    events: broadcast::Sender<EngineEvent>,
}

impl ConsoleEngine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let api = Arc::new(HttpBridgeApi::new(config.api_base.clone()));
        Self::with_api(config, api)
    }

    pub fn with_api(config: EngineConfig, api: Arc<dyn BridgeApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            config,
            stats: RwLock::new(BridgeStats::default()),
            presets: RwLock::new(PresetMap::new()),
            poll: Mutex::new(PollState {
                task: None,
                issued: 0,
                applied: 0,
            }),
            poll_in_flight: AtomicBool::new(false),
            dispatch: Mutex::new(DispatchSlot {
                outcome: None,
                outcome_seq: 0,
                clear_task: None,
            }),
            dispatch_in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Begin periodic polling and load the preset registry once.
    ///
    /// The first stats poll fires immediately; subsequent polls follow at
    /// [`EngineConfig::poll_interval`]. Idempotent while running.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut poll = self.poll.lock().await;
            if self.closed.load(Ordering::SeqCst) || poll.task.is_some() {
                return;
            }
            let engine = Arc::clone(self);
            poll.task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.config.poll_interval);
                // Ticks that pile up behind a slow poll are dropped, not
                // replayed.
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    engine.refresh_now().await;
                }
            }));
        }
        info!(api_base = %self.config.api_base, "status polling started");

        if !self.refresh_presets().await {
            debug!("initial preset load failed; registry starts empty");
        }
    }

    /// Stop periodic polling. An in-flight poll is cancelled at its next
    /// suspension point and its response is never applied. Idempotent.
    pub async fn stop(&self) {
        let mut poll = self.poll.lock().await;
        if let Some(task) = poll.task.take() {
            task.abort();
        }
    }

    /// Tear the engine down: stop polling, cancel the outcome clear timer,
    /// and make every further operation inert.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stop().await;
        let mut slot = self.dispatch.lock().await;
        if let Some(task) = slot.clear_task.take() {
            task.abort();
        }
    }

    /// One immediate stats poll. Returns `true` when a fresh snapshot was
    /// applied.
    ///
    /// At most one stats request is ever in flight: a call landing while
    /// another is outstanding is skipped, and a response that lost the
    /// completion race to a newer request is discarded. Failures are
    /// swallowed here; the previous snapshot stays in place.
    pub async fn refresh_now(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        if self
            .poll_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let _guard = InFlightGuard(&self.poll_in_flight);

        let seq = {
            let mut poll = self.poll.lock().await;
            poll.issued += 1;
            poll.issued
        };

        let fetched = self.api.fetch_stats().await;

        let applied = {
            let mut poll = self.poll.lock().await;
            match fetched {
                Ok(stats) if !self.closed.load(Ordering::SeqCst) && seq > poll.applied => {
                    poll.applied = seq;
                    Some(stats)
                }
                Ok(_) => None,
                Err(error) => {
                    debug!(%error, "stats poll failed; keeping last snapshot");
                    None
                }
            }
        };

        match applied {
            Some(stats) => {
                *self.stats.write().await = stats;
                let _ = self.events.send(EngineEvent::StatsUpdated);
                true
            }
            None => false,
        }
    }

    /// Current snapshot; a zeroed default before the first successful poll.
    pub async fn stats(&self) -> BridgeStats {
        self.stats.read().await.clone()
    }

    /// Re-fetch the preset map, replacing it wholesale on success. On
    /// failure the current map (possibly empty) is kept.
    pub async fn refresh_presets(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        match self.api.fetch_presets().await {
            Ok(map) => {
                if self.closed.load(Ordering::SeqCst) {
                    return false;
                }
                *self.presets.write().await = map;
                let _ = self.events.send(EngineEvent::PresetsUpdated);
                true
            }
            Err(error) => {
                debug!(%error, "preset fetch failed; keeping current registry");
                false
            }
        }
    }

    /// Pure lookup against the current preset map.
    pub async fn resolve(&self, key: &str) -> Option<String> {
        self.presets.read().await.get(key).cloned()
    }

    pub async fn presets(&self) -> PresetMap {
        self.presets.read().await.clone()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        if self.dispatch_in_flight.load(Ordering::SeqCst) {
            DispatchState::InFlight
        } else {
            DispatchState::Idle
        }
    }

    /// Outcome of the most recent dispatch, until it expires or is
    /// superseded.
    pub async fn outcome(&self) -> Option<CommandOutcome> {
        self.dispatch.lock().await.outcome.clone()
    }

    /// Send raw hex text, passed through verbatim after trimming.
    pub async fn send_manual(self: &Arc<Self>, hex_text: &str) -> Result<(), DispatchError> {
        let hex = hex_text.trim();
        if hex.is_empty() {
            return Err(DispatchError::EmptyCommand);
        }
        self.dispatch(hex.to_string()).await
    }

    /// Resolve a preset key and send its command. An unknown key is a no-op:
    /// no network call, no state transition, no outcome.
    pub async fn send_preset(self: &Arc<Self>, key: &str) -> Result<(), DispatchError> {
        let Some(hex) = self.resolve(key).await else {
            return Err(DispatchError::UnknownPreset(key.to_string()));
        };
        self.dispatch(hex).await
    }

    async fn dispatch(self: &Arc<Self>, hex: String) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DispatchError::Terminated);
        }
        if self
            .dispatch_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DispatchError::Busy);
        }
        let guard = InFlightGuard(&self.dispatch_in_flight);

        let outcome = match self.api.send_command(&hex).await {
            Ok(reply) => classify_reply(reply),
            Err(error) => {
                debug!(%error, "command POST failed");
                CommandOutcome::Failure {
                    reason: NETWORK_ERROR_REASON.to_string(),
                }
            }
        };

        drop(guard);
        self.publish_outcome(outcome).await;
        Ok(())
    }

    async fn publish_outcome(self: &Arc<Self>, outcome: CommandOutcome) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut slot = self.dispatch.lock().await;
            if let Some(task) = slot.clear_task.take() {
                task.abort();
            }
            slot.outcome_seq += 1;
            slot.outcome = Some(outcome.clone());

            let seq = slot.outcome_seq;
            let ttl = self.config.outcome_ttl;
            let engine = Arc::clone(self);
            slot.clear_task = Some(tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                engine.clear_outcome_if_current(seq).await;
            }));
        }
        let _ = self.events.send(EngineEvent::OutcomeChanged(Some(outcome)));
    }

    async fn clear_outcome_if_current(&self, seq: u64) {
        let cleared = {
            let mut slot = self.dispatch.lock().await;
            // A newer outcome re-armed its own timer; leave it alone.
            if slot.outcome_seq != seq || slot.outcome.is_none() {
                false
            } else {
                slot.outcome = None;
                slot.clear_task = None;
                true
            }
        };
        if cleared {
            let _ = self.events.send(EngineEvent::OutcomeChanged(None));
        }
    }
}

fn classify_reply(reply: CommandReply) -> CommandOutcome {
    if reply.ok {
        CommandOutcome::Success {
            response: reply.resp,
            len: reply.len,
        }
    } else {
        CommandOutcome::Failure {
            reason: reply
                .err
                .unwrap_or_else(|| COMMAND_FAILED_REASON.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
