//! Single-worker turn dispatcher.
//!
//! One task owns the chat engine and every session's history. The REPL and
//! the background relay both post turns onto its queue, so turns are handled
//! one at a time and directive writes reach the store through a single path.

use crate::engine::{ChatEngine, TurnOutcome};
use crate::error::CoreError;
use crate::session::SessionContext;
use log::{debug, info};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Sessions kept by [`TurnDispatcher::spawn`] before the least recently used
/// one is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Work item for the dispatcher worker.
pub enum TurnRequest {
    /// Run a user turn in the named session.
    Turn {
        session: String,
        input: String,
        /// Receives raw reply fragments as they arrive.
        chunks: Option<mpsc::UnboundedSender<String>>,
        reply: oneshot::Sender<TurnOutcome>,
    },
    /// Drop a session's history. Replies whether the session existed.
    ClearSession {
        session: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle for posting work to the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<TurnRequest>,
}

impl DispatcherHandle {
    /// Run a turn and wait for its outcome.
    pub async fn submit(
        &self,
        session: impl Into<String>,
        input: impl Into<String>,
    ) -> Result<TurnOutcome, CoreError> {
        self.send_turn(session.into(), input.into(), None).await
    }

    /// Run a turn, forwarding reply fragments to `chunks` as they arrive.
    pub async fn submit_streaming(
        &self,
        session: impl Into<String>,
        input: impl Into<String>,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<TurnOutcome, CoreError> {
        self.send_turn(session.into(), input.into(), Some(chunks))
            .await
    }

    /// Clear a session's history.
    pub async fn clear_session(&self, session: impl Into<String>) -> Result<bool, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TurnRequest::ClearSession {
                session: session.into(),
                reply,
            })
            .await
            .map_err(|_| CoreError::DispatcherClosed)?;
        rx.await.map_err(|_| CoreError::DispatcherClosed)
    }

    /// True once the worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Handle that does not keep the worker alive.
    pub fn downgrade(&self) -> WeakDispatcherHandle {
        WeakDispatcherHandle {
            tx: self.tx.downgrade(),
        }
    }

    async fn send_turn(
        &self,
        session: String,
        input: String,
        chunks: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<TurnOutcome, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TurnRequest::Turn {
                session,
                input,
                chunks,
                reply,
            })
            .await
            .map_err(|_| CoreError::DispatcherClosed)?;
        rx.await.map_err(|_| CoreError::DispatcherClosed)
    }
}

/// Dispatcher handle held by background loops.
///
/// The worker shuts down once every [`DispatcherHandle`] is gone, even while
/// weak handles remain.
#[derive(Clone)]
pub struct WeakDispatcherHandle {
    tx: mpsc::WeakSender<TurnRequest>,
}

impl WeakDispatcherHandle {
    /// Strong handle, or `None` once the worker can no longer be reached.
    pub fn upgrade(&self) -> Option<DispatcherHandle> {
        self.tx
            .upgrade()
            .map(|tx| DispatcherHandle { tx })
            .filter(|handle| !handle.is_closed())
    }

    pub fn is_alive(&self) -> bool {
        self.upgrade().is_some()
    }
}

/// Spawns the dispatcher worker.
pub struct TurnDispatcher;

impl TurnDispatcher {
    /// Start the worker on the current tokio runtime.
    ///
    /// The worker exits once every strong handle has been dropped.
    pub fn spawn(engine: ChatEngine, capacity: usize) -> (DispatcherHandle, JoinHandle<()>) {
        Self::spawn_with_session_limit(engine, capacity, DEFAULT_MAX_SESSIONS)
    }

    /// Like [`TurnDispatcher::spawn`], keeping at most `max_sessions`
    /// histories. Starting a session past the limit evicts the one idle the
    /// longest.
    pub fn spawn_with_session_limit(
        engine: ChatEngine,
        capacity: usize,
        max_sessions: usize,
    ) -> (DispatcherHandle, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let max_sessions = max_sessions.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(engine, rx, max_sessions));
        info!(
            "turn dispatcher started (capacity={}, max_sessions={})",
            capacity, max_sessions
        );
        (DispatcherHandle { tx }, worker)
    }
}

struct SessionSlot {
    context: SessionContext,
    last_used: u64,
}

/// Session histories keyed by name, bounded by least-recent use.
struct SessionTable {
    slots: HashMap<String, SessionSlot>,
    max_sessions: usize,
    clock: u64,
}

impl SessionTable {
    fn new(max_sessions: usize) -> Self {
        Self {
            slots: HashMap::new(),
            max_sessions,
            clock: 0,
        }
    }

    fn touch(&mut self, session: String) -> &mut SessionContext {
        self.clock += 1;
        if !self.slots.contains_key(&session) && self.slots.len() >= self.max_sessions {
            self.evict_idlest();
        }
        let slot = self.slots.entry(session).or_insert_with(|| SessionSlot {
            context: SessionContext::new(),
            last_used: 0,
        });
        slot.last_used = self.clock;
        &mut slot.context
    }

    fn evict_idlest(&mut self) {
        let idlest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(name, _)| name.clone());
        if let Some(name) = idlest {
            self.slots.remove(&name);
            debug!("evicted idle session (session={})", name);
        }
    }

    fn clear(&mut self, session: &str) -> bool {
        self.slots
            .get_mut(session)
            .map(|slot| slot.context.clear())
            .is_some()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

async fn run_worker(engine: ChatEngine, mut rx: mpsc::Receiver<TurnRequest>, max_sessions: usize) {
    let mut sessions = SessionTable::new(max_sessions);
    while let Some(request) = rx.recv().await {
        match request {
            TurnRequest::Turn {
                session,
                input,
                chunks,
                reply,
            } => {
                debug!(
                    "dispatching turn (session={}, input_len={})",
                    session,
                    input.len()
                );
                let context = sessions.touch(session);
                let mut forward = |chunk: &str| {
                    if let Some(chunks) = &chunks {
                        let _ = chunks.send(chunk.to_string());
                    }
                };
                let outcome = engine.handle_turn(context, &input, &mut forward).await;
                // The caller may have given up waiting.
                let _ = reply.send(outcome);
            }
            TurnRequest::ClearSession { session, reply } => {
                let existed = sessions.clear(&session);
                debug!("cleared session (session={}, existed={})", session, existed);
                let _ = reply.send(existed);
            }
        }
    }
    info!("turn dispatcher stopped (sessions={})", sessions.len());
}
