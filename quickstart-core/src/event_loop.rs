//! The interactive context's message channel.
//!
//! Background threads never call back into the front-end directly. Each one is
//! spawned through an [`EventLoop`], which registers a one-shot handler under a
//! fresh [`Token`] and hands the thread a sender. When the work returns (or
//! panics) the thread posts exactly one envelope; the interactive thread pulls
//! envelopes in FIFO order and runs the matching handler against its own state.
//!
//! Cancelling a token drops its handler, so a completion that arrives after the
//! owning screen is gone is discarded instead of delivered.
use crate::task::ProgressSurface;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Identifies one pending background delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failures of the worker thread itself, as opposed to errors its work returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFault {
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
    #[error("worker delivered a payload of the wrong type")]
    Payload,
}

type Payload = Box<dyn Any + Send>;
type Handler<C> = Box<dyn FnOnce(&mut C, Payload)>;

struct Envelope {
    token: Token,
    payload: Payload,
}

/// Single-consumer event loop owned by the interactive thread.
pub struct EventLoop<C> {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    handlers: HashMap<Token, Handler<C>>,
    progress: Box<dyn ProgressSurface>,
    visible: HashSet<Token>,
    next_token: u64,
}

impl<C: 'static> EventLoop<C> {
    pub fn new(progress: impl ProgressSurface + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            handlers: HashMap::new(),
            progress: Box::new(progress),
            visible: HashSet::new(),
            next_token: 0,
        }
    }

    /// Number of deliveries that are still expected.
    pub fn pending(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_pending(&self, token: Token) -> bool {
        self.handlers.contains_key(&token)
    }

    /// Runs `work` on a dedicated thread and `handler` on the interactive
    /// thread once it finishes. A panic inside `work` reaches the handler as
    /// [`WorkerFault::Panicked`].
    pub fn spawn<T, W, H>(&mut self, name: &str, work: W, handler: H) -> Token
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        H: FnOnce(&mut C, Result<T, WorkerFault>) + 'static,
    {
        let token = self.allocate();
        self.spawn_as(token, name, work, handler);
        token
    }

    pub(crate) fn allocate(&mut self) -> Token {
        self.next_token += 1;
        Token(self.next_token)
    }

    pub(crate) fn spawn_as<T, W, H>(&mut self, token: Token, name: &str, work: W, handler: H)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        H: FnOnce(&mut C, Result<T, WorkerFault>) + 'static,
    {
        self.handlers.insert(
            token,
            Box::new(move |ctx: &mut C, payload: Payload| {
                let outcome = match payload.downcast::<Result<T, WorkerFault>>() {
                    Ok(outcome) => *outcome,
                    Err(_) => Err(WorkerFault::Payload),
                };
                handler(ctx, outcome);
            }),
        );

        let tx = self.tx.clone();
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let outcome: Result<T, WorkerFault> = panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|cause| WorkerFault::Panicked(panic_message(cause.as_ref())));
            // The receiver only disappears with the loop itself.
            let _ = tx.send(Envelope {
                token,
                payload: Box::new(outcome),
            });
        });

        if let Err(e) = spawned {
            tracing::error!(%token, error = %e, "failed to spawn worker thread");
            let outcome: Result<T, WorkerFault> = Err(WorkerFault::Spawn(e.to_string()));
            let _ = self.tx.send(Envelope {
                token,
                payload: Box::new(outcome),
            });
        }
    }

    /// Drops the handler for `token`. Returns whether it was still pending.
    pub fn cancel(&mut self, token: Token) -> bool {
        self.hide_progress(token);
        let cancelled = self.handlers.remove(&token).is_some();
        if cancelled {
            tracing::debug!(%token, "cancelled pending delivery");
        }
        cancelled
    }

    /// Delivers one message if one is already waiting.
    pub fn try_dispatch(&mut self, ctx: &mut C) -> bool {
        match self.rx.try_recv() {
            Ok(envelope) => {
                self.deliver(ctx, envelope);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Waits up to `timeout` for one message and delivers it.
    pub fn dispatch_timeout(&mut self, ctx: &mut C, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.deliver(ctx, envelope);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Blocks for the next message. Returns `false` without blocking when
    /// nothing is pending.
    pub fn dispatch_blocking(&mut self, ctx: &mut C) -> bool {
        if self.handlers.is_empty() {
            return false;
        }
        match self.rx.recv() {
            Ok(envelope) => {
                self.deliver(ctx, envelope);
                true
            }
            Err(_) => false,
        }
    }

    /// Dispatches until every pending delivery has run.
    pub fn run_until_idle(&mut self, ctx: &mut C) {
        while self.dispatch_blocking(ctx) {}
    }

    pub(crate) fn show_progress(&mut self, token: Token, message: &str) {
        if self.visible.insert(token) {
            self.progress.show(token, message);
        }
    }

    fn hide_progress(&mut self, token: Token) {
        if self.visible.remove(&token) {
            self.progress.hide(token);
        }
    }

    fn deliver(&mut self, ctx: &mut C, envelope: Envelope) {
        let Envelope { token, payload } = envelope;
        self.hide_progress(token);
        match self.handlers.remove(&token) {
            Some(handler) => handler(ctx, payload),
            None => tracing::debug!(%token, "dropping completion with no pending handler"),
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
