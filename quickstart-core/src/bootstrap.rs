//! Deferred construction of the onboarding screen.
//!
//! When the native runtime still has to be loaded, [`enter`] shows a wait
//! indicator and moves the load onto a background thread (pre-delay, load,
//! post-delay). The gated initialization runs once the completion message is
//! dispatched on the interactive thread. Otherwise it runs immediately.
//!
//! ```text
//! Start ──(no delay)──────────────────────────▶ Ready
//!   └──(delay)──▶ Waiting ──(completion)──────▶ Ready
//!                    └──(teardown)──▶ TornDown
//! ```
use crate::event_loop::{EventLoop, Token};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_PRE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_POST_DELAY: Duration = Duration::from_millis(100);

/// The native runtime the onboarding screen depends on.
pub trait NativeRuntime: Send + Sync {
    /// Whether construction has to wait for [`NativeRuntime::load_library`].
    fn should_delay_load(&self) -> bool;

    /// Loads the runtime. Must be idempotent.
    fn load_library(&self) -> anyhow::Result<()>;
}

/// The blocking indicator shown while the gate is waiting.
pub trait WaitIndicator {
    fn show(&mut self, message: &str);
    fn dismiss(&mut self);
}

/// A screen whose construction is guarded by a [`BootstrapGate`].
pub trait GatedScreen: 'static {
    fn gate(&mut self) -> &mut BootstrapGate;

    /// The gated initialization. Runs at most once per gate.
    fn on_create(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Start,
    Waiting,
    Ready,
    TornDown,
}

pub struct BootstrapGate {
    state: GateState,
    pre_delay: Duration,
    post_delay: Duration,
    indicator: Option<Box<dyn WaitIndicator>>,
    pending: Option<Token>,
    created: bool,
    load_error: Option<String>,
}

impl Default for BootstrapGate {
    fn default() -> Self {
        Self::new(DEFAULT_PRE_DELAY, DEFAULT_POST_DELAY)
    }
}

impl BootstrapGate {
    pub fn new(pre_delay: Duration, post_delay: Duration) -> Self {
        Self {
            state: GateState::Start,
            pre_delay,
            post_delay,
            indicator: None,
            pending: None,
            created: false,
            load_error: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether the gated initialization has run.
    pub fn has_created(&self) -> bool {
        self.created
    }

    /// The runtime load failure, if the background load reported one.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Tears the gate down. A completion still in flight becomes a no-op.
    pub fn teardown<C: 'static>(&mut self, event_loop: &mut EventLoop<C>) {
        if let Some(token) = self.pending.take() {
            event_loop.cancel(token);
        }
        self.dismiss_indicator();
        if self.state != GateState::Ready {
            tracing::debug!(from = ?self.state, "bootstrap gate torn down");
        }
        self.state = GateState::TornDown;
    }

    fn dismiss_indicator(&mut self) {
        if let Some(mut indicator) = self.indicator.take() {
            indicator.dismiss();
        }
    }

    /// Moves to `Ready` and reports whether the gated initialization should
    /// run now.
    fn open(&mut self) -> bool {
        self.pending = None;
        self.dismiss_indicator();
        if self.state == GateState::TornDown || self.created {
            return false;
        }
        self.state = GateState::Ready;
        self.created = true;
        true
    }
}

/// Runs the gate for `host`. Calling it again after the first time is a no-op.
pub fn enter<C: GatedScreen>(
    host: &mut C,
    event_loop: &mut EventLoop<C>,
    runtime: Arc<dyn NativeRuntime>,
    mut indicator: Box<dyn WaitIndicator>,
    message: &str,
) {
    let gate = host.gate();
    if gate.state != GateState::Start {
        tracing::warn!(state = ?gate.state, "bootstrap gate entered twice");
        return;
    }

    if !runtime.should_delay_load() {
        tracing::debug!("native runtime ready; creating screen immediately");
        if gate.open() {
            host.on_create();
        }
        return;
    }

    indicator.show(message);
    gate.indicator = Some(indicator);
    gate.state = GateState::Waiting;
    let (pre_delay, post_delay) = (gate.pre_delay, gate.post_delay);
    tracing::debug!(?pre_delay, ?post_delay, "waiting for native runtime");

    let token = event_loop.spawn(
        "quickstart-bootstrap",
        move || {
            thread::sleep(pre_delay);
            let loaded = runtime.load_library().map_err(|e| format!("{e:#}"));
            thread::sleep(post_delay);
            loaded
        },
        |host: &mut C, outcome| {
            let gate = host.gate();
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(message)) => Some(message),
                Err(fault) => Some(fault.to_string()),
            };
            if let Some(message) = failure {
                tracing::error!(error = %message, "failed to load native runtime");
                gate.load_error = Some(message);
            }
            if gate.open() {
                tracing::debug!("bootstrap gate ready");
                host.on_create();
            }
        },
    );
    host.gate().pending = Some(token);
}
