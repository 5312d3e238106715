use std::sync::atomic::{AtomicU64, Ordering};

/// A change counter for state the front-end renders.
///
/// Every mutation the user should see bumps the version. Consumers keep the
/// last version they rendered and redraw when [`Revision::changed_since`]
/// reports a newer one.
#[derive(Debug, Default)]
pub struct Revision {
    version: AtomicU64,
}

impl Revision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Advances the version and returns the new value.
    pub fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn changed_since(&self, seen: u64) -> bool {
        self.current() > seen
    }
}
