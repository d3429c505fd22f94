//! Stale-response filtering for asynchronous loads
//!
//! A load-site hands out an increasing [`SequenceToken`] every time it
//! starts a load. Completions compare their token against the live value
//! and drop their results when a newer load has started since. In-flight
//! work is never cancelled, only ignored.

pub mod load_site;

pub use load_site::{LoadSite, LoadState};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Identifies which load a pending result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceToken(u64);

impl SequenceToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-load-site sequence counter
///
/// The counter only moves forward. Once torn down, no token is ever
/// current again, including tokens issued by later calls to `begin`.
#[derive(Debug, Default)]
pub struct StaleResponseGuard {
    current: AtomicU64,
    torn_down: AtomicBool,
}

impl StaleResponseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load; every earlier token stops being current
    pub fn begin(&self) -> SequenceToken {
        SequenceToken(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: SequenceToken) -> bool {
        !self.torn_down.load(Ordering::SeqCst) && self.current.load(Ordering::SeqCst) == token.0
    }

    /// The view owning this load-site is gone
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}
