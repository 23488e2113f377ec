//! One-shot claim guard shared by racing completion paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Holds a value that exactly one of several racers may take.
///
/// The first caller of [`claim`](Self::claim) wins the compare-and-swap and
/// receives the value; every later caller gets `None`.
#[derive(Debug)]
pub struct ClaimGuard<T> {
    claimed: AtomicBool,
    slot: Mutex<Option<T>>,
}

impl<T> ClaimGuard<T> {
    /// Create an unclaimed guard holding `value`.
    pub fn new(value: T) -> Self {
        ClaimGuard {
            claimed: AtomicBool::new(false),
            slot: Mutex::new(Some(value)),
        }
    }

    /// Take the value if nobody has claimed it yet.
    pub fn claim(&self) -> Option<T> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Whether the value has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
