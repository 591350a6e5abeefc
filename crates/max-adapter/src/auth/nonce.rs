/*
[INPUT]:  Wall clock (milliseconds since Unix epoch)
[OUTPUT]: Strictly increasing request nonces
[POS]:    Auth layer - replay protection for signed requests
[UPDATE]: When changing nonce base or locking strategy
*/

use std::sync::{Mutex, PoisonError};

use chrono::Utc;

/// Thread-safe nonce source.
///
/// Each value is `max(previous, now_ms) + 1`, so results stay strictly
/// increasing across threads even within one millisecond or when the
/// clock steps backward.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    latest: Mutex<i64>,
}

impl NonceGenerator {
    /// Create a generator with no previously issued nonce
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that only issues values above `latest`.
    ///
    /// Useful when the last nonce used with a key is known from elsewhere.
    pub fn starting_after(latest: i64) -> Self {
        Self {
            latest: Mutex::new(latest),
        }
    }

    /// Issue the next nonce
    pub fn next(&self) -> i64 {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let candidate = (*latest).max(Utc::now().timestamp_millis());
        *latest = candidate.saturating_add(1);
        *latest
    }

    /// The most recently issued nonce (0 if none)
    pub fn latest(&self) -> i64 {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
