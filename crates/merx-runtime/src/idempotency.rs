//! In-memory idempotency store.
//!
//! Maps `(platform, idempotency key)` to the fingerprint of the action that
//! first used the key and its successful result. A key is reserved before
//! the action is dispatched; anyone else presenting the same key waits until
//! the holder settles it, then replays the stored result. Failed results are
//! not stored, so a failed action may be retried under the same key.
//!
//! Stored results expire after a time-to-live. Expired entries are dropped
//! lazily whenever a new result is stored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use merx_core::{Action, ActionResult, Platform};
use tokio::sync::watch;
use tokio::time::Instant;

/// How long a stored result is replayed when no other TTL is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

type Slot = (Platform, String);

/// What the store decided for an action's key.
#[derive(Debug)]
pub enum IdempotencyCheck<'a> {
    /// The action carries no key: dispatch it.
    Unkeyed,
    /// The key is now held by the caller: dispatch, then settle the
    /// reservation with the outcome.
    Reserved(Reservation<'a>),
    /// Same key and same action already succeeded: serve the stored result.
    Replay(ActionResult),
    /// Same key, different action.
    Conflict { key: String },
}

#[derive(Debug)]
enum Entry {
    /// Dispatch in flight. The sender side lives in the [`Reservation`]; it
    /// is dropped when the reservation settles.
    Pending {
        fingerprint: String,
        settled: watch::Receiver<()>,
    },
    Done {
        fingerprint: String,
        result: ActionResult,
        stored_at: Instant,
    },
}

#[derive(Debug)]
pub struct IdempotencyStore {
    entries: Mutex<HashMap<Slot, Entry>>,
    ttl: Duration,
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose results are replayed for `ttl` after they were stored.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Slot, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide what to do with `action`, reserving its key when it is free.
    ///
    /// While another caller holds the key for the same action this waits
    /// for it to settle. Callers bound the wait with their own deadline.
    pub async fn acquire(&self, action: &Action) -> IdempotencyCheck<'_> {
        let Some(key) = action.idempotency_key() else {
            return IdempotencyCheck::Unkeyed;
        };
        let slot = (action.platform(), key.to_string());
        let fingerprint = action.fingerprint();

        loop {
            let mut settled = match self.try_acquire(&slot, &fingerprint) {
                Ok(check) => return check,
                Err(settled) => settled,
            };
            tracing::debug!(
                platform = %slot.0,
                key = %slot.1,
                "Waiting for in-flight action with the same idempotency key"
            );
            // Resolves once the holder's sender is dropped.
            let _ = settled.changed().await;
        }
    }

    /// One attempt under the lock. `Err` carries a receiver to wait on.
    fn try_acquire(
        &self,
        slot: &Slot,
        fingerprint: &str,
    ) -> Result<IdempotencyCheck<'_>, watch::Receiver<()>> {
        let mut entries = self.lock();
        let now = Instant::now();

        match entries.get(slot) {
            Some(Entry::Done {
                fingerprint: stored,
                result,
                stored_at,
            }) if now.duration_since(*stored_at) < self.ttl => {
                return Ok(if stored == fingerprint {
                    IdempotencyCheck::Replay(result.clone())
                } else {
                    IdempotencyCheck::Conflict {
                        key: slot.1.clone(),
                    }
                });
            }
            Some(Entry::Pending {
                fingerprint: held, ..
            }) if held != fingerprint => {
                return Ok(IdempotencyCheck::Conflict {
                    key: slot.1.clone(),
                });
            }
            // A holder that vanished without settling leaves a closed channel.
            Some(Entry::Pending { settled, .. }) if settled.has_changed().is_ok() => {
                return Err(settled.clone());
            }
            _ => {}
        }

        let (held, settled) = watch::channel(());
        entries.insert(
            slot.clone(),
            Entry::Pending {
                fingerprint: fingerprint.to_string(),
                settled,
            },
        );
        Ok(IdempotencyCheck::Reserved(Reservation {
            store: self,
            slot: slot.clone(),
            fingerprint: fingerprint.to_string(),
            settled: false,
            _held: held,
        }))
    }

    /// Drop stored results older than the TTL.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| match entry {
            Entry::Done { stored_at, .. } => now.duration_since(*stored_at) < self.ttl,
            Entry::Pending { .. } => true,
        });
        before - entries.len()
    }

    /// Number of keys held or stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every stored result. Keys currently held stay held.
    pub fn clear(&self) {
        self.lock()
            .retain(|_, entry| matches!(entry, Entry::Pending { .. }));
    }
}

/// Exclusive hold on an idempotency key for the duration of one dispatch.
///
/// Dropping it without [`complete`](Self::complete) frees the key.
#[derive(Debug)]
pub struct Reservation<'a> {
    store: &'a IdempotencyStore,
    slot: Slot,
    fingerprint: String,
    settled: bool,
    _held: watch::Sender<()>,
}

impl Reservation<'_> {
    pub fn key(&self) -> &str {
        &self.slot.1
    }

    /// Settle the key with the dispatch outcome. A successful result is
    /// stored for replay; anything else frees the key for a retry.
    pub fn complete(mut self, result: &ActionResult) {
        let purge = {
            let mut entries = self.store.lock();
            if result.is_success() && !result.is_replay() {
                entries.insert(
                    self.slot.clone(),
                    Entry::Done {
                        fingerprint: self.fingerprint.clone(),
                        result: result.clone(),
                        stored_at: Instant::now(),
                    },
                );
                true
            } else {
                entries.remove(&self.slot);
                false
            }
        };
        self.settled = true;
        if purge {
            self.store.purge_expired();
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.store.lock().remove(&self.slot);
        }
    }
}
