//! Duplicate-request protection for the processing dispatcher.
//!
//! A retried request must not pass the transaction mechanism twice. Every processing call is
//! fingerprinted over caller identity, operation and canonical body; the cache then guarantees
//! that within the replay window a duplicate is served the previously computed response, and that
//! concurrent duplicates coalesce behind a single in-flight execution.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    future::Future,
    time::{Duration, Instant},
};

use log::*;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};

use crate::gateway::{
    errors::ProcessingError,
    objects::{CallerContext, ProcessingRequest, ProcessingResponse},
};

/// Deterministic digest of the semantically significant parts of a processing call: the caller's
/// address, the operation identifier and the canonicalized request body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(ctx: &CallerContext, operation: &str, request: &ProcessingRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ctx.caller_address.as_bytes());
        hasher.update([0u8]);
        hasher.update(operation.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.canonical().as_bytes());
        Self(hasher.finalize().into())
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().take(8).try_for_each(|b| write!(f, "{b:02x}"))
    }
}

enum Slot {
    /// An execution for this fingerprint is running. Dropping the sender wakes every waiter.
    InFlight(broadcast::Sender<()>),
    /// A completed success, replayed verbatim to duplicates within the window.
    Done { response: ProcessingResponse, at: Instant },
}

enum Action {
    Replay(ProcessingResponse),
    Wait(broadcast::Receiver<()>),
    Run(broadcast::Sender<()>),
}

/// Bounded cache of recent processing results keyed by [`Fingerprint`].
///
/// Only successes are retained: a failing execution releases its waiters, who then re-drive the
/// operation themselves. Declines never charge, so re-execution is safe, and transient failures
/// are not pinned for the whole window.
pub struct IdempotencyCache {
    window: Duration,
    max_entries: usize,
    slots: Mutex<HashMap<Fingerprint, Slot>>,
}

impl IdempotencyCache {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self { window, max_entries, slots: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached response for `fingerprint` if one is fresh, joins an in-flight
    /// execution if one is running, or runs `work` and records its outcome.
    ///
    /// At most one execution per fingerprint is ever in flight at a time.
    pub async fn get_or_run<F>(
        &self,
        fingerprint: Fingerprint,
        work: F,
    ) -> Result<ProcessingResponse, ProcessingError>
    where
        F: Future<Output = Result<ProcessingResponse, ProcessingError>>,
    {
        let mut work = Some(work);
        loop {
            let action = {
                let mut slots = self.slots.lock().await;
                let action = match slots.get(&fingerprint) {
                    Some(Slot::Done { response, at }) if at.elapsed() <= self.window => {
                        Action::Replay(response.clone())
                    },
                    Some(Slot::InFlight(tx)) => Action::Wait(tx.subscribe()),
                    _ => {
                        let (tx, _) = broadcast::channel(1);
                        Action::Run(tx)
                    },
                };
                if let Action::Run(tx) = &action {
                    self.make_room(&mut slots);
                    slots.insert(fingerprint.clone(), Slot::InFlight(tx.clone()));
                }
                action
            };
            match action {
                Action::Replay(response) => {
                    debug!("♻️ Replaying cached response for duplicate request {fingerprint}");
                    return Ok(response);
                },
                Action::Wait(mut rx) => {
                    trace!("♻️ Coalescing duplicate request {fingerprint} behind the in-flight execution");
                    let _ = rx.recv().await;
                },
                Action::Run(tx) => {
                    let result = work.take().expect("a caller runs its work at most once").await;
                    let mut slots = self.slots.lock().await;
                    match &result {
                        Ok(response) => {
                            slots.insert(
                                fingerprint.clone(),
                                Slot::Done { response: response.clone(), at: Instant::now() },
                            );
                        },
                        Err(_) => {
                            slots.remove(&fingerprint);
                        },
                    }
                    drop(slots);
                    // Closing the channel wakes the waiters, who re-inspect the slot.
                    drop(tx);
                    return result;
                },
            }
        }
    }

    /// Drops completed entries that have fallen out of the replay window. Returns the count.
    pub async fn purge_stale(&self) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        let window = self.window;
        slots.retain(|_, slot| match slot {
            Slot::Done { at, .. } => at.elapsed() <= window,
            Slot::InFlight(_) => true,
        });
        before - slots.len()
    }

    // Caller must hold the slot lock. In-flight entries are never evicted.
    fn make_room(&self, slots: &mut HashMap<Fingerprint, Slot>) {
        let window = self.window;
        slots.retain(|_, slot| match slot {
            Slot::Done { at, .. } => at.elapsed() <= window,
            Slot::InFlight(_) => true,
        });
        while slots.len() >= self.max_entries {
            let oldest = slots
                .iter()
                .filter_map(|(fp, slot)| match slot {
                    Slot::Done { at, .. } => Some((fp.clone(), *at)),
                    Slot::InFlight(_) => None,
                })
                .min_by_key(|(_, at)| *at)
                .map(|(fp, _)| fp);
            match oldest {
                Some(fp) => {
                    trace!("♻️ Evicting {fp} to make room");
                    slots.remove(&fp);
                },
                None => break,
            }
        }
    }
}
