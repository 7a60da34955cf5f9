//! Single-flight execution slot
//!
//! Deduplicates concurrent attempts at the same fallible operation: the
//! first caller runs it, every concurrent caller awaits the same shared
//! outcome. A successful outcome is retained and handed out without
//! re-running the operation; a failure clears the slot so the next caller
//! retries from scratch.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::watch;

enum Slot<T, E> {
    /// No attempt in flight
    Idle,
    /// An attempt is running; followers wait on the channel
    InFlight {
        generation: u64,
        rx: watch::Receiver<Option<Result<T, E>>>,
    },
    /// A previous attempt succeeded
    Ready(T),
}

struct Inner<T, E> {
    slot: Slot<T, E>,
    next_generation: u64,
}

/// A slot that coalesces concurrent executions of one operation
pub struct SingleFlight<T, E> {
    inner: Mutex<Inner<T, E>>,
}

enum Role<T, E> {
    Leader(u64, watch::Sender<Option<Result<T, E>>>),
    Follower(u64, watch::Receiver<Option<Result<T, E>>>),
}

impl<T: Clone, E: Clone> SingleFlight<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: Slot::Idle,
                next_generation: 0,
            }),
        }
    }

    /// The retained value of a completed successful flight, if any
    pub fn get(&self) -> Option<T> {
        match &self.inner.lock().unwrap().slot {
            Slot::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Run `op`, coalescing with any flight already in progress
    ///
    /// Exactly one caller executes `op` per flight. If the leader is
    /// dropped mid-flight, a waiting caller clears the slot and takes
    /// over with its own `op`, so waiters never deadlock.
    pub async fn run<F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut op = Some(op);

        loop {
            let role = {
                let mut inner = self.inner.lock().unwrap();
                match &inner.slot {
                    Slot::Ready(value) => return Ok(value.clone()),
                    Slot::InFlight { generation, rx } => Role::Follower(*generation, rx.clone()),
                    Slot::Idle => {
                        let (tx, rx) = watch::channel(None);
                        inner.next_generation += 1;
                        let generation = inner.next_generation;
                        inner.slot = Slot::InFlight { generation, rx };
                        Role::Leader(generation, tx)
                    }
                }
            };

            match role {
                Role::Leader(generation, tx) => {
                    let op = op.take().expect("leader role is taken at most once");
                    let result = op().await;

                    {
                        let mut inner = self.inner.lock().unwrap();
                        if let Slot::InFlight { generation: g, .. } = &inner.slot {
                            if *g == generation {
                                inner.slot = match &result {
                                    Ok(value) => Slot::Ready(value.clone()),
                                    Err(_) => Slot::Idle,
                                };
                            }
                        }
                    }

                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
                Role::Follower(generation, mut rx) => {
                    loop {
                        let outcome = rx.borrow_and_update().clone();
                        if let Some(result) = outcome {
                            return result;
                        }
                        if rx.changed().await.is_err() {
                            // Leader dropped without completing. Clear the
                            // slot if it still belongs to that flight and
                            // retry from the top.
                            let mut inner = self.inner.lock().unwrap();
                            if let Slot::InFlight { generation: g, .. } = &inner.slot {
                                if *g == generation {
                                    inner.slot = Slot::Idle;
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl<T: Clone, E: Clone> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
