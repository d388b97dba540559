//! Readiness gate for the one-time filesystem open
//!
//! The storage service opens a filesystem once, possibly reporting the
//! result through a callback that runs on another thread. Every filesystem
//! operation must wait for that result and every caller must see the same
//! one. [`ReadinessGate`] is that one-shot latch: a `futures` oneshot
//! channel behind a [`Shared`] future, so any number of clones resolve to
//! the single value sent by the one [`GateResolver`].
//!
//! Synchronous callers use [`ReadinessGate::wait`]; async callers can
//! `.await` [`ReadinessGate::ready`].

use crate::error::{FsError, Result};
use crate::status::Status;
use crate::storage::{Completion, Resource, StorageService};
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Outcome of the filesystem open, shared by all waiters
pub type Outcome = Result<()>;

/// Whether the mounting context may receive completion callbacks
///
/// When it cannot, the open must be issued in blocking mode and the gate
/// resolves before the mount returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallbackDelivery {
    #[default]
    Available,
    Unavailable,
}

/// One-shot latch holding the filesystem open outcome
///
/// Cloning is cheap; all clones observe the same outcome.
#[derive(Clone)]
pub struct ReadinessGate {
    outcome: Shared<BoxFuture<'static, Outcome>>,
}

/// The single writer of a [`ReadinessGate`]
///
/// Consumed by [`GateResolver::resolve`], so a gate cannot be resolved twice.
/// Dropping an unused resolver resolves the gate to [`FsError::Io`].
#[derive(Debug)]
pub struct GateResolver {
    sender: oneshot::Sender<Outcome>,
}

impl ReadinessGate {
    /// A gate that is already resolved
    #[must_use]
    pub fn resolved(outcome: Outcome) -> Self {
        Self {
            outcome: future::ready(outcome).boxed().shared(),
        }
    }

    /// An unresolved gate and its resolver
    #[must_use]
    pub fn pending() -> (Self, GateResolver) {
        let (sender, receiver) = oneshot::channel();
        let outcome = receiver
            .map(|received| {
                received.unwrap_or_else(|_| {
                    warn!("filesystem open completion was dropped without a result");
                    Err(FsError::Io)
                })
            })
            .boxed()
            .shared();
        (Self { outcome }, GateResolver { sender })
    }

    /// Issue the filesystem open and return a gate for its outcome
    ///
    /// With [`CallbackDelivery::Available`] the open is asynchronous and the
    /// returned gate resolves when the service invokes the completion. With
    /// [`CallbackDelivery::Unavailable`] the open blocks and the gate is
    /// resolved on return.
    pub fn open<S: StorageService>(
        service: &S,
        filesystem: Resource,
        expected_size: u64,
        delivery: CallbackDelivery,
    ) -> Self {
        match delivery {
            CallbackDelivery::Available => {
                let (gate, resolver) = Self::pending();
                let resolver = Arc::new(Mutex::new(Some(resolver)));
                let from_callback = Arc::clone(&resolver);
                let completion = Completion::Callback(Box::new(move |status| {
                    debug!("filesystem {} open completed: {}", filesystem, status);
                    if let Some(resolver) = take_resolver(&from_callback) {
                        resolver.resolve(status.into_result());
                    }
                }));
                let status = service.open_filesystem(filesystem, expected_size, completion);
                debug!("filesystem {} open issued: {}", filesystem, status);
                // Anything but pending is the final result; the callback may never run.
                if status != Status::CompletionPending {
                    if let Some(resolver) = take_resolver(&resolver) {
                        resolver.resolve(status.into_result());
                    }
                }
                gate
            }
            CallbackDelivery::Unavailable => {
                let status = service.open_filesystem(filesystem, expected_size, Completion::Blocking);
                debug!("filesystem {} opened synchronously: {}", filesystem, status);
                Self::resolved(status.into_result())
            }
        }
    }

    /// Block until resolved, then return the outcome
    ///
    /// # Errors
    ///
    /// Returns the cached open failure, identical for every caller.
    pub fn wait(&self) -> Outcome {
        if let Some(outcome) = self.outcome.peek() {
            return outcome.clone();
        }
        futures::executor::block_on(self.outcome.clone())
    }

    /// Future resolving to the outcome
    pub fn ready(&self) -> impl std::future::Future<Output = Outcome> + Send + 'static {
        self.outcome.clone()
    }

    /// Whether the outcome is known, without blocking
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome.peek().is_some() || self.outcome.clone().now_or_never().is_some()
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("outcome", &self.outcome.peek())
            .finish()
    }
}

fn take_resolver(slot: &Mutex<Option<GateResolver>>) -> Option<GateResolver> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl GateResolver {
    /// Publish the outcome and wake every waiter
    pub fn resolve(self, outcome: Outcome) {
        if self.sender.send(outcome).is_err() {
            debug!("readiness gate dropped before the open completed");
        }
    }
}
