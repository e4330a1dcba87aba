//! # Callback — a one-shot value-or-error rendezvous
//!
//! Mirrors `zrpc.concurrency.Callback` from the reference implementation: a
//! signal that can be set with either a value or an error, and waited on from
//! another task. Used to synchronize startup — a [`crate::server::Server`] or
//! [`crate::loadbalancer::LoadBalancer`] signals its `Callback` once its socket is
//! bound/connected, and an orchestrator (e.g. [`crate::multiserver::MultiServer`])
//! waits on it before proceeding.
//!
//! Rust has no stand-in for the reference implementation's `DummyCallback` — a
//! `Callback` that nobody calls [`Callback::wait`] on simply never blocks anyone;
//! constructing one and not waiting on it *is* the null variant.

use crate::error::RpcError;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

enum State<T> {
    Unset,
    Value(T),
    Error(RpcError),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// A cloneable handle to a one-shot value-or-error signal.
pub struct Callback<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Callback<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Callback<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Unset),
                notify: Notify::new(),
            }),
        }
    }

    /// Deposit `value`, transition to value-set, and wake any waiter.
    pub async fn send(&self, value: T) {
        {
            let mut state = self.inner.state.lock().await;
            *state = State::Value(value);
        }
        self.inner.notify.notify_one();
    }

    /// Deposit `err`, transition to error-set, and wake any waiter.
    pub async fn throw(&self, err: RpcError) {
        {
            let mut state = self.inner.state.lock().await;
            *state = State::Error(err);
        }
        self.inner.notify.notify_one();
    }

    /// Block until a transition, then return the value or the error.
    ///
    /// `notify_one` stores a permit for the next call if nobody is waiting yet,
    /// so a `send`/`throw` racing ahead of a `wait` call is never lost.
    pub async fn wait(&self) -> Result<T, RpcError> {
        loop {
            {
                let state = self.inner.state.lock().await;
                match &*state {
                    State::Value(v) => return Ok(v.clone()),
                    State::Error(e) => return Err(e.clone()),
                    State::Unset => {}
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Return to the unset state. Not safe to call concurrently with an
    /// in-flight [`Callback::wait`].
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        *state = State::Unset;
    }

    /// Run `fut`; on success, return `Some(value)` untouched. On failure, call
    /// [`Callback::throw`] with the error and return `None` — the "die quietly"
    /// default from the reference implementation's `catch_exceptions(die=True)`,
    /// appropriate for a spawned task whose only way to report failure is this
    /// callback. Callers that want the reference implementation's `die=False`
    /// ("re-raise for local handling") don't use `guard`: they propagate the
    /// error with `?` themselves and call `throw` on the way out.
    pub async fn guard<F, Fut>(&self, fut: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError>>,
    {
        match fut().await {
            Ok(v) => Some(v),
            Err(e) => {
                self.throw(e).await;
                None
            }
        }
    }
}
