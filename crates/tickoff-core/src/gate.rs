//! Busy-flag gate around a single asynchronous operation.
//!
//! The operation starts on its own task as soon as the gate admits a call,
//! so dropping the returned future never cancels it. The busy flag
//! only drops once the operation has settled *and* the minimum busy duration
//! has elapsed, so fast responses do not make the UI flicker. In blocking
//! mode a second call is rejected while one is outstanding.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::outcome::{CallOutcome, GateError};

pub const DEFAULT_MIN_BUSY_DURATION: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOptions {
    pub min_busy_duration: Duration,
    pub blocking: bool,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            min_busy_duration: DEFAULT_MIN_BUSY_DURATION,
            blocking: false,
        }
    }
}

impl GateOptions {
    pub fn min_busy_duration(mut self, duration: Duration) -> Self {
        self.min_busy_duration = duration;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Busy { outstanding: usize, since: Instant },
    Disposed,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<GateState>,
    busy: watch::Sender<bool>,
    disposed: Notify,
}

impl Shared {
    fn is_disposed(&self) -> bool {
        *self.state.lock() == GateState::Disposed
    }

    fn release(&self) {
        let mut state = self.state.lock();
        match *state {
            GateState::Busy { outstanding, since } if outstanding > 1 => {
                *state = GateState::Busy {
                    outstanding: outstanding - 1,
                    since,
                };
            }
            GateState::Busy { since, .. } => {
                *state = GateState::Idle;
                drop(state);
                trace!(busy_for = ?since.elapsed(), "gate idle");
                self.busy.send_replace(false);
            }
            GateState::Idle | GateState::Disposed => {}
        }
    }
}

/// Holds one outstanding slot; released on drop, including when the
/// operation panics.
struct Ticket {
    shared: Arc<Shared>,
    started: Instant,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.shared.release();
    }
}

pub struct AsyncCallGate<F> {
    operation: F,
    options: GateOptions,
    shared: Arc<Shared>,
}

impl<F> AsyncCallGate<F> {
    pub fn new(operation: F, options: GateOptions) -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            operation,
            options,
            shared: Arc::new(Shared {
                state: Mutex::new(GateState::Idle),
                busy,
                disposed: Notify::new(),
            }),
        }
    }

    pub fn options(&self) -> GateOptions {
        self.options
    }

    pub fn is_busy(&self) -> bool {
        *self.shared.busy.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.busy.subscribe()
    }

    /// Starts a call. Admission is decided here, before the returned future
    /// is polled: a blocked call is already resolved when it is handed back.
    /// An admitted call runs to completion on a spawned task whether or not
    /// the returned future is awaited.
    pub fn invoke<A, Fut, R, E>(&self, args: A) -> BoxFuture<'static, CallOutcome<R>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let ticket = match self.admit() {
            Ok(ticket) => ticket,
            Err(err) => return future::ready(Err(err)).boxed(),
        };
        let call = (self.operation)(args);
        let shared = Arc::clone(&self.shared);
        let min_busy = self.options.min_busy_duration;

        let task = tokio::spawn(async move {
            let result = call.await;

            if let Some(ticket) = ticket {
                hold_busy(&shared, ticket.started, min_busy).await;
                drop(ticket);
            }

            result.map_err(GateError::failed)
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "gated call task did not complete");
                    Err(GateError::failed(err))
                }
            }
        }
        .boxed()
    }

    /// Cancels pending busy timers and stops all further busy-flag updates.
    /// Operations already running are left alone and still deliver outcomes.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == GateState::Disposed {
                return;
            }
            *state = GateState::Disposed;
        }
        debug!("gate disposed");
        self.shared.disposed.notify_waiters();
    }

    fn admit(&self) -> Result<Option<Ticket>, GateError> {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        match *state {
            GateState::Disposed => return Ok(None),
            GateState::Busy { .. } if self.options.blocking => {
                debug!("rejecting call while another is in flight");
                return Err(GateError::ConcurrentCallBlocked);
            }
            GateState::Busy { outstanding, since } => {
                *state = GateState::Busy {
                    outstanding: outstanding + 1,
                    since,
                };
            }
            GateState::Idle => {
                *state = GateState::Busy {
                    outstanding: 1,
                    since: now,
                };
                self.shared.busy.send_replace(true);
            }
        }
        drop(state);

        Ok(Some(Ticket {
            shared: Arc::clone(&self.shared),
            started: now,
        }))
    }
}

impl<F> Drop for AsyncCallGate<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn hold_busy(shared: &Shared, started: Instant, min_busy: Duration) {
    let remaining = min_busy.saturating_sub(started.elapsed());
    if remaining.is_zero() {
        return;
    }

    let disposed = shared.disposed.notified();
    if shared.is_disposed() {
        return;
    }

    tokio::select! {
        _ = tokio::time::sleep(remaining) => {}
        _ = disposed => {
            trace!("busy timer cancelled by dispose");
        }
    }
}
