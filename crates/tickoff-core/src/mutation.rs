use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::gate::{AsyncCallGate, GateOptions};
use crate::outcome::CallOutcome;

/// Live status of a remote mutation, mirroring what the UI reads to render
/// spinners, last results and error banners.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationStatus<T> {
    pub is_loading: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub is_success: bool,
    pub is_error: bool,
    pub request_count: u64,
}

impl<T> Default for MutationStatus<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            data: None,
            error: None,
            is_success: false,
            is_error: false,
            request_count: 0,
        }
    }
}

pub trait RemoteMutation: Send + Sync + 'static {
    type Arg: Send + 'static;
    type Output: Clone + Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn trigger(&self, arg: Self::Arg) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;

    fn status(&self) -> MutationStatus<Self::Output>;
}

type Trigger<A, T, E> = Box<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

#[derive(Debug)]
struct Tracker<T> {
    in_flight: usize,
    status: MutationStatus<T>,
}

/// Remote mutation that keeps its own status record while triggers run.
pub struct TrackedMutation<A, T, E> {
    trigger: Trigger<A, T, E>,
    tracker: Arc<Mutex<Tracker<T>>>,
}

impl<A, T, E> TrackedMutation<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new<F, Fut>(trigger: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            trigger: Box::new(move |arg| trigger(arg).boxed()),
            tracker: Arc::new(Mutex::new(Tracker {
                in_flight: 0,
                status: MutationStatus::default(),
            })),
        }
    }
}

impl<A, T, E> RemoteMutation for TrackedMutation<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Arg = A;
    type Output = T;
    type Error = E;

    fn trigger(&self, arg: A) -> BoxFuture<'static, Result<T, E>> {
        {
            let mut tracker = self.tracker.lock();
            tracker.in_flight += 1;
            tracker.status.is_loading = true;
            tracker.status.request_count += 1;
        }

        let call = (self.trigger)(arg);
        let tracker = Arc::clone(&self.tracker);

        async move {
            let result = call.await;
            let mut tracker = tracker.lock();
            tracker.in_flight = tracker.in_flight.saturating_sub(1);
            tracker.status.is_loading = tracker.in_flight > 0;
            match &result {
                Ok(value) => {
                    tracker.status.data = Some(value.clone());
                    tracker.status.error = None;
                    tracker.status.is_success = true;
                    tracker.status.is_error = false;
                }
                Err(err) => {
                    tracker.status.error = Some(err.to_string());
                    tracker.status.is_success = false;
                    tracker.status.is_error = true;
                }
            }
            result
        }
        .boxed()
    }

    fn status(&self) -> MutationStatus<T> {
        self.tracker.lock().status.clone()
    }
}

type GatedTrigger<M> = Box<
    dyn Fn(
            <M as RemoteMutation>::Arg,
        ) -> BoxFuture<
            'static,
            Result<<M as RemoteMutation>::Output, <M as RemoteMutation>::Error>,
        > + Send
        + Sync,
>;

/// A remote mutation behind an [`AsyncCallGate`]. The reported status is
/// loading while either the request or the gate's busy window is active.
pub struct DebouncedMutation<M: RemoteMutation> {
    remote: Arc<M>,
    gate: AsyncCallGate<GatedTrigger<M>>,
}

impl<M: RemoteMutation> DebouncedMutation<M> {
    pub fn new(remote: M, options: GateOptions) -> Self {
        let remote = Arc::new(remote);
        let target = Arc::clone(&remote);
        let trigger: GatedTrigger<M> = Box::new(move |arg| target.trigger(arg));
        Self {
            remote,
            gate: AsyncCallGate::new(trigger, options),
        }
    }

    pub fn trigger(&self, arg: M::Arg) -> BoxFuture<'static, CallOutcome<M::Output>> {
        self.gate.invoke(arg)
    }

    pub fn status(&self) -> MutationStatus<M::Output> {
        let mut status = self.remote.status();
        status.is_loading = status.is_loading || self.gate.is_busy();
        status
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn dispose(&self) {
        self.gate.dispose();
    }
}
