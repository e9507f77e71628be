//! Serial polling task.
//!
//! # Responsibilities
//! - Run a probe immediately, then again `interval` after each completion
//! - Publish the latest value, latest error and fetching flag
//! - Honour stop, enable/disable and a terminal predicate
//!
//! # Design Decisions
//! - Never more than one probe in flight per task, across re-enables too
//!   (a one-permit semaphore outlives each run loop)
//! - Stopping and publishing a result both happen under the watch channel's
//!   lock, so a result that completes after `stop` is never recorded
//! - Lock order is watch channel, then control; never the reverse
//! - A failed probe is recorded and the schedule continues

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Where the task is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Disabled, not probing.
    Idle,
    /// Waiting for the next tick.
    Scheduled,
    /// A probe is running.
    InFlight,
    /// Stopped for good (explicit stop, predicate or drop).
    Cancelled,
}

/// Observable state of a polling task.
#[derive(Debug, Clone)]
pub struct PollSnapshot<T, E> {
    pub latest_value: Option<T>,
    pub latest_error: Option<E>,
    pub is_fetching: bool,
    pub phase: PollPhase,
    /// Probes whose result was recorded.
    pub completed: u64,
}

impl<T, E> PollSnapshot<T, E> {
    fn initial(enabled: bool) -> Self {
        Self {
            latest_value: None,
            latest_error: None,
            is_fetching: false,
            phase: if enabled {
                PollPhase::Scheduled
            } else {
                PollPhase::Idle
            },
            completed: 0,
        }
    }
}

type StopPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Probe<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Polling parameters.
#[derive(Clone)]
pub struct PollOptions<T> {
    interval: Duration,
    enabled: bool,
    stop_when: Option<StopPredicate<T>>,
    resource: &'static str,
}

impl<T> PollOptions<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            stop_when: None,
            resource: "generic",
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Stop polling once a fetched value satisfies `predicate`.
    pub fn stop_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.stop_when = Some(Arc::new(predicate));
        self
    }

    /// Label used in logs and metrics.
    pub fn resource(mut self, resource: &'static str) -> Self {
        self.resource = resource;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

struct Control {
    enabled: bool,
    stopped: bool,
    run: Option<CancellationToken>,
}

struct Shared<T, E> {
    probe: Probe<T, E>,
    interval: Duration,
    stop_when: Option<StopPredicate<T>>,
    resource: &'static str,
    state: watch::Sender<PollSnapshot<T, E>>,
    control: Mutex<Control>,
    slot: Arc<Semaphore>,
}

impl<T, E> Shared<T, E> {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running polling task. Dropping it stops the task.
pub struct PollTask<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> PollTask<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + std::fmt::Display + 'static,
{
    /// Start polling `probe`. Must be called inside a Tokio runtime.
    pub fn start<F, Fut>(probe: F, options: PollOptions<T>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let probe: Probe<T, E> = Arc::new(move || -> BoxFuture<'static, Result<T, E>> { Box::pin(probe()) });
        let (state, _) = watch::channel(PollSnapshot::initial(options.enabled));

        let shared = Arc::new(Shared {
            probe,
            interval: options.interval,
            stop_when: options.stop_when,
            resource: options.resource,
            state,
            control: Mutex::new(Control {
                enabled: options.enabled,
                stopped: false,
                run: None,
            }),
            slot: Arc::new(Semaphore::new(1)),
        });

        if options.enabled {
            let token = CancellationToken::new();
            shared.control().run = Some(token.clone());
            tokio::spawn(run_loop(shared.clone(), token));
        }

        Self { shared }
    }

    pub fn snapshot(&self) -> PollSnapshot<T, E> {
        self.shared.state.borrow().clone()
    }

    pub fn latest_value(&self) -> Option<T> {
        self.shared.state.borrow().latest_value.clone()
    }

    pub fn latest_error(&self) -> Option<E> {
        self.shared.state.borrow().latest_error.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.shared.state.borrow().is_fetching
    }

    pub fn phase(&self) -> PollPhase {
        self.shared.state.borrow().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot<T, E>> {
        self.shared.state.subscribe()
    }

    /// Toggle polling. Re-enabling probes immediately. No-op once stopped.
    pub fn set_enabled(&self, enabled: bool) {
        let mut control = self.shared.control();
        if control.stopped || control.enabled == enabled {
            return;
        }
        control.enabled = enabled;

        if enabled {
            let token = CancellationToken::new();
            control.run = Some(token.clone());
            drop(control);
            tracing::debug!(resource = self.shared.resource, "Polling enabled");
            tokio::spawn(run_loop(self.shared.clone(), token));
        } else {
            let run = control.run.take();
            drop(control);
            tracing::debug!(resource = self.shared.resource, "Polling disabled");
            if let Some(token) = run {
                self.shared.state.send_if_modified(|s| {
                    // Already finished by the stop predicate.
                    if token.is_cancelled() {
                        return false;
                    }
                    token.cancel();
                    s.phase = PollPhase::Idle;
                    s.is_fetching = false;
                    true
                });
            }
        }
    }

    /// Stop for good. A probe still in flight has its result discarded.
    pub fn stop(&self) {
        let run = {
            let mut control = self.shared.control();
            if control.stopped {
                return;
            }
            control.stopped = true;
            control.run.take()
        };

        self.shared.state.send_modify(|s| {
            if let Some(token) = &run {
                token.cancel();
            }
            s.phase = PollPhase::Cancelled;
            s.is_fetching = false;
        });
        tracing::debug!(resource = self.shared.resource, "Polling stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.control().stopped
    }
}

impl<T, E> Drop for PollTask<T, E> {
    fn drop(&mut self) {
        let run = {
            let mut control = self.shared.control();
            control.stopped = true;
            control.run.take()
        };
        if let Some(token) = run {
            token.cancel();
        }
    }
}

enum Outcome {
    Continue,
    Finished,
    Discarded,
}

async fn run_loop<T, E>(shared: Arc<Shared<T, E>>, token: CancellationToken)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + std::fmt::Display + 'static,
{
    loop {
        let permit = tokio::select! {
            permit = shared.slot.clone().acquire_owned() => permit,
            _ = token.cancelled() => return,
        };
        let Ok(permit) = permit else { return };

        let mut started = false;
        shared.state.send_if_modified(|s| {
            if token.is_cancelled() {
                return false;
            }
            started = true;
            s.is_fetching = true;
            s.phase = PollPhase::InFlight;
            true
        });
        if !started {
            return;
        }

        let result = (shared.probe)().await;
        let success = result.is_ok();

        let mut outcome = Outcome::Discarded;
        shared.state.send_modify(|s| {
            if token.is_cancelled() {
                return;
            }
            s.is_fetching = false;
            s.completed += 1;
            outcome = Outcome::Continue;
            match result {
                Ok(value) => {
                    let finished = shared.stop_when.as_ref().is_some_and(|done| done(&value));
                    s.latest_value = Some(value);
                    s.latest_error = None;
                    if finished {
                        // Mark stopped before the phase becomes visible.
                        let mut control = shared.control();
                        control.stopped = true;
                        control.run = None;
                        drop(control);
                        token.cancel();
                        s.phase = PollPhase::Cancelled;
                        outcome = Outcome::Finished;
                    } else {
                        s.phase = PollPhase::Scheduled;
                    }
                }
                Err(e) => {
                    tracing::debug!(resource = shared.resource, error = %e, "Probe failed");
                    s.latest_error = Some(e);
                    s.phase = PollPhase::Scheduled;
                }
            }
        });
        drop(permit);

        match outcome {
            Outcome::Discarded => {
                tracing::debug!(resource = shared.resource, "Discarding probe result after stop");
                return;
            }
            Outcome::Finished => {
                metrics::record_probe(shared.resource, success);
                tracing::debug!(resource = shared.resource, "Polling finished");
                return;
            }
            Outcome::Continue => metrics::record_probe(shared.resource, success),
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.interval) => {}
            _ = token.cancelled() => return,
        }
    }
}
