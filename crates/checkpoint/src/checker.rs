// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background task asking the version-check service, on a fixed interval,
//! whether the running version is current.
//!
//! The first check runs as soon as the checker is started, then once every
//! `interval`. Ticks are serialized on a single task: the handler runs to
//! completion before the next tick can fire, and a check slower than the
//! interval delays the next tick instead of overlapping it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::check::{is_check_disabled, CheckError, CheckParams, CheckResponse, VersionCheck};

/// How long [`Checker::stop`] waits for an in-flight check before aborting it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

// About thirty years. Keeps the ticker's deadlines inside the range of `Instant`
const MAX_TICK_PERIOD: Duration = Duration::from_secs(86400 * 365 * 30);

/// Receives the outcome of every tick.
pub type CheckHandler = Box<dyn Fn(Result<CheckResponse, CheckError>) + Send + Sync>;

/// Lifecycle of a [`Checker`]. There is no way back to `Running` once stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckerError {
    #[error("checker is already running")]
    AlreadyStarted,

    #[error("checker has been stopped")]
    Stopped,

    #[error("check interval must be greater than 0")]
    ZeroInterval,

    #[error("checker must be started from within a Tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, Default)]
struct Schedule {
    last_check_at: Option<Instant>,
    next_check_at: Option<Instant>,
}

/// Handle to a periodic version check.
pub struct Checker {
    client: Arc<dyn VersionCheck>,
    params: Arc<CheckParams>,
    interval: Duration,
    stop_timeout: Duration,
    state: CheckerState,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
    schedule: Option<watch::Receiver<Schedule>>,
}

impl Checker {
    pub fn new<C>(client: C, params: CheckParams, interval: Duration) -> Self
    where
        C: VersionCheck + 'static,
    {
        Self {
            client: Arc::new(client),
            params: Arc::new(params),
            interval,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            state: CheckerState::Created,
            cancel_token: CancellationToken::new(),
            task: None,
            schedule: None,
        }
    }

    /// Bounds how long [`Checker::stop`] waits for an in-flight check.
    #[must_use]
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Spawns the tick loop on the current Tokio runtime. Logs emitted by the
    /// ticks are attached to the span current at this point.
    ///
    /// When checks are disabled through the environment the checker is
    /// marked running but no tick is ever scheduled.
    pub fn start<F>(&mut self, handler: F) -> Result<(), CheckerError>
    where
        F: Fn(Result<CheckResponse, CheckError>) + Send + Sync + 'static,
    {
        match self.state {
            CheckerState::Running => return Err(CheckerError::AlreadyStarted),
            CheckerState::Stopped => return Err(CheckerError::Stopped),
            CheckerState::Created => {}
        }
        if self.interval.is_zero() {
            return Err(CheckerError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| CheckerError::NoRuntime)?;

        self.state = CheckerState::Running;
        if is_check_disabled() {
            info!(
                "Version checks disabled, not checking {} for updates",
                self.params.product
            );
            return Ok(());
        }

        let (schedule_tx, schedule_rx) = watch::channel(Schedule::default());
        self.schedule = Some(schedule_rx);

        let tick_loop = TickLoop {
            client: Arc::clone(&self.client),
            params: Arc::clone(&self.params),
            interval: self.interval,
            handler: Box::new(handler),
            cancel_token: self.cancel_token.clone(),
            schedule: schedule_tx,
        };
        self.task = Some(runtime.spawn(tick_loop.run().instrument(Span::current())));
        debug!(
            "Checking {} for updates every {:?}",
            self.params.product, self.interval
        );
        Ok(())
    }

    /// Cancels future ticks. A check already in flight gets up to the stop
    /// timeout to finish and report; past that it is aborted. Once this
    /// returns the handler is never invoked again.
    pub async fn stop(&mut self) {
        if self.state == CheckerState::Stopped {
            return;
        }
        self.state = CheckerState::Stopped;
        self.cancel_token.cancel();

        let Some(mut task) = self.task.take() else {
            return;
        };
        match timeout(self.stop_timeout, &mut task).await {
            Ok(Ok(())) => debug!("Version checker stopped"),
            Ok(Err(e)) => error!("Version checker task failed: {}", e),
            Err(_) => {
                warn!(
                    "Version check still in flight after {:?}, aborting it",
                    self.stop_timeout
                );
                task.abort();
                let _ = task.await;
            }
        }
    }

    pub fn state(&self) -> CheckerState {
        self.state
    }

    pub fn params(&self) -> &CheckParams {
        &self.params
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the most recent tick started, if any has.
    pub fn last_check_at(&self) -> Option<Instant> {
        self.schedule.as_ref()?.borrow().last_check_at
    }

    /// When the next tick is due. `None` before the first tick, once stopped,
    /// and when the interval reaches past what an `Instant` can represent.
    pub fn next_check_at(&self) -> Option<Instant> {
        if self.state != CheckerState::Running {
            return None;
        }
        self.schedule.as_ref()?.borrow().next_check_at
    }
}

impl Drop for Checker {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("params", &self.params)
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish()
    }
}

/// Creates and starts a checker in one go.
pub fn check_interval<C, F>(
    client: C,
    params: CheckParams,
    interval: Duration,
    handler: F,
) -> Result<Checker, CheckerError>
where
    C: VersionCheck + 'static,
    F: Fn(Result<CheckResponse, CheckError>) + Send + Sync + 'static,
{
    let mut checker = Checker::new(client, params, interval);
    checker.start(handler)?;
    Ok(checker)
}

struct TickLoop {
    client: Arc<dyn VersionCheck>,
    params: Arc<CheckParams>,
    interval: Duration,
    handler: CheckHandler,
    cancel_token: CancellationToken,
    schedule: watch::Sender<Schedule>,
}

impl TickLoop {
    async fn run(self) {
        let mut ticker = interval(self.interval.min(MAX_TICK_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let started = Instant::now();
        self.schedule.send_modify(|schedule| {
            schedule.last_check_at = Some(started);
            schedule.next_check_at = started.checked_add(self.interval);
        });

        let result = self.client.check(&self.params).await;

        // A panicking handler must not take the following ticks down with it
        if catch_unwind(AssertUnwindSafe(|| (self.handler)(result))).is_err() {
            error!("Version check handler panicked");
        }

        let now = Instant::now();
        self.schedule.send_modify(|schedule| {
            schedule.next_check_at = started.checked_add(self.interval).map(|next| next.max(now));
        });
    }
}
