use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::polling::poll_task::PollTask;
use crate::polling::types::{PollOptions, PollState, SkipReason, TickOutcome, TickSource};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub type ErrorHook = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

const IN_FLIGHT: u8 = 0b01;
const STOPPED: u8 = 0b10;

struct Shared {
    task: Arc<dyn PollTask>,
    on_error: OnceCell<ErrorHook>,
    deadline: Option<Duration>,

    /// `IN_FLIGHT` and `STOPPED` share one word so that claiming an invocation
    /// and stopping are ordered against each other.
    flags: AtomicU8,
    generation: AtomicU64,
    invocations: AtomicU64,
}

/// Releases the single-flight flag when the invocation settles, including on panic.
struct InFlightGuard<'a>(&'a AtomicU8);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_and(!IN_FLIGHT, Ordering::AcqRel);
    }
}

impl Shared {
    fn dispatch(self: &Arc<Self>, source: TickSource) -> TickOutcome {
        if let Err(flags) =
            self.flags
                .compare_exchange(0, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
        {
            if flags & STOPPED != 0 {
                return TickOutcome::Skipped(SkipReason::Stopped);
            }

            debug!(task = self.task.name(), ?source, "previous invocation still running; tick dropped");

            return TickOutcome::Skipped(SkipReason::InFlight);
        }

        self.invocations.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = InFlightGuard(&shared.flags);

            if let Err(error) = shared.invoke().await {
                warn!(task = shared.task.name(), ?source, "poll invocation failed: {error:#}");

                if let Some(on_error) = shared.on_error.get() {
                    on_error(&error);
                }
            }
        });

        TickOutcome::Dispatched
    }

    fn is_in_flight(&self) -> bool {
        self.flags.load(Ordering::Acquire) & IN_FLIGHT != 0
    }

    async fn invoke(&self) -> Result<()> {
        let Some(deadline) = self.deadline else {
            return self.task.run().await;
        };

        match time::timeout(deadline, self.task.run()).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} did not settle within {deadline:?}",
                self.task.name()
            )),
        }
    }
}

pub struct Poller {
    shared: Arc<Shared>,
    options: PollOptions,
    timer: Option<JoinHandle<()>>,
    active: bool,
}

impl Poller {
    pub fn new(task: Arc<dyn PollTask>, options: PollOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                task,
                on_error: OnceCell::new(),
                deadline: options.deadline,
                flags: AtomicU8::new(0),
                generation: AtomicU64::new(0),
                invocations: AtomicU64::new(0),
            }),
            options,
            timer: None,
            active: false,
        }
    }

    /// Installs the hook told about every failed invocation. Only the first
    /// hook installed is kept.
    pub fn with_error_hook(self, on_error: ErrorHook) -> Self {
        if self.shared.on_error.set(on_error).is_err() {
            warn!(task = self.shared.task.name(), "error hook already installed; ignoring");
        }
        self
    }

    /// Activates polling and returns a handle for out-of-band invocations.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> PollTrigger {
        self.active = true;
        self.shared.flags.fetch_and(!STOPPED, Ordering::AcqRel);
        self.arm();

        self.trigger_handle()
    }

    pub fn trigger_handle(&self) -> PollTrigger {
        PollTrigger {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.options.enabled == enabled {
            return;
        }

        self.options.enabled = enabled;
        if self.active {
            self.arm();
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        if self.options.interval == interval {
            return;
        }

        self.options.interval = interval;
        if self.active {
            self.arm();
        }
    }

    /// Cancels the timer. An invocation already running is left to settle, but
    /// nothing new is dispatched once this returns.
    pub fn stop(&mut self) {
        self.active = false;
        self.shared.flags.fetch_or(STOPPED, Ordering::AcqRel);
        self.disarm();
    }

    pub fn state(&self) -> PollState {
        if self.shared.is_in_flight() {
            PollState::Invoking
        } else if self.timer.is_some() {
            PollState::Scheduled
        } else {
            PollState::Idle
        }
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    pub fn invocations(&self) -> u64 {
        self.shared.invocations.load(Ordering::Relaxed)
    }

    fn arm(&mut self) {
        self.disarm();

        if !self.options.enabled {
            debug!(task = self.shared.task.name(), "polling disabled");
            return;
        }

        let generation = self.shared.generation.load(Ordering::Acquire);

        if self.options.run_immediately {
            self.shared.dispatch(TickSource::Activation);
        }

        let period = self.options.interval.max(MIN_INTERVAL);
        let first_tick = Instant::now() + period;
        let shared = Arc::clone(&self.shared);

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if shared.generation.load(Ordering::Acquire) != generation {
                    break;
                }

                shared.dispatch(TickSource::Timer);
            }
        }));

        debug!(task = self.shared.task.name(), interval = ?period, "polling scheduled");
    }

    fn disarm(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("task", &self.shared.task.name())
            .field("options", &self.options)
            .field("state", &self.state())
            .field("invocations", &self.invocations())
            .finish()
    }
}

#[derive(Clone)]
pub struct PollTrigger {
    shared: Arc<Shared>,
}

impl PollTrigger {
    pub fn trigger(&self) -> TickOutcome {
        self.shared.dispatch(TickSource::Manual)
    }
}

impl fmt::Debug for PollTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollTrigger")
            .field("task", &self.shared.task.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingTask {
        calls: AtomicUsize,
        hold: Option<Duration>,
        hang: bool,
        fail: bool,
    }

    impl CountingTask {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PollTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(hold) = self.hold {
                time::sleep(hold).await;
            }
            if self.fail {
                anyhow::bail!("fetch failed");
            }

            Ok(())
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_once_per_interval() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(5_000)));
        poller.start();

        settle().await;
        assert_eq!(task.calls(), 1);

        time::sleep(ms(4_990)).await;
        settle().await;
        assert_eq!(task.calls(), 1);

        time::sleep(ms(20)).await;
        settle().await;
        assert_eq!(task.calls(), 2);
        assert_eq!(poller.state(), PollState::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_a_full_interval_without_immediate_run() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(
            task.clone(),
            PollOptions::every(ms(1_000)).run_immediately(false),
        );
        poller.start();

        settle().await;
        assert_eq!(task.calls(), 0);

        time::sleep(ms(1_010)).await;
        settle().await;
        assert_eq!(task.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_while_in_flight_are_dropped() {
        let task = Arc::new(CountingTask {
            hang: true,
            ..Default::default()
        });
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1_000)));
        let trigger = poller.start();

        settle().await;
        assert_eq!(task.calls(), 1);

        for _ in 0..5 {
            assert_eq!(
                trigger.trigger(),
                TickOutcome::Skipped(SkipReason::InFlight)
            );
        }

        time::sleep(ms(3_500)).await;
        settle().await;

        assert_eq!(task.calls(), 1);
        assert_eq!(poller.invocations(), 1);
        assert_eq!(poller.state(), PollState::Invoking);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_stops_ticking() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1_000)));
        poller.start();
        settle().await;
        assert_eq!(task.calls(), 1);

        poller.set_enabled(false);
        assert_eq!(poller.state(), PollState::Idle);

        time::sleep(ms(3_500)).await;
        settle().await;
        assert_eq!(task.calls(), 1);

        poller.set_enabled(true);
        settle().await;
        assert_eq!(task.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_is_honored_while_disabled() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1_000)).enabled(false));
        let trigger = poller.start();

        settle().await;
        assert_eq!(task.calls(), 0);

        assert_eq!(trigger.trigger(), TickOutcome::Dispatched);
        settle().await;
        assert_eq!(task.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_and_polling_continues() {
        let task = Arc::new(CountingTask {
            fail: true,
            ..Default::default()
        });
        let reported = Arc::new(AtomicUsize::new(0));
        let on_error: ErrorHook = {
            let reported = reported.clone();
            Arc::new(move |_error| {
                reported.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1_000))).with_error_hook(on_error);
        poller.start();

        time::sleep(ms(2_500)).await;
        settle().await;

        assert_eq!(task.calls(), 3);
        assert_eq!(reported.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_restarts_the_timer() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(
            task.clone(),
            PollOptions::every(ms(5_000)).run_immediately(false),
        );
        poller.start();

        time::sleep(ms(3_000)).await;
        poller.set_interval(ms(4_000));

        time::sleep(ms(3_990)).await;
        settle().await;
        assert_eq!(task.calls(), 0);

        time::sleep(ms(20)).await;
        settle().await;
        assert_eq!(task.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_in_flight_call_finish_and_prevents_more() {
        let task = Arc::new(CountingTask {
            hold: Some(ms(1_000)),
            ..Default::default()
        });
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(500)));
        let trigger = poller.start();
        settle().await;

        poller.stop();
        assert_eq!(poller.state(), PollState::Invoking);
        assert_eq!(trigger.trigger(), TickOutcome::Skipped(SkipReason::Stopped));

        time::sleep(ms(5_000)).await;
        settle().await;

        assert_eq!(task.calls(), 1);
        assert_eq!(poller.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_releases_a_hung_invocation() {
        let task = Arc::new(CountingTask {
            hang: true,
            ..Default::default()
        });
        let reported = Arc::new(AtomicUsize::new(0));
        let on_error: ErrorHook = {
            let reported = reported.clone();
            Arc::new(move |_error| {
                reported.fetch_add(1, Ordering::SeqCst);
            })
        };

        let options = PollOptions::every(ms(10_000)).deadline(Some(ms(1_000)));
        let mut poller = Poller::new(task.clone(), options).with_error_hook(on_error);
        let trigger = poller.start();
        settle().await;

        time::sleep(ms(1_500)).await;
        settle().await;
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state(), PollState::Scheduled);

        assert_eq!(trigger.trigger(), TickOutcome::Dispatched);
        settle().await;
        assert_eq!(task.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn nothing_starts_once_stop_returns() {
        for _ in 0..50 {
            let task = Arc::new(CountingTask::default());
            let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1)));
            poller.start();
            time::sleep(ms(3)).await;

            poller.stop();
            while poller.state() == PollState::Invoking {
                tokio::task::yield_now().await;
            }

            let calls_at_stop = task.calls();
            let invocations_at_stop = poller.invocations();
            time::sleep(ms(10)).await;

            assert_eq!(task.calls(), calls_at_stop);
            assert_eq!(poller.invocations(), invocations_at_stop);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_resumes_polling() {
        let task = Arc::new(CountingTask::default());
        let mut poller = Poller::new(task.clone(), PollOptions::every(ms(1_000)));
        poller.start();
        settle().await;

        poller.stop();
        let trigger = poller.start();
        settle().await;

        assert_eq!(task.calls(), 2);
        assert_eq!(trigger.trigger(), TickOutcome::Dispatched);
    }
}
