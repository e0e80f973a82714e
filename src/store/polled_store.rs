use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::polling::poll_task::PollTask;
use crate::polling::poller::{ErrorHook, PollTrigger, Poller};
use crate::polling::types::{PollOptions, PollState, TickOutcome};

/// Stores that can surface failures raised around their fetches, such as a
/// missed invocation deadline.
pub trait RecordsFailures: Send + Sync {
    fn record_failure(&self, error: anyhow::Error);
}

/// A store paired with the poller that drives its reconciliation. Dropping it
/// stops the poller; the store itself lives on while subscribers hold it.
pub struct PolledStore<S> {
    store: Arc<S>,
    poller: Poller,
    trigger: PollTrigger,
}

impl<S: PollTask + RecordsFailures + 'static> PolledStore<S> {
    pub fn start(store: S, options: PollOptions) -> Self {
        let store = Arc::new(store);
        let on_error: ErrorHook = {
            let store = Arc::clone(&store);
            Arc::new(move |error: &anyhow::Error| store.record_failure(anyhow!("{error:#}")))
        };

        let mut poller = Poller::new(store.clone(), options).with_error_hook(on_error);
        let trigger = poller.start();

        Self {
            store,
            poller,
            trigger,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Forces an out-of-band reconciliation, subject to the single-flight guard.
    pub fn refresh(&self) -> TickOutcome {
        self.trigger.trigger()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.poller.set_enabled(enabled);
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.poller.set_interval(interval);
    }

    pub fn is_enabled(&self) -> bool {
        self.poller.options().enabled
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    pub fn stop(&mut self) {
        self.poller.stop();
    }
}

impl<S> Deref for PolledStore<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.store
    }
}

impl<S> fmt::Debug for PolledStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolledStore")
            .field("poller", &self.poller)
            .finish()
    }
}
