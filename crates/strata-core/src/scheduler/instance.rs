//! One component instance and its per-tick bookkeeping.

use std::time::{Duration, Instant};

use crate::component::{Component, Lifecycle, LifecycleState, Progress, SetupContext, TickContext, TickResult};
use crate::error::Result;
use crate::external::ExternalHub;
use crate::logger::Logger;
use crate::message::{Inbox, Postbox, drain};
use crate::store::LevelStore;

/// Which worker ticks an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadAssignment {
    /// Group 0.
    #[default]
    Default,
    /// An explicit group. Groups beyond the thread count wrap around.
    Group(usize),
    /// Set up but never ticked.
    Never,
}

/// Tick statistics of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceProfile {
    /// Instance name.
    pub name: String,
    /// Type id.
    pub type_name: String,
    /// Ticks executed.
    pub ticks: u64,
    /// Total time spent in `tick` (zero unless profiling is enabled).
    pub total: Duration,
    /// Duration of the last tick.
    pub last: Duration,
    /// Outcome counts, indexed by [`TickResult::index()`].
    pub counts: [u64; 6],
    /// Outcome of the last tick.
    pub last_result: TickResult,
}

impl InstanceProfile {
    fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ticks: 0,
            total: Duration::ZERO,
            last: Duration::ZERO,
            counts: [0; 6],
            last_result: TickResult::Inactive,
        }
    }

    /// How often `result` was reported.
    pub fn count(&self, result: TickResult) -> u64 {
        self.counts[result.index()]
    }

    /// Mean tick duration.
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.ticks) {
            Ok(n) if n > 0 => self.total / n,
            _ => Duration::ZERO,
        }
    }
}

/// Setup phase run by one fixed-point loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Register,
    Configure,
    Finalize,
}

impl Phase {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Phase::Register => "register",
            Phase::Configure => "configure",
            Phase::Finalize => "finalize",
        }
    }

    pub(crate) const fn target(self) -> LifecycleState {
        match self {
            Phase::Register => LifecycleState::Registered,
            Phase::Configure => LifecycleState::Configured,
            Phase::Finalize => LifecycleState::Ready,
        }
    }
}

/// Round-local values shared by every instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RoundEnv {
    pub tick: u64,
    pub eoi: bool,
    pub eoi_counter: u32,
    pub profiling: bool,
}

pub(crate) struct Instance {
    pub name: String,
    pub thread: ThreadAssignment,
    component: Box<dyn Component>,
    lifecycle: Lifecycle,
    pub logger: Logger,
    inbox: Inbox,
    eoi: bool,
    pub profile: InstanceProfile,
}

impl Instance {
    pub fn new(
        name: &str,
        type_name: &str,
        component: Box<dyn Component>,
        thread: ThreadAssignment,
        logger: Logger,
        inbox: Inbox,
    ) -> Self {
        Self {
            name: name.to_string(),
            thread,
            component,
            lifecycle: Lifecycle::new(),
            logger,
            inbox,
            eoi: false,
            profile: InstanceProfile::new(name, type_name),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Ticked at all: not pinned to `Never` and willing to run.
    pub fn is_runnable(&self) -> bool {
        self.thread != ThreadAssignment::Never && self.component.runs()
    }

    pub fn setup_step(&mut self, phase: Phase, store: &LevelStore, external: &ExternalHub) -> Result<Progress> {
        let ctx = SetupContext {
            store,
            external,
            logger: &self.logger,
        };
        let component = self.component.as_mut();
        let lifecycle = &mut self.lifecycle;
        self.logger.in_scope(|| match phase {
            Phase::Register => lifecycle.register(component, &ctx),
            Phase::Configure => lifecycle.configure(component, &ctx),
            Phase::Finalize => lifecycle.finalize(component, &ctx),
        })
    }

    /// Ticks once. Transient errors become outcomes; anything else is returned.
    pub fn tick(&mut self, store: &LevelStore, postbox: &Postbox, env: RoundEnv) -> Result<TickResult> {
        let span = self.logger.span().clone();
        let _entered = span.enter();

        if env.eoi && !self.eoi {
            self.eoi = true;
            tracing::debug!(counter = env.eoi_counter, "entering end of input");
            self.record(TickResult::Success, Duration::ZERO);
            return Ok(TickResult::Success);
        }
        if !env.eoi {
            self.eoi = false;
        }

        for msg in drain(&self.inbox) {
            if !self.component.handle_message(&msg) {
                tracing::debug!(kind = %msg.kind, sender = %msg.sender, "message ignored");
            }
        }

        let started = env.profiling.then(Instant::now);
        let mut ctx = TickContext::new(store, postbox, &self.logger, self.eoi, env.eoi_counter, env.tick);
        let result = match self.component.tick(&mut ctx) {
            Ok(r) => r,
            Err(e) => match TickResult::from_transient(&e) {
                Some(r) => {
                    tracing::trace!(error = %e, "transient tick error");
                    r
                }
                None => return Err(e),
            },
        };
        self.record(result, started.map(|t| t.elapsed()).unwrap_or_default());
        Ok(result)
    }

    fn record(&mut self, result: TickResult, took: Duration) {
        let p = &mut self.profile;
        p.ticks += 1;
        p.total += took;
        p.last = took;
        p.counts[result.index()] += 1;
        p.last_result = result;
    }

    pub fn notify_empty(&mut self) -> bool {
        self.logger.in_scope(|| self.component.notify_empty_tick_loop())
    }

    pub fn pause_event(&mut self) -> bool {
        let accepted = self.logger.in_scope(|| self.component.pause_event());
        if !accepted {
            tracing::info!(instance = %self.name, "pause rejected");
        }
        accepted
    }

    pub fn resume_event(&mut self) {
        self.logger.in_scope(|| self.component.resume_event());
    }
}
