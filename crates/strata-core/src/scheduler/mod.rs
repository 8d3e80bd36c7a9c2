//! Owns component instances, sets them up and runs the tick loop.
//!
//! # Architecture
//!
//! ```text
//! add_instance ──► setup() ──────────────────────────► run() ──► RunReport
//!                  register  ┐ fixed-point passes        │
//!                  configure ┤ over the pending set      ├─ LocalRunner (1 group)
//!                  finalize  ┘                           └─ scoped workers (N groups)
//! ```
//!
//! Setup is a fixed-point loop per phase: every pending instance is stepped
//! once per pass; those answering [`Progress::Retry`] stay pending. A phase
//! that does not converge within the pass cap fails with
//! [`Error::NotConverged`] naming each pending instance and its reason.
//!
//! The tick loop repeats rounds until a quiescent round happens twice, once
//! to enter end of input (EOI) and once after everything has drained.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut sched = Scheduler::new(SchedulerConfig::default().with_threads(2));
//! sched.add_instance(&registry, "src", "signal_source", params, ThreadAssignment::Default)?;
//! sched.setup()?;
//! let handle = sched.handle();
//! ctrlc::set_handler(move || handle.request_abort())?;
//! let report = sched.run()?;
//! ```

mod control;
mod instance;
mod runner;

pub use control::{PauseMode, SchedulerHandle};
pub use instance::{InstanceProfile, ThreadAssignment};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::component::{Component, Progress};
use crate::error::{Error, Result};
use crate::external::{DataSignal, ExternalHub};
use crate::level::LevelStatus;
use crate::logger::Logger;
use crate::message::Postbox;
use crate::params::Params;
use crate::registry::{ComponentArgs, ComponentRegistry};
use crate::store::LevelStore;
use control::Control;
use instance::{Instance, Phase};
use runner::{LocalRunner, LoopEnv, drive, run_threaded};

/// Default slice for blocking waits; abort is re-checked this often.
pub const DEFAULT_WAIT_SLICE: Duration = Duration::from_millis(20);

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Worker threads. `1` runs on the calling thread; `0` gives every instance its own thread.
    pub threads: usize,
    /// Stop after this many rounds.
    pub max_ticks: Option<u64>,
    /// Pass cap per setup phase; defaults to `max(4, instances)`.
    pub max_passes: Option<usize>,
    /// Re-run after each EOI drain until an iteration starts quiescent.
    pub multi_eoi: bool,
    /// Measure tick durations.
    pub profiling: bool,
    /// Granularity of blocking waits.
    pub wait_slice: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_ticks: None,
            max_passes: None,
            multi_eoi: false,
            profiling: false,
            wait_slice: DEFAULT_WAIT_SLICE,
        }
    }
}

impl SchedulerConfig {
    /// Sets the thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Bounds the run.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Sets the setup pass cap.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// Enables repeated EOI iterations.
    pub fn with_multi_eoi(mut self, multi_eoi: bool) -> Self {
        self.multi_eoi = multi_eoi;
        self
    }

    /// Enables tick timing.
    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Drained after EOI, or reached the tick limit.
    Completed,
    /// Stopped by [`SchedulerHandle::request_abort()`].
    Aborted,
}

impl RunStatus {
    /// Lowercase name for reports.
    pub const fn name(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended.
    pub status: RunStatus,
    /// Rounds executed.
    pub ticks: u64,
    /// Times EOI was entered.
    pub eoi_count: u32,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Per-instance statistics in creation order.
    pub profiles: Vec<InstanceProfile>,
    /// Final state of every level.
    pub levels: Vec<LevelStatus>,
}

impl RunReport {
    /// Statistics of one instance.
    pub fn profile(&self, name: &str) -> Option<&InstanceProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Final state of one level.
    pub fn level(&self, name: &str) -> Option<&LevelStatus> {
        self.levels.iter().find(|l| l.name == name)
    }
}

/// Owns the level store, the instances and the run control block.
pub struct Scheduler {
    config: SchedulerConfig,
    store: LevelStore,
    postbox: Arc<Postbox>,
    hub: Arc<ExternalHub>,
    control: Arc<Control>,
    instances: Vec<Instance>,
    set_up: bool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("instances", &self.instance_names())
            .field("levels", &self.store.level_count())
            .field("set_up", &self.set_up)
            .finish()
    }
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        let signal = Arc::new(DataSignal::new());
        Self {
            config,
            store: LevelStore::new(),
            postbox: Arc::new(Postbox::new()),
            hub: Arc::new(ExternalHub::new(Arc::clone(&signal))),
            control: Arc::new(Control::new(signal)),
            instances: Vec::new(),
            set_up: false,
        }
    }

    /// Settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The level store.
    pub fn store(&self) -> &LevelStore {
        &self.store
    }

    /// A remote control usable from other threads.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            control: Arc::clone(&self.control),
            hub: Arc::clone(&self.hub),
            postbox: Arc::clone(&self.postbox),
        }
    }

    /// Instance names in creation order.
    pub fn instance_names(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.name.as_str()).collect()
    }

    /// Number of instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` once [`setup()`](Self::setup) succeeded.
    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    /// Creates an instance of `type_name` through `registry`.
    pub fn add_instance(
        &mut self,
        registry: &ComponentRegistry,
        name: &str,
        type_name: &str,
        params: Params,
        thread: ThreadAssignment,
    ) -> Result<()> {
        self.check_unique(name)?;
        let logger = Logger::new(name);
        let args = ComponentArgs {
            name: name.to_string(),
            type_name: type_name.to_string(),
            params,
            logger: logger.clone(),
        };
        let component = logger.in_scope(|| registry.create(&args))?;
        self.push(name, type_name, component, thread, logger);
        Ok(())
    }

    /// Adds an already constructed component.
    pub fn add_component(
        &mut self,
        name: &str,
        type_name: &str,
        component: Box<dyn Component>,
        thread: ThreadAssignment,
    ) -> Result<()> {
        self.check_unique(name)?;
        self.push(name, type_name, component, thread, Logger::new(name));
        Ok(())
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.instances.iter().any(|i| i.name == name) {
            return Err(Error::DuplicateInstance(name.to_string()));
        }
        Ok(())
    }

    fn push(
        &mut self,
        name: &str,
        type_name: &str,
        component: Box<dyn Component>,
        thread: ThreadAssignment,
        logger: Logger,
    ) {
        let inbox = self.postbox.register(name);
        tracing::debug!(instance = name, type_name, ?thread, "instance created");
        self.instances
            .push(Instance::new(name, type_name, component, thread, logger, inbox));
        self.set_up = false;
    }

    /// Registers, configures and finalizes every instance.
    pub fn setup(&mut self) -> Result<()> {
        for phase in [Phase::Register, Phase::Configure, Phase::Finalize] {
            self.run_phase(phase)?;
        }
        for (level, readers) in self.store.unresolved_claims() {
            tracing::warn!(level = %level, readers = %readers.join(", "), "read request for a level nobody writes");
        }
        self.set_up = true;
        tracing::info!(
            instances = self.instances.len(),
            levels = self.store.level_count(),
            "setup complete"
        );
        Ok(())
    }

    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        let cap = self
            .config
            .max_passes
            .unwrap_or_else(|| self.instances.len().max(4));
        let mut pending: Vec<usize> = (0..self.instances.len())
            .filter(|&i| self.instances[i].state() < phase.target())
            .collect();
        let mut waiting: Vec<(usize, String)> = Vec::new();
        let mut passes = 0;

        while !pending.is_empty() {
            if passes >= cap {
                return Err(Error::NotConverged {
                    phase: phase.name(),
                    passes,
                    pending: waiting
                        .into_iter()
                        .map(|(i, reason)| (self.instances[i].name.clone(), reason))
                        .collect(),
                });
            }
            passes += 1;
            waiting.clear();
            for &i in &pending {
                let inst = &mut self.instances[i];
                match inst.setup_step(phase, &self.store, &self.hub)? {
                    Progress::Ready => {}
                    Progress::Retry(reason) => {
                        tracing::debug!(instance = %inst.name, phase = phase.name(), pass = passes, %reason, "retry");
                        waiting.push((i, reason));
                    }
                }
            }
            pending = waiting.iter().map(|(i, _)| *i).collect();
        }
        tracing::debug!(phase = phase.name(), passes, "phase converged");
        Ok(())
    }

    /// Groups of runnable instance indices, one per worker.
    fn partition(&self) -> Vec<Vec<usize>> {
        let runnable = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.is_runnable());
        let threads = self.config.threads;
        if threads == 0 {
            return runnable.map(|(i, _)| vec![i]).collect();
        }
        let mut groups = vec![Vec::new(); threads];
        for (i, inst) in runnable {
            let g = match inst.thread {
                ThreadAssignment::Group(n) => n % threads,
                _ => 0,
            };
            groups[g].push(i);
        }
        groups.retain(|g| !g.is_empty());
        groups
    }

    /// Runs the tick loop until completion, abort or the tick limit.
    ///
    /// An abort requested before `run` is honoured immediately.
    pub fn run(&mut self) -> Result<RunReport> {
        if !self.set_up {
            return Err(Error::NotSetUp("scheduler: run() before setup()".into()));
        }
        let started = Instant::now();
        self.store.set_global_eoi(false);
        let partition = self.partition();
        tracing::info!(
            instances = self.instances.len(),
            groups = partition.len(),
            "tick loop started"
        );

        let store = &self.store;
        let postbox: &Postbox = &self.postbox;
        let env = LoopEnv {
            store,
            control: &self.control,
            config: &self.config,
        };
        let mut groups = split_groups(&mut self.instances, &partition);
        let outcome = if groups.len() <= 1 {
            let mut runner = LocalRunner {
                group: groups.pop().unwrap_or_default(),
                store,
                postbox,
            };
            drive(&mut runner, &env)?
        } else {
            run_threaded(groups, store, postbox, &env)?
        };

        let report = RunReport {
            status: outcome.status,
            ticks: outcome.ticks,
            eoi_count: outcome.eoi_count,
            elapsed: started.elapsed(),
            profiles: self.profiles(),
            levels: self.store.status(),
        };
        tracing::info!(
            status = report.status.name(),
            ticks = report.ticks,
            eoi = report.eoi_count,
            elapsed_ms = report.elapsed.as_millis(),
            "run finished"
        );
        Ok(report)
    }

    /// Current per-instance statistics.
    pub fn profiles(&self) -> Vec<InstanceProfile> {
        self.instances.iter().map(|i| i.profile.clone()).collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        while let Some(inst) = self.instances.pop() {
            drop(inst);
        }
    }
}

fn split_groups<'a>(instances: &'a mut [Instance], partition: &[Vec<usize>]) -> Vec<Vec<&'a mut Instance>> {
    let mut slots: Vec<Option<&'a mut Instance>> = instances.iter_mut().map(Some).collect();
    partition
        .iter()
        .map(|g| g.iter().filter_map(|&i| slots[i].take()).collect())
        .collect()
}
