//! Round execution and the decision procedure that drives it.
//!
//! # Architecture
//!
//! ```text
//!                drive()  (controller thread)
//!                   │
//!        ┌──────────┴───────────┐
//!   LocalRunner           ThreadedRunner
//!   ticks every           Command::Round ──► worker 0 ─┐
//!   instance in place     Command::Round ──► worker 1 ─┤ Reply::Round(counts)
//!                         ...                          │
//!                         ◄──────── merged RoundCounts ┘
//! ```
//!
//! Both runners return one [`RoundCounts`] snapshot per round, so EOI and
//! termination are decided the same way regardless of threading.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use super::control::{Control, PauseMode};
use super::instance::{Instance, RoundEnv};
use super::{RunStatus, SchedulerConfig};
use crate::component::TickResult;
use crate::error::{Error, Result};
use crate::message::Postbox;
use crate::store::LevelStore;

/// Aggregated outcomes of one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RoundCounts {
    pub counts: [u64; 6],
    /// Instances that reported `DestinationNoSpace`.
    pub dest_full: Vec<String>,
}

impl RoundCounts {
    fn add(&mut self, result: TickResult, name: &str) {
        self.counts[result.index()] += 1;
        if result == TickResult::DestinationNoSpace {
            self.dest_full.push(name.to_string());
        }
    }

    fn merge(&mut self, other: RoundCounts) {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self.dest_full.extend(other.dest_full);
    }

    pub fn successes(&self) -> u64 {
        self.counts[TickResult::Success.index()]
    }

    pub fn external_waits(&self) -> u64 {
        TickResult::ALL
            .iter()
            .filter(|r| r.is_external())
            .map(|r| self.counts[r.index()])
            .sum()
    }
}

/// Executes rounds and broadcasts notifications to every runnable instance.
pub(crate) trait RoundRunner {
    fn round(&mut self, env: RoundEnv) -> Result<RoundCounts>;

    /// Returns `true` if any instance wants another round.
    fn notify_empty(&mut self) -> Result<bool>;

    /// Returns `true` if every instance accepts the pause.
    fn pause_event(&mut self) -> Result<bool>;

    fn resume_event(&mut self) -> Result<()>;
}

// --- group operations, shared by both runners ---

fn tick_group(
    group: &mut [&mut Instance],
    store: &LevelStore,
    postbox: &Postbox,
    env: RoundEnv,
) -> Result<RoundCounts> {
    let mut counts = RoundCounts::default();
    for inst in group.iter_mut() {
        let result = inst.tick(store, postbox, env)?;
        counts.add(result, &inst.name);
    }
    Ok(counts)
}

fn notify_group(group: &mut [&mut Instance]) -> bool {
    group.iter_mut().fold(false, |any, inst| inst.notify_empty() || any)
}

fn pause_group(group: &mut [&mut Instance]) -> bool {
    group.iter_mut().fold(true, |all, inst| inst.pause_event() && all)
}

fn resume_group(group: &mut [&mut Instance]) {
    for inst in group.iter_mut() {
        inst.resume_event();
    }
}

// --- single-threaded ---

pub(crate) struct LocalRunner<'a> {
    pub group: Vec<&'a mut Instance>,
    pub store: &'a LevelStore,
    pub postbox: &'a Postbox,
}

impl RoundRunner for LocalRunner<'_> {
    fn round(&mut self, env: RoundEnv) -> Result<RoundCounts> {
        tick_group(&mut self.group, self.store, self.postbox, env)
    }

    fn notify_empty(&mut self) -> Result<bool> {
        Ok(notify_group(&mut self.group))
    }

    fn pause_event(&mut self) -> Result<bool> {
        Ok(pause_group(&mut self.group))
    }

    fn resume_event(&mut self) -> Result<()> {
        resume_group(&mut self.group);
        Ok(())
    }
}

// --- multi-threaded ---

#[derive(Debug, Clone, Copy)]
enum Command {
    Round(RoundEnv),
    NotifyEmpty,
    Pause,
    Resume,
}

enum Reply {
    Round(Result<RoundCounts>),
    Flag(bool),
    Done,
}

struct WorkerLink {
    commands: Sender<Command>,
    replies: Receiver<Reply>,
}

struct ThreadedRunner {
    workers: Vec<WorkerLink>,
}

impl ThreadedRunner {
    /// Sends `cmd` to every worker, then collects one reply from each in worker order.
    fn broadcast(&self, cmd: Command) -> Result<Vec<Reply>> {
        for (i, w) in self.workers.iter().enumerate() {
            w.commands.send(cmd).map_err(|_| Error::WorkerLost(i))?;
        }
        self.workers
            .iter()
            .enumerate()
            .map(|(i, w)| w.replies.recv().map_err(|_| Error::WorkerLost(i)))
            .collect()
    }

    fn flags(&self, cmd: Command) -> Result<Vec<bool>> {
        self.broadcast(cmd)?
            .into_iter()
            .enumerate()
            .map(|(i, r)| match r {
                Reply::Flag(f) => Ok(f),
                _ => Err(Error::WorkerLost(i)),
            })
            .collect()
    }
}

impl RoundRunner for ThreadedRunner {
    fn round(&mut self, env: RoundEnv) -> Result<RoundCounts> {
        let mut total = RoundCounts::default();
        let mut first_err = None;
        for (i, reply) in self.broadcast(Command::Round(env))?.into_iter().enumerate() {
            match reply {
                Reply::Round(Ok(counts)) => total.merge(counts),
                Reply::Round(Err(e)) => {
                    first_err.get_or_insert(e);
                }
                _ => return Err(Error::WorkerLost(i)),
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    fn notify_empty(&mut self) -> Result<bool> {
        Ok(self.flags(Command::NotifyEmpty)?.into_iter().any(|f| f))
    }

    fn pause_event(&mut self) -> Result<bool> {
        Ok(self.flags(Command::Pause)?.into_iter().all(|f| f))
    }

    fn resume_event(&mut self) -> Result<()> {
        self.broadcast(Command::Resume).map(drop)
    }
}

fn worker_loop(
    mut group: Vec<&mut Instance>,
    store: &LevelStore,
    postbox: &Postbox,
    commands: &Receiver<Command>,
    replies: &Sender<Reply>,
) {
    for cmd in commands {
        let reply = match cmd {
            Command::Round(env) => Reply::Round(tick_group(&mut group, store, postbox, env)),
            Command::NotifyEmpty => Reply::Flag(notify_group(&mut group)),
            Command::Pause => Reply::Flag(pause_group(&mut group)),
            Command::Resume => {
                resume_group(&mut group);
                Reply::Done
            }
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Runs the loop with one scoped worker thread per group.
pub(crate) fn run_threaded(
    groups: Vec<Vec<&mut Instance>>,
    store: &LevelStore,
    postbox: &Postbox,
    env: &LoopEnv<'_>,
) -> Result<LoopOutcome> {
    thread::scope(|scope| {
        let mut workers = Vec::with_capacity(groups.len());
        for (idx, group) in groups.into_iter().enumerate() {
            let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<Command>(1);
            let (reply_tx, reply_rx) = crossbeam_channel::bounded::<Reply>(1);
            thread::Builder::new()
                .name(format!("strata-worker-{idx}"))
                .spawn_scoped(scope, move || {
                    tracing::debug!(worker = idx, instances = group.len(), "worker started");
                    worker_loop(group, store, postbox, &cmd_rx, &reply_tx);
                })
                .map_err(|_| Error::WorkerLost(idx))?;
            workers.push(WorkerLink {
                commands: cmd_tx,
                replies: reply_rx,
            });
        }
        let mut runner = ThreadedRunner { workers };
        let outcome = drive(&mut runner, env);
        // Closing the command channels lets the workers exit before the scope joins them.
        drop(runner);
        outcome
    })
}

// --- decision procedure ---

pub(crate) struct LoopEnv<'a> {
    pub store: &'a LevelStore,
    pub control: &'a Control,
    pub config: &'a SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoopOutcome {
    pub status: RunStatus,
    pub ticks: u64,
    pub eoi_count: u32,
}

/// Handles a pending pause after a round. Returns `true` if the next round
/// is forced and must not be treated as quiescent.
fn check_pause(runner: &mut dyn RoundRunner, ctl: &Control, successes: u64, tick: u64, slice: Duration) -> Result<bool> {
    match ctl.requested() {
        None => Ok(false),
        Some(PauseMode::Immediate) => {
            if runner.pause_event()? {
                tracing::info!(tick, "paused");
                ctl.wait_resumed(slice);
            } else {
                ctl.resume();
            }
            runner.resume_event()?;
            tracing::info!(tick, "resumed");
            Ok(false)
        }
        Some(PauseMode::DrainThenSuspend { timeout }) => {
            if ctl.is_drain_start() {
                ctl.drain_started_at(tick);
                if !runner.pause_event()? {
                    ctl.resume();
                    runner.resume_event()?;
                    return Ok(false);
                }
            }
            let start = ctl.drain_started_at(tick);
            if tick - start > timeout {
                tracing::info!(tick, timeout, "pause cancelled, pipeline did not drain");
                ctl.resume();
                runner.resume_event()?;
                return Ok(false);
            }
            if successes > 0 {
                return Ok(false);
            }
            tracing::info!(tick, "paused after drain");
            ctl.wait_resumed(slice);
            runner.resume_event()?;
            tracing::info!(tick, "resumed");
            Ok(true)
        }
    }
}

/// Runs rounds until completion, abort or the tick limit.
pub(crate) fn drive(runner: &mut dyn RoundRunner, env: &LoopEnv<'_>) -> Result<LoopOutcome> {
    let cfg = env.config;
    let ctl = env.control;
    let mut out = LoopOutcome {
        status: RunStatus::Completed,
        ticks: 0,
        eoi_count: 0,
    };
    let mut eoi = false;
    let mut fresh_iteration = false;

    'run: loop {
        loop {
            if ctl.is_aborted() {
                out.status = RunStatus::Aborted;
                break 'run;
            }
            if let Some(max) = cfg.max_ticks
                && out.ticks >= max
            {
                tracing::info!(max, "tick limit reached");
                break 'run;
            }

            let seen = ctl.signal().generation();
            let counts = runner.round(RoundEnv {
                tick: out.ticks,
                eoi,
                eoi_counter: out.eoi_count,
                profiling: cfg.profiling,
            })?;
            let tick = out.ticks;
            out.ticks += 1;
            let successes = counts.successes();

            if check_pause(runner, ctl, successes, tick, cfg.wait_slice)? || successes > 0 || runner.notify_empty()? {
                fresh_iteration = false;
                continue;
            }
            if counts.external_waits() > 0 {
                ctl.signal().wait_past(seen, ctl.abort_flag(), cfg.wait_slice);
                fresh_iteration = false;
                continue;
            }

            if !counts.dest_full.is_empty() {
                tracing::warn!(
                    instances = %counts.dest_full.join(", "),
                    "quiescent round with full destination levels; check buffer sizes and reader block sizes"
                );
            }
            if fresh_iteration {
                tracing::debug!(tick, "first round of iteration was quiescent");
                break 'run;
            }
            if !eoi {
                eoi = true;
                out.eoi_count += 1;
                env.store.set_global_eoi(true);
                tracing::info!(tick, counter = out.eoi_count, "entering end of input");
                continue;
            }
            break;
        }

        if !cfg.multi_eoi {
            break;
        }
        eoi = false;
        env.store.set_global_eoi(false);
        fresh_iteration = true;
        tracing::info!(ticks = out.ticks, "leaving end of input");
    }

    Ok(out)
}
