//! Frame counter.
//!
//! Consumes its input, logs progress every `every` frames and, once the
//! pipeline is at end of input and the input is drained, logs the total and
//! sends a `monitor.count` message (`ints[0]` = frames seen) to the
//! instances listed in `notify`.

use strata_core::{
    Component, ComponentArgs, HasReader, Message, ReaderHandle, Result, TickContext, TickResult,
    Tickable,
};

use crate::{NO_DEFAULT_LEVELS, read_available};

/// Recognized parameter keys.
pub const PARAMS: &[&str] = &["every", "notify", "reader"];

/// Message type sent at end of input.
pub const COUNT_MESSAGE: &str = "monitor.count";

const MAX_FRAMES_PER_TICK: usize = 1024;

/// Counts the frames of its input.
pub struct Monitor {
    reader: ReaderHandle,
    every: u64,
    notify: Option<String>,
    count: u64,
    next_log: u64,
    reported_eoi: u32,
}

impl Monitor {
    /// Creates a monitor reading `levels`.
    pub fn new(owner: &str, levels: &[&str]) -> Self {
        Self {
            reader: ReaderHandle::new(owner, levels),
            every: 0,
            notify: None,
            count: 0,
            next_log: 0,
            reported_eoi: 0,
        }
    }

    /// Builds a monitor from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        let every = p.opt_usize(name, "every")?.unwrap_or(0) as u64;
        let notify = p
            .opt_str_list(name, "notify")?
            .filter(|l| !l.is_empty())
            .map(|l| l.join(","));
        Ok(Self {
            reader: ReaderHandle::from_params(name, NO_DEFAULT_LEVELS, p)?,
            every,
            notify,
            count: 0,
            next_log: every,
            reported_eoi: 0,
        })
    }

    /// Frames counted so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    fn report(&mut self, ctx: &TickContext<'_>) {
        self.reported_eoi = ctx.eoi_counter();
        tracing::info!(frames = self.count, "end of input");
        if let Some(recipients) = &self.notify {
            let msg = Message::new(COUNT_MESSAGE)
                .with_name(ctx.name())
                .with_int(0, self.count as i64);
            let reached = ctx.send_message(recipients, msg);
            tracing::debug!(recipients = %recipients, reached, "count sent");
        }
    }
}

impl Tickable for Monitor {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if let Some(block) = read_available(&mut self.reader, ctx.store(), MAX_FRAMES_PER_TICK)? {
            self.count += block.frames() as u64;
            if self.every > 0 && self.count >= self.next_log {
                tracing::info!(frames = self.count, "progress");
                self.next_log = (self.count / self.every + 1) * self.every;
            }
            return Ok(TickResult::Success);
        }
        if ctx.is_eoi() && self.reported_eoi < ctx.eoi_counter() {
            self.report(ctx);
            return Ok(TickResult::Success);
        }
        Ok(TickResult::SourceNotAvailable)
    }
}

impl HasReader for Monitor {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }

    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl Component for Monitor {
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Params;

    #[test]
    fn notify_list_is_joined() {
        let args = ComponentArgs::new(
            "mon",
            "monitor",
            Params::new()
                .with("every", 100_i64)
                .with("notify", "a; b")
                .with("reader", Params::new().with("levels", "src")),
        );
        let m = Monitor::from_args(&args).unwrap();
        assert_eq!(m.every, 100);
        assert_eq!(m.next_log, 100);
        assert_eq!(m.notify.as_deref(), Some("a,b"));
        assert_eq!(m.count(), 0);
    }

    #[test]
    fn empty_notify_means_none() {
        let args = ComponentArgs::new(
            "mon",
            "monitor",
            Params::new()
                .with("notify", "")
                .with("reader", Params::new().with("levels", "src")),
        );
        assert!(Monitor::from_args(&args).unwrap().notify.is_none());
    }
}
