//! Bridges between a pipeline and the host application.
//!
//! [`ExternalSource`] owns the [`ExternalInput`] of its level: the host
//! pushes frames through
//! [`SchedulerHandle::external_input()`](strata_core::SchedulerHandle::external_input)
//! and signals the end with `end_of_input()`. [`ExternalSink`] reads its
//! input in blocks and hands each block to the callbacks registered on the
//! [`ExternalOutput`] of its input level.

use strata_core::{
    Component, ComponentArgs, Error, ExternalInput, ExternalOutput, FieldLayout, HasReader,
    HasWriter, LevelStore, Progress, ReaderHandle, Result, SetupContext, TickContext, TickResult,
    Tickable, WriterHandle,
};

use crate::{NO_DEFAULT_LEVELS, read_available};

/// Recognized parameter keys of `external_source`.
pub const SOURCE_PARAMS: &[&str] = &["width", "capacity", "block", "writer"];

/// Recognized parameter keys of `external_sink`.
pub const SINK_PARAMS: &[&str] = &["block", "reader"];

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_BLOCK: usize = 64;

// --- source ---

/// Writes frames pushed by the host.
pub struct ExternalSource {
    writer: WriterHandle,
    width: usize,
    capacity: usize,
    block: usize,
    input: Option<ExternalInput>,
    finished: bool,
    stall_reported: bool,
}

impl ExternalSource {
    /// Creates a source for `level` with frames of `width` elements.
    pub fn new(owner: &str, level: &str, width: usize) -> Self {
        Self {
            writer: WriterHandle::new(owner, level),
            width: width.max(1),
            capacity: DEFAULT_CAPACITY,
            block: DEFAULT_BLOCK,
            input: None,
            finished: false,
            stall_reported: false,
        }
    }

    /// Builds a source from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        let width = p.opt_usize(name, "width")?.unwrap_or(1);
        if width == 0 {
            return Err(Error::invalid_param(name, "width", "must be at least 1"));
        }
        Ok(Self {
            writer: WriterHandle::from_params(name, name, p)?,
            width,
            capacity: p.opt_usize(name, "capacity")?.unwrap_or(DEFAULT_CAPACITY).max(1),
            block: p.opt_usize(name, "block")?.unwrap_or(DEFAULT_BLOCK).max(1),
            input: None,
            finished: false,
            stall_reported: false,
        })
    }

    /// Frames the next append may take: a full block when the level's
    /// policy accepts one, otherwise what fits without overwriting.
    fn writable(&self, store: &LevelStore) -> usize {
        if self.writer.check_write(store, self.block) {
            self.block
        } else if self.writer.check_write(store, 1) {
            self.writer.n_free(store).clamp(1, self.block)
        } else {
            0
        }
    }

    /// Sets the queue capacity in frames.
    pub fn with_capacity(mut self, frames: usize) -> Self {
        self.capacity = frames.max(1);
        self
    }
}

impl Tickable for ExternalSource {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        if self.finished {
            return Ok(TickResult::Inactive);
        }
        let Some(input) = &self.input else {
            return Ok(TickResult::Inactive);
        };
        let room = self.writable(ctx.store());
        if room == 0 {
            if ctx.is_eoi() && input.queued() > 0 && !self.stall_reported {
                tracing::warn!(
                    level = %self.writer.level_name(),
                    queued = input.queued(),
                    "level full at end of input; host frames still queued"
                );
                self.stall_reported = true;
            }
            return Ok(TickResult::DestinationNoSpace);
        }
        match input.pop(room) {
            Some(block) => {
                self.writer.set_next_matrix(ctx.store(), &block)?;
                Ok(TickResult::Success)
            }
            None if input.is_drained() => {
                self.writer.set_eoi(ctx.store(), true)?;
                self.finished = true;
                tracing::debug!(level = %self.writer.level_name(), "external input drained");
                Ok(TickResult::Success)
            }
            None => Ok(TickResult::ExtSourceNotAvailable),
        }
    }
}

impl HasWriter for ExternalSource {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }

    fn setup_new_names(&mut self, _input: Option<&FieldLayout>) -> Result<()> {
        let name = self.writer.level_name().to_string();
        self.writer.add_field(name, self.width, 0)
    }
}

impl Component for ExternalSource {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }

    fn on_register(&mut self, ctx: &SetupContext<'_>) -> Result<Progress> {
        self.input = Some(
            ctx.external
                .create_input(self.writer.level_name(), self.width, self.capacity),
        );
        Ok(Progress::Ready)
    }
}

// --- sink ---

/// Delivers its input to host callbacks, one block per tick.
pub struct ExternalSink {
    reader: ReaderHandle,
    block: usize,
    output: Option<ExternalOutput>,
    delivered: u64,
}

impl ExternalSink {
    /// Creates a sink reading `levels`.
    pub fn new(owner: &str, levels: &[&str]) -> Self {
        Self {
            reader: ReaderHandle::new(owner, levels),
            block: DEFAULT_BLOCK,
            output: None,
            delivered: 0,
        }
    }

    /// Builds a sink from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        Ok(Self {
            reader: ReaderHandle::from_params(name, NO_DEFAULT_LEVELS, p)?,
            block: p.opt_usize(name, "block")?.unwrap_or(DEFAULT_BLOCK).max(1),
            output: None,
            delivered: 0,
        })
    }

    /// Name under which the output port is registered: the input level,
    /// or the `;`-joined names for a multi-level input.
    pub fn port_name(&self) -> String {
        self.reader.level_names().collect::<Vec<_>>().join(";")
    }

    /// Frames handed to the callbacks so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl Tickable for ExternalSink {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let Some(block) = read_available(&mut self.reader, ctx.store(), self.block)? else {
            return Ok(TickResult::SourceNotAvailable);
        };
        self.delivered += block.frames() as u64;
        if let Some(out) = &self.output {
            out.deliver(&block);
        }
        Ok(TickResult::Success)
    }
}

impl HasReader for ExternalSink {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }

    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl Component for ExternalSink {
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }

    fn on_register(&mut self, ctx: &SetupContext<'_>) -> Result<Progress> {
        self.output = Some(ctx.external.output(&self.port_name()));
        Ok(Progress::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Params;

    #[test]
    fn source_params() {
        let args = ComponentArgs::new(
            "feed",
            "external_source",
            Params::new()
                .with("width", 2_i64)
                .with("capacity", 16_i64)
                .with("writer", Params::new().with("level", "audio")),
        );
        let src = ExternalSource::from_args(&args).unwrap();
        assert_eq!(src.width, 2);
        assert_eq!(src.capacity, 16);
        assert_eq!(src.block, DEFAULT_BLOCK);
        assert_eq!(src.writer.level_name(), "audio");
    }

    #[test]
    fn zero_width_is_rejected() {
        let args = ComponentArgs::new("feed", "external_source", Params::new().with("width", 0_i64));
        let msg = ExternalSource::from_args(&args).err().unwrap().to_string();
        assert!(msg.contains("width"), "got: {msg}");
    }

    #[test]
    fn sink_port_joins_levels() {
        let sink = ExternalSink::new("out", &["a", "b"]);
        assert_eq!(sink.port_name(), "a;b");
        assert_eq!(ExternalSink::new("out", &["a"]).port_name(), "a");
    }
}
