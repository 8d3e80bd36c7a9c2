//! Lagged difference: `out[i] = in[i] - in[i - lag]`.
//!
//! The reader keeps `lag` frames of history so the earlier frame is still
//! in the buffer. Frames before the start of the stream count as zero.

use strata_core::{
    Component, ComponentArgs, Error, FieldLayout, HasReader, HasWriter, ReaderHandle, Result,
    TickContext, TickResult, Tickable, WriterHandle,
};

use crate::NO_DEFAULT_LEVELS;

/// Recognized parameter keys.
pub const PARAMS: &[&str] = &["lag", "reader", "writer"];

const MAX_FRAMES_PER_TICK: usize = 64;

/// Difference between each frame and the one `lag` frames earlier.
pub struct Delta {
    reader: ReaderHandle,
    writer: WriterHandle,
    lag: usize,
}

impl Delta {
    /// Creates a delta stage.
    pub fn new(owner: &str, input: &str, output: &str, lag: usize) -> Self {
        let lag = lag.max(1);
        let mut reader = ReaderHandle::new(owner, &[input]);
        reader.set_history(lag);
        Self {
            reader,
            writer: WriterHandle::new(owner, output),
            lag,
        }
    }

    /// Builds a delta stage from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        let lag = p.opt_usize(name, "lag")?.unwrap_or(1);
        if lag == 0 {
            return Err(Error::invalid_param(name, "lag", "must be at least 1"));
        }
        let mut reader = ReaderHandle::from_params(name, NO_DEFAULT_LEVELS, p)?;
        reader.set_history(lag);
        Ok(Self {
            reader,
            writer: WriterHandle::from_params(name, name, p)?,
            lag,
        })
    }

    /// The lag in frames.
    pub fn lag(&self) -> usize {
        self.lag
    }
}

impl Tickable for Delta {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let store = ctx.store();
        let mut done = 0;
        while done < MAX_FRAMES_PER_TICK
            && self.writer.check_write(store, 1)
            && self.reader.is_next_frame_read_ok(store)
        {
            let earlier = if self.reader.cursor() >= self.lag as i64 {
                Some(self.reader.get_frame_rel(store, self.lag)?)
            } else {
                None
            };
            let mut frame = self.reader.get_next_frame(store)?;
            if let Some(earlier) = earlier {
                for (v, e) in frame.data.iter_mut().zip(&earlier.data) {
                    *v -= e;
                }
            }
            self.writer.set_next_frame(store, &frame)?;
            done += 1;
        }
        if done > 0 {
            Ok(TickResult::Success)
        } else if !self.writer.check_write(store, 1) {
            Ok(TickResult::DestinationNoSpace)
        } else {
            Ok(TickResult::SourceNotAvailable)
        }
    }
}

impl HasReader for Delta {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }

    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl HasWriter for Delta {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }

    fn setup_new_names(&mut self, input: Option<&FieldLayout>) -> Result<()> {
        let Some(input) = input else {
            return Ok(());
        };
        for field in input.fields() {
            self.writer
                .add_field(format!("d_{}", field.name), field.width, field.arr_offset)?;
        }
        Ok(())
    }
}

impl Component for Delta {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }

    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
}
