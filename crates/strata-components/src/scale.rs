//! `out = in * gain + offset`, frame by frame.
//!
//! The input may span several levels; they are read as one concatenated
//! frame and the output carries the same field names.

use strata_core::{
    Component, ComponentArgs, FieldLayout, HasReader, HasWriter, ReaderHandle, Result,
    TickContext, TickResult, Tickable, WriterHandle,
};

use crate::NO_DEFAULT_LEVELS;

/// Recognized parameter keys.
pub const PARAMS: &[&str] = &["gain", "offset", "reader", "writer"];

/// Frames handled per tick at most.
const MAX_FRAMES_PER_TICK: usize = 64;

/// Affine map applied to every element.
pub struct Scale {
    reader: ReaderHandle,
    writer: WriterHandle,
    gain: f32,
    offset: f32,
}

impl Scale {
    /// Creates a scale stage reading `levels` and writing `output`.
    pub fn new(owner: &str, levels: &[&str], output: &str, gain: f32, offset: f32) -> Self {
        Self {
            reader: ReaderHandle::new(owner, levels),
            writer: WriterHandle::new(owner, output),
            gain,
            offset,
        }
    }

    /// Builds a scale stage from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        Ok(Self {
            reader: ReaderHandle::from_params(name, NO_DEFAULT_LEVELS, p)?,
            writer: WriterHandle::from_params(name, name, p)?,
            gain: p.opt_f64(name, "gain")?.unwrap_or(1.0) as f32,
            offset: p.opt_f64(name, "offset")?.unwrap_or(0.0) as f32,
        })
    }
}

impl Tickable for Scale {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let store = ctx.store();
        let mut done = 0;
        while done < MAX_FRAMES_PER_TICK {
            if !self.writer.check_write(store, 1) {
                break;
            }
            if !self.reader.is_next_frame_read_ok(store) {
                break;
            }
            let mut frame = self.reader.get_next_frame(store)?;
            for v in &mut frame.data {
                *v = *v * self.gain + self.offset;
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

impl HasReader for Scale {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }

    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }
}

impl HasWriter for Scale {
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
                .add_field(field.name.clone(), field.width, field.arr_offset)?;
        }
        Ok(())
    }
}

impl Component for Scale {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }

    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
}
