//! Sliding-window framer.
//!
//! Reads windows of `length` input frames, advancing by `step`, and writes
//! each window as one output frame of `length * input_width` elements
//! (frame-major). The output period is `step * T`, the output frame length
//! `length * T`.
//!
//! `ignore_missing_begin` is the index of the first window's start. A
//! negative value pre-rolls: frames before index 0 are padded per the
//! reader's `padding` (zero by default), so the first window is centred
//! on frame 0 with `ignore_missing_begin = -length / 2`.

use strata_core::{
    Component, ComponentArgs, Error, FieldLayout, Frame, HasReader, HasWriter, LevelConfig,
    ReaderHandle, Result, TickContext, TickResult, Tickable, WriterHandle,
};

use crate::NO_DEFAULT_LEVELS;

/// Recognized parameter keys.
pub const PARAMS: &[&str] = &[
    "length",
    "step",
    "length_sec",
    "step_sec",
    "ignore_missing_begin",
    "ignore_missing_begin_sec",
    "reader",
    "writer",
];

const MAX_WINDOWS_PER_TICK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowSpec {
    Frames {
        length: usize,
        step: usize,
        begin: i64,
    },
    Seconds {
        length: f64,
        step: f64,
        begin: f64,
    },
}

/// Turns a stream of frames into a stream of windows.
pub struct Framer {
    reader: ReaderHandle,
    writer: WriterHandle,
    spec: WindowSpec,
}

impl Framer {
    /// Creates a framer with a window of `length` frames advancing by `step`.
    pub fn new(owner: &str, input: &str, output: &str, length: usize, step: usize) -> Self {
        Self {
            reader: ReaderHandle::new(owner, &[input]),
            writer: WriterHandle::new(owner, output),
            spec: WindowSpec::Frames {
                length: length.max(1),
                step: step.max(1),
                begin: 0,
            },
        }
    }

    /// Starts the first window at `begin` (negative to pre-roll).
    pub fn with_begin(mut self, begin: i64) -> Self {
        if let WindowSpec::Frames { begin: b, .. } = &mut self.spec {
            *b = begin;
        }
        self
    }

    /// Builds a framer from instance parameters. Frame counts win over
    /// their `_sec` counterparts.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        let spec = match (p.opt_usize(name, "length")?, p.opt_f64(name, "length_sec")?) {
            (Some(length), _) => {
                let step = p.opt_usize(name, "step")?.unwrap_or(length);
                if length == 0 || step == 0 {
                    return Err(Error::invalid_param(name, "length", "length and step must be at least 1"));
                }
                WindowSpec::Frames {
                    length,
                    step,
                    begin: p.opt_i64(name, "ignore_missing_begin")?.unwrap_or(0),
                }
            }
            (None, Some(length)) => {
                let step = p.opt_f64(name, "step_sec")?.unwrap_or(length);
                if length <= 0.0 || step <= 0.0 {
                    return Err(Error::invalid_param(name, "length_sec", "length and step must be positive"));
                }
                WindowSpec::Seconds {
                    length,
                    step,
                    begin: p.opt_f64(name, "ignore_missing_begin_sec")?.unwrap_or(0.0),
                }
            }
            (None, None) => {
                return Err(Error::invalid_param(name, "length", "either length or length_sec is required"));
            }
        };
        Ok(Self {
            reader: ReaderHandle::from_params(name, NO_DEFAULT_LEVELS, p)?,
            writer: WriterHandle::from_params(name, name, p)?,
            spec,
        })
    }
}

impl Tickable for Framer {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let store = ctx.store();
        let out_width = self.writer.width();
        let mut done = 0;
        while done < MAX_WINDOWS_PER_TICK
            && self.writer.check_write(store, 1)
            && self.reader.is_next_matrix_read_ok(store)
        {
            let window = self.reader.get_next_matrix(store)?;
            let mut data = vec![0.0; out_width];
            let n = window.data().len().min(out_width);
            data[..n].copy_from_slice(&window.data()[..n]);
            self.writer.set_next_frame(store, &Frame::new(data))?;
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

impl HasReader for Framer {
    fn reader(&self) -> &ReaderHandle {
        &self.reader
    }

    fn reader_mut(&mut self) -> &mut ReaderHandle {
        &mut self.reader
    }

    fn configure_reader(&mut self, _input: &LevelConfig) -> Result<()> {
        match self.spec {
            WindowSpec::Frames {
                length,
                step,
                begin,
            } => self
                .reader
                .setup_sequential_matrix_reading(step, length, begin),
            WindowSpec::Seconds {
                length,
                step,
                begin,
            } => self
                .reader
                .setup_sequential_matrix_reading_sec(step, length, begin),
        }
        Ok(())
    }
}

impl HasWriter for Framer {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }

    fn configure_writer(&mut self, config: &mut LevelConfig, input: Option<&LevelConfig>) -> Result<()> {
        let step = self.reader.step();
        if step == 0 {
            return Err(Error::invalid_param(
                self.writer.level_name(),
                "step_sec",
                "resolves to zero frames at the input period",
            ));
        }
        if let Some(input) = input {
            config.period = input.period * step as f64;
            config.frame_size_sec = input.period * self.reader.length() as f64;
        }
        Ok(())
    }

    fn setup_new_names(&mut self, input: Option<&FieldLayout>) -> Result<()> {
        let width = input.map(FieldLayout::width).unwrap_or(0) * self.reader.length();
        self.writer.add_field("window", width, 0)
    }
}

impl Component for Framer {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }

    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        Some(self)
    }
}
