//! Synthetic signal source.
//!
//! Writes `frames` frames (unbounded when 0) of `width` identical elements,
//! `block` frames per tick. The sample at frame `i` is:
//!
//! - `ramp`: `i`
//! - `sine`: `amplitude * sin(2π * frequency * i * period)`
//! - `constant`: `value`
//!
//! A `source.stop` message ends the stream early.

use std::f64::consts::TAU;

use strata_core::{
    Component, ComponentArgs, Error, FieldLayout, HasWriter, LevelConfig, Matrix, Message,
    Result, TickContext, TickResult, Tickable, WriterHandle,
};

/// Recognized parameter keys.
pub const PARAMS: &[&str] = &[
    "frames",
    "width",
    "period",
    "block",
    "waveform",
    "frequency",
    "amplitude",
    "value",
    "writer",
];

/// Shape of the generated signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Frame index.
    Ramp,
    /// Sine at `frequency` Hz.
    Sine {
        /// Frequency in Hz.
        frequency: f64,
        /// Peak amplitude.
        amplitude: f64,
    },
    /// Fixed value.
    Constant(f64),
}

impl Waveform {
    fn sample(self, vidx: i64, period: f64) -> f32 {
        match self {
            Self::Ramp => vidx as f32,
            Self::Sine {
                frequency,
                amplitude,
            } => (amplitude * (TAU * frequency * vidx as f64 * period).sin()) as f32,
            Self::Constant(v) => v as f32,
        }
    }
}

/// Writes a synthetic signal to its level.
pub struct SignalSource {
    writer: WriterHandle,
    waveform: Waveform,
    width: usize,
    period: f64,
    block: usize,
    total: usize,
    written: usize,
    stopped: bool,
}

impl SignalSource {
    /// Creates a source writing `total` frames (0 = unbounded) to `level`.
    pub fn new(owner: &str, level: &str, waveform: Waveform, total: usize) -> Self {
        Self {
            writer: WriterHandle::new(owner, level),
            waveform,
            width: 1,
            period: 0.01,
            block: 1,
            total,
            written: 0,
            stopped: false,
        }
    }

    /// Builds a source from instance parameters.
    pub fn from_args(args: &ComponentArgs) -> Result<Self> {
        let name = args.name.as_str();
        let p = &args.params;
        let waveform = match p.opt_str(name, "waveform")?.as_deref().unwrap_or("ramp") {
            "ramp" => Waveform::Ramp,
            "sine" => Waveform::Sine {
                frequency: p.opt_f64(name, "frequency")?.unwrap_or(1.0),
                amplitude: p.opt_f64(name, "amplitude")?.unwrap_or(1.0),
            },
            "constant" => Waveform::Constant(p.opt_f64(name, "value")?.unwrap_or(0.0)),
            other => {
                return Err(Error::invalid_param(
                    name,
                    "waveform",
                    format!("expected ramp, sine or constant, got '{other}'"),
                ));
            }
        };
        let width = p.opt_usize(name, "width")?.unwrap_or(1);
        if width == 0 {
            return Err(Error::invalid_param(name, "width", "must be at least 1"));
        }
        let period = p.opt_f64(name, "period")?.unwrap_or(0.01);
        if period < 0.0 {
            return Err(Error::invalid_param(name, "period", "must not be negative"));
        }
        Ok(Self {
            writer: WriterHandle::from_params(name, name, p)?,
            waveform,
            width,
            period,
            block: p.opt_usize(name, "block")?.unwrap_or(1).max(1),
            total: p.opt_usize(name, "frames")?.unwrap_or(0),
            written: 0,
            stopped: false,
        })
    }

    /// Sets the frame width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Sets the period in seconds.
    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    /// Sets the frames written per tick.
    pub fn with_block(mut self, block: usize) -> Self {
        self.block = block.max(1);
        self
    }

    /// Frames written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    fn remaining(&self) -> usize {
        if self.stopped {
            0
        } else if self.total == 0 {
            self.block
        } else {
            self.total - self.written
        }
    }
}

impl Tickable for SignalSource {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
        let n = self.remaining().min(self.block);
        if n == 0 {
            return Ok(TickResult::Inactive);
        }
        if !self.writer.check_write(ctx.store(), n) {
            return Ok(TickResult::DestinationNoSpace);
        }
        let period = self.writer.config().period;
        let first = self.writer.write_cursor(ctx.store());
        let mut block = Matrix::zeros(self.width, n);
        for f in 0..n {
            let v = self.waveform.sample(first + f as i64, period);
            block.frame_mut(f).fill(v);
        }
        self.writer.set_next_matrix(ctx.store(), &block)?;
        self.written += n;
        if self.total != 0 && self.written == self.total {
            tracing::debug!(frames = self.written, "source exhausted");
        }
        Ok(TickResult::Success)
    }

    fn handle_message(&mut self, msg: &Message) -> bool {
        if msg.kind != "source.stop" {
            return false;
        }
        tracing::info!(from = %msg.sender, frames = self.written, "source stopped");
        self.stopped = true;
        true
    }
}

impl HasWriter for SignalSource {
    fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    fn writer_mut(&mut self) -> &mut WriterHandle {
        &mut self.writer
    }

    fn configure_writer(&mut self, config: &mut LevelConfig, _input: Option<&LevelConfig>) -> Result<()> {
        config.period = self.period;
        config.blocksize_writer = self.block;
        Ok(())
    }

    fn setup_new_names(&mut self, _input: Option<&FieldLayout>) -> Result<()> {
        let name = self.writer.level_name().to_string();
        self.writer.add_field(name, self.width, 0)
    }
}

impl Component for SignalSource {
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        Some(self)
    }
}
