//! Level configuration.
//!
//! [`LevelConfig`] is what a writer hands to
//! [`LevelStore::add_level()`](crate::LevelStore::add_level). It is built from
//! the writer's parameter table (see [`WriterOptions`]) merged with whatever
//! the component derives from its inputs in
//! [`HasWriter::configure_writer()`](crate::HasWriter::configure_writer).

use crate::error::{Error, Result};
use crate::frame::FieldLayout;
use crate::params::{ParamValue, Params};

/// Default ring buffer depth in frames.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Writer behaviour when a ring level is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoHang {
    /// Never overwrite unread frames; the writer gets `NoSpace`.
    Block,
    /// Overwrite freely while no reader is registered, otherwise block.
    #[default]
    DiscardWithoutReaders,
    /// Always overwrite the oldest frame, dropping it for slow readers.
    Overwrite,
}

impl NoHang {
    /// Parses `0`/`1`/`2` or `"block"`/`"discard"`/`"overwrite"`.
    pub fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(0) => Some(Self::Block),
            ParamValue::Int(1) => Some(Self::DiscardWithoutReaders),
            ParamValue::Int(2) => Some(Self::Overwrite),
            ParamValue::Str(s) => match s.as_str() {
                "block" => Some(Self::Block),
                "discard" => Some(Self::DiscardWithoutReaders),
                "overwrite" => Some(Self::Overwrite),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Configuration of one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelConfig {
    /// Level name.
    pub name: String,
    /// Frame period in seconds; 0 means aperiodic.
    pub period: f64,
    /// Length of one frame in seconds (defaults to `period`).
    pub frame_size_sec: f64,
    /// Buffer depth in frames.
    pub buffer_size: usize,
    /// Buffer depth in seconds; overrides `buffer_size` when the period is known.
    pub buffer_size_sec: Option<f64>,
    /// Frames written per writer call.
    pub blocksize_writer: usize,
    /// Largest block any reader requested.
    pub blocksize_reader: usize,
    /// Ring buffer (`true`) or linear buffer that only grows.
    pub ring: bool,
    /// Grow instead of applying backpressure.
    pub grow_dyn: bool,
    /// Full-buffer policy.
    pub no_hang: NoHang,
    /// Skip storing per-frame time metadata; it is reconstructed from the index.
    pub no_time_meta: bool,
    /// Field layout, filled in before fixation.
    pub fields: FieldLayout,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl LevelConfig {
    /// Creates a config with defaults for the named level.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            period: 0.0,
            frame_size_sec: 0.0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_size_sec: None,
            blocksize_writer: 1,
            blocksize_reader: 1,
            ring: true,
            grow_dyn: false,
            no_hang: NoHang::default(),
            no_time_meta: false,
            fields: FieldLayout::new(),
        }
    }

    /// Sets the period.
    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    /// Sets the buffer depth in frames.
    pub fn with_buffer_size(mut self, frames: usize) -> Self {
        self.buffer_size = frames;
        self
    }

    /// Enables or disables dynamic growth.
    pub fn with_grow_dyn(mut self, grow: bool) -> Self {
        self.grow_dyn = grow;
        self
    }

    /// Sets the full-buffer policy.
    pub fn with_no_hang(mut self, no_hang: NoHang) -> Self {
        self.no_hang = no_hang;
        self
    }

    /// Sets the writer blocksize.
    pub fn with_blocksize_writer(mut self, frames: usize) -> Self {
        self.blocksize_writer = frames;
        self
    }

    /// Element count per frame.
    pub fn width(&self) -> usize {
        self.fields.width()
    }

    /// Clamps values into their valid ranges.
    pub fn sanitize(&mut self) {
        if self.period < 0.0 || !self.period.is_finite() {
            self.period = 0.0;
        }
        if self.frame_size_sec <= 0.0 || !self.frame_size_sec.is_finite() {
            self.frame_size_sec = self.period;
        }
        self.buffer_size = self.buffer_size.max(2);
        self.blocksize_writer = self.blocksize_writer.max(1);
        self.blocksize_reader = self.blocksize_reader.max(1);
    }

    /// Buffer depth after resolving `buffer_size_sec` against the period.
    pub fn resolved_buffer_size(&self) -> usize {
        match self.buffer_size_sec {
            Some(sec) if self.period > 0.0 && sec > 0.0 => {
                (sec / self.period).ceil() as usize
            }
            _ => self.buffer_size,
        }
    }
}

/// Converts seconds to a frame index for period `period` (`round(sec / T)`).
///
/// Aperiodic levels treat seconds as frames.
pub fn sec_to_vidx(period: f64, sec: f64) -> i64 {
    if period > 0.0 {
        (sec / period).round() as i64
    } else {
        sec.round() as i64
    }
}

/// Converts a frame index to seconds (`vidx * T`).
pub fn vidx_to_sec(period: f64, vidx: i64) -> f64 {
    vidx as f64 * period
}

/// User-set writer options from a `writer` parameter table.
///
/// Each `Some` value was set explicitly and wins over values derived by the
/// component unless the component calls
/// [`WriterHandle::set_config()`](crate::WriterHandle::set_config) with
/// `overwrite = true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterOptions {
    /// Output level name.
    pub level: Option<String>,
    /// Depth in frames.
    pub buffer_size: Option<usize>,
    /// Depth in seconds.
    pub buffer_size_sec: Option<f64>,
    /// Writer blocksize in frames.
    pub blocksize: Option<usize>,
    /// Writer blocksize in seconds.
    pub blocksize_sec: Option<f64>,
    /// Period in seconds.
    pub period: Option<f64>,
    /// Frame length in seconds.
    pub frame_size_sec: Option<f64>,
    /// Ring or linear buffer.
    pub ring: Option<bool>,
    /// Dynamic growth.
    pub grow_dyn: Option<bool>,
    /// Full-buffer policy.
    pub no_hang: Option<NoHang>,
    /// Skip time metadata.
    pub no_time_meta: Option<bool>,
}

impl WriterOptions {
    /// Parses a `writer` table. `owner` names the component in errors.
    pub fn from_params(owner: &str, params: &Params) -> Result<Self> {
        let no_hang = match params.get("no_hang") {
            None => None,
            Some(v) => Some(NoHang::from_param(v).ok_or_else(|| {
                Error::invalid_param(owner, "writer.no_hang", "expected 0, 1, 2, block, discard or overwrite")
            })?),
        };
        let opts = Self {
            level: params.opt_str(owner, "level")?,
            buffer_size: params.opt_usize(owner, "buffer_size")?,
            buffer_size_sec: params.opt_f64(owner, "buffer_size_sec")?,
            blocksize: params.opt_usize(owner, "blocksize")?,
            blocksize_sec: params.opt_f64(owner, "blocksize_sec")?,
            period: params.opt_f64(owner, "period")?,
            frame_size_sec: params.opt_f64(owner, "frame_size_sec")?,
            ring: params.opt_bool(owner, "ring")?,
            grow_dyn: params.opt_bool(owner, "grow_dyn")?,
            no_hang,
            no_time_meta: params.opt_bool(owner, "no_time_meta")?,
        };
        if let Some(p) = opts.period
            && p < 0.0
        {
            return Err(Error::invalid_param(owner, "writer.period", "must not be negative"));
        }
        Ok(opts)
    }

    /// Applies every explicitly set option onto `cfg`.
    pub fn apply(&self, cfg: &mut LevelConfig) {
        if let Some(level) = &self.level {
            cfg.name.clone_from(level);
        }
        if let Some(v) = self.period {
            cfg.period = v;
        }
        if let Some(v) = self.frame_size_sec {
            cfg.frame_size_sec = v;
        }
        if let Some(v) = self.buffer_size {
            cfg.buffer_size = v;
        }
        if let Some(v) = self.buffer_size_sec {
            cfg.buffer_size_sec = Some(v);
        }
        if let Some(v) = self.blocksize {
            cfg.blocksize_writer = v;
        }
        if let Some(sec) = self.blocksize_sec {
            cfg.blocksize_writer = if cfg.period > 0.0 {
                (sec / cfg.period).ceil() as usize
            } else {
                sec.ceil() as usize
            };
        }
        if let Some(v) = self.ring {
            cfg.ring = v;
        }
        if let Some(v) = self.grow_dyn {
            cfg.grow_dyn = v;
        }
        if let Some(v) = self.no_hang {
            cfg.no_hang = v;
        }
        if let Some(v) = self.no_time_meta {
            cfg.no_time_meta = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps() {
        let mut cfg = LevelConfig::new("a").with_buffer_size(0).with_period(-1.0);
        cfg.blocksize_writer = 0;
        cfg.sanitize();
        assert_eq!(cfg.buffer_size, 2);
        assert_eq!(cfg.period, 0.0);
        assert_eq!(cfg.blocksize_writer, 1);
    }

    #[test]
    fn frame_size_defaults_to_period() {
        let mut cfg = LevelConfig::new("a").with_period(0.01);
        cfg.sanitize();
        assert_eq!(cfg.frame_size_sec, 0.01);
    }

    #[test]
    fn buffer_size_sec_resolves_with_ceil() {
        let mut cfg = LevelConfig::new("a").with_period(0.01);
        cfg.buffer_size_sec = Some(0.255);
        assert_eq!(cfg.resolved_buffer_size(), 26);
        cfg.period = 0.0;
        assert_eq!(cfg.resolved_buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn time_conversions() {
        assert_eq!(sec_to_vidx(0.01, 0.254), 25);
        assert_eq!(sec_to_vidx(0.0, 3.4), 3);
        assert!((vidx_to_sec(0.01, 25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn writer_options_parse_and_apply() {
        let mut p = Params::new();
        p.insert("level", "wave");
        p.insert("buffer_size", 5_i64);
        p.insert("no_hang", "overwrite");
        p.insert("grow_dyn", true);
        let opts = WriterOptions::from_params("src", &p).unwrap();
        let mut cfg = LevelConfig::new("ignored");
        opts.apply(&mut cfg);
        assert_eq!(cfg.name, "wave");
        assert_eq!(cfg.buffer_size, 5);
        assert_eq!(cfg.no_hang, NoHang::Overwrite);
        assert!(cfg.grow_dyn);
    }

    #[test]
    fn writer_options_reject_bad_no_hang() {
        let mut p = Params::new();
        p.insert("no_hang", 7_i64);
        let err = WriterOptions::from_params("src", &p).unwrap_err();
        assert!(matches!(err, Error::InvalidParam { .. }));
    }

    #[test]
    fn writer_options_reject_negative_buffer() {
        let mut p = Params::new();
        p.insert("buffer_size", -3_i64);
        assert!(WriterOptions::from_params("src", &p).is_err());
    }
}
