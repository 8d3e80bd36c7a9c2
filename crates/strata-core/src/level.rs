//! A single level: ring (or linear) frame storage plus cursor bookkeeping.
//!
//! All indices are absolute (`vidx`), never wrapped. A ring level maps `vidx`
//! to slot `vidx mod depth`; a linear level maps it to slot `vidx` and can only
//! grow. The writer owns `cur_w`; every reader owns one read cursor. The global
//! read cursor is the minimum of the reader cursors, which is what bounds the
//! free space of a ring:
//!
//! ```text
//! free = depth - (cur_w - min(read_cursors))
//! ```
//!
//! `LevelState` is always accessed under the level mutex held by
//! [`LevelStore`](crate::LevelStore), so each method here sees a consistent
//! snapshot and a frame is fully copied before `cur_w` moves past it.

use parking_lot::Mutex;

use crate::config::{LevelConfig, NoHang};
use crate::error::{Error, Result};
use crate::frame::{FieldMeta, Frame, Matrix, Padding, Sample, TimeMeta};

/// Index of a reader slot on one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(pub(crate) usize);

impl ReaderId {
    /// Raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Snapshot of a level's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelStatus {
    /// Level name.
    pub name: String,
    /// Writing component.
    pub writer: String,
    /// Number of registered readers.
    pub readers: usize,
    /// Minimum read cursor.
    pub cur_r: i64,
    /// Write cursor.
    pub cur_w: i64,
    /// Frames available to the slowest reader.
    pub n_avail: usize,
    /// Free slots.
    pub n_free: usize,
    /// Buffer depth.
    pub depth: usize,
    /// Element count per frame.
    pub width: usize,
    /// Frames overwritten before every reader saw them.
    pub dropped: u64,
}

pub(crate) struct Level {
    pub(crate) name: String,
    pub(crate) state: Mutex<LevelState>,
}

impl Level {
    pub(crate) fn new(config: LevelConfig, writer: String, readers: Vec<String>) -> Self {
        let name = config.name.clone();
        Self {
            name,
            state: Mutex::new(LevelState::new(config, writer, readers)),
        }
    }
}

pub(crate) struct LevelState {
    pub(crate) config: LevelConfig,
    pub(crate) fixated: bool,
    pub(crate) writer: String,
    pub(crate) readers: Vec<String>,
    read_cursors: Vec<i64>,
    /// Stand-in for the read cursor while no reader is registered.
    base_r: i64,
    pub(crate) cur_w: i64,
    pub(crate) local_eoi: bool,
    depth: usize,
    width: usize,
    data: Vec<Sample>,
    time: Vec<TimeMeta>,
    dropped: u64,
}

impl LevelState {
    fn new(config: LevelConfig, writer: String, readers: Vec<String>) -> Self {
        let n = readers.len();
        Self {
            config,
            fixated: false,
            writer,
            readers,
            read_cursors: vec![0; n],
            base_r: 0,
            cur_w: 0,
            local_eoi: false,
            depth: 0,
            width: 0,
            data: Vec::new(),
            time: Vec::new(),
            dropped: 0,
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    // --- setup ---

    pub(crate) fn add_reader(&mut self, reader: &str) -> Result<ReaderId> {
        if let Some(pos) = self.readers.iter().position(|r| r == reader) {
            return Ok(ReaderId(pos));
        }
        if self.fixated {
            return Err(Error::ReaderAfterFixation {
                level: self.name().to_string(),
                reader: reader.to_string(),
            });
        }
        self.readers.push(reader.to_string());
        self.read_cursors.push(0);
        Ok(ReaderId(self.readers.len() - 1))
    }

    pub(crate) fn add_field(&mut self, field: FieldMeta) -> Result<()> {
        if self.fixated {
            return Err(Error::FieldsFixated(self.name().to_string()));
        }
        self.config.fields.push(field);
        Ok(())
    }

    pub(crate) fn raise_blocksize_reader(&mut self, frames: usize) -> Result<()> {
        if frames <= self.config.blocksize_reader {
            return Ok(());
        }
        if self.fixated {
            return Err(Error::BlocksizeFixed {
                level: self.name().to_string(),
                requested: frames,
                committed: self.config.blocksize_reader,
            });
        }
        self.config.blocksize_reader = frames;
        Ok(())
    }

    /// Locks the layout, computes the final depth and allocates storage.
    pub(crate) fn fixate(&mut self) -> Result<()> {
        if self.fixated {
            return Ok(());
        }
        self.config.sanitize();
        let width = self.config.width();
        if width == 0 {
            return Err(Error::ZeroWidth(self.name().to_string()));
        }
        let bsw = self.config.blocksize_writer;
        let bsr = self.config.blocksize_reader;
        let mut depth = self.config.resolved_buffer_size().max(2);
        if bsr <= bsw {
            depth = depth.max(2 * bsw + 1);
        } else {
            depth = depth.max(bsr + 2 * bsw);
        }
        self.config.buffer_size = depth;
        self.width = width;
        self.allocate(depth)?;
        self.depth = depth;
        self.fixated = true;

        tracing::debug!(
            level = %self.config.name,
            width,
            depth,
            period = self.config.period,
            readers = self.readers.len(),
            "level fixated"
        );
        if self.readers.is_empty() {
            tracing::warn!(level = %self.config.name, writer = %self.writer, "dead-end level: no reader registered");
        }
        Ok(())
    }

    fn allocate(&mut self, depth: usize) -> Result<()> {
        let grow_err = || Error::GrowFailed {
            level: self.config.name.clone(),
            frames: depth,
        };
        let mut data = Vec::new();
        data.try_reserve_exact(depth * self.width)
            .map_err(|_| grow_err())?;
        data.resize(depth * self.width, 0.0);
        let mut time = Vec::new();
        if !self.config.no_time_meta {
            time.try_reserve_exact(depth).map_err(|_| grow_err())?;
            time.resize(depth, TimeMeta::default());
        }
        self.data = data;
        self.time = time;
        Ok(())
    }

    /// Reallocates to `new_depth`, keeping every frame still in the buffer.
    fn grow(&mut self, new_depth: usize) -> Result<()> {
        let old_depth = self.depth;
        let old_data = std::mem::take(&mut self.data);
        let old_time = std::mem::take(&mut self.time);
        self.allocate(new_depth)?;
        let n = self.width;
        let lo = if self.config.ring {
            (self.cur_w - old_depth as i64).max(0)
        } else {
            0
        };
        for vidx in lo..self.cur_w {
            let src = Self::slot_for(self.config.ring, old_depth, vidx);
            let dst = Self::slot_for(self.config.ring, new_depth, vidx);
            self.data[dst * n..(dst + 1) * n].copy_from_slice(&old_data[src * n..(src + 1) * n]);
            if !old_time.is_empty() {
                self.time[dst] = old_time[src];
            }
        }
        self.depth = new_depth;
        self.config.buffer_size = new_depth;
        tracing::debug!(level = %self.config.name, from = old_depth, to = new_depth, "level grown");
        Ok(())
    }

    fn slot_for(ring: bool, depth: usize, vidx: i64) -> usize {
        if ring {
            vidx.rem_euclid(depth as i64) as usize
        } else {
            vidx as usize
        }
    }

    fn slot(&self, vidx: i64) -> usize {
        Self::slot_for(self.config.ring, self.depth, vidx)
    }

    fn ensure_fixated(&self) -> Result<()> {
        if self.fixated {
            Ok(())
        } else {
            Err(Error::NotFixated(self.name().to_string()))
        }
    }

    // --- counters ---

    pub(crate) fn min_r(&self) -> i64 {
        self.read_cursors.iter().copied().min().unwrap_or(self.base_r)
    }

    pub(crate) fn read_cursor(&self, reader: ReaderId) -> i64 {
        self.read_cursors.get(reader.0).copied().unwrap_or(self.base_r)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn n_free(&self) -> usize {
        if !self.fixated {
            return 0;
        }
        if self.config.ring {
            let used = (self.cur_w - self.min_r()).max(0) as usize;
            self.depth.saturating_sub(used)
        } else {
            self.depth.saturating_sub(self.cur_w.max(0) as usize)
        }
    }

    pub(crate) fn n_avail(&self, reader: Option<ReaderId>) -> usize {
        let r = match reader {
            Some(id) => self.read_cursor(id),
            None => self.min_r(),
        };
        (self.cur_w - r).max(0) as usize
    }

    fn may_overwrite(&self) -> bool {
        match self.config.no_hang {
            NoHang::Overwrite => true,
            NoHang::DiscardWithoutReaders => self.readers.is_empty(),
            NoHang::Block => false,
        }
    }

    /// Pure predicate: could `n` frames be appended right now.
    pub(crate) fn check_write(&self, n: usize) -> bool {
        if !self.fixated {
            return false;
        }
        if self.config.grow_dyn {
            return true;
        }
        if self.config.ring && self.may_overwrite() {
            return n <= self.depth;
        }
        self.n_free() >= n
    }

    /// Pure predicate: could a reader read `n` frames starting at `start`.
    pub(crate) fn check_read(&self, start: i64, n: usize, eoi: bool) -> bool {
        if !self.fixated {
            return false;
        }
        if n == 0 {
            return true;
        }
        let end = start + n as i64;
        let lo = start.max(0);
        if end > self.cur_w && !(eoi && lo < self.cur_w) {
            return false;
        }
        if start < 0 {
            // pre-roll needs at least frame 0
            return self.cur_w > 0 && self.in_buffer(0);
        }
        self.in_buffer(lo)
    }

    fn in_buffer(&self, vidx: i64) -> bool {
        if self.config.ring {
            vidx >= self.cur_w - self.depth as i64
        } else {
            vidx < self.depth as i64
        }
    }

    // --- writing ---

    /// Validates a write of `len` frames at `start`, growing if allowed.
    fn prepare_write(&mut self, start: i64, len: usize) -> Result<()> {
        if start < 0 || start > self.cur_w {
            return Err(Error::InvalidIndex {
                level: self.name().to_string(),
                index: start,
            });
        }
        let end = start + len as i64;
        if self.config.ring {
            if start < self.cur_w - self.depth as i64 {
                return Err(Error::InvalidIndex {
                    level: self.name().to_string(),
                    index: start,
                });
            }
            let new_frames = (end - self.cur_w).max(0) as usize;
            let free = self.n_free();
            if new_frames > free {
                if self.config.grow_dyn {
                    let used = self.depth - free;
                    let target = (self.depth * 2).max(used + new_frames + 10);
                    self.grow(target)?;
                } else if !(self.may_overwrite() && len <= self.depth) {
                    return Err(Error::NoSpace {
                        level: self.name().to_string(),
                        requested: new_frames,
                        free,
                    });
                }
            }
        } else if end > self.depth as i64 {
            if !self.config.grow_dyn {
                return Err(Error::NoSpace {
                    level: self.name().to_string(),
                    requested: len,
                    free: self.n_free(),
                });
            }
            let target = (self.depth * 2).max(end as usize + 10);
            self.grow(target)?;
        }
        Ok(())
    }

    fn store_frame(&mut self, vidx: i64, samples: &[Sample], time: Option<&TimeMeta>) {
        let slot = self.slot(vidx);
        let n = self.width;
        self.data[slot * n..(slot + 1) * n].copy_from_slice(samples);
        if !self.config.no_time_meta {
            let mut meta = time.copied().unwrap_or_else(|| {
                TimeMeta::derived(vidx, self.config.period, self.config.frame_size_sec)
            });
            meta.vidx = vidx;
            self.time[slot] = meta;
        }
    }

    /// Moves `cur_w` past a completed write and pushes lagging cursors out of
    /// the overwritten region.
    fn commit_write(&mut self, end: i64) {
        if end > self.cur_w {
            self.cur_w = end;
        }
        if self.config.ring {
            let floor = self.cur_w - self.depth as i64;
            if self.min_r() < floor {
                let lost = (floor - self.min_r()) as u64;
                self.dropped += lost;
                for c in &mut self.read_cursors {
                    if *c < floor {
                        *c = floor;
                    }
                }
                if self.base_r < floor {
                    self.base_r = floor;
                }
                if !self.readers.is_empty() {
                    tracing::debug!(level = %self.config.name, lost, "ring overwrite dropped unread frames");
                }
            }
        }
    }

    pub(crate) fn write_frame(&mut self, start: Option<i64>, frame: &Frame) -> Result<i64> {
        self.ensure_fixated()?;
        if frame.data.len() != self.width {
            return Err(Error::WidthMismatch {
                level: self.name().to_string(),
                got: frame.data.len(),
                expected: self.width,
            });
        }
        let vidx = start.unwrap_or(self.cur_w);
        self.prepare_write(vidx, 1)?;
        self.store_frame(vidx, &frame.data, frame.time.as_ref());
        self.commit_write(vidx + 1);
        Ok(vidx)
    }

    pub(crate) fn write_matrix(&mut self, start: Option<i64>, matrix: &Matrix) -> Result<i64> {
        self.ensure_fixated()?;
        if matrix.width() != self.width {
            return Err(Error::WidthMismatch {
                level: self.name().to_string(),
                got: matrix.width(),
                expected: self.width,
            });
        }
        let vidx = start.unwrap_or(self.cur_w);
        let len = matrix.frames();
        if len == 0 {
            return Ok(vidx);
        }
        self.prepare_write(vidx, len)?;
        for i in 0..len {
            let meta = matrix.time()[i];
            let explicit = (meta != TimeMeta::default()).then_some(meta);
            self.store_frame(vidx + i as i64, matrix.frame(i), explicit.as_ref());
        }
        self.commit_write(vidx + len as i64);
        Ok(vidx)
    }

    // --- reading ---

    fn time_at(&self, vidx: i64) -> TimeMeta {
        if self.config.no_time_meta {
            TimeMeta::derived(vidx, self.config.period, self.config.frame_size_sec)
        } else {
            self.time[self.slot(vidx)]
        }
    }

    fn validate_read(&self, vidx: i64) -> Result<()> {
        if vidx >= self.cur_w {
            return Err(Error::NotAvailable {
                level: self.name().to_string(),
                index: vidx,
                cur_w: self.cur_w,
            });
        }
        if vidx < 0 || !self.in_buffer(vidx) {
            return Err(Error::Overwritten {
                level: self.name().to_string(),
                index: vidx,
            });
        }
        Ok(())
    }

    fn mark_read(&mut self, reader: Option<ReaderId>, next: i64) {
        if let Some(id) = reader
            && let Some(c) = self.read_cursors.get_mut(id.0)
            && next > *c
        {
            *c = next.min(self.cur_w);
        }
    }

    pub(crate) fn read_frame_into(
        &mut self,
        vidx: i64,
        reader: Option<ReaderId>,
        out: &mut [Sample],
    ) -> Result<TimeMeta> {
        self.ensure_fixated()?;
        self.validate_read(vidx)?;
        let slot = self.slot(vidx);
        let n = self.width;
        out.copy_from_slice(&self.data[slot * n..(slot + 1) * n]);
        let meta = self.time_at(vidx);
        self.mark_read(reader, vidx + 1);
        Ok(meta)
    }

    /// Reads `len` frames at `start` into `out`, padding before index 0 and,
    /// under EOI, after the write cursor.
    pub(crate) fn read_matrix_into(
        &mut self,
        start: i64,
        len: usize,
        reader: Option<ReaderId>,
        padding: Padding,
        eoi: bool,
        out: &mut Matrix,
    ) -> Result<()> {
        self.ensure_fixated()?;
        let n = self.width;
        if len == 0 {
            out.reset(n, 0);
            return Ok(());
        }
        let end = start + len as i64;
        let real_lo = start.max(0);
        let mut real_hi = end.max(0);

        if real_hi > self.cur_w {
            if !eoi || real_lo >= self.cur_w {
                return Err(Error::NotAvailable {
                    level: self.name().to_string(),
                    index: real_hi - 1,
                    cur_w: self.cur_w,
                });
            }
            real_hi = self.cur_w;
        }
        let has_real = real_hi > real_lo;
        if has_real {
            self.validate_read(real_lo)?;
        } else if start < 0 && padding == Padding::Repeat {
            self.validate_read(0)?;
        }

        let pre = ((real_lo - start) as usize).min(len);
        let real = (real_hi - real_lo).max(0) as usize;
        let post = len - pre - real;
        let keep_pre = if padding == Padding::None { 0 } else { pre };
        let keep_post = if padding == Padding::None { 0 } else { post };
        let total = keep_pre + real + keep_post;
        out.reset(n, total);

        let mut col = 0;
        for i in 0..keep_pre {
            let vidx = start + i as i64;
            if padding == Padding::Repeat {
                let src = self.slot(0) * n;
                out.frame_mut(col).copy_from_slice(&self.data[src..src + n]);
            }
            out.time_mut()[col] =
                TimeMeta::derived(vidx, self.config.period, self.config.frame_size_sec);
            col += 1;
        }
        for vidx in real_lo..real_hi {
            let src = self.slot(vidx) * n;
            out.frame_mut(col).copy_from_slice(&self.data[src..src + n]);
            out.time_mut()[col] = self.time_at(vidx);
            col += 1;
        }
        let last = real_hi - 1;
        for i in 0..keep_post {
            let vidx = real_hi.max(real_lo) + i as i64;
            if padding == Padding::Repeat && has_real {
                let src = self.slot(last) * n;
                out.frame_mut(col).copy_from_slice(&self.data[src..src + n]);
            }
            out.time_mut()[col] =
                TimeMeta::derived(vidx, self.config.period, self.config.frame_size_sec);
            col += 1;
        }
        out.truncate(col);

        if has_real {
            self.mark_read(reader, real_hi);
        }
        Ok(())
    }

    // --- cursor moves ---

    /// Raises a reader cursor to `to` (clamped to `cur_w`). Never lowers it.
    pub(crate) fn advance_reader(&mut self, reader: ReaderId, to: i64) {
        self.mark_read(Some(reader), to);
    }

    /// Moves a reader cursor to exactly `to`, clamped into `[floor, cur_w]`.
    pub(crate) fn catchup_reader(&mut self, reader: ReaderId, to: i64) {
        let floor = if self.config.ring {
            (self.cur_w - self.depth as i64).max(0)
        } else {
            0
        };
        if let Some(c) = self.read_cursors.get_mut(reader.0) {
            *c = to.clamp(floor, self.cur_w);
        }
    }

    pub(crate) fn status(&self) -> LevelStatus {
        LevelStatus {
            name: self.config.name.clone(),
            writer: self.writer.clone(),
            readers: self.readers.len(),
            cur_r: self.min_r(),
            cur_w: self.cur_w,
            n_avail: self.n_avail(None),
            n_free: self.n_free(),
            depth: self.depth,
            width: self.width,
            dropped: self.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(depth: usize, readers: &[&str]) -> LevelState {
        let mut cfg = LevelConfig::new("lv").with_buffer_size(depth);
        cfg.fields.push(FieldMeta::new("x", 2, 0));
        let mut st = LevelState::new(cfg, "w".into(), readers.iter().map(|s| s.to_string()).collect());
        st.fixate().unwrap();
        st
    }

    fn frame(v: f32) -> Frame {
        Frame::new(vec![v, v + 0.5])
    }

    #[test]
    fn fixate_applies_minimum_depth() {
        let mut cfg = LevelConfig::new("a").with_buffer_size(2).with_blocksize_writer(3);
        cfg.fields.push(FieldMeta::new("x", 1, 0));
        let mut st = LevelState::new(cfg, "w".into(), vec!["r".into()]);
        st.fixate().unwrap();
        assert_eq!(st.depth(), 7);

        let mut cfg = LevelConfig::new("b").with_buffer_size(2).with_blocksize_writer(2);
        cfg.blocksize_reader = 10;
        cfg.fields.push(FieldMeta::new("x", 1, 0));
        let mut st = LevelState::new(cfg, "w".into(), vec!["r".into()]);
        st.fixate().unwrap();
        assert_eq!(st.depth(), 14);
    }

    #[test]
    fn fixate_rejects_zero_width() {
        let mut st = LevelState::new(LevelConfig::new("empty"), "w".into(), Vec::new());
        assert!(matches!(st.fixate(), Err(Error::ZeroWidth(_))));
    }

    #[test]
    fn fields_locked_after_fixation() {
        let mut st = state(5, &["r"]);
        assert!(matches!(
            st.add_field(FieldMeta::new("y", 1, 0)),
            Err(Error::FieldsFixated(_))
        ));
        assert!(matches!(st.add_reader("late"), Err(Error::ReaderAfterFixation { .. })));
        // already registered readers resolve to their slot
        assert_eq!(st.add_reader("r").unwrap(), ReaderId(0));
    }

    #[test]
    fn ring_blocks_when_full() {
        let mut st = state(5, &["r"]);
        st.config.no_hang = NoHang::Block;
        for i in 0..5 {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        assert_eq!(st.n_free(), 0);
        assert!(!st.check_write(1));
        assert!(matches!(st.write_frame(None, &frame(9.0)), Err(Error::NoSpace { .. })));

        let mut out = [0.0; 2];
        st.read_frame_into(0, Some(ReaderId(0)), &mut out).unwrap();
        assert_eq!(out, [0.0, 0.5]);
        assert_eq!(st.n_free(), 1);
        assert_eq!(st.write_frame(None, &frame(5.0)).unwrap(), 5);
    }

    #[test]
    fn discard_without_readers_overwrites() {
        let mut st = state(5, &[]);
        for i in 0..100 {
            assert!(st.check_write(1));
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        assert_eq!(st.cur_w, 100);
        let mut out = [0.0; 2];
        st.read_frame_into(99, None, &mut out).unwrap();
        assert_eq!(out[0], 99.0);
        assert!(matches!(
            st.read_frame_into(90, None, &mut out),
            Err(Error::Overwritten { .. })
        ));
    }

    #[test]
    fn overwrite_pushes_slow_reader_forward() {
        let mut st = state(5, &["slow"]);
        st.config.no_hang = NoHang::Overwrite;
        for i in 0..8 {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        assert_eq!(st.read_cursor(ReaderId(0)), 3);
        assert!(st.read_cursor(ReaderId(0)) <= st.cur_w);
        assert_eq!(st.status().dropped, 3);
    }

    #[test]
    fn grow_dyn_keeps_frames() {
        let mut st = state(5, &["r"]);
        st.config.grow_dyn = true;
        for i in 0..12 {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        assert!(st.depth() >= 12);
        let mut out = [0.0; 2];
        for i in 0..12 {
            st.read_frame_into(i, Some(ReaderId(0)), &mut out).unwrap();
            assert_eq!(out[0], i as f32);
        }
    }

    #[test]
    fn linear_level_bounds() {
        let mut cfg = LevelConfig::new("lin").with_buffer_size(4);
        cfg.ring = false;
        cfg.fields.push(FieldMeta::new("x", 2, 0));
        let mut st = LevelState::new(cfg, "w".into(), vec!["r".into()]);
        st.fixate().unwrap();
        let depth = st.depth();
        for i in 0..depth {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        assert!(matches!(st.write_frame(None, &frame(0.0)), Err(Error::NoSpace { .. })));
        // reading does not free linear storage
        let mut out = [0.0; 2];
        st.read_frame_into(0, Some(ReaderId(0)), &mut out).unwrap();
        assert!(!st.check_write(1));
    }

    #[test]
    fn positional_write_inside_window() {
        let mut st = state(5, &["r"]);
        for i in 0..3 {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        st.write_frame(Some(1), &frame(7.0)).unwrap();
        assert_eq!(st.cur_w, 3);
        assert!(matches!(
            st.write_frame(Some(9), &frame(0.0)),
            Err(Error::InvalidIndex { .. })
        ));
        let mut out = [0.0; 2];
        st.read_frame_into(1, None, &mut out).unwrap();
        assert_eq!(out[0], 7.0);
    }

    #[test]
    fn read_past_write_cursor_is_not_available() {
        let mut st = state(5, &["r"]);
        st.write_frame(None, &frame(1.0)).unwrap();
        let mut out = [0.0; 2];
        assert!(matches!(
            st.read_frame_into(1, Some(ReaderId(0)), &mut out),
            Err(Error::NotAvailable { .. })
        ));
        assert_eq!(st.read_cursor(ReaderId(0)), 0);
    }

    #[test]
    fn matrix_pre_roll_padding() {
        let mut st = state(8, &["r"]);
        for i in 0..3 {
            st.write_frame(None, &frame(i as f32 + 1.0)).unwrap();
        }
        let mut m = Matrix::default();
        st.read_matrix_into(-2, 4, None, Padding::Zero, false, &mut m).unwrap();
        assert_eq!(m.frames(), 4);
        assert_eq!(m.frame(0), &[0.0, 0.0]);
        assert_eq!(m.frame(2), &[1.0, 1.5]);
        assert_eq!(m.time()[0].vidx, -2);

        st.read_matrix_into(-2, 4, None, Padding::Repeat, false, &mut m).unwrap();
        assert_eq!(m.frame(0), &[1.0, 1.5]);
        assert_eq!(m.frame(3), &[2.0, 2.5]);

        st.read_matrix_into(-2, 4, None, Padding::None, false, &mut m).unwrap();
        assert_eq!(m.frames(), 2);
    }

    #[test]
    fn matrix_end_padding_only_under_eoi() {
        let mut st = state(8, &["r"]);
        for i in 0..3 {
            st.write_frame(None, &frame(i as f32)).unwrap();
        }
        let mut m = Matrix::default();
        assert!(st.read_matrix_into(1, 4, None, Padding::Zero, false, &mut m).is_err());

        st.read_matrix_into(1, 4, None, Padding::Repeat, true, &mut m).unwrap();
        assert_eq!(m.frames(), 4);
        assert_eq!(m.frame(3), &[2.0, 2.5]);

        st.read_matrix_into(1, 4, None, Padding::None, true, &mut m).unwrap();
        assert_eq!(m.frames(), 2);

        // nothing of the window exists
        assert!(st.read_matrix_into(3, 2, None, Padding::Zero, true, &mut m).is_err());
    }

    #[test]
    fn no_time_meta_reconstructs_from_index() {
        let mut cfg = LevelConfig::new("nt").with_buffer_size(4).with_period(0.5);
        cfg.no_time_meta = true;
        cfg.fields.push(FieldMeta::new("x", 1, 0));
        let mut st = LevelState::new(cfg, "w".into(), Vec::new());
        st.fixate().unwrap();
        st.write_frame(None, &Frame::new(vec![1.0])).unwrap();
        st.write_frame(None, &Frame::new(vec![2.0])).unwrap();
        let mut out = [0.0];
        let meta = st.read_frame_into(1, None, &mut out).unwrap();
        assert_eq!(meta.vidx, 1);
        assert_eq!(meta.time, 0.5);
    }
}
