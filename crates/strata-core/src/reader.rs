//! Reader side: one logical input assembled from one or more levels.
//!
//! A [`ReaderHandle`] keeps its own monotonic cursor `cur_r` and concatenates
//! the frames of all its input levels into one frame. Frame `i` is only
//! returned once every input level has written it, so the slowest level gates
//! the read.
//!
//! Two access styles exist:
//!
//! - **Frame-wise**: [`get_next_frame()`](ReaderHandle::get_next_frame) reads
//!   at the cursor and advances by one.
//!   [`get_frame_rel()`](ReaderHandle::get_frame_rel) looks back without
//!   moving, which requires [`set_history()`](ReaderHandle::set_history) to pin
//!   the frames in the level.
//! - **Windowed**: after
//!   [`setup_sequential_matrix_reading()`](ReaderHandle::setup_sequential_matrix_reading),
//!   [`get_next_matrix()`](ReaderHandle::get_next_matrix) returns `length`
//!   frames and advances by `step`. A negative start cursor pre-rolls with
//!   [`Padding`]; under EOI the last window is end-padded.
//!
//! The handle moves each level's reader cursor explicitly to
//! `cur_r - history`, which is what frees ring slots for the writer.

use crate::config::{LevelConfig, sec_to_vidx};
use crate::error::{Error, Result};
use crate::frame::{FieldLayout, Frame, Matrix, Padding};
use crate::level::ReaderId;
use crate::params::Params;
use crate::component::Progress;
use crate::store::{LevelId, LevelStore};

#[derive(Debug, Clone)]
struct Input {
    name: String,
    reader: Option<ReaderId>,
    level: Option<LevelId>,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Span {
    Frames(i64),
    Seconds(f64),
}

impl Span {
    fn resolve(self, period: f64) -> i64 {
        match self {
            Self::Frames(n) => n,
            Self::Seconds(sec) => sec_to_vidx(period, sec),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    step: Span,
    length: Span,
    ignore_missing_begin: Span,
}

/// A component's view onto its input levels.
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    owner: String,
    inputs: Vec<Input>,
    config: LevelConfig,
    layout: FieldLayout,
    element_level: Vec<usize>,
    cur_r: i64,
    window: Option<Window>,
    step: usize,
    length: usize,
    padding: Padding,
    force_async_merge: bool,
    history: usize,
    registered: bool,
    configured: bool,
    finalized: bool,
    full_read_done: bool,
    scratch: Vec<Matrix>,
}

impl ReaderHandle {
    /// Creates a handle reading `levels` on behalf of `owner`.
    pub fn new<S: AsRef<str>>(owner: impl Into<String>, levels: &[S]) -> Self {
        Self {
            owner: owner.into(),
            inputs: levels
                .iter()
                .map(|name| Input {
                    name: name.as_ref().to_string(),
                    reader: None,
                    level: None,
                    width: 0,
                })
                .collect(),
            config: LevelConfig::default(),
            layout: FieldLayout::new(),
            element_level: Vec::new(),
            cur_r: 0,
            window: None,
            step: 1,
            length: 1,
            padding: Padding::default(),
            force_async_merge: false,
            history: 0,
            registered: false,
            configured: false,
            finalized: false,
            full_read_done: false,
            scratch: Vec::new(),
        }
    }

    /// Creates a handle from the `reader` table of a component's parameters.
    ///
    /// `levels` in the table overrides `default_levels`; `padding` and
    /// `force_async_merge` are optional.
    pub fn from_params<S: AsRef<str>>(
        owner: impl Into<String>,
        default_levels: &[S],
        params: &Params,
    ) -> Result<Self> {
        let owner = owner.into();
        let table = params.table(&owner, "reader")?;
        let mut handle = match table.opt_str_list(&owner, "levels")? {
            Some(levels) => Self::new(owner.clone(), &levels),
            None => Self::new(owner.clone(), default_levels),
        };
        if handle.inputs.is_empty() {
            return Err(Error::invalid_param(&owner, "reader.levels", "no input level given"));
        }
        if let Some(p) = table.opt_str(&owner, "padding")? {
            handle.padding = Padding::parse(&p).ok_or_else(|| {
                Error::invalid_param(&owner, "reader.padding", format!("unknown padding '{p}'"))
            })?;
        }
        handle.force_async_merge = table.opt_bool(&owner, "force_async_merge")?.unwrap_or(false);
        Ok(handle)
    }

    /// Names of the input levels.
    pub fn level_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|i| i.name.as_str())
    }

    /// Number of input levels.
    pub fn level_count(&self) -> usize {
        self.inputs.len()
    }

    /// Merged input config (fields filled in after finalize).
    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    /// Concatenated field layout.
    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Width of the concatenated frame.
    pub fn width(&self) -> usize {
        self.layout.width()
    }

    /// Index of the input level that element `idx` comes from.
    pub fn element_level(&self, idx: usize) -> Option<usize> {
        self.element_level.get(idx).copied()
    }

    /// Current read cursor.
    pub fn cursor(&self) -> i64 {
        self.cur_r
    }

    /// Window step in frames (valid after configure).
    pub fn step(&self) -> usize {
        self.step
    }

    /// Window length in frames (valid after configure).
    pub fn length(&self) -> usize {
        self.length
    }

    /// Frames kept pinned behind the cursor.
    pub fn history(&self) -> usize {
        self.history
    }

    /// Padding policy for pre-roll and end-of-input.
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Returns `true` once finalized.
    pub fn is_ready(&self) -> bool {
        self.finalized
    }

    /// Sets the padding policy.
    pub fn set_padding(&mut self, padding: Padding) {
        self.padding = padding;
    }

    /// Allows merging levels with different periods.
    pub fn set_force_async_merge(&mut self, force: bool) {
        self.force_async_merge = force;
    }

    /// Keeps `frames` frames behind the cursor readable by
    /// [`get_frame_rel()`](Self::get_frame_rel).
    pub fn set_history(&mut self, frames: usize) {
        self.history = frames;
    }

    /// Declares a block/step window in frames.
    ///
    /// `step == 0` reads the whole input once EOI is reached.
    pub fn setup_sequential_matrix_reading(
        &mut self,
        step: usize,
        length: usize,
        ignore_missing_begin: i64,
    ) {
        self.window = Some(Window {
            step: Span::Frames(step as i64),
            length: Span::Frames(length as i64),
            ignore_missing_begin: Span::Frames(ignore_missing_begin),
        });
    }

    /// Declares a window in seconds, resolved against the input period at configure.
    pub fn setup_sequential_matrix_reading_sec(
        &mut self,
        step: f64,
        length: f64,
        ignore_missing_begin: f64,
    ) {
        self.window = Some(Window {
            step: Span::Seconds(step),
            length: Span::Seconds(length),
            ignore_missing_begin: Span::Seconds(ignore_missing_begin),
        });
    }

    // --- lifecycle ---

    /// Declares read requests on every input level.
    pub fn register(&mut self, store: &LevelStore) -> Result<()> {
        if self.registered {
            return Ok(());
        }
        for input in &mut self.inputs {
            input.reader = Some(store.register_read_request(&input.name, &self.owner)?);
        }
        self.registered = true;
        Ok(())
    }

    /// Looks up every input level and builds the merged input config.
    ///
    /// Returns `Retry` until every input level has been added by its writer.
    /// The merged config is available from [`config()`](Self::config)
    /// afterwards; fields are filled in by [`finalize()`](Self::finalize).
    pub fn resolve(&mut self, store: &LevelStore) -> Result<Progress> {
        self.register(store)?;
        for input in &mut self.inputs {
            match store.find_level(&input.name) {
                Some(id) => input.level = Some(id),
                None => {
                    return Ok(Progress::Retry(format!(
                        "waiting for level '{}'",
                        input.name
                    )));
                }
            }
        }
        let Some(first) = self.inputs.first().and_then(|i| i.level) else {
            return Err(Error::invalid_param(&self.owner, "reader.levels", "no input level given"));
        };
        let mut merged = store.level_config(first)?;
        merged.name = self.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(";");
        merged.fields = FieldLayout::new();
        self.config = merged;
        Ok(Progress::Ready)
    }

    /// Resolves the input levels and reserves the reader blocksize
    /// (`length + step` for windowed reads, `1 + history` otherwise).
    pub fn configure(&mut self, store: &LevelStore) -> Result<Progress> {
        if self.configured {
            return Ok(Progress::Ready);
        }
        if let Progress::Retry(reason) = self.resolve(store)? {
            return Ok(Progress::Retry(reason));
        }
        let period = self.config.period;
        if let Some(w) = self.window {
            self.step = w.step.resolve(period).max(0) as usize;
            self.length = w.length.resolve(period).max(1) as usize;
            self.cur_r = w.ignore_missing_begin.resolve(period);
        }
        let blocksize = if self.window.is_some() {
            self.length + self.step
        } else {
            1 + self.history
        };
        for input in &self.inputs {
            let id = input.level.ok_or_else(|| self.not_set_up())?;
            store.query_read_config(id, blocksize)?;
        }
        self.config.blocksize_reader = blocksize;
        self.configured = true;
        Ok(Progress::Ready)
    }

    /// Builds the concatenated layout once every input level is fixated.
    pub fn finalize(&mut self, store: &LevelStore) -> Result<Progress> {
        if self.finalized {
            return Ok(Progress::Ready);
        }
        if !self.configured
            && let Progress::Retry(reason) = self.configure(store)?
        {
            return Ok(Progress::Retry(reason));
        }
        let mut configs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let id = input.level.ok_or_else(|| self.not_set_up())?;
            if !store.is_fixated(id) {
                return Ok(Progress::Retry(format!(
                    "waiting for level '{}' to be fixated",
                    input.name
                )));
            }
            configs.push(store.level_config(id)?);
        }

        let expected = configs[0].period;
        for cfg in &configs[1..] {
            if (cfg.period - expected).abs() > f64::EPSILON {
                if self.force_async_merge {
                    tracing::warn!(
                        reader = %self.owner,
                        level = %cfg.name,
                        "merging levels with different periods"
                    );
                } else {
                    return Err(Error::PeriodMismatch {
                        reader: self.owner.clone(),
                        level: cfg.name.clone(),
                        period: cfg.period,
                        expected,
                    });
                }
            }
            if cfg.ring != configs[0].ring || cfg.grow_dyn != configs[0].grow_dyn {
                tracing::warn!(
                    reader = %self.owner,
                    level = %cfg.name,
                    "input levels differ in ring/grow_dyn settings"
                );
            }
        }

        self.layout = FieldLayout::new();
        self.element_level.clear();
        for (i, (input, cfg)) in self.inputs.iter_mut().zip(&configs).enumerate() {
            input.width = cfg.width();
            self.layout.extend(&cfg.fields);
            self.element_level.extend(std::iter::repeat_n(i, input.width));
        }
        self.config.fields = self.layout.clone();
        self.config.buffer_size = configs.iter().map(|c| c.buffer_size).min().unwrap_or(0);
        self.scratch = vec![Matrix::default(); self.inputs.len()];
        self.finalized = true;
        tracing::debug!(
            reader = %self.owner,
            levels = %self.config.name,
            width = self.width(),
            step = self.step,
            length = self.length,
            "reader finalized"
        );
        Ok(Progress::Ready)
    }

    fn not_set_up(&self) -> Error {
        Error::NotSetUp(format!("reader of '{}'", self.owner))
    }

    fn ids(&self) -> Result<impl Iterator<Item = (LevelId, ReaderId)> + '_> {
        if !self.finalized {
            return Err(self.not_set_up());
        }
        Ok(self
            .inputs
            .iter()
            .filter_map(|i| Some((i.level?, i.reader?))))
    }

    /// Moves every level's reader cursor up to `cur_r - history`.
    fn release(&self, store: &LevelStore) -> Result<()> {
        let keep = self.cur_r - self.history as i64;
        if keep <= 0 {
            return Ok(());
        }
        for (id, rid) in self.ids()? {
            store.advance_reader(id, rid, keep)?;
        }
        Ok(())
    }

    // --- frames ---

    /// Concatenated frame at absolute index `idx`, without touching cursors.
    pub fn frame_at(&self, store: &LevelStore, idx: i64) -> Result<Frame> {
        let ids: Vec<_> = self.ids()?.collect();
        if let [(id, _)] = ids.as_slice() {
            return store.get_frame(*id, idx, None);
        }
        for (id, _) in &ids {
            let cur_w = store.write_cursor(*id);
            if idx >= cur_w {
                return Err(Error::NotAvailable {
                    level: self.config.name.clone(),
                    index: idx,
                    cur_w,
                });
            }
        }
        let mut frame = Frame::zeros(self.width());
        let mut offset = 0;
        for (k, ((id, _), input)) in ids.iter().zip(&self.inputs).enumerate() {
            let meta =
                store.get_frame_into(*id, idx, None, &mut frame.data[offset..offset + input.width])?;
            if k == 0 {
                frame.time = Some(meta);
            }
            offset += input.width;
        }
        Ok(frame)
    }

    /// Reads the frame at the cursor and advances.
    ///
    /// A negative cursor (pre-roll) advances even though the read fails.
    pub fn get_next_frame(&mut self, store: &LevelStore) -> Result<Frame> {
        let idx = self.cur_r;
        match self.frame_at(store, idx) {
            Ok(frame) => {
                self.cur_r += 1;
                self.release(store)?;
                Ok(frame)
            }
            Err(e) => {
                if idx < 0 && e.is_transient() {
                    self.cur_r += 1;
                }
                Err(e)
            }
        }
    }

    /// Reads the frame `lag` frames behind the cursor without moving it.
    pub fn get_frame_rel(&self, store: &LevelStore, lag: usize) -> Result<Frame> {
        self.frame_at(store, self.cur_r - lag as i64)
    }

    // --- matrices ---

    /// Concatenated block `[start, start + len)`, padded per [`Padding`].
    pub fn matrix_at(&mut self, store: &LevelStore, start: i64, len: usize) -> Result<Matrix> {
        let ids: Vec<_> = self.ids()?.collect();
        let padding = self.padding;
        if let [(id, _)] = ids.as_slice() {
            return store.get_matrix(*id, start, len, None, padding);
        }
        for (k, (id, _)) in ids.iter().enumerate() {
            store.get_matrix_into(*id, start, len, None, padding, &mut self.scratch[k])?;
        }
        let frames = self.scratch.iter().map(Matrix::frames).min().unwrap_or(0);
        let mut out = Matrix::zeros(self.width(), frames);
        for f in 0..frames {
            let mut offset = 0;
            for part in &self.scratch {
                let w = part.width();
                out.frame_mut(f)[offset..offset + w].copy_from_slice(part.frame(f));
                offset += w;
            }
            out.time_mut()[f] = self.scratch[0].time()[f];
        }
        Ok(out)
    }

    /// Reads the next window and advances the cursor by `step`.
    ///
    /// With `step == 0` the whole input from the cursor is returned once,
    /// after every input level reached EOI.
    pub fn get_next_matrix(&mut self, store: &LevelStore) -> Result<Matrix> {
        if self.step == 0 {
            return self.read_to_end(store);
        }
        let m = self.matrix_at(store, self.cur_r, self.length)?;
        self.cur_r += self.step as i64;
        self.release(store)?;
        Ok(m)
    }

    fn read_to_end(&mut self, store: &LevelStore) -> Result<Matrix> {
        let end = self.min_write_cursor(store)?;
        if self.full_read_done || !self.is_eoi(store) {
            return Err(Error::NotAvailable {
                level: self.config.name.clone(),
                index: end,
                cur_w: end,
            });
        }
        let start = self.cur_r;
        let len = (end - start).max(0) as usize;
        let m = self.matrix_at(store, start, len)?;
        self.full_read_done = true;
        self.cur_r = end;
        self.release(store)?;
        Ok(m)
    }

    fn min_write_cursor(&self, store: &LevelStore) -> Result<i64> {
        Ok(self
            .ids()?
            .map(|(id, _)| store.write_cursor(id))
            .min()
            .unwrap_or(0))
    }

    // --- predicates and counters ---

    /// Would [`get_next_frame()`](Self::get_next_frame) succeed (or pre-roll).
    pub fn is_next_frame_read_ok(&self, store: &LevelStore) -> bool {
        if self.cur_r < 0 {
            return self.finalized;
        }
        match self.ids() {
            Ok(mut ids) => ids.all(|(id, _)| store.check_read(id, self.cur_r, 1)),
            Err(_) => false,
        }
    }

    /// Would [`get_next_matrix()`](Self::get_next_matrix) succeed.
    pub fn is_next_matrix_read_ok(&self, store: &LevelStore) -> bool {
        if self.step == 0 {
            return self.finalized && !self.full_read_done && self.is_eoi(store);
        }
        match self.ids() {
            Ok(mut ids) => ids.all(|(id, _)| store.check_read(id, self.cur_r, self.length)),
            Err(_) => false,
        }
    }

    /// Frames available past the cursor on the slowest level.
    pub fn n_avail(&self, store: &LevelStore) -> usize {
        self.min_write_cursor(store)
            .map(|w| (w - self.cur_r).max(0) as usize)
            .unwrap_or(0)
    }

    /// Smallest free space across the input levels.
    pub fn n_free(&self, store: &LevelStore) -> usize {
        self.ids()
            .map(|ids| ids.map(|(id, _)| store.get_n_free(id)).min().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Maximum over levels of each level's minimum read cursor, or `None`
    /// while any input level is still empty.
    pub fn min_r(&self, store: &LevelStore) -> Option<i64> {
        let mut out = i64::MIN;
        for (id, _) in self.ids().ok()? {
            if store.write_cursor(id) == 0 {
                return None;
            }
            out = out.max(store.min_read_cursor(id));
        }
        (out != i64::MIN).then_some(out)
    }

    /// Returns `true` if every input level is at end of input.
    pub fn is_eoi(&self, store: &LevelStore) -> bool {
        self.ids()
            .map(|mut ids| ids.all(|(id, _)| store.is_eoi(id)))
            .unwrap_or(false)
    }

    /// Jumps the cursor to `to` on every level.
    pub fn catchup(&mut self, store: &LevelStore, to: i64) -> Result<()> {
        self.cur_r = to;
        let keep = to - self.history as i64;
        for (id, rid) in self.ids()?.collect::<Vec<_>>() {
            store.catchup_reader(id, rid, keep)?;
        }
        Ok(())
    }
}
