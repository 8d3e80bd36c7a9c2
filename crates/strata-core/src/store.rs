//! The level store: every level of a pipeline, addressed by [`LevelId`].
//!
//! # Architecture
//!
//! ```text
//! LevelStore
//! ├── RwLock<Tables>        level table, name index, pre-creation claims
//! │   └── Vec<Level>
//! │       └── Mutex<LevelState>   ring memory + cursors (one lock per level)
//! └── AtomicBool            global EOI
//! ```
//!
//! The table lock is taken for writing only while levels are being added,
//! which happens during setup. While the tick loop runs every access takes the
//! table read lock and then the per-level mutex, so writers and readers of
//! different levels never contend.
//!
//! Components may declare read and write intent before the level exists;
//! those claims are kept by name and adopted when the writer adds the level.
//!
//! # Example
//!
//! ```rust
//! use strata_core::{FieldMeta, Frame, LevelConfig, LevelStore, WriteMode};
//!
//! let store = LevelStore::new();
//! store.register_write_request("wave", "src").unwrap();
//! let reader = store.register_read_request("wave", "sink").unwrap();
//! let id = store.add_level(LevelConfig::new("wave").with_buffer_size(8), "src").unwrap();
//! store.add_field(id, FieldMeta::new("x", 1, 0)).unwrap();
//! store.fixate_level(id).unwrap();
//!
//! store.set_frame(id, WriteMode::Append, &Frame::new(vec![0.5])).unwrap();
//! let frame = store.get_frame(id, 0, Some(reader)).unwrap();
//! assert_eq!(frame.data, vec![0.5]);
//! assert_eq!(store.get_n_avail(id, Some(reader)), 0);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::config::LevelConfig;
use crate::error::{Error, Result};
use crate::frame::{FieldMeta, Frame, Matrix, Padding, Sample, TimeMeta};
use crate::level::{Level, LevelState, LevelStatus, ReaderId};

/// Index of a level in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelId(pub(crate) usize);

impl LevelId {
    /// Raw table index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// At the write cursor.
    #[default]
    Append,
    /// At an absolute index in `[cur_w - depth, cur_w]`.
    At(i64),
}

impl WriteMode {
    fn start(self) -> Option<i64> {
        match self {
            Self::Append => None,
            Self::At(i) => Some(i),
        }
    }
}

#[derive(Default)]
struct Claim {
    writer: Option<String>,
    readers: Vec<String>,
}

#[derive(Default)]
struct Tables {
    levels: Vec<Level>,
    by_name: HashMap<String, LevelId>,
    claims: HashMap<String, Claim>,
}

/// Owner of all levels of one pipeline.
#[derive(Default)]
pub struct LevelStore {
    tables: RwLock<Tables>,
    global_eoi: AtomicBool,
}

impl std::fmt::Debug for LevelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read();
        f.debug_struct("LevelStore")
            .field("levels", &t.levels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>())
            .field("global_eoi", &self.global_eoi.load(Ordering::Relaxed))
            .finish()
    }
}

impl LevelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_level<R>(&self, id: LevelId, f: impl FnOnce(&mut LevelState) -> R) -> Result<R> {
        let tables = self.tables.read();
        let level = tables
            .levels
            .get(id.0)
            .ok_or_else(|| Error::LevelNotFound(format!("#{}", id.0)))?;
        let mut state = level.state.lock();
        Ok(f(&mut state))
    }

    // --- setup ---

    /// Declares `writer` as the writer of `level`.
    ///
    /// Idempotent for the same writer; a different writer fails with
    /// [`Error::DuplicateWriter`].
    pub fn register_write_request(&self, level: &str, writer: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(&id) = tables.by_name.get(level) {
            let existing = tables.levels[id.0].state.lock().writer.clone();
            return check_writer(level, &existing, writer);
        }
        let claim = tables.claims.entry(level.to_string()).or_default();
        match &claim.writer {
            Some(existing) => check_writer(level, existing, writer),
            None => {
                claim.writer = Some(writer.to_string());
                tracing::debug!(level, writer, "write request registered");
                Ok(())
            }
        }
    }

    /// Declares `reader` as a reader of `level` and returns its slot.
    ///
    /// Idempotent per reader name. Fails once the level is fixated.
    pub fn register_read_request(&self, level: &str, reader: &str) -> Result<ReaderId> {
        let mut tables = self.tables.write();
        if let Some(&id) = tables.by_name.get(level) {
            return tables.levels[id.0].state.lock().add_reader(reader);
        }
        let claim = tables.claims.entry(level.to_string()).or_default();
        if let Some(pos) = claim.readers.iter().position(|r| r == reader) {
            return Ok(ReaderId(pos));
        }
        claim.readers.push(reader.to_string());
        tracing::debug!(level, reader, "read request registered");
        Ok(ReaderId(claim.readers.len() - 1))
    }

    /// Creates the level described by `config`, owned by `writer`.
    ///
    /// Re-adding by the same writer before fixation adopts the new config;
    /// after fixation the config must match the fixated one.
    pub fn add_level(&self, config: LevelConfig, writer: &str) -> Result<LevelId> {
        let mut tables = self.tables.write();
        if let Some(&id) = tables.by_name.get(&config.name) {
            let mut st = tables.levels[id.0].state.lock();
            check_writer(&config.name, &st.writer, writer)?;
            if st.fixated {
                check_compatible(&st.config, &config)?;
                return Ok(id);
            }
            let fields = std::mem::take(&mut st.config.fields);
            let bsr = st.config.blocksize_reader.max(config.blocksize_reader);
            st.config = config;
            st.config.blocksize_reader = bsr;
            if st.config.fields.is_empty() {
                st.config.fields = fields;
            }
            return Ok(id);
        }

        let claim = tables.claims.remove(&config.name).unwrap_or_default();
        if let Some(existing) = claim.writer.clone()
            && existing != writer
        {
            tables.claims.insert(config.name.clone(), claim);
            return Err(Error::DuplicateWriter {
                level: config.name,
                existing,
                requested: writer.to_string(),
            });
        }
        let id = LevelId(tables.levels.len());
        tracing::debug!(
            level = %config.name,
            writer,
            readers = claim.readers.len(),
            period = config.period,
            "level added"
        );
        tables.by_name.insert(config.name.clone(), id);
        tables
            .levels
            .push(Level::new(config, writer.to_string(), claim.readers));
        Ok(id)
    }

    /// Looks a level up by name.
    pub fn find_level(&self, name: &str) -> Option<LevelId> {
        self.tables.read().by_name.get(name).copied()
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.tables.read().levels.len()
    }

    /// Copy of the level's current config.
    pub fn level_config(&self, id: LevelId) -> Result<LevelConfig> {
        self.with_level(id, |st| st.config.clone())
    }

    /// Returns `true` once the level is fixated.
    pub fn is_fixated(&self, id: LevelId) -> bool {
        self.with_level(id, |st| st.fixated).unwrap_or(false)
    }

    /// Number of registered readers.
    pub fn reader_count(&self, id: LevelId) -> usize {
        self.with_level(id, |st| st.readers.len()).unwrap_or(0)
    }

    /// Appends a field to the layout. Fails after fixation.
    pub fn add_field(&self, id: LevelId, field: FieldMeta) -> Result<()> {
        self.with_level(id, |st| st.add_field(field))?
    }

    /// Locks the layout and allocates the buffer. Idempotent.
    pub fn fixate_level(&self, id: LevelId) -> Result<()> {
        self.with_level(id, LevelState::fixate)?
    }

    /// Raises the reader blocksize before fixation and returns the config.
    pub fn query_read_config(&self, id: LevelId, blocksize: usize) -> Result<LevelConfig> {
        self.with_level(id, |st| {
            st.raise_blocksize_reader(blocksize)?;
            Ok(st.config.clone())
        })?
    }

    /// [`query_read_config()`](Self::query_read_config) with a blocksize in
    /// seconds, converted with `ceil(sec / T)`.
    pub fn query_read_config_sec(&self, id: LevelId, seconds: f64) -> Result<LevelConfig> {
        let period = self.with_level(id, |st| st.config.period)?;
        let frames = if period > 0.0 {
            (seconds / period).ceil() as usize
        } else {
            seconds.ceil() as usize
        };
        self.query_read_config(id, frames)
    }

    // --- data ---

    /// Writes one frame and returns its absolute index.
    pub fn set_frame(&self, id: LevelId, mode: WriteMode, frame: &Frame) -> Result<i64> {
        self.with_level(id, |st| st.write_frame(mode.start(), frame))?
    }

    /// Writes a block of frames and returns the index of the first one.
    pub fn set_matrix(&self, id: LevelId, mode: WriteMode, matrix: &Matrix) -> Result<i64> {
        self.with_level(id, |st| st.write_matrix(mode.start(), matrix))?
    }

    /// Reads frame `index` into a new [`Frame`].
    ///
    /// With `Some(reader)`, that reader's cursor moves to `max(cursor, index + 1)`.
    pub fn get_frame(&self, id: LevelId, index: i64, reader: Option<ReaderId>) -> Result<Frame> {
        self.with_level(id, |st| {
            let mut data = vec![0.0; st.width()];
            let time = st.read_frame_into(index, reader, &mut data)?;
            Ok(Frame {
                data,
                time: Some(time),
            })
        })?
    }

    /// Reads frame `index` into `out`, which must be exactly the level width.
    pub fn get_frame_into(
        &self,
        id: LevelId,
        index: i64,
        reader: Option<ReaderId>,
        out: &mut [Sample],
    ) -> Result<TimeMeta> {
        self.with_level(id, |st| {
            if out.len() != st.width() {
                return Err(Error::WidthMismatch {
                    level: st.config.name.clone(),
                    got: out.len(),
                    expected: st.width(),
                });
            }
            st.read_frame_into(index, reader, out)
        })?
    }

    /// Reads `len` frames starting at `start` into a new [`Matrix`].
    pub fn get_matrix(
        &self,
        id: LevelId,
        start: i64,
        len: usize,
        reader: Option<ReaderId>,
        padding: Padding,
    ) -> Result<Matrix> {
        let mut out = Matrix::default();
        self.get_matrix_into(id, start, len, reader, padding, &mut out)?;
        Ok(out)
    }

    /// Reads `len` frames starting at `start` into `out`, reusing its allocation.
    pub fn get_matrix_into(
        &self,
        id: LevelId,
        start: i64,
        len: usize,
        reader: Option<ReaderId>,
        padding: Padding,
        out: &mut Matrix,
    ) -> Result<()> {
        let global = self.global_eoi();
        self.with_level(id, |st| {
            let eoi = global || st.local_eoi;
            st.read_matrix_into(start, len, reader, padding, eoi, out)
        })?
    }

    // --- capacity ---

    /// Could `n` frames be appended now.
    pub fn check_write(&self, id: LevelId, n: usize) -> bool {
        self.with_level(id, |st| st.check_write(n)).unwrap_or(false)
    }

    /// Could `n` frames starting at `index` be read now (EOI end-padding included).
    pub fn check_read(&self, id: LevelId, index: i64, n: usize) -> bool {
        let global = self.global_eoi();
        self.with_level(id, |st| {
            let eoi = global || st.local_eoi;
            st.check_read(index, n, eoi)
        })
        .unwrap_or(false)
    }

    /// Free slots.
    pub fn get_n_free(&self, id: LevelId) -> usize {
        self.with_level(id, |st| st.n_free()).unwrap_or(0)
    }

    /// Frames available to `reader`, or to the slowest reader with `None`.
    pub fn get_n_avail(&self, id: LevelId, reader: Option<ReaderId>) -> usize {
        self.with_level(id, |st| st.n_avail(reader)).unwrap_or(0)
    }

    /// Write cursor.
    pub fn write_cursor(&self, id: LevelId) -> i64 {
        self.with_level(id, |st| st.cur_w).unwrap_or(0)
    }

    /// Read cursor of one reader.
    pub fn read_cursor(&self, id: LevelId, reader: ReaderId) -> i64 {
        self.with_level(id, |st| st.read_cursor(reader)).unwrap_or(0)
    }

    /// Minimum read cursor over all readers.
    pub fn min_read_cursor(&self, id: LevelId) -> i64 {
        self.with_level(id, |st| st.min_r()).unwrap_or(0)
    }

    /// Raises a reader cursor to `to`, clamped to the write cursor.
    pub fn advance_reader(&self, id: LevelId, reader: ReaderId, to: i64) -> Result<()> {
        self.with_level(id, |st| st.advance_reader(reader, to))
    }

    /// Sets a reader cursor to `to`, clamped into the buffered range.
    pub fn catchup_reader(&self, id: LevelId, reader: ReaderId, to: i64) -> Result<()> {
        self.with_level(id, |st| st.catchup_reader(reader, to))
    }

    // --- EOI ---

    /// Sets or clears the global end-of-input flag.
    pub fn set_global_eoi(&self, eoi: bool) {
        self.global_eoi.store(eoi, Ordering::Release);
    }

    /// Global end-of-input flag.
    pub fn global_eoi(&self) -> bool {
        self.global_eoi.load(Ordering::Acquire)
    }

    /// Sets or clears the level-local end-of-input flag.
    pub fn set_level_eoi(&self, id: LevelId, eoi: bool) -> Result<()> {
        self.with_level(id, |st| st.local_eoi = eoi)
    }

    /// Level EOI: the global flag or the level-local one.
    pub fn is_eoi(&self, id: LevelId) -> bool {
        self.global_eoi() || self.with_level(id, |st| st.local_eoi).unwrap_or(false)
    }

    /// Snapshot of every level's counters, in creation order.
    pub fn status(&self) -> Vec<LevelStatus> {
        let tables = self.tables.read();
        tables.levels.iter().map(|l| l.state.lock().status()).collect()
    }

    /// Names of read requests that never got a writer.
    pub fn unresolved_claims(&self) -> Vec<(String, Vec<String>)> {
        let tables = self.tables.read();
        let mut out: Vec<_> = tables
            .claims
            .iter()
            .filter(|(_, c)| !c.readers.is_empty())
            .map(|(name, c)| (name.clone(), c.readers.clone()))
            .collect();
        out.sort();
        out
    }
}

fn check_writer(level: &str, existing: &str, requested: &str) -> Result<()> {
    if existing == requested {
        Ok(())
    } else {
        Err(Error::DuplicateWriter {
            level: level.to_string(),
            existing: existing.to_string(),
            requested: requested.to_string(),
        })
    }
}

fn check_compatible(fixated: &LevelConfig, new: &LevelConfig) -> Result<()> {
    let reason = if (fixated.period - new.period).abs() > f64::EPSILON {
        Some(format!("period {} vs {}", fixated.period, new.period))
    } else if fixated.ring != new.ring {
        Some("ring flag differs".to_string())
    } else if !new.fields.is_empty() && new.fields.width() != fixated.fields.width() {
        Some(format!(
            "width {} vs {}",
            fixated.fields.width(),
            new.fields.width()
        ))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(Error::IncompatibleLevel {
            level: fixated.name.clone(),
            reason,
        }),
        None => Ok(()),
    }
}
