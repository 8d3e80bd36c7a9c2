//! Writer side of a level.
//!
//! A [`WriterHandle`] owns the configuration of exactly one output level. Its
//! setup follows the component lifecycle:
//!
//! 1. [`register()`](WriterHandle::register) claims the level name.
//! 2. [`configure()`](WriterHandle::configure) adds the level to the store
//!    with the current [`LevelConfig`].
//! 3. [`finalize()`](WriterHandle::finalize) pushes the declared fields and
//!    fixates the level.
//!
//! After that the handle appends frames with
//! [`set_next_frame()`](WriterHandle::set_next_frame) and friends.

use crate::config::{LevelConfig, WriterOptions};
use crate::error::{Error, Result};
use crate::frame::{FieldLayout, FieldMeta, Frame, Matrix};
use crate::params::Params;
use crate::store::{LevelId, LevelStore, WriteMode};

/// A component's view onto its output level.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    owner: String,
    config: LevelConfig,
    options: WriterOptions,
    fields: FieldLayout,
    level: Option<LevelId>,
    registered: bool,
    fixated: bool,
}

impl WriterHandle {
    /// Creates a handle writing level `default_level` for component `owner`.
    pub fn new(owner: impl Into<String>, default_level: impl Into<String>) -> Self {
        Self::with_options(owner, default_level, WriterOptions::default())
    }

    /// Creates a handle from the `writer` table of a component's parameters.
    pub fn from_params(
        owner: impl Into<String>,
        default_level: impl Into<String>,
        params: &Params,
    ) -> Result<Self> {
        let owner = owner.into();
        let table = params.table(&owner, "writer")?;
        let options = WriterOptions::from_params(&owner, &table)?;
        Ok(Self::with_options(owner, default_level, options))
    }

    fn with_options(
        owner: impl Into<String>,
        default_level: impl Into<String>,
        options: WriterOptions,
    ) -> Self {
        let mut config = LevelConfig::new(default_level);
        options.apply(&mut config);
        config.sanitize();
        Self {
            owner: owner.into(),
            config,
            options,
            fields: FieldLayout::new(),
            level: None,
            registered: false,
            fixated: false,
        }
    }

    /// Output level name.
    pub fn level_name(&self) -> &str {
        &self.config.name
    }

    /// Store id, once configured.
    pub fn level_id(&self) -> Option<LevelId> {
        self.level
    }

    /// Current level config.
    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    /// User options from the `writer` table.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Fields declared so far.
    pub fn fields(&self) -> &FieldLayout {
        &self.fields
    }

    /// Output width declared so far.
    pub fn width(&self) -> usize {
        self.fields.width()
    }

    /// Returns `true` once the output level is fixated.
    pub fn is_fixated(&self) -> bool {
        self.fixated
    }

    /// Installs a level config.
    ///
    /// With `overwrite == false` every option the user set explicitly in the
    /// `writer` table is re-applied on top of `config`. The level name always
    /// stays the handle's. Fields carried by `config` are appended to the
    /// declared layout.
    pub fn set_config(&mut self, mut config: LevelConfig, overwrite: bool) -> Result<()> {
        if self.fixated {
            return Err(Error::FieldsFixated(self.config.name.clone()));
        }
        let name = self.config.name.clone();
        let fields = std::mem::take(&mut config.fields);
        if !overwrite {
            self.options.apply(&mut config);
        }
        config.name = name;
        config.sanitize();
        self.config = config;
        self.fields.extend(&fields);
        Ok(())
    }

    /// Declares an output field.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        width: usize,
        arr_offset: usize,
    ) -> Result<()> {
        if self.fixated {
            return Err(Error::FieldsFixated(self.config.name.clone()));
        }
        self.fields.push(FieldMeta::new(name, width, arr_offset));
        Ok(())
    }

    // --- lifecycle ---

    /// Claims the output level.
    pub fn register(&mut self, store: &LevelStore) -> Result<()> {
        if !self.registered {
            store.register_write_request(&self.config.name, &self.owner)?;
            self.registered = true;
        }
        Ok(())
    }

    /// Adds the output level with the current config.
    pub fn configure(&mut self, store: &LevelStore) -> Result<LevelId> {
        self.register(store)?;
        let mut cfg = self.config.clone();
        cfg.fields = FieldLayout::new();
        let id = store.add_level(cfg, &self.owner)?;
        self.level = Some(id);
        Ok(id)
    }

    /// Pushes the declared fields and fixates the level.
    pub fn finalize(&mut self, store: &LevelStore) -> Result<()> {
        if self.fixated {
            return Ok(());
        }
        let id = match self.level {
            Some(id) => id,
            None => self.configure(store)?,
        };
        if self.fields.is_empty() || self.fields.width() == 0 {
            return Err(Error::ZeroWidth(self.config.name.clone()));
        }
        if !store.is_fixated(id) {
            for field in self.fields.fields() {
                store.add_field(id, field.clone())?;
            }
        }
        store.fixate_level(id)?;
        self.config = store.level_config(id)?;
        self.fixated = true;
        Ok(())
    }

    fn id(&self) -> Result<LevelId> {
        match self.level {
            Some(id) if self.fixated => Ok(id),
            _ => Err(Error::NotSetUp(format!("writer of level '{}'", self.config.name))),
        }
    }

    // --- data ---

    /// Appends one frame; returns its index.
    pub fn set_next_frame(&self, store: &LevelStore, frame: &Frame) -> Result<i64> {
        store.set_frame(self.id()?, WriteMode::Append, frame)
    }

    /// Appends a block of frames; returns the index of the first one.
    pub fn set_next_matrix(&self, store: &LevelStore, matrix: &Matrix) -> Result<i64> {
        store.set_matrix(self.id()?, WriteMode::Append, matrix)
    }

    /// Writes one frame at absolute `index`.
    pub fn set_frame(&self, store: &LevelStore, index: i64, frame: &Frame) -> Result<i64> {
        store.set_frame(self.id()?, WriteMode::At(index), frame)
    }

    /// Writes a block at absolute `index`.
    pub fn set_matrix(&self, store: &LevelStore, index: i64, matrix: &Matrix) -> Result<i64> {
        store.set_matrix(self.id()?, WriteMode::At(index), matrix)
    }

    /// Could `n` frames be appended now. This is the predicate the next
    /// `set_next_frame`/`set_next_matrix` obeys.
    ///
    /// Always true for `grow_dyn` levels. On a ring with the `Overwrite`
    /// policy, or `DiscardWithoutReaders` while nobody reads the level, true
    /// for any `n` up to the depth.
    pub fn check_write(&self, store: &LevelStore, n: usize) -> bool {
        self.id().map(|id| store.check_write(id, n)).unwrap_or(false)
    }

    /// Free slots in the output level.
    pub fn n_free(&self, store: &LevelStore) -> usize {
        self.id().map(|id| store.get_n_free(id)).unwrap_or(0)
    }

    /// Write cursor of the output level.
    pub fn write_cursor(&self, store: &LevelStore) -> i64 {
        self.id().map(|id| store.write_cursor(id)).unwrap_or(0)
    }

    /// Sets the level-local end-of-input flag.
    pub fn set_eoi(&self, store: &LevelStore, eoi: bool) -> Result<()> {
        store.set_level_eoi(self.id()?, eoi)
    }
}
