//! Component parameters.
//!
//! The engine does not parse configuration files. It receives an already
//! parsed [`Params`] tree per instance (built by `strata-config` from TOML,
//! or by hand in tests) and offers typed accessors that report errors with
//! the owning instance name.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Str(String),
    /// List of values.
    List(Vec<ParamValue>),
    /// Nested table.
    Table(Params),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Table(_) => "table",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Params> for ParamValue {
    fn from(v: Params) -> Self {
        Self::Table(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// A table of named parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

fn wrong_type(owner: &str, key: &str, expected: &str, got: &ParamValue) -> Error {
    Error::invalid_param(
        owner,
        key,
        format!("expected {expected}, got {}", got.type_name()),
    )
}

impl Params {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder form of [`insert()`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Iterates keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Optional string.
    pub fn opt_str(&self, owner: &str, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Str(s)) => Ok(Some(s.clone())),
            Some(v) => Err(wrong_type(owner, key, "string", v)),
        }
    }

    /// Optional boolean. Integers 0/1 are accepted.
    pub fn opt_bool(&self, owner: &str, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(ParamValue::Int(0)) => Ok(Some(false)),
            Some(ParamValue::Int(1)) => Ok(Some(true)),
            Some(v) => Err(wrong_type(owner, key, "bool", v)),
        }
    }

    /// Optional integer.
    pub fn opt_i64(&self, owner: &str, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Int(i)) => Ok(Some(*i)),
            Some(v) => Err(wrong_type(owner, key, "integer", v)),
        }
    }

    /// Optional non-negative integer.
    pub fn opt_usize(&self, owner: &str, key: &str) -> Result<Option<usize>> {
        match self.opt_i64(owner, key)? {
            None => Ok(None),
            Some(i) if i >= 0 => Ok(Some(i as usize)),
            Some(i) => Err(Error::invalid_param(
                owner,
                key,
                format!("must not be negative, got {i}"),
            )),
        }
    }

    /// Optional float. Integers are widened.
    pub fn opt_f64(&self, owner: &str, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Float(f)) => Ok(Some(*f)),
            Some(ParamValue::Int(i)) => Ok(Some(*i as f64)),
            Some(v) => Err(wrong_type(owner, key, "number", v)),
        }
    }

    /// Optional list of strings. A single string is split on `;` and `,`.
    pub fn opt_str_list(&self, owner: &str, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Str(s)) => Ok(Some(
                s.split([';', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            Some(ParamValue::List(items)) => items
                .iter()
                .map(|item| match item {
                    ParamValue::Str(s) => Ok(s.clone()),
                    other => Err(wrong_type(owner, key, "list of strings", other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(v) => Err(wrong_type(owner, key, "list of strings", v)),
        }
    }

    /// Nested table, or an empty one if absent.
    pub fn table(&self, owner: &str, key: &str) -> Result<Params> {
        match self.get(key) {
            None => Ok(Params::new()),
            Some(ParamValue::Table(t)) => Ok(t.clone()),
            Some(v) => Err(wrong_type(owner, key, "table", v)),
        }
    }
}
