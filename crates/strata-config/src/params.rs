//! Conversion of TOML values into engine parameters.

use strata_core::{ParamValue, Params};

/// Converts one TOML value. Datetimes become their RFC 3339 string.
pub fn value_to_param(value: &toml::Value) -> ParamValue {
    match value {
        toml::Value::String(s) => ParamValue::Str(s.clone()),
        toml::Value::Integer(i) => ParamValue::Int(*i),
        toml::Value::Float(f) => ParamValue::Float(*f),
        toml::Value::Boolean(b) => ParamValue::Bool(*b),
        toml::Value::Datetime(d) => ParamValue::Str(d.to_string()),
        toml::Value::Array(items) => ParamValue::List(items.iter().map(value_to_param).collect()),
        toml::Value::Table(t) => ParamValue::Table(table_to_params(t)),
    }
}

/// Converts a TOML table.
pub fn table_to_params(table: &toml::Table) -> Params {
    let mut params = Params::new();
    for (key, value) in table {
        params.insert(key.clone(), value_to_param(value));
    }
    params
}
