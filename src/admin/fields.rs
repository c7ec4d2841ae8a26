//! Editable field descriptions and JSON payload parsing for the generic
//! admin handlers.
//!
//! Each entity declares its writable columns as [`FieldSpec`]s. A create or
//! edit payload is checked against them field by field and turned into typed
//! [`FieldValue`]s, so every bound parameter carries the column's real type
//! (including typed NULLs). All problems in one payload are reported together.

use crate::domain::{validate_phone, validate_url};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Bounded text; `max_len` counts characters.
    Text { max_len: usize },
    LongText,
    Integer { min: Option<i64>, max: Option<i64> },
    /// External numeric identifiers (Telegram ids).
    BigInt,
    Bool,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM` or `HH:MM:SS`
    Time,
    /// Positive id of a row in another table.
    ForeignKey { table: &'static str },
    /// One of a closed set.
    Choice(&'static [&'static str]),
    Phone,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present on create.
    pub required: bool,
    /// Accepts JSON `null`.
    pub nullable: bool,
}

impl FieldSpec {
    /// Mandatory on create, never null.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: true,
            nullable: false,
        }
    }

    /// May be omitted or null.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: false,
            nullable: true,
        }
    }

    /// May be omitted (the column default applies) but never set to null.
    pub const fn defaulted(name: &'static str, kind: FieldKind) -> Self {
        FieldSpec {
            name,
            kind,
            required: false,
            nullable: false,
        }
    }

    /// Parse one JSON value into a typed value for this column.
    pub fn parse(&self, value: &Value) -> Result<FieldValue, String> {
        if value.is_null() {
            return if self.nullable {
                Ok(self.kind.null())
            } else {
                Err("must not be null".to_string())
            };
        }
        match self.kind {
            FieldKind::Text { max_len } => {
                let s = expect_str(value)?;
                let trimmed = s.trim();
                if trimmed.is_empty() && !self.nullable {
                    return Err("must not be empty".to_string());
                }
                if trimmed.chars().count() > max_len {
                    return Err(format!("must be at most {} characters", max_len));
                }
                if trimmed.is_empty() {
                    Ok(FieldValue::Text(None))
                } else {
                    Ok(FieldValue::Text(Some(trimmed.to_string())))
                }
            }
            FieldKind::LongText => {
                let s = expect_str(value)?;
                Ok(FieldValue::Text(Some(s.to_string())))
            }
            FieldKind::Integer { min, max } => {
                let n = value.as_i64().ok_or("must be an integer")?;
                if let Some(min) = min {
                    if n < min {
                        return Err(format!("must be at least {}", min));
                    }
                }
                if let Some(max) = max {
                    if n > max {
                        return Err(format!("must be at most {}", max));
                    }
                }
                Ok(FieldValue::Int(Some(n)))
            }
            FieldKind::BigInt => {
                let n = value.as_i64().ok_or("must be an integer")?;
                Ok(FieldValue::Int(Some(n)))
            }
            FieldKind::ForeignKey { table } => {
                let n = value
                    .as_i64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("must be a positive {} id", table))?;
                Ok(FieldValue::Int(Some(n)))
            }
            FieldKind::Bool => {
                let b = value.as_bool().ok_or("must be true or false")?;
                Ok(FieldValue::Bool(Some(b)))
            }
            FieldKind::Date => {
                let s = expect_str(value)?;
                let d = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| "must be a date (YYYY-MM-DD)".to_string())?;
                Ok(FieldValue::Date(Some(d)))
            }
            FieldKind::Time => {
                let s = expect_str(value)?.trim();
                let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .map_err(|_| "must be a time (HH:MM or HH:MM:SS)".to_string())?;
                Ok(FieldValue::Time(Some(t)))
            }
            FieldKind::Choice(allowed) => {
                let s = expect_str(value)?;
                if allowed.contains(&s) {
                    Ok(FieldValue::Text(Some(s.to_string())))
                } else {
                    Err(format!("must be one of: {}", allowed.join(", ")))
                }
            }
            FieldKind::Phone => {
                let s = expect_str(value)?;
                validate_phone(s)
                    .map(|p| FieldValue::Text(Some(p)))
                    .map_err(|e| e.to_string())
            }
            FieldKind::Url => {
                let s = expect_str(value)?;
                validate_url(s)
                    .map(|u| FieldValue::Text(Some(u)))
                    .map_err(|e| e.to_string())
            }
        }
    }
}

impl FieldKind {
    fn null(&self) -> FieldValue {
        match self {
            FieldKind::Text { .. }
            | FieldKind::LongText
            | FieldKind::Choice(_)
            | FieldKind::Phone
            | FieldKind::Url => FieldValue::Text(None),
            FieldKind::Integer { .. } | FieldKind::BigInt | FieldKind::ForeignKey { .. } => {
                FieldValue::Int(None)
            }
            FieldKind::Bool => FieldValue::Bool(None),
            FieldKind::Date => FieldValue::Date(None),
            FieldKind::Time => FieldValue::Time(None),
        }
    }

    /// Short type name shown in the entity catalog.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::LongText => "long_text",
            FieldKind::Integer { .. } | FieldKind::BigInt => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::ForeignKey { .. } => "foreign_key",
            FieldKind::Choice(_) => "choice",
            FieldKind::Phone => "phone",
            FieldKind::Url => "url",
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "must be a string".to_string())
}

/// A typed, possibly-null value ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
}

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(field.to_string(), message.into());
        ValidationErrors(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{} {}", k, v)).collect();
        write!(f, "validation failed: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Create,
    Edit,
}

/// Check a JSON object against the declared fields and produce the
/// `(column, value)` list to write, in declaration order.
pub fn parse_payload(
    fields: &'static [FieldSpec],
    payload: &Value,
    mode: PayloadMode,
) -> Result<Vec<(&'static str, FieldValue)>, ValidationErrors> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationErrors::single("body", "must be a JSON object"));
    };
    let mut errors = BTreeMap::new();
    reject_unknown(fields, object, &mut errors);

    let mut values = Vec::new();
    for spec in fields {
        match object.get(spec.name) {
            Some(raw) => match spec.parse(raw) {
                Ok(v) => values.push((spec.name, v)),
                Err(msg) => {
                    errors.insert(spec.name.to_string(), msg);
                }
            },
            None if mode == PayloadMode::Create && spec.required => {
                errors.insert(spec.name.to_string(), "is required".to_string());
            }
            None => {}
        }
    }
    if mode == PayloadMode::Edit && values.is_empty() && errors.is_empty() {
        errors.insert("body".to_string(), "no editable fields supplied".to_string());
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn reject_unknown(
    fields: &'static [FieldSpec],
    object: &Map<String, Value>,
    errors: &mut BTreeMap<String, String>,
) {
    for key in object.keys() {
        if !fields.iter().any(|f| f.name == key) {
            errors.insert(key.clone(), "is not an editable field".to_string());
        }
    }
}
