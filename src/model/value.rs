use std::cmp::Ordering;
use std::fmt::Display;

use itertools::Itertools;

/// A typed SQL datum, as returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the storage class holding this value.
    pub fn storage_class(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
        }
    }

    /// Textual form used for cell equality. NULL renders empty.
    pub fn to_plain_string(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(r) => format!("{r:?}"),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Blob(b) => hex_upper(b),
        }
    }

    /// Compare two values the way SQLite compares operands that need no
    /// affinity conversion. `None` when either side is NULL.
    pub fn compare_sql(&self, other: &SqlValue) -> Option<Ordering> {
        use SqlValue::*;
        let ordering = match (self, other) {
            (Null, _) | (_, Null) => return None,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Real(a), Real(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Integer(a), Real(b)) => int_real_cmp(*a, *b),
            (Real(a), Integer(b)) => int_real_cmp(*b, *a).reverse(),
            (Text(a), Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Blob(a), Blob(b)) => a.cmp(b),
            (a, b) => a.class_rank().cmp(&b.class_rank()),
        };
        Some(ordering)
    }

    fn class_rank(&self) -> u8 {
        match self {
            SqlValue::Null => 0,
            SqlValue::Integer(_) | SqlValue::Real(_) => 1,
            SqlValue::Text(_) => 2,
            SqlValue::Blob(_) => 3,
        }
    }
}

// Exact integer/real comparison, mirroring sqlite3IntFloatCompare.
fn int_real_cmp(i: i64, r: f64) -> Ordering {
    if r.is_nan() {
        return Ordering::Greater;
    }
    if r < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    if r >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    let y = r as i64;
    match i.cmp(&y) {
        Ordering::Equal => (i as f64).partial_cmp(&r).unwrap_or(Ordering::Equal),
        other => other,
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).join("")
}

/// Renders a SQL literal that SQLite reads back as the same value.
impl Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i64::MIN) => write!(f, "(-9223372036854775807 - 1)"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) if r.is_infinite() && r.is_sign_positive() => write!(f, "9e999"),
            SqlValue::Real(r) if r.is_infinite() => write!(f, "-9e999"),
            SqlValue::Real(r) => write!(f, "{r:?}"),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => write!(f, "X'{}'", hex_upper(b)),
        }
    }
}

/// Type identifier attached to a fetched cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueType(String);

impl ValueType {
    /// Declared type of the projected column when the engine reports one,
    /// otherwise the storage class of the value.
    pub fn resolve(declared: Option<&str>, value: &SqlValue) -> Self {
        match declared.map(str::trim).filter(|d| !d.is_empty()) {
            Some(declared) => Self(declared.to_uppercase()),
            None => Self(value.storage_class().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ValueType {
    fn from(value: &str) -> Self {
        Self(value.to_uppercase())
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single fetched value.
///
/// Two cells are equal iff their type identifiers match and either both are
/// NULL or their string representations are identical.
#[derive(Debug, Clone)]
pub struct QueryCell {
    value: SqlValue,
    value_type: ValueType,
}

impl QueryCell {
    pub fn new(value: SqlValue, value_type: ValueType) -> Self {
        Self { value, value_type }
    }

    pub fn null(value_type: ValueType) -> Self {
        Self::new(SqlValue::Null, value_type)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn string_value(&self) -> String {
        self.value.to_plain_string()
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }
}

impl PartialEq for QueryCell {
    fn eq(&self, other: &Self) -> bool {
        if self.value_type != other.value_type {
            return false;
        }
        if self.is_null() != other.is_null() {
            return false;
        }
        self.is_null() || self.string_value() == other.string_value()
    }
}

impl Display for QueryCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[null: {}, type: {}, value: {}]",
            self.is_null(),
            self.value_type,
            self.string_value()
        )
    }
}
