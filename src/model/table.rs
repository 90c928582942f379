use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A case-insensitive SQL identifier.
///
/// The original spelling is kept for rendering; comparisons and hashing use
/// the ASCII-lowercased form.
#[derive(Debug, Clone)]
pub struct Identifier {
    original: String,
    lowered: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        let original = name.into();
        let lowered = original.to_ascii_lowercase();
        Self { original, lowered }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Double-quoted form, safe to splice into SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.original.replace('"', "\"\""))
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.lowered == other.lowered
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lowered.hash(state);
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lowered.cmp(&other.lowered)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.original)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// SQLite type affinity of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
}

impl Affinity {
    /// Derive the affinity from a declared type, following SQLite's
    /// column affinity rules in order.
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Affinity::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Affinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Identifier,
    pub declared_type: String,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<Identifier>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn affinity(&self) -> Affinity {
        Affinity::from_declared_type(&self.declared_type)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name.quoted(), self.declared_type)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: Identifier,
    pub columns: Vec<Column>,
    pub indexes: Vec<Identifier>,
}

impl Table {
    pub fn new(name: impl Into<Identifier>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }

    pub fn column(&self, name: &Identifier) -> Option<&Column> {
        self.columns.iter().find(|c| &c.name == name)
    }

    /// Keys of every column of this table, in declaration order.
    pub fn table_columns(&self) -> impl Iterator<Item = TableColumn> + '_ {
        self.columns
            .iter()
            .map(|c| TableColumn::new(self.name.clone(), c.name.clone()))
    }
}

/// Identity of a projected column: the owning table and the column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableColumn {
    pub table: Identifier,
    pub column: Identifier,
}

impl TableColumn {
    pub fn new(table: impl Into<Identifier>, column: impl Into<Identifier>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// `"table"."column"`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table.quoted(), self.column.quoted())
    }
}

impl Display for TableColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Find the column descriptor a key points at.
pub fn lookup_column<'a>(tables: &'a [Table], key: &TableColumn) -> Option<&'a Column> {
    tables
        .iter()
        .find(|t| t.name == key.table)
        .and_then(|t| t.column(&key.column))
}
