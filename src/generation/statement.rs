use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::connection::Connection;
use crate::error::{GenerationError, SchemaFetchError};
use crate::generation::{
    ADJECTIVES, IndexOptions, NOUNS, Statement, StatementGenerator, StatementKind, pick,
    random_value,
};
use crate::model::{Column, Identifier, SqlValue, Table};
use crate::schema::SchemaSnapshot;

/// Declared types handed out to generated columns. Several spellings per
/// affinity so the engine's type-name parsing gets exercised too.
const DECLARED_TYPES: &[&str] = &[
    "INTEGER",
    "BIGINT",
    "REAL",
    "DOUBLE",
    "TEXT",
    "VARCHAR(16)",
    "BLOB",
    "NUMERIC",
    "",
];

#[derive(Debug, Clone)]
pub struct GeneratorOpts {
    pub max_columns: usize,
    pub max_rows_per_insert: usize,
    pub null_probability: f64,
    pub not_null_probability: f64,
    pub primary_key_probability: f64,
    pub unique_index_probability: f64,
}

impl Default for GeneratorOpts {
    fn default() -> Self {
        Self {
            max_columns: 5,
            max_rows_per_insert: 3,
            null_probability: 0.1,
            not_null_probability: 0.2,
            primary_key_probability: 0.1,
            unique_index_probability: 0.2,
        }
    }
}

/// Generates random DDL and DML against the schema it last reloaded.
#[derive(Debug, Default)]
pub struct RandomStatementGenerator {
    opts: GeneratorOpts,
    tables: Vec<Table>,
    next_id: u64,
}

impl RandomStatementGenerator {
    pub fn new(opts: GeneratorOpts) -> Self {
        Self {
            opts,
            tables: Vec::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn table_name<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Identifier {
        let adj = pick(ADJECTIVES, rng);
        let noun = pick(NOUNS, rng);
        Identifier::new(format!("{adj}_{noun}_{}", self.next_id()))
    }

    fn random_table<R: Rng + ?Sized>(&mut self, rng: &mut R) -> (Table, bool) {
        let name = self.table_name(rng);
        let column_count = rng.random_range(1..=self.opts.max_columns.max(1));
        let columns = (0..column_count)
            .map(|i| {
                let name = format!("{}_{i}", pick(NOUNS, rng));
                let column = Column::new(name, *pick(DECLARED_TYPES, rng));
                if rng.random_bool(self.opts.not_null_probability) {
                    column.not_null()
                } else {
                    column
                }
            })
            .collect();
        let primary_key = rng.random_bool(self.opts.primary_key_probability);
        (Table::new(name, columns), primary_key)
    }
}

impl StatementGenerator for RandomStatementGenerator {
    fn create_table<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Statement, GenerationError> {
        let (table, primary_key) = self.random_table(rng);
        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i == 0 && primary_key {
                    format!("{column} PRIMARY KEY")
                } else {
                    column.to_string()
                }
            })
            .join(", ");
        Ok(Statement {
            kind: StatementKind::CreateTable,
            sql: format!("CREATE TABLE {} ({columns})", table.name.quoted()),
        })
    }

    fn create_index<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        opts: &IndexOptions,
    ) -> Result<Statement, GenerationError> {
        let candidates = self
            .tables
            .iter()
            .filter(|t| !t.columns.is_empty())
            .filter(|t| opts.tables.is_empty() || opts.tables.contains(&t.name))
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Err(GenerationError::NoTable("create index"));
        }
        let table = *pick(&candidates, rng);

        let mut columns = table.columns.iter().collect::<Vec<_>>();
        columns.shuffle(rng);
        let count = rng.random_range(1..=columns.len().min(3));
        let columns = columns
            .into_iter()
            .take(count)
            .map(|c| {
                let order = if rng.random_bool(0.5) { "ASC" } else { "DESC" };
                format!("{} {order}", c.name.quoted())
            })
            .join(", ");

        let unique = !opts.online_ddl && rng.random_bool(self.opts.unique_index_probability);
        let table_name = table.name.clone();
        let index_name = Identifier::new(format!("idx_{}_{}", table_name, self.next_id()));
        Ok(Statement {
            kind: StatementKind::CreateIndex,
            sql: format!(
                "CREATE {}INDEX {} ON {} ({columns})",
                if unique { "UNIQUE " } else { "" },
                index_name.quoted(),
                table_name.quoted()
            ),
        })
    }

    fn insert<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        table: &Table,
    ) -> Result<Statement, GenerationError> {
        if table.columns.is_empty() {
            return Err(GenerationError::NoColumns(table.name.to_string()));
        }
        let row_count = rng.random_range(1..=self.opts.max_rows_per_insert.max(1));
        let rows = (0..row_count)
            .map(|_| {
                let values = table
                    .columns
                    .iter()
                    .map(|c| {
                        if c.nullable && rng.random_bool(self.opts.null_probability) {
                            SqlValue::Null
                        } else {
                            random_value(rng, c.affinity())
                        }
                    })
                    .join(", ");
                format!("({values})")
            })
            .join(", ");
        let columns = table.columns.iter().map(|c| c.name.quoted()).join(", ");
        Ok(Statement {
            kind: StatementKind::Insert,
            sql: format!(
                "INSERT INTO {} ({columns}) VALUES {rows}",
                table.name.quoted()
            ),
        })
    }

    fn reload_schema<C: Connection + ?Sized>(
        &mut self,
        conn: &C,
        database: &str,
    ) -> Result<(), SchemaFetchError> {
        self.tables = SchemaSnapshot::fetch(conn, database)?;
        Ok(())
    }

    fn tables(&self) -> &[Table] {
        &self.tables
    }
}
