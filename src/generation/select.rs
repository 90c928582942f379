use std::fmt::Display;

use itertools::Itertools;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::error::SynthesisError;
use crate::generation::predicate::{CompareOp, Operand, Predicate};
use crate::generation::{QuerySynthesizer, RenderedQuery, pick, random_value};
use crate::model::{Affinity, Identifier, PivotRow, Table, TableColumn, lookup_column};

#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub table: Identifier,
    /// Render `NOT INDEXED`, forcing a full scan of the table.
    pub not_indexed: bool,
}

impl Display for FromItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table.quoted())?;
        if self.not_indexed {
            write!(f, " NOT INDEXED")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: TableColumn,
    pub descending: bool,
}

/// A pivoted SELECT before pivot values are spliced in.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectAst {
    pub from: Vec<FromItem>,
    pub columns: Vec<TableColumn>,
    pub distinct: bool,
    pub predicate: Predicate,
    pub order_by: Vec<OrderTerm>,
}

/// Default [`QuerySynthesizer`]: a cross join over every table holding part
/// of the pivot, filtered by a random predicate tree.
#[derive(Debug, Clone, Default)]
pub struct PivotQuerySynthesizer {
    optimizer_hints: bool,
}

impl PivotQuerySynthesizer {
    pub fn new(optimizer_hints: bool) -> Self {
        Self { optimizer_hints }
    }
}

/// Column usable in a predicate, with the affinity that decides which
/// literals it can be compared against.
#[derive(Debug, Clone)]
pub(crate) struct PredicateColumn {
    pub key: TableColumn,
    pub affinity: Affinity,
}

pub(crate) fn predicate_columns(tables: &[Table]) -> Vec<PredicateColumn> {
    tables
        .iter()
        .flat_map(|t| {
            t.columns.iter().map(move |c| PredicateColumn {
                key: TableColumn::new(t.name.clone(), c.name.clone()),
                affinity: c.affinity(),
            })
        })
        .collect()
}

/// Random predicate tree no deeper than `depth`.
///
/// Leaves only ever compare operands that SQLite compares without applying
/// any affinity conversion: a column against its own pivot value, a column
/// against a literal of its natural storage class, or two columns of equal
/// affinity. That keeps [`Predicate::eval`] exact.
pub(crate) fn random_predicate<R: Rng + ?Sized>(
    rng: &mut R,
    columns: &[PredicateColumn],
    depth: usize,
) -> Predicate {
    if depth <= 1 || rng.random_bool(0.3) {
        return random_leaf(rng, columns);
    }
    match rng.random_range(0..4) {
        0 => Predicate::not(random_predicate(rng, columns, depth - 1)),
        1 => Predicate::and(
            random_predicate(rng, columns, depth - 1),
            random_predicate(rng, columns, depth - 1),
        ),
        2 => Predicate::or(
            random_predicate(rng, columns, depth - 1),
            random_predicate(rng, columns, depth - 1),
        ),
        _ => Predicate::is_unknown(random_predicate(rng, columns, depth - 1)),
    }
}

fn random_leaf<R: Rng + ?Sized>(rng: &mut R, columns: &[PredicateColumn]) -> Predicate {
    let column = pick(columns, rng);
    let lhs = Operand::Column(column.key.clone());
    let rhs = match rng.random_range(0..10) {
        0..=4 => Operand::Pivot(column.key.clone()),
        5 | 6 => Operand::Literal(random_value(rng, column.affinity)),
        7 => {
            let peers = columns
                .iter()
                .filter(|c| c.affinity == column.affinity && c.key != column.key)
                .collect::<Vec<_>>();
            if peers.is_empty() {
                Operand::Pivot(column.key.clone())
            } else {
                Operand::Column(pick(&peers, rng).key.clone())
            }
        }
        8 => return Predicate::IsNull(lhs),
        _ => return Predicate::NotNull(lhs),
    };
    let op = *pick(&CompareOp::ALL, rng);
    if rng.random_bool(0.5) {
        Predicate::Compare(rhs, op, lhs)
    } else {
        Predicate::Compare(lhs, op, rhs)
    }
}

impl QuerySynthesizer for PivotQuerySynthesizer {
    type Ast = SelectAst;

    fn build_ast<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_depth: usize,
        tables: &[Table],
    ) -> Result<SelectAst, SynthesisError> {
        if tables.is_empty() {
            return Err(SynthesisError::NoTables);
        }
        let columns = predicate_columns(tables);
        if columns.is_empty() {
            return Err(SynthesisError::NoColumns);
        }

        let from = tables
            .iter()
            .map(|t| FromItem {
                table: t.name.clone(),
                not_indexed: self.optimizer_hints && rng.random_bool(0.3),
            })
            .collect();

        let mut selected = columns.iter().map(|c| c.key.clone()).collect::<Vec<_>>();
        selected.shuffle(rng);
        let count = rng.random_range(1..=selected.len());
        selected.truncate(count);

        let order_by = if rng.random_bool(0.3) {
            let terms = rng.random_range(1..=selected.len().min(2));
            selected
                .choose_multiple(rng, terms)
                .map(|column| OrderTerm {
                    column: column.clone(),
                    descending: rng.random_bool(0.5),
                })
                .collect()
        } else {
            Vec::new()
        };

        // Rectification may add one level on top of the generated tree.
        let depth = max_depth.saturating_sub(1).max(1);
        let predicate = random_predicate(rng, &columns, depth);

        Ok(SelectAst {
            from,
            columns: selected,
            distinct: rng.random_bool(0.2),
            predicate,
            order_by,
        })
    }

    fn render(
        &self,
        ast: &SelectAst,
        tables: &[Table],
        pivot: &PivotRow,
    ) -> Result<RenderedQuery, SynthesisError> {
        if ast.from.is_empty() {
            return Err(SynthesisError::NoTables);
        }
        let referenced = ast
            .columns
            .iter()
            .chain(ast.order_by.iter().map(|term| &term.column))
            .chain(ast.predicate.columns());
        for key in referenced {
            if lookup_column(tables, key).is_none() || !ast.from.iter().any(|f| f.table == key.table)
            {
                return Err(SynthesisError::UnknownColumn(key.clone()));
            }
        }
        if let Some(missing) = ast.columns.iter().find(|key| !pivot.contains(key)) {
            return Err(SynthesisError::MissingPivotValue(missing.clone()));
        }

        let predicate = ast.predicate.resolve_pivots(pivot)?.rectify(pivot)?;

        let mut sql = format!(
            "SELECT {}{} FROM {} WHERE {predicate}",
            if ast.distinct { "DISTINCT " } else { "" },
            ast.columns.iter().map(TableColumn::qualified).join(", "),
            ast.from.iter().join(", "),
        );
        if !ast.order_by.is_empty() {
            let terms = ast
                .order_by
                .iter()
                .map(|term| {
                    let direction = if term.descending { "DESC" } else { "ASC" };
                    format!("{} {direction}", term.column.qualified())
                })
                .join(", ");
            sql.push_str(&format!(" ORDER BY {terms}"));
        }

        Ok(RenderedQuery {
            sql,
            columns: ast.columns.clone(),
        })
    }
}
