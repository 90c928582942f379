use std::cmp::Ordering;
use std::fmt::Display;

use crate::error::SynthesisError;
use crate::model::{PivotRow, SqlValue, TableColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
}

impl CompareOp {
    pub const ALL: [CompareOp; 8] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Is,
        CompareOp::IsNot,
    ];

    /// Three-valued result of `lhs op rhs`. `IS` and `IS NOT` never yield
    /// NULL.
    pub fn apply(self, lhs: &SqlValue, rhs: &SqlValue) -> Option<bool> {
        match self {
            CompareOp::Is => Some(Self::is_same(lhs, rhs)),
            CompareOp::IsNot => Some(!Self::is_same(lhs, rhs)),
            op => {
                let ordering = lhs.compare_sql(rhs)?;
                Some(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Is | CompareOp::IsNot => unreachable!(),
                })
            }
        }
    }

    fn is_same(lhs: &SqlValue, rhs: &SqlValue) -> bool {
        match (lhs.is_null(), rhs.is_null()) {
            (true, true) => true,
            (false, false) => lhs.compare_sql(rhs) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Is => "IS",
            CompareOp::IsNot => "IS NOT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Reference to a column of one of the queried tables.
    Column(TableColumn),
    /// Placeholder for the pivot row's value of a column, filled in by
    /// [`Predicate::resolve_pivots`].
    Pivot(TableColumn),
    Literal(SqlValue),
}

impl Operand {
    fn value<'a>(&'a self, pivot: &'a PivotRow) -> Result<&'a SqlValue, SynthesisError> {
        match self {
            Operand::Column(key) | Operand::Pivot(key) => pivot
                .get(key)
                .map(|cell| cell.value())
                .ok_or_else(|| SynthesisError::MissingPivotValue(key.clone())),
            Operand::Literal(value) => Ok(value),
        }
    }

    fn column(&self) -> Option<&TableColumn> {
        match self {
            Operand::Column(key) | Operand::Pivot(key) => Some(key),
            Operand::Literal(_) => None,
        }
    }

    fn resolve(&self, pivot: &PivotRow) -> Result<Operand, SynthesisError> {
        match self {
            Operand::Pivot(_) => Ok(Operand::Literal(self.value(pivot)?.clone())),
            other => Ok(other.clone()),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Column(key) => write!(f, "{}", key.qualified()),
            Operand::Pivot(key) => write!(f, "pivot({key})"),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// WHERE-clause expression tree.
///
/// Rendering always parenthesizes, so the printed SQL has exactly the
/// structure of the tree regardless of operator precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare(Operand, CompareOp, Operand),
    IsNull(Operand),
    NotNull(Operand),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// `(p IS NULL)`: true exactly when `p` is unknown.
    IsUnknown(Box<Predicate>),
}

impl Predicate {
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn is_unknown(predicate: Predicate) -> Self {
        Predicate::IsUnknown(Box::new(predicate))
    }

    /// Evaluate against the pivot row with SQL three-valued logic; `None`
    /// stands for NULL.
    pub fn eval(&self, pivot: &PivotRow) -> Result<Option<bool>, SynthesisError> {
        Ok(match self {
            Predicate::Compare(lhs, op, rhs) => op.apply(lhs.value(pivot)?, rhs.value(pivot)?),
            Predicate::IsNull(operand) => Some(operand.value(pivot)?.is_null()),
            Predicate::NotNull(operand) => Some(!operand.value(pivot)?.is_null()),
            Predicate::Not(inner) => inner.eval(pivot)?.map(|b| !b),
            Predicate::And(lhs, rhs) => match (lhs.eval(pivot)?, rhs.eval(pivot)?) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Predicate::Or(lhs, rhs) => match (lhs.eval(pivot)?, rhs.eval(pivot)?) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Predicate::IsUnknown(inner) => Some(inner.eval(pivot)?.is_none()),
        })
    }

    pub fn depth(&self) -> usize {
        match self {
            Predicate::Compare(..) | Predicate::IsNull(_) | Predicate::NotNull(_) => 1,
            Predicate::Not(inner) | Predicate::IsUnknown(inner) => 1 + inner.depth(),
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
        }
    }

    /// Replace every pivot placeholder with the pivot's value as a literal.
    pub fn resolve_pivots(&self, pivot: &PivotRow) -> Result<Predicate, SynthesisError> {
        Ok(match self {
            Predicate::Compare(lhs, op, rhs) => {
                Predicate::Compare(lhs.resolve(pivot)?, *op, rhs.resolve(pivot)?)
            }
            Predicate::IsNull(operand) => Predicate::IsNull(operand.resolve(pivot)?),
            Predicate::NotNull(operand) => Predicate::NotNull(operand.resolve(pivot)?),
            Predicate::Not(inner) => Predicate::not(inner.resolve_pivots(pivot)?),
            Predicate::And(lhs, rhs) => {
                Predicate::and(lhs.resolve_pivots(pivot)?, rhs.resolve_pivots(pivot)?)
            }
            Predicate::Or(lhs, rhs) => {
                Predicate::or(lhs.resolve_pivots(pivot)?, rhs.resolve_pivots(pivot)?)
            }
            Predicate::IsUnknown(inner) => Predicate::is_unknown(inner.resolve_pivots(pivot)?),
        })
    }

    /// Wrap the predicate so it evaluates to TRUE on the pivot row.
    pub fn rectify(self, pivot: &PivotRow) -> Result<Predicate, SynthesisError> {
        Ok(match self.eval(pivot)? {
            Some(true) => self,
            Some(false) => Predicate::not(self),
            None => Predicate::is_unknown(self),
        })
    }

    /// Every column the predicate references, in order of appearance.
    pub fn columns(&self) -> Vec<&TableColumn> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a TableColumn>) {
        match self {
            Predicate::Compare(lhs, _, rhs) => {
                out.extend(lhs.column());
                out.extend(rhs.column());
            }
            Predicate::IsNull(o) | Predicate::NotNull(o) => out.extend(o.column()),
            Predicate::Not(inner) | Predicate::IsUnknown(inner) => inner.collect_columns(out),
            Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Compare(lhs, op, rhs) => write!(f, "({lhs} {op} {rhs})"),
            Predicate::IsNull(operand) => write!(f, "({operand} IS NULL)"),
            Predicate::NotNull(operand) => write!(f, "({operand} IS NOT NULL)"),
            Predicate::Not(inner) => write!(f, "(NOT {inner})"),
            Predicate::And(lhs, rhs) => write!(f, "({lhs} AND {rhs})"),
            Predicate::Or(lhs, rhs) => write!(f, "({lhs} OR {rhs})"),
            Predicate::IsUnknown(inner) => write!(f, "({inner} IS NULL)"),
        }
    }
}
