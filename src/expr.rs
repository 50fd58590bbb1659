//! The input expression tree handed to the builder by the (external) SQL
//! parser, and the comparison operators it can carry.

use crate::types::{DataType, ScalarValue};
use std::collections::BTreeSet;

/// Comparison operators a leaf node of the expression tree may carry.
///
/// `IsNull`/`IsNotNull` are unary (no right operand); all others are
/// binary. `Like` and `In` are the "no-merge" operators for variable-length
/// columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    Like,
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// `IS NULL`/`IS NOT NULL` are the only unary operators; every other
    /// operator requires a right-hand field.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Operators whose truth can't be folded into a `RangeCtx`/`VarCtx`
    /// range list (they're preserved verbatim through merge and rewrite).
    pub fn is_no_merge(self) -> bool {
        matches!(self, Operator::Like | Operator::In)
    }
}

/// A schema reference carried by a `COL` leaf node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnMeta {
    pub col_id: u32,
    pub name: String,
    pub data_type: DataType,
}

/// A literal value carried by a `VALUE` leaf node, prior to materialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Scalar(ScalarValue),
    /// Binary blob for `IN`, decoded into a sorted value set at build time.
    InSet(BTreeSet<ScalarValue>),
    /// `ts >= lo AND ts <= hi` folded to a literal pair by a constant-folding
    /// pass upstream (trivial equality-to-range conversion, see Non-goals).
    TimeRange(i64, i64),
}

/// The Boolean predicate tree produced by the SQL parser.
#[derive(Debug, Clone)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: Operator,
        left: ColumnMeta,
        right: Option<Literal>,
    },
}

impl Expr {
    pub fn and(l: Expr, r: Expr) -> Expr {
        Expr::And(Box::new(l), Box::new(r))
    }

    pub fn or(l: Expr, r: Expr) -> Expr {
        Expr::Or(Box::new(l), Box::new(r))
    }

    pub fn compare(op: Operator, left: ColumnMeta, right: Literal) -> Expr {
        Expr::Compare {
            op,
            left,
            right: Some(right),
        }
    }

    pub fn is_null(left: ColumnMeta) -> Expr {
        Expr::Compare {
            op: Operator::IsNull,
            left,
            right: None,
        }
    }

    pub fn is_not_null(left: ColumnMeta) -> Expr {
        Expr::Compare {
            op: Operator::IsNotNull,
            left,
            right: None,
        }
    }
}
