//! Converts an [`Expr`] tree into disjunctive normal form: a list of
//! AND-groups, each a list of unit ids, such that the whole filter passes
//! a row iff at least one group's units all pass.
//!
//! Grounded on `filterTreeToGroup`/`filterAddGroupUnitFromNode` in the
//! reference engine: `AND` is the Cartesian product of its operands'
//! group lists (`filterDetachCnfGroups`-style "detach and cross"), `OR`
//! is concatenation, and a leaf `IN (v1, v2, ...)` is distributed into one
//! group per value before either combinator sees it.

use crate::error::{Result, UnsupportedTypeSnafu};
use crate::expr::{ColumnMeta, Expr, Literal, Operator};
use crate::field::FieldTable;
use crate::unit::{UnitId, UnitTable};
use snafu::ensure;

/// One conjunct: every unit in the group must hold for the group to hold.
pub type Group = Vec<UnitId>;

/// The whole predicate as an OR of AND-groups.
pub type Dnf = Vec<Group>;

pub struct Builder<'a> {
    fields: &'a mut FieldTable,
    units: &'a mut UnitTable,
}

impl<'a> Builder<'a> {
    pub fn new(fields: &'a mut FieldTable, units: &'a mut UnitTable) -> Self {
        Builder { fields, units }
    }

    pub fn build(&mut self, expr: &Expr) -> Result<Dnf> {
        match expr {
            Expr::And(l, r) => {
                let left = self.build(l)?;
                let right = self.build(r)?;
                Ok(cross_product(&left, &right))
            }
            Expr::Or(l, r) => {
                let mut left = self.build(l)?;
                let right = self.build(r)?;
                left.extend(right);
                Ok(left)
            }
            Expr::Compare { op, left, right } => self.build_leaf(*op, left, right.as_ref()),
        }
    }

    /// A bare leaf is one group of one unit, except `IN`, which distributes
    /// into one group per candidate value (an `IN` leaf's groups are later
    /// OR-combined by whatever `OR`/`AND` sits above it, exactly as a
    /// hand-expanded `col = v1 OR col = v2 OR ...` would be).
    ///
    /// Fails with `UnsupportedType` for an order comparison (`<`, `<=`,
    /// `>=`, `>`) against a variable-length column — those have no
    /// ordering and can only ever be folded into a `VarCtx` via `=`,
    /// `!=`, `LIKE`, or the null-ness operators.
    fn build_leaf(&mut self, op: Operator, col: &ColumnMeta, right: Option<&Literal>) -> Result<Dnf> {
        ensure!(
            !(col.data_type.is_variable()
                && matches!(op, Operator::Lt | Operator::Le | Operator::Ge | Operator::Gt)),
            UnsupportedTypeSnafu {
                data_type: col.data_type
            }
        );

        let column = self.fields.intern_column(col);

        let dnf = match (op, right) {
            (Operator::In, Some(Literal::InSet(set))) => set
                .iter()
                .map(|v| {
                    let value = self.fields.intern_value(v.clone());
                    let unit =
                        self.units
                            .intern(Operator::Eq, column, Some(value), col.data_type);
                    vec![unit]
                })
                .collect(),
            // `a != v` on an ordered column is distributed into
            // `a < v OR a > v` here rather than taught to RangeCtx as a
            // third range shape — it folds into the same
            // AND-distributes-over-OR machinery as `IN` above. Variable-
            // length columns have no ordering, so `!=` there stays a
            // single unit and is handled by VarCtx's EXCLUDE entries.
            (Operator::Ne, Some(Literal::Scalar(v))) if !col.data_type.is_variable() => {
                let value = self.fields.intern_value(v.clone());
                let lt = self.units.intern(Operator::Lt, column, Some(value), col.data_type);
                let gt = self.units.intern(Operator::Gt, column, Some(value), col.data_type);
                vec![vec![lt], vec![gt]]
            }
            (_, Some(Literal::Scalar(v))) => {
                let value = self.fields.intern_value(v.clone());
                let unit = self.units.intern(op, column, Some(value), col.data_type);
                vec![vec![unit]]
            }
            (_, Some(Literal::TimeRange(lo, hi))) => {
                let lo_id = self
                    .fields
                    .intern_value(crate::types::ScalarValue::Timestamp(*lo));
                let hi_id = self
                    .fields
                    .intern_value(crate::types::ScalarValue::Timestamp(*hi));
                let ge = self
                    .units
                    .intern(Operator::Ge, column, Some(lo_id), col.data_type);
                let le = self
                    .units
                    .intern(Operator::Le, column, Some(hi_id), col.data_type);
                vec![vec![ge, le]]
            }
            (Operator::IsNull, None) | (Operator::IsNotNull, None) => {
                let unit = self.units.intern(op, column, None, col.data_type);
                vec![vec![unit]]
            }
            _ => unreachable!("malformed leaf: {:?} with right={:?}", op, right),
        };

        Ok(dnf)
    }
}

fn cross_product(left: &Dnf, right: &Dnf) -> Dnf {
    let mut out = Vec::with_capacity(left.len() * right.len().max(1));
    for l in left {
        for r in right {
            let mut group = l.clone();
            group.extend(r.iter().copied());
            out.push(group);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DataType;
    use std::collections::BTreeSet;

    fn col(name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: 1,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn and_of_two_leaves_is_one_group() {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();
        let mut builder = Builder::new(&mut fields, &mut units);

        let expr = Expr::and(
            Expr::compare(
                Operator::Gt,
                col("a", DataType::I64),
                Literal::Scalar(crate::types::ScalarValue::I64(10)),
            ),
            Expr::compare(
                Operator::Lt,
                col("a", DataType::I64),
                Literal::Scalar(crate::types::ScalarValue::I64(20)),
            ),
        );

        let dnf = builder.build(&expr).unwrap();
        assert_eq!(dnf.len(), 1);
        assert_eq!(dnf[0].len(), 2);
    }

    #[test]
    fn or_of_two_leaves_is_two_groups() {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();
        let mut builder = Builder::new(&mut fields, &mut units);

        let expr = Expr::or(
            Expr::compare(
                Operator::Eq,
                col("a", DataType::I64),
                Literal::Scalar(crate::types::ScalarValue::I64(1)),
            ),
            Expr::compare(
                Operator::Eq,
                col("a", DataType::I64),
                Literal::Scalar(crate::types::ScalarValue::I64(2)),
            ),
        );

        let dnf = builder.build(&expr).unwrap();
        assert_eq!(dnf.len(), 2);
    }

    #[test]
    fn in_list_distributes_then_crosses_with_and() {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();
        let mut builder = Builder::new(&mut fields, &mut units);

        let mut set = BTreeSet::new();
        set.insert(crate::types::ScalarValue::I64(1));
        set.insert(crate::types::ScalarValue::I64(2));
        set.insert(crate::types::ScalarValue::I64(3));

        let expr = Expr::and(
            Expr::compare(Operator::In, col("a", DataType::I64), Literal::InSet(set)),
            Expr::compare(
                Operator::Gt,
                col("b", DataType::I64),
                Literal::Scalar(crate::types::ScalarValue::I64(0)),
            ),
        );

        let dnf = builder.build(&expr).unwrap();
        assert_eq!(dnf.len(), 3);
        for group in &dnf {
            assert_eq!(group.len(), 2);
        }
    }
}
