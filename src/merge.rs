//! Folds each DNF group's flat unit list into one canonical context per
//! column (`filterMergeGroupUnits`), then looks for redundancy between
//! groups and fuses them (`filterMergeTwoGroups`/`filterMergeGroups`).

use std::collections::BTreeMap;

use crate::builder::{Dnf, Group};
use crate::expr::Operator;
use crate::field::{ColumnId, FieldTable};
use crate::range::{Combiner, Range, RangeCtx, RangeOptr};
use crate::unit::{Unit, UnitTable};
use crate::varctx::{EntryFlags, VarCtx};

/// The folded per-column state for one AND-group, plus any units the
/// range/set machinery can't represent and must pass through verbatim
/// (e.g. a no-merge `LIKE` pattern already lives in the `VarCtx`, but
/// `Like` against a column that also has an exact `=` unit still needs
/// both the set *and* the original unit kept for the executor).
#[derive(Debug, Clone)]
pub enum ColumnCtx {
    Range(RangeCtx),
    Var(VarCtx),
}

#[derive(Debug, Clone, Default)]
pub struct GroupCtx {
    pub columns: BTreeMap<ColumnId, ColumnCtx>,
}

impl GroupCtx {
    pub fn column_set(&self) -> Vec<ColumnId> {
        self.columns.keys().copied().collect()
    }
}

/// Builds one `GroupCtx` per DNF group by bucketing its units by column
/// and AND-folding each bucket into a `RangeCtx` or `VarCtx`.
pub fn merge_group_units(group: &Group, fields: &FieldTable, units: &UnitTable) -> GroupCtx {
    let mut by_column: BTreeMap<ColumnId, Vec<&Unit>> = BTreeMap::new();
    for id in group {
        let unit = units.get(*id);
        by_column.entry(unit.column).or_default().push(unit);
    }

    let mut out = GroupCtx::default();
    for (col, unit_list) in by_column {
        let data_type = fields.column_data_type(col);
        let ctx = if data_type.is_variable() {
            ColumnCtx::Var(fold_var(&unit_list, fields))
        } else {
            ColumnCtx::Range(fold_range(&unit_list, fields, data_type))
        };
        out.columns.insert(col, ctx);
    }
    out
}

fn fold_range(units: &[&Unit], fields: &FieldTable, data_type: crate::types::DataType) -> RangeCtx {
    let mut ctx = RangeCtx::new(data_type, data_type.is_timestamp());

    for unit in units {
        match unit.op {
            Operator::IsNull => {
                ctx.add_optr(RangeOptr::IsNull, Combiner::And);
            }
            Operator::IsNotNull => {
                ctx.add_optr(RangeOptr::NotNull, Combiner::And);
            }
            _ => {
                ctx.add_optr(RangeOptr::Range, Combiner::And);
                let value = fields.value(unit.value.expect("non-unary range op carries a value"));
                let range = range_for(unit.op, value.clone());
                ctx.add_range(range, Combiner::And);
            }
        }
    }

    ctx.finish();
    ctx
}

/// Converts one order-comparison unit into the equivalent half-open (or
/// closed, for `=`) interval.
fn range_for(op: Operator, v: crate::types::ScalarValue) -> Range {
    use crate::range::EndFlags;
    match op {
        Operator::Eq => Range::point(v),
        Operator::Lt => Range::new(v.clone(), v, EndFlags::NULL, EndFlags::EXCLUDE),
        Operator::Le => Range::new(v.clone(), v, EndFlags::NULL, EndFlags::empty()),
        Operator::Gt => Range::new(v.clone(), v, EndFlags::EXCLUDE, EndFlags::NULL),
        Operator::Ge => Range::new(v.clone(), v, EndFlags::empty(), EndFlags::NULL),
        other => unreachable!("{:?} is not a range-foldable operator", other),
    }
}

fn fold_var(units: &[&Unit], fields: &FieldTable) -> VarCtx {
    let mut ctx = VarCtx::new();

    for unit in units {
        match unit.op {
            Operator::IsNull => {
                ctx.add_optr(RangeOptr::IsNull, Combiner::And);
            }
            Operator::IsNotNull => {
                ctx.add_optr(RangeOptr::NotNull, Combiner::And);
            }
            Operator::Eq => {
                ctx.add_optr(RangeOptr::Range, Combiner::And);
                let value = fields.value(unit.value.expect("`=` carries a value"));
                let bytes = scalar_bytes(value);
                ctx.add_value(&bytes, EntryFlags::INCLUDE, false, Combiner::And);
            }
            Operator::Ne => {
                ctx.add_optr(RangeOptr::Range, Combiner::And);
                let value = fields.value(unit.value.expect("`!=` carries a value"));
                let bytes = scalar_bytes(value);
                ctx.add_value(&bytes, EntryFlags::EXCLUDE, false, Combiner::And);
            }
            Operator::Like => {
                ctx.add_optr(RangeOptr::Range, Combiner::And);
                let value = fields.value(unit.value.expect("`LIKE` carries a pattern"));
                let bytes = scalar_bytes(value);
                ctx.add_value(&bytes, EntryFlags::INCLUDE, true, Combiner::And);
            }
            other => unreachable!("{:?} has no VarCtx fold", other),
        }
    }

    ctx
}

fn scalar_bytes(v: &crate::types::ScalarValue) -> Vec<u8> {
    match v {
        crate::types::ScalarValue::Bytes(b) => b.clone(),
        other => panic!("expected a byte-string literal on a variable-length column, got {:?}", other),
    }
}

/// Cross-group fusion: if two groups constrain the exact same set of
/// columns and agree on every column but one, the pair can be replaced
/// by a single group in which that one column's context is OR-widened.
/// Mirrors `filterCheckColConflict` + `filterMergeTwoGroups`: a group-pair
/// that doesn't meet this shape is left alone (kept as separate OR arms).
pub fn merge_groups(mut groups: Vec<GroupCtx>) -> Vec<GroupCtx> {
    let mut changed = true;
    while changed {
        changed = false;
        'outer: for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if let Some(fused) = try_fuse(&groups[i], &groups[j]) {
                    groups[i] = fused;
                    groups.remove(j);
                    changed = true;
                    break 'outer;
                }
            }
        }
    }
    groups
}

fn try_fuse(a: &GroupCtx, b: &GroupCtx) -> Option<GroupCtx> {
    let a_cols = a.column_set();
    let b_cols = b.column_set();
    if a_cols != b_cols {
        return None;
    }

    let mut differing: Option<ColumnId> = None;
    for col in &a_cols {
        let (ca, cb) = (&a.columns[col], &b.columns[col]);
        if !column_ctx_equal(ca, cb) {
            if differing.is_some() {
                return None;
            }
            differing = Some(*col);
        }
    }

    let differing = differing?;
    let mut fused = a.clone();
    match (
        fused.columns.get_mut(&differing).unwrap(),
        &b.columns[&differing],
    ) {
        (ColumnCtx::Range(ra), ColumnCtx::Range(rb)) => {
            ra.source_from(rb, Combiner::Or);
            ra.finish();
        }
        (ColumnCtx::Var(va), ColumnCtx::Var(vb)) => {
            va.source_from(vb, Combiner::Or);
        }
        _ => return None,
    }

    Some(fused)
}

fn column_ctx_equal(a: &ColumnCtx, b: &ColumnCtx) -> bool {
    match (a, b) {
        (ColumnCtx::Range(ra), ColumnCtx::Range(rb)) => ra.structurally_equal(rb),
        (ColumnCtx::Var(va), ColumnCtx::Var(vb)) => {
            va.values == vb.values
                && va.wilds == vb.wilds
                && va.isnull == vb.isnull
                && va.notnull == vb.notnull
                && va.isrange == vb.isrange
        }
        _ => false,
    }
}

/// Folds every group in a DNF, then applies cross-group fusion.
pub fn merge_dnf(dnf: &Dnf, fields: &FieldTable, units: &UnitTable) -> Vec<GroupCtx> {
    let folded: Vec<GroupCtx> = dnf
        .iter()
        .map(|g| merge_group_units(g, fields, units))
        .collect();
    merge_groups(folded)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::Builder;
    use crate::expr::{ColumnMeta, Expr, Literal};
    use crate::types::{DataType, ScalarValue};

    fn col(name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: 1,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn fuses_redundant_or_arm_on_shared_column() {
        // (a = 1 AND b > 0) OR (a = 1 AND b > 5)  ==  a = 1 AND b > 0
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();
        let dnf = {
            let mut builder = Builder::new(&mut fields, &mut units);
            let left = Expr::and(
                Expr::compare(
                    crate::expr::Operator::Eq,
                    col("a", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(1)),
                ),
                Expr::compare(
                    crate::expr::Operator::Gt,
                    col("b", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(0)),
                ),
            );
            let right = Expr::and(
                Expr::compare(
                    crate::expr::Operator::Eq,
                    col("a", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(1)),
                ),
                Expr::compare(
                    crate::expr::Operator::Gt,
                    col("b", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(5)),
                ),
            );
            builder.build(&Expr::or(left, right)).unwrap()
        };

        let groups = merge_dnf(&dnf, &fields, &units);
        assert_eq!(groups.len(), 1);
    }
}
