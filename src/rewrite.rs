//! Rebuilds minimal AND/OR unit groups from the canonical per-column
//! contexts produced by [`crate::merge`].
//!
//! The merge step's output is convenient for further algebra (another
//! fusion pass, say) but not for row-at-a-time evaluation: the executor
//! wants a flat list of comparison units per group, the same shape the
//! builder started from, just canonicalized and deduplicated. This is
//! `filterRewrite`/`filterAddGroupUnitFromCtx` in the reference engine —
//! walking each `RangeCtx`/`VarCtx` back out into the minimal unit set
//! that reproduces it.

use crate::builder::{Dnf, Group};
use crate::expr::Operator;
use crate::field::{ColumnId, FieldTable};
use crate::merge::{ColumnCtx, GroupCtx};
use crate::range::EndFlags;
use crate::unit::UnitTable;
use crate::varctx::EntryFlags;

/// Rewrites every fused group back into a flat unit list, skipping any
/// group whose context collapsed to empty (it contributes nothing to the
/// OR) and short-circuiting to a single empty group for any context that
/// collapsed to universal (the whole group always passes).
pub fn rewrite(
    groups: &[GroupCtx],
    fields: &mut FieldTable,
    units: &mut UnitTable,
) -> Dnf {
    let mut out = Vec::with_capacity(groups.len());

    for group in groups {
        match rewrite_group(group, fields, units) {
            RewriteResult::Empty => continue,
            RewriteResult::Universal => return vec![Vec::new()],
            RewriteResult::Group(g) => out.push(g),
        }
    }

    out
}

enum RewriteResult {
    Empty,
    Universal,
    Group(Group),
}

fn rewrite_group(group: &GroupCtx, fields: &mut FieldTable, units: &mut UnitTable) -> RewriteResult {
    let mut out = Vec::new();

    for (col, ctx) in &group.columns {
        match ctx {
            ColumnCtx::Range(r) => {
                if r.is_empty_status() {
                    return RewriteResult::Empty;
                }
                if r.is_all() {
                    continue;
                }
                rewrite_range(*col, r, fields, units, &mut out);
            }
            ColumnCtx::Var(v) => {
                if v.isnull && v.notnull {
                    return RewriteResult::Empty;
                }
                rewrite_var(*col, v, fields, units, &mut out);
            }
        }
    }

    if out.is_empty() {
        RewriteResult::Universal
    } else {
        RewriteResult::Group(out)
    }
}

fn rewrite_range(
    col: ColumnId,
    ctx: &crate::range::RangeCtx,
    fields: &mut FieldTable,
    units: &mut UnitTable,
    out: &mut Group,
) {
    let data_type = fields.column_data_type(col);

    if ctx.isnull {
        out.push(units.intern(Operator::IsNull, col, None, data_type));
        return;
    }
    if ctx.notnull && ctx.ranges().is_empty() {
        out.push(units.intern(Operator::IsNotNull, col, None, data_type));
        return;
    }

    for range in ctx.ranges() {
        // A degenerate point range with both ends inclusive is `=`.
        if !range.sflag.contains(EndFlags::EXCLUDE)
            && !range.eflag.contains(EndFlags::EXCLUDE)
            && range.s == range.e
        {
            let v = fields.intern_value(range.s.clone());
            out.push(units.intern(Operator::Eq, col, Some(v), data_type));
            continue;
        }

        if !range.sflag.contains(EndFlags::NULL) {
            let v = fields.intern_value(range.s.clone());
            let op = if range.sflag.contains(EndFlags::EXCLUDE) {
                Operator::Gt
            } else {
                Operator::Ge
            };
            out.push(units.intern(op, col, Some(v), data_type));
        }
        if !range.eflag.contains(EndFlags::NULL) {
            let v = fields.intern_value(range.e.clone());
            let op = if range.eflag.contains(EndFlags::EXCLUDE) {
                Operator::Lt
            } else {
                Operator::Le
            };
            out.push(units.intern(op, col, Some(v), data_type));
        }
    }
}

fn rewrite_var(
    col: ColumnId,
    ctx: &crate::varctx::VarCtx,
    fields: &mut FieldTable,
    units: &mut UnitTable,
    out: &mut Group,
) {
    let data_type = fields.column_data_type(col);

    if ctx.isnull {
        out.push(units.intern(Operator::IsNull, col, None, data_type));
        return;
    }
    if ctx.notnull && ctx.values.is_empty() && ctx.wilds.is_empty() {
        out.push(units.intern(Operator::IsNotNull, col, None, data_type));
        return;
    }

    for (bytes, flag) in &ctx.values {
        let v = fields.intern_value(crate::types::ScalarValue::Bytes(bytes.clone()));
        let op = if flag.contains(EntryFlags::EXCLUDE) {
            Operator::Ne
        } else {
            Operator::Eq
        };
        out.push(units.intern(op, col, Some(v), data_type));
    }
    for (bytes, _flag) in &ctx.wilds {
        let v = fields.intern_value(crate::types::ScalarValue::Bytes(bytes.clone()));
        out.push(units.intern(Operator::Like, col, Some(v), data_type));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::Builder;
    use crate::expr::{ColumnMeta, Expr, Literal};
    use crate::merge::merge_dnf;
    use crate::types::{DataType, ScalarValue};

    fn col(name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: 7,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn rewrites_and_range_back_to_two_units() {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();

        let dnf = {
            let mut builder = Builder::new(&mut fields, &mut units);
            let expr = Expr::and(
                Expr::compare(
                    crate::expr::Operator::Gt,
                    col("a", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(10)),
                ),
                Expr::compare(
                    crate::expr::Operator::Lt,
                    col("a", DataType::I64),
                    Literal::Scalar(ScalarValue::I64(20)),
                ),
            );
            builder.build(&expr).unwrap()
        };

        let groups = merge_dnf(&dnf, &fields, &units);
        let rewritten = rewrite(&groups, &mut fields, &mut units);

        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].len(), 2);
    }
}
