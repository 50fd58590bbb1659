//! Top-level entry point: builds a [`FilterInfo`] from an [`Expr`] tree
//! and schema, then evaluates it against bound column data.
//!
//! Grounded on `filterInitFromTree`/`SFilterInfo` in the reference engine
//! — a `FilterInfo` owns the interning tables and the canonicalized group
//! list, and the compiled predicate itself (groups, rewritten DNF) is
//! immutable once built and safe to share across worker threads that each
//! own their own `BoundColumns` and call `execute` independently. The
//! NCHAR scratch state touched by `convert_nchar`/`free_nchar` is the one
//! exception: it is per-instance, mutated in place, and not meant to be
//! driven concurrently from more than one thread.

use std::collections::HashMap;

use tracing::debug;

use crate::builder::{Builder, Dnf};
use crate::error::{AppErrorSnafu, InvalidTimeConditionSnafu, Result, UnsupportedTypeSnafu};
use crate::executor::{self, BoundColumns, ColumnBinding};
use crate::expr::Expr;
use crate::field::{ColumnId, FieldTable};
use crate::merge::{self, ColumnCtx, GroupCtx};
use crate::range::{Combiner, RangeCtx, RangeOptr};
use crate::rewrite;
use crate::types::{DataType, ScalarValue};
use crate::unit::UnitTable;
use snafu::ensure;

bitflags::bitflags! {
    /// Build-time options, mirroring the reference engine's
    /// `FLT_OPTION_*` flags passed to `filterInitFromTree`.
    pub struct FilterOptions: u8 {
        /// Fuse adjacent integer/timestamp ranges in `finish()`.
        const TIMESTAMP_ADJACENCY = 0b01;
        /// Skip cross-group fusion (useful for debugging/benchmarking the
        /// unfused group count).
        const SKIP_GROUP_FUSION = 0b10;
    }
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions::TIMESTAMP_ADJACENCY
    }
}

/// A single column's time span, `skey ..= ekey`. `skey > ekey` is the
/// reference engine's `TSWINDOW_DESC_INITIALIZER` idiom for "no row can
/// possibly match" — an empty window is a valid result, not an error,
/// since an unsatisfiable predicate is a perfectly ordinary filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub skey: i64,
    pub ekey: i64,
}

impl TimeWindow {
    /// The widest representable window: no timestamp predicate actually
    /// constrains the range, so every row's timestamp qualifies.
    pub const ALL: TimeWindow = TimeWindow {
        skey: i64::MIN,
        ekey: i64::MAX,
    };

    /// No row can match; mirrors `TSWINDOW_DESC_INITIALIZER`.
    pub const NONE: TimeWindow = TimeWindow {
        skey: i64::MAX,
        ekey: i64::MIN,
    };
}

/// A compiled filter: interning tables, the canonical per-group contexts,
/// and the rewritten minimal unit groups used for execution.
#[derive(Debug)]
pub struct FilterInfo {
    fields: FieldTable,
    units: UnitTable,
    groups: Vec<GroupCtx>,
    rewritten: Dnf,
    /// Pre-transcode NCHAR column buffers retained by the last
    /// `convert_nchar` call, released by `free_nchar`.
    nchar_scratch: HashMap<ColumnId, ColumnBinding>,
}

impl FilterInfo {
    /// Compiles `expr` into DNF, folds each group's units into canonical
    /// per-column contexts, fuses redundant groups, and rewrites the
    /// fused contexts back into a minimal executable unit list.
    ///
    /// Fails if the tree is structurally malformed (an operator without
    /// the operand shape it requires, the reference engine's
    /// `TSDB_CODE_QRY_APP_ERROR` case) or if a leaf compares a
    /// variable-length column with an order operator it has no ordering
    /// for (`UnsupportedType`).
    pub fn build(expr: &Expr, options: FilterOptions) -> Result<FilterInfo> {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();

        let dnf = {
            let mut builder = Builder::new(&mut fields, &mut units);
            builder.build(expr)?
        };
        ensure!(
            !dnf.is_empty(),
            AppErrorSnafu {
                message: "empty predicate produced no groups"
            }
        );

        let mut groups: Vec<GroupCtx> = dnf
            .iter()
            .map(|g| merge::merge_group_units(g, &fields, &units))
            .collect();
        if !options.contains(FilterOptions::SKIP_GROUP_FUSION) {
            groups = merge::merge_groups(groups);
        }

        let rewritten = rewrite::rewrite(&groups, &mut fields, &mut units);
        debug!(
            groups = groups.len(),
            units = units.len(),
            "compiled filter"
        );

        Ok(FilterInfo {
            fields,
            units,
            groups,
            rewritten,
            nchar_scratch: HashMap::new(),
        })
    }

    /// Evaluates the compiled filter against bound column data, one
    /// boolean per row.
    pub fn execute(&self, data: &BoundColumns) -> Vec<bool> {
        executor::execute(&self.rewritten, &self.fields, &self.units, data)
    }

    /// Extracts the bounding time window of the compiled predicate.
    ///
    /// Mirrors `filterGetTimeRange`: each group's already-AND-folded
    /// context for the timestamp column is OR-folded into a running
    /// accumulator (a group with no entry for that column leaves the
    /// timestamp unconstrained, contributing "not null" to the fold).
    /// The accumulator is accepted only if it collapses to "not null"
    /// (every row's timestamp qualifies, so the widest possible window
    /// is returned), to zero ranges (the predicate is unsatisfiable, so
    /// no window contains a match), or to exactly one range. Collapsing
    /// to more than one disjoint range — a predicate like
    /// `ts < 10 OR ts > 20` — can't be expressed as a single window and
    /// fails with `INVALID_TIME_CONDITION`. A schema with no timestamp
    /// column referenced by the predicate is treated as unconstrained.
    pub fn time_range(&self) -> Result<TimeWindow> {
        let ts_col = match self.find_timestamp_column() {
            Some(c) => c,
            None => return Ok(TimeWindow::ALL),
        };
        let data_type = self.fields.column_data_type(ts_col);

        let mut acc = RangeCtx::new(data_type, true);
        for group in &self.groups {
            match group.columns.get(&ts_col) {
                Some(ColumnCtx::Range(r)) => {
                    let mut contribution = r.clone();
                    contribution.finish();
                    acc.source_from(&contribution, Combiner::Or);
                }
                Some(ColumnCtx::Var(_)) => {
                    return UnsupportedTypeSnafu { data_type }.fail();
                }
                None => {
                    let mut unconstrained = RangeCtx::new(data_type, true);
                    unconstrained.add_optr(RangeOptr::NotNull, Combiner::And);
                    acc.source_from(&unconstrained, Combiner::Or);
                }
            }
        }
        acc.finish();

        if acc.notnull {
            return Ok(TimeWindow::ALL);
        }

        match acc.ranges() {
            [] => Ok(TimeWindow::NONE),
            [only] => Ok(TimeWindow {
                skey: scalar_i64(&only.s),
                ekey: scalar_i64(&only.e),
            }),
            _ => InvalidTimeConditionSnafu {
                message: "timestamp predicate folds to more than one disjoint range",
            }
            .fail(),
        }
    }

    fn find_timestamp_column(&self) -> Option<ColumnId> {
        self.fields
            .columns()
            .iter()
            .position(|c| c.data_type == DataType::Timestamp)
            .map(|i| ColumnId(i as u32))
    }

    /// Transcodes every bound NCHAR column's raw bytes through
    /// `transcode` and rebinds `data` with the result, retaining the
    /// pre-transcode buffers in `self` so `free_nchar` can release them.
    /// Returns whether any NCHAR column was actually present and
    /// converted.
    ///
    /// Mirrors `filterConverNcharColumns`: the engine owns only the
    /// buffers' lifetime here (tracked in `nchar_scratch`); the actual
    /// transcoding — UCS4 to the comparison encoding, or back — is
    /// supplied by the caller, since it depends on a wide-character
    /// convention this crate has no reason to know about.
    pub fn convert_nchar<F>(&mut self, data: &mut BoundColumns, rows: usize, mut transcode: F) -> bool
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        let nchar_cols: Vec<ColumnId> = self
            .fields
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.data_type == DataType::NChar)
            .map(|(i, _)| ColumnId(i as u32))
            .collect();

        let mut got_nchar = false;
        for col in nchar_cols {
            let original = match data.column(col) {
                Some(binding) => binding.clone(),
                None => continue,
            };
            got_nchar = true;

            let row_count = rows.min(original.len());
            let transcoded = (0..row_count)
                .map(|row| match original.value(row) {
                    Some(ScalarValue::Bytes(raw)) => Some(ScalarValue::Bytes(transcode(raw))),
                    other => other.cloned(),
                })
                .collect();

            self.nchar_scratch.insert(col, original);
            data.bind(col, ColumnBinding::from_values(transcoded));
        }

        got_nchar
    }

    /// Releases the pre-transcode NCHAR buffers retained by the last
    /// `convert_nchar` call.
    pub fn free_nchar(&mut self) {
        self.nchar_scratch.clear();
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

fn scalar_i64(v: &ScalarValue) -> i64 {
    match v {
        ScalarValue::Timestamp(v) | ScalarValue::I64(v) => *v,
        ScalarValue::U64(v) => *v as i64,
        other => panic!("time_range called on a non-integer column: {:?}", other),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::{ColumnMeta, Literal, Operator};
    use crate::types::DataType;

    fn col(id: u32, name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: id,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn time_range_extracted_when_every_arm_bounds_ts() {
        let ts = col(0, "ts", DataType::Timestamp);
        let expr = Expr::and(
            Expr::compare(
                Operator::Ge,
                ts.clone(),
                Literal::Scalar(ScalarValue::Timestamp(100)),
            ),
            Expr::compare(Operator::Le, ts, Literal::Scalar(ScalarValue::Timestamp(200))),
        );
        let filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();
        let window = filter.time_range().unwrap();
        assert_eq!(window, TimeWindow { skey: 100, ekey: 200 });
    }

    #[test]
    fn time_range_is_unbounded_when_or_arm_leaves_ts_unconstrained() {
        let ts = col(0, "ts", DataType::Timestamp);
        let other = col(1, "a", DataType::I64);
        let expr = Expr::or(
            Expr::compare(Operator::Ge, ts, Literal::Scalar(ScalarValue::Timestamp(100))),
            Expr::compare(Operator::Eq, other, Literal::Scalar(ScalarValue::I64(1))),
        );
        let filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();
        assert_eq!(filter.time_range().unwrap(), TimeWindow::ALL);
    }

    #[test]
    fn time_range_fails_on_more_than_one_disjoint_range() {
        let ts = col(0, "ts", DataType::Timestamp);
        let expr = Expr::or(
            Expr::compare(Operator::Lt, ts.clone(), Literal::Scalar(ScalarValue::Timestamp(10))),
            Expr::compare(Operator::Gt, ts, Literal::Scalar(ScalarValue::Timestamp(20))),
        );
        let filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();
        let err = filter.time_range().unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidTimeCondition { .. }));
    }

    #[test]
    fn time_range_is_none_window_for_unsatisfiable_predicate() {
        let ts = col(0, "ts", DataType::Timestamp);
        let expr = Expr::and(
            Expr::compare(Operator::Gt, ts.clone(), Literal::Scalar(ScalarValue::Timestamp(200))),
            Expr::compare(Operator::Lt, ts, Literal::Scalar(ScalarValue::Timestamp(100))),
        );
        let filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();
        assert_eq!(filter.time_range().unwrap(), TimeWindow::NONE);
    }

    #[test]
    fn convert_nchar_transcodes_and_reports_presence() {
        let name = col(0, "name", DataType::NChar);
        let expr = Expr::compare(
            Operator::Eq,
            name,
            Literal::Scalar(ScalarValue::Bytes(b"west".to_vec())),
        );
        let mut filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();

        let col_id = filter
            .fields()
            .columns()
            .iter()
            .position(|c| c.col_id == 0)
            .map(|i| ColumnId(i as u32))
            .unwrap();

        let mut data = BoundColumns::new();
        data.bind(
            col_id,
            ColumnBinding::from_values(vec![Some(ScalarValue::Bytes(b"raw-west".to_vec()))]),
        );

        let got_nchar = filter.convert_nchar(&mut data, 1, |raw| raw.to_ascii_uppercase());
        assert!(got_nchar);

        let rebound = data.column(col_id).unwrap();
        assert_eq!(
            rebound.value(0),
            Some(&ScalarValue::Bytes(b"RAW-WEST".to_vec()))
        );

        filter.free_nchar();
        assert!(filter.nchar_scratch.is_empty());
    }

    #[test]
    fn convert_nchar_reports_absence_when_no_nchar_column_bound() {
        let a = col(1, "a", DataType::I64);
        let expr = Expr::compare(Operator::Eq, a, Literal::Scalar(ScalarValue::I64(1)));
        let mut filter = FilterInfo::build(&expr, FilterOptions::default()).unwrap();
        let mut data = BoundColumns::new();
        assert!(!filter.convert_nchar(&mut data, 0, |raw| raw.to_vec()));
    }
}
