//! Per-row evaluation of a rewritten DNF against bound column data.
//!
//! Grounded on `filterExecute` in the reference engine: each group is
//! tried in turn and short-circuits on the first failing unit; a unit
//! already evaluated for the current row is never recomputed
//! (`filterExecute`'s `filterUnitStatus` flags, rendered here as a single
//! bitset rebuilt once per row rather than walked pointer-by-pointer).
//! `time_range` mirrors `filterGetTimeRange`'s dedicated pre-rewrite scan
//! for `TSWINDOW` pruning, and `convert_nchar`/`free_nchar` mirror
//! `filterConverNcharColumns`'s buffer-ownership contract.

use std::collections::HashMap;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};

use crate::builder::Dnf;
use crate::expr::Operator;
use crate::field::{ColumnId, FieldTable};
use crate::types::ScalarValue;
use crate::unit::UnitTable;

/// One bound column's decoded values, one slot per row, `None` for SQL
/// NULL. Arrow arrays are decoded once at bind time; row evaluation never
/// touches the original array again.
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    values: Vec<Option<ScalarValue>>,
}

impl ColumnBinding {
    pub fn from_values(values: Vec<Option<ScalarValue>>) -> Self {
        ColumnBinding { values }
    }

    /// Decodes a subset of arrow array types into the engine's scalar
    /// representation. Unsupported array types are the caller's error to
    /// avoid (the engine only ever binds columns declared with a matching
    /// [`crate::types::DataType`] at build time).
    pub fn from_arrow(array: &ArrayRef) -> Self {
        let values = if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
            (0..a.len())
                .map(|i| (!a.is_null(i)).then(|| ScalarValue::I64(a.value(i))))
                .collect()
        } else if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
            (0..a.len())
                .map(|i| (!a.is_null(i)).then(|| ScalarValue::F64(a.value(i))))
                .collect()
        } else if let Some(a) = array.as_any().downcast_ref::<BooleanArray>() {
            (0..a.len())
                .map(|i| (!a.is_null(i)).then(|| ScalarValue::Bool(a.value(i))))
                .collect()
        } else if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
            (0..a.len())
                .map(|i| (!a.is_null(i)).then(|| ScalarValue::Bytes(a.value(i).as_bytes().to_vec())))
                .collect()
        } else {
            panic!("unsupported arrow array type for filter binding");
        };

        ColumnBinding { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A bound column's decoded value at `row`, used both by row
    /// evaluation and by `FilterInfo::convert_nchar` to read values back
    /// out for transcoding.
    pub fn value(&self, row: usize) -> Option<&ScalarValue> {
        self.values[row].as_ref()
    }
}

/// Row-major bound data for every column the rewritten DNF references.
#[derive(Debug, Default)]
pub struct BoundColumns {
    columns: HashMap<ColumnId, ColumnBinding>,
}

impl BoundColumns {
    pub fn new() -> Self {
        BoundColumns::default()
    }

    pub fn bind(&mut self, col: ColumnId, binding: ColumnBinding) {
        self.columns.insert(col, binding);
    }

    fn get(&self, col: ColumnId, row: usize) -> Option<&ScalarValue> {
        self.columns.get(&col).and_then(|b| b.value(row))
    }

    /// Public accessor for a bound column's whole binding, used by
    /// `FilterInfo::convert_nchar` to read and rebind NCHAR columns.
    pub fn column(&self, col: ColumnId) -> Option<&ColumnBinding> {
        self.columns.get(&col)
    }

    pub fn row_count(&self) -> usize {
        self.columns.values().map(|c| c.len()).next().unwrap_or(0)
    }
}

/// Evaluates the whole rewritten DNF for every row, returning a selection
/// bitmap (`true` = row passes). Each group short-circuits on its first
/// failing unit, and a unit seen more than once in the same group (common
/// after fusion) is evaluated once per row via `unit_cache`.
pub fn execute(dnf: &Dnf, fields: &FieldTable, units: &UnitTable, data: &BoundColumns) -> Vec<bool> {
    let n = data.row_count();
    let mut selected = vec![false; n];

    for row in 0..n {
        let mut unit_cache: HashMap<crate::unit::UnitId, bool> = HashMap::new();
        for group in dnf {
            if group
                .iter()
                .all(|id| *unit_cache.entry(*id).or_insert_with(|| {
                    eval_unit(units.get(*id), fields, data, row)
                }))
            {
                selected[row] = true;
                break;
            }
        }
    }

    selected
}

fn eval_unit(
    unit: &crate::unit::Unit,
    fields: &FieldTable,
    data: &BoundColumns,
    row: usize,
) -> bool {
    let cell = data.get(unit.column, row);

    match unit.op {
        Operator::IsNull => cell.is_none(),
        Operator::IsNotNull => cell.is_some(),
        _ => {
            let cell = match cell {
                Some(v) => v,
                None => return false,
            };
            let rhs = fields.value(unit.value.expect("binary op carries a value"));
            match unit.op {
                Operator::Lt => (unit.comparator)(cell, rhs) == std::cmp::Ordering::Less,
                Operator::Le => (unit.comparator)(cell, rhs) != std::cmp::Ordering::Greater,
                Operator::Eq => (unit.comparator)(cell, rhs) == std::cmp::Ordering::Equal,
                Operator::Ne => (unit.comparator)(cell, rhs) != std::cmp::Ordering::Equal,
                Operator::Ge => (unit.comparator)(cell, rhs) != std::cmp::Ordering::Less,
                Operator::Gt => (unit.comparator)(cell, rhs) == std::cmp::Ordering::Greater,
                Operator::Like => like_match(cell, rhs),
                Operator::In => unreachable!("IN is distributed away before rewrite"),
                Operator::IsNull | Operator::IsNotNull => unreachable!(),
            }
        }
    }
}

/// `%`/`_` SQL wildcard match over byte strings. `%` matches any run
/// (including empty); `_` matches exactly one byte.
fn like_match(value: &ScalarValue, pattern: &ScalarValue) -> bool {
    let (v, p) = match (value, pattern) {
        (ScalarValue::Bytes(v), ScalarValue::Bytes(p)) => (v.as_slice(), p.as_slice()),
        _ => return false,
    };
    like_rec(v, p)
}

fn like_rec(v: &[u8], p: &[u8]) -> bool {
    match p.first() {
        None => v.is_empty(),
        Some(b'%') => like_rec(v, &p[1..]) || (!v.is_empty() && like_rec(&v[1..], p)),
        Some(b'_') => !v.is_empty() && like_rec(&v[1..], &p[1..]),
        Some(c) => v.first() == Some(c) && like_rec(&v[1..], &p[1..]),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::Builder;
    use crate::expr::{ColumnMeta, Expr, Literal};
    use crate::field::FieldTable;
    use crate::merge::merge_dnf;
    use crate::rewrite::rewrite;
    use crate::types::DataType;
    use crate::unit::UnitTable;

    fn col(id: u32, name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: id,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn simple_range_predicate_selects_matching_rows() {
        let mut fields = FieldTable::new();
        let mut units = UnitTable::new();
        let column = col(1, "a", DataType::I64);

        let expr = Expr::and(
            Expr::compare(
                crate::expr::Operator::Gt,
                column.clone(),
                Literal::Scalar(ScalarValue::I64(10)),
            ),
            Expr::compare(
                crate::expr::Operator::Lt,
                column.clone(),
                Literal::Scalar(ScalarValue::I64(20)),
            ),
        );

        let dnf = {
            let mut builder = Builder::new(&mut fields, &mut units);
            builder.build(&expr).unwrap()
        };
        let groups = merge_dnf(&dnf, &fields, &units);
        let rewritten = rewrite(&groups, &mut fields, &mut units);

        let col_id = fields.intern_column(&column);
        let mut data = BoundColumns::new();
        data.bind(
            col_id,
            ColumnBinding::from_values(vec![
                Some(ScalarValue::I64(5)),
                Some(ScalarValue::I64(15)),
                Some(ScalarValue::I64(25)),
                None,
            ]),
        );

        let selected = execute(&rewritten, &fields, &units, &data);
        assert_eq!(selected, vec![false, true, false, false]);
    }

    #[test]
    fn like_pattern_matches_wildcards() {
        assert!(like_rec(b"west1", b"west%"));
        assert!(like_rec(b"west", b"w_st"));
        assert!(!like_rec(b"east", b"w_st"));
    }
}
