//! Per-type comparator lookup and min/max sentinels.
//!
//! Stands in for the reference engine's `tcompare`/`tDataTypes` table: a
//! `DataType` names a column's scalar category, and `ScalarValue` carries
//! one decoded value of that type. Comparators are resolved once, by
//! `(DataType, Operator)`, rather than re-dispatched on every row.

use std::cmp::Ordering;

use crate::expr::Operator;

/// The scalar categories a column can carry.
///
/// `Binary` and `NChar` are "no-merge" (variable-length) types: their
/// comparisons can't be folded into a `RangeCtx`, so they're handled by
/// [`crate::varctx::VarCtx`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Timestamp,
    Binary,
    NChar,
}

impl DataType {
    /// Variable-length ("no-merge") types can't be reduced to a `RangeCtx`.
    pub fn is_variable(self) -> bool {
        matches!(self, DataType::Binary | DataType::NChar)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::I8
                | DataType::I16
                | DataType::I32
                | DataType::I64
                | DataType::U8
                | DataType::U16
                | DataType::U32
                | DataType::U64
                | DataType::F32
                | DataType::F64
                | DataType::Timestamp
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, DataType::Bool)
    }

    pub fn is_timestamp(self) -> bool {
        matches!(self, DataType::Timestamp)
    }

    /// Byte width of a fixed-width value of this type. Variable types
    /// report the width of their length-prefix slot only.
    pub fn byte_width(self) -> usize {
        match self {
            DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 | DataType::Timestamp => 8,
            DataType::Binary | DataType::NChar => 8,
        }
    }
}

/// A single decoded scalar value, tagged by the column's data type.
///
/// This is the "void pointer desc/data" of the reference engine rendered
/// as a Rust sum type (see spec.md §9 redesign notes).
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Timestamp(i64),
    Bytes(Vec<u8>),
}

impl Eq for ScalarValue {}

impl PartialOrd for ScalarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScalarValue {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_scalars(self, other)
    }
}

impl std::hash::Hash for ScalarValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            ScalarValue::Bool(v) => v.hash(state),
            ScalarValue::I64(v) => v.hash(state),
            ScalarValue::U64(v) => v.hash(state),
            ScalarValue::F64(v) => v.to_bits().hash(state),
            ScalarValue::Timestamp(v) => v.hash(state),
            ScalarValue::Bytes(v) => v.hash(state),
        }
    }
}

/// A strict total order comparator, resolved once per `(DataType, Operator)`
/// pair and cached on the unit that uses it.
pub type Comparator = fn(&ScalarValue, &ScalarValue) -> Ordering;

/// Compares two scalars of (assumed) matching type. Bytes compare
/// lexicographically; numeric types widen to `f64` only when mixed, which
/// never happens in practice since every unit's operands share the
/// column's declared type.
fn compare_scalars(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    match (a, b) {
        (ScalarValue::Bool(x), ScalarValue::Bool(y)) => x.cmp(y),
        (ScalarValue::I64(x), ScalarValue::I64(y)) => x.cmp(y),
        (ScalarValue::U64(x), ScalarValue::U64(y)) => x.cmp(y),
        (ScalarValue::Timestamp(x), ScalarValue::Timestamp(y)) => x.cmp(y),
        (ScalarValue::F64(x), ScalarValue::F64(y)) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (ScalarValue::Bytes(x), ScalarValue::Bytes(y)) => x.cmp(y),
        _ => panic!("compare_scalars: mismatched scalar variants {:?} vs {:?}", a, b),
    }
}

/// Resolves a comparator function for a `(type, op)` pair the way
/// `getComparFunc` does in the reference engine. Only the ordering
/// operators (`<, <=, =, !=, >=, >`) need a comparator; `LIKE`/`IN`/
/// `IS [NOT] NULL` are handled directly by the executor.
pub fn comparator(data_type: DataType, _op: Operator) -> Comparator {
    let _ = data_type;
    compare_scalars
}

/// The minimum representable sentinel for a type, substituted for an
/// unbounded-below (`NULL` flagged) range endpoint.
pub fn min_value(data_type: DataType) -> ScalarValue {
    match data_type {
        DataType::Bool => ScalarValue::Bool(false),
        DataType::I8 => ScalarValue::I64(i8::MIN as i64),
        DataType::I16 => ScalarValue::I64(i16::MIN as i64),
        DataType::I32 => ScalarValue::I64(i32::MIN as i64),
        DataType::I64 => ScalarValue::I64(i64::MIN),
        DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64 => ScalarValue::U64(0),
        DataType::F32 => ScalarValue::F64(f32::MIN as f64),
        DataType::F64 => ScalarValue::F64(f64::MIN),
        DataType::Timestamp => ScalarValue::Timestamp(i64::MIN),
        DataType::Binary | DataType::NChar => ScalarValue::Bytes(Vec::new()),
    }
}

/// The maximum representable sentinel for a type, substituted for an
/// unbounded-above (`NULL` flagged) range endpoint.
pub fn max_value(data_type: DataType) -> ScalarValue {
    match data_type {
        DataType::Bool => ScalarValue::Bool(true),
        DataType::I8 => ScalarValue::I64(i8::MAX as i64),
        DataType::I16 => ScalarValue::I64(i16::MAX as i64),
        DataType::I32 => ScalarValue::I64(i32::MAX as i64),
        DataType::I64 => ScalarValue::I64(i64::MAX),
        DataType::U8 => ScalarValue::U64(u8::MAX as u64),
        DataType::U16 => ScalarValue::U64(u16::MAX as u64),
        DataType::U32 => ScalarValue::U64(u32::MAX as u64),
        DataType::U64 => ScalarValue::U64(u64::MAX),
        DataType::F32 => ScalarValue::F64(f32::MAX as f64),
        DataType::F64 => ScalarValue::F64(f64::MAX),
        DataType::Timestamp => ScalarValue::Timestamp(i64::MAX),
        DataType::Binary | DataType::NChar => ScalarValue::Bytes(vec![0xff; 64]),
    }
}

/// `true` if the value at this row/column slot represents SQL NULL. The
/// engine only owns the convention (a `None` in `ColumnData`); actual
/// null-bitmap storage is the caller's concern.
pub fn is_null(value: Option<&ScalarValue>) -> bool {
    value.is_none()
}
