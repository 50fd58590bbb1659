//! Interning tables for columns and literal values.
//!
//! The reference engine keeps a `colInfo[]`/`fields[]` array per
//! `FilterInfo` and hands out indices (`SFilterFieldId`) rather than
//! repeating column metadata or literal bytes on every unit
//! (`filterAddField`/`filterGetFiledByDesc`). This module is the Rust
//! rendering of that table: a column is interned once per `col_id`, a
//! literal value is interned once per `(data_type, bytes)` pair, and every
//! downstream structure (units, contexts) refers to the small integer id.

use std::collections::HashMap;

use crate::expr::ColumnMeta;
use crate::types::{DataType, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

/// Which side of a unit a field id was interned for — mirrors the
/// `FLD_TYPE_COLUMN`/`FLD_TYPE_VALUE` distinction in `filterAddField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Column,
    Value,
}

/// The interning tables for one `FilterInfo` build. Columns are keyed by
/// `col_id`; values are keyed by their scalar payload so that repeated
/// literals (common in `IN` lists and OR-expanded equalities) share one
/// slot.
#[derive(Debug, Default)]
pub struct FieldTable {
    columns: Vec<ColumnMeta>,
    column_index: HashMap<u32, ColumnId>,
    values: Vec<ScalarValue>,
    value_index: HashMap<ScalarValue, ValueId>,
}

impl FieldTable {
    pub fn new() -> Self {
        FieldTable::default()
    }

    pub fn intern_column(&mut self, meta: &ColumnMeta) -> ColumnId {
        if let Some(id) = self.column_index.get(&meta.col_id) {
            return *id;
        }
        let id = ColumnId(self.columns.len() as u32);
        self.columns.push(meta.clone());
        self.column_index.insert(meta.col_id, id);
        id
    }

    pub fn intern_value(&mut self, value: ScalarValue) -> ValueId {
        if let Some(id) = self.value_index.get(&value) {
            return *id;
        }
        let id = ValueId(self.values.len() as u32);
        self.value_index.insert(value.clone(), id);
        self.values.push(value);
        id
    }

    pub fn column(&self, id: ColumnId) -> &ColumnMeta {
        &self.columns[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &ScalarValue {
        &self.values[id.0 as usize]
    }

    pub fn column_data_type(&self, id: ColumnId) -> DataType {
        self.columns[id.0 as usize].data_type
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn col(id: u32, name: &str, dt: DataType) -> ColumnMeta {
        ColumnMeta {
            col_id: id,
            name: name.to_string(),
            data_type: dt,
        }
    }

    #[test]
    fn interning_dedups_by_key() {
        let mut table = FieldTable::new();
        let a = table.intern_column(&col(1, "region", DataType::Binary));
        let b = table.intern_column(&col(1, "region", DataType::Binary));
        assert_eq!(a, b);

        let v1 = table.intern_value(ScalarValue::I64(42));
        let v2 = table.intern_value(ScalarValue::I64(42));
        assert_eq!(v1, v2);

        let v3 = table.intern_value(ScalarValue::I64(43));
        assert_ne!(v1, v3);
    }
}
