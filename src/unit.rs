//! A single comparison unit: one operator applied to one column and
//! (usually) one value. Grounded on `SFilterUnit`/`filterAddUnit` in the
//! reference engine — a unit there is `(compare_func, left_field,
//! right_field, operator)`; here the comparator is resolved once at
//! intern time and cached alongside the field ids.

use crate::expr::Operator;
use crate::field::{ColumnId, ValueId};
use crate::types::{comparator, Comparator, DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u32);

/// One leaf comparison: `column <op> value`, or `column IS [NOT] NULL`
/// when `value` is `None`.
#[derive(Debug, Clone)]
pub struct Unit {
    pub op: Operator,
    pub column: ColumnId,
    pub value: Option<ValueId>,
    pub comparator: Comparator,
}

impl Unit {
    pub fn new(op: Operator, column: ColumnId, value: Option<ValueId>, data_type: DataType) -> Self {
        Unit {
            op,
            column,
            value,
            comparator: comparator(data_type, op),
        }
    }
}

/// Interns units the way `filterAddUnit` dedups by `(op, left, right)` so
/// that repeated predicates across OR-expanded groups share one unit.
#[derive(Debug, Default)]
pub struct UnitTable {
    units: Vec<Unit>,
    index: std::collections::HashMap<(Operator, u32, Option<u32>), UnitId>,
}

impl UnitTable {
    pub fn new() -> Self {
        UnitTable::default()
    }

    pub fn intern(
        &mut self,
        op: Operator,
        column: ColumnId,
        value: Option<ValueId>,
        data_type: DataType,
    ) -> UnitId {
        let key = (op, column.0, value.map(|v| v.0));
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = UnitId(self.units.len() as u32);
        self.units.push(Unit::new(op, column, value, data_type));
        self.index.insert(key, id);
        id
    }

    pub fn get(&self, id: UnitId) -> &Unit {
        &self.units[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::ColumnId;

    #[test]
    fn interning_dedups_identical_units() {
        let mut units = UnitTable::new();
        let a = units.intern(Operator::Eq, ColumnId(0), Some(ValueId(0)), DataType::I64);
        let b = units.intern(Operator::Eq, ColumnId(0), Some(ValueId(0)), DataType::I64);
        assert_eq!(a, b);

        let c = units.intern(Operator::Eq, ColumnId(0), Some(ValueId(1)), DataType::I64);
        assert_ne!(a, c);
    }
}
