//! Set-based analogue of [`RangeCtx`](crate::range::RangeCtx) for
//! variable-length string columns: exact-match values and `LIKE` patterns
//! can't be folded into intervals, so they're tracked as include/exclude
//! tagged hash sets instead.
//!
//! Grounded on `filterAddVarValue`/`filterAddVarOptr` in the reference
//! engine.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::range::{Combiner, RangeOptr};

bitflags! {
    /// Whether a value/pattern has been asserted present (`INCLUDE`),
    /// absent (`EXCLUDE`), or (transiently, while folding) both — which
    /// collapses the whole context to empty (AND) or universal (OR).
    pub struct EntryFlags: u8 {
        const INCLUDE = 0b01;
        const EXCLUDE = 0b10;
    }
}

#[derive(Debug, Clone, Default)]
pub struct VarCtx {
    pub values: HashMap<Vec<u8>, EntryFlags>,
    pub wilds: HashMap<Vec<u8>, EntryFlags>,
    pub isnull: bool,
    pub notnull: bool,
    pub isrange: bool,
    started_and: bool,
    started_or: bool,
}

impl VarCtx {
    pub fn new() -> Self {
        VarCtx::default()
    }

    /// Records `key` (an exact value or a `LIKE` pattern, per `wild`) with
    /// `flag` under `combiner`. Returns `(empty, all)`.
    pub fn add_value(
        &mut self,
        key: &[u8],
        flag: EntryFlags,
        wild: bool,
        combiner: Combiner,
    ) -> (bool, bool) {
        let map = if wild {
            &mut self.wilds
        } else {
            &mut self.values
        };

        let mut empty = false;
        let mut all = false;

        match combiner {
            Combiner::And => {
                self.started_and = true;
                let entry = map.entry(key.to_vec()).or_insert_with(EntryFlags::empty);
                *entry |= flag;
                if entry.is_all() {
                    empty = true;
                }
            }
            Combiner::Or => {
                self.started_or = true;
                let entry = map.entry(key.to_vec()).or_insert_with(EntryFlags::empty);
                *entry |= flag;
                if entry.is_all() {
                    all = true;
                }
            }
        }

        (empty, all)
    }

    /// Same null-ness bookkeeping as `RangeCtx::add_optr`.
    pub fn add_optr(&mut self, optr: RangeOptr, combiner: Combiner) -> (bool, bool) {
        let mut empty = false;
        let mut all = false;

        match combiner {
            Combiner::And => match optr {
                RangeOptr::IsNull => {
                    if self.notnull || self.isrange {
                        empty = true;
                    } else {
                        self.isnull = true;
                    }
                }
                RangeOptr::NotNull => {
                    if self.isnull {
                        empty = true;
                    } else {
                        self.notnull = true;
                    }
                }
                RangeOptr::Range => {
                    if self.isnull {
                        empty = true;
                    } else {
                        self.isrange = true;
                    }
                }
            },
            Combiner::Or => match optr {
                RangeOptr::IsNull => {
                    if self.notnull {
                        all = true;
                    } else {
                        self.isnull = true;
                    }
                }
                RangeOptr::NotNull => {
                    if self.isnull {
                        all = true;
                    } else {
                        self.notnull = true;
                    }
                }
                RangeOptr::Range => {
                    self.isrange = true;
                }
            },
        }

        (empty, all)
    }

    pub fn copy_from(&mut self, other: &VarCtx) {
        self.values = other.values.clone();
        self.wilds = other.wilds.clone();
        self.isnull = other.isnull;
        self.notnull = other.notnull;
        self.isrange = other.isrange;
    }

    pub fn source_from(&mut self, other: &VarCtx, combiner: Combiner) -> (bool, bool) {
        let mut empty = false;
        let mut all = false;

        if other.isnull {
            let (e, a) = self.add_optr(RangeOptr::IsNull, combiner);
            empty |= e;
            all |= a;
        }
        if other.notnull {
            let (e, a) = self.add_optr(RangeOptr::NotNull, combiner);
            empty |= e;
            all |= a;
        }
        if other.isrange {
            let (e, a) = self.add_optr(RangeOptr::Range, combiner);
            empty |= e;
            all |= a;

            if !(combiner == Combiner::Or && self.notnull) {
                for (k, v) in &other.values {
                    let (e, a) = self.add_value(k, *v, false, combiner);
                    empty |= e;
                    all |= a;
                }
                for (k, v) in &other.wilds {
                    let (e, a) = self.add_value(k, *v, true, combiner);
                    empty |= e;
                    all |= a;
                }
            }
        }

        (empty, all)
    }
}

impl EntryFlags {
    fn is_all(self) -> bool {
        self == EntryFlags::all()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn and_same_value_twice_stays_include() {
        let mut ctx = VarCtx::new();
        let (empty, _) = ctx.add_value(b"west", EntryFlags::INCLUDE, false, Combiner::And);
        assert!(!empty);
        let (empty, _) = ctx.add_value(b"west", EntryFlags::INCLUDE, false, Combiner::And);
        assert!(!empty);
    }

    #[test]
    fn and_include_then_exclude_same_value_is_empty() {
        let mut ctx = VarCtx::new();
        ctx.add_value(b"west", EntryFlags::INCLUDE, false, Combiner::And);
        let (empty, _) = ctx.add_value(b"west", EntryFlags::EXCLUDE, false, Combiner::And);
        assert!(empty);
    }

    #[test]
    fn or_include_then_exclude_same_value_is_universal() {
        let mut ctx = VarCtx::new();
        ctx.add_value(b"west", EntryFlags::INCLUDE, false, Combiner::Or);
        let (_, all) = ctx.add_value(b"west", EntryFlags::EXCLUDE, false, Combiner::Or);
        assert!(all);
    }
}
