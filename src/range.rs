//! Ordered, non-overlapping interval sets over one scalar column.
//!
//! This is the hard part named in spec.md §2: folding per-column
//! comparisons into canonical range sets under AND/OR, detecting the
//! empty/universal collapses, and tracking null-value semantics
//! alongside the range list.
//!
//! Grounded on `filterAddRange*`/`filterFinishRange` in the reference
//! engine (`examples/original_source/src/query/src/qFilter.c`), redesigned
//! per spec.md §9 to use a small `Vec` of ranges instead of a linked list
//! with a free-list — merges splice the `Vec` in place rather than
//! threading `prev`/`next` pointers and recycling freed nodes.

use std::cmp::Ordering;

use bitflags::bitflags;

use crate::types::{self, comparator, Comparator, DataType, ScalarValue};

bitflags! {
    /// Per-endpoint flags. `NULL` marks an endpoint as unbounded (its
    /// concrete value is a type sentinel substituted in by `add_range`);
    /// `EXCLUDE` marks the endpoint open.
    pub struct EndFlags: u8 {
        const NULL = 0b01;
        const EXCLUDE = 0b10;
    }
}

bitflags! {
    pub struct RangeStatus: u8 {
        const STARTED = 0b0001;
        const EMPTY = 0b0010;
        const ALL = 0b0100;
        const FINISHED = 0b1000;
    }
}

/// AND narrows a `RangeCtx`'s accepted set; OR widens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combiner {
    And,
    Or,
}

/// A single operand passed to [`RangeCtx::add_optr`]: either a bare range
/// contribution, or one of the null-ness operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOptr {
    IsNull,
    NotNull,
    Range,
}

/// A closed-or-open interval `[s, e]` over one scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub s: ScalarValue,
    pub e: ScalarValue,
    pub sflag: EndFlags,
    pub eflag: EndFlags,
}

impl Range {
    pub fn new(s: ScalarValue, e: ScalarValue, sflag: EndFlags, eflag: EndFlags) -> Self {
        Range { s, e, sflag, eflag }
    }

    /// A single-point range `{v}` (used by `=`).
    pub fn point(v: ScalarValue) -> Self {
        Range {
            s: v.clone(),
            e: v,
            sflag: EndFlags::empty(),
            eflag: EndFlags::empty(),
        }
    }

    fn is_empty(&self, cmp: Comparator) -> bool {
        match cmp(&self.s, &self.e) {
            Ordering::Greater => true,
            Ordering::Equal => {
                self.sflag.contains(EndFlags::EXCLUDE) || self.eflag.contains(EndFlags::EXCLUDE)
            }
            Ordering::Less => false,
        }
    }
}

/// `cr` is the sign of `compare(x, y)` where `x` carries `xflag` on the
/// side being compared (e.g. a start endpoint) and `y` carries `yflag`.
/// Returns whether `x` is strictly beyond `y` once open endpoints are
/// accounted for — equal values with either side excluded still count as
/// "beyond" since the shared point isn't in both intervals.
fn greater(cr: Ordering, xflag: EndFlags, yflag: EndFlags) -> bool {
    match cr {
        Ordering::Greater => true,
        Ordering::Equal => xflag.contains(EndFlags::EXCLUDE) || yflag.contains(EndFlags::EXCLUDE),
        Ordering::Less => false,
    }
}

/// Canonical disjoint-interval set over one scalar column, plus the
/// independent null/not-null/has-range flags.
#[derive(Debug, Clone)]
pub struct RangeCtx {
    data_type: DataType,
    timestamp_adjacency: bool,
    comparator: Comparator,
    ranges: Vec<Range>,
    pub isnull: bool,
    pub notnull: bool,
    pub isrange: bool,
    status: RangeStatus,
}

impl RangeCtx {
    /// `timestamp_adjacency` enables the `finish()` fuse of abutting
    /// integer ranges (the `TIMESTAMP` build option in spec.md §6).
    pub fn new(data_type: DataType, timestamp_adjacency: bool) -> Self {
        RangeCtx {
            data_type,
            timestamp_adjacency,
            comparator: comparator(data_type, crate::expr::Operator::Eq),
            ranges: Vec::new(),
            isnull: false,
            notnull: false,
            isrange: false,
            status: RangeStatus::empty(),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_empty_status(&self) -> bool {
        self.status.contains(RangeStatus::EMPTY)
    }

    pub fn is_all(&self) -> bool {
        self.status.contains(RangeStatus::ALL)
    }

    fn mark_empty(&mut self) {
        self.status.insert(RangeStatus::EMPTY);
        self.status.remove(RangeStatus::ALL);
    }

    fn mark_all(&mut self) {
        self.status.insert(RangeStatus::ALL);
        self.status.remove(RangeStatus::EMPTY);
    }

    /// Updates the `(isnull, notnull, isrange)` triple per spec.md's
    /// truth table. Returns `(empty, all)`.
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

        if empty {
            self.mark_empty();
        }
        if all {
            self.mark_all();
        }

        (empty, all)
    }

    /// Folds `r` into the range list under `combiner`. Any `NULL`-flagged
    /// endpoint is substituted with the type's min/max sentinel first
    /// (the flag bit is kept so `post_process` can detect it again).
    pub fn add_range(&mut self, mut r: Range, combiner: Combiner) {
        if r.sflag.contains(EndFlags::NULL) {
            r.s = types::min_value(self.data_type);
        }
        if r.eflag.contains(EndFlags::NULL) {
            r.e = types::max_value(self.data_type);
        }

        let already_started = self.status.contains(RangeStatus::STARTED);
        self.status.insert(RangeStatus::STARTED);

        match combiner {
            Combiner::And => self.and_range(r, already_started),
            Combiner::Or => self.or_range(r),
        }

        if self.ranges.is_empty() {
            self.mark_empty();
        } else {
            self.status.remove(RangeStatus::EMPTY);
        }
    }

    fn cmp(&self, a: &ScalarValue, b: &ScalarValue) -> Ordering {
        (self.comparator)(a, b)
    }

    /// Intersects the existing (disjoint, sorted) range union with `r`,
    /// i.e. replaces the list with `{x ∩ r : x in ranges, non-empty}`.
    ///
    /// The very first range an AND context ever sees has nothing to
    /// intersect against yet — `already_started` is false only on that
    /// first call, and `r` is taken as-is, same as `filterAddRangeImpl`
    /// appending directly when `ctx->rs == NULL`.
    fn and_range(&mut self, r: Range, already_started: bool) {
        if !already_started {
            if !r.is_empty(self.comparator) {
                self.ranges.push(r);
            }
            return;
        }

        let existing_ranges = std::mem::take(&mut self.ranges);
        let mut result = Vec::with_capacity(existing_ranges.len());

        for existing in existing_ranges {
            if let Some(inter) = self.intersect(&existing, &r) {
                if !inter.is_empty(self.comparator) {
                    result.push(inter);
                }
            }
        }

        self.ranges = result;
    }

    fn intersect(&self, a: &Range, b: &Range) -> Option<Range> {
        // Disjoint if a ends before b starts, or vice versa.
        if greater(self.cmp(&a.s, &b.e), a.sflag, b.eflag) {
            return None;
        }
        if greater(self.cmp(&b.s, &a.e), b.sflag, a.eflag) {
            return None;
        }

        let (s, sflag) = self.pick_tighter_start(a, b);
        let (e, eflag) = self.pick_tighter_end(a, b);
        Some(Range::new(s, e, sflag, eflag))
    }

    fn pick_tighter_start(&self, a: &Range, b: &Range) -> (ScalarValue, EndFlags) {
        match self.cmp(&a.s, &b.s) {
            Ordering::Equal => (a.s.clone(), a.sflag | b.sflag),
            Ordering::Greater => (a.s.clone(), a.sflag),
            Ordering::Less => (b.s.clone(), b.sflag),
        }
    }

    fn pick_tighter_end(&self, a: &Range, b: &Range) -> (ScalarValue, EndFlags) {
        match self.cmp(&a.e, &b.e) {
            Ordering::Equal => (a.e.clone(), a.eflag | b.eflag),
            Ordering::Less => (a.e.clone(), a.eflag),
            Ordering::Greater => (b.e.clone(), b.eflag),
        }
    }

    fn pick_wider_start(&self, a: &Range, b: &Range) -> (ScalarValue, EndFlags) {
        match self.cmp(&a.s, &b.s) {
            Ordering::Equal => (a.s.clone(), a.sflag & b.sflag),
            Ordering::Less => (a.s.clone(), a.sflag),
            Ordering::Greater => (b.s.clone(), b.sflag),
        }
    }

    fn pick_wider_end(&self, a: &Range, b: &Range) -> (ScalarValue, EndFlags) {
        match self.cmp(&a.e, &b.e) {
            Ordering::Equal => (a.e.clone(), a.eflag & b.eflag),
            Ordering::Greater => (a.e.clone(), a.eflag),
            Ordering::Less => (b.e.clone(), b.eflag),
        }
    }

    /// True if `a` and `b` share no point and aren't adjacent-inclusive
    /// (i.e. there's a genuine gap between them). Assumes nothing about
    /// relative order.
    fn disjoint_with_gap(&self, a: &Range, b: &Range) -> bool {
        let a_then_b = greater(self.cmp(&a.e, &b.s), a.eflag, b.sflag);
        let b_then_a = greater(self.cmp(&b.e, &a.s), b.eflag, a.sflag);
        a_then_b || b_then_a
    }

    /// Inserts `r` into the sorted disjoint list, absorbing every range it
    /// overlaps or touches into one merged range (OR-widen).
    fn or_range(&mut self, r: Range) {
        let mut merged = r;
        let existing_ranges = std::mem::take(&mut self.ranges);
        let mut kept = Vec::with_capacity(existing_ranges.len() + 1);

        for existing in existing_ranges {
            if self.disjoint_with_gap(&existing, &merged) {
                kept.push(existing);
            } else {
                let (s, sflag) = self.pick_wider_start(&existing, &merged);
                let (e, eflag) = self.pick_wider_end(&existing, &merged);
                merged = Range::new(s, e, sflag, eflag);
            }
        }

        let pos = kept
            .iter()
            .position(|x| self.cmp(&x.s, &merged.s) == Ordering::Greater)
            .unwrap_or(kept.len());
        kept.insert(pos, merged);
        self.ranges = kept;

        if self.ranges.len() == 1 {
            let notnull = self.post_process_inner(0);
            if notnull {
                self.ranges.clear();
                let (_, all) = self.add_optr(RangeOptr::NotNull, Combiner::Or);
                if all {
                    self.mark_all();
                }
            }
        }
    }

    /// Detects when a range's endpoints coincide with the type's min/max
    /// sentinels, converting them to `NULL` flags. Returns `true` when
    /// both ends become unbounded (the range degenerates to "not null").
    fn post_process_inner(&mut self, idx: usize) -> bool {
        let min = types::min_value(self.data_type);
        let max = types::max_value(self.data_type);
        let r = &mut self.ranges[idx];

        let mut s_null = r.sflag.contains(EndFlags::NULL);
        let mut e_null = r.eflag.contains(EndFlags::NULL);

        if !s_null && (self.comparator)(&r.s, &min) == Ordering::Equal {
            r.sflag.insert(EndFlags::NULL);
            s_null = true;
        }
        if !e_null && (self.comparator)(&r.e, &max) == Ordering::Equal {
            r.eflag.insert(EndFlags::NULL);
            e_null = true;
        }

        s_null && e_null
    }

    /// Public form of the post-process check used by the rewriter.
    pub fn post_process(&mut self) {
        for i in 0..self.ranges.len() {
            self.post_process_inner(i);
        }
    }

    /// Idempotent. For timestamp contexts, fuses adjacent ranges where
    /// `prev.e + 1 == next.s` (both sides inclusive).
    pub fn finish(&mut self) {
        if self.status.contains(RangeStatus::FINISHED) {
            return;
        }

        if self.timestamp_adjacency {
            let mut i = 0;
            while i + 1 < self.ranges.len() {
                let adjacent = match (&self.ranges[i].e, &self.ranges[i + 1].s) {
                    (ScalarValue::I64(e), ScalarValue::I64(s)) => *e + 1 == *s,
                    (ScalarValue::Timestamp(e), ScalarValue::Timestamp(s)) => *e + 1 == *s,
                    (ScalarValue::U64(e), ScalarValue::U64(s)) => *e + 1 == *s,
                    _ => false,
                };

                let eflag_ok = !self.ranges[i].eflag.contains(EndFlags::EXCLUDE);
                let sflag_ok = !self.ranges[i + 1].sflag.contains(EndFlags::EXCLUDE);

                if adjacent && eflag_ok && sflag_ok {
                    let next = self.ranges.remove(i + 1);
                    self.ranges[i].e = next.e;
                    self.ranges[i].eflag = next.eflag;
                } else {
                    i += 1;
                }
            }
        }

        self.status.insert(RangeStatus::FINISHED);
    }

    /// After `finish`, the disjoint range list in ascending order.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn copy_from(&mut self, other: &RangeCtx) {
        self.isnull = other.isnull;
        self.notnull = other.notnull;
        self.isrange = other.isrange;
        self.status = other.status;
        self.ranges = other.ranges.clone();
    }

    /// Folds `other`'s null flags and range list into `self` under
    /// `combiner`.
    pub fn source_from(&mut self, other: &RangeCtx, combiner: Combiner) -> (bool, bool) {
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

            // Merging a range into a context that's already unconditionally
            // not-null under OR would be redundant (notnull is a superset).
            if !(combiner == Combiner::Or && self.notnull) {
                for range in other.ranges.clone() {
                    self.add_range(range, combiner);
                }
            }
        }

        if self.is_all() {
            all = true;
        }

        (empty, all)
    }

    /// Structural equality of flags, status, and range list in order.
    pub fn structurally_equal(&self, other: &RangeCtx) -> bool {
        self.status == other.status
            && self.isnull == other.isnull
            && self.notnull == other.notnull
            && self.isrange == other.isrange
            && self.ranges == other.ranges
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::DataType;

    fn i(v: i64) -> ScalarValue {
        ScalarValue::I64(v)
    }

    fn closed(s: i64, e: i64) -> Range {
        Range::new(i(s), i(e), EndFlags::empty(), EndFlags::empty())
    }

    fn gt(v: i64) -> Range {
        Range::new(i(v), i(v), EndFlags::EXCLUDE, EndFlags::NULL)
    }

    fn lt(v: i64) -> Range {
        Range::new(i(v), i(v), EndFlags::NULL, EndFlags::EXCLUDE)
    }

    #[test]
    fn simple_and_on_one_column() {
        // a > 10 AND a < 20
        let mut ctx = RangeCtx::new(DataType::I64, false);
        ctx.add_range(gt(10), Combiner::And);
        ctx.add_range(lt(20), Combiner::And);
        ctx.finish();

        assert_eq!(ctx.ranges().len(), 1);
        let r = &ctx.ranges()[0];
        assert_eq!(r.s, i(10));
        assert_eq!(r.e, i(20));
        assert!(r.sflag.contains(EndFlags::EXCLUDE));
        assert!(r.eflag.contains(EndFlags::EXCLUDE));
    }

    #[test]
    fn range_fusion_on_or() {
        // a >= 1 AND a <= 5  OR  a >= 3 AND a <= 8
        let mut left = RangeCtx::new(DataType::I64, false);
        left.add_range(closed(1, 5), Combiner::And);

        let mut right = RangeCtx::new(DataType::I64, false);
        right.add_range(closed(3, 8), Combiner::And);

        left.source_from(&right, Combiner::Or);
        left.finish();

        assert_eq!(left.ranges().len(), 1);
        assert_eq!(left.ranges()[0].s, i(1));
        assert_eq!(left.ranges()[0].e, i(8));
    }

    #[test]
    fn timestamp_adjacency_fuse() {
        let mut ctx = RangeCtx::new(DataType::Timestamp, true);
        ctx.add_range(
            Range::new(
                ScalarValue::Timestamp(100),
                ScalarValue::Timestamp(200),
                EndFlags::empty(),
                EndFlags::empty(),
            ),
            Combiner::Or,
        );
        ctx.add_range(
            Range::new(
                ScalarValue::Timestamp(201),
                ScalarValue::Timestamp(300),
                EndFlags::empty(),
                EndFlags::empty(),
            ),
            Combiner::Or,
        );
        ctx.finish();

        assert_eq!(ctx.ranges().len(), 1);
        assert_eq!(ctx.ranges()[0].s, ScalarValue::Timestamp(100));
        assert_eq!(ctx.ranges()[0].e, ScalarValue::Timestamp(300));
    }

    #[test]
    fn and_with_universal_is_identity() {
        let mut ctx = RangeCtx::new(DataType::I64, false);
        ctx.add_range(closed(1, 10), Combiner::And);
        ctx.add_range(
            Range::new(i(0), i(0), EndFlags::NULL, EndFlags::NULL),
            Combiner::And,
        );
        ctx.finish();
        assert_eq!(ctx.ranges()[0].s, i(1));
        assert_eq!(ctx.ranges()[0].e, i(10));
    }

    #[test]
    fn and_with_empty_is_empty() {
        let mut ctx = RangeCtx::new(DataType::I64, false);
        ctx.add_range(closed(1, 10), Combiner::And);
        ctx.add_range(closed(20, 30), Combiner::And);
        assert!(ctx.is_empty_status());
        assert!(ctx.ranges().is_empty());
    }

    #[test]
    fn idempotent_or() {
        let mut ctx = RangeCtx::new(DataType::I64, false);
        ctx.add_range(closed(1, 10), Combiner::Or);
        ctx.add_range(closed(1, 10), Combiner::Or);
        assert_eq!(ctx.ranges().len(), 1);
        assert_eq!(ctx.ranges()[0], closed(1, 10));
    }
}
