//! Per-region lifting of the RIC lattice.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::ops;

use itertools::Itertools;

use crate::ric::Ric;
use crate::RegionId;

/// All addresses an abstract value could hold: a map from memory regions to
/// *offsets* from the start of that region, plus a sentinel for "any value
/// in any region".
///
/// An absent region key means the value holds no offset in that region; the
/// empty map is an undefined value, which is not the same thing as a region
/// mapped to an explicit bottom. Value-sets are never simplified between the
/// two encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSet {
    values: BTreeMap<RegionId, Ric>,
    top: bool,
}

impl ValueSet {
    /// The undefined value: no offsets in any region.
    pub fn new() -> Self {
        Self::default()
    }

    /// The sentinel for "any value in any region".
    pub fn top() -> Self {
        Self {
            values: BTreeMap::new(),
            top: true,
        }
    }

    pub fn is_top(&self) -> bool {
        self.top
    }

    /// Whether the value is undefined (no offsets, not top).
    pub fn is_empty(&self) -> bool {
        !self.top && self.values.is_empty()
    }

    pub fn get(&self, region: RegionId) -> Option<&Ric> {
        self.values.get(&region)
    }

    pub fn insert(&mut self, region: RegionId, ric: Ric) {
        self.values.insert(region, ric);
    }

    /// The regions the value may point into, with their offset sets.
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &Ric)> {
        self.values.iter().map(|(region, ric)| (*region, ric))
    }

    /// The single held integer, when the value is a one-region constant.
    pub fn as_constant(&self) -> Option<i64> {
        if self.top || self.values.len() != 1 {
            return None;
        }

        self.values.values().next().and_then(Ric::as_constant)
    }

    /// Whether every address denoted by `self` is denoted by `rhs`.
    pub fn is_subset(&self, rhs: &ValueSet) -> bool {
        if rhs.top {
            return true;
        }

        if self.top {
            return false;
        }

        self.values.iter().all(|(region, ric)| {
            rhs.values
                .get(region)
                .is_some_and(|other| ric.is_subset(other))
        })
    }

    /// Intersect with `rhs`: regions absent from `rhs` are dropped, shared
    /// regions meet pointwise.
    pub fn meet_with(&mut self, rhs: &ValueSet) {
        if rhs.top {
            return;
        }

        if self.top {
            *self = rhs.clone();
            return;
        }

        let values = std::mem::take(&mut self.values);
        for (region, mut ric) in values {
            if let Some(other) = rhs.values.get(&region) {
                ric.meet_with(other);
                self.values.insert(region, ric);
            }
        }
    }

    /// Union with `rhs`: shared regions join pointwise, regions only in
    /// `rhs` are inserted, since the value may point into either region.
    pub fn join_with(&mut self, rhs: &ValueSet) {
        if self.top {
            return;
        }

        if rhs.top {
            self.values.clear();
            self.top = true;
            return;
        }

        for (region, ric) in &rhs.values {
            match self.values.entry(*region) {
                Entry::Occupied(mut entry) => entry.get_mut().join_with(ric),
                Entry::Vacant(entry) => {
                    entry.insert(*ric);
                }
            }
        }
    }

    /// Widen pointwise over the regions present on both sides; other
    /// regions are untouched.
    pub fn widen_with(&mut self, rhs: &ValueSet) {
        if self.top {
            return;
        }

        if rhs.top {
            self.values.clear();
            self.top = true;
            return;
        }

        for (region, ric) in &mut self.values {
            if let Some(other) = rhs.values.get(region) {
                ric.widen_with(other);
            }
        }
    }

    /// Narrow pointwise over the regions present on both sides.
    pub fn narrow_with(&mut self, rhs: &ValueSet) {
        if self.top || rhs.top {
            return;
        }

        for (region, ric) in &mut self.values {
            if let Some(other) = rhs.values.get(region) {
                ric.narrow_with(other);
            }
        }
    }

    /// Pointer arithmetic: shift every region's offsets by `amount`.
    pub fn adjust(&mut self, amount: i64) {
        for ric in self.values.values_mut() {
            ric.translate(amount);
        }
    }

    /// Forget every lower bound; used when a back edge invalidates them.
    pub fn remove_lower_bounds(&mut self) {
        for ric in self.values.values_mut() {
            ric.remove_lower_bound();
        }
    }

    /// Forget every upper bound.
    pub fn remove_upper_bounds(&mut self) {
        for ric in self.values.values_mut() {
            ric.remove_upper_bound();
        }
    }
}

impl FromIterator<(RegionId, Ric)> for ValueSet {
    fn from_iter<I: IntoIterator<Item = (RegionId, Ric)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            top: false,
        }
    }
}

impl<const N: usize> From<[(RegionId, Ric); N]> for ValueSet {
    fn from(entries: [(RegionId, Ric); N]) -> Self {
        entries.into_iter().collect()
    }
}

// Adding two value-sets only has a precise meaning when one side is a plain
// integer; everything else over-approximates to top.
impl<'a, 'b> ops::Add<&'b ValueSet> for &'a ValueSet {
    type Output = ValueSet;

    fn add(self, rhs: &'b ValueSet) -> ValueSet {
        if self.is_top() || rhs.is_top() {
            return ValueSet::top();
        }

        if let Some(amount) = rhs.as_constant() {
            let mut out = self.clone();
            out.adjust(amount);
            return out;
        }

        if let Some(amount) = self.as_constant() {
            let mut out = rhs.clone();
            out.adjust(amount);
            return out;
        }

        ValueSet::top()
    }
}

impl ops::Add for ValueSet {
    type Output = ValueSet;

    fn add(self, rhs: ValueSet) -> ValueSet {
        &self + &rhs
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.top {
            return write!(f, "top");
        }

        write!(
            f,
            "{{{}}}",
            self.values
                .iter()
                .map(|(region, ric)| format!("mem{region}: {ric}"))
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded::BoundedInt;

    fn ric(stride: i64, start: i64, end: i64, offset: i64) -> Ric {
        Ric::new(stride, start.into(), end.into(), offset).unwrap()
    }

    #[test]
    fn empty_is_not_top() {
        let empty = ValueSet::new();
        assert!(empty.is_empty());
        assert!(!empty.is_top());
        assert_ne!(empty, ValueSet::top());
    }

    #[test]
    fn subset_requires_every_region() {
        let a = ValueSet::from([(1, ric(2, 0, 2, 0))]);
        let b = ValueSet::from([(1, ric(2, 0, 4, 0)), (2, ric(1, 0, 8, 0))]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(a.is_subset(&ValueSet::top()));
        assert!(!ValueSet::top().is_subset(&a));
        assert!(ValueSet::new().is_subset(&a));
    }

    #[test]
    fn meet_drops_regions_absent_from_rhs() {
        let mut a = ValueSet::from([(1, ric(2, 0, 4, 0)), (2, ric(1, 0, 8, 0))]);
        let b = ValueSet::from([(1, ric(2, 0, 2, 0))]);

        a.meet_with(&b);
        assert_eq!(a, ValueSet::from([(1, ric(2, 0, 2, 0))]));
    }

    #[test]
    fn join_accumulates_disjoint_regions() {
        let mut a = ValueSet::from([(1, ric(1, 0, 3, 0))]);
        let b = ValueSet::from([(2, ric(1, 0, 3, 16))]);

        a.join_with(&b);
        assert_eq!(
            a,
            ValueSet::from([(1, ric(1, 0, 3, 0)), (2, ric(1, 0, 3, 16))])
        );
    }

    #[test]
    fn join_matches_ric_join_per_region() {
        let mut a = ValueSet::from([(1, ric(2, 0, 4, 1))]);
        a.join_with(&ValueSet::from([(1, ric(3, 0, 3, 1))]));

        let mut expected = ric(2, 0, 4, 1);
        expected.join_with(&ric(3, 0, 3, 1));
        assert_eq!(a.get(1), Some(&expected));
    }

    #[test]
    fn top_absorbs_joins_and_is_neutral_for_meets() {
        let a = ValueSet::from([(1, ric(2, 0, 4, 1))]);

        let mut joined = a.clone();
        joined.join_with(&ValueSet::top());
        assert!(joined.is_top());

        let mut met = a.clone();
        met.meet_with(&ValueSet::top());
        assert_eq!(met, a);

        let mut from_top = ValueSet::top();
        from_top.meet_with(&a);
        assert_eq!(from_top, a);
    }

    #[test]
    fn widen_and_narrow_touch_only_shared_regions() {
        let mut a = ValueSet::from([(1, ric(4, 0, 3, 0)), (2, ric(1, 0, 3, 0))]);
        let b = ValueSet::from([(1, ric(4, 0, 9, 0))]);

        a.widen_with(&b);
        assert!(a.get(1).unwrap().end().is_plus_infinity());
        assert_eq!(a.get(2), Some(&ric(1, 0, 3, 0)));

        a.narrow_with(&b);
        assert_eq!(a.get(1), Some(&ric(4, 0, 9, 0)));
        assert_eq!(a.get(2), Some(&ric(1, 0, 3, 0)));
    }

    #[test]
    fn adjust_shifts_every_region() {
        let mut a = ValueSet::from([(1, ric(4, 0, 3, 0)), (2, ric(1, 0, 0, 7))]);
        a.adjust(5);

        assert_eq!(a.get(1), Some(&ric(4, 0, 3, 5)));
        assert_eq!(a.get(2), Some(&ric(1, 0, 0, 12)));
    }

    #[test]
    fn adjust_keeps_infinite_bounds() {
        let open = Ric::new(4, BoundedInt::finite(0), BoundedInt::PlusInfinity, 0).unwrap();
        let mut a = ValueSet::from([(1, open)]);
        a.adjust(3);

        let shifted = a.get(1).unwrap();
        assert_eq!(shifted.offset(), 3);
        assert!(shifted.upper().is_plus_infinity());
    }

    #[test]
    fn add_with_constant_adjusts() {
        let pointer = ValueSet::from([(1, ric(4, 0, 3, 0))]);
        let four = ValueSet::from([(1, Ric::constant(4))]);

        assert_eq!(&pointer + &four, ValueSet::from([(1, ric(4, 0, 3, 4))]));
        assert_eq!(&four + &pointer, ValueSet::from([(1, ric(4, 0, 3, 4))]));
    }

    #[test]
    fn add_of_two_constants_is_constant() {
        let a = ValueSet::from([(1, Ric::constant(3))]);
        let b = ValueSet::from([(1, Ric::constant(4))]);
        assert_eq!((&a + &b).as_constant(), Some(7));
    }

    #[test]
    fn add_over_approximates_everything_else() {
        let a = ValueSet::from([(1, ric(4, 0, 3, 0))]);
        let b = ValueSet::from([(2, ric(2, 0, 5, 0))]);
        assert!((&a + &b).is_top());
        assert!((&a + &ValueSet::top()).is_top());
    }

    #[test]
    fn bound_removal() {
        let mut a = ValueSet::from([(1, ric(4, 0, 3, 0))]);
        a.remove_upper_bounds();
        assert!(a.get(1).unwrap().end().is_plus_infinity());
        assert_eq!(a.get(1).unwrap().start(), BoundedInt::finite(0));

        a.remove_lower_bounds();
        assert!(a.get(1).unwrap().start().is_minus_infinity());
    }

    #[test]
    fn display_formats() {
        let a = ValueSet::from([(1, ric(4, 0, 3, 0)), (2, Ric::constant(8))]);
        assert_eq!(a.to_string(), "{mem1: 4 * [0, 3] + 0, mem2: 1 * [0, 0] + 8}");
        assert_eq!(ValueSet::top().to_string(), "top");
        assert_eq!(ValueSet::new().to_string(), "{}");
    }
}
