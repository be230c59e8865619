//! End-to-end identification runs and engine-level properties.

use std::collections::BTreeMap;

use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;

use memrec_asi::prelude::*;

fn ric(stride: i64, start: i64, end: i64, offset: i64) -> Ric {
    Ric::new(stride, start.into(), end.into(), offset).unwrap()
}

fn accesses(entries: Vec<(AccessId, ValueSet, i64)>) -> BTreeMap<AccessId, Access> {
    entries
        .into_iter()
        .map(|(id, address, size)| (id, Access::new(address, size)))
        .collect()
}

#[test]
fn strided_access_merges_adjacent_alocs_into_an_array() {
    let result = analyse(
        [ALoc::new(1, 0, 4), ALoc::new(1, 4, 4)],
        accesses(vec![(0, ValueSet::from([(1, ric(4, 0, 1, 0))]), 4)]),
    )
    .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(ALoc::new(1, 0, 8), AsiType::array(AsiType::int(4), 2));
    assert_eq!(result, expected);
}

#[test]
fn scalar_sub_access_splits_an_aloc_into_fields() {
    let result = analyse(
        [ALoc::new(1, 0, 8)],
        accesses(vec![(0, ValueSet::from([(1, Ric::constant(4))]), 4)]),
    )
    .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(ALoc::new(1, 0, 4), AsiType::int(4));
    expected.insert(ALoc::new(1, 4, 4), AsiType::int(4));
    assert_eq!(result, expected);
}

#[test]
fn array_with_trailing_slack_splits_off_the_slack() {
    // Four elements of a 20-byte a-loc leave a 4-byte tail field.
    let result = analyse(
        [ALoc::new(1, 0, 20)],
        accesses(vec![(0, ValueSet::from([(1, ric(4, 0, 3, 0))]), 4)]),
    )
    .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(ALoc::new(1, 0, 16), AsiType::array(AsiType::int(4), 4));
    expected.insert(ALoc::new(1, 16, 4), AsiType::int(4));
    assert_eq!(result, expected);
}

#[test]
fn untouched_alocs_stay_opaque() {
    let result = analyse(
        [ALoc::new(1, 0, 8), ALoc::new(2, 0, 4)],
        accesses(vec![(0, ValueSet::from([(1, Ric::constant(0))]), 8)]),
    )
    .unwrap();

    assert_eq!(result.get(&ALoc::new(1, 0, 8)), Some(&AsiType::int(8)));
    assert_eq!(result.get(&ALoc::new(2, 0, 4)), Some(&AsiType::int(4)));
}

#[test]
fn undefined_addresses_are_skipped() {
    let result = analyse(
        [ALoc::new(1, 0, 8)],
        accesses(vec![(0, ValueSet::new(), 4)]),
    )
    .unwrap();

    assert_eq!(result.get(&ALoc::new(1, 0, 8)), Some(&AsiType::int(8)));
}

#[test]
fn one_access_refines_both_regions_it_may_touch() {
    let mut address = ValueSet::from([(1, Ric::constant(4))]);
    address.insert(2, Ric::constant(0));

    let result = analyse(
        [ALoc::new(1, 0, 8), ALoc::new(2, 0, 8)],
        accesses(vec![(0, address, 4)]),
    )
    .unwrap();

    assert_eq!(result.get(&ALoc::new(1, 0, 4)), Some(&AsiType::int(4)));
    assert_eq!(result.get(&ALoc::new(1, 4, 4)), Some(&AsiType::int(4)));
    assert_eq!(result.get(&ALoc::new(2, 0, 4)), Some(&AsiType::int(4)));
    assert_eq!(result.get(&ALoc::new(2, 4, 4)), Some(&AsiType::int(4)));
}

#[test]
fn later_accesses_refine_earlier_results() {
    // A whole-array sweep, then a byte-wide sweep one byte into each
    // element.
    let result = analyse(
        [ALoc::new(1, 0, 16)],
        accesses(vec![
            (0, ValueSet::from([(1, ric(4, 0, 3, 0))]), 4),
            (1, ValueSet::from([(1, ric(4, 0, 3, 1))]), 1),
        ]),
    )
    .unwrap();

    // The second sweep carves every element.
    let carved = AsiType::struct_of(vec![AsiType::int(1), AsiType::int(1), AsiType::int(2)]);
    assert_eq!(
        result.get(&ALoc::new(1, 0, 16)),
        Some(&AsiType::array(carved, 4))
    );
}

#[test]
fn a_sweep_across_a_carved_aloc_keeps_the_carve() {
    // Access 0 carves the first a-loc into two halves (clamped at its end,
    // so the overflow diagnostic is set). Access 1 then sweeps a stride-4
    // array across the carved a-loc and both untouched neighbours; the
    // carved record must match one whole element of the sweep, not leak
    // its fields into the merge.
    let result = analyse(
        [ALoc::new(1, 0, 4), ALoc::new(1, 4, 4), ALoc::new(1, 8, 4)],
        accesses(vec![
            (0, ValueSet::from([(1, Ric::constant(2))]), 4),
            (1, ValueSet::from([(1, ric(4, 0, 2, 0))]), 4),
        ]),
    )
    .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(ALoc::new(1, 0, 2), AsiType::int(2));
    expected.insert(ALoc::new(1, 2, 2), AsiType::int(2));
    expected.insert(ALoc::new(1, 4, 4), AsiType::int(4));
    expected.insert(ALoc::new(1, 8, 4), AsiType::int(4));
    assert_eq!(result, expected);
}

#[test]
fn misaligned_pokes_into_arrays_fail_loudly() {
    // Once the a-loc is an i32[4], a scalar poke that crosses no element
    // boundary but does not start on one cannot be expressed.
    let err = analyse(
        [ALoc::new(1, 0, 16)],
        accesses(vec![
            (0, ValueSet::from([(1, ric(4, 0, 3, 0))]), 4),
            (1, ValueSet::from([(1, Ric::constant(5))]), 1),
        ]),
    );

    assert!(matches!(err, Err(AsiError::InvalidSplit { .. })));
}

#[test]
fn array_anchoring_follows_the_denoted_range() {
    // 4·[2,3]+0 denotes {8, 12}: an exact sweep of the second a-loc even
    // though the grid representative sits two strides below it.
    let result = analyse(
        [ALoc::new(1, 8, 8)],
        accesses(vec![(0, ValueSet::from([(1, ric(4, 2, 3, 0))]), 4)]),
    )
    .unwrap();

    assert_eq!(
        result.get(&ALoc::new(1, 8, 8)),
        Some(&AsiType::array(AsiType::int(4), 2))
    );
}

#[test]
fn overlapping_inputs_are_rejected() {
    let err = analyse(
        [ALoc::new(1, 0, 8), ALoc::new(1, 6, 4)],
        BTreeMap::new(),
    );
    assert_eq!(
        err,
        Err(AsiError::OverlappingALocs {
            first: ALoc::new(1, 0, 8),
            second: ALoc::new(1, 6, 4),
        })
    );
}

#[test]
fn unbounded_accesses_fail_without_corrupting_the_map() {
    let open = Ric::new(4, BoundedInt::finite(0), BoundedInt::PlusInfinity, 0).unwrap();

    let mut asi = Asi::new(
        [ALoc::new(1, 0, 16)],
        accesses(vec![(0, ValueSet::from([(1, open)]), 4)]),
    )
    .unwrap();

    let before = asi.types().clone();
    assert_eq!(asi.analyse(), Err(AsiError::InfiniteArrayAccess));
    assert_eq!(asi.types(), &before);
}

#[test]
fn simplification_is_idempotent() {
    let mut asi = Asi::new(
        [ALoc::new(1, 0, 8), ALoc::new(1, 8, 8), ALoc::new(2, 0, 12)],
        accesses(vec![
            (0, ValueSet::from([(1, Ric::constant(2))]), 2),
            (1, ValueSet::from([(1, ric(4, 2, 3, 0))]), 4),
            (2, ValueSet::from([(2, Ric::constant(4))]), 4),
        ]),
    )
    .unwrap();
    asi.analyse().unwrap();

    let once = asi.types().clone();
    asi.simplify_types();
    assert_eq!(asi.types(), &once);
}

#[test]
fn results_are_deterministic() {
    let inputs = || {
        (
            [ALoc::new(1, 0, 4), ALoc::new(1, 4, 4), ALoc::new(1, 8, 8)],
            accesses(vec![
                (0, ValueSet::from([(1, ric(4, 0, 1, 0))]), 4),
                (1, ValueSet::from([(1, Ric::constant(10))]), 2),
                (2, ValueSet::from([(1, ric(8, 0, 1, 0))]), 8),
            ]),
        )
    };

    let (alocs, first_accesses) = inputs();
    let first = analyse(alocs, first_accesses).unwrap();
    let (alocs, second_accesses) = inputs();
    let second = analyse(alocs, second_accesses).unwrap();

    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Properties over randomly generated inputs.

/// A canonical type of a given byte size: records never directly nest.
fn arbitrary_type(g: &mut Gen, size: i64, depth: u8, record_ok: bool) -> AsiType {
    if depth == 0 || size == 1 {
        return AsiType::int(size);
    }

    let shape = *g.choose(&[0u8, 0, 1, 1, 2]).unwrap();

    if shape == 1 {
        let divisors: Vec<i64> = (1..size).filter(|d| size % d == 0).collect();
        if let Some(&element) = g.choose(&divisors) {
            return AsiType::array(
                arbitrary_type(g, element, depth - 1, true),
                size / element,
            );
        }
    }

    if shape == 2 && record_ok && size >= 2 {
        let cuts: Vec<i64> = (1..size).collect();
        let cut = *g.choose(&cuts).unwrap();
        return AsiType::struct_of(vec![
            arbitrary_type(g, cut, depth - 1, false),
            arbitrary_type(g, size - cut, depth - 1, false),
        ]);
    }

    AsiType::int(size)
}

#[derive(Debug, Clone)]
struct SameSizePair(AsiType, AsiType);

impl Arbitrary for SameSizePair {
    fn arbitrary(g: &mut Gen) -> Self {
        let size = *g.choose(&[1i64, 2, 3, 4, 6, 8, 12, 16]).unwrap();
        SameSizePair(
            arbitrary_type(g, size, 3, true),
            arbitrary_type(g, size, 3, true),
        )
    }
}

#[quickcheck]
fn unification_preserves_sizes(pair: SameSizePair) -> TestResult {
    let SameSizePair(lhs, rhs) = pair;

    // Field boundaries can genuinely conflict with element boundaries; that
    // is a loud error, never a wrong-sized result.
    match Asi::unify(&lhs, &rhs) {
        Ok(unified) => TestResult::from_bool(unified.size() == lhs.size()),
        Err(AsiError::InvalidSplit { .. }) => TestResult::discard(),
        Err(_) => TestResult::failed(),
    }
}

#[quickcheck]
fn self_unification_succeeds_and_preserves_size(pair: SameSizePair) -> bool {
    let SameSizePair(lhs, _) = pair;

    match Asi::unify(&lhs, &lhs) {
        Ok(unified) => unified.size() == lhs.size(),
        Err(_) => false,
    }
}

/// A region-1 a-loc space partitioned out of `[0, 16)`, plus accesses that
/// stay within it.
#[derive(Debug, Clone)]
struct SmallProgram {
    alocs: Vec<ALoc>,
    accesses: BTreeMap<AccessId, Access>,
}

impl Arbitrary for SmallProgram {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut alocs = Vec::new();
        let mut offset = 0;
        while offset < 16 {
            let size = (*g.choose(&[1i64, 2, 2, 4, 4, 8]).unwrap()).min(16 - offset);
            alocs.push(ALoc::new(1, offset, size));
            offset += size;
        }

        let mut accesses = BTreeMap::new();
        for id in 0..*g.choose(&[1u64, 2, 3, 4]).unwrap() {
            let address = if *g.choose(&[true, false]).unwrap() {
                Ric::constant(*g.choose(&[0i64, 1, 2, 4, 6, 8, 12, 15]).unwrap())
            } else {
                let stride = *g.choose(&[1i64, 2, 4, 8]).unwrap();
                let count = *g.choose(&[2i64, 3, 4]).unwrap();
                ric(stride, 0, count - 1, *g.choose(&[0i64, 1, 2, 4]).unwrap())
            };
            let size = *g.choose(&[1i64, 2, 4, 8]).unwrap();

            accesses.insert(id, Access::new(ValueSet::from([(1, address)]), size));
        }

        SmallProgram { alocs, accesses }
    }
}

#[quickcheck]
fn recovered_maps_are_consistent(program: SmallProgram) -> TestResult {
    let result = analyse(program.alocs.clone(), program.accesses.clone());

    let map = match result {
        Ok(map) => map,
        // Conflicting boundaries surface as errors rather than bad maps.
        Err(AsiError::InvalidSplit { .. }) | Err(AsiError::SizeMismatch { .. }) => {
            return TestResult::discard();
        }
        Err(_) => return TestResult::failed(),
    };

    // No two recovered a-locs overlap, and every binding's type covers
    // exactly its a-loc.
    let alocs: Vec<&ALoc> = map.keys().collect();
    for window in alocs.windows(2) {
        if window[0].overlaps(window[1]) {
            return TestResult::failed();
        }
    }

    for (aloc, ty) in &map {
        if ty.size() != aloc.size {
            return TestResult::failed();
        }
    }

    // Bit-identical on a rerun.
    let rerun = analyse(program.alocs, program.accesses);
    TestResult::from_bool(rerun == Ok(map))
}
