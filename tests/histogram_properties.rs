//! Property Tests for Histogram Aggregation and Filter Compilation
//!
//! Uses property-based testing (proptest) to check that bucket rows stay
//! dense, that emptiness detection matches the counts, and that compiled
//! filter tokens respect operator modifier eligibility.

use ledgerscope::filter::{compile, FilterDraft, Operator};
use ledgerscope::histogram::{aggregate, is_empty, CategoryMap, CategorySpec, MetricSample, TypeCount};
use proptest::prelude::*;

// =============================================================================
// Test Data Strategies
// =============================================================================

const RAW_TYPES: [&str; 6] = [
    "token_mint",
    "token_burn",
    "token_transfer",
    "message_confirmed",
    "blockchain_event",
    "unmapped_type",
];

/// Strategy for a category map over the first five raw types
///
/// Several raw types may share a category.
fn category_map() -> impl Strategy<Value = CategoryMap> {
    prop::collection::vec(0usize..3, 5).prop_map(|assignments| {
        let mut map = CategoryMap::new();
        for (raw, category) in RAW_TYPES.iter().zip(assignments) {
            let name = format!("Cat{category}");
            map.insert(*raw, CategorySpec::new(name.clone(), "#000000", name));
        }
        map
    })
}

/// Strategy for one sample with random per-type counts
fn sample() -> impl Strategy<Value = MetricSample> {
    (
        0i64..1_000_000,
        prop::collection::vec((0usize..RAW_TYPES.len(), 0u64..1000), 0..8),
    )
        .prop_map(|(ts, counts)| {
            MetricSample::new(
                ts.to_string(),
                counts
                    .into_iter()
                    .map(|(i, count)| TypeCount::new(RAW_TYPES[i], count))
                    .collect(),
            )
        })
}

fn operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

// =============================================================================
// Histogram Properties
// =============================================================================

proptest! {
    /// Every row carries exactly the map's distinct categories
    #[test]
    fn prop_rows_are_dense(map in category_map(), samples in prop::collection::vec(sample(), 0..20)) {
        let categories = map.categories();
        let rows = aggregate(&samples, &map);

        prop_assert_eq!(rows.len(), samples.len());
        for row in &rows {
            prop_assert_eq!(row.counts.len(), categories.len());
            for key in row.counts.keys() {
                prop_assert!(categories.contains(key.as_str()));
            }
        }
    }

    /// Timestamps pass through in input order
    #[test]
    fn prop_order_preserved(map in category_map(), samples in prop::collection::vec(sample(), 0..20)) {
        let rows = aggregate(&samples, &map);
        for (row, sample) in rows.iter().zip(&samples) {
            prop_assert_eq!(&row.timestamp, &sample.timestamp);
        }
    }

    /// Row totals equal the mapped input counts
    #[test]
    fn prop_mapped_counts_preserved(map in category_map(), samples in prop::collection::vec(sample(), 0..20)) {
        let rows = aggregate(&samples, &map);
        for (row, sample) in rows.iter().zip(&samples) {
            let expected: u64 = sample
                .types
                .iter()
                .filter(|t| map.category_of(&t.kind).is_some())
                .map(|t| t.count)
                .sum();
            prop_assert_eq!(row.total(), expected);
        }
    }

    /// Empty iff every count in every row is zero
    #[test]
    fn prop_empty_detection(map in category_map(), samples in prop::collection::vec(sample(), 0..20)) {
        let rows = aggregate(&samples, &map);
        let any_nonzero = rows.iter().any(|row| row.counts.values().any(|&c| c > 0));
        prop_assert_eq!(is_empty(&rows), !any_nonzero);
    }
}

// =============================================================================
// Filter Properties
// =============================================================================

proptest! {
    /// Modifiers appear only for operators that accept them
    #[test]
    fn prop_modifiers_only_when_eligible(
        op in operator(),
        negate in any::<bool>(),
        case_insensitive in any::<bool>(),
        value in "[A-Za-z0-9_]{0,12}",
    ) {
        let draft = FilterDraft::new("status", op, value.clone())
            .negated(negate)
            .case_insensitive(case_insensitive);
        let token = compile(&draft);

        let mut expected = String::from("status=");
        if op.modifiers() {
            if negate {
                expected.push('!');
            }
            if case_insensitive {
                expected.push(':');
            }
        }
        expected.push_str(op.symbol());
        expected.push_str(&value);

        prop_assert_eq!(token.as_str(), expected.as_str());
    }
}

#[test]
fn test_shared_category_sums() {
    let map = CategoryMap::new()
        .with_type("a", CategorySpec::new("C", "#fff", "C"))
        .with_type("b", CategorySpec::new("C", "#fff", "C"));
    let rows = aggregate(
        &[MetricSample::new(
            "t0",
            vec![TypeCount::new("a", 3), TypeCount::new("b", 4)],
        )],
        &map,
    );
    assert_eq!(rows[0].get("C"), 7);
}

#[test]
fn test_filter_examples() {
    let mut draft = FilterDraft::new("status", Operator::Eq, "Pending")
        .negated(true)
        .case_insensitive(true);
    assert_eq!(draft.compile().as_str(), "status=!:=Pending");

    let flagged_gt = FilterDraft::new("status", Operator::Gt, "Pending")
        .negated(true)
        .case_insensitive(true);
    assert_eq!(flagged_gt.compile().as_str(), "status=>>Pending");

    draft.set_operator(Operator::Gt);
    assert!(!draft.negate && !draft.case_insensitive);
    assert_eq!(draft.compile().as_str(), "status=>>Pending");
}
