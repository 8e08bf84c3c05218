//! Property-based tests for natural ordering.
//!
//! These tests use proptest to check that the comparator is a total order
//! and that descending sorts are stable and numeric-aware.

#[cfg(test)]
mod proptest_tests {
    use crate::natural::{compare, natural_key, sort_descending_by_key, Segment};
    use proptest::prelude::*;
    use std::cmp::Ordering;

    fn version_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{0,3}[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
            "(release|v|feature)/[0-9]{1,2}\\.[0-9]{1,2}",
            ".{0,12}",
        ]
    }

    // ============================================================================
    // comparator properties
    // ============================================================================

    proptest! {
        /// Property: every key compares equal to itself
        #[test]
        fn compare_is_reflexive(a in version_name()) {
            prop_assert_eq!(compare(&a, &a), Ordering::Equal);
        }

        /// Property: swapping the arguments reverses the result
        #[test]
        fn compare_is_antisymmetric(a in version_name(), b in version_name()) {
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }

        /// Property: a <= b and b <= c imply a <= c
        #[test]
        fn compare_is_transitive(a in version_name(), b in version_name(), c in version_name()) {
            if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
                prop_assert_ne!(compare(&a, &c), Ordering::Greater);
            }
        }

        /// Property: numbers under a common prefix order by value, not by digits
        #[test]
        fn numeric_runs_compare_by_value(prefix in "[a-z]{0,4}", x in 0u64..100_000, y in 0u64..100_000) {
            let a = format!("{}{}", prefix, x);
            let b = format!("{}{}", prefix, y);
            prop_assert_eq!(compare(&a, &b), x.cmp(&y));
        }

        /// Property: keys alternate text and number runs, starting with text
        #[test]
        fn keys_alternate_runs(input in ".{0,20}") {
            let key = natural_key(&input);
            prop_assert!(matches!(key.first(), Some(Segment::Text(_))));
            for pair in key.windows(2) {
                let alternates = matches!(
                    (&pair[0], &pair[1]),
                    (Segment::Text(_), Segment::Number(_)) | (Segment::Number(_), Segment::Text(_))
                );
                prop_assert!(alternates, "runs do not alternate for '{}'", input);
            }
        }
    }

    // ============================================================================
    // sort properties
    // ============================================================================

    proptest! {
        /// Property: the result is ordered largest first
        #[test]
        fn sort_is_descending(mut names in prop::collection::vec(version_name(), 0..20)) {
            sort_descending_by_key(&mut names, |n| n.clone());
            for pair in names.windows(2) {
                prop_assert_ne!(compare(&pair[0], &pair[1]), Ordering::Less);
            }
        }

        /// Property: entries with equal keys keep their input order
        #[test]
        fn sort_is_stable(names in prop::collection::vec("v[0-3]", 0..20)) {
            let mut indexed: Vec<(String, usize)> =
                names.into_iter().enumerate().map(|(i, n)| (n, i)).collect();
            sort_descending_by_key(&mut indexed, |(n, _)| n.clone());
            for pair in indexed.windows(2) {
                if pair[0].0 == pair[1].0 {
                    prop_assert!(pair[0].1 < pair[1].1);
                }
            }
        }

        /// Property: sorting only permutes the input
        #[test]
        fn sort_is_a_permutation(names in prop::collection::vec(version_name(), 0..20)) {
            let mut sorted = names.clone();
            sort_descending_by_key(&mut sorted, |n| n.clone());
            let mut expected = names;
            expected.sort();
            sorted.sort();
            prop_assert_eq!(sorted, expected);
        }
    }
}
