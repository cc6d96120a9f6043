//! Property-based test generators using proptest.

use fintrack_model::{Category, CategoryKind, LogStatus};
use proptest::prelude::*;

/// Strategy for record names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,11}( [a-z]{3,8})?").expect("Invalid regex")
}

/// Strategy for unsynced categories with the given local id.
pub fn category_strategy(local_id: u64) -> impl Strategy<Value = Category> {
    (name_strategy(), prop_oneof![Just(CategoryKind::Income), Just(CategoryKind::Expense)])
        .prop_map(move |(name, kind)| Category::new(local_id, name, kind))
}

/// Strategy for `n` unsynced categories with local ids `1..=n`.
pub fn categories_strategy(max: usize) -> impl Strategy<Value = Vec<Category>> {
    (1..=max).prop_flat_map(|n| {
        (1..=n as u64)
            .map(category_strategy)
            .collect::<Vec<_>>()
    })
}

/// Strategy for status tags, including unrecognized ones.
pub fn log_status_strategy() -> impl Strategy<Value = LogStatus> {
    prop_oneof![
        4 => Just(LogStatus::Pending),
        4 => Just(LogStatus::Updated),
        4 => Just(LogStatus::Deleted),
        1 => prop::string::string_regex("[A-Z]{3,10}")
            .expect("Invalid regex")
            .prop_map(|tag| LogStatus::parse(&tag)),
    ]
}

/// Strategy for a batch size and the zero-based position of the failing
/// entry within it.
pub fn failure_position_strategy(max: usize) -> impl Strategy<Value = (usize, usize)> {
    (1..=max).prop_flat_map(|n| (Just(n), 0..n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn categories_have_sequential_ids() {
        let mut runner = TestRunner::default();
        let tree = categories_strategy(8).new_tree(&mut runner).unwrap();
        let categories = tree.current();
        for (index, category) in categories.iter().enumerate() {
            assert_eq!(category.local_id, index as u64 + 1);
            assert!(category.remote_id.is_none());
        }
    }

    proptest! {
        #[test]
        fn failure_position_is_within_batch((n, k) in failure_position_strategy(10)) {
            prop_assert!(k < n);
        }

        #[test]
        fn generated_names_are_not_empty(name in name_strategy()) {
            prop_assert!(!name.trim().is_empty());
        }
    }
}
