//! Deterministic lock ordering for multi-row stock updates.
//!
//! Two operations that lock overlapping product sets must request their row
//! locks in the same sequence, otherwise a circular wait (deadlock) is
//! possible. Every caller that locks more than one stock row passes its key
//! set through [`lock_order`] first; single-row operations are exempt but
//! still take their row's write lock before reading its stock.

use crate::state::ProductId;

/// Sort a set of product keys into the canonical locking order.
///
/// Deduplicates and sorts ascending by key. The output order is a pure
/// function of the input *set*: any permutation with duplicates yields the
/// same sequence.
#[must_use]
pub fn lock_order<I>(ids: I) -> Vec<ProductId>
where
    I: IntoIterator<Item = ProductId>,
{
    let mut ordered: Vec<ProductId> = ids.into_iter().collect();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pid(n: u128) -> ProductId {
        ProductId(uuid::Uuid::from_u128(n))
    }

    #[test]
    fn sorts_ascending() {
        let ordered = lock_order([pid(3), pid(1), pid(2)]);
        assert_eq!(ordered, vec![pid(1), pid(2), pid(3)]);
    }

    #[test]
    fn removes_duplicates() {
        let ordered = lock_order([pid(2), pid(1), pid(2), pid(1)]);
        assert_eq!(ordered, vec![pid(1), pid(2)]);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(lock_order([]).is_empty());
    }

    proptest! {
        // Any two permutations of the same multiset must lock in the same order.
        #[test]
        fn permutation_invariant(raw in proptest::collection::vec(0u128..64, 0..32)) {
            let ids: Vec<ProductId> = raw.iter().map(|&n| pid(n)).collect();
            let mut shuffled = ids.clone();
            shuffled.reverse();
            prop_assert_eq!(lock_order(ids), lock_order(shuffled));
        }

        #[test]
        fn output_is_sorted_and_unique(raw in proptest::collection::vec(0u128..64, 0..32)) {
            let ordered = lock_order(raw.iter().map(|&n| pid(n)));
            prop_assert!(ordered.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
