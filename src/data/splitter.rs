// ============================================================
// Layer 4 — Validation Carve-out
// ============================================================
// Datasets that ship without a `valid.jsonl` get their validation
// split carved out of the training split.
//
// The shuffle is seeded from the run seed, so a resumed or
// re-evaluated run sees exactly the same partition as the run that
// produced its checkpoint.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is the share kept for training, e.g. 0.9.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Carved validation split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 0.9, 0);
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(), 10);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let (a, _) = split_train_val((0..40).collect::<Vec<usize>>(), 0.9, 7);
        let (b, _) = split_train_val((0..40).collect::<Vec<usize>>(), 0.9, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_items_preserved() {
        let (mut train, val) = split_train_val((0..50).collect::<Vec<usize>>(), 0.7, 1);
        train.extend(val);
        train.sort_unstable();
        assert_eq!(train, (0..50).collect::<Vec<usize>>());
    }

    #[test]
    fn test_empty_dataset() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.9, 0);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
