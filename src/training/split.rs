// Train / validation / test partitioning
//
// Sizes use floor(fraction * n) for train and validation; test takes the
// remainder. Stratified splits apply the same rule per label, so each class
// contributes its own remainder to the test partition.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partition fractions; the test share is whatever is left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub val: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.7,
            val: 0.15,
        }
    }
}

impl SplitFractions {
    fn sizes(&self, n: usize) -> (usize, usize) {
        let train = ((self.train.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n);
        let val = ((self.val.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n - train);
        (train, val)
    }
}

/// Row indices of each partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitions {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partitions {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// Split `labels.len()` rows, optionally stratified by label
pub fn split_indices(
    labels: &[u32],
    fractions: SplitFractions,
    seed: u64,
    stratify: bool,
) -> Partitions {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut parts = Partitions::default();

    let groups: Vec<Vec<usize>> = if stratify {
        let mut by_label: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_label.entry(label).or_default().push(idx);
        }
        by_label.into_values().collect()
    } else {
        vec![(0..labels.len()).collect()]
    };

    for mut group in groups {
        group.shuffle(&mut rng);
        let (train, val) = fractions.sizes(group.len());
        parts.train.extend_from_slice(&group[..train]);
        parts.val.extend_from_slice(&group[train..train + val]);
        parts.test.extend_from_slice(&group[train + val..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split_sizes() {
        let labels = vec![0u32; 20];
        let parts = split_indices(&labels, SplitFractions::default(), 42, false);
        assert_eq!(parts.train.len(), 14);
        assert_eq!(parts.val.len(), 3);
        assert_eq!(parts.test.len(), 3);

        let mut all: Vec<usize> = parts
            .train
            .iter()
            .chain(&parts.val)
            .chain(&parts.test)
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>(), "partitions must be disjoint and complete");
    }

    #[test]
    fn test_split_is_seeded() {
        let labels = vec![0u32; 30];
        let a = split_indices(&labels, SplitFractions::default(), 7, false);
        let b = split_indices(&labels, SplitFractions::default(), 7, false);
        let c = split_indices(&labels, SplitFractions::default(), 8, false);
        assert_eq!(a, b);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_stratified_split_keeps_both_classes() {
        let labels: Vec<u32> = (0..40).map(|i| (i % 2) as u32).collect();
        let parts = split_indices(&labels, SplitFractions::default(), 1, true);
        assert_eq!(parts.total(), 40);
        for partition in [&parts.train, &parts.val, &parts.test] {
            let lies = partition.iter().filter(|&&i| labels[i] == 0).count();
            assert_eq!(lies * 2, partition.len(), "each class contributes equally");
        }
    }

    #[test]
    fn test_tiny_input() {
        let parts = split_indices(&[1], SplitFractions::default(), 0, false);
        assert!(parts.train.is_empty());
        assert_eq!(parts.test, vec![0]);
    }
}
