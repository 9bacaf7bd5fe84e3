use crate::config::SplitRatios;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// The three disjoint subsets of one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplits<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplits<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits in train, val, test order
    pub fn into_iter_splits(self) -> impl Iterator<Item = (Split, Vec<T>)> {
        vec![
            (Split::Train, self.train),
            (Split::Val, self.val),
            (Split::Test, self.test),
        ]
        .into_iter()
    }
}

/// Cut points (train_end, val_end) for `total` elements.
/// train = [0, train_end), val = [train_end, val_end), test = [val_end, total).
/// Both train and val round down, test takes the rest.
pub fn split_cut_points(total: usize, ratios: &SplitRatios) -> (usize, usize) {
    let train_len = (total as f64 * ratios.train).floor() as usize;
    let val_len = (total as f64 * ratios.val).floor() as usize;
    let train_end = train_len.min(total);
    let val_end = (train_end + val_len).min(total);
    (train_end, val_end)
}

/// Partitions the elements in the order given, without shuffling
pub fn partition<T>(mut elements: Vec<T>, ratios: &SplitRatios) -> DatasetSplits<T> {
    let (train_end, val_end) = split_cut_points(elements.len(), ratios);
    let test = elements.split_off(val_end);
    let val = elements.split_off(train_end);
    DatasetSplits {
        train: elements,
        val,
        test,
    }
}

/// Shuffles once and partitions by cumulative cut points
pub fn shuffle_and_split<T, R: Rng + ?Sized>(
    mut elements: Vec<T>,
    ratios: &SplitRatios,
    rng: &mut R,
) -> DatasetSplits<T> {
    elements.shuffle(rng);
    partition(elements, ratios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ten_elements_default_ratios() {
        let mut rng = StdRng::seed_from_u64(7);
        let splits = shuffle_and_split((0..10).collect::<Vec<i32>>(), &SplitRatios::default(), &mut rng);
        assert_eq!(splits.train.len(), 7);
        assert_eq!(splits.val.len(), 1);
        assert_eq!(splits.test.len(), 2);
    }

    #[test]
    fn sizes_follow_floor_for_any_total() {
        let ratios = SplitRatios {
            train: 0.7,
            val: 0.15,
            test: 0.15,
        };
        for total in 0..200usize {
            let mut rng = StdRng::seed_from_u64(total as u64);
            let splits = shuffle_and_split((0..total).collect::<Vec<usize>>(), &ratios, &mut rng);
            assert_eq!(splits.len(), total);
            assert_eq!(splits.is_empty(), total == 0);
            assert_eq!(splits.train.len(), (total as f64 * 0.7).floor() as usize);
            assert_eq!(splits.val.len(), (total as f64 * 0.15).floor() as usize);
        }
    }

    #[test]
    fn splits_are_disjoint_and_complete() {
        let mut rng = StdRng::seed_from_u64(1);
        let splits = shuffle_and_split((0..50).collect::<Vec<i32>>(), &SplitRatios::default(), &mut rng);
        let mut all: Vec<i32> = splits
            .train
            .iter()
            .chain(splits.val.iter())
            .chain(splits.test.iter())
            .cloned()
            .collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn ratios_not_summing_to_one_grow_test() {
        let ratios = SplitRatios {
            train: 0.5,
            val: 0.1,
            test: 0.1,
        };
        let splits = partition((0..10).collect::<Vec<_>>(), &ratios);
        assert_eq!(splits.train, vec![0, 1, 2, 3, 4]);
        assert_eq!(splits.val, vec![5]);
        assert_eq!(splits.test, vec![6, 7, 8, 9]);
    }

    #[test]
    fn oversized_ratios_are_capped() {
        let ratios = SplitRatios {
            train: 1.0,
            val: 1.0,
            test: 0.0,
        };
        let splits = partition((0..4).collect::<Vec<_>>(), &ratios);
        assert_eq!(splits.train.len(), 4);
        assert!(splits.val.is_empty());
        assert!(splits.test.is_empty());
    }

    #[test]
    fn same_seed_same_split() {
        let a = shuffle_and_split(
            (0..30).collect::<Vec<_>>(),
            &SplitRatios::default(),
            &mut StdRng::seed_from_u64(99),
        );
        let b = shuffle_and_split(
            (0..30).collect::<Vec<_>>(),
            &SplitRatios::default(),
            &mut StdRng::seed_from_u64(99),
        );
        assert_eq!(a, b);
    }
}
