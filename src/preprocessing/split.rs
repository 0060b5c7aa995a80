//! Seeded train/test row partitioning

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Disjoint train and test row indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle-then-cut splitter.
///
/// Rows are permuted with `ChaCha8Rng` seeded from `random_state`; the first
/// `ceil(n * test_size)` permuted rows form the test partition. The same
/// `n`, ratio and seed always give the same partitions.
#[derive(Debug, Clone, Copy)]
pub struct TrainTestSplitter {
    test_size: f64,
    random_state: u64,
}

impl Default for TrainTestSplitter {
    fn default() -> Self {
        Self::new(0.2, 42)
    }
}

impl TrainTestSplitter {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self {
            test_size,
            random_state,
        }
    }

    /// Number of test rows for `n_samples` rows
    pub fn n_test(&self, n_samples: usize) -> usize {
        ((n_samples as f64 * self.test_size).ceil() as usize).min(n_samples)
    }

    /// Partition `0..n_samples`. Both partitions must end up non-empty.
    pub fn split(&self, n_samples: usize) -> Result<TrainTestSplit> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainerError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }

        let n_test = self.n_test(n_samples);
        let n_train = n_samples - n_test;
        if n_train == 0 || n_test == 0 {
            return Err(TrainerError::InsufficientData(format!(
                "{} rows give {} train and {} test rows at test_size {}",
                n_samples, n_train, n_test, self.test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        indices.shuffle(&mut rng);

        let train_indices = indices.split_off(n_test);
        Ok(TrainTestSplit {
            train_indices,
            test_indices: indices,
        })
    }
}
