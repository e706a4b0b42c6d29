use crate::error::{AppError, Result};
use crate::ml::features::{FeatureTable, PeriodOfDay, N_FEATURES};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binary delay label: 1 when the flight left more than 15 minutes late
pub type Label = u8;

/// ML model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLConfig {
    /// Train lazily from the last preprocessed dataset on first prediction
    #[serde(default = "default_auto_fit")]
    pub auto_fit: bool,

    /// CSV dataset used to train the model at startup
    #[serde(default)]
    pub training_data_path: Option<String>,

    /// Maximum optimiser iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Gradient descent step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Stop once the loss improves by less than this
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Inverse L2 regularisation strength
    #[serde(default = "default_inverse_regularization")]
    pub inverse_regularization: f64,

    /// Seed recorded with every trained model
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

fn default_auto_fit() -> bool {
    true
}

fn default_max_iter() -> usize {
    1000
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_tolerance() -> f64 {
    1e-7
}

fn default_inverse_regularization() -> f64 {
    1.0
}

fn default_random_state() -> u64 {
    42
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            auto_fit: default_auto_fit(),
            training_data_path: None,
            max_iter: default_max_iter(),
            learning_rate: default_learning_rate(),
            tolerance: default_tolerance(),
            inverse_regularization: default_inverse_regularization(),
            random_state: default_random_state(),
        }
    }
}

/// Training dataset
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Delay labels as 0.0 / 1.0
    pub labels: Array1<f64>,

    /// Sample weights
    pub weights: Array1<f64>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    /// Build a dataset from an encoded feature table and its labels.
    ///
    /// Sample weights are balanced so that each class contributes the same
    /// total weight regardless of how often it occurs.
    pub fn new(table: &FeatureTable, labels: &[Label]) -> Result<Self> {
        if table.len() != labels.len() {
            return Err(AppError::Internal(format!(
                "feature rows ({}) and labels ({}) differ in length",
                table.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(AppError::Internal(format!("label {} is not binary", bad)));
        }

        let labels = Array1::from_iter(labels.iter().map(|&l| l as f64));
        let class_weights = Self::balanced_class_weights(&labels);
        let weights = labels.mapv(|y| class_weights[y as usize]);

        Ok(Self {
            features: table.to_array(),
            n_samples: labels.len(),
            n_features: N_FEATURES,
            labels,
            weights,
        })
    }

    /// Number of samples per class, indexed by label
    pub fn class_counts(&self) -> [usize; 2] {
        Self::count_classes(&self.labels)
    }

    fn count_classes(labels: &Array1<f64>) -> [usize; 2] {
        let delayed = labels.iter().filter(|&&y| y >= 0.5).count();
        [labels.len() - delayed, delayed]
    }

    /// `n_samples / (n_classes * count)` per class; absent classes get 1.0
    fn balanced_class_weights(labels: &Array1<f64>) -> [f64; 2] {
        let counts = Self::count_classes(labels);
        let total = labels.len();

        let mut weights = [1.0; 2];
        for (weight, &count) in weights.iter_mut().zip(counts.iter()) {
            if count > 0 {
                *weight = total as f64 / (2.0 * count as f64);
            }
        }
        weights
    }

    /// Split dataset into train/test sets, keeping row order
    pub fn train_test_split(&self, test_size: f64) -> (TrainingDataset, TrainingDataset) {
        let n_test = (self.n_samples as f64 * test_size) as usize;
        let n_train = self.n_samples - n_test;

        let slice = |from: usize, to: usize| {
            let labels = self.labels.slice(ndarray::s![from..to]).to_owned();
            let class_weights = Self::balanced_class_weights(&labels);
            TrainingDataset {
                features: self.features.slice(ndarray::s![from..to, ..]).to_owned(),
                weights: labels.mapv(|y| class_weights[y as usize]),
                labels,
                n_samples: to - from,
                n_features: self.n_features,
            }
        };

        (slice(0, n_train), slice(n_train, self.n_samples))
    }
}

/// Delay rates over the date-derived features of a training set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Number of labelled rows
    pub n_samples: usize,

    /// Fraction of rows labelled as delayed
    pub delay_rate: f64,

    /// Delay rate per period of day
    pub delay_rate_by_period: HashMap<PeriodOfDay, f64>,

    /// Delay rate inside high-season windows
    pub high_season_delay_rate: f64,

    /// Delay rate outside high-season windows
    pub low_season_delay_rate: f64,
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Precision (macro average)
    pub precision: f64,

    /// Recall (macro average)
    pub recall: f64,

    /// F1 score (macro average)
    pub f1_score: f64,

    /// Confusion matrix, rows are true labels and columns predictions
    pub confusion_matrix: Option<Array2<usize>>,

    /// Per-class metrics
    pub per_class_metrics: HashMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: None,
            per_class_metrics: HashMap::new(),
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Optimiser iterations actually run
    pub n_iterations: usize,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}
