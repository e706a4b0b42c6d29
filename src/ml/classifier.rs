use crate::error::{AppError, Result};
use crate::ml::models::{ClassMetrics, Label, MLConfig, ModelMetadata, ModelMetrics, TrainingDataset};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use tracing::debug;

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Train the classifier, replacing any previous parameters
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics>;

    /// Predict class labels
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<Label>>;

    /// Predict the probability of the delay class
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Binary logistic regression fitted by full-batch gradient descent on the
/// sample-weighted log loss with an L2 penalty.
///
/// Weights start at zero, so repeated fits on the same data give the same
/// parameters.
#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    /// Model metadata
    metadata: ModelMetadata,

    /// Coefficients, one per feature
    weights: Option<Array1<f64>>,

    /// Intercept
    intercept: Option<f64>,

    learning_rate: f64,
    max_iter: usize,
    tolerance: f64,
    inverse_regularization: f64,

    /// Loss per iteration of the last fit
    loss_history: Vec<f64>,
}

impl LogisticRegressionClassifier {
    pub fn new(config: &MLConfig) -> Self {
        let hyperparameters: HashMap<String, String> = [
            ("class_weight", "balanced".to_string()),
            ("max_iter", config.max_iter.to_string()),
            ("learning_rate", config.learning_rate.to_string()),
            ("tolerance", config.tolerance.to_string()),
            ("C", config.inverse_regularization.to_string()),
            ("random_state", config.random_state.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            metadata: ModelMetadata {
                name: "Logistic Regression".to_string(),
                version: "1.0".to_string(),
                trained_at: chrono::Utc::now(),
                n_training_samples: 0,
                n_features: 0,
                n_iterations: 0,
                training_metrics: ModelMetrics::new(),
                hyperparameters,
            },
            weights: None,
            intercept: None,
            learning_rate: config.learning_rate,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            inverse_regularization: config.inverse_regularization,
            loss_history: Vec::new(),
        }
    }

    /// Fitted coefficients
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    pub fn intercept(&self) -> Option<f64> {
        self.intercept
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    /// Weighted binary cross-entropy plus the L2 term
    fn loss(
        y: &Array1<f64>,
        p: &Array1<f64>,
        sample_weights: &Array1<f64>,
        weights: &Array1<f64>,
        l2: f64,
    ) -> f64 {
        let eps = 1e-15;
        let total_weight = sample_weights.sum();

        let data_loss: f64 = y
            .iter()
            .zip(p.iter())
            .zip(sample_weights.iter())
            .map(|((&y, &p), &s)| {
                let p = p.clamp(eps, 1.0 - eps);
                -s * (y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum();

        data_loss / total_weight + 0.5 * l2 * weights.dot(weights)
    }

    /// Log-odds for each row
    pub fn decision_function(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let (weights, intercept) = match (&self.weights, self.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(AppError::NotTrained),
        };

        if features.ncols() != weights.len() {
            return Err(AppError::Internal(format!(
                "expected {} feature columns, got {}",
                weights.len(),
                features.ncols()
            )));
        }

        Ok(features.dot(weights) + intercept)
    }

    fn calculate_metrics(y_true: &[Label], y_pred: &[Label]) -> ModelMetrics {
        let n_samples = y_true.len();
        if n_samples == 0 {
            return ModelMetrics::new();
        }

        let mut confusion = Array2::<usize>::zeros((2, 2));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[[t as usize, p as usize]] += 1;
        }

        let correct = confusion[[0, 0]] + confusion[[1, 1]];
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = HashMap::new();
        for class_idx in 0..2 {
            let other = 1 - class_idx;
            let tp = confusion[[class_idx, class_idx]];
            let fp = confusion[[other, class_idx]];
            let fn_count = confusion[[class_idx, other]];

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                format!("class_{}", class_idx),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support: tp + fn_count,
                },
            );
        }

        let avg = |f: fn(&ClassMetrics) -> f64| per_class.values().map(f).sum::<f64>() / 2.0;

        ModelMetrics {
            accuracy,
            precision: avg(|m| m.precision),
            recall: avg(|m| m.recall),
            f1_score: avg(|m| m.f1_score),
            confusion_matrix: Some(confusion),
            per_class_metrics: per_class,
        }
    }

    /// Score a trained model on a held-out dataset
    pub fn evaluate(&self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        let predictions = self.predict(&dataset.features)?;
        let truth: Vec<Label> = dataset.labels.iter().map(|&y| y as Label).collect();
        Ok(Self::calculate_metrics(&truth, &predictions))
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        if dataset.n_samples == 0 {
            return Err(AppError::Internal(
                "cannot train on an empty dataset".to_string(),
            ));
        }

        let x = &dataset.features;
        let y = &dataset.labels;
        let s = &dataset.weights;
        let total_weight = s.sum();
        let l2 = 1.0 / (self.inverse_regularization * total_weight);

        let mut weights = Array1::<f64>::zeros(dataset.n_features);
        let mut intercept = 0.0;

        self.loss_history.clear();
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let p = (x.dot(&weights) + intercept).mapv(Self::sigmoid);
            let weighted_errors = (&p - y) * s;

            let dw = x.t().dot(&weighted_errors) / total_weight + &weights * l2;
            let db = weighted_errors.sum() / total_weight;

            weights = &weights - &(dw * self.learning_rate);
            intercept -= self.learning_rate * db;

            let loss = Self::loss(y, &p, s, &weights, l2);
            self.loss_history.push(loss);

            if iter > 0 && (self.loss_history[iter - 1] - loss).abs() < self.tolerance {
                debug!("Logistic regression converged at iteration {}", iter);
                break;
            }
        }

        self.weights = Some(weights);
        self.intercept = Some(intercept);

        let metrics = self.evaluate(dataset)?;

        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.n_iterations = iterations;
        self.metadata.trained_at = chrono::Utc::now();
        self.metadata.training_metrics = metrics.clone();

        Ok(metrics)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<Label>> {
        let scores = self.decision_function(features)?;
        Ok(scores.iter().map(|&z| if z > 0.0 { 1 } else { 0 }).collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(features)?.mapv(Self::sigmoid))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::{FeatureColumn, FeatureTable, FeatureVector, N_FEATURES};

    fn row(columns: &[FeatureColumn]) -> FeatureVector {
        let mut vector = FeatureVector::zeros();
        for column in columns {
            vector.set(*column, 1.0);
        }
        vector
    }

    /// 10 Sky Airline flights (4 delayed) among 100, 10 delayed overall
    fn imbalanced_dataset() -> TrainingDataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();

        for i in 0..10 {
            rows.push(row(&[FeatureColumn::OperaSkyAirline]));
            labels.push(if i < 4 { 1 } else { 0 });
        }
        for i in 0..90 {
            rows.push(row(&[]));
            labels.push(if i < 6 { 1 } else { 0 });
        }

        TrainingDataset::new(&FeatureTable::from_rows(rows), &labels).unwrap()
    }

    #[test]
    fn test_sigmoid() {
        assert!((LogisticRegressionClassifier::sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(LogisticRegressionClassifier::sigmoid(100.0) > 0.99);
        assert!(LogisticRegressionClassifier::sigmoid(-100.0) < 0.01);
    }

    #[test]
    fn test_untrained_predict_fails() {
        let classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        let x = Array2::zeros((1, N_FEATURES));

        assert!(!classifier.is_trained());
        assert!(matches!(classifier.predict(&x), Err(AppError::NotTrained)));
    }

    #[test]
    fn test_separable_data() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            if i % 4 == 0 {
                rows.push(row(&[FeatureColumn::Month12, FeatureColumn::OperaGrupoLatam]));
                labels.push(1);
            } else {
                rows.push(row(&[FeatureColumn::Month4]));
                labels.push(0);
            }
        }
        let dataset = TrainingDataset::new(&FeatureTable::from_rows(rows), &labels).unwrap();

        let mut classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        let metrics = classifier.train(&dataset).unwrap();

        assert!(classifier.is_trained());
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(classifier.metadata().n_training_samples, 40);
        assert!(classifier.metadata().n_iterations <= 1000);
    }

    #[test]
    fn test_balanced_weights_recover_minority_class() {
        let dataset = imbalanced_dataset();
        let mut classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        classifier.train(&dataset).unwrap();

        let x = FeatureTable::from_rows(vec![
            row(&[FeatureColumn::OperaSkyAirline]),
            row(&[]),
        ])
        .to_array();

        assert_eq!(classifier.predict(&x).unwrap(), vec![1, 0]);

        let proba = classifier.predict_proba(&x).unwrap();
        assert!(proba[0] > 0.5 && proba[1] < 0.5);
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = imbalanced_dataset();

        let mut first = LogisticRegressionClassifier::new(&MLConfig::default());
        let mut second = LogisticRegressionClassifier::new(&MLConfig::default());
        first.train(&dataset).unwrap();
        second.train(&dataset).unwrap();

        assert_eq!(first.coefficients(), second.coefficients());
        assert_eq!(first.intercept(), second.intercept());
    }

    #[test]
    fn test_loss_decreases() {
        let dataset = imbalanced_dataset();
        let mut classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        classifier.train(&dataset).unwrap();

        let history = classifier.loss_history();
        assert!(history.len() > 1);
        assert!(history.last().unwrap() < history.first().unwrap());
    }

    #[test]
    fn test_iteration_cap() {
        let config = MLConfig {
            max_iter: 5,
            tolerance: 0.0,
            ..MLConfig::default()
        };
        let mut classifier = LogisticRegressionClassifier::new(&config);
        classifier.train(&imbalanced_dataset()).unwrap();

        assert_eq!(classifier.metadata().n_iterations, 5);
        assert_eq!(classifier.loss_history().len(), 5);
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let mut classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        classifier.train(&imbalanced_dataset()).unwrap();

        let wrong = Array2::zeros((2, 3));
        assert!(matches!(classifier.predict(&wrong), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_metrics_confusion_matrix() {
        let metrics = LogisticRegressionClassifier::calculate_metrics(&[0, 0, 1, 1], &[0, 1, 1, 1]);

        assert_eq!(metrics.accuracy, 0.75);
        let confusion = metrics.confusion_matrix.unwrap();
        assert_eq!(confusion[[0, 0]], 1);
        assert_eq!(confusion[[0, 1]], 1);
        assert_eq!(confusion[[1, 1]], 2);
        assert_eq!(metrics.per_class_metrics["class_1"].recall, 1.0);
        assert_eq!(metrics.per_class_metrics["class_0"].support, 2);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let dataset = TrainingDataset::new(&FeatureTable::default(), &[]).unwrap();
        let mut classifier = LogisticRegressionClassifier::new(&MLConfig::default());
        assert!(classifier.train(&dataset).is_err());
    }
}
