use crate::data::TrainingDataLoader;
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, LogisticRegressionClassifier};
use crate::ml::features::{FeatureEncoder, FeatureTable};
use crate::ml::models::{Label, MLConfig, ModelMetadata, ModelMetrics, TrainingDataset, TrainingSummary};
use crate::models::FlightRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Lifecycle of the delay classifier
pub enum ModelState {
    /// Nothing fitted yet
    Untrained,
    /// Fitted parameters, kept for the lifetime of the process
    Trained(Box<dyn Classifier>),
}

/// Result of the auto-fit transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFit {
    /// A model was already fitted; nothing to do
    AlreadyTrained,
    /// The cached training data was used to fit a model
    Trained,
    /// Auto-fit is enabled but no training data has been seen
    NoData,
    /// Auto-fit is disabled; cached data is left untouched
    Disabled,
}

/// Flight delay model: feature encoding plus a logistic-regression classifier.
///
/// Every call to [`DelayModel::preprocess`] remembers its input as the last
/// seen training data. An untrained model can fit itself from that data on
/// the first prediction when `auto_fit` is enabled; with nothing to fit from
/// it predicts "no delay" for every row.
pub struct DelayModel {
    config: MLConfig,
    encoder: FeatureEncoder,
    state: ModelState,
    last_training_data: Option<Arc<Vec<FlightRecord>>>,
    last_summary: Option<TrainingSummary>,
}

impl DelayModel {
    pub fn new(config: MLConfig) -> Self {
        Self {
            config,
            encoder: FeatureEncoder::new(),
            state: ModelState::Untrained,
            last_training_data: None,
            last_summary: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ModelState::Trained(_))
    }

    pub fn auto_fit_enabled(&self) -> bool {
        self.config.auto_fit
    }

    /// Rows remembered by the last `preprocess` call
    pub fn cached_samples(&self) -> usize {
        self.last_training_data.as_ref().map_or(0, |rows| rows.len())
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        match &self.state {
            ModelState::Trained(classifier) => Some(classifier.metadata()),
            ModelState::Untrained => None,
        }
    }

    pub fn training_summary(&self) -> Option<&TrainingSummary> {
        self.last_summary.as_ref()
    }

    /// Encode records for training and derive their delay labels.
    ///
    /// The raw records replace the cached training data before encoding
    /// starts, so a failed encode still leaves them cached.
    pub fn preprocess(&mut self, records: &[FlightRecord]) -> Result<(FeatureTable, Vec<Label>)> {
        self.last_training_data = Some(Arc::new(records.to_vec()));

        let encoded = self.encoder.encode_training(records)?;
        let summary = encoded.summary();
        debug!(
            n_samples = summary.n_samples,
            delay_rate = summary.delay_rate,
            "Preprocessed training data"
        );
        self.last_summary = Some(summary);

        Ok((encoded.features, encoded.labels))
    }

    /// Encode records for inference
    pub fn encode(&self, records: &[FlightRecord]) -> FeatureTable {
        self.encoder.encode(records)
    }

    /// Fit a fresh classifier, replacing any previous one
    pub fn fit(&mut self, features: &FeatureTable, labels: &[Label]) -> Result<ModelMetrics> {
        let dataset = TrainingDataset::new(features, labels)?;
        let [on_time, delayed] = dataset.class_counts();

        info!(
            n_samples = dataset.n_samples,
            on_time, delayed, "Training delay classifier"
        );

        let mut classifier = LogisticRegressionClassifier::new(&self.config);
        let metrics = classifier.train(&dataset)?;

        info!(
            "Delay classifier trained - Accuracy: {:.2}%, F1: {:.3}",
            metrics.accuracy * 100.0,
            metrics.f1_score
        );

        self.state = ModelState::Trained(Box::new(classifier));
        Ok(metrics)
    }

    /// Untrained → Trained from the cached training data, when allowed.
    ///
    /// Fails with [`AppError::NotTrained`] only when auto-fit is disabled and
    /// there is no cached data either.
    pub fn auto_fit(&mut self) -> Result<AutoFit> {
        if self.is_trained() {
            return Ok(AutoFit::AlreadyTrained);
        }

        match (self.config.auto_fit, self.last_training_data.clone()) {
            (true, Some(records)) => {
                info!(n_samples = records.len(), "Auto-fitting model from cached training data");
                let (features, labels) = self.preprocess(&records)?;
                self.fit(&features, &labels)?;
                Ok(AutoFit::Trained)
            }
            (true, None) => Ok(AutoFit::NoData),
            (false, Some(_)) => Ok(AutoFit::Disabled),
            (false, None) => Err(AppError::NotTrained),
        }
    }

    /// Predict with the fitted classifier only
    pub fn predict_trained(&self, features: &FeatureTable) -> Result<Vec<Label>> {
        match &self.state {
            ModelState::Trained(classifier) => classifier.predict(&features.to_array()),
            ModelState::Untrained => Err(AppError::NotTrained),
        }
    }

    /// Predict one label per row, running the auto-fit transition first
    pub fn predict(&mut self, features: &FeatureTable) -> Result<Vec<Label>> {
        match self.auto_fit()? {
            AutoFit::AlreadyTrained | AutoFit::Trained => self.predict_trained(features),
            AutoFit::NoData | AutoFit::Disabled => {
                warn!(
                    n_rows = features.len(),
                    "No trained model available, predicting no delay"
                );
                Ok(vec![0; features.len()])
            }
        }
    }
}

/// Shared, lock-guarded access to the delay model
pub struct MLService {
    /// Configuration
    config: MLConfig,

    /// Model state; fits take the write lock
    model: Arc<RwLock<DelayModel>>,
}

impl MLService {
    /// Create a new ML service
    pub fn new(config: MLConfig) -> Self {
        Self {
            model: Arc::new(RwLock::new(DelayModel::new(config.clone()))),
            config,
        }
    }

    /// Train from the configured dataset, if any.
    ///
    /// Failures are logged and leave the model untrained; predictions then
    /// fall back to auto-fit or to the zero default.
    pub async fn start(&self) -> Result<()> {
        let Some(path) = self.config.training_data_path.clone() else {
            info!("No training dataset configured, model starts untrained");
            return Ok(());
        };

        info!("Loading training data from {}", path);

        let loaded = tokio::task::spawn_blocking(move || TrainingDataLoader::load_records(path))
            .await
            .map_err(|e| AppError::Internal(format!("training data loader panicked: {}", e)))?;

        let records = match loaded {
            Ok(records) => records,
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Training data not found. Model will use lazy training on first prediction.");
                return Ok(());
            }
            Err(e) => {
                error!("Failed to load training data: {}", e);
                return Ok(());
            }
        };

        match self.train_on_records(&records).await {
            Ok(_) => info!("✅ Model successfully trained and ready for predictions"),
            Err(e) => error!("Failed to pre-train model: {}", e),
        }

        Ok(())
    }

    /// Preprocess and fit on raw records
    pub async fn train_on_records(&self, records: &[FlightRecord]) -> Result<ModelMetrics> {
        let records = records.to_vec();
        self.with_model_blocking(move |model| {
            let (features, labels) = model.preprocess(&records)?;
            model.fit(&features, &labels)
        })
        .await
    }

    /// Predict for an already encoded table
    pub async fn predict(&self, features: &FeatureTable) -> Result<Vec<Label>> {
        {
            let model = self.model.read().await;
            if model.is_trained() {
                return model.predict_trained(features);
            }
        }

        // Re-checked under the write lock: another request may have fitted meanwhile
        let features = features.clone();
        self.with_model_blocking(move |model| model.predict(&features))
            .await
    }

    /// Run `f` on the blocking pool while holding the write lock.
    ///
    /// Fitting is CPU-bound gradient descent and must not stall a runtime worker.
    async fn with_model_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DelayModel) -> Result<T> + Send + 'static,
    {
        let mut model = self.model.clone().write_owned().await;
        tokio::task::spawn_blocking(move || f(&mut model))
            .await
            .map_err(|e| AppError::Internal(format!("model task panicked: {}", e)))?
    }

    /// Encode flights and predict, preserving input order
    pub async fn predict_flights(&self, records: &[FlightRecord]) -> Result<Vec<Label>> {
        let features = self.model.read().await.encode(records);
        self.predict(&features).await
    }

    /// Get service statistics
    pub async fn stats(&self) -> MLServiceStats {
        let model = self.model.read().await;

        MLServiceStats {
            is_trained: model.is_trained(),
            auto_fit: model.auto_fit_enabled(),
            cached_samples: model.cached_samples(),
            model: model.metadata().cloned(),
            training_summary: model.training_summary().cloned(),
        }
    }
}

/// ML service statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLServiceStats {
    pub is_trained: bool,
    pub auto_fit: bool,
    pub cached_samples: usize,
    pub model: Option<ModelMetadata>,
    pub training_summary: Option<TrainingSummary>,
}
