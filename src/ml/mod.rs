/// Machine learning module for flight delay prediction
///
/// This module provides:
/// - Feature encoding of flight records onto a fixed one-hot whitelist
/// - Date-derived training features (period of day, high season, minutes late)
/// - A class-balanced logistic-regression classifier
/// - The delay model state machine with auto-fit from cached training data

pub mod classifier;
pub mod features;
pub mod models;
pub mod service;

pub use classifier::{Classifier, LogisticRegressionClassifier};
pub use features::{FeatureColumn, FeatureEncoder, FeatureTable, FeatureVector, PeriodOfDay};
pub use models::{Label, MLConfig, ModelMetadata, ModelMetrics, TrainingDataset, TrainingSummary};
pub use service::{AutoFit, DelayModel, MLService, MLServiceStats, ModelState};
