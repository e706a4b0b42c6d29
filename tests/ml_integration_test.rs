/// Integration tests for the delay model
///
/// These tests verify the complete ML pipeline:
/// - CSV loading and preprocessing
/// - Model training
/// - Predictions in input order
/// - Auto-fit from cached training data
/// - Startup training through the service
mod common;

use common::*;
use flight_delay_service::{
    data::TrainingDataLoader,
    error::AppError,
    ml::{AutoFit, DelayModel, MLConfig, MLService, PeriodOfDay},
    models::{FlightRecord, FlightType},
};
use std::io::Write;

fn flights() -> Vec<FlightRecord> {
    vec![
        FlightRecord::new("Grupo LATAM", FlightType::International, 7),
        FlightRecord::new("Sky Airline", FlightType::National, 3),
        FlightRecord::new("Iberia", FlightType::National, 5),
    ]
}

#[test]
fn test_preprocess_then_fit_then_predict() {
    let mut model = DelayModel::new(MLConfig::default());

    let (features, labels) = model.preprocess(&training_records()).unwrap();
    assert_eq!(features.len(), 16);
    assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 4);

    let metrics = model.fit(&features, &labels).unwrap();
    assert_eq!(metrics.accuracy, 1.0);

    let features = model.encode(&flights());
    let predictions = model.predict(&features).unwrap();
    assert_eq!(predictions, vec![1, 0, 0]);
}

#[test]
fn test_auto_fit_on_first_predict() {
    let mut model = DelayModel::new(MLConfig::default());
    model.preprocess(&training_records()).unwrap();
    assert!(!model.is_trained());

    let features = model.encode(&flights());
    let predictions = model.predict(&features).unwrap();

    assert!(model.is_trained());
    assert_eq!(predictions, vec![1, 0, 0]);
}

#[test]
fn test_auto_fit_transitions() {
    let mut model = DelayModel::new(MLConfig::default());
    assert_eq!(model.auto_fit().unwrap(), AutoFit::NoData);

    model.preprocess(&training_records()).unwrap();
    assert_eq!(model.auto_fit().unwrap(), AutoFit::Trained);
    assert_eq!(model.auto_fit().unwrap(), AutoFit::AlreadyTrained);
}

#[test]
fn test_disabled_auto_fit_without_data_is_not_trained() {
    let mut model = DelayModel::new(MLConfig {
        auto_fit: false,
        ..MLConfig::default()
    });

    let features = model.encode(&flights());
    let err = model.predict(&features).unwrap_err();
    assert!(matches!(err, AppError::NotTrained));
}

#[test]
fn test_disabled_auto_fit_with_data_predicts_zeros() {
    let mut model = DelayModel::new(MLConfig {
        auto_fit: false,
        ..MLConfig::default()
    });
    model.preprocess(&training_records()).unwrap();

    let features = model.encode(&flights());
    let predictions = model.predict(&features).unwrap();

    assert_eq!(predictions, vec![0, 0, 0]);
    assert!(!model.is_trained());
}

#[test]
fn test_malformed_date_is_parse_error() {
    let mut model = DelayModel::new(MLConfig::default());
    let records = vec![FlightRecord::new("Grupo LATAM", FlightType::National, 1)
        .with_times("2017/01/01 10:00", "2017-01-01 10:20:00")];

    let err = model.preprocess(&records).unwrap_err();

    assert!(matches!(err, AppError::Parse(_)));
    assert_eq!(model.cached_samples(), 1);
}

#[test]
fn test_training_summary() {
    let mut model = DelayModel::new(MLConfig::default());
    model.preprocess(&training_records()).unwrap();

    let summary = model.training_summary().unwrap();
    assert_eq!(summary.n_samples, 16);
    assert!((summary.delay_rate - 0.25).abs() < 1e-12);
    assert_eq!(summary.delay_rate_by_period[&PeriodOfDay::Morning], 1.0);
    assert_eq!(summary.delay_rate_by_period[&PeriodOfDay::Afternoon], 0.0);
    // Late July is high season, mid March is not
    assert_eq!(summary.high_season_delay_rate, 1.0);
    assert_eq!(summary.low_season_delay_rate, 0.0);
}

#[test]
fn test_refit_replaces_model() {
    let mut model = DelayModel::new(MLConfig::default());
    let (features, labels) = model.preprocess(&training_records()).unwrap();
    model.fit(&features, &labels).unwrap();

    let flipped: Vec<u8> = labels.iter().map(|l| 1 - l).collect();
    model.fit(&features, &flipped).unwrap();

    let features = model.encode(&flights()[..2]);
    let predictions = model.predict(&features).unwrap();
    assert_eq!(predictions, vec![0, 1]);
}

#[tokio::test]
async fn test_service_trains_from_csv_at_start() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(training_csv().as_bytes()).unwrap();

    let service = MLService::new(MLConfig {
        training_data_path: Some(file.path().to_string_lossy().into_owned()),
        ..MLConfig::default()
    });
    service.start().await.unwrap();

    let stats = service.stats().await;
    assert!(stats.is_trained);
    assert_eq!(stats.cached_samples, 16);

    let predictions = service.predict_flights(&flights()).await.unwrap();
    assert_eq!(predictions, vec![1, 0, 0]);
}

#[tokio::test]
async fn test_service_start_without_dataset_stays_untrained() {
    let service = MLService::new(MLConfig {
        training_data_path: Some("/nonexistent/data.csv".to_string()),
        ..MLConfig::default()
    });
    service.start().await.unwrap();

    assert!(!service.stats().await.is_trained);

    let predictions = service.predict_flights(&flights()).await.unwrap();
    assert_eq!(predictions, vec![0, 0, 0]);
}

#[tokio::test]
async fn test_concurrent_predictions() {
    let service = trained_service().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.predict_flights(&flights()).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), vec![1, 0, 0]);
    }
}

#[test]
fn test_loader_reads_fixture_csv() {
    let records = TrainingDataLoader::read_records(training_csv().as_bytes()).unwrap();

    assert_eq!(records, training_records());
}
