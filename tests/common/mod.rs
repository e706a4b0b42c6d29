//! Shared helpers for the integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use flight_delay_service::{
    api::{build_router, AppState},
    ml::{MLConfig, MLService},
    models::{FlightRecord, FlightType},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Historical flights where Grupo LATAM in July leaves late and
/// Sky Airline in March leaves on time.
pub fn training_records() -> Vec<FlightRecord> {
    let mut records = Vec::new();

    for day in 20..=23 {
        records.push(
            FlightRecord::new("Grupo LATAM", FlightType::International, 7).with_times(
                format!("2017-07-{:02} 09:00:00", day),
                format!("2017-07-{:02} 09:40:00", day),
            ),
        );
    }

    for day in 10..=21 {
        records.push(
            FlightRecord::new("Sky Airline", FlightType::National, 3).with_times(
                format!("2017-03-{:02} 14:00:00", day),
                format!("2017-03-{:02} 14:05:00", day),
            ),
        );
    }

    records
}

/// CSV export equivalent to [`training_records`]
pub fn training_csv() -> String {
    let mut csv = String::from("Fecha-I,Fecha-O,MES,TIPOVUELO,OPERA\n");
    for record in training_records() {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            record.scheduled_at.unwrap_or_default(),
            record.actual_at.unwrap_or_default(),
            record.month,
            record.flight_type,
            record.operator,
        ));
    }
    csv
}

pub fn untrained_service(auto_fit: bool) -> Arc<MLService> {
    Arc::new(MLService::new(MLConfig {
        auto_fit,
        ..MLConfig::default()
    }))
}

pub async fn trained_service() -> Arc<MLService> {
    let service = untrained_service(true);
    service
        .train_on_records(&training_records())
        .await
        .expect("training fixture should fit");
    service
}

pub fn test_app(service: Arc<MLService>) -> Router {
    build_router(AppState::new(service))
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.into()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}
