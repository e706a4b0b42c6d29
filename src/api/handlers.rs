use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{Label, MLServiceStats};
use crate::models::{is_known_operator, FlightRecord, FlightType};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Predict delays for a batch of flights
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection_message(&rejection)))?;
    request.validate()?;

    let records = request
        .flights
        .into_iter()
        .map(FlightRecord::try_from)
        .collect::<Result<Vec<_>>>()?;

    let predictions = state.ml.predict_flights(&records).await?;

    tracing::info!("Successfully predicted {} flight(s)", predictions.len());

    Ok(Json(PredictResponse {
        predict: predictions,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(nested)]
    pub flights: Vec<FlightInput>,
}

/// One flight as sent by API clients.
///
/// Field names are the wire names lowercased, so validation messages can
/// report them back in upper case.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "UPPERCASE")]
pub struct FlightInput {
    #[validate(custom(function = "validate_operator"))]
    pub opera: String,

    #[validate(custom(function = "validate_flight_type"))]
    pub tipovuelo: String,

    #[validate(range(min = 1, max = 12, message = "MES must be between 1 and 12"))]
    pub mes: i64,
}

fn validate_operator(operator: &str) -> std::result::Result<(), ValidationError> {
    if is_known_operator(operator) {
        return Ok(());
    }
    let mut error = ValidationError::new("unknown_operator");
    error.message = Some("OPERA must be one of the valid operators".into());
    Err(error)
}

fn validate_flight_type(flight_type: &str) -> std::result::Result<(), ValidationError> {
    if flight_type.parse::<FlightType>().is_ok() {
        return Ok(());
    }
    let mut error = ValidationError::new("invalid_flight_type");
    error.message = Some("TIPOVUELO must be N or I".into());
    Err(error)
}

impl TryFrom<FlightInput> for FlightRecord {
    type Error = AppError;

    fn try_from(input: FlightInput) -> Result<Self> {
        let flight_type = input
            .tipovuelo
            .parse::<FlightType>()
            .map_err(|_| AppError::Validation("TIPOVUELO: TIPOVUELO must be N or I".to_string()))?;
        let month = u32::try_from(input.mes)
            .map_err(|_| AppError::Validation("MES: MES must be between 1 and 12".to_string()))?;

        Ok(FlightRecord::new(input.opera, flight_type, month))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predict: Vec<Label>,
}

/// Model status endpoint
pub async fn model_info(State(state): State<AppState>) -> Json<MLServiceStats> {
    Json(state.ml.stats().await)
}

/// Turn a body extraction failure into a `<field>: <reason>` message
fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => std::error::Error::source(err)
            .map(|source| source.to_string())
            .unwrap_or_else(|| format!("body: {}", err.body_text())),
        JsonRejection::JsonSyntaxError(_) => "body: malformed JSON".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "body: expected `Content-Type: application/json`".to_string()
        }
        other => format!("body: {}", other.body_text()),
    }
}
