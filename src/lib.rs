//! Flight delay prediction service.
//!
//! Scores scheduled flights with a class-balanced logistic-regression model
//! trained on historical departures, and serves predictions over HTTP.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
