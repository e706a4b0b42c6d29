pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::MLService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ml: Arc<MLService>,
}

impl AppState {
    pub fn new(ml: Arc<MLService>) -> Self {
        Self { ml }
    }
}
