use std::sync::Arc;

use crate::config::Settings;
use crate::prediction::PredictionService;

/// Shared handler state, built once in `main`
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub predictor: PredictionService,
}

impl AppState {
    pub fn new(settings: Settings, predictor: PredictionService) -> Self {
        Self {
            settings: Arc::new(settings),
            predictor,
        }
    }
}
