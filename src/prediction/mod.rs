pub mod alignment;
pub mod error;
pub mod service;
pub mod working_hours;

pub use error::PredictionError;
pub use service::{model_name, PredictionService};
