use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array1;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{alignment, working_hours, PredictionError};
use crate::calendar::{expand_two_digit_year, BusinessCalendar};
use crate::ml::store::ModelDescriptor;
use crate::ml::{ModelStore, Regressor};

/// Request dates arrive as `YY-MM-DD`; this applies after year expansion
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const MODEL_PREFIX: &str = "polynomial_regression_";

/// Artifact name serving `symbol`
pub fn model_name(symbol: &str) -> String {
    format!("{}{}", MODEL_PREFIX, symbol.to_lowercase())
}

fn parse_date(input: &str) -> Result<NaiveDate, PredictionError> {
    let invalid = |reason: String| PredictionError::InvalidDate {
        input: input.to_string(),
        reason,
    };
    let expanded = expand_two_digit_year(input).ok_or_else(|| invalid("expected YY-MM-DD".to_string()))?;
    NaiveDate::parse_from_str(&expanded, DATE_FORMAT).map_err(|e| invalid(e.to_string()))
}

/// Parse a request range: `from` at midnight, `to` at end of day.
pub fn parse_date_range(from: &str, to: &str) -> Result<(NaiveDateTime, NaiveDateTime), PredictionError> {
    let from_date = parse_date(from)?;
    let to_date = parse_date(to)?;

    if from_date > to_date {
        return Err(PredictionError::InvalidDateRange {
            from: from_date,
            to: to_date,
        });
    }

    let start = from_date.and_time(chrono::NaiveTime::MIN);
    let end = to_date
        .and_hms_opt(23, 59, 59)
        .unwrap_or(start);
    Ok((start, end))
}

/// Predictions for one request
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    /// Model index of the first timestamp
    pub start_index: i64,
    /// Timestamp -> value with three decimals; timestamp keys sort chronologically
    pub predictions: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct PredictionService {
    models: Arc<ModelStore>,
    calendar: Arc<dyn BusinessCalendar>,
}

impl PredictionService {
    pub fn new(models: Arc<ModelStore>, calendar: Arc<dyn BusinessCalendar>) -> Self {
        Self { models, calendar }
    }

    pub fn models(&self) -> &Arc<ModelStore> {
        &self.models
    }

    /// Predict `symbol` for every trading hour between `from_date` and `to_date`
    pub async fn predict(&self, symbol: &str, from_date: &str, to_date: &str) -> Result<Forecast, PredictionError> {
        let (from, to) = parse_date_range(from_date, to_date)?;

        let descriptor = self.models.get_or_load(&model_name(symbol)).await?;

        // Calendar walks and evaluation grow with the range and run on the blocking pool
        let calendar = Arc::clone(&self.calendar);
        let forecast = tokio::task::spawn_blocking(move || forecast_range(&descriptor, from, to, calendar.as_ref()))
            .await
            .context("Prediction task failed")??;

        debug!(
            "Predicted {} from index {} over {} trading hours",
            symbol,
            forecast.start_index,
            forecast.predictions.len()
        );
        Ok(forecast)
    }
}

/// Build the trading-hour sequence for `[from, to]`, align it to the model
/// and evaluate it.
fn forecast_range(
    descriptor: &ModelDescriptor,
    from: NaiveDateTime,
    to: NaiveDateTime,
    calendar: &dyn BusinessCalendar,
) -> anyhow::Result<Forecast> {
    let hours = working_hours::generate(from, to, calendar);
    let start_index = alignment::align(from, descriptor.pred_start_date, descriptor.pred_start_index, calendar);

    let values = evaluate_range(descriptor.artifact.as_ref(), start_index, hours.len())?;

    let predictions = hours
        .into_iter()
        .zip(values.iter())
        .map(|(hour, value)| (hour, format!("{:.3}", value)))
        .collect();

    Ok(Forecast {
        start_index,
        predictions,
    })
}

/// Evaluate the indices `[start, start + len)`
fn evaluate_range(regressor: &dyn Regressor, start: i64, len: usize) -> anyhow::Result<Array1<f64>> {
    if len == 0 {
        return Ok(Array1::zeros(0));
    }

    let end = start + len as i64;
    let indices = Array1::from_iter((start..end).map(|i| i as f64));
    let values = regressor.evaluate(&indices)?;

    if values.len() != len {
        bail!("Model returned {} values for {} indices", values.len(), len);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Brazil;
    use crate::ml::regressor::MockRegressor;
    use crate::ml::store::test_support::write_polynomial_artifact;
    use crate::ml::ModelStoreError;

    /// Identity polynomial: predicted value equals the index
    fn service_with_identity_model(dir: &std::path::Path) -> PredictionService {
        write_polynomial_artifact(dir, "polynomial_regression_petr4", &[0.0, 1.0], 100, "24-01-02 10:00:00");
        PredictionService::new(Arc::new(ModelStore::new(dir, "json")), Arc::new(Brazil))
    }

    #[test]
    fn test_model_name_is_lowercased() {
        assert_eq!(model_name("PETR4"), "polynomial_regression_petr4");
    }

    #[test]
    fn test_parse_date_range() {
        let (from, to) = parse_date_range("24-01-02", "24-01-05").unwrap();
        assert_eq!(from.to_string(), "2024-01-02 00:00:00");
        assert_eq!(to.to_string(), "2024-01-05 23:59:59");

        // Same day is a valid range
        assert!(parse_date_range("24-01-02", "24-01-02").is_ok());
    }

    #[test]
    fn test_malformed_dates_are_invalid_date() {
        for bad in ["2023-13-40", "24-13-01", "24-02-30", "", "yesterday", "24/01/02", "24-01-02 10:00"] {
            let err = parse_date_range(bad, "24-01-02").unwrap_err();
            assert!(matches!(err, PredictionError::InvalidDate { .. }), "{}", bad);
            let err = parse_date_range("24-01-02", bad).unwrap_err();
            assert!(matches!(err, PredictionError::InvalidDate { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_two_digit_years_pivot_like_strptime() {
        let (from, to) = parse_date_range("69-01-01", "68-12-31").unwrap();
        assert_eq!(from.to_string(), "1969-01-01 00:00:00");
        assert_eq!(to.to_string(), "2068-12-31 23:59:59");

        for bad in ["4-01-02", "024-01-02", "+4-01-02"] {
            let err = parse_date_range(bad, "24-01-02").unwrap_err();
            assert!(matches!(err, PredictionError::InvalidDate { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_inverted_range_is_invalid_range() {
        let err = parse_date_range("24-01-03", "24-01-02").unwrap_err();
        assert!(matches!(err, PredictionError::InvalidDateRange { .. }));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_single_day_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());

        let forecast = service.predict("PETR4", "24-01-02", "24-01-02").await.unwrap();
        assert_eq!(forecast.start_index, 100);

        let entries: Vec<_> = forecast.predictions.iter().collect();
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0], (&"2024-01-02 10:00:00".to_string(), &"100.000".to_string()));
        assert_eq!(entries[6], (&"2024-01-02 16:00:00".to_string(), &"106.000".to_string()));
    }

    #[tokio::test]
    async fn test_keys_match_working_hours_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());

        let forecast = service.predict("petr4", "23-12-27", "24-01-09").await.unwrap();
        let (from, to) = parse_date_range("23-12-27", "24-01-09").unwrap();
        let expected = working_hours::generate(from, to, &Brazil);

        let keys: Vec<_> = forecast.predictions.keys().cloned().collect();
        assert_eq!(keys, expected);

        // Values are contiguous indices from the aligned start
        for (offset, value) in forecast.predictions.values().enumerate() {
            assert_eq!(value, &format!("{:.3}", (forecast.start_index + offset as i64) as f64));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_multi_year_range() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());

        let forecast = service.predict("petr4", "24-01-01", "33-12-31").await.unwrap();

        let working_days = Brazil.working_days_between(
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2033, 12, 31).unwrap(),
        );
        assert_eq!(forecast.predictions.len() as i64, working_days as i64 * working_hours::TRADING_HOURS_PER_DAY);
        assert!(forecast.predictions.contains_key("2033-12-30 16:00:00"));
        assert!(!forecast.predictions.contains_key("2033-12-31 10:00:00"));
    }

    #[tokio::test]
    async fn test_past_dates_align_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());

        // Fri 2023-12-29 -> reference Tue 2024-01-02: one working day (Jan 2)
        let forecast = service.predict("petr4", "23-12-29", "23-12-29").await.unwrap();
        assert_eq!(forecast.start_index, 93);
        assert_eq!(forecast.predictions.get("2023-12-29 10:00:00").unwrap(), "93.000");
    }

    #[tokio::test]
    async fn test_weekend_range_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());
        let forecast = service.predict("petr4", "24-01-06", "24-01-07").await.unwrap();
        assert!(forecast.predictions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_identity_model(dir.path());
        let err = service.predict("XXXX3", "24-01-02", "24-01-02").await.unwrap_err();
        assert!(matches!(err, PredictionError::Model(ModelStoreError::NotFound { .. })));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_dates_are_validated_before_model_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let service = PredictionService::new(Arc::new(ModelStore::new(dir.path(), "json")), Arc::new(Brazil));
        let err = service.predict("XXXX3", "bad", "24-01-02").await.unwrap_err();
        assert!(matches!(err, PredictionError::InvalidDate { .. }));
    }

    #[test]
    fn test_evaluate_range_passes_contiguous_indices() {
        let mut mock = MockRegressor::new();
        mock.expect_evaluate()
            .withf(|indices| indices.to_vec() == vec![10.0, 11.0, 12.0])
            .times(1)
            .returning(|indices| Ok(indices.mapv(|x| x * 2.0)));

        let values = evaluate_range(&mock, 10, 3).unwrap();
        assert_eq!(values.to_vec(), vec![20.0, 22.0, 24.0]);
    }

    #[test]
    fn test_evaluate_range_rejects_length_mismatch() {
        let mut mock = MockRegressor::new();
        mock.expect_evaluate()
            .returning(|_| Ok(Array1::zeros(1)));

        assert!(evaluate_range(&mock, 0, 5).is_err());
    }

    #[test]
    fn test_evaluate_range_skips_empty_ranges() {
        // No expectation set: any call would panic
        let mock = MockRegressor::new();
        let values = evaluate_range(&mock, 42, 0).unwrap();
        assert!(values.is_empty());
    }
}
