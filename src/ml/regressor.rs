use anyhow::{bail, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numeric backend behind a model descriptor.
///
/// Maps positions in the model's index space to predicted values, one output
/// per input and in the same order.
#[cfg_attr(test, mockall::automock)]
pub trait Regressor: Send + Sync {
    fn evaluate(&self, indices: &Array1<f64>) -> Result<Array1<f64>>;
}

/// Polynomial regression over a single feature.
///
/// Evaluates `intercept + sum(coefficients[k] * x^k)`, with coefficients in
/// ascending power order (`coefficients[0]` weighs the bias column of the
/// expanded features).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolynomialRegressor {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl PolynomialRegressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self { coefficients, intercept }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("polynomial has no coefficients".to_string());
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("polynomial has non-finite coefficients".to_string());
        }
        Ok(())
    }

    fn value_at(&self, x: f64) -> f64 {
        // Horner's scheme from the highest power down
        let poly = self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c);
        poly + self.intercept
    }
}

impl Regressor for PolynomialRegressor {
    fn evaluate(&self, indices: &Array1<f64>) -> Result<Array1<f64>> {
        let values = indices.mapv(|x| self.value_at(x));
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            bail!(
                "Polynomial of degree {} produced a non-finite value at index {}",
                self.degree(),
                indices[pos]
            );
        }
        Ok(values)
    }
}

/// Serialized model payload, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Polynomial(PolynomialRegressor),
}

impl Artifact {
    pub fn into_regressor(self) -> Result<Arc<dyn Regressor>, String> {
        match self {
            Artifact::Polynomial(poly) => {
                poly.validate()?;
                Ok(Arc::new(poly))
            }
        }
    }
}
