use thiserror::Error;

/// Aggregator trait which reduces a series to a single f64 number.
/// Sharpe ratios are built from a mean and a standard deviation aggregator.
pub trait Aggregator: Sync + Send {
    fn value(&self, series: &[f64]) -> Result<f64, AggregatorError>;
}

#[derive(Error, Debug, PartialEq)]
pub enum AggregatorError {
    #[error("Number of periods is invalid for aggregator: `{0}`")]
    InvalidNumberOfPeriods(String),
}

pub struct ArithmeticMean;
impl Aggregator for ArithmeticMean {
    fn value(&self, series: &[f64]) -> Result<f64, AggregatorError> {
        if series.is_empty() {
            return Err(AggregatorError::InvalidNumberOfPeriods(
                "Mean cannot be computed for an empty series.".into(),
            ));
        }
        Ok(series.iter().sum::<f64>() / (series.len() as f64))
    }
}

/// Sample standard deviation (n - 1 in the denominator).
pub struct StandardDeviation;
impl Aggregator for StandardDeviation {
    fn value(&self, series: &[f64]) -> Result<f64, AggregatorError> {
        if series.len() <= 1 {
            return Err(AggregatorError::InvalidNumberOfPeriods(
                "Standard deviation cannot be computed for series with less than 2 elements."
                    .into(),
            ));
        }
        let number_of_periods = series.len() as f64;
        let mean = ArithmeticMean.value(series)?;
        let variance =
            series.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (number_of_periods - 1.);
        Ok(variance.sqrt())
    }
}
