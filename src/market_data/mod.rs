use crate::consts::{FLOAT_COMPARISON_EPSILON, TRADING_DAYS_PER_YEAR};
use crate::portfolio::AssetQuote;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod aggregator;

use aggregator::{Aggregator, ArithmeticMean, StandardDeviation};

/// Closing prices of one asset, oldest first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub ticker: String,
    pub closes: Vec<f64>,
}

/// Daily simple returns `close[t] / close[t - 1] - 1`.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|pair| pair[1] / pair[0] - 1.)
        .collect()
}

/// Annualized Sharpe ratio of a close series, `None` when the series is too
/// short for a volatility estimate. A flat series scores 0.
pub fn annualized_sharpe_ratio(closes: &[f64], risk_free_rate: f64) -> Option<f64> {
    let returns = daily_returns(closes);
    let mean_return = ArithmeticMean.value(&returns).ok()?;
    let volatility = StandardDeviation.value(&returns).ok()?;

    if volatility.abs() >= FLOAT_COMPARISON_EPSILON {
        Some((mean_return - risk_free_rate) / volatility * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        Some(0.)
    }
}

/// Turns raw price histories into quotes. Assets without usable data keep
/// `None` fields, which the optimizer rejects before running.
pub fn compute_sharpe_and_last_price(
    histories: &[PriceHistory],
    risk_free_rate: f64,
) -> Vec<AssetQuote> {
    histories
        .par_iter()
        .map(|history| {
            let usable = history.closes.iter().all(|close| close.is_finite() && *close > 0.);
            if !usable {
                warn!(
                    "Price history for `{}` contains missing or non-positive closes",
                    history.ticker
                );
            }
            let sharpe_ratio = if usable {
                annualized_sharpe_ratio(&history.closes, risk_free_rate)
            } else {
                None
            };
            if sharpe_ratio.is_none() && usable {
                warn!(
                    "Not enough price data for `{}` to compute a Sharpe ratio ({} closes)",
                    history.ticker,
                    history.closes.len()
                );
            }

            AssetQuote {
                ticker: history.ticker.clone(),
                sharpe_ratio,
                last_price: history.closes.last().copied().filter(|_| usable),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_returns() {
        let returns = daily_returns(&[100., 110., 99.]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_annualized_sharpe_ratio() {
        let closes = [100., 101., 100.5, 102., 103.];
        let returns = daily_returns(&closes);
        let mean = ArithmeticMean.value(&returns).unwrap();
        let std = StandardDeviation.value(&returns).unwrap();
        let expected = (mean - 0.0001) / std * 252_f64.sqrt();

        let sharpe = annualized_sharpe_ratio(&closes, 0.0001).unwrap();
        assert!((sharpe - expected).abs() < 1e-12, "Expected {}, got {}", expected, sharpe);
        assert!(sharpe > 0., "A rising series should have a positive Sharpe ratio");
    }

    #[test]
    fn test_short_or_flat_series() {
        assert_eq!(annualized_sharpe_ratio(&[], 0.), None);
        assert_eq!(annualized_sharpe_ratio(&[100., 101.], 0.), None, "One return has no volatility estimate");
        assert_eq!(annualized_sharpe_ratio(&[50., 50., 50.], 0.), Some(0.));
    }

    #[test]
    fn test_quotes_keep_order_and_flag_missing_data() {
        let histories = vec![
            PriceHistory {
                ticker: "AAPL".into(),
                closes: vec![180., 182., 181., 185.],
            },
            PriceHistory {
                ticker: "GONE".into(),
                closes: vec![],
            },
            PriceHistory {
                ticker: "HOLE".into(),
                closes: vec![10., f64::NAN, 11.],
            },
        ];
        let quotes = compute_sharpe_and_last_price(&histories, 0.);

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].ticker, "AAPL");
        assert_eq!(quotes[0].last_price, Some(185.));
        assert!(quotes[0].sharpe_ratio.is_some());

        assert_eq!(quotes[1].ticker, "GONE");
        assert_eq!(quotes[1].sharpe_ratio, None);
        assert_eq!(quotes[1].last_price, None);

        assert_eq!(quotes[2].sharpe_ratio, None);
        assert_eq!(quotes[2].last_price, None);
    }
}
