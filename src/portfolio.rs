use crate::consts::{DEFAULT_DIVERSIFICATION_WEIGHT, DEFAULT_MAX_ASSET_FRACTION};
use crate::evolution::EvolutionError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Quantity held of each asset, aligned with the asset order of the run.
pub type Individual = Vec<u32>;
pub type Population = Vec<Individual>;

/// Score of a candidate portfolio.
///
/// Variant order matters: the derived ordering puts `Infeasible` below every
/// feasible value, and two infeasible candidates compare equal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "status", content = "value")]
pub enum FitnessValue {
    Infeasible,
    Feasible(f64),
}

impl FitnessValue {
    pub fn is_feasible(&self) -> bool {
        matches!(self, FitnessValue::Feasible(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            FitnessValue::Feasible(value) => Some(*value),
            FitnessValue::Infeasible => None,
        }
    }

    /// Strict improvement; ties keep the incumbent.
    pub fn improves_on(&self, incumbent: &FitnessValue) -> bool {
        matches!(self.partial_cmp(incumbent), Some(Ordering::Greater))
    }
}

fn default_max_asset_fraction() -> f64 {
    DEFAULT_MAX_ASSET_FRACTION
}

fn default_diversification_weight() -> f64 {
    DEFAULT_DIVERSIFICATION_WEIGHT
}

/// Budget and allocation rules every candidate is scored against.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Constraints {
    /// Maximum total cost of a portfolio.
    pub budget: f64,
    /// Maximum share of the invested amount a single asset may take.
    #[serde(default = "default_max_asset_fraction")]
    pub max_asset_fraction: f64,
    /// Weight of the penalty for assets left at zero quantity.
    #[serde(default = "default_diversification_weight")]
    pub diversification_weight: f64,
    /// Inclusive upper bound on the quantity of any asset after mutation.
    pub quantity_bound: u32,
}

impl Constraints {
    pub fn new(budget: f64, quantity_bound: u32) -> Self {
        Constraints {
            budget,
            max_asset_fraction: DEFAULT_MAX_ASSET_FRACTION,
            diversification_weight: DEFAULT_DIVERSIFICATION_WEIGHT,
            quantity_bound,
        }
    }

    pub fn validate(&self) -> Result<(), EvolutionError> {
        if !self.budget.is_finite() || self.budget <= 0. {
            return Err(EvolutionError::Configuration(format!(
                "Budget must be a positive number, got {}",
                self.budget
            )));
        }
        if !(self.max_asset_fraction > 0. && self.max_asset_fraction <= 1.) {
            return Err(EvolutionError::Configuration(format!(
                "Max asset fraction must lie in (0, 1], got {}",
                self.max_asset_fraction
            )));
        }
        if !self.diversification_weight.is_finite() || self.diversification_weight < 0. {
            return Err(EvolutionError::Configuration(format!(
                "Diversification weight must be non-negative, got {}",
                self.diversification_weight
            )));
        }
        Ok(())
    }
}

/// Externally computed figures for one asset. Missing values are allowed here
/// and rejected when the snapshot is built.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetQuote {
    pub ticker: String,
    pub sharpe_ratio: Option<f64>,
    pub last_price: Option<f64>,
}

/// Validated, immutable inputs of one optimization run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    assets: Vec<String>,
    scores: Vec<f64>,
    prices: Vec<f64>,
}

impl MarketSnapshot {
    pub fn new(
        assets: Vec<String>,
        scores: Vec<f64>,
        prices: Vec<f64>,
    ) -> Result<Self, EvolutionError> {
        if assets.is_empty() {
            return Err(EvolutionError::Configuration(
                "At least one asset is required".into(),
            ));
        }
        if scores.len() != assets.len() || prices.len() != assets.len() {
            return Err(EvolutionError::Configuration(format!(
                "Mismatched input lengths: {} assets, {} scores, {} prices",
                assets.len(),
                scores.len(),
                prices.len()
            )));
        }
        for (asset, score, price) in itertools::izip!(&assets, &scores, &prices) {
            if !score.is_finite() {
                return Err(EvolutionError::InputData {
                    asset: asset.clone(),
                    field: "sharpe ratio",
                });
            }
            if !price.is_finite() || *price < 0. {
                return Err(EvolutionError::InputData {
                    asset: asset.clone(),
                    field: "price",
                });
            }
        }
        Ok(MarketSnapshot {
            assets,
            scores,
            prices,
        })
    }

    pub fn from_quotes(quotes: &[AssetQuote]) -> Result<Self, EvolutionError> {
        let mut assets = Vec::with_capacity(quotes.len());
        let mut scores = Vec::with_capacity(quotes.len());
        let mut prices = Vec::with_capacity(quotes.len());

        for quote in quotes {
            let missing = |field| EvolutionError::InputData {
                asset: quote.ticker.clone(),
                field,
            };
            scores.push(quote.sharpe_ratio.ok_or_else(|| missing("sharpe ratio"))?);
            prices.push(quote.last_price.ok_or_else(|| missing("price"))?);
            assets.push(quote.ticker.clone());
        }
        Self::new(assets, scores, prices)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
