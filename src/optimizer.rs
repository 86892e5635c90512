use crate::evolution::fitness::total_cost;
use crate::evolution::{
    differential_evolve, initialize_population, DifferentialEvolutionConfig, EvolutionError,
    GenerationHistory,
};
use crate::market_data::{compute_sharpe_and_last_price, PriceHistory};
use crate::portfolio::{AssetQuote, Constraints, FitnessValue, Individual, MarketSnapshot};
use itertools::izip;
use rand::prelude::*;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Where the per-asset scores and prices come from.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    /// Scores and prices computed elsewhere.
    Quotes { quotes: Vec<AssetQuote> },
    /// Raw close prices; Sharpe ratios and last prices are derived locally.
    PriceHistories {
        histories: Vec<PriceHistory>,
        #[serde(default)]
        risk_free_rate: f64,
    },
}

impl AssetSource {
    pub fn quotes(&self) -> Vec<AssetQuote> {
        match self {
            AssetSource::Quotes { quotes } => quotes.clone(),
            AssetSource::PriceHistories {
                histories,
                risk_free_rate,
            } => compute_sharpe_and_last_price(histories, *risk_free_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OptimizationRequest {
    pub assets: AssetSource,
    pub constraints: Constraints,
    #[serde(default)]
    pub evolution: DifferentialEvolutionConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetAllocation {
    pub ticker: String,
    pub quantity: u32,
    pub cost: f64,
    /// Share of the invested amount, 0 for an empty portfolio.
    pub cost_fraction: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub best_portfolio: Individual,
    pub allocations: Vec<AssetAllocation>,
    pub fitness: FitnessValue,
    pub total_cost: f64,
    pub remaining_budget: f64,
    pub seed: u64,
    pub history: GenerationHistory,
}

impl OptimizationReport {
    /// `false` when the budget was too small for any feasible combination.
    pub fn is_feasible(&self) -> bool {
        self.fitness.is_feasible()
    }
}

/// Validates the request, seeds the run, evolves a population and reports
/// the best portfolio found.
pub fn optimize_portfolio(
    request: &OptimizationRequest,
) -> Result<OptimizationReport, EvolutionError> {
    let snapshot = MarketSnapshot::from_quotes(&request.assets.quotes())?;
    let constraints = &request.constraints;
    constraints.validate()?;
    request.evolution.validate()?;

    let seed = request
        .evolution
        .global_seed
        .unwrap_or_else(|| OsRng.next_u64());
    let config = DifferentialEvolutionConfig {
        global_seed: Some(seed),
        ..request.evolution.clone()
    };

    let initial_max_quantity = config
        .initial_max_quantity
        .unwrap_or(constraints.quantity_bound);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let population = initialize_population(
        snapshot.len(),
        config.population_size,
        initial_max_quantity,
        &mut rng,
    )?;

    let result = differential_evolve(population, &snapshot, constraints, &config)?;
    let cost = total_cost(&result.best_individual, snapshot.prices());
    info!(
        "Best portfolio {:?} costs {:.2} of a {:.2} budget",
        result.best_individual, cost, constraints.budget
    );

    let allocations = izip!(
        snapshot.assets(),
        snapshot.prices(),
        &result.best_individual
    )
    .map(|(ticker, price, &quantity)| {
        let asset_cost = quantity as f64 * price;
        AssetAllocation {
            ticker: ticker.clone(),
            quantity,
            cost: asset_cost,
            cost_fraction: if cost > 0. { asset_cost / cost } else { 0. },
        }
    })
    .collect();

    Ok(OptimizationReport {
        best_portfolio: result.best_individual,
        allocations,
        fitness: result.best_fitness,
        total_cost: cost,
        remaining_budget: constraints.budget - cost,
        seed: result.seed,
        history: result.history,
    })
}
