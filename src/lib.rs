// Modules
pub mod consts;
pub mod evolution;
pub mod market_data;
pub mod optimizer;
pub mod portfolio;

pub use evolution::EvolutionError;
pub use optimizer::{optimize_portfolio, OptimizationReport, OptimizationRequest};
pub use portfolio::{Constraints, FitnessValue, Individual, Population};
