pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-12;

// Constraint defaults
pub const DEFAULT_MAX_ASSET_FRACTION: f64 = 0.3;
pub const DEFAULT_DIVERSIFICATION_WEIGHT: f64 = 0.1;

// Differential evolution defaults
pub const DEFAULT_MUTATION_FACTOR: f64 = 0.8;
pub const DEFAULT_CROSSOVER_RATE: f64 = 0.8;
pub const DEFAULT_GENERATIONS: usize = 100;
pub const DEFAULT_POPULATION_SIZE: usize = 100;
pub const DEFAULT_GENERATION_CHECK_INTERVAL: usize = 10;
pub const MAX_MUTATION_FACTOR: f64 = 2.0;
/// Target plus three distinct donors.
pub const MIN_POPULATION_SIZE: usize = 4;

// Market data
pub const TRADING_DAYS_PER_YEAR: f64 = 252.;
