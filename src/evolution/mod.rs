use crate::consts::{
    DEFAULT_CROSSOVER_RATE, DEFAULT_GENERATIONS, DEFAULT_GENERATION_CHECK_INTERVAL,
    DEFAULT_MUTATION_FACTOR, DEFAULT_POPULATION_SIZE, MAX_MUTATION_FACTOR, MIN_POPULATION_SIZE,
};
use crate::portfolio::{FitnessValue, Individual, Population};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod differential_evolution;
pub mod fitness;
pub mod population;

pub use differential_evolution::differential_evolve;
pub use fitness::{evaluate_fitness, evaluate_population_fitness, total_cost};
pub use population::initialize_population;

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("Missing or invalid {field} for asset `{asset}`")]
    InputData { asset: String, field: &'static str },
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Invalid population parameters were passed: {0}")]
    BadPopulationParameter(String),
    #[error("Failed to build the evaluation thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

fn default_mutation_factor() -> f64 {
    DEFAULT_MUTATION_FACTOR
}

fn default_crossover_rate() -> f64 {
    DEFAULT_CROSSOVER_RATE
}

fn default_generations() -> usize {
    DEFAULT_GENERATIONS
}

fn default_population_size() -> usize {
    DEFAULT_POPULATION_SIZE
}

fn default_generation_check_interval() -> usize {
    DEFAULT_GENERATION_CHECK_INTERVAL
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DifferentialEvolutionConfig {
    /// Scale applied to the donor difference vector (F).
    #[serde(default = "default_mutation_factor")]
    pub mutation_factor: f64,
    /// Per-gene probability of taking the mutant value (CR).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Upper bound for the initial draw. Falls back to the clipping bound.
    #[serde(default)]
    pub initial_max_quantity: Option<u32>,
    /// Log progress every this many generations (0 disables it).
    #[serde(default = "default_generation_check_interval")]
    pub generation_check_interval: usize,
    #[serde(default)]
    pub global_seed: Option<u64>,
    /// Worker threads for fitness scoring and generations; 0 or 1 runs
    /// everything on the calling thread.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DifferentialEvolutionConfig {
    fn default() -> Self {
        DifferentialEvolutionConfig {
            mutation_factor: DEFAULT_MUTATION_FACTOR,
            crossover_rate: DEFAULT_CROSSOVER_RATE,
            generations: DEFAULT_GENERATIONS,
            population_size: DEFAULT_POPULATION_SIZE,
            initial_max_quantity: None,
            generation_check_interval: DEFAULT_GENERATION_CHECK_INTERVAL,
            global_seed: None,
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl DifferentialEvolutionConfig {
    pub fn validate(&self) -> Result<(), EvolutionError> {
        if self.population_size < MIN_POPULATION_SIZE {
            return Err(EvolutionError::Configuration(format!(
                "Population size must be at least {}, got {}",
                MIN_POPULATION_SIZE, self.population_size
            )));
        }
        if self.generations == 0 {
            return Err(EvolutionError::Configuration(
                "Generations must be at least 1".into(),
            ));
        }
        if !(self.mutation_factor > 0. && self.mutation_factor <= MAX_MUTATION_FACTOR) {
            return Err(EvolutionError::Configuration(format!(
                "Mutation factor must lie in (0, {}], got {}",
                MAX_MUTATION_FACTOR, self.mutation_factor
            )));
        }
        if !(0. ..=1.).contains(&self.crossover_rate) {
            return Err(EvolutionError::Configuration(format!(
                "Crossover rate must lie in [0, 1], got {}",
                self.crossover_rate
            )));
        }
        Ok(())
    }
}

/// Per-generation metrics, recorded after each generation's selection step.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GenerationHistory {
    /// Best fitness per generation, `None` while nothing is feasible.
    pub best_fitness_per_generation: Vec<Option<f64>>,
    pub average_feasible_fitness_per_generation: Vec<Option<f64>>,
    pub feasible_count_per_generation: Vec<usize>,
    pub replacements_per_generation: Vec<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvolutionResult {
    pub best_individual: Individual,
    pub best_index: usize,
    pub best_fitness: FitnessValue,
    pub final_population: Population,
    pub final_fitness: Vec<FitnessValue>,
    pub history: GenerationHistory,
    /// Seed the run actually used, so an unseeded run can be replayed.
    pub seed: u64,
}

impl EvolutionResult {
    /// `false` when the budget admitted no feasible candidate in the final population.
    pub fn is_feasible(&self) -> bool {
        self.best_fitness.is_feasible()
    }
}
