use crate::consts::MIN_POPULATION_SIZE;
use crate::evolution::fitness::{score_population, score_portfolio};
use crate::evolution::{DifferentialEvolutionConfig, EvolutionError, EvolutionResult, GenerationHistory};
use crate::portfolio::{Constraints, FitnessValue, Individual, MarketSnapshot, Population};
use itertools::izip;
use rand::prelude::*;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

/// Everything a generation needs besides the population itself.
struct EvolutionContext<'a> {
    snapshot: &'a MarketSnapshot,
    constraints: &'a Constraints,
    config: &'a DifferentialEvolutionConfig,
    seed: u64,
}

struct GenerationOutcome {
    population: Population,
    fitness: Vec<FitnessValue>,
    replacements: usize,
}

/// Runs DE/rand/1/bin over integer quantities for `config.generations`
/// generations and returns the best portfolio of the final population.
///
/// Every (generation, index) pair draws from its own ChaCha20 stream of the
/// run seed, so the outcome does not depend on `max_concurrency`.
pub fn differential_evolve(
    initial_population: Population,
    snapshot: &MarketSnapshot,
    constraints: &Constraints,
    config: &DifferentialEvolutionConfig,
) -> Result<EvolutionResult, EvolutionError> {
    config.validate()?;
    constraints.validate()?;
    validate_population(&initial_population, snapshot, config)?;

    let seed = config.global_seed.unwrap_or_else(|| OsRng.next_u64());
    let pool = build_pool(config.max_concurrency)?;
    let context = EvolutionContext {
        snapshot,
        constraints,
        config,
        seed,
    };

    info!(
        "Starting differential evolution: {} assets, population {}, {} generations, seed {}",
        snapshot.len(),
        initial_population.len(),
        config.generations,
        seed
    );

    let mut population = initial_population;
    let mut fitness = score_population(&population, snapshot, constraints, pool.as_ref());
    let mut history = GenerationHistory::default();

    for generation in 0..config.generations {
        let outcome = evolve_generation(&population, &fitness, generation, &context, pool.as_ref());
        population = outcome.population;
        fitness = outcome.fitness;
        record_generation(&mut history, &fitness, outcome.replacements);

        let interval = config.generation_check_interval;
        if interval > 0 && (generation + 1) % interval == 0 {
            info!(
                "Generation {}/{}: best fitness {:?}, {} feasible, {} replacements",
                generation + 1,
                config.generations,
                history.best_fitness_per_generation[generation],
                history.feasible_count_per_generation[generation],
                outcome.replacements
            );
        }
    }

    let final_fitness = score_population(&population, snapshot, constraints, pool.as_ref());
    let (best_index, best_fitness) = select_best(&final_fitness).ok_or_else(|| {
        EvolutionError::BadPopulationParameter("Final population is empty".into())
    })?;

    if best_fitness.is_feasible() {
        info!(
            "Evolution complete. Best portfolio at index {} with fitness {:?}",
            best_index, best_fitness
        );
    } else {
        warn!("Evolution complete, but no portfolio in the final population is feasible. Check the budget against the asset prices.");
    }

    Ok(EvolutionResult {
        best_individual: population[best_index].clone(),
        best_index,
        best_fitness,
        final_population: population,
        final_fitness,
        history,
        seed,
    })
}

fn validate_population(
    population: &[Individual],
    snapshot: &MarketSnapshot,
    config: &DifferentialEvolutionConfig,
) -> Result<(), EvolutionError> {
    if population.len() < MIN_POPULATION_SIZE {
        return Err(EvolutionError::Configuration(format!(
            "Population must hold at least {} portfolios, got {}",
            MIN_POPULATION_SIZE,
            population.len()
        )));
    }
    if population.len() != config.population_size {
        return Err(EvolutionError::Configuration(format!(
            "Population holds {} portfolios but the configuration expects {}",
            population.len(),
            config.population_size
        )));
    }
    if let Some(index) = population
        .iter()
        .position(|individual| individual.len() != snapshot.len())
    {
        return Err(EvolutionError::Configuration(format!(
            "Portfolio {} has {} quantities for {} assets",
            index,
            population[index].len(),
            snapshot.len()
        )));
    }
    Ok(())
}

fn build_pool(max_concurrency: usize) -> Result<Option<ThreadPool>, EvolutionError> {
    if max_concurrency <= 1 {
        return Ok(None);
    }
    Ok(Some(
        ThreadPoolBuilder::new()
            .num_threads(max_concurrency)
            .build()?,
    ))
}

/// Stream 0 of the seed belongs to the population initializer.
fn trial_rng(seed: u64, generation: usize, index: usize, population_size: usize) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(1 + (generation * population_size + index) as u64);
    rng
}

/// Three distinct donors, none of them the target.
fn select_donors<R: Rng>(population_size: usize, target: usize, rng: &mut R) -> (usize, usize, usize) {
    let candidates: Vec<usize> = (0..population_size).filter(|&idx| idx != target).collect();
    let donors: Vec<usize> = candidates.choose_multiple(rng, 3).copied().collect();
    (donors[0], donors[1], donors[2])
}

/// `round(clip(a + F * (b - c), 0, bound))`, rounding half to even.
fn mutate(a: &[u32], b: &[u32], c: &[u32], mutation_factor: f64, quantity_bound: u32) -> Individual {
    izip!(a, b, c)
        .map(|(&a, &b, &c)| {
            let value = a as f64 + mutation_factor * (b as f64 - c as f64);
            value.clamp(0., quantity_bound as f64).round_ties_even() as u32
        })
        .collect()
}

/// Binomial crossover. The guaranteed index is drawn once per trial, so the
/// trial always carries at least one mutant gene.
fn binomial_crossover<R: Rng>(
    target: &[u32],
    mutant: &[u32],
    crossover_rate: f64,
    rng: &mut R,
) -> Individual {
    let guaranteed = rng.gen_range(0..target.len());
    target
        .iter()
        .zip(mutant.iter())
        .enumerate()
        .map(|(j, (&target_gene, &mutant_gene))| {
            if rng.gen::<f64>() < crossover_rate || j == guaranteed {
                mutant_gene
            } else {
                target_gene
            }
        })
        .collect()
}

/// One generation against an immutable snapshot of the current population.
/// The next population is assembled by index and only then handed back.
fn evolve_generation(
    population: &[Individual],
    fitness: &[FitnessValue],
    generation: usize,
    context: &EvolutionContext,
    pool: Option<&ThreadPool>,
) -> GenerationOutcome {
    let population_size = population.len();
    let config = context.config;

    let evolve_one = |i: usize| -> (Individual, FitnessValue, bool) {
        let mut rng = trial_rng(context.seed, generation, i, population_size);
        let (a, b, c) = select_donors(population_size, i, &mut rng);
        let mutant = mutate(
            &population[a],
            &population[b],
            &population[c],
            config.mutation_factor,
            context.constraints.quantity_bound,
        );
        let trial = binomial_crossover(&population[i], &mutant, config.crossover_rate, &mut rng);
        let trial_fitness = score_portfolio(&trial, context.snapshot, context.constraints);

        if trial_fitness.improves_on(&fitness[i]) {
            (trial, trial_fitness, true)
        } else {
            (population[i].clone(), fitness[i], false)
        }
    };

    let decisions: Vec<(Individual, FitnessValue, bool)> = match pool {
        Some(pool) => pool.install(|| (0..population_size).into_par_iter().map(evolve_one).collect()),
        None => (0..population_size).map(evolve_one).collect(),
    };

    let mut next_population = Vec::with_capacity(population_size);
    let mut next_fitness = Vec::with_capacity(population_size);
    let mut replacements = 0;
    for (individual, value, replaced) in decisions {
        next_population.push(individual);
        next_fitness.push(value);
        replacements += replaced as usize;
    }
    debug!("Generation {}: {} replacements", generation + 1, replacements);

    GenerationOutcome {
        population: next_population,
        fitness: next_fitness,
        replacements,
    }
}

/// Index and value of the best fitness, first occurrence on ties.
fn select_best(fitness: &[FitnessValue]) -> Option<(usize, FitnessValue)> {
    fitness
        .iter()
        .copied()
        .enumerate()
        .reduce(|best, candidate| {
            if candidate.1.improves_on(&best.1) {
                candidate
            } else {
                best
            }
        })
}

fn record_generation(history: &mut GenerationHistory, fitness: &[FitnessValue], replacements: usize) {
    let feasible: Vec<f64> = fitness.iter().filter_map(FitnessValue::value).collect();
    let best = feasible.iter().copied().reduce(f64::max);
    let average = if feasible.is_empty() {
        None
    } else {
        Some(feasible.iter().sum::<f64>() / feasible.len() as f64)
    };

    history.best_fitness_per_generation.push(best);
    history.average_feasible_fitness_per_generation.push(average);
    history.feasible_count_per_generation.push(feasible.len());
    history.replacements_per_generation.push(replacements);
}
