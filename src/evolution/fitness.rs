use crate::evolution::EvolutionError;
use crate::portfolio::{Constraints, FitnessValue, Individual, MarketSnapshot};
use rayon::prelude::*;
use rayon::ThreadPool;

/// Cost of buying `individual` at the snapshot prices.
pub fn total_cost(individual: &[u32], prices: &[f64]) -> f64 {
    individual
        .iter()
        .zip(prices.iter())
        .map(|(&quantity, price)| quantity as f64 * price)
        .sum::<f64>()
}

fn check_alignment(individual: &[u32], snapshot: &MarketSnapshot) -> Result<(), EvolutionError> {
    if individual.len() != snapshot.len() {
        return Err(EvolutionError::Configuration(format!(
            "Portfolio has {} quantities for {} assets",
            individual.len(),
            snapshot.len()
        )));
    }
    Ok(())
}

/// Scores one candidate portfolio.
///
/// A portfolio over budget, or one where any single asset takes more than
/// `max_asset_fraction` of the invested amount, is `Infeasible`. Otherwise the
/// fitness is the quantity-weighted score minus the diversification penalty
/// `(N - held) / N`, scaled by `diversification_weight`.
///
/// Fails when the portfolio is not aligned with the snapshot's assets.
pub fn evaluate_fitness(
    individual: &[u32],
    snapshot: &MarketSnapshot,
    constraints: &Constraints,
) -> Result<FitnessValue, EvolutionError> {
    check_alignment(individual, snapshot)?;
    Ok(score_portfolio(individual, snapshot, constraints))
}

/// Scores a whole population, preserving population order.
pub fn evaluate_population_fitness(
    population: &[Individual],
    snapshot: &MarketSnapshot,
    constraints: &Constraints,
) -> Result<Vec<FitnessValue>, EvolutionError> {
    population
        .iter()
        .try_for_each(|individual| check_alignment(individual, snapshot))?;
    Ok(population
        .par_iter()
        .map(|individual| score_portfolio(individual, snapshot, constraints))
        .collect())
}

/// Fitness of a portfolio already known to match the snapshot's length.
pub(crate) fn score_portfolio(
    individual: &[u32],
    snapshot: &MarketSnapshot,
    constraints: &Constraints,
) -> FitnessValue {
    debug_assert_eq!(individual.len(), snapshot.len());
    let prices = snapshot.prices();
    let cost = total_cost(individual, prices);
    if cost > constraints.budget {
        return FitnessValue::Infeasible;
    }

    // An empty portfolio has every fraction at zero.
    if cost > 0. {
        let over_concentrated = individual
            .iter()
            .zip(prices.iter())
            .any(|(&quantity, price)| {
                (quantity as f64 * price) / cost > constraints.max_asset_fraction
            });
        if over_concentrated {
            return FitnessValue::Infeasible;
        }
    }

    let weighted_score = individual
        .iter()
        .zip(snapshot.scores().iter())
        .map(|(&quantity, score)| quantity as f64 * score)
        .sum::<f64>();

    let max_assets = snapshot.len() as f64;
    let held_assets = individual.iter().filter(|&&quantity| quantity != 0).count() as f64;
    let diversification_penalty = (max_assets - held_assets) / max_assets;

    FitnessValue::Feasible(weighted_score - constraints.diversification_weight * diversification_penalty)
}

/// Batch scoring of a validated population on the engine's pool, or on the
/// calling thread when there is none.
pub(crate) fn score_population(
    population: &[Individual],
    snapshot: &MarketSnapshot,
    constraints: &Constraints,
    pool: Option<&ThreadPool>,
) -> Vec<FitnessValue> {
    let score = |individual: &Individual| score_portfolio(individual, snapshot, constraints);
    match pool {
        Some(pool) => pool.install(|| population.par_iter().map(score).collect()),
        None => population.iter().map(score).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(scores: Vec<f64>, prices: Vec<f64>) -> MarketSnapshot {
        let assets = (0..scores.len()).map(|i| format!("ASSET{}", i)).collect();
        MarketSnapshot::new(assets, scores, prices).unwrap()
    }

    fn relaxed(budget: f64) -> Constraints {
        Constraints {
            budget,
            max_asset_fraction: 1.0,
            diversification_weight: 0.,
            quantity_bound: 10,
        }
    }

    #[test]
    fn test_over_budget_is_infeasible_and_exact_budget_is_not() {
        let market = snapshot(vec![1.0, 0.5], vec![100., 50.]);
        let constraints = relaxed(200.);

        assert_eq!(
            evaluate_fitness(&[2, 1], &market, &constraints).unwrap(),
            FitnessValue::Infeasible,
            "Cost 250 exceeds the budget of 200"
        );
        assert_eq!(
            evaluate_fitness(&[2, 0], &market, &constraints).unwrap(),
            FitnessValue::Feasible(2.0),
            "Cost exactly equal to the budget is feasible"
        );

        // Scores never rescue an over-budget portfolio.
        let generous = snapshot(vec![1e6, 1e6], vec![100., 50.]);
        assert_eq!(
            evaluate_fitness(&[2, 2], &generous, &constraints).unwrap(),
            FitnessValue::Infeasible
        );
    }

    #[test]
    fn test_concentration_cap_rejects_all_in_allocation() {
        let market = snapshot(vec![2.0, 1.0, 1.0], vec![10., 10., 10.]);
        let constraints = Constraints::new(1000., 10);

        assert_eq!(
            evaluate_fitness(&[5, 0, 0], &market, &constraints).unwrap(),
            FitnessValue::Infeasible,
            "A single-asset allocation breaks the 30% cap even under budget"
        );
        // 4/10 = 40% in the first asset.
        assert_eq!(
            evaluate_fitness(&[4, 3, 3], &market, &constraints).unwrap(),
            FitnessValue::Infeasible
        );
    }

    #[test]
    fn test_empty_portfolio_scores_minus_diversification_weight() {
        let market = snapshot(vec![0.3, -0.2, 1.1, 0.7, 0.0], vec![10., 20., 30., 40., 50.]);
        let constraints = Constraints::new(5000., 100);
        assert_eq!(
            evaluate_fitness(&[0, 0, 0, 0, 0], &market, &constraints).unwrap(),
            FitnessValue::Feasible(-0.1)
        );
    }

    #[test]
    fn test_diversification_penalty_counts_held_assets() {
        let market = snapshot(vec![1.0, 1.0, 1.0, 1.0], vec![10., 10., 10., 10.]);
        let constraints = Constraints {
            budget: 1000.,
            max_asset_fraction: 0.5,
            diversification_weight: 0.4,
            quantity_bound: 10,
        };
        // Two of four assets held: penalty 0.5, weighted score 2.
        let fitness = evaluate_fitness(&[1, 1, 0, 0], &market, &constraints).unwrap();
        assert_eq!(fitness, FitnessValue::Feasible(2.0 - 0.4 * 0.5));

        let fitness = evaluate_fitness(&[1, 1, 1, 1], &market, &constraints).unwrap();
        assert_eq!(fitness, FitnessValue::Feasible(4.0));
    }

    #[test]
    fn test_raising_a_score_raises_fitness() {
        // Each asset costs 25 of the 100 invested, under the 30% cap.
        let portfolio = [1, 2, 1, 1];
        let prices = vec![25., 12.5, 25., 25.];
        let scores = vec![0.5, 0.2, 0.1, -0.3];
        let constraints = Constraints::new(1000., 10);
        let base = evaluate_fitness(&portfolio, &snapshot(scores.clone(), prices.clone()), &constraints).unwrap();
        assert!(base.is_feasible(), "Portfolio should satisfy the 30% cap");

        for asset in 0..portfolio.len() {
            let mut raised_scores = scores.clone();
            raised_scores[asset] += 0.25;
            let raised = evaluate_fitness(
                &portfolio,
                &snapshot(raised_scores, prices.clone()),
                &constraints,
            )
            .unwrap();
            assert!(
                raised.improves_on(&base),
                "Raising the score of asset {} should raise fitness: {:?} vs {:?}",
                asset,
                raised,
                base
            );
        }
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let market = snapshot(vec![0.123, 0.456, 0.789], vec![12.5, 33.3, 7.1]);
        let constraints = Constraints {
            max_asset_fraction: 0.6,
            ..Constraints::new(500., 10)
        };
        let individual = [3, 2, 4];
        let first = evaluate_fitness(&individual, &market, &constraints).unwrap()
            .value()
            .expect("Portfolio should be feasible");
        let second = evaluate_fitness(&individual, &market, &constraints).unwrap()
            .value()
            .expect("Portfolio should be feasible");
        assert_eq!(
            first.to_bits(),
            second.to_bits(),
            "Repeated evaluation must be bit-identical"
        );
    }

    #[test]
    fn test_population_fitness_keeps_order() {
        let market = snapshot(vec![1.0, 0.5], vec![100., 50.]);
        let constraints = relaxed(200.);
        let population = vec![vec![2, 2], vec![0, 2], vec![1, 2], vec![0, 0]];
        let fitness = evaluate_population_fitness(&population, &market, &constraints).unwrap();
        assert_eq!(
            fitness,
            vec![
                FitnessValue::Infeasible,
                FitnessValue::Feasible(1.0),
                FitnessValue::Feasible(2.0),
                FitnessValue::Feasible(0.0),
            ]
        );
    }

    #[test]
    fn test_misaligned_portfolio_is_rejected() {
        let market = snapshot(vec![1.0, 0.5], vec![100., 50.]);
        let constraints = Constraints::new(100., 10);

        assert!(
            matches!(
                evaluate_fitness(&[], &market, &constraints),
                Err(EvolutionError::Configuration(_))
            ),
            "An empty quantity vector must not be scored against two assets"
        );
        assert!(matches!(
            evaluate_fitness(&[1, 0, 0], &market, &constraints),
            Err(EvolutionError::Configuration(_))
        ));
        assert!(matches!(
            evaluate_population_fitness(&[vec![0, 0], vec![1]], &market, &constraints),
            Err(EvolutionError::Configuration(_))
        ));
    }

    #[test]
    fn test_pooled_and_sequential_batches_agree() {
        let market = snapshot(vec![1.0, 0.5], vec![100., 50.]);
        let constraints = relaxed(200.);
        let population = vec![vec![2, 2], vec![0, 2], vec![1, 2], vec![0, 0], vec![1, 1]];
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let sequential = score_population(&population, &market, &constraints, None);
        let pooled = score_population(&population, &market, &constraints, Some(&pool));
        assert_eq!(sequential, pooled);
        assert_eq!(
            sequential,
            evaluate_population_fitness(&population, &market, &constraints).unwrap()
        );
    }

    #[test]
    fn test_total_cost() {
        assert_eq!(total_cost(&[2, 1, 0], &[100., 50., 7.]), 250.);
        assert_eq!(total_cost(&[0, 0], &[100., 50.]), 0.);
    }
}
