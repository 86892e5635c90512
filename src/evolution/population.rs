use crate::evolution::EvolutionError;
use crate::portfolio::Population;
use rand::distributions::Uniform;
use rand::prelude::*;

/// Draws `population_size` portfolios whose quantities are uniform on
/// `[0, max_quantity]`. Infeasible portfolios are kept; selection prunes them.
pub fn initialize_population<R: Rng + ?Sized>(
    assets_under_management: usize,
    population_size: usize,
    max_quantity: u32,
    rng: &mut R,
) -> Result<Population, EvolutionError> {
    if population_size == 0 && assets_under_management == 0 {
        return Err(EvolutionError::BadPopulationParameter(
            "Both population size and assets under management are zero, but none are supposed to be.".into(),
        ));
    } else if population_size == 0 {
        return Err(EvolutionError::BadPopulationParameter(
            "Population size cannot be zero".into(),
        ));
    } else if assets_under_management == 0 {
        return Err(EvolutionError::BadPopulationParameter(
            "Assets under management cannot be zero".into(),
        ));
    }

    let uniform = Uniform::new_inclusive(0, max_quantity);

    Ok((0..population_size)
        .map(|_| {
            (0..assets_under_management)
                .map(|_| uniform.sample(&mut *rng))
                .collect::<Vec<u32>>()
        })
        .collect::<Vec<_>>())
}
