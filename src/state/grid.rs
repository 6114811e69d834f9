//! Random grid generation.

use rand::{Rng, rng, seq::SliceRandom};

use crate::dto::game_state::Proposition;

/// Draw one grid of `items_per_grid` distinct proposition ids using the thread RNG.
///
/// When fewer propositions exist than requested, the grid holds every proposition.
pub fn generate_grid(propositions: &[Proposition], items_per_grid: usize) -> Vec<String> {
    generate_grid_with(&mut rng(), propositions, items_per_grid)
}

/// Draw `count` independent grids using the thread RNG.
pub fn generate_grids(
    propositions: &[Proposition],
    count: usize,
    items_per_grid: usize,
) -> Vec<Vec<String>> {
    generate_grids_with(&mut rng(), propositions, count, items_per_grid)
}

/// Same as [`generate_grid`] with a caller-provided random source.
pub fn generate_grid_with<R: Rng + ?Sized>(
    rng: &mut R,
    propositions: &[Proposition],
    items_per_grid: usize,
) -> Vec<String> {
    let mut shuffled: Vec<&Proposition> = propositions.iter().collect();
    shuffled.shuffle(rng);
    shuffled
        .into_iter()
        .take(items_per_grid)
        .map(|proposition| proposition.id.clone())
        .collect()
}

/// Same as [`generate_grids`] with a caller-provided random source.
pub fn generate_grids_with<R: Rng + ?Sized>(
    rng: &mut R,
    propositions: &[Proposition],
    count: usize,
    items_per_grid: usize,
) -> Vec<Vec<String>> {
    (0..count)
        .map(|_| generate_grid_with(&mut *rng, propositions, items_per_grid))
        .collect()
}
