//! Categorical sampling over explicit integer weights.

use rand::Rng;

/// Pick an index from `weights` with probability proportional to its weight.
///
/// Cumulative-weight scan; weights need not be normalized. Panics on an
/// empty slice or all-zero weights, which is a programmer error in the
/// fixed tables this crate samples from.
pub fn categorical<R: Rng + ?Sized>(rng: &mut R, weights: &[u32]) -> usize {
    let total: u32 = weights.iter().sum();
    assert!(total > 0, "categorical: weights must sum to a positive total");
    let mut roll = rng.gen_range(0..total);
    for (i, w) in weights.iter().enumerate() {
        if roll < *w {
            return i;
        }
        roll -= *w;
    }
    // Unreachable: the roll is strictly below the total.
    weights.len() - 1
}
