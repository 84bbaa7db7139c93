//! Weighting function for multi-token output-head rows.

use crate::config::DecayFactor;

/// Normalized front-loaded weights for a donor sequence of length `n`.
///
/// - decay `0`: `[1, 0, 0, ...]` (first token only)
/// - decay `1`: `[1/n, ..., 1/n]` (mean)
/// - otherwise: weight `i` ∝ `decay^i`, normalized to sum to 1
///
/// Returns an empty vector for `n = 0`.
pub fn weights(n: usize, decay: DecayFactor) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }

    let decay = decay.value();
    if n == 1 || decay == 0.0 {
        let mut w = vec![0.0; n];
        w[0] = 1.0;
        return w;
    }
    if decay == 1.0 {
        return vec![1.0 / n as f64; n];
    }

    let powers: Vec<f64> = (0..n).map(|i| decay.powi(i as i32)).collect();
    let total: f64 = powers.iter().sum();
    powers.into_iter().map(|p| p / total).collect()
}
