//! Support/resistance levels via seeded k-means over historical prices.
//!
//! The cluster count follows `clamp(distinct_prices / divisor, min, max)`;
//! all three knobs live in `ClusterSettings` so the heuristic can be
//! calibrated against historical data rather than treated as law.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::ClusterSettings;

const CONVERGENCE_EPS: f64 = 1e-9;

/// Cluster the flattened high/low price history into a small ascending
/// list of representative levels.
///
/// Deterministic for identical input and seed. Degenerate input (one
/// distinct price) yields that single level; empty input yields none.
pub fn cluster_levels(prices: &[f64], settings: &ClusterSettings) -> Vec<f64> {
    let mut distinct: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).expect("finite prices compare"));
    distinct.dedup();

    match distinct.len() {
        0 => return Vec::new(),
        1 => return distinct,
        _ => {}
    }

    let k = (distinct.len() / settings.divisor)
        .clamp(settings.min_clusters, settings.max_clusters)
        .min(distinct.len());

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut centroids: Vec<f64> = distinct.choose_multiple(&mut rng, k).copied().collect();
    centroids.sort_by(|a, b| a.partial_cmp(b).expect("finite centroids compare"));

    let mut assignments = vec![0usize; distinct.len()];
    for _ in 0..settings.max_iterations {
        // Assignment step
        for (i, price) in distinct.iter().enumerate() {
            assignments[i] = nearest_index(&centroids, *price);
        }

        // Update step
        let mut sums = vec![0.0; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (i, price) in distinct.iter().enumerate() {
            sums[assignments[i]] += price;
            counts[assignments[i]] += 1;
        }

        let mut max_shift: f64 = 0.0;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            if counts[c] == 0 {
                // Empty cluster keeps its position
                continue;
            }
            let updated = sums[c] / counts[c] as f64;
            max_shift = max_shift.max((updated - *centroid).abs());
            *centroid = updated;
        }

        if max_shift < CONVERGENCE_EPS {
            break;
        }
    }

    centroids.sort_by(|a, b| a.partial_cmp(b).expect("finite centroids compare"));
    centroids
}

/// Index of the centroid closest to `price`.
fn nearest_index(centroids: &[f64], price: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let dist = (price - c).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// The level nearest to `price`, if any exist.
pub fn nearest_level(levels: &[f64], price: f64) -> Option<f64> {
    levels
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - price)
                .abs()
                .partial_cmp(&(b - price).abs())
                .expect("finite levels compare")
        })
}
