//! Initial center seeding
//! K-Means++ picks centers with probability proportional to their distance from
//! the centers chosen so far; random seeding picks `k` distinct points.

use rand::{RngExt, seq::{IndexedRandom, SliceRandom}};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::{document::Document, error::{ClusterError, Result}, types::DistanceMetric};

/// Choose `k` initial centers with the K-Means++ rule
///
/// # Algorithm
/// 1. Choose the first center uniformly at random
/// 2. For every further center, weight each point by its distance to the
///    nearest chosen center and draw the next center from that distribution
pub fn plus_plus_centers(
    points: &[Document],
    k: usize,
    metric: DistanceMetric,
    rng: &mut ChaCha20Rng
) -> Result<Vec<Document>> {
    check_k(points, k)?;
    let indices: Vec<usize> = (0..points.len()).collect();
    let first = *indices.choose(rng)
        .ok_or_else(|| ClusterError::InvalidArgument("no points to seed from".to_string()))?;
    let mut chosen = vec![first];

    // distance of every point to its nearest chosen center
    let mut nearest: Vec<f64> = points.par_iter()
        .map(|p| metric.distance(p, &points[first]))
        .collect::<Result<Vec<f64>>>()?;

    while chosen.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 && total.is_finite() {
            let target = rng.random_range(0.0..total);
            let mut cumulative = 0.0;
            let mut selected = None;
            for (i, d) in nearest.iter().enumerate() {
                cumulative += d;
                if target < cumulative && *d > 0.0 {
                    selected = Some(i);
                    break;
                }
            }
            // rounding can leave `target` past the last cumulative step
            selected.or_else(|| nearest.iter().rposition(|d| *d > 0.0))
        } else {
            None
        };
        // every remaining point coincides with a center: fall back to an unused index
        let next = match next {
            Some(i) => i,
            None => {
                let unused: Vec<usize> = indices.iter().copied().filter(|i| !chosen.contains(i)).collect();
                *unused.choose(rng)
                    .ok_or_else(|| ClusterError::InvalidArgument("ran out of points while seeding".to_string()))?
            }
        };
        chosen.push(next);

        let center = &points[next];
        let update: Vec<f64> = points.par_iter()
            .map(|p| metric.distance(p, center))
            .collect::<Result<Vec<f64>>>()?;
        nearest.iter_mut().zip(update).for_each(|(n, d)| if d < *n { *n = d });
    }

    Ok(chosen.into_iter().map(|i| points[i].clone()).collect())
}

/// Choose `k` distinct points uniformly at random
pub fn random_centers(points: &[Document], k: usize, rng: &mut ChaCha20Rng) -> Result<Vec<Document>> {
    check_k(points, k)?;
    let mut indices: Vec<usize> = (0..points.len()).collect();
    indices.shuffle(rng);
    Ok(indices.into_iter().take(k).map(|i| points[i].clone()).collect())
}

fn check_k(points: &[Document], k: usize) -> Result<()> {
    if k == 0 || k > points.len() {
        return Err(ClusterError::InvalidArgument(format!(
            "cannot seed {k} centers from {} points", points.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn points() -> Vec<Document> {
        [[0.0, 0.0], [0.0, 1.0], [50.0, 50.0], [50.0, 51.0], [-80.0, 3.0]].iter()
            .map(|p| Document::from_dense(p))
            .collect()
    }

    #[test]
    fn plus_plus_is_seeded_and_distinct() {
        let points = points();
        let mut rng = ChaCha20Rng::seed_from_u64(55);
        let a = plus_plus_centers(&points, 3, DistanceMetric::L2Squared, &mut rng).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(55);
        let b = plus_plus_centers(&points, 3, DistanceMetric::L2Squared, &mut rng).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        for i in 0..a.len() {
            for j in i + 1..a.len() {
                assert_ne!(a[i], a[j]);
            }
        }
    }

    #[test]
    fn duplicates_fall_back_to_unused_points() {
        let points = vec![Document::from_dense(&[1.0]); 4];
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(plus_plus_centers(&points, 4, DistanceMetric::L2, &mut rng).unwrap().len(), 4);
    }

    #[test]
    fn random_centers_respects_k() {
        let points = points();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        assert_eq!(random_centers(&points, 5, &mut rng).unwrap().len(), 5);
        assert!(random_centers(&points, 6, &mut rng).is_err());
        assert!(plus_plus_centers(&points, 0, DistanceMetric::L1, &mut rng).is_err());
    }
}
