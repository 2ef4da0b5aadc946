//! Neighborhood entropy
//! For every point, the Shannon entropy (bits) of the cluster labels of its
//! nearest neighbors inside the evaluated subset; the score is the weighted
//! mean over all points. Pure neighborhoods score 0, lower is better.

use std::collections::HashMap;

use rayon::prelude::*;

use kmeans::{
    document::Document,
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator},
    types::DistanceMetric,
};

use crate::neighbors::NeighborCache;

#[derive(Clone, Debug)]
pub struct NeighborhoodEntropy {
    metric: DistanceMetric,
    depth: usize,
    cache: Option<NeighborCache>,
}

impl NeighborhoodEntropy {
    pub fn new(metric: DistanceMetric, depth: usize) -> Self {
        Self { metric, depth, cache: None }
    }

    /// Compute the neighbor lists every later evaluation reads
    pub fn set_master_point_set(&mut self, points: &[Document]) -> Result<()> {
        self.cache = Some(NeighborCache::build(points, self.metric)?);
        Ok(())
    }
}

/// Entropy in bits of the label histogram of `labels`
pub fn label_entropy(labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    labels.iter().for_each(|l| *counts.entry(*l).or_insert(0) += 1);
    let total = labels.len() as f64;
    -counts.values()
        .map(|c| {
            let p = *c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

impl Evaluator for NeighborhoodEntropy {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        let cache = self.cache.as_ref().ok_or(ClusterError::NotConfigured("master point set"))?;
        let local = cache.local_index(state)?;
        let (sum, total) = (0..state.points.len()).into_par_iter()
            .map(|i| {
                let mut labels = cache.neighbor_clusters(state, &local, i, self.depth)?;
                labels.push(state.assignment[i]);
                let w = state.weight(i);
                Ok((w * label_entropy(&labels), w))
            })
            .collect::<Result<Vec<(f64, f64)>>>()?
            .into_iter()
            .fold((0.0, 0.0), |(s, t), (e, w)| (s + e, t + w));
        Ok(if total > 0.0 { sum / total } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(values: &[f64]) -> Vec<Document> {
        values.iter().map(|v| Document::from_dense(&[*v])).collect()
    }

    #[test]
    fn pure_neighborhoods_score_zero() {
        let points = line(&[0.0, 1.0, 2.0, 20.0, 21.0, 22.0]);
        let centers = line(&[1.0, 21.0]);
        let mut entropy = NeighborhoodEntropy::new(DistanceMetric::L2, 2);
        let good = [0, 0, 0, 1, 1, 1];
        assert!(matches!(
            entropy.evaluate(&ClusteringState::new(&points, &centers, &good)),
            Err(ClusterError::NotConfigured(_))
        ));
        entropy.set_master_point_set(&points).unwrap();
        assert_eq!(entropy.evaluate(&ClusteringState::new(&points, &centers, &good)).unwrap(), 0.0);

        let mixed = [0, 1, 0, 1, 0, 1];
        let score = entropy.evaluate(&ClusteringState::new(&points, &centers, &mixed)).unwrap();
        assert!(score > 0.5);
    }

    #[test]
    fn entropy_of_histograms() {
        assert_eq!(label_entropy(&[]), 0.0);
        assert_eq!(label_entropy(&[3, 3, 3]), 0.0);
        assert!((label_entropy(&[0, 1]) - 1.0).abs() < 1e-12);
        assert!((label_entropy(&[0, 1, 2, 3]) - 2.0).abs() < 1e-12);
    }
}
