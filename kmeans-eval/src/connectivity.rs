//! KNN connectivity
//! Each point pays `1 / j` when its `j`-th nearest neighbor (within the
//! evaluated subset) sits in a different cluster. Lower is better, 0 means no
//! neighbor relation is cut by the clustering.

use rayon::prelude::*;

use kmeans::{
    document::Document,
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator},
    types::DistanceMetric,
};

use crate::neighbors::NeighborCache;

#[derive(Clone, Debug)]
pub struct KnnConnectivity {
    metric: DistanceMetric,
    depth: usize,
    cache: Option<NeighborCache>,
}

impl KnnConnectivity {
    pub fn new(metric: DistanceMetric, depth: usize) -> Self {
        Self { metric, depth, cache: None }
    }

    pub fn set_master_point_set(&mut self, points: &[Document]) -> Result<()> {
        self.cache = Some(NeighborCache::build(points, self.metric)?);
        Ok(())
    }
}

impl Evaluator for KnnConnectivity {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        let cache = self.cache.as_ref().ok_or(ClusterError::NotConfigured("master point set"))?;
        let local = cache.local_index(state)?;
        (0..state.points.len()).into_par_iter()
            .map(|i| {
                let own = state.assignment[i];
                let penalty: f64 = cache.neighbor_clusters(state, &local, i, self.depth)?
                    .iter()
                    .enumerate()
                    .filter(|(_, cluster)| **cluster != own)
                    .map(|(j, _)| 1.0 / (j + 1) as f64)
                    .sum();
                Ok(state.weight(i) * penalty)
            })
            .sum()
    }
}
