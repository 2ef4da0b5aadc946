//! Neighbor lists over the master point set
//! Built once per master set and shared by every evaluation of a subset.

use std::collections::HashMap;

use rayon::prelude::*;

use kmeans::{
    document::Document,
    error::{ClusterError, Result},
    evaluator::ClusteringState,
    types::DistanceMetric,
};

/// For every master point, all other points sorted by increasing distance
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborCache {
    sorted: Vec<Vec<usize>>,
}

impl NeighborCache {
    /// Ties are broken by point index
    pub fn build(points: &[Document], metric: DistanceMetric) -> Result<Self> {
        let sorted = points.par_iter()
            .enumerate()
            .map(|(i, p)| {
                let mut row = points.iter().enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, q)| Ok((j, metric.distance(p, q)?)))
                    .collect::<Result<Vec<(usize, f64)>>>()?;
                row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                Ok(row.into_iter().map(|(j, _)| j).collect())
            })
            .collect::<Result<Vec<Vec<usize>>>>()?;
        tracing::debug!(points = points.len(), "neighbor lists built");
        Ok(Self { sorted })
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Cluster ids of the `depth` nearest neighbors of local point `point`
    /// that belong to the evaluated subset
    pub fn neighbor_clusters(
        &self,
        state: &ClusteringState<'_>,
        local: &HashMap<usize, usize>,
        point: usize,
        depth: usize,
    ) -> Result<Vec<usize>> {
        let master = state.master_id(point);
        let row = self.sorted.get(master)
            .ok_or(ClusterError::OutOfRange { index: master, dimension: self.sorted.len() })?;
        Ok(row.iter()
            .filter_map(|m| local.get(m))
            .take(depth)
            .map(|i| state.assignment[*i])
            .collect())
    }

    /// Master id → local index for the points of `state`
    pub fn local_index(&self, state: &ClusteringState<'_>) -> Result<HashMap<usize, usize>> {
        state.validate()?;
        (0..state.points.len())
            .map(|i| {
                let master = state.master_id(i);
                if master >= self.sorted.len() {
                    return Err(ClusterError::OutOfRange { index: master, dimension: self.sorted.len() });
                }
                Ok((master, i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_skips_absent_neighbors() {
        let points: Vec<Document> = [0.0, 1.0, 3.0, 7.0].iter().map(|v| Document::from_dense(&[*v])).collect();
        let cache = NeighborCache::build(&points, DistanceMetric::L1).unwrap();
        assert_eq!(cache.sorted[0], vec![1, 2, 3]);
        assert_eq!(cache.sorted[2], vec![1, 0, 3]);

        // evaluate only master points 0, 2, 3
        let subset = vec![points[0].clone(), points[2].clone(), points[3].clone()];
        let centers = vec![Document::new(1); 2];
        let assignment = [0, 0, 1];
        let ids = [0, 2, 3];
        let state = ClusteringState::new(&subset, &centers, &assignment).with_point_ids(&ids);
        let local = cache.local_index(&state).unwrap();
        assert_eq!(cache.neighbor_clusters(&state, &local, 0, 1).unwrap(), vec![0]);
        assert_eq!(cache.neighbor_clusters(&state, &local, 0, 5).unwrap(), vec![0, 1]);
    }
}
