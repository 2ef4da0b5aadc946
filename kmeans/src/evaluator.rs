//! Clustering evaluators
//! An evaluator scores a clustering; the engine uses it to track the incumbent
//! and the no-improvement termination criteria use it to detect convergence.

use std::fmt::Debug;

use rayon::prelude::*;

use crate::{document::Document, error::{ClusterError, Result}, types::DistanceMetric};

/// Read-only view of a clustering handed to evaluators and termination criteria
#[derive(Clone, Copy, Debug)]
pub struct ClusteringState<'a> {
    pub points: &'a [Document],
    pub centers: &'a [Document],
    pub assignment: &'a [usize],
    pub weights: Option<&'a [f64]>,
    /// Index of each point in a master point set, identity when `None`
    pub point_ids: Option<&'a [usize]>,
}

impl<'a> ClusteringState<'a> {
    pub fn new(points: &'a [Document], centers: &'a [Document], assignment: &'a [usize]) -> Self {
        Self { points, centers, assignment, weights: None, point_ids: None }
    }

    pub fn with_weights(mut self, weights: Option<&'a [f64]>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_point_ids(mut self, point_ids: &'a [usize]) -> Self {
        self.point_ids = Some(point_ids);
        self
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.centers.len()
    }

    pub fn weight(&self, point: usize) -> f64 {
        self.weights.map(|w| w[point]).unwrap_or(1.0)
    }

    /// Master-set index of local point `point`
    pub fn master_id(&self, point: usize) -> usize {
        self.point_ids.map(|ids| ids[point]).unwrap_or(point)
    }

    /// Check lengths and cluster ids before scoring
    pub fn validate(&self) -> Result<()> {
        if self.assignment.len() != self.points.len() {
            return Err(ClusterError::InvalidArgument(format!(
                "assignment of length {} for {} points", self.assignment.len(), self.points.len()
            )));
        }
        if let Some(w) = self.weights {
            if w.len() != self.points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} weights for {} points", w.len(), self.points.len()
                )));
            }
        }
        if let Some(ids) = self.point_ids {
            if ids.len() != self.points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} point ids for {} points", ids.len(), self.points.len()
                )));
            }
        }
        if let Some(bad) = self.assignment.iter().find(|c| **c >= self.k()) {
            return Err(ClusterError::InvalidArgument(format!(
                "cluster id {bad} outside [0, {})", self.k()
            )));
        }
        Ok(())
    }

    /// Number of points per cluster id
    pub fn cardinalities(&self) -> Vec<usize> {
        let mut counts = vec![0; self.k()];
        self.assignment.iter().for_each(|c| counts[*c] += 1);
        counts
    }
}

/// Scoring function over a clustering
///
/// Lower is better unless an implementation overrides [`Evaluator::best_of`]
/// and [`Evaluator::worst_value`].
pub trait Evaluator: Debug + Send + Sync {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64>;

    /// Better of two scores
    fn best_of(&self, a: f64, b: f64) -> f64 {
        a.min(b)
    }

    /// Score every real clustering beats
    fn worst_value(&self) -> f64 {
        f64::INFINITY
    }

    /// `candidate` strictly beats `incumbent`
    fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        candidate != incumbent && self.best_of(candidate, incumbent) == candidate
    }
}

/// Sum of (weighted) distances from every point to its assigned center
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectiveSum {
    pub metric: DistanceMetric,
}

impl ObjectiveSum {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    /// The K-Means objective
    pub fn squared_l2() -> Self {
        Self { metric: DistanceMetric::L2Squared }
    }
}

impl Evaluator for ObjectiveSum {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        state.validate()?;
        state.points.par_iter()
            .zip(state.assignment.par_iter())
            .enumerate()
            .map(|(i, (point, cluster))| {
                Ok(state.weight(i) * self.metric.distance(point, &state.centers[*cluster])?)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Document> {
        [[0.0, 0.0], [0.0, 2.0], [10.0, 0.0]].iter()
            .map(|p| Document::from_dense(p))
            .collect()
    }

    #[test]
    fn objective_sum_per_metric() {
        let points = points();
        let centers = vec![Document::from_dense(&[0.0, 1.0]), Document::from_dense(&[10.0, 0.0])];
        let assignment = vec![0, 0, 1];
        let state = ClusteringState::new(&points, &centers, &assignment);
        assert_eq!(ObjectiveSum::squared_l2().evaluate(&state).unwrap(), 2.0);
        assert_eq!(ObjectiveSum::new(DistanceMetric::L1).evaluate(&state).unwrap(), 2.0);

        let weights = vec![2.0, 1.0, 5.0];
        let state = state.with_weights(Some(&weights));
        assert_eq!(ObjectiveSum::squared_l2().evaluate(&state).unwrap(), 3.0);
    }

    #[test]
    fn validate_catches_bad_ids() {
        let points = points();
        let centers = vec![Document::new(2)];
        let assignment = vec![0, 1, 0];
        let state = ClusteringState::new(&points, &centers, &assignment);
        assert!(matches!(ObjectiveSum::squared_l2().evaluate(&state), Err(ClusterError::InvalidArgument(_))));
        let short = vec![0];
        assert!(ClusteringState::new(&points, &centers, &short).validate().is_err());
    }

    #[test]
    fn lower_is_better_by_default() {
        let e = ObjectiveSum::squared_l2();
        assert!(e.is_better(1.0, 2.0));
        assert!(!e.is_better(2.0, 2.0));
        assert!(e.is_better(5.0, e.worst_value()));
    }
}
