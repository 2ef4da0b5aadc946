//! Cluster cohesion
//! Distances from every point to its cluster center, summarised per cluster
//! and over the whole clustering.

use rayon::prelude::*;

use kmeans::{
    error::Result,
    evaluator::{ClusteringState, Evaluator},
    types::DistanceMetric,
};

/// Cohesion of one cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterScore {
    pub cluster: usize,
    pub size: usize,
    /// Weighted mean point-to-center distance, 0 for an empty cluster
    pub mean_distance: f64,
    /// Standard deviation of the point-to-center distances
    pub sigma: f64,
    /// `(point, distance)` for every member
    pub point_scores: Vec<(usize, f64)>,
}

/// Per-cluster distance statistics of `state`, weighted when `state` carries weights
///
/// # Performance
/// Distances are computed in parallel over all points.
pub fn cluster_scores(state: &ClusteringState<'_>, metric: DistanceMetric) -> Result<Vec<ClusterScore>> {
    state.validate()?;
    let distances: Vec<f64> = state.points.par_iter()
        .zip(state.assignment.par_iter())
        .map(|(point, cluster)| metric.distance(point, &state.centers[*cluster]))
        .collect::<Result<_>>()?;

    let mut scores: Vec<ClusterScore> = (0..state.k())
        .map(|cluster| ClusterScore { cluster, size: 0, mean_distance: 0.0, sigma: 0.0, point_scores: Vec::new() })
        .collect();
    for (i, (cluster, d)) in state.assignment.iter().zip(&distances).enumerate() {
        scores[*cluster].point_scores.push((i, *d));
    }
    for score in scores.iter_mut().filter(|s| !s.point_scores.is_empty()) {
        score.size = score.point_scores.len();
        let total: f64 = score.point_scores.iter().map(|(i, _)| state.weight(*i)).sum();
        if total <= 0.0 {
            continue;
        }
        score.mean_distance = score.point_scores.iter().map(|(i, d)| state.weight(*i) * d).sum::<f64>() / total;
        let variance = score.point_scores.iter()
            .map(|(i, d)| state.weight(*i) * (d - score.mean_distance).powi(2))
            .sum::<f64>() / total;
        score.sigma = variance.sqrt();
    }
    Ok(scores)
}

/// Weighted mean point-to-center distance, lower is better
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanCohesion {
    pub metric: DistanceMetric,
}

impl Evaluator for MeanCohesion {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        state.validate()?;
        let (sum, total) = state.points.par_iter()
            .zip(state.assignment.par_iter())
            .enumerate()
            .map(|(i, (point, cluster))| {
                let w = state.weight(i);
                Ok((w * self.metric.distance(point, &state.centers[*cluster])?, w))
            })
            .collect::<Result<Vec<(f64, f64)>>>()?
            .into_iter()
            .fold((0.0, 0.0), |(s, t), (d, w)| (s + d, t + w));
        Ok(if total > 0.0 { sum / total } else { 0.0 })
    }
}
