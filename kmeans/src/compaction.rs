//! Post-loop compaction
//! Points lying farther than `threshold × mean radius` from their center are
//! stripped, centers are recomputed from the remaining members and the stripped
//! points are handed to their nearest surviving center. One pass, no iteration.

use rayon::prelude::*;

use crate::{
    assignment::count_members,
    centers::{UpdateInput, members_by_cluster, recalculate},
    config::CenterUpdate,
    document::Document,
    error::{ClusterError, Result},
    types::DistanceMetric,
};

/// Inputs of one compaction pass
pub struct Compaction<'a> {
    pub points: &'a [Document],
    pub centers: &'a [Document],
    pub assignment: &'a [usize],
    pub weights: Option<&'a [f64]>,
    pub metric: DistanceMetric,
    pub center_update: CenterUpdate,
    pub threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompactionOutcome {
    pub centers: Vec<Document>,
    pub assignment: Vec<usize>,
    /// Points that were stripped and reassigned
    pub stripped: Vec<usize>,
}

impl Compaction<'_> {
    pub fn run(&self) -> Result<CompactionOutcome> {
        if !(self.threshold > 0.0) {
            return Err(ClusterError::InvalidArgument(format!(
                "compaction threshold must be > 0, got {}", self.threshold
            )));
        }
        let k = self.centers.len();
        let distances: Vec<f64> = self.points.par_iter()
            .zip(self.assignment.par_iter())
            .map(|(point, cluster)| self.metric.distance(point, &self.centers[*cluster]))
            .collect::<Result<Vec<f64>>>()?;

        let members = members_by_cluster(self.assignment, k);
        let radius: Vec<f64> = members.iter()
            .map(|idx| {
                if idx.is_empty() {
                    0.0
                } else {
                    idx.iter().map(|i| distances[*i]).sum::<f64>() / idx.len() as f64
                }
            })
            .collect();

        let mut strip: Vec<bool> = (0..self.points.len())
            .map(|i| distances[i] > self.threshold * radius[self.assignment[i]])
            .collect();
        // a cluster always keeps its closest member
        for idx in &members {
            if !idx.is_empty() && idx.iter().all(|i| strip[*i]) {
                let closest = idx.iter()
                    .copied()
                    .fold(idx[0], |best, i| if distances[i] < distances[best] { i } else { best });
                strip[closest] = false;
            }
        }
        let stripped: Vec<usize> = (0..self.points.len()).filter(|i| strip[*i]).collect();
        if stripped.is_empty() {
            return Ok(CompactionOutcome {
                centers: self.centers.to_vec(),
                assignment: self.assignment.to_vec(),
                stripped,
            });
        }

        // centers of the kept members only
        let kept: Vec<usize> = (0..self.points.len()).filter(|i| !strip[*i]).collect();
        let kept_points: Vec<Document> = kept.iter().map(|i| self.points[*i].clone()).collect();
        let kept_assignment: Vec<usize> = kept.iter().map(|i| self.assignment[*i]).collect();
        let kept_weights: Option<Vec<f64>> = self.weights.map(|w| kept.iter().map(|i| w[*i]).collect());
        let centers = recalculate(self.center_update, &UpdateInput {
            points: &kept_points,
            assignment: &kept_assignment,
            previous: self.centers,
            weights: kept_weights.as_deref(),
            metric: self.metric,
            project_on_empty: false,
        })?;

        let surviving = count_members(&kept_assignment, k);
        let mut assignment = self.assignment.to_vec();
        for i in &stripped {
            let mut best: Option<(usize, f64)> = None;
            for (cluster, center) in centers.iter().enumerate() {
                if surviving[cluster] == 0 {
                    continue;
                }
                let d = self.metric.distance(&self.points[*i], center)?;
                if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((cluster, d));
                }
            }
            // no surviving cluster at all: leave the point where it was
            if let Some((cluster, _)) = best {
                assignment[*i] = cluster;
            }
        }
        tracing::warn!(stripped = stripped.len(), threshold = self.threshold, "compaction reassigned distant points");
        Ok(CompactionOutcome { centers, assignment, stripped })
    }
}
