//! Update phase: recompute each cluster's center from its current members
//! Supports the weighted mean (K-Means), the coordinate-wise median (K-Median)
//! and the medoid (P-Median alternate).

use rayon::prelude::*;

use crate::{config::CenterUpdate, document::Document, error::Result, types::DistanceMetric};

/// Inputs shared by every center update rule
pub struct UpdateInput<'a> {
    pub points: &'a [Document],
    pub assignment: &'a [usize],
    pub previous: &'a [Document],
    pub weights: Option<&'a [f64]>,
    pub metric: DistanceMetric,
    pub project_on_empty: bool,
}

/// Recalculate all `previous.len()` centers
///
/// An empty cluster keeps its previous center, or becomes the zero vector when
/// `project_on_empty` is set.
pub fn recalculate(rule: CenterUpdate, input: &UpdateInput<'_>) -> Result<Vec<Document>> {
    match rule {
        CenterUpdate::Mean => mean_recalculate(input),
        CenterUpdate::Median | CenterUpdate::Medoid => {
            let members = members_by_cluster(input.assignment, input.previous.len());
            members.par_iter()
                .enumerate()
                .map(|(cluster, idx)| {
                    if idx.is_empty() {
                        return Ok(empty_center(input, cluster));
                    }
                    match rule {
                        CenterUpdate::Median => median_center(input, idx),
                        _ => medoid_center(input, idx)
                    }
                })
                .collect()
        }
    }
}

/// Point indices grouped by cluster id
pub fn members_by_cluster(assignment: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); k];
    assignment.iter().enumerate().for_each(|(i, c)| members[*c].push(i));
    members
}

fn empty_center(input: &UpdateInput<'_>, cluster: usize) -> Document {
    if input.project_on_empty {
        Document::new(input.previous[cluster].dimension())
    } else {
        input.previous[cluster].clone()
    }
}

fn mean_recalculate(input: &UpdateInput<'_>) -> Result<Vec<Document>> {
    let k = input.previous.len();
    let (sums, totals) = Document::accumulate_clusters(input.points, input.assignment, k, input.weights)?;
    let mut counts = vec![0usize; k];
    input.assignment.iter().for_each(|c| counts[*c] += 1);

    sums.into_iter().zip(totals).enumerate()
        .map(|(cluster, (mut sum, total))| {
            // zero total weight keeps the old center even with members present
            if counts[cluster] == 0 || total == 0.0 {
                return Ok(empty_center(input, cluster));
            }
            sum.scale(total)?;
            Ok(sum)
        })
        .collect()
}

fn median_center(input: &UpdateInput<'_>, members: &[usize]) -> Result<Document> {
    let points: Vec<&Document> = members.iter().map(|i| &input.points[*i]).collect();
    let weights: Option<Vec<f64>> = input.weights.map(|w| members.iter().map(|i| w[*i]).collect());
    Document::coordinate_median(&points, weights.as_deref())
}

fn medoid_center(input: &UpdateInput<'_>, members: &[usize]) -> Result<Document> {
    let mut best = (members[0], f64::INFINITY);
    for candidate in members {
        let mut cost = 0.0;
        for other in members {
            let weight = input.weights.map(|w| w[*other]).unwrap_or(1.0);
            cost += weight * input.metric.distance(&input.points[*candidate], &input.points[*other])?;
            if cost >= best.1 {
                break;
            }
        }
        if cost < best.1 {
            best = (*candidate, cost);
        }
    }
    Ok(input.points[best.0].clone())
}
