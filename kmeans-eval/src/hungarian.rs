//! Hungarian mismatch against ground truth
//! Clusters are matched one-to-one with classes so that the number of points
//! landing on their matched class is maximal (Kuhn–Munkres on the contingency
//! table); the score is the number of remaining points. Lower is better.

use kmeans::{
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator},
};

use crate::ground_truth::GroundTruth;

#[derive(Clone, Debug)]
pub struct HungarianMismatch {
    truth: GroundTruth,
}

impl HungarianMismatch {
    pub fn new(truth: GroundTruth) -> Self {
        Self { truth }
    }
}

impl Evaluator for HungarianMismatch {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        if state.k() != self.truth.class_count() {
            return Err(ClusterError::InvalidArgument(format!(
                "{} clusters cannot be matched against {} ground-truth classes",
                state.k(), self.truth.class_count()
            )));
        }
        let table = self.truth.contingency(state)?;
        let largest = table.iter().flatten().copied().max().unwrap_or(0);
        let cost: Vec<Vec<f64>> = table.iter()
            .map(|row| row.iter().map(|n| (largest - n) as f64).collect())
            .collect();
        let matched: usize = min_cost_assignment(&cost)?
            .iter()
            .enumerate()
            .map(|(cluster, class)| table[cluster][*class])
            .sum();
        Ok((state.assignment.len() - matched) as f64)
    }
}

/// Column assigned to every row of the square `cost` matrix at minimum total cost
pub fn min_cost_assignment(cost: &[Vec<f64>]) -> Result<Vec<usize>> {
    let n = cost.len();
    if cost.iter().any(|row| row.len() != n) {
        return Err(ClusterError::InvalidArgument("cost matrix must be square".to_string()));
    }
    if cost.iter().flatten().any(|c| !c.is_finite()) {
        return Err(ClusterError::InvalidArgument("cost matrix must be finite".to_string()));
    }
    // potentials and matching are 1-based, index 0 is the virtual start column
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];
    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let slack = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }
    let mut assignment = vec![0; n];
    for j in 1..=n {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use kmeans::document::Document;

    use super::*;

    fn mismatch(truth: &[usize], assignment: &[usize], k: usize) -> Result<f64> {
        let points = vec![Document::new(1); assignment.len()];
        let centers = vec![Document::new(1); k];
        HungarianMismatch::new(GroundTruth::new(truth)?)
            .evaluate(&ClusteringState::new(&points, &centers, assignment))
    }

    #[test]
    fn counts_unmatched_points() {
        assert_eq!(mismatch(&[0, 0, 1, 1, 2, 2], &[1, 1, 2, 0, 0, 0], 3).unwrap(), 1.0);
        assert_eq!(mismatch(&[5, 5, 9, 9], &[1, 1, 0, 0], 2).unwrap(), 0.0);
    }

    #[test]
    fn cluster_count_must_match_classes() {
        assert!(matches!(mismatch(&[0, 0, 1, 1], &[0, 1, 2, 2], 3), Err(ClusterError::InvalidArgument(_))));
    }

    #[test]
    fn solves_small_assignment() {
        let cost = vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ];
        let assignment = min_cost_assignment(&cost).unwrap();
        let total: f64 = assignment.iter().enumerate().map(|(r, c)| cost[r][*c]).sum();
        assert_eq!(total, 5.0);
        assert!(min_cost_assignment(&[vec![1.0, 2.0]]).is_err());
        assert!(min_cost_assignment(&[]).unwrap().is_empty());
    }
}
