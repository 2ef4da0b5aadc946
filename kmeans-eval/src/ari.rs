//! Adjusted Rand Index against ground truth
//! 1 for a perfect match, around 0 for a random labelling. Unlike the
//! objective-style evaluators, higher is better.

use kmeans::{
    error::Result,
    evaluator::{ClusteringState, Evaluator},
};

use crate::ground_truth::GroundTruth;

#[derive(Clone, Debug)]
pub struct AdjustedRandIndex {
    truth: GroundTruth,
}

fn pairs(n: usize) -> f64 {
    let n = n as f64;
    n * (n - 1.0) / 2.0
}

impl AdjustedRandIndex {
    pub fn new(truth: GroundTruth) -> Self {
        Self { truth }
    }
}

impl Evaluator for AdjustedRandIndex {
    fn evaluate(&self, state: &ClusteringState<'_>) -> Result<f64> {
        let table = self.truth.contingency(state)?;
        let index: f64 = table.iter().flatten().map(|n| pairs(*n)).sum();
        let rows: f64 = table.iter().map(|row| pairs(row.iter().sum())).sum();
        let columns: f64 = (0..self.truth.class_count())
            .map(|c| pairs(table.iter().map(|row| row[c]).sum()))
            .sum();
        let total = pairs(state.assignment.len());
        if total == 0.0 {
            return Ok(1.0);
        }
        let expected = rows * columns / total;
        let max = (rows + columns) / 2.0;
        // both partitions trivial: they agree
        if max == expected {
            return Ok(1.0);
        }
        Ok((index - expected) / (max - expected))
    }

    fn best_of(&self, a: f64, b: f64) -> f64 {
        a.max(b)
    }

    fn worst_value(&self) -> f64 {
        f64::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use kmeans::document::Document;

    use super::*;

    fn score(truth: &[usize], assignment: &[usize], k: usize) -> f64 {
        let points = vec![Document::new(1); assignment.len()];
        let centers = vec![Document::new(1); k];
        AdjustedRandIndex::new(GroundTruth::new(truth).unwrap())
            .evaluate(&ClusteringState::new(&points, &centers, assignment))
            .unwrap()
    }

    #[test]
    fn relabelled_match_is_perfect() {
        assert!((score(&[0, 0, 0, 1, 1, 1], &[1, 1, 1, 0, 0, 0], 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn partial_agreement() {
        let ari = score(&[0, 0, 0, 1, 1, 1], &[0, 0, 1, 1, 2, 2], 3);
        assert!((ari - 8.0 / 33.0).abs() < 1e-12);
    }

    #[test]
    fn higher_is_better() {
        let ari = AdjustedRandIndex::new(GroundTruth::new(&[0]).unwrap());
        assert!(ari.is_better(0.9, 0.2));
        assert!(!ari.is_better(0.2, 0.9));
        assert!(ari.is_better(-0.5, ari.worst_value()));
    }
}
