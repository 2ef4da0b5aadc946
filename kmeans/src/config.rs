//! Clusterer configuration
//! One typed record with optional knobs and documented defaults. It can be read
//! from JSON; the evaluator is a runtime-only object and is set in code.

use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ClusterError, Result},
    evaluator::{Evaluator, ObjectiveSum},
    termination::Termination,
    types::DistanceMetric,
};

/// How the update phase turns cluster members into a center
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CenterUpdate {
    /// Weighted mean (K-Means)
    #[default]
    Mean,
    /// Coordinate-wise weighted median (K-Median)
    Median,
    /// Member minimising the summed distance to the others (P-Median alternate)
    Medoid,
}

/// Options recognised by [`crate::clusterer::KMeansClusterer`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClustererConfig {
    /// Required
    pub metric: Option<DistanceMetric>,
    /// Required
    pub termination: Option<Termination>,
    /// Incumbent scorer, defaults to the objective sum under `metric`
    #[serde(skip)]
    pub evaluator: Option<Arc<dyn Evaluator>>,
    /// Worker threads of the assignment phase, at least 1
    #[serde(default = "default_threads")]
    pub num_threads: usize,
    /// Let clusters lose their last member; an emptied cluster's center becomes the zero vector
    #[serde(default)]
    pub project_on_empty: bool,
    /// Cluster ids allowed to gain or lose points, all clusters when `None`
    #[serde(default)]
    pub movable: Option<BTreeSet<usize>>,
    /// Post-loop compaction threshold (multiple of the mean cluster radius)
    #[serde(default)]
    pub try_compacting: Option<f64>,
    /// Per-point weights for centroid computation
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    #[serde(default)]
    pub center_update: CenterUpdate,
    /// Seed for randomised center seeding
    #[serde(default)]
    pub seed: u64,
}

fn default_threads() -> usize {
    1
}

impl Default for ClustererConfig {
    fn default() -> Self {
        Self {
            metric: None,
            termination: None,
            evaluator: None,
            num_threads: default_threads(),
            project_on_empty: false,
            movable: None,
            try_compacting: None,
            weights: None,
            center_update: CenterUpdate::Mean,
            seed: 0,
        }
    }
}

impl ClustererConfig {
    pub fn new(metric: DistanceMetric, termination: Termination) -> Self {
        Self { metric: Some(metric), termination: Some(termination), ..Default::default() }
    }

    /// K-Means under squared Euclidean distance
    pub fn kmeans_sqr(termination: Termination) -> Self {
        Self::new(DistanceMetric::L2Squared, termination)
    }

    /// K-Median: L1 distance with coordinate-wise median centers
    pub fn kmedian(termination: Termination) -> Self {
        Self::new(DistanceMetric::L1, termination).with_center_update(CenterUpdate::Median)
    }

    /// P-Median alternate: centers restricted to members
    pub fn pmedian_alternate(metric: DistanceMetric, termination: Termination) -> Self {
        Self::new(metric, termination).with_center_update(CenterUpdate::Medoid)
    }

    /// General-metric multi-threaded K-Means
    pub fn gmeans(metric: DistanceMetric, termination: Termination, num_threads: usize) -> Self {
        Self::new(metric, termination).with_threads(num_threads)
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_project_on_empty(mut self, project_on_empty: bool) -> Self {
        self.project_on_empty = project_on_empty;
        self
    }

    pub fn with_movable<I: IntoIterator<Item = usize>>(mut self, movable: I) -> Self {
        self.movable = Some(movable.into_iter().collect());
        self
    }

    pub fn with_compaction(mut self, threshold: f64) -> Self {
        self.try_compacting = Some(threshold);
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_center_update(mut self, center_update: CenterUpdate) -> Self {
        self.center_update = center_update;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn metric(&self) -> Result<DistanceMetric> {
        self.metric.ok_or(ClusterError::NotConfigured("metric"))
    }

    /// Configured evaluator or the objective sum under the configured metric
    pub fn evaluator(&self) -> Result<Arc<dyn Evaluator>> {
        match &self.evaluator {
            Some(evaluator) => Ok(evaluator.clone()),
            None => Ok(Arc::new(ObjectiveSum::new(self.metric()?)))
        }
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        self.metric()?;
        if self.termination.is_none() {
            return Err(ClusterError::NotConfigured("terminationCriteria"));
        }
        if self.num_threads == 0 {
            return Err(ClusterError::InvalidArgument("numThreads must be >= 1".to_string()));
        }
        if let Some(threshold) = self.try_compacting {
            if !(threshold > 0.0) {
                return Err(ClusterError::InvalidArgument(format!("tryCompacting must be > 0, got {threshold}")));
            }
        }
        if let Some(weights) = &self.weights {
            if weights.iter().any(|w| !(*w >= 0.0)) {
                return Err(ClusterError::InvalidArgument("weights must be non-negative".to_string()));
            }
        }
        Ok(())
    }

    /// Whether points may move into or out of `cluster`
    pub fn is_movable(&self, cluster: usize) -> bool {
        self.movable.as_ref().map(|m| m.contains(&cluster)).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_keys() {
        let config = ClustererConfig::default();
        assert!(matches!(config.validate(), Err(ClusterError::NotConfigured("metric"))));
        let config = config.with_metric(DistanceMetric::L2);
        assert!(matches!(config.validate(), Err(ClusterError::NotConfigured("terminationCriteria"))));
        assert!(config.with_termination(Termination::fixed_iterations(1)).validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let base = ClustererConfig::kmeans_sqr(Termination::fixed_iterations(5));
        assert!(base.clone().with_threads(0).validate().is_err());
        assert!(base.clone().with_compaction(-1.0).validate().is_err());
        assert!(base.with_weights(vec![1.0, -2.0]).validate().is_err());
    }

    #[test]
    fn presets() {
        let c = ClustererConfig::kmedian(Termination::fixed_iterations(5));
        assert_eq!(c.metric, Some(DistanceMetric::L1));
        assert_eq!(c.center_update, CenterUpdate::Median);
        let c = ClustererConfig::gmeans(DistanceMetric::L2, Termination::no_improvement_sqr(), 4);
        assert_eq!(c.num_threads, 4);
        assert!(c.is_movable(17));
        let c = c.with_movable([1, 2]);
        assert!(c.is_movable(1) && !c.is_movable(0));
    }

    #[test]
    fn reads_json_with_defaults() {
        let c: ClustererConfig = serde_json::from_str(r#"{
            "metric": "L2Squared",
            "termination": {"FixedIterations": {"budget": 20}},
            "try_compacting": 2.0
        }"#).unwrap();
        assert_eq!(c.num_threads, 1);
        assert!(!c.project_on_empty);
        assert_eq!(c.try_compacting, Some(2.0));
        assert!(c.validate().is_ok());
    }
}
