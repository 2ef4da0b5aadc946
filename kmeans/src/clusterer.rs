//! Multi-threaded K-Means / K-Median / P-Median alternate engine
//!
//! The engine owns the working set of points, the current centers and the
//! assignment. [`KMeansClusterer::run`] iterates assign → recompute until the
//! configured termination criterion fires, tracks the best clustering seen
//! under the configured evaluator and returns it.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::{
    assignment::{AssignmentPhase, WorkerPool, bootstrap_assignment, count_members, repair_empty_clusters},
    centers::{UpdateInput, recalculate},
    collaborators::{GraphPartitioner, PartitionOptions, WeightedGraph},
    compaction::Compaction,
    config::{CenterUpdate, ClustererConfig},
    document::Document,
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator},
    init_plusplus::{plus_plus_centers, random_centers},
    types::DistanceMetric,
};

/// Centers and assignment of one iteration
#[derive(Clone, Debug, PartialEq)]
pub struct Iterate {
    pub centers: Vec<Document>,
    pub assignment: Vec<usize>,
}

/// What a finished run did
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Iterations executed, the initial state not included
    pub iterations: usize,
    /// Evaluator score of the returned clustering
    pub objective: f64,
    /// Iteration that produced the incumbent, 0 for the initial state
    pub incumbent_iteration: usize,
    /// Points reassigned by compaction
    pub compacted: usize,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct KMeansClusterer {
    config: ClustererConfig,
    points: Vec<Document>,
    centers: Vec<Document>,
    assignment: Option<Vec<usize>>,
    objective: Option<f64>,
    last_iterate: Option<Iterate>,
}

struct Incumbent {
    score: f64,
    iteration: usize,
    centers: Vec<Document>,
    assignment: Vec<usize>,
}

impl KMeansClusterer {
    pub fn new(config: ClustererConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Append points to the working set. Any previous assignment is dropped.
    pub fn add_points<I: IntoIterator<Item = Document>>(&mut self, points: I) {
        self.points.extend(points);
        self.assignment = None;
    }

    pub fn points(&self) -> &[Document] {
        &self.points
    }

    pub fn set_initial_centers(&mut self, centers: Vec<Document>) -> Result<()> {
        if centers.is_empty() {
            return Err(ClusterError::InvalidArgument("initial centers must not be empty".to_string()));
        }
        self.centers = centers;
        Ok(())
    }

    /// Install a starting assignment (copied)
    pub fn set_assignment(&mut self, assignment: &[usize]) -> Result<()> {
        if assignment.len() != self.points.len() {
            return Err(ClusterError::InvalidArgument(format!(
                "assignment of length {} for {} points", assignment.len(), self.points.len()
            )));
        }
        if !self.centers.is_empty() {
            if let Some(bad) = assignment.iter().find(|c| **c >= self.centers.len()) {
                return Err(ClusterError::InvalidArgument(format!(
                    "cluster id {bad} outside [0, {})", self.centers.len()
                )));
            }
        }
        self.assignment = Some(assignment.to_vec());
        Ok(())
    }

    pub fn assignment(&self) -> Option<&[usize]> {
        self.assignment.as_deref()
    }

    /// Replace the whole configuration
    pub fn configure(&mut self, config: ClustererConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ClustererConfig {
        &self.config
    }

    pub fn centers(&self) -> &[Document] {
        &self.centers
    }

    /// Members per cluster of the current assignment
    pub fn cardinalities(&self) -> Vec<usize> {
        self.assignment.as_deref()
            .map(|a| count_members(a, self.centers.len()))
            .unwrap_or_default()
    }

    /// Evaluator score of the last successful run
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Final iterate of the last run, which may differ from the returned incumbent
    pub fn last_iterate(&self) -> Option<&Iterate> {
        self.last_iterate.as_ref()
    }

    /// Drop points, centers and assignment; the configuration stays
    pub fn reset(&mut self) {
        self.points.clear();
        self.centers.clear();
        self.assignment = None;
        self.objective = None;
        self.last_iterate = None;
    }

    /// Pick `k` initial centers with K-Means++ seeded from `config.seed`
    pub fn seed_centers_plus_plus(&mut self, k: usize) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);
        let centers = plus_plus_centers(&self.points, k, self.config.metric()?, &mut rng)?;
        self.set_initial_centers(centers)
    }

    /// Pick `k` distinct points as initial centers, seeded from `config.seed`
    pub fn seed_random_centers(&mut self, k: usize) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);
        let centers = random_centers(&self.points, k, &mut rng)?;
        self.set_initial_centers(centers)
    }

    /// Start from a graph partition; centers are derived from it at run time
    pub fn seed_from_partition(
        &mut self,
        partitioner: &dyn GraphPartitioner,
        graph: &WeightedGraph,
        k: usize,
        options: &PartitionOptions,
    ) -> Result<()> {
        let parts = partitioner.partition(graph, k, options)?;
        if let Some(bad) = parts.iter().find(|c| **c >= k) {
            return Err(ClusterError::Solver(format!("partitioner returned cluster {bad} for k = {k}")));
        }
        if let Some(unused) = count_members(&parts, k).iter().position(|c| *c == 0) {
            return Err(ClusterError::Solver(format!("partitioner left cluster {unused} of {k} empty")));
        }
        self.centers.clear();
        self.set_assignment(&parts)
    }

    /// Current clustering as an evaluator view
    pub fn state(&self) -> Result<ClusteringState<'_>> {
        let assignment = self.assignment.as_deref().ok_or(ClusterError::NotConfigured("assignment"))?;
        Ok(ClusteringState::new(&self.points, &self.centers, assignment)
            .with_weights(self.config.weights.as_deref()))
    }

    pub fn evaluate_with(&self, evaluator: &dyn Evaluator) -> Result<f64> {
        evaluator.evaluate(&self.state()?)
    }

    /// Run the optimisation loop and return the incumbent centers
    pub fn run(&mut self) -> Result<Vec<Document>> {
        self.run_with_summary()?;
        Ok(self.centers.clone())
    }

    pub fn run_with_summary(&mut self) -> Result<RunSummary> {
        let timer = Instant::now();
        self.config.validate()?;
        let metric = self.config.metric()?;
        let evaluator = self.config.evaluator()?;
        let mut termination = self.config.termination.clone()
            .ok_or(ClusterError::NotConfigured("terminationCriteria"))?;
        let project_on_empty = self.config.project_on_empty;
        let rule = self.config.center_update;
        let weights = self.config.weights.as_deref();
        let points = self.points.as_slice();

        if points.is_empty() {
            return Err(ClusterError::InvalidArgument("no points to cluster".to_string()));
        }
        if let Some(w) = weights {
            if w.len() != points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} weights for {} points", w.len(), points.len()
                )));
            }
        }

        let pool = WorkerPool::new(self.config.num_threads)?;
        let mut centers = match (self.centers.is_empty(), &self.assignment) {
            (false, _) => self.centers.clone(),
            (true, Some(assignment)) => centers_of_partition(points, assignment, weights, metric, rule, &pool)?,
            (true, None) => return Err(ClusterError::NotConfigured("initial centers")),
        };
        let k = centers.len();
        if points.len() < k && !project_on_empty {
            return Err(ClusterError::InvalidArgument(format!(
                "{} points cannot fill {k} clusters", points.len()
            )));
        }

        let mut assignment = match &self.assignment {
            Some(assignment) => {
                if assignment.len() != points.len() || assignment.iter().any(|c| *c >= k) {
                    return Err(ClusterError::InvalidArgument(format!(
                        "stored assignment does not fit {} points and {k} clusters", points.len()
                    )));
                }
                assignment.clone()
            },
            None if points.len() >= k => bootstrap_assignment(points, &centers, metric)?,
            None => points.iter()
                .map(|p| metric.nearest(p, &centers).map(|(cluster, _)| cluster))
                .collect::<Result<Vec<usize>>>()?,
        };

        let initial = ClusteringState::new(points, &centers, &assignment).with_weights(weights);
        termination.register_clustering(&initial)?;
        let mut incumbent = Incumbent {
            score: evaluator.evaluate(&initial)?,
            iteration: 0,
            centers: centers.clone(),
            assignment: assignment.clone(),
        };
        tracing::debug!(k, points = points.len(), objective = incumbent.score, "starting run");

        let mut iteration = 0;
        loop {
            iteration += 1;
            let previous = assignment.clone();
            let cardinalities = count_members(&assignment, k);
            let phase = AssignmentPhase {
                points,
                centers: &centers,
                metric,
                cardinalities: &cardinalities,
                movable: self.config.movable.as_ref(),
                project_on_empty,
            };
            let moved = pool.assign(&phase, &mut assignment)?;
            if !project_on_empty && moved > 0 {
                repair_empty_clusters(&phase, &previous, &mut assignment)?;
            }

            centers = pool.install(|| recalculate(rule, &UpdateInput {
                points,
                assignment: &assignment,
                previous: &centers,
                weights,
                metric,
                project_on_empty,
            }))?;

            let state = ClusteringState::new(points, &centers, &assignment).with_weights(weights);
            let score = evaluator.evaluate(&state)?;
            if evaluator.is_better(score, incumbent.score) {
                incumbent = Incumbent { score, iteration, centers: centers.clone(), assignment: assignment.clone() };
            }
            tracing::debug!(iteration, moved, objective = score, "iteration finished");

            // nothing moved after centers settled: fixpoint
            if termination.is_done(&state)? || (moved == 0 && iteration > 1) {
                break;
            }
        }

        let last_iterate = Iterate { centers, assignment };
        let Incumbent { mut score, iteration: incumbent_iteration, mut centers, mut assignment } = incumbent;

        let mut compacted = 0;
        if let Some(threshold) = self.config.try_compacting {
            let outcome = Compaction {
                points,
                centers: &centers,
                assignment: &assignment,
                weights,
                metric,
                center_update: rule,
                threshold,
            }.run()?;
            compacted = outcome.stripped.len();
            centers = outcome.centers;
            assignment = outcome.assignment;
            score = evaluator.evaluate(&ClusteringState::new(points, &centers, &assignment).with_weights(weights))?;
        }

        if !project_on_empty {
            if let Some(cluster) = count_members(&assignment, k).iter().position(|c| *c == 0) {
                return Err(ClusterError::EmptyCluster { cluster });
            }
        }

        let summary = RunSummary {
            iterations: iteration,
            objective: score,
            incumbent_iteration,
            compacted,
            elapsed: timer.elapsed(),
        };
        tracing::info!(
            iterations = summary.iterations,
            incumbent = summary.incumbent_iteration,
            objective = summary.objective,
            elapsed = ?summary.elapsed,
            "run finished"
        );
        self.centers = centers;
        self.assignment = Some(assignment);
        self.objective = Some(score);
        self.last_iterate = Some(last_iterate);
        Ok(summary)
    }
}

/// Centers of a stored partition; `k` is one past the largest cluster id
fn centers_of_partition(
    points: &[Document],
    assignment: &[usize],
    weights: Option<&[f64]>,
    metric: DistanceMetric,
    rule: CenterUpdate,
    pool: &WorkerPool,
) -> Result<Vec<Document>> {
    let k = assignment.iter().max().map(|c| c + 1)
        .ok_or_else(|| ClusterError::InvalidArgument("empty assignment".to_string()))?;
    if let Some(cluster) = count_members(assignment, k).iter().position(|c| *c == 0) {
        return Err(ClusterError::InvalidArgument(format!(
            "cluster {cluster} has no member to derive its initial center from"
        )));
    }
    let dimension = points.first().map(|p| p.dimension()).unwrap_or(0);
    let zeros = vec![Document::new(dimension); k];
    pool.install(|| recalculate(rule, &UpdateInput {
        points,
        assignment,
        previous: &zeros,
        weights,
        metric,
        project_on_empty: false,
    }))
}
