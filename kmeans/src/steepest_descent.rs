//! Steepest-descent refinement under the squared Euclidean objective
//!
//! Every iteration evaluates all single-point relocations and applies the one
//! with the most negative objective change. Moving `x` (weight `w`) from
//! cluster `A` to cluster `B` changes the objective by
//!
//! ```text
//! w·W_B/(W_B + w)·d(x, c_B) − w·W_A/(W_A − w)·d(x, c_A)
//! ```
//!
//! where `W` is the total member weight and `d` the squared distance to the
//! current center. Point-to-center distances are cached and only the two
//! columns whose centers moved are refreshed after a relocation.

use std::sync::Mutex;

use rayon::prelude::*;

use crate::{
    assignment::{WorkerPool, count_members},
    clusterer::KMeansClusterer,
    document::{DIVISOR_EPSILON, Document},
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator, ObjectiveSum},
    termination::Termination,
    tools::chunk_ranges,
    types::DistanceMetric,
};

/// Changes smaller than this do not count as a gain
pub const GAIN_TOLERANCE: f64 = 1e-10;

/// A single-point relocation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Move {
    pub point: usize,
    pub from: usize,
    pub to: usize,
    /// Objective change, negative when the move helps
    pub delta: f64,
}

impl Move {
    /// Lower delta wins, then lower point id, then lower target cluster
    fn beats(&self, other: &Move) -> bool {
        self.delta.total_cmp(&other.delta)
            .then(self.point.cmp(&other.point))
            .then(self.to.cmp(&other.to))
            .is_lt()
    }
}

#[derive(Clone, Debug)]
pub struct SteepestDescentClusterer {
    termination: Termination,
    num_threads: usize,
    points: Vec<Document>,
    weights: Option<Vec<f64>>,
    centers: Vec<Document>,
    assignment: Vec<usize>,
    moves: usize,
}

impl SteepestDescentClusterer {
    /// Start from `assignment` over `k` clusters; every cluster needs a member
    pub fn new(
        points: Vec<Document>,
        assignment: Vec<usize>,
        k: usize,
        termination: Termination,
        num_threads: usize,
    ) -> Result<Self> {
        if num_threads == 0 {
            return Err(ClusterError::InvalidArgument("numThreads must be >= 1".to_string()));
        }
        let centers = Document::weighted_centers(&points, &assignment, k, None)?;
        Ok(Self { termination, num_threads, points, weights: None, centers, assignment, moves: 0 })
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.iter().any(|w| !(*w >= 0.0)) {
            return Err(ClusterError::InvalidArgument("weights must be non-negative".to_string()));
        }
        self.centers = Document::weighted_centers(&self.points, &self.assignment, self.centers.len(), Some(&weights))?;
        self.weights = Some(weights);
        Ok(self)
    }

    /// Polish the result of a finished engine run
    pub fn from_clusterer(engine: &KMeansClusterer) -> Result<Self> {
        let assignment = engine.assignment().ok_or(ClusterError::NotConfigured("assignment"))?;
        let config = engine.config();
        let termination = config.termination.clone().ok_or(ClusterError::NotConfigured("terminationCriteria"))?;
        let refiner = Self::new(
            engine.points().to_vec(),
            assignment.to_vec(),
            engine.centers().len(),
            termination,
            config.num_threads,
        )?;
        match &config.weights {
            Some(weights) => refiner.with_weights(weights.clone()),
            None => Ok(refiner)
        }
    }

    pub fn centers(&self) -> &[Document] {
        &self.centers
    }

    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Relocations applied by the last [`SteepestDescentClusterer::run`]
    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn state(&self) -> ClusteringState<'_> {
        ClusteringState::new(&self.points, &self.centers, &self.assignment).with_weights(self.weights.as_deref())
    }

    /// Squared Euclidean objective of the current clustering
    pub fn objective(&self) -> Result<f64> {
        ObjectiveSum::squared_l2().evaluate(&self.state())
    }

    fn weight(&self, point: usize) -> f64 {
        self.weights.as_ref().map(|w| w[point]).unwrap_or(1.0)
    }

    /// Apply best relocations until none gains or the criterion fires; returns the number of moves
    pub fn run(&mut self) -> Result<usize> {
        let pool = WorkerPool::new(self.num_threads)?;
        let k = self.centers.len();
        let metric = DistanceMetric::L2Squared;
        let mut termination = self.termination.clone();
        termination.register_clustering(&self.state())?;

        let mut counts = count_members(&self.assignment, k);
        let mut totals = vec![0.0; k];
        for (i, cluster) in self.assignment.iter().enumerate() {
            totals[*cluster] += self.weight(i);
        }
        let mut distances: Vec<Vec<f64>> = pool.install(|| {
            self.points.par_iter()
                .map(|p| self.centers.iter().map(|c| metric.distance(p, c)).collect::<Result<Vec<f64>>>())
                .collect::<Result<_>>()
        })?;

        self.moves = 0;
        loop {
            let Some(best) = self.best_move(&pool, &distances, &counts, &totals) else {
                break;
            };
            self.apply(best, &mut counts, &mut totals)?;
            let (a, b) = (best.from, best.to);
            let centers = &self.centers;
            pool.install(|| {
                distances.par_iter_mut()
                    .zip(self.points.par_iter())
                    .try_for_each(|(row, p)| -> Result<()> {
                        row[a] = metric.distance(p, &centers[a])?;
                        row[b] = metric.distance(p, &centers[b])?;
                        Ok(())
                    })
            })?;
            self.moves += 1;
            tracing::debug!(moves = self.moves, point = best.point, from = a, to = b, delta = best.delta, "relocated point");
            if termination.is_done(&self.state())? {
                break;
            }
        }
        tracing::info!(moves = self.moves, "steepest descent finished");
        Ok(self.moves)
    }

    /// Most improving relocation, searched by chunked workers
    fn best_move(&self, pool: &WorkerPool, distances: &[Vec<f64>], counts: &[usize], totals: &[f64]) -> Option<Move> {
        let best: Mutex<Option<Move>> = Mutex::new(None);
        let ranges = chunk_ranges(self.points.len(), pool.threads());
        pool.install(|| {
            rayon::scope(|s| {
                for range in &ranges {
                    let best = &best;
                    s.spawn(move |_| {
                        let mut local: Option<Move> = None;
                        for point in range.clone() {
                            let from = self.assignment[point];
                            let w = self.weight(point);
                            let remaining = totals[from] - w;
                            // never empty a cluster
                            if counts[from] <= 1 || remaining <= DIVISOR_EPSILON {
                                continue;
                            }
                            let removal = w * totals[from] / remaining * distances[point][from];
                            for to in 0..totals.len() {
                                if to == from {
                                    continue;
                                }
                                let delta = w * totals[to] / (totals[to] + w) * distances[point][to] - removal;
                                let candidate = Move { point, from, to, delta };
                                if local.map(|l| candidate.beats(&l)).unwrap_or(true) {
                                    local = Some(candidate);
                                }
                            }
                        }
                        if let Some(candidate) = local {
                            let mut shared = best.lock().unwrap_or_else(|e| e.into_inner());
                            let replace = match *shared {
                                Some(current) => candidate.beats(&current),
                                None => true
                            };
                            if replace {
                                *shared = Some(candidate);
                            }
                        }
                    });
                }
            });
        });
        best.into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .filter(|m| m.delta < -GAIN_TOLERANCE)
    }

    /// Relocate the point and update both centers incrementally
    fn apply(&mut self, m: Move, counts: &mut [usize], totals: &mut [f64]) -> Result<()> {
        let w = self.weight(m.point);
        let point = &self.points[m.point];

        let mut from = Document::new(point.dimension());
        from.add_scaled(totals[m.from], &self.centers[m.from])?;
        from.add_scaled(-w, point)?;
        from.scale(totals[m.from] - w)?;

        let mut to = Document::new(point.dimension());
        to.add_scaled(totals[m.to], &self.centers[m.to])?;
        to.add_scaled(w, point)?;
        to.scale(totals[m.to] + w)?;

        self.centers[m.from] = from;
        self.centers[m.to] = to;
        self.assignment[m.point] = m.to;
        counts[m.from] -= 1;
        counts[m.to] += 1;
        totals[m.from] -= w;
        totals[m.to] += w;
        Ok(())
    }
}
