//! Termination criteria for iterative clusterers
//! A criterion is registered once per run and then queried after every
//! iteration; it decides whether the optimisation loop should stop.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ClusterError, Result},
    evaluator::{ClusteringState, Evaluator, ObjectiveSum},
    types::DistanceMetric,
};

/// An objective counts as improved only when it drops by more than this
pub const IMPROVEMENT_TOLERANCE: f64 = 1e-9;

/// Stateful stopping condition
///
/// Must be registered with [`Termination::register_clustering`] before the
/// first [`Termination::is_done`] query; registering again resets it so one
/// instance can serve many runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    /// Stop after `budget` iterations
    FixedIterations {
        budget: usize,
        #[serde(skip)]
        remaining: Option<i64>,
    },
    /// Stop once the objective under `metric` stops strictly decreasing.
    /// The baseline starts at `+inf`, so the first query never stops.
    NoImprovement {
        metric: DistanceMetric,
        #[serde(skip)]
        last: Option<f64>,
    },
    /// Stop once the squared-L2 objective stops strictly decreasing.
    /// The baseline is the objective of the registered clustering.
    NoImprovementSqr {
        #[serde(skip)]
        last: Option<f64>,
    },
}

impl Termination {
    pub fn fixed_iterations(budget: usize) -> Self {
        Self::FixedIterations { budget, remaining: None }
    }

    pub fn no_improvement(metric: DistanceMetric) -> Self {
        Self::NoImprovement { metric, last: None }
    }

    pub fn no_improvement_sqr() -> Self {
        Self::NoImprovementSqr { last: None }
    }

    /// Reset the criterion for a new run over `state`
    pub fn register_clustering(&mut self, state: &ClusteringState<'_>) -> Result<()> {
        match self {
            Self::FixedIterations { budget, remaining } => {
                *remaining = Some(*budget as i64 - 1);
            },
            Self::NoImprovement { last, .. } => {
                *last = Some(f64::INFINITY);
            },
            Self::NoImprovementSqr { last } => {
                *last = Some(ObjectiveSum::squared_l2().evaluate(state)?);
            }
        }
        Ok(())
    }

    /// Advance the criterion and report whether the loop must stop
    pub fn is_done(&mut self, state: &ClusteringState<'_>) -> Result<bool> {
        match self {
            Self::FixedIterations { remaining, .. } => {
                let left = remaining.as_mut().ok_or(ClusterError::NotConfigured("termination criteria not registered"))?;
                *left -= 1;
                Ok(*left < 0)
            },
            Self::NoImprovement { metric, last } => {
                let evaluator = ObjectiveSum::new(*metric);
                Self::check_improvement(&evaluator, state, last)
            },
            Self::NoImprovementSqr { last } => {
                Self::check_improvement(&ObjectiveSum::squared_l2(), state, last)
            }
        }
    }

    fn check_improvement(evaluator: &ObjectiveSum, state: &ClusteringState<'_>, last: &mut Option<f64>) -> Result<bool> {
        let previous = last.ok_or(ClusterError::NotConfigured("termination criteria not registered"))?;
        let current = evaluator.evaluate(state)?;
        if current < previous - IMPROVEMENT_TOLERANCE {
            *last = Some(current);
            Ok(false)
        } else {
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn with_state<F: FnOnce(&ClusteringState<'_>)>(center: f64, f: F) {
        let points = vec![Document::from_dense(&[0.0]), Document::from_dense(&[2.0])];
        let centers = vec![Document::from_dense(&[center])];
        let assignment = vec![0, 0];
        f(&ClusteringState::new(&points, &centers, &assignment));
    }

    #[test]
    fn fixed_iterations_done_on_mth_call() {
        with_state(1.0, |state| {
            let mut t = Termination::fixed_iterations(3);
            t.register_clustering(state).unwrap();
            assert!(!t.is_done(state).unwrap());
            assert!(!t.is_done(state).unwrap());
            assert!(t.is_done(state).unwrap());

            // re-registering restarts the countdown
            t.register_clustering(state).unwrap();
            assert!(!t.is_done(state).unwrap());
        });
    }

    #[test]
    fn unregistered_query_fails() {
        with_state(1.0, |state| {
            let mut t = Termination::fixed_iterations(3);
            assert!(matches!(t.is_done(state), Err(ClusterError::NotConfigured(_))));
            let mut t = Termination::no_improvement_sqr();
            assert!(t.is_done(state).is_err());
        });
    }

    #[test]
    fn no_improvement_stops_on_plateau() {
        let mut t = Termination::no_improvement(DistanceMetric::L1);
        with_state(5.0, |state| {
            t.register_clustering(state).unwrap();
            // first query always improves on +inf
            assert!(!t.is_done(state).unwrap());
        });
        with_state(1.0, |state| assert!(!t.is_done(state).unwrap()));
        with_state(1.0, |state| assert!(t.is_done(state).unwrap()));
    }

    #[test]
    fn no_improvement_sqr_uses_registered_baseline() {
        let mut t = Termination::no_improvement_sqr();
        with_state(1.0, |state| {
            t.register_clustering(state).unwrap();
            // same clustering as the baseline: no improvement
            assert!(t.is_done(state).unwrap());
        });
        let mut t = Termination::no_improvement_sqr();
        with_state(5.0, |state| t.register_clustering(state).unwrap());
        with_state(1.5, |state| assert!(!t.is_done(state).unwrap()));
    }

    #[test]
    fn deserializes_without_state() {
        let t: Termination = serde_json::from_str(r#"{"FixedIterations":{"budget":7}}"#).unwrap();
        assert_eq!(t, Termination::fixed_iterations(7));
    }
}
