//! Sparse document clustering: K-Means, K-Median and P-Median alternate engines
//! with pluggable metrics, termination criteria and evaluators, plus a
//! steepest-descent refinement pass.

pub mod clusterer;
pub mod collaborators;
pub mod compaction;
pub mod config;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod labels;
pub mod steepest_descent;
pub mod termination;
pub mod types;
mod assignment;
mod centers;
mod init_plusplus;
mod tools;

pub use clusterer::{Iterate, KMeansClusterer, RunSummary};
pub use config::{CenterUpdate, ClustererConfig};
pub use document::Document;
pub use error::{ClusterError, Result};
pub use evaluator::{ClusteringState, Evaluator, ObjectiveSum};
pub use steepest_descent::SteepestDescentClusterer;
pub use termination::Termination;
pub use types::DistanceMetric;
