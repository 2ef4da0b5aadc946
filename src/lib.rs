//! Document clustering toolkit.
//!
//! Re-exports the core engine crate (`kmeans`) and the evaluator crate
//! (`kmeans_eval`) under one name for downstream users.

pub use kmeans;
pub use kmeans_eval;

pub use kmeans::{
    clusterer::KMeansClusterer,
    config::{CenterUpdate, ClustererConfig},
    document::Document,
    error::{ClusterError, Result},
    steepest_descent::SteepestDescentClusterer,
    termination::Termination,
    types::DistanceMetric,
};
