//! Evaluators that need global structures or ground truth
//!
//! Neighbor-based scores (entropy, KNN connectivity) are computed against a
//! master point set registered once; label-based scores (Adjusted Rand Index,
//! Hungarian mismatch) compare against [`GroundTruth`].

pub mod ari;
pub mod cohesion;
pub mod connectivity;
pub mod entropy;
pub mod ground_truth;
pub mod hungarian;
pub mod neighbors;

pub use ari::AdjustedRandIndex;
pub use cohesion::{ClusterScore, MeanCohesion, cluster_scores};
pub use connectivity::KnnConnectivity;
pub use entropy::NeighborhoodEntropy;
pub use ground_truth::GroundTruth;
pub use hungarian::HungarianMismatch;
