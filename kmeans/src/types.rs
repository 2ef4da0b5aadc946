//! Distance metrics over sparse documents
//! Every metric walks the two ordered coordinate maps together, absent
//! coordinates count as zero, no dense copy is ever built.

use serde::{Deserialize, Serialize};

use crate::{document::Document, error::{ClusterError, Result}, tools::merge_fold};

/// Stand-in for an exactly-zero distance in [`DistanceMetric::DensityWeighted`]
pub const DENSITY_ZERO_CLAMP: f64 = f64::MAX;

/// Exponent of the density transform
pub const DENSITY_EXPONENT: f64 = -1.5;

/// Distance metrics available for clustering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Sum of absolute coordinate differences
    L1,
    /// Euclidean distance
    L2,
    /// Squared Euclidean distance (the K-Means objective)
    L2Squared,
    /// `d^-1.5` of the Euclidean distance, far points give small values
    DensityWeighted,
}

impl DistanceMetric {
    /// Distance between two documents of the same dimension
    pub fn distance(&self, a: &Document, b: &Document) -> Result<f64> {
        if a.dimension() != b.dimension() {
            return Err(ClusterError::DimensionMismatch { left: a.dimension(), right: b.dimension() });
        }
        let (left, right) = (a.coordinates().iter(), b.coordinates().iter());
        Ok(match self {
            DistanceMetric::L1 => merge_fold(left, right, |x, y| (x - y).abs()),
            DistanceMetric::L2 => merge_fold(left, right, |x, y| (x - y) * (x - y)).sqrt(),
            DistanceMetric::L2Squared => merge_fold(left, right, |x, y| (x - y) * (x - y)),
            DistanceMetric::DensityWeighted => {
                let d = merge_fold(left, right, |x, y| (x - y) * (x - y)).sqrt();
                let d = if d == 0.0 { DENSITY_ZERO_CLAMP } else { d };
                d.powf(DENSITY_EXPONENT)
            }
        })
    }

    /// Distance to the origin
    pub fn norm(&self, a: &Document) -> f64 {
        let values = a.coordinates().values();
        match self {
            DistanceMetric::L1 => values.map(|v| v.abs()).sum(),
            DistanceMetric::L2 => a.squared_norm().sqrt(),
            DistanceMetric::L2Squared => a.squared_norm(),
            DistanceMetric::DensityWeighted => {
                let d = a.squared_norm().sqrt();
                let d = if d == 0.0 { DENSITY_ZERO_CLAMP } else { d };
                d.powf(DENSITY_EXPONENT)
            }
        }
    }

    /// Index of and distance to the nearest center
    ///
    /// Ties go to the first center encountered (strict `<`).
    pub fn nearest(&self, point: &Document, centers: &[Document]) -> Result<(usize, f64)> {
        let mut best = (0, f64::INFINITY);
        if centers.is_empty() {
            return Err(ClusterError::InvalidArgument("no centers to compare against".to_string()));
        }
        for (idx, center) in centers.iter().enumerate() {
            let d = self.distance(point, center)?;
            if d < best.1 {
                best = (idx, d);
            }
        }
        Ok(best)
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "l1" | "manhattan" => Ok(Self::L1),
            "l2" | "euclidean" => Ok(Self::L2),
            "l2squared" | "l2sqr" | "sqeuclidean" => Ok(Self::L2Squared),
            "density" | "densityweighted" => Ok(Self::DensityWeighted),
            other => Err(ClusterError::InvalidArgument(format!("unknown metric '{other}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DistanceMetric; 4] = [
        DistanceMetric::L1,
        DistanceMetric::L2,
        DistanceMetric::L2Squared,
        DistanceMetric::DensityWeighted,
    ];

    fn doc(pairs: &[(usize, f64)]) -> Document {
        Document::from_pairs(4, pairs.iter().copied()).unwrap()
    }

    #[test]
    fn known_values() {
        let a = doc(&[(0, 1.0), (2, 2.0)]);
        let b = doc(&[(1, 3.0), (2, -2.0)]);
        // diffs: 1, -3, 4
        assert_eq!(DistanceMetric::L1.distance(&a, &b).unwrap(), 8.0);
        assert_eq!(DistanceMetric::L2Squared.distance(&a, &b).unwrap(), 26.0);
        assert!((DistanceMetric::L2.distance(&a, &b).unwrap() - 26f64.sqrt()).abs() < 1e-12);
        let density = DistanceMetric::DensityWeighted.distance(&a, &b).unwrap();
        assert!((density - 26f64.sqrt().powf(-1.5)).abs() < 1e-12);
    }

    #[test]
    fn self_distance_is_zero_and_symmetric() {
        let a = doc(&[(0, 1.5), (3, -0.5)]);
        let b = doc(&[(1, 2.0)]);
        for metric in ALL {
            assert_eq!(metric.distance(&a, &a).unwrap(), 0.0, "{metric:?}");
            assert_eq!(metric.distance(&a, &b).unwrap(), metric.distance(&b, &a).unwrap(), "{metric:?}");
        }
    }

    #[test]
    fn dimension_mismatch() {
        let a = Document::new(3);
        let b = Document::new(4);
        for metric in ALL {
            assert!(matches!(metric.distance(&a, &b), Err(ClusterError::DimensionMismatch { .. })));
        }
    }

    #[test]
    fn norm_matches_distance_to_origin() {
        let a = doc(&[(0, 3.0), (1, -4.0)]);
        let origin = Document::new(4);
        for metric in ALL {
            assert!((metric.norm(&a) - metric.distance(&a, &origin).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn nearest_prefers_first_on_tie() {
        let p = doc(&[(0, 1.0)]);
        let centers = vec![doc(&[(0, 2.0)]), doc(&[]), doc(&[(0, 2.0)])];
        let (idx, d) = DistanceMetric::L2Squared.nearest(&p, &centers).unwrap();
        assert_eq!((idx, d), (0, 1.0));
        assert!(DistanceMetric::L1.nearest(&p, &[]).is_err());
    }

    #[test]
    fn parse_metric_names() {
        assert_eq!("L2Squared".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2Squared);
        assert_eq!("manhattan".parse::<DistanceMetric>().unwrap(), DistanceMetric::L1);
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }
}
