//! Property-based tests for documents and metrics.
//!
//! - scaling by `d` then by `1 / d` restores the coordinates
//! - the centroid of a single point is the point itself
//! - every metric is zero on identical documents and symmetric
//! - weighted centers zero the weighted residual sum of their members

use kmeans::{Document, DistanceMetric};
use proptest::prelude::*;

const METRICS: [DistanceMetric; 4] = [
    DistanceMetric::L1,
    DistanceMetric::L2,
    DistanceMetric::L2Squared,
    DistanceMetric::DensityWeighted,
];

prop_compose! {
    fn arb_document(dim: usize)(values in prop::collection::vec(prop_oneof![Just(0.0), -100.0f64..100.0], dim)) -> Document {
        Document::from_dense(&values)
    }
}

prop_compose! {
    fn arb_divisor()(magnitude in 1e-3f64..1e3, negative in any::<bool>()) -> f64 {
        if negative { -magnitude } else { magnitude }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn scale_round_trip(doc in arb_document(16), divisor in arb_divisor()) {
        // coordinates that would drop under the pruning threshold are out of scope
        prop_assume!(doc.iter().all(|(_, v)| (v / divisor).abs() > 1e-9));
        let mut scaled = doc.clone();
        scaled.scale(divisor).unwrap();
        scaled.scale(1.0 / divisor).unwrap();
        prop_assert_eq!(scaled.nnz(), doc.nnz());
        for (i, v) in doc.iter() {
            let back = scaled.dim_value(i).unwrap().unwrap_or(0.0);
            prop_assert!((back - v).abs() <= 1e-9 * v.abs().max(1.0), "{} vs {}", back, v);
        }
    }

    #[test]
    fn single_point_centroid_is_identity(doc in arb_document(12)) {
        prop_assert_eq!(Document::centroid(std::slice::from_ref(&doc), None).unwrap(), doc);
    }

    #[test]
    fn metrics_are_symmetric_and_zero_on_self(a in arb_document(20), b in arb_document(20)) {
        for metric in METRICS {
            prop_assert_eq!(metric.distance(&a, &a).unwrap(), 0.0);
            prop_assert_eq!(metric.distance(&a, &b).unwrap(), metric.distance(&b, &a).unwrap());
        }
    }

    #[test]
    fn weighted_centers_are_optimal(
        points in prop::collection::vec(arb_document(6), 4..24),
        k in 1usize..4,
        seed_weights in prop::collection::vec(0.1f64..5.0, 24),
    ) {
        let assignment: Vec<usize> = (0..points.len()).map(|i| i % k).collect();
        let weights = &seed_weights[..points.len()];
        let centers = Document::weighted_centers(&points, &assignment, k, Some(weights)).unwrap();
        for (cluster, center) in centers.iter().enumerate() {
            let mut residual = Document::new(6);
            for (i, point) in points.iter().enumerate().filter(|(i, _)| assignment[*i] == cluster) {
                residual.add_scaled(weights[i], point).unwrap();
                residual.add_scaled(-weights[i], center).unwrap();
            }
            prop_assert!(residual.squared_norm().sqrt() < 1e-6, "residual {:?}", residual);
        }
    }
}
