//! Sparse document vectors
//! A `Document` is one point (or center) of a fixed-dimensional space that stores
//! only its non-zero coordinates, ordered by dimension index.

use std::{collections::BTreeMap, hash::{Hash, Hasher}};

use crate::error::{ClusterError, Result};

/// Coordinates whose magnitude falls below this value are dropped from the map
pub const EPSILON: f64 = 1e-12;

/// Smallest divisor accepted by [`Document::scale`]
pub const DIVISOR_EPSILON: f64 = 1e-15;

/// Sparse numeric feature vector
///
/// Absent keys denote zero. The representation is kept maximally sparse:
/// every mutating operation prunes coordinates under [`EPSILON`].
#[derive(Clone, Debug, Default)]
pub struct Document {
    dimension: usize,
    coordinates: BTreeMap<usize, f64>,
}

impl Document {
    /// Create an all-zero document of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self { dimension, coordinates: BTreeMap::new() }
    }

    /// Build a document from an explicit coordinate map
    ///
    /// Near-zero entries are pruned, keys outside `[0, dimension)` are rejected.
    pub fn from_map(dimension: usize, coordinates: BTreeMap<usize, f64>) -> Result<Self> {
        let mut doc = Self::new(dimension);
        for (index, value) in coordinates {
            doc.set_dim_value(index, value)?;
        }
        Ok(doc)
    }

    /// Build a document from `(index, value)` pairs
    pub fn from_pairs<I>(dimension: usize, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, f64)>
    {
        let mut doc = Self::new(dimension);
        for (index, value) in pairs {
            doc.set_dim_value(index, value)?;
        }
        Ok(doc)
    }

    /// Build a document from a dense slice, dimension is the slice length
    pub fn from_dense(values: &[f64]) -> Self {
        Self {
            dimension: values.len(),
            coordinates: values.iter().enumerate()
                .filter(|(_, v)| v.abs() >= EPSILON)
                .map(|(i, v)| (i, *v))
                .collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored (non-zero) coordinates
    pub fn nnz(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Non-zero coordinates in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.coordinates.iter().map(|(i, v)| (*i, *v))
    }

    pub(crate) fn coordinates(&self) -> &BTreeMap<usize, f64> {
        &self.coordinates
    }

    /// Value at `index`, `None` when the coordinate is zero
    pub fn dim_value(&self, index: usize) -> Result<Option<f64>> {
        self.check_index(index)?;
        Ok(self.coordinates.get(&index).copied())
    }

    /// Set the value at `index`, values under [`EPSILON`] remove the coordinate
    pub fn set_dim_value(&mut self, index: usize, value: f64) -> Result<()> {
        self.check_index(index)?;
        if value.abs() < EPSILON {
            self.coordinates.remove(&index);
        } else {
            self.coordinates.insert(index, value);
        }
        Ok(())
    }

    /// `self += coefficient * other`, pruning coordinates that cancel out
    pub fn add_scaled(&mut self, coefficient: f64, other: &Document) -> Result<()> {
        self.check_dimension(other)?;
        if coefficient == 0.0 {
            return Ok(());
        }
        for (index, value) in other.coordinates.iter() {
            let entry = self.coordinates.entry(*index).or_insert(0.0);
            *entry += coefficient * value;
            if entry.abs() < EPSILON {
                self.coordinates.remove(index);
            }
        }
        Ok(())
    }

    /// Divide every coordinate by `divisor`
    pub fn scale(&mut self, divisor: f64) -> Result<()> {
        if divisor.abs() < DIVISOR_EPSILON {
            return Err(ClusterError::DivisionByZero(format!("scale by {divisor}")));
        }
        self.coordinates.values_mut().for_each(|v| *v /= divisor);
        self.coordinates.retain(|_, v| v.abs() >= EPSILON);
        Ok(())
    }

    pub fn squared_norm(&self) -> f64 {
        self.coordinates.values().map(|v| v * v).sum()
    }

    /// Weighted mean of `points`
    ///
    /// Weights default to 1. The sum is always divided by the total weight, not
    /// by the number of points.
    pub fn centroid(points: &[Document], weights: Option<&[f64]>) -> Result<Document> {
        let first = points.first()
            .ok_or_else(|| ClusterError::InvalidArgument("centroid of an empty point set".to_string()))?;
        if let Some(w) = weights {
            if w.len() != points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} weights for {} points", w.len(), points.len()
                )));
            }
        }
        let mut center = Document::new(first.dimension);
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            let weight = weights.map(|w| w[i]).unwrap_or(1.0);
            center.add_scaled(weight, point)?;
            total += weight;
        }
        center.scale(total)?;
        Ok(center)
    }

    /// Per-cluster weighted centroids
    ///
    /// Fails with `DivisionByZero` when a cluster carries no weight.
    pub fn weighted_centers(
        points: &[Document],
        assignment: &[usize],
        k: usize,
        weights: Option<&[f64]>
    ) -> Result<Vec<Document>> {
        let (sums, totals) = Self::accumulate_clusters(points, assignment, k, weights)?;
        sums.into_iter().zip(totals).enumerate()
            .map(|(cluster, (mut sum, total))| {
                sum.scale(total).map_err(|_| ClusterError::DivisionByZero(
                    format!("cluster {cluster} has zero weight")
                ))?;
                Ok(sum)
            })
            .collect()
    }

    /// Scatter-accumulate weighted sums and weight totals per cluster id
    pub(crate) fn accumulate_clusters(
        points: &[Document],
        assignment: &[usize],
        k: usize,
        weights: Option<&[f64]>
    ) -> Result<(Vec<Document>, Vec<f64>)> {
        if assignment.len() != points.len() {
            return Err(ClusterError::InvalidArgument(format!(
                "assignment of length {} for {} points", assignment.len(), points.len()
            )));
        }
        if let Some(w) = weights {
            if w.len() != points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} weights for {} points", w.len(), points.len()
                )));
            }
        }
        let dimension = points.first().map(|p| p.dimension).unwrap_or(0);
        let mut sums = vec![Document::new(dimension); k];
        let mut totals = vec![0.0; k];
        for (i, (point, cluster)) in points.iter().zip(assignment).enumerate() {
            if *cluster >= k {
                return Err(ClusterError::InvalidArgument(format!(
                    "point {i} assigned to cluster {cluster}, expected < {k}"
                )));
            }
            let weight = weights.map(|w| w[i]).unwrap_or(1.0);
            sums[*cluster].add_scaled(weight, point)?;
            totals[*cluster] += weight;
        }
        Ok((sums, totals))
    }

    /// Coordinate-wise weighted (lower) median of `points`
    ///
    /// Absent coordinates take part in the median as zeros.
    pub fn coordinate_median(points: &[&Document], weights: Option<&[f64]>) -> Result<Document> {
        let first = points.first()
            .ok_or_else(|| ClusterError::InvalidArgument("median of an empty point set".to_string()))?;
        let dimension = first.dimension;
        if let Some(w) = weights {
            if w.len() != points.len() {
                return Err(ClusterError::InvalidArgument(format!(
                    "{} weights for {} points", w.len(), points.len()
                )));
            }
        }
        let weight_of = |i: usize| weights.map(|w| w[i]).unwrap_or(1.0);
        let total: f64 = (0..points.len()).map(weight_of).sum();
        if total.abs() < DIVISOR_EPSILON {
            return Err(ClusterError::DivisionByZero("median of zero total weight".to_string()));
        }

        // dimension -> (value, weight) for the points holding a non-zero there
        let mut columns: BTreeMap<usize, Vec<(f64, f64)>> = BTreeMap::new();
        for (i, point) in points.iter().enumerate() {
            if point.dimension != dimension {
                return Err(ClusterError::DimensionMismatch { left: dimension, right: point.dimension });
            }
            for (index, value) in point.coordinates.iter() {
                columns.entry(*index).or_default().push((*value, weight_of(i)));
            }
        }

        let mut median = Document::new(dimension);
        for (index, mut column) in columns {
            let present: f64 = column.iter().map(|(_, w)| w).sum();
            column.push((0.0, total - present));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut cumulative = 0.0;
            for (value, weight) in column {
                cumulative += weight;
                if cumulative >= total / 2.0 {
                    median.set_dim_value(index, value)?;
                    break;
                }
            }
        }
        Ok(median)
    }

    /// Parse the `index:value index:value ...` sparse line format
    pub fn parse_line(dimension: usize, line: &str) -> Result<Self> {
        Self::from_map(dimension, parse_coordinates(line)?)
    }

    /// Inverse of [`Document::parse_line`]
    pub fn to_line(&self) -> String {
        self.coordinates.iter()
            .map(|(i, v)| format!("{i}:{v}"))
            .collect::<Vec<String>>()
            .join(" ")
    }

    pub(crate) fn check_dimension(&self, other: &Document) -> Result<()> {
        if self.dimension != other.dimension {
            return Err(ClusterError::DimensionMismatch { left: self.dimension, right: other.dimension });
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.dimension {
            return Err(ClusterError::OutOfRange { index, dimension: self.dimension });
        }
        Ok(())
    }
}

/// Equality over the non-zero coordinate mapping
/// Coordinates of one `index:value index:value ...` line, without range checks
pub fn parse_coordinates(line: &str) -> Result<BTreeMap<usize, f64>> {
    line.split_whitespace()
        .map(|token| {
            let (index, value) = token.split_once(':')
                .ok_or_else(|| ClusterError::Parse(format!("expected index:value, got '{token}'")))?;
            let index = index.parse::<usize>()
                .map_err(|e| ClusterError::Parse(format!("bad index '{index}': {e}")))?;
            let value = value.parse::<f64>()
                .map_err(|e| ClusterError::Parse(format!("bad value '{value}': {e}")))?;
            Ok((index, value))
        })
        .collect()
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.coordinates == other.coordinates
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (index, value) in self.coordinates.iter() {
            index.hash(state);
            value.to_bits().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(dimension: usize, pairs: &[(usize, f64)]) -> Document {
        Document::from_pairs(dimension, pairs.iter().copied()).unwrap()
    }

    #[test]
    fn prunes_small_coordinates() {
        let d = doc(4, &[(0, 1.0), (1, 1e-13), (3, -2.0)]);
        assert_eq!(d.nnz(), 2);
        assert_eq!(d.dim_value(1).unwrap(), None);
        assert_eq!(d.dim_value(3).unwrap(), Some(-2.0));
    }

    #[test]
    fn add_scaled_cancels_to_sparse() {
        let mut a = doc(3, &[(0, 1.0), (2, 3.0)]);
        let b = doc(3, &[(0, 1.0), (1, 2.0)]);
        a.add_scaled(-1.0, &b).unwrap();
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(1, -2.0), (2, 3.0)]);

        let before = a.clone();
        a.add_scaled(0.0, &b).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn add_scaled_rejects_other_dimension() {
        let mut a = Document::new(3);
        let b = Document::new(4);
        assert!(matches!(a.add_scaled(1.0, &b), Err(ClusterError::DimensionMismatch { left: 3, right: 4 })));
    }

    #[test]
    fn scale_by_zero_fails() {
        let mut a = doc(2, &[(0, 1.0)]);
        assert!(matches!(a.scale(1e-16), Err(ClusterError::DivisionByZero(_))));
        a.scale(4.0).unwrap();
        assert_eq!(a.dim_value(0).unwrap(), Some(0.25));
    }

    #[test]
    fn out_of_range_index() {
        let mut a = Document::new(2);
        assert!(matches!(a.set_dim_value(2, 1.0), Err(ClusterError::OutOfRange { index: 2, dimension: 2 })));
        assert!(a.dim_value(5).is_err());
    }

    #[test]
    fn centroid_of_single_point_is_exact() {
        let a = doc(5, &[(0, 0.3), (4, -7.25)]);
        assert_eq!(Document::centroid(&[a.clone()], None).unwrap(), a);
    }

    #[test]
    fn centroid_divides_by_total_weight() {
        let a = doc(2, &[(0, 2.0)]);
        let b = doc(2, &[(1, 4.0)]);
        let c = Document::centroid(&[a, b], Some(&[1.0, 3.0])).unwrap();
        assert_eq!(c.dim_value(0).unwrap(), Some(0.5));
        assert_eq!(c.dim_value(1).unwrap(), Some(3.0));
    }

    #[test]
    fn centroid_rejects_bad_input() {
        assert!(Document::centroid(&[], None).is_err());
        let a = doc(2, &[(0, 2.0)]);
        assert!(matches!(Document::centroid(&[a.clone()], Some(&[1.0, 2.0])), Err(ClusterError::InvalidArgument(_))));
        assert!(matches!(Document::centroid(&[a], Some(&[0.0])), Err(ClusterError::DivisionByZero(_))));
    }

    #[test]
    fn weighted_centers_per_cluster() {
        let points = vec![doc(1, &[(0, 1.0)]), doc(1, &[(0, 3.0)]), doc(1, &[(0, 10.0)])];
        let centers = Document::weighted_centers(&points, &[0, 0, 1], 2, None).unwrap();
        assert_eq!(centers[0].dim_value(0).unwrap(), Some(2.0));
        assert_eq!(centers[1].dim_value(0).unwrap(), Some(10.0));

        assert!(matches!(Document::weighted_centers(&points, &[0, 2, 1], 2, None), Err(ClusterError::InvalidArgument(_))));
        assert!(matches!(Document::weighted_centers(&points, &[0, 0, 0], 2, None), Err(ClusterError::DivisionByZero(_))));
    }

    #[test]
    fn median_counts_implicit_zeros() {
        let a = doc(2, &[(0, 5.0)]);
        let b = doc(2, &[(0, 1.0), (1, 2.0)]);
        let c = doc(2, &[(1, 9.0)]);
        let m = Document::coordinate_median(&[&a, &b, &c], None).unwrap();
        // dim 0: {0, 1, 5} -> 1, dim 1: {0, 2, 9} -> 2
        assert_eq!(m.dim_value(0).unwrap(), Some(1.0));
        assert_eq!(m.dim_value(1).unwrap(), Some(2.0));
    }

    #[test]
    fn equality_and_hash_are_structural() {
        use std::collections::hash_map::DefaultHasher;
        let a = doc(3, &[(1, 2.0)]);
        let mut b = doc(3, &[(1, 2.0), (2, 1.0)]);
        b.set_dim_value(2, 0.0).unwrap();
        assert_eq!(a, b);
        let hash = |d: &Document| {
            let mut h = DefaultHasher::new();
            d.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn line_format() {
        let d = Document::parse_line(10, "0:1.5 7:-2").unwrap();
        assert_eq!(d.nnz(), 2);
        assert_eq!(Document::parse_line(10, &d.to_line()).unwrap(), d);
        assert!(matches!(Document::parse_line(10, "3-1"), Err(ClusterError::Parse(_))));
        assert!(matches!(Document::parse_line(2, "3:1"), Err(ClusterError::OutOfRange { .. })));
        let coordinates = parse_coordinates("  4:0.25\t1:3 ").unwrap();
        assert_eq!(coordinates.into_iter().collect::<Vec<_>>(), vec![(1, 3.0), (4, 0.25)]);
        assert!(matches!(parse_coordinates("1:x"), Err(ClusterError::Parse(_))));
    }
}
