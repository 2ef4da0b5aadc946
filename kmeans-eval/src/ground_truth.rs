//! Reference labels for external evaluators

use std::{collections::BTreeMap, path::Path};

use kmeans::{
    error::{ClusterError, Result},
    evaluator::ClusteringState,
    labels::{parse_labels, read_labels},
};

/// Ground-truth class of every point of the master set
///
/// Raw labels are remapped to dense class ids `0..classes` in order of first
/// appearance of each distinct label value.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundTruth {
    classes: Vec<usize>,
    class_count: usize,
}

impl GroundTruth {
    pub fn new(labels: &[usize]) -> Result<Self> {
        if labels.is_empty() {
            return Err(ClusterError::InvalidArgument("ground truth without labels".to_string()));
        }
        let mut dense: BTreeMap<usize, usize> = BTreeMap::new();
        let classes = labels.iter()
            .map(|label| {
                let next = dense.len();
                *dense.entry(*label).or_insert(next)
            })
            .collect();
        Ok(Self { classes, class_count: dense.len() })
    }

    /// Read a label file (one integer per line)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(&read_labels(path)?)
    }

    /// Read a label file without blocking the runtime
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::new(&parse_labels(&text)?)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of distinct classes
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Dense class of master point `point`
    pub fn class_of(&self, point: usize) -> Result<usize> {
        self.classes.get(point).copied()
            .ok_or(ClusterError::OutOfRange { index: point, dimension: self.classes.len() })
    }

    /// `table[cluster][class]` member counts of `state`
    pub fn contingency(&self, state: &ClusteringState<'_>) -> Result<Vec<Vec<usize>>> {
        state.validate()?;
        let mut table = vec![vec![0; self.class_count]; state.k()];
        for (i, cluster) in state.assignment.iter().enumerate() {
            table[*cluster][self.class_of(state.master_id(i))?] += 1;
        }
        Ok(table)
    }
}
