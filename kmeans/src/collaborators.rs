//! Interfaces to out-of-process collaborators
//!
//! Graph partitioners, coarseners and MIP solvers live outside this crate. The
//! engine only needs their outputs: a per-node cluster id array, a coarser
//! graph with a node mapping, or a `column -> selected` map parsed from solver
//! output.

use std::{collections::BTreeMap, process::ExitStatus};

use rayon::prelude::*;

use crate::{document::Document, error::{ClusterError, Result}, types::DistanceMetric};

/// Undirected weighted graph in adjacency-list form
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl WeightedGraph {
    pub fn new(nodes: usize) -> Self {
        Self { adjacency: vec![Vec::new(); nodes] }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|n| n.len()).sum::<usize>() / 2
    }

    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> Result<()> {
        let nodes = self.node_count();
        if a >= nodes || b >= nodes {
            return Err(ClusterError::OutOfRange { index: a.max(b), dimension: nodes });
        }
        if a == b || self.adjacency[a].iter().any(|(n, _)| *n == b) {
            return Ok(());
        }
        self.adjacency[a].push((b, weight));
        self.adjacency[b].push((a, weight));
        Ok(())
    }

    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        self.adjacency.get(node).map(|n| n.as_slice()).unwrap_or(&[])
    }

    /// Symmetric k-nearest-neighbour graph, edge weight `1 / (1 + distance)`
    pub fn knn(points: &[Document], k: usize, metric: DistanceMetric) -> Result<Self> {
        let lists: Vec<Vec<(usize, f64)>> = points.par_iter()
            .enumerate()
            .map(|(i, p)| {
                let mut row = points.iter().enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, q)| Ok((j, metric.distance(p, q)?)))
                    .collect::<Result<Vec<(usize, f64)>>>()?;
                row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                row.truncate(k);
                Ok(row)
            })
            .collect::<Result<_>>()?;
        let mut graph = Self::new(points.len());
        for (i, row) in lists.into_iter().enumerate() {
            for (j, d) in row {
                graph.add_edge(i, j, 1.0 / (1.0 + d))?;
            }
        }
        Ok(graph)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionOptions {
    pub seed: u64,
    /// Allowed part-size imbalance, 1.0 means perfectly balanced
    pub imbalance: f64,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self { seed: 0, imbalance: 1.05 }
    }
}

/// Splits a graph into `k` parts, one cluster id per node
pub trait GraphPartitioner {
    fn partition(&self, graph: &WeightedGraph, k: usize, options: &PartitionOptions) -> Result<Vec<usize>>;
}

/// One coarsening step: the coarser graph and, per fine node, its coarse node
#[derive(Clone, Debug, PartialEq)]
pub struct CoarseLevel {
    pub graph: WeightedGraph,
    pub mapping: Vec<usize>,
}

impl CoarseLevel {
    /// Project a clustering of the coarse nodes back onto the fine nodes
    pub fn project(&self, coarse_assignment: &[usize]) -> Result<Vec<usize>> {
        self.mapping.iter()
            .map(|c| coarse_assignment.get(*c).copied()
                .ok_or(ClusterError::OutOfRange { index: *c, dimension: coarse_assignment.len() }))
            .collect()
    }
}

pub trait Coarsener {
    fn coarsen(&self, graph: &WeightedGraph) -> Result<CoarseLevel>;
}

/// Set partitioning / covering problem in the solver's row/column text format
///
/// ```text
/// <rows> <columns>
/// <cost_0> ... <cost_{columns-1}>
/// <nnz> <column> ... <column>      (one line per row)
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MipProblem {
    pub costs: Vec<f64>,
    /// Columns covering each row
    pub rows: Vec<Vec<usize>>,
}

impl MipProblem {
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {}\n", self.rows.len(), self.costs.len());
        out.push_str(&self.costs.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" "));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.len().to_string());
            for column in row {
                out.push(' ');
                out.push_str(&column.to_string());
            }
            out.push('\n');
        }
        out
    }
}

pub trait MipSolver {
    /// Selected columns of an optimal solution
    fn solve(&self, problem: &MipProblem) -> Result<BTreeMap<usize, bool>>;
}

/// Read `X<index> <value>` lines of solver output; other lines are ignored
pub fn parse_solver_solution(text: &str) -> Result<BTreeMap<usize, bool>> {
    let mut solution = BTreeMap::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else { continue };
        let Some(index) = name.strip_prefix('X') else { continue };
        let index: usize = index.parse()
            .map_err(|e| ClusterError::Parse(format!("variable '{name}': {e}")))?;
        let value: f64 = fields.next()
            .ok_or_else(|| ClusterError::Parse(format!("variable '{name}' has no value")))?
            .parse()
            .map_err(|e| ClusterError::Parse(format!("variable '{name}': {e}")))?;
        solution.insert(index, value > 0.5);
    }
    Ok(solution)
}

/// Turn a failed solver process into an error
pub fn check_exit(solver: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(ClusterError::Solver(format!("{solver} exited with {status}")))
    }
}
