//! Assignment phase of the K-Means loop
//!
//! The point range `[0, n)` is cut into one contiguous chunk per worker (the last
//! chunk takes the remainder). Each worker owns the matching `&mut` slice of the
//! assignment array, reads the shared points and centers, and keeps a private
//! copy of the cluster cardinalities. Collecting the workers' results is the
//! barrier between the assignment and update phases.

use std::collections::BTreeSet;

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::{
    document::Document,
    error::{ClusterError, Result},
    tools::{chunk_ranges, split_by_ranges},
    types::DistanceMetric,
};

/// Read-only inputs of one assignment phase
#[derive(Clone, Copy)]
pub struct AssignmentPhase<'a> {
    pub points: &'a [Document],
    pub centers: &'a [Document],
    pub metric: DistanceMetric,
    /// Last known-good cardinalities, seeds every worker's private counter
    pub cardinalities: &'a [usize],
    pub movable: Option<&'a BTreeSet<usize>>,
    pub project_on_empty: bool,
}

impl AssignmentPhase<'_> {
    fn is_movable(&self, cluster: usize) -> bool {
        self.movable.map(|m| m.contains(&cluster)).unwrap_or(true)
    }

    /// Reassign the points `start..start + slots.len()`; returns how many moved
    fn assign_chunk(&self, start: usize, slots: &mut [usize]) -> Result<usize> {
        let mut counts = self.cardinalities.to_vec();
        let mut moved = 0;
        for (offset, slot) in slots.iter_mut().enumerate() {
            let current = *slot;
            if !self.is_movable(current) {
                continue;
            }
            // the last member never leaves
            if !self.project_on_empty && counts[current] <= 1 {
                continue;
            }
            let point = &self.points[start + offset];
            let mut best = (current, f64::INFINITY);
            for (cluster, center) in self.centers.iter().enumerate() {
                if cluster != current && !self.is_movable(cluster) {
                    continue;
                }
                let d = self.metric.distance(point, center)?;
                if d < best.1 {
                    best = (cluster, d);
                }
            }
            if best.0 != current {
                counts[current] -= 1;
                counts[best.0] += 1;
                *slot = best.0;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

/// Fixed pool of assignment workers, built once per run
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("assign-worker-{i}"))
            .build()
            .map_err(|e| ClusterError::InvalidArgument(format!("cannot start {threads} workers: {e}")))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run one assignment phase over `assignment`; returns the number of moved points
    pub fn assign(&self, phase: &AssignmentPhase<'_>, assignment: &mut [usize]) -> Result<usize> {
        let ranges = chunk_ranges(assignment.len(), self.threads);
        let slices = split_by_ranges(assignment, &ranges);
        let moved: Vec<Result<usize>> = self.pool.install(|| {
            slices.into_par_iter()
                .zip(ranges.par_iter())
                .map(|(slots, range)| phase.assign_chunk(range.start, slots))
                .collect()
        });
        moved.into_iter().sum()
    }

    /// Run `f` inside the pool so nested rayon calls use these workers
    pub fn install<R: Send, F: FnOnce() -> R + Send>(&self, f: F) -> R {
        self.pool.install(f)
    }
}

/// Greedy starting assignment that leaves no cluster empty
///
/// Each center in turn claims its nearest still-unclaimed point, then every
/// unclaimed point goes to its nearest center.
pub fn bootstrap_assignment(points: &[Document], centers: &[Document], metric: DistanceMetric) -> Result<Vec<usize>> {
    if points.len() < centers.len() {
        return Err(ClusterError::InvalidArgument(format!(
            "{} points cannot fill {} clusters", points.len(), centers.len()
        )));
    }
    let mut assignment: Vec<Option<usize>> = vec![None; points.len()];
    for (cluster, center) in centers.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for (i, point) in points.iter().enumerate() {
            if assignment[i].is_some() {
                continue;
            }
            let d = metric.distance(point, center)?;
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((i, d));
            }
        }
        if let Some((i, _)) = best {
            assignment[i] = Some(cluster);
        }
    }
    points.par_iter()
        .zip(assignment.par_iter())
        .map(|(point, claimed)| match claimed {
            Some(cluster) => Ok(*cluster),
            None => metric.nearest(point, centers).map(|(cluster, _)| cluster)
        })
        .collect()
}

/// Count members per cluster id
pub fn count_members(assignment: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0; k];
    assignment.iter().for_each(|c| counts[*c] += 1);
    counts
}

/// Give every emptied cluster back the former member closest to its center
///
/// Concurrent workers only see private cardinalities, so together they can
/// move out every member of a cluster. Returns the number of restored points.
pub fn repair_empty_clusters(
    phase: &AssignmentPhase<'_>,
    previous: &[usize],
    assignment: &mut [usize],
) -> Result<usize> {
    let k = phase.centers.len();
    let mut restored = 0;
    // each pass restores one point per empty cluster; k passes always suffice
    for _ in 0..k {
        let mut counts = count_members(assignment, k);
        let empty: Vec<usize> = (0..k).filter(|c| counts[*c] == 0).collect();
        if empty.is_empty() {
            break;
        }
        let mut progress = false;
        for cluster in empty {
            let mut best: Option<(usize, f64)> = None;
            for (i, prev) in previous.iter().enumerate() {
                if *prev != cluster || counts[assignment[i]] <= 1 {
                    continue;
                }
                let d = phase.metric.distance(&phase.points[i], &phase.centers[cluster])?;
                if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((i, d));
                }
            }
            if let Some((i, _)) = best {
                tracing::warn!(cluster, point = i, "restoring member of emptied cluster");
                counts[assignment[i]] -= 1;
                counts[cluster] += 1;
                assignment[i] = cluster;
                restored += 1;
                progress = true;
            }
        }
        if !progress {
            break;
        }
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(values: &[f64]) -> Vec<Document> {
        values.iter().map(|v| Document::from_dense(&[*v])).collect()
    }

    fn phase<'a>(points: &'a [Document], centers: &'a [Document], counts: &'a [usize]) -> AssignmentPhase<'a> {
        AssignmentPhase {
            points,
            centers,
            metric: DistanceMetric::L2Squared,
            cardinalities: counts,
            movable: None,
            project_on_empty: false,
        }
    }

    #[test]
    fn bootstrap_fills_every_cluster() {
        let points = line(&[0.0, 0.1, 0.2, 10.0]);
        // both centers are nearest to point 0
        let centers = line(&[0.0, 0.05]);
        let assignment = bootstrap_assignment(&points, &centers, DistanceMetric::L2).unwrap();
        assert_eq!(assignment[0], 0);
        assert_eq!(assignment[1], 1);
        assert_eq!(count_members(&assignment, 2).iter().filter(|c| **c == 0).count(), 0);
        assert!(bootstrap_assignment(&points[..1], &centers, DistanceMetric::L2).is_err());
    }

    #[test]
    fn moves_to_nearest_but_keeps_last_member() {
        let points = line(&[0.0, 1.0, 9.0, 10.0]);
        let centers = line(&[0.5, 9.5, 100.0]);
        let mut assignment = vec![1, 0, 1, 2];
        let counts = count_members(&assignment, 3);
        let pool = WorkerPool::new(1).unwrap();
        let moved = pool.assign(&phase(&points, &centers, &counts), &mut assignment).unwrap();
        // point 3 is alone in cluster 2 and stays
        assert_eq!(assignment, vec![0, 0, 1, 2]);
        assert_eq!(moved, 1);
    }

    #[test]
    fn project_on_empty_lets_clusters_drain() {
        let points = line(&[0.0, 10.0]);
        let centers = line(&[0.0, 10.0, 100.0]);
        let mut assignment = vec![0, 2];
        let counts = count_members(&assignment, 3);
        let mut p = phase(&points, &centers, &counts);
        p.project_on_empty = true;
        WorkerPool::new(2).unwrap().assign(&p, &mut assignment).unwrap();
        assert_eq!(assignment, vec![0, 1]);
    }

    #[test]
    fn movable_subset_freezes_other_clusters() {
        let points = line(&[0.0, 1.0, 10.0, 11.0]);
        let centers = line(&[0.0, 10.0, 1.0]);
        let mut assignment = vec![1, 1, 1, 0];
        let counts = count_members(&assignment, 3);
        let movable: BTreeSet<usize> = [0, 1].into_iter().collect();
        let mut p = phase(&points, &centers, &counts);
        p.movable = Some(&movable);
        WorkerPool::new(1).unwrap().assign(&p, &mut assignment).unwrap();
        // cluster 2 is closest to point 1 but not movable
        assert_eq!(assignment, vec![0, 0, 1, 1]);
    }

    #[test]
    fn threads_agree_on_separated_data() {
        let values: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { i as f64 * 0.01 } else { 50.0 + i as f64 * 0.01 }).collect();
        let points = line(&values);
        let centers = line(&[0.0, 50.0]);
        let start: Vec<usize> = (0..40).map(|i| (i / 2) % 2).collect();
        let counts = count_members(&start, 2);
        let mut one = start.clone();
        let mut four = start.clone();
        WorkerPool::new(1).unwrap().assign(&phase(&points, &centers, &counts), &mut one).unwrap();
        WorkerPool::new(4).unwrap().assign(&phase(&points, &centers, &counts), &mut four).unwrap();
        assert_eq!(one, four);
    }

    #[test]
    fn repair_restores_emptied_cluster() {
        let points = line(&[0.0, 1.0, 5.0]);
        let centers = line(&[0.0, 4.0]);
        let previous = vec![0, 1, 1];
        let mut assignment = vec![0, 0, 0];
        let counts = count_members(&previous, 2);
        let restored = repair_empty_clusters(&phase(&points, &centers, &counts), &previous, &mut assignment).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(assignment, vec![0, 0, 1]);
    }

    #[test]
    fn repair_never_empties_the_donor() {
        let points = line(&[0.0, 1.0, 2.0, 3.0]);
        let centers = line(&[0.0, 1.0, 2.0, 3.0]);
        // clusters 2 and 3 both want their former members back from cluster 0
        let previous = vec![2, 3, 1, 1];
        let mut assignment = vec![0, 0, 1, 1];
        let counts = count_members(&previous, 4);
        let restored = repair_empty_clusters(&phase(&points, &centers, &counts), &previous, &mut assignment).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(assignment, vec![2, 0, 1, 1]);
        assert_eq!(count_members(&assignment, 4), vec![1, 2, 1, 0]);
    }
}
