use std::fmt;

use kmeans_eval::ClusterScore;

#[derive(Clone)]
pub struct ClusterStatistic {
    pub cluster_id: usize,
    pub size: usize,
    pub size_rate: f64,
    pub mean_distance: f64,
    pub sigma: f64,
}

impl ClusterStatistic {
    pub fn new(score: &ClusterScore, total: usize) -> Self {
        Self {
            cluster_id: score.cluster,
            size: score.size,
            size_rate: if total == 0 { 0.0 } else { score.size as f64 / total as f64 },
            mean_distance: score.mean_distance,
            sigma: score.sigma,
        }
    }

    pub fn csv_header() -> &'static str {
        "cluster_id;size;size_rate;mean_distance;sigma"
    }

    pub fn to_csv_info(&self) -> String {
        format!("{};{};{};{};{}", self.cluster_id, self.size, self.size_rate, self.mean_distance, self.sigma)
    }
}

impl fmt::Debug for ClusterStatistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\nClusterStatistic {{\n")?;
        write!(f, "\t{}: {},\n", "cluster_id", self.cluster_id)?;
        write!(f, "\t{}: {},\n", "size", self.size)?;
        write!(f, "\t{}: {:.4},\n", "size_rate", self.size_rate)?;
        write!(f, "\t{}: {:.6},\n", "mean_distance", self.mean_distance)?;
        write!(f, "\t{}: {:.6},\n", "sigma", self.sigma)?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_line() {
        let score = ClusterScore { cluster: 2, size: 5, mean_distance: 1.5, sigma: 0.5, point_scores: Vec::new() };
        let stat = ClusterStatistic::new(&score, 20);
        assert_eq!(stat.to_csv_info(), "2;5;0.25;1.5;0.5");
        assert_eq!(ClusterStatistic::csv_header().split(';').count(), 5);
    }
}
