//! Result files: labels, centers and per-cluster statistics

use std::path::Path;

use kmeans::{Document, Result, labels::format_labels};
use tokio::{fs::File, io::{AsyncWriteExt, BufWriter}};

use crate::stats::ClusterStatistic;

pub async fn write_labels(path: &Path, assignment: &[usize]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path).await?);
    writer.write_all(format_labels(assignment).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// One center per line in `index:value` form
pub async fn write_centers(path: &Path, centers: &[Document]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path).await?);
    for center in centers {
        writer.write_all(center.to_line().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

pub async fn write_stats(path: &Path, stats: &[ClusterStatistic]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path).await?);
    writer.write_all(ClusterStatistic::csv_header().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    for stat in stats {
        writer.write_all(stat.to_csv_info().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}
