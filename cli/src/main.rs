//! Sparse document clustering from the command line
//! Loads points, runs the K-Means family engine (optionally polished by
//! steepest descent) and writes labels, centers and cluster statistics.

use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use kmeans::{
    CenterUpdate, ClustererConfig, ClusteringState, DistanceMetric, Document, Evaluator, KMeansClusterer,
    SteepestDescentClusterer, Termination,
};
use kmeans_eval::{AdjustedRandIndex, GroundTruth, HungarianMismatch, KnnConnectivity, NeighborhoodEntropy, cluster_scores};
use loading::{load_config, load_documents};
use output::{write_centers, write_labels, write_stats};
use stats::ClusterStatistic;
use tokio::fs;
use tracing_subscriber::{EnvFilter, fmt};

mod loading;
mod output;
mod stats;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input points: `.json` array or one `index:value ...` line per point
    #[arg(long)]
    pub data: PathBuf,
    /// Number of clusters
    #[arg(long)]
    pub k: usize,
    /// Output directory for labels, centers and statistics
    #[arg(long)]
    pub outdir: PathBuf,
    /// Vector dimension (default: largest index seen + 1)
    #[arg(long)]
    pub dimension: Option<usize>,
    /// JSON clusterer configuration; command-line options override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Distance metric: L1, L2, L2Squared or Density (default: L2Squared)
    #[arg(long)]
    pub metric: Option<String>,
    /// Center update: mean, median or medoid (default: mean)
    #[arg(long)]
    pub update: Option<String>,
    /// Maximum number of iterations (default: 25)
    #[arg(long)]
    pub max_iter: Option<usize>,
    /// Stop as soon as the objective stops improving instead of after max-iter
    #[arg(long)]
    pub until_converged: bool,
    /// Worker threads of the assignment phase (default: 1)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Random seed for center seeding (default: 0)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Compaction threshold as a multiple of the mean cluster radius
    #[arg(long)]
    pub compaction: Option<f64>,
    /// Allow clusters to become empty
    #[arg(long)]
    pub project_on_empty: bool,
    /// Polish the result with steepest-descent relocations
    #[arg(long)]
    pub refine: bool,
    /// Ground-truth label file for ARI and Hungarian mismatch reporting
    #[arg(long)]
    pub truth: Option<PathBuf>,
    /// Neighbors considered by the entropy and KNN-connectivity scores
    #[arg(long)]
    pub knn_depth: Option<usize>,
    /// -v info, -vv debug
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_update(name: &str) -> Result<CenterUpdate, Box<dyn Error>> {
    match name.to_lowercase().as_str() {
        "mean" | "kmeans" => Ok(CenterUpdate::Mean),
        "median" | "kmedian" => Ok(CenterUpdate::Median),
        "medoid" | "pmedian" => Ok(CenterUpdate::Medoid),
        other => Err(format!("unknown center update '{other}'").into())
    }
}

async fn build_config(args: &Args) -> Result<ClustererConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path).await?,
        None => ClustererConfig::default()
    };
    let metric = match &args.metric {
        Some(name) => name.parse::<DistanceMetric>()?,
        None => config.metric.unwrap_or(DistanceMetric::L2Squared)
    };
    config = config.with_metric(metric);
    if let Some(update) = &args.update {
        config = config.with_center_update(parse_update(update)?);
    }
    if args.until_converged {
        config = config.with_termination(Termination::no_improvement(metric));
    } else if args.max_iter.is_some() || config.termination.is_none() {
        config = config.with_termination(Termination::fixed_iterations(args.max_iter.unwrap_or(25)));
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(threshold) = args.compaction {
        config = config.with_compaction(threshold);
    }
    if args.project_on_empty {
        config = config.with_project_on_empty(true);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = build_config(&args).await?;
    let metric = config.metric()?;
    let points = load_documents(&args.data, args.dimension).await?;
    tracing::info!(points = points.len(), k = args.k, ?metric, "loaded data");

    if !args.outdir.exists() {
        fs::create_dir_all(&args.outdir).await?;
        tracing::info!(outdir = %args.outdir.display(), "output directory created");
    }

    let mut engine = KMeansClusterer::new(config);
    engine.add_points(points);
    engine.seed_centers_plus_plus(args.k)?;
    let summary = engine.run_with_summary()?;
    println!(
        "iterations: {} | incumbent: {} | objective: {} | compacted: {} | {:?}",
        summary.iterations, summary.incumbent_iteration, summary.objective, summary.compacted, summary.elapsed
    );

    let (centers, assignment) = if args.refine {
        let mut refiner = SteepestDescentClusterer::from_clusterer(&engine)?;
        let moves = refiner.run()?;
        println!("refinement moves: {} | objective: {}", moves, refiner.objective()?);
        (refiner.centers().to_vec(), refiner.assignment().to_vec())
    } else {
        let assignment = engine.assignment().ok_or("run finished without an assignment")?.to_vec();
        (engine.centers().to_vec(), assignment)
    };

    let state = reporting_state(&engine, &centers, &assignment);
    report_scores(&args, metric, engine.points(), &state).await?;

    let total = assignment.len();
    let stats: Vec<ClusterStatistic> = cluster_scores(&state, metric)?
        .iter()
        .map(|score| ClusterStatistic::new(score, total))
        .collect();
    tracing::debug!(?stats, "cluster statistics");

    write_labels(&args.outdir.join("labels.txt"), &assignment).await?;
    write_centers(&args.outdir.join("centers.txt"), &centers).await?;
    write_stats(&args.outdir.join("stats.csv"), &stats).await?;
    Ok(())
}

/// Final clustering as scored for reporting, weighted like the run
fn reporting_state<'a>(
    engine: &'a KMeansClusterer,
    centers: &'a [Document],
    assignment: &'a [usize],
) -> ClusteringState<'a> {
    ClusteringState::new(engine.points(), centers, assignment).with_weights(engine.config().weights.as_deref())
}

/// Print internal scores and, with `--truth`, scores against ground truth
async fn report_scores(
    args: &Args,
    metric: DistanceMetric,
    points: &[Document],
    state: &ClusteringState<'_>,
) -> Result<(), Box<dyn Error>> {
    if let Some(depth) = args.knn_depth {
        let mut entropy = NeighborhoodEntropy::new(metric, depth);
        entropy.set_master_point_set(points)?;
        let mut knn = KnnConnectivity::new(metric, depth);
        knn.set_master_point_set(points)?;
        println!("entropy: {} | knn connectivity: {}", entropy.evaluate(state)?, knn.evaluate(state)?);
    }
    if let Some(path) = &args.truth {
        let truth = GroundTruth::load(path).await?;
        let evaluators: Vec<(&str, Arc<dyn Evaluator>)> = vec![
            ("adjusted rand index", Arc::new(AdjustedRandIndex::new(truth.clone()))),
            ("hungarian mismatch", Arc::new(HungarianMismatch::new(truth))),
        ];
        for (name, evaluator) in evaluators {
            match evaluator.evaluate(state) {
                Ok(score) => println!("{name}: {score}"),
                Err(e) => tracing::warn!(error = %e, "{name} unavailable"),
            }
        }
    }
    Ok(())
}


// Example command line usage:
//cargo run --release -p cluster_cli -- --data ./data/points.txt --k 20 --outdir ./out --threads 4 --refine -v
