//! atoll — island-model symbolic regression over tabular data.
//!
//! ```sh
//! atoll --data data/F1.data
//! atoll --data data/F1.data --config search.cfg --log-dir logs/run1
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use atoll::DataSet;
use atoll_expr::TreeParams;
use atoll_search::{Coordinator, Problem, SearchConfig, SearchKind};

/// Every fourth data point is held out as the test set.
const TEST_STRIDE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "atoll", about = "Symbolic regression via cooperating island populations")]
struct Args {
    /// Data file to analyze (header row, whitespace-separated floats).
    #[arg(long)]
    data: PathBuf,

    /// Optional KEY VALUE configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for per-island log files.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Absolute-error threshold for hit counting.
    #[arg(long, default_value_t = 0.01)]
    hit_ratio: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("atoll: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            SearchConfig::parse(&text)?
        }
        None => SearchConfig::default(),
    };

    let full = DataSet::read(&args.data)?;
    info!(
        points = full.num_points(),
        dims = full.dims(),
        target = %full.depnd_names()[0],
        "loaded {}",
        args.data.display()
    );
    let (train, test) = full.split_holdout(TEST_STRIDE);

    let prob = Problem::new(
        vec![train],
        vec![test],
        SearchKind::Benchmark,
        args.hit_ratio,
        TreeParams::default(),
    );

    let mut coordinator = Coordinator::new(cfg, prob, &args.log_dir)?;
    let finals = coordinator.run()?;

    println!("final front (size, test error, hits, expression):");
    for r in finals.iter().flatten() {
        println!(
            "{:>4}  {:>12.6}  {:>4}  {}",
            r.size, r.test_err, r.test_hits, r.expr
        );
    }
    info!(gen = coordinator.generation(), "done");
    Ok(())
}
