use anyhow::Context;
use clap::Parser;
use mt_data::{JsonFileSink, MemorySink};
use mt_engine::{run_threaded, CoordinatorIo, GridSearchEngine, RunConfig};
use mt_types::ResultSink;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mt-grid-search", about = "Distributed moment-tensor grid search")]
struct Cli {
    /// JSON run configuration.
    #[arg(env = "MTGRID_CONFIG")]
    config: PathBuf,
    /// Number of ranks; defaults to the configuration, then the available parallelism.
    #[arg(long, short, env = "MTGRID_WORKERS")]
    workers: Option<usize>,
}

fn worker_count(cli: Option<usize>, config: &RunConfig) -> usize {
    cli.or(config.workers).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RunConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;
    let workers = worker_count(cli.workers, &config);

    let engine = GridSearchEngine::new(config.search_config(workers), config.misfits()?);
    let weights = config.load_weights()?;
    let picks = config.load_picks()?;
    let processors = config.processors(weights.as_ref(), picks.as_ref());
    let reader = config.reader();
    let greens = config.greens_provider();

    let mut file_sink;
    let mut memory_sink = MemorySink::new();
    let sink: &mut dyn ResultSink = match &config.output_path {
        Some(path) => {
            file_sink = JsonFileSink::new(path);
            if config.summary_only {
                file_sink = file_sink.summary_only();
            }
            &mut file_sink
        }
        None => &mut memory_sink,
    };

    let outcome = run_threaded(
        &engine,
        workers,
        CoordinatorIo {
            reader: reader.as_ref(),
            processors: &processors,
            greens: greens.as_ref(),
            sink,
            inputs: config.inputs(weights),
        },
    )?;
    let best = &outcome.best;

    info!(
        "Best source for {}: strike {:.1} dip {:.1} rake {:.1} v {:.4} w {:.4} Mw {:.2}",
        best.event_id,
        best.source.strike,
        best.source.dip,
        best.source.rake,
        best.source.v,
        best.source.w,
        best.source.magnitude
    );
    info!(
        "Evaluated {} points on {} workers in {:.3}s",
        outcome.status.points_evaluated,
        outcome.status.workers,
        outcome.status.elapsed_seconds().unwrap_or(0.0)
    );
    if config.output_path.is_none() {
        println!("{}", serde_json::to_string_pretty(best)?);
    }
    Ok(())
}
