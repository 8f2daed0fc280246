//! fwdtrack CLI: run the forward track finder on JSON hit files.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fwdtrack::{
    layer_planes, CriterionObserver, CriterionRegistry, CriterionValueRecorder, EventSummary,
    Hit, HitPopulation, LineFitter, LineFitterConfig, TrackSummary, Tracker, TrackerConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "fwdtrack")]
#[command(about = "Cellular-automaton track finding on layered detector hits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find, fit and extend tracks in one event.
    Find(CliFindArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,

    /// List the built-in criterion names.
    Criteria,
}

#[derive(Debug, Clone, Args)]
struct CliFindArgs {
    /// Path to the event hits (JSON).
    #[arg(long)]
    hits: PathBuf,

    /// Path to a tracker configuration (JSON); defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to hits used to extend fitted tracks (JSON).
    #[arg(long)]
    extension_hits: Option<PathBuf>,

    /// Path to write found tracks and diagnostics (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Path to write recorded criterion values (JSON).
    #[arg(long)]
    criteria_values: Option<PathBuf>,

    /// Override the number of finding iterations.
    #[arg(long)]
    iterations: Option<usize>,

    /// Override the number of phi slices.
    #[arg(long)]
    phi_slices: Option<usize>,

    /// Build seeds from truth labels instead of running the automaton.
    #[arg(long)]
    truth_seeding: bool,

    /// Momentum magnitude assigned by the straight-line fitter (GeV/c).
    #[arg(long, default_value = "1.0")]
    nominal_momentum: f64,

    /// Largest RMS hit distance for a converged line fit (cm).
    #[arg(long, default_value = "0.5")]
    max_rms: f64,
}

impl CliFindArgs {
    fn apply_overrides(&self, config: &mut TrackerConfig) {
        if let Some(n) = self.iterations {
            config.finder.n_iterations = n;
        }
        if let Some(n) = self.phi_slices {
            config.finder.n_phi_slices = n;
        }
        if self.truth_seeding {
            config.finder.truth_seeding = true;
        }
    }

    fn fitter_config(&self) -> LineFitterConfig {
        LineFitterConfig {
            nominal_momentum: self.nominal_momentum,
            max_rms: self.max_rms,
        }
    }
}

#[derive(serde::Deserialize)]
struct HitFile {
    hits: Vec<Hit>,
}

#[derive(serde::Serialize)]
struct FindOutput {
    tracks: Vec<TrackSummary>,
    residual_hit_ids: Vec<u32>,
    diagnostics: EventSummary,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Find(args) => run_find(&args),
        Commands::DefaultConfig => run_default_config(),
        Commands::Criteria => run_criteria(),
    }
}

fn parse_hits(data: &str) -> CliResult<HitPopulation> {
    let file: HitFile = serde_json::from_str(data)?;
    Ok(HitPopulation::from_hits(file.hits))
}

fn load_hits(path: &Path) -> CliResult<HitPopulation> {
    let data = std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read hits {}: {}", path.display(), e).into()
    })?;
    let population = parse_hits(&data)?;
    tracing::info!("Loaded {} hits from {}", population.len(), path.display());
    Ok(population)
}

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&TrackerConfig::default())?);
    Ok(())
}

fn run_criteria() -> CliResult<()> {
    let registry = CriterionRegistry::default();
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}

fn run_find(args: &CliFindArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)?,
        None => TrackerConfig::default(),
    };
    args.apply_overrides(&mut config);

    let mut tracker = Tracker::from_config(config)?;
    let recorder = args
        .criteria_values
        .as_ref()
        .map(|_| Arc::new(CriterionValueRecorder::default()));
    if let Some(recorder) = &recorder {
        let observer: Arc<dyn CriterionObserver> = recorder.clone();
        tracker.set_observer(Some(observer));
    }

    let population = load_hits(&args.hits)?;
    let extension = args
        .extension_hits
        .as_deref()
        .map(load_hits)
        .transpose()?;

    let mut fitter = LineFitter::new(args.fitter_config());
    if let Some(extra) = &extension {
        fitter = fitter.with_planes(layer_planes(extra));
    }

    let mut summary = EventSummary::default();
    let result = tracker.process_event(population, extension.as_ref(), &mut fitter, &mut summary);
    tracing::info!(
        "Found {} tracks, {} hits left over",
        result.tracks.len(),
        result.residual.len(),
    );

    let output = FindOutput {
        tracks: result.summaries(),
        residual_hit_ids: result.residual.iter().map(|h| h.id).collect(),
        diagnostics: summary,
    };
    std::fs::write(&args.out, serde_json::to_string_pretty(&output)?)?;
    tracing::info!("Results written to {}", args.out.display());

    if let (Some(path), Some(recorder)) = (&args.criteria_values, &recorder) {
        std::fs::write(path, serde_json::to_string_pretty(&recorder.snapshot())?)?;
        tracing::info!("Criterion values written to {}", path.display());
    }

    Ok(())
}
