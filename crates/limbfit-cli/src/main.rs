//! limbfit CLI: project noisy skeletal keypoint chains onto known bone lengths.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use limbfit::{
    Chain, ChainProjector, LimbLengths, ProjectorConfig, SegmentLengths, SkeletonFrame,
    SkeletonProjector,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "limbfit")]
#[command(about = "Bone-length preserving correction of 3D keypoint chains")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a single chain onto its target segment lengths.
    Project {
        /// Input JSON: {"keypoints": [{"tag", "position"}...], "lengths": [...]}.
        #[arg(long)]
        input: PathBuf,

        /// Path to write the projection (JSON).
        #[arg(long)]
        out: PathBuf,

        /// Optional projector configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Correct every standard limb of a frame using lengths measured on a reference frame.
    Skeleton {
        /// Reference frame JSON with trusted bone lengths.
        #[arg(long)]
        reference: PathBuf,

        /// Observed frame JSON to correct.
        #[arg(long)]
        frame: PathBuf,

        /// Path to write the corrected frame and per-limb reports (JSON).
        #[arg(long)]
        out: PathBuf,

        /// Optional projector configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default projector configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Deserialize)]
struct ChainInput {
    keypoints: Chain,
    lengths: SegmentLengths,
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
        Commands::Project { input, out, config } => run_project(&input, &out, config.as_deref()),
        Commands::Skeleton {
            reference,
            frame,
            out,
            config,
        } => run_skeleton(&reference, &frame, &out, config.as_deref()),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<ProjectorConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading projector config from {}", p.display());
            ProjectorConfig::from_json_file(p)
        }
        None => Ok(ProjectorConfig::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("invalid JSON in {}: {e}", path.display()).into())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

// ── project ────────────────────────────────────────────────────────────

fn run_project(input: &Path, out: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let doc: ChainInput = read_json(input)?;
    tracing::info!(
        "Loaded chain '{}' with {} segments",
        doc.keypoints.root().tag,
        doc.keypoints.segment_count()
    );

    let projector = ChainProjector::new(config);
    let result = projector.project(&doc.keypoints, &doc.lengths)?;

    tracing::info!(
        "status={:?} iterations={} max_violation={:.3e} elapsed={:.2}ms",
        result.status,
        result.iterations,
        result.max_constraint_violation,
        result.elapsed_ms
    );

    write_json(out, &result)?;
    tracing::info!("Results written to {}", out.display());
    Ok(())
}

// ── skeleton ───────────────────────────────────────────────────────────

fn run_skeleton(reference: &Path, frame: &Path, out: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let reference: SkeletonFrame = read_json(reference)?;
    let frame: SkeletonFrame = read_json(frame)?;

    let lengths = LimbLengths::from_reference(&reference);
    let limbs: Vec<_> = lengths.limbs().collect();
    tracing::info!("Reference frame provides lengths for {:?}", limbs);

    let projector = SkeletonProjector::new(ChainProjector::new(config), lengths);
    let result = projector.project_frame(&frame);

    for report in &result.limbs {
        tracing::info!("{:?}: {:?}", report.limb, report.outcome);
    }

    write_json(out, &result)?;
    tracing::info!("Results written to {}", out.display());
    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&ProjectorConfig::default())?
    );
    Ok(())
}
