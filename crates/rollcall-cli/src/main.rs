use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{FaceBox, FaceLandmarks, LivenessConfig, Verdict};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status when the final frame is judged not live.
const EXIT_NOT_LIVE: u8 = 2;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face liveness checks for attendance check-in")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one liveness session over a sequence of frames
    Check {
        /// Frame images, in capture order
        #[arg(required = true)]
        frames: Vec<PathBuf>,
        /// JSON array with one {face_box, landmarks} entry per frame
        #[arg(short, long)]
        annotations: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        /// Print one JSON verdict per line
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Use the strict operating point
    #[arg(long)]
    strict: bool,
}

impl ConfigArgs {
    /// File (or defaults), then ROLLCALL_* environment, then flags.
    fn resolve(&self) -> Result<LivenessConfig> {
        let mut config = match &self.config {
            Some(path) => LivenessConfig::load(path)?,
            None => LivenessConfig::default(),
        };
        config.apply_env();
        if self.strict {
            config.strict_mode = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Per-frame face annotation, as produced by an upstream detector.
#[derive(Debug, Deserialize)]
struct FrameAnnotation {
    face_box: FaceBox,
    #[serde(default)]
    landmarks: FaceLandmarks,
}

fn read_annotations(path: &Path) -> Result<Vec<FrameAnnotation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading annotations {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing annotations {}", path.display()))
}

fn print_verdict(frame: &Path, verdict: &Verdict, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(verdict)?);
        return Ok(());
    }
    println!(
        "{}: {} ({:.0}%){}",
        frame.display(),
        if verdict.is_live { "LIVE" } else { "NOT LIVE" },
        verdict.confidence * 100.0,
        if verdict.degraded { " [degraded]" } else { "" }
    );
    println!("  {}", verdict.explanation);
    for s in &verdict.signals {
        println!(
            "  {:<10} {:<4} score={:.3} weight={:.2}{}{}",
            s.name(),
            if s.passed { "pass" } else { "FAIL" },
            s.score,
            s.weight,
            if s.critical { " critical" } else { "" },
            if s.available { "" } else { " (unavailable)" }
        );
    }
    Ok(())
}

async fn run_check(
    frames: Vec<PathBuf>,
    annotations: &Path,
    config: LivenessConfig,
    json: bool,
) -> Result<ExitCode> {
    let annotations = read_annotations(annotations)?;
    if annotations.len() != frames.len() {
        bail!(
            "{} frames but {} annotations; expected one annotation per frame",
            frames.len(),
            annotations.len()
        );
    }

    let engine = rollcall_engine::spawn_engine(config)?;
    let stream = engine.open_stream().await?;
    tracing::info!(stream = %stream, frames = frames.len(), "checking frame sequence");

    let mut last_live = true;
    for (path, annotation) in frames.iter().zip(annotations) {
        let frame = image::open(path)
            .with_context(|| format!("opening frame {}", path.display()))?
            .to_rgb8();
        let verdict = engine
            .check(stream, frame, annotation.landmarks, annotation.face_box)
            .await?;
        print_verdict(path, &verdict, json)?;
        last_live = verdict.is_live;
    }

    engine.close_stream(stream).await?;
    Ok(if last_live {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_LIVE)
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            frames,
            annotations,
            config,
            json,
        } => run_check(frames, &annotations, config.resolve()?, json).await,
        Commands::Config { config } => {
            print!("{}", toml::to_string(&config.resolve()?)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
