use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use driftclip::capture::controller::{CaptureController, ControllerOpts, SessionOutcome};
use driftclip::capture::encoder::FfmpegEncoder;
use driftclip::render::frame::CpuSurfaceProvider;

#[derive(Parser, Debug)]
#[command(name = "driftclip", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate ambient clips as MP4 files (requires `ffmpeg` on PATH).
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Output directory for exported clips.
    #[arg(long)]
    out: PathBuf,

    /// Number of clips to generate, one session at a time.
    #[arg(long, default_value_t = 1)]
    clips: u32,

    /// Stop each recording early after this many milliseconds.
    #[arg(long)]
    stop_after_ms: Option<u64>,

    /// Base noise seed; each clip derives its own.
    #[arg(long)]
    seed: Option<u64>,
}

/// Tick step of the simulated cooperative clock. Finer than one frame at
/// 60 fps, so no frame deadline is ever more than one tick late.
const TICK_STEP_MS: u64 = 16;

#[derive(serde::Serialize)]
struct ManifestEntry {
    id: String,
    file: String,
    created_at_ms: u64,
    bytes: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
    }
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let mut opts = ControllerOpts::default();
    if let Some(seed) = args.seed {
        opts.seed = seed;
    }
    let duration_ms = opts.duration_ms;

    let mut controller = CaptureController::new(
        opts,
        Box::new(FfmpegEncoder::new()),
        Box::new(CpuSurfaceProvider),
    );

    let mut now_ms: u64 = 0;
    let mut manifest = Vec::new();

    for _ in 0..args.clips {
        if !controller.request_generate(now_ms) {
            anyhow::bail!(
                "generation failed to start: {}",
                controller.last_error().unwrap_or("unknown error")
            );
        }
        let started_at = now_ms;

        while controller.is_active() {
            now_ms += TICK_STEP_MS;
            if let Some(stop_after) = args.stop_after_ms
                && now_ms - started_at >= stop_after
            {
                controller.stop();
            }
            controller.tick(now_ms);

            // The duration timer bounds every session; well past it, something
            // is wrong with the encoder's stop acknowledgment.
            if now_ms - started_at > duration_ms.saturating_mul(4) {
                anyhow::bail!("capture session did not finalize in time");
            }
        }

        match controller.last_outcome() {
            Some(SessionOutcome::Finalized) => {}
            _ => anyhow::bail!(
                "capture session failed: {}",
                controller.last_error().unwrap_or("unknown error")
            ),
        }

        let item = controller
            .gallery()
            .front()
            .context("finalized session produced no gallery item (bug)")?;
        let path = args.out.join(item.export_filename());
        std::fs::write(&path, &item.artifact.bytes)
            .with_context(|| format!("write clip '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());

        manifest.push(ManifestEntry {
            id: item.id.clone(),
            file: item.export_filename(),
            created_at_ms: item.created_at_ms,
            bytes: item.artifact.bytes.len(),
        });

        // Space the next session's timestamps out past this one.
        now_ms += TICK_STEP_MS;
    }

    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}
