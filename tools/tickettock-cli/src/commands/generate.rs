//! Render a ticket image into a video clip.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tickettock_common::clock::{StartTime, TimeZoneSpec};
use tickettock_common::config::GenerationDefaults;
use tickettock_common::error::{TicketTockError, TicketTockResult};
use tickettock_layout::LayoutSpec;
use tickettock_render_engine::{
    generate_video, render_preview_frame, CodecId, FontFallback, FontSource, PipelineConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Ticket image to animate
    image: PathBuf,

    /// Output file (default: ticket-<timestamp>.<ext> in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of frames
    #[arg(long)]
    frames: Option<u32>,

    /// Frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Video codec: h264, mpeg4, vp9
    #[arg(long)]
    codec: Option<String>,

    /// Codec to retry with when the first one is unavailable
    #[arg(long, conflicts_with = "no_fallback")]
    fallback_codec: Option<String>,

    /// Fail instead of retrying with a fallback codec
    #[arg(long)]
    no_fallback: bool,

    /// Clock start, e.g. 2024-01-01T00:00:00 (default: now)
    #[arg(long)]
    start: Option<String>,

    /// Clock zone: local, UTC, an offset like +05:30, or an IANA name like Europe/Paris
    #[arg(long)]
    timezone: Option<String>,

    /// Countdown start in seconds
    #[arg(long)]
    countdown: Option<u64>,

    /// Layout JSON file (see `tickettock layout`)
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Font file for overlay text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Font size in pixels
    #[arg(long)]
    font_size: Option<f32>,

    /// Abort after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Frame rendering threads
    #[arg(long)]
    threads: Option<usize>,

    /// Print failures as a JSON error report on stdout
    #[arg(long)]
    json_errors: bool,

    /// Render only this frame as a PNG instead of encoding a clip
    #[arg(long)]
    preview_frame: Option<u32>,

    /// Where to write the preview PNG
    #[arg(long, requires = "preview_frame")]
    preview_out: Option<PathBuf>,
}

pub async fn run(args: GenerateArgs, defaults: &GenerationDefaults) -> anyhow::Result<()> {
    let json_errors = args.json_errors;
    match execute(args, defaults).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let report = err.report();
            if json_errors {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                eprintln!("Generation failed: {}", report.message);
            }
            std::process::exit(report.kind.exit_code());
        }
    }
}

async fn execute(args: GenerateArgs, defaults: &GenerationDefaults) -> TicketTockResult<()> {
    let config = build_config(&args, defaults)?;

    let bytes = std::fs::read(&args.image).map_err(|e| {
        TicketTockError::input_decode(format!("failed to read {}: {e}", args.image.display()))
    })?;

    if let Some(index) = args.preview_frame {
        let out = args
            .preview_out
            .unwrap_or_else(|| PathBuf::from(format!("preview-{index}.png")));
        let written = render_preview_frame(&bytes, &config, index, out)?;
        println!("Preview frame {index}: {}", written.display());
        return Ok(());
    }

    println!("Generating from: {}", args.image.display());
    println!("  Frames: {} @ {} fps", config.frame_count, config.frame_rate);
    println!("  Codec:  {}", config.codec);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling generation");
            on_interrupt.cancel();
        }
    });

    let generated = generate_video(bytes, config, cancel).await?;
    let report = generated.report;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(generated.video.suggested_filename()));
    let content_type = generated.video.content_type();
    let duration_secs = generated.video.duration_secs();
    let written = generated.video.persist_to(&output)?;

    println!(
        "Generated: {} ({content_type}, {duration_secs:.0}s)",
        written.display()
    );
    println!(
        "  {}x{}, {} frames @ {} fps, {}{}",
        report.width,
        report.height,
        report.frames,
        report.frame_rate,
        report.codec,
        if report.fallback_used {
            " (fallback)"
        } else {
            ""
        }
    );
    if (report.encoded_width, report.encoded_height) != (report.width, report.height) {
        println!(
            "  padded to {}x{} for yuv420p",
            report.encoded_width, report.encoded_height
        );
    }
    println!(
        "  render {} ms, encode {} ms",
        report.render_ms, report.encode_ms
    );
    tracing::debug!(report = ?report, "Generation report");

    Ok(())
}

/// Persisted defaults overridden by flags.
fn build_config(
    args: &GenerateArgs,
    defaults: &GenerationDefaults,
) -> TicketTockResult<PipelineConfig> {
    let mut config = PipelineConfig::from_defaults(defaults)?;

    if let Some(frames) = args.frames {
        config.frame_count = frames;
    }
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    if let Some(codec) = &args.codec {
        config.codec = codec.parse::<CodecId>()?;
    }
    if let Some(fallback) = &args.fallback_codec {
        config.fallback_codec = Some(fallback.parse::<CodecId>()?);
    }
    if args.no_fallback {
        config.fallback_codec = None;
    }
    if let Some(start) = &args.start {
        config.start = StartTime::parse(start)?;
    }
    if let Some(zone) = &args.timezone {
        config.timezone = zone.parse::<TimeZoneSpec>()?;
    }
    if let Some(countdown) = args.countdown {
        config.countdown_total_secs = countdown;
    }
    if let Some(path) = &args.layout {
        config.layout = LayoutSpec::from_json_file(path)
            .map_err(|e| TicketTockError::configuration(e.to_string()))?;
    }
    if let Some(font) = &args.font {
        // an explicit font on the command line must load
        config.font = FontSource::File(font.clone());
        config.font_fallback = FontFallback::Fail;
    }
    if let Some(size) = args.font_size {
        config.font_size_px = size;
    }
    if let Some(secs) = args.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(threads) = args.threads {
        config.render_threads = Some(threads);
    }

    config.validate()?;
    Ok(config)
}
