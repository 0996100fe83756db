//! End-to-end generation: decode, render, encode.
//!
//! The pipeline is stateless. Everything a request needs travels in an
//! explicit [`PipelineConfig`], and all configuration problems surface
//! before the first frame is rendered.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::Serialize;
use tickettock_common::clock::{StartTime, TimeZoneSpec};
use tickettock_common::config::GenerationDefaults;
use tickettock_common::error::{TicketTockError, TicketTockResult};
use tickettock_layout::{LayoutError, LayoutSpec};
use tokio_util::sync::CancellationToken;

use crate::base::BaseImage;
use crate::compositor::{FrameCompositor, FrameSequence, RenderedFrame};
use crate::decoration::LoadedDecoration;
use crate::encoder::{encode, CodecId, EncodedVideo};
use crate::fonts::{resolve_font, FontFallback, FontSource};

/// Everything needed to turn one image into one clip.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frame_count: u32,
    pub frame_rate: u32,
    pub codec: CodecId,
    /// Retried once when `codec` has no encoder on this host.
    pub fallback_codec: Option<CodecId>,
    pub start: StartTime,
    pub timezone: TimeZoneSpec,
    pub countdown_total_secs: u64,
    pub layout: LayoutSpec,
    pub font: FontSource,
    pub font_fallback: FontFallback,
    pub font_size_px: f32,
    /// `None` uses all available cores.
    pub render_threads: Option<usize>,
    /// Deadline for the whole request (async entry point only).
    pub timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_count: 60,
            frame_rate: 1,
            codec: CodecId::H264,
            fallback_codec: Some(CodecId::Mpeg4),
            start: StartTime::Now,
            timezone: TimeZoneSpec::Local,
            countdown_total_secs: 3600,
            layout: LayoutSpec::default(),
            font: FontSource::Builtin,
            font_fallback: FontFallback::Builtin,
            font_size_px: 24.0,
            render_threads: None,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl PipelineConfig {
    pub const MAX_FRAMES: u32 = 600;
    pub const MAX_FRAME_RATE: u32 = 60;

    /// Build from persisted defaults. The layout starts as the default
    /// layout.
    pub fn from_defaults(defaults: &GenerationDefaults) -> TicketTockResult<Self> {
        let fallback_codec = defaults
            .fallback_codec
            .as_deref()
            .map(str::parse::<CodecId>)
            .transpose()?;
        Ok(Self {
            frame_count: defaults.frame_count,
            frame_rate: defaults.frame_rate,
            codec: defaults.codec.parse()?,
            fallback_codec,
            start: StartTime::Now,
            timezone: defaults.timezone,
            countdown_total_secs: defaults.countdown_total_secs,
            layout: LayoutSpec::default(),
            font: defaults
                .font_path
                .clone()
                .map(FontSource::File)
                .unwrap_or_default(),
            font_fallback: if defaults.allow_builtin_font {
                FontFallback::Builtin
            } else {
                FontFallback::Fail
            },
            font_size_px: defaults.font_size_px,
            render_threads: defaults.render_threads,
            timeout: defaults.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Check everything that does not depend on the image.
    pub fn validate(&self) -> TicketTockResult<()> {
        if !(1..=Self::MAX_FRAMES).contains(&self.frame_count) {
            return Err(TicketTockError::configuration(format!(
                "frame count must be between 1 and {}, got {}",
                Self::MAX_FRAMES,
                self.frame_count
            )));
        }
        if !(1..=Self::MAX_FRAME_RATE).contains(&self.frame_rate) {
            return Err(TicketTockError::configuration(format!(
                "frame rate must be between 1 and {}, got {}",
                Self::MAX_FRAME_RATE,
                self.frame_rate
            )));
        }
        if self.render_threads == Some(0) {
            return Err(TicketTockError::configuration(
                "render threads must be >= 1 when set",
            ));
        }
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(TicketTockError::configuration(format!(
                "font size must be positive, got {}",
                self.font_size_px
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(TicketTockError::configuration("timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Summary of one generation, logged and returned with the clip.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub frames: usize,
    /// Frame size, always the uploaded image's size.
    pub width: u32,
    pub height: u32,
    /// Video stream size; one larger than the frame on an odd axis.
    pub encoded_width: u32,
    pub encoded_height: u32,
    pub codec: CodecId,
    pub frame_rate: u32,
    pub start: NaiveDateTime,
    pub render_ms: u64,
    pub encode_ms: u64,
    pub fallback_used: bool,
}

/// A finished clip plus its report.
#[derive(Debug)]
pub struct GeneratedVideo {
    pub video: EncodedVideo,
    pub report: GenerationReport,
}

/// A decoded image with its layout, font, and decoration ready to render.
#[derive(Debug)]
pub struct PreparedRequest {
    base: BaseImage,
    compositor: FrameCompositor,
    frame_count: u32,
    render_threads: Option<usize>,
}

impl PreparedRequest {
    /// Validate `config`, decode `image_bytes`, and load every asset.
    pub fn new(image_bytes: &[u8], config: &PipelineConfig) -> TicketTockResult<Self> {
        config.validate()?;

        let base = BaseImage::decode(image_bytes)?;
        let layout = config
            .layout
            .resolve(base.width(), base.height())
            .map_err(layout_error)?;
        let font = resolve_font(&config.font, config.font_fallback, config.font_size_px)?;
        let decoration = layout
            .decoration
            .as_ref()
            .map(LoadedDecoration::load)
            .transpose()?;
        let start = config.start.resolve(config.timezone);
        let compositor = FrameCompositor::new(
            layout,
            font,
            decoration,
            start,
            config.countdown_total_secs,
        );
        compositor.check_text_fits(config.frame_count)?;

        tracing::debug!(
            width = base.width(),
            height = base.height(),
            start = %start,
            "Prepared generation request"
        );

        Ok(Self {
            compositor,
            base,
            frame_count: config.frame_count,
            render_threads: config.render_threads,
        })
    }

    pub fn base(&self) -> &BaseImage {
        &self.base
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Render the full sequence.
    pub fn render(&self, cancel: &CancellationToken) -> TicketTockResult<FrameSequence> {
        self.compositor
            .render_sequence(&self.base, self.frame_count, self.render_threads, cancel)
    }

    /// Render a single frame.
    pub fn render_frame(&self, index: u32) -> TicketTockResult<RenderedFrame> {
        if index >= self.frame_count {
            return Err(TicketTockError::configuration(format!(
                "frame {index} is outside a {}-frame clip",
                self.frame_count
            )));
        }
        self.compositor.render_frame(&self.base, index)
    }
}

fn layout_error(err: LayoutError) -> TicketTockError {
    TicketTockError::configuration(err.to_string())
}

/// Generate a clip on the current thread.
pub fn generate_video_blocking(
    image_bytes: &[u8],
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> TicketTockResult<GeneratedVideo> {
    let prepared = PreparedRequest::new(image_bytes, config)?;

    let render_started = Instant::now();
    let frames = prepared.render(cancel)?;
    let render_ms = render_started.elapsed().as_millis() as u64;

    let encode_started = Instant::now();
    let (video, fallback_used) = encode_with_fallback(config.codec, config.fallback_codec, |codec| {
        encode(frames.frames(), config.frame_rate, codec, cancel)
    })?;
    let encode_ms = encode_started.elapsed().as_millis() as u64;

    let (encoded_width, encoded_height) = video.encoded_dimensions();
    let report = GenerationReport {
        frames: video.frame_count(),
        width: video.width(),
        height: video.height(),
        encoded_width,
        encoded_height,
        codec: video.codec(),
        frame_rate: video.frame_rate(),
        start: prepared.compositor().start(),
        render_ms,
        encode_ms,
        fallback_used,
    };
    tracing::info!(
        frames = report.frames,
        width = report.width,
        height = report.height,
        codec = %report.codec,
        padded = video.is_padded(),
        render_ms,
        encode_ms,
        fallback_used,
        "Generated video"
    );

    Ok(GeneratedVideo { video, report })
}

/// Run `encode_with` on `codec`, retrying exactly once with `fallback`
/// when the preferred codec has no encoder. The flag reports whether the
/// fallback produced the result.
pub fn encode_with_fallback<T>(
    codec: CodecId,
    fallback: Option<CodecId>,
    mut encode_with: impl FnMut(CodecId) -> TicketTockResult<T>,
) -> TicketTockResult<(T, bool)> {
    match encode_with(codec) {
        Ok(video) => Ok((video, false)),
        Err(err @ TicketTockError::EncoderUnavailable { .. }) => match fallback {
            Some(fallback) if fallback != codec => {
                tracing::warn!(
                    error = %err,
                    fallback = %fallback,
                    "Preferred codec unavailable, retrying with fallback"
                );
                Ok((encode_with(fallback)?, true))
            }
            _ => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Generate a clip on the blocking pool, honoring `cancel` and the
/// configured timeout.
pub async fn generate_video(
    image_bytes: Vec<u8>,
    config: PipelineConfig,
    cancel: CancellationToken,
) -> TicketTockResult<GeneratedVideo> {
    let worker_token = cancel.child_token();
    let token = worker_token.clone();
    let timeout = config.timeout;

    let mut handle = tokio::task::spawn_blocking(move || {
        generate_video_blocking(&image_bytes, &config, &token)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs_f64(), "Generation deadline exceeded");
                worker_token.cancel();
                // Wait so the worker's temp file is gone before returning.
                let _ = handle.await;
                return Err(TicketTockError::cancelled(format!(
                    "generation exceeded the {:.1}s deadline",
                    limit.as_secs_f64()
                )));
            }
        },
        None => handle.await,
    };

    joined.map_err(|e| TicketTockError::data(format!("generation worker failed: {e}")))?
}

/// Render frame `index` and write it as a PNG.
pub fn render_preview_frame(
    image_bytes: &[u8],
    config: &PipelineConfig,
    index: u32,
    out: impl Into<PathBuf>,
) -> TicketTockResult<PathBuf> {
    let out = out.into();
    let frame = PreparedRequest::new(image_bytes, config)?.render_frame(index)?;
    frame
        .image
        .save_with_format(&out, image::ImageFormat::Png)
        .map_err(|e| TicketTockError::data(format!("failed to write {}: {e}", out.display())))?;
    tracing::info!(frame = index, path = %out.display(), "Wrote preview frame");
    Ok(out)
}
