//! Sequence encoder: pipes raw RGB frames into the system `ffmpeg`.
//!
//! Frames are written in order as `rgb24` rawvideo at a constant rate, so
//! frame `i` is shown from `i / R` to `(i + 1) / R` seconds. The output
//! lands in a uniquely named temp file that is deleted on every path
//! except a successful hand-off to the caller.
//!
//! The output is `yuv420p`, which needs even dimensions. Frames with an odd
//! width or height are extended by repeating their last column or row; the
//! encoded size is recorded next to the frame size on [`EncodedVideo`].

use std::borrow::Cow;
use std::fmt;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tickettock_common::error::{TicketTockError, TicketTockResult};
use tokio_util::sync::CancellationToken;

use crate::compositor::RenderedFrame;

/// How often a finishing ffmpeg is polled for exit or cancellation.
const EXIT_POLL: Duration = Duration::from_millis(20);

/// Video codecs the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    /// H.264 via libx264 in MP4.
    #[default]
    H264,
    /// MPEG-4 Part 2 (`mp4v`) in MP4. Built into every ffmpeg.
    Mpeg4,
    /// VP9 via libvpx in WebM.
    Vp9,
}

impl CodecId {
    pub const ALL: [CodecId; 3] = [CodecId::H264, CodecId::Mpeg4, CodecId::Vp9];

    pub fn as_str(self) -> &'static str {
        match self {
            CodecId::H264 => "h264",
            CodecId::Mpeg4 => "mpeg4",
            CodecId::Vp9 => "vp9",
        }
    }

    /// Name of the ffmpeg encoder implementing this codec.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            CodecId::H264 => "libx264",
            CodecId::Mpeg4 => "mpeg4",
            CodecId::Vp9 => "libvpx-vp9",
        }
    }

    /// File extension, which is also the ffmpeg muxer name.
    pub fn extension(self) -> &'static str {
        match self {
            CodecId::H264 | CodecId::Mpeg4 => "mp4",
            CodecId::Vp9 => "webm",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            CodecId::H264 | CodecId::Mpeg4 => "video/mp4",
            CodecId::Vp9 => "video/webm",
        }
    }

    fn codec_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            CodecId::H264 => &[
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-tune",
                "stillimage",
                "-crf",
                "20",
                "-movflags",
                "+faststart",
            ],
            CodecId::Mpeg4 => &[
                "-c:v",
                "mpeg4",
                "-tag:v",
                "mp4v",
                "-q:v",
                "3",
                "-movflags",
                "+faststart",
            ],
            CodecId::Vp9 => &[
                "-c:v",
                "libvpx-vp9",
                "-b:v",
                "0",
                "-crf",
                "32",
                "-deadline",
                "good",
            ],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CodecId {
    type Err = TicketTockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "libx264" => Ok(CodecId::H264),
            "mpeg4" | "mp4v" => Ok(CodecId::Mpeg4),
            "vp9" | "libvpx-vp9" => Ok(CodecId::Vp9),
            other => Err(TicketTockError::configuration(format!(
                "Unknown codec '{other}'. Use: h264, mpeg4, vp9"
            ))),
        }
    }
}

/// An encoded clip held in a temp file.
///
/// Dropping it deletes the file; use [`EncodedVideo::persist_to`] to keep it.
#[derive(Debug)]
pub struct EncodedVideo {
    file: NamedTempFile,
    codec: CodecId,
    frame_rate: u32,
    frame_count: usize,
    width: u32,
    height: u32,
    encoded_width: u32,
    encoded_height: u32,
    created_at: NaiveDateTime,
}

impl EncodedVideo {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the video stream. Differs from the frame size only when
    /// odd dimensions were padded.
    pub fn encoded_dimensions(&self) -> (u32, u32) {
        (self.encoded_width, self.encoded_height)
    }

    pub fn is_padded(&self) -> bool {
        (self.encoded_width, self.encoded_height) != (self.width, self.height)
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.content_type()
    }

    /// Attachment name such as `ticket-20240101-000000.mp4`.
    pub fn suggested_filename(&self) -> String {
        format!(
            "ticket-{}.{}",
            self.created_at.format("%Y%m%d-%H%M%S"),
            self.codec.extension()
        )
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / f64::from(self.frame_rate)
    }

    pub fn size_bytes(&self) -> TicketTockResult<u64> {
        Ok(std::fs::metadata(self.file.path())?.len())
    }

    pub fn read_bytes(&self) -> TicketTockResult<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }

    /// Move the clip to `dest`, consuming the temp file.
    ///
    /// Falls back to copying when `dest` is on another filesystem.
    pub fn persist_to(self, dest: impl AsRef<Path>) -> TicketTockResult<PathBuf> {
        let dest = dest.as_ref();
        match self.file.persist(dest) {
            Ok(_) => Ok(dest.to_path_buf()),
            Err(err) => {
                tracing::debug!(error = %err.error, dest = %dest.display(), "Rename failed, copying");
                std::fs::copy(err.file.path(), dest)?;
                Ok(dest.to_path_buf())
            }
        }
    }
}

/// Whether one codec can be encoded on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecAvailability {
    pub codec: CodecId,
    pub encoder: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Check every supported codec against the local ffmpeg.
pub fn probe_codecs() -> Vec<CodecAvailability> {
    let listing = list_encoders();
    CodecId::ALL
        .iter()
        .map(|&codec| {
            let reason = match &listing {
                Ok(listing) => check_listing(listing, codec).err(),
                Err(reason) => Some(reason.clone()),
            };
            CodecAvailability {
                codec,
                encoder: codec.ffmpeg_encoder().to_string(),
                available: reason.is_none(),
                reason,
            }
        })
        .collect()
}

/// Fail with [`TicketTockError::EncoderUnavailable`] unless `codec` can be encoded.
pub fn ensure_encoder(codec: CodecId) -> TicketTockResult<()> {
    let listing =
        list_encoders().map_err(|reason| TicketTockError::encoder_unavailable(codec.as_str(), reason))?;
    check_listing(&listing, codec)
        .map_err(|reason| TicketTockError::encoder_unavailable(codec.as_str(), reason))
}

pub fn is_ffmpeg_on_path() -> bool {
    command_exists("ffmpeg")
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn list_encoders() -> Result<String, String> {
    if !is_ffmpeg_on_path() {
        return Err("ffmpeg not found on PATH".to_string());
    }
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to run ffmpeg: {e}"))?;
    if !output.status.success() {
        return Err(format!("ffmpeg -encoders exited with {}", output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Encoder lines look like ` V....D libx264   libx264 H.264 / AVC ...`.
fn check_listing(listing: &str, codec: CodecId) -> Result<(), String> {
    let wanted = codec.ffmpeg_encoder();
    let found = listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(wanted));
    if found {
        Ok(())
    } else {
        Err(format!("ffmpeg was built without the {wanted} encoder"))
    }
}

/// Encode `frames` in order at `frame_rate` frames per second.
pub fn encode(
    frames: &[RenderedFrame],
    frame_rate: u32,
    codec: CodecId,
    cancel: &CancellationToken,
) -> TicketTockResult<EncodedVideo> {
    let Some(first) = frames.first() else {
        return Err(TicketTockError::configuration("cannot encode an empty frame sequence"));
    };
    if frame_rate == 0 {
        return Err(TicketTockError::configuration("frame rate must be at least 1"));
    }
    let (width, height) = first.dimensions();
    if let Some(bad) = frames.iter().find(|f| f.dimensions() != (width, height)) {
        return Err(TicketTockError::data(format!(
            "frame {} is {}x{}, expected {width}x{height}",
            bad.index,
            bad.image.width(),
            bad.image.height()
        )));
    }

    ensure_encoder(codec)?;

    let (encoded_width, encoded_height) = even_dimensions(width, height);
    if (encoded_width, encoded_height) != (width, height) {
        tracing::info!(
            width,
            height,
            encoded_width,
            encoded_height,
            "Padding odd-sized frames for yuv420p"
        );
    }

    let file = tempfile::Builder::new()
        .prefix("tickettock-")
        .suffix(&format!(".{}", codec.extension()))
        .tempfile()?;

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-s".into(),
        format!("{encoded_width}x{encoded_height}"),
        "-r".into(),
        frame_rate.to_string(),
        "-i".into(),
        "-".into(),
        "-an".into(),
    ];
    args.extend(codec.codec_args());
    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        frame_rate.to_string(),
        "-f".to_string(),
        codec.extension().to_string(),
    ]);
    args.push(file.path().display().to_string());

    tracing::debug!(args = ?args, "Running ffmpeg");
    let started = std::time::Instant::now();
    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            TicketTockError::encoder_unavailable(codec.as_str(), format!("failed to start ffmpeg: {e}"))
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TicketTockError::data("failed to capture ffmpeg stderr"))?;
    let stderr_task = std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    });

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| TicketTockError::data("failed to open ffmpeg stdin"))?;

    let mut write_error = None;
    for frame in frames {
        if cancel.is_cancelled() {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            let _ = stderr_task.join();
            tracing::info!(frame = frame.index, "Encoding cancelled");
            return Err(TicketTockError::cancelled(format!(
                "encoding cancelled at frame {}",
                frame.index
            )));
        }
        if let Err(err) = stdin.write_all(even_raster(&frame.image).as_raw()) {
            write_error = Some((frame.index, err));
            break;
        }
    }
    drop(stdin);

    let Some(status) = wait_for_exit(&mut child, cancel)? else {
        let _ = stderr_task.join();
        tracing::info!("Encoding cancelled while ffmpeg was finishing");
        return Err(TicketTockError::cancelled(
            "encoding cancelled while finalizing the output",
        ));
    };
    let stderr_output = stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

    if !status.success() {
        return Err(TicketTockError::data(format!(
            "ffmpeg encode failed (status {status}): {}",
            stderr_output.trim()
        )));
    }
    if let Some((index, err)) = write_error {
        return Err(TicketTockError::data(format!(
            "ffmpeg stopped reading at frame {index}: {err}"
        )));
    }

    let video = EncodedVideo {
        file,
        codec,
        frame_rate,
        frame_count: frames.len(),
        width,
        height,
        encoded_width,
        encoded_height,
        created_at: Local::now().naive_local(),
    };
    if video.size_bytes()? == 0 {
        return Err(TicketTockError::data("ffmpeg produced an empty file"));
    }

    tracing::info!(
        codec = %codec,
        frames = frames.len(),
        frame_rate,
        width,
        height,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Encoded video"
    );
    Ok(video)
}

/// Wait for ffmpeg to exit. Returns `None` after killing it on cancellation.
fn wait_for_exit(
    child: &mut Child,
    cancel: &CancellationToken,
) -> TicketTockResult<Option<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => return Err(TicketTockError::data(format!("failed to wait on ffmpeg: {e}"))),
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(EXIT_POLL);
    }
}

/// Smallest even size that holds `width` x `height`.
pub fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width + width % 2, height + height % 2)
}

/// The frame raster as fed to ffmpeg: unchanged when already even, else
/// extended by repeating the last column and row.
fn even_raster(image: &RgbImage) -> Cow<'_, RgbImage> {
    let (width, height) = image.dimensions();
    let (even_width, even_height) = even_dimensions(width, height);
    if (even_width, even_height) == (width, height) {
        return Cow::Borrowed(image);
    }
    Cow::Owned(RgbImage::from_fn(even_width, even_height, |x, y| {
        *image.get_pixel(x.min(width - 1), y.min(height - 1))
    }))
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn frame(index: u32, width: u32, height: u32) -> RenderedFrame {
        RenderedFrame {
            index,
            image: RgbImage::new(width, height),
        }
    }

    #[test]
    fn test_codec_parsing() {
        assert_eq!("H264".parse::<CodecId>().unwrap(), CodecId::H264);
        assert_eq!("mp4v".parse::<CodecId>().unwrap(), CodecId::Mpeg4);
        assert_eq!("vp9".parse::<CodecId>().unwrap(), CodecId::Vp9);
        assert!(matches!(
            "theora".parse::<CodecId>(),
            Err(TicketTockError::Configuration { .. })
        ));
    }

    #[test]
    fn test_codec_containers() {
        assert_eq!(CodecId::H264.content_type(), "video/mp4");
        assert_eq!(CodecId::Mpeg4.extension(), "mp4");
        assert_eq!(CodecId::Vp9.content_type(), "video/webm");
    }

    #[test]
    fn test_empty_sequence_is_configuration_error() {
        let err = encode(&[], 1, CodecId::H264, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, TicketTockError::Configuration { .. }));
    }

    #[test]
    fn test_mismatched_dimensions_is_data_error() {
        let frames = vec![frame(0, 4, 4), frame(1, 6, 4)];
        let err = encode(&frames, 1, CodecId::H264, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, TicketTockError::Data { .. }));
    }

    #[test]
    fn test_even_frames_are_passed_through() {
        let image = RgbImage::new(4, 2);
        assert!(matches!(even_raster(&image), Cow::Borrowed(_)));
        assert_eq!(even_dimensions(800, 600), (800, 600));
    }

    #[test]
    fn test_odd_frames_repeat_the_last_column_and_row() {
        let image = RgbImage::from_fn(3, 1, |x, _| Rgb([x as u8 * 100, 0, 0]));
        let even = even_raster(&image);
        assert_eq!(even.dimensions(), (4, 2));
        assert_eq!(even.get_pixel(3, 0), &Rgb([200, 0, 0]));
        assert_eq!(even.get_pixel(3, 1), &Rgb([200, 0, 0]));
        assert_eq!(even.get_pixel(0, 1), &Rgb([0, 0, 0]));
        assert_eq!(even_dimensions(801, 599), (802, 600));
    }

    #[test]
    fn test_wait_for_exit_kills_a_cancelled_child() {
        let Ok(mut child) = Command::new("sleep").arg("30").spawn() else {
            return;
        };
        let token = CancellationToken::new();
        token.cancel();
        let started = std::time::Instant::now();
        assert!(wait_for_exit(&mut child, &token).unwrap().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_encoder_listing_parse() {
        let listing = "Encoders:\n V....D libx264              libx264 H.264\n V....D mpeg4                MPEG-4 part 2\n";
        assert!(check_listing(listing, CodecId::H264).is_ok());
        assert!(check_listing(listing, CodecId::Mpeg4).is_ok());
        assert!(check_listing(listing, CodecId::Vp9).is_err());
    }

    #[test]
    fn test_probe_covers_every_codec() {
        let probe = probe_codecs();
        assert_eq!(probe.len(), CodecId::ALL.len());
        for entry in &probe {
            assert_eq!(entry.available, entry.reason.is_none());
        }
    }
}
