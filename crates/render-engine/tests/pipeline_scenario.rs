use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tickettock_common::{StartTime, TicketTockError};
use tickettock_render_engine::{
    generate_video, generate_video_blocking, overlay, FrameText, PipelineConfig, PreparedRequest,
};
use tokio_util::sync::CancellationToken;

fn ticket_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn new_year_config(frames: u32) -> PipelineConfig {
    PipelineConfig {
        frame_count: frames,
        frame_rate: 1,
        start: StartTime::parse("2024-01-01T00:00:00").unwrap(),
        render_threads: Some(2),
        ..Default::default()
    }
}

#[test]
fn four_frames_at_new_year() {
    let config = new_year_config(4);
    let prepared = PreparedRequest::new(&ticket_png(800, 600), &config).unwrap();
    let frames = prepared.render(&CancellationToken::new()).unwrap();

    assert_eq!(frames.len(), 4);
    assert_eq!((frames.width(), frames.height()), (800, 600));

    let start = prepared.compositor().start();
    let first = FrameText::for_frame(start, 0, config.countdown_total_secs).unwrap();
    assert_eq!(first.time_line, "12:00:00 AM");
    assert_eq!(first.date_line, "Monday, Jan 01, 2024");

    let (cx, cy) = prepared.compositor().layout().blink_bar.center();
    let bar = Rgb([0, 0, 255]);
    let background = Rgb([255, 255, 255]);
    for frame in frames.frames() {
        assert_eq!(frame.dimensions(), (800, 600));
        let expected = if frame.index % 2 == 0 { bar } else { background };
        assert_eq!(frame.image.get_pixel(cx, cy), &expected, "frame {}", frame.index);
    }

    let countdowns: Vec<u64> = (0..4)
        .map(|i| overlay::countdown_remaining(config.countdown_total_secs, i))
        .collect();
    assert_eq!(countdowns, vec![3600, 3599, 3598, 3597]);
}

#[test]
fn frames_differ_only_where_the_overlay_changes() {
    let prepared = PreparedRequest::new(&ticket_png(800, 600), &new_year_config(2)).unwrap();
    let frames = prepared.render(&CancellationToken::new()).unwrap();
    let (a, b) = (&frames.frames()[0].image, &frames.frames()[1].image);

    // above every overlay region
    for y in (0..300).step_by(37) {
        for x in (0..800).step_by(53) {
            assert_eq!(a.get_pixel(x, y), b.get_pixel(x, y));
        }
    }
    assert_ne!(a, b);
}

#[test]
fn odd_sized_upload_renders_at_its_own_size() {
    let prepared = PreparedRequest::new(&ticket_png(801, 599), &new_year_config(2)).unwrap();
    assert_eq!((prepared.base().width(), prepared.base().height()), (801, 599));
    let frames = prepared.render(&CancellationToken::new()).unwrap();
    assert_eq!((frames.width(), frames.height()), (801, 599));
    for frame in frames.frames() {
        assert_eq!(frame.dimensions(), (801, 599));
    }
}

#[test]
fn empty_upload_is_input_error() {
    let err = generate_video_blocking(&[], &new_year_config(4), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, TicketTockError::InputDecode { .. }));
    assert_eq!(err.kind().http_status(), 400);
}

#[test]
fn zero_frames_is_rejected_before_decoding() {
    // the body is not even an image; validation must fail first
    let err = generate_video_blocking(b"junk", &new_year_config(0), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, TicketTockError::Configuration { .. }));
    assert_eq!(err.kind().http_status(), 422);
}

#[test]
fn preview_index_must_be_inside_the_clip() {
    let prepared = PreparedRequest::new(&ticket_png(800, 600), &new_year_config(4)).unwrap();
    assert!(matches!(
        prepared.render_frame(4),
        Err(TicketTockError::Configuration { .. })
    ));
}

#[test]
fn preview_frame_is_written_as_png() {
    let dir = tempfile::tempdir().unwrap();
    let out = tickettock_render_engine::render_preview_frame(
        &ticket_png(800, 600),
        &new_year_config(4),
        1,
        dir.path().join("preview.png"),
    )
    .unwrap();
    let img = image::open(out).unwrap();
    assert_eq!((img.width(), img.height()), (800, 600));
}

#[tokio::test]
async fn cancelled_request_reports_cancellation() {
    let token = CancellationToken::new();
    token.cancel();
    let err = generate_video(ticket_png(800, 600), new_year_config(4), token)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketTockError::Cancelled { .. }));
    assert_eq!(err.kind().http_status(), 408);
}
