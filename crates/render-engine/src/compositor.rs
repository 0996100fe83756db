//! Frame compositor: draws the clock, countdown, blink bar, and decoration
//! onto a copy of the base image.
//!
//! Every frame is a pure function of the base image, the frame index, and
//! the [`FrameCompositor`]'s fixed parameters. Frames are independent and
//! are rendered in parallel on a bounded rayon pool.

use chrono::NaiveDateTime;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rayon::prelude::*;
use tickettock_common::error::{TicketTockError, TicketTockResult};
use tickettock_layout::{PixelRect, ResolvedLayout, Rgb8};
use tokio_util::sync::CancellationToken;

use crate::base::BaseImage;
use crate::decoration::LoadedDecoration;
use crate::fonts::LoadedFont;
use crate::overlay::{center_x, FrameText};

/// One composited frame.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub index: u32,
    pub image: RgbImage,
}

impl RenderedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Frames in display order.
///
/// Indices are contiguous from zero and every frame has the same size.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<RenderedFrame>,
    width: u32,
    height: u32,
}

impl FrameSequence {
    pub fn new(frames: Vec<RenderedFrame>) -> TicketTockResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TicketTockError::configuration(
                "frame sequence must contain at least one frame",
            ));
        };
        let (width, height) = first.dimensions();

        for (expected, frame) in frames.iter().enumerate() {
            if frame.index as usize != expected {
                return Err(TicketTockError::data(format!(
                    "frame sequence out of order: position {expected} holds frame {}",
                    frame.index
                )));
            }
            if frame.dimensions() != (width, height) {
                return Err(TicketTockError::data(format!(
                    "frame {} is {}x{}, expected {width}x{height}",
                    frame.index,
                    frame.image.width(),
                    frame.image.height()
                )));
            }
        }

        Ok(Self {
            frames,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frames(&self) -> &[RenderedFrame] {
        &self.frames
    }
}

/// Fixed per-request parameters for rendering frames.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    layout: ResolvedLayout,
    font: LoadedFont,
    decoration: Option<LoadedDecoration>,
    start: NaiveDateTime,
    countdown_total_secs: u64,
}

impl FrameCompositor {
    pub fn new(
        layout: ResolvedLayout,
        font: LoadedFont,
        decoration: Option<LoadedDecoration>,
        start: NaiveDateTime,
        countdown_total_secs: u64,
    ) -> Self {
        Self {
            layout,
            font,
            decoration: decoration.filter(|d| !d.is_empty()),
            start,
            countdown_total_secs,
        }
    }

    pub fn layout(&self) -> &ResolvedLayout {
        &self.layout
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Render frame `index` onto a fresh copy of `base`.
    pub fn render_frame(&self, base: &BaseImage, index: u32) -> TicketTockResult<RenderedFrame> {
        let layout = &self.layout;
        if (base.width(), base.height()) != (layout.width, layout.height) {
            return Err(TicketTockError::data(format!(
                "layout resolved for {}x{} but base image is {}x{}",
                layout.width,
                layout.height,
                base.width(),
                base.height()
            )));
        }

        let text = FrameText::for_frame(self.start, index, self.countdown_total_secs)?;
        let [time_line, date_line, countdown] =
            self.place_lines(&text).map_err(TicketTockError::data)?;

        let mut canvas = base.pixels().clone();
        let palette = layout.palette;

        fill(&mut canvas, &layout.timestamp_region, palette.background);
        self.draw_line(&mut canvas, &time_line);
        self.draw_line(&mut canvas, &date_line);

        fill(&mut canvas, &layout.countdown_region, palette.background);
        self.draw_line(&mut canvas, &countdown);

        let bar_color = if layout.bar_visible(index) {
            palette.bar
        } else {
            palette.background
        };
        fill(&mut canvas, &layout.blink_bar, bar_color);

        if let Some(decoration) = &self.decoration {
            decoration.apply(&mut canvas, base.pixels());
        }

        Ok(RenderedFrame {
            index,
            image: canvas,
        })
    }

    /// Check that the text of every frame in `0..frame_count` fits its
    /// region with this font, before anything is rendered.
    ///
    /// Overflow here comes from the caller's font or layout, so it is a
    /// configuration error naming the region.
    pub fn check_text_fits(&self, frame_count: u32) -> TicketTockResult<()> {
        for index in 0..frame_count {
            let text = FrameText::for_frame(self.start, index, self.countdown_total_secs)?;
            self.place_lines(&text)
                .map_err(TicketTockError::configuration)?;
        }
        Ok(())
    }

    /// Render frames `0..frame_count` on a pool of `threads` workers.
    ///
    /// Frames come back in index order. `cancel` is checked before each
    /// frame.
    pub fn render_sequence(
        &self,
        base: &BaseImage,
        frame_count: u32,
        threads: Option<usize>,
        cancel: &CancellationToken,
    ) -> TicketTockResult<FrameSequence> {
        let pool = build_thread_pool(threads)?;
        let started = std::time::Instant::now();

        let rendered = pool.install(|| {
            (0..frame_count)
                .into_par_iter()
                .map(|index| {
                    if cancel.is_cancelled() {
                        return Err(TicketTockError::cancelled(format!(
                            "rendering cancelled before frame {index}"
                        )));
                    }
                    self.render_frame(base, index)
                })
                .collect::<TicketTockResult<Vec<_>>>()
        })?;

        tracing::debug!(
            frames = frame_count,
            threads = pool.current_num_threads(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered frame sequence"
        );
        FrameSequence::new(rendered)
    }

    /// Position the clock, date, and countdown lines of one frame.
    fn place_lines<'a>(&self, text: &'a FrameText) -> Result<[PlacedLine<'a>; 3], String> {
        let layout = &self.layout;
        let time_line = self.place_centered(
            "timestamp_region",
            &layout.timestamp_region,
            layout.timestamp_top,
            &text.time_line,
        )?;
        let second_top = layout.timestamp_top + time_line.height + layout.line_spacing;
        let date_line = self.place_centered(
            "timestamp_region",
            &layout.timestamp_region,
            second_top,
            &text.date_line,
        )?;
        let countdown = self.place_centered(
            "countdown_region",
            &layout.countdown_region,
            layout.countdown_top,
            &text.countdown,
        )?;
        Ok([time_line, date_line, countdown])
    }

    /// Center one line horizontally on the canvas at row `top`.
    fn place_centered<'a>(
        &self,
        region_name: &str,
        region: &PixelRect,
        top: u32,
        text: &'a str,
    ) -> Result<PlacedLine<'a>, String> {
        let extent = self.font.measure(text);
        let x = center_x(self.layout.width, extent.width);
        if !region.contains_box(x, i64::from(top), extent.width, extent.height) {
            return Err(format!(
                "text '{text}' ({}x{} at {x},{top}) overflows {region_name} {region:?} with font {} at {}px",
                extent.width,
                extent.height,
                self.font.name(),
                self.font.size_px()
            ));
        }
        Ok(PlacedLine {
            text,
            x,
            top,
            height: extent.height,
        })
    }

    fn draw_line(&self, canvas: &mut RgbImage, line: &PlacedLine<'_>) {
        self.font.draw(
            canvas,
            self.layout.palette.text,
            line.x as i32,
            line.top as i32,
            line.text,
        );
    }
}

/// A line of overlay text with its checked position.
struct PlacedLine<'a> {
    text: &'a str,
    x: i64,
    top: u32,
    height: u32,
}

fn fill(canvas: &mut RgbImage, rect: &PixelRect, color: Rgb8) {
    draw_filled_rect_mut(
        canvas,
        Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
        Rgb(color),
    );
}

fn build_thread_pool(threads: Option<usize>) -> TicketTockResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(TicketTockError::configuration(
            "render threads must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TicketTockError::data(format!("failed to build render thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tickettock_layout::LayoutSpec;

    use super::*;

    fn compositor(width: u32, height: u32) -> FrameCompositor {
        let layout = LayoutSpec::default().resolve(width, height).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        FrameCompositor::new(layout, LoadedFont::builtin(24.0).unwrap(), None, start, 3600)
    }

    fn gray_base(width: u32, height: u32) -> BaseImage {
        BaseImage::from_rgb(RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))).unwrap()
    }

    #[test]
    fn test_frame_keeps_base_dimensions_and_base_untouched() {
        let base = gray_base(800, 600);
        let frame = compositor(800, 600).render_frame(&base, 0).unwrap();
        assert_eq!(frame.dimensions(), (800, 600));
        assert_eq!(base.pixels().get_pixel(400, 420), &Rgb([128, 128, 128]));
        // outside every overlay region
        assert_eq!(frame.image.get_pixel(10, 10), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_erase_box_and_text_are_drawn() {
        let base = gray_base(800, 600);
        let frame = compositor(800, 600).render_frame(&base, 0).unwrap();
        // left edge of the timestamp box is erased to white
        assert_eq!(frame.image.get_pixel(41, 372), &Rgb([255, 255, 255]));

        let dark = (378..402)
            .flat_map(|y| (300..500).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.image.get_pixel(x, y)[0] < 100)
            .count();
        assert!(dark > 0, "expected clock glyphs in the timestamp region");
    }

    #[test]
    fn test_blink_bar_follows_parity() {
        let base = gray_base(800, 600);
        let compositor = compositor(800, 600);
        let (cx, cy) = compositor.layout().blink_bar.center();
        for index in 0..4 {
            let frame = compositor.render_frame(&base, index).unwrap();
            let expected = if index % 2 == 0 {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 255, 255])
            };
            assert_eq!(frame.image.get_pixel(cx, cy), &expected, "frame {index}");
        }
    }

    #[test]
    fn test_oversized_font_fails_the_fit_check_and_the_render() {
        let layout = LayoutSpec::default().resolve(800, 600).unwrap();
        let compositor = FrameCompositor::new(
            layout,
            LoadedFont::builtin(120.0).unwrap(),
            None,
            NaiveDateTime::default(),
            3600,
        );
        assert!(matches!(
            compositor.check_text_fits(1),
            Err(TicketTockError::Configuration { .. })
        ));
        // reaching the renderer with unchecked text is an internal fault
        let err = compositor.render_frame(&gray_base(800, 600), 0).unwrap_err();
        assert!(matches!(err, TicketTockError::Data { .. }));
    }

    #[test]
    fn test_default_font_fits_every_frame() {
        assert!(compositor(800, 600).check_text_fits(600).is_ok());
    }

    #[test]
    fn test_decoration_layers_stack_over_the_bar() {
        use image::{Rgba, RgbaImage};
        use tickettock_layout::{
            ResolvedDecoration, ResolvedGlyph, ResolvedPatch, ResolvedReference,
        };

        use crate::blend::over;

        let dir = tempfile::tempdir().unwrap();
        let glyph_path = dir.path().join("glyph.png");
        let reference_path = dir.path().join("reference.png");
        RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))
            .save(&glyph_path)
            .unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 128]))
            .save(&reference_path)
            .unwrap();

        // the default bar on 800x600 spans (50, 520) to (750, 540)
        let target = PixelRect::new(390, 520, 20, 20);
        let decoration = LoadedDecoration::load(&ResolvedDecoration {
            patch: Some(ResolvedPatch {
                source: PixelRect::new(0, 0, 20, 20),
                target,
                mirror: false,
            }),
            glyph: Some(ResolvedGlyph {
                path: glyph_path,
                region: target,
            }),
            reference: Some(ResolvedReference {
                path: reference_path,
                crop: PixelRect::new(0, 0, 4, 4),
                dest: PixelRect::new(400, 530, 4, 4),
            }),
        })
        .unwrap();

        let layout = LayoutSpec::default().resolve(800, 600).unwrap();
        let compositor = FrameCompositor::new(
            layout,
            LoadedFont::builtin(24.0).unwrap(),
            Some(decoration),
            NaiveDateTime::default(),
            3600,
        );
        let frame = compositor.render_frame(&gray_base(800, 600), 0).unwrap();
        let px = |x, y| frame.image.get_pixel(x, y).0;

        let gray = [128, 128, 128];
        let red = over(gray, [255, 0, 0, 255]);
        // bar is lit on frame 0 outside the patch
        assert_eq!(px(380, 530), [0, 0, 255]);
        // patch hides the bar
        assert_eq!(px(392, 522), gray);
        // glyph centered on (400, 530)
        assert_eq!(px(398, 528), red);
        // reference blended over the glyph where they overlap
        assert_eq!(px(401, 531), over(red, [0, 255, 0, 128]));
        // and over the patch elsewhere
        assert_eq!(px(403, 533), over(gray, [0, 255, 0, 128]));
    }

    #[test]
    fn test_sequence_is_ordered() {
        let base = gray_base(800, 600);
        let seq = compositor(800, 600)
            .render_sequence(&base, 5, Some(2), &CancellationToken::new())
            .unwrap();
        assert_eq!(seq.len(), 5);
        for (i, frame) in seq.frames().iter().enumerate() {
            assert_eq!(frame.index as usize, i);
        }
    }

    #[test]
    fn test_cancelled_render_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let err = compositor(800, 600)
            .render_sequence(&gray_base(800, 600), 3, Some(1), &token)
            .unwrap_err();
        assert!(matches!(err, TicketTockError::Cancelled { .. }));
    }

    #[test]
    fn test_sequence_rejects_gaps() {
        let frame = |index| RenderedFrame {
            index,
            image: RgbImage::new(2, 2),
        };
        assert!(FrameSequence::new(vec![frame(0), frame(2)]).is_err());
        assert!(FrameSequence::new(Vec::new()).is_err());
        assert!(FrameSequence::new(vec![frame(0), frame(1)]).is_ok());
    }
}
