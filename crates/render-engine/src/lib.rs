//! TicketTock Render Engine
//!
//! Turns one uploaded ticket image into a short clip in which a clock
//! ticks, a countdown runs down, and a status bar blinks.
//!
//! # Pipeline Architecture
//!
//! ```text
//! upload bytes ── BaseImage::decode (original W x H)
//!                        │
//! LayoutSpec ────────────┼── resolve against (W, H)
//! font / decoration ─────┘         │
//!                                  ▼
//!                  FrameCompositor::render_frame × N   (rayon pool)
//!                  clock → countdown → blink bar → decoration
//!                                  │
//!                                  ▼
//!                     FrameSequence (index order, same size)
//!                                  │
//!                                  ▼
//!                 encode: rgb24 → ffmpeg (h264 | mpeg4 | vp9)
//!                 odd W or H: edge-padded to even, reported
//!                                  │
//!                                  ▼
//!                      EncodedVideo (temp file, .mp4/.webm)
//! ```

pub mod base;
pub mod blend;
pub mod compositor;
pub mod decoration;
pub mod encoder;
pub mod fonts;
pub mod overlay;
pub mod pipeline;

pub use base::BaseImage;
pub use compositor::{FrameCompositor, FrameSequence, RenderedFrame};
pub use decoration::LoadedDecoration;
pub use encoder::{encode, probe_codecs, CodecAvailability, CodecId, EncodedVideo};
pub use fonts::{load_font, resolve_font, FontFallback, FontSource, LoadedFont};
pub use overlay::FrameText;
pub use pipeline::*;
