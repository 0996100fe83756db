//! The per-frame overlay schedule.
//!
//! Everything here is a pure function of the frame index and the resolved
//! start time; no pixels are touched.

use chrono::NaiveDateTime;
use tickettock_common::clock::frame_time;
use tickettock_common::error::TicketTockResult;

/// Clock line format, e.g. `12:00:00 AM`.
pub const TIME_FORMAT: &str = "%I:%M:%S %p";

/// Date line format, e.g. `Monday, Jan 01, 2024`.
pub const DATE_FORMAT: &str = "%A, %b %d, %Y";

/// Text drawn on one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameText {
    pub time_line: String,
    pub date_line: String,
    pub countdown: String,
}

impl FrameText {
    /// Overlay text for frame `index` of a clip starting at `start`.
    pub fn for_frame(
        start: NaiveDateTime,
        index: u32,
        countdown_total_secs: u64,
    ) -> TicketTockResult<Self> {
        let now = frame_time(start, index)?;
        Ok(Self {
            time_line: now.format(TIME_FORMAT).to_string(),
            date_line: now.format(DATE_FORMAT).to_string(),
            countdown: format_countdown(countdown_remaining(countdown_total_secs, index)),
        })
    }
}

/// Seconds left on the countdown at frame `index`. Never negative.
pub fn countdown_remaining(total_secs: u64, index: u32) -> u64 {
    total_secs.saturating_sub(u64::from(index))
}

/// `HH:MM:SS`, zero padded. Hours keep counting past 99.
pub fn format_countdown(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Left edge that centers a line of `text_width` on a canvas of `canvas_width`.
///
/// May be negative when the text is wider than the canvas.
pub fn center_x(canvas_width: u32, text_width: u32) -> i64 {
    i64::from(canvas_width / 2) - i64::from(text_width / 2)
}
