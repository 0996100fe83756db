//! Error types shared across TicketTock crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for TicketTock operations.
#[derive(Debug, thiserror::Error)]
pub enum TicketTockError {
    #[error("Input decode error: {message}")]
    InputDecode { message: String },

    #[error("Asset missing: {asset} ({})", .path.display())]
    AssetMissing { asset: String, path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Encoder unavailable for codec {codec}: {reason}")]
    EncoderUnavailable { codec: String, reason: String },

    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Generation cancelled: {message}")]
    Cancelled { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TicketTockError.
pub type TicketTockResult<T> = Result<T, TicketTockError>;

impl TicketTockError {
    pub fn input_decode(msg: impl Into<String>) -> Self {
        Self::InputDecode {
            message: msg.into(),
        }
    }

    pub fn asset_missing(asset: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::AssetMissing {
            asset: asset.into(),
            path: path.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn encoder_unavailable(codec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            codec: codec.into(),
            reason: reason.into(),
        }
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    /// Classification used by callers to pick a response.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputDecode { .. } => ErrorKind::InputDecode,
            Self::AssetMissing { .. } => ErrorKind::AssetMissing,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::EncoderUnavailable { .. } => ErrorKind::EncoderUnavailable,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Data { .. } | Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Data,
        }
    }

    /// Build the caller-facing report.
    ///
    /// Internal failures are reported generically; the full message only
    /// goes to the log.
    pub fn report(&self) -> ErrorReport {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Data => {
                tracing::error!(error = %self, "Internal pipeline failure");
                "internal error while generating video".to_string()
            }
            _ => self.to_string(),
        };
        ErrorReport { kind, message }
    }
}

/// Error classification exposed at the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputDecode,
    AssetMissing,
    Configuration,
    EncoderUnavailable,
    Data,
    Cancelled,
}

impl ErrorKind {
    /// HTTP status code a web caller should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InputDecode => 400,
            ErrorKind::Configuration => 422,
            ErrorKind::Cancelled => 408,
            ErrorKind::EncoderUnavailable => 503,
            ErrorKind::AssetMissing | ErrorKind::Data => 500,
        }
    }

    /// Process exit code for command-line callers.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InputDecode => 65,
            ErrorKind::Configuration => 78,
            ErrorKind::AssetMissing => 66,
            ErrorKind::EncoderUnavailable => 69,
            ErrorKind::Cancelled => 75,
            ErrorKind::Data => 70,
        }
    }

    /// Whether the failure was caused by the caller's input.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

/// Structured error returned to callers instead of a raw trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TicketTockError> for ErrorReport {
    fn from(err: &TicketTockError) -> Self {
        err.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_are_stable() {
        assert!(TicketTockError::input_decode("x")
            .to_string()
            .starts_with("Input decode error:"));
        assert!(TicketTockError::configuration("x")
            .to_string()
            .starts_with("Configuration error:"));
        assert!(TicketTockError::asset_missing("font", "/nope.ttf")
            .to_string()
            .contains("/nope.ttf"));
        assert!(TicketTockError::encoder_unavailable("h264", "not found")
            .to_string()
            .contains("h264"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::InputDecode.http_status(), 400);
        assert!(ErrorKind::InputDecode.is_client_error());
        assert!(ErrorKind::Configuration.is_client_error());
        assert!(!ErrorKind::EncoderUnavailable.is_client_error());
        assert!(!ErrorKind::Data.is_client_error());
    }

    #[test]
    fn test_internal_errors_are_reported_generically() {
        let err = TicketTockError::data("frame 3 is 10x10, expected 20x20");
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::Data);
        assert!(!report.message.contains("10x10"));

        let io = TicketTockError::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_report_serializes_kind_in_snake_case() {
        let report = TicketTockError::encoder_unavailable("vp9", "missing").report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"encoder_unavailable\""));
    }
}
