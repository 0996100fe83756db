//! TicketTock Common Utilities
//!
//! Shared infrastructure for all TicketTock crates:
//! - Error taxonomy, caller-facing reports, and result aliases
//! - Start-clock and time zone utilities for the overlay schedule
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
