//! Shared utilities
//!
//! Error types, time formatting, and the cancellable timer handle used by
//! every component.

pub mod error;
pub mod scheduler;
pub mod time;

pub use error::{AppError, AppResult, ErrorResponse};
pub use scheduler::ScheduledTask;
pub use time::format_clock;
