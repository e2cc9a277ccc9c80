//! Session flow
//!
//! `upload → record → compare → feedback`, driven by completion callbacks.

pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionError, SessionEvent, SessionResult};
pub use state::{Session, Step};
