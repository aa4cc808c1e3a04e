//! ipasign core library
//!
//! Upload handling, per-request workspaces, and the two-stage
//! import-then-sign pipeline that drives the platform signing tools.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod signing;
pub mod workspace;

pub use error::{Result, SigningError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
