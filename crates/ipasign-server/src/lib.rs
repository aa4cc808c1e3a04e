//! ipasign server library.
//!
//! This library exposes the server components for use in integration tests.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, ServerConfig};

// Re-export ipasign_core for convenience
pub use ipasign_core;

// Test utilities are available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
