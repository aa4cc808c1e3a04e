//! Domain models for the signing service.

pub mod request;
pub mod upload;

pub use request::*;
pub use upload::*;
