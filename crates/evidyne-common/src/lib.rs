//! evidyne-common — Shared error types and the capped HTTP client used across all Evidyne crates.

pub mod error;
pub mod sandbox;

// Re-export commonly used types
pub use error::{ApiError, EvidyneError, Result};
pub use sandbox::SandboxClient;
