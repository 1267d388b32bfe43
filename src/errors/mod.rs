//! Centralized error handling for the IPTV proxy
//!
//! Errors are layered the same way the data flows:
//!
//! - **Source Errors**: upstream acquisition and programme fetches. These are
//!   recovered as close to their origin as possible (per record, per day).
//! - **Render Errors**: a channel that cannot produce an output line.
//! - **App Errors**: everything that reaches a caller, including configuration
//!   errors that must abort startup.
//!
//! # Usage
//!
//! ```rust
//! use iptv_proxy::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("catch-up mode must be 0-4"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for upstream source Results
pub type SourceResult<T> = Result<T, SourceError>;
