//! Error type definitions for the IPTV proxy

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream acquisition failed (transport, auth, malformed payload)
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] SourceError),

    /// Upstream answered but nothing usable survived ingestion
    #[error("Empty result: {message}")]
    EmptyResult { message: String },

    /// Bad configuration: rule templates, catch-up mode, timezone, ...
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Rendering could not produce a document
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The caller cancelled the operation
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Upstream source specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network level failure talking to the upstream
    #[error("Transport error: {url} - {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status from the upstream
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Upstream returned no channels at all
    #[error("Upstream returned no data: {source_type}")]
    Empty { source_type: String },

    /// Upstream has no listing for the requested day. Expected, never logged.
    #[error("No programme listing for channel {channel_id} on {day}")]
    DayNotFound { channel_id: String, day: String },

    /// Payload could not be decoded
    #[error("Parse error: {source_type} - {message}")]
    Parse { source_type: String, message: String },
}

/// Rendering errors for a single channel or the whole document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The channel carries no URL to emit
    #[error("Channel '{channel_name}' ({channel_id}) has no usable URL")]
    NoUrls {
        channel_id: String,
        channel_name: String,
    },

    /// Nothing left to render after filtering
    #[error("No channels available to render")]
    NoChannels,
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an empty result error
    pub fn empty_result<S: Into<String>>(message: S) -> Self {
        Self::EmptyResult {
            message: message.into(),
        }
    }

    /// Create a cancellation error for the named operation
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl SourceError {
    /// Create a transport error from any displayable cause
    pub fn transport<U: Into<String>, E: std::fmt::Display>(url: U, err: E) -> Self {
        Self::Transport {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::Parse {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    pub fn is_day_not_found(&self) -> bool {
        matches!(self, Self::DayNotFound { .. })
    }
}
