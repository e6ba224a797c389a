//! Unified error handling for the popular-routes library.
//!
//! Expected empty-data outcomes (no edges yet, unreachable destination, empty
//! node set) are reported as `Ok(None)` by the operations that produce them.
//! This type is reserved for genuine defects: malformed keys, invalid
//! measurements, non-finite costs, and storage failures.

use thiserror::Error;

/// Unified error type for route graph operations.
#[derive(Debug, Error)]
pub enum RouteGraphError {
    /// A node key could not be decoded back into a coordinate
    #[error("Invalid node key '{key}': {message}")]
    InvalidNodeKey { key: String, message: String },

    /// A trace or query carried coordinates outside the WGS84 range
    #[error("Invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// Segment distance was negative or not finite
    #[error("Invalid distance {distance_m} for edge {start_key} -> {end_key}")]
    InvalidDistance {
        start_key: String,
        end_key: String,
        distance_m: f64,
    },

    /// Average speed was negative or not finite
    #[error("Invalid average speed {speed_mps} m/s for edge {start_key} -> {end_key}")]
    InvalidSpeed {
        start_key: String,
        end_key: String,
        speed_mps: f64,
    },

    /// Start and end quantize to the same node
    #[error("Zero-length edge at node {key}")]
    ZeroLengthEdge { key: String },

    /// Search produced a cost that is NaN or infinite
    #[error("Non-finite edge cost between {from} and {to}")]
    NonFiniteCost { from: String, to: String },

    /// Encoded polyline could not be decoded
    #[error("Activity '{activity_id}' has an undecodable polyline: {message}")]
    PolylineDecode {
        activity_id: String,
        message: String,
    },

    /// Persistence/storage error
    #[cfg(feature = "persistence")]
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RouteGraphError {
    /// True when the error stems from bad input data (re-ingest) rather than
    /// the environment (storage, configuration, internal state).
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            RouteGraphError::InvalidNodeKey { .. }
                | RouteGraphError::InvalidCoordinates { .. }
                | RouteGraphError::InvalidDistance { .. }
                | RouteGraphError::InvalidSpeed { .. }
                | RouteGraphError::ZeroLengthEdge { .. }
                | RouteGraphError::NonFiniteCost { .. }
                | RouteGraphError::PolylineDecode { .. }
        )
    }
}

/// Result type alias for route graph operations.
pub type Result<T> = std::result::Result<T, RouteGraphError>;

/// Extension trait for converting Option to RouteGraphError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid node key error.
    fn ok_or_invalid_key(self, key: &str, message: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_key(self, key: &str, message: &str) -> Result<T> {
        self.ok_or_else(|| RouteGraphError::InvalidNodeKey {
            key: key.to_string(),
            message: message.to_string(),
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| RouteGraphError::Internal {
            message: message.to_string(),
        })
    }
}
