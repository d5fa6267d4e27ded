//! Error types
//!
//! Configuration problems fail fast at load time. Runtime failures inside a
//! trial are not errors: they end the trial as `EndState::Invalid`.

use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration or input file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Underlying file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings JSON could not be parsed or written
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),

    /// A numeral could not be parsed
    #[error("line {line}: cannot parse number {value:?}")]
    InvalidNumber { line: usize, value: String },

    /// A line has the wrong number of fields
    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedLine {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Sampling intervals must pair one-to-one with waypoints
    #[error("{waypoints} waypoints but {intervals} sampling intervals")]
    LengthMismatch { waypoints: usize, intervals: usize },

    /// Lower bound above upper bound, or a non-finite bound
    #[error("invalid {name} range [{min}, {max}]")]
    InvalidRange { name: &'static str, min: f32, max: f32 },

    /// A parameter that must be strictly positive is not
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    /// Polygon with too few distinct points
    #[error("{what} needs at least 3 points, got {count}")]
    DegeneratePolygon { what: &'static str, count: usize },

    /// Avatar without any waypoint to walk to
    #[error("avatar {avatar} has no waypoints")]
    EmptyWaypoints { avatar: usize },

    /// Initial heading of zero length
    #[error("avatar {avatar} has a zero-length initial forward")]
    ZeroForward { avatar: usize },

    /// Unrecognized strategy, path or space name
    #[error("line {line}: unknown {kind} {value:?}")]
    UnknownChoice {
        line: usize,
        kind: &'static str,
        value: String,
    },

    /// Unrecognized command-file key
    #[error("line {line}: unknown command {key:?}")]
    UnknownCommand { line: usize, key: String },

    /// Command-file entry that needs a preceding `newUser`
    #[error("line {line}: {key:?} before any newUser")]
    NoCurrentAvatar { line: usize, key: String },

    /// Trial closed with no avatars
    #[error("trial has no avatars")]
    NoAvatars,

    /// A file-based choice with no file given
    #[error("{what} selected without a file path")]
    MissingFile { what: &'static str },
}

/// Host misuse of a running simulation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("no trial is running")]
    NoActiveTrial,

    #[error("unknown avatar {0}")]
    UnknownAvatar(usize),
}
