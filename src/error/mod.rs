//! # Error Module
//!
//! Error types for the media archiver.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file failures stay per-file** - batches record them as outcomes,
//!   only fatal conditions surface as `Err`

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Filing error: {0}")]
    Filing(#[from] FilingError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Duplicate detection error: {0}")]
    Dedup(#[from] DedupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Required tool '{tool}' was not found. Install it or set its path in the config.")]
    MissingTool { tool: String },

    #[error("Stopped after error on {path}: {reason}")]
    Aborted { path: PathBuf, reason: String },

    #[error("Run was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during file discovery
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while reading embedded metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No readable metadata in {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Errors that occur while moving a file into the archive
#[derive(Error, Debug)]
pub enum FilingError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy verification failed for {path}: {reason}")]
    Verify { path: PathBuf, reason: String },

    #[error("Failed to remove source {path}: {source}")]
    RemoveSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while invoking the prober
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed on {path}: {stderr}")]
    Failed {
        tool: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("Unexpected {tool} output for {path}: {output:?}")]
    Unparseable {
        tool: String,
        path: PathBuf,
        output: String,
    },
}

/// Errors that occur during video normalization
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to start encoder for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited with status {code:?} for {path}: {stderr}")]
    EncoderFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to prepare output for {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to place output at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encode of {path} was cancelled")]
    Cancelled { path: PathBuf },
}

/// Errors that occur during duplicate detection
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Could not determine duration of {path}")]
    UnknownDuration { path: PathBuf },

    #[error("Failed to delete duplicate {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ArchiveError>;
