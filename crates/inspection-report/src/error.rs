//! Error types for report generation.

use std::path::PathBuf;

use thiserror::Error;
use word_com_protocol::{FaultKind, ObjectId};

/// Faults raised by an automation backend.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("WINE not found. Install WINE and ensure 'wine' is in PATH.")]
    WineNotFound,

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Bridge returned error ({kind:?}): {message}")]
    Bridge { kind: FaultKind, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown automation object {0}")]
    UnknownObject(ObjectId),

    #[error("Automation call '{member}' failed: {message}")]
    Call { member: String, message: String },

    #[error("'{member}' returned {found} where an object was expected")]
    NotAnObject { member: String, found: String },
}

impl AutomationError {
    pub(crate) fn call(member: &str, message: impl Into<String>) -> Self {
        AutomationError::Call {
            member: member.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed forced termination.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// No termination handle could be acquired; the process has usually exited already.
    #[error("No process with id {0} could be opened")]
    NotFound(u32),

    #[error("Terminating process {pid} failed: {message}")]
    TerminateFailed { pid: u32, message: String },

    #[error(transparent)]
    Automation(#[from] AutomationError),
}

/// Failures of a report generation.
///
/// `CellFillFailed` and `ProcessTerminationFailed` are only ever logged; the
/// remaining kinds abort the run they occur in.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report request: {0}")]
    InvalidRequest(String),

    #[error("Template not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("Could not start the document application: {0}")]
    LaunchFailed(String),

    #[error("Could not open the template document: {0}")]
    DocumentOpenFailed(String),

    #[error("Bookmark '{0}' does not exist in the document")]
    AnchorMissing(String),

    #[error("Bookmark '{name}' is not inside a table: {detail}")]
    NotInTable { name: String, detail: String },

    #[error("Inserting table row {index} failed: {source}")]
    RowInsertFailed {
        index: usize,
        #[source]
        source: AutomationError,
    },

    #[error("Writing cell ({row}, {col}) failed: {source}")]
    CellFillFailed {
        row: i32,
        col: i32,
        #[source]
        source: AutomationError,
    },

    #[error("Saving the report to {} failed: {source}", path.display())]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: AutomationError,
    },

    #[error("Could not create output directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not terminate process {pid}: {source}")]
    ProcessTerminationFailed {
        pid: u32,
        #[source]
        source: ProcessError,
    },

    #[error("Automation failure: {0}")]
    Automation(#[from] AutomationError),

    #[error("Report generation panicked: {0}")]
    Panicked(String),
}

/// Errors while loading measurement input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed CSV: expected a header line and a data line, found {0} non-empty line(s)")]
    MissingLines(usize),
}

/// Errors while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
