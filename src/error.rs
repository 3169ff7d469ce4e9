//! Error types for ferro-gwas
//!
//! Errors fall into two groups:
//! - Absence (`NotFound`), which callers turn into an empty result
//! - Structural problems (bad ranges, unbuildable indexes, missing
//!   collaborators), which are surfaced to the end caller
//!
//! Each variant carries a stable [`ErrorCode`] for programmatic handling.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // Input errors (E1xxx)
    /// Malformed GWAS-VCF content
    MalformedRecord = 1001,
    /// Invalid genomic range
    InvalidRange = 1002,
    /// Invalid argument (e.g., a p-value outside (0, 1])
    InvalidArgument = 1003,

    // Lookup errors (E2xxx)
    /// Identifier or locus not present
    NotFound = 2001,

    // Index errors (E3xxx)
    /// Index or reference could not be built
    BuildFailed = 3001,
    /// Threshold index queried beyond its coverage
    ThresholdExceeded = 3002,
    /// Side-index database error
    DatabaseError = 3003,

    // Collaborator errors (E4xxx)
    /// External tool failed or produced malformed output
    DelegationFailed = 4001,
    /// Requested access path or tool is not configured
    Misconfigured = 4002,

    // Resource errors (E5xxx)
    /// Query exceeded its record or time budget
    BudgetExceeded = 5001,

    // IO errors (E9xxx)
    /// File IO error
    IoError = 9001,
    /// JSON serialization error
    JsonError = 9002,
}

impl ErrorCode {
    /// Get the error code as a string (e.g., "E3002")
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a brief description of this error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::MalformedRecord => "malformed GWAS-VCF record",
            ErrorCode::InvalidRange => "invalid genomic range",
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::NotFound => "identifier or locus not found",
            ErrorCode::BuildFailed => "index or reference build failed",
            ErrorCode::ThresholdExceeded => "threshold beyond index coverage",
            ErrorCode::DatabaseError => "side-index database error",
            ErrorCode::DelegationFailed => "external tool failed",
            ErrorCode::Misconfigured => "access path not configured",
            ErrorCode::BudgetExceeded => "query budget exceeded",
            ErrorCode::IoError => "file I/O error",
            ErrorCode::JsonError => "JSON serialization error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for ferro-gwas operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GwasError {
    /// An index or LD reference cannot be constructed
    #[error("Build error: {msg}")]
    Build { msg: String },

    /// A threshold index was asked for p-values it does not cover
    #[error("Requested threshold {requested} is less stringent than the index coverage {coverage}")]
    ThresholdExceeded { requested: f64, coverage: f64 },

    /// A specific identifier or range yielded no record
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// An external tool exited non-zero or returned malformed output
    #[error("{tool} failed: {msg}")]
    Delegation { tool: String, msg: String },

    /// A requested access path or collaborator is unavailable
    #[error("Configuration error: {msg}")]
    Configuration { msg: String },

    /// Malformed or inconsistent range request
    #[error("Invalid range: {msg}")]
    InvalidRange { msg: String },

    /// Out-of-domain request argument
    #[error("Invalid argument: {msg}")]
    InvalidArgument { msg: String },

    /// Malformed GWAS-VCF content
    #[error("Parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// SQLite side-index error
    #[error("Database error: {msg}")]
    Database { msg: String },

    /// Query exceeded its record count or deadline
    #[error("Query budget exceeded: {msg}")]
    BudgetExceeded { msg: String },

    /// IO error (for file operations)
    #[error("IO error: {msg}")]
    Io { msg: String },

    /// JSON serialization error
    #[error("JSON error: {msg}")]
    Json { msg: String },
}

impl GwasError {
    /// Create a build error
    pub fn build(msg: impl Into<String>) -> Self {
        GwasError::Build { msg: msg.into() }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        GwasError::Configuration { msg: msg.into() }
    }

    /// Create a delegation error for the named tool
    pub fn delegation(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        GwasError::Delegation {
            tool: tool.into(),
            msg: msg.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            GwasError::Build { .. } => ErrorCode::BuildFailed,
            GwasError::ThresholdExceeded { .. } => ErrorCode::ThresholdExceeded,
            GwasError::NotFound { .. } => ErrorCode::NotFound,
            GwasError::Delegation { .. } => ErrorCode::DelegationFailed,
            GwasError::Configuration { .. } => ErrorCode::Misconfigured,
            GwasError::InvalidRange { .. } => ErrorCode::InvalidRange,
            GwasError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            GwasError::Parse { .. } => ErrorCode::MalformedRecord,
            GwasError::Database { .. } => ErrorCode::DatabaseError,
            GwasError::BudgetExceeded { .. } => ErrorCode::BudgetExceeded,
            GwasError::Io { .. } => ErrorCode::IoError,
            GwasError::Json { .. } => ErrorCode::JsonError,
        }
    }

    /// Whether the query planner may retry with the next access path.
    ///
    /// Only applies when the caller did not pin the failing path.
    pub fn is_fallback_permitted(&self) -> bool {
        matches!(
            self,
            GwasError::Delegation { .. }
                | GwasError::ThresholdExceeded { .. }
                | GwasError::Database { .. }
        )
    }

    /// Whether this error only signals absence
    pub fn is_not_found(&self) -> bool {
        matches!(self, GwasError::NotFound { .. })
    }
}

impl From<std::io::Error> for GwasError {
    fn from(err: std::io::Error) -> Self {
        GwasError::Io {
            msg: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for GwasError {
    fn from(err: rusqlite::Error) -> Self {
        GwasError::Database {
            msg: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GwasError {
    fn from(err: serde_json::Error) -> Self {
        GwasError::Json {
            msg: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for GwasError {
    fn from(err: toml::de::Error) -> Self {
        GwasError::Configuration {
            msg: format!("invalid config: {}", err),
        }
    }
}
