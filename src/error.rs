//! Error types and diagnostics for x-type translation and resolution.
//!
//! Two failure classes exist (and only two): recoverable problems are
//! *reported* as [`Diagnostic`]s and resolved to a safe fallback value, so
//! a document pass always produces output; programmer errors — a malformed
//! type tree that the algebra's invariants rule out for well-formed input —
//! are raised as typed errors and abort the enclosing pass.

use std::path::PathBuf;
use thiserror::Error;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single advisory diagnostic emitted during translation or resolution.
///
/// Diagnostics never abort a pass: the node that produced one has already
/// been resolved to a fallback value (`any` for missing information,
/// `undefined` for incompatible constraints, pass-through otherwise).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `"circular-ref"`.
    pub code: String,
    /// JSON path to the node that produced the diagnostic, when known.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.path.is_empty() {
            write!(f, "{tag}[{}]: {}", self.code, self.message)
        } else {
            write!(f, "{tag}[{}] at {}: {}", self.code, self.path, self.message)
        }
    }
}

/// Fatal errors during Schema→XType translation.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("cannot translate schema at {path}: expected an object, got {actual}")]
    UnsupportedNode { path: String, actual: String },

    #[error("object-like schema at {path} produced neither fields nor an array form")]
    EmptyObjectLike { path: String },
}

/// Fatal errors during resolution and merging.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot merge {left} & {right}")]
    UnmergeableShapes { left: String, right: String },

    #[error("unconsumed discriminated-union annotation reached the resolver for '{name}'")]
    UnconsumedUnion { name: String },
}

/// Fatal errors during XType→Schema rendering.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("unconsumed discriminated-union annotation reached the renderer for '{name}'")]
    UnconsumedUnion { name: String },
}

/// Errors while loading or transforming a whole document.
#[derive(Debug, Error)]
pub enum DocumentError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Transformation errors (exit code 2)
    #[error("no x-type named '{name}' in components/x-types")]
    UnknownType { name: String },

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Errors during payload validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl DocumentError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DocumentError::FileNotFound { .. }
            | DocumentError::ReadError { .. }
            | DocumentError::WriteError { .. } => 3,
            _ => 2,
        }
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Document(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}
