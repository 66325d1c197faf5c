//! # Error Handling for the Pyramid Pipeline
//!
//! This module provides the error type shared by every stage of the pyramid
//! build, together with the classification traits the orchestrator uses to
//! decide whether a failed tile aborts the run or is only counted.
//!
//! ## Failure Taxonomy
//!
//! | Variant | Unit of work | Handling |
//! |---------|--------------|----------|
//! | `Config` | whole run | fatal, reported before any work starts |
//! | `Input` | whole run | fatal: numeric inputs, id list or rotation table unusable |
//! | `Selection` | one spatial cell | logged, the cell contributes no representatives |
//! | `Render` | one tile | logged, the tile stays absent (parents treat it as blank) |
//! | `Image` | one tile | decode/encode failure, handled like `Render` |
//! | `Io` | whole run | inputs unreadable or tile output unwritable |
//! | `Manifest` | whole run | serializing or reusing the manifest failed |
//!
//! Degenerate clustering is not an error: it is a defined fallback inside the
//! representative selector.
//!
//! ## Usage
//!
//! ```rust
//! use embedding_pyramid::error::{PyramidError, Recoverable};
//!
//! let error = PyramidError::render((4, 3, -2), "child tile is truncated")
//!     .with_context("downsampling depth 5 into depth 4");
//! assert!(error.is_recoverable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that drop one unit of work
    Error,
    /// Fatal errors that abort the run
    Fatal,
}

/// Core error context containing metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Additional context about the error
    pub context: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether the run can continue without the failed unit of work
    pub recoverable: bool,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::BTreeMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            context: None,
            severity: ErrorSeverity::Error,
            recoverable: false,
            metadata: std::collections::BTreeMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn fatal() -> Self {
        Self {
            severity: ErrorSeverity::Fatal,
            ..Self::default()
        }
    }

    fn per_task() -> Self {
        Self {
            recoverable: true,
            ..Self::default()
        }
    }
}

/// Tile address used in error reports: `(depth, x, y)`.
pub type TileKey = (i32, i64, i64);

/// Base error type for the pyramid pipeline
#[derive(Debug)]
pub enum PyramidError {
    /// Configuration validation errors
    Config {
        field: String,
        reason: String,
        context: ErrorContext,
    },
    /// Unusable top-level inputs (layout, latent codes, ids, rotations)
    Input {
        source_name: String,
        reason: String,
        context: ErrorContext,
    },
    /// Representative selection failed for one cell
    Selection {
        depth: i32,
        cell: (u32, u32),
        reason: String,
        context: ErrorContext,
    },
    /// Compositing one tile failed
    Render {
        tile: TileKey,
        reason: String,
        context: ErrorContext,
    },
    /// Image decode or encode failures
    Image {
        target: String,
        source: image::ImageError,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Manifest serialization errors
    Manifest {
        reason: String,
        source: Option<serde_json::Error>,
        context: ErrorContext,
    },
}

/// Convenience alias used across the crate.
pub type PyramidResult<T> = Result<T, PyramidError>;

impl PyramidError {
    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
            context: ErrorContext::fatal(),
        }
    }

    /// Create an input loading error
    pub fn input(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input {
            source_name: source_name.into(),
            reason: reason.into(),
            context: ErrorContext::fatal(),
        }
    }

    /// Create a per-cell selection error
    pub fn selection(depth: i32, cell: (u32, u32), reason: impl Into<String>) -> Self {
        Self::Selection {
            depth,
            cell,
            reason: reason.into(),
            context: ErrorContext::per_task(),
        }
    }

    /// Create a per-tile render error
    pub fn render(tile: TileKey, reason: impl Into<String>) -> Self {
        Self::Render {
            tile,
            reason: reason.into(),
            context: ErrorContext::per_task(),
        }
    }

    /// Create an image codec error
    pub fn image(target: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            target: target.into(),
            source,
            context: ErrorContext::per_task(),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create a manifest error
    pub fn manifest(reason: impl Into<String>, source: Option<serde_json::Error>) -> Self {
        Self::Manifest {
            reason: reason.into(),
            source,
            context: ErrorContext::fatal(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Mark as fatal
    pub fn fatal(mut self) -> Self {
        let context = self.context_mut();
        context.recoverable = false;
        context.severity = ErrorSeverity::Fatal;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Input { context, .. } => context,
            Self::Selection { context, .. } => context,
            Self::Render { context, .. } => context,
            Self::Image { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Manifest { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Input { context, .. } => context,
            Self::Selection { context, .. } => context,
            Self::Render { context, .. } => context,
            Self::Image { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Manifest { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Input { .. } => "input",
            Self::Selection { .. } => "selection",
            Self::Render { .. } => "render",
            Self::Image { .. } => "image",
            Self::Io { .. } => "io",
            Self::Manifest { .. } => "manifest",
        }
    }
}

impl fmt::Display for PyramidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyramidError::Config { field, reason, .. } => {
                write!(f, "Configuration error in '{}': {}", field, reason)
            }
            PyramidError::Input { source_name, reason, .. } => {
                write!(f, "Failed to load {}: {}", source_name, reason)
            }
            PyramidError::Selection { depth, cell, reason, .. } => write!(
                f,
                "Selection failed at depth {} cell ({}, {}): {}",
                depth, cell.0, cell.1, reason
            ),
            PyramidError::Render { tile, reason, .. } => write!(
                f,
                "Rendering tile ({}, {}, {}) failed: {}",
                tile.0, tile.1, tile.2, reason
            ),
            PyramidError::Image { target, source, .. } => {
                write!(f, "Image error for '{}': {}", target, source)
            }
            PyramidError::Io {
                operation, path, source, ..
            } => match path {
                Some(path) => write!(f, "I/O error during {} ({}): {}", operation, path, source),
                None => write!(f, "I/O error during {}: {}", operation, source),
            },
            PyramidError::Manifest { reason, .. } => write!(f, "Manifest error: {}", reason),
        }?;

        if let Some(context) = &self.context().context {
            write!(f, " [{}]", context)?;
        }
        Ok(())
    }
}

impl StdError for PyramidError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Image { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Manifest {
                source: Some(source),
                ..
            } => Some(source),
            _ => None,
        }
    }
}

/// Trait for errors that can be recovered from by dropping one unit of work
pub trait Recoverable {
    /// Whether the run may continue after this error
    fn is_recoverable(&self) -> bool;
}

impl Recoverable for PyramidError {
    fn is_recoverable(&self) -> bool {
        self.context().recoverable && self.severity() != ErrorSeverity::Fatal
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for PyramidError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}
