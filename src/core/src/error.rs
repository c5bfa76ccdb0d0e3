//! Error handling for the CRM job runner.
//!
//! This module provides:
//! - Machine-readable error codes for every failure class the runner knows
//! - User-friendly messages vs detailed internal messages
//! - Retryability classification (connectivity failures are retried by the
//!   next scheduled tick, never within a run)
//! - Error logging with tracing integration
//!
//! # Usage
//!
//! ```rust,ignore
//! use crmrund_core::error::{CrmError, ErrorCode, Result};
//!
//! fn lookup(id: &str) -> Result<Customer> {
//!     store.get(id).ok_or_else(|| CrmError::not_found("customer", id))
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for job-runner operations.
pub type Result<T> = std::result::Result<T, CrmError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and show up in log output, so operators can grep for
/// them across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Data Service errors (1000-1099)
    DataServiceUnreachable,
    QueryFailed,
    MutationFailed,
    RecordNotFound,

    // Validation errors (2000-2099)
    ValidationFailed,

    // Scheduling errors (3000-3099)
    InvalidSchedule,

    // Sink errors (4000-4099)
    SinkIo,

    // Serialization errors (5000-5099)
    SerializationError,

    // Configuration errors (6000-6099)
    ConfigurationError,

    // Internal errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::DataServiceUnreachable => 1000,
            Self::QueryFailed => 1001,
            Self::MutationFailed => 1002,
            Self::RecordNotFound => 1003,

            Self::ValidationFailed => 2000,

            Self::InvalidSchedule => 3000,

            Self::SinkIo => 4000,

            Self::SerializationError => 5000,

            Self::ConfigurationError => 6000,

            Self::InternalError => 9000,
        }
    }

    /// Check if this error is retryable on a later tick.
    ///
    /// Connectivity and transient query failures resolve themselves when the
    /// Data Service comes back; validation and configuration problems do not.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DataServiceUnreachable | Self::QueryFailed | Self::MutationFailed | Self::SinkIo
        )
    }

    /// Check if this error is fatal for the whole invocation.
    ///
    /// A fatal error aborts the current run and surfaces as a non-zero exit
    /// code; anything else is handled at item scope.
    pub const fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::DataServiceUnreachable | Self::ConfigurationError | Self::InvalidSchedule
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "data_service",
            2000..=2099 => "validation",
            3000..=3099 => "scheduling",
            4000..=4099 => "sink",
            5000..=5099 => "serialization",
            6000..=6099 => "configuration",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Field Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A single field-level validation failure returned by the Data Service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// The entity field that failed validation
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the job runner.
///
/// Carries a structured code, a user-facing message safe for log files the
/// operators read, an optional internal message for process diagnostics, and
/// field-level validation details when a mutation was rejected.
#[derive(Error, Debug)]
pub struct CrmError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe for job log sinks)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for process logging only)
    internal_message: Option<String>,

    /// Field-level validation errors, when the Data Service rejected input
    field_errors: Vec<FieldError>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if !self.field_errors.is_empty() {
            let fields: Vec<String> = self.field_errors.iter().map(|e| e.to_string()).collect();
            write!(f, " ({})", fields.join("; "))?;
        }
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl CrmError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            field_errors: Vec::new(),
            source: None,
        }
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create a Data-Service-unreachable error (fatal for the run).
    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::DataServiceUnreachable,
            "Data Service unreachable",
            detail,
        )
    }

    /// Create a not found error.
    pub fn not_found(entity_type: &str, entity_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::RecordNotFound,
            format!("{} not found: {}", entity_type, entity_id),
        )
    }

    /// Create a validation error with field-level details.
    pub fn validation(
        message: impl Into<Cow<'static, str>>,
        field_errors: Vec<FieldError>,
    ) -> Self {
        let mut error = Self::new(ErrorCode::ValidationFailed, message);
        error.field_errors = field_errors;
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the field-level validation errors.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Check if this error is retryable on a later tick.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Check if this error aborts the whole invocation.
    pub fn is_fatal_for_run(&self) -> bool {
        self.code.is_fatal_for_run()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error through tracing at a severity matching its code.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        if self.is_fatal_for_run() {
            error!(
                error_code = %code,
                category = category,
                user_message = %self.user_message,
                internal_message = ?self.internal_message,
                source = ?self.source,
                "Fatal job error"
            );
        } else {
            warn!(
                error_code = %code,
                category = category,
                user_message = %self.user_message,
                internal_message = ?self.internal_message,
                "Job error"
            );
        }
    }
}

impl From<std::io::Error> for CrmError {
    fn from(e: std::io::Error) -> Self {
        Self::with_internal(ErrorCode::SinkIo, "Log sink I/O failed", e.to_string()).with_source(e)
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::SerializationError,
            "Serialization failed",
            e.to_string(),
        )
        .with_source(e)
    }
}

impl From<reqwest::Error> for CrmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::unreachable(e.to_string()).with_source(e)
        } else {
            Self::with_internal(ErrorCode::QueryFailed, "Data Service request failed", e.to_string())
                .with_source(e)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context Extension
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for attaching context to results.
pub trait ErrorContext<T> {
    /// Attach a user-facing message and error code.
    fn context_code(self, code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context_code(self, code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Result<T> {
        self.map_err(|e| CrmError::new(code, message).with_source(e))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
