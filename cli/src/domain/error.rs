//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;
use vmops_common::PowerState;

use crate::domain::fault::{Fault, FaultKind};

// ── Error classification ──────────────────────────────────────────────────────

/// Coarse category of an orchestration failure, used by callers to decide
/// whether a retry or a different request could succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials rejected or session could not be re-established.
    AuthExpired,
    /// Target already exists.
    Conflict,
    /// Endpoint overloaded or transport dropped; retry budget exhausted.
    Overload,
    /// The request itself was wrong; retrying will not help.
    CallerError,
    /// A server-side task finished in the error state.
    TaskFailure,
    /// Named object does not exist on the endpoint.
    NotFound,
    /// A task did not reach a terminal state before the deadline.
    Timeout,
    Other,
}

impl ErrorKind {
    /// Stable snake-case code used in machine-readable output.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Overload => "overload",
            ErrorKind::CallerError => "caller_error",
            ErrorKind::TaskFailure => "task_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
        }
    }
}

// ── Orchestration errors ──────────────────────────────────────────────────────

/// Errors surfaced by session, task and VM lifecycle services.
#[derive(Debug, Error)]
pub enum VmopsError {
    #[error("remote call failed: {0}")]
    Remote(#[from] Fault),

    #[error("login to {endpoint} failed: {source}")]
    LoginFailed {
        endpoint: String,
        #[source]
        source: Fault,
    },

    #[error("task {task} failed: {message}")]
    TaskFailure { task: String, message: String },

    #[error("task {task} did not finish within {}s", waited.as_secs())]
    TaskTimeout { task: String, waited: Duration },

    #[error("instance '{0}' already exists")]
    InstanceExists(String),

    #[error("{what} '{name}' not found")]
    NotFound { what: &'static str, name: String },

    #[error("cannot {action} instance '{name}' while it is {state}")]
    InvalidPowerState {
        action: &'static str,
        name: String,
        state: PowerState,
    },

    #[error("port group '{port_group}' is tagged with VLAN {actual}, expected {expected}")]
    VlanMismatch {
        port_group: String,
        expected: u16,
        actual: u16,
    },

    #[error("malformed {what}: {detail}")]
    Malformed { what: String, detail: String },

    #[error("image transfer failed: {0}")]
    Transfer(String),
}

impl VmopsError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn malformed(what: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Malformed {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    /// Category of this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Remote(fault) => match fault.kind {
                FaultKind::NotAuthenticated => ErrorKind::AuthExpired,
                FaultKind::AlreadyExists => ErrorKind::Conflict,
                FaultKind::Overloaded => ErrorKind::Overload,
                FaultKind::CallerError => ErrorKind::CallerError,
                FaultKind::Other => ErrorKind::Other,
            },
            Self::LoginFailed { .. } => ErrorKind::AuthExpired,
            Self::TaskFailure { .. } => ErrorKind::TaskFailure,
            Self::TaskTimeout { .. } => ErrorKind::Timeout,
            Self::InstanceExists(_) => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidPowerState { .. } | Self::VlanMismatch { .. } => ErrorKind::CallerError,
            Self::Malformed { .. } | Self::Transfer(_) => ErrorKind::Other,
        }
    }

    /// The remote fault behind this error, when there is one.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Remote(fault) | Self::LoginFailed { source: fault, .. } => Some(fault),
            _ => None,
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
