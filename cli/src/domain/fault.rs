//! Classification of remote faults.
//!
//! Every failure of a remote call is reduced to a [`Fault`]: the identifiers
//! the endpoint reported plus a human-readable detail, tagged with the
//! [`FaultKind`] that drives the session's retry decision.

use std::fmt;

use thiserror::Error;

// ── Fault identifiers ─────────────────────────────────────────────────────────

pub const NOT_AUTHENTICATED: &str = "NotAuthenticated";
pub const ALREADY_EXISTS: &str = "AlreadyExists";

const CONFLICT_FAULTS: &[&str] = &[ALREADY_EXISTS, "DuplicateName"];

const CALLER_FAULTS: &[&str] = &[
    "InvalidArgument",
    "InvalidRequest",
    "InvalidType",
    "InvalidProperty",
    "MethodNotFound",
    "ManagedObjectNotFound",
];

/// Transport failures that indicate an overloaded or flapping endpoint.
const OVERLOAD_MARKERS: &[&str] = &[
    "Address already in use",
    "Software caused connection abort",
    "Connection reset by peer",
    "Response is \"text/html\", not \"text/xml\"",
    "error sending request",
];

/// Retry-relevant category of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    NotAuthenticated,
    AlreadyExists,
    Overloaded,
    CallerError,
    Other,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::NotAuthenticated => "not authenticated",
            FaultKind::AlreadyExists => "already exists",
            FaultKind::Overloaded => "endpoint overloaded",
            FaultKind::CallerError => "invalid request",
            FaultKind::Other => "fault",
        })
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct Fault {
    pub kind: FaultKind,
    /// Fault type identifiers reported by the endpoint, in order.
    pub faults: Vec<String>,
    pub detail: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.faults.is_empty() {
            write!(f, "{}: {}", self.kind, self.detail)
        } else {
            write!(f, "{} [{}]: {}", self.kind, self.faults.join(", "), self.detail)
        }
    }
}

impl Fault {
    /// Builds a fault from the identifiers of a server-side fault response.
    #[must_use]
    pub fn from_server(faults: Vec<String>, detail: impl Into<String>) -> Self {
        let kind = classify_server_faults(&faults);
        Self {
            kind,
            faults,
            detail: detail.into(),
        }
    }

    /// Builds a fault from a transport-level error message.
    #[must_use]
    pub fn from_transport(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let kind = if is_overload_signal(&detail) {
            FaultKind::Overloaded
        } else {
            FaultKind::Other
        };
        Self {
            kind,
            faults: Vec::new(),
            detail,
        }
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::from_server(vec![NOT_AUTHENTICATED.to_string()], "session is not authenticated")
    }

    #[must_use]
    pub fn already_exists(detail: impl Into<String>) -> Self {
        Self::from_server(vec![ALREADY_EXISTS.to_string()], detail)
    }

    #[must_use]
    pub fn overloaded(detail: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Overloaded,
            faults: Vec::new(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn caller(detail: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::CallerError,
            faults: Vec::new(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn other(detail: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Other,
            faults: Vec::new(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn is(&self, kind: FaultKind) -> bool {
        self.kind == kind
    }
}

// ── Classification ────────────────────────────────────────────────────────────

/// Classifies a server fault list. Authentication wins over everything else.
#[must_use]
pub fn classify_server_faults(faults: &[String]) -> FaultKind {
    let has = |names: &[&str]| faults.iter().any(|f| names.contains(&f.as_str()));
    if has(&[NOT_AUTHENTICATED]) {
        FaultKind::NotAuthenticated
    } else if has(CONFLICT_FAULTS) {
        FaultKind::AlreadyExists
    } else if has(CALLER_FAULTS) {
        FaultKind::CallerError
    } else {
        FaultKind::Other
    }
}

/// Whether a transport error message matches a known overload signal.
#[must_use]
pub fn is_overload_signal(detail: &str) -> bool {
    OVERLOAD_MARKERS.iter().any(|marker| detail.contains(marker))
}
