// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for owner tree lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// All children of an owner node are open.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_benchtop::observability::messages::owner::OwnerOpened;
/// use std::time::Duration;
///
/// let msg = OwnerOpened {
///     owner: "bench",
///     child_count: 3,
///     duration: Duration::from_millis(420),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct OwnerOpened<'a> {
    pub owner: &'a str,
    pub child_count: usize,
    pub duration: Duration,
}

impl Display for OwnerOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Opened '{}' with {} children in {:?}",
            self.owner, self.child_count, self.duration
        )
    }
}

impl StructuredLog for OwnerOpened<'_> {
    fn log(&self) {
        tracing::info!(
            owner = self.owner,
            child_count = self.child_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "owner_open",
            span_name = name,
            owner = self.owner,
            child_count = self.child_count,
        )
    }
}

/// Opening failed; children opened by the attempt are being closed again.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct OpenRollingBack<'a> {
    pub owner: &'a str,
    pub opened_count: usize,
}

impl Display for OpenRollingBack<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Opening '{}' failed; closing {} already-opened children",
            self.owner, self.opened_count
        )
    }
}

impl StructuredLog for OpenRollingBack<'_> {
    fn log(&self) {
        tracing::error!(
            owner = self.owner,
            opened_count = self.opened_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "owner_rollback",
            span_name = name,
            owner = self.owner,
            opened_count = self.opened_count,
        )
    }
}

/// A close issued during rollback failed. Logged only; the open failure is what gets returned.
///
/// # Log Level
/// `warn!` - Secondary failure
pub struct RollbackCloseFailed<'a> {
    pub path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for RollbackCloseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Closing '{}' during rollback failed: {}",
            self.path, self.error
        )
    }
}

impl StructuredLog for RollbackCloseFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            path = self.path,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "rollback_close_failed",
            span_name = name,
            path = self.path,
        )
    }
}

/// Owner node closed (all children attempted).
///
/// # Log Level
/// `info!` when every child closed, `error!` otherwise
pub struct OwnerClosed<'a> {
    pub owner: &'a str,
    pub child_count: usize,
    pub failure_count: usize,
}

impl Display for OwnerClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Closed '{}': {} children attempted, {} failed",
            self.owner, self.child_count, self.failure_count
        )
    }
}

impl StructuredLog for OwnerClosed<'_> {
    fn log(&self) {
        if self.failure_count > 0 {
            tracing::error!(
                owner = self.owner,
                child_count = self.child_count,
                failure_count = self.failure_count,
                "{}", self
            );
        } else {
            tracing::info!(
                owner = self.owner,
                child_count = self.child_count,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "owner_close",
            span_name = name,
            owner = self.owner,
            child_count = self.child_count,
        )
    }
}

/// A scope guard was dropped without `exit()` and its close failed.
///
/// # Log Level
/// `error!` - The error cannot be returned from `Drop`
pub struct ScopeCloseFailed<'a> {
    pub owner: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ScopeCloseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Closing '{}' on scope exit failed: {}",
            self.owner, self.error
        )
    }
}

impl StructuredLog for ScopeCloseFailed<'_> {
    fn log(&self) {
        tracing::error!(
            owner = self.owner,
            error = ?self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "scope_close_failed",
            span_name = name,
            owner = self.owner,
        )
    }
}

/// A node moved to a new parent; its name path changed.
///
/// # Log Level
/// `debug!` - Diagnostic detail
pub struct OwnershipTransferred<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl Display for OwnershipTransferred<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Resource '{}' is now '{}'", self.from, self.to)
    }
}

impl StructuredLog for OwnershipTransferred<'_> {
    fn log(&self) {
        tracing::debug!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "ownership_transfer",
            span_name = name,
            from = self.from,
            to = self.to,
        )
    }
}
