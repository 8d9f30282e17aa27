// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Messages are organized by subsystem:
//!
//! * `executor` - batch lifecycle, invocation failures, retries
//! * `owner` - owner tree open/close, rollback, ownership changes
//! * `broadcast` - sequence binding and step execution

use tracing::Span;

pub mod broadcast;
pub mod executor;
pub mod owner;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a `tracing` event at its level.
    fn log(&self);

    /// A span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
