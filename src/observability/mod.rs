// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic event the crate emits is a message struct with a `Display`
//! implementation and a [`messages::StructuredLog`] implementation that attaches the
//! same data as `tracing` fields. This keeps log text in one place and gives
//! subscribers machine-readable fields.
//!
//! # Usage
//!
//! ```rust
//! use the_benchtop::observability::messages::executor::BatchStarted;
//! use the_benchtop::observability::messages::StructuredLog;
//!
//! let msg = BatchStarted {
//!     mode: "concurrent",
//!     invocation_count: 3,
//! };
//!
//! msg.log();
//! ```

pub mod messages;
