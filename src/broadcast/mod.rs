// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Broadcasting one set of named arguments over ordered steps of resource operations.
//!
//! A [`Sequence`] declares steps of operation references. Binding it to an
//! [`Owner`](crate::owner::Owner) resolves those references and builds the argument
//! routing table, producing a [`BoundCall`]. Each call then routes its arguments by
//! lookup and runs the steps in order.
//!
//! # Argument routing
//!
//! * `{step}_{param}` reaches only the targets of `step` that declare `param`
//! * `{param}` reaches every target declaring `param` that has no scoped value for it
//!
//! Unknown arguments and missing required parameters fail before the first step runs.

mod bound_call;
mod routing;
mod sequence;

#[cfg(test)]
pub mod integration_tests;

pub use bound_call::{BoundCall, SequenceResults, StepObserver};
pub use sequence::{OperationRef, Sequence, Step};
