// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while binding a sequence to an owner and while routing call arguments.

use thiserror::Error;

use super::ExecutionError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("step '{step}' is declared more than once")]
    DuplicateStep { step: String },

    #[error("step '{step}' has no targets")]
    EmptyStep { step: String },

    #[error("step '{step}' references unknown resource '{resource}'")]
    UnknownResource { step: String, resource: String },

    #[error("step '{step}': resource '{resource}' has no operation '{operation}'")]
    UnknownOperation {
        step: String,
        resource: String,
        operation: String,
    },

    /// Two targets in one step resolve to the same display name
    #[error("step '{step}' contains '{name}' more than once")]
    NameCollision { step: String, name: String },

    /// A step-scoped argument name is also a plain parameter or another step's scoped name
    #[error("argument name '{argument}' is ambiguous")]
    AmbiguousArgument { argument: String },

    #[error("argument '{argument}' does not match any parameter")]
    UnknownArgument { argument: String },

    #[error("step '{step}': '{target}' requires argument '{parameter}'")]
    MissingArgument {
        step: String,
        target: String,
        parameter: String,
    },
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// A step's batch failed; later steps did not run
    #[error("step '{step}' failed")]
    Step {
        step: String,
        #[source]
        source: ExecutionError,
    },
}

impl SequenceError {
    /// The step that stopped the sequence, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            SequenceError::Step { step, .. } => Some(step),
            SequenceError::Binding(_) => None,
        }
    }
}
