// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for owner tree declaration and lifecycle.

use thiserror::Error;

use super::{AggregateFailure, ExecutionError};

#[derive(Debug, Error)]
pub enum OwnerError {
    /// A mandatory slot was left without a resource at instantiation
    #[error("owner '{owner}' requires a resource in slot '{slot}'")]
    MissingChild { owner: String, slot: String },

    /// An assignment, entry order or transfer named a slot the owner does not declare
    #[error("owner '{owner}' has no slot '{slot}'")]
    UnknownSlot { owner: String, slot: String },

    #[error("owner '{owner}' declares slot '{slot}' more than once")]
    DuplicateSlot { owner: String, slot: String },

    /// The same resource instance was placed in two slots
    #[error("resource for '{path}' is already owned at '{owned_by}'")]
    AlreadyOwned { path: String, owned_by: String },

    #[error("no resource at path '{path}'")]
    UnknownResource { path: String },

    /// A transfer would make a node its own ancestor
    #[error("cannot move '{path}' underneath itself")]
    CyclicOwnership { path: String },

    /// Opening the tree failed; every child opened by the attempt was closed again
    #[error("failed to open '{owner}'")]
    Open {
        owner: String,
        #[source]
        source: ExecutionError,
    },

    /// One or more children failed to close; every child was still attempted
    #[error("failed to close '{owner}'")]
    Close {
        owner: String,
        #[source]
        source: AggregateFailure,
    },
}

impl OwnerError {
    /// Names of the children whose open or close failed.
    pub fn failed_children(&self) -> Vec<&str> {
        match self {
            OwnerError::Open {
                source: ExecutionError::Aggregate(aggregate),
                ..
            } => aggregate.names(),
            OwnerError::Close { source, .. } => source.names(),
            _ => Vec::new(),
        }
    }
}
