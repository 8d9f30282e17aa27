// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod binding;
mod config;
mod execution;
mod owner;

pub use binding::{BindingError, SequenceError};
pub use config::ConfigError;
pub use execution::{AggregateFailure, ExecutionError, FailureStrategy, InvocationFailure};
pub use owner::OwnerError;
