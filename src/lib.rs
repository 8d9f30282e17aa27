// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // resource implementations
pub mod broadcast;  // sequences and argument routing
pub mod config;     // runner config
pub mod engine;     // batch executor and cancellation
pub mod errors;     // error handling
pub mod observability;
pub mod owner;      // resource ownership trees
pub mod traits;     // the Resource abstraction
