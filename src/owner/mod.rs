// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Resource ownership trees.
//!
//! An owner groups resources (and other owners) so they can be opened and closed as one
//! unit. Trees are declared with [`OwnerSpec`], instantiated into an [`Owner`], and used
//! either through explicit `open`/`close` or through the [`OwnerScope`] guard.

pub mod arena;
mod scope;
mod spec;
mod tree;

pub use arena::{NodeId, ResourceArena};
pub use scope::OwnerScope;
pub use spec::OwnerSpec;
pub use tree::Owner;
