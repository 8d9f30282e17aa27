// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::OwnerError;
use crate::observability::messages::owner::ScopeCloseFailed;
use crate::observability::messages::StructuredLog;
use crate::owner::tree::Owner;

/// Guard returned by [`Owner::enter`].
///
/// Closes the owner exactly once: explicitly through [`OwnerScope::exit`], which reports
/// close failures, or on drop, which can only log them.
pub struct OwnerScope<'a> {
    owner: &'a Owner,
    closed: bool,
}

impl<'a> OwnerScope<'a> {
    pub(crate) fn new(owner: &'a Owner) -> Self {
        Self {
            owner,
            closed: false,
        }
    }

    pub fn owner(&self) -> &'a Owner {
        self.owner
    }

    /// Close the owner and report any close failures.
    pub fn exit(mut self) -> Result<(), OwnerError> {
        self.closed = true;
        self.owner.close()
    }
}

impl std::ops::Deref for OwnerScope<'_> {
    type Target = Owner;

    fn deref(&self) -> &Owner {
        self.owner
    }
}

impl Drop for OwnerScope<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.owner.close() {
            ScopeCloseFailed {
                owner: self.owner.name(),
                error: &e,
            }
            .log();
        }
    }
}
