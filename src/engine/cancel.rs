// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cooperative cancellation for long-running invocations.
//!
//! Every batch owns a [`CancelToken`]. While an invocation runs, the executor installs the
//! batch's token as the *current* token of the thread running it, so code deep inside a
//! resource operation can reach it without threading a parameter through every call.
//!
//! Cancellation is advisory. A strict batch cancels its token as soon as one invocation
//! fails; invocations that wait through [`sleep`] or poll [`check`] observe it and exit
//! with [`Cancelled`], everything else runs to completion.
//!
//! Tokens form a chain: a batch started from inside another batch's invocation gets a
//! child token, so cancelling the outer batch reaches the inner one but not the reverse.

use std::cell::RefCell;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::consts::DEFAULT_POLL_INTERVAL_MS;

/// Raised by the wait primitives once the current batch has been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stop requested by the executing batch")]
pub struct Cancelled;

/// Shared stop flag scoped to one batch (and its descendants).
///
/// Wraps a [`CancellationToken`] together with the interval at which [`sleep`] polls it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    token: CancellationToken,
    poll_interval: Duration,
}

impl CancelToken {
    /// A root token with the default poll interval.
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            poll_interval,
        }
    }

    /// A token that is cancelled whenever `self` is, but can also be cancelled on its own.
    pub fn child(&self, poll_interval: Duration) -> Self {
        Self {
            token: self.token.child_token(),
            poll_interval,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT_TOKEN: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Restores the previously installed token on drop.
pub(crate) struct CurrentTokenGuard {
    prev: Option<CancelToken>,
}

impl Drop for CurrentTokenGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_TOKEN.with(|slot| *slot.borrow_mut() = prev);
    }
}

/// Install `token` as the current token of this thread until the guard drops.
pub(crate) fn enter(token: CancelToken) -> CurrentTokenGuard {
    let prev = CURRENT_TOKEN.with(|slot| slot.borrow_mut().replace(token));
    CurrentTokenGuard { prev }
}

/// The token of the batch running on this thread, if any.
pub fn current() -> Option<CancelToken> {
    CURRENT_TOKEN.with(|slot| slot.borrow().clone())
}

/// Return `Err(Cancelled)` if the current batch has asked its invocations to stop.
pub fn check() -> Result<(), Cancelled> {
    match current() {
        Some(token) if token.is_cancelled() => Err(Cancelled),
        _ => Ok(()),
    }
}

/// Block for `duration`, waking every poll interval to see whether the current batch was cancelled.
///
/// Outside of any batch this is a plain `thread::sleep`.
pub fn sleep(duration: Duration) -> Result<(), Cancelled> {
    let Some(token) = current() else {
        thread::sleep(duration);
        return Ok(());
    };

    // No deadline means the duration is too long to represent; wait until cancelled.
    let deadline = Instant::now().checked_add(duration);
    loop {
        if token.is_cancelled() {
            return Err(Cancelled);
        }
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => token.poll_interval(),
        };
        if remaining.is_zero() {
            return Ok(());
        }
        thread::sleep(token.poll_interval().min(remaining));
    }
}

/// Run `f` under a fresh root token so it cannot observe cancellation of the enclosing batch.
///
/// Cleanup paths (closing resources) run shielded: a sibling's failure must not cut them short.
pub fn shielded<T>(f: impl FnOnce() -> T) -> T {
    let poll_interval = current()
        .map(|token| token.poll_interval())
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
    let _guard = enter(CancelToken::with_poll_interval(poll_interval));
    f()
}
