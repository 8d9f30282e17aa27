// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cancel;
pub mod executor;
pub mod invocation;
pub mod retry;

pub use cancel::{CancelToken, Cancelled};
pub use executor::{
    run_concurrent, run_sequential, BatchReport, ExecutionMode, ExecutionResult, Executor, Results,
};
pub use invocation::{Batch, Invocation};
pub use retry::{retry, until_timeout, RetryPolicy};
