// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Resource implementations.
//!
//! ## Simulated Backend
//! [`simulated::SimulatedInstrument`] is an in-memory instrument with scripted
//! operations, open delays and injected open/close failures. It backs the test suite
//! and the demo binary; real drivers implement [`crate::traits::Resource`] the same way.

pub mod simulated;
