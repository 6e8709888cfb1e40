// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Engine-facing run configuration (§4.2, §6).
//!
//! The engine has no deployment surface of its own — no file, no env, no
//! CLI (§6) — so `RunOptions` is plain in-process configuration, supplied
//! directly by the embedding application at each `run` call site.

use std::num::NonZeroUsize;

/// Options accepted by [`crate::run`].
///
/// `logger` from the distilled spec is not a separate field here: logging
/// is ambient via `tracing` (§10.2), the same way every other crate in this
/// repository leaves subscriber wiring to the embedding binary rather than
/// threading a sink through call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Caps how many processors run concurrently per chunk. `None` means
    /// the whole deduplicated input set runs as a single chunk.
    pub concurrency: Option<NonZeroUsize>,
}

impl RunOptions {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency: NonZeroUsize::new(concurrency),
        }
    }
}
