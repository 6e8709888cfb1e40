// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Engine-internal error taxonomy.
//!
//! These errors never originate from a processor's own business logic —
//! they describe failures of the scheduler itself (missing ambient context,
//! a broken invariant, a bulk function returning a malformed result shape).
//! A [`StopAll`](EngineError::ResultShape)-class error is the only kind that
//! forces an entire chunk to abort rather than being reported against a
//! single input; see [`EngineSignal`] for how it and ordinary bulk failures
//! reach processor code.

use std::sync::Arc;

pub type EngineResult<T, E = EngineError> = core::result::Result<T, E>;

/// A bulk function's own declared error, type-erased so the engine can
/// carry it without knowing the concrete error type of every registered
/// operation. `Arc` keeps it cheaply cloneable, which every waiter on a
/// batch's [`crate::deferred::Deferred`] needs.
pub type BulkError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("wrapped call or scope call invoked with no ambient Execution")]
    OutsideContext,

    #[error("internal scheduler invariant violated: {0}")]
    Internal(&'static str),

    #[error(
        "bulk function returned {got} results for {expected} requested inputs; \
         treating the batch as a StopAll failure"
    )]
    ResultShape { expected: usize, got: usize },
}

impl EngineError {
    /// Whether this error is of the reserved `StopAll` class (§7/§9): it
    /// corrupts the correspondence between inputs and outputs for the whole
    /// chunk, rather than merely failing the items that awaited it.
    pub fn is_stop_all(&self) -> bool {
        matches!(self, EngineError::ResultShape { .. })
    }
}

/// What a wrapped call or scope call can hand back to processor code when it
/// is not caught and converted into the processor's own error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineSignal {
    /// The underlying bulk function itself returned an error. Ordinary
    /// propagation: becomes a per-item error for every waiter, the run
    /// continues for everything else.
    #[error("bulk operation failed: {0}")]
    Bulk(#[source] BulkError),

    /// A `StopAll`-class engine error. Force-fails the whole chunk.
    #[error(transparent)]
    StopAll(#[from] EngineError),
}

/// The error a processor observes when it propagates a wrapped call's
/// failure with `?` instead of catching it. Mirrors the source
/// specification's "errors map values are the original thrown/rejected
/// object": either the processor's own declared error, or an engine signal
/// it chose not to handle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessError<E> {
    #[error(transparent)]
    User(E),
    #[error(transparent)]
    Engine(#[from] EngineSignal),
}

impl<E> From<BulkError> for ProcessError<E> {
    fn from(err: BulkError) -> Self {
        ProcessError::Engine(EngineSignal::Bulk(err))
    }
}
