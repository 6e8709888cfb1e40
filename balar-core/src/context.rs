// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Ambient per-task context (§4.1).
//!
//! Every cooperative task spawned for a chunk carries two task-local slots:
//! the [`Execution`] it belongs to, and its own processor index within that
//! Execution's current batch. Facades and the scope primitive read both
//! slots implicitly instead of threading them through every call site — the
//! same shape of problem `iota-metrics`' `SERVER_TIMING` task-local solves
//! for request-scoped server timing.

use crate::error::EngineError;
use crate::execution::Execution;

tokio::task_local! {
    static CURRENT_EXECUTION: Execution;
    static CURRENT_PROCESSOR: usize;
}

/// Runs `body` with `execution` installed as the ambient Execution for every
/// task spawned from within it. Restores the prior value (none, in practice,
/// since nested Executions spawn their own fresh chunks) on exit.
pub(crate) async fn enter<F, T>(execution: Execution, body: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT_EXECUTION.scope(execution, body).await
}

/// Runs `body` with `index` installed as the ambient processor index.
pub(crate) async fn enter_processor<F, T>(index: usize, body: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT_PROCESSOR.scope(index, body).await
}

/// The Execution that the calling task is running inside of, if any.
pub fn current() -> Option<Execution> {
    CURRENT_EXECUTION.try_with(|exec| exec.clone()).ok()
}

/// The processor index of the calling task within its Execution's current
/// batch.
///
/// A missing processor index while an Execution *is* ambient signals an
/// engine-internal bug (§4.1): every task spawned by the chunk driver enters
/// both slots together.
pub(crate) fn current_processor() -> Result<usize, EngineError> {
    CURRENT_PROCESSOR
        .try_with(|idx| *idx)
        .map_err(|_| EngineError::Internal("processor index missing from ambient context"))
}
