// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Per-checkpoint batch accumulator (§3 "Batch entry", §4.5).
//!
//! Every distinct `(operation-id, extra-args fingerprint)` observed during a
//! chunk gets exactly one [`BatchEntry`]: an ordered, deduplicated set of
//! inputs and a single [`Deferred`] that the drain resolves with the
//! underlying bulk function's input→output mapping.
//!
//! The checkpoint cache holds entries for many distinct operations at once,
//! each with its own concrete `In`/`Out`/bulk-function type, so entries are
//! stored behind `Box<dyn BatchCacheEntry>`: the trait gives the cache a
//! uniform handle for registration (`as_any_mut`, downcast by whoever knows
//! the concrete types for this key) and for draining (a virtual method that
//! needs no downcast at all, since the `impl` block already closes over the
//! concrete types).

use std::any::Any;
use std::hash::Hash;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use indexmap::IndexSet;
use tracing::warn;

use crate::deferred::Deferred;
use crate::error::{EngineError, EngineSignal};

/// A user-supplied bulk function: resolves a list of inputs into either a
/// full input→output mapping or an output sequence aligned 1:1 with the
/// input order.
///
/// Implemented automatically for any `Fn(Vec<In>) -> Fut` closure, mirroring
/// [`crate::processor::Processor`]'s blanket impl.
pub trait BulkFn<In, Out>: 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn call(
        &self,
        inputs: Vec<In>,
    ) -> LocalBoxFuture<'static, Result<BulkOutcome<In, Out>, Self::Error>>;
}

/// The two response shapes a bulk function may return (§4.3 "Drain").
///
/// A `Sequence` whose length does not match the request is treated as a
/// `StopAll`-class failure rather than silently truncated or padded.
pub enum BulkOutcome<In, Out> {
    Mapping(indexmap::IndexMap<In, Out>),
    Sequence(Vec<Out>),
}

impl<In, Out, F, Fut, Err> BulkFn<In, Out> for F
where
    F: Fn(Vec<In>) -> Fut + 'static,
    Fut: std::future::Future<Output = Result<BulkOutcome<In, Out>, Err>> + 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    type Error = Err;

    fn call(
        &self,
        inputs: Vec<In>,
    ) -> LocalBoxFuture<'static, Result<BulkOutcome<In, Out>, Err>> {
        Box::pin((self)(inputs))
    }
}

/// What every waiter on a batch entry eventually receives: the resolved
/// input→output mapping, shared cheaply via `Rc` since several processors
/// typically await the same entry.
pub(crate) type BatchCall<In, Out> =
    Rc<Deferred<Result<Rc<indexmap::IndexMap<In, Out>>, EngineSignal>>>;

pub(crate) struct BatchEntry<In, Out, B> {
    pub(crate) fn_: Rc<B>,
    pub(crate) input: IndexSet<In>,
    pub(crate) call: BatchCall<In, Out>,
}

/// Type-erased handle the checkpoint cache stores, so that one `HashMap` can
/// hold entries for operations with unrelated `In`/`Out` types.
pub(crate) trait BatchCacheEntry {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Invokes the underlying bulk function once with this checkpoint's
    /// accumulated inputs and resolves the entry's `Deferred` with the
    /// outcome. Never panics and never leaves the `Deferred` unresolved.
    fn drain(self: Box<Self>) -> LocalBoxFuture<'static, ()>;

    /// Rejects the entry's `Deferred` with a force-fail signal without
    /// calling the bulk function at all (§4.3 force-fail path).
    fn force_fail(self: Box<Self>, err: EngineError);
}

impl<In, Out, B> BatchCacheEntry for BatchEntry<In, Out, B>
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    B: BulkFn<In, Out>,
{
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn drain(self: Box<Self>) -> LocalBoxFuture<'static, ()> {
        Box::pin(async move {
            let inputs: Vec<In> = self.input.into_iter().collect();
            let requested = inputs.len();
            let resolved = match self.fn_.call(inputs.clone()).await {
                Ok(BulkOutcome::Mapping(map)) => Ok(Rc::new(map)),
                Ok(BulkOutcome::Sequence(values)) if values.len() == requested => {
                    Ok(Rc::new(inputs.into_iter().zip(values).collect()))
                }
                Ok(BulkOutcome::Sequence(values)) => {
                    let got = values.len();
                    warn!(
                        requested,
                        got, "bulk function returned a mismatched result length; force-failing the chunk"
                    );
                    Err(EngineSignal::StopAll(EngineError::ResultShape {
                        expected: requested,
                        got,
                    }))
                }
                Err(err) => Err(EngineSignal::Bulk(std::sync::Arc::new(err))),
            };
            self.call.resolve(resolved);
        })
    }

    fn force_fail(self: Box<Self>, err: EngineError) {
        self.call.resolve(Err(EngineSignal::StopAll(err)));
    }
}
