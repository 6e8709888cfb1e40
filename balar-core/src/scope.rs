// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Per-checkpoint nested-scope accumulator (§3 "Scope entry", §4.4).
//!
//! Unlike a batch entry, a scope entry's inputs are a plain `Vec` —
//! duplicates are preserved, since a caller opening the same nested scope
//! twice in one checkpoint observes its own duplicate inputs back. The
//! derived `fn_by_input` map is keyed by input and therefore naturally
//! unique, which is exactly what the chunk driver of the nested `Execution`
//! needs to pick a processor per input.

use std::any::Any;
use std::hash::Hash;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;

use crate::deferred::Deferred;
use crate::execution::ProcessorSource;
use crate::options::RunOptions;
use crate::outcome::RunOutcome;
use crate::processor::Processor;

pub(crate) type ScopeCall<In, Out, E> = Rc<Deferred<Rc<RunOutcome<In, Out, E>>>>;

pub(crate) struct ScopeEntry<In, Out, E> {
    pub(crate) input: Vec<In>,
    pub(crate) fn_by_input: IndexMap<In, Rc<dyn Processor<In, Out, E>>>,
    pub(crate) call: ScopeCall<In, Out, E>,
}

/// Type-erased handle the scope cache stores (same rationale as
/// [`crate::batch::BatchCacheEntry`]).
pub(crate) trait ScopeCacheEntry {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Spawns the nested `Execution` for this partition and forwards its
    /// structured outcome into the entry's `Deferred`. Never rejects: a
    /// nested scope's own `StopAll` is reported *inside* the outcome
    /// (§9, "propagation into the outer run as a user error").
    fn drain(self: Box<Self>, opts: RunOptions) -> LocalBoxFuture<'static, ()>;
}

impl<In, Out, E> ScopeCacheEntry for ScopeEntry<In, Out, E>
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    E: 'static,
{
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn drain(self: Box<Self>, opts: RunOptions) -> LocalBoxFuture<'static, ()> {
        Box::pin(async move {
            let outcome = crate::execution::run_with_processors(
                self.input,
                ProcessorSource::ByInput(self.fn_by_input),
                opts,
            )
            .await;
            self.call.resolve(Rc::new(outcome));
        })
    }
}
