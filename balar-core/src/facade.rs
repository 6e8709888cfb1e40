// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Minimal slice of the façade contract (§6, §9 "Wrapped-function façade").
//!
//! The wrapper factories that turn a bulk function or a class instance into
//! a type-directed scalar/list-callable façade are explicitly out of scope
//! (§1): those are thin reflection/codegen adapters produced elsewhere. This
//! module gives processor code (and the test/demo harnesses) the same
//! *mechanism* those factories would generate — a stable operation id and a
//! call into [`Execution::register_call`] — without the macro machinery.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::batch::BulkFn;
use crate::context;
use crate::error::{EngineError, ProcessError};

/// Process-wide counter used as the per-method suffix of an operation id
/// (§3: "a per-method suffix... plus a random prefix distinguishes
/// façades").
static NEXT_SUFFIX: AtomicU64 = AtomicU64::new(0);

/// One bulk operation, wrapped for calling from inside a processor.
///
/// Construct one `Operation` per distinct bulk function and reuse it across
/// every processor invocation in a run — that reuse is exactly what makes
/// the operation id stable, which is what lets the engine coalesce calls
/// into one batch entry per checkpoint.
pub struct Operation<In, Out, B> {
    operation_id: String,
    bulk_fn: Rc<B>,
    _marker: std::marker::PhantomData<(In, Out)>,
}

impl<In, Out, B> Operation<In, Out, B>
where
    In: std::hash::Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    B: BulkFn<In, Out>,
{
    /// Wraps `bulk_fn`, minting a fresh operation id. The fingerprint over
    /// extra arguments (§4.5, §6) is left at the default (empty) — callers
    /// needing per-call extra arguments should capture them in the closure
    /// they pass here, one `Operation` per distinct extra-args value, the
    /// same way the source façade keeps "first-seen extraArgs" per key.
    pub fn new(bulk_fn: B) -> Self {
        let prefix: u64 = rand::thread_rng().gen();
        let suffix = NEXT_SUFFIX.fetch_add(1, Ordering::Relaxed);
        Self {
            operation_id: format!("op:{prefix:x}:{suffix}"),
            bulk_fn: Rc::new(bulk_fn),
            _marker: std::marker::PhantomData,
        }
    }

    /// Calls the operation for a single input, coalescing with every other
    /// call to this operation at the current checkpoint.
    ///
    /// Returns `None` when the bulk function's resolved mapping has no entry
    /// for `input` — the same thing a JS façade observes as `map.get(input)
    /// === undefined` (§6 "Façade contract"). The engine passes every
    /// requested input through without requiring the bulk function to
    /// answer for all of them (§1 Non-goals), so callers that need "missing"
    /// to be a processing error must check for it themselves, the same way
    /// scenario 6 of §8 does.
    pub async fn call(&self, input: In) -> Result<Option<Out>, ProcessError<B::Error>> {
        let results = self.call_many([input.clone()]).await?;
        Ok(results
            .into_iter()
            .find_map(|(k, v)| (k == input).then_some(v)))
    }

    /// Calls the operation for a list of inputs, returning the projection
    /// of the batch's resolved mapping restricted to `inputs`.
    pub async fn call_many(
        &self,
        inputs: impl IntoIterator<Item = In>,
    ) -> Result<Vec<(In, Out)>, ProcessError<B::Error>> {
        let exec = context::current().unwrap_or_else(|| panic!("{}", EngineError::OutsideContext));
        let inputs: Vec<In> = inputs.into_iter().collect();
        let deferred = exec
            .register_call(&self.operation_id, "", self.bulk_fn.clone(), inputs.clone())
            .expect("registering a wrapped call requires an ambient processor index");
        match deferred.wait().await {
            Ok(map) => Ok(inputs
                .into_iter()
                .filter_map(|input| map.get(&input).cloned().map(|out| (input, out)))
                .collect()),
            Err(signal) => Err(ProcessError::Engine(signal)),
        }
    }
}

impl<In, Out, B> Clone for Operation<In, Out, B> {
    fn clone(&self) -> Self {
        Self {
            operation_id: self.operation_id.clone(),
            bulk_fn: self.bulk_fn.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}
