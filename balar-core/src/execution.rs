// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The scheduler kernel (§3 "Execution", §4.2–§4.5).
//!
//! One [`Execution`] exists per top-level `run` (and one more per nested
//! scope spawned from it). It owns the checkpoint detector and both
//! per-checkpoint buffers; it is deliberately `Rc<RefCell<_>>` rather than
//! `Arc<Mutex<_>>` because every task that touches it runs cooperatively on
//! a single `tokio::task::LocalSet` (§5) — there is never more than one
//! thread inside this module at a time, so a lock would be pure overhead.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, warn};

use crate::batch::{BatchCacheEntry, BatchCall, BatchEntry, BulkFn};
use crate::context;
use crate::deferred::Deferred;
use crate::error::{EngineError, EngineResult, EngineSignal, ProcessError};
use crate::options::RunOptions;
use crate::outcome::RunOutcome;
use crate::processor::Processor;
use crate::scope::{ScopeCacheEntry, ScopeEntry};

/// The processor a chunk driver runs for a given input: either a single
/// function shared by every input (an ordinary top-level run), or a
/// per-input map inherited from a nested-scope partition (§9, "Nested
/// Execution construction").
pub(crate) enum ProcessorSource<In, Out, E> {
    Single(Rc<dyn Processor<In, Out, E>>),
    ByInput(IndexMap<In, Rc<dyn Processor<In, Out, E>>>),
}

impl<In, Out, E> ProcessorSource<In, Out, E>
where
    In: Hash + Eq,
{
    fn for_input(&self, input: &In) -> Rc<dyn Processor<In, Out, E>> {
        match self {
            ProcessorSource::Single(p) => p.clone(),
            ProcessorSource::ByInput(map) => map
                .get(input)
                .cloned()
                .expect("chunk driver: every input in a recursed-in chunk must own a processor"),
        }
    }
}

struct ExecutionState {
    concurrency: Option<std::num::NonZeroUsize>,
    total_processors: usize,
    done_processors: usize,
    awaiting_processors: HashSet<usize>,
    checkpoint_cache: HashMap<String, Box<dyn BatchCacheEntry>>,
    scope_cache: HashMap<String, Box<dyn ScopeCacheEntry>>,
    next_scope_order_key: HashMap<usize, u64>,
    drain_inflight: bool,
}

/// Handle to the scheduler state for one (possibly nested) run. Cheap to
/// clone — every clone shares the same underlying `RefCell`.
#[derive(Clone)]
pub struct Execution(Rc<RefCell<ExecutionState>>);

impl Execution {
    fn new(opts: RunOptions) -> Self {
        Self(Rc::new(RefCell::new(ExecutionState {
            concurrency: opts.concurrency,
            total_processors: 0,
            done_processors: 0,
            awaiting_processors: HashSet::new(),
            checkpoint_cache: HashMap::new(),
            scope_cache: HashMap::new(),
            next_scope_order_key: HashMap::new(),
            drain_inflight: false,
        })))
    }

    fn begin_chunk(&self, total: usize) {
        let mut state = self.0.borrow_mut();
        state.total_processors = total;
        state.done_processors = 0;
        state.awaiting_processors.clear();
        state.checkpoint_cache.clear();
        state.scope_cache.clear();
        state.next_scope_order_key.clear();
        state.drain_inflight = false;
    }

    fn note_done(&self) {
        let mut state = self.0.borrow_mut();
        state.done_processors += 1;
        self.maybe_schedule_drain(&mut state);
    }

    /// Registers a wrapped bulk call from the currently-ambient processor
    /// (§4.5). Returns a handle every caller can `.wait()` on for the
    /// batch's eventual input→output mapping.
    pub fn register_call<In, Out, B>(
        &self,
        operation_id: &str,
        fingerprint: &str,
        bulk_fn: Rc<B>,
        inputs: impl IntoIterator<Item = In>,
    ) -> EngineResult<BatchCall<In, Out>>
    where
        In: Hash + Eq + Clone + 'static,
        Out: Clone + 'static,
        B: BulkFn<In, Out>,
    {
        let processor_idx = context::current_processor()?;
        let key = format!("{operation_id}{fingerprint}");
        let mut state = self.0.borrow_mut();
        let entry_box = state.checkpoint_cache.entry(key).or_insert_with(|| {
            Box::new(BatchEntry::<In, Out, B> {
                fn_: bulk_fn.clone(),
                input: IndexSet::new(),
                call: Rc::new(Deferred::new()),
            }) as Box<dyn BatchCacheEntry>
        });
        let entry = entry_box
            .as_any_mut()
            .downcast_mut::<BatchEntry<In, Out, B>>()
            .ok_or(EngineError::Internal(
                "batch cache entry type mismatch for operation id — two facades collided on one id",
            ))?;
        for input in inputs {
            entry.input.insert(input);
        }
        let call = entry.call.clone();
        state.awaiting_processors.insert(processor_idx);
        debug!(operation_id, processor_idx, "registered wrapped call");
        self.maybe_schedule_drain(&mut state);
        Ok(call)
    }

    /// Opens (or joins) a nested scope at the current lexical position
    /// (§4.4). `partition_key` distinguishes concurrent branches of one
    /// `if`/`switch` combinator at the same call site; `None` is the plain
    /// nested-`run` case.
    pub(crate) fn run_scope<In, Out, E>(
        &self,
        inputs: Vec<In>,
        processor: Rc<dyn Processor<In, Out, E>>,
        partition_key: Option<&str>,
    ) -> EngineResult<LocalBoxFuture<'static, RunOutcome<In, Out, E>>>
    where
        In: Hash + Eq + Clone + 'static,
        Out: Clone + 'static,
        E: 'static,
    {
        let processor_idx = context::current_processor()?;
        let branch_key = {
            let mut state = self.0.borrow_mut();
            let k = state.next_scope_order_key.entry(processor_idx).or_insert(0);
            let this_k = *k;
            *k += 1;
            format!("${this_k}/{}", partition_key.unwrap_or("0"))
        };

        let caller_inputs = inputs.clone();
        let call = {
            let mut state = self.0.borrow_mut();
            let entry_box = state.scope_cache.entry(branch_key.clone()).or_insert_with(|| {
                Box::new(ScopeEntry::<In, Out, E> {
                    input: Vec::new(),
                    fn_by_input: IndexMap::new(),
                    call: Rc::new(Deferred::new()),
                }) as Box<dyn ScopeCacheEntry>
            });
            let entry = entry_box
                .as_any_mut()
                .downcast_mut::<ScopeEntry<In, Out, E>>()
                .ok_or(EngineError::Internal(
                    "scope cache entry type mismatch for branch key — order-key bookkeeping is broken",
                ))?;
            for input in &inputs {
                entry.fn_by_input.insert(input.clone(), processor.clone());
            }
            entry.input.extend(inputs);
            let call = entry.call.clone();
            state.awaiting_processors.insert(processor_idx);
            debug!(branch_key, processor_idx, "registered nested scope call");
            self.maybe_schedule_drain(&mut state);
            call
        };

        Ok(Box::pin(async move {
            let full = call.wait().await;
            project(&full, &caller_inputs)
        }))
    }

    fn maybe_schedule_drain(&self, state: &mut std::cell::RefMut<'_, ExecutionState>) {
        if state.awaiting_processors.len() + state.done_processors != state.total_processors {
            return;
        }
        if state.drain_inflight {
            return;
        }
        state.drain_inflight = true;
        let exec = self.clone();
        tokio::task::spawn_local(async move {
            // One tick of slack so that every task which reached the same
            // checkpoint condition in this poll round has already registered
            // its request before the drain snapshots the caches (§5).
            tokio::task::yield_now().await;
            exec.drain().await;
        });
    }

    #[instrument(level = "debug", skip(self))]
    async fn drain(&self) {
        let opts = {
            let state = self.0.borrow();
            RunOptions {
                concurrency: state.concurrency,
            }
        };
        let (batch_entries, scope_entries) = {
            let mut state = self.0.borrow_mut();
            state.drain_inflight = false;
            let batch = std::mem::take(&mut state.checkpoint_cache);
            let scope = std::mem::take(&mut state.scope_cache);
            state.next_scope_order_key.clear();
            state.awaiting_processors.clear();
            (batch, scope)
        };
        debug!(
            batches = batch_entries.len(),
            scopes = scope_entries.len(),
            "draining checkpoint"
        );
        let batch_futs: Vec<_> = batch_entries.into_values().map(|e| e.drain()).collect();
        futures::future::join_all(batch_futs).await;

        let scope_futs: Vec<_> = scope_entries
            .into_values()
            .map(move |e| e.drain(opts))
            .collect();
        futures::future::join_all(scope_futs).await;
    }

    /// Rejects every pending `Deferred` in both caches with `err` and clears
    /// all per-checkpoint bookkeeping (§4.3 force-fail path).
    fn force_fail(&self, err: EngineError) {
        warn!(error = %err, "force-failing chunk: StopAll engine error observed");
        let mut state = self.0.borrow_mut();
        for (_, entry) in state.checkpoint_cache.drain() {
            entry.force_fail(err.clone());
        }
        state.scope_cache.clear();
        state.next_scope_order_key.clear();
        state.awaiting_processors.clear();
        state.drain_inflight = false;
    }
}

fn project<In, Out, E>(full: &RunOutcome<In, Out, E>, inputs: &[In]) -> RunOutcome<In, Out, E>
where
    In: Hash + Eq + Clone,
    Out: Clone,
{
    let wanted: HashSet<&In> = inputs.iter().collect();
    let successes = full
        .successes
        .iter()
        .filter(|(k, _)| wanted.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let errors = full
        .errors
        .iter()
        .filter(|(k, _)| wanted.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    RunOutcome { successes, errors }
}

/// Runs one chunk of `chunk.len()` processors to completion, returning the
/// per-input outcomes plus a `StopAll` engine error if the chunk was
/// force-failed (§4.3).
async fn run_chunk<In, Out, E>(
    exec: Execution,
    processors: &ProcessorSource<In, Out, E>,
    chunk: Vec<In>,
) -> (RunOutcome<In, Out, E>, Option<EngineError>)
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    E: 'static,
{
    exec.begin_chunk(chunk.len());

    let mut tasks = FuturesUnordered::new();
    for input in chunk {
        let processor = processors.for_input(&input);
        let exec_for_task = exec.clone();
        let idx = tasks.len();
        let input_for_task = input.clone();
        let fut: LocalBoxFuture<'static, (In, Result<Out, ProcessError<E>>)> = Box::pin(async move {
            let result = context::enter(
                exec_for_task,
                context::enter_processor(idx, processor.process(input_for_task.clone())),
            )
            .await;
            (input_for_task, result)
        });
        tasks.push(tokio::task::spawn_local(fut));
    }

    let mut outcome = RunOutcome::default();
    let mut stop_all: Option<EngineError> = None;

    while let Some(joined) = tasks.next().await {
        let (input, result) = joined.expect("processor task panicked");
        match result {
            Ok(value) => {
                outcome.successes.insert(input, value);
                exec.note_done();
            }
            Err(ProcessError::Engine(EngineSignal::StopAll(engine_err))) => {
                exec.force_fail(engine_err.clone());
                outcome.errors.insert(
                    input,
                    Rc::new(ProcessError::Engine(EngineSignal::StopAll(engine_err.clone()))),
                );
                stop_all = Some(engine_err);
            }
            Err(other) => {
                outcome.errors.insert(input, Rc::new(other));
                exec.note_done();
            }
        }
    }

    (outcome, stop_all)
}

/// Runs `inputs` against `processors`, chunking by the configured
/// concurrency cap (§4.2 steps 2–4). Shared by the top-level entry point and
/// by every nested-scope partition's drain.
pub(crate) async fn run_with_processors<In, Out, E>(
    inputs: Vec<In>,
    processors: ProcessorSource<In, Out, E>,
    opts: RunOptions,
) -> RunOutcome<In, Out, E>
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    E: 'static,
{
    let exec = Execution::new(opts);
    let deduped: IndexSet<In> = inputs.into_iter().collect();
    let chunk_size = opts
        .concurrency
        .map(|n| n.get())
        .unwrap_or_else(|| deduped.len().max(1));

    let mut remaining: Vec<In> = deduped.into_iter().collect();
    let mut outcome = RunOutcome::default();
    let mut short_circuit: Option<EngineError> = None;

    while !remaining.is_empty() {
        if let Some(err) = &short_circuit {
            for input in remaining.drain(..) {
                outcome.errors.insert(
                    input,
                    Rc::new(ProcessError::Engine(EngineSignal::StopAll(err.clone()))),
                );
            }
            break;
        }
        let take = chunk_size.min(remaining.len());
        let chunk: Vec<In> = remaining.drain(..take).collect();
        let (chunk_outcome, stop_all) = run_chunk(exec.clone(), &processors, chunk).await;
        outcome.merge(chunk_outcome);
        short_circuit = stop_all;
    }

    outcome
}

/// Top-level entry point (§4.2). Delegates to the ambient `Execution`'s
/// `run_scope` when already running inside one; otherwise starts a fresh
/// `Execution`.
#[instrument(level = "debug", skip_all, fields(inputs = inputs.len()))]
pub async fn run<In, Out, E, P>(
    inputs: Vec<In>,
    processor: P,
    opts: RunOptions,
) -> RunOutcome<In, Out, E>
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    E: 'static,
    P: Processor<In, Out, E> + 'static,
{
    if let Some(ambient) = context::current() {
        return ambient
            .run_scope(inputs, Rc::new(processor), None)
            .expect("run() called from inside a live processor always has a processor index")
            .await;
    }
    // A fresh top-level run is the only place that needs to establish the
    // `LocalSet` every `spawn_local` call below it relies on (§5): nested
    // scopes recurse through `ScopeCacheEntry::drain`, which always runs as
    // a task already spawned onto this same `LocalSet`, so it never needs
    // one of its own.
    tokio::task::LocalSet::new()
        .run_until(run_with_processors(
            inputs,
            ProcessorSource::Single(Rc::new(processor) as Rc<dyn Processor<In, Out, E>>),
            opts,
        ))
        .await
}

/// The scope primitive (§4.4), exposed so `if`/`switch`-style combinators
/// can be built on top of it without engine changes. `partition_key`
/// distinguishes branches at the same call site; omit it for a plain nested
/// run.
///
/// # Panics
/// If called with no ambient `Execution` — a wrapped call outside a live
/// processor is a programmer error (`OutsideContextError`, not catchable by
/// the engine), not a per-item failure.
#[instrument(level = "debug", skip_all, fields(inputs = inputs.len(), partition_key))]
pub async fn run_scope<In, Out, E, P>(
    inputs: Vec<In>,
    processor: P,
    partition_key: Option<&str>,
) -> RunOutcome<In, Out, E>
where
    In: Hash + Eq + Clone + 'static,
    Out: Clone + 'static,
    E: 'static,
    P: Processor<In, Out, E> + 'static,
{
    let exec = context::current().unwrap_or_else(|| panic!("{}", EngineError::OutsideContext));
    exec.run_scope(inputs, Rc::new(processor), partition_key)
        .expect("scope call requires an ambient processor index")
        .await
}
