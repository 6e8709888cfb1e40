// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The two-map result every `run`/`run_scope` call returns (§3 "Result<In,Out>").

use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::ProcessError;

/// Partition of a run's deduplicated input set into successes and failures.
///
/// Every input that entered the run appears in exactly one of the two maps
/// (§3's core invariant); the maps are otherwise ordinary `IndexMap`s, safe
/// to iterate, re-key, or merge. Error values are `Rc`-shared rather than
/// plain `ProcessError<E>` so that a nested scope's outcome can be handed to
/// every one of its waiters without requiring `E: Clone`.
#[derive(Debug)]
pub struct RunOutcome<In, Out, E> {
    pub successes: IndexMap<In, Out>,
    pub errors: IndexMap<In, Rc<ProcessError<E>>>,
}

impl<In, Out, E> Default for RunOutcome<In, Out, E> {
    fn default() -> Self {
        Self {
            successes: IndexMap::new(),
            errors: IndexMap::new(),
        }
    }
}

impl<In: Hash + Eq, Out, E> RunOutcome<In, Out, E> {
    pub(crate) fn merge(&mut self, other: RunOutcome<In, Out, E>) {
        self.successes.extend(other.successes);
        self.errors.extend(other.errors);
    }
}
