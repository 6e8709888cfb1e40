// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Shared fake-collaborator plumbing for the integration tests (§10.4):
//! a call log every fake bulk function records into, instead of a mocking
//! framework, mirroring `iota-data-ingestion-core/src/tests.rs`'s
//! `AtomicU64` commit counters.

use std::cell::RefCell;
use std::rc::Rc;

/// Records every call a fake bulk function receives, in call order.
///
/// `Execution` is single-threaded cooperative (§5), so a plain `RefCell`
/// suffices here the same way it does inside the engine itself — there is
/// never more than one task touching a log at a time.
#[derive(Clone)]
pub struct CallLog<In>(Rc<RefCell<Vec<Vec<In>>>>);

impl<In: Clone> CallLog<In> {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn record(&self, inputs: &[In]) {
        self.0.borrow_mut().push(inputs.to_vec());
    }

    pub fn calls(&self) -> Vec<Vec<In>> {
        self.0.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.0.borrow().len()
    }
}

impl<In: Clone> Default for CallLog<In> {
    fn default() -> Self {
        Self::new()
    }
}
