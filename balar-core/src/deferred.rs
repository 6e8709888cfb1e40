// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! One-shot value cell used to park waiters (§3, §9).
//!
//! A [`Deferred<T>`] is created eagerly so that every task that will end up
//! waiting on it can subscribe before the producer (the drain) has decided
//! the outcome. Multiple waiters share one eventual value, so the receiving
//! half is a [`futures::future::Shared`] over a one-shot channel rather than
//! a bare `oneshot::Receiver` — the same trade the `fuchsia` work-queue
//! coalescing pool makes (`Shared<BoxFuture<...>>` fanned out to every
//! pusher of an equal-key task).

use std::cell::RefCell;

use futures::channel::oneshot;
use futures::future::{Shared, FutureExt};

pub(crate) struct Deferred<T: Clone + 'static> {
    tx: RefCell<Option<oneshot::Sender<T>>>,
    rx: Shared<oneshot::Receiver<T>>,
}

impl<T: Clone + 'static> Deferred<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: RefCell::new(Some(tx)),
            rx: rx.shared(),
        }
    }

    /// Resolves the deferred with `value`. Idempotent beyond the first
    /// call: later calls are ignored, mirroring a settled promise.
    pub(crate) fn resolve(&self, value: T) {
        if let Some(tx) = self.tx.borrow_mut().take() {
            // The receiver half may have no subscribers left (every waiter
            // already gave up); that is not an engine error.
            let _ = tx.send(value);
        }
    }

    /// Awaits the eventual value. Panics if the deferred is dropped without
    /// ever being resolved — by construction the drain always resolves
    /// every entry it creates before the cache entry goes out of scope, so
    /// this would indicate a scheduler bug, not a caller mistake.
    pub(crate) async fn wait(&self) -> T {
        self.rx
            .clone()
            .await
            .expect("Deferred dropped without being resolved — internal scheduler bug")
    }
}
