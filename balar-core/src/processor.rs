// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The user-provided per-item processor (GLOSSARY: "Processor").

use futures::future::LocalBoxFuture;

use crate::error::ProcessError;

/// An asynchronous function from a single input to a single output.
///
/// Implemented automatically for any `Fn(In) -> Fut` closure, so user code
/// almost never names this trait directly — it exists so that nested scopes
/// can hold a per-input map of trait objects (§9, "Nested Execution
/// construction") without boxing every processor by hand at the call site.
pub trait Processor<In, Out, E>: 'static {
    fn process(&self, input: In) -> LocalBoxFuture<'static, Result<Out, ProcessError<E>>>;
}

impl<In, Out, E, F, Fut> Processor<In, Out, E> for F
where
    F: Fn(In) -> Fut + 'static,
    Fut: std::future::Future<Output = Result<Out, ProcessError<E>>> + 'static,
{
    fn process(&self, input: In) -> LocalBoxFuture<'static, Result<Out, ProcessError<E>>> {
        Box::pin((self)(input))
    }
}
