// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! A cooperative batching scheduler.
//! <br>
//!
//! `balar-core` lets application code describe per-item processing as if
//! each item were handled independently, while coalescing outbound "bulk
//! operations" — functions from a list of inputs to an input→output mapping
//! — so that every concurrently-running item shares one underlying call per
//! distinct operation per synchronization point ("checkpoint").
//!
//! ## Checkpoints
//!
//! A checkpoint is the instant at which every live processor in the current
//! chunk is either parked at a wrapped call or has already finished. The
//! engine watches for this condition after every registration and every
//! processor completion; once it holds, it drains both of its
//! per-checkpoint buffers on the next cooperative tick:
//!
//! - the **batch buffer**, one entry per distinct `(operation id, extra-args
//!   fingerprint)`, each invoking its underlying bulk function exactly once
//!   with every input registered against it this checkpoint;
//! - the **scope buffer**, one entry per nested-scope call site, each
//!   spawning an independent nested [`Execution`] over its partition's
//!   inputs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use balar_core::{facade::Operation, run, RunOptions};
//! use indexmap::IndexMap;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("budget lookup failed")]
//! # struct LookupError;
//! #
//! # #[tokio::main]
//! # async fn main() {
//! let get_budgets = Operation::new(|ids: Vec<u64>| async move {
//!     let budgets: HashMap<u64, u64> = ids.iter().map(|id| (*id, *id * 100)).collect();
//!     Ok::<_, LookupError>(balar_core::BulkOutcome::Mapping(
//!         budgets.into_iter().collect::<IndexMap<_, _>>(),
//!     ))
//! });
//!
//! let outcome = run(
//!     vec![1u64, 2, 3],
//!     move |id: u64| {
//!         let get_budgets = get_budgets.clone();
//!         async move { Ok(get_budgets.call(id).await?.expect("every id has a budget")) }
//!     },
//!     RunOptions::default(),
//! )
//! .await;
//! assert_eq!(outcome.successes.len(), 3);
//! # }
//! ```

mod batch;
mod context;
mod deferred;
mod error;
mod execution;
pub mod facade;
mod options;
mod outcome;
mod processor;
mod scope;

pub use batch::{BulkFn, BulkOutcome};
pub use error::{EngineError, EngineResult, EngineSignal, ProcessError};
pub use execution::{run, run_scope, Execution};
pub use options::RunOptions;
pub use outcome::RunOutcome;
pub use processor::Processor;
