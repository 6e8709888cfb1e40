// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Runnable usage example for `balar-core`.
//!
//! Reproduces the "two-step pipeline with divergence" scenario: four
//! accounts are processed concurrently, each reading its current budget via
//! one coalesced bulk lookup and, where the requested amount is lower than
//! what's on file, failing without ever calling the second bulk operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use balar_core::{facade::Operation, run, BulkOutcome, ProcessError, RunOptions};
use clap::Parser;
use indexmap::IndexMap;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_BIN_NAME"),
    about = "Exercises balar-core's checkpoint scheduler against fake bulk operations."
)]
struct Args {
    /// Caps how many accounts are processed per chunk.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct BudgetRequest {
    id: u64,
    amount: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
enum DemoError {
    #[error("update rejected for account {0}")]
    UpdateFailed(u64),
    #[error("no budget on file for account {0}")]
    NoSuchAccount(u64),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let get_budgets_calls = std::rc::Rc::new(AtomicUsize::new(0));
    let update_budgets_calls = std::rc::Rc::new(AtomicUsize::new(0));

    let current_budgets: HashMap<u64, u64> = HashMap::from([(1, 500), (3, 1500), (4, 2000)]);
    let gb_calls = get_budgets_calls.clone();
    let get_budgets = Operation::new(move |ids: Vec<u64>| {
        let current_budgets = current_budgets.clone();
        let calls = gb_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            info!(?ids, "getBudgets called");
            let map: IndexMap<u64, u64> = ids
                .iter()
                .filter_map(|id| current_budgets.get(id).map(|amount| (*id, *amount)))
                .collect();
            Ok::<_, DemoError>(BulkOutcome::Mapping(map))
        }
    });

    let ub_calls = update_budgets_calls.clone();
    let update_budgets = Operation::new(move |requests: Vec<BudgetRequest>| {
        let calls = ub_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            info!(?requests, "updateBudgets called");
            let map: IndexMap<BudgetRequest, Result<(), DemoError>> = requests
                .iter()
                .map(|req| {
                    let result = if req.id == 4 {
                        Err(DemoError::UpdateFailed(req.id))
                    } else {
                        Ok(())
                    };
                    (*req, result)
                })
                .collect();
            Ok::<_, DemoError>(BulkOutcome::Mapping(map))
        }
    });

    let requests = vec![
        BudgetRequest { id: 1, amount: 1000 },
        BudgetRequest { id: 2, amount: 0 },
        BudgetRequest { id: 3, amount: 1 },
        BudgetRequest { id: 4, amount: 3000 },
    ];

    let opts = match args.concurrency {
        Some(n) => RunOptions::with_concurrency(n),
        None => RunOptions::default(),
    };

    let outcome = run(
        requests,
        move |req: BudgetRequest| {
            let get_budgets = get_budgets.clone();
            let update_budgets = update_budgets.clone();
            async move {
                if req.amount == 0 {
                    return Ok("zero".to_string());
                }
                let current = get_budgets
                    .call(req.id)
                    .await?
                    .ok_or(ProcessError::User(DemoError::NoSuchAccount(req.id)))?;
                if req.amount < current {
                    return Ok("lower".to_string());
                }
                let updated = update_budgets
                    .call(req)
                    .await?
                    .expect("updateBudgets always answers every account it is asked about");
                match updated {
                    Ok(()) => Ok("ok".to_string()),
                    Err(err) => Ok(format!("failed: {err}")),
                }
            }
        },
        opts,
    )
    .await;

    println!("successes:");
    for (req, value) in &outcome.successes {
        println!("  {} -> {value}", req.id);
    }
    println!("errors:");
    for (req, err) in &outcome.errors {
        println!("  {} -> {err}", req.id);
    }

    println!(
        "getBudgets called {} time(s); updateBudgets called {} time(s)",
        get_budgets_calls.load(Ordering::SeqCst),
        update_budgets_calls.load(Ordering::SeqCst)
    );
}

impl std::hash::Hash for BudgetRequest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for BudgetRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BudgetRequest {}
