// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Scenario 1 of §8: a two-step pipeline where some accounts diverge before
//! ever reaching the second bulk operation, and the second operation itself
//! fails for one account.

mod common;

use std::collections::HashMap;

use balar_core::facade::Operation;
use balar_core::{run, BulkOutcome, RunOptions};
use common::CallLog;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Account {
    id: u64,
    amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum PipelineError {
    #[error("update rejected for account {0}")]
    UpdateFailed(u64),
}

#[tokio::test]
async fn diverges_before_and_after_the_second_bulk_call() {
    let get_budgets_log: CallLog<u64> = CallLog::new();
    let update_budgets_log: CallLog<Account> = CallLog::new();

    let current_budgets: HashMap<u64, u64> = HashMap::from([(1, 500), (3, 1500), (4, 2000)]);
    let gb_log = get_budgets_log.clone();
    let get_budgets = Operation::new(move |ids: Vec<u64>| {
        gb_log.record(&ids);
        let current_budgets = current_budgets.clone();
        async move {
            let map: IndexMap<u64, u64> = ids
                .iter()
                .filter_map(|id| current_budgets.get(id).map(|amount| (*id, *amount)))
                .collect();
            Ok::<_, PipelineError>(BulkOutcome::Mapping(map))
        }
    });

    let ub_log = update_budgets_log.clone();
    let update_budgets = Operation::new(move |accounts: Vec<Account>| {
        ub_log.record(&accounts);
        async move {
            let map: IndexMap<Account, Result<(), PipelineError>> = accounts
                .iter()
                .map(|acc| {
                    let outcome = if acc.id == 4 {
                        Err(PipelineError::UpdateFailed(acc.id))
                    } else {
                        Ok(())
                    };
                    (*acc, outcome)
                })
                .collect();
            Ok::<_, PipelineError>(BulkOutcome::Mapping(map))
        }
    });

    let accounts = vec![
        Account { id: 1, amount: 1000 },
        Account { id: 2, amount: 0 },
        Account { id: 3, amount: 1 },
        Account { id: 4, amount: 3000 },
    ];

    let outcome = run(
        accounts,
        move |acc: Account| {
            let get_budgets = get_budgets.clone();
            let update_budgets = update_budgets.clone();
            async move {
                if acc.amount == 0 {
                    return Ok("zero".to_string());
                }
                let current = get_budgets
                    .call(acc.id)
                    .await?
                    .expect("every account in this test has a budget on file");
                if acc.amount < current {
                    return Ok("lower".to_string());
                }
                match update_budgets
                    .call(acc)
                    .await?
                    .expect("updateBudgets always answers every account it is asked about")
                {
                    Ok(()) => Ok("ok".to_string()),
                    Err(_) => Ok("failed".to_string()),
                }
            }
        },
        RunOptions::default(),
    )
    .await;

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors.keys().collect::<Vec<_>>());
    let by_id: HashMap<u64, &str> = outcome
        .successes
        .iter()
        .map(|(acc, v)| (acc.id, v.as_str()))
        .collect();
    assert_eq!(by_id[&1], "ok");
    assert_eq!(by_id[&2], "zero");
    assert_eq!(by_id[&3], "lower");
    assert_eq!(by_id[&4], "failed");

    assert_eq!(get_budgets_log.call_count(), 1);
    let mut requested: Vec<u64> = get_budgets_log.calls().remove(0);
    requested.sort_unstable();
    assert_eq!(requested, vec![1, 3, 4]);

    assert_eq!(update_budgets_log.call_count(), 1);
    let mut updated: Vec<u64> = update_budgets_log.calls().remove(0).into_iter().map(|a| a.id).collect();
    updated.sort_unstable();
    assert_eq!(updated, vec![1, 4]);
}
