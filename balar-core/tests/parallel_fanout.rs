// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Scenarios 2 and 3 of §8: a processor that fans out to two bulk
//! operations concurrently within itself, and a processor where some inputs
//! return synchronously without ever touching a bulk operation.

mod common;

use std::convert::Infallible;

use balar_core::facade::Operation;
use balar_core::{run, BulkOutcome, ProcessError, RunOptions};
use common::CallLog;
use indexmap::IndexMap;

fn lookup_op(log: CallLog<u64>) -> Operation<u64, u64, impl Fn(Vec<u64>) -> futures::future::Ready<Result<BulkOutcome<u64, u64>, Infallible>>> {
    Operation::new(move |ids: Vec<u64>| {
        log.record(&ids);
        let map: IndexMap<u64, u64> = ids.iter().map(|id| (*id, *id * 10)).collect();
        futures::future::ready(Ok(BulkOutcome::Mapping(map)))
    })
}

#[tokio::test]
async fn concurrent_bulk_reads_within_one_processor_coalesce_independently() {
    let budgets_log: CallLog<u64> = CallLog::new();
    let spends_log: CallLog<u64> = CallLog::new();

    let get_budgets = lookup_op(budgets_log.clone());
    let get_spends = lookup_op(spends_log.clone());

    let outcome = run(
        vec![1u64, 2, 3, 4],
        move |id: u64| {
            let get_budgets = get_budgets.clone();
            let get_spends = get_spends.clone();
            async move {
                let (budget, spend) = futures::join!(get_budgets.call(id), get_spends.call(id));
                let budget = budget?.expect("lookup always answers");
                let spend = spend?.expect("lookup always answers");
                Ok::<_, ProcessError<Infallible>>(budget + spend)
            }
        },
        RunOptions::default(),
    )
    .await;

    assert_eq!(outcome.successes.len(), 4);
    assert_eq!(budgets_log.call_count(), 1);
    assert_eq!(spends_log.call_count(), 1);
    let mut budgets_ids = budgets_log.calls().remove(0);
    budgets_ids.sort_unstable();
    assert_eq!(budgets_ids, vec![1, 2, 3, 4]);
    let mut spends_ids = spends_log.calls().remove(0);
    spends_ids.sort_unstable();
    assert_eq!(spends_ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn a_synchronous_early_return_still_joins_the_same_checkpoint() {
    let budgets_log: CallLog<u64> = CallLog::new();
    let spends_log: CallLog<u64> = CallLog::new();

    let get_budgets = lookup_op(budgets_log.clone());
    let get_spends = lookup_op(spends_log.clone());

    let outcome = run(
        vec![1u64, 2, 3, 4],
        move |id: u64| {
            let get_budgets = get_budgets.clone();
            let get_spends = get_spends.clone();
            async move {
                if id == 4 {
                    return Ok::<_, ProcessError<Infallible>>("x".to_string());
                }
                let (budget, spend) = futures::join!(get_budgets.call(id), get_spends.call(id));
                let budget = budget?.expect("lookup always answers");
                let spend = spend?.expect("lookup always answers");
                Ok((budget + spend).to_string())
            }
        },
        RunOptions::default(),
    )
    .await;

    assert_eq!(outcome.successes.get(&4).map(String::as_str), Some("x"));
    assert_eq!(budgets_log.call_count(), 1);
    assert_eq!(spends_log.call_count(), 1);
    let mut budgets_ids = budgets_log.calls().remove(0);
    budgets_ids.sort_unstable();
    assert_eq!(budgets_ids, vec![1, 2, 3]);
    let mut spends_ids = spends_log.calls().remove(0);
    spends_ids.sort_unstable();
    assert_eq!(spends_ids, vec![1, 2, 3]);
}
