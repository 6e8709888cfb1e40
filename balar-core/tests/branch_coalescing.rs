// Copyright (c) Mysten Labs, Inc.
// Modifications Copyright (c) 2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Scenario 4 of §8: different processors reach different wrapped
//! operations depending on a runtime branch; each distinct operation still
//! coalesces its own callers into one bulk call, independent of the other
//! branch's operation.

mod common;

use std::convert::Infallible;

use balar_core::facade::Operation;
use balar_core::{run, BulkOutcome, ProcessError, RunOptions};
use common::CallLog;
use indexmap::IndexMap;

#[tokio::test]
async fn distinct_operations_reached_by_branching_do_not_coalesce_with_each_other() {
    let even_log: CallLog<u64> = CallLog::new();
    let odd_log: CallLog<u64> = CallLog::new();

    let ev_log = even_log.clone();
    let even_op = Operation::new(move |ids: Vec<u64>| {
        ev_log.record(&ids);
        let map: IndexMap<u64, String> = ids.iter().map(|id| (*id, format!("even:{id}"))).collect();
        futures::future::ready(Ok::<_, Infallible>(BulkOutcome::Mapping(map)))
    });

    let od_log = odd_log.clone();
    let odd_op = Operation::new(move |ids: Vec<u64>| {
        od_log.record(&ids);
        let map: IndexMap<u64, String> = ids.iter().map(|id| (*id, format!("odd:{id}"))).collect();
        futures::future::ready(Ok::<_, Infallible>(BulkOutcome::Mapping(map)))
    });

    let outcome = run(
        vec![1u64, 2, 3, 4],
        move |id: u64| {
            let even_op = even_op.clone();
            let odd_op = odd_op.clone();
            async move {
                let label = if id % 2 == 0 {
                    even_op.call(id).await?
                } else {
                    odd_op.call(id).await?
                };
                Ok::<_, ProcessError<Infallible>>(label.expect("operation always answers"))
            }
        },
        RunOptions::default(),
    )
    .await;

    assert_eq!(outcome.successes.len(), 4);
    assert_eq!(even_log.call_count(), 1);
    assert_eq!(odd_log.call_count(), 1);

    let mut even_ids = even_log.calls().remove(0);
    even_ids.sort_unstable();
    assert_eq!(even_ids, vec![2, 4]);

    let mut odd_ids = odd_log.calls().remove(0);
    odd_ids.sort_unstable();
    assert_eq!(odd_ids, vec![1, 3]);
}
