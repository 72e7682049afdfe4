use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use super::runner::{RunScope, TaskRunner};
use super::types::Task;

/// Run a group of tasks concurrently and wait for all of them.
///
/// # Arguments
///
/// * `runner` - Task runner shared by every unit
/// * `tasks` - Tasks of this group; each concurrent unit owns exactly one
/// * `base_index` - Number of tasks positioned before this group
/// * `total` - Task count reported to workers as "task i of n"
/// * `max_parallel` - Maximum number of workers in flight
///
/// # Returns
///
/// The tasks in input order, each in a terminal status. A failure never
/// cancels a sibling.
pub async fn run_many(
    runner: &TaskRunner,
    tasks: Vec<Task>,
    scope: &RunScope,
    base_index: usize,
    total: usize,
    max_parallel: usize,
) -> Vec<Task> {
    let sem = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for (offset, mut task) in tasks.into_iter().enumerate() {
        let sem = sem.clone();

        futs.push(async move {
            // The semaphore is never closed; a failed acquire only skips the cap
            let _permit = sem.acquire_owned().await.ok();
            runner
                .run(&mut task, scope, base_index + offset + 1, total)
                .await;
            (offset, task)
        });
    }

    let mut finished: Vec<(usize, Task)> = Vec::with_capacity(futs.len());
    while let Some(done) = futs.next().await {
        finished.push(done);
    }

    finished.sort_by_key(|(offset, _)| *offset);
    finished.into_iter().map(|(_, task)| task).collect()
}
