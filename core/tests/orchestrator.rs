mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    orchestrator, task, wait_until_running, wait_until_submitted, FakeWorker, RecordingRenderer,
};
use pretty_assertions::assert_eq;
use taskweave_core::api::{
    ExecutionMode, ExecutionOpts, NewTask, Orchestrator, OrchestratorError, Run, Snapshot, Task,
    TaskStatus, WorkerHandle,
};
use taskweave_core::state::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};

fn layers(expected: &[&[&str]]) -> Vec<Vec<String>> {
    expected
        .iter()
        .map(|l| l.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn statuses(report: &taskweave_core::api::ExecutionReport) -> Vec<(String, TaskStatus)> {
    report
        .tasks
        .iter()
        .map(|t| (t.task_id.clone(), t.status))
        .collect()
}

#[tokio::test]
async fn diamond_runs_in_two_layers() {
    let worker = Arc::new(FakeWorker::new());
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("ship v2", None).await.unwrap();
    orch.add_tasks(vec![
        task("1", "draft notes", &[]),
        task("2", "bump version", &[]),
        task("3", "publish", &["1", "2"]),
    ])
    .unwrap();

    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.mode, ExecutionMode::Parallel);
    assert_eq!(report.layers, layers(&[&["1", "2"], &["3"]]));
    assert!(!report.fallback_used);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);
    assert!(report.is_success());
    assert_eq!(worker.submitted().last().map(String::as_str), Some("3"));
    assert!(!orch.status().is_running);
}

#[tokio::test]
async fn cycle_runs_as_single_fallback_layer() {
    let worker = Arc::new(FakeWorker::new());
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("untangle", None).await.unwrap();
    orch.add_tasks(vec![task("A", "first", &["B"]), task("B", "second", &["A"])])
        .unwrap();

    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.layers, layers(&[&["A", "B"]]));
    assert!(report.fallback_used);
    assert_eq!(report.completed, 2);
}

#[tokio::test]
async fn failed_task_does_not_affect_siblings() {
    let worker = Arc::new(FakeWorker::new().failing_on("task-2"));
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("three chores", None).await.unwrap();
    orch.add_tasks(vec![
        NewTask::new("water plants"),
        NewTask::new("feed cat"),
        NewTask::new("sweep floor"),
    ])
    .unwrap();

    let report = orch.execute(None).await.unwrap();

    assert_eq!(
        statuses(&report),
        vec![
            ("task-1".to_string(), TaskStatus::Completed),
            ("task-2".to_string(), TaskStatus::Failed),
            ("task-3".to_string(), TaskStatus::Completed),
        ]
    );
    let failed = &report.tasks[1];
    assert!(failed.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert_eq!(failed.worker_handle, Some(WorkerHandle::new("w-task-2")));
    assert!(orch.status().active_workers.is_empty());
    assert!(!report.is_success());
}

#[tokio::test]
async fn acquisition_failure_is_recorded() {
    let worker = Arc::new(FakeWorker::new().failing_acquire("b"));
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("a", "one", &[]), task("b", "two", &[])])
        .unwrap();

    let report = orch.execute(None).await.unwrap();

    let b = &report.tasks[1];
    assert_eq!(b.status, TaskStatus::Failed);
    assert!(b
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("worker acquisition failed")));
    assert!(b.worker_handle.is_none());
    assert_eq!(worker.submitted(), vec!["a".to_string()]);
}

#[tokio::test]
async fn failed_dependency_does_not_block_dependent() {
    let worker = Arc::new(FakeWorker::new().failing_on("base"));
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![
        task("base", "one", &[]),
        task("top", "two", &["base"]),
    ])
    .unwrap();

    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.layers, layers(&[&["base"], &["top"]]));
    assert_eq!(report.tasks[0].status, TaskStatus::Failed);
    assert_eq!(report.tasks[1].status, TaskStatus::Completed);
}

#[tokio::test]
async fn execute_while_running_is_rejected() {
    let worker = Arc::new(FakeWorker::new().gated());
    let orch = Arc::new(orchestrator(
        worker.clone(),
        Arc::new(MemoryCheckpointStore::new()),
    ));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("a", "one", &[]), task("b", "two", &["a"])])
        .unwrap();

    let background = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(None).await })
    };
    wait_until_running(&orch, 1).await;

    let before = orch.status().tasks;
    let err = orch.execute(None).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyRunning(_)));
    assert_eq!(orch.status().tasks, before);
    assert!(matches!(
        orch.resume_checkpoint().await.unwrap_err(),
        OrchestratorError::AlreadyRunning(_)
    ));

    worker.release();
    let report = background.await.unwrap().unwrap();
    assert_eq!(report.completed, 2);
    assert!(!orch.status().is_running);
}

#[tokio::test]
async fn serial_mode_follows_run_order() {
    let worker = Arc::new(FakeWorker::new().with_latency(Duration::from_millis(2)));
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![
        task("c", "third letter", &["a"]),
        task("a", "first letter", &[]),
        task("b", "second letter", &[]),
    ])
    .unwrap();

    let report = orch.execute(Some(ExecutionMode::Serial)).await.unwrap();

    assert_eq!(report.mode, ExecutionMode::Serial);
    assert!(report.layers.is_empty());
    assert_eq!(
        worker.submitted(),
        vec!["c".to_string(), "a".to_string(), "b".to_string()]
    );
    assert_eq!(worker.peak(), 1);
    assert_eq!(report.completed, 3);
    assert!(worker.instruction_for("a").unwrap().contains("task 2 of 3"));
}

#[tokio::test]
async fn max_parallel_caps_layer_width() {
    let worker = Arc::new(FakeWorker::new().with_latency(Duration::from_millis(10)));
    let orch = Orchestrator::builder(worker.clone())
        .opts(ExecutionOpts::default().with_max_parallel(2))
        .build();

    orch.start("goal", None).await.unwrap();
    let batch: Vec<NewTask> = (0..6)
        .map(|i| task(&format!("t{i}"), "independent", &[]))
        .collect();
    orch.add_tasks(batch).unwrap();

    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.layers.len(), 1);
    assert_eq!(report.completed, 6);
    assert!(worker.peak() <= 2, "peak was {}", worker.peak());
}

#[tokio::test]
async fn instruction_mentions_only_its_own_task() {
    let worker = Arc::new(FakeWorker::new());
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("launch the website", None).await.unwrap();
    orch.add_tasks(vec![
        task("x", "write the landing copy", &[]),
        task("y", "configure the CDN", &[]),
    ])
    .unwrap();
    orch.execute(None).await.unwrap();

    let text = worker.instruction_for("y").unwrap();
    assert!(text.contains("configure the CDN"));
    assert!(text.contains("launch the website"));
    assert!(!text.contains("landing copy"));
}

#[tokio::test]
async fn checkpoint_round_trip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn CheckpointStore> =
        Arc::new(FileCheckpointStore::new(dir.path().join("checkpoint.json")));

    let worker = Arc::new(FakeWorker::new().failing_on("task-2"));
    let first = orchestrator(worker, store.clone());
    first.start("goal", Some("fast-model".into())).await.unwrap();
    first
        .add_tasks(vec![NewTask::new("one"), NewTask::new("two")])
        .unwrap();
    first.execute(None).await.unwrap();
    first.add_tasks(vec![NewTask::new("three")]).unwrap();
    let saved = first.save_checkpoint().await.unwrap();
    assert_eq!(saved.completed_count, 1);
    assert_eq!(saved.total_tasks, 3);

    let second = orchestrator(Arc::new(FakeWorker::new()), store);
    let status = second.resume_checkpoint().await.unwrap();

    assert_eq!(status.run_id, first.status().run_id);
    assert_eq!(status.model_preference.as_deref(), Some("fast-model"));
    assert_eq!(status.tasks, first.status().tasks);
    assert!(!status.is_running);
}

#[tokio::test]
async fn resumed_run_executes_only_pending_tasks() {
    let mut run = Run::new("finish migration", None);
    let mut done = Task::new("task-1", "create the table");
    done.mark_in_progress(WorkerHandle::new("old-worker")).unwrap();
    done.mark_completed().unwrap();
    run.tasks.push(done);
    run.tasks
        .push(Task::new("task-2", "backfill rows").with_dependencies(["task-1"]));
    run.tasks
        .push(Task::new("task-3", "drop old table").with_dependencies(["task-2"]));

    let store = Arc::new(MemoryCheckpointStore::new());
    let snapshot = Snapshot::capture(Some(&run), &[]);
    store
        .write(snapshot.to_json().unwrap().as_bytes())
        .await
        .unwrap();

    let worker = Arc::new(FakeWorker::new());
    let orch = orchestrator(worker.clone(), store);
    orch.resume_checkpoint().await.unwrap();
    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.layers, layers(&[&["task-2"], &["task-3"]]));
    assert!(!report.fallback_used);
    assert_eq!(
        worker.submitted(),
        vec!["task-2".to_string(), "task-3".to_string()]
    );
    assert_eq!(
        report.tasks[0].worker_handle,
        Some(WorkerHandle::new("old-worker"))
    );
    assert_eq!(report.completed, 3);
}

#[tokio::test]
async fn stop_mid_run_detaches_in_flight_workers() {
    let worker = Arc::new(FakeWorker::new().gated());
    let store = Arc::new(MemoryCheckpointStore::new());
    let orch = Arc::new(orchestrator(worker.clone(), store.clone()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("a", "one", &[]), task("b", "two", &["a"])])
        .unwrap();

    let background = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(None).await })
    };
    wait_until_running(&orch, 1).await;

    let saved = orch.stop().await.unwrap();
    assert_eq!(saved.total_tasks, 2);
    assert!(!orch.status().has_run());

    worker.release();
    let report = background.await.unwrap().unwrap();

    // The second layer never started
    assert_eq!(worker.submitted(), vec!["a".to_string()]);
    assert_eq!(report.pending, 1);

    let restored = orch.resume_checkpoint().await.unwrap();
    assert_eq!(restored.tasks[0].status, TaskStatus::InProgress);
    assert_eq!(restored.tasks[1].status, TaskStatus::Pending);
}

fn task_states(status: &taskweave_core::api::StatusReport) -> Vec<(String, TaskStatus)> {
    status
        .tasks
        .iter()
        .map(|t| (t.task_id.clone(), t.status))
        .collect()
}

#[tokio::test]
async fn late_results_of_stopped_pass_skip_resumed_run() {
    let worker = Arc::new(FakeWorker::new().gated());
    let store = Arc::new(MemoryCheckpointStore::new());
    let orch = Arc::new(orchestrator(worker.clone(), store.clone()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("a", "one", &[]), task("b", "two", &["a"])])
        .unwrap();

    let stopped = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(None).await })
    };
    wait_until_running(&orch, 1).await;

    orch.stop().await.unwrap();
    let restored = orch.resume_checkpoint().await.unwrap();
    assert!(!restored.is_running);

    worker.release();
    let report = stopped.await.unwrap().unwrap();
    assert_eq!(report.pending, 1);

    // The stopped pass neither wrote its result nor started layer 2
    assert_eq!(worker.submitted(), vec!["a".to_string()]);
    let status = orch.status();
    assert!(!status.is_running);
    assert_eq!(
        task_states(&status),
        vec![
            ("a".to_string(), TaskStatus::InProgress),
            ("b".to_string(), TaskStatus::Pending),
        ]
    );

    // Only an explicit execute continues the resumed run
    let report = orch.execute(None).await.unwrap();
    assert_eq!(worker.submitted(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn stopped_pass_finishing_keeps_resumed_pass_running() {
    let worker = Arc::new(FakeWorker::new().holding("a").holding("b"));
    let store = Arc::new(MemoryCheckpointStore::new());
    let orch = Arc::new(orchestrator(worker.clone(), store.clone()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("a", "one", &[]), task("b", "two", &["a"])])
        .unwrap();

    let stopped = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(None).await })
    };
    wait_until_submitted(&worker, "a").await;
    orch.stop().await.unwrap();
    orch.resume_checkpoint().await.unwrap();

    let resumed = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(None).await })
    };
    wait_until_submitted(&worker, "b").await;

    worker.release_task("a");
    stopped.await.unwrap().unwrap();

    // The resumed pass still holds the re-entrancy guard
    assert!(orch.status().is_running);
    assert!(matches!(
        orch.execute(None).await,
        Err(OrchestratorError::AlreadyRunning(_))
    ));
    assert_eq!(orch.status().tasks[0].status, TaskStatus::InProgress);

    worker.release_task("b");
    let report = resumed.await.unwrap().unwrap();
    assert_eq!(worker.submitted(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        statuses(&report),
        vec![
            ("a".to_string(), TaskStatus::InProgress),
            ("b".to_string(), TaskStatus::Completed),
        ]
    );
    assert!(!orch.status().is_running);
}

#[tokio::test]
async fn second_pass_picks_up_tasks_added_later() {
    let worker = Arc::new(FakeWorker::new());
    let orch = orchestrator(worker.clone(), Arc::new(MemoryCheckpointStore::new()));

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![NewTask::new("create the schema")])
        .unwrap();
    orch.execute(None).await.unwrap();

    orch.add_tasks(vec![task("api", "use the schema", &["task-1"])])
        .unwrap();
    let report = orch.execute(None).await.unwrap();

    assert_eq!(report.layers, layers(&[&["api"]]));
    assert_eq!(report.completed, 2);
    assert_eq!(worker.submitted().len(), 2);
}

#[tokio::test]
async fn auto_save_writes_checkpoint_after_execute() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let orch = orchestrator(Arc::new(FakeWorker::new()), store.clone());

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![NewTask::new("only")]).unwrap();
    orch.execute(None).await.unwrap();

    let bytes = store.contents().expect("checkpoint written");
    let snapshot = Snapshot::from_bytes(&bytes).unwrap();
    assert_eq!(snapshot.completed_count, 1);
}

#[tokio::test]
async fn renderer_sees_events_in_order() {
    let renderer = Arc::new(RecordingRenderer::default());
    let orch = Orchestrator::builder(Arc::new(FakeWorker::new()))
        .renderer(renderer.clone())
        .build();

    orch.start("goal", None).await.unwrap();
    orch.add_tasks(vec![task("1", "a", &[]), task("2", "b", &["1"])])
        .unwrap();
    orch.execute(None).await.unwrap();

    assert_eq!(
        renderer.event_types(),
        vec![
            "run.start",
            "executor.plan",
            "layer.start",
            "task.start",
            "task.end",
            "layer.end",
            "layer.start",
            "task.start",
            "task.end",
            "layer.end",
            "run.end",
        ]
    );
}
