// tests/dispatcher_runs.rs

mod common;
use crate::common::builders::ConfigBuilder;
use crate::common::fake_worker::FakeWorker;
use crate::common::{count_events, init_tracing, with_timeout};

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use shepherd::dispatch::{Dispatcher, LAUNCH_FAILURE_EXIT_CODE};
use shepherd::errors::ShepherdError;
use shepherd::exec::{ExecutionContext, ProcessWorker};
use shepherd::journal::{parse_line, read_runs};
use shepherd::lock;
use shepherd::types::{ContentionBehaviour, TaskName, TaskOutcome};

type TestResult = Result<(), Box<dyn Error>>;

fn task(name: &str) -> TaskName {
    name.parse().expect("valid task name")
}

fn last_event(text: &str) -> Option<String> {
    text.lines()
        .filter_map(parse_line)
        .last()
        .and_then(|l| l.event().map(str::to_string))
}

#[tokio::test]
async fn successful_run_is_framed_once() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let worker = FakeWorker::exiting_with(0).with_output("report generated\n");
    let dispatcher = Dispatcher::new(cfg, worker.clone());

    let run = with_timeout(dispatcher.run(&task("daily_report"))).await?;

    assert_eq!(run.exit_code, 0);
    assert_eq!(run.outcome, TaskOutcome::Success);
    assert_eq!(run.output_log, dir.path().join("logs/daily_report_output.log"));

    assert_eq!(count_events(&run.output_log, "start"), 1);
    assert_eq!(count_events(&run.output_log, "success"), 1);
    assert_eq!(count_events(&run.output_log, "failure"), 0);
    assert_eq!(count_events(&run.output_log, "end"), 1);

    let text = fs::read_to_string(&run.output_log)?;
    assert!(text.contains("report generated"));
    assert_eq!(last_event(&text).as_deref(), Some("end"));

    let seen = worker.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].command_line, "python --task=daily_report");
    Ok(())
}

#[tokio::test]
async fn failing_worker_exit_code_is_preserved() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let dispatcher = Dispatcher::new(cfg, FakeWorker::exiting_with(7));

    let run = dispatcher.run(&task("daily_report")).await?;

    assert_eq!(run.exit_code, 7);
    assert_eq!(run.outcome, TaskOutcome::Failed(7));
    assert_eq!(Dispatcher::<FakeWorker>::POLICY.exit_code(run.exit_code), 7);

    let text = fs::read_to_string(&run.output_log)?;
    let failure = text
        .lines()
        .filter_map(parse_line)
        .find(|l| l.event() == Some("failure"))
        .expect("failure line");
    assert_eq!(failure.get("kind"), Some("WorkerFailure"));
    assert_eq!(failure.get("exit_code"), Some("7"));
    assert_eq!(count_events(&run.output_log, "success"), 0);
    assert_eq!(last_event(&text).as_deref(), Some("end"));
    Ok(())
}

#[tokio::test]
async fn unlaunchable_worker_is_reported_as_launch_failure() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let dispatcher = Dispatcher::new(cfg, FakeWorker::unlaunchable());

    let run = dispatcher.run(&task("daily_report")).await?;

    assert_eq!(run.exit_code, LAUNCH_FAILURE_EXIT_CODE);
    assert_eq!(run.outcome, TaskOutcome::LaunchFailed);

    let text = fs::read_to_string(&run.output_log)?;
    assert!(text.contains("event=launch_failure"));
    assert!(text.contains("kind=LaunchFailure"));
    assert_eq!(count_events(&run.output_log, "end"), 1);
    Ok(())
}

#[tokio::test]
async fn missing_or_empty_task_name_touches_nothing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let worker = FakeWorker::exiting_with(0);
    let dispatcher = Dispatcher::new(cfg, worker.clone());

    for name in [None, Some(""), Some("../etc/passwd"), Some("a b")] {
        let err = dispatcher.run_task(name).await.unwrap_err();
        assert!(
            matches!(err, ShepherdError::InvalidTaskName(_)),
            "{name:?} gave {err:?}"
        );
    }

    assert!(!dir.path().join("logs").exists());
    assert!(worker.seen().is_empty());
    Ok(())
}

#[tokio::test]
async fn tasks_write_to_their_own_logs() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let dispatcher = Dispatcher::new(cfg, FakeWorker::exiting_with(0));

    let a = dispatcher.run(&task("alpha")).await?;
    let b = dispatcher.run(&task("beta")).await?;

    assert_ne!(a.output_log, b.output_log);
    assert_ne!(a.worker_log, b.worker_log);

    let alpha = fs::read_to_string(&a.output_log)?;
    let beta = fs::read_to_string(&b.output_log)?;
    assert!(alpha.contains("task=alpha"));
    assert!(!alpha.contains("task=beta"));
    assert!(beta.contains("task=beta"));
    assert!(!beta.contains("task=alpha"));
    Ok(())
}

#[tokio::test]
async fn repeated_runs_append() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let dispatcher = Dispatcher::new(cfg, FakeWorker::exiting_with(0));

    let first = dispatcher.run(&task("daily_report")).await?;
    let second = dispatcher.run(&task("daily_report")).await?;

    assert_eq!(count_events(&second.output_log, "start"), 2);
    assert_eq!(count_events(&second.output_log, "end"), 2);

    let runs = read_runs(&second.output_log)?;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, first.run_id);
    assert!(runs.iter().all(|r| r.succeeded() == Some(true)));
    Ok(())
}

#[tokio::test]
async fn env_file_is_the_whole_environment_when_not_inheriting() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    fs::write(dir.path().join(".env"), "# comment\n\nFOO=bar\n")?;
    let cfg = ConfigBuilder::new("python")
        .rooted_at(dir.path())
        .env_file(".env")
        .inherit_env(false)
        .build();
    let worker = FakeWorker::exiting_with(0);
    let dispatcher = Dispatcher::new(cfg, worker.clone());

    let run = dispatcher.run(&task("daily_report")).await?;

    let seen = worker.seen();
    let env = seen[0].context.env();
    assert_eq!(env.len(), 2, "unexpected env: {env:?}");
    assert_eq!(seen[0].context.get("FOO"), Some("bar"));
    assert_eq!(
        seen[0].context.get("WORKER_LOG_FILE").map(std::path::PathBuf::from),
        Some(run.worker_log.clone())
    );
    assert_eq!(seen[0].context.workdir(), dir.path());

    // The file alone contributes exactly one variable.
    let (ctx, problem) = ExecutionContext::builder(dir.path())
        .env_file(dir.path().join(".env"))
        .build();
    assert!(problem.is_none());
    assert_eq!(
        ctx.env().iter().collect::<Vec<_>>(),
        vec![(&"FOO".to_string(), &"bar".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn missing_env_file_is_logged_and_the_task_still_runs() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python")
        .rooted_at(dir.path())
        .env_file("missing.env")
        .build();
    let worker = FakeWorker::exiting_with(0);
    let dispatcher = Dispatcher::new(cfg, worker.clone());

    let run = dispatcher.run(&task("daily_report")).await?;

    assert_eq!(run.exit_code, 0);
    assert_eq!(worker.seen().len(), 1);
    let text = fs::read_to_string(&run.output_log)?;
    assert!(text.contains("event=env_setup_failure"));
    assert!(text.contains("kind=EnvironmentSetupFailure"));
    Ok(())
}

#[tokio::test]
async fn busy_task_is_skipped_without_framing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python").rooted_at(dir.path()).build();
    let layout = cfg.log_layout();
    layout.ensure_dirs()?;
    let _held = lock::try_acquire(&layout.task_lock(&task("daily_report")))?
        .expect("lock is free");

    let worker = FakeWorker::exiting_with(0);
    let dispatcher = Dispatcher::new(cfg, worker.clone());
    let err = dispatcher.run(&task("daily_report")).await.unwrap_err();

    assert!(matches!(err, ShepherdError::TaskBusy(ref t) if t == "daily_report"));
    assert!(worker.seen().is_empty());
    assert_eq!(
        count_events(&layout.task_output_log(&task("daily_report")), "start"),
        0
    );

    // Other tasks are unaffected.
    let other = dispatcher.run(&task("weekly_report")).await?;
    assert_eq!(other.exit_code, 0);
    Ok(())
}

#[tokio::test]
async fn lock_can_be_disabled() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python")
        .rooted_at(dir.path())
        .lock_enabled(false)
        .build();
    let layout = cfg.log_layout();
    layout.ensure_dirs()?;
    let _held = lock::try_acquire(&layout.task_lock(&task("daily_report")))?;

    let dispatcher = Dispatcher::new(cfg, FakeWorker::exiting_with(0));
    let run = dispatcher.run(&task("daily_report")).await?;
    assert_eq!(run.exit_code, 0);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn real_worker_output_and_internal_log_are_separated() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::sh(
        r#"echo "stdout $1"; echo "stderr $1" >&2; echo internal >> "$WORKER_LOG_FILE"; exit 3"#,
    )
    .rooted_at(dir.path())
    .build();
    let dispatcher = Dispatcher::new(cfg, ProcessWorker);

    let run = with_timeout(dispatcher.run(&task("daily_report"))).await?;

    assert_eq!(run.exit_code, 3);
    let output = fs::read_to_string(&run.output_log)?;
    assert!(output.contains("stdout --task=daily_report"));
    assert!(output.contains("stderr --task=daily_report"));
    assert!(!output.contains("internal"));
    assert_eq!(last_event(&output).as_deref(), Some("end"));

    let internal = fs::read_to_string(&run.worker_log)?;
    assert_eq!(internal.trim(), "internal");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn real_worker_that_cannot_start() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("/nonexistent/shepherd-worker")
        .rooted_at(dir.path())
        .build();
    let dispatcher = Dispatcher::new(cfg, ProcessWorker);

    let run = dispatcher.run(&task("daily_report")).await?;

    assert_eq!(run.exit_code, LAUNCH_FAILURE_EXIT_CODE);
    assert_eq!(count_events(&run.output_log, "launch_failure"), 1);
    assert_eq!(count_events(&run.output_log, "end"), 1);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn output_without_trailing_newline_keeps_framing_intact() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    for (script, outcome) in [("printf partial; exit 3", "failure"), ("printf partial", "success")] {
        let cfg = ConfigBuilder::sh(script).rooted_at(dir.path()).build();
        let dispatcher = Dispatcher::new(cfg, ProcessWorker);
        let name = format!("partial_{outcome}");

        let run = with_timeout(dispatcher.run(&task(&name))).await?;

        assert_eq!(count_events(&run.output_log, outcome), 1, "{script}");
        assert_eq!(count_events(&run.output_log, "end"), 1, "{script}");
        let text = fs::read_to_string(&run.output_log)?;
        assert!(text.lines().any(|l| l == "partial"), "{text}");
    }
    Ok(())
}

#[tokio::test]
async fn waiting_dispatch_runs_once_the_lock_is_released() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = ConfigBuilder::new("python")
        .rooted_at(dir.path())
        .on_contention(ContentionBehaviour::Wait)
        .build();
    let layout = cfg.log_layout();
    layout.ensure_dirs()?;
    let held = lock::try_acquire(&layout.task_lock(&task("daily_report")))?
        .expect("lock is free");

    let worker = FakeWorker::exiting_with(0);
    let dispatcher = Dispatcher::new(cfg, worker.clone());
    let pending = tokio::spawn(async move { dispatcher.run(&task("daily_report")).await });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(!pending.is_finished());
    assert!(worker.seen().is_empty());

    drop(held);
    let run = with_timeout(pending).await??;

    assert_eq!(run.exit_code, 0);
    assert_eq!(worker.seen().len(), 1);
    assert_eq!(count_events(&run.output_log, "start"), 1);
    assert_eq!(count_events(&run.output_log, "end"), 1);
    Ok(())
}
