// tests/pipeline_queue.rs

use std::error::Error;
use std::fs;
use std::path::Path;

use stagehand::engine::{PipelineRunner, RunSettings, StageState};
use stagehand::errors::StagehandError;
use stagehand::exec::LaunchRequest;
use stagehand_test_utils::builders::diamond;
use stagehand_test_utils::fake_backend::FakeBackend;
use stagehand_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn settings(root: &Path) -> RunSettings {
    RunSettings::new(root)
        .with_queue("wisp-mem")
        .with_run_dir(root.join("run"))
}

fn request<'a>(launched: &'a [LaunchRequest], stage: &str) -> &'a LaunchRequest {
    launched
        .iter()
        .find(|r| r.stage == stage)
        .unwrap_or_else(|| panic!("stage {stage} was not launched"))
}

#[tokio::test]
async fn dependents_hold_on_their_prerequisites() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = FakeBackend::queued();
    let launched = backend.launched();

    let mut d = diamond(|name| format!("echo {name}\n"));
    let report = PipelineRunner::new(settings(root.path()), Box::new(backend))
        .run_pipeline(&mut d.graph)
        .await?;

    let launched = launched.lock().unwrap().clone();
    assert_eq!(launched.len(), 4);
    let (a, b, c, dd) = (
        request(&launched, "a"),
        request(&launched, "b"),
        request(&launched, "c"),
        request(&launched, "d"),
    );
    assert!(a.holds.is_empty());
    assert_eq!(b.holds, vec![a.job_name.clone()]);
    assert_eq!(c.holds, vec![a.job_name.clone()]);
    assert_eq!(dd.holds, vec![b.job_name.clone(), c.job_name.clone()]);
    assert_eq!(a.resources.queue.as_deref(), Some("wisp-mem"));

    assert_eq!(report.count(StageState::Running), 4);
    let teardown = report.global_teardown.expect("global teardown written");
    let text = fs::read_to_string(teardown)?;
    assert_eq!(text.lines().count(), 4);
    assert!(text.lines().all(|l| l.starts_with("bash ")), "{text}");
    Ok(())
}

#[tokio::test]
async fn live_submission_is_reused_not_resubmitted() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let run_dir = root.path().join("run");
    let backend = FakeBackend::queued().with_live_submission(run_dir.join("b"));
    let launched = backend.launched();

    let mut d = diamond(|name| format!("echo {name}\n"));
    let report = PipelineRunner::new(settings(root.path()), Box::new(backend))
        .run_pipeline(&mut d.graph)
        .await?;

    let launched = launched.lock().unwrap().clone();
    let names: Vec<&str> = launched.iter().map(|r| r.stage.as_str()).collect();
    assert!(!names.contains(&"b"), "{names:?}");
    assert!(request(&launched, "d").holds.contains(&"live-b".to_string()));

    let b = report.stages.iter().find(|r| r.name == "b").expect("b recorded");
    assert_eq!(b.state, StageState::Running);
    assert_eq!(b.job_name.as_deref(), Some("live-b"));
    Ok(())
}

#[tokio::test]
async fn complete_prerequisites_are_not_held_on() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let a_dir = root.path().join("run").join("a");
    fs::create_dir_all(&a_dir)?;
    fs::write(a_dir.join("DONE"), b"")?;

    let backend = FakeBackend::queued();
    let launched = backend.launched();
    let mut d = diamond(|name| format!("echo {name}\n"));
    let report = PipelineRunner::new(settings(root.path()), Box::new(backend))
        .run_pipeline(&mut d.graph)
        .await?;

    assert_eq!(report.state_of("a"), Some(StageState::Skipped));
    let launched = launched.lock().unwrap().clone();
    assert!(request(&launched, "b").holds.is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_submission_aborts_the_run() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = FakeBackend::queued().failing("c");
    let launched = backend.launched();

    let mut d = diamond(|name| format!("echo {name}\n"));
    let mut runner = PipelineRunner::new(settings(root.path()), Box::new(backend));
    let err = runner.run_pipeline(&mut d.graph).await.unwrap_err();

    assert!(matches!(err, StagehandError::SubmissionFailed { ref stage, .. } if stage == "c"));
    assert_eq!(runner.report().state_of("c"), Some(StageState::Failed));
    assert!(launched.lock().unwrap().iter().all(|r| r.stage != "d"));
    Ok(())
}
