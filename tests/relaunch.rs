// tests/relaunch.rs

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use stagehand::errors::StagehandError;
use stagehand::queue::SgeDialect;
use stagehand::relaunch::{RelaunchOptions, RelaunchSummary, Relauncher};
use stagehand_test_utils::fake_status::FakeStatus;
use stagehand_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// A stage directory whose submission script records each invocation.
fn submitted_stage(run_dir: &Path, name: &str, job: &str) -> std::io::Result<()> {
    let dir = run_dir.join(name);
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("qsub-script_000.sh"),
        format!("# qsub -N {job} \"bash 'experiment-script_000.sh'\"\necho submitted >> submissions\n"),
    )?;
    fs::write(dir.join("stdout"), "partial output\n")
}

fn relauncher(options: RelaunchOptions, status: FakeStatus) -> Relauncher {
    Relauncher::new(options, Arc::new(SgeDialect::for_queue(None)), Arc::new(status))
}

#[tokio::test]
async fn only_dead_unfinished_stages_are_resubmitted() -> TestResult {
    init_tracing();
    let run = tempfile::tempdir()?;
    submitted_stage(run.path(), "a", "a_1")?;
    fs::write(run.path().join("a").join("DONE"), b"")?;
    submitted_stage(run.path(), "b", "b_2")?;
    submitted_stage(run.path(), "c", "c_3")?;

    let status = FakeStatus::alive(&["b_2"]);
    let summary = relauncher(RelaunchOptions::default(), status.clone())
        .relaunch(run.path())
        .await?;

    assert_eq!(
        summary,
        RelaunchSummary {
            done: 1,
            running: 1,
            relaunched: 1,
            skipped: 0,
        }
    );
    assert_eq!(status.queried(), vec!["b_2", "c_3"]);
    assert!(!run.path().join("b").join("submissions").exists());
    assert_eq!(fs::read_to_string(run.path().join("c").join("submissions"))?, "submitted\n");
    assert!(!run.path().join("c").join("stdout").exists());
    Ok(())
}

#[tokio::test]
async fn second_pass_sees_the_relaunched_job_alive() -> TestResult {
    init_tracing();
    let run = tempfile::tempdir()?;
    submitted_stage(run.path(), "c", "c_3")?;

    let status = FakeStatus::new();
    let monitor = relauncher(RelaunchOptions::default(), status.clone());
    assert_eq!(monitor.relaunch(run.path()).await?.relaunched, 1);

    status.set_alive("c_3", true);
    let again = monitor.relaunch(run.path()).await?;
    assert_eq!(again.running, 1);
    assert_eq!(again.relaunched, 0);
    assert_eq!(fs::read_to_string(run.path().join("c").join("submissions"))?, "submitted\n");
    Ok(())
}

#[tokio::test]
async fn latest_submission_script_is_used() -> TestResult {
    init_tracing();
    let run = tempfile::tempdir()?;
    submitted_stage(run.path(), "s", "s_old")?;
    fs::write(
        run.path().join("s").join("qsub-script_001.sh"),
        "# qsub -N s_new x\necho new >> submissions\n",
    )?;

    let status = FakeStatus::alive(&["s_old"]);
    let summary = relauncher(RelaunchOptions::default(), status.clone())
        .relaunch(run.path())
        .await?;

    assert_eq!(summary.relaunched, 1);
    assert_eq!(status.queried(), vec!["s_new"]);
    assert_eq!(fs::read_to_string(run.path().join("s").join("submissions"))?, "new\n");
    Ok(())
}

#[tokio::test]
async fn test_mode_leaves_directories_untouched() -> TestResult {
    init_tracing();
    let run = tempfile::tempdir()?;
    submitted_stage(run.path(), "c", "c_3")?;

    let options = RelaunchOptions {
        test_only: true,
        ..RelaunchOptions::default()
    };
    let summary = relauncher(options, FakeStatus::new()).relaunch(run.path()).await?;

    assert_eq!(summary.relaunched, 1);
    assert!(run.path().join("c").join("stdout").exists());
    assert!(!run.path().join("c").join("submissions").exists());
    Ok(())
}

#[tokio::test]
async fn rejected_resubmission_stops_the_pass() -> TestResult {
    init_tracing();
    let run = tempfile::tempdir()?;
    let dir = run.path().join("bad");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("qsub-script_000.sh"), "# qsub -N bad_1 x\nexit 3\n")?;
    submitted_stage(run.path(), "later", "later_2")?;

    let options = RelaunchOptions {
        tries: 2,
        ..RelaunchOptions::default()
    };
    let err = relauncher(options, FakeStatus::new())
        .relaunch(run.path())
        .await
        .unwrap_err();

    match err {
        StagehandError::RelaunchFailed { dir: failed, attempts } => {
            assert_eq!(failed, dir);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!run.path().join("later").join("submissions").exists());
    Ok(())
}

#[tokio::test]
async fn several_run_directories_are_summed() -> TestResult {
    init_tracing();
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    submitted_stage(first.path(), "a", "a_1")?;
    submitted_stage(second.path(), "b", "b_2")?;

    let summary = relauncher(RelaunchOptions::default(), FakeStatus::alive(&["a_1"]))
        .relaunch_all(&[first.path().to_path_buf(), second.path().to_path_buf()])
        .await?;

    assert_eq!(summary.running, 1);
    assert_eq!(summary.relaunched, 1);
    Ok(())
}
