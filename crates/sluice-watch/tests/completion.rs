use std::fs;
use std::time::{Duration, Instant};

use anyhow::Result;
use sluice_config::CompletionPolicy;
use sluice_test_support::fixtures::{temp_workspace, write_file};
use sluice_test_support::wait::wait_until;
use sluice_watch::{CompletionDetector, FsEvent, Reconciler};

const WAIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(50);

fn stability(secs: u64) -> CompletionPolicy {
    CompletionPolicy::StabilityWindow {
        window: Duration::from_secs(secs),
    }
}

#[test]
fn csv_becomes_ready_after_window() -> Result<()> {
    let workspace = temp_workspace()?;
    let detector = CompletionDetector::new(workspace.path(), stability(2), false);
    let path = write_file(workspace.path(), "x.csv", b"a,b\n1,2\n")?;
    let start = Instant::now();
    detector.observe_at(&FsEvent::created(&path), start);

    assert!(detector.ready_paths_at(start + Duration::from_millis(1500)).is_empty());
    assert_eq!(
        detector.ready_paths_at(start + Duration::from_secs(2)),
        vec![path]
    );
    Ok(())
}

#[test]
fn writes_inside_the_window_keep_path_pending() -> Result<()> {
    let workspace = temp_workspace()?;
    let detector = CompletionDetector::new(workspace.path(), stability(2), false);
    let path = write_file(workspace.path(), "x.csv", b"a,b\n")?;
    let start = Instant::now();
    detector.observe_at(&FsEvent::created(&path), start);

    fs::write(&path, b"a,b\n1,2\n")?;
    let second = start + Duration::from_secs(1);
    detector.observe_at(&FsEvent::modified(&path), second);

    assert!(detector.ready_paths_at(start + Duration::from_secs(2)).is_empty());
    assert_eq!(
        detector.ready_paths_at(second + Duration::from_secs(2)),
        vec![path]
    );
    Ok(())
}

#[test]
fn live_watcher_reports_sidecar_completion() -> Result<()> {
    let workspace = temp_workspace()?;
    let detector = CompletionDetector::new(workspace.path(), CompletionPolicy::Sidecar, false);
    detector.start()?;

    let path = write_file(workspace.path(), "x.csv", b"a,b\n1,2\n")?;
    assert!(wait_until(WAIT, POLL, || detector.tracked_count() == 1));
    assert!(detector.ready_paths().is_empty());

    write_file(workspace.path(), "x.csv.ok", b"")?;
    assert!(wait_until(WAIT, POLL, || detector.ready_paths() == vec![path.clone()]));

    fs::remove_file(&path)?;
    assert!(wait_until(WAIT, POLL, || detector.tracked_count() == 0));
    detector.stop();
    Ok(())
}

#[test]
fn live_watcher_ignores_temp_files_until_renamed() -> Result<()> {
    let workspace = temp_workspace()?;
    let detector = CompletionDetector::new(workspace.path(), stability(0), false);
    detector.start()?;

    let partial = write_file(workspace.path(), "y.csv.part", b"payload")?;
    let done = workspace.path().join("y.csv");
    fs::rename(&partial, &done)?;

    assert!(wait_until(WAIT, POLL, || detector.ready_paths() == vec![done.clone()]));
    assert!(detector.tracked(&partial).is_none());
    detector.stop();
    Ok(())
}

#[test]
fn reconcile_arms_existing_files_and_markers() -> Result<()> {
    let workspace = temp_workspace()?;
    let x = write_file(workspace.path(), "x.csv", b"x")?;
    write_file(workspace.path(), "x.csv.ok", b"")?;
    write_file(workspace.path(), "y.csv", b"y")?;
    write_file(workspace.path(), ".hidden", b"h")?;
    write_file(workspace.path(), "nested/z.csv", b"z")?;

    let detector = CompletionDetector::new(workspace.path(), CompletionPolicy::Sidecar, false);
    let summary = Reconciler::scan(&detector)?;
    assert_eq!(summary.files, 3);
    assert_eq!(summary.markers, 1);
    assert_eq!(detector.tracked_count(), 2);
    assert_eq!(detector.ready_paths(), vec![x]);
    Ok(())
}

#[test]
fn recursive_reconcile_descends() -> Result<()> {
    let workspace = temp_workspace()?;
    let nested = write_file(workspace.path(), "a/b/z.csv", b"z")?;
    let detector = CompletionDetector::new(workspace.path(), stability(0), true);

    let summary = Reconciler::scan(&detector)?;
    assert_eq!(summary.files, 1);
    assert_eq!(detector.ready_paths(), vec![nested]);
    Ok(())
}

#[test]
fn reconcile_of_missing_root_fails() -> Result<()> {
    let workspace = temp_workspace()?;
    let detector = CompletionDetector::new(
        workspace.path().join("missing"),
        CompletionPolicy::Sidecar,
        false,
    );
    assert!(Reconciler::scan(&detector).is_err());
    Ok(())
}
