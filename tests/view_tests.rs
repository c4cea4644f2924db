mod common;

use common::{append_n, exercise_at, minutes, session_counter};
use impulse_tracker::{EventLog, Snapshot, View, ViewOps};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_fresh_view_empty_log() {
    let dir = tempdir().unwrap();
    let log = EventLog::open(dir.path()).unwrap();
    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 0);
}

#[test]
fn test_incremental_refresh() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 3);

    log.append(&exercise_at(minutes(5), 20)).unwrap();
    append_n(&mut log, 2);
    assert_eq!(*view.refresh(log.reader()).unwrap(), 5);
}

#[test]
fn test_no_op_refresh_leaves_snapshot_alone() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    view.refresh(log.reader()).unwrap();

    let snapshot_path = log.views_dir().join("sessions.snapshot.json");
    let before = fs::read_to_string(&snapshot_path).unwrap();
    let mtime_before = fs::metadata(&snapshot_path).unwrap().modified().unwrap();

    std::thread::sleep(std::time::Duration::from_millis(50));

    view.refresh(log.reader()).unwrap();
    assert_eq!(fs::read_to_string(&snapshot_path).unwrap(), before);
    assert_eq!(
        fs::metadata(&snapshot_path).unwrap().modified().unwrap(),
        mtime_before
    );
}

#[test]
fn test_snapshot_resumes_in_new_view() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    {
        let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
        view.refresh(log.reader()).unwrap();
    }
    append_n(&mut log, 2);

    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 5);

    let snap: Snapshot<u64> =
        impulse_tracker::snapshot::load(&log.views_dir().join("sessions.snapshot.json"))
            .unwrap()
            .unwrap();
    assert_eq!(snap.state, 5);
    assert_eq!(snap.offset, log.active_log_size().unwrap());
}

#[test]
fn test_tampered_snapshot_is_rebuilt() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 4);
    let snapshot_path = log.views_dir().join("sessions.snapshot.json");
    {
        let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
        view.refresh(log.reader()).unwrap();
    }

    let mut snap: Snapshot<u64> = impulse_tracker::snapshot::load(&snapshot_path)
        .unwrap()
        .unwrap();
    snap.state = 99;
    snap.hash = "0000000000000000".to_string();
    impulse_tracker::snapshot::save(&snapshot_path, &snap).unwrap();

    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 4);
}

#[test]
fn test_snapshot_past_eof_is_rebuilt() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 2);
    let snapshot_path = log.views_dir().join("sessions.snapshot.json");
    impulse_tracker::snapshot::save(
        &snapshot_path,
        &Snapshot::new(40u64, 1_000_000, "abc".to_string()),
    )
    .unwrap();

    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 2);
}

#[test]
fn test_corrupt_snapshot_is_ignored() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 2);
    fs::write(log.views_dir().join("sessions.snapshot.json"), "{not json").unwrap();

    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    assert_eq!(*view.refresh(log.reader()).unwrap(), 2);
}

#[test]
fn test_rebuild_replays_everything() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    view.refresh(log.reader()).unwrap();
    assert_eq!(*view.rebuild(log.reader()).unwrap(), 3);
}

#[test]
fn test_registry_lookup() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 2);
    log.refresh_all().unwrap();

    assert_eq!(*log.view::<u64>("sessions").unwrap(), 2);
    assert_eq!(
        log.view::<u64>("missing").unwrap_err().kind(),
        std::io::ErrorKind::NotFound
    );
    assert_eq!(
        log.view::<String>("sessions").unwrap_err().kind(),
        std::io::ErrorKind::InvalidInput
    );
}

#[test]
fn test_clear_resets_registered_views() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 3);
    log.refresh_all().unwrap();

    log.clear().unwrap();
    assert!(!log.views_dir().join("sessions.snapshot.json").exists());
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 0);

    append_n(&mut log, 1);
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 1);
}

#[test]
fn test_failed_clear_leaves_log_and_views_in_step() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 3);
    log.refresh_all().unwrap();

    // A directory where the archive file belongs cannot be removed as a file
    let archive = log.archive_path().to_path_buf();
    fs::create_dir(&archive).unwrap();
    assert!(log.clear().is_err());
    assert!(log.active_log_size().unwrap() > 0);
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 3);

    fs::remove_dir(&archive).unwrap();
    log.clear().unwrap();
    assert_eq!(log.active_log_size().unwrap(), 0);
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 0);
}

#[test]
fn test_reset_offset_keeps_state() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    let mut view: View<u64> = View::new("sessions", session_counter, log.views_dir());
    view.refresh(log.reader()).unwrap();

    view.reset_offset().unwrap();
    assert_eq!(*view.state(), 3);
    assert_eq!(view.view_name(), "sessions");
}
