mod common;

use common::{append_n, session_counter};
use impulse_tracker::{EventLog, Snapshot};
use tempfile::tempdir;

#[test]
fn test_manual_rotation_moves_events_to_archive() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 10);

    log.rotate().unwrap();

    assert_eq!(log.active_log_size().unwrap(), 0);
    assert!(log.archive_path().exists());
    assert_eq!(log.reader().events().unwrap().len(), 10);
}

#[test]
fn test_rotation_resets_offsets_but_keeps_state() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 5);
    log.rotate().unwrap();

    let snap: Snapshot<u64> =
        impulse_tracker::snapshot::load(&log.views_dir().join("sessions.snapshot.json"))
            .unwrap()
            .unwrap();
    assert_eq!(snap.offset, 0);
    assert_eq!(snap.state, 5);

    append_n(&mut log, 2);
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 7);
}

#[test]
fn test_auto_rotation_on_size() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::builder(dir.path())
        .max_log_size(1_000)
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    append_n(&mut log, 30);

    assert!(log.archive_path().exists());
    assert!(log.active_log_size().unwrap() <= 1_000);
    assert_eq!(log.reader().events().unwrap().len(), 30);

    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 30);
}

#[test]
fn test_fresh_view_after_rotation_replays_archive() {
    let dir = tempdir().unwrap();
    {
        let mut log = EventLog::builder(dir.path())
            .max_log_size(1_000)
            .open()
            .unwrap();
        append_n(&mut log, 25);
    }

    let mut log = EventLog::builder(dir.path())
        .view::<u64>("sessions", session_counter)
        .open()
        .unwrap();
    log.refresh_all().unwrap();
    assert_eq!(*log.view::<u64>("sessions").unwrap(), 25);
}

#[test]
fn test_clear_removes_archive() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path()).unwrap();
    append_n(&mut log, 3);
    log.rotate().unwrap();
    assert!(log.archive_path().exists());

    log.clear().unwrap();
    assert!(!log.archive_path().exists());
    assert!(log.reader().events().unwrap().is_empty());
}
