//! # Lock Tests

use super::index_lock::holder_pid;
use super::*;
use std::fs;
use std::time::Duration;

const SHORT: Duration = Duration::from_millis(150);

#[test]
fn test_lock_records_pid() {
    let dir = tempfile::tempdir().unwrap();
    let lock = IndexLock::acquire(dir.path(), SHORT).unwrap();

    assert_eq!(lock.path(), dir.path().join(LOCK_FILE));
    assert_eq!(lock.pid(), std::process::id());
    assert_eq!(holder_pid(lock.path()), Some(std::process::id()));
}

#[test]
fn test_second_lock_reports_holder() {
    let dir = tempfile::tempdir().unwrap();
    let _held = IndexLock::acquire(dir.path(), SHORT).unwrap();

    match IndexLock::acquire(dir.path(), SHORT) {
        Err(LockError::Held { holder, .. }) => assert_eq!(holder, Some(std::process::id())),
        other => panic!("expected Held, got {:?}", other),
    }
}

#[test]
fn test_drop_releases_but_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(LOCK_FILE);
    drop(IndexLock::acquire(dir.path(), SHORT).unwrap());

    assert!(path.exists());
    assert_eq!(holder_pid(&path), None);
    let again = IndexLock::acquire(dir.path(), SHORT).unwrap();
    assert_eq!(holder_pid(again.path()), Some(std::process::id()));
}

#[test]
fn test_stale_pid_in_held_file_is_not_taken_over() {
    let dir = tempfile::tempdir().unwrap();
    let held = IndexLock::acquire(dir.path(), SHORT).unwrap();
    // A holder that has locked but not yet recorded itself still shows
    // whatever PID the last owner left.
    fs::write(held.path(), b"4194304\n").unwrap();

    match IndexLock::acquire(dir.path(), SHORT) {
        Err(LockError::Held { holder, .. }) => assert_eq!(holder, Some(4_194_304)),
        other => panic!("expected Held, got {:?}", other),
    }
    assert!(held.path().exists());
}

#[test]
fn test_leftover_file_without_lock_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    // Unlocked file from a process that exited without cleaning up.
    fs::write(dir.path().join(LOCK_FILE), b"4194304\n").unwrap();

    let lock = IndexLock::acquire(dir.path(), SHORT).unwrap();
    assert_eq!(holder_pid(lock.path()), Some(std::process::id()));
}

#[test]
fn test_acquire_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("unchained").join("mainnet");
    let lock = IndexLock::acquire(&nested, SHORT).unwrap();
    assert!(lock.path().starts_with(&nested));
}

#[cfg(unix)]
#[test]
fn test_symlinked_lock_file_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = dir.path().join("elsewhere");
    fs::write(&elsewhere, b"").unwrap();
    let chain = dir.path().join("mainnet");
    fs::create_dir_all(&chain).unwrap();
    std::os::unix::fs::symlink(&elsewhere, chain.join(LOCK_FILE)).unwrap();

    assert!(matches!(
        IndexLock::acquire(&chain, SHORT),
        Err(LockError::Symlink(_))
    ));
}

#[test]
fn test_default_timeout() {
    assert_eq!(DEFAULT_LOCK_TIMEOUT, Duration::from_secs(30));
}
