use std::fs;

use tagrade::late::{LateError, is_late};
use tempfile::TempDir;

fn deadline_file(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("deadline.txt");
    fs::write(&path, contents).expect("write deadline");
    (dir, path)
}

#[test]
fn commit_after_deadline_is_late() {
    let (_dir, path) = deadline_file("2026-01-15 23:59:59\n");
    assert!(is_late(&path, "2026-01-16T00:00:01-05:00").expect("evaluate"));
}

#[test]
fn commit_before_deadline_is_not_late() {
    let (_dir, path) = deadline_file("2026-01-15 23:59:59\n");
    assert!(!is_late(&path, "2026-01-10T12:00:00-05:00").expect("evaluate"));
}

#[test]
fn naive_deadline_uses_the_commit_offset() {
    // 23:00 -05:00 is 04:00Z the next day; a naive midnight deadline read in
    // the commit's own offset makes this commit an hour early, not late.
    let (_dir, path) = deadline_file("2026-01-16 00:00");
    assert!(!is_late(&path, "2026-01-15T23:00:00-05:00").expect("evaluate"));
    assert!(is_late(&path, "2026-01-16T00:00:01-05:00").expect("evaluate"));
}

#[test]
fn rfc3339_deadline_is_compared_in_absolute_time() {
    let (_dir, path) = deadline_file("2026-01-16T00:00:00-05:00");
    // 04:59Z == 23:59 -05:00, one minute before the deadline.
    assert!(!is_late(&path, "2026-01-16T04:59:00+00:00").expect("evaluate"));
    assert!(is_late(&path, "2026-01-16T05:01:00+00:00").expect("evaluate"));
}

#[test]
fn bare_date_deadline_means_start_of_day() {
    let (_dir, path) = deadline_file("2026-01-16");
    assert!(is_late(&path, "2026-01-16T00:00:01-05:00").expect("evaluate"));
    assert!(!is_late(&path, "2026-01-15T23:59:59-05:00").expect("evaluate"));
}

#[test]
fn unparseable_deadline_is_fatal() {
    let (_dir, path) = deadline_file("whenever feels right");
    let err = is_late(&path, "2026-01-16T00:00:00-05:00").expect_err("should fail");
    assert!(matches!(err, LateError::BadDeadline { .. }));
}

#[test]
fn unparseable_commit_timestamp_is_fatal() {
    let (_dir, path) = deadline_file("2026-01-15 23:59:59");
    let err = is_late(&path, "last tuesday").expect_err("should fail");
    assert!(matches!(err, LateError::BadTimestamp { .. }));
}

#[test]
fn missing_deadline_file_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("deadline.txt");
    let err = is_late(&path, "2026-01-16T00:00:00-05:00").expect_err("should fail");
    assert!(matches!(err, LateError::Deadline { .. }));
}
