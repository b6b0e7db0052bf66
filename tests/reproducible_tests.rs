mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use archive_vfs::vfs::files;
use archive_vfs::{
    create_reproducible, local_path, open_archive, zip_reproducibly, ArchiveError, ArchiveProvider,
    Env, FileSystem, FileSystemProvider, FileSystemRef, ReproducibleFileSystem, WalkOrder,
};
use chrono::{DateTime, TimeZone, Utc};
use common::{init_tracing, member_names, write_denied_path, write_tree};
use rstest::rstest;
use tempfile::tempdir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 4, 9, 10, 15, 30).unwrap()
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn test_identical_input_gives_identical_bytes() {
    init_tracing();
    let temp_dir = tempdir().unwrap();
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");
    write_tree(
        &first,
        &[("b.txt", b"bee"), ("a/z.txt", b"zed"), ("a/m.txt", b"em")],
    );
    // Same content, created in a different order with different mtimes.
    write_tree(
        &second,
        &[("a/m.txt", b"em"), ("b.txt", b"bee"), ("a/z.txt", b"zed")],
    );
    set_mtime(
        &second.join("b.txt"),
        SystemTime::now() - Duration::from_secs(86_400),
    );

    let first_zip = temp_dir.path().join("first.zip");
    let second_zip = temp_dir.path().join("second.zip");
    zip_reproducibly(&local_path(&first), &first_zip, t0()).unwrap();
    zip_reproducibly(&local_path(&second), &second_zip, t0()).unwrap();

    assert_eq!(fs::read(&first_zip).unwrap(), fs::read(&second_zip).unwrap());
}

#[rstest]
#[case(t0())]
#[case(Utc.with_ymd_and_hms(2010, 4, 9, 10, 15, 31).unwrap())]
#[case(Utc.with_ymd_and_hms(1975, 1, 1, 0, 0, 0).unwrap())]
#[case(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())]
fn test_members_are_sorted_and_stamped(#[case] time: DateTime<Utc>) {
    let temp_dir = tempdir().unwrap();
    let source = temp_dir.path().join("source");
    write_tree(
        &source,
        &[("zeta.txt", b"z"), ("alpha/two.txt", b"2"), ("alpha/one.txt", b"1")],
    );
    let archive = temp_dir.path().join("repro.zip");

    zip_reproducibly(&local_path(&source), &archive, time).unwrap();

    let fs = open_archive(&local_path(&archive)).unwrap();
    assert_eq!(
        member_names(&fs, WalkOrder::Natural),
        vec!["/alpha", "/alpha/one.txt", "/alpha/two.txt", "/zeta.txt"]
    );
    let expected = SystemTime::from(time);
    for name in member_names(&fs, WalkOrder::Natural) {
        let attrs = files::read_attributes(&fs.clone().path(&name)).unwrap();
        assert_eq!(attrs.modified, expected, "{name}");
        assert_eq!(attrs.created, expected, "{name}");
        assert_eq!(attrs.accessed, expected, "{name}");
    }
    fs.close().unwrap();
}

#[test]
fn test_file_source_is_copied_to_root() {
    let temp_dir = tempdir().unwrap();
    write_tree(temp_dir.path(), &[("single.txt", b"only")]);
    let archive = temp_dir.path().join("single.zip");

    zip_reproducibly(&local_path(temp_dir.path().join("single.txt")), &archive, t0()).unwrap();

    let fs = open_archive(&local_path(&archive)).unwrap();
    assert_eq!(member_names(&fs, WalkOrder::Natural), vec!["/single.txt"]);
    fs.close().unwrap();
}

#[test]
fn test_late_changes_are_normalized_too() {
    let temp_dir = tempdir().unwrap();
    let archive = temp_dir.path().join("late.zip");

    let fs = create_reproducible(&archive, &Env::default(), Some(t0())).unwrap();
    files::write(&fs.clone().path("/early.txt"), "early").unwrap();
    files::create_directory(&fs.clone().path("/late")).unwrap();
    files::write(&fs.clone().path("/late/file.txt"), "late").unwrap();
    files::write(&fs.clone().path("/early.txt"), "rewritten").unwrap();
    fs.close().unwrap();

    let fs = open_archive(&local_path(&archive)).unwrap();
    for name in ["/early.txt", "/late", "/late/file.txt"] {
        let attrs = files::read_attributes(&fs.clone().path(name)).unwrap();
        assert_eq!(attrs.modified, SystemTime::from(t0()), "{name}");
    }
    assert_eq!(
        files::read(&fs.clone().path("/early.txt")).unwrap(),
        b"rewritten"
    );
    fs.close().unwrap();
}

#[test]
fn test_create_reproducible_refuses_existing_file() {
    let temp_dir = tempdir().unwrap();
    let archive = temp_dir.path().join("exists.zip");
    fs::write(&archive, "precious").unwrap();

    let err = create_reproducible(&archive, &Env::default(), Some(t0())).unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(fs::read(&archive).unwrap(), b"precious");
}

#[test]
fn test_create_reproducible_creates_missing_parents() {
    let temp_dir = tempdir().unwrap();
    let archive = temp_dir.path().join("a/b/c/out.zip");

    let fs = create_reproducible(&archive, &Env::default(), None).unwrap();
    files::write(&fs.clone().path("/f"), "f").unwrap();
    fs.close().unwrap();

    assert!(archive.exists());
}

#[test]
fn test_failed_normalization_still_closes_mount() {
    let temp_dir = tempdir().unwrap();
    let source = temp_dir.path().join("source");
    write_tree(&source, &[("f.txt", b"f")]);
    let archive = temp_dir.path().join("a.zip");
    zip_reproducibly(&local_path(&source), &archive, t0()).unwrap();

    // Without the writability override the mount comes up read-only, so
    // stamping members fails.
    let delegate: FileSystemRef = ArchiveProvider::new()
        .new_file_system(&write_denied_path(&archive), &Env::default())
        .unwrap();
    assert!(delegate.is_read_only());
    let fs = ReproducibleFileSystem::new(Arc::clone(&delegate), Some(t0()));

    let err = fs.close().unwrap_err();

    assert!(err.to_string().contains("Could not set time attributes on /f.txt"));
    assert!(matches!(err.root_cause(), ArchiveError::ReadOnly(_)));
    assert!(!delegate.is_open());
    assert!(!fs.is_open());
}
