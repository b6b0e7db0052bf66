mod common;

use std::sync::Arc;

use archive_vfs::vfs::files;
use archive_vfs::{
    create_archive, ignore_file_writability, open_archive, open_archive_with, unwrap_path,
    AccessMode, ArchiveError, ArchiveProvider, Env, FileSystem, FileSystemProvider,
    OverrideProvider,
};
use common::{init_tracing, write_denied_path, WriteDenyingProvider};
use tempfile::tempdir;

fn existing_archive(dir: &std::path::Path) -> std::path::PathBuf {
    let archive = dir.join("existing.zip");
    let fs = create_archive(&archive).unwrap();
    files::write(&fs.clone().path("/original.txt"), "original").unwrap();
    fs.close().unwrap();
    archive
}

#[test]
fn test_strict_probe_mounts_read_only() {
    init_tracing();
    let temp_dir = tempdir().unwrap();
    let archive = existing_archive(temp_dir.path());

    let fs = ArchiveProvider::new()
        .new_file_system(&write_denied_path(&archive), &Env::default())
        .unwrap();

    assert!(fs.is_read_only());
    assert_eq!(
        files::read(&fs.clone().path("/original.txt")).unwrap(),
        b"original"
    );
    let err = files::write(&fs.clone().path("/new.txt"), "x").unwrap_err();
    assert!(matches!(err, ArchiveError::ReadOnly(_)));
    fs.close().unwrap();
}

#[test]
fn test_ignoring_writability_gives_writable_mount() {
    let temp_dir = tempdir().unwrap();
    let archive = existing_archive(temp_dir.path());
    let backing = ignore_file_writability(&write_denied_path(&archive));

    let fs = ArchiveProvider::new()
        .new_file_system(&backing, &Env::default())
        .unwrap();
    assert!(!fs.is_read_only());
    files::write(&fs.clone().path("/new.txt"), "added").unwrap();
    fs.close().unwrap();

    let fs = open_archive(&archive_vfs::local_path(&archive)).unwrap();
    assert_eq!(files::read(&fs.clone().path("/new.txt")).unwrap(), b"added");
    fs.close().unwrap();
}

#[test]
fn test_open_archive_suppresses_write_probe() {
    let temp_dir = tempdir().unwrap();
    let archive = existing_archive(temp_dir.path());

    let fs = open_archive_with(&write_denied_path(&archive), &Env::default()).unwrap();

    assert!(!fs.is_read_only());
    fs.close().unwrap();
}

#[test]
fn test_read_checks_still_reach_the_backing_provider() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("missing.zip");
    let backing = ignore_file_writability(&write_denied_path(&missing));
    let provider = backing.file_system().provider();

    provider.check_access(&backing, &[AccessMode::Write]).unwrap();
    assert!(provider
        .check_access(&backing, &[AccessMode::Write, AccessMode::Read])
        .unwrap_err()
        .is_not_found());
    assert!(provider.check_access(&backing, &[]).unwrap_err().is_not_found());
}

#[test]
fn test_override_layers_unwrap_one_at_a_time() {
    let temp_dir = tempdir().unwrap();
    let archive = existing_archive(temp_dir.path());
    let inner = write_denied_path(&archive);
    let outer = ignore_file_writability(&inner);

    let outer_provider = outer.file_system().provider();
    let outer_provider = outer_provider
        .as_any()
        .downcast_ref::<OverrideProvider>()
        .unwrap();
    assert!(outer_provider
        .delegate()
        .as_any()
        .is::<WriteDenyingProvider>());

    assert!(Arc::ptr_eq(&unwrap_path(&outer), &inner));
    assert!(*outer == *inner);

    // The denying provider refuses WRITE; the override above it does not.
    assert!(files::provider_of(&inner)
        .check_access(&inner, &[AccessMode::Write])
        .unwrap_err()
        .is_permission_denied());
    files::provider_of(&outer)
        .check_access(&outer, &[AccessMode::Write])
        .unwrap();
}
