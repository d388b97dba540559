//! Tests for the filesystem operations over a ready mount
//!
//! The mount prefix is `/saved` throughout, so every path the storage
//! service sees should start with it.

mod common;

use common::{any_call, entry_paths, ready_fs, KIND};
use gatedfs::backends::StorageCall;
use gatedfs::{EntryType, FsError, OpenFlags, RemoveMask};
use rstest::rstest;

fn no_queries(call: &StorageCall) -> bool {
    matches!(call, StorageCall::Query(_))
}

#[test]
fn test_open_existing_file_under_prefix() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/data/a.txt", 12);

    let node = fs.open("/data/a.txt", OpenFlags::READ_ONLY).unwrap();
    assert!(!node.is_directory());
    assert!(node.file_io().is_some());
    assert_eq!(node.flags(), OpenFlags::READ_ONLY);
    assert_eq!(entry_paths(&storage), vec!["/saved/data/a.txt"]);
}

#[test]
fn test_open_missing_file_is_not_found() {
    let (storage, fs) = ready_fs();
    assert_eq!(
        fs.open("/data/a.txt", OpenFlags::READ_ONLY).map(drop),
        Err(FsError::NotFound)
    );
    assert_eq!(entry_paths(&storage), vec!["/saved/data/a.txt"]);
}

#[test]
fn test_open_unresolvable_path_is_not_found() {
    let (storage, fs) = ready_fs();
    storage.refuse_path("/saved/data/a.txt");
    assert_eq!(
        fs.open("/data/a.txt", OpenFlags::READ_ONLY).map(drop),
        Err(FsError::NotFound)
    );
    assert!(!any_call(&storage, |c| matches!(c, StorageCall::OpenFile(_))));
}

#[test]
fn test_open_directory_gives_directory_node() {
    let (storage, fs) = ready_fs();
    storage.insert_directory(KIND, "/saved/docs");
    let node = fs.open("/docs", OpenFlags::READ_ONLY).unwrap();
    assert!(node.is_directory());
    assert!(node.file_io().is_none());
}

#[test]
fn test_open_create_and_exclusive() {
    let (storage, fs) = ready_fs();
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;

    let node = fs.open("/new.txt", flags).unwrap();
    assert!(!node.is_directory());
    assert_eq!(storage.entry_type(KIND, "/saved/new.txt"), Some(EntryType::Regular));

    assert_eq!(fs.open("/new.txt", flags).map(drop), Err(FsError::AlreadyExists));
}

#[test]
fn test_open_truncate_resets_size() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/log", 99);
    let node = fs
        .open("/log", OpenFlags::WRITE_ONLY | OpenFlags::TRUNCATE | OpenFlags::APPEND)
        .unwrap();
    assert!(node.is_append());
    assert_eq!(storage.file_size(KIND, "/saved/log"), Some(0));
}

#[test]
fn test_nodes_release_their_resources() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/f", 1);
    let baseline = storage.live_resources();

    let node = fs.open("/f", OpenFlags::READ_WRITE).unwrap();
    assert_eq!(storage.live_resources(), baseline + 2);
    drop(node);
    assert_eq!(storage.live_resources(), baseline);

    // Failed operations do not leak entry references either.
    let _ = fs.rmdir("/f");
    let _ = fs.open("/missing", OpenFlags::READ_ONLY);
    assert_eq!(storage.live_resources(), baseline);
}

#[test]
fn test_access_ignores_mode() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/f", 1);
    for mode in [libc::R_OK, libc::W_OK, libc::X_OK, libc::F_OK] {
        assert_eq!(fs.access("/f", mode), Ok(()));
    }
    assert_eq!(fs.access("/nope", libc::F_OK), Err(FsError::NotFound));
}

#[test]
fn test_mkdir_root_is_already_exists_without_storage_calls() {
    let (storage, fs) = ready_fs();
    assert_eq!(fs.mkdir("/", 0o755), Err(FsError::AlreadyExists));
    assert_eq!(fs.mkdir("/a/..", 0o755), Err(FsError::AlreadyExists));
    assert!(storage.calls().is_empty(), "{:?}", storage.calls());
}

#[test]
fn test_mkdir_creates_non_recursively() {
    let (storage, fs) = ready_fs();
    assert_eq!(fs.mkdir("/docs", 0o755), Ok(()));
    assert_eq!(storage.entry_type(KIND, "/saved/docs"), Some(EntryType::Directory));
    assert!(any_call(&storage, |c| matches!(
        c,
        StorageCall::MakeDirectory { path, recursive: false } if path == "/saved/docs"
    )));

    assert_eq!(fs.mkdir("/docs", 0o755), Err(FsError::AlreadyExists));
    assert_eq!(fs.mkdir("/x/y", 0o755), Err(FsError::NotFound));
}

#[test]
fn test_unlink_directory_is_a_directory() {
    let (storage, fs) = ready_fs();
    storage.insert_directory(KIND, "/saved/d");
    assert_eq!(fs.unlink("/d"), Err(FsError::IsADirectory));
    assert_eq!(storage.entry_type(KIND, "/saved/d"), Some(EntryType::Directory));
}

#[test]
fn test_rmdir_file_is_not_a_directory() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/f", 1);
    assert_eq!(fs.rmdir("/f"), Err(FsError::NotADirectory));
    assert_eq!(storage.entry_type(KIND, "/saved/f"), Some(EntryType::Regular));
}

#[test]
fn test_unlink_and_rmdir_remove_matching_types() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/f", 1);
    storage.insert_directory(KIND, "/saved/d");
    assert_eq!(fs.unlink("/f"), Ok(()));
    assert_eq!(fs.rmdir("/d"), Ok(()));
    assert_eq!(storage.entry_type(KIND, "/saved/f"), None);
    assert_eq!(storage.entry_type(KIND, "/saved/d"), None);
}

#[rstest]
#[case::file("/saved/f", EntryType::Regular)]
#[case::directory("/saved/d", EntryType::Directory)]
#[case::special("/saved/s", EntryType::Other)]
fn test_remove_deletes_any_type_without_query(#[case] path: &str, #[case] entry_type: EntryType) {
    let (storage, fs) = ready_fs();
    match entry_type {
        EntryType::Regular => storage.insert_file(KIND, path, 1),
        EntryType::Directory => storage.insert_directory(KIND, path),
        EntryType::Other => storage.insert_special(KIND, path),
    }
    let logical = path.trim_start_matches("/saved");

    assert_eq!(fs.remove(logical), Ok(()));
    assert_eq!(storage.entry_type(KIND, path), None);
    assert!(!any_call(&storage, no_queries));
}

#[test]
fn test_query_failure_is_invalid_argument() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/f", 1);
    storage.set_fail_queries(true);
    assert!(matches!(fs.unlink("/f"), Err(FsError::InvalidArgument(_))));
    assert!(matches!(fs.rmdir("/f"), Err(FsError::InvalidArgument(_))));
    assert_eq!(storage.entry_type(KIND, "/saved/f"), Some(EntryType::Regular));
    assert!(!any_call(&storage, |c| matches!(c, StorageCall::Delete(_))));
}

#[test]
fn test_restricted_remove_of_missing_entry_is_invalid_argument() {
    let (_storage, fs) = ready_fs();
    assert!(matches!(fs.unlink("/ghost"), Err(FsError::InvalidArgument(_))));
    assert_eq!(fs.remove("/ghost"), Err(FsError::NotFound));
}

#[test]
fn test_unknown_entry_type_is_invalid_argument() {
    let (storage, fs) = ready_fs();
    storage.insert_special(KIND, "/saved/s");
    assert!(matches!(fs.unlink("/s"), Err(FsError::InvalidArgument(_))));
    assert!(matches!(
        fs.remove_with("/s", RemoveMask::DIRECTORIES),
        Err(FsError::InvalidArgument(_))
    ));
}

#[test]
fn test_rmdir_non_empty_directory_fails() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/d/f", 1);
    assert_eq!(fs.rmdir("/d"), Err(FsError::OperationNotPermitted));
}

#[test]
fn test_rename_moves_entry() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/a", 5);
    assert_eq!(fs.rename("/a", "/b"), Ok(()));
    assert_eq!(storage.file_size(KIND, "/saved/b"), Some(5));
    assert_eq!(storage.entry_type(KIND, "/saved/a"), None);
    assert_eq!(entry_paths(&storage), vec!["/saved/a", "/saved/b"]);
}

#[test]
fn test_rename_with_unresolvable_target_issues_no_rename() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/a", 5);
    storage.refuse_path("/saved/b");
    assert_eq!(fs.rename("/a", "/b"), Err(FsError::NotFound));
    assert!(!any_call(&storage, |c| matches!(c, StorageCall::Rename { .. })));
    assert_eq!(storage.entry_type(KIND, "/saved/a"), Some(EntryType::Regular));
}

#[test]
fn test_rename_missing_source_is_translated() {
    let (_storage, fs) = ready_fs();
    assert_eq!(fs.rename("/nope", "/b"), Err(FsError::NotFound));
}

#[test]
fn test_every_full_path_carries_the_prefix() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/saved/x/f", 1);

    let logical = ["/x/f", "/x/g", "/x/d", "/x/f", "/x/g", "/x/d", "/x/d"];
    let _ = fs.access(logical[0], 0);
    let _ = fs.open(logical[1], OpenFlags::WRITE_ONLY | OpenFlags::CREATE);
    let _ = fs.mkdir(logical[2], 0o755);
    let _ = fs.rename(logical[3], "/x/h");
    let _ = fs.unlink(logical[4]);
    let _ = fs.rmdir(logical[5]);
    let _ = fs.remove(logical[6]);

    let seen = entry_paths(&storage);
    assert_eq!(seen.len(), 8);
    for path in &seen {
        assert!(path.starts_with("/saved/x/"), "unprefixed path {path}");
    }
    assert_eq!(seen[0], "/saved/x/f");
    assert_eq!(seen[1], "/saved/x/g");
    assert_eq!(seen[2], "/saved/x/d");
    assert_eq!(&seen[3..5], ["/saved/x/f", "/saved/x/h"]);
}

#[test]
fn test_dot_dot_cannot_leave_the_prefix() {
    let (storage, fs) = ready_fs();
    storage.insert_file(KIND, "/victim", 1);
    storage.insert_file(KIND, "/saved/victim", 1);

    assert_eq!(fs.unlink("../victim"), Ok(()));
    assert_eq!(fs.access("/../../victim", 0), Err(FsError::NotFound));
    assert_eq!(fs.mkdir("a/../../x", 0o755), Ok(()));

    assert_eq!(storage.entry_type(KIND, "/victim"), Some(EntryType::Regular));
    assert_eq!(storage.entry_type(KIND, "/saved/victim"), None);
    assert_eq!(storage.entry_type(KIND, "/saved/x"), Some(EntryType::Directory));
    assert_eq!(
        entry_paths(&storage),
        vec!["/saved/victim", "/saved/victim", "/saved/x"]
    );
}
