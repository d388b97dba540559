//! In-memory storage service
//!
//! [`MemoryStorage`] implements [`StorageService`] over plain maps so the
//! adapter can be exercised without a real backend. Persistent and
//! temporary filesystems are separate stores; every filesystem object of a
//! kind sees the same store.
//!
//! The asynchronous open is configurable: the completion can fire inline,
//! later on a background thread, or only when the owner calls
//! [`MemoryStorage::complete_pending_opens`]. Every request is recorded as
//! a [`StorageCall`] so callers can check exactly what reached the service.

use crate::config::FilesystemKind;
use crate::path::FsPath;
use crate::status::Status;
use crate::storage::{
    Completion, EntryInfo, EntryType, FileOpenFlags, OpenCallback, Resource, StorageService,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// When an asynchronous open reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDelivery {
    /// Invoke the completion before `open_filesystem` returns
    Immediate,
    /// Invoke the completion from a background thread after a delay
    Deferred(Duration),
    /// Hold the completion until [`MemoryStorage::complete_pending_opens`]
    Manual,
    /// Return the status from `open_filesystem` and drop the completion
    Returned,
}

/// A request that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    CreateFilesystem(FilesystemKind),
    OpenFilesystem {
        filesystem: Resource,
        expected_size: u64,
        blocking: bool,
    },
    CreateEntry(String),
    Query(String),
    MakeDirectory { path: String, recursive: bool },
    Delete(String),
    Rename { from: String, to: String },
    OpenFile(String),
}

impl StorageCall {
    /// The path this call names, if any (the source for renames)
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::CreateEntry(path)
            | Self::Query(path)
            | Self::MakeDirectory { path, .. }
            | Self::Delete(path)
            | Self::OpenFile(path)
            | Self::Rename { from: path, .. } => Some(path),
            Self::CreateFilesystem(_) | Self::OpenFilesystem { .. } => None,
        }
    }
}

#[derive(Debug)]
enum Object {
    Filesystem { kind: FilesystemKind, opened: bool },
    Entry { kind: FilesystemKind, path: String },
    FileIo { path: String },
}

#[derive(Debug)]
struct Slot {
    refs: usize,
    object: Object,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    entry_type: EntryType,
    size: u64,
}

type Tree = BTreeMap<String, Node>;

struct State {
    next_id: u64,
    objects: HashMap<Resource, Slot>,
    trees: HashMap<FilesystemKind, Tree>,
    calls: Vec<StorageCall>,
    pending: Vec<(Resource, OpenCallback)>,
    open_status: Status,
    delivery: OpenDelivery,
    can_create: bool,
    fail_queries: bool,
    refused: HashSet<String>,
}

impl State {
    fn allocate(&mut self, object: Object) -> Resource {
        self.next_id += 1;
        let resource = Resource(self.next_id);
        self.objects.insert(resource, Slot { refs: 1, object });
        resource
    }

    fn tree(&mut self, kind: FilesystemKind) -> &mut Tree {
        self.trees.entry(kind).or_insert_with(new_tree)
    }

    fn entry(&self, entry: Resource) -> Option<(FilesystemKind, String)> {
        match self.objects.get(&entry).map(|slot| &slot.object) {
            Some(Object::Entry { kind, path }) => Some((*kind, path.clone())),
            _ => None,
        }
    }

    fn finish_open(&mut self, filesystem: Resource, status: Status) {
        if let Some(Slot {
            object: Object::Filesystem { opened, .. },
            ..
        }) = self.objects.get_mut(&filesystem)
        {
            *opened = status == Status::Ok;
        }
    }
}

fn new_tree() -> Tree {
    let mut tree = Tree::new();
    tree.insert(
        "/".to_string(),
        Node {
            entry_type: EntryType::Directory,
            size: 0,
        },
    );
    tree
}

fn parent_of(path: &str) -> String {
    let parsed = FsPath::parse(path);
    match parsed.components().split_last() {
        Some((_, parents)) if !parents.is_empty() => format!("/{}", parents.join("/")),
        _ => "/".to_string(),
    }
}

fn has_children(tree: &Tree, path: &str) -> bool {
    let prefix = if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    };
    tree.keys().any(|key| key != path && key.starts_with(&prefix))
}

fn is_directory(tree: &Tree, path: &str) -> bool {
    tree.get(path)
        .is_some_and(|node| node.entry_type == EntryType::Directory)
}

/// Storage service backed by in-memory maps
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    /// A service whose opens succeed and complete inline
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 0,
                objects: HashMap::new(),
                trees: HashMap::new(),
                calls: Vec::new(),
                pending: Vec::new(),
                open_status: Status::Ok,
                delivery: OpenDelivery::Immediate,
                can_create: true,
                fail_queries: false,
                refused: HashSet::new(),
            })),
        }
    }

    /// Report `status` for every filesystem open
    #[must_use]
    pub fn with_open_status(self, status: Status) -> Self {
        self.lock().open_status = status;
        self
    }

    /// Deliver asynchronous open completions as `delivery` says
    #[must_use]
    pub fn with_delivery(self, delivery: OpenDelivery) -> Self {
        self.lock().delivery = delivery;
        self
    }

    /// Refuse to create filesystems
    #[must_use]
    pub fn without_filesystems(self) -> Self {
        self.lock().can_create = false;
        self
    }

    /// Make every query fail with [`Status::Failed`]
    pub fn set_fail_queries(&self, fail: bool) {
        self.lock().fail_queries = fail;
    }

    /// Refuse to create entry references for `full_path`
    pub fn refuse_path(&self, full_path: &str) {
        self.lock().refused.insert(FsPath::parse(full_path).join());
    }

    pub fn insert_directory(&self, kind: FilesystemKind, path: &str) {
        self.insert(kind, path, EntryType::Directory, 0);
    }

    pub fn insert_file(&self, kind: FilesystemKind, path: &str, size: u64) {
        self.insert(kind, path, EntryType::Regular, size);
    }

    /// Insert an entry that is neither a file nor a directory
    pub fn insert_special(&self, kind: FilesystemKind, path: &str) {
        self.insert(kind, path, EntryType::Other, 0);
    }

    /// Missing parent directories are created along the way.
    fn insert(&self, kind: FilesystemKind, path: &str, entry_type: EntryType, size: u64) {
        let parsed = FsPath::parse(path);
        let mut state = self.lock();
        let tree = state.tree(kind);
        let mut ancestor = String::new();
        if let Some((_, parents)) = parsed.components().split_last() {
            for component in parents {
                ancestor.push('/');
                ancestor.push_str(component);
                tree.entry(ancestor.clone()).or_insert(Node {
                    entry_type: EntryType::Directory,
                    size: 0,
                });
            }
        }
        tree.insert(parsed.join(), Node { entry_type, size });
    }

    /// Type of the entry at `path`, if present
    #[must_use]
    pub fn entry_type(&self, kind: FilesystemKind, path: &str) -> Option<EntryType> {
        let path = FsPath::parse(path).join();
        self.lock().tree(kind).get(&path).map(|node| node.entry_type)
    }

    /// Size of the file at `path`, if present
    #[must_use]
    pub fn file_size(&self, kind: FilesystemKind, path: &str) -> Option<u64> {
        let path = FsPath::parse(path).join();
        self.lock().tree(kind).get(&path).map(|node| node.size)
    }

    /// Every request received so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// References currently held on `resource` (0 once released)
    #[must_use]
    pub fn ref_count(&self, resource: Resource) -> usize {
        self.lock().objects.get(&resource).map_or(0, |slot| slot.refs)
    }

    /// Number of objects that still hold references
    #[must_use]
    pub fn live_resources(&self) -> usize {
        self.lock().objects.len()
    }

    /// Number of asynchronous opens waiting for [`Self::complete_pending_opens`]
    #[must_use]
    pub fn pending_opens(&self) -> usize {
        self.lock().pending.len()
    }

    /// Fire held open completions; returns how many fired
    pub fn complete_pending_opens(&self) -> usize {
        let (pending, status) = {
            let mut state = self.lock();
            let pending = std::mem::take(&mut state.pending);
            let status = state.open_status;
            for (filesystem, _) in &pending {
                state.finish_open(*filesystem, status);
            }
            (pending, status)
        };
        let fired = pending.len();
        // Callbacks run without the lock held; they may call back into the service.
        for (_, callback) in pending {
            callback(status);
        }
        fired
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entry<T>(
        &self,
        entry: Resource,
        call: impl FnOnce(String) -> StorageCall,
        op: impl FnOnce(&mut State, FilesystemKind, &str) -> T,
        missing: T,
    ) -> T {
        let mut state = self.lock();
        let Some((kind, path)) = state.entry(entry) else {
            return missing;
        };
        state.calls.push(call(path.clone()));
        op(&mut state, kind, &path)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageService for MemoryStorage {
    fn create_filesystem(&self, kind: FilesystemKind) -> Option<Resource> {
        let mut state = self.lock();
        state.calls.push(StorageCall::CreateFilesystem(kind));
        if !state.can_create {
            return None;
        }
        state.tree(kind);
        Some(state.allocate(Object::Filesystem {
            kind,
            opened: false,
        }))
    }

    fn open_filesystem(
        &self,
        filesystem: Resource,
        expected_size: u64,
        completion: Completion,
    ) -> Status {
        let mut state = self.lock();
        state.calls.push(StorageCall::OpenFilesystem {
            filesystem,
            expected_size,
            blocking: matches!(completion, Completion::Blocking),
        });
        let status = if matches!(
            state.objects.get(&filesystem).map(|slot| &slot.object),
            Some(Object::Filesystem { .. })
        ) {
            state.open_status
        } else {
            Status::BadResource
        };

        let callback = match completion {
            Completion::Blocking => {
                state.finish_open(filesystem, status);
                return status;
            }
            Completion::Callback(callback) => callback,
        };

        let delivery = state.delivery;
        match delivery {
            OpenDelivery::Immediate => {
                state.finish_open(filesystem, status);
                drop(state);
                callback(status);
            }
            OpenDelivery::Deferred(delay) => {
                drop(state);
                let shared = Arc::clone(&self.state);
                thread::spawn(move || {
                    thread::sleep(delay);
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .finish_open(filesystem, status);
                    callback(status);
                });
            }
            OpenDelivery::Manual => state.pending.push((filesystem, callback)),
            OpenDelivery::Returned => {
                state.finish_open(filesystem, status);
                drop(state);
                drop(callback);
                return status;
            }
        }
        Status::CompletionPending
    }

    fn is_filesystem(&self, resource: Resource) -> bool {
        matches!(
            self.lock().objects.get(&resource).map(|slot| &slot.object),
            Some(Object::Filesystem { .. })
        )
    }

    fn add_ref(&self, resource: Resource) {
        if let Some(slot) = self.lock().objects.get_mut(&resource) {
            slot.refs += 1;
        }
    }

    fn release(&self, resource: Resource) {
        let mut state = self.lock();
        let Some(slot) = state.objects.get_mut(&resource) else {
            debug!("release of unknown resource {}", resource);
            return;
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            trace!("resource {} freed", resource);
            state.objects.remove(&resource);
        }
    }

    fn create_entry(&self, filesystem: Resource, full_path: &str) -> Option<Resource> {
        let mut state = self.lock();
        state.calls.push(StorageCall::CreateEntry(full_path.to_string()));
        let kind = match state.objects.get(&filesystem).map(|slot| &slot.object) {
            Some(Object::Filesystem { kind, opened: true }) => *kind,
            _ => return None,
        };
        if !full_path.starts_with('/') {
            return None;
        }
        let path = FsPath::parse(full_path).join();
        if state.refused.contains(&path) {
            return None;
        }
        Some(state.allocate(Object::Entry { kind, path }))
    }

    fn query(&self, entry: Resource) -> Result<EntryInfo, Status> {
        self.with_entry(
            entry,
            StorageCall::Query,
            |state, kind, path| {
                if state.fail_queries {
                    return Err(Status::Failed);
                }
                state
                    .tree(kind)
                    .get(path)
                    .map(|node| EntryInfo {
                        entry_type: node.entry_type,
                        size: node.size,
                    })
                    .ok_or(Status::FileNotFound)
            },
            Err(Status::BadResource),
        )
    }

    fn make_directory(&self, entry: Resource, recursive: bool) -> Status {
        self.with_entry(
            entry,
            |path| StorageCall::MakeDirectory { path, recursive },
            |state, kind, path| {
                if path == "/" {
                    return Status::NoAccess;
                }
                let tree = state.tree(kind);
                if tree.contains_key(path) {
                    return Status::FileExists;
                }
                let parent = parent_of(path);
                if !is_directory(tree, &parent) {
                    if !recursive || tree.contains_key(&parent) {
                        return Status::FileNotFound;
                    }
                    let mut ancestor = String::new();
                    for component in FsPath::parse(&parent).components() {
                        ancestor.push('/');
                        ancestor.push_str(component);
                        match tree.get(&ancestor) {
                            Some(node) if node.entry_type != EntryType::Directory => {
                                return Status::FileNotFound;
                            }
                            Some(_) => {}
                            None => {
                                tree.insert(
                                    ancestor.clone(),
                                    Node {
                                        entry_type: EntryType::Directory,
                                        size: 0,
                                    },
                                );
                            }
                        }
                    }
                }
                tree.insert(
                    path.to_string(),
                    Node {
                        entry_type: EntryType::Directory,
                        size: 0,
                    },
                );
                Status::Ok
            },
            Status::BadResource,
        )
    }

    fn delete(&self, entry: Resource) -> Status {
        self.with_entry(
            entry,
            StorageCall::Delete,
            |state, kind, path| {
                if path == "/" {
                    return Status::NoAccess;
                }
                let tree = state.tree(kind);
                if !tree.contains_key(path) {
                    return Status::FileNotFound;
                }
                if has_children(tree, path) {
                    return Status::Failed;
                }
                tree.remove(path);
                Status::Ok
            },
            Status::BadResource,
        )
    }

    fn rename(&self, entry: Resource, target: Resource) -> Status {
        let mut state = self.lock();
        let (Some((kind, from)), Some((target_kind, to))) = (state.entry(entry), state.entry(target))
        else {
            return Status::BadResource;
        };
        state.calls.push(StorageCall::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        if kind != target_kind {
            return Status::BadArgument;
        }
        if from == "/" || to == "/" {
            return Status::NoAccess;
        }
        let tree = state.tree(kind);
        if !tree.contains_key(&from) {
            return Status::FileNotFound;
        }
        if !is_directory(tree, &parent_of(&to)) {
            return Status::FileNotFound;
        }
        if from == to {
            return Status::Ok;
        }
        if to.starts_with(&format!("{from}/")) {
            return Status::BadArgument;
        }
        if tree.contains_key(&to) {
            if has_children(tree, &to) {
                return Status::Failed;
            }
            tree.remove(&to);
        }

        let subtree_prefix = format!("{from}/");
        let moved: Vec<String> = tree
            .keys()
            .filter(|key| **key == from || key.starts_with(&subtree_prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = tree.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                tree.insert(new, node);
            }
        }
        Status::Ok
    }

    fn open_file(&self, entry: Resource, flags: FileOpenFlags) -> Result<Resource, Status> {
        self.with_entry(
            entry,
            StorageCall::OpenFile,
            |state, kind, path| {
                let tree = state.tree(kind);
                match tree.get_mut(path) {
                    Some(node) if node.entry_type != EntryType::Regular => {
                        return Err(Status::NotAFile);
                    }
                    Some(_) if flags.create && flags.exclusive => return Err(Status::FileExists),
                    Some(node) => {
                        if flags.truncate {
                            node.size = 0;
                        }
                    }
                    None if !flags.create => return Err(Status::FileNotFound),
                    None => {
                        if !is_directory(tree, &parent_of(path)) {
                            return Err(Status::FileNotFound);
                        }
                        tree.insert(
                            path.to_string(),
                            Node {
                                entry_type: EntryType::Regular,
                                size: 0,
                            },
                        );
                    }
                }
                Ok(state.allocate(Object::FileIo {
                    path: path.to_string(),
                }))
            },
            Err(Status::BadResource),
        )
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStorage")
            .field("objects", &state.objects)
            .field("open_status", &state.open_status)
            .field("delivery", &state.delivery)
            .finish_non_exhaustive()
    }
}
