use gatedfs::backends::{MemoryStorage, StorageCall};
use gatedfs::{CallbackDelivery, FilesystemKind, GatedFs, MountArgs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const KIND: FilesystemKind = FilesystemKind::Persistent;

/// Mount `storage` with the given options
#[allow(dead_code)]
pub fn mount(
    storage: MemoryStorage,
    options: &[(&str, &str)],
    delivery: CallbackDelivery,
) -> (Arc<MemoryStorage>, gatedfs::Result<GatedFs<MemoryStorage>>) {
    let storage = Arc::new(storage);
    let args = MountArgs::parse(options.iter().copied(), delivery).expect("valid mount options");
    let fs = GatedFs::mount(Arc::clone(&storage), args);
    (storage, fs)
}

/// A ready filesystem with prefix `/saved` over a store that has `/saved`
#[allow(dead_code)]
pub fn ready_fs() -> (Arc<MemoryStorage>, GatedFs<MemoryStorage>) {
    let storage = MemoryStorage::new();
    storage.insert_directory(KIND, "/saved");
    let (storage, fs) = mount(storage, &[("SOURCE", "/saved")], CallbackDelivery::Available);
    let fs = fs.expect("mount succeeds");
    fs.wait_ready().expect("filesystem opens");
    storage.clear_calls();
    (storage, fs)
}

/// Full paths the adapter asked the service to reference, in order
#[allow(dead_code)]
pub fn entry_paths(storage: &MemoryStorage) -> Vec<String> {
    storage
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StorageCall::CreateEntry(path) => Some(path),
            _ => None,
        })
        .collect()
}

/// Whether any call of the given shape reached the service
#[allow(dead_code)]
pub fn any_call(storage: &MemoryStorage, pred: impl Fn(&StorageCall) -> bool) -> bool {
    storage.calls().iter().any(pred)
}

#[allow(dead_code)]
pub struct TestTimeoutGuard {
    cancelled: Arc<AtomicBool>,
}

impl Drop for TestTimeoutGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Abort the test process if the guard is still alive after `duration`
///
/// Gate tests block on purpose; a bug there would otherwise hang the suite.
#[allow(dead_code)]
pub fn test_timeout_guard(duration: Duration) -> TestTimeoutGuard {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = Arc::clone(&cancelled);
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        if !cancelled_clone.load(Ordering::SeqCst) {
            eprintln!("Test timeout exceeded ({}s). Aborting.", duration.as_secs());
            std::process::abort();
        }
    });
    TestTimeoutGuard { cancelled }
}
