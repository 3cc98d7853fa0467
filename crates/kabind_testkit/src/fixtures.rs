//! Test fixtures and store helpers.

use kabind_client::loopback::{self, Endpoint, RemoteServer};
use kabind_client::{LocalStore, OpenMode, RemoteOptions, RemoteStore, StoreClient};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Creates an in-memory local store holding `records`.
pub fn seeded_local<K, V>(records: &[(K, V)]) -> LocalStore
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let store = LocalStore::in_memory();
    for (key, value) in records {
        store
            .set(key.as_ref(), value.as_ref())
            .expect("Failed to seed local store");
    }
    store
}

/// The three-user store used by the prefix scenarios.
pub fn users_store() -> LocalStore {
    seeded_local(&[
        ("user:alice", "a"),
        ("user:bob", "b"),
        ("user:carol", "c"),
        ("order:1", "o1"),
        ("order:2", "o2"),
    ])
}

/// A snapshot-backed local store in a temporary directory.
pub struct TempStore {
    /// The store instance.
    pub store: LocalStore,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl TempStore {
    /// Creates a new store in write mode.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(dir.path().join("store.kab"), OpenMode::Write)
            .expect("Failed to open temp store");
        Self { store, dir }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("store.kab")
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

static NEXT_PORT: AtomicU16 = AtomicU16::new(20000);

/// A remote server bound to a unique loopback endpoint, unbound on drop.
pub struct ServedEndpoint {
    /// The bound endpoint.
    pub endpoint: Endpoint,
    /// The server behind it.
    pub server: Arc<RemoteServer>,
}

impl ServedEndpoint {
    /// Binds a fresh server to an unused endpoint.
    pub fn new() -> Self {
        let endpoint = Endpoint::new("testkit", NEXT_PORT.fetch_add(1, Ordering::Relaxed));
        let server = Arc::new(RemoteServer::new());
        loopback::serve(&endpoint, Arc::clone(&server)).expect("Failed to bind endpoint");
        Self { endpoint, server }
    }

    /// Opens a client connection to this endpoint.
    pub fn connect(&self) -> RemoteStore {
        RemoteStore::connect(&self.endpoint, RemoteOptions::new())
            .expect("Failed to connect to endpoint")
    }
}

impl Default for ServedEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ServedEndpoint {
    fn drop(&mut self) {
        loopback::shutdown(&self.endpoint);
    }
}

/// Runs a test with a connected remote store.
pub fn with_remote<F, R>(f: F) -> R
where
    F: FnOnce(&RemoteStore, &ServedEndpoint) -> R,
{
    let served = ServedEndpoint::new();
    let store = served.connect();
    f(&store, &served)
}
