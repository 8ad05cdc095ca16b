//! Shared server state: the backend handle, configuration, the current
//! exports generation, the mount table, the readdir generation counter, and
//! the process-stable write verifier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::backend::FSBackend;
use crate::exports::ExportTable;
use crate::protocol::xdr::nfs3::writeverf3;

/// Behavioural switches the protocol engine reads. The driving daemon maps
/// its command line onto this.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Where the exports file lives; reloads re-read it.
    pub exports_path: Option<std::path::PathBuf>,
    /// Advertise executable regular files as readable.
    pub readable_executables: bool,
    /// Do not chown created objects to the (squashed) caller; everything
    /// belongs to the server's own identity.
    pub single_user: bool,
}

/// Exit code for unrecoverable initialisation failures.
pub const CRISIS: i32 = 99;

/// One MNT registration. The list is advisory: clients that crash leak their
/// entries until a matching UMNT/UMNTALL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountEntry {
    pub hostname: String,
    pub directory: String,
}

/// Process-wide server state shared by every connection.
pub struct Server {
    backend: Arc<dyn FSBackend>,
    config: ServerConfig,
    exports: RwLock<Arc<ExportTable>>,
    mounts: Mutex<Vec<MountEntry>>,
    readdir_generation: AtomicU64,
    write_verf: writeverf3,
}

impl Server {
    pub fn new(backend: Arc<dyn FSBackend>, config: ServerConfig) -> Server {
        Server {
            backend,
            config,
            exports: RwLock::new(Arc::new(ExportTable::default())),
            mounts: Mutex::new(Vec::new()),
            readdir_generation: AtomicU64::new(1),
            write_verf: make_write_verf(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn FSBackend> {
        &self.backend
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current exports generation. The Arc clone is the only "read lock"
    /// held; a concurrent reload swaps the pointer without waiting for
    /// readers.
    pub fn exports(&self) -> Arc<ExportTable> {
        self.exports.read().expect("exports lock poisoned").clone()
    }

    /// Atomically replaces the export list.
    pub fn install_exports(&self, table: ExportTable) {
        let entries = table.items().len();
        *self.exports.write().expect("exports lock poisoned") = Arc::new(table);
        info!("installed exports table with {entries} entries");
    }

    /// Verifier returned by WRITE and COMMIT: constant for the life of the
    /// process, different after a restart.
    pub fn write_verf(&self) -> writeverf3 {
        self.write_verf
    }

    /// Current directory-listing generation; stamped into READDIR cookie
    /// verifiers.
    pub fn readdir_cookie_generation(&self) -> u64 {
        self.readdir_generation.load(Ordering::Acquire)
    }

    /// Invalidates outstanding READDIR cookies after a directory mutation.
    pub fn change_readdir_cookie(&self) {
        self.readdir_generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_mount(&self, hostname: &str, directory: &str) {
        let mut mounts = self.mounts.lock().expect("mount list poisoned");
        mounts.push(MountEntry {
            hostname: hostname.to_string(),
            directory: directory.to_string(),
        });
    }

    /// Removes this host's registration of `directory`.
    pub fn remove_mount(&self, hostname: &str, directory: &str) {
        let mut mounts = self.mounts.lock().expect("mount list poisoned");
        mounts.retain(|entry| entry.hostname != hostname || entry.directory != directory);
    }

    /// Removes every registration of `hostname`.
    pub fn remove_mounts_for_host(&self, hostname: &str) {
        let mut mounts = self.mounts.lock().expect("mount list poisoned");
        mounts.retain(|entry| entry.hostname != hostname);
    }

    pub fn mounts(&self) -> Vec<MountEntry> {
        self.mounts.lock().expect("mount list poisoned").clone()
    }
}

/// Derives the write verifier from the startup instant, so clients observe a
/// different verifier across restarts.
fn make_write_verf() -> writeverf3 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let stamp = (now.as_secs() << 20) | u64::from(now.subsec_micros());
    stamp.to_le_bytes()
}
