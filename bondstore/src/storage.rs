//! Persistent Storage Abstraction
//!
//! The keystore is persisted as one whole document. A medium only has to
//! read and write that document in full; absence of a document is a valid
//! state, not an error.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trait for whole-document storage media
///
/// Hosts use [`FileStorage`]; MCU ports implement this on top of their NVS or
/// flash backend.
pub trait Storage {
    /// Error type for medium operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the whole document; `Ok(None)` if nothing was stored yet
    fn read(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Replace the whole document
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// Document stored in a single file.
///
/// Writes go to a sibling temp file which is synced to disk and then renamed
/// over the target, so a failed write or a power cut leaves the previous
/// document intact. The file holds key material and is created owner-only
/// (0600) on unix.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Storage for FileStorage {
    type Error = std::io::Error;

    fn read(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let tmp = self.tmp_path();
        let result = write_synced(&tmp, data).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            if tmp.is_file() {
                let _ = std::fs::remove_file(&tmp);
            }
            return Err(e);
        }
        sync_parent(&self.path);
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    // a stale temp file from an interrupted write keeps its old mode
    if path.is_file() {
        std::fs::remove_file(path)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Make the rename itself durable
fn sync_parent(path: &Path) {
    #[cfg(unix)]
    {
        use log::warn;
        use std::fs::File;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            warn!("could not sync {}: {e}", parent.display());
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// In-memory medium, for tests and for hosts without a filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Option<Vec<u8>>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make subsequent writes fail, leaving the stored document untouched
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl Storage for MemoryStorage {
    type Error = std::io::Error;

    fn read(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.data.clone())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(std::io::Error::other("memory medium write failure"));
        }
        self.data = Some(data.to_vec());
        self.writes += 1;
        Ok(())
    }
}
