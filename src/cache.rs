//! Best-effort on-disk cache of parsed packages.
//!
//! Entries are keyed by file name and parse flags and trusted only while they
//! are newer than the package file and every overlay applying to it. Nothing
//! here ever fails a parse: a bad entry is deleted and reported as a miss.

use crate::config::Callback;
use crate::flags::ParseFlags;
use crate::package::PackageDescriptor;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const CACHE_MAGIC: [u8; 4] = *b"PKGC";
const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheHeader {
    magic: [u8; 4],
    version: u32,
}

/// Cache of [`PackageDescriptor`]s in a caller-supplied directory.
#[derive(Clone, Debug)]
pub struct PackageCache {
    dir: PathBuf,
}

impl PackageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PackageCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, package_path: &Path, flags: ParseFlags) -> PathBuf {
        let file_name = package_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{}-{}", file_name, flags.bits()))
    }

    /// Returns the cached package for `package_path`, if the entry is fresh.
    pub fn get(
        &self,
        package_path: &Path,
        flags: ParseFlags,
        callback: Option<&dyn Callback>,
    ) -> Option<PackageDescriptor> {
        let entry = self.entry_path(package_path, flags);
        let entry_time = modified(&entry)?;
        if !is_older(package_path, entry_time) {
            return None;
        }
        let bytes = match fs::read(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error reading package cache {}: {}", entry.display(), e);
                discard(&entry);
                return None;
            }
        };
        let package = match decode(&bytes) {
            Some(package) => package,
            None => {
                warn!("Discarding corrupt package cache {}", entry.display());
                discard(&entry);
                return None;
            }
        };
        if let Some(callback) = callback {
            for overlay in callback.get_overlay_apks(&package.package_name) {
                if !is_older(Path::new(&overlay), entry_time) {
                    debug!("Overlay {} is newer than cache {}", overlay, entry.display());
                    return None;
                }
            }
        }
        Some(package)
    }

    /// Stores `package` for `package_path`, replacing any previous entry.
    pub fn put(&self, package_path: &Path, flags: ParseFlags, package: &PackageDescriptor) {
        let entry = self.entry_path(package_path, flags);
        if entry.exists() {
            if let Err(e) = fs::remove_file(&entry) {
                warn!("Unable to delete cache file {}: {}", entry.display(), e);
            }
        }
        let bytes = match encode(package) {
            Some(bytes) => bytes,
            None => {
                warn!("Error serializing package {}", package.package_name);
                return;
            }
        };
        if let Err(e) = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&entry, &bytes)) {
            warn!("Error writing cache entry {}: {}", entry.display(), e);
            discard(&entry);
        }
    }
}

fn encode(package: &PackageDescriptor) -> Option<Vec<u8>> {
    let header = CacheHeader {
        magic: CACHE_MAGIC,
        version: CACHE_VERSION,
    };
    let mut bytes = postcard::to_allocvec(&header).ok()?;
    bytes.extend(postcard::to_allocvec(package).ok()?);
    Some(bytes)
}

fn decode(bytes: &[u8]) -> Option<PackageDescriptor> {
    let (header, rest) = postcard::take_from_bytes::<CacheHeader>(bytes).ok()?;
    if header.magic != CACHE_MAGIC || header.version != CACHE_VERSION {
        return None;
    }
    postcard::from_bytes(rest).ok()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `path` was last modified strictly before `time`.
fn is_older(path: &Path, time: SystemTime) -> bool {
    match modified(path) {
        Some(file_time) => file_time < time,
        None => false,
    }
}

fn discard(entry: &Path) {
    if entry.exists() {
        if let Err(e) = fs::remove_file(entry) {
            warn!("Unable to delete cache file {}: {}", entry.display(), e);
        }
    }
}
