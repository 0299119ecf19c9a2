//! Read-only access to APK (ZIP) archives.

use crate::android::xml::{ManifestDocument, XmlError};
use crate::error::ParseError;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zip::read::ZipArchive;

pub const ANDROID_MANIFEST_FILENAME: &str = "AndroidManifest.xml";

/// Result alias for APK (ZIP) operations.
pub type ApkZipResult<T> = Result<T, ApkZipError>;

/// Errors surfaced while reading package archives.
#[derive(Debug)]
pub enum ApkZipError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    Manifest(XmlError),
    InvalidInput(String),
}

impl std::fmt::Display for ApkZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApkZipError::Io(err) => write!(f, "I/O error: {err}"),
            ApkZipError::Zip(err) => write!(f, "ZIP error: {err}"),
            ApkZipError::Manifest(err) => write!(f, "{err}"),
            ApkZipError::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApkZipError {}

impl From<io::Error> for ApkZipError {
    fn from(value: io::Error) -> Self {
        ApkZipError::Io(value)
    }
}

impl From<zip::result::ZipError> for ApkZipError {
    fn from(value: zip::result::ZipError) -> Self {
        ApkZipError::Zip(value)
    }
}

impl From<XmlError> for ApkZipError {
    fn from(value: XmlError) -> Self {
        ApkZipError::Manifest(value)
    }
}

impl From<ApkZipError> for ParseError {
    fn from(value: ApkZipError) -> Self {
        match value {
            ApkZipError::Manifest(err) => err.into(),
            other => err!(UnexpectedException, "Failed to read manifest: {}", other),
        }
    }
}

/// File and asset-path access the parser needs from its environment.
pub trait ArchiveReader {
    /// Registers `path` as an asset path; `0` means it could not be added.
    fn find_asset_cookie(&self, path: &Path) -> u32;

    fn open_manifest(&self, path: &Path) -> ApkZipResult<ManifestDocument>;

    fn has_entry(&self, path: &Path, entry: &str) -> bool;

    /// Notifies the reader of a resource overlay applying to `target`.
    fn add_overlay_path(&self, _target: &Path, _overlay: &str) {}
}

/// [`ArchiveReader`] over APK files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApkArchiveReader;

impl ApkArchiveReader {
    fn open(path: &Path) -> ApkZipResult<ZipArchive<File>> {
        if !path.is_file() {
            return Err(ApkZipError::InvalidInput(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(ZipArchive::new(File::open(path)?)?)
    }

    /// Reads a single entry fully into memory.
    pub fn read_entry(path: &Path, name: &str) -> ApkZipResult<Vec<u8>> {
        let mut archive = Self::open(path)?;
        let mut entry = archive.by_name(name)?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl ArchiveReader for ApkArchiveReader {
    fn find_asset_cookie(&self, path: &Path) -> u32 {
        match Self::open(path) {
            Ok(archive) if archive.len() > 0 => 1,
            Ok(_) => 0,
            Err(err) => {
                log::debug!("cannot add asset path {}: {}", path.display(), err);
                0
            }
        }
    }

    fn open_manifest(&self, path: &Path) -> ApkZipResult<ManifestDocument> {
        let bytes = Self::read_entry(path, ANDROID_MANIFEST_FILENAME)?;
        Ok(ManifestDocument::from_bytes(&bytes)?)
    }

    fn has_entry(&self, path: &Path, entry: &str) -> bool {
        Self::open(path)
            .map(|mut archive| archive.by_name(entry).is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_apk(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn reads_text_manifest_from_archive() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("base.apk");
        write_apk(
            &apk,
            &[
                (ANDROID_MANIFEST_FILENAME, &br#"<manifest package="com.ex"/>"#[..]),
                ("classes.dex", &b"dex\n035\0"[..]),
            ],
        );
        let reader = ApkArchiveReader;
        assert_eq!(reader.find_asset_cookie(&apk), 1);
        assert!(reader.has_entry(&apk, "classes.dex"));
        assert!(!reader.has_entry(&apk, "classes2.dex"));
        let doc = reader.open_manifest(&apk).unwrap();
        let mut cursor = doc.cursor();
        assert_eq!(cursor.next_start_tag().unwrap().name, "manifest");
    }

    #[test]
    fn missing_archive_has_no_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ApkArchiveReader;
        assert_eq!(reader.find_asset_cookie(&dir.path().join("absent.apk")), 0);
        let not_zip = dir.path().join("plain.apk");
        std::fs::write(&not_zip, b"not a zip").unwrap();
        assert_eq!(reader.find_asset_cookie(&not_zip), 0);
        assert!(reader.open_manifest(&not_zip).is_err());
    }
}
