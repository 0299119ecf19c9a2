
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use zip::write::SimpleFileOptions;

pub(crate) const ANDROID_NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

/// Writes an APK holding a text manifest plus the named empty entries.
pub(crate) fn write_apk(
    dir: &Path,
    file: &str,
    root_attrs: &str,
    body: &str,
    entries: &[&str],
) -> PathBuf {
    let path = dir.join(file);
    let manifest = format!("<manifest {} {}>{}</manifest>", ANDROID_NS, root_attrs, body);
    let mut zip = zip::ZipWriter::new(File::create(&path).expect("create apk"));
    zip.start_file("AndroidManifest.xml", SimpleFileOptions::default())
        .expect("start manifest");
    zip.write_all(manifest.as_bytes()).expect("write manifest");
    for entry in entries {
        zip.start_file(*entry, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(b"dex\n035\0").expect("write entry");
    }
    zip.finish().expect("finish apk");
    path
}

/// Moves a file's modification time into the past.
pub(crate) fn backdate(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now() - Duration::from_secs(secs)))
        .expect("backdate file");
}
