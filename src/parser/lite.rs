//! Lightweight parsing: just enough of each manifest to identify an APK and
//! assemble a cluster of split APKs.

use super::manifest::{parse_package_split_names, plain_bool, plain_string, resolve_uses_sdk};
use super::walker::seek_manifest_root;
use super::{at_location, path_string, ParseContext};
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::tables;
use crate::error::ParseResult;
use crate::package::{
    compose_long_version_code, SplitDependencies, SplitNode, INSTALL_LOCATION_UNSPECIFIED,
};
use crate::signing::PublicKey;
use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APK_EXTENSION: &str = "apk";

/// A verifier allowed to check this package before install.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierInfo {
    pub name: String,
    pub public_key: PublicKey,
}

/// Identity and layout facts read from one APK without a full parse.
#[derive(Clone, Debug, PartialEq)]
pub struct ApkLite {
    pub code_path: String,
    pub package_name: String,
    pub split_name: Option<String>,
    pub is_feature_split: bool,
    pub config_for_split: Option<String>,
    pub uses_split_name: Option<String>,
    pub is_split_required: bool,
    pub version_code: i32,
    pub version_code_major: i32,
    pub revision_code: i32,
    pub install_location: i32,
    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub verifiers: Vec<VerifierInfo>,
    pub core_app: bool,
    pub debuggable: bool,
    pub multi_arch: bool,
    pub use_32bit_abi: bool,
    pub extract_native_libs: bool,
    pub use_embedded_dex: bool,
    pub isolated_splits: bool,
    pub overlay_target: Option<String>,
    pub overlay_priority: i32,
    pub overlay_is_static: bool,
}

impl ApkLite {
    fn new(code_path: String, package_name: String, split_name: Option<String>) -> Self {
        ApkLite {
            code_path,
            package_name,
            split_name,
            is_feature_split: false,
            config_for_split: None,
            uses_split_name: None,
            is_split_required: false,
            version_code: 0,
            version_code_major: 0,
            revision_code: 0,
            install_location: INSTALL_LOCATION_UNSPECIFIED,
            min_sdk_version: 1,
            target_sdk_version: 0,
            verifiers: Vec::new(),
            core_app: false,
            debuggable: false,
            multi_arch: false,
            use_32bit_abi: false,
            extract_native_libs: true,
            use_embedded_dex: false,
            isolated_splits: false,
            overlay_target: None,
            overlay_priority: 0,
            overlay_is_static: false,
        }
    }

    pub fn long_version_code(&self) -> i64 {
        compose_long_version_code(self.version_code_major, self.version_code)
    }
}

/// A base APK and its splits, sorted by split name.
#[derive(Clone, Debug, PartialEq)]
pub struct PackageLite {
    /// The APK itself, or the cluster directory.
    pub code_path: String,
    pub base: ApkLite,
    pub splits: Vec<ApkLite>,
}

impl PackageLite {
    pub fn package_name(&self) -> &str {
        &self.base.package_name
    }

    pub fn long_version_code(&self) -> i64 {
        self.base.long_version_code()
    }

    pub fn split_names(&self) -> Vec<&str> {
        self.splits
            .iter()
            .filter_map(|split| split.split_name.as_deref())
            .collect()
    }

    /// Base first, then every split in order.
    pub fn all_code_paths(&self) -> Vec<&str> {
        std::iter::once(&self.base)
            .chain(&self.splits)
            .map(|apk| apk.code_path.as_str())
            .collect()
    }

    /// Whether some split must be present for the package to run.
    pub fn is_split_required(&self) -> bool {
        self.base.is_split_required
    }
}

/// Reads the root of one APK's manifest.
pub(crate) fn parse_apk_lite(ctx: &mut ParseContext<'_>, path: &Path) -> ParseResult<ApkLite> {
    ctx.path = path.to_path_buf();
    if ctx.archive.find_asset_cookie(path) == 0 {
        fail!(NotApk, "Failed to parse {}", path.display());
    }
    let doc = ctx
        .archive
        .open_manifest(path)
        .map_err(|e| err!(UnexpectedException, "Failed to parse {}: {}", path.display(), e))?;
    let mut cursor = doc.cursor();
    let result = read_apk_lite(ctx, &mut cursor, path);
    result.map_err(|e| at_location(e, path, cursor.line()))
}

fn read_apk_lite(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    path: &Path,
) -> ParseResult<ApkLite> {
    let root = seek_manifest_root(cursor)?;
    let (package_name, split_name) = parse_package_split_names(root)?;
    let mut lite = ApkLite::new(path_string(path), package_name, split_name);

    let attrs = ctx.attrs(root);
    lite.install_location = attrs.get_enum(
        "installLocation",
        tables::INSTALL_LOCATION,
        INSTALL_LOCATION_UNSPECIFIED,
    );
    lite.version_code = attrs.get_int("versionCode", 0);
    lite.version_code_major = attrs.get_int("versionCodeMajor", 0);
    lite.revision_code = attrs.get_int("revisionCode", 0);
    lite.isolated_splits = attrs.get_bool("isolatedSplits", false);
    lite.is_feature_split = attrs.get_bool("isFeatureSplit", false);
    lite.is_split_required = attrs.get_bool("isSplitRequired", false);
    lite.core_app = plain_bool(root, "coreApp");
    lite.config_for_split = plain_string(root, "configForSplit").filter(|s| !s.is_empty());

    while let Some(child) = cursor.next_child(root.depth) {
        match child.name.as_str() {
            "package-verifier" => {
                if let Some(verifier) = parse_verifier(ctx, child) {
                    lite.verifiers.push(verifier);
                }
            }
            "application" => {
                let attrs = ctx.attrs(child);
                lite.debuggable = attrs.get_bool("debuggable", false);
                lite.multi_arch = attrs.get_bool("multiArch", false);
                lite.use_32bit_abi = attrs.get_bool("use32bitAbi", false);
                lite.extract_native_libs = attrs.get_bool("extractNativeLibs", true);
                lite.use_embedded_dex = attrs.get_bool("useEmbeddedDex", false);
            }
            "overlay" => {
                let attrs = ctx.attrs(child);
                lite.overlay_target = attrs.get_string("targetPackage");
                lite.overlay_priority = attrs.get_int("priority", 0);
                lite.overlay_is_static = attrs.get_bool("isStatic", false);
            }
            "uses-split" => {
                if lite.uses_split_name.is_some() {
                    ctx.warn(child.line, "Only one <uses-split> permitted. Ignoring others.");
                    continue;
                }
                match ctx.attrs(child).get_string("name") {
                    Some(name) => lite.uses_split_name = Some(name),
                    None => fail!(
                        ManifestMalformed,
                        "<uses-split> tag requires 'android:name' attribute"
                    ),
                }
            }
            "uses-sdk" => {
                if let Some((min_sdk, target_sdk)) = resolve_uses_sdk(ctx, child)? {
                    lite.min_sdk_version = min_sdk;
                    lite.target_sdk_version = target_sdk;
                }
            }
            _ => {}
        }
    }
    Ok(lite)
}

fn parse_verifier(ctx: &mut ParseContext<'_>, tag: &StartTag) -> Option<VerifierInfo> {
    let attrs = ctx.attrs(tag);
    let name = attrs.get_string("name");
    let encoded = attrs.get_string("publicKey");
    let (name, encoded) = match (name, encoded) {
        (Some(name), Some(encoded)) => (name, encoded),
        _ => {
            ctx.warn(tag.line, "verifier package name was null; skipping");
            return None;
        }
    };
    match ctx.public_key(&encoded) {
        Some(public_key) => Some(VerifierInfo { name, public_key }),
        None => {
            ctx.warn(tag.line, format!("Unable to parse verifier public key for {}", name));
            None
        }
    }
}

pub(crate) fn parse_monolithic_package_lite(
    ctx: &mut ParseContext<'_>,
    path: &Path,
) -> ParseResult<PackageLite> {
    let base = parse_apk_lite(ctx, path)?;
    Ok(PackageLite {
        code_path: path_string(path),
        base,
        splits: Vec::new(),
    })
}

fn apk_files(dir: &Path) -> ParseResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {}: {}", dir.display(), e);
            fail!(NotApk, "No packages found in split");
        }
    };
    let mut files: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    if files.is_empty() {
        fail!(NotApk, "No packages found in split");
    }
    files.retain(|f| f.is_file() && f.extension().map_or(false, |ext| ext == APK_EXTENSION));
    files.sort();
    Ok(files)
}

/// Reads every APK in `dir`: one base plus any splits, all declaring the same
/// package and version.
pub(crate) fn parse_cluster_package_lite(
    ctx: &mut ParseContext<'_>,
    dir: &Path,
) -> ParseResult<PackageLite> {
    let mut identity: Option<(String, i64)> = None;
    let mut apks: BTreeMap<Option<String>, ApkLite> = BTreeMap::new();
    for file in apk_files(dir)? {
        let lite = parse_apk_lite(ctx, &file)?;
        match &identity {
            None => identity = Some((lite.package_name.clone(), lite.long_version_code())),
            Some((package_name, version)) => {
                if *package_name != lite.package_name {
                    fail!(
                        BadManifest,
                        "Inconsistent package {} in {}; expected {}",
                        lite.package_name,
                        file.display(),
                        package_name
                    );
                }
                if *version != lite.long_version_code() {
                    fail!(
                        BadManifest,
                        "Inconsistent version {} in {}; expected {}",
                        lite.long_version_code(),
                        file.display(),
                        version
                    );
                }
            }
        }
        if apks.contains_key(&lite.split_name) {
            fail!(
                BadManifest,
                "Split name {} defined more than once; most recent was {}",
                lite.split_name.as_deref().unwrap_or("<base>"),
                file.display()
            );
        }
        apks.insert(lite.split_name.clone(), lite);
    }

    let base = match apks.remove(&None) {
        Some(base) => base,
        None => fail!(BadManifest, "Missing base APK in {}", dir.display()),
    };
    // The map keeps the remaining splits sorted by name.
    let splits = apks.into_values().collect();
    Ok(PackageLite {
        code_path: path_string(dir),
        base,
        splits,
    })
}

/// Builds the dependency tree of an isolated-split package.
///
/// Feature splits hang off the split they `<uses-split>` (or the base);
/// configuration splits attach to the feature split they are for (or the
/// base). Index 0 is the base, split `i` is index `i + 1`.
pub(crate) fn build_split_dependencies(lite: &PackageLite) -> ParseResult<SplitDependencies> {
    let names: Vec<&str> = lite
        .splits
        .iter()
        .map(|split| split.split_name.as_deref().unwrap_or_default())
        .collect();
    let index_of = |name: &str| names.iter().position(|n| *n == name);

    let mut nodes = BTreeMap::new();
    nodes.insert(0, SplitNode::default());

    for (i, split) in lite.splits.iter().enumerate() {
        if !split.is_feature_split {
            continue;
        }
        let parent = match &split.uses_split_name {
            None => 0,
            Some(dependency) => match index_of(dependency) {
                Some(index) => index + 1,
                None => fail!(
                    BadManifest,
                    "Split '{}' requires split '{}', which is missing.",
                    names[i],
                    dependency
                ),
            },
        };
        nodes.insert(
            i + 1,
            SplitNode {
                parent: Some(parent),
                config_splits: Vec::new(),
            },
        );
    }

    for (i, split) in lite.splits.iter().enumerate() {
        if split.is_feature_split {
            continue;
        }
        let target = match &split.config_for_split {
            None => 0,
            Some(target) => match index_of(target) {
                Some(index) if lite.splits[index].is_feature_split => index + 1,
                Some(index) => fail!(
                    BadManifest,
                    "Split '{}' declares itself as configuration split for a non-feature split '{}'",
                    names[i],
                    names[index]
                ),
                None => fail!(
                    BadManifest,
                    "Split '{}' targets split '{}', which is missing.",
                    names[i],
                    target
                ),
            },
        };
        nodes.entry(target).or_default().config_splits.push(i + 1);
    }

    for &start in nodes.keys() {
        let mut seen = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if seen.contains(&index) {
                fail!(BadManifest, "Cycle detected in split dependencies.");
            }
            seen.push(index);
            current = nodes.get(&index).and_then(|node| node.parent);
        }
    }
    Ok(SplitDependencies { nodes })
}
