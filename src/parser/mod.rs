//! Package parsing entry points.
//!
//! A [`PackageParser`] owns its configuration and collaborators. Each call
//! builds a fresh [`ParseContext`], so one parser can serve sequential parses
//! of unrelated packages without state leaking between them.

mod activity;
mod application;
mod assembler;
mod instrumentation;
mod intent_filter;
mod item;
mod key_sets;
pub mod lite;
mod manifest;
mod meta_data;
mod permission;
mod provider;
mod service;
mod walker;

pub use lite::{ApkLite, PackageLite, VerifierInfo};

use crate::android::xml::{ManifestDocument, StartTag, TagCursor};
use crate::android::zip::{ApkArchiveReader, ArchiveReader};
use crate::attrs::{NoResources, ResourceResolver, TypedAttributes};
use crate::cache::PackageCache;
use crate::config::{Callback, ParserConfig};
use crate::error::{Diagnostic, ParseError, ParseResult};
use crate::flags::{ApplicationFlags, ParseFlags};
use crate::package::{PackageDescriptor, SplitDetails};
use crate::signing::{
    parse_public_key, CryptoProvider, KeyDecoderOnly, PublicKey, SignatureSchemeVersion,
    SigningDetails,
};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// A parsed package plus the recoverable problems met along the way.
#[derive(Clone, Debug)]
pub struct ParseReport {
    pub package: PackageDescriptor,
    pub diagnostics: Vec<Diagnostic>,
}

/// State shared by every builder during one top-level parse.
pub(crate) struct ParseContext<'p> {
    pub config: &'p ParserConfig,
    callback: Option<&'p dyn Callback>,
    pub resources: &'p dyn ResourceResolver,
    pub archive: &'p dyn ArchiveReader,
    pub crypto: Option<&'p dyn CryptoProvider>,
    pub flags: ParseFlags,
    /// File currently being parsed.
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'p> ParseContext<'p> {
    pub fn attrs<'t>(&self, tag: &'t StartTag) -> TypedAttributes<'t>
    where
        'p: 't,
    {
        TypedAttributes::new(tag, self.resources)
    }

    pub fn callback(&self) -> Option<&'p dyn Callback> {
        self.callback
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.callback.map_or(false, |cb| cb.has_feature(feature))
    }

    /// Decodes a base64 public key with the configured provider, falling
    /// back to plain SubjectPublicKeyInfo decoding.
    pub fn public_key(&self, encoded: &str) -> Option<PublicKey> {
        static KEY_DECODER: KeyDecoderOnly = KeyDecoderOnly;
        parse_public_key(self.crypto.unwrap_or(&KEY_DECODER), encoded)
    }

    pub fn rigid(&self) -> bool {
        self.config.rigid
    }

    pub fn verbose(&self) -> bool {
        self.flags.contains(ParseFlags::VERBOSE)
    }

    pub fn ignore_processes(&self) -> bool {
        self.flags.contains(ParseFlags::IGNORE_PROCESSES)
    }

    pub fn trusted_system_location(&self) -> bool {
        self.flags.contains(ParseFlags::TRUSTED_SYSTEM_LOCATION)
    }

    /// Records a recoverable problem, or fails when parsing rigidly.
    pub fn recover(&mut self, line: u32, message: impl Into<String>) -> ParseResult<()> {
        let message = message.into();
        if self.rigid() {
            return Err(ParseError::new(
                crate::error::ParseErrorCode::BadManifest,
                message,
            ));
        }
        warn!("{} at {} line {}", message, self.path.display(), line);
        self.diagnostics.push(Diagnostic {
            line: Some(line),
            message,
        });
        Ok(())
    }

    /// Like [`recover`](Self::recover), but never fatal.
    pub fn warn(&mut self, line: u32, message: impl Into<String>) {
        let message = message.into();
        warn!("{} at {} line {}", message, self.path.display(), line);
        self.diagnostics.push(Diagnostic {
            line: Some(line),
            message,
        });
    }

    /// Handles a tag its parent does not recognize: a hard error when rigid,
    /// otherwise the whole subtree is skipped.
    pub fn unknown_element(
        &mut self,
        cursor: &mut TagCursor<'_>,
        tag: &StartTag,
        parent: &str,
    ) -> ParseResult<()> {
        if self.rigid() {
            fail!(BadManifest, "Bad element under {}: {}", parent, tag.name);
        }
        self.warn(
            tag.line,
            format!("Unknown element under {}: {}", parent, tag.name),
        );
        cursor.skip_current_tag(tag.depth);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_context(config: &ParserConfig) -> ParseContext<'_> {
    static RESOURCES: NoResources = NoResources;
    static ARCHIVE: ApkArchiveReader = ApkArchiveReader;
    ParseContext {
        config,
        callback: None,
        resources: &RESOURCES,
        archive: &ARCHIVE,
        crypto: None,
        flags: ParseFlags::empty(),
        path: PathBuf::from("test.apk"),
        diagnostics: Vec::new(),
    }
}

/// Prefixes a file-level failure with the file and the line it happened at.
pub(crate) fn at_location(err: ParseError, path: &Path, line: u32) -> ParseError {
    err.with_context(format!("{} (at line {})", path.display(), line))
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn canonical_path(path: &Path) -> ParseResult<String> {
    std::fs::canonicalize(path)
        .map(|p| path_string(&p))
        .map_err(|e| err!(UnexpectedException, "Failed to get path: {}: {}", path.display(), e))
}

/// Parses package files into [`PackageDescriptor`]s.
pub struct PackageParser {
    config: ParserConfig,
    callback: Option<Box<dyn Callback>>,
    resources: Box<dyn ResourceResolver>,
    archive: Box<dyn ArchiveReader>,
    crypto: Option<Box<dyn CryptoProvider>>,
    cache: Option<PackageCache>,
}

impl Default for PackageParser {
    fn default() -> Self {
        PackageParser::new(ParserConfig::default())
    }
}

impl PackageParser {
    pub fn new(config: ParserConfig) -> Self {
        PackageParser {
            config,
            callback: None,
            resources: Box::new(NoResources),
            archive: Box::new(ApkArchiveReader),
            crypto: None,
            cache: None,
        }
    }

    pub fn with_callback(mut self, callback: impl Callback + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_resources(mut self, resources: impl ResourceResolver + 'static) -> Self {
        self.resources = Box::new(resources);
        self
    }

    pub fn with_archive_reader(mut self, archive: impl ArchiveReader + 'static) -> Self {
        self.archive = Box::new(archive);
        self
    }

    pub fn with_crypto(mut self, crypto: impl CryptoProvider + 'static) -> Self {
        self.crypto = Some(Box::new(crypto));
        self
    }

    /// Enables the on-disk descriptor cache in `dir`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(PackageCache::new(dir));
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn context(&self, flags: ParseFlags) -> ParseContext<'_> {
        ParseContext {
            config: &self.config,
            callback: self.callback.as_deref(),
            resources: self.resources.as_ref(),
            archive: self.archive.as_ref(),
            crypto: self.crypto.as_deref(),
            flags,
            path: PathBuf::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Parses a single APK, or a directory holding a base APK and its splits.
    pub fn parse_package(&self, path: &Path, flags: ParseFlags) -> ParseResult<PackageDescriptor> {
        self.parse_package_report(path, flags).map(|report| report.package)
    }

    /// Like [`parse_package`](Self::parse_package), also returning the
    /// diagnostics recorded in lenient mode.
    pub fn parse_package_report(&self, path: &Path, flags: ParseFlags) -> ParseResult<ParseReport> {
        if path.is_dir() && flags.contains(ParseFlags::MUST_BE_SINGLE_FILE) {
            fail!(NotApk, "Expected a single APK but found directory {}", path.display());
        }
        if let Some(cache) = &self.cache {
            if let Some(package) = cache.get(path, flags, self.callback.as_deref()) {
                return Ok(ParseReport {
                    package,
                    diagnostics: Vec::new(),
                });
            }
        }
        let mut ctx = self.context(flags);
        let package = if path.is_dir() {
            self.parse_cluster_with(&mut ctx, path)?
        } else {
            self.parse_monolithic_with(&mut ctx, path)?
        };
        if let Some(cache) = &self.cache {
            cache.put(path, flags, &package);
        }
        Ok(ParseReport {
            package,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Parses a standalone APK.
    pub fn parse_monolithic(&self, path: &Path, flags: ParseFlags) -> ParseResult<PackageDescriptor> {
        self.parse_monolithic_with(&mut self.context(flags), path)
    }

    /// Parses a directory holding exactly one base APK plus any splits.
    pub fn parse_cluster(&self, dir: &Path, flags: ParseFlags) -> ParseResult<PackageDescriptor> {
        self.parse_cluster_with(&mut self.context(flags), dir)
    }

    /// Lightweight parse of one APK's manifest root.
    pub fn parse_apk_lite(&self, path: &Path, flags: ParseFlags) -> ParseResult<ApkLite> {
        lite::parse_apk_lite(&mut self.context(flags), path)
    }

    /// Lightweight parse of a single APK or a cluster directory.
    pub fn parse_package_lite(&self, path: &Path, flags: ParseFlags) -> ParseResult<PackageLite> {
        let mut ctx = self.context(flags);
        if path.is_dir() {
            lite::parse_cluster_package_lite(&mut ctx, path)
        } else {
            lite::parse_monolithic_package_lite(&mut ctx, path)
        }
    }

    fn parse_monolithic_with(
        &self,
        ctx: &mut ParseContext<'_>,
        path: &Path,
    ) -> ParseResult<PackageDescriptor> {
        let lite = lite::parse_monolithic_package_lite(ctx, path)?;
        if self.config.only_core_apps && !lite.base.core_app {
            fail!(ManifestMalformed, "Not a coreApp: {}", path.display());
        }
        let mut pkg = self.parse_base_apk(ctx, path)?;
        pkg.set_code_path(&canonical_path(path)?);
        pkg.set_use_32bit_abi(lite.base.use_32bit_abi);
        self.finish_package(ctx, &mut pkg)?;
        Ok(pkg)
    }

    fn parse_cluster_with(
        &self,
        ctx: &mut ParseContext<'_>,
        dir: &Path,
    ) -> ParseResult<PackageDescriptor> {
        let lite = lite::parse_cluster_package_lite(ctx, dir)?;
        if self.config.only_core_apps && !lite.base.core_app {
            fail!(ManifestMalformed, "Not a coreApp: {}", dir.display());
        }
        let split_dependencies = if lite.base.isolated_splits && !lite.splits.is_empty() {
            Some(lite::build_split_dependencies(&lite)?)
        } else {
            None
        };

        let mut pkg = self.parse_base_apk(ctx, Path::new(&lite.base.code_path))?;
        if !lite.splits.is_empty() {
            pkg.splits = lite
                .splits
                .iter()
                .map(|split| SplitDetails {
                    name: split.split_name.clone().unwrap_or_default(),
                    code_path: split.code_path.clone(),
                    revision_code: split.revision_code,
                    is_feature: split.is_feature_split,
                    config_for_split: split.config_for_split.clone(),
                    uses_split_name: split.uses_split_name.clone(),
                    flags: ApplicationFlags::empty(),
                    class_loader_name: None,
                })
                .collect();
            pkg.split_dependencies = split_dependencies;
            for index in 0..pkg.splits.len() {
                self.parse_split_apk(ctx, &mut pkg, index)?;
            }
            let paths: Vec<String> = pkg.splits.iter().map(|s| s.code_path.clone()).collect();
            pkg.set_split_code_paths(&paths);
        }
        pkg.set_code_path(&canonical_path(dir)?);
        pkg.set_use_32bit_abi(lite.base.use_32bit_abi);
        self.finish_package(ctx, &mut pkg)?;
        Ok(pkg)
    }

    fn open_manifest(&self, ctx: &mut ParseContext<'_>, path: &Path) -> ParseResult<ManifestDocument> {
        ctx.path = path.to_path_buf();
        if ctx.archive.find_asset_cookie(path) == 0 {
            fail!(BadManifest, "Failed adding asset path: {}", path.display());
        }
        ctx.archive.open_manifest(path).map_err(|e| {
            err!(
                UnexpectedException,
                "Failed to read manifest from {}: {}",
                path.display(),
                e
            )
        })
    }

    fn parse_base_apk(&self, ctx: &mut ParseContext<'_>, path: &Path) -> ParseResult<PackageDescriptor> {
        if ctx.verbose() {
            debug!("Scanning base APK: {}", path.display());
        }
        let doc = self.open_manifest(ctx, path)?;
        let mut pkg = manifest::parse_base_manifest(ctx, &doc)?;
        pkg.set_base_code_path(&path_string(path));
        pkg.set_signing_details(SigningDetails::UNKNOWN);
        Ok(pkg)
    }

    fn parse_split_apk(
        &self,
        ctx: &mut ParseContext<'_>,
        pkg: &mut PackageDescriptor,
        index: usize,
    ) -> ParseResult<()> {
        let path = PathBuf::from(&pkg.splits[index].code_path);
        if ctx.verbose() {
            debug!("Scanning split APK: {}", path.display());
        }
        let doc = self.open_manifest(ctx, &path)?;
        manifest::parse_split_manifest(ctx, &doc, pkg, index)
    }

    fn finish_package(&self, ctx: &mut ParseContext<'_>, pkg: &mut PackageDescriptor) -> ParseResult<()> {
        if ctx.flags.contains(ParseFlags::ENFORCE_CODE) {
            assert_code_policy(ctx.archive, pkg)?;
        }
        if ctx.flags.contains(ParseFlags::COLLECT_CERTIFICATES) {
            self.collect_certificates(pkg, ctx.trusted_system_location())?;
        }
        Ok(())
    }

    /// Collects signing details over the base and every split.
    ///
    /// The first file establishes the identity; any later file signed
    /// differently fails the whole package. The result is broadcast to child
    /// packages.
    pub fn collect_certificates(
        &self,
        pkg: &mut PackageDescriptor,
        skip_verify: bool,
    ) -> ParseResult<()> {
        let crypto = match self.crypto.as_deref() {
            Some(crypto) => crypto,
            None => fail!(
                NoCertificates,
                "No signature verifier configured for {}",
                pkg.package_name
            ),
        };
        let min_scheme = if pkg.is_static_shared_library() {
            SignatureSchemeVersion::SigningBlockV2
        } else {
            SignatureSchemeVersion::Jar
        };
        let base = match &pkg.base_code_path {
            Some(base) => PathBuf::from(base),
            None => fail!(
                UnexpectedException,
                "Package {} has no base code path",
                pkg.package_name
            ),
        };
        let mut files = vec![base];
        files.extend(pkg.splits.iter().map(|s| PathBuf::from(&s.code_path)));

        let mut details = SigningDetails::UNKNOWN;
        for file in &files {
            let verified = if skip_verify {
                crypto.certificates_without_verification(file, min_scheme)?
            } else {
                crypto.verify_signatures(file, min_scheme)?
            };
            if details.is_unknown() {
                details = verified;
            } else if !details.signatures_match_exactly(&verified) {
                fail!(
                    InconsistentCertificates,
                    "{} has mismatched certificates",
                    file.display()
                );
            }
        }
        pkg.set_signing_details(details);
        Ok(())
    }
}

const CLASSES_DEX: &str = "classes.dex";

/// Every file declaring code must actually carry a `classes.dex`.
fn assert_code_policy(archive: &dyn ArchiveReader, pkg: &PackageDescriptor) -> ParseResult<()> {
    if pkg.application.flags.contains(ApplicationFlags::HAS_CODE) {
        if let Some(base) = &pkg.base_code_path {
            if !archive.has_entry(Path::new(base), CLASSES_DEX) {
                fail!(InvalidApk, "Package {} code is missing", base);
            }
        }
    }
    for split in &pkg.splits {
        if split.flags.contains(ApplicationFlags::HAS_CODE)
            && !archive.has_entry(Path::new(&split.code_path), CLASSES_DEX)
        {
            fail!(InvalidApk, "APK {} code is missing", split.code_path);
        }
    }
    Ok(())
}
