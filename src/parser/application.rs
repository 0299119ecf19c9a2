//! `<application>` in a base APK and in split APKs.

use super::activity::{parse_activity, parse_activity_alias};
use super::assembler::finish_application;
use super::meta_data::parse_meta_data;
use super::provider::parse_provider;
use super::service::parse_service;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::{tables, TypedAttributes};
use crate::error::ParseResult;
use crate::flags::{ApplicationFlags, PrivateFlags};
use crate::names::{build_class_name, build_process_name, build_task_affinity_name};
use crate::package::{
    compose_long_version_code, PackageDescriptor, StaticLibraryDependency, StaticSharedLibrary,
};
use crate::sdk::version_codes;

const LABEL: &str = "<application>";

const CLASS_LOADERS: &[&str] = &[
    "dalvik.system.PathClassLoader",
    "dalvik.system.DelegateLastClassLoader",
];

/// Boolean attributes mapped straight onto application flags, with defaults.
const APP_FLAGS: &[(&str, ApplicationFlags, bool)] = &[
    ("vmSafeMode", ApplicationFlags::VM_SAFE_MODE, false),
    ("hasCode", ApplicationFlags::HAS_CODE, true),
    ("allowTaskReparenting", ApplicationFlags::ALLOW_TASK_REPARENTING, false),
    ("allowClearUserData", ApplicationFlags::ALLOW_CLEAR_USER_DATA, true),
    ("testOnly", ApplicationFlags::TEST_ONLY, false),
    ("largeHeap", ApplicationFlags::LARGE_HEAP, false),
    ("supportsRtl", ApplicationFlags::SUPPORTS_RTL, false),
    ("multiArch", ApplicationFlags::MULTIARCH, false),
    ("extractNativeLibs", ApplicationFlags::EXTRACT_NATIVE_LIBS, true),
    ("isGame", ApplicationFlags::IS_GAME, false),
];

const PRIVATE_FLAGS: &[(&str, PrivateFlags)] = &[
    ("useEmbeddedDex", PrivateFlags::USE_EMBEDDED_DEX),
    ("defaultToDeviceProtectedStorage", PrivateFlags::DEFAULT_TO_DEVICE_PROTECTED_STORAGE),
    ("directBootAware", PrivateFlags::DIRECT_BOOT_AWARE),
    ("usesNonSdkApi", PrivateFlags::USES_NON_SDK_API),
];

fn class_loader_name(attrs: &TypedAttributes<'_>) -> ParseResult<Option<String>> {
    match attrs.get_string("classLoader") {
        Some(name) if !CLASS_LOADERS.contains(&name.as_str()) => {
            fail!(ManifestMalformed, "Invalid class loader name: {}", name)
        }
        name => Ok(name),
    }
}

/// Strings that must be literal in legacy apps.
fn legacy_string(attrs: &TypedAttributes<'_>, name: &str, target_sdk: i32) -> Option<String> {
    if target_sdk >= version_codes::FROYO {
        attrs.get_non_configuration_string(name)
    } else {
        attrs.get_non_resource_string(name)
    }
}

/// Parses the base `<application>`, its components and libraries, then runs
/// the application-level fixups.
pub(crate) fn parse_application(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<()> {
    parse_application_attributes(ctx, tag, pkg)?;

    while let Some(child) = cursor.next_child(tag.depth) {
        if parse_component_child(ctx, cursor, child, pkg)? {
            continue;
        }
        match child.name.as_str() {
            "static-library" => parse_static_library(ctx, child, pkg)?,
            "library" => {
                if let Some(name) = ctx.attrs(child).get_non_resource_string("name") {
                    if !pkg.library_names.contains(&name) {
                        pkg.library_names.push(name);
                    }
                }
            }
            _ => parse_library_child(ctx, cursor, child, pkg)?,
        }
    }

    finish_application(ctx, pkg);
    Ok(())
}

fn parse_application_attributes(
    ctx: &mut ParseContext<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let package_name = pkg.package_name.clone();
    let target_sdk = pkg.application.target_sdk_version;

    if let Some(name) = attrs.get_non_configuration_string("name") {
        pkg.application.class_name = Some(build_class_name(&package_name, Some(&name))?);
    }
    if let Some(name) = attrs.get_non_configuration_string("manageSpaceActivity") {
        pkg.application.manage_space_activity_name =
            Some(build_class_name(&package_name, Some(&name))?);
    }

    let app = &mut pkg.application;
    app.label_res = attrs.get_resource_id("label", 0);
    if app.label_res == 0 {
        app.non_localized_label = attrs.get_string("label");
    }
    let round_icon = if ctx.config.use_round_icon {
        attrs.get_resource_id("roundIcon", 0)
    } else {
        0
    };
    app.icon = if round_icon != 0 {
        round_icon
    } else {
        attrs.get_resource_id("icon", 0)
    };
    app.logo = attrs.get_resource_id("logo", 0);
    app.banner = attrs.get_resource_id("banner", 0);
    app.description_res = attrs.get_resource_id("description", 0);
    app.theme = attrs.get_resource_id("theme", 0);

    if attrs.get_bool("allowBackup", true) {
        app.flags |= ApplicationFlags::ALLOW_BACKUP;
        if let Some(agent) = attrs.get_non_configuration_string("backupAgent") {
            app.backup_agent_name = Some(build_class_name(&package_name, Some(&agent))?);
            if attrs.get_bool("killAfterRestore", true) {
                app.flags |= ApplicationFlags::KILL_AFTER_RESTORE;
            }
            if attrs.get_bool("restoreAnyVersion", false) {
                app.flags |= ApplicationFlags::RESTORE_ANY_VERSION;
            }
            if attrs.get_bool("fullBackupOnly", false) {
                app.flags |= ApplicationFlags::FULL_BACKUP_ONLY;
            }
            if attrs.get_bool("backupInForeground", false) {
                app.private_flags |= PrivateFlags::BACKUP_IN_FOREGROUND;
            }
        }
        if attrs.has_value("fullBackupContent") {
            let resource = attrs.get_resource_id("fullBackupContent", 0);
            app.full_backup_content = if resource != 0 {
                resource as i32
            } else if attrs.get_bool("fullBackupContent", true) {
                0
            } else {
                -1
            };
        }
    }

    if attrs.get_bool("persistent", false) {
        let feature = attrs.get_non_resource_string("persistentWhenFeatureAvailable");
        if feature.map_or(true, |feature| ctx.has_feature(&feature)) {
            app.flags |= ApplicationFlags::PERSISTENT;
        }
    }

    if attrs.has_value("resizeableActivity") {
        app.private_flags |= if attrs.get_bool("resizeableActivity", true) {
            PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE
        } else {
            PrivateFlags::ACTIVITIES_RESIZE_MODE_UNRESIZEABLE
        };
    } else if target_sdk >= version_codes::N {
        app.private_flags |= PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE_VIA_SDK_VERSION;
    }

    app.max_aspect_ratio = attrs.get_float("maxAspectRatio", 0.0);
    app.min_aspect_ratio = attrs.get_float("minAspectRatio", 0.0);
    app.network_security_config_res = attrs.get_resource_id("networkSecurityConfig", 0);
    app.category = attrs.get_int("appCategory", app.category);

    if attrs.get_bool("debuggable", false) {
        app.flags |= ApplicationFlags::DEBUGGABLE;
        app.private_flags |= PrivateFlags::PROFILEABLE_BY_SHELL;
    }
    let hardware_accelerated =
        attrs.get_bool("hardwareAccelerated", target_sdk >= version_codes::ICE_CREAM_SANDWICH);
    pkg.base_hardware_accelerated = hardware_accelerated;
    let app = &mut pkg.application;
    if hardware_accelerated {
        app.flags |= ApplicationFlags::HARDWARE_ACCELERATED;
    }
    for (name, flag, default) in APP_FLAGS {
        if attrs.get_bool(name, *default) {
            app.flags |= *flag;
        }
    }
    if attrs.get_bool("usesCleartextTraffic", target_sdk < version_codes::P) {
        app.flags |= ApplicationFlags::USES_CLEARTEXT_TRAFFIC;
    }
    for (name, flag) in PRIVATE_FLAGS {
        if attrs.get_bool(name, false) {
            app.private_flags |= *flag;
        }
    }
    if attrs.get_bool("requestLegacyExternalStorage", target_sdk < version_codes::Q) {
        app.private_flags |= PrivateFlags::REQUEST_LEGACY_EXTERNAL_STORAGE;
    }
    if attrs.get_bool("allowAudioPlaybackCapture", target_sdk >= version_codes::Q) {
        app.private_flags |= PrivateFlags::ALLOW_AUDIO_PLAYBACK_CAPTURE;
    }

    app.permission = legacy_string(&attrs, "permission", target_sdk).filter(|p| !p.is_empty());
    app.task_affinity = build_task_affinity_name(
        &package_name,
        Some(&package_name),
        legacy_string(&attrs, "taskAffinity", target_sdk).as_deref(),
    )?;
    if let Some(factory) = attrs.get_non_configuration_string("appComponentFactory") {
        app.app_component_factory = Some(build_class_name(&package_name, Some(&factory))?);
    }
    app.zygote_preload_name = attrs.get_non_configuration_string("zygotePreloadName");
    app.ui_options = attrs.get_flags("uiOptions", tables::UI_OPTIONS, 0);
    app.class_loader_name = class_loader_name(&attrs)?;

    let raw_process = legacy_string(&attrs, "process", target_sdk);
    app.process_name = build_process_name(
        &package_name,
        None,
        raw_process.as_deref(),
        ctx.ignore_processes(),
        &ctx.config.separate_processes,
    )?
    .unwrap_or_else(|| package_name.clone());
    app.enabled = attrs.get_bool("enabled", true);

    if attrs.get_bool("cantSaveState", false) {
        app.private_flags |= PrivateFlags::CANT_SAVE_STATE;
        if app.process_name != package_name {
            fail!(
                ManifestMalformed,
                "cantSaveState applications can not use custom processes"
            );
        }
    }
    Ok(())
}

/// Parses a component tag into `pkg`. Returns false for anything else.
fn parse_component_child(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    child: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<bool> {
    match child.name.as_str() {
        "activity" => {
            let activity = parse_activity(ctx, cursor, child, pkg, false)?;
            pkg.activities.push(activity);
        }
        "receiver" => {
            let receiver = parse_activity(ctx, cursor, child, pkg, true)?;
            pkg.receivers.push(receiver);
        }
        "service" => {
            let service = parse_service(ctx, cursor, child, pkg)?;
            pkg.services.push(service);
        }
        "provider" => {
            let provider = parse_provider(ctx, cursor, child, pkg)?;
            pkg.providers.push(provider);
        }
        "activity-alias" => {
            let alias = parse_activity_alias(ctx, cursor, child, pkg)?;
            pkg.activities.push(alias);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Children allowed in both base and split applications besides components.
fn parse_library_child(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    child: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<()> {
    match child.name.as_str() {
        "meta-data" => parse_meta_data(ctx, child, &mut pkg.app_meta_data),
        "uses-static-library" => parse_uses_static_library(ctx, cursor, child, pkg),
        "uses-library" => {
            let attrs = ctx.attrs(child);
            if let Some(name) = attrs.get_non_resource_string("name") {
                if attrs.get_bool("required", true) {
                    pkg.uses_optional_libraries.retain(|lib| *lib != name);
                    if !pkg.uses_libraries.contains(&name) {
                        pkg.uses_libraries.push(name);
                    }
                } else if !pkg.uses_libraries.contains(&name)
                    && !pkg.uses_optional_libraries.contains(&name)
                {
                    pkg.uses_optional_libraries.push(name);
                }
            }
            Ok(())
        }
        "uses-package" => Ok(()),
        "profileable" => {
            if ctx.attrs(child).get_bool("shell", false) {
                pkg.application.private_flags |= PrivateFlags::PROFILEABLE_BY_SHELL;
            }
            Ok(())
        }
        _ => ctx.unknown_element(cursor, child, LABEL),
    }
}

fn parse_static_library(
    ctx: &mut ParseContext<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let name = attrs.get_non_resource_string("name");
    let version = attrs.get_int("version", -1);
    let version_major = attrs.get_int("versionMajor", 0);
    let name = match name {
        Some(name) if version >= 0 => name,
        name => fail!(
            ManifestMalformed,
            "Bad static-library declaration name: {} version: {}",
            name.as_deref().unwrap_or("null"),
            version
        ),
    };
    if pkg.shared_user_id.is_some() {
        fail!(BadSharedUserId, "sharedUserId not allowed in static shared library");
    }
    if pkg.static_shared_library.is_some() {
        fail!(
            ManifestMalformed,
            "Multiple static-shared libs for package {}",
            pkg.package_name
        );
    }
    pkg.static_shared_library = Some(StaticSharedLibrary {
        name,
        version: compose_long_version_code(version_major, version),
    });
    pkg.application.private_flags |= PrivateFlags::STATIC_SHARED_LIBRARY;
    Ok(())
}

fn normalize_digest(digest: &str) -> String {
    digest.replace(':', "").to_lowercase()
}

fn parse_uses_static_library(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let name = attrs.get_non_resource_string("name");
    let version = attrs.get_int("version", -1);
    let digest = attrs.get_non_resource_string("certDigest");
    let (name, digest) = match (name, digest) {
        (Some(name), Some(digest)) if version >= 0 => (name, digest),
        (name, digest) => fail!(
            ManifestMalformed,
            "Bad uses-static-library declaration name: {} version: {} certDigest {}",
            name.as_deref().unwrap_or("null"),
            version,
            digest.as_deref().unwrap_or("null")
        ),
    };
    if pkg.uses_static_libraries.iter().any(|lib| lib.name == name) {
        fail!(
            ManifestMalformed,
            "Depending on multiple versions of static library {}",
            name
        );
    }

    let mut cert_digests = vec![normalize_digest(&digest)];
    if pkg.application.target_sdk_version >= version_codes::O_MR1 {
        while let Some(child) = cursor.next_child(tag.depth) {
            if child.name != "additional-certificate" {
                continue;
            }
            match ctx.attrs(child).get_non_resource_string("certDigest") {
                Some(extra) if !extra.is_empty() => cert_digests.push(normalize_digest(&extra)),
                extra => fail!(
                    ManifestMalformed,
                    "Bad additional-certificate declaration with empty certDigest:{}",
                    extra.unwrap_or_default()
                ),
            }
        }
    }

    pkg.uses_static_libraries.push(StaticLibraryDependency {
        name,
        version: version as i64,
        cert_digests,
    });
    Ok(())
}

/// Parses a split's `<application>`, folding its components into `pkg` and
/// recording code and class loader settings on split `index`.
pub(crate) fn parse_split_application(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
    index: usize,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let class_loader = class_loader_name(&attrs)?;
    let split = match pkg.splits.get_mut(index) {
        Some(split) => split,
        None => fail!(UnexpectedException, "No split at index {}", index),
    };
    if attrs.get_bool("hasCode", true) {
        split.flags |= ApplicationFlags::HAS_CODE;
    }
    split.class_loader_name = class_loader;
    let split_name = split.name.clone();

    let before = pkg.component_counts();
    while let Some(child) = cursor.next_child(tag.depth) {
        if !parse_component_child(ctx, cursor, child, pkg)? {
            parse_library_child(ctx, cursor, child, pkg)?;
        }
    }
    pkg.tag_split_components(before, &split_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::{FeatureSet, ParserConfig};
    use crate::error::ParseErrorCode;
    use crate::names::APP_DETAILS_ACTIVITY_CLASS_NAME;
    use crate::package::SplitDetails;
    use crate::parser::test_context;

    fn app_doc(attrs: &str, body: &str) -> ManifestDocument {
        ManifestDocument::from_text(&format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"><application {}>{}</application></manifest>"#,
            attrs, body
        ))
        .unwrap()
    }

    fn parse_with(
        config: &ParserConfig,
        pkg: &mut PackageDescriptor,
        attrs: &str,
        body: &str,
    ) -> ParseResult<()> {
        let doc = app_doc(attrs, body);
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let tag = cursor.next_start_tag().unwrap();
        let mut ctx = test_context(config);
        parse_application(&mut ctx, &mut cursor, tag, pkg)
    }

    fn parse(target_sdk: i32, attrs: &str, body: &str) -> ParseResult<PackageDescriptor> {
        let mut pkg = PackageDescriptor::new("com.example");
        pkg.application.target_sdk_version = target_sdk;
        parse_with(&ParserConfig::default(), &mut pkg, attrs, body)?;
        Ok(pkg)
    }

    #[test]
    fn defaults_follow_target_sdk() {
        let old = parse(10, "", "").unwrap();
        assert!(!old.base_hardware_accelerated);
        assert!(old.application.flags.contains(ApplicationFlags::USES_CLEARTEXT_TRAFFIC));
        assert!(old
            .application
            .private_flags
            .contains(PrivateFlags::REQUEST_LEGACY_EXTERNAL_STORAGE));
        assert!(!old
            .application
            .private_flags
            .contains(PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE_VIA_SDK_VERSION));

        let new = parse(29, "", "").unwrap();
        let app = &new.application;
        assert!(new.base_hardware_accelerated);
        assert!(app.flags.contains(
            ApplicationFlags::HAS_CODE
                | ApplicationFlags::ALLOW_BACKUP
                | ApplicationFlags::ALLOW_CLEAR_USER_DATA
                | ApplicationFlags::EXTRACT_NATIVE_LIBS
                | ApplicationFlags::HARDWARE_ACCELERATED
        ));
        assert!(!app.flags.contains(ApplicationFlags::USES_CLEARTEXT_TRAFFIC));
        assert!(app.private_flags.contains(
            PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE_VIA_SDK_VERSION
                | PrivateFlags::ALLOW_AUDIO_PLAYBACK_CAPTURE
        ));
        assert_eq!(app.process_name, "com.example");
        assert_eq!(app.task_affinity.as_deref(), Some("com.example"));
        assert_eq!(new.activities[0].base.class_name, APP_DETAILS_ACTIVITY_CLASS_NAME);
    }

    #[test]
    fn names_and_backup() {
        let pkg = parse(
            29,
            r#"android:name=".App" android:backupAgent="Backup" android:restoreAnyVersion="true"
               android:fullBackupContent="false" android:permission="com.example.P"
               android:resizeableActivity="false" android:debuggable="true""#,
            "",
        )
        .unwrap();
        let app = &pkg.application;
        assert_eq!(app.class_name.as_deref(), Some("com.example.App"));
        assert_eq!(app.backup_agent_name.as_deref(), Some("com.example.Backup"));
        assert!(app.flags.contains(
            ApplicationFlags::KILL_AFTER_RESTORE
                | ApplicationFlags::RESTORE_ANY_VERSION
                | ApplicationFlags::DEBUGGABLE
        ));
        assert_eq!(app.full_backup_content, -1);
        assert_eq!(app.permission.as_deref(), Some("com.example.P"));
        assert!(app
            .private_flags
            .contains(PrivateFlags::ACTIVITIES_RESIZE_MODE_UNRESIZEABLE | PrivateFlags::PROFILEABLE_BY_SHELL));

        let no_backup = parse(29, r#"android:allowBackup="false" android:backupAgent="B""#, "").unwrap();
        assert_eq!(no_backup.application.backup_agent_name, None);
    }

    #[test]
    fn persistent_needs_feature() {
        let attrs = r#"android:persistent="true" android:persistentWhenFeatureAvailable="android.hardware.type.auto""#;
        let pkg = parse(29, attrs, "").unwrap();
        assert!(!pkg.application.flags.contains(ApplicationFlags::PERSISTENT));

        let config = ParserConfig::default();
        let features = FeatureSet::new(&["android.hardware.type.auto"]);
        let doc = app_doc(attrs, "");
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let tag = cursor.next_start_tag().unwrap();
        let mut ctx = test_context(&config);
        ctx.callback = Some(&features);
        let mut pkg = PackageDescriptor::new("com.example");
        parse_application(&mut ctx, &mut cursor, tag, &mut pkg).unwrap();
        assert!(pkg.application.flags.contains(ApplicationFlags::PERSISTENT));

        let plain = parse(29, r#"android:persistent="true""#, "").unwrap();
        assert!(plain.application.flags.contains(ApplicationFlags::PERSISTENT));
    }

    #[test]
    fn heavyweight_and_class_loader_checks() {
        let err = parse(29, r#"android:cantSaveState="true" android:process=":bg""#, "").unwrap_err();
        assert_eq!(err.message(), "cantSaveState applications can not use custom processes");
        assert!(parse(29, r#"android:cantSaveState="true""#, "").is_ok());

        let err = parse(29, r#"android:classLoader="my.Loader""#, "").unwrap_err();
        assert_eq!(err.message(), "Invalid class loader name: my.Loader");
        let pkg = parse(29, r#"android:classLoader="dalvik.system.DelegateLastClassLoader""#, "")
            .unwrap();
        assert!(pkg.application.class_loader_name.is_some());
    }

    #[test]
    fn static_libraries() {
        let pkg = parse(
            29,
            "",
            r#"<static-library android:name="com.example.lib" android:version="3" android:versionMajor="1"/>"#,
        )
        .unwrap();
        let lib = pkg.static_shared_library.as_ref().unwrap();
        assert_eq!(lib.version, (1 << 32) | 3);
        assert!(pkg.activities.is_empty());

        let err = parse(29, "", r#"<static-library android:name="com.example.lib"/>"#).unwrap_err();
        assert_eq!(
            err.message(),
            "Bad static-library declaration name: com.example.lib version: -1"
        );
        let err = parse(
            29,
            "",
            r#"<static-library android:name="a.b" android:version="1"/>
               <static-library android:name="c.d" android:version="1"/>"#,
        )
        .unwrap_err();
        assert_eq!(err.message(), "Multiple static-shared libs for package com.example");

        let mut shared = PackageDescriptor::new("com.example");
        shared.shared_user_id = Some("com.example.shared".into());
        let err = parse_with(
            &ParserConfig::default(),
            &mut shared,
            "",
            r#"<static-library android:name="a.b" android:version="1"/>"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::BadSharedUserId);
    }

    #[test]
    fn library_dependencies() {
        let pkg = parse(
            29,
            "",
            r#"<uses-static-library android:name="com.lib" android:version="2" android:certDigest="AB:CD:EF">
                 <additional-certificate android:certDigest="01:02"/>
               </uses-static-library>
               <uses-library android:name="org.apache.http.legacy" android:required="false"/>
               <uses-library android:name="com.google.maps"/>
               <uses-library android:name="org.apache.http.legacy"/>
               <library android:name="com.example.shared"/>
               <uses-package android:name="com.other"/>
               <profileable android:shell="true"/>"#,
        )
        .unwrap();
        let lib = &pkg.uses_static_libraries[0];
        assert_eq!(lib.cert_digests, vec!["abcdef", "0102"]);
        assert_eq!(pkg.uses_libraries, vec!["com.google.maps", "org.apache.http.legacy"]);
        assert!(pkg.uses_optional_libraries.is_empty());
        assert_eq!(pkg.library_names, vec!["com.example.shared"]);
        assert!(pkg
            .application
            .private_flags
            .contains(PrivateFlags::PROFILEABLE_BY_SHELL));

        let err = parse(
            29,
            "",
            r#"<uses-static-library android:name="com.lib" android:version="2" android:certDigest="aa"/>
               <uses-static-library android:name="com.lib" android:version="3" android:certDigest="bb"/>"#,
        )
        .unwrap_err();
        assert_eq!(err.message(), "Depending on multiple versions of static library com.lib");
    }

    #[test]
    fn additional_certificates_need_o_mr1() {
        let body = r#"<uses-static-library android:name="com.lib" android:version="2" android:certDigest="aa">
                        <additional-certificate android:certDigest="bb"/>
                      </uses-static-library>"#;
        assert_eq!(parse(26, "", body).unwrap().uses_static_libraries[0].cert_digests.len(), 1);
        assert_eq!(parse(27, "", body).unwrap().uses_static_libraries[0].cert_digests.len(), 2);
    }

    #[test]
    fn components_and_meta_data() {
        let pkg = parse(
            29,
            "",
            r#"<activity android:name=".Main"/>
               <activity-alias android:name=".Alias" android:targetActivity=".Main"/>
               <receiver android:name=".R"/>
               <service android:name=".S"/>
               <provider android:name=".P" android:authorities="com.example.p"/>
               <meta-data android:name="k" android:value="v"/>"#,
        )
        .unwrap();
        assert_eq!(pkg.activities.len(), 3);
        assert_eq!(pkg.receivers.len(), 1);
        assert_eq!(pkg.services.len(), 1);
        assert_eq!(pkg.providers.len(), 1);
        assert_eq!(pkg.app_meta_data.len(), 1);
    }

    #[test]
    fn split_application_tags_components() {
        let doc = app_doc(
            r#"android:hasCode="false""#,
            r#"<activity android:name=".Feature"/>
               <service android:name=".Own" android:splitName="other"/>"#,
        );
        let mut pkg = PackageDescriptor::new("com.example");
        pkg.splits.push(SplitDetails {
            name: "feature".into(),
            code_path: "feature.apk".into(),
            revision_code: 0,
            is_feature: true,
            config_for_split: None,
            uses_split_name: None,
            flags: ApplicationFlags::empty(),
            class_loader_name: None,
        });
        let config = ParserConfig::default();
        let mut ctx = test_context(&config);
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let tag = cursor.next_start_tag().unwrap();
        parse_split_application(&mut ctx, &mut cursor, tag, &mut pkg, 0).unwrap();

        assert!(!pkg.splits[0].flags.contains(ApplicationFlags::HAS_CODE));
        assert_eq!(pkg.activities[0].base.split_name.as_deref(), Some("feature"));
        assert_eq!(pkg.services[0].base.split_name.as_deref(), Some("other"));
    }
}
