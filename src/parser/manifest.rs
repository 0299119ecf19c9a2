//! The `<manifest>` root of base, split and child package declarations.

use super::application::{parse_application, parse_split_application};
use super::assembler::{finish_manifest, ScreenSupport};
use super::instrumentation::parse_instrumentation;
use super::key_sets::parse_key_sets;
use super::permission::{parse_permission, parse_permission_group, parse_permission_tree};
use super::walker::{ignore, seek_manifest_root, walk_element, TagHandler, TagTable};
use super::{at_location, ParseContext};
use crate::android::xml::{ManifestDocument, ManifestValue, StartTag, TagCursor};
use crate::attrs::{tables, TypedAttributes};
use crate::error::ParseResult;
use crate::flags::{ApplicationFlags, ParseFlags, PrivateFlags};
use crate::names::validate_name;
use crate::package::{
    ConfigurationInfo, FeatureGroupInfo, FeatureInfo, OverlayInfo, PackageDescriptor,
    INSTALL_LOCATION_UNSPECIFIED,
};
use crate::sdk::{compute_min_sdk, compute_target_sdk};
use once_cell::sync::Lazy;
use std::collections::HashMap;

const LABEL: &str = "<manifest>";
const PLATFORM_PACKAGE: &str = "android";
const MAX_OVERLAY_PRIORITY: i32 = 9999;

/// What the `<manifest>` walk builds up before the package is finished.
pub(crate) struct ManifestState {
    pub pkg: PackageDescriptor,
    pub found_app: bool,
    pub screens: ScreenSupport,
}

impl ManifestState {
    pub fn new(pkg: PackageDescriptor) -> Self {
        ManifestState {
            pkg,
            found_app: false,
            screens: ScreenSupport::default(),
        }
    }
}

static MANIFEST_TAGS: Lazy<TagTable<ManifestState>> = Lazy::new(|| {
    let handlers: [(&'static str, TagHandler<ManifestState>); 27] = [
        ("application", application),
        ("overlay", overlay),
        ("key-sets", parse_key_sets),
        ("permission-group", parse_permission_group),
        ("permission", parse_permission),
        ("permission-tree", parse_permission_tree),
        ("uses-permission", uses_permission),
        ("uses-permission-sdk-m", uses_permission),
        ("uses-permission-sdk-23", uses_permission),
        ("uses-configuration", uses_configuration),
        ("uses-feature", uses_feature),
        ("feature-group", feature_group),
        ("uses-sdk", uses_sdk),
        ("supports-screens", supports_screens),
        ("protected-broadcast", protected_broadcast),
        ("instrumentation", parse_instrumentation),
        ("original-package", original_package),
        ("adopt-permissions", adopt_permissions),
        ("uses-gl-texture", ignore),
        ("compatible-screens", ignore),
        ("supports-input", ignore),
        ("eat-comment", ignore),
        ("restrict-update", restrict_update),
        ("package", child_package),
        // Accepted so the walk does not flag them; the platform skips both.
        ("uses-split", ignore),
        ("package-verifier", ignore),
        ("queries", ignore),
    ];
    handlers.into_iter().collect::<HashMap<_, _>>()
});

/// The subset of manifest children a `<package>` child may declare.
const CHILD_PACKAGE_TAGS: &[&str] = &[
    "application",
    "uses-permission",
    "uses-permission-sdk-m",
    "uses-permission-sdk-23",
    "uses-configuration",
    "uses-feature",
    "feature-group",
    "uses-sdk",
    "supports-screens",
    "instrumentation",
    "uses-gl-texture",
    "compatible-screens",
    "supports-input",
    "eat-comment",
];

/// An un-namespaced attribute as text.
pub(crate) fn plain_string(tag: &StartTag, name: &str) -> Option<String> {
    tag.plain_attr(name).map(|attr| match (&attr.value, &attr.raw_value) {
        (ManifestValue::String(value), _) => value.clone(),
        (_, Some(raw)) => raw.clone(),
        (value, None) => value.coerce_to_string(),
    })
}

pub(crate) fn plain_bool(tag: &StartTag, name: &str) -> bool {
    match tag.plain_attr(name).map(|attr| &attr.value) {
        Some(ManifestValue::Boolean(value)) => *value,
        Some(ManifestValue::String(value)) => value == "true",
        _ => false,
    }
}

/// Validates the root's `package` and `split` attributes. An empty split is
/// the same as none.
pub(crate) fn parse_package_split_names(root: &StartTag) -> ParseResult<(String, Option<String>)> {
    let package_name = plain_string(root, "package").unwrap_or_default();
    if package_name != PLATFORM_PACKAGE {
        if let Some(reason) = validate_name(&package_name, true, true) {
            fail!(BadPackageName, "Invalid manifest package: {}", reason);
        }
    }
    let split_name = match plain_string(root, "split") {
        Some(split) if split.is_empty() => None,
        Some(split) => {
            if let Some(reason) = validate_name(&split, false, false) {
                fail!(BadPackageName, "Invalid manifest split: {}", reason);
            }
            Some(split)
        }
        None => None,
    };
    Ok((package_name, split_name))
}

/// Parses the manifest of a base APK into a fresh descriptor. Failures carry
/// the file and the line they happened at.
pub(crate) fn parse_base_manifest(
    ctx: &mut ParseContext<'_>,
    doc: &ManifestDocument,
) -> ParseResult<PackageDescriptor> {
    let mut cursor = doc.cursor();
    let result = parse_base_root(ctx, &mut cursor);
    result.map_err(|e| at_location(e, &ctx.path, cursor.line()))
}

fn parse_base_root(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
) -> ParseResult<PackageDescriptor> {
    let root = seek_manifest_root(cursor)?;
    let (package_name, split_name) = parse_package_split_names(root)?;
    if let Some(split) = split_name {
        fail!(BadPackageName, "Expected base APK, but found split {}", split);
    }

    if let Some(callback) = ctx.callback() {
        for overlay in callback.get_overlay_paths(&package_name, &ctx.path) {
            ctx.archive.add_overlay_path(&ctx.path, &overlay);
        }
    }

    let mut pkg = PackageDescriptor::new(&package_name);
    let attrs = ctx.attrs(root);
    pkg.version_code = attrs.get_int("versionCode", 0);
    pkg.version_code_major = attrs.get_int("versionCodeMajor", 0);
    pkg.base_revision_code = attrs.get_int("revisionCode", 0);
    pkg.version_name = attrs.get_non_configuration_string("versionName");
    pkg.application.compile_sdk_version = attrs.get_int("compileSdkVersion", 0);
    pkg.application.compile_sdk_version_codename =
        attrs.get_non_configuration_string("compileSdkVersionCodename");
    pkg.core_app = plain_bool(root, "coreApp");

    parse_manifest_common(ctx, cursor, root, pkg, None)
}

/// Attributes and children shared by the root manifest and `<package>`
/// children, followed by the manifest-level fixups.
fn parse_manifest_common(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    mut pkg: PackageDescriptor,
    accepted: Option<&[&str]>,
) -> ParseResult<PackageDescriptor> {
    let attrs = ctx.attrs(tag);
    if let Some(shared) = attrs
        .get_non_configuration_string("sharedUserId")
        .filter(|s| !s.is_empty())
    {
        if let Some(reason) = validate_name(&shared, true, true) {
            if pkg.package_name != PLATFORM_PACKAGE {
                fail!(
                    BadSharedUserId,
                    "<manifest> specifies bad sharedUserId name \"{}\": {}",
                    shared,
                    reason
                );
            }
        }
        pkg.shared_user_id = Some(shared);
        pkg.shared_user_label = attrs.get_resource_id("sharedUserLabel", 0);
    }
    pkg.application.install_location = attrs.get_enum(
        "installLocation",
        tables::INSTALL_LOCATION,
        INSTALL_LOCATION_UNSPECIFIED,
    );
    pkg.application.target_sandbox_version = attrs.get_int("targetSandboxVersion", 1);
    if ctx.flags.contains(ParseFlags::EXTERNAL_STORAGE) {
        pkg.application.flags |= ApplicationFlags::EXTERNAL_STORAGE;
    }
    if attrs.get_bool("isolatedSplits", false) {
        pkg.application.private_flags |= PrivateFlags::ISOLATED_SPLIT_LOADING;
    }

    let mut state = ManifestState::new(pkg);
    walk_element(ctx, cursor, tag, LABEL, &MANIFEST_TAGS, accepted, &mut state)?;

    if !state.found_app && state.pkg.instrumentation.is_empty() {
        fail!(
            ManifestEmpty,
            "<manifest> does not contain an <application> or <instrumentation>"
        );
    }
    finish_manifest(ctx, &mut state);
    Ok(state.pkg)
}

/// Folds a split APK's manifest into `pkg`, which already holds the base.
pub(crate) fn parse_split_manifest(
    ctx: &mut ParseContext<'_>,
    doc: &ManifestDocument,
    pkg: &mut PackageDescriptor,
    index: usize,
) -> ParseResult<()> {
    let mut cursor = doc.cursor();
    let result = parse_split_root(ctx, &mut cursor, pkg, index);
    result.map_err(|e| at_location(e, &ctx.path, cursor.line()))
}

fn parse_split_root(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    pkg: &mut PackageDescriptor,
    index: usize,
) -> ParseResult<()> {
    let root = seek_manifest_root(cursor)?;
    parse_package_split_names(root)?;

    let mut found_app = false;
    while let Some(child) = cursor.next_child(root.depth) {
        match child.name.as_str() {
            "application" => {
                if found_app {
                    if ctx.rigid() {
                        fail!(ManifestMalformed, "<manifest> has more than one <application>");
                    }
                    ctx.warn(child.line, "<manifest> has more than one <application>");
                    continue;
                }
                found_app = true;
                parse_split_application(ctx, cursor, child, pkg, index)?;
            }
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }
    if !found_app {
        fail!(ManifestEmpty, "<manifest> does not contain an <application>");
    }
    Ok(())
}

fn application(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    if state.found_app {
        if ctx.rigid() {
            fail!(ManifestMalformed, "<manifest> has more than one <application>");
        }
        ctx.warn(tag.line, "<manifest> has more than one <application>");
        cursor.skip_current_tag(tag.depth);
        return Ok(());
    }
    state.found_app = true;
    parse_application(ctx, cursor, tag, &mut state.pkg)
}

fn overlay(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let target = match attrs.get_string("targetPackage") {
        Some(target) => target,
        None => fail!(BadManifest, "<overlay> does not specify a target package"),
    };
    let priority = attrs.get_int("priority", 0);
    if !(0..=MAX_OVERLAY_PRIORITY).contains(&priority) {
        fail!(BadManifest, "<overlay> priority must be between 0 and 9999");
    }
    state.pkg.overlay = Some(OverlayInfo {
        target,
        target_name: attrs.get_string("targetName"),
        category: attrs.get_string("category"),
        priority,
        is_static: attrs.get_bool("isStatic", false),
    });
    Ok(())
}

fn uses_permission(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let name = match attrs.get_non_resource_string("name") {
        Some(name) => name,
        None => return Ok(()),
    };
    let max_sdk = match attrs.resolved("maxSdkVersion") {
        Some(ManifestValue::Integer(value)) => value as i32,
        Some(ManifestValue::Hex(value)) => value as i32,
        _ => 0,
    };
    if max_sdk != 0 && max_sdk < ctx.config.platform_sdk_version {
        return Ok(());
    }
    if let Some(callback) = ctx.callback() {
        if let Some(feature) = attrs.get_non_configuration_string("requiredFeature") {
            if !callback.has_feature(&feature) {
                return Ok(());
            }
        }
        if let Some(feature) = attrs.get_non_configuration_string("requiredNotFeature") {
            if callback.has_feature(&feature) {
                return Ok(());
            }
        }
    }

    if state.pkg.is_requested_permission(&name) {
        ctx.warn(
            tag.line,
            format!(
                "Ignoring duplicate uses-permissions/uses-permission-sdk-m: {} in package: {}",
                name, state.pkg.package_name
            ),
        );
    } else {
        state.pkg.requested_permissions.push(name);
    }
    Ok(())
}

fn uses_configuration(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let mut config = ConfigurationInfo {
        req_touch_screen: attrs.get_enum("reqTouchScreen", tables::REQ_TOUCH_SCREEN, 0),
        req_keyboard_type: attrs.get_enum("reqKeyboardType", tables::REQ_KEYBOARD_TYPE, 0),
        req_navigation: attrs.get_enum("reqNavigation", tables::REQ_NAVIGATION, 0),
        ..ConfigurationInfo::default()
    };
    if attrs.get_bool("reqHardKeyboard", false) {
        config.req_input_features |= ConfigurationInfo::INPUT_FEATURE_HARD_KEYBOARD;
    }
    if attrs.get_bool("reqFiveWayNav", false) {
        config.req_input_features |= ConfigurationInfo::INPUT_FEATURE_FIVE_WAY_NAV;
    }
    state.pkg.config_preferences.push(config);
    Ok(())
}

fn feature_info(attrs: &TypedAttributes<'_>) -> FeatureInfo {
    let name = attrs.get_non_resource_string("name");
    let req_gles_version = match name {
        Some(_) => 0,
        None => attrs.get_int("glEsVersion", 0),
    };
    FeatureInfo {
        name,
        version: attrs.get_int("version", 0),
        req_gles_version,
        required: attrs.get_bool("required", true),
    }
}

fn uses_feature(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let feature = feature_info(&ctx.attrs(tag));
    if feature.name.is_none() {
        state.pkg.config_preferences.push(ConfigurationInfo {
            req_gles_version: feature.req_gles_version,
            ..ConfigurationInfo::default()
        });
    }
    state.pkg.req_features.push(feature);
    Ok(())
}

fn feature_group(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let mut group = FeatureGroupInfo::default();
    while let Some(child) = cursor.next_child(tag.depth) {
        if child.name == "uses-feature" {
            let mut feature = feature_info(&ctx.attrs(child));
            feature.required = true;
            group.features.push(feature);
        } else {
            ctx.warn(
                child.line,
                format!("Unknown element under <feature-group>: {}", child.name),
            );
        }
    }
    state.pkg.feature_groups.push(group);
    Ok(())
}

fn uses_sdk(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    if let Some((min_sdk, target_sdk)) = resolve_uses_sdk(ctx, tag)? {
        state.pkg.application.min_sdk_version = min_sdk;
        state.pkg.application.target_sdk_version = target_sdk;
    }
    Ok(())
}

/// Effective `(min, target)` SDK levels of a `<uses-sdk>` tag. Either may be
/// a pre-release codename, which only a matching preview platform accepts.
pub(crate) fn resolve_uses_sdk(
    ctx: &ParseContext<'_>,
    tag: &StartTag,
) -> ParseResult<Option<(i32, i32)>> {
    let platform_version = ctx.config.platform_sdk_version;
    if platform_version <= 0 {
        return Ok(None);
    }
    let attrs = ctx.attrs(tag);
    let mut min_version = 1;
    let mut min_code = None;
    match attrs.resolved("minSdkVersion") {
        Some(ManifestValue::String(code)) => min_code = Some(code),
        Some(value) => min_version = sdk_level(&value),
        None => {}
    }
    let (target_version, target_code) = match attrs.resolved("targetSdkVersion") {
        Some(ManifestValue::String(code)) => {
            if min_code.is_none() {
                min_code = Some(code.clone());
            }
            (0, Some(code))
        }
        Some(value) => (sdk_level(&value), None),
        None => (min_version, min_code.clone()),
    };

    let codenames = &ctx.config.platform_codenames;
    let target_sdk = compute_target_sdk(target_version, target_code.as_deref(), codenames)?;
    let min_sdk = compute_min_sdk(min_version, min_code.as_deref(), platform_version, codenames)?;
    Ok(Some((min_sdk, target_sdk)))
}

fn sdk_level(value: &ManifestValue) -> i32 {
    match value {
        ManifestValue::Integer(level) => *level as i32,
        ManifestValue::Hex(level) => *level as i32,
        _ => 0,
    }
}

fn supports_screens(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let app = &mut state.pkg.application;
    app.requires_smallest_width_dp = attrs.get_int("requiresSmallestWidthDp", 0);
    app.compatible_width_limit_dp = attrs.get_int("compatibleWidthLimitDp", 0);
    app.largest_width_limit_dp = attrs.get_int("largestWidthLimitDp", 0);

    let screens = &mut state.screens;
    screens.small = attrs.get_int("smallScreens", screens.small);
    screens.normal = attrs.get_int("normalScreens", screens.normal);
    screens.large = attrs.get_int("largeScreens", screens.large);
    screens.xlarge = attrs.get_int("xlargeScreens", screens.xlarge);
    screens.resizeable = attrs.get_int("resizeable", screens.resizeable);
    screens.any_density = attrs.get_int("anyDensity", screens.any_density);
    Ok(())
}

fn protected_broadcast(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    if let Some(name) = ctx.attrs(tag).get_non_resource_string("name") {
        if !state.pkg.protected_broadcasts.contains(&name) {
            state.pkg.protected_broadcasts.push(name);
        }
    }
    Ok(())
}

fn original_package(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let original = match ctx.attrs(tag).get_non_configuration_string("name") {
        Some(original) => original,
        None => return Ok(()),
    };
    let pkg = &mut state.pkg;
    if original != pkg.package_name {
        if pkg.original_packages.is_empty() {
            pkg.real_package = Some(pkg.package_name.clone());
        }
        pkg.original_packages.push(original);
    }
    Ok(())
}

fn adopt_permissions(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    if let Some(name) = ctx.attrs(tag).get_non_configuration_string("name") {
        state.pkg.adopt_permissions.push(name);
    }
    Ok(())
}

/// Only system images may pin the hash of allowed updates.
fn restrict_update(
    ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    if !ctx.trusted_system_location() {
        return Ok(());
    }
    state.pkg.restrict_update_hash = match ctx.attrs(tag).get_non_configuration_string("hash") {
        None => None,
        Some(hash) => match hex::decode(&hash) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                ctx.warn(tag.line, format!("Invalid <restrict-update> hash {}: {}", hash, e));
                None
            }
        },
    };
    Ok(())
}

fn child_package(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let name = plain_string(tag, "package").unwrap_or_default();
    if let Some(reason) = validate_name(&name, true, false) {
        fail!(BadPackageName, "Invalid child package name {}: {}", name, reason);
    }
    let parent = &state.pkg;
    if name == parent.package_name {
        ctx.warn(
            tag.line,
            format!(
                "Child package name cannot be equal to parent package name: {}",
                parent.package_name
            ),
        );
        return Ok(());
    }
    if parent.has_child_package(&name) {
        ctx.warn(tag.line, format!("Duplicate child package:{}", name));
        return Ok(());
    }

    let mut child = PackageDescriptor::new(&name);
    child.version_code = parent.version_code;
    child.version_code_major = parent.version_code_major;
    child.base_revision_code = parent.base_revision_code;
    child.version_name = parent.version_name.clone();
    child.application.target_sdk_version = parent.application.target_sdk_version;
    child.application.min_sdk_version = parent.application.min_sdk_version;

    let mut child = parse_manifest_common(ctx, cursor, tag, child, Some(CHILD_PACKAGE_TAGS))?;
    child.parent_package_name = Some(state.pkg.package_name.clone());
    state.pkg.child_packages.push(child);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureSet, ParserConfig};
    use crate::error::ParseErrorCode;
    use crate::parser::test_context;
    use crate::sdk::version_codes;

    const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

    fn manifest(attrs: &str, body: &str) -> ManifestDocument {
        ManifestDocument::from_text(&format!(r#"<manifest {} {}>{}</manifest>"#, NS, attrs, body))
            .unwrap()
    }

    fn parse_with(config: &ParserConfig, doc: &ManifestDocument) -> ParseResult<PackageDescriptor> {
        let mut ctx = test_context(config);
        parse_base_manifest(&mut ctx, doc)
    }

    fn parse(attrs: &str, body: &str) -> ParseResult<PackageDescriptor> {
        parse_with(&ParserConfig::default(), &manifest(attrs, body))
    }

    #[test]
    fn root_names_are_validated() {
        let err = parse(r#"package="nodots""#, "<application/>").unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::BadPackageName);
        assert_eq!(
            err.message(),
            "Invalid manifest package: must have at least one '.' separator"
        );
        assert!(parse(r#"package="android""#, "<application/>").is_ok());

        let err = parse(r#"package="com.example" split="feature""#, "<application/>").unwrap_err();
        assert_eq!(err.message(), "Expected base APK, but found split feature");
        assert!(parse(r#"package="com.example" split="""#, "<application/>").is_ok());
    }

    #[test]
    fn failures_name_file_and_line() {
        let err = parse(r#"package="com.example""#, "\n<uses-sdk android:minSdkVersion=\"99\"/>")
            .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::OlderSdk);
        assert!(err.to_string().starts_with("test.apk (at line "));
    }

    #[test]
    fn root_attributes() {
        let pkg = parse(
            r#"package="com.example" android:versionCode="7" android:versionCodeMajor="1"
               android:versionName="1.0" coreApp="true" android:installLocation="preferExternal"
               android:sharedUserId="com.example.shared" android:isolatedSplits="true""#,
            "<application/>",
        )
        .unwrap();
        assert_eq!(pkg.long_version_code(), (1 << 32) | 7);
        assert_eq!(pkg.version_name.as_deref(), Some("1.0"));
        assert!(pkg.core_app);
        assert_eq!(pkg.application.install_location, 2);
        assert_eq!(pkg.shared_user_id.as_deref(), Some("com.example.shared"));
        assert!(pkg
            .application
            .private_flags
            .contains(PrivateFlags::ISOLATED_SPLIT_LOADING));

        let err = parse(
            r#"package="com.example" android:sharedUserId="shared""#,
            "<application/>",
        )
        .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::BadSharedUserId);
        assert_eq!(
            err.message(),
            "<manifest> specifies bad sharedUserId name \"shared\": must have at least one '.' separator"
        );
    }

    #[test]
    fn empty_and_duplicate_applications() {
        let err = parse(r#"package="com.example""#, "<uses-permission android:name=\"x\"/>")
            .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::ManifestEmpty);

        let body = "<application/><application/>";
        let pkg = parse(r#"package="com.example""#, body).unwrap();
        assert_eq!(pkg.activities.len(), 1);
        let rigid = ParserConfig::default().with_rigid(true);
        let err = parse_with(&rigid, &manifest(r#"package="com.example""#, body)).unwrap_err();
        assert_eq!(err.message(), "<manifest> has more than one <application>");

        let pkg = parse(
            r#"package="com.example""#,
            r#"<instrumentation android:name=".T" android:targetPackage="com.example"/>"#,
        )
        .unwrap();
        assert_eq!(pkg.instrumentation.len(), 1);
    }

    #[test]
    fn requested_permissions() {
        let pkg = parse(
            r#"package="com.example""#,
            r#"<uses-sdk android:minSdkVersion="21" android:targetSdkVersion="29"/>
               <uses-permission android:name="android.permission.CAMERA"/>
               <uses-permission android:name="android.permission.CAMERA"/>
               <uses-permission-sdk-23 android:name="android.permission.OLD" android:maxSdkVersion="22"/>
               <uses-permission android:name="android.permission.NFC" android:requiredFeature="android.hardware.nfc"/>
               <application/>"#,
        )
        .unwrap();
        assert_eq!(
            pkg.requested_permissions,
            vec!["android.permission.CAMERA", "android.permission.NFC"]
        );
    }

    #[test]
    fn required_features_consult_callback() {
        let config = ParserConfig::default();
        let features = FeatureSet::new(&["android.hardware.camera"]);
        let mut ctx = test_context(&config);
        ctx.callback = Some(&features);
        let doc = manifest(
            r#"package="com.example""#,
            r#"<uses-sdk android:targetSdkVersion="29"/>
               <uses-permission android:name="a.NFC" android:requiredFeature="android.hardware.nfc"/>
               <uses-permission android:name="a.CAM" android:requiredFeature="android.hardware.camera"/>
               <uses-permission android:name="a.NOCAM" android:requiredNotFeature="android.hardware.camera"/>
               <application/>"#,
        );
        let pkg = parse_base_manifest(&mut ctx, &doc).unwrap();
        assert_eq!(pkg.requested_permissions, vec!["a.CAM"]);
    }

    #[test]
    fn uses_sdk_codenames() {
        let body = r#"<uses-sdk android:minSdkVersion="R" android:targetSdkVersion="R"/><application/>"#;
        let err = parse(r#"package="com.example""#, body).unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::OlderSdk);

        let preview = ParserConfig::default().with_platform_sdk(29, &["R"]);
        let pkg = parse_with(&preview, &manifest(r#"package="com.example""#, body)).unwrap();
        assert_eq!(pkg.application.target_sdk_version, version_codes::CUR_DEVELOPMENT);
        assert_eq!(pkg.application.min_sdk_version, version_codes::CUR_DEVELOPMENT);

        let pkg = parse(
            r#"package="com.example""#,
            r#"<uses-sdk android:minSdkVersion="21"/><application/>"#,
        )
        .unwrap();
        assert_eq!(pkg.application.target_sdk_version, 21);
    }

    #[test]
    fn features_and_configuration() {
        let pkg = parse(
            r#"package="com.example""#,
            r#"<uses-feature android:name="android.hardware.camera" android:required="false"/>
               <uses-feature android:glEsVersion="0x00030000"/>
               <feature-group><uses-feature android:name="android.hardware.nfc" android:required="false"/></feature-group>
               <uses-configuration android:reqTouchScreen="finger" android:reqHardKeyboard="true"/>
               <application/>"#,
        )
        .unwrap();
        assert_eq!(pkg.req_features.len(), 2);
        assert!(!pkg.req_features[0].required);
        assert_eq!(pkg.req_features[1].req_gles_version, 0x30000);
        assert!(pkg.feature_groups[0].features[0].required);
        assert_eq!(pkg.config_preferences.len(), 2);
        assert_eq!(pkg.config_preferences[1].req_touch_screen, 3);
    }

    #[test]
    fn overlay_declarations() {
        let pkg = parse(
            r#"package="com.example.overlay""#,
            r#"<overlay android:targetPackage="com.example" android:priority="5" android:isStatic="true"/><application/>"#,
        )
        .unwrap();
        let overlay = pkg.overlay.unwrap();
        assert_eq!(overlay.target, "com.example");
        assert!(overlay.is_static);

        let err = parse(
            r#"package="com.example.overlay""#,
            r#"<overlay android:targetPackage="com.example" android:priority="10000"/><application/>"#,
        )
        .unwrap_err();
        assert_eq!(err.message(), "<overlay> priority must be between 0 and 9999");
        let err = parse(r#"package="com.example.overlay""#, "<overlay/><application/>").unwrap_err();
        assert_eq!(err.message(), "<overlay> does not specify a target package");
    }

    #[test]
    fn restrict_update_needs_trusted_location() {
        let config = ParserConfig::default();
        let doc = manifest(
            r#"package="com.example""#,
            r#"<restrict-update android:hash="0a0B"/><application/>"#,
        );
        let pkg = parse_with(&config, &doc).unwrap();
        assert_eq!(pkg.restrict_update_hash, None);

        let mut ctx = test_context(&config);
        ctx.flags = ParseFlags::TRUSTED_SYSTEM_LOCATION;
        let pkg = parse_base_manifest(&mut ctx, &doc).unwrap();
        assert_eq!(pkg.restrict_update_hash, Some(vec![0x0a, 0x0b]));
    }

    #[test]
    fn original_packages_and_broadcasts() {
        let pkg = parse(
            r#"package="com.example""#,
            r#"<original-package android:name="com.old"/>
               <original-package android:name="com.example"/>
               <protected-broadcast android:name="com.example.PING"/>
               <protected-broadcast android:name="com.example.PING"/>
               <adopt-permissions android:name="com.old"/>
               <application/>"#,
        )
        .unwrap();
        assert_eq!(pkg.original_packages, vec!["com.old"]);
        assert_eq!(pkg.real_package.as_deref(), Some("com.example"));
        assert_eq!(pkg.protected_broadcasts.len(), 1);
        assert_eq!(pkg.adopt_permissions, vec!["com.old"]);
    }

    #[test]
    fn child_packages() {
        let pkg = parse(
            r#"package="com.example" android:versionCode="3""#,
            r#"<application/>
               <package package="com.example.child">
                 <uses-permission android:name="android.permission.INTERNET"/>
                 <permission android:name="com.example.child.P"/>
                 <application/>
               </package>
               <package package="com.example.child"><application/></package>
               <package package="com.example"><application/></package>"#,
        )
        .unwrap();
        assert_eq!(pkg.child_packages.len(), 1);
        let child = &pkg.child_packages[0];
        assert_eq!(child.version_code, 3);
        assert_eq!(child.parent_package_name.as_deref(), Some("com.example"));
        assert!(child.is_requested_permission("android.permission.INTERNET"));
        assert!(child.permissions.is_empty());

        let err = parse(
            r#"package="com.example""#,
            r#"<application/><package package="bad"><application/></package>"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::BadPackageName);
    }

    #[test]
    fn unknown_children_depend_on_mode() {
        let doc = manifest(r#"package="com.example""#, "<mystery/><application/>");
        assert!(parse_with(&ParserConfig::default(), &doc).is_ok());
        let err = parse_with(&ParserConfig::default().with_rigid(true), &doc).unwrap_err();
        assert_eq!(err.message(), "Bad element under <manifest>: mystery");
    }
}
