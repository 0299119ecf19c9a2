//! `<permission>`, `<permission-group>` and `<permission-tree>`.

use super::item::parse_item_info;
use super::manifest::ManifestState;
use super::meta_data::parse_all_meta_data;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::tables;
use crate::error::ParseResult;
use crate::flags::{PermissionFlags, ProtectionBase, ProtectionLevel};
use crate::package::{Permission, PermissionGroup, PermissionGroupInfo, PermissionInfo};

const PLATFORM_PACKAGE: &str = "android";

pub(crate) fn parse_permission(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    const LABEL: &str = "<permission>";
    let pkg = &mut state.pkg;
    let base = parse_item_info(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);
    let platform = pkg.package_name == PLATFORM_PACKAGE;

    let mut info = PermissionInfo::default();
    if attrs.has_value("backgroundPermission") {
        if platform {
            info.background_permission = attrs.get_non_resource_string("backgroundPermission");
        } else {
            ctx.warn(
                tag.line,
                format!(
                    "{} defines a background permission. Only the 'android' package can do that.",
                    pkg.package_name
                ),
            );
        }
    }
    info.group = attrs.get_non_resource_string("permissionGroup");
    info.request_res = attrs.get_resource_id("request", 0);

    let level = attrs.get_flags("protectionLevel", tables::PROTECTION_LEVEL, 0) as u32;
    info.protection_level = ProtectionLevel::from_bits_retain(level).fixed();

    let mut flags = PermissionFlags::from_bits_retain(
        attrs.get_flags("permissionFlags", tables::PERMISSION_FLAGS, 0) as u32,
    );
    let restrictable = platform && info.protection_level.base() == ProtectionBase::Dangerous;
    if !restrictable {
        flags.remove(PermissionFlags::HARD_RESTRICTED | PermissionFlags::SOFT_RESTRICTED);
    } else if flags.contains(PermissionFlags::HARD_RESTRICTED | PermissionFlags::SOFT_RESTRICTED) {
        fail!(
            ManifestMalformed,
            "Permission cannot be both soft and hard restricted: {}",
            base.class_name
        );
    }
    info.flags = flags;

    let level = info.protection_level;
    let restricted = level.modifiers() - (ProtectionLevel::INSTANT | ProtectionLevel::RUNTIME_ONLY);
    if !restricted.is_empty() && level.base() != ProtectionBase::Signature
    {
        fail!(
            ManifestMalformed,
            "<permission>  protectionLevel specifies a non-instant flag but is not based on signature type"
        );
    }

    let mut permission = Permission::new(base, info);
    parse_all_meta_data(ctx, cursor, tag, LABEL, &mut permission.meta_data)?;
    pkg.permissions.push(permission);
    Ok(())
}

pub(crate) fn parse_permission_group(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    const LABEL: &str = "<permission-group>";
    let pkg = &mut state.pkg;
    let base = parse_item_info(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);
    let mut info = PermissionGroupInfo {
        request_detail_res: attrs.get_resource_id("requestDetail", 0),
        background_request_res: attrs.get_resource_id("backgroundRequest", 0),
        background_request_detail_res: attrs.get_resource_id("backgroundRequestDetail", 0),
        request_res: attrs.get_resource_id("request", 0),
        flags: attrs.get_int("permissionGroupFlags", 0),
        priority: attrs.get_int("priority", 0),
    };
    if info.priority > 0 && !ctx.trusted_system_location() {
        info.priority = 0;
    }

    let mut group = PermissionGroup::new(base, info);
    parse_all_meta_data(ctx, cursor, tag, LABEL, &mut group.meta_data)?;
    pkg.permission_groups.push(group);
    Ok(())
}

/// Tree names need at least three dot-separated segments.
fn has_three_segments(name: &str) -> bool {
    match name.find('.') {
        Some(0) => true,
        Some(first) => name[first + 1..].contains('.'),
        None => false,
    }
}

pub(crate) fn parse_permission_tree(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    const LABEL: &str = "<permission-tree>";
    let pkg = &mut state.pkg;
    let mut base = parse_item_info(ctx, tag, pkg, LABEL)?;
    if !has_three_segments(&base.class_name) {
        fail!(
            ManifestMalformed,
            "{} name has less than three segments: {}",
            LABEL,
            base.class_name
        );
    }
    base.description_res = 0;
    let info = PermissionInfo {
        protection_level: ProtectionLevel::empty(),
        tree: true,
        ..PermissionInfo::default()
    };

    let mut tree = Permission::new(base, info);
    parse_all_meta_data(ctx, cursor, tag, LABEL, &mut tree.meta_data)?;
    pkg.permissions.push(tree);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::ParserConfig;
    use crate::flags::ParseFlags;
    use crate::package::PackageDescriptor;
    use crate::parser::test_context;
    use crate::parser::walker::TagHandler;

    fn run(
        package: &str,
        xml: &str,
        handler: TagHandler<ManifestState>,
        flags: ParseFlags,
    ) -> ParseResult<PackageDescriptor> {
        let doc = ManifestDocument::from_text(&format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">{}</manifest>"#,
            xml
        ))
        .unwrap();
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let tag = cursor.next_start_tag().unwrap();
        let config = ParserConfig::default();
        let mut ctx = test_context(&config);
        ctx.flags = flags;
        let mut state = ManifestState::new(PackageDescriptor::new(package));
        handler(&mut ctx, &mut cursor, tag, &mut state)?;
        Ok(state.pkg)
    }

    #[test]
    fn protection_level_is_fixed() {
        let pkg = run(
            "com.example",
            r#"<permission android:name="com.example.P" android:protectionLevel="signatureOrSystem"/>"#,
            parse_permission,
            ParseFlags::empty(),
        )
        .unwrap();
        assert_eq!(
            pkg.permissions[0].info.protection_level,
            ProtectionLevel::SIGNATURE | ProtectionLevel::PRIVILEGED
        );
    }

    #[test]
    fn modifier_flags_need_signature_base() {
        let err = run(
            "com.example",
            r#"<permission android:name="com.example.P" android:protectionLevel="dangerous|privileged"/>"#,
            parse_permission,
            ParseFlags::empty(),
        )
        .unwrap_err();
        assert!(err.message().contains("non-instant flag"));

        let pkg = run(
            "com.example",
            r#"<permission android:name="com.example.P" android:protectionLevel="dangerous|instant"/>"#,
            parse_permission,
            ParseFlags::empty(),
        )
        .unwrap();
        assert!(pkg.permissions[0].info.protection_level.contains(ProtectionLevel::INSTANT));

        let err = run(
            "com.example",
            r#"<permission android:name="com.example.P" android:protectionLevel="dangerous|instant|privileged"/>"#,
            parse_permission,
            ParseFlags::empty(),
        )
        .unwrap_err();
        assert!(err.message().contains("non-instant flag"));

        assert!(run(
            "com.example",
            r#"<permission android:name="com.example.P" android:protectionLevel="signature|instant|privileged"/>"#,
            parse_permission,
            ParseFlags::empty(),
        )
        .is_ok());
    }

    #[test]
    fn restriction_flags_only_for_platform_runtime_permissions() {
        let xml = r#"<permission android:name="android.permission.X" android:protectionLevel="dangerous"
                       android:permissionFlags="hardRestricted"/>"#;
        let app = run("com.example", xml, parse_permission, ParseFlags::empty()).unwrap();
        assert!(app.permissions[0].info.flags.is_empty());
        let platform = run("android", xml, parse_permission, ParseFlags::empty()).unwrap();
        assert!(platform.permissions[0]
            .info
            .flags
            .contains(PermissionFlags::HARD_RESTRICTED));

        let both = r#"<permission android:name="android.permission.X" android:protectionLevel="dangerous"
                        android:permissionFlags="hardRestricted|softRestricted"/>"#;
        assert!(run("android", both, parse_permission, ParseFlags::empty()).is_err());
    }

    #[test]
    fn tree_names_need_three_segments() {
        let err = run(
            "com.example",
            r#"<permission-tree android:name="com.example"/>"#,
            parse_permission_tree,
            ParseFlags::empty(),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "<permission-tree> name has less than three segments: com.example"
        );
        let pkg = run(
            "com.example",
            r#"<permission-tree android:name="com.example.tree"/>"#,
            parse_permission_tree,
            ParseFlags::empty(),
        )
        .unwrap();
        assert!(pkg.permissions[0].info.tree);
    }

    #[test]
    fn group_priority_needs_trusted_location() {
        let xml = r#"<permission-group android:name="com.example.G" android:priority="10"/>"#;
        let pkg = run("com.example", xml, parse_permission_group, ParseFlags::empty()).unwrap();
        assert_eq!(pkg.permission_groups[0].info.priority, 0);
        let pkg = run(
            "com.example",
            xml,
            parse_permission_group,
            ParseFlags::TRUSTED_SYSTEM_LOCATION,
        )
        .unwrap();
        assert_eq!(pkg.permission_groups[0].info.priority, 10);
    }

    #[test]
    fn background_permission_reserved_for_platform() {
        let xml = r#"<permission android:name="android.permission.X" android:backgroundPermission="android.permission.Y"/>"#;
        let app = run("com.example", xml, parse_permission, ParseFlags::empty()).unwrap();
        assert_eq!(app.permissions[0].info.background_permission, None);
        let platform = run("android", xml, parse_permission, ParseFlags::empty()).unwrap();
        assert_eq!(
            platform.permissions[0].info.background_permission.as_deref(),
            Some("android.permission.Y")
        );
    }
}
