use super::intent_filter::{instant_visibility, parse_intent_filter, FilterPolicy};
use super::item::parse_component_base;
use super::meta_data::parse_meta_data;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::TypedAttributes;
use crate::error::ParseResult;
use crate::flags::{PrivateFlags, ProviderFlags};
use crate::package::components::PathPermission;
use crate::package::{
    IntentFilterKind, PackageDescriptor, PatternKind, PatternMatcher, Provider, ProviderInfo,
};
use crate::sdk::version_codes;

const LABEL: &str = "<provider>";

/// Reads a permission attribute, falling back to `fallback` when absent. An
/// explicitly empty value clears it.
fn permission_or(attrs: &TypedAttributes<'_>, name: &str, fallback: Option<String>) -> Option<String> {
    match attrs.get_non_configuration_string(name) {
        None => fallback,
        Some(permission) => (!permission.is_empty()).then_some(permission),
    }
}

pub(crate) fn parse_provider(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<Provider> {
    let mut base = parse_component_base(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);

    let exported_default = pkg.application.target_sdk_version < version_codes::JELLY_BEAN_MR1;
    base.exported = attrs.get_bool("exported", exported_default);

    let shared = match attrs.get_non_configuration_string("permission") {
        None => pkg.application.permission.clone(),
        Some(permission) => (!permission.is_empty()).then_some(permission),
    };
    let mut info = ProviderInfo {
        read_permission: permission_or(&attrs, "readPermission", shared.clone()),
        write_permission: permission_or(&attrs, "writePermission", shared),
        syncable: attrs.get_bool("syncable", false),
        grant_uri_permissions: attrs.get_bool("grantUriPermissions", false),
        multiprocess: attrs.get_bool("multiprocess", false),
        init_order: attrs.get_int("initOrder", 0),
        ..ProviderInfo::default()
    };
    if attrs.get_bool("singleUser", false) {
        info.flags |= ProviderFlags::SINGLE_USER;
    }
    if base.direct_boot_aware {
        pkg.application.private_flags |= PrivateFlags::PARTIALLY_DIRECT_BOOT_AWARE;
    }
    let visible_to_instant_apps = attrs.get_bool("visibleToInstantApps", false);
    if visible_to_instant_apps {
        info.flags |= ProviderFlags::VISIBLE_TO_INSTANT_APP;
        pkg.visible_to_instant_apps = true;
    }
    if pkg.application.cant_save_state() && base.process_name == pkg.package_name {
        fail!(
            ManifestMalformed,
            "Heavy-weight applications can not have providers in main process"
        );
    }

    info.authority = match attrs.get_non_configuration_string("authorities") {
        None => fail!(ManifestMalformed, "{} does not include authorities attribute", LABEL),
        Some(authority) if authority.is_empty() => {
            fail!(ManifestMalformed, "{} has empty authorities attribute", LABEL)
        }
        Some(authority) => authority,
    };

    let mut provider = Provider::new(base, info);
    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "intent-filter" => {
                let policy = FilterPolicy {
                    allow_globs: true,
                    allow_auto_verify: false,
                };
                let mut filter =
                    parse_intent_filter(ctx, cursor, child, IntentFilterKind::Provider, policy)?;
                filter.visibility = instant_visibility(&filter, visible_to_instant_apps, false);
                provider.order = provider.order.max(filter.order);
                provider.intents.push(filter);
            }
            "meta-data" => parse_meta_data(ctx, child, &mut provider.meta_data)?,
            "grant-uri-permission" => match path_pattern(&ctx.attrs(child), false) {
                Some(pattern) => provider.info.uri_permission_patterns.push(pattern),
                None => ctx.recover(
                    child.line,
                    "No path, pathPrefix, or pathPattern for <path-permission>",
                )?,
            },
            "path-permission" => {
                let attrs = ctx.attrs(child);
                let permission = attrs.get_non_configuration_string("permission");
                let read = attrs
                    .get_non_configuration_string("readPermission")
                    .or_else(|| permission.clone());
                let write = attrs
                    .get_non_configuration_string("writePermission")
                    .or(permission);
                if read.is_none() && write.is_none() {
                    ctx.recover(
                        child.line,
                        "No readPermission or writePermssion for <path-permission>",
                    )?;
                    continue;
                }
                match path_pattern(&attrs, true) {
                    Some(pattern) => provider.info.path_permissions.push(PathPermission {
                        pattern,
                        read_permission: read,
                        write_permission: write,
                    }),
                    None => ctx.recover(
                        child.line,
                        "No path, pathPrefix, or pathPattern for <path-permission>",
                    )?,
                }
            }
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }
    Ok(provider)
}

/// The last declared of `path`, `pathPrefix`, `pathPattern` and, where
/// allowed, `pathAdvancedPattern`.
fn path_pattern(attrs: &TypedAttributes<'_>, allow_advanced: bool) -> Option<PatternMatcher> {
    let mut kinds = vec![
        ("path", PatternKind::Literal),
        ("pathPrefix", PatternKind::Prefix),
        ("pathPattern", PatternKind::SimpleGlob),
    ];
    if allow_advanced {
        kinds.push(("pathAdvancedPattern", PatternKind::AdvancedGlob));
    }
    kinds
        .into_iter()
        .filter_map(|(name, kind)| {
            attrs
                .get_non_configuration_string(name)
                .map(|pattern| PatternMatcher::new(pattern, kind))
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::ParserConfig;
    use crate::parser::test_context;

    fn parse(xml: &str, pkg: &mut PackageDescriptor, config: &ParserConfig) -> ParseResult<Provider> {
        let doc = ManifestDocument::from_text(&format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">{}</manifest>"#,
            xml
        ))
        .unwrap();
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        let tag = cursor.next_start_tag().unwrap();
        let mut ctx = test_context(config);
        parse_provider(&mut ctx, &mut cursor, tag, pkg)
    }

    #[test]
    fn exported_default_depends_on_target_sdk() {
        let config = ParserConfig::default();
        let xml = r#"<provider android:name=".P" android:authorities="com.example.p"/>"#;
        let mut old = PackageDescriptor::new("com.example");
        old.application.target_sdk_version = 16;
        assert!(parse(xml, &mut old, &config).unwrap().base.exported);

        let mut new = PackageDescriptor::new("com.example");
        new.application.target_sdk_version = 17;
        let provider = parse(
            r#"<provider android:name=".P" android:authorities="a">
                 <intent-filter><action android:name="x"/></intent-filter>
               </provider>"#,
            &mut new,
            &config,
        )
        .unwrap();
        assert!(!provider.base.exported);
    }

    #[test]
    fn authorities_required() {
        let config = ParserConfig::default();
        let mut pkg = PackageDescriptor::new("com.example");
        let err = parse(r#"<provider android:name=".P"/>"#, &mut pkg, &config).unwrap_err();
        assert_eq!(err.message(), "<provider> does not include authorities attribute");
        let err = parse(r#"<provider android:name=".P" android:authorities=""/>"#, &mut pkg, &config)
            .unwrap_err();
        assert_eq!(err.message(), "<provider> has empty authorities attribute");
    }

    #[test]
    fn permissions_fall_back() {
        let config = ParserConfig::default();
        let mut pkg = PackageDescriptor::new("com.example");
        pkg.application.permission = Some("app.PERM".into());
        let provider = parse(
            r#"<provider android:name=".P" android:authorities="a" android:writePermission="w.PERM">
                 <grant-uri-permission android:pathPrefix="/shared"/>
                 <path-permission android:path="/x" android:permission="x.PERM"/>
               </provider>"#,
            &mut pkg,
            &config,
        )
        .unwrap();
        assert_eq!(provider.info.read_permission.as_deref(), Some("app.PERM"));
        assert_eq!(provider.info.write_permission.as_deref(), Some("w.PERM"));
        assert_eq!(provider.info.uri_permission_patterns[0].kind, PatternKind::Prefix);
        let path = &provider.info.path_permissions[0];
        assert_eq!(path.read_permission.as_deref(), Some("x.PERM"));
        assert_eq!(path.pattern.pattern, "/x");
    }

    #[test]
    fn empty_shared_permission_clears_both() {
        let config = ParserConfig::default();
        let mut pkg = PackageDescriptor::new("com.example");
        pkg.application.permission = Some("app.PERM".into());
        let provider = parse(
            r#"<provider android:name=".P" android:authorities="a" android:permission=""/>"#,
            &mut pkg,
            &config,
        )
        .unwrap();
        assert!(provider.info.read_permission.is_none());
        assert!(provider.info.write_permission.is_none());

        let provider = parse(
            r#"<provider android:name=".P" android:authorities="a" android:permission=""
                 android:readPermission="r.PERM"/>"#,
            &mut pkg,
            &config,
        )
        .unwrap();
        assert_eq!(provider.info.read_permission.as_deref(), Some("r.PERM"));
        assert!(provider.info.write_permission.is_none());
    }

    #[test]
    fn incomplete_path_permission() {
        let xml = r#"<provider android:name=".P" android:authorities="a">
                       <path-permission android:path="/x"/>
                     </provider>"#;
        let mut pkg = PackageDescriptor::new("com.example");
        let lenient = parse(xml, &mut pkg, &ParserConfig::default()).unwrap();
        assert!(lenient.info.path_permissions.is_empty());
        let err = parse(xml, &mut pkg, &ParserConfig::default().with_rigid(true)).unwrap_err();
        assert_eq!(
            err.message(),
            "No readPermission or writePermssion for <path-permission>"
        );
    }
}
