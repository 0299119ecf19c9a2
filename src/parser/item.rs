//! Attributes common to every named manifest item.

use super::ParseContext;
use crate::android::xml::StartTag;
use crate::error::ParseResult;
use crate::names::{build_class_name, build_process_name, APP_DETAILS_ACTIVITY_CLASS_NAME};
use crate::package::{ComponentBase, PackageDescriptor};
use crate::sdk::version_codes;

/// Name, label, icons and description of a permission, group, instrumentation
/// or component. `label` names the tag in error messages.
pub(crate) fn parse_item_info(
    ctx: &ParseContext<'_>,
    tag: &StartTag,
    pkg: &PackageDescriptor,
    label: &str,
) -> ParseResult<ComponentBase> {
    let attrs = ctx.attrs(tag);
    let name = match attrs.get_non_configuration_string("name") {
        Some(name) => name,
        None => fail!(ManifestMalformed, "{} does not specify android:name", label),
    };
    let class_name = build_class_name(&pkg.package_name, Some(&name))?;
    if class_name == APP_DETAILS_ACTIVITY_CLASS_NAME {
        fail!(ManifestMalformed, "{} invalid android:name", label);
    }

    let mut base = ComponentBase {
        class_name,
        package_name: pkg.package_name.clone(),
        enabled: true,
        ..ComponentBase::default()
    };
    base.label_res = attrs.get_resource_id("label", 0);
    if base.label_res == 0 {
        base.non_localized_label = attrs.get_string("label");
    }
    if ctx.config.use_round_icon {
        base.round_icon = attrs.get_resource_id("roundIcon", 0);
    }
    base.icon = if base.round_icon != 0 {
        base.round_icon
    } else {
        attrs.get_resource_id("icon", 0)
    };
    base.logo = attrs.get_resource_id("logo", 0);
    base.banner = attrs.get_resource_id("banner", 0);
    base.description_res = attrs.get_resource_id("description", 0);
    Ok(base)
}

/// Item info plus process, enablement, split and direct boot for a component.
pub(crate) fn parse_component_base(
    ctx: &ParseContext<'_>,
    tag: &StartTag,
    pkg: &PackageDescriptor,
    label: &str,
) -> ParseResult<ComponentBase> {
    let mut base = parse_item_info(ctx, tag, pkg, label)?;
    let attrs = ctx.attrs(tag);
    let app = &pkg.application;

    let raw_process = if app.target_sdk_version >= version_codes::FROYO {
        attrs.get_non_configuration_string("process")
    } else {
        attrs.get_non_resource_string("process")
    };
    base.process_name = build_process_name(
        &pkg.package_name,
        Some(&app.process_name),
        raw_process.as_deref(),
        ctx.ignore_processes(),
        &ctx.config.separate_processes,
    )?
    .unwrap_or_else(|| app.process_name.clone());
    base.enabled = attrs.get_bool("enabled", true);
    base.split_name = attrs.get_non_configuration_string("splitName");
    base.direct_boot_aware = attrs.get_bool("directBootAware", false);
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::ParserConfig;
    use crate::parser::test_context;

    fn first_child(xml: &str) -> StartTag {
        let doc = ManifestDocument::from_text(xml).unwrap();
        let mut cursor = doc.cursor();
        cursor.next_start_tag();
        cursor.next_start_tag().unwrap().clone()
    }

    fn wrap(inner: &str) -> String {
        format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">{}</manifest>"#,
            inner
        )
    }

    #[test]
    fn relative_names_and_labels() {
        let tag = first_child(&wrap(
            r#"<activity android:name=".Main" android:label="Hello" android:icon="@0x7f020001" android:roundIcon="@0x7f020002"/>"#,
        ));
        let pkg = PackageDescriptor::new("com.example");
        let config = ParserConfig::default();
        let ctx = test_context(&config);
        let base = parse_item_info(&ctx, &tag, &pkg, "<activity>").unwrap();
        assert_eq!(base.class_name, "com.example.Main");
        assert_eq!(base.non_localized_label.as_deref(), Some("Hello"));
        assert_eq!(base.icon, 0x7f02_0001);

        let config = ParserConfig::default().with_round_icon(true);
        let ctx = test_context(&config);
        let base = parse_item_info(&ctx, &tag, &pkg, "<activity>").unwrap();
        assert_eq!(base.icon, 0x7f02_0002);
    }

    #[test]
    fn missing_and_reserved_names() {
        let pkg = PackageDescriptor::new("com.example");
        let config = ParserConfig::default();
        let ctx = test_context(&config);
        let tag = first_child(&wrap("<service/>"));
        let err = parse_item_info(&ctx, &tag, &pkg, "<service>").unwrap_err();
        assert_eq!(err.message(), "<service> does not specify android:name");

        let tag = first_child(&wrap(r#"<activity android:name="android.app.AppDetailsActivity"/>"#));
        let err = parse_item_info(&ctx, &tag, &pkg, "<activity>").unwrap_err();
        assert_eq!(err.message(), "<activity> invalid android:name");
    }

    #[test]
    fn process_defaults_to_application() {
        let mut pkg = PackageDescriptor::new("com.example");
        pkg.application.target_sdk_version = 29;
        let config = ParserConfig::default();
        let ctx = test_context(&config);

        let tag = first_child(&wrap(r#"<service android:name="S"/>"#));
        let base = parse_component_base(&ctx, &tag, &pkg, "<service>").unwrap();
        assert_eq!(base.process_name, "com.example");
        assert!(base.enabled);

        let tag = first_child(&wrap(r#"<service android:name="S" android:process=":remote" android:enabled="false"/>"#));
        let base = parse_component_base(&ctx, &tag, &pkg, "<service>").unwrap();
        assert_eq!(base.process_name, "com.example:remote");
        assert!(!base.enabled);
    }
}
