use super::ParseContext;
use crate::android::xml::{ManifestValue, StartTag, TagCursor};
use crate::error::ParseResult;
use crate::package::{Bundle, MetaValue};

const UNSUPPORTED_TYPE: &str =
    "<meta-data> only supports string, integer, float, color, boolean, and resource reference types";

/// Adds one `<meta-data>` entry to `bundle`. A resource id wins over a value.
pub(crate) fn parse_meta_data(
    ctx: &mut ParseContext<'_>,
    tag: &StartTag,
    bundle: &mut Bundle,
) -> ParseResult<()> {
    let attrs = ctx.attrs(tag);
    let name = match attrs.get_non_configuration_string("name") {
        Some(name) => name,
        None => fail!(ManifestMalformed, "<meta-data> requires an android:name attribute"),
    };

    let resource = attrs.get_resource_id("resource", 0);
    if resource != 0 {
        bundle.insert(name, MetaValue::Resource(resource));
        return Ok(());
    }
    if !attrs.has_value("value") {
        fail!(
            ManifestMalformed,
            "<meta-data> requires an android:value or android:resource attribute"
        );
    }

    let value = match attrs.resolved("value") {
        Some(ManifestValue::String(text)) => Some(MetaValue::String(text)),
        Some(ManifestValue::Boolean(flag)) => Some(MetaValue::Boolean(flag)),
        Some(ManifestValue::Integer(number)) => Some(MetaValue::Int(number as i32)),
        Some(ManifestValue::Hex(bits)) => Some(MetaValue::Int(bits as i32)),
        Some(ManifestValue::Float(number)) => Some(MetaValue::Float(number)),
        _ => None,
    };
    match value {
        Some(value) => {
            bundle.insert(name, value);
            Ok(())
        }
        None => ctx.recover(tag.line, UNSUPPORTED_TYPE),
    }
}

/// Reads every child of an item that only carries `<meta-data>`.
pub(crate) fn parse_all_meta_data(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    label: &str,
    bundle: &mut Bundle,
) -> ParseResult<()> {
    while let Some(child) = cursor.next_child(tag.depth) {
        if child.name == "meta-data" {
            parse_meta_data(ctx, child, bundle)?;
        } else {
            ctx.unknown_element(cursor, child, label)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::ParserConfig;
    use crate::parser::test_context;

    fn parse_all(xml: &str, config: &ParserConfig) -> ParseResult<Bundle> {
        let doc = ManifestDocument::from_text(&format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">{}</manifest>"#,
            xml
        ))
        .unwrap();
        let mut cursor = doc.cursor();
        let root = cursor.next_start_tag().unwrap();
        let mut ctx = test_context(config);
        let mut bundle = Bundle::new();
        while let Some(tag) = cursor.next_child(root.depth) {
            parse_meta_data(&mut ctx, tag, &mut bundle)?;
        }
        Ok(bundle)
    }

    #[test]
    fn typed_values() {
        let bundle = parse_all(
            r#"<meta-data android:name="s" android:value="text"/>
               <meta-data android:name="b" android:value="true"/>
               <meta-data android:name="i" android:value="0x10"/>
               <meta-data android:name="f" android:value="1.5"/>
               <meta-data android:name="r" android:resource="@0x7f030001" android:value="ignored"/>"#,
            &ParserConfig::default(),
        )
        .unwrap();
        assert_eq!(bundle["s"], MetaValue::String("text".into()));
        assert_eq!(bundle["b"], MetaValue::Boolean(true));
        assert_eq!(bundle["i"], MetaValue::Int(16));
        assert_eq!(bundle["f"], MetaValue::Float(1.5));
        assert_eq!(bundle["r"], MetaValue::Resource(0x7f03_0001));
    }

    #[test]
    fn missing_parts() {
        let err = parse_all(r#"<meta-data android:value="x"/>"#, &ParserConfig::default()).unwrap_err();
        assert_eq!(err.message(), "<meta-data> requires an android:name attribute");
        let err = parse_all(r#"<meta-data android:name="x"/>"#, &ParserConfig::default()).unwrap_err();
        assert_eq!(
            err.message(),
            "<meta-data> requires an android:value or android:resource attribute"
        );
    }

    #[test]
    fn empty_name_is_kept() {
        let bundle = parse_all(
            r#"<meta-data android:name="" android:value="x"/>"#,
            &ParserConfig::default(),
        )
        .unwrap();
        assert_eq!(bundle[""], MetaValue::String("x".into()));
    }

    #[test]
    fn unresolvable_value_is_recoverable() {
        let xml = r#"<meta-data android:name="x" android:value="@string/missing"/>"#;
        assert!(parse_all(xml, &ParserConfig::default()).unwrap().is_empty());
        assert!(parse_all(xml, &ParserConfig::default().with_rigid(true)).is_err());
    }
}
