//! The element walk shared by every container tag.
//!
//! Each container (`<manifest>`, `<application>`, a child `<package>`) is a
//! table from child tag name to handler. The walk is an explicit state machine
//! so the three outcomes for a child (dispatch, unknown, unsupported here) stay
//! in one place.

use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::error::ParseResult;
use std::collections::HashMap;

pub(crate) type TagHandler<T> =
    fn(&mut ParseContext<'_>, &mut TagCursor<'_>, &StartTag, &mut T) -> ParseResult<()>;

pub(crate) type TagTable<T> = HashMap<&'static str, TagHandler<T>>;

#[derive(Debug)]
enum WalkState<'d> {
    AtChildren,
    Recognized(&'d StartTag),
    SkippingUnknown(&'d StartTag),
    SkippingUnsupported(&'d StartTag),
    Done,
}

/// Handler for tags that are accepted but carry nothing we keep.
pub(crate) fn ignore<T>(
    _ctx: &mut ParseContext<'_>,
    _cursor: &mut TagCursor<'_>,
    _tag: &StartTag,
    _target: &mut T,
) -> ParseResult<()> {
    Ok(())
}

/// Advances to the document element, which must be `<manifest>`.
pub(crate) fn seek_manifest_root<'d>(cursor: &mut TagCursor<'d>) -> ParseResult<&'d StartTag> {
    let root = match cursor.next_start_tag() {
        Some(tag) => tag,
        None => fail!(ManifestMalformed, "No start tag found"),
    };
    if root.name != "manifest" {
        fail!(ManifestMalformed, "No <manifest> tag");
    }
    Ok(root)
}

/// Walks the direct children of `parent`, dispatching through `table`.
///
/// With `accepted` set, tags outside that list are skipped with a warning
/// even when the table knows them.
pub(crate) fn walk_element<'d, T>(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'d>,
    parent: &StartTag,
    label: &str,
    table: &TagTable<T>,
    accepted: Option<&[&str]>,
    target: &mut T,
) -> ParseResult<()> {
    let mut state = WalkState::AtChildren;
    loop {
        state = match state {
            WalkState::AtChildren => match cursor.next_child(parent.depth) {
                None => WalkState::Done,
                Some(tag) => {
                    let name = tag.name.as_str();
                    if accepted.map_or(false, |list| !list.contains(&name)) {
                        WalkState::SkippingUnsupported(tag)
                    } else if table.contains_key(name) {
                        WalkState::Recognized(tag)
                    } else {
                        WalkState::SkippingUnknown(tag)
                    }
                }
            },
            WalkState::Recognized(tag) => {
                if let Some(handler) = table.get(tag.name.as_str()) {
                    handler(ctx, cursor, tag, target)?;
                }
                WalkState::AtChildren
            }
            WalkState::SkippingUnknown(tag) => {
                ctx.unknown_element(cursor, tag, label)?;
                WalkState::AtChildren
            }
            WalkState::SkippingUnsupported(tag) => {
                ctx.warn(
                    tag.line,
                    format!("Skipping unsupported element under {}: {}", label, tag.name),
                );
                cursor.skip_current_tag(tag.depth);
                WalkState::AtChildren
            }
            WalkState::Done => return Ok(()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;
    use crate::config::ParserConfig;
    use crate::error::ParseErrorCode;
    use crate::parser::test_context;

    const DOC: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
    <first><nested/></first>
    <mystery><first/></mystery>
    <second/>
</manifest>"#;

    fn record(
        _ctx: &mut ParseContext<'_>,
        _cursor: &mut TagCursor<'_>,
        tag: &StartTag,
        seen: &mut Vec<String>,
    ) -> ParseResult<()> {
        seen.push(tag.name.clone());
        Ok(())
    }

    fn table() -> TagTable<Vec<String>> {
        let mut table: TagTable<Vec<String>> = HashMap::new();
        table.insert("first", record);
        table.insert("second", record);
        table
    }

    #[test]
    fn dispatches_direct_children_only() {
        let doc = ManifestDocument::from_text(DOC).unwrap();
        let mut cursor = doc.cursor();
        let root = seek_manifest_root(&mut cursor).unwrap();
        let config = ParserConfig::default();
        let mut ctx = test_context(&config);
        let mut seen = Vec::new();
        walk_element(&mut ctx, &mut cursor, root, "<manifest>", &table(), None, &mut seen).unwrap();
        assert_eq!(seen, vec!["first", "second"]);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.diagnostics[0].message.contains("mystery"));
    }

    #[test]
    fn unknown_children_fail_when_rigid() {
        let doc = ManifestDocument::from_text(DOC).unwrap();
        let mut cursor = doc.cursor();
        let root = seek_manifest_root(&mut cursor).unwrap();
        let config = ParserConfig::default().with_rigid(true);
        let mut ctx = test_context(&config);
        let err = walk_element(&mut ctx, &mut cursor, root, "<manifest>", &table(), None, &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::BadManifest);
        assert_eq!(err.message(), "Bad element under <manifest>: mystery");
    }

    #[test]
    fn accepted_list_filters_known_tags() {
        let doc = ManifestDocument::from_text(DOC).unwrap();
        let mut cursor = doc.cursor();
        let root = seek_manifest_root(&mut cursor).unwrap();
        let config = ParserConfig::default().with_rigid(true);
        let mut ctx = test_context(&config);
        let mut seen = Vec::new();
        walk_element(
            &mut ctx,
            &mut cursor,
            root,
            "<package>",
            &table(),
            Some(&["second"]),
            &mut seen,
        )
        .unwrap();
        assert_eq!(seen, vec!["second"]);
        assert_eq!(ctx.diagnostics.len(), 2);
    }

    #[test]
    fn root_must_be_manifest() {
        let doc = ManifestDocument::from_text("<application/>").unwrap();
        let err = seek_manifest_root(&mut doc.cursor()).unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::ManifestMalformed);
        let empty = ManifestDocument::default();
        assert_eq!(
            seek_manifest_root(&mut empty.cursor()).unwrap_err().message(),
            "No start tag found"
        );
    }
}
