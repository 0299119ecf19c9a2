use super::item::parse_item_info;
use super::manifest::ManifestState;
use super::meta_data::parse_all_meta_data;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::error::ParseResult;
use crate::package::{Instrumentation, InstrumentationInfo};

pub(crate) fn parse_instrumentation(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    const LABEL: &str = "<instrumentation>";
    let pkg = &mut state.pkg;
    let base = parse_item_info(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);
    let target_package = match attrs.get_non_resource_string("targetPackage") {
        Some(target) => target,
        None => fail!(ManifestMalformed, "{} does not specify targetPackage", LABEL),
    };
    let info = InstrumentationInfo {
        target_package,
        target_processes: attrs.get_non_resource_string("targetProcesses"),
        handle_profiling: attrs.get_bool("handleProfiling", false),
        functional_test: attrs.get_bool("functionalTest", false),
    };

    let mut instrumentation = Instrumentation::new(base, info);
    parse_all_meta_data(ctx, cursor, tag, LABEL, &mut instrumentation.meta_data)?;
    pkg.instrumentation.push(instrumentation);
    Ok(())
}
