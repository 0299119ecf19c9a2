//! `<intent-filter>` and its `<action>`, `<category>` and `<data>` children.

use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::TypedAttributes;
use crate::error::ParseResult;
use crate::package::intent::{AuthorityEntry, InstantAppVisibility, CATEGORY_DEFAULT};
use crate::package::{IntentFilterKind, IntentInfo, PatternKind, PatternMatcher};

/// What a filter owner permits in its filters.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FilterPolicy {
    pub allow_globs: bool,
    pub allow_auto_verify: bool,
}

pub(crate) fn parse_intent_filter(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    kind: IntentFilterKind,
    policy: FilterPolicy,
) -> ParseResult<IntentInfo> {
    let mut filter = IntentInfo::new(kind);
    {
        let attrs = ctx.attrs(tag);
        filter.priority = attrs.get_int("priority", 0);
        filter.order = attrs.get_int("order", 0);
        filter.label_res = attrs.get_resource_id("label", 0);
        if filter.label_res == 0 {
            filter.non_localized_label = attrs.get_string("label");
        }
        let round_icon = if ctx.config.use_round_icon {
            attrs.get_resource_id("roundIcon", 0)
        } else {
            0
        };
        filter.icon = if round_icon != 0 {
            round_icon
        } else {
            attrs.get_resource_id("icon", 0)
        };
        filter.logo = attrs.get_resource_id("logo", 0);
        filter.banner = attrs.get_resource_id("banner", 0);
        if policy.allow_auto_verify {
            filter.auto_verify = attrs.get_bool("autoVerify", false);
        }
    }

    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "action" => {
                let name = required_name(&ctx.attrs(child))?;
                filter.add_action(&name);
            }
            "category" => {
                let name = required_name(&ctx.attrs(child))?;
                filter.add_category(&name);
            }
            "data" => parse_data(&ctx.attrs(child), &mut filter, policy)?,
            _ => ctx.unknown_element(cursor, child, "<intent-filter>")?,
        }
    }

    filter.has_default = filter.has_category(CATEGORY_DEFAULT);
    Ok(filter)
}

/// Instant app exposure of a filter: explicit when the owner opted in,
/// implicit for browsable or share filters where the owner kind allows it.
pub(crate) fn instant_visibility(
    filter: &IntentInfo,
    explicit: bool,
    implicit_allowed: bool,
) -> InstantAppVisibility {
    if explicit {
        InstantAppVisibility::Explicit
    } else if implicit_allowed && filter.is_implicitly_exposed() {
        InstantAppVisibility::Implicit
    } else {
        InstantAppVisibility::None
    }
}

fn required_name(attrs: &TypedAttributes<'_>) -> ParseResult<String> {
    match attrs.get_non_resource_string("name") {
        Some(name) if !name.is_empty() => Ok(name),
        _ => fail!(ManifestMalformed, "No value supplied for <android:name>"),
    }
}

fn parse_data(
    attrs: &TypedAttributes<'_>,
    filter: &mut IntentInfo,
    policy: FilterPolicy,
) -> ParseResult<()> {
    if let Some(mime) = attrs.get_non_configuration_string("mimeType") {
        filter
            .add_data_type(&mime)
            .map_err(|bad| err!(ManifestMalformed, "Malformed MIME type: {}", bad))?;
    }
    if let Some(scheme) = attrs.get_non_configuration_string("scheme") {
        filter.add_data_scheme(&scheme);
    }

    if let Some(ssp) = attrs.get_non_configuration_string("ssp") {
        filter
            .data_scheme_specific_parts
            .push(PatternMatcher::new(ssp, PatternKind::Literal));
    }
    if let Some(prefix) = attrs.get_non_configuration_string("sspPrefix") {
        filter
            .data_scheme_specific_parts
            .push(PatternMatcher::new(prefix, PatternKind::Prefix));
    }
    if let Some(pattern) = attrs.get_non_configuration_string("sspPattern") {
        if !policy.allow_globs {
            fail!(ManifestMalformed, "sspPattern not allowed here; ssp must be literal");
        }
        filter
            .data_scheme_specific_parts
            .push(PatternMatcher::new(pattern, PatternKind::SimpleGlob));
    }

    if let Some(host) = attrs.get_non_configuration_string("host") {
        let port = match attrs.get_non_configuration_string("port") {
            None => None,
            Some(port) => match port.trim().parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => fail!(ManifestMalformed, "Malformed port: {}", port),
            },
        };
        filter.data_authorities.push(AuthorityEntry { host, port });
    }

    if let Some(path) = attrs.get_non_configuration_string("path") {
        filter
            .data_paths
            .push(PatternMatcher::new(path, PatternKind::Literal));
    }
    if let Some(prefix) = attrs.get_non_configuration_string("pathPrefix") {
        filter
            .data_paths
            .push(PatternMatcher::new(prefix, PatternKind::Prefix));
    }
    if let Some(pattern) = attrs.get_non_configuration_string("pathPattern") {
        if !policy.allow_globs {
            fail!(ManifestMalformed, "pathPattern not allowed here; path must be literal");
        }
        filter
            .data_paths
            .push(PatternMatcher::new(pattern, PatternKind::SimpleGlob));
    }
    if let Some(pattern) = attrs.get_non_configuration_string("pathAdvancedPattern") {
        if !policy.allow_globs {
            fail!(
                ManifestMalformed,
                "pathAdvancedPattern not allowed here; path must be literal"
            );
        }
        filter
            .data_paths
            .push(PatternMatcher::new(pattern, PatternKind::AdvancedGlob));
    }
    Ok(())
}
