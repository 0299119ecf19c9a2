//! `<key-sets>`: named public keys grouped into key sets, plus the sets an
//! update must be signed with.

use super::manifest::ManifestState;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::error::ParseResult;
use crate::signing::PublicKey;
use std::collections::{BTreeMap, BTreeSet};

const LABEL: &str = "<key-sets>";

#[derive(Default)]
struct KeySetScratch {
    public_keys: BTreeMap<String, PublicKey>,
    defined: BTreeMap<String, BTreeSet<String>>,
    improper: BTreeSet<String>,
    upgrade: BTreeSet<String>,
}

pub(crate) fn parse_key_sets(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    state: &mut ManifestState,
) -> ParseResult<()> {
    let mut scratch = KeySetScratch::default();
    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "key-set" => parse_key_set(ctx, cursor, child, &mut scratch)?,
            "public-key" => fail!(
                ManifestMalformed,
                "Improperly nested 'key-set' tag at line {}",
                child.line
            ),
            "upgrade-key-set" => {
                if let Some(name) = ctx.attrs(child).get_non_resource_string("name") {
                    scratch.upgrade.insert(name);
                }
            }
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }

    let package_name = &state.pkg.package_name;
    if scratch
        .public_keys
        .keys()
        .any(|name| scratch.defined.contains_key(name))
    {
        fail!(
            ManifestMalformed,
            "Package{} AndroidManifest.xml 'key-set' and 'public-key' names must be distinct.",
            package_name
        );
    }

    let mut mapping = BTreeMap::new();
    for (set_name, key_names) in &scratch.defined {
        if key_names.is_empty() {
            ctx.warn(
                tag.line,
                format!(
                    "Package{} AndroidManifest.xml 'key-set' {} has no valid associated 'public-key'. Not including in package's defined key-sets.",
                    package_name, set_name
                ),
            );
            continue;
        }
        if scratch.improper.contains(set_name) {
            ctx.warn(
                tag.line,
                format!(
                    "Package{} AndroidManifest.xml 'key-set' {} contained improper 'public-key' tags. Not including in package's defined key-sets.",
                    package_name, set_name
                ),
            );
            continue;
        }
        let keys: BTreeSet<PublicKey> = key_names
            .iter()
            .filter_map(|name| scratch.public_keys.get(name).cloned())
            .collect();
        mapping.insert(set_name.clone(), keys);
    }

    if !scratch.upgrade.iter().all(|name| mapping.contains_key(name)) {
        fail!(
            ManifestMalformed,
            "Package{} AndroidManifest.xml does not define all 'upgrade-key-set's .",
            package_name
        );
    }
    state.pkg.key_set_mapping = mapping;
    state.pkg.upgrade_key_sets = scratch.upgrade;
    Ok(())
}

fn parse_key_set(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    scratch: &mut KeySetScratch,
) -> ParseResult<()> {
    let set_name = ctx
        .attrs(tag)
        .get_non_resource_string("name")
        .unwrap_or_default();
    scratch.defined.insert(set_name.clone(), BTreeSet::new());

    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "public-key" => {
                let attrs = ctx.attrs(child);
                let key_name = attrs.get_non_resource_string("name").unwrap_or_default();
                match attrs.get_non_resource_string("value") {
                    None if !scratch.public_keys.contains_key(&key_name) => fail!(
                        ManifestMalformed,
                        "'public-key' {} must define a public-key value on first use at line {}",
                        key_name,
                        child.line
                    ),
                    None => {}
                    Some(encoded) => {
                        let key = match ctx.public_key(&encoded) {
                            Some(key) => key,
                            None => {
                                ctx.warn(
                                    child.line,
                                    format!(
                                        "No recognized valid key in 'public-key' tag. key-set {} will not be added to the package's defined key-sets.",
                                        set_name
                                    ),
                                );
                                scratch.improper.insert(set_name.clone());
                                continue;
                            }
                        };
                        match scratch.public_keys.get(&key_name) {
                            Some(existing) if *existing != key => fail!(
                                ManifestMalformed,
                                "Value of 'public-key' {} conflicts with previously defined value at line {}",
                                key_name,
                                child.line
                            ),
                            _ => {
                                scratch.public_keys.insert(key_name.clone(), key);
                            }
                        }
                    }
                }
                if let Some(keys) = scratch.defined.get_mut(&set_name) {
                    keys.insert(key_name);
                }
            }
            "key-set" => fail!(
                ManifestMalformed,
                "Improperly nested 'key-set' tag at line {}",
                child.line
            ),
            "upgrade-key-set" => {
                if let Some(name) = ctx.attrs(child).get_non_resource_string("name") {
                    scratch.upgrade.insert(name);
                }
            }
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }
    Ok(())
}
