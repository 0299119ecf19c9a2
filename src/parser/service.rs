use super::intent_filter::{instant_visibility, parse_intent_filter, FilterPolicy};
use super::item::parse_component_base;
use super::meta_data::parse_meta_data;
use super::ParseContext;
use crate::android::xml::{StartTag, TagCursor};
use crate::attrs::tables;
use crate::error::ParseResult;
use crate::flags::{PrivateFlags, ServiceFlags};
use crate::package::{IntentFilterKind, PackageDescriptor, Service, ServiceInfo};

const SERVICE_FLAGS: &[(&str, ServiceFlags)] = &[
    ("stopWithTask", ServiceFlags::STOP_WITH_TASK),
    ("isolatedProcess", ServiceFlags::ISOLATED_PROCESS),
    ("externalService", ServiceFlags::EXTERNAL_SERVICE),
    ("useAppZygote", ServiceFlags::USE_APP_ZYGOTE),
    ("singleUser", ServiceFlags::SINGLE_USER),
];

pub(crate) fn parse_service(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<Service> {
    const LABEL: &str = "<service>";
    let base = parse_component_base(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);

    let explicit_exported = attrs.has_value("exported").then(|| attrs.get_bool("exported", false));
    let mut info = ServiceInfo {
        permission: match attrs.get_non_configuration_string("permission") {
            None => pkg.application.permission.clone(),
            Some(permission) => (!permission.is_empty()).then_some(permission),
        },
        flags: SERVICE_FLAGS
            .iter()
            .filter(|(name, _)| attrs.get_bool(name, false))
            .fold(ServiceFlags::empty(), |acc, (_, flag)| acc | *flag),
        foreground_service_type: attrs.get_flags(
            "foregroundServiceType",
            tables::FOREGROUND_SERVICE_TYPE,
            0,
        ),
    };

    if base.direct_boot_aware {
        pkg.application.private_flags |= PrivateFlags::PARTIALLY_DIRECT_BOOT_AWARE;
    }
    let visible_to_instant_apps = attrs.get_bool("visibleToInstantApps", false);
    if visible_to_instant_apps {
        info.flags |= ServiceFlags::VISIBLE_TO_INSTANT_APP;
        pkg.visible_to_instant_apps = true;
    }
    if pkg.application.cant_save_state() && base.process_name == pkg.package_name {
        fail!(
            ManifestMalformed,
            "Heavy-weight applications can not have services in main process"
        );
    }

    let mut service = Service::new(base, info);
    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "intent-filter" => {
                let policy = FilterPolicy {
                    allow_globs: true,
                    allow_auto_verify: false,
                };
                let mut filter =
                    parse_intent_filter(ctx, cursor, child, IntentFilterKind::Service, policy)?;
                filter.visibility = instant_visibility(&filter, visible_to_instant_apps, false);
                service.order = service.order.max(filter.order);
                service.intents.push(filter);
            }
            "meta-data" => parse_meta_data(ctx, child, &mut service.meta_data)?,
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }

    service.base.exported = explicit_exported.unwrap_or(!service.intents.is_empty());
    Ok(service)
}
