//! `<activity>`, `<receiver>` and `<activity-alias>`.

use super::intent_filter::{instant_visibility, parse_intent_filter, FilterPolicy};
use super::item::{parse_component_base, parse_item_info};
use super::meta_data::parse_meta_data;
use super::ParseContext;
use crate::android::xml::{ManifestValue, StartTag, TagCursor};
use crate::attrs::{tables, TypedAttributes};
use crate::error::ParseResult;
use crate::flags::{ActivityFlags, ApplicationFlags, ConfigChanges, PrivateFlags};
use crate::names::{build_class_name, build_task_affinity_name};
use crate::package::components::screen_orientation;
use crate::package::intent::InstantAppVisibility;
use crate::package::{
    Activity, ActivityInfo, IntentFilterKind, IntentInfo, PackageDescriptor, ResizeMode,
    WindowLayout,
};

/// Boolean attributes shared by activities and receivers.
const COMMON_FLAGS: &[(&str, ActivityFlags)] = &[
    ("multiprocess", ActivityFlags::MULTIPROCESS),
    ("finishOnTaskLaunch", ActivityFlags::FINISH_ON_TASK_LAUNCH),
    ("clearTaskOnLaunch", ActivityFlags::CLEAR_TASK_ON_LAUNCH),
    ("noHistory", ActivityFlags::NO_HISTORY),
    ("alwaysRetainTaskState", ActivityFlags::ALWAYS_RETAIN_TASK_STATE),
    ("stateNotNeeded", ActivityFlags::STATE_NOT_NEEDED),
    ("excludeFromRecents", ActivityFlags::EXCLUDE_FROM_RECENTS),
    ("finishOnCloseSystemDialogs", ActivityFlags::FINISH_ON_CLOSE_SYSTEM_DIALOGS),
    ("immersive", ActivityFlags::IMMERSIVE),
    ("systemUserOnly", ActivityFlags::SYSTEM_USER_ONLY),
];

const ACTIVITY_ONLY_FLAGS: &[(&str, ActivityFlags)] = &[
    ("allowEmbedded", ActivityFlags::ALLOW_EMBEDDED),
    ("autoRemoveFromRecents", ActivityFlags::AUTO_REMOVE_FROM_RECENTS),
    ("relinquishTaskIdentity", ActivityFlags::RELINQUISH_TASK_IDENTITY),
    ("resumeWhilePausing", ActivityFlags::RESUME_WHILE_PAUSING),
    ("supportsPictureInPicture", ActivityFlags::SUPPORTS_PICTURE_IN_PICTURE),
    ("alwaysFocusable", ActivityFlags::ALWAYS_FOCUSABLE),
    ("showWhenLocked", ActivityFlags::SHOW_WHEN_LOCKED),
    ("turnScreenOn", ActivityFlags::TURN_SCREEN_ON),
];

const GRAVITY_CENTER: i32 = 17;

fn read_flags(attrs: &TypedAttributes<'_>, table: &[(&str, ActivityFlags)]) -> ActivityFlags {
    table
        .iter()
        .filter(|(name, _)| attrs.get_bool(name, false))
        .fold(ActivityFlags::empty(), |acc, (_, flag)| acc | *flag)
}

pub(crate) fn parse_activity(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
    receiver: bool,
) -> ParseResult<Activity> {
    let label = if receiver { "<receiver>" } else { "<activity>" };
    let base = parse_component_base(ctx, tag, pkg, label)?;
    let attrs = ctx.attrs(tag);
    let app = &pkg.application;
    let mut info = ActivityInfo::default();

    let explicit_exported = attrs.has_value("exported").then(|| attrs.get_bool("exported", false));
    info.theme = attrs.get_resource_id("theme", 0);
    info.ui_options = attrs.get_flags("uiOptions", tables::UI_OPTIONS, app.ui_options);

    if let Some(parent) = attrs.get_non_configuration_string("parentActivityName") {
        match build_class_name(&pkg.package_name, Some(&parent)) {
            Ok(parent) => info.parent_activity_name = Some(parent),
            Err(_) => ctx.warn(
                tag.line,
                format!(
                    "Activity {} specified invalid parentActivityName {}",
                    base.class_name, parent
                ),
            ),
        }
    }

    info.permission = match attrs.get_non_configuration_string("permission") {
        None => app.permission.clone(),
        Some(permission) if permission.is_empty() => None,
        Some(permission) => Some(permission),
    };
    info.task_affinity = build_task_affinity_name(
        &pkg.package_name,
        app.task_affinity.as_deref(),
        attrs.get_non_configuration_string("taskAffinity").as_deref(),
    )?;

    info.flags = read_flags(&attrs, COMMON_FLAGS);
    if attrs.get_bool(
        "allowTaskReparenting",
        app.flags.contains(ApplicationFlags::ALLOW_TASK_REPARENTING),
    ) {
        info.flags |= ActivityFlags::ALLOW_TASK_REPARENTING;
    }
    if attrs.get_bool("showOnLockScreen", false) || attrs.get_bool("showForAllUsers", false) {
        info.flags |= ActivityFlags::SHOW_FOR_ALL_USERS;
    }

    if receiver {
        info.launch_mode = 0;
        info.config_changes = ConfigChanges::empty();
        if attrs.get_bool("singleUser", false) {
            info.flags |= ActivityFlags::SINGLE_USER;
        }
    } else {
        if attrs.get_bool("hardwareAccelerated", pkg.base_hardware_accelerated) {
            info.flags |= ActivityFlags::HARDWARE_ACCELERATED;
        }
        info.flags |= read_flags(&attrs, ACTIVITY_ONLY_FLAGS);
        info.launch_mode = attrs.get_enum("launchMode", tables::LAUNCH_MODE, 0);
        info.document_launch_mode =
            attrs.get_enum("documentLaunchMode", tables::DOCUMENT_LAUNCH_MODE, 0);
        info.persistable_mode = attrs.get_enum("persistableMode", tables::PERSISTABLE_MODE, 0);
        info.max_recents = attrs.get_int("maxRecents", ctx.config.default_recents_limit);
        info.config_changes = ConfigChanges::for_activity(
            attrs.get_flags("configChanges", tables::CONFIG_CHANGES, 0) as u32,
            attrs.get_flags("recreateOnConfigChanges", tables::CONFIG_CHANGES, 0) as u32,
        );
        info.soft_input_mode = attrs.get_flags("windowSoftInputMode", tables::SOFT_INPUT_MODE, 0);
        info.screen_orientation = attrs.get_enum(
            "screenOrientation",
            tables::SCREEN_ORIENTATION,
            screen_orientation::UNSPECIFIED,
        );
        info.resize_mode = resize_mode(&attrs, app.private_flags, info.screen_orientation);
        if let Some(ratio) = attrs.float_if_typed("maxAspectRatio") {
            info.set_max_aspect_ratio(ratio);
        }
        if let Some(ratio) = attrs.float_if_typed("minAspectRatio") {
            info.set_min_aspect_ratio(ratio);
        }
        info.lock_task_launch_mode = attrs.get_enum("lockTaskMode", tables::LOCK_TASK_MODE, 0);
        info.requested_vr_component = attrs.get_string("enableVrMode");
        info.rotation_animation =
            attrs.get_enum("rotationAnimation", tables::ROTATION_ANIMATION, -1);
        info.color_mode = attrs.get_enum("colorMode", tables::COLOR_MODE, 0);
    }

    if base.direct_boot_aware {
        pkg.application.private_flags |= PrivateFlags::PARTIALLY_DIRECT_BOOT_AWARE;
    }
    let visible_to_instant_apps = attrs.get_bool("visibleToInstantApps", false);
    if visible_to_instant_apps {
        info.flags |= ActivityFlags::VISIBLE_TO_INSTANT_APP;
        pkg.visible_to_instant_apps = true;
    }

    if receiver
        && pkg.application.cant_save_state()
        && base.process_name == pkg.package_name
    {
        fail!(
            ManifestMalformed,
            "Heavy-weight applications can not have receivers in main process"
        );
    }

    let kind = if receiver {
        IntentFilterKind::Receiver
    } else {
        IntentFilterKind::Activity
    };
    let mut activity = Activity::new(base, info);
    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "intent-filter" => {
                let policy = FilterPolicy {
                    allow_globs: true,
                    allow_auto_verify: !receiver,
                };
                let mut filter = parse_intent_filter(ctx, cursor, child, kind, policy)?;
                if filter.actions.is_empty() {
                    ctx.warn(child.line, "No actions in intent filter, ignoring it");
                    continue;
                }
                filter.visibility = instant_visibility(&filter, visible_to_instant_apps, !receiver);
                mark_visibility(&mut activity.info, &filter);
                activity.order = activity.order.max(filter.order);
                activity.intents.push(filter);
            }
            "preferred" if !receiver => {
                let policy = FilterPolicy {
                    allow_globs: false,
                    allow_auto_verify: false,
                };
                let mut filter = parse_intent_filter(ctx, cursor, child, kind, policy)?;
                if filter.actions.is_empty() {
                    ctx.warn(child.line, "No actions in preferred, ignoring it");
                    continue;
                }
                filter.visibility = instant_visibility(&filter, visible_to_instant_apps, true);
                mark_visibility(&mut activity.info, &filter);
                pkg.preferred_activity_filters.push(filter);
            }
            "meta-data" => parse_meta_data(ctx, child, &mut activity.meta_data)?,
            "layout" if !receiver => {
                activity.info.window_layout = Some(parse_layout(&ctx.attrs(child)));
            }
            _ => ctx.unknown_element(cursor, child, label)?,
        }
    }

    activity.base.exported = explicit_exported.unwrap_or(!activity.intents.is_empty());
    Ok(activity)
}

fn mark_visibility(info: &mut ActivityInfo, filter: &IntentInfo) {
    match filter.visibility {
        InstantAppVisibility::Explicit => info.flags |= ActivityFlags::VISIBLE_TO_INSTANT_APP,
        InstantAppVisibility::Implicit => {
            info.flags |= ActivityFlags::VISIBLE_TO_INSTANT_APP
                | ActivityFlags::IMPLICITLY_VISIBLE_TO_INSTANT_APP
        }
        InstantAppVisibility::None => {}
    }
}

/// Explicit per-activity or app-wide resizeability wins; otherwise the mode
/// follows the SDK level or the declared orientation.
fn resize_mode(attrs: &TypedAttributes<'_>, app_flags: PrivateFlags, orientation: i32) -> ResizeMode {
    let app_explicit = app_flags.intersects(
        PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE
            | PrivateFlags::ACTIVITIES_RESIZE_MODE_UNRESIZEABLE,
    );
    if attrs.has_value("resizeableActivity") || app_explicit {
        let app_default = app_flags.contains(PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE);
        return if attrs.get_bool("resizeableActivity", app_default) {
            ResizeMode::Resizeable
        } else {
            ResizeMode::Unresizeable
        };
    }
    if app_flags.contains(PrivateFlags::ACTIVITIES_RESIZE_MODE_RESIZEABLE_VIA_SDK_VERSION) {
        return ResizeMode::ResizeableViaSdkVersion;
    }
    if screen_orientation::is_fixed_portrait(orientation) {
        ResizeMode::ForceResizablePortraitOnly
    } else if screen_orientation::is_fixed_landscape(orientation) {
        ResizeMode::ForceResizableLandscapeOnly
    } else if orientation == screen_orientation::LOCKED {
        ResizeMode::ForceResizablePreserveOrientation
    } else {
        ResizeMode::ForceResizeable
    }
}

enum Dimension {
    Pixels(i32),
    Fraction(f32),
}

/// Reads a dimension written as `120`, `120px`, `120dp` or `50%`. Density
/// independent units are taken at the baseline density.
fn dimension(value: Option<ManifestValue>) -> Option<Dimension> {
    match value? {
        ManifestValue::Integer(pixels) => Some(Dimension::Pixels(pixels as i32)),
        ManifestValue::Float(pixels) => Some(Dimension::Pixels(pixels.round() as i32)),
        ManifestValue::String(text) => {
            let text = text.trim();
            if let Some(percent) = text.strip_suffix('%') {
                return percent.trim().parse::<f32>().ok().map(|p| Dimension::Fraction(p / 100.0));
            }
            let number = ["px", "dip", "dp", "sp"]
                .iter()
                .find_map(|unit| text.strip_suffix(unit))
                .unwrap_or(text);
            number
                .trim()
                .parse::<f32>()
                .ok()
                .map(|pixels| Dimension::Pixels(pixels.round() as i32))
        }
        _ => None,
    }
}

fn pixels(value: Option<ManifestValue>) -> i32 {
    match dimension(value) {
        Some(Dimension::Pixels(pixels)) => pixels,
        _ => -1,
    }
}

fn parse_layout(attrs: &TypedAttributes<'_>) -> WindowLayout {
    let mut layout = WindowLayout {
        width: -1,
        width_fraction: -1.0,
        height: -1,
        height_fraction: -1.0,
        gravity: attrs.get_flags("gravity", tables::GRAVITY, GRAVITY_CENTER),
        min_width: pixels(attrs.resolved("minWidth")),
        min_height: pixels(attrs.resolved("minHeight")),
    };
    match dimension(attrs.resolved("defaultWidth")) {
        Some(Dimension::Pixels(width)) => layout.width = width,
        Some(Dimension::Fraction(fraction)) => layout.width_fraction = fraction,
        None => {}
    }
    match dimension(attrs.resolved("defaultHeight")) {
        Some(Dimension::Pixels(height)) => layout.height = height,
        Some(Dimension::Fraction(fraction)) => layout.height_fraction = fraction,
        None => {}
    }
    layout
}

/// An alias copies its target's behaviour and overlays its own identity,
/// permission, exported state and filters. The target must already be parsed.
pub(crate) fn parse_activity_alias(
    ctx: &mut ParseContext<'_>,
    cursor: &mut TagCursor<'_>,
    tag: &StartTag,
    pkg: &mut PackageDescriptor,
) -> ParseResult<Activity> {
    const LABEL: &str = "<activity-alias>";
    let own = parse_item_info(ctx, tag, pkg, LABEL)?;
    let attrs = ctx.attrs(tag);

    let target_name = match attrs.get_non_configuration_string("targetActivity") {
        Some(name) => build_class_name(&pkg.package_name, Some(&name))?,
        None => fail!(ManifestMalformed, "{} does not specify android:targetActivity", LABEL),
    };
    let target = match pkg.activities.iter().find(|a| a.base.class_name == target_name) {
        Some(target) => target,
        None => fail!(
            ManifestMalformed,
            "{} target activity {} not found in manifest",
            LABEL,
            target_name
        ),
    };

    let mut base = target.base.clone();
    base.class_name = own.class_name;
    if attrs.has_value("label") {
        base.label_res = own.label_res;
        base.non_localized_label = own.non_localized_label;
    }
    if own.icon != 0 {
        base.icon = own.icon;
        base.round_icon = own.round_icon;
    }
    if own.logo != 0 {
        base.logo = own.logo;
    }
    if own.banner != 0 {
        base.banner = own.banner;
    }
    if own.description_res != 0 {
        base.description_res = own.description_res;
    }
    base.enabled = attrs.get_bool("enabled", true);

    let mut info = target.info.clone();
    info.target_activity = Some(target_name.clone());
    info.has_max_aspect_ratio = false;
    info.has_min_aspect_ratio = false;
    if target.info.has_max_aspect_ratio {
        info.set_max_aspect_ratio(target.info.max_aspect_ratio);
    }
    if target.info.has_min_aspect_ratio {
        info.set_min_aspect_ratio(target.info.min_aspect_ratio);
    }

    let explicit_exported = attrs.has_value("exported").then(|| attrs.get_bool("exported", false));
    if let Some(permission) = attrs.get_non_configuration_string("permission") {
        info.permission = (!permission.is_empty()).then_some(permission);
    }
    if let Some(parent) = attrs.get_non_configuration_string("parentActivityName") {
        match build_class_name(&pkg.package_name, Some(&parent)) {
            Ok(parent) => info.parent_activity_name = Some(parent),
            Err(_) => ctx.warn(
                tag.line,
                format!(
                    "Activity alias {} specified invalid parentActivityName {}",
                    base.class_name, parent
                ),
            ),
        }
    }
    let visible_to_instant_apps = attrs.get_bool("visibleToInstantApps", false);
    if visible_to_instant_apps {
        info.flags |= ActivityFlags::VISIBLE_TO_INSTANT_APP;
        pkg.visible_to_instant_apps = true;
    }

    let mut alias = Activity::new(base, info);
    while let Some(child) = cursor.next_child(tag.depth) {
        match child.name.as_str() {
            "intent-filter" => {
                let policy = FilterPolicy {
                    allow_globs: true,
                    allow_auto_verify: true,
                };
                let mut filter =
                    parse_intent_filter(ctx, cursor, child, IntentFilterKind::Activity, policy)?;
                if filter.actions.is_empty() {
                    ctx.warn(child.line, "No actions in intent filter, ignoring it");
                    continue;
                }
                filter.visibility = instant_visibility(&filter, visible_to_instant_apps, true);
                mark_visibility(&mut alias.info, &filter);
                alias.order = alias.order.max(filter.order);
                alias.intents.push(filter);
            }
            "meta-data" => parse_meta_data(ctx, child, &mut alias.meta_data)?,
            _ => ctx.unknown_element(cursor, child, LABEL)?,
        }
    }

    alias.base.exported = explicit_exported.unwrap_or(!alias.intents.is_empty());
    Ok(alias)
}
