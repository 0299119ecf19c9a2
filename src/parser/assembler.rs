//! Fixups applied once the `<application>` and `<manifest>` walks finish.
//!
//! Steps run in a fixed order: later ones read state the earlier ones
//! derive (aspect ratios depend on the synthesized details activity being
//! present, compatibility mode depends on the screen flags).

use super::manifest::ManifestState;
use super::ParseContext;
use crate::flags::{ActivityFlags, ApplicationFlags, ConfigChanges, PrivateFlags};
use crate::names::APP_DETAILS_ACTIVITY_CLASS_NAME;
use crate::package::components::screen_orientation;
use crate::package::{
    Activity, ActivityInfo, Component, ComponentBase, MetaValue, PackageDescriptor, ResizeMode,
};
use crate::sdk::version_codes;
use log::debug;

const METADATA_MAX_ASPECT_RATIO: &str = "android.max_aspect";
const DEFAULT_PRE_O_MAX_ASPECT_RATIO: f32 = 1.86;
const DEFAULT_PRE_Q_MIN_ASPECT_RATIO: f32 = 1.333;
const DEFAULT_PRE_Q_MIN_ASPECT_RATIO_WATCH: f32 = 1.0;
const FEATURE_WATCH: &str = "android.hardware.type.watch";

const THEME_NO_DISPLAY: u32 = 0x0103_0055;
const PERSIST_NEVER: i32 = 1;

/// Permissions that later platform releases started enforcing, with the
/// release they appeared in.
const NEW_PERMISSIONS: &[(&str, i32)] = &[
    ("android.permission.WRITE_EXTERNAL_STORAGE", version_codes::DONUT),
    ("android.permission.READ_PHONE_STATE", version_codes::DONUT),
];

/// Legacy `<supports-screens>` votes. A negative value means the app did not
/// say, which counts as support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ScreenSupport {
    pub small: i32,
    pub normal: i32,
    pub large: i32,
    pub xlarge: i32,
    pub resizeable: i32,
    pub any_density: i32,
}

impl Default for ScreenSupport {
    fn default() -> Self {
        ScreenSupport {
            small: 1,
            normal: 1,
            large: 1,
            xlarge: 1,
            resizeable: 1,
            any_density: 1,
        }
    }
}

impl ScreenSupport {
    fn flags(&self, target_sdk: i32) -> ApplicationFlags {
        let supported = |vote: i32, since: i32| vote < 0 || (vote > 0 && target_sdk >= since);
        let mut flags = ApplicationFlags::empty();
        if supported(self.small, version_codes::DONUT) {
            flags |= ApplicationFlags::SUPPORTS_SMALL_SCREENS;
        }
        if self.normal != 0 {
            flags |= ApplicationFlags::SUPPORTS_NORMAL_SCREENS;
        }
        if supported(self.large, version_codes::DONUT) {
            flags |= ApplicationFlags::SUPPORTS_LARGE_SCREENS;
        }
        if supported(self.xlarge, version_codes::GINGERBREAD) {
            flags |= ApplicationFlags::SUPPORTS_XLARGE_SCREENS;
        }
        if supported(self.resizeable, version_codes::DONUT) {
            flags |= ApplicationFlags::RESIZEABLE_FOR_SCREENS;
        }
        if supported(self.any_density, version_codes::DONUT) {
            flags |= ApplicationFlags::SUPPORTS_SCREEN_DENSITIES;
        }
        flags
    }
}

/// The hidden activity the platform launches for the app's details page.
fn app_details_activity(ctx: &ParseContext<'_>, pkg: &PackageDescriptor) -> Activity {
    let app = &pkg.application;
    let base = ComponentBase {
        class_name: APP_DETAILS_ACTIVITY_CLASS_NAME.to_string(),
        package_name: pkg.package_name.clone(),
        enabled: true,
        exported: true,
        process_name: app.process_name.clone(),
        ..ComponentBase::default()
    };
    let mut info = ActivityInfo {
        theme: THEME_NO_DISPLAY,
        ui_options: app.ui_options,
        task_affinity: Some(format!("{}:app_details", pkg.package_name)),
        launch_mode: 0,
        document_launch_mode: 0,
        persistable_mode: PERSIST_NEVER,
        max_recents: ctx.config.default_recents_limit,
        config_changes: ConfigChanges::for_activity(0, 0),
        soft_input_mode: 0,
        screen_orientation: screen_orientation::UNSPECIFIED,
        resize_mode: ResizeMode::ForceResizeable,
        lock_task_launch_mode: 0,
        color_mode: 0,
        rotation_animation: -1,
        ..ActivityInfo::default()
    };
    if pkg.base_hardware_accelerated {
        info.flags |= ActivityFlags::HARDWARE_ACCELERATED;
    }
    Component::new(base, info)
}

fn sort_by_order<I>(components: &mut [Component<I>]) {
    if components.iter().any(|c| c.order != 0) {
        components.sort_by(|a, b| b.order.cmp(&a.order));
    }
}

fn meta_float(bundle: &crate::package::Bundle, key: &str) -> Option<f32> {
    bundle.get(key).and_then(MetaValue::as_float)
}

fn apply_max_aspect_ratio(pkg: &mut PackageDescriptor) {
    let app = &pkg.application;
    let app_ratio = if app.max_aspect_ratio != 0.0 {
        app.max_aspect_ratio
    } else if let Some(ratio) = meta_float(&pkg.app_meta_data, METADATA_MAX_ASPECT_RATIO) {
        ratio
    } else if app.target_sdk_version < version_codes::O {
        DEFAULT_PRE_O_MAX_ASPECT_RATIO
    } else {
        0.0
    };
    for activity in &mut pkg.activities {
        if activity.info.has_max_aspect_ratio {
            continue;
        }
        let ratio = meta_float(&activity.meta_data, METADATA_MAX_ASPECT_RATIO).unwrap_or(app_ratio);
        activity.info.set_max_aspect_ratio(ratio);
    }
}

fn apply_min_aspect_ratio(ctx: &ParseContext<'_>, pkg: &mut PackageDescriptor) {
    let app = &pkg.application;
    let ratio = if app.min_aspect_ratio != 0.0 {
        app.min_aspect_ratio
    } else if app.target_sdk_version >= version_codes::Q {
        0.0
    } else if ctx.has_feature(FEATURE_WATCH) {
        DEFAULT_PRE_Q_MIN_ASPECT_RATIO_WATCH
    } else {
        DEFAULT_PRE_Q_MIN_ASPECT_RATIO
    };
    for activity in &mut pkg.activities {
        if !activity.info.has_min_aspect_ratio {
            activity.info.set_min_aspect_ratio(ratio);
        }
    }
}

fn mark_direct_boot_aware(pkg: &mut PackageDescriptor) {
    for activity in pkg.activities.iter_mut().chain(pkg.receivers.iter_mut()) {
        activity.base.direct_boot_aware = true;
    }
    for service in &mut pkg.services {
        service.base.direct_boot_aware = true;
    }
    for provider in &mut pkg.providers {
        provider.base.direct_boot_aware = true;
    }
}

/// Fixups that follow the base `<application>`.
pub(crate) fn finish_application(ctx: &ParseContext<'_>, pkg: &mut PackageDescriptor) {
    if !pkg.is_static_shared_library() {
        let details = app_details_activity(ctx, pkg);
        pkg.activities.push(details);
    }

    sort_by_order(&mut pkg.activities);
    sort_by_order(&mut pkg.receivers);
    sort_by_order(&mut pkg.services);

    apply_max_aspect_ratio(pkg);
    apply_min_aspect_ratio(ctx, pkg);

    let has_domain_urls = pkg
        .activities
        .iter()
        .flat_map(|a| &a.intents)
        .any(|filter| filter.handles_web_uris());
    pkg.application
        .private_flags
        .set(PrivateFlags::HAS_DOMAIN_URLS, has_domain_urls);

    if pkg.application.is_direct_boot_aware() {
        mark_direct_boot_aware(pkg);
    }
}

fn add_implicit_permission(pkg: &mut PackageDescriptor, permission: &str) {
    if !pkg.is_requested_permission(permission) {
        pkg.requested_permissions.push(permission.to_string());
        pkg.implicit_permissions.push(permission.to_string());
    }
}

/// Fixups that follow the whole `<manifest>` (or child `<package>`).
pub(crate) fn finish_manifest(ctx: &ParseContext<'_>, state: &mut ManifestState) {
    let pkg = &mut state.pkg;
    let target_sdk = pkg.application.target_sdk_version;

    for (permission, sdk) in NEW_PERMISSIONS {
        if target_sdk >= *sdk {
            break;
        }
        add_implicit_permission(pkg, permission);
    }
    for split in &ctx.config.split_permissions {
        if target_sdk >= split.target_sdk || !pkg.is_requested_permission(&split.split_permission) {
            continue;
        }
        for permission in &split.new_permissions {
            add_implicit_permission(pkg, permission);
        }
    }
    if !pkg.implicit_permissions.is_empty() && ctx.verbose() {
        debug!(
            "{}: compat added {}",
            pkg.package_name,
            pkg.implicit_permissions.join(" ")
        );
    }

    pkg.application.flags |= state.screens.flags(target_sdk);
    if pkg.application.uses_compatibility_mode() {
        for activity in &mut pkg.activities {
            activity.info.resize_mode = ResizeMode::Unresizeable;
            activity.info.flags.remove(ActivityFlags::SUPPORTS_PICTURE_IN_PICTURE);
        }
    }
    if !ctx.config.compatibility_mode_enabled {
        pkg.application.flags |= ApplicationFlags::ALL_SCREEN_SUPPORT;
    }
}
