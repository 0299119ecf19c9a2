//! Component records produced by the per-tag builders.

use crate::flags::{
    ActivityFlags, ConfigChanges, PermissionFlags, ProtectionLevel, ProviderFlags, ServiceFlags,
};
use crate::package::intent::{IntentInfo, PatternMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed `<meta-data>` value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    String(String),
    Boolean(bool),
    Int(i32),
    Float(f32),
    Resource(u32),
}

impl MetaValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            MetaValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

/// Opaque key/value bundle collected from `<meta-data>` tags.
pub type Bundle = BTreeMap<String, MetaValue>;

/// Fields shared by every component kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentBase {
    pub class_name: String,
    /// Owning package, by name.
    pub package_name: String,
    pub label_res: u32,
    pub non_localized_label: Option<String>,
    pub icon: u32,
    pub round_icon: u32,
    pub logo: u32,
    pub banner: u32,
    pub description_res: u32,
    pub enabled: bool,
    pub exported: bool,
    pub process_name: String,
    pub split_name: Option<String>,
    pub direct_boot_aware: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component<I> {
    pub base: ComponentBase,
    pub info: I,
    pub intents: Vec<IntentInfo>,
    pub meta_data: Bundle,
    pub order: i32,
}

impl<I> Component<I> {
    pub fn new(base: ComponentBase, info: I) -> Self {
        Component {
            base,
            info,
            intents: Vec::new(),
            meta_data: Bundle::new(),
            order: 0,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.base.class_name
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMode {
    Unresizeable,
    ResizeableViaSdkVersion,
    #[default]
    Resizeable,
    ResizeableAndPipableDeprecated,
    ForceResizeable,
    ForceResizableLandscapeOnly,
    ForceResizablePortraitOnly,
    ForceResizablePreserveOrientation,
}

impl ResizeMode {
    pub fn from_value(value: i32) -> Option<ResizeMode> {
        Some(match value {
            0 => ResizeMode::Unresizeable,
            1 => ResizeMode::ResizeableViaSdkVersion,
            2 => ResizeMode::Resizeable,
            3 => ResizeMode::ResizeableAndPipableDeprecated,
            4 => ResizeMode::ForceResizeable,
            5 => ResizeMode::ForceResizableLandscapeOnly,
            6 => ResizeMode::ForceResizablePortraitOnly,
            7 => ResizeMode::ForceResizablePreserveOrientation,
            _ => return None,
        })
    }

    pub fn is_resizeable(self) -> bool {
        matches!(
            self,
            ResizeMode::Resizeable
                | ResizeMode::ResizeableViaSdkVersion
                | ResizeMode::ResizeableAndPipableDeprecated
                | ResizeMode::ForceResizeable
        )
    }
}

pub mod screen_orientation {
    pub const UNSPECIFIED: i32 = -1;
    pub const LANDSCAPE: i32 = 0;
    pub const PORTRAIT: i32 = 1;
    pub const SENSOR_LANDSCAPE: i32 = 6;
    pub const SENSOR_PORTRAIT: i32 = 7;
    pub const REVERSE_LANDSCAPE: i32 = 8;
    pub const REVERSE_PORTRAIT: i32 = 9;
    pub const USER_LANDSCAPE: i32 = 11;
    pub const USER_PORTRAIT: i32 = 12;
    pub const LOCKED: i32 = 14;

    pub fn is_fixed_landscape(orientation: i32) -> bool {
        matches!(
            orientation,
            LANDSCAPE | SENSOR_LANDSCAPE | REVERSE_LANDSCAPE | USER_LANDSCAPE
        )
    }

    pub fn is_fixed_portrait(orientation: i32) -> bool {
        matches!(
            orientation,
            PORTRAIT | SENSOR_PORTRAIT | REVERSE_PORTRAIT | USER_PORTRAIT
        )
    }

    pub fn is_fixed(orientation: i32) -> bool {
        is_fixed_landscape(orientation) || is_fixed_portrait(orientation) || orientation == LOCKED
    }
}

/// Initial window geometry from `<layout>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowLayout {
    pub width: i32,
    pub width_fraction: f32,
    pub height: i32,
    pub height_fraction: f32,
    pub gravity: i32,
    pub min_width: i32,
    pub min_height: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub theme: u32,
    pub ui_options: i32,
    pub parent_activity_name: Option<String>,
    pub permission: Option<String>,
    pub task_affinity: Option<String>,
    /// Set for activity aliases.
    pub target_activity: Option<String>,
    pub flags: ActivityFlags,
    pub launch_mode: i32,
    pub document_launch_mode: i32,
    pub persistable_mode: i32,
    pub max_recents: i32,
    pub config_changes: ConfigChanges,
    pub soft_input_mode: i32,
    pub screen_orientation: i32,
    pub resize_mode: ResizeMode,
    pub max_aspect_ratio: f32,
    pub min_aspect_ratio: f32,
    pub has_max_aspect_ratio: bool,
    pub has_min_aspect_ratio: bool,
    pub lock_task_launch_mode: i32,
    pub color_mode: i32,
    pub rotation_animation: i32,
    pub requested_vr_component: Option<String>,
    pub window_layout: Option<WindowLayout>,
}

impl ActivityInfo {
    /// Records an aspect ratio limit unless the activity can take any shape.
    /// Values below 1.0, other than 0, are ignored.
    pub fn set_max_aspect_ratio(&mut self, ratio: f32) {
        if self.accepts_aspect_ratio(ratio) {
            self.max_aspect_ratio = ratio;
            self.has_max_aspect_ratio = true;
        }
    }

    pub fn set_min_aspect_ratio(&mut self, ratio: f32) {
        if self.accepts_aspect_ratio(ratio) {
            self.min_aspect_ratio = ratio;
            self.has_min_aspect_ratio = true;
        }
    }

    fn accepts_aspect_ratio(&self, ratio: f32) -> bool {
        let resizeable = matches!(
            self.resize_mode,
            ResizeMode::Resizeable | ResizeMode::ResizeableViaSdkVersion
        );
        !resizeable && (ratio >= 1.0 || ratio == 0.0)
    }
}

impl Default for ActivityInfo {
    fn default() -> Self {
        ActivityInfo {
            theme: 0,
            ui_options: 0,
            parent_activity_name: None,
            permission: None,
            task_affinity: None,
            target_activity: None,
            flags: ActivityFlags::empty(),
            launch_mode: 0,
            document_launch_mode: 0,
            persistable_mode: 0,
            max_recents: 0,
            config_changes: ConfigChanges::empty(),
            soft_input_mode: 0,
            screen_orientation: screen_orientation::UNSPECIFIED,
            resize_mode: ResizeMode::Resizeable,
            max_aspect_ratio: 0.0,
            min_aspect_ratio: 0.0,
            has_max_aspect_ratio: false,
            has_min_aspect_ratio: false,
            lock_task_launch_mode: 0,
            color_mode: 0,
            rotation_animation: -1,
            requested_vr_component: None,
            window_layout: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub permission: Option<String>,
    pub flags: ServiceFlags,
    pub foreground_service_type: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPermission {
    pub pattern: PatternMatcher,
    pub read_permission: Option<String>,
    pub write_permission: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// `;`-separated authority list as declared.
    pub authority: String,
    pub read_permission: Option<String>,
    pub write_permission: Option<String>,
    pub grant_uri_permissions: bool,
    pub uri_permission_patterns: Vec<PatternMatcher>,
    pub path_permissions: Vec<PathPermission>,
    pub multiprocess: bool,
    pub init_order: i32,
    pub flags: ProviderFlags,
    pub syncable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub group: Option<String>,
    pub protection_level: ProtectionLevel,
    pub flags: PermissionFlags,
    pub background_permission: Option<String>,
    pub request_res: u32,
    /// Declared through `<permission-tree>`.
    pub tree: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionGroupInfo {
    pub request_detail_res: u32,
    pub background_request_res: u32,
    pub background_request_detail_res: u32,
    pub request_res: u32,
    pub flags: i32,
    pub priority: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentationInfo {
    pub target_package: String,
    pub target_processes: Option<String>,
    pub handle_profiling: bool,
    pub functional_test: bool,
}

pub type Activity = Component<ActivityInfo>;
pub type Service = Component<ServiceInfo>;
pub type Provider = Component<ProviderInfo>;
pub type Permission = Component<PermissionInfo>;
pub type PermissionGroup = Component<PermissionGroupInfo>;
pub type Instrumentation = Component<InstrumentationInfo>;
