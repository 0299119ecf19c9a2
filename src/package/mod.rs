//! The parsed package descriptor and the records it aggregates.

pub mod components;
pub mod intent;

pub use components::{
    Activity, ActivityInfo, Bundle, Component, ComponentBase, Instrumentation,
    InstrumentationInfo, MetaValue, Permission, PermissionGroup, PermissionGroupInfo,
    PermissionInfo, Provider, ProviderInfo, ResizeMode, Service, ServiceInfo, WindowLayout,
};
pub use intent::{IntentFilterKind, IntentInfo, PatternKind, PatternMatcher};

use crate::flags::{ApplicationFlags, PrivateFlags};
use crate::signing::{PublicKey, SigningDetails};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const INSTALL_LOCATION_UNSPECIFIED: i32 = -1;
pub const CATEGORY_UNDEFINED: i32 = -1;

/// Application-wide attributes from `<application>` and the manifest root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub class_name: Option<String>,
    pub label_res: u32,
    pub non_localized_label: Option<String>,
    pub icon: u32,
    pub logo: u32,
    pub banner: u32,
    pub description_res: u32,
    pub theme: u32,
    pub flags: ApplicationFlags,
    pub private_flags: PrivateFlags,
    pub process_name: String,
    pub task_affinity: Option<String>,
    pub permission: Option<String>,
    pub manage_space_activity_name: Option<String>,
    pub backup_agent_name: Option<String>,
    /// Resource id, or `-1` for "false" and `0` for "true".
    pub full_backup_content: i32,
    pub ui_options: i32,
    pub max_aspect_ratio: f32,
    pub min_aspect_ratio: f32,
    pub network_security_config_res: u32,
    pub category: i32,
    pub app_component_factory: Option<String>,
    pub class_loader_name: Option<String>,
    pub zygote_preload_name: Option<String>,
    pub enabled: bool,
    pub requires_smallest_width_dp: i32,
    pub compatible_width_limit_dp: i32,
    pub largest_width_limit_dp: i32,
    pub install_location: i32,
    pub target_sandbox_version: i32,
    pub min_sdk_version: i32,
    pub target_sdk_version: i32,
    pub compile_sdk_version: i32,
    pub compile_sdk_version_codename: Option<String>,
}

impl ApplicationInfo {
    fn new(package_name: &str) -> Self {
        ApplicationInfo {
            class_name: None,
            label_res: 0,
            non_localized_label: None,
            icon: 0,
            logo: 0,
            banner: 0,
            description_res: 0,
            theme: 0,
            flags: ApplicationFlags::empty(),
            private_flags: PrivateFlags::empty(),
            process_name: package_name.to_string(),
            task_affinity: None,
            permission: None,
            manage_space_activity_name: None,
            backup_agent_name: None,
            full_backup_content: 0,
            ui_options: 0,
            max_aspect_ratio: 0.0,
            min_aspect_ratio: 0.0,
            network_security_config_res: 0,
            category: CATEGORY_UNDEFINED,
            app_component_factory: None,
            class_loader_name: None,
            zygote_preload_name: None,
            enabled: true,
            requires_smallest_width_dp: 0,
            compatible_width_limit_dp: 0,
            largest_width_limit_dp: 0,
            install_location: INSTALL_LOCATION_UNSPECIFIED,
            target_sandbox_version: 1,
            min_sdk_version: 1,
            target_sdk_version: 0,
            compile_sdk_version: 0,
            compile_sdk_version_codename: None,
        }
    }

    pub fn is_direct_boot_aware(&self) -> bool {
        self.private_flags.contains(PrivateFlags::DIRECT_BOOT_AWARE)
    }

    pub fn cant_save_state(&self) -> bool {
        self.private_flags.contains(PrivateFlags::CANT_SAVE_STATE)
    }

    /// Whether the package runs in screen compatibility mode.
    pub fn uses_compatibility_mode(&self) -> bool {
        self.target_sdk_version < crate::sdk::version_codes::DONUT
            || !self.flags.intersects(ApplicationFlags::ALL_SCREEN_SUPPORT)
    }
}

/// Hardware configuration requested through `<uses-configuration>` or a GLES
/// `<uses-feature>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationInfo {
    pub req_touch_screen: i32,
    pub req_keyboard_type: i32,
    pub req_navigation: i32,
    pub req_input_features: i32,
    pub req_gles_version: i32,
}

impl ConfigurationInfo {
    pub const INPUT_FEATURE_HARD_KEYBOARD: i32 = 0x1;
    pub const INPUT_FEATURE_FIVE_WAY_NAV: i32 = 0x2;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// `None` for a GLES version requirement.
    pub name: Option<String>,
    pub version: i32,
    pub req_gles_version: i32,
    pub required: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroupInfo {
    pub features: Vec<FeatureInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSharedLibrary {
    pub name: String,
    pub version: i64,
}

/// A `<uses-static-library>` dependency. Digests are lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticLibraryDependency {
    pub name: String,
    pub version: i64,
    pub cert_digests: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayInfo {
    pub target: String,
    pub target_name: Option<String>,
    pub category: Option<String>,
    pub priority: i32,
    pub is_static: bool,
}

/// A named split folded into the package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDetails {
    pub name: String,
    pub code_path: String,
    pub revision_code: i32,
    pub is_feature: bool,
    pub config_for_split: Option<String>,
    pub uses_split_name: Option<String>,
    pub flags: ApplicationFlags,
    pub class_loader_name: Option<String>,
}

/// Dependency graph of isolated splits. Index 0 is the base, split `i` of
/// [`PackageDescriptor::splits`] is index `i + 1`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDependencies {
    pub nodes: BTreeMap<usize, SplitNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitNode {
    pub parent: Option<usize>,
    pub config_splits: Vec<usize>,
}

/// Number of components of each kind, used to find the ones a split added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComponentCounts {
    pub activities: usize,
    pub receivers: usize,
    pub services: usize,
    pub providers: usize,
}

/// The fully resolved result of parsing a package.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub package_name: String,
    pub version_code: i32,
    pub version_code_major: i32,
    pub version_name: Option<String>,
    pub base_revision_code: i32,
    pub shared_user_id: Option<String>,
    pub shared_user_label: u32,
    pub core_app: bool,
    pub code_path: Option<String>,
    pub base_code_path: Option<String>,
    pub splits: Vec<SplitDetails>,
    pub split_dependencies: Option<SplitDependencies>,
    pub use_32bit_abi: bool,
    pub base_hardware_accelerated: bool,
    pub application: ApplicationInfo,
    pub app_meta_data: Bundle,

    pub activities: Vec<Activity>,
    pub receivers: Vec<Activity>,
    pub services: Vec<Service>,
    pub providers: Vec<Provider>,
    pub permissions: Vec<Permission>,
    pub permission_groups: Vec<PermissionGroup>,
    pub instrumentation: Vec<Instrumentation>,

    pub requested_permissions: Vec<String>,
    /// Permissions added for compatibility rather than declared.
    pub implicit_permissions: Vec<String>,
    pub protected_broadcasts: Vec<String>,
    pub original_packages: Vec<String>,
    pub real_package: Option<String>,
    pub adopt_permissions: Vec<String>,

    pub library_names: Vec<String>,
    pub uses_libraries: Vec<String>,
    pub uses_optional_libraries: Vec<String>,
    pub uses_static_libraries: Vec<StaticLibraryDependency>,
    pub static_shared_library: Option<StaticSharedLibrary>,

    pub config_preferences: Vec<ConfigurationInfo>,
    pub req_features: Vec<FeatureInfo>,
    pub feature_groups: Vec<FeatureGroupInfo>,
    pub preferred_activity_filters: Vec<IntentInfo>,

    pub key_set_mapping: BTreeMap<String, BTreeSet<PublicKey>>,
    pub upgrade_key_sets: BTreeSet<String>,

    pub overlay: Option<OverlayInfo>,
    pub restrict_update_hash: Option<Vec<u8>>,
    pub visible_to_instant_apps: bool,
    pub signing_details: SigningDetails,

    pub child_packages: Vec<PackageDescriptor>,
    pub parent_package_name: Option<String>,
}

impl PackageDescriptor {
    pub fn new(package_name: &str) -> Self {
        PackageDescriptor {
            package_name: package_name.to_string(),
            version_code: 0,
            version_code_major: 0,
            version_name: None,
            base_revision_code: 0,
            shared_user_id: None,
            shared_user_label: 0,
            core_app: false,
            code_path: None,
            base_code_path: None,
            splits: Vec::new(),
            split_dependencies: None,
            use_32bit_abi: false,
            base_hardware_accelerated: false,
            application: ApplicationInfo::new(package_name),
            app_meta_data: Bundle::new(),
            activities: Vec::new(),
            receivers: Vec::new(),
            services: Vec::new(),
            providers: Vec::new(),
            permissions: Vec::new(),
            permission_groups: Vec::new(),
            instrumentation: Vec::new(),
            requested_permissions: Vec::new(),
            implicit_permissions: Vec::new(),
            protected_broadcasts: Vec::new(),
            original_packages: Vec::new(),
            real_package: None,
            adopt_permissions: Vec::new(),
            library_names: Vec::new(),
            uses_libraries: Vec::new(),
            uses_optional_libraries: Vec::new(),
            uses_static_libraries: Vec::new(),
            static_shared_library: None,
            config_preferences: Vec::new(),
            req_features: Vec::new(),
            feature_groups: Vec::new(),
            preferred_activity_filters: Vec::new(),
            key_set_mapping: BTreeMap::new(),
            upgrade_key_sets: BTreeSet::new(),
            overlay: None,
            restrict_update_hash: None,
            visible_to_instant_apps: false,
            signing_details: SigningDetails::UNKNOWN,
            child_packages: Vec::new(),
            parent_package_name: None,
        }
    }

    /// `versionCodeMajor` in the high word, `versionCode` in the low word.
    pub fn long_version_code(&self) -> i64 {
        compose_long_version_code(self.version_code_major, self.version_code)
    }

    pub fn split_names(&self) -> Vec<&str> {
        self.splits.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn split_code_paths(&self) -> Vec<&str> {
        self.splits.iter().map(|s| s.code_path.as_str()).collect()
    }

    pub fn has_child_package(&self, name: &str) -> bool {
        self.child_packages.iter().any(|c| c.package_name == name)
    }

    pub fn is_static_shared_library(&self) -> bool {
        self.static_shared_library.is_some()
    }

    pub fn is_requested_permission(&self, name: &str) -> bool {
        self.requested_permissions.iter().any(|p| p == name)
    }

    pub fn component_counts(&self) -> ComponentCounts {
        ComponentCounts {
            activities: self.activities.len(),
            receivers: self.receivers.len(),
            services: self.services.len(),
            providers: self.providers.len(),
        }
    }

    /// Assigns `split_name` to components added since `since` that did not
    /// declare a split of their own.
    pub fn tag_split_components(&mut self, since: ComponentCounts, split_name: &str) {
        fn tag<I>(list: &mut [Component<I>], split_name: &str) {
            for component in list {
                if component.base.split_name.is_none() {
                    component.base.split_name = Some(split_name.to_string());
                }
            }
        }
        tag(&mut self.activities[since.activities..], split_name);
        tag(&mut self.receivers[since.receivers..], split_name);
        tag(&mut self.services[since.services..], split_name);
        tag(&mut self.providers[since.providers..], split_name);
    }

    pub fn set_code_path(&mut self, path: &str) {
        self.code_path = Some(path.to_string());
        for child in &mut self.child_packages {
            child.set_code_path(path);
        }
    }

    pub fn set_base_code_path(&mut self, path: &str) {
        self.base_code_path = Some(path.to_string());
        for child in &mut self.child_packages {
            child.set_base_code_path(path);
        }
    }

    /// Re-homes split files, by position. Children share the parent's splits.
    pub fn set_split_code_paths(&mut self, paths: &[String]) {
        for (split, path) in self.splits.iter_mut().zip(paths) {
            split.code_path = path.clone();
        }
        for child in &mut self.child_packages {
            child.splits = self.splits.clone();
        }
    }

    pub fn set_signing_details(&mut self, details: SigningDetails) {
        for child in &mut self.child_packages {
            child.set_signing_details(details.clone());
        }
        self.signing_details = details;
    }

    pub fn set_use_32bit_abi(&mut self, use_32bit_abi: bool) {
        self.use_32bit_abi = use_32bit_abi;
        for child in &mut self.child_packages {
            child.use_32bit_abi = use_32bit_abi;
        }
    }
}

pub fn compose_long_version_code(major: i32, minor: i32) -> i64 {
    ((major as i64) << 32) | (minor as u32 as i64)
}
