//! Parser configuration and the platform callback capability.
//!
//! Everything the parser needs to know about the device it runs on is passed in
//! explicitly, so differently-configured parsers can coexist in one process.

use crate::sdk::version_codes;
use once_cell::sync::Lazy;
use std::path::Path;

/// One legacy permission that implies newer permissions below a target SDK.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPermission {
    pub split_permission: String,
    pub new_permissions: Vec<String>,
    pub target_sdk: i32,
}

impl SplitPermission {
    pub fn new(split: &str, new_permissions: &[&str], target_sdk: i32) -> Self {
        SplitPermission {
            split_permission: split.to_string(),
            new_permissions: new_permissions.iter().map(|p| p.to_string()).collect(),
            target_sdk,
        }
    }
}

static DEFAULT_SPLIT_PERMISSIONS: Lazy<Vec<SplitPermission>> = Lazy::new(|| {
    vec![
        SplitPermission::new(
            "android.permission.WRITE_EXTERNAL_STORAGE",
            &["android.permission.READ_EXTERNAL_STORAGE"],
            version_codes::JELLY_BEAN,
        ),
        SplitPermission::new(
            "android.permission.READ_CONTACTS",
            &["android.permission.READ_CALL_LOG"],
            version_codes::JELLY_BEAN,
        ),
        SplitPermission::new(
            "android.permission.WRITE_CONTACTS",
            &["android.permission.WRITE_CALL_LOG"],
            version_codes::JELLY_BEAN,
        ),
        SplitPermission::new(
            "android.permission.ACCESS_FINE_LOCATION",
            &["android.permission.ACCESS_BACKGROUND_LOCATION"],
            version_codes::Q,
        ),
        SplitPermission::new(
            "android.permission.ACCESS_COARSE_LOCATION",
            &["android.permission.ACCESS_BACKGROUND_LOCATION"],
            version_codes::Q,
        ),
        SplitPermission::new(
            "android.permission.READ_EXTERNAL_STORAGE",
            &["android.permission.ACCESS_MEDIA_LOCATION"],
            version_codes::Q,
        ),
        SplitPermission::new(
            "com.google.android.gms.permission.ACTIVITY_RECOGNITION",
            &["android.permission.ACTIVITY_RECOGNITION"],
            version_codes::Q,
        ),
    ]
});

/// Construction-time parser settings.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    pub platform_sdk_version: i32,
    pub platform_codenames: Vec<String>,
    /// Treat unknown or malformed constructs as hard failures.
    pub rigid: bool,
    pub compatibility_mode_enabled: bool,
    pub use_round_icon: bool,
    pub only_core_apps: bool,
    /// Process names that force single-process mode when declared.
    pub separate_processes: Vec<String>,
    pub default_recents_limit: i32,
    pub split_permissions: Vec<SplitPermission>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            platform_sdk_version: version_codes::Q,
            platform_codenames: Vec::new(),
            rigid: false,
            compatibility_mode_enabled: true,
            use_round_icon: false,
            only_core_apps: false,
            separate_processes: Vec::new(),
            default_recents_limit: 16,
            split_permissions: DEFAULT_SPLIT_PERMISSIONS.clone(),
        }
    }
}

impl ParserConfig {
    pub fn with_platform_sdk(mut self, version: i32, codenames: &[&str]) -> Self {
        self.platform_sdk_version = version;
        self.platform_codenames = codenames.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_rigid(mut self, rigid: bool) -> Self {
        self.rigid = rigid;
        self
    }

    pub fn with_compatibility_mode(mut self, enabled: bool) -> Self {
        self.compatibility_mode_enabled = enabled;
        self
    }

    pub fn with_round_icon(mut self, use_round_icon: bool) -> Self {
        self.use_round_icon = use_round_icon;
        self
    }

    pub fn with_only_core_apps(mut self, only_core_apps: bool) -> Self {
        self.only_core_apps = only_core_apps;
        self
    }

    pub fn with_separate_processes(mut self, processes: &[&str]) -> Self {
        self.separate_processes = processes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_split_permissions(mut self, split_permissions: Vec<SplitPermission>) -> Self {
        self.split_permissions = split_permissions;
        self
    }
}

/// Platform queries the parser makes while interpreting a manifest.
pub trait Callback {
    fn has_feature(&self, feature: &str) -> bool;

    fn get_overlay_paths(&self, _target_package: &str, _target_path: &Path) -> Vec<String> {
        Vec::new()
    }

    fn get_overlay_apks(&self, _target_package: &str) -> Vec<String> {
        Vec::new()
    }
}

/// A callback backed by a fixed feature list.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    features: Vec<String>,
}

impl FeatureSet {
    pub fn new(features: &[&str]) -> Self {
        FeatureSet {
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Callback for FeatureSet {
    fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}
