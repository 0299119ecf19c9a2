use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// Caller-supplied parse options. They compose by OR; no flag implies another.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ParseFlags: u32 {
        const MUST_BE_SINGLE_FILE = 1 << 0;
        const IGNORE_PROCESSES = 1 << 1;
        const EXTERNAL_STORAGE = 1 << 3;
        const TRUSTED_SYSTEM_LOCATION = 1 << 4;
        const COLLECT_CERTIFICATES = 1 << 5;
        const ENFORCE_CODE = 1 << 6;
        const VERBOSE = 1 << 31;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ApplicationFlags: u32 {
        const SYSTEM = 1 << 0;
        const DEBUGGABLE = 1 << 1;
        const HAS_CODE = 1 << 2;
        const PERSISTENT = 1 << 3;
        const FACTORY_TEST = 1 << 4;
        const ALLOW_TASK_REPARENTING = 1 << 5;
        const ALLOW_CLEAR_USER_DATA = 1 << 6;
        const TEST_ONLY = 1 << 8;
        const SUPPORTS_SMALL_SCREENS = 1 << 9;
        const SUPPORTS_NORMAL_SCREENS = 1 << 10;
        const SUPPORTS_LARGE_SCREENS = 1 << 11;
        const RESIZEABLE_FOR_SCREENS = 1 << 12;
        const SUPPORTS_SCREEN_DENSITIES = 1 << 13;
        const VM_SAFE_MODE = 1 << 14;
        const ALLOW_BACKUP = 1 << 15;
        const KILL_AFTER_RESTORE = 1 << 16;
        const RESTORE_ANY_VERSION = 1 << 17;
        const EXTERNAL_STORAGE = 1 << 18;
        const SUPPORTS_XLARGE_SCREENS = 1 << 19;
        const LARGE_HEAP = 1 << 20;
        const SUPPORTS_RTL = 1 << 22;
        const IS_GAME = 1 << 25;
        const FULL_BACKUP_ONLY = 1 << 26;
        const USES_CLEARTEXT_TRAFFIC = 1 << 27;
        const EXTRACT_NATIVE_LIBS = 1 << 28;
        const HARDWARE_ACCELERATED = 1 << 29;
        const MULTIARCH = 1 << 31;

        const ALL_SCREEN_SUPPORT = Self::SUPPORTS_SMALL_SCREENS.bits()
            | Self::SUPPORTS_NORMAL_SCREENS.bits()
            | Self::SUPPORTS_LARGE_SCREENS.bits()
            | Self::SUPPORTS_XLARGE_SCREENS.bits()
            | Self::RESIZEABLE_FOR_SCREENS.bits()
            | Self::SUPPORTS_SCREEN_DENSITIES.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PrivateFlags: u32 {
        const CANT_SAVE_STATE = 1 << 1;
        const HAS_DOMAIN_URLS = 1 << 4;
        const DEFAULT_TO_DEVICE_PROTECTED_STORAGE = 1 << 5;
        const DIRECT_BOOT_AWARE = 1 << 6;
        const PARTIALLY_DIRECT_BOOT_AWARE = 1 << 8;
        const ACTIVITIES_RESIZE_MODE_RESIZEABLE = 1 << 10;
        const ACTIVITIES_RESIZE_MODE_UNRESIZEABLE = 1 << 11;
        const ACTIVITIES_RESIZE_MODE_RESIZEABLE_VIA_SDK_VERSION = 1 << 12;
        const BACKUP_IN_FOREGROUND = 1 << 13;
        const STATIC_SHARED_LIBRARY = 1 << 14;
        const ISOLATED_SPLIT_LOADING = 1 << 15;
        const USES_NON_SDK_API = 1 << 22;
        const PROFILEABLE_BY_SHELL = 1 << 23;
        const USE_EMBEDDED_DEX = 1 << 25;
        const ALLOW_AUDIO_PLAYBACK_CAPTURE = 1 << 27;
        const REQUEST_LEGACY_EXTERNAL_STORAGE = 1 << 29;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ActivityFlags: u32 {
        const MULTIPROCESS = 1 << 0;
        const FINISH_ON_TASK_LAUNCH = 1 << 1;
        const CLEAR_TASK_ON_LAUNCH = 1 << 2;
        const ALWAYS_RETAIN_TASK_STATE = 1 << 3;
        const STATE_NOT_NEEDED = 1 << 4;
        const EXCLUDE_FROM_RECENTS = 1 << 5;
        const ALLOW_TASK_REPARENTING = 1 << 6;
        const NO_HISTORY = 1 << 7;
        const FINISH_ON_CLOSE_SYSTEM_DIALOGS = 1 << 8;
        const HARDWARE_ACCELERATED = 1 << 9;
        const SHOW_FOR_ALL_USERS = 1 << 10;
        const IMMERSIVE = 1 << 11;
        const RELINQUISH_TASK_IDENTITY = 1 << 12;
        const AUTO_REMOVE_FROM_RECENTS = 1 << 13;
        const RESUME_WHILE_PAUSING = 1 << 14;
        const ENABLE_VR_MODE = 1 << 15;
        const ALWAYS_FOCUSABLE = 1 << 18;
        const VISIBLE_TO_INSTANT_APP = 1 << 20;
        const IMPLICITLY_VISIBLE_TO_INSTANT_APP = 1 << 21;
        const SUPPORTS_PICTURE_IN_PICTURE = 1 << 22;
        const SHOW_WHEN_LOCKED = 1 << 23;
        const TURN_SCREEN_ON = 1 << 24;
        const SYSTEM_USER_ONLY = 1 << 29;
        const SINGLE_USER = 1 << 30;
        const ALLOW_EMBEDDED = 1 << 31;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ServiceFlags: u32 {
        const STOP_WITH_TASK = 1 << 0;
        const ISOLATED_PROCESS = 1 << 1;
        const EXTERNAL_SERVICE = 1 << 2;
        const USE_APP_ZYGOTE = 1 << 3;
        const VISIBLE_TO_INSTANT_APP = 1 << 20;
        const SINGLE_USER = 1 << 30;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ProviderFlags: u32 {
        const VISIBLE_TO_INSTANT_APP = 1 << 20;
        const SINGLE_USER = 1 << 30;
    }
}

bitflags! {
    /// Permission protection level: a base type in the low nibble plus modifier flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ProtectionLevel: u32 {
        const DANGEROUS = 0x1;
        const SIGNATURE = 0x2;
        const SIGNATURE_OR_SYSTEM = 0x3;
        const MASK_BASE = 0xf;

        const PRIVILEGED = 0x10;
        const DEVELOPMENT = 0x20;
        const APPOP = 0x40;
        const PRE23 = 0x80;
        const INSTALLER = 0x100;
        const VERIFIER = 0x200;
        const PREINSTALLED = 0x400;
        const SETUP = 0x800;
        const INSTANT = 0x1000;
        const RUNTIME_ONLY = 0x2000;
        const OEM = 0x4000;
        const VENDOR_PRIVILEGED = 0x8000;
        const SYSTEM_TEXT_CLASSIFIER = 0x10000;
        const WELLBEING = 0x20000;
        const DOCUMENTER = 0x40000;
        const CONFIGURATOR = 0x80000;
        const INCIDENT_REPORT_APPROVER = 0x100000;
        const APP_PREDICTOR = 0x200000;
    }
}

/// Base protection type, the low nibble of a [`ProtectionLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionBase {
    Normal,
    Dangerous,
    Signature,
    SignatureOrSystem,
    Other(u32),
}

impl ProtectionLevel {
    pub fn base(self) -> ProtectionBase {
        match self.bits() & Self::MASK_BASE.bits() {
            0 => ProtectionBase::Normal,
            1 => ProtectionBase::Dangerous,
            2 => ProtectionBase::Signature,
            3 => ProtectionBase::SignatureOrSystem,
            other => ProtectionBase::Other(other),
        }
    }

    /// Modifier bits with the base type masked off.
    pub fn modifiers(self) -> ProtectionLevel {
        ProtectionLevel::from_bits_retain(self.bits() & !Self::MASK_BASE.bits())
    }

    /// Rewrites deprecated and meaningless combinations.
    ///
    /// `signatureOrSystem` becomes `signature|privileged`, and `vendorPrivileged`
    /// without `privileged` is dropped.
    pub fn fixed(self) -> ProtectionLevel {
        let mut level = self;
        if level.bits() == Self::SIGNATURE_OR_SYSTEM.bits() {
            level = Self::SIGNATURE | Self::PRIVILEGED;
        }
        if level.contains(Self::VENDOR_PRIVILEGED) && !level.contains(Self::PRIVILEGED) {
            level.remove(Self::VENDOR_PRIVILEGED);
        }
        level
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PermissionFlags: u32 {
        const COSTS_MONEY = 1 << 0;
        const REMOVED = 1 << 1;
        const HARD_RESTRICTED = 1 << 2;
        const SOFT_RESTRICTED = 1 << 3;
        const IMMUTABLY_RESTRICTED = 1 << 4;
    }
}

bitflags! {
    /// Capabilities a past signing certificate retains after rotation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CertCapabilities: u32 {
        const INSTALLED_DATA = 1 << 0;
        const SHARED_USER_ID = 1 << 1;
        const PERMISSION = 1 << 2;
        const ROLLBACK = 1 << 3;
        const AUTH = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ConfigChanges: u32 {
        const MCC = 0x1;
        const MNC = 0x2;
        const LOCALE = 0x4;
        const TOUCHSCREEN = 0x8;
        const KEYBOARD = 0x10;
        const KEYBOARD_HIDDEN = 0x20;
        const NAVIGATION = 0x40;
        const ORIENTATION = 0x80;
        const SCREEN_LAYOUT = 0x100;
        const UI_MODE = 0x200;
        const SCREEN_SIZE = 0x400;
        const SMALLEST_SCREEN_SIZE = 0x800;
        const DENSITY = 0x1000;
        const LAYOUT_DIRECTION = 0x2000;
        const COLOR_MODE = 0x4000;
        const FONT_SCALE = 0x4000_0000;
    }
}

impl ConfigChanges {
    /// Changes an activity must opt back into with `recreateOnConfigChanges`.
    pub const RECREATE_MASK: ConfigChanges = ConfigChanges::MCC.union(ConfigChanges::MNC);

    /// Folds `recreateOnConfigChanges` into the declared handled changes.
    pub fn for_activity(config_changes: u32, recreate_on: u32) -> ConfigChanges {
        let implicit = !recreate_on & Self::RECREATE_MASK.bits();
        ConfigChanges::from_bits_retain(config_changes | implicit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_or_system_is_rewritten() {
        let level = ProtectionLevel::SIGNATURE_OR_SYSTEM.fixed();
        assert_eq!(level, ProtectionLevel::SIGNATURE | ProtectionLevel::PRIVILEGED);
        assert_eq!(level.base(), ProtectionBase::Signature);
    }

    #[test]
    fn vendor_privileged_needs_privileged() {
        let alone = (ProtectionLevel::SIGNATURE | ProtectionLevel::VENDOR_PRIVILEGED).fixed();
        assert_eq!(alone, ProtectionLevel::SIGNATURE);
        let both = (ProtectionLevel::SIGNATURE
            | ProtectionLevel::PRIVILEGED
            | ProtectionLevel::VENDOR_PRIVILEGED)
            .fixed();
        assert!(both.contains(ProtectionLevel::VENDOR_PRIVILEGED));
    }

    #[test]
    fn recreate_mask_is_folded_in() {
        assert_eq!(
            ConfigChanges::for_activity(0, 0),
            ConfigChanges::MCC | ConfigChanges::MNC
        );
        assert_eq!(
            ConfigChanges::for_activity(0x80, 0x1),
            ConfigChanges::ORIENTATION | ConfigChanges::MNC
        );
    }
}
