//! Typed attribute access over a start tag, with resource indirection.
//!
//! The resource system itself lives outside this crate; it is reached through
//! [`ResourceResolver`]. Attribute values that are references are resolved on
//! access, and the "non-configuration" and "non-resource" accessors refuse
//! indirection that could change the value per device configuration.

use crate::android::xml::{ManifestAttribute, ManifestValue, StartTag};
use std::collections::{BTreeMap, BTreeSet};

/// A symbolic or compiled resource reference.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceRef {
    Id(u32),
    /// `type/name`, e.g. `string/app_name`.
    Named(String),
}

impl ResourceRef {
    pub fn from_value(value: &ManifestValue) -> Option<ResourceRef> {
        match value {
            ManifestValue::Reference(id) => Some(ResourceRef::Id(*id)),
            ManifestValue::NamedReference(name) => Some(ResourceRef::Named(name.clone())),
            _ => None,
        }
    }
}

/// Maps resource references to concrete values for the current configuration.
pub trait ResourceResolver {
    fn resolve(&self, reference: &ResourceRef) -> Option<ManifestValue>;

    fn resource_id(&self, reference: &ResourceRef) -> Option<u32> {
        match reference {
            ResourceRef::Id(id) => Some(*id),
            ResourceRef::Named(_) => None,
        }
    }

    /// Whether the referenced value differs across device configurations.
    fn varies_by_configuration(&self, _reference: &ResourceRef) -> bool {
        false
    }
}

/// A resolver that knows no resources.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn resolve(&self, _reference: &ResourceRef) -> Option<ManifestValue> {
        None
    }
}

#[derive(Clone, Debug)]
struct StaticEntry {
    id: Option<u32>,
    value: Option<ManifestValue>,
    configurable: bool,
}

/// A fixed resource table, keyed by reference.
#[derive(Clone, Debug, Default)]
pub struct StaticResources {
    entries: BTreeMap<ResourceRef, StaticEntry>,
}

impl StaticResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, reference: ResourceRef) -> &mut StaticEntry {
        self.entries.entry(reference).or_insert(StaticEntry {
            id: None,
            value: None,
            configurable: false,
        })
    }

    pub fn with_value(mut self, reference: ResourceRef, value: impl Into<ManifestValue>) -> Self {
        self.entry(reference).value = Some(value.into());
        self
    }

    pub fn with_id(mut self, name: &str, id: u32) -> Self {
        self.entry(ResourceRef::Named(name.to_string())).id = Some(id);
        self
    }

    pub fn with_configurable(mut self, reference: ResourceRef) -> Self {
        self.entry(reference).configurable = true;
        self
    }
}

impl ResourceResolver for StaticResources {
    fn resolve(&self, reference: &ResourceRef) -> Option<ManifestValue> {
        self.entries.get(reference).and_then(|e| e.value.clone())
    }

    fn resource_id(&self, reference: &ResourceRef) -> Option<u32> {
        match reference {
            ResourceRef::Id(id) => Some(*id),
            named => self.entries.get(named).and_then(|e| e.id),
        }
    }

    fn varies_by_configuration(&self, reference: &ResourceRef) -> bool {
        self.entries
            .get(reference)
            .map(|e| e.configurable)
            .unwrap_or(false)
    }
}

/// A symbolic value table for enum and flag attributes.
pub type SymbolTable = &'static [(&'static str, i32)];

/// Typed view over the `android:` attributes of one tag.
pub struct TypedAttributes<'a> {
    tag: &'a StartTag,
    resources: &'a dyn ResourceResolver,
}

impl<'a> TypedAttributes<'a> {
    pub fn new(tag: &'a StartTag, resources: &'a dyn ResourceResolver) -> Self {
        TypedAttributes { tag, resources }
    }

    pub fn tag(&self) -> &'a StartTag {
        self.tag
    }

    fn find(&self, name: &str) -> Option<&'a ManifestAttribute> {
        self.tag.android_attr(name)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// The declared value without resolving references.
    pub fn peek(&self, name: &str) -> Option<&'a ManifestValue> {
        self.find(name).map(|attr| &attr.value)
    }

    /// The value with one level of resource indirection followed.
    pub fn resolved(&self, name: &str) -> Option<ManifestValue> {
        let value = self.peek(name)?;
        match ResourceRef::from_value(value) {
            Some(reference) => self.resources.resolve(&reference),
            None => Some(value.clone()),
        }
    }

    fn literal_string(attr: &ManifestAttribute) -> String {
        match (&attr.value, &attr.raw_value) {
            (ManifestValue::String(value), _) => value.clone(),
            (_, Some(raw)) => raw.clone(),
            (value, None) => value.coerce_to_string(),
        }
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        let attr = self.find(name)?;
        match ResourceRef::from_value(&attr.value) {
            Some(reference) => self
                .resources
                .resolve(&reference)
                .map(|value| value.coerce_to_string()),
            None => Some(Self::literal_string(attr)),
        }
    }

    /// A string that may come from a resource only if that resource is the
    /// same in every configuration.
    pub fn get_non_configuration_string(&self, name: &str) -> Option<String> {
        let attr = self.find(name)?;
        match ResourceRef::from_value(&attr.value) {
            Some(reference) => {
                if self.resources.varies_by_configuration(&reference) {
                    return None;
                }
                self.resources
                    .resolve(&reference)
                    .map(|value| value.coerce_to_string())
            }
            None => Some(Self::literal_string(attr)),
        }
    }

    /// A literal string; resource references are rejected.
    pub fn get_non_resource_string(&self, name: &str) -> Option<String> {
        let attr = self.find(name)?;
        if attr.value.is_reference() {
            return None;
        }
        Some(Self::literal_string(attr))
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.resolved(name) {
            Some(ManifestValue::Boolean(value)) => value,
            Some(ManifestValue::Integer(value)) => value != 0,
            Some(ManifestValue::Hex(value)) => value != 0,
            Some(ManifestValue::String(value)) => match value.trim() {
                "true" => true,
                "false" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        match self.resolved(name) {
            Some(value) => value_as_int(&value).unwrap_or(default),
            None => default,
        }
    }

    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        match self.resolved(name) {
            Some(ManifestValue::Float(value)) => value,
            Some(ManifestValue::Integer(value)) => value as f32,
            Some(ManifestValue::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// The value only when it is declared as a float.
    pub fn float_if_typed(&self, name: &str) -> Option<f32> {
        match self.resolved(name) {
            Some(ManifestValue::Float(value)) => Some(value),
            _ => None,
        }
    }

    /// The id of a referenced resource, or `default` for literal values.
    pub fn get_resource_id(&self, name: &str, default: u32) -> u32 {
        self.peek(name)
            .and_then(ResourceRef::from_value)
            .and_then(|reference| self.resources.resource_id(&reference))
            .unwrap_or(default)
    }

    /// An enum attribute declared either numerically or by symbol name.
    pub fn get_enum(&self, name: &str, table: SymbolTable, default: i32) -> i32 {
        match self.resolved(name) {
            Some(ManifestValue::String(symbol)) => lookup_symbol(table, symbol.trim())
                .or_else(|| parse_int(&symbol))
                .unwrap_or(default),
            Some(value) => value_as_int(&value).unwrap_or(default),
            None => default,
        }
    }

    /// A flag attribute; symbolic values may be combined with `|`.
    pub fn get_flags(&self, name: &str, table: SymbolTable, default: i32) -> i32 {
        match self.resolved(name) {
            Some(ManifestValue::String(symbols)) => {
                let mut bits = 0;
                for symbol in symbols.split('|').map(str::trim).filter(|s| !s.is_empty()) {
                    match lookup_symbol(table, symbol).or_else(|| parse_int(symbol)) {
                        Some(value) => bits |= value,
                        None => {
                            log::warn!("unknown flag value '{}' for {}", symbol, name);
                        }
                    }
                }
                bits
            }
            Some(value) => value_as_int(&value).unwrap_or(default),
            None => default,
        }
    }
}

fn lookup_symbol(table: SymbolTable, symbol: &str) -> Option<i32> {
    table
        .iter()
        .find(|(name, _)| *name == symbol)
        .map(|(_, value)| *value)
}

fn parse_int(text: &str) -> Option<i32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|v| v as i32),
        None => text.parse().ok(),
    }
}

fn value_as_int(value: &ManifestValue) -> Option<i32> {
    match value {
        ManifestValue::Integer(value) => Some(*value as i32),
        ManifestValue::Hex(value) => Some(*value as i32),
        ManifestValue::Boolean(value) => Some(i32::from(*value)),
        ManifestValue::String(value) => parse_int(value),
        _ => None,
    }
}

/// Symbol tables for enum and flag attributes of the manifest schema.
pub mod tables {
    use super::SymbolTable;

    pub const LAUNCH_MODE: SymbolTable = &[
        ("standard", 0),
        ("singleTop", 1),
        ("singleTask", 2),
        ("singleInstance", 3),
    ];

    pub const SCREEN_ORIENTATION: SymbolTable = &[
        ("unspecified", -1),
        ("landscape", 0),
        ("portrait", 1),
        ("user", 2),
        ("behind", 3),
        ("sensor", 4),
        ("nosensor", 5),
        ("sensorLandscape", 6),
        ("sensorPortrait", 7),
        ("reverseLandscape", 8),
        ("reversePortrait", 9),
        ("fullSensor", 10),
        ("userLandscape", 11),
        ("userPortrait", 12),
        ("fullUser", 13),
        ("locked", 14),
    ];

    pub const CONFIG_CHANGES: SymbolTable = &[
        ("mcc", 0x1),
        ("mnc", 0x2),
        ("locale", 0x4),
        ("touchscreen", 0x8),
        ("keyboard", 0x10),
        ("keyboardHidden", 0x20),
        ("navigation", 0x40),
        ("orientation", 0x80),
        ("screenLayout", 0x100),
        ("uiMode", 0x200),
        ("screenSize", 0x400),
        ("smallestScreenSize", 0x800),
        ("density", 0x1000),
        ("layoutDirection", 0x2000),
        ("colorMode", 0x4000),
        ("fontScale", 0x4000_0000),
    ];

    pub const PROTECTION_LEVEL: SymbolTable = &[
        ("normal", 0),
        ("dangerous", 1),
        ("signature", 2),
        ("signatureOrSystem", 3),
        ("privileged", 0x10),
        ("system", 0x10),
        ("development", 0x20),
        ("appop", 0x40),
        ("pre23", 0x80),
        ("installer", 0x100),
        ("verifier", 0x200),
        ("preinstalled", 0x400),
        ("setup", 0x800),
        ("instant", 0x1000),
        ("ephemeral", 0x1000),
        ("runtime", 0x2000),
        ("oem", 0x4000),
        ("vendorPrivileged", 0x8000),
        ("textClassifier", 0x10000),
        ("wellbeing", 0x20000),
        ("documenter", 0x40000),
        ("configurator", 0x80000),
        ("incidentReportApprover", 0x100000),
        ("appPredictor", 0x200000),
    ];

    pub const PERMISSION_FLAGS: SymbolTable = &[
        ("costsMoney", 0x1),
        ("removed", 0x2),
        ("hardRestricted", 0x4),
        ("softRestricted", 0x8),
        ("immutablyRestricted", 0x10),
    ];

    pub const INSTALL_LOCATION: SymbolTable = &[
        ("auto", 0),
        ("internalOnly", 1),
        ("preferExternal", 2),
    ];

    pub const DOCUMENT_LAUNCH_MODE: SymbolTable = &[
        ("none", 0),
        ("intoExisting", 1),
        ("always", 2),
        ("never", 3),
    ];

    pub const PERSISTABLE_MODE: SymbolTable = &[
        ("persistRootOnly", 0),
        ("persistNever", 1),
        ("persistAcrossReboots", 2),
    ];

    pub const LOCK_TASK_MODE: SymbolTable = &[
        ("normal", 0),
        ("never", 1),
        ("always", 2),
        ("if_whitelisted", 3),
    ];

    pub const SOFT_INPUT_MODE: SymbolTable = &[
        ("stateUnspecified", 0),
        ("stateUnchanged", 1),
        ("stateHidden", 2),
        ("stateAlwaysHidden", 3),
        ("stateVisible", 4),
        ("stateAlwaysVisible", 5),
        ("adjustUnspecified", 0x00),
        ("adjustResize", 0x10),
        ("adjustPan", 0x20),
        ("adjustNothing", 0x30),
    ];

    pub const UI_OPTIONS: SymbolTable = &[("none", 0), ("splitActionBarWhenNarrow", 1)];

    pub const COLOR_MODE: SymbolTable = &[("default", 0), ("wideColorGamut", 1), ("hdr", 2)];

    pub const ROTATION_ANIMATION: SymbolTable = &[
        ("rotate", 0),
        ("crossfade", 1),
        ("jumpcut", 2),
        ("seamless", 3),
    ];

    pub const FOREGROUND_SERVICE_TYPE: SymbolTable = &[
        ("dataSync", 0x1),
        ("mediaPlayback", 0x2),
        ("phoneCall", 0x4),
        ("location", 0x8),
        ("connectedDevice", 0x10),
        ("mediaProjection", 0x20),
    ];

    pub const REQ_TOUCH_SCREEN: SymbolTable = &[
        ("undefined", 0),
        ("notouch", 1),
        ("stylus", 2),
        ("finger", 3),
    ];

    pub const REQ_KEYBOARD_TYPE: SymbolTable = &[
        ("undefined", 0),
        ("nokeys", 1),
        ("qwerty", 2),
        ("twelvekey", 3),
    ];

    pub const REQ_NAVIGATION: SymbolTable = &[
        ("undefined", 0),
        ("nonav", 1),
        ("dpad", 2),
        ("trackball", 3),
        ("wheel", 4),
    ];

    pub const GRAVITY: SymbolTable = &[
        ("top", 0x30),
        ("bottom", 0x50),
        ("left", 0x03),
        ("right", 0x05),
        ("center_vertical", 0x10),
        ("center_horizontal", 0x01),
        ("center", 0x11),
        ("start", 0x0080_0003),
        ("end", 0x0080_0005),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ManifestDocument;

    fn tag(xml: &str) -> StartTag {
        let doc = ManifestDocument::from_text(xml).unwrap();
        doc.cursor().next_start_tag().unwrap().clone()
    }

    const NS: &str = r#"xmlns:android="http://schemas.android.com/apk/res/android""#;

    #[test]
    fn symbolic_enums_and_flags() {
        let tag = tag(&format!(
            r#"<activity {NS} android:launchMode="singleTask" android:configChanges="orientation|screenSize" android:screenOrientation="1"/>"#
        ));
        let attrs = TypedAttributes::new(&tag, &NoResources);
        assert_eq!(attrs.get_enum("launchMode", tables::LAUNCH_MODE, 0), 2);
        assert_eq!(attrs.get_flags("configChanges", tables::CONFIG_CHANGES, 0), 0x480);
        assert_eq!(attrs.get_enum("screenOrientation", tables::SCREEN_ORIENTATION, -1), 1);
        assert_eq!(attrs.get_enum("missing", tables::LAUNCH_MODE, 7), 7);
    }

    #[test]
    fn references_resolve_through_resolver() {
        let tag = tag(&format!(
            r#"<permission {NS} android:name="@string/perm" android:label="@string/label" android:icon="@drawable/icon"/>"#
        ));
        let resources = StaticResources::new()
            .with_value(ResourceRef::Named("string/perm".into()), "com.ex.PERM")
            .with_configurable(ResourceRef::Named("string/perm".into()))
            .with_value(ResourceRef::Named("string/label".into()), "Label")
            .with_id("drawable/icon", 0x7f02_0000);
        let attrs = TypedAttributes::new(&tag, &resources);
        assert_eq!(attrs.get_string("name").as_deref(), Some("com.ex.PERM"));
        assert_eq!(attrs.get_non_configuration_string("name"), None);
        assert_eq!(attrs.get_non_resource_string("name"), None);
        assert_eq!(
            attrs.get_non_configuration_string("label").as_deref(),
            Some("Label")
        );
        assert_eq!(attrs.get_resource_id("icon", 0), 0x7f02_0000);
        assert_eq!(attrs.get_resource_id("label", 0), 0);
    }

    #[test]
    fn numeric_text_keeps_raw_string() {
        let tag = tag(&format!(r#"<manifest {NS} android:versionName="1.0" android:versionCode="3"/>"#));
        let attrs = TypedAttributes::new(&tag, &NoResources);
        assert_eq!(attrs.get_string("versionName").as_deref(), Some("1.0"));
        assert_eq!(attrs.get_int("versionCode", 0), 3);
        assert!(attrs.float_if_typed("versionName").is_some());
        assert!(attrs.float_if_typed("versionCode").is_none());
        assert!(!attrs.get_bool("debuggable", false));
    }
}
