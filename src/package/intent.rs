//! Intent filter records attached to components.

use serde::{Deserialize, Serialize};

pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
pub const ACTION_SEND: &str = "android.intent.action.SEND";
pub const ACTION_SENDTO: &str = "android.intent.action.SENDTO";
pub const ACTION_SEND_MULTIPLE: &str = "android.intent.action.SEND_MULTIPLE";
pub const CATEGORY_DEFAULT: &str = "android.intent.category.DEFAULT";
pub const CATEGORY_BROWSABLE: &str = "android.intent.category.BROWSABLE";
pub const SCHEME_HTTP: &str = "http";
pub const SCHEME_HTTPS: &str = "https";

/// How a pattern string is matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    Literal,
    Prefix,
    SimpleGlob,
    AdvancedGlob,
}

impl PatternKind {
    pub fn is_glob(self) -> bool {
        matches!(self, PatternKind::SimpleGlob | PatternKind::AdvancedGlob)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatcher {
    pub pattern: String,
    pub kind: PatternKind,
}

impl PatternMatcher {
    pub fn new(pattern: impl Into<String>, kind: PatternKind) -> Self {
        PatternMatcher {
            pattern: pattern.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityEntry {
    pub host: String,
    /// `None` matches any port.
    pub port: Option<u16>,
}

/// Exposure of a component to instant apps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstantAppVisibility {
    #[default]
    None,
    /// Exposed because the filter handles browsable or share intents.
    Implicit,
    Explicit,
}

/// Which kind of component owns a filter. Serialized explicitly so cached
/// descriptors rebuild the right filter kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentFilterKind {
    Activity,
    Receiver,
    Service,
    Provider,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentInfo {
    pub kind: IntentFilterKind,
    pub actions: Vec<String>,
    pub categories: Vec<String>,
    pub data_schemes: Vec<String>,
    pub data_scheme_specific_parts: Vec<PatternMatcher>,
    pub data_authorities: Vec<AuthorityEntry>,
    pub data_paths: Vec<PatternMatcher>,
    pub data_types: Vec<String>,
    pub has_partial_types: bool,
    pub priority: i32,
    pub order: i32,
    pub auto_verify: bool,
    pub visibility: InstantAppVisibility,
    pub has_default: bool,
    pub label_res: u32,
    pub non_localized_label: Option<String>,
    pub icon: u32,
    pub logo: u32,
    pub banner: u32,
}

impl IntentInfo {
    pub fn new(kind: IntentFilterKind) -> Self {
        IntentInfo {
            kind,
            actions: Vec::new(),
            categories: Vec::new(),
            data_schemes: Vec::new(),
            data_scheme_specific_parts: Vec::new(),
            data_authorities: Vec::new(),
            data_paths: Vec::new(),
            data_types: Vec::new(),
            has_partial_types: false,
            priority: 0,
            order: 0,
            auto_verify: false,
            visibility: InstantAppVisibility::None,
            has_default: false,
            label_res: 0,
            non_localized_label: None,
            icon: 0,
            logo: 0,
            banner: 0,
        }
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn has_data_scheme(&self, scheme: &str) -> bool {
        self.data_schemes.iter().any(|s| s == scheme)
    }

    pub fn add_action(&mut self, action: &str) {
        if !self.has_action(action) {
            self.actions.push(action.to_string());
        }
    }

    pub fn add_category(&mut self, category: &str) {
        if !self.has_category(category) {
            self.categories.push(category.to_string());
        }
    }

    pub fn add_data_scheme(&mut self, scheme: &str) {
        if !self.has_data_scheme(scheme) {
            self.data_schemes.push(scheme.to_string());
        }
    }

    /// Adds a `type/subtype` MIME type; `type/*` is stored as a partial type.
    pub fn add_data_type(&mut self, mime: &str) -> Result<(), String> {
        let slash = match mime.find('/') {
            Some(pos) if pos > 0 && mime.len() >= pos + 2 => pos,
            _ => return Err(mime.to_string()),
        };
        let stored = if mime.len() == slash + 2 && mime.ends_with('*') {
            self.has_partial_types = true;
            &mime[..slash]
        } else {
            mime
        };
        if !self.data_types.iter().any(|t| t == stored) {
            self.data_types.push(stored.to_string());
        }
        Ok(())
    }

    /// Browsable, or carries a share action. Derived, never stored.
    pub fn is_implicitly_exposed(&self) -> bool {
        self.has_category(CATEGORY_BROWSABLE)
            || self.has_action(ACTION_SEND)
            || self.has_action(ACTION_SENDTO)
            || self.has_action(ACTION_SEND_MULTIPLE)
    }

    /// A VIEW + DEFAULT filter over http or https.
    pub fn handles_web_uris(&self) -> bool {
        self.has_action(ACTION_VIEW)
            && self.has_category(CATEGORY_DEFAULT)
            && (self.has_data_scheme(SCHEME_HTTP) || self.has_data_scheme(SCHEME_HTTPS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_uri_detection() {
        let mut filter = IntentInfo::new(IntentFilterKind::Activity);
        filter.add_action(ACTION_VIEW);
        filter.add_data_scheme("https");
        assert!(!filter.handles_web_uris());
        filter.add_category(CATEGORY_DEFAULT);
        assert!(filter.handles_web_uris());
        assert!(!filter.is_implicitly_exposed());
        filter.add_category(CATEGORY_BROWSABLE);
        assert!(filter.is_implicitly_exposed());
    }

    #[test]
    fn mime_types() {
        let mut filter = IntentInfo::new(IntentFilterKind::Activity);
        assert!(filter.add_data_type("image/*").is_ok());
        assert!(filter.has_partial_types);
        assert_eq!(filter.data_types, vec!["image"]);
        assert!(filter.add_data_type("text/plain").is_ok());
        assert!(filter.add_data_type("plain").is_err());
        assert!(filter.add_data_type("/x").is_err());
        assert!(filter.add_data_type("text/").is_err());
    }
}
