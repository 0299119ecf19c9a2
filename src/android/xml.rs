//! Flat tag/attribute event stream over a manifest document.
//!
//! Both compiled (binary) and text manifests decode into the same
//! [`ManifestDocument`]; the parser walks it with a [`TagCursor`] that exposes
//! pull-parser style depth tracking.

use crate::error::ParseError;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Error as QuickXmlError, Reader};
use std::collections::BTreeMap;

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

/// Result alias for manifest decoding.
pub type XmlResult<T> = Result<T, XmlError>;

/// Errors surfaced while decoding a manifest into events.
#[derive(Debug)]
pub enum XmlError {
    /// The document is missing the expected structure.
    MalformedDocument(String),
    /// Text XML tokenizer failure.
    Xml(String),
}

impl std::fmt::Display for XmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmlError::MalformedDocument(msg) => write!(f, "Malformed manifest: {msg}"),
            XmlError::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

impl std::error::Error for XmlError {}

impl From<QuickXmlError> for XmlError {
    fn from(value: QuickXmlError) -> Self {
        XmlError::Xml(value.to_string())
    }
}

impl From<AttrError> for XmlError {
    fn from(value: AttrError) -> Self {
        XmlError::Xml(value.to_string())
    }
}

impl From<XmlError> for ParseError {
    fn from(value: XmlError) -> Self {
        err!(UnexpectedException, "{}", value)
    }
}

/// Typed attribute values as they appear in a manifest.
#[derive(Clone, Debug, PartialEq)]
pub enum ManifestValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Hex(u32),
    Float(f32),
    /// Compiled resource reference (`@0x7f040001`).
    Reference(u32),
    /// Symbolic resource reference from a text manifest (`@string/app_name`).
    NamedReference(String),
}

impl ManifestValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference_id(&self) -> Option<u32> {
        match self {
            ManifestValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ManifestValue::Reference(_) | ManifestValue::NamedReference(_)
        )
    }

    /// Text rendering used when a string is requested from a non-string value.
    pub fn coerce_to_string(&self) -> String {
        match self {
            ManifestValue::String(value) => value.clone(),
            ManifestValue::Boolean(value) => value.to_string(),
            ManifestValue::Integer(value) => value.to_string(),
            ManifestValue::Hex(value) => format!("0x{value:x}"),
            ManifestValue::Float(value) => value.to_string(),
            ManifestValue::Reference(value) => format!("@0x{value:08x}"),
            ManifestValue::NamedReference(name) => format!("@{name}"),
        }
    }
}

impl From<String> for ManifestValue {
    fn from(value: String) -> Self {
        ManifestValue::String(value)
    }
}

impl From<&str> for ManifestValue {
    fn from(value: &str) -> Self {
        ManifestValue::String(value.to_owned())
    }
}

impl From<bool> for ManifestValue {
    fn from(value: bool) -> Self {
        ManifestValue::Boolean(value)
    }
}

impl From<i64> for ManifestValue {
    fn from(value: i64) -> Self {
        ManifestValue::Integer(value)
    }
}

/// A single attribute attached to a start tag.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestAttribute {
    pub namespace_prefix: Option<String>,
    pub namespace_uri: Option<String>,
    pub resource_id: Option<u32>,
    pub name: String,
    pub value: ManifestValue,
    /// Source text of the value, when the document kept it.
    pub raw_value: Option<String>,
}

impl ManifestAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<ManifestValue>) -> Self {
        ManifestAttribute {
            namespace_prefix: None,
            namespace_uri: None,
            resource_id: None,
            name: name.into(),
            value: value.into(),
            raw_value: None,
        }
    }

    /// An attribute in the `android:` namespace.
    pub fn android(name: impl Into<String>, value: impl Into<ManifestValue>) -> Self {
        ManifestAttribute {
            namespace_prefix: Some("android".to_string()),
            namespace_uri: Some(ANDROID_NAMESPACE_URI.to_string()),
            ..ManifestAttribute::new(name, value)
        }
    }

    pub fn is_android(&self) -> bool {
        self.namespace_uri.as_deref() == Some(ANDROID_NAMESPACE_URI)
            || self.namespace_prefix.as_deref() == Some("android")
    }

    pub fn is_plain(&self) -> bool {
        self.namespace_uri.is_none() && self.namespace_prefix.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub namespace_uri: Option<String>,
    pub attributes: Vec<ManifestAttribute>,
    pub line: u32,
    pub depth: usize,
}

impl StartTag {
    /// Looks up an `android:`-namespaced attribute by local name.
    pub fn android_attr(&self, name: &str) -> Option<&ManifestAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name && attr.is_android())
    }

    /// Looks up an un-namespaced attribute such as `package` or `split`.
    pub fn plain_attr(&self, name: &str) -> Option<&ManifestAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name && attr.is_plain())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum XmlEvent {
    Start(StartTag),
    End { name: String, depth: usize, line: u32 },
    Text(String),
}

/// A fully tokenized manifest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManifestDocument {
    events: Vec<XmlEvent>,
}

impl ManifestDocument {
    pub fn from_events(events: Vec<XmlEvent>) -> Self {
        ManifestDocument { events }
    }

    pub fn events(&self) -> &[XmlEvent] {
        &self.events
    }

    /// Decodes either a compiled manifest or UTF-8 text XML.
    pub fn from_bytes(bytes: &[u8]) -> XmlResult<Self> {
        if crate::android::binary_xml::is_binary_xml(bytes) {
            return crate::android::binary_xml::decode(bytes);
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|err| XmlError::MalformedDocument(err.to_string()))?;
        Self::from_text(text)
    }

    pub fn from_text(xml: &str) -> XmlResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut events = Vec::new();
        let mut namespace_stack: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
        let mut open: Vec<String> = Vec::new();

        loop {
            let line = line_at(xml, reader.buffer_position() as usize);
            match reader.read_event()? {
                Event::Start(start) => {
                    let tag = build_start_tag(&start, &mut namespace_stack, open.len() + 1, line)?;
                    open.push(tag.name.clone());
                    events.push(XmlEvent::Start(tag));
                }
                Event::Empty(start) => {
                    let depth = open.len() + 1;
                    let tag = build_start_tag(&start, &mut namespace_stack, depth, line)?;
                    let name = tag.name.clone();
                    events.push(XmlEvent::Start(tag));
                    events.push(XmlEvent::End { name, depth, line });
                    pop_namespaces(&mut namespace_stack)?;
                }
                Event::End(_) => {
                    let depth = open.len();
                    let name = open.pop().ok_or_else(|| {
                        XmlError::MalformedDocument("Unbalanced end tag in manifest".to_string())
                    })?;
                    pop_namespaces(&mut namespace_stack)?;
                    events.push(XmlEvent::End { name, depth, line });
                }
                Event::Text(text) => {
                    let raw = text.unescape()?.into_owned();
                    if !raw.trim().is_empty() {
                        events.push(XmlEvent::Text(raw.trim().to_string()));
                    }
                }
                Event::CData(text) => {
                    let raw = std::str::from_utf8(text.as_ref())
                        .map_err(|err| XmlError::MalformedDocument(err.to_string()))?;
                    events.push(XmlEvent::Text(raw.to_string()));
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if !open.is_empty() {
            return Err(XmlError::MalformedDocument(
                "Unclosed XML elements in manifest".to_string(),
            ));
        }
        Ok(ManifestDocument { events })
    }

    pub fn cursor(&self) -> TagCursor<'_> {
        TagCursor {
            events: &self.events,
            pos: 0,
            depth: 0,
            line: 0,
        }
    }
}

/// Line of the first non-blank byte at or after `offset`.
fn line_at(xml: &str, offset: usize) -> u32 {
    let bytes = xml.as_bytes();
    let mut end = offset.min(bytes.len());
    while end < bytes.len() && bytes[end].is_ascii_whitespace() {
        end += 1;
    }
    bytes[..end].iter().filter(|b| **b == b'\n').count() as u32 + 1
}

fn pop_namespaces(stack: &mut Vec<BTreeMap<String, String>>) -> XmlResult<()> {
    if stack.len() <= 1 {
        return Err(XmlError::MalformedDocument(
            "Namespace stack underflow".to_string(),
        ));
    }
    stack.pop();
    Ok(())
}

fn lookup_namespace_uri(stack: &[BTreeMap<String, String>], prefix: Option<&str>) -> Option<String> {
    let key = prefix.unwrap_or("");
    stack.iter().rev().find_map(|frame| frame.get(key).cloned())
}

fn split_qname(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

fn build_start_tag(
    start: &BytesStart<'_>,
    namespace_stack: &mut Vec<BTreeMap<String, String>>,
    depth: usize,
    line: u32,
) -> XmlResult<StartTag> {
    let mut declared = BTreeMap::new();
    let mut pending = Vec::new();
    for attr in start.attributes().with_checks(false) {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| XmlError::MalformedDocument(err.to_string()))?;
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            declared.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.insert(prefix.to_string(), value);
        } else {
            pending.push((split_qname(key), value));
        }
    }
    namespace_stack.push(declared);

    let name_ref = start.name();
    let raw_name = std::str::from_utf8(name_ref.as_ref())
        .map_err(|err| XmlError::MalformedDocument(err.to_string()))?;
    let (prefix, local) = split_qname(raw_name);
    let namespace_uri = prefix
        .as_deref()
        .and_then(|p| lookup_namespace_uri(namespace_stack, Some(p)));

    let attributes = pending
        .into_iter()
        .map(|((prefix, name), value)| {
            // Un-prefixed attributes never inherit the default namespace.
            let namespace_uri = prefix
                .as_deref()
                .and_then(|p| lookup_namespace_uri(namespace_stack, Some(p)));
            ManifestAttribute {
                namespace_prefix: prefix,
                namespace_uri,
                resource_id: None,
                name,
                value: parse_text_value(&value),
                raw_value: Some(value),
            }
        })
        .collect();

    Ok(StartTag {
        name: local,
        namespace_uri,
        attributes,
        line,
        depth,
    })
}

/// Infers a typed value from attribute text the way the resource compiler would.
pub fn parse_text_value(text: &str) -> ManifestValue {
    let trimmed = text.trim();
    if trimmed == "true" {
        ManifestValue::Boolean(true)
    } else if trimmed == "false" {
        ManifestValue::Boolean(false)
    } else if let Some(hex) = trimmed.strip_prefix("@0x").or_else(|| trimmed.strip_prefix("@0X")) {
        u32::from_str_radix(hex, 16)
            .map(ManifestValue::Reference)
            .unwrap_or_else(|_| ManifestValue::String(text.to_string()))
    } else if let Some(name) = trimmed.strip_prefix('@') {
        if name.contains('/') {
            ManifestValue::NamedReference(name.to_string())
        } else {
            ManifestValue::String(text.to_string())
        }
    } else if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
            .map(ManifestValue::Hex)
            .unwrap_or_else(|_| ManifestValue::String(text.to_string()))
    } else if let Ok(number) = trimmed.parse::<i64>() {
        ManifestValue::Integer(number)
    } else if is_float_literal(trimmed) {
        trimmed
            .parse::<f32>()
            .map(ManifestValue::Float)
            .unwrap_or_else(|_| ManifestValue::String(text.to_string()))
    } else {
        ManifestValue::String(text.to_string())
    }
}

fn is_float_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut parts = digits.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(whole), Some(frac)) => {
            !whole.is_empty()
                && !frac.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

/// Pull-parser style cursor over a [`ManifestDocument`].
///
/// `depth()` follows the usual convention: a start tag and its matching end tag
/// report the same depth, and the document level is depth 0.
#[derive(Clone, Debug)]
pub struct TagCursor<'a> {
    events: &'a [XmlEvent],
    pos: usize,
    depth: usize,
    line: u32,
}

impl<'a> TagCursor<'a> {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Line of the most recently consumed event.
    pub fn line(&self) -> u32 {
        self.line
    }

    fn advance(&mut self) -> Option<&'a XmlEvent> {
        let event = self.events.get(self.pos)?;
        self.pos += 1;
        match event {
            XmlEvent::Start(tag) => {
                self.depth = tag.depth;
                self.line = tag.line;
            }
            XmlEvent::End { depth, line, .. } => {
                self.depth = depth.saturating_sub(1);
                self.line = *line;
            }
            XmlEvent::Text(_) => {}
        }
        Some(event)
    }

    /// Skips forward to the next start tag anywhere in the document.
    pub fn next_start_tag(&mut self) -> Option<&'a StartTag> {
        while let Some(event) = self.advance() {
            if let XmlEvent::Start(tag) = event {
                return Some(tag);
            }
        }
        None
    }

    /// Returns the next direct child of the element opened at `outer_depth`,
    /// or `None` once that element's end tag has been consumed.
    ///
    /// Descendants of a child that the caller did not consume are skipped.
    pub fn next_child(&mut self, outer_depth: usize) -> Option<&'a StartTag> {
        while let Some(event) = self.advance() {
            match event {
                XmlEvent::End { depth, .. } if *depth <= outer_depth => return None,
                XmlEvent::Start(tag) if tag.depth == outer_depth + 1 => return Some(tag),
                _ => {}
            }
        }
        None
    }

    /// Consumes everything up to and including the end tag matching a start
    /// tag at `tag_depth`.
    pub fn skip_current_tag(&mut self, tag_depth: usize) {
        while let Some(event) = self.advance() {
            if let XmlEvent::End { depth, .. } = event {
                if *depth <= tag_depth {
                    return;
                }
            }
        }
    }

    /// Concatenated text directly inside the element opened at `outer_depth`.
    pub fn collect_text(&mut self, outer_depth: usize) -> Option<String> {
        let mut out: Option<String> = None;
        while let Some(event) = self.advance() {
            match event {
                XmlEvent::End { depth, .. } if *depth <= outer_depth => break,
                XmlEvent::Text(text) => out.get_or_insert_with(String::new).push_str(text),
                _ => {}
            }
        }
        out
    }
}
