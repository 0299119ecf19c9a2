//! Decoder for compiled (binary) AndroidManifest.xml documents.
//!
//! The document is a `RES_XML_TYPE` chunk holding a string pool, a resource
//! map and one chunk per tree node. Nodes are flattened into the shared
//! [`XmlEvent`] stream; namespace nodes only feed prefix resolution.

use crate::android::xml::{
    ManifestAttribute, ManifestDocument, ManifestValue, StartTag, XmlError, XmlEvent, XmlResult,
};
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::{pair, tuple};
use nom::IResult;

const RES_XML_TYPE: u16 = 0x0003;
const RES_STRING_POOL_TYPE: u16 = 0x0001;
const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
const RES_XML_CDATA_TYPE: u16 = 0x0104;

const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
const STRING_FLAG_UTF8: u32 = 0x0000_0100;
const CHUNK_HEADER_SIZE: usize = 8;
const RES_VALUE_SIZE: u16 = 8;

const TYPE_NULL: u8 = 0x00;
const TYPE_REFERENCE: u8 = 0x01;
const TYPE_STRING: u8 = 0x03;
const TYPE_FLOAT: u8 = 0x04;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;
const TYPE_INT_BOOLEAN: u8 = 0x12;

fn malformed(msg: impl Into<String>) -> XmlError {
    XmlError::MalformedDocument(msg.into())
}

/// Runs a nom parser to completion of its value, naming `what` on failure.
fn run<'a, T>(result: IResult<&'a [u8], T>, what: &str) -> XmlResult<(&'a [u8], T)> {
    result.map_err(|_| malformed(format!("Truncated {} in binary XML", what)))
}

/// One `ResChunk_header` plus the bytes it spans.
struct Chunk<'a> {
    kind: u16,
    /// Type-specific header fields after the common eight bytes.
    header: &'a [u8],
    /// Everything after the header.
    body: &'a [u8],
}

fn chunk(input: &[u8]) -> IResult<&[u8], Chunk<'_>> {
    let (after, kind) = le_u16(input)?;
    let (after, header_size) = le_u16(after)?;
    let (_, size) = le_u32(after)?;
    let header_size = header_size as usize;
    if header_size < CHUNK_HEADER_SIZE || (size as usize) < header_size {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    let (rest, whole) = take(size as usize)(input)?;
    Ok((
        rest,
        Chunk {
            kind,
            header: &whole[CHUNK_HEADER_SIZE..header_size],
            body: &whole[header_size..],
        },
    ))
}

struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn decode(pool: &Chunk<'_>) -> XmlResult<Self> {
        let (_, (string_count, _style_count, flags, strings_start)) = run(
            tuple((le_u32, le_u32, le_u32, le_u32))(pool.header),
            "string pool header",
        )?;
        let (_, offsets) = run(count(le_u32, string_count as usize)(pool.body), "string offsets")?;

        // `strings_start` counts from the chunk start, `body` from the header end.
        let header_len = CHUNK_HEADER_SIZE + pool.header.len();
        let data = (strings_start as usize)
            .checked_sub(header_len)
            .and_then(|start| pool.body.get(start..))
            .ok_or_else(|| malformed("String data starts outside the pool"))?;
        let utf8 = flags & STRING_FLAG_UTF8 != 0;

        let mut strings = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let entry = data
                .get(offset as usize..)
                .ok_or_else(|| malformed("String offset exceeds pool bounds"))?;
            strings.push(if utf8 {
                utf8_entry(entry)?
            } else {
                utf16_entry(entry)?
            });
        }
        Ok(StringPool { strings })
    }

    fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(String::as_str)
    }

    fn owned(&self, idx: u32) -> Option<String> {
        self.get(idx).map(str::to_string)
    }
}

/// Length prefix of a UTF-8 pool entry: one byte, or two with the high bit set.
fn utf8_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, first) = le_u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, first as usize));
    }
    let (input, second) = le_u8(input)?;
    Ok((input, (((first & 0x7F) as usize) << 8) | second as usize))
}

/// Length prefix of a UTF-16 pool entry: one unit, or two with the high bit set.
fn utf16_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, first) = le_u16(input)?;
    if first & 0x8000 == 0 {
        return Ok((input, first as usize));
    }
    let (input, second) = le_u16(input)?;
    Ok((input, (((first & 0x7FFF) as usize) << 16) | second as usize))
}

fn utf8_entry(entry: &[u8]) -> XmlResult<String> {
    // UTF-16 length first, then the byte length we actually need.
    let (rest, _) = run(utf8_length(entry), "UTF-8 string length")?;
    let (rest, byte_len) = run(utf8_length(rest), "UTF-8 string length")?;
    let (_, bytes) = run(take(byte_len)(rest), "UTF-8 string")?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| malformed(e.to_string()))
}

fn utf16_entry(entry: &[u8]) -> XmlResult<String> {
    let (rest, units) = run(utf16_length(entry), "UTF-16 string length")?;
    let (_, units) = run(count(le_u16, units)(rest), "UTF-16 string")?;
    String::from_utf16(&units).map_err(|e| malformed(e.to_string()))
}

/// Fields of a `ResXMLTree_attrExt` that locate the attribute array.
struct ElementHeader {
    namespace: u32,
    name: u32,
    attribute_start: u16,
    attribute_size: u16,
    attribute_count: u16,
}

fn element_header(input: &[u8]) -> IResult<&[u8], ElementHeader> {
    let (input, namespace) = le_u32(input)?;
    let (input, name) = le_u32(input)?;
    let (input, attribute_start) = le_u16(input)?;
    let (input, attribute_size) = le_u16(input)?;
    let (input, attribute_count) = le_u16(input)?;
    Ok((
        input,
        ElementHeader {
            namespace,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
        },
    ))
}

/// A `ResXMLTree_attribute` with its inline `Res_value`.
struct RawAttribute {
    namespace: u32,
    name: u32,
    raw_value: u32,
    value_size: u16,
    data_type: u8,
    data: u32,
}

fn raw_attribute(input: &[u8]) -> IResult<&[u8], RawAttribute> {
    let (input, namespace) = le_u32(input)?;
    let (input, name) = le_u32(input)?;
    let (input, raw_value) = le_u32(input)?;
    let (input, value_size) = le_u16(input)?;
    let (input, _res0) = le_u8(input)?;
    let (input, data_type) = le_u8(input)?;
    let (input, data) = le_u32(input)?;
    Ok((
        input,
        RawAttribute {
            namespace,
            name,
            raw_value,
            value_size,
            data_type,
            data,
        },
    ))
}

fn typed_value(pool: &StringPool, attr: &RawAttribute) -> XmlResult<ManifestValue> {
    let data = attr.data;
    Ok(match attr.data_type {
        TYPE_NULL => ManifestValue::String(String::new()),
        TYPE_STRING => pool
            .owned(data)
            .or_else(|| pool.owned(attr.raw_value))
            .map(ManifestValue::String)
            .ok_or_else(|| malformed("String value references missing pool entry"))?,
        TYPE_REFERENCE => ManifestValue::Reference(data),
        TYPE_INT_BOOLEAN => ManifestValue::Boolean(data != 0),
        TYPE_INT_DEC => ManifestValue::Integer(i64::from(data as i32)),
        TYPE_FLOAT => ManifestValue::Float(f32::from_bits(data)),
        TYPE_INT_HEX => ManifestValue::Hex(data),
        _ => ManifestValue::Hex(data),
    })
}

/// Namespace declarations in scope, innermost last.
#[derive(Default)]
struct Namespaces {
    frames: Vec<(Option<String>, Option<String>)>,
}

impl Namespaces {
    fn prefix_for(&self, uri: Option<&str>) -> Option<String> {
        let uri = uri?;
        self.frames
            .iter()
            .rev()
            .find(|(_, frame_uri)| frame_uri.as_deref() == Some(uri))
            .and_then(|(prefix, _)| prefix.clone())
    }
}

/// Builds the event stream from the node chunks of one document.
#[derive(Default)]
struct TreeBuilder {
    pool: Option<StringPool>,
    resource_map: Vec<u32>,
    namespaces: Namespaces,
    open: Vec<String>,
    events: Vec<XmlEvent>,
}

impl TreeBuilder {
    fn pool(&self, node: &str) -> XmlResult<&StringPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| malformed(format!("{} encountered before string pool", node)))
    }

    fn node_line(node: &Chunk<'_>) -> XmlResult<u32> {
        run(le_u32(node.header), "node header").map(|(_, line)| line)
    }

    fn accept(&mut self, node: Chunk<'_>) -> XmlResult<()> {
        match node.kind {
            RES_STRING_POOL_TYPE => self.pool = Some(StringPool::decode(&node)?),
            RES_XML_RESOURCE_MAP_TYPE => {
                let ids = node.body.len() / 4;
                self.resource_map = run(count(le_u32, ids)(node.body), "resource map")?.1;
            }
            RES_XML_START_NAMESPACE_TYPE => {
                let pool = self.pool("Namespace")?;
                let (_, (prefix, uri)) =
                    run(pair(le_u32, le_u32)(node.body), "namespace")?;
                let frame = (pool.owned(prefix), pool.owned(uri));
                self.namespaces.frames.push(frame);
            }
            RES_XML_END_NAMESPACE_TYPE => {
                self.namespaces.frames.pop();
            }
            RES_XML_START_ELEMENT_TYPE => self.start_element(&node)?,
            RES_XML_END_ELEMENT_TYPE => {
                let line = Self::node_line(&node)?;
                let depth = self.open.len();
                let name = self
                    .open
                    .pop()
                    .ok_or_else(|| malformed("End element without matching start"))?;
                self.events.push(XmlEvent::End { name, depth, line });
            }
            RES_XML_CDATA_TYPE => {
                let (_, data) = run(le_u32(node.body), "CDATA")?;
                let text = self.pool("CDATA")?.owned(data);
                if let Some(text) = text {
                    self.events.push(XmlEvent::Text(text));
                }
            }
            // Unknown chunk types are skipped.
            _ => {}
        }
        Ok(())
    }

    fn start_element(&mut self, node: &Chunk<'_>) -> XmlResult<()> {
        let line = Self::node_line(node)?;
        let pool = self.pool("Start element")?;
        let (_, header) = run(element_header(node.body), "element header")?;
        let name = pool
            .owned(header.name)
            .ok_or_else(|| malformed("Element references invalid string index"))?;
        let namespace_uri = pool.owned(header.namespace);

        let mut attributes = Vec::with_capacity(header.attribute_count as usize);
        let stride = header.attribute_size as usize;
        for i in 0..header.attribute_count as usize {
            let at = header.attribute_start as usize + i * stride;
            let bytes = node
                .body
                .get(at..)
                .ok_or_else(|| malformed("Attribute array exceeds element bounds"))?;
            let (_, raw) = run(raw_attribute(bytes), "attribute")?;
            if raw.value_size != RES_VALUE_SIZE {
                return Err(malformed("Attribute value size must be 8"));
            }
            let attr_name = pool
                .owned(raw.name)
                .ok_or_else(|| malformed("Attribute name references invalid string index"))?;
            let attr_namespace = pool.owned(raw.namespace);
            attributes.push(ManifestAttribute {
                namespace_prefix: self.namespaces.prefix_for(attr_namespace.as_deref()),
                namespace_uri: attr_namespace,
                resource_id: self
                    .resource_map
                    .get(raw.name as usize)
                    .copied()
                    .filter(|id| *id != 0),
                name: attr_name,
                value: typed_value(pool, &raw)?,
                raw_value: pool.owned(raw.raw_value),
            });
        }

        self.open.push(name.clone());
        self.events.push(XmlEvent::Start(StartTag {
            name,
            namespace_uri,
            attributes,
            line,
            depth: self.open.len(),
        }));
        Ok(())
    }

    fn finish(self) -> XmlResult<ManifestDocument> {
        if !self.open.is_empty() {
            return Err(malformed("Unclosed XML elements at end of document"));
        }
        if self.events.is_empty() {
            return Err(malformed("AndroidManifest is empty"));
        }
        Ok(ManifestDocument::from_events(self.events))
    }
}

/// Whether `bytes` start with a compiled XML chunk header.
pub fn is_binary_xml(bytes: &[u8]) -> bool {
    bytes.len() >= CHUNK_HEADER_SIZE && u16::from_le_bytes([bytes[0], bytes[1]]) == RES_XML_TYPE
}

/// Decodes a compiled manifest into a flat event stream.
pub fn decode(bytes: &[u8]) -> XmlResult<ManifestDocument> {
    let (_, document) = run(chunk(bytes), "document chunk")?;
    if document.kind != RES_XML_TYPE {
        return Err(malformed("Binary XML does not start with RES_XML_TYPE header"));
    }
    let mut tree = TreeBuilder::default();
    let mut rest = document.body;
    while !rest.is_empty() {
        let (next, node) = run(chunk(rest), "chunk")?;
        tree.accept(node)?;
        rest = next;
    }
    tree.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::xml::ANDROID_NAMESPACE_URI;
    use std::collections::BTreeMap;

    /// Minimal compiled-XML emitter for fixtures.
    #[derive(Default)]
    struct Builder {
        strings: Vec<String>,
        indices: BTreeMap<String, u32>,
        body: Vec<u8>,
    }

    fn write_u16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn align_to_four(buf: &mut Vec<u8>) {
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    fn begin_chunk(buf: &mut Vec<u8>, chunk_type: u16, header_size: u16) -> usize {
        let start = buf.len();
        write_u16(buf, chunk_type);
        write_u16(buf, header_size);
        write_u32(buf, 0);
        start
    }

    fn finalize_chunk(buf: &mut Vec<u8>, chunk_start: usize) {
        align_to_four(buf);
        let size = (buf.len() - chunk_start) as u32;
        buf[chunk_start + 4..chunk_start + 8].copy_from_slice(&size.to_le_bytes());
    }

    impl Builder {
        fn intern(&mut self, value: &str) -> u32 {
            if let Some(&idx) = self.indices.get(value) {
                return idx;
            }
            let idx = self.strings.len() as u32;
            self.strings.push(value.to_string());
            self.indices.insert(value.to_string(), idx);
            idx
        }

        fn namespace(&mut self, prefix: &str, uri: &str) {
            let (p, u) = (self.intern(prefix), self.intern(uri));
            let start = begin_chunk(&mut self.body, RES_XML_START_NAMESPACE_TYPE, 16);
            write_u32(&mut self.body, 1);
            write_u32(&mut self.body, NO_ENTRY_INDEX);
            write_u32(&mut self.body, p);
            write_u32(&mut self.body, u);
            finalize_chunk(&mut self.body, start);
        }

        fn start(&mut self, line: u32, name: &str, attrs: &[(Option<&str>, &str, u8, u32, Option<&str>)]) {
            let name_idx = self.intern(name);
            let encoded: Vec<_> = attrs
                .iter()
                .map(|(ns, attr, ty, data, raw)| {
                    (
                        ns.map_or(NO_ENTRY_INDEX, |n| self.intern(n)),
                        self.intern(attr),
                        raw.map_or(NO_ENTRY_INDEX, |r| self.intern(r)),
                        *ty,
                        *data,
                    )
                })
                .collect();
            let buf = &mut self.body;
            let start = begin_chunk(buf, RES_XML_START_ELEMENT_TYPE, 16);
            write_u32(buf, line);
            write_u32(buf, NO_ENTRY_INDEX);
            write_u32(buf, NO_ENTRY_INDEX);
            write_u32(buf, name_idx);
            write_u16(buf, 20);
            write_u16(buf, 20);
            write_u16(buf, encoded.len() as u16);
            write_u16(buf, 0);
            write_u16(buf, 0);
            write_u16(buf, 0);
            for (ns, attr, raw, ty, data) in encoded {
                write_u32(buf, ns);
                write_u32(buf, attr);
                write_u32(buf, raw);
                write_u16(buf, 8);
                buf.push(0);
                buf.push(ty);
                write_u32(buf, data);
            }
            finalize_chunk(buf, start);
        }

        fn end(&mut self, line: u32, name: &str) {
            let name_idx = self.intern(name);
            let start = begin_chunk(&mut self.body, RES_XML_END_ELEMENT_TYPE, 16);
            write_u32(&mut self.body, line);
            write_u32(&mut self.body, NO_ENTRY_INDEX);
            write_u32(&mut self.body, NO_ENTRY_INDEX);
            write_u32(&mut self.body, name_idx);
            finalize_chunk(&mut self.body, start);
        }

        fn finish(self) -> Vec<u8> {
            let mut pool = Vec::new();
            let header_size = 28u16;
            let start = begin_chunk(&mut pool, RES_STRING_POOL_TYPE, header_size);
            write_u32(&mut pool, self.strings.len() as u32);
            write_u32(&mut pool, 0);
            write_u32(&mut pool, 0);
            write_u32(&mut pool, header_size as u32 + self.strings.len() as u32 * 4);
            write_u32(&mut pool, 0);
            let mut data = Vec::new();
            for s in &self.strings {
                write_u32(&mut pool, data.len() as u32);
                let units: Vec<u16> = s.encode_utf16().collect();
                write_u16(&mut data, units.len() as u16);
                for unit in units {
                    write_u16(&mut data, unit);
                }
                write_u16(&mut data, 0);
            }
            pool.extend_from_slice(&data);
            finalize_chunk(&mut pool, start);

            let mut out = Vec::new();
            let doc = begin_chunk(&mut out, RES_XML_TYPE, 8);
            out.extend_from_slice(&pool);
            out.extend_from_slice(&self.body);
            finalize_chunk(&mut out, doc);
            out
        }
    }

    fn sample() -> Vec<u8> {
        let mut b = Builder::default();
        b.namespace("android", ANDROID_NAMESPACE_URI);
        let android = Some(ANDROID_NAMESPACE_URI);
        b.start(
            2,
            "manifest",
            &[
                (None, "package", TYPE_STRING, 0, Some("com.example.bin")),
                (android, "versionCode", TYPE_INT_DEC, 42, None),
            ],
        );
        b.start(
            3,
            "application",
            &[
                (android, "label", TYPE_REFERENCE, 0x7f04_0001, None),
                (android, "debuggable", TYPE_INT_BOOLEAN, 0xffff_ffff, None),
                (android, "maxAspectRatio", TYPE_FLOAT, 2.0f32.to_bits(), None),
            ],
        );
        b.end(3, "application");
        b.end(4, "manifest");
        b.finish()
    }

    #[test]
    fn decodes_compiled_manifest() {
        let bytes = sample();
        assert!(is_binary_xml(&bytes));
        let doc = ManifestDocument::from_bytes(&bytes).unwrap();
        let mut cursor = doc.cursor();
        let root = cursor.next_start_tag().unwrap();
        assert_eq!(root.name, "manifest");
        assert_eq!(root.line, 2);
        let package = root.plain_attr("package").unwrap();
        assert_eq!(package.value, ManifestValue::String("com.example.bin".into()));
        let version = root.android_attr("versionCode").unwrap();
        assert_eq!(version.value, ManifestValue::Integer(42));
        assert_eq!(version.namespace_prefix.as_deref(), Some("android"));

        let app = cursor.next_child(root.depth).unwrap();
        assert_eq!(app.depth, 2);
        assert_eq!(
            app.android_attr("label").unwrap().value,
            ManifestValue::Reference(0x7f04_0001)
        );
        assert_eq!(
            app.android_attr("debuggable").unwrap().value,
            ManifestValue::Boolean(true)
        );
        assert_eq!(
            app.android_attr("maxAspectRatio").unwrap().value,
            ManifestValue::Float(2.0)
        );
        assert!(cursor.next_child(app.depth).is_none());
        assert!(cursor.next_child(root.depth).is_none());
    }

    #[test]
    fn truncated_document_is_rejected() {
        let bytes = sample();
        assert!(decode(&bytes[..bytes.len() - 12]).is_err());
        assert!(!is_binary_xml(b"<manifest/>"));
    }
}
