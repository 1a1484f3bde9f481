//! OPML outline codec.
//!
//! Decoding parses the document into a small element tree first, so a
//! document that is not well-formed is rejected before anything is derived
//! from it. Only the first `body` element (document order) is considered.
//!
//! # Decoded shape
//!
//! ```xml
//! <body>
//!   <outline type="rss" text="Solo" xmlUrl="https://a.example/feed"/>  <!-- ungrouped -->
//!   <outline text="Tech">                                               <!-- group -->
//!     <outline text="B" xmlUrl="https://b.example/feed"/>
//!   </outline>
//! </body>
//! ```

use crate::models::{SourceGroup, SourceTable};
use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// One source to be created by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineDescriptor {
    /// Trimmed endpoint.
    pub url: String,
    /// Display name, if the outline carried one.
    pub name: Option<String>,
    /// Endpoint exactly as written in the document.
    pub original_url: String,
    /// Index into [`DecodedOutline::groups`], or `None` when ungrouped.
    pub group: Option<usize>,
}

/// A container outline found at the top level of `body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGroup {
    /// Group name (`text`, falling back to `title`).
    pub name: String,
    /// Indices into [`DecodedOutline::descriptors`].
    pub members: Vec<usize>,
}

/// Result of decoding an outline document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedOutline {
    /// Sources in document order.
    pub descriptors: Vec<OutlineDescriptor>,
    /// Groups in document order.
    pub groups: Vec<DecodedGroup>,
}

impl DecodedOutline {
    /// Returns `true` if the document described nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.groups.is_empty()
    }

    /// Returns the name of the group a descriptor belongs to.
    #[must_use]
    pub fn group_name(&self, descriptor: &OutlineDescriptor) -> Option<&str> {
        descriptor
            .group
            .and_then(|index| self.groups.get(index))
            .map(|group| group.name.as_str())
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn non_empty_attr(&self, key: &str) -> Option<&str> {
        self.attr(key).filter(|v| !v.is_empty())
    }

    fn find_first(&self, name: &str) -> Option<&Self> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_first(name))
    }
}

fn parse_error(position: impl std::fmt::Display, cause: impl std::fmt::Display) -> Error {
    Error::StructuralParse(format!("at byte {position}: {cause}"))
}

fn element_from(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element> {
    let position = reader.buffer_position();
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| parse_error(position, e))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn parse_tree(document: &str) -> Result<Element> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_error(reader.error_position(), e))?;
        match event {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(parse_error(
                        reader.buffer_position(),
                        "content after root element",
                    ));
                }
                stack.push(element_from(&reader, &start)?);
            },
            Event::Empty(start) => {
                let element = element_from(&reader, &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(parse_error(
                            reader.buffer_position(),
                            "content after root element",
                        ));
                    },
                }
            },
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(parse_error(reader.buffer_position(), "unmatched end tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            },
            Event::Text(text) if stack.is_empty() && !text.is_empty() => {
                return Err(parse_error(
                    reader.buffer_position(),
                    "text outside root element",
                ));
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            reader.buffer_position(),
            format!("unclosed element <{}>", open.name),
        ));
    }
    root.ok_or_else(|| parse_error(reader.buffer_position(), "no root element"))
}

fn descriptor_from(outline: &Element, group: Option<usize>) -> Option<OutlineDescriptor> {
    let original_url = outline.non_empty_attr("xmlUrl")?;
    let name = outline
        .non_empty_attr("text")
        .or_else(|| outline.non_empty_attr("name"))
        .map(ToString::to_string);
    Some(OutlineDescriptor {
        url: original_url.trim().to_string(),
        name,
        original_url: original_url.to_string(),
        group,
    })
}

/// Decodes an outline document into descriptors and group names.
///
/// A well-formed document without a `body`, or whose `body` holds nothing
/// recognizable, decodes to an empty result.
///
/// # Errors
///
/// Returns [`Error::StructuralParse`] if the document is not well-formed.
pub fn decode(document: &str) -> Result<DecodedOutline> {
    let root = parse_tree(document)?;
    let mut decoded = DecodedOutline::default();
    let Some(body) = root.find_first("body") else {
        return Ok(decoded);
    };

    for child in &body.children {
        let is_feed = child
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("rss"));
        if is_feed {
            if let Some(descriptor) = descriptor_from(child, None) {
                decoded.descriptors.push(descriptor);
                continue;
            }
        }

        if child.attr("text").is_none() && child.attr("title").is_none() {
            continue;
        }
        let name = child
            .non_empty_attr("text")
            .or_else(|| child.attr("title"))
            .unwrap_or_default()
            .to_string();
        let group_index = decoded.groups.len();
        let mut members = Vec::new();
        for nested in &child.children {
            if let Some(descriptor) = descriptor_from(nested, Some(group_index)) {
                members.push(decoded.descriptors.len());
                decoded.descriptors.push(descriptor);
            }
        }
        decoded.groups.push(DecodedGroup { name, members });
    }

    Ok(decoded)
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "encode_outline".to_string(),
        cause: e.to_string(),
    }
}

fn write_leaf<W: std::io::Write>(writer: &mut Writer<W>, name: &str, url: &str) -> Result<()> {
    let leaf = BytesStart::new("outline").with_attributes([
        ("text", name),
        ("name", name),
        ("type", "rss"),
        ("xmlUrl", url),
    ]);
    writer.write_event(Event::Empty(leaf)).map_err(write_error)
}

/// Encodes a group collection as an outline document.
///
/// Multi-source groups become containers; one-source groups become bare
/// top-level leaves. Members missing from `sources` are skipped.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the document cannot be written.
pub fn encode(groups: &[SourceGroup], sources: &SourceTable, title: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("opml").with_attributes([("version", "1.0")]),
        ))
        .map_err(write_error)?;
    for event in [
        Event::Start(BytesStart::new("head")),
        Event::Start(BytesStart::new("title")),
        Event::Text(BytesText::new(title)),
        Event::End(BytesEnd::new("title")),
        Event::End(BytesEnd::new("head")),
        Event::Start(BytesStart::new("body")),
    ] {
        writer.write_event(event).map_err(write_error)?;
    }

    for group in groups {
        if group.is_multiple {
            let name = group.name.as_deref().unwrap_or_default();
            writer
                .write_event(Event::Start(
                    BytesStart::new("outline").with_attributes([("text", name), ("name", name)]),
                ))
                .map_err(write_error)?;
        }
        for sid in &group.sids {
            match sources.get(sid) {
                Some(source) => write_leaf(&mut writer, &source.name, &source.url)?,
                None => tracing::warn!(sid = %sid, "Skipping group member missing from source table"),
            }
        }
        if group.is_multiple {
            writer
                .write_event(Event::End(BytesEnd::new("outline")))
                .map_err(write_error)?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .map_err(write_error)?;

    String::from_utf8(writer.into_inner()).map_err(write_error)
}
