//! Minifying serializer over an `RcDom`, inlining assets as it goes.

use html5ever::{Attribute, QualName};
use markup5ever_rcdom::{Handle, NodeData};
use std::cell::RefCell;

use super::inline::AssetInliner;
use crate::css;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Elements whose whitespace is significant.
const PRESERVE_ELEMENTS: &[&str] = &["pre", "textarea"];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "button", "cite", "code", "data", "dfn", "em", "i", "img",
    "input", "kbd", "label", "mark", "q", "s", "samp", "select", "small", "span", "strong", "sub",
    "sup", "textarea", "time", "u", "var",
];

#[derive(Clone, Copy)]
struct Context<'p> {
    parent: &'p str,
    preserve: bool,
}

pub(crate) struct Serializer<'i> {
    out: String,
    inliner: &'i mut AssetInliner,
    minify: bool,
}

pub(crate) fn serialize(document: &Handle, inliner: &mut AssetInliner, minify: bool) -> String {
    let mut serializer = Serializer {
        out: String::new(),
        inliner,
        minify,
    };
    serializer.children(
        document,
        Context {
            parent: "",
            preserve: false,
        },
    );
    serializer.out
}

/// Whether a neighbour keeps the whitespace next to it significant.
fn is_inline(handle: Option<&Handle>) -> bool {
    match handle.map(|h| &h.data) {
        Some(NodeData::Text { .. }) => true,
        Some(NodeData::Element { name, .. }) => INLINE_ELEMENTS.contains(&&*name.local),
        _ => false,
    }
}

impl Serializer<'_> {
    fn children(&mut self, parent: &Handle, ctx: Context<'_>) {
        let children = parent.children.borrow();
        let visible: Vec<&Handle> = children
            .iter()
            .filter(|c| !(self.minify && matches!(c.data, NodeData::Comment { .. })))
            .collect();
        for (idx, child) in visible.iter().enumerate() {
            let prev = idx.checked_sub(1).map(|i| visible[i]);
            let next = visible.get(idx + 1).copied();
            self.node(child, ctx, prev, next);
        }
    }

    fn node(&mut self, handle: &Handle, ctx: Context<'_>, prev: Option<&Handle>, next: Option<&Handle>) {
        match &handle.data {
            NodeData::Document => self.children(handle, ctx),
            NodeData::Doctype { name, .. } => {
                let name = if name.is_empty() { "html" } else { &**name };
                self.out.push_str(&format!("<!DOCTYPE {name}>"));
            }
            NodeData::Comment { contents } => {
                self.out.push_str("<!--");
                self.out.push_str(contents);
                self.out.push_str("-->");
            }
            NodeData::Text { contents } => {
                let text = contents.borrow();
                self.text(&text, ctx, prev, next);
            }
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => self.element(handle, name, attrs, template_contents, ctx),
            NodeData::ProcessingInstruction { .. } => {}
        }
    }

    fn text(&mut self, text: &str, ctx: Context<'_>, prev: Option<&Handle>, next: Option<&Handle>) {
        if ctx.parent == "style" && self.minify {
            self.out.push_str(&css::minify(text));
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&ctx.parent) {
            self.out.push_str(text);
            return;
        }
        if ctx.preserve || !self.minify {
            self.out.push_str(&escape_text(text));
            return;
        }

        let collapsed = collapse_whitespace(text);
        if collapsed.trim().is_empty() {
            if is_inline(prev) && is_inline(next) {
                self.out.push(' ');
            }
            return;
        }
        let mut slice = collapsed.as_str();
        if !is_inline(prev) {
            slice = slice.trim_start();
        }
        if !is_inline(next) {
            slice = slice.trim_end();
        }
        self.out.push_str(&escape_text(slice));
    }

    fn element(
        &mut self,
        handle: &Handle,
        name: &QualName,
        attrs: &RefCell<Vec<Attribute>>,
        template_contents: &RefCell<Option<Handle>>,
        ctx: Context<'_>,
    ) {
        let tag = name.local.to_string();
        let mut attributes: Vec<(String, String)> = attrs
            .borrow()
            .iter()
            .map(|a| (attribute_name(a), a.value.to_string()))
            .collect();

        match tag.as_str() {
            "img" => self.inline_data_uri(&tag, "src", &mut attributes),
            "link" => {
                let rel = get(&attributes, "rel").unwrap_or_default().to_ascii_lowercase();
                let rels: Vec<&str> = rel.split_ascii_whitespace().collect();
                if rels.contains(&"stylesheet") {
                    if let Some(css_text) = get(&attributes, "href")
                        .and_then(|href| self.inliner.text(&tag, "href", &href))
                    {
                        self.inline_style(&attributes, &css_text);
                        return;
                    }
                } else if rels.contains(&"icon") {
                    self.inline_data_uri(&tag, "href", &mut attributes);
                }
            }
            "script" => {
                if let Some(source) = get(&attributes, "src")
                    .and_then(|src| self.inliner.text(&tag, "src", &src))
                {
                    attributes.retain(|(name, _)| name != "src");
                    self.open_tag(&tag, &attributes);
                    self.out.push_str(&source.replace("</script", "<\\/script"));
                    self.out.push_str("</script>");
                    return;
                }
            }
            _ => {}
        }

        self.open_tag(&tag, &attributes);
        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }

        let preserve = ctx.preserve
            || PRESERVE_ELEMENTS.contains(&tag.as_str())
            || &*name.ns == SVG_NS;
        let inner = Context {
            parent: &tag,
            preserve,
        };
        self.children(handle, inner);
        if let Some(content) = template_contents.borrow().as_ref() {
            self.children(content, inner);
        }

        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn inline_data_uri(&mut self, tag: &str, attribute: &str, attributes: &mut [(String, String)]) {
        let Some(reference) = get(attributes, attribute) else {
            return;
        };
        if let Some(uri) = self.inliner.data_uri(tag, attribute, &reference) {
            set(attributes, attribute, uri);
        }
    }

    fn inline_style(&mut self, link_attributes: &[(String, String)], css_text: &str) {
        self.out.push_str("<style");
        if let Some(media) = get(link_attributes, "media") {
            self.out.push_str(&format!(" media=\"{}\"", escape_attribute(&media)));
        }
        self.out.push('>');
        if self.minify {
            self.out.push_str(&css::minify(css_text));
        } else {
            self.out.push_str(css_text);
        }
        self.out.push_str("</style>");
    }

    fn open_tag(&mut self, tag: &str, attributes: &[(String, String)]) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attributes {
            self.out.push(' ');
            self.out.push_str(name);
            if self.minify && value.is_empty() {
                continue;
            }
            let value = if self.minify && name == "style" {
                css::minify_declarations(value)
            } else {
                value.clone()
            };
            self.out.push_str("=\"");
            self.out.push_str(&escape_attribute(&value));
            self.out.push('"');
        }
        self.out.push('>');
    }
}

fn attribute_name(attr: &Attribute) -> String {
    match &attr.name.prefix {
        Some(prefix) => format!("{}:{}", prefix, attr.name.local),
        None => attr.name.local.to_string(),
    }
}

fn get(attributes: &[(String, String)], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

fn set(attributes: &mut [(String, String)], name: &str, value: String) {
    if let Some(slot) = attributes.iter_mut().find(|(n, _)| n == name) {
        slot.1 = value;
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), " a b ");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
    }
}
