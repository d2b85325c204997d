//! HTML generation from a linked node tree.

use std::collections::HashMap;

use crate::{
    ast::{AttrValue, Element, Node, Text},
    parser::{ParseError, parse},
};

/// Elements rendered without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const MAX_MIXIN_DEPTH: usize = 64;

/// Render nodes to compact HTML.
///
/// `terse` selects HTML5 output (`<img>`, bare boolean attributes); a
/// `doctype` node in the tree overrides it from that point on.
pub fn render(nodes: &[Node], terse: bool) -> Result<String, ParseError> {
    let mut renderer = Renderer::new(terse);
    collect_mixins(nodes, &mut renderer.mixins);
    renderer.render_nodes(nodes)?;
    Ok(renderer.out)
}

/// Escape text for use inside an attribute value or element body.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn doctype_html(value: &str) -> String {
    match value {
        "html" => "<!DOCTYPE html>".to_string(),
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#.to_string(),
        "transitional" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#.to_string(),
        "strict" => r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#.to_string(),
        other => format!("<!DOCTYPE {other}>"),
    }
}

fn collect_mixins<'n>(nodes: &'n [Node], mixins: &mut HashMap<&'n str, &'n [Node]>) {
    for node in nodes {
        match node {
            Node::MixinDef { name, children, .. } => {
                mixins.insert(name.as_str(), children.as_slice());
                collect_mixins(children, mixins);
            }
            Node::Element(Element { children, .. })
            | Node::Block { children, .. }
            | Node::MixinCall { children, .. } => collect_mixins(children, mixins),
            _ => {}
        }
    }
}

struct Renderer<'n> {
    out: String,
    terse: bool,
    mixins: HashMap<&'n str, &'n [Node]>,
    slots: Vec<&'n [Node]>,
}

impl<'n> Renderer<'n> {
    fn new(terse: bool) -> Self {
        Self {
            out: String::new(),
            terse,
            mixins: HashMap::new(),
            slots: Vec::new(),
        }
    }

    fn render_nodes(&mut self, nodes: &'n [Node]) -> Result<(), ParseError> {
        let mut previous_text = false;
        for node in nodes {
            let is_text = matches!(node, Node::Text(_));
            if is_text && previous_text {
                self.out.push('\n');
            }
            previous_text = is_text;
            self.render_node(node)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &'n Node) -> Result<(), ParseError> {
        match node {
            Node::Doctype(value) => {
                self.terse = value == "html";
                self.out.push_str(&doctype_html(value));
            }
            Node::Element(el) => self.render_element(el)?,
            Node::Text(text) => self.render_text(text)?,
            Node::Comment(body) => {
                self.out.push_str("<!--");
                self.out.push_str(body);
                self.out.push_str("-->");
            }
            Node::Include { line, .. } | Node::Extends { line, .. } => {
                return Err(ParseError {
                    line: *line,
                    message: "include/extends must be resolved before rendering".to_string(),
                    unsupported: false,
                });
            }
            Node::Block { children, .. } => self.render_nodes(children)?,
            Node::MixinDef { .. } => {}
            Node::MixinCall {
                name,
                children,
                line,
            } => {
                let body = self.mixins.get(name.as_str()).copied().ok_or_else(|| ParseError {
                    line: *line,
                    message: format!("unknown mixin `{name}`"),
                    unsupported: false,
                })?;
                if self.slots.len() >= MAX_MIXIN_DEPTH {
                    return Err(ParseError {
                        line: *line,
                        message: format!("mixin `{name}` nests too deeply"),
                        unsupported: false,
                    });
                }
                self.slots.push(children);
                let result = self.render_nodes(body);
                self.slots.pop();
                result?;
            }
            Node::MixinBlock => {
                // Slot content belongs to the caller, so it renders with the
                // caller's own slot in scope.
                if let Some(slot) = self.slots.pop() {
                    let result = self.render_nodes(slot);
                    self.slots.push(slot);
                    result?;
                }
            }
        }
        Ok(())
    }

    fn render_element(&mut self, el: &'n Element) -> Result<(), ParseError> {
        let is_void = VOID_ELEMENTS.contains(&el.tag.as_str());
        if is_void && !el.children.is_empty() {
            return Err(ParseError {
                line: el.line,
                message: format!("void element <{}> cannot have content", el.tag),
                unsupported: false,
            });
        }

        self.out.push('<');
        self.out.push_str(&el.tag);
        self.render_attributes(el);

        if el.self_closing {
            self.out.push_str("/>");
            return Ok(());
        }
        if is_void {
            self.out.push_str(if self.terse { ">" } else { "/>" });
            return Ok(());
        }

        self.out.push('>');
        self.render_nodes(&el.children)?;
        self.out.push_str("</");
        self.out.push_str(&el.tag);
        self.out.push('>');
        Ok(())
    }

    /// Attribute order: `id`, `class`, then the rest as written.
    fn render_attributes(&mut self, el: &Element) {
        let attr_id = el.attrs.iter().find_map(|a| match (&a.value, a.name.as_str()) {
            (AttrValue::Str(v), "id") => Some(v.as_str()),
            _ => None,
        });
        if let Some(id) = el.id.as_deref().or(attr_id) {
            self.push_attr("id", &escape_html(id));
        }

        let mut classes: Vec<String> = el.classes.clone();
        for attr in el.attrs.iter().filter(|a| a.name == "class") {
            if let AttrValue::Str(value) = &attr.value {
                classes.extend(value.split_whitespace().map(str::to_string));
            }
        }
        if !classes.is_empty() {
            self.push_attr("class", &escape_html(&classes.join(" ")));
        }

        for attr in el.attrs.iter().filter(|a| a.name != "class" && a.name != "id") {
            match &attr.value {
                AttrValue::Bool(false) => {}
                AttrValue::Bool(true) if self.terse => {
                    self.out.push(' ');
                    self.out.push_str(&attr.name);
                }
                AttrValue::Bool(true) => self.push_attr(&attr.name, &attr.name),
                AttrValue::Str(value) if attr.unescaped => self.push_attr(&attr.name, value),
                AttrValue::Str(value) => self.push_attr(&attr.name, &escape_html(value)),
            }
        }
    }

    fn push_attr(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(value);
        self.out.push('"');
    }

    /// Emit text verbatim, expanding `#[tag ...]` interpolation.
    fn render_text(&mut self, text: &Text) -> Result<(), ParseError> {
        let value = text.value.as_str();
        let mut i = 0;

        while i < value.len() {
            let rest = &value[i..];
            if let Some(escaped) = ["\\#[", "\\#{", "\\!{"]
                .iter()
                .find(|p| rest.starts_with(**p))
            {
                self.out.push_str(&escaped[1..]);
                i += escaped.len();
            } else if rest.starts_with("#{") || rest.starts_with("!{") {
                return Err(ParseError {
                    line: text.line,
                    message: "text interpolation".to_string(),
                    unsupported: true,
                });
            } else if rest.starts_with("#[") {
                let end = matching_bracket(rest).ok_or_else(|| ParseError {
                    line: text.line,
                    message: "unterminated tag interpolation".to_string(),
                    unsupported: false,
                })?;
                let nodes = parse(&rest[2..end]).map_err(|e| ParseError {
                    line: text.line,
                    ..e
                })?;
                let mut inner = Renderer::new(self.terse);
                inner.render_nodes(&nodes)?;
                self.out.push_str(&inner.out);
                i += end + 1;
            } else {
                let c = rest.chars().next().unwrap_or_default();
                self.out.push(c);
                i += c.len_utf8().max(1);
            }
        }

        Ok(())
    }
}

/// Byte index of the `]` closing the `#[` at the start of `s`.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0;
    let mut quote = None;
    for (idx, c) in s.char_indices().skip(1) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(source: &str) -> String {
        let nodes = parse(source).expect("parse");
        render(&nodes, true).expect("render")
    }

    #[test]
    fn test_document() {
        let out = html("doctype html\nhtml(lang=\"en\")\n  head\n    title Home\n  body\n    h1.title Hello");
        assert_eq!(
            out,
            "<!DOCTYPE html><html lang=\"en\"><head><title>Home</title></head><body><h1 class=\"title\">Hello</h1></body></html>"
        );
    }

    #[test]
    fn test_attribute_order_and_merge() {
        let out = html("a.btn#cta(href=\"/go\" class=\"big\") Go");
        assert_eq!(out, "<a id=\"cta\" class=\"btn big\" href=\"/go\">Go</a>");
    }

    #[test]
    fn test_attribute_escaping() {
        assert_eq!(
            html("a(title=\"<b> & \\\"q\\\"\")"),
            "<a title=\"&lt;b&gt; &amp; &quot;q&quot;\"></a>"
        );
        assert_eq!(html("div(data-raw!=\"<i>\")"), "<div data-raw=\"<i>\"></div>");
    }

    #[test]
    fn test_boolean_attributes() {
        assert_eq!(
            html("input(type=\"checkbox\" checked disabled=false)"),
            "<input type=\"checkbox\" checked>"
        );
        let nodes = parse("input(checked)").expect("parse");
        assert_eq!(render(&nodes, false).expect("render"), "<input checked=\"checked\"/>");
    }

    #[test]
    fn test_void_and_self_closing() {
        assert_eq!(html("img(src=\"a.png\")"), "<img src=\"a.png\">");
        assert_eq!(html("br"), "<br>");
        assert_eq!(html("foo/"), "<foo/>");
        let nodes = parse("img\n  p").expect("parse");
        assert!(render(&nodes, true).is_err());
    }

    #[test]
    fn test_text_variants() {
        assert_eq!(html("p\n  | one\n  | two"), "<p>one\ntwo</p>");
        assert_eq!(html("p.\n  raw <em>text</em>"), "<p>raw <em>text</em></p>");
        assert_eq!(html("p A #[strong bold] word"), "<p>A <strong>bold</strong> word</p>");
        assert_eq!(html("p \\#[not a tag]"), "<p>#[not a tag]</p>");
    }

    #[test]
    fn test_text_interpolation_is_unsupported() {
        let nodes = parse("p Hello #{name}").expect("parse");
        let err = render(&nodes, true).expect_err("should fail");
        assert!(err.unsupported);
    }

    #[test]
    fn test_comments() {
        assert_eq!(html("// note\np"), "<!-- note--><p></p>");
        assert_eq!(html("//- hidden\np"), "<p></p>");
    }

    #[test]
    fn test_mixins_with_block() {
        let out = html("mixin card\n  .card\n    block\nsection\n  +card\n    p Inside");
        assert_eq!(out, "<section><div class=\"card\"><p>Inside</p></div></section>");
    }

    #[test]
    fn test_unknown_mixin() {
        let nodes = parse("+missing").expect("parse");
        let err = render(&nodes, true).expect_err("should fail");
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn test_recursive_mixin_is_bounded() {
        let nodes = parse("mixin loop\n  +loop\n+loop").expect("parse");
        assert!(render(&nodes, true).is_err());
    }

    #[test]
    fn test_doctype_xml_disables_terse() {
        assert_eq!(
            html("doctype xml\nitem(flag)"),
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?><item flag=\"flag\"></item>"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
