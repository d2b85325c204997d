//! Indentation-based template parser.
//!
//! The parser works line by line: each non-blank line produces zero or more
//! nodes, and lines indented deeper than their predecessor become its
//! children. Parsing never touches the filesystem; `include` and `extends`
//! are resolved later by the compiler.

use crate::ast::{Attr, AttrValue, BlockMode, Element, Node, Text};

/// Keywords that introduce JavaScript control flow.
const CODE_KEYWORDS: &[&str] = &[
    "if", "else", "unless", "each", "for", "while", "case", "when", "default", "yield",
];

/// Parse failure before a file path is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
    pub unsupported: bool,
}

impl ParseError {
    fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            unsupported: false,
        }
    }

    fn unsupported(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            unsupported: true,
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    no: usize,
    indent: usize,
    raw: &'a str,
    text: &'a str,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// What follows the tag, id, classes and attributes on an element line.
#[derive(Debug)]
enum TagRest<'a> {
    None,
    Text(&'a str),
    BlockText,
    Expansion(&'a str),
}

/// Parse template source into a node tree.
pub fn parse(source: &str) -> Result<Vec<Node>> {
    let lines = source
        .lines()
        .enumerate()
        .map(|(idx, raw)| {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            let indent = raw.bytes().take_while(|b| *b == b' ' || *b == b'\t').count();
            Line {
                no: idx + 1,
                indent,
                raw,
                text: &raw[indent..],
            }
        })
        .collect();

    let mut parser = Parser { lines, pos: 0 };
    parser.parse_block(None)
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek_nonblank(&mut self) -> Option<Line<'a>> {
        while let Some(line) = self.lines.get(self.pos) {
            if !line.is_blank() {
                return Some(*line);
            }
            self.pos += 1;
        }
        None
    }

    fn parse_block(&mut self, parent_indent: Option<usize>) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut level = None;

        while let Some(line) = self.peek_nonblank() {
            if parent_indent.is_some_and(|parent| line.indent <= parent) {
                break;
            }
            match level {
                None => level = Some(line.indent),
                Some(level) if line.indent < level => {
                    return Err(ParseError::syntax(line.no, "inconsistent indentation"));
                }
                Some(level) if line.indent > level => {
                    return Err(ParseError::syntax(line.no, "unexpected indentation"));
                }
                Some(_) => {}
            }
            nodes.extend(self.parse_line()?);
        }

        Ok(nodes)
    }

    fn parse_line(&mut self) -> Result<Vec<Node>> {
        let line = self.lines[self.pos];
        self.pos += 1;
        let text = line.text;

        if text.starts_with("//-") {
            self.skip_children(line.indent);
            return Ok(Vec::new());
        }

        if let Some(body) = text.strip_prefix("//") {
            let nested = self.collect_block_text(line.indent);
            let comment = if nested.is_empty() {
                body.to_string()
            } else {
                format!("{body}\n{nested}")
            };
            return Ok(vec![Node::Comment(comment)]);
        }

        if let Some(piped) = text.strip_prefix('|') {
            let value = piped.strip_prefix(' ').unwrap_or(piped);
            return Ok(vec![Node::Text(Text {
                value: value.to_string(),
                line: line.no,
            })]);
        }

        if text.starts_with('<') {
            let mut nodes = vec![Node::Text(Text {
                value: text.to_string(),
                line: line.no,
            })];
            nodes.extend(self.parse_block(Some(line.indent))?);
            return Ok(nodes);
        }

        if text.starts_with('-') || text.starts_with('=') || text.starts_with("!=") {
            return Err(ParseError::unsupported(line.no, "inline code"));
        }

        let trimmed = text.trim_end();
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };

        if CODE_KEYWORDS.contains(&word) {
            return Err(ParseError::unsupported(
                line.no,
                format!("`{word}` control flow"),
            ));
        }

        match word {
            "doctype" => {
                let value = if rest.is_empty() { "html" } else { rest };
                Ok(vec![Node::Doctype(value.to_string())])
            }
            "include" => {
                if rest.is_empty() {
                    return Err(ParseError::syntax(line.no, "include requires a path"));
                }
                Ok(vec![Node::Include {
                    path: rest.to_string(),
                    line: line.no,
                }])
            }
            "extends" | "extend" => {
                if rest.is_empty() {
                    return Err(ParseError::syntax(line.no, "extends requires a path"));
                }
                Ok(vec![Node::Extends {
                    path: rest.to_string(),
                    line: line.no,
                }])
            }
            "block" if rest.is_empty() => Ok(vec![Node::MixinBlock]),
            "block" | "append" | "prepend" => {
                let (mode, name) = match (word, rest.split_once(char::is_whitespace)) {
                    ("append", _) => (BlockMode::Append, rest),
                    ("prepend", _) => (BlockMode::Prepend, rest),
                    (_, Some(("append", name))) => (BlockMode::Append, name.trim()),
                    (_, Some(("prepend", name))) => (BlockMode::Prepend, name.trim()),
                    _ => (BlockMode::Replace, rest),
                };
                if name.is_empty() || name.contains(char::is_whitespace) {
                    return Err(ParseError::syntax(line.no, "invalid block name"));
                }
                let children = self.parse_block(Some(line.indent))?;
                Ok(vec![Node::Block {
                    name: name.to_string(),
                    mode,
                    children,
                    line: line.no,
                }])
            }
            "mixin" => {
                if rest.contains('(') {
                    return Err(ParseError::unsupported(line.no, "mixin arguments"));
                }
                if rest.is_empty() || !is_ident(rest) {
                    return Err(ParseError::syntax(line.no, "invalid mixin name"));
                }
                let children = self.parse_block(Some(line.indent))?;
                Ok(vec![Node::MixinDef {
                    name: rest.to_string(),
                    children,
                    line: line.no,
                }])
            }
            _ if trimmed.starts_with('+') => {
                let name = &trimmed[1..];
                if name.contains('(') {
                    return Err(ParseError::unsupported(line.no, "mixin arguments"));
                }
                if !is_ident(name) {
                    return Err(ParseError::syntax(line.no, "invalid mixin call"));
                }
                let children = self.parse_block(Some(line.indent))?;
                Ok(vec![Node::MixinCall {
                    name: name.to_string(),
                    children,
                    line: line.no,
                }])
            }
            _ => self.parse_element_line(line).map(|el| vec![Node::Element(el)]),
        }
    }

    fn parse_element_line(&mut self, line: Line<'a>) -> Result<Element> {
        let joined;
        let source = if attr_list_unclosed(line.text) {
            joined = self.join_attribute_lines(line)?;
            joined.as_str()
        } else {
            line.text
        };

        self.parse_tag_chain(source, line)
    }

    /// Parse `tag: tag: tag text`, attaching indented children to the innermost tag.
    fn parse_tag_chain(&mut self, source: &str, line: Line<'a>) -> Result<Element> {
        let column = line.raw.len() - line.text.len() + 1;
        let (mut el, rest) = parse_tag(source, line.no, column)?;

        match rest {
            TagRest::None => el.children = self.parse_block(Some(line.indent))?,
            TagRest::Text(text) => {
                el.children.push(Node::Text(Text {
                    value: text.to_string(),
                    line: line.no,
                }));
                el.children.extend(self.parse_block(Some(line.indent))?);
            }
            TagRest::BlockText => {
                let value = self.collect_block_text(line.indent);
                if !value.is_empty() {
                    el.children.push(Node::Text(Text {
                        value,
                        line: line.no + 1,
                    }));
                }
            }
            TagRest::Expansion(inner) => {
                if inner.is_empty() {
                    return Err(ParseError::syntax(line.no, "expected a tag after `:`"));
                }
                let child = self.parse_tag_chain(inner, line)?;
                el.children.push(Node::Element(child));
            }
        }

        if el.self_closing && !el.children.is_empty() {
            return Err(ParseError::syntax(
                line.no,
                format!("self-closing element <{}> cannot have content", el.tag),
            ));
        }

        Ok(el)
    }

    fn join_attribute_lines(&mut self, first: Line<'a>) -> Result<String> {
        let mut joined = first.text.to_string();
        while attr_list_unclosed(&joined) {
            let Some(next) = self.lines.get(self.pos) else {
                return Err(ParseError::syntax(first.no, "unterminated attribute list"));
            };
            joined.push(' ');
            joined.push_str(next.text.trim());
            self.pos += 1;
        }
        Ok(joined)
    }

    /// Consume lines indented deeper than `indent` as raw text.
    fn collect_block_text(&mut self, indent: usize) -> String {
        let start = self.pos;
        let mut end = self.pos;
        let mut scan = self.pos;
        while let Some(line) = self.lines.get(scan) {
            if line.is_blank() {
                scan += 1;
                continue;
            }
            if line.indent <= indent {
                break;
            }
            scan += 1;
            end = scan;
        }
        self.pos = end;

        let body = &self.lines[start..end];
        let min_indent = body
            .iter()
            .filter(|l| !l.is_blank())
            .map(|l| l.indent)
            .min()
            .unwrap_or(0);

        body.iter()
            .map(|l| if l.is_blank() { "" } else { &l.raw[min_indent..] })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn skip_children(&mut self, indent: usize) {
        self.collect_block_text(indent);
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Whether the line opens a tag attribute list that it does not close.
fn attr_list_unclosed(s: &str) -> bool {
    let Some(open) = s.find('(') else {
        return false;
    };
    if !s[..open]
        .chars()
        .all(|c| is_name_char(c) || matches!(c, '#' | '.' | ':'))
    {
        return false;
    }

    let mut depth = 0;
    let mut quote = None;
    let mut escaped = false;
    for c in s[open..].chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Parse a single tag with shorthand, attributes and trailing content.
fn parse_tag(s: &str, line: usize, column: usize) -> Result<(Element, TagRest<'_>)> {
    let tag_len = s
        .char_indices()
        .take_while(|(i, c)| {
            if *i == 0 {
                c.is_ascii_alphabetic()
            } else {
                is_name_char(*c) || (*c == ':' && s[i + 1..].starts_with(is_name_char))
            }
        })
        .count();

    let mut el = if tag_len > 0 {
        Element::new(&s[..tag_len], line, column)
    } else if (s.starts_with('#') || s.starts_with('.')) && s[1..].starts_with(is_name_char) {
        Element::new("div", line, column)
    } else {
        return Err(ParseError::syntax(
            line,
            format!("unexpected text `{}`", s.trim()),
        ));
    };

    let mut i = tag_len;
    loop {
        let rest = &s[i..];
        if let Some(after) = rest.strip_prefix('#').filter(|a| a.starts_with(is_name_char)) {
            let len = after.chars().take_while(|c| is_name_char(*c)).count();
            if el.id.is_some() {
                return Err(ParseError::syntax(line, "element has more than one id"));
            }
            el.id = Some(after[..len].to_string());
            i += 1 + len;
        } else if let Some(after) = rest.strip_prefix('.') {
            if after.starts_with(is_name_char) {
                let len = after.chars().take_while(|c| is_name_char(*c)).count();
                el.classes.push(after[..len].to_string());
                i += 1 + len;
            } else if after.trim().is_empty() {
                return Ok((el, TagRest::BlockText));
            } else {
                return Err(ParseError::syntax(line, "unexpected `.`"));
            }
        } else if rest.starts_with('(') {
            let (attrs, consumed) = parse_attrs(rest, line, column + i)?;
            el.attrs.extend(attrs);
            i += consumed;
        } else if rest.starts_with("&attributes") {
            return Err(ParseError::unsupported(line, "&attributes"));
        } else {
            break;
        }
    }

    let rest = &s[i..];
    if let Some(after) = rest.strip_prefix('/') {
        el.self_closing = true;
        if !after.trim().is_empty() {
            return Err(ParseError::syntax(
                line,
                "self-closing element cannot have content",
            ));
        }
        return Ok((el, TagRest::None));
    }

    if let Some(after) = rest.strip_prefix(':') {
        return Ok((el, TagRest::Expansion(after.trim())));
    }
    if rest.starts_with('=') || rest.starts_with("!=") {
        return Err(ParseError::unsupported(line, "buffered code"));
    }
    if rest.trim().is_empty() {
        return Ok((el, TagRest::None));
    }
    if let Some(text) = rest.strip_prefix(' ') {
        return Ok((el, TagRest::Text(text)));
    }

    Err(ParseError::syntax(
        line,
        format!("unexpected `{}` after <{}>", rest.trim(), el.tag),
    ))
}

/// Parse `( ... )` starting at `s[0] == '('`; returns the attributes and the
/// number of bytes consumed.
fn parse_attrs(s: &str, line: usize, column: usize) -> Result<(Vec<Attr>, usize)> {
    let bytes = s.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 1;

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(ParseError::syntax(line, "unterminated attribute list"));
        }
        if bytes[i] == b')' {
            return Ok((attrs, i + 1));
        }

        let name_start = i;
        while i < bytes.len() && !matches!(bytes[i], b'=' | b',' | b')' | b'!')
            && !bytes[i].is_ascii_whitespace()
        {
            i += 1;
        }
        let name = &s[name_start..i];
        if name.is_empty() {
            return Err(ParseError::syntax(
                line,
                "unexpected character in attribute list",
            ));
        }

        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }

        let (value, unescaped) = if s[i..].starts_with("!=") {
            i += 2;
            let (value, len) = parse_attr_value(&s[i..], line)?;
            i += len;
            (value, true)
        } else if s[i..].starts_with('=') {
            i += 1;
            let (value, len) = parse_attr_value(&s[i..], line)?;
            i += len;
            (value, false)
        } else {
            (AttrValue::Bool(true), false)
        };

        attrs.push(Attr {
            name: name.to_string(),
            value,
            unescaped,
            line,
            column: column + name_start,
        });
    }
}

fn parse_attr_value(s: &str, line: usize) -> Result<(AttrValue, usize)> {
    let leading = s.len() - s.trim_start().len();
    let s = &s[leading..];
    let mut chars = s.char_indices();

    match chars.next() {
        Some((_, quote @ ('\'' | '"'))) => {
            let mut value = String::new();
            let mut escaped = false;
            for (idx, c) in chars {
                if escaped {
                    value.push(match c {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    return Ok((AttrValue::Str(value), leading + idx + 1));
                } else {
                    value.push(c);
                }
            }
            Err(ParseError::syntax(line, "unterminated attribute string"))
        }
        Some((_, '`')) => Err(ParseError::unsupported(line, "template literal attribute")),
        Some(_) => {
            let len = s
                .find(|c: char| c.is_whitespace() || c == ',' || c == ')')
                .unwrap_or(s.len());
            let token = &s[..len];
            let value = match token {
                "true" => AttrValue::Bool(true),
                "false" => AttrValue::Bool(false),
                _ if token.parse::<f64>().is_ok() => AttrValue::Str(token.to_string()),
                _ => {
                    return Err(ParseError::unsupported(
                        line,
                        format!("attribute expression `{token}`"),
                    ));
                }
            };
            Ok((value, leading + len))
        }
        None => Err(ParseError::syntax(line, "missing attribute value")),
    }
}
