//! Template syntax tree.

/// A parsed template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `doctype <value>`.
    Doctype(String),

    /// An HTML element.
    Element(Element),

    /// Plain text, subject to tag interpolation at render time.
    Text(Text),

    /// Buffered `//` comment.
    Comment(String),

    /// `include <path>`, replaced by the included nodes while linking.
    Include { path: String, line: usize },

    /// `extends <path>`, consumed while linking.
    Extends { path: String, line: usize },

    /// Named block, overridable by extending templates.
    Block {
        name: String,
        mode: BlockMode,
        children: Vec<Node>,
        line: usize,
    },

    /// `mixin <name>` definition.
    MixinDef {
        name: String,
        children: Vec<Node>,
        line: usize,
    },

    /// `+<name>` call; `children` fill the mixin's `block` slot.
    MixinCall {
        name: String,
        children: Vec<Node>,
        line: usize,
    },

    /// Bare `block` inside a mixin body.
    MixinBlock,
}

/// How an extending template's block combines with its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Replace,
    Append,
    Prepend,
}

/// Text content with its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    pub line: usize,
}

/// An element with shorthand and parenthesised attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<Attr>,
    pub self_closing: bool,
    pub children: Vec<Node>,
    pub line: usize,
    pub column: usize,
}

/// A single `name=value` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
    /// `!=` was used, the value is emitted unescaped.
    pub unescaped: bool,
    pub line: usize,
    pub column: usize,
}

/// Attribute value; only literals are supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
}

impl Element {
    pub(crate) fn new(tag: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            self_closing: false,
            children: Vec::new(),
            line,
            column,
        }
    }
}

/// Depth-first visit of every element in `nodes`, including nested blocks.
pub fn walk_elements<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Element)) {
    for node in nodes {
        match node {
            Node::Element(el) => {
                visit(el);
                walk_elements(&el.children, visit);
            }
            Node::Block { children, .. }
            | Node::MixinDef { children, .. }
            | Node::MixinCall { children, .. } => walk_elements(children, visit),
            _ => {}
        }
    }
}
