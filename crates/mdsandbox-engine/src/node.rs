use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Tag of a node in the parsed document tree.
///
/// Tags are transmitted by the module as `u32` ordinals in declaration order
/// (`Text = 0` .. `TableCell = 15`). Tags outside that range are preserved as
/// [`NodeType::Unrecognized`] so the validator can report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Text,
    Paragraph,
    Heading,
    List,
    ListItem,
    Blockquote,
    CodeBlock,
    HorizontalRule,
    Image,
    Link,
    Bold,
    Italic,
    Code,
    Table,
    TableRow,
    TableCell,
    Unrecognized(u32),
}

impl NodeType {
    const KNOWN: [NodeType; 16] = [
        NodeType::Text,
        NodeType::Paragraph,
        NodeType::Heading,
        NodeType::List,
        NodeType::ListItem,
        NodeType::Blockquote,
        NodeType::CodeBlock,
        NodeType::HorizontalRule,
        NodeType::Image,
        NodeType::Link,
        NodeType::Bold,
        NodeType::Italic,
        NodeType::Code,
        NodeType::Table,
        NodeType::TableRow,
        NodeType::TableCell,
    ];

    pub fn from_tag(tag: u32) -> Self {
        Self::KNOWN
            .get(tag as usize)
            .copied()
            .unwrap_or(NodeType::Unrecognized(tag))
    }

    pub fn tag(self) -> u32 {
        match self {
            NodeType::Unrecognized(tag) => tag,
            known => Self::KNOWN
                .iter()
                .position(|k| *k == known)
                .map(|i| i as u32)
                .unwrap_or(u32::MAX),
        }
    }

    pub fn is_recognized(self) -> bool {
        !matches!(self, NodeType::Unrecognized(_))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Text => "TEXT",
            NodeType::Paragraph => "PARAGRAPH",
            NodeType::Heading => "HEADING",
            NodeType::List => "LIST",
            NodeType::ListItem => "LIST_ITEM",
            NodeType::Blockquote => "BLOCKQUOTE",
            NodeType::CodeBlock => "CODE_BLOCK",
            NodeType::HorizontalRule => "HORIZONTAL_RULE",
            NodeType::Image => "IMAGE",
            NodeType::Link => "LINK",
            NodeType::Bold => "BOLD",
            NodeType::Italic => "ITALIC",
            NodeType::Code => "CODE",
            NodeType::Table => "TABLE",
            NodeType::TableRow => "TABLE_ROW",
            NodeType::TableCell => "TABLE_CELL",
            NodeType::Unrecognized(tag) => return write!(f, "UNRECOGNIZED({tag})"),
        };
        f.write_str(name)
    }
}

/// Free-form attribute value attached to a node (heading level, link target, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Str(v) => f.write_str(v),
            AttributeValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// A tagged node in the document tree.
///
/// `start`/`end` are byte offsets into the parsed text. Decoded nodes carry
/// `content == text[start..end]`; synthetic inline nodes span their delimiters
/// and carry only the inner text as `content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedNode {
    pub node_type: NodeType,
    pub start: u32,
    pub end: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ParsedNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl ParsedNode {
    pub fn new(node_type: NodeType, start: u32, end: u32) -> Self {
        Self {
            node_type,
            start,
            end,
            content: None,
            children: None,
            attributes: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ParsedNode>) -> Self {
        self.children = Some(children);
        self
    }

    /// Sets a single attribute, creating the map on first use.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.attributes
            .get_or_insert_with(Attributes::new)
            .insert(key.to_string(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.as_ref()?.get(key)
    }

    pub fn children(&self) -> &[ParsedNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Self::subtree_len).sum::<usize>()
    }

    /// Depth-first, pre-order walk over this subtree.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ParsedNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Outcome of one parse invocation. Immutable once built; the cache hands out
/// shared references to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub nodes: Vec<ParsedNode>,
    /// Wall-clock time of the module invocation only.
    pub parse_time_ms: f64,
    /// Number of top-level nodes the module reported.
    pub node_count: u32,
    /// Module heap usage in bytes, as reported by the module after the call.
    pub memory_used: u32,
}

impl ParseResult {
    /// Calls `visit` for every node in every tree, pre-order.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a ParsedNode)) {
        for node in &self.nodes {
            node.walk(&mut visit);
        }
    }
}
