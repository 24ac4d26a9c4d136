//! Advisory structural checks over a decoded tree.
//!
//! Findings are logged at `warn` and returned for inspection; nothing here
//! fails a parse or touches the nodes.

use std::fmt;

use crate::node::{NodeType, ParsedNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    InvertedSpan { start: u32, end: u32 },
    SpanPastEnd { end: u32, text_len: u32 },
    UnrecognizedType(u32),
    EmptyContainer(NodeType),
}

/// One finding, located by child indices from the top-level list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub path: Vec<usize>,
    pub kind: WarningKind,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "node {path}: ")?;
        match &self.kind {
            WarningKind::InvertedSpan { start, end } => {
                write!(f, "end {end} precedes start {start}")
            }
            WarningKind::SpanPastEnd { end, text_len } => {
                write!(f, "end {end} is past the end of the text ({text_len} bytes)")
            }
            WarningKind::UnrecognizedType(tag) => write!(f, "unrecognized node type {tag}"),
            WarningKind::EmptyContainer(node_type) => write!(f, "{node_type} has no children"),
        }
    }
}

/// Checks every node in `nodes` against a text of `text_len` bytes.
pub fn validate(nodes: &[ParsedNode], text_len: u32) -> Vec<ValidationWarning> {
    let mut warnings = vec![];
    let mut path = vec![];
    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        check(node, text_len, &mut path, &mut warnings);
        path.pop();
    }
    for warning in &warnings {
        log::warn!("structure: {warning}");
    }
    warnings
}

fn check(
    node: &ParsedNode,
    text_len: u32,
    path: &mut Vec<usize>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut report = |kind| {
        warnings.push(ValidationWarning {
            path: path.clone(),
            kind,
        })
    };

    if node.end < node.start {
        report(WarningKind::InvertedSpan {
            start: node.start,
            end: node.end,
        });
    }
    if node.end > text_len {
        report(WarningKind::SpanPastEnd {
            end: node.end,
            text_len,
        });
    }
    match node.node_type {
        NodeType::Unrecognized(tag) => report(WarningKind::UnrecognizedType(tag)),
        NodeType::List | NodeType::Table if node.is_leaf() => {
            report(WarningKind::EmptyContainer(node.node_type))
        }
        _ => {}
    }

    for (i, child) in node.children().iter().enumerate() {
        path.push(i);
        check(child, text_len, path, warnings);
        path.pop();
    }
}
