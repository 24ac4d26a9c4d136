//! # HTML Renderer
//!
//! Turns a node tree back into markup, mainly for round-trip checks and the
//! command-line `--html` view. Stateless and infallible.
//!
//! Nodes that carry inline text (paragraphs, headings, list items, cells,
//! links and emphasis) interleave the parts of their content not covered by a
//! child with the rendered children. Pure containers (lists, tables, rows,
//! block quotes) render their children only. Each leaf's content therefore
//! appears exactly once in the output.

use html_escape::encode_quoted_attribute_to_string;

use crate::node::{AttributeValue, NodeType, ParsedNode};

/// Renders `nodes`, one top-level block per line.
pub fn to_html(nodes: &[ParsedNode]) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render(node, &mut out);
    }
    out
}

/// Tag name for `node_type`, or `None` when the node contributes only its
/// content.
pub fn tag_name(node: &ParsedNode) -> Option<&'static str> {
    Some(match node.node_type {
        NodeType::Text | NodeType::Unrecognized(_) => return None,
        NodeType::Paragraph => "p",
        NodeType::Heading => match heading_level(node) {
            1 => "h1",
            2 => "h2",
            3 => "h3",
            4 => "h4",
            5 => "h5",
            _ => "h6",
        },
        NodeType::List if node.attribute("ordered") == Some(&AttributeValue::Bool(true)) => "ol",
        NodeType::List => "ul",
        NodeType::ListItem => "li",
        NodeType::Blockquote => "blockquote",
        NodeType::CodeBlock => "pre",
        NodeType::HorizontalRule => "hr",
        NodeType::Image => "img",
        NodeType::Link => "a",
        NodeType::Bold => "strong",
        NodeType::Italic => "em",
        NodeType::Code => "code",
        NodeType::Table => "table",
        NodeType::TableRow => "tr",
        NodeType::TableCell => "td",
    })
}

fn heading_level(node: &ParsedNode) -> i64 {
    match node.attribute("level") {
        Some(AttributeValue::Int(level)) => (*level).clamp(1, 6),
        _ => 1,
    }
}

fn render(node: &ParsedNode, out: &mut String) {
    let Some(tag) = tag_name(node) else {
        inline_body(node, out);
        return;
    };

    match node.node_type {
        NodeType::HorizontalRule => out.push_str("<hr>"),
        NodeType::Image => {
            out.push_str("<img");
            if let Some(src) = node.attribute("src") {
                attr(out, "src", &src.to_string());
            }
            attr(out, "alt", node.content.as_deref().unwrap_or_default());
            out.push('>');
        }
        NodeType::CodeBlock => {
            out.push_str("<pre><code");
            if let Some(language) = node.attribute("language") {
                attr(out, "class", &format!("language-{language}"));
            }
            out.push('>');
            escape(out, node.content.as_deref().unwrap_or_default());
            out.push_str("</code></pre>");
        }
        NodeType::List | NodeType::Blockquote | NodeType::Table | NodeType::TableRow => {
            open(out, tag);
            for child in node.children() {
                render(child, out);
            }
            close(out, tag);
        }
        NodeType::Link => {
            out.push_str("<a");
            if let Some(href) = node.attribute("href") {
                attr(out, "href", &href.to_string());
            }
            out.push('>');
            inline_body(node, out);
            close(out, tag);
        }
        _ => {
            open(out, tag);
            inline_body(node, out);
            close(out, tag);
        }
    }
}

/// Content with children spliced in at their offsets.
fn inline_body(node: &ParsedNode, out: &mut String) {
    let content = node.content.as_deref().unwrap_or_default();
    if node.is_leaf() {
        escape(out, content);
        return;
    }

    let base = node.start as usize;
    let mut cursor = 0;
    for child in node.children() {
        let child_start = (child.start as usize).saturating_sub(base);
        let mut before = content.get(cursor..child_start).unwrap_or_default();
        if child.node_type == NodeType::Link {
            before = before.strip_suffix('[').unwrap_or(before);
        }
        escape(out, before);

        render(child, out);

        cursor = cursor.max((child.end as usize).saturating_sub(base));
        if child.node_type == NodeType::Link {
            cursor += link_tail_len(content.get(cursor..).unwrap_or_default());
        }
    }
    escape(out, content.get(cursor..).unwrap_or_default());
}

/// Length of the `](target)` following a link label, if present.
pub(crate) fn link_tail_len(rest: &str) -> usize {
    rest.strip_prefix("](")
        .and_then(|r| r.find(')'))
        .map_or(0, |close| close + 3)
}

fn open(out: &mut String, tag: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
}

fn close(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape(out, value);
    out.push('"');
}

fn escape(out: &mut String, text: &str) {
    encode_quoted_attribute_to_string(text, out);
}
