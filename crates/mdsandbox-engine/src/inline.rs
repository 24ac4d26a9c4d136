//! # Inline Style Post-Processing
//!
//! A host-side second pass over decoded `TEXT` and `PARAGRAPH` nodes that
//! detects emphasis and code spans and attaches them as synthetic children
//! with absolute offsets.
//!
//! ## Precedence
//!
//! 1. **Bold**: `**x**` / `__x__`
//! 2. **Italic**: `*x*` / `_x_`, accepted only when the delimiter is exactly one
//!    character wide, so the halves of `**x**` never pass as italics
//! 3. **Code**: `` `x` ``
//!
//! A later match never overlaps an earlier one or a child the module already
//! produced (links, including their `](target)` tail). Emphasis delimiters
//! inside a backtick span are literal. Synthetic nodes span their delimiters;
//! their `content` is the inner text.

use std::{ops::Range, sync::OnceLock};

use regex::{Captures, Regex};

use crate::{
    node::{NodeType, ParsedNode},
    render::link_tail_len,
};

/// A detected span, relative to the scanned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InlineMatch {
    node_type: NodeType,
    start: usize,
    end: usize,
    inner_start: usize,
    inner_end: usize,
}

fn bold_regex() -> &'static Regex {
    static BOLD_REGEX: OnceLock<Regex> = OnceLock::new();
    BOLD_REGEX.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("Invalid bold regex"))
}

fn italic_regex() -> &'static Regex {
    static ITALIC_REGEX: OnceLock<Regex> = OnceLock::new();
    ITALIC_REGEX
        .get_or_init(|| Regex::new(r"\*([^*\n]+)\*|_([^_\n]+)_").expect("Invalid italic regex"))
}

fn code_regex() -> &'static Regex {
    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    CODE_REGEX.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("Invalid code regex"))
}

/// Runs the pass over every tree in `nodes`, in place.
pub fn apply_inline_styles(nodes: &mut [ParsedNode]) {
    for node in nodes {
        process(node);
    }
}

fn process(node: &mut ParsedNode) {
    if let Some(children) = node.children.as_mut() {
        apply_inline_styles(children);
    }

    if !matches!(node.node_type, NodeType::Text | NodeType::Paragraph) {
        return;
    }
    let Some(content) = node.content.as_deref() else {
        return;
    };

    let base = node.start as usize;
    let claimed: Vec<Range<usize>> = node
        .children()
        .iter()
        .map(|c| claimed_span(content, base, c))
        .collect();

    let found = detect(content, &claimed);
    if found.is_empty() {
        return;
    }

    let synthetic: Vec<ParsedNode> = found
        .iter()
        .map(|m| {
            ParsedNode::new(
                m.node_type,
                (base + m.start) as u32,
                (base + m.end) as u32,
            )
            .with_content(&content[m.inner_start..m.inner_end])
        })
        .collect();

    let children = node.children.get_or_insert_with(Vec::new);
    children.extend(synthetic);
    children.sort_by_key(|c| c.start);
}

/// The part of `content` a child occupies. Links claim their whole
/// `[label](target)` syntax, not just the label.
fn claimed_span(content: &str, base: usize, child: &ParsedNode) -> Range<usize> {
    let mut start = (child.start as usize).saturating_sub(base);
    let mut end = (child.end as usize).saturating_sub(base);
    if child.node_type == NodeType::Link {
        if start > 0 && content.as_bytes().get(start - 1) == Some(&b'[') {
            start -= 1;
        }
        end += content.get(end..).map_or(0, link_tail_len);
    }
    start.min(content.len())..end.min(content.len())
}

/// Byte-level occupancy of the scanned content.
struct Occupied(Vec<bool>);

impl Occupied {
    fn new(len: usize) -> Self {
        Self(vec![false; len])
    }

    fn mark(&mut self, start: usize, end: usize) {
        if let Some(bytes) = self.0.get_mut(start..end) {
            bytes.fill(true);
        }
    }

    fn is_free(&self, start: usize, end: usize) -> bool {
        self.0
            .get(start..end)
            .is_some_and(|bytes| !bytes.contains(&true))
    }

    /// One end of `start..end` falls inside an occupied run.
    fn cuts(&self, start: usize, end: usize) -> bool {
        let at = |i: usize| self.0.get(i).copied().unwrap_or(false);
        at(start) || end.checked_sub(1).is_some_and(at)
    }
}

/// Finds bold, then italic, then code spans in `content`, skipping anything
/// that overlaps `claimed` or an earlier match.
///
/// Code spans are located up front so that emphasis delimiters inside
/// backticks stay literal. Emphasis that wraps a whole code span still wins.
fn detect(content: &str, claimed: &[Range<usize>]) -> Vec<InlineMatch> {
    if !content.bytes().any(|b| matches!(b, b'*' | b'_' | b'`')) {
        return vec![];
    }

    let mut taken = Occupied::new(content.len());
    for span in claimed {
        taken.mark(span.start, span.end);
    }

    let mut in_code = Occupied::new(content.len());
    let mut code = vec![];
    for m in scan(code_regex(), content, NodeType::Code) {
        if taken.is_free(m.start, m.end) && in_code.is_free(m.start, m.end) {
            in_code.mark(m.start, m.end);
            code.push(m);
        }
    }

    let mut found: Vec<InlineMatch> = vec![];
    let mut accept = |m: InlineMatch| {
        if taken.is_free(m.start, m.end) && !in_code.cuts(m.start, m.end) {
            taken.mark(m.start, m.end);
            found.push(m);
        }
    };
    for m in scan(bold_regex(), content, NodeType::Bold) {
        accept(m);
    }
    for m in scan(italic_regex(), content, NodeType::Italic) {
        if single_width(content, &m) {
            accept(m);
        }
    }

    found.extend(code.into_iter().filter(|m| taken.is_free(m.start, m.end)));
    found.sort_by_key(|m| m.start);
    found
}

/// All matches of `re`, including ones that begin inside an earlier match.
///
/// A rejected italic candidate such as `* and *` in `**a** and *b*` must not
/// swallow the opening delimiter of the real match after it.
fn scan(re: &Regex, content: &str, node_type: NodeType) -> Vec<InlineMatch> {
    let mut out = vec![];
    let mut pos = 0;
    while pos < content.len() {
        let Some(caps) = re.captures_at(content, pos) else {
            break;
        };
        let Some(m) = to_match(&caps, node_type) else {
            break;
        };
        out.push(m);
        // Resume one character past the match start.
        pos = m.start + content[m.start..].chars().next().map_or(1, char::len_utf8);
    }
    out
}

fn to_match(caps: &Captures<'_>, node_type: NodeType) -> Option<InlineMatch> {
    let whole = caps.get(0)?;
    let inner = caps.get(1).or_else(|| caps.get(2))?;
    Some(InlineMatch {
        node_type,
        start: whole.start(),
        end: whole.end(),
        inner_start: inner.start(),
        inner_end: inner.end(),
    })
}

/// The delimiter is not part of a longer run of the same character.
fn single_width(content: &str, m: &InlineMatch) -> bool {
    let delim = content.as_bytes()[m.start];
    let before = m.start.checked_sub(1).map(|i| content.as_bytes()[i]);
    let after = content.as_bytes().get(m.end).copied();
    before != Some(delim) && after != Some(delim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn paragraph(text: &str, start: u32) -> ParsedNode {
        ParsedNode::new(NodeType::Paragraph, start, start + text.len() as u32).with_content(text)
    }

    fn styled(text: &str) -> Vec<(NodeType, u32, u32, String)> {
        let mut nodes = vec![paragraph(text, 0)];
        apply_inline_styles(&mut nodes);
        nodes[0]
            .children()
            .iter()
            .map(|c| (c.node_type, c.start, c.end, c.content.clone().unwrap()))
            .collect()
    }

    #[test]
    fn bold_takes_precedence_over_italic() {
        assert_eq!(
            styled("**bold** and *italic*"),
            vec![
                (NodeType::Bold, 0, 8, "bold".to_string()),
                (NodeType::Italic, 13, 21, "italic".to_string()),
            ]
        );
    }

    #[rstest]
    #[case("__strong__", NodeType::Bold, "strong")]
    #[case("_soft_", NodeType::Italic, "soft")]
    #[case("`let x`", NodeType::Code, "let x")]
    fn alternate_delimiters(#[case] text: &str, #[case] kind: NodeType, #[case] inner: &str) {
        let found = styled(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, kind);
        assert_eq!(found[0].3, inner);
    }

    #[test]
    fn offsets_are_absolute() {
        let mut nodes = vec![paragraph("say *hi*", 100)];
        apply_inline_styles(&mut nodes);
        let italic = &nodes[0].children()[0];
        assert_eq!((italic.start, italic.end), (104, 108));
    }

    #[test]
    fn no_markup_leaves_node_untouched() {
        let mut nodes = vec![paragraph("plain words", 0)];
        apply_inline_styles(&mut nodes);
        assert_eq!(nodes[0].children, None);
    }

    #[test]
    fn unclosed_delimiters_are_text() {
        assert!(styled("**open and *also `open").is_empty());
    }

    #[test]
    fn later_kinds_never_overlap_earlier_ones() {
        let found = styled("**a `b` c** then `d`");
        let kinds: Vec<NodeType> = found.iter().map(|f| f.0).collect();
        assert_eq!(kinds, vec![NodeType::Bold, NodeType::Code]);
        assert_eq!(found[1].3, "d");
    }

    #[test]
    fn existing_children_are_claimed() {
        let text = "[a *b* c](x) and *d*";
        let link = ParsedNode::new(NodeType::Link, 1, 8).with_content("a *b* c");
        let mut nodes = vec![paragraph(text, 0).with_children(vec![link])];
        apply_inline_styles(&mut nodes);

        let children = nodes[0].children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].node_type, NodeType::Link);
        assert_eq!(children[1].node_type, NodeType::Italic);
        assert_eq!(children[1].content.as_deref(), Some("d"));
    }

    #[test]
    fn link_target_is_claimed_with_its_label() {
        let text = "see [docs](https://e.com/a_b_c) end";
        let link = ParsedNode::new(NodeType::Link, 5, 9).with_content("docs");
        let mut nodes = vec![paragraph(text, 0).with_children(vec![link])];
        apply_inline_styles(&mut nodes);

        let kinds: Vec<NodeType> = nodes[0].children().iter().map(|c| c.node_type).collect();
        assert_eq!(kinds, vec![NodeType::Link]);
    }

    #[rstest]
    #[case("call `my_var_name` now", "my_var_name")]
    #[case("`a * b * c`", "a * b * c")]
    #[case("_x `y_z` w", "y_z")]
    #[case("`**kwargs**`", "**kwargs**")]
    fn emphasis_markers_inside_code_are_literal(#[case] text: &str, #[case] inner: &str) {
        let found = styled(text);
        assert_eq!(found.len(), 1, "{found:?}");
        assert_eq!(found[0].0, NodeType::Code);
        assert_eq!(found[0].3, inner);
    }

    #[test]
    fn large_emphasis_heavy_paragraph() {
        let count = 50_000;
        let found = styled(&"*a* ".repeat(count));
        assert_eq!(found.len(), count);
        assert!(found.iter().all(|f| f.0 == NodeType::Italic));
        assert_eq!(found[count - 1].1, (4 * (count - 1)) as u32);
    }

    #[test]
    fn recurses_into_nested_text() {
        let text = "- *item*";
        let inner = ParsedNode::new(NodeType::Text, 2, 8).with_content("*item*");
        let item = ParsedNode::new(NodeType::ListItem, 2, 8)
            .with_content("*item*")
            .with_children(vec![inner]);
        let mut nodes =
            vec![ParsedNode::new(NodeType::List, 0, text.len() as u32).with_children(vec![item])];
        apply_inline_styles(&mut nodes);

        let item = &nodes[0].children()[0];
        assert_eq!(item.children().len(), 1, "list item itself is not scanned");
        let emphasis = &item.children()[0].children()[0];
        assert_eq!(emphasis.node_type, NodeType::Italic);
        assert_eq!((emphasis.start, emphasis.end), (2, 8));
    }

    #[test]
    fn other_node_types_are_not_scanned() {
        let mut nodes =
            vec![ParsedNode::new(NodeType::CodeBlock, 0, 8).with_content("**raw**")];
        apply_inline_styles(&mut nodes);
        assert_eq!(nodes[0].children, None);
    }

    #[test]
    fn multibyte_text_keeps_byte_offsets() {
        let found = styled("é *ü*");
        assert_eq!(found, vec![(NodeType::Italic, 3, 8, "ü".to_string())]);
    }
}
