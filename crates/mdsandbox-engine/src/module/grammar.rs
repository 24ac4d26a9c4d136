//! # Native Block Grammar
//!
//! Line-based block recognition used by the native module. Two phases, as in
//! the rest of the parser:
//!
//! 1. **Line classification**: each line is classified on local facts only
//!    (fence opener, heading marker, list marker, ...).
//! 2. **Block grouping**: consecutive lines of the same class are folded into
//!    block trees with byte spans into the source text.
//!
//! Spans never include the trailing newline. Headings, list items, quote lines
//! and table cells span their text only (markers excluded); links and images
//! span their label/alt text so the surrounding syntax can be recovered from
//! the source.

use std::sync::OnceLock;

use regex::Regex;

use crate::node::NodeType;

/// A block produced by the grammar before it is serialized into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub node_type: NodeType,
    pub start: u32,
    pub end: u32,
    pub children: Vec<Block>,
}

impl Block {
    fn leaf(node_type: NodeType, start: usize, end: usize) -> Self {
        Self {
            node_type,
            start: start as u32,
            end: end as u32,
            children: vec![],
        }
    }

    fn with_children(node_type: NodeType, start: usize, end: usize, children: Vec<Block>) -> Self {
        Self {
            children,
            ..Self::leaf(node_type, start, end)
        }
    }

    /// Number of records this block serializes to.
    pub fn record_count(&self) -> usize {
        1 + self.children.iter().map(Block::record_count).sum::<usize>()
    }

    /// Number of children-array bytes this block serializes to.
    pub fn children_bytes(&self) -> usize {
        let own = if self.children.is_empty() {
            0
        } else {
            4 + 4 * self.children.len()
        };
        own + self.children.iter().map(Block::children_bytes).sum::<usize>()
    }
}

/// A single line with its byte range, newline excluded.
#[derive(Debug, Clone, Copy)]
struct LineRef<'a> {
    start: usize,
    text: &'a str,
}

impl LineRef<'_> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Offset of the first non-whitespace byte.
    fn indent_end(&self) -> usize {
        self.start + (self.text.len() - self.text.trim_start().len())
    }

    /// End offset with trailing whitespace trimmed.
    fn trimmed_end(&self) -> usize {
        self.start + self.text.trim_end().len()
    }
}

fn lines(text: &str) -> Vec<LineRef<'_>> {
    let mut out = vec![];
    let mut start = 0;
    for raw in text.split_inclusive('\n') {
        let body = raw.trim_end_matches('\n').trim_end_matches('\r');
        out.push(LineRef { start, text: body });
        start += raw.len();
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceKind {
    Backticks,
    Tildes,
}

/// Local facts about one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Blank,
    Fence(FenceKind),
    Heading { text_start: usize },
    Rule,
    Quote { text_start: usize },
    ListItem { text_start: usize },
    TableRow,
    Image { alt_start: usize, alt_end: usize },
    Text,
}

fn classify(line: &LineRef<'_>) -> LineClass {
    let t = line.text.trim_start();
    let indent = line.text.len() - t.len();

    if t.trim_end().is_empty() {
        return LineClass::Blank;
    }
    if t.starts_with("```") {
        return LineClass::Fence(FenceKind::Backticks);
    }
    if t.starts_with("~~~") {
        return LineClass::Fence(FenceKind::Tildes);
    }
    if let Some(offset) = heading_text_offset(t) {
        return LineClass::Heading {
            text_start: line.start + indent + offset,
        };
    }
    if is_rule(t) {
        return LineClass::Rule;
    }
    if let Some(rest) = t.strip_prefix('>') {
        let skip = usize::from(rest.starts_with(' '));
        return LineClass::Quote {
            text_start: line.start + indent + 1 + skip,
        };
    }
    if let Some(offset) = list_marker_len(t) {
        return LineClass::ListItem {
            text_start: line.start + indent + offset,
        };
    }
    if t.starts_with('|') {
        return LineClass::TableRow;
    }
    if let Some(m) = image_regex().captures(t.trim_end())
        && let Some(alt) = m.get(1)
    {
        return LineClass::Image {
            alt_start: line.start + indent + alt.start(),
            alt_end: line.start + indent + alt.end(),
        };
    }
    LineClass::Text
}

/// `#`..`######` followed by a space or end of line.
fn heading_text_offset(t: &str) -> Option<usize> {
    let hashes = t.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &t[hashes..];
    if rest.is_empty() {
        return Some(hashes);
    }
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(hashes + (rest.len() - rest.trim_start().len()))
}

/// Three or more of the same `-`, `*` or `_`, optionally separated by spaces.
fn is_rule(t: &str) -> bool {
    let mut chars = t.trim_end().chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for c in chars {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

/// Length of a bullet (`- `, `* `, `+ `) or ordered (`1. `, `1) `) marker.
fn list_marker_len(t: &str) -> Option<usize> {
    let bytes = t.as_bytes();
    if matches!(bytes.first(), Some(b'-' | b'*' | b'+')) && bytes.get(1) == Some(&b' ') {
        return Some(2);
    }
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if (1..=9).contains(&digits)
        && matches!(bytes.get(digits), Some(b'.' | b')'))
        && bytes.get(digits + 1) == Some(&b' ')
    {
        return Some(digits + 2);
    }
    None
}

fn image_regex() -> &'static Regex {
    static IMAGE_REGEX: OnceLock<Regex> = OnceLock::new();
    IMAGE_REGEX.get_or_init(|| Regex::new(r"^!\[([^\]]*)\]\([^)\s]*\)$").expect("Invalid image regex"))
}

fn link_regex() -> &'static Regex {
    static LINK_REGEX: OnceLock<Regex> = OnceLock::new();
    LINK_REGEX.get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\([^)\s]+\)").expect("Invalid link regex"))
}

/// Parses `text` into top-level blocks.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let lines = lines(text);
    let classes: Vec<LineClass> = lines.iter().map(classify).collect();
    let mut out = vec![];
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        match classes[i] {
            LineClass::Blank => i += 1,
            LineClass::Fence(kind) => {
                let (block, next) = fenced_code(&lines, &classes, i, kind, text.len());
                out.push(block);
                i = next;
            }
            LineClass::Heading { text_start } => {
                let end = line.trimmed_end().max(text_start);
                out.push(Block::leaf(NodeType::Heading, text_start, end));
                i += 1;
            }
            LineClass::Rule => {
                out.push(Block::leaf(
                    NodeType::HorizontalRule,
                    line.indent_end(),
                    line.trimmed_end(),
                ));
                i += 1;
            }
            LineClass::Image { alt_start, alt_end } => {
                out.push(Block::leaf(NodeType::Image, alt_start, alt_end));
                i += 1;
            }
            LineClass::Quote { .. } => {
                let next = run_end(&classes, i, |c| matches!(c, LineClass::Quote { .. }));
                out.push(block_quote(&lines[i..next], &classes[i..next]));
                i = next;
            }
            LineClass::ListItem { .. } => {
                let next = run_end(&classes, i, |c| matches!(c, LineClass::ListItem { .. }));
                out.push(list(&lines[i..next], &classes[i..next]));
                i = next;
            }
            LineClass::TableRow => {
                let next = run_end(&classes, i, |c| matches!(c, LineClass::TableRow));
                out.push(table(&lines[i..next]));
                i = next;
            }
            LineClass::Text => {
                let next = run_end(&classes, i, |c| matches!(c, LineClass::Text));
                out.push(paragraph(text, &lines[i..next]));
                i = next;
            }
        }
    }

    out
}

fn run_end(classes: &[LineClass], from: usize, same: impl Fn(&LineClass) -> bool) -> usize {
    classes[from..]
        .iter()
        .position(|c| !same(c))
        .map_or(classes.len(), |n| from + n)
}

/// Code body between the fences. An unterminated fence runs to end of input.
fn fenced_code(
    lines: &[LineRef<'_>],
    classes: &[LineClass],
    open: usize,
    kind: FenceKind,
    text_len: usize,
) -> (Block, usize) {
    let body_start = lines
        .get(open + 1)
        .map_or(text_len.max(lines[open].end()), |l| l.start);
    let close = classes[open + 1..]
        .iter()
        .position(|c| *c == LineClass::Fence(kind))
        .map(|n| open + 1 + n);

    let (last_body, next) = match close {
        Some(close) => (close.checked_sub(1).filter(|&l| l > open), close + 1),
        None => ((lines.len() > open + 1).then(|| lines.len() - 1), lines.len()),
    };
    let body_end = last_body.map_or(body_start, |l| lines[l].end());

    (
        Block::leaf(NodeType::CodeBlock, body_start, body_end.max(body_start)),
        next,
    )
}

fn block_quote(lines: &[LineRef<'_>], classes: &[LineClass]) -> Block {
    let children = lines
        .iter()
        .zip(classes)
        .filter_map(|(line, class)| match *class {
            LineClass::Quote { text_start } => {
                let end = line.trimmed_end();
                (end > text_start).then(|| Block::leaf(NodeType::Paragraph, text_start, end))
            }
            _ => None,
        })
        .collect();
    let start = lines[0].indent_end();
    let end = lines[lines.len() - 1].trimmed_end();
    Block::with_children(NodeType::Blockquote, start, end, children)
}

fn list(lines: &[LineRef<'_>], classes: &[LineClass]) -> Block {
    let items = lines
        .iter()
        .zip(classes)
        .filter_map(|(line, class)| match *class {
            LineClass::ListItem { text_start } => {
                let end = line.trimmed_end().max(text_start);
                Some(Block::with_children(
                    NodeType::ListItem,
                    text_start,
                    end,
                    vec![Block::leaf(NodeType::Text, text_start, end)],
                ))
            }
            _ => None,
        })
        .collect();
    let start = lines[0].indent_end();
    let end = lines[lines.len() - 1].trimmed_end();
    Block::with_children(NodeType::List, start, end, items)
}

fn table(lines: &[LineRef<'_>]) -> Block {
    let rows = lines
        .iter()
        .filter(|line| !is_delimiter_row(line.text))
        .map(|line| {
            let row_start = line.indent_end();
            let row_end = line.trimmed_end();
            Block::with_children(
                NodeType::TableRow,
                row_start,
                row_end,
                table_cells(line.text, line.start),
            )
        })
        .collect();
    let start = lines[0].indent_end();
    let end = lines[lines.len() - 1].trimmed_end();
    Block::with_children(NodeType::Table, start, end, rows)
}

/// `|---|:--:|` style separator between header and body.
fn is_delimiter_row(text: &str) -> bool {
    let t = text.trim();
    t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn table_cells(text: &str, base: usize) -> Vec<Block> {
    let pipes: Vec<usize> = text.match_indices('|').map(|(i, _)| i).collect();
    let mut bounds = pipes.clone();
    // A row without a closing pipe still ends its last cell at end of line.
    let trimmed_len = text.trim_end().len();
    if pipes.last().is_some_and(|&p| p + 1 < trimmed_len) {
        bounds.push(trimmed_len);
    }

    bounds
        .windows(2)
        .map(|w| {
            let raw = &text[w[0] + 1..w[1]];
            let lead = raw.len() - raw.trim_start().len();
            let start = base + w[0] + 1 + lead;
            let end = start + raw.trim().len();
            Block::leaf(NodeType::TableCell, start, end)
        })
        .collect()
}

fn paragraph(text: &str, lines: &[LineRef<'_>]) -> Block {
    let start = lines[0].indent_end();
    let end = lines[lines.len() - 1].trimmed_end();
    let body = &text[start..end];

    let links = link_regex()
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?;
            if body[..whole.start()].ends_with('!') {
                return None;
            }
            Some(Block::leaf(
                NodeType::Link,
                start + label.start(),
                start + label.end(),
            ))
        })
        .collect();

    Block::with_children(NodeType::Paragraph, start, end, links)
}
