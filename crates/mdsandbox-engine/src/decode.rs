//! # Node Decoder
//!
//! Walks the module's pointer table and fixed-layout records (see
//! [`crate::module`]) and builds the typed node tree, slicing the original
//! text for each node's content.
//!
//! Records are decoded as-is: unknown type tags and inverted or out-of-range
//! spans are returned rather than filtered, leaving judgement to the
//! validator. Only output that cannot be walked at all (pointers outside
//! memory, runaway nesting) fails decoding.
//!
//! Records carry no attributes, so a few are recovered from the source text
//! around the node's span (heading level, fence language, link target).

use crate::{
    bridge::RawNodes,
    error::DecodeError,
    memory::LinearMemory,
    module::RECORD_SIZE,
    node::{AttributeValue, NodeType, ParsedNode},
};

/// Maximum nesting of children arrays.
pub const MAX_DEPTH: usize = 64;

struct Decoder<'a> {
    memory: &'a LinearMemory,
    text: &'a str,
    budget: usize,
    limit: usize,
}

/// Decodes `raw.node_count` top-level nodes from `memory`.
pub fn decode_nodes(
    memory: &LinearMemory,
    raw: RawNodes,
    text: &str,
) -> Result<Vec<ParsedNode>, DecodeError> {
    let capacity = memory.size().saturating_sub(raw.output_ptr) / 4;
    if raw.node_count > capacity {
        return Err(DecodeError::CountMismatch {
            reported: raw.node_count,
            capacity,
        });
    }

    // Shared children arrays could otherwise expand into an unbounded tree.
    let limit = (memory.size() / RECORD_SIZE) as usize;
    let mut decoder = Decoder {
        memory,
        text,
        budget: limit,
        limit,
    };

    (0..raw.node_count)
        .map(|i| {
            let ptr = decoder.read_u32(raw.output_ptr + 4 * i)?;
            decoder.node(ptr, 0)
        })
        .collect()
}

impl Decoder<'_> {
    fn read_u32(&self, ptr: u32) -> Result<u32, DecodeError> {
        self.memory
            .read_u32(ptr)
            .map_err(|_| DecodeError::OutOfBounds { ptr })
    }

    fn node(&mut self, ptr: u32, depth: usize) -> Result<ParsedNode, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthExceeded {
                max_depth: MAX_DEPTH,
            });
        }
        self.budget = self
            .budget
            .checked_sub(1)
            .ok_or(DecodeError::TooManyNodes { limit: self.limit })?;

        let tag = self.read_u32(ptr)?;
        let start = self.read_u32(ptr.wrapping_add(4))?;
        let end = self.read_u32(ptr.wrapping_add(8))?;
        let children_ptr = self.read_u32(ptr.wrapping_add(12))?;

        let mut node = ParsedNode::new(NodeType::from_tag(tag), start, end);
        node.content = self
            .text
            .get(start as usize..end as usize)
            .map(str::to_owned);

        if children_ptr != 0 {
            let count = self.read_u32(children_ptr)?;
            let mut children = Vec::with_capacity(count.min(1024) as usize);
            for i in 0..count {
                let slot = children_ptr
                    .checked_add(4 + 4 * i)
                    .ok_or(DecodeError::OutOfBounds { ptr: children_ptr })?;
                let child = self.read_u32(slot)?;
                children.push(self.node(child, depth + 1)?);
            }
            node.children = Some(children);
        }

        enrich(&mut node, self.text);
        Ok(node)
    }
}

/// Recovers attributes the record layout cannot carry.
fn enrich(node: &mut ParsedNode, text: &str) {
    let (start, end) = (node.start as usize, node.end as usize);
    match node.node_type {
        NodeType::Heading => {
            if let Some(before) = text.get(..start) {
                let level = before
                    .trim_end_matches([' ', '\t'])
                    .bytes()
                    .rev()
                    .take_while(|&b| b == b'#')
                    .count();
                if (1..=6).contains(&level) {
                    node.set_attribute("level", level as i64);
                }
            }
        }
        NodeType::CodeBlock => {
            if let Some(language) = text.get(..start).and_then(fence_language) {
                node.set_attribute("language", language);
            }
        }
        NodeType::Link => {
            if let Some(href) = text.get(end..).and_then(target_after_label) {
                node.set_attribute("href", href);
            }
        }
        NodeType::Image => {
            if let Some(src) = text.get(end..).and_then(target_after_label) {
                node.set_attribute("src", src);
            }
        }
        NodeType::List => {
            if text
                .get(start..)
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            {
                node.set_attribute("ordered", AttributeValue::Bool(true));
            }
        }
        _ => {}
    }
}

/// Info string of the fence line preceding a code body.
fn fence_language(before: &str) -> Option<&str> {
    let before = before
        .strip_suffix('\n')
        .map(|b| b.strip_suffix('\r').unwrap_or(b))
        .unwrap_or(before);
    let fence_line = before.rsplit('\n').next()?.trim_start();
    if !(fence_line.starts_with("```") || fence_line.starts_with("~~~")) {
        return None;
    }
    let info = fence_line.trim_start_matches(['`', '~']).trim();
    info.split_whitespace().next()
}

/// `(target)` following the `]` that closes a label.
fn target_after_label(after: &str) -> Option<&str> {
    let rest = after.strip_prefix("](")?;
    let close = rest.find(')')?;
    Some(&rest[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Writes records by hand, the way a foreign module would.
    struct Image {
        memory: LinearMemory,
        next: u32,
    }

    impl Image {
        fn new() -> Self {
            Self {
                memory: LinearMemory::new(1, 1).unwrap(),
                next: 256,
            }
        }

        fn record(&mut self, tag: u32, start: u32, end: u32, children: u32) -> u32 {
            let ptr = self.next;
            self.memory.write_u32(ptr, tag).unwrap();
            self.memory.write_u32(ptr + 4, start).unwrap();
            self.memory.write_u32(ptr + 8, end).unwrap();
            self.memory.write_u32(ptr + 12, children).unwrap();
            self.next += RECORD_SIZE;
            ptr
        }

        fn array(&mut self, ptrs: &[u32]) -> u32 {
            let ptr = self.next;
            self.memory.write_u32(ptr, ptrs.len() as u32).unwrap();
            for (i, p) in ptrs.iter().enumerate() {
                self.memory.write_u32(ptr + 4 + 4 * i as u32, *p).unwrap();
            }
            self.next += 4 + 4 * ptrs.len() as u32;
            ptr
        }

        fn table(&mut self, at: u32, ptrs: &[u32]) -> RawNodes {
            for (i, p) in ptrs.iter().enumerate() {
                self.memory.write_u32(at + 4 * i as u32, *p).unwrap();
            }
            RawNodes {
                output_ptr: at,
                node_count: ptrs.len() as u32,
            }
        }
    }

    #[test]
    fn decodes_flat_records_with_content() {
        let text = "hello world";
        let mut img = Image::new();
        let a = img.record(NodeType::Paragraph.tag(), 0, 5, 0);
        let b = img.record(NodeType::Text.tag(), 6, 11, 0);
        let raw = img.table(16, &[a, b]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        assert_eq!(
            nodes,
            vec![
                ParsedNode::new(NodeType::Paragraph, 0, 5).with_content("hello"),
                ParsedNode::new(NodeType::Text, 6, 11).with_content("world"),
            ]
        );
    }

    #[test]
    fn decodes_nested_children() {
        let text = "- a";
        let mut img = Image::new();
        let leaf = img.record(NodeType::Text.tag(), 2, 3, 0);
        let items = img.array(&[leaf]);
        let item = img.record(NodeType::ListItem.tag(), 2, 3, items);
        let list_children = img.array(&[item]);
        let list = img.record(NodeType::List.tag(), 0, 3, list_children);
        let raw = img.table(16, &[list]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        let item = &nodes[0].children()[0];
        assert_eq!(item.node_type, NodeType::ListItem);
        assert_eq!(item.children()[0].content.as_deref(), Some("a"));
    }

    #[test]
    fn keeps_unknown_tags_and_inverted_spans() {
        let text = "abcdef";
        let mut img = Image::new();
        let odd = img.record(99, 4, 2, 0);
        let raw = img.table(16, &[odd]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        assert_eq!(nodes[0].node_type, NodeType::Unrecognized(99));
        assert_eq!(nodes[0].content, None);
    }

    #[test]
    fn span_past_text_has_no_content() {
        let mut img = Image::new();
        let node = img.record(NodeType::Text.tag(), 0, 50, 0);
        let raw = img.table(16, &[node]);

        let nodes = decode_nodes(&img.memory, raw, "short").unwrap();
        assert_eq!(nodes[0].content, None);
        assert_eq!(nodes[0].end, 50);
    }

    #[test]
    fn pointer_outside_memory_fails() {
        let mut img = Image::new();
        let raw = img.table(16, &[u32::MAX - 2]);
        assert!(matches!(
            decode_nodes(&img.memory, raw, ""),
            Err(DecodeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn node_count_beyond_memory_fails() {
        let img = Image::new();
        let raw = RawNodes {
            output_ptr: 16,
            node_count: u32::MAX,
        };
        assert!(matches!(
            decode_nodes(&img.memory, raw, ""),
            Err(DecodeError::CountMismatch { .. })
        ));
    }

    #[test]
    fn self_referencing_children_stop_at_depth_limit() {
        let mut img = Image::new();
        // record at 256, its children array at 272 pointing back to 256
        let node = img.record(NodeType::Blockquote.tag(), 0, 0, 272);
        img.array(&[node]);
        let raw = img.table(16, &[node]);

        assert_eq!(
            decode_nodes(&img.memory, raw, ""),
            Err(DecodeError::DepthExceeded {
                max_depth: MAX_DEPTH
            })
        );
    }

    #[test]
    fn heading_level_comes_from_source() {
        let text = "### Title";
        let mut img = Image::new();
        let h = img.record(NodeType::Heading.tag(), 4, 9, 0);
        let raw = img.table(16, &[h]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        assert_eq!(nodes[0].attribute("level"), Some(&AttributeValue::Int(3)));
    }

    #[test]
    fn code_language_comes_from_fence_line() {
        let text = "```rust extra\nfn x() {}\n```";
        let mut img = Image::new();
        let code = img.record(NodeType::CodeBlock.tag(), 14, 23, 0);
        let raw = img.table(16, &[code]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        assert_eq!(nodes[0].content.as_deref(), Some("fn x() {}"));
        assert_eq!(
            nodes[0].attribute("language"),
            Some(&AttributeValue::from("rust"))
        );
    }

    #[test]
    fn link_target_follows_label() {
        let text = "see [docs](https://example.com/a)";
        let mut img = Image::new();
        let link = img.record(NodeType::Link.tag(), 5, 9, 0);
        let raw = img.table(16, &[link]);

        let nodes = decode_nodes(&img.memory, raw, text).unwrap();
        assert_eq!(
            nodes[0].attribute("href"),
            Some(&AttributeValue::from("https://example.com/a"))
        );
    }
}
