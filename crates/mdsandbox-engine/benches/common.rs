// Shared by every bench target in this directory; each one only uses a subset.
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with **bold**, *italic* and `code`, plus a [link](https://example.com).\n\n- Bullet point\n- Another item\n\n> quoted line\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_emphasis_heavy(paragraphs: usize) -> String {
    let line = "Some **strong words** and _soft words_ with `inline code` and *more* emphasis. ";
    let mut content = String::new();
    for _ in 0..paragraphs {
        content.push_str(&line.repeat(8));
        content.push_str("\n\n");
    }
    content
}
