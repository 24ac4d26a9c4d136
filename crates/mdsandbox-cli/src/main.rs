use anyhow::{Context, Result};
use mdsandbox_config::Config;
use mdsandbox_engine::{ParseResult, ParsedNode, Parser};
use std::{env, fmt::Write as _, path::PathBuf, process};

const USAGE: &str = "Usage: mdsandbox [--config PATH] [--html|--tree|--stats] FILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum View {
    #[default]
    Html,
    Tree,
    Stats,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    view: View,
    file: PathBuf,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut config = None;
    let mut view = View::default();
    let mut file = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--html" => view = View::Html,
            "--tree" => view = View::Tree,
            "--stats" => view = View::Stats,
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            _ if file.is_some() => return Err("only one FILE may be given".to_string()),
            _ => file = Some(PathBuf::from(&arg)),
        }
    }

    Ok(Args {
        config,
        view,
        file: file.ok_or("missing FILE")?,
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let loaded = match path {
        Some(path) => Config::load_from_path(path)?
            .with_context(|| format!("config file {} does not exist", path.display()))?,
        None => Config::load()?.unwrap_or_default(),
    };
    Ok(loaded)
}

fn render_tree(nodes: &[ParsedNode]) -> String {
    fn node(out: &mut String, n: &ParsedNode, depth: usize) {
        let _ = write!(
            out,
            "{:indent$}{} {}..{}",
            "",
            n.node_type,
            n.start,
            n.end,
            indent = depth * 2
        );
        if let Some(attributes) = &n.attributes {
            for (key, value) in attributes {
                let _ = write!(out, " {key}={value}");
            }
        }
        if n.is_leaf()
            && let Some(content) = &n.content
        {
            let shown: String = content.chars().take(40).collect();
            let _ = write!(out, " {shown:?}");
        }
        out.push('\n');
        for child in n.children() {
            node(out, child, depth + 1);
        }
    }

    let mut out = String::new();
    for n in nodes {
        node(&mut out, n, 0);
    }
    out
}

fn render_stats(parser: &Parser, result: &ParseResult) -> String {
    let stats = parser.get_stats();
    let mut total = 0;
    result.walk(|_| total += 1);
    format!(
        "top-level nodes: {}\ntotal nodes: {total}\nparse time: {:.3} ms\nmodule heap: {} bytes\nmemory size: {} bytes\ncached results: {}\n",
        result.node_count, result.parse_time_ms, result.memory_used, stats.memory_size, stats.cache_size
    )
}

fn run(args: Args) -> Result<String> {
    let config = load_config(args.config.as_ref())?;
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let parser = config.build_parser();
    let result = parser
        .parse(&text)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    log::info!(
        "parsed {} ({} top-level nodes)",
        args.file.display(),
        result.node_count
    );

    let output = match args.view {
        View::Html => {
            let mut html = parser.to_html(&result.nodes);
            html.push('\n');
            html
        }
        View::Tree => render_tree(&result.nodes),
        View::Stats => render_stats(&parser, &result),
    };
    parser.dispose();
    Ok(output)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    print!("{}", run(args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdsandbox_engine::{NodeType, ParserOptions};
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn file_only_defaults_to_html() {
        assert_eq!(
            args(&["notes.md"]).unwrap(),
            Args {
                config: None,
                view: View::Html,
                file: PathBuf::from("notes.md"),
            }
        );
    }

    #[test]
    fn flags_in_any_order() {
        let parsed = args(&["--tree", "notes.md", "--config", "/etc/md.toml"]).unwrap();
        assert_eq!(parsed.view, View::Tree);
        assert_eq!(parsed.config, Some(PathBuf::from("/etc/md.toml")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--verbose", "a.md"]).is_err());
        assert!(args(&["a.md", "b.md"]).is_err());
    }

    #[test]
    fn tree_view_indents_children() {
        let parser = Parser::new(ParserOptions::default());
        let result = parser.parse("# Title\n\n- item").unwrap();
        assert_eq!(result.nodes[1].node_type, NodeType::List);

        assert_eq!(
            render_tree(&result.nodes),
            "HEADING 2..7 level=1 \"Title\"\nLIST 9..15\n  LIST_ITEM 11..15\n    TEXT 11..15 \"item\"\n"
        );
    }
}
