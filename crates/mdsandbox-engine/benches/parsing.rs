use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mdsandbox_engine::{Parser, ParserOptions};
mod common;

fn uncached() -> Parser {
    Parser::new(ParserOptions {
        enable_cache: false,
        ..Default::default()
    })
}

fn bench_parse_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.sample_size(10);

    for size in [10, 100, 500] {
        let content = common::generate_markdown_content(size);
        let parser = uncached();
        group.bench_with_input(BenchmarkId::from_parameter(size), &content, |b, content| {
            b.iter(|| std::hint::black_box(parser.parse(content).unwrap()));
        });
    }

    group.finish();
}

fn bench_inline_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline_styles");
    group.sample_size(10);

    let content = common::generate_emphasis_heavy(200);
    for enabled in [false, true] {
        let parser = Parser::new(ParserOptions {
            enable_cache: false,
            parse_inline_styles: enabled,
            ..Default::default()
        });
        group.bench_function(if enabled { "on" } else { "off" }, |b| {
            b.iter(|| std::hint::black_box(parser.parse(&content).unwrap()));
        });
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let content = common::generate_markdown_content(100);
    let parser = Parser::default();
    parser.parse(&content).unwrap();

    c.bench_function("parse_cached", |b| {
        b.iter(|| std::hint::black_box(parser.parse(&content).unwrap()));
    });
}

fn bench_render(c: &mut Criterion) {
    let content = common::generate_markdown_content(100);
    let parser = Parser::default();
    let result = parser.parse(&content).unwrap();

    c.bench_function("to_html", |b| {
        b.iter(|| std::hint::black_box(parser.to_html(&result.nodes)));
    });
}

criterion_group!(
    benches,
    bench_parse_sizes,
    bench_inline_pass,
    bench_cache_hit,
    bench_render
);
criterion_main!(benches);
