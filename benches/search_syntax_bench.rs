use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use search_syntax::classifier::classify;
use search_syntax::config::SearchConfig;
use search_syntax::fields::FieldDefinitions;
use search_syntax::lexer::tokenize;
use search_syntax::sql_compiler::SqlCompiler;
use search_syntax::validator::validate;

const QUERIES: [(&str, &str); 4] = [
    ("simple", "status:unresolved"),
    ("medium", "span.duration:>5s AND status:unresolved !level:error release:[1.0, 2.0]"),
    (
        "complex",
        r#"(level:error OR level:fatal) AND user.email:"someone@example.com" http.response_content_length:>=1.5MiB failure_rate:<5% "connection reset""#,
    ),
    ("or_optimization", "status:unresolved OR status:ignored OR status:archived OR status:resolved"),
];

fn benchmark_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    for (name, query) in QUERIES {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &query, |b, &query| {
            b.iter(|| black_box(tokenize(black_box(query))))
        });
    }
    group.finish();
}

fn benchmark_classify(c: &mut Criterion) {
    let fields = FieldDefinitions::builtin();
    let mut group = c.benchmark_group("classify");
    for (name, query) in QUERIES {
        let tokens = tokenize(query).into_inner();
        group.bench_with_input(BenchmarkId::new("classify", name), &tokens, |b, tokens| {
            b.iter(|| black_box(classify(black_box(tokens), &fields)))
        });
    }
    group.finish();
}

fn benchmark_validate(c: &mut Criterion) {
    let fields = FieldDefinitions::builtin();
    let mut group = c.benchmark_group("validate");
    for (name, query) in QUERIES {
        let tokens = tokenize(query).into_inner();
        let typed = classify(&tokens, &fields);
        group.bench_with_input(BenchmarkId::new("validate", name), &typed, |b, typed| {
            b.iter(|| black_box(validate(black_box(typed))))
        });
    }
    group.finish();
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let config = SearchConfig::default();
    let mut group = c.benchmark_group("end_to_end");
    for (name, query) in QUERIES {
        group.bench_with_input(BenchmarkId::new("analyze", name), &query, |b, &query| {
            b.iter(|| black_box(search_syntax::analyze(black_box(query), &config)))
        });
    }
    group.finish();
}

fn benchmark_sql_compiler(c: &mut Criterion) {
    let config = SearchConfig::default();
    let compiler = SqlCompiler::new();
    let mut group = c.benchmark_group("sql_compiler");
    for (name, query) in QUERIES {
        let analysis = search_syntax::analyze(query, &config);
        group.bench_with_input(BenchmarkId::new("compile", name), &analysis, |b, analysis| {
            b.iter(|| black_box(compiler.compile(black_box(&analysis.tokens), &analysis.validation)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_tokenize,
    benchmark_classify,
    benchmark_validate,
    benchmark_end_to_end,
    benchmark_sql_compiler
);
criterion_main!(benches);
