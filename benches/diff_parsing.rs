//! Benchmarks for diff parsing and review rendering.
//!
//! These benchmarks measure the performance of:
//! - Unified diff parsing (parse_unified_diff)
//! - Rendering a file with comment threads (ReviewPanel::prerender_content)
//! - Building the file tree from changed paths (FileTree::new)

mod common;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use common::{file_path, generate_comments, generate_diff, pull_request};
use prt::app::file_tree::FileTree;
use prt::app::review::ReviewPanel;
use prt::diff::parse_unified_diff;

/// Benchmark parsing whole patches of increasing size.
fn bench_parse_unified_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_parsing/parse_unified_diff");

    for file_count in [1, 10, 100] {
        let patch = generate_diff(file_count, 4, 50);
        group.throughput(Throughput::Bytes(patch.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            patch.as_bytes(),
            |b, patch| {
                b.iter(|| black_box(parse_unified_diff(black_box(patch))));
            },
        );
    }

    group.finish();
}

/// Benchmark rendering one file with an increasing number of comments.
fn bench_prerender_content(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_parsing/prerender_content");
    let patch = generate_diff(1, 20, 50);
    let target = file_path(0);

    for comment_count in [0, 50, 500] {
        let mut panel = ReviewPanel::new(pull_request());
        panel.set_data(
            pull_request(),
            patch.as_bytes(),
            generate_comments(comment_count, 400),
        );

        group.bench_with_input(
            BenchmarkId::from_parameter(comment_count),
            &panel,
            |b, panel| {
                b.iter(|| black_box(panel.prerender_content(black_box(&target))));
            },
        );
    }

    group.finish();
}

/// Benchmark building the collapsed file tree.
fn bench_file_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_parsing/file_tree");

    for file_count in [10, 100, 1000] {
        let patch = generate_diff(file_count, 1, 4);
        let files = parse_unified_diff(patch.as_bytes()).unwrap_or_default();
        group.throughput(Throughput::Elements(file_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &files,
            |b, files| {
                b.iter(|| black_box(FileTree::new(black_box(files), "#1 Benchmark")));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_unified_diff,
    bench_prerender_content,
    bench_file_tree
);
criterion_main!(benches);
