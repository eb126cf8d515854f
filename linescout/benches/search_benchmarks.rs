use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linescout::regex::Regex;
use linescout::{search, simd, PatternMatcher, SearchConfig, Sink};
use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;
use tempfile::tempdir;

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> std::io::Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}",
                j, j, j, j
            )?;
        }
    }
    Ok(())
}

fn haystack(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = b"the quick brown fox jumps over the lazy dog \n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect();
    let tail = b"one true needle";
    let at = data.len() - tail.len();
    data[at..].copy_from_slice(tail);
    data
}

fn bench_simd_scanner(c: &mut Criterion) {
    let data = haystack(1 << 20);

    c.bench_function("simd_find_substring_1mb", |b| {
        b.iter(|| simd::find_substring(black_box(&data), black_box(b"true needle")))
    });

    c.bench_function("simd_count_newlines_1mb", |b| {
        b.iter(|| simd::count_newlines(black_box(&data)))
    });
}

fn bench_regex_engine(c: &mut Criterion) {
    let line = b"a line mentioning pattern_42 somewhere in the middle of it";

    let prefixed = Regex::compile(b"pattern_[0-9]+", false).unwrap();
    c.bench_function("regex_find_prefixed", |b| {
        b.iter(|| prefixed.find(black_box(line)))
    });

    let unprefixed = Regex::compile(b".*_[0-9]+", false).unwrap();
    c.bench_function("regex_find_unprefixed", |b| {
        b.iter(|| unprefixed.find(black_box(line)))
    });
}

fn bench_matcher(c: &mut Criterion) {
    let line = b"Line 7 TODO: fix bug 7 FIXME: optimize line 7 NOTE: important task 7";

    let literal = PatternMatcher::new(b"FIXME", false, false).unwrap();
    c.bench_function("matcher_literal_line", |b| {
        b.iter(|| literal.find_first(black_box(line)))
    });

    let regex = PatternMatcher::new(b"FIXME:.*line [0-9]+", false, false).unwrap();
    c.bench_function("matcher_regex_line", |b| {
        b.iter(|| regex.find_first(black_box(line)))
    });
}

fn bench_full_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_test_files(&dir, 50, 200).unwrap();

    for threads in [1usize, 4] {
        let config = SearchConfig {
            pattern: "TODO".to_string(),
            paths: vec![dir.path().to_path_buf()],
            count_only: true,
            thread_count: NonZeroUsize::new(threads).unwrap(),
            ..Default::default()
        };
        c.bench_function(&format!("search_tree_{threads}_threads"), |b| {
            b.iter(|| {
                let sink = Sink::new(Box::new(std::io::sink()), false, false);
                search(black_box(&config), &sink).unwrap()
            })
        });
    }
}

criterion_group!(
    benches,
    bench_simd_scanner,
    bench_regex_engine,
    bench_matcher,
    bench_full_search
);
criterion_main!(benches);
