use std::fmt::Write;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptiq_core::parser::{parse_pattern, parse_quiz_str};

fn quiz_toml(per_stage: usize) -> String {
    let mut toml = String::from("[quiz]\nid = \"bench\"\nname = \"Bench\"\n");
    for stage in ["easy", "medium", "hard"] {
        for i in 0..per_stage {
            let _ = write!(
                toml,
                "\n[[questions]]\nid = \"{stage}-{i}\"\nbloom_level = \"apply\"\nstage = \"{stage}\"\ncontent = \"Question {i}\"\n"
            );
        }
    }
    toml
}

fn bench_parse_quiz(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_quiz");

    let small = quiz_toml(8);
    let large = quiz_toml(200);

    group.bench_function("24_questions", |b| {
        b.iter(|| parse_quiz_str(black_box(&small), Path::new("bench.toml")))
    });

    group.bench_function("600_questions", |b| {
        b.iter(|| parse_quiz_str(black_box(&large), Path::new("bench.toml")))
    });

    group.finish();
}

fn bench_parse_pattern(c: &mut Criterion) {
    let pattern = "TTFTT-FTT-TTTFT, TFTTT ".repeat(10);

    c.bench_function("parse_pattern", |b| {
        b.iter(|| parse_pattern(black_box(&pattern)))
    });
}

criterion_group!(benches, bench_parse_quiz, bench_parse_pattern);
criterion_main!(benches);
