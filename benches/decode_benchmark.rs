//! Performance benchmarks for stream decoding
//!
//! Measures frame reassembly and classification for replies of different
//! lengths and chunk sizes.
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stepflow::options::extract_options;
use stepflow::sse::{classify, decode_all, Frame, FrameDecoder};

/// Event stream with `tokens` token frames and a final done frame
fn generate_stream(tokens: usize) -> String {
    let mut body: String = (0..tokens)
        .map(|i| format!("data: {{\"content\":\"word{} \"}}\n\n", i))
        .collect();
    body.push_str("data: {\"next_step\":\"clarify\",\"confidence\":0.82}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

/// Benchmark decoding a whole body at once
fn bench_decode_whole(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_whole");

    for tokens in [10, 100, 1000].iter() {
        let body = generate_stream(*tokens);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tokens), &body, |b, body| {
            b.iter(|| decode_all(black_box(body.as_bytes())))
        });
    }

    group.finish();
}

/// Benchmark incremental decoding with small network chunks
fn bench_decode_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chunked");
    let body = generate_stream(500);
    group.throughput(Throughput::Bytes(body.len() as u64));

    for chunk_size in [7, 64, 1024].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut decoder = FrameDecoder::new();
                    let mut frames = 0;
                    for chunk in body.as_bytes().chunks(chunk_size) {
                        frames += decoder.feed(black_box(chunk)).len();
                    }
                    decoder.finish();
                    frames
                })
            },
        );
    }

    group.finish();
}

/// Benchmark classifying every frame of a reply
fn bench_classify(c: &mut Criterion) {
    let frames = decode_all(generate_stream(500).as_bytes());

    c.bench_function("classify_500_frames", |b| {
        b.iter(|| {
            frames
                .iter()
                .filter_map(|frame| match frame {
                    Frame::Data(payload) => classify(black_box(payload)),
                    Frame::End => None,
                })
                .count()
        })
    });
}

fn bench_extract_options(c: &mut Criterion) {
    let text = "Here are a few paths:\n\nA) Rest early tonight\nB) Talk to a friend\n\
                C) Go for a walk\nD) Write it down\nE) Ask for an extension";

    c.bench_function("extract_options", |b| {
        b.iter(|| extract_options(black_box(text)))
    });
}

criterion_group!(
    benches,
    bench_decode_whole,
    bench_decode_chunked,
    bench_classify,
    bench_extract_options
);
criterion_main!(benches);
