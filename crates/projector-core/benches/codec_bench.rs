//! Criterion benchmarks for the remote protocol line codec.
//!
//! The hot path is `slide_updated` with a preview image attached: the remote
//! sends one per slide change and each preview is tens of kilobytes of base64.
//!
//! Run with:
//! ```bash
//! cargo bench --package projector-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use projector_core::protocol::codec::{decode_group, encode_group};
use projector_core::protocol::messages::{MessageGroup, RemoteCommand, RemoteEvent};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A fake base64 preview of roughly `len` bytes.
fn fake_preview(len: usize) -> String {
    "iVBORw0KGgoAAAANSUhEUgAA".chars().cycle().take(len).collect()
}

fn fixtures() -> Vec<(&'static str, Vec<String>)> {
    let preview = fake_preview(48 * 1024);
    vec![
        ("transition_next", RemoteCommand::TransitionNext.to_group().into_tokens()),
        ("goto_slide", RemoteCommand::GoToSlide(12).to_group().into_tokens()),
        (
            "slideshow_started",
            vec!["slideshow_started".into(), "40".into(), "0".into(), preview.clone()],
        ),
        ("slide_updated", vec!["slide_updated".into(), "7".into(), preview]),
        ("slideshow_finished", vec!["slideshow_finished".into()]),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_group");
    for (name, tokens) in fixtures() {
        group.bench_with_input(BenchmarkId::new("group", name), &tokens, |b, tokens| {
            b.iter(|| encode_group(black_box(tokens)).expect("encode must succeed"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_group");
    for (name, tokens) in fixtures() {
        let bytes = encode_group(&tokens).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("group", name), &bytes, |b, bytes| {
            b.iter(|| decode_group(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Decode plus typed interpretation, as the link reader does for every group.
fn bench_decode_to_event(c: &mut Criterion) {
    let tokens = vec!["slide_updated".to_string(), "7".to_string(), fake_preview(48 * 1024)];
    let bytes = encode_group(&tokens).expect("encode must succeed for benchmark setup");

    c.bench_function("decode_to_event/slide_updated", |b| {
        b.iter(|| {
            let (group, _) = decode_group(black_box(&bytes)).unwrap();
            RemoteEvent::from_group(black_box::<MessageGroup>(group))
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_decode_to_event);
criterion_main!(benches);
