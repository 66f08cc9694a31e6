//! Benchmarks for field extraction and classification
//!
//! Tests per-frame cost for:
//! - Big- and little-endian extraction at several widths
//! - Negative (from-the-end) offsets
//! - Extraction plus classification of a full flush batch

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use framestream::ingest::classify_event;
use framestream::{ClassifierConfig, ExtractionConfig, FrameEvent, PipelineConfig, extract};
use std::hint::black_box;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

fn bench_extract_widths(c: &mut Criterion) {
    let bytes = payload(64);
    let mut group = c.benchmark_group("extract_width");

    for width in [1u32, 2, 4, 8] {
        let be = ExtractionConfig::big_endian(3, width);
        let le = ExtractionConfig::little_endian(3, width);
        group.bench_with_input(BenchmarkId::new("big_endian", width), &be, |b, cfg| {
            b.iter(|| black_box(extract(black_box(&bytes), cfg)))
        });
        group.bench_with_input(BenchmarkId::new("little_endian", width), &le, |b, cfg| {
            b.iter(|| black_box(extract(black_box(&bytes), cfg)))
        });
    }

    group.finish();
}

fn bench_negative_offset(c: &mut Criterion) {
    let bytes = payload(12);
    let trailer = ExtractionConfig::little_endian(-2, 2);

    c.bench_function("extract_trailer_checksum", |b| {
        b.iter(|| black_box(extract(black_box(&bytes), &trailer)))
    });
}

fn bench_classify_batch(c: &mut Criterion) {
    let config = PipelineConfig {
        id_extraction: Some(ExtractionConfig::big_endian(0, 2)),
        source_extraction: Some(ExtractionConfig::big_endian(2, 1)),
        classifier: ClassifierConfig {
            mask: Some(0x7F0),
            min_length: 4,
            ..ClassifierConfig::with_catalog((0..64).map(|i| i << 4))
        },
        ..PipelineConfig::default()
    };

    let mut group = c.benchmark_group("classify_batch");
    for size in [100usize, 1_000, 10_000] {
        let events: Vec<FrameEvent> = (0..size)
            .map(|i| {
                let mut bytes = payload(8);
                bytes[..2].copy_from_slice(&((i % 2048) as u16).to_be_bytes());
                FrameEvent::new(0, bytes, i as u64 * 100)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                let matched = events
                    .iter()
                    .map(|e| classify_event(e, &config))
                    .filter(|f| f.is_matched())
                    .count();
                black_box(matched)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract_widths, bench_negative_offset, bench_classify_batch);
criterion_main!(benches);
