//! End-to-end capture lifecycle: live ingestion, stop, persisted paging.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use framestream::{
    BridgePhase, BufferBridge, BufferMode, CaptureSession, ChannelProvider, Disposition, FieldDecoder,
    FrameEvent, MemoryBackend, PipelineConfig, SeekOutcome,
};

const CONFIG: &str = r#"
id_extraction:
  start_byte: 0
  num_bytes: 2
  big_endian: true
source_extraction:
  start_byte: -1
  num_bytes: 1
classifier:
  catalog_ids: [0x120, 0x340]
  mask: 0x7F0
  min_length: 4
max_buffer: 50
overshoot_threshold: 10
flush_interval_ms: 100
"#;

/// Frame with a big-endian routing ID up front and a source address trailer.
fn frame(id: u16, source: u8, len: usize, ts: u64) -> FrameEvent {
    let mut bytes = vec![0xAA; len.max(3)];
    bytes[..2].copy_from_slice(&id.to_be_bytes());
    let last = bytes.len() - 1;
    bytes[last] = source;
    bytes.truncate(len.max(2));
    FrameEvent::new(0, bytes, ts)
}

fn recording() -> Vec<FrameEvent> {
    (0..120u64)
        .map(|i| match i % 4 {
            0 => frame(0x121, 7, 8, i * 1_000),
            1 => frame(0x345, 9, 8, i * 1_000),
            2 => frame(0x500, 1, 8, i * 1_000),
            _ => frame(0x120, 3, 2, i * 1_000),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn live_capture_hands_off_to_paginated_reads() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let config = PipelineConfig::from_yaml_str(CONFIG)?;
    let raw = recording();

    let (tx, provider) = ChannelProvider::new(16);
    let session = CaptureSession::start(provider, config.clone())?;
    let live = session.live_view();

    for chunk in raw.chunks(10) {
        tx.send(chunk.to_vec()).await?;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    drop(tx);
    let summary = session.finished().await?;

    ensure!(summary.counts.total() == 120, "every frame is classified");
    assert_eq!(summary.counts.matched, 60);
    assert_eq!(summary.counts.unmatched, 30);
    assert_eq!(summary.counts.too_short, 30);

    // Compaction keeps at most max_buffer + overshoot frames, always the newest
    let (_, kept) = live.snapshot();
    assert!(kept.len() <= 60);
    assert_eq!(kept.last().map(|f| f.timestamp_micros()), Some(119_000));

    let mut bridge = BufferBridge::new(MemoryBackend::new(raw, &config), 25);
    assert_eq!(bridge.streaming_page(&live).total_count, kept.len());

    bridge.capture_stopped(true, 90);
    assert_eq!(bridge.phase(), BridgePhase::PaginatedReady);
    assert_eq!(bridge.mode(), BufferMode::Paginated);

    let first = bridge.read_page(&live).await?;
    assert_eq!(first.total_count, 90, "too-short frames are held apart");
    assert_eq!(first.records.len(), 25);
    assert!(first.records.iter().all(|f| f.disposition != Disposition::TooShort));

    let matched = first.records.iter().find(|f| f.is_matched()).context("page has a matched frame")?;
    assert_eq!(matched.masked_id, 0x120);
    assert_eq!(matched.event.source_address, Some(7));

    Ok(())
}

#[tokio::test]
async fn out_of_order_scrub_responses_keep_latest() -> Result<()> {
    let config = PipelineConfig::from_yaml_str(CONFIG)?;
    let backend = MemoryBackend::new(recording(), &config);
    let mut bridge = BufferBridge::new(backend, 10);
    bridge.capture_stopped(true, 90);

    let backend = bridge.backend();
    let tags: Vec<_> = (0..3).map(|_| bridge.begin_seek()).collect();
    let lookups = [10_000, 50_000, 100_000].map(|ts| {
        let backend = Arc::clone(&backend);
        async move { framestream::PaginatedBackend::find_offset_for_timestamp(&*backend, ts, None).await }
    });
    let [first, second, third] = lookups;
    let (first, second, third) = (first.await, second.await, third.await);

    // Responses land in the order 1, 3, 2
    assert_eq!(bridge.complete_seek(tags[0], first)?, SeekOutcome::Stale);
    let applied = bridge.complete_seek(tags[2], third)?;
    assert_eq!(bridge.complete_seek(tags[1], second)?, SeekOutcome::Stale);

    // 100 ms is frame 100; three of every four frames before it are visible
    assert_eq!(applied, SeekOutcome::Applied { page: 7, offset: 75 });
    assert_eq!(bridge.current_page(), 7);
    Ok(())
}

#[tokio::test]
async fn reframing_a_persisted_capture_matches_live_rules() -> Result<()> {
    let config = PipelineConfig::from_yaml_str(CONFIG)?;
    let mut bridge = BufferBridge::new(MemoryBackend::new(recording(), &config), 40);
    bridge.capture_stopped(true, 90);

    let mut relaxed = config.clone();
    relaxed.classifier.min_length = 0;
    relaxed.classifier.id_filter = Some([0x500].into());
    let result = bridge.apply_framing(Arc::new(relaxed)).await?;

    assert_eq!(result.frame_count, 90);
    assert_eq!(result.filtered_count, 30);
    assert_eq!(bridge.state().total_count, 90);
    assert_eq!(bridge.buffer_id(), Some(result.buffer_id));

    let page = bridge.fetch_current_page().await?;
    assert!(page.records.iter().all(|f| f.routing_id() != 0x500));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn selected_signals_are_decoded_and_aligned() -> Result<()> {
    let config = PipelineConfig::from_yaml_str(CONFIG)?;
    let decoder = FieldDecoder::new()
        .with_field(0x120, "source", framestream::ExtractionConfig::little_endian(-1, 1))
        .with_field(0x340, "peer", framestream::ExtractionConfig::little_endian(-1, 1));

    let (tx, provider) = ChannelProvider::new(16);
    let session = CaptureSession::start_with_decoder(provider, config, decoder)?;
    session.set_selection([0x120, 0x340]).await?;
    let signals = session.signals();

    tx.send(recording()).await?;
    drop(tx);
    session.finished().await?;

    let (stamps, values) = signals.read_ordered("source").context("source series exists")?;
    assert_eq!(stamps.len(), 30);
    assert!(values.iter().all(|v| *v == 7.0));

    let aligned = signals.align("source", &["peer"]).context("both series exist")?;
    assert_eq!(aligned.timestamps, stamps);
    // Peer frames arrive one millisecond after each source frame, never on the same timestamp
    assert!(aligned.columns[0].iter().all(Option::is_none));
    Ok(())
}
