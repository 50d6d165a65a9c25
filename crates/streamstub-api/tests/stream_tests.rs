use std::time::Duration;

use streamstub_api::params::StreamParams;
use streamstub_api::record::UsageLine;
use streamstub_api::stream::{emit, spawn_stream, ChunkWriter, MAX_DELTA_BLOCK};
use streamstub_common::StubError;
use streamstub_obs::StreamMetrics;
use tokio_stream::StreamExt as _;

const USAGE: &str = r#"{"usage":{"prompt_tokens":34,"total_tokens":134,"completion_tokens":100,"completion_tokens_details":{"reasoning_tokens":10},"prompt_tokens_details":{"cached_tokens":11}}}"#;

fn params(chunks: usize, bytes_per_chunk: usize, delay_ms: i64) -> StreamParams {
    StreamParams { chunks, bytes_per_chunk, delay_ms }
}

#[test]
fn usage_line_serializes_in_wire_order() {
    assert_eq!(serde_json::to_string(&UsageLine::STUB).unwrap(), USAGE);
}

#[tokio::test]
async fn write_buffers_until_flush() {
    let (mut w, mut rx) = ChunkWriter::channel();
    w.write_json(&serde_json::json!({"a": 1})).unwrap();
    assert_eq!(w.pending(), 8);
    assert!(rx.try_recv().is_err());

    assert_eq!(w.flush().await.unwrap(), 8);
    assert_eq!(w.pending(), 0);
    let frame = rx.recv().await.unwrap().unwrap();
    assert_eq!(&frame[..], b"{\"a\":1}\n");

    // nothing pending, nothing sent
    assert_eq!(w.flush().await.unwrap(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn every_line_is_its_own_frame() {
    let (mut w, mut rx) = ChunkWriter::channel();
    let task = tokio::spawn(async move { emit(params(2, 4, 0), &mut w, &StreamMetrics::new()).await });

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(String::from_utf8(frame.unwrap().to_vec()).unwrap());
    }
    assert_eq!(
        frames,
        vec![
            "{\"delta\":\"    \",\"i\":0}\n".to_string(),
            "{\"delta\":\"    \",\"i\":1}\n".to_string(),
            format!("{USAGE}\n"),
        ]
    );

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.bytes, frames.iter().map(String::len).sum::<usize>());
}

#[tokio::test]
async fn indices_ascend_without_gaps() {
    let (mut w, mut rx) = ChunkWriter::channel();
    tokio::spawn(async move { emit(params(25, 3, 0), &mut w, &StreamMetrics::new()).await });

    let mut lines = Vec::new();
    while let Some(frame) = rx.recv().await {
        lines.push(serde_json::from_slice::<serde_json::Value>(&frame.unwrap()).unwrap());
    }
    assert_eq!(lines.len(), 26);
    for (idx, line) in lines[..25].iter().enumerate() {
        assert_eq!(line["i"], idx);
        assert_eq!(line["delta"], "   ");
    }
    assert!(lines[25].get("usage").is_some());
}

#[tokio::test(start_paused = true)]
async fn delay_follows_every_flush_including_the_last_chunk() {
    let (mut w, mut rx) = ChunkWriter::channel();
    let start = tokio::time::Instant::now();
    tokio::spawn(async move { emit(params(3, 1, 100), &mut w, &StreamMetrics::new()).await });

    let mut arrivals = Vec::new();
    while let Some(frame) = rx.recv().await {
        frame.unwrap();
        arrivals.push(start.elapsed());
    }
    assert_eq!(arrivals.len(), 4);
    for pair in arrivals.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(100), "{arrivals:?}");
    }
    // the usage line waits out the pause after chunk 2
    assert!(arrivals[3] >= Duration::from_millis(300));
}

#[tokio::test]
async fn dropped_body_stops_emission() {
    let metrics = StreamMetrics::new();
    let (mut w, mut rx) = ChunkWriter::channel();
    let task = tokio::spawn(async move { emit(params(1_000, 8, 0), &mut w, &metrics).await });

    rx.recv().await.unwrap().unwrap();
    rx.recv().await.unwrap().unwrap();
    drop(rx);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, StubError::ClientGone));
}

#[tokio::test]
async fn oversized_delta_is_streamed_in_bounded_frames() {
    let (mut w, mut rx) = ChunkWriter::channel();
    let task = tokio::spawn(async move { emit(params(1, usize::MAX, 0), &mut w, &StreamMetrics::new()).await });

    let first = rx.recv().await.unwrap().unwrap();
    assert!(first.starts_with(b"{\"delta\":\""));
    assert!(first.len() <= MAX_DELTA_BLOCK + 16);
    for _ in 0..8 {
        let frame = rx.recv().await.unwrap().unwrap();
        assert!(frame.len() <= MAX_DELTA_BLOCK);
        assert!(frame.iter().all(|b| *b == b' '));
    }
    drop(rx);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, StubError::ClientGone));
}

#[tokio::test]
async fn long_delta_reassembles_into_valid_lines() {
    let bytes_per_chunk = MAX_DELTA_BLOCK * 2 + 3;
    let (mut w, mut rx) = ChunkWriter::channel();
    let task = tokio::spawn(async move { emit(params(2, bytes_per_chunk, 0), &mut w, &StreamMetrics::new()).await });

    let mut frames = 0;
    let mut body = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames += 1;
        body.extend_from_slice(&frame.unwrap());
    }
    assert!(frames > 3, "expected the deltas to span several frames, got {frames}");

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    for (idx, line) in lines[..2].iter().enumerate() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["i"], idx);
        assert_eq!(v["delta"].as_str().unwrap().len(), bytes_per_chunk);
        assert!(v["delta"].as_str().unwrap().bytes().all(|b| b == b' '));
    }
    assert_eq!(lines[2], USAGE);

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.bytes, text.len());
}

#[tokio::test]
async fn dropped_response_body_counts_an_abort() {
    let metrics = StreamMetrics::new();
    let aborted_before = metrics.aborted_total();
    let chunks_before = metrics.chunks_total();

    let mut data = spawn_stream(params(1_000, 8, 0), metrics.clone()).into_data_stream();
    data.next().await.unwrap().unwrap();
    data.next().await.unwrap().unwrap();
    drop(data);

    for _ in 0..200 {
        if metrics.aborted_total() > aborted_before {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metrics.aborted_total(), aborted_before + 1);
    assert!(metrics.chunks_total() >= chunks_before + 2);
}
