use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::backend::Capabilities;
use crate::memory::{MemoryBackend, MemoryTrack, SinkBehavior, frame_pts, marker_buffer};
use crate::metadata::Dimensions;
use crate::options::TimeoutPolicy;
use crate::output::AssumeAnswer;
use crate::sink::WriterStatus;

const INPUT: &str = "/media/spatial.mov";

fn dims() -> Dimensions {
    Dimensions::new(8, 4)
}

fn backend_with(track: MemoryTrack) -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend.insert_track(INPUT, track);
    Arc::new(backend)
}

fn request(eye: Eye, output: &Path) -> ExtractRequest {
    ExtractRequest {
        input: PathBuf::from(INPUT),
        eye,
        output: Some(output.to_path_buf()),
    }
}

#[tokio::test]
async fn test_extract_right_eye() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("right.mov");
    let backend = backend_with(MemoryTrack::stereo(dims(), 8));

    let summary = SingleEyeExtractor::new(backend.clone(), RunOptions::new())
        .run(&request(Eye::Right, &output), &mut AssumeAnswer(false))
        .await?;
    assert_eq!(summary.completed_frames, 8);
    assert_eq!(summary.reader, ReaderStatus::Completed);

    let rec = backend.recording(&output).unwrap();
    assert!(rec.marked_finished);
    assert!(rec.finalized);
    assert!(!rec.config.is_multiview());
    for (i, sample) in rec.samples.iter().enumerate() {
        assert_eq!(sample.pts, frame_pts(i));
        assert_eq!(sample.buffers[0].eye(), Some(Eye::Right));
        assert_eq!(
            sample.buffers[0].buffer.planes[0],
            marker_buffer(dims(), Eye::Right, i).planes[0]
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_extract_under_backpressure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("left.mov");
    let backend = backend_with(MemoryTrack::stereo(dims(), 15));
    backend.set_sink_behavior(SinkBehavior {
        queue_depth: 2,
        encode_delay: Duration::from_millis(2),
        ..Default::default()
    });

    let summary = SingleEyeExtractor::new(backend.clone(), RunOptions::new())
        .run(&request(Eye::Left, &output), &mut AssumeAnswer(false))
        .await?;
    assert_eq!(summary.completed_frames, 15);
    let rec = backend.recording(&output).unwrap();
    assert_eq!(rec.samples.len(), 15);
    assert_eq!(rec.backpressure_violations, 0);
    Ok(())
}

#[tokio::test]
async fn test_extract_skips_frames_without_the_eye() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("left.mov");
    let track = MemoryTrack::stereo(dims(), 5)
        .without_eye(1, Eye::Left)
        .without_eye(3, Eye::Right);
    let backend = backend_with(track);

    let summary = SingleEyeExtractor::new(backend, RunOptions::new())
        .run(&request(Eye::Left, &output), &mut AssumeAnswer(false))
        .await?;
    assert_eq!(summary.completed_frames, 4);
    assert_eq!(summary.skipped_frames, 1);
    Ok(())
}

#[tokio::test]
async fn test_extract_append_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("left.mov");
    let backend = backend_with(MemoryTrack::stereo(dims(), 5));
    backend.set_sink_behavior(SinkBehavior {
        fail_append_at: Some(2),
        ..Default::default()
    });

    let err = SingleEyeExtractor::new(backend, RunOptions::new())
        .run(&request(Eye::Left, &output), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::AppendTaggedBufferError { frame: 2 }));
    Ok(())
}

#[tokio::test]
async fn test_extract_lenient_drain_overrun_still_finalizes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("left.mov");
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    backend.set_sink_behavior(SinkBehavior {
        encode_delay: Duration::from_millis(20),
        ..Default::default()
    });
    let options = RunOptions::new()
        .wait_ceiling(Duration::from_millis(60))
        .timeout_policy(TimeoutPolicy::Lenient);

    let summary = SingleEyeExtractor::new(backend.clone(), options)
        .run(&request(Eye::Left, &output), &mut AssumeAnswer(false))
        .await?;
    assert!(!summary.drained);
    assert_eq!(summary.completed_frames, 10);
    assert_eq!(summary.writer, WriterStatus::Completed);

    let rec = backend.recording(&output).unwrap();
    assert_eq!(rec.samples.len(), 10);
    assert!(rec.finalized);
    Ok(())
}

#[tokio::test]
async fn test_extract_needs_multiview_decode() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 5));
    backend.set_capabilities(Capabilities {
        multiview_decode: false,
        multiview_encode: false,
    });

    let err = SingleEyeExtractor::new(backend.clone(), RunOptions::new())
        .run(&request(Eye::Left, &dir.path().join("left.mov")), &mut AssumeAnswer(true))
        .await
        .unwrap_err();
    assert!(err.is_preflight());
    assert!(backend.opened_sources().is_empty());
    Ok(())
}

#[test]
fn default_output_is_named_after_the_eye() {
    let path = output::extract_output_path(Eye::Right).unwrap();
    assert_eq!(path.file_name().unwrap(), "output_right.mov");
}
