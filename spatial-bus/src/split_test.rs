use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::backend::Capabilities;
use crate::frame::Eye;
use crate::memory::{MemoryBackend, MemoryTrack, SinkBehavior, frame_pts};
use crate::metadata::Dimensions;
use crate::options::TimeoutPolicy;
use crate::output::AssumeAnswer;
use crate::sink::{CodecConfig, SingleViewCodec};
use crate::wait::Checkpoint;

const INPUT: &str = "/media/spatial.mov";

fn dims() -> Dimensions {
    Dimensions::new(8, 4)
}

fn backend_with(track: MemoryTrack) -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend.insert_track(INPUT, track);
    Arc::new(backend)
}

fn request(dir: &Path) -> SplitRequest {
    SplitRequest {
        input: PathBuf::from(INPUT),
        output_dir: Some(dir.to_path_buf()),
    }
}

#[tokio::test]
async fn test_split_ten_frames() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let summary = splitter.run(&request(dir.path()), &mut AssumeAnswer(false)).await?;
    assert_eq!(summary.completed_frames, 10);
    assert_eq!(summary.skipped_frames, 0);
    assert!(summary.drained);
    assert_eq!(summary.reader, ReaderStatus::Completed);
    assert_eq!(summary.writer, WriterStatus::Completed);

    let left_path = dir.path().join("spatial_LEFT.mov");
    let right_path = dir.path().join("spatial_RIGHT.mov");
    assert_eq!(summary.outputs, vec![left_path.clone(), right_path.clone()]);

    for (path, eye) in [(&left_path, Eye::Left), (&right_path, Eye::Right)] {
        assert!(path.exists());
        let rec = backend.recording(path).expect("sink was opened");
        assert!(rec.marked_finished);
        assert!(rec.finalized);
        assert_eq!(rec.config.dimensions, dims());
        assert_eq!(rec.config.codec, CodecConfig::SingleView(SingleViewCodec::ProRes422Hq));
        assert_eq!(rec.samples.len(), 10);
        for (i, sample) in rec.samples.iter().enumerate() {
            assert_eq!(sample.pts, frame_pts(i));
            assert_eq!(sample.buffers.len(), 1);
            assert_eq!(sample.buffers[0].eye(), Some(eye));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_split_skips_frames_missing_an_eye() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let track = MemoryTrack::stereo(dims(), 6)
        .without_eye(2, Eye::Right)
        .without_eye(4, Eye::Left);
    let backend = backend_with(track);
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let summary = splitter.run(&request(dir.path()), &mut AssumeAnswer(false)).await?;
    assert_eq!(summary.completed_frames, 4);
    assert_eq!(summary.skipped_frames, 2);

    let left = backend.recording(&dir.path().join("spatial_LEFT.mov")).unwrap();
    let right = backend.recording(&dir.path().join("spatial_RIGHT.mov")).unwrap();
    let pts: Vec<_> = left.samples.iter().map(|s| s.pts.value()).collect();
    assert_eq!(pts, vec![0, 20, 60, 100]);
    assert_eq!(left.samples.len(), right.samples.len());
    Ok(())
}

#[tokio::test]
async fn test_split_truncated_input_still_finalizes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 5).truncated());
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let summary = splitter.run(&request(dir.path()), &mut AssumeAnswer(false)).await?;
    assert_eq!(summary.completed_frames, 5);
    assert_eq!(summary.reader, ReaderStatus::Failed);
    let left = backend.recording(&dir.path().join("spatial_LEFT.mov")).unwrap();
    assert!(left.finalized);
    Ok(())
}

#[tokio::test]
async fn test_split_append_failure_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    backend.set_sink_behavior(SinkBehavior {
        fail_append_at: Some(7),
        ..Default::default()
    });
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let err = splitter
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::AppendTaggedBufferError { frame: 7 }));

    let right = backend.recording(&dir.path().join("spatial_RIGHT.mov")).unwrap();
    assert_eq!(right.append_calls, 6);
    assert!(!right.finalized);
    // partial outputs are kept unless asked otherwise
    assert!(dir.path().join("spatial_LEFT.mov").exists());
    Ok(())
}

#[tokio::test]
async fn test_split_removes_partial_output_when_asked() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    backend.set_sink_behavior(SinkBehavior {
        fail_append_at: Some(3),
        ..Default::default()
    });
    let options = RunOptions::new().remove_partial_output(true);
    let splitter = SpatialVideoSplitter::new(backend, options);

    assert!(splitter.run(&request(dir.path()), &mut AssumeAnswer(false)).await.is_err());
    assert!(!dir.path().join("spatial_LEFT.mov").exists());
    assert!(!dir.path().join("spatial_RIGHT.mov").exists());
    Ok(())
}

#[tokio::test]
async fn test_split_declined_overwrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let existing = dir.path().join("spatial_RIGHT.mov");
    std::fs::write(&existing, b"keep me")?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let err = splitter
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::CreateOutputError { .. }));
    assert_eq!(std::fs::read(&existing)?, b"keep me");
    assert!(backend.opened_sinks().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_split_accepted_overwrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let existing = dir.path().join("spatial_LEFT.mov");
    std::fs::write(&existing, b"old")?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 3));
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let summary = splitter.run(&request(dir.path()), &mut AssumeAnswer(true)).await?;
    assert_eq!(summary.completed_frames, 3);
    assert_ne!(std::fs::read(&existing)?, b"old");
    Ok(())
}

#[tokio::test]
async fn test_split_preflight_failures() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let backend = backend_with(MemoryTrack::stereo(dims(), 3));
    backend.set_capabilities(Capabilities {
        multiview_decode: false,
        multiview_encode: false,
    });
    let err = SpatialVideoSplitter::new(backend.clone(), RunOptions::new())
        .run(&request(dir.path()), &mut AssumeAnswer(true))
        .await
        .unwrap_err();
    assert!(err.is_preflight());
    assert!(backend.opened_sources().is_empty());

    let backend = Arc::new(MemoryBackend::new());
    let err = SpatialVideoSplitter::new(backend, RunOptions::new())
        .run(&request(dir.path()), &mut AssumeAnswer(true))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::NoVideoTracksFound(_)));

    let backend = backend_with(MemoryTrack::stereo(dims(), 3).failing_start());
    let err = SpatialVideoSplitter::new(backend, RunOptions::new())
        .run(&request(dir.path()), &mut AssumeAnswer(true))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::CouldNotReadSample { .. }));
    Ok(())
}

#[tokio::test]
async fn test_split_waits_for_readiness() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 12));
    backend.set_sink_behavior(SinkBehavior {
        queue_depth: 1,
        encode_delay: Duration::from_millis(2),
        ..Default::default()
    });
    let splitter = SpatialVideoSplitter::new(backend.clone(), RunOptions::new());

    let summary = splitter.run(&request(dir.path()), &mut AssumeAnswer(false)).await?;
    assert_eq!(summary.completed_frames, 12);

    let left = backend.recording(&dir.path().join("spatial_LEFT.mov")).unwrap();
    let right = backend.recording(&dir.path().join("spatial_RIGHT.mov")).unwrap();
    assert_eq!(left.backpressure_violations, 0);
    assert_eq!(right.backpressure_violations, 0);
    assert_eq!(summary.ready_stalls, left.not_ready_polls + right.not_ready_polls);
    Ok(())
}

#[tokio::test]
async fn test_split_drain_overrun() -> anyhow::Result<()> {
    let slow = SinkBehavior {
        encode_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let options = RunOptions::new().wait_ceiling(Duration::from_millis(60));

    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    backend.set_sink_behavior(slow.clone());
    let err = SpatialVideoSplitter::new(backend, options.clone())
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::TimeoutError {
            checkpoint: Checkpoint::Drain,
            ..
        }
    ));

    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 10));
    backend.set_sink_behavior(slow);
    let lenient = options.timeout_policy(TimeoutPolicy::Lenient);
    let summary = SpatialVideoSplitter::new(backend.clone(), lenient)
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await?;
    assert!(!summary.drained);
    assert_eq!(summary.completed_frames, 10);
    assert_eq!(summary.reader, ReaderStatus::Completed);
    for name in ["spatial_LEFT.mov", "spatial_RIGHT.mov"] {
        let rec = backend.recording(&dir.path().join(name)).unwrap();
        assert_eq!(rec.samples.len(), 10);
        assert!(rec.marked_finished);
        assert!(rec.finalized);
    }
    Ok(())
}

#[tokio::test]
async fn test_split_finalize_overrun_is_always_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let backend = backend_with(MemoryTrack::stereo(dims(), 2));
    backend.set_sink_behavior(SinkBehavior {
        finish_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let options = RunOptions::new()
        .wait_ceiling(Duration::from_millis(100))
        .timeout_policy(TimeoutPolicy::Lenient);

    let err = SpatialVideoSplitter::new(backend, options)
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::TimeoutError {
            checkpoint: Checkpoint::Finalize,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_split_discovery_overrun() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let options = RunOptions::new().wait_ceiling(Duration::from_millis(30));

    let backend = backend_with(MemoryTrack::stereo(dims(), 2));
    backend.set_discovery_delay(Duration::from_millis(200));
    let err = SpatialVideoSplitter::new(backend, options.clone())
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::TimeoutError {
            checkpoint: Checkpoint::Discovery,
            ..
        }
    ));

    let backend = backend_with(MemoryTrack::stereo(dims(), 2));
    backend.set_discovery_delay(Duration::from_millis(200));
    let err = SpatialVideoSplitter::new(backend, options.timeout_policy(TimeoutPolicy::Lenient))
        .run(&request(dir.path()), &mut AssumeAnswer(false))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::NoVideoTracksFound(_)));
    Ok(())
}
