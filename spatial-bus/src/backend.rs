use std::path::Path;
use std::sync::Arc;

use crate::error::{MediaError, Result};
use crate::options::RunOptions;
use crate::sink::{FrameSink, SinkConfig};
use crate::source::FrameSource;
use crate::wait::{self, Checkpoint};

/// What the host codec stack can do with multi-view video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub multiview_decode: bool,
    pub multiview_encode: bool,
}

/// Container plus codec collaborator the pipelines run against.
pub trait MediaBackend: Send + Sync + 'static {
    type Source: FrameSource + 'static;
    type Sink: FrameSink + 'static;

    fn capabilities(&self) -> Capabilities;

    /// Opens `path` and resolves its first decodable video track.
    fn open_source(&self, path: &Path) -> Result<Self::Source>;

    fn open_sink(&self, path: &Path, config: &SinkConfig) -> Result<Self::Sink>;
}

/// Opens a source under the discovery checkpoint.
pub async fn discover<B: MediaBackend>(
    backend: &Arc<B>,
    path: &Path,
    options: &RunOptions,
) -> Result<B::Source> {
    let b = Arc::clone(backend);
    let owned = path.to_path_buf();
    let handle = tokio::task::spawn_blocking(move || b.open_source(&owned));

    match wait::checkpoint(Checkpoint::Discovery, options, handle).await? {
        Some(joined) => {
            let source = wait::joined(joined, "track discovery")
                .map_err(|e| MediaError::read_sample(path, format!("{:#}", e)))??;
            log::info!("loaded video track from {}", path.display());
            log::debug!("{}", source.metadata());
            Ok(source)
        }
        None => {
            log::error!("could not load any tracks from {}", path.display());
            Err(MediaError::NoVideoTracksFound(path.to_path_buf()))
        }
    }
}

/// Opens `source` for reading or fails with `CouldNotReadSample`.
pub fn start_reading<S: FrameSource + ?Sized>(source: &mut S) -> Result<()> {
    if source.start_reading() {
        Ok(())
    } else {
        log::error!("could not start reading {}", source.path().display());
        Err(MediaError::read_sample(source.path(), "could not start reading"))
    }
}
