/// Registers codec components. Call once at startup before opening any
/// FFmpeg-backed source or sink; a no-op without the `ffmpeg` feature.
pub fn init() -> anyhow::Result<()> {
    #[cfg(feature = "ffmpeg")]
    {
        ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    }
    Ok(())
}

#[cfg(feature = "ffmpeg")]
pub mod av;
pub mod backend;
pub mod error;
pub mod extract;
pub mod frame;
pub mod memory;
pub mod merge;
pub mod metadata;
pub mod options;
pub mod output;
pub mod ready;
pub mod sink;
pub mod source;
pub mod split;
pub mod state;
pub mod wait;

pub use backend::{Capabilities, MediaBackend};
pub use error::{MediaError, Result};
pub use extract::{ExtractRequest, SingleEyeExtractor};
pub use frame::Eye;
pub use merge::{MergeRequest, SpatialVideoMerger};
pub use options::{RunOptions, TimeoutPolicy};
pub use output::{AssumeAnswer, OverwritePrompt};
pub use split::{SpatialVideoSplitter, SplitRequest};
pub use state::RunSummary;
