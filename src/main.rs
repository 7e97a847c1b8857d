use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use spatial_bus::{
    AssumeAnswer, ExtractRequest, MediaError, MergeRequest, OverwritePrompt, RunSummary,
    SingleEyeExtractor, SpatialVideoMerger, SpatialVideoSplitter, SplitRequest,
};

use crate::cli::{Cli, Command};
use crate::prompt::StdinPrompt;

mod cli;
mod config;
mod prompt;

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("spatial_bus", level)
        .filter_module("spatial_media_kit", level)
        .parse_default_env()
        .init();
}

#[cfg(feature = "ffmpeg")]
fn backend() -> Arc<spatial_bus::av::FfmpegBackend> {
    Arc::new(spatial_bus::av::FfmpegBackend::new())
}

#[cfg(not(feature = "ffmpeg"))]
fn backend() -> Arc<spatial_bus::memory::MemoryBackend> {
    log::warn!("built without a codec backend, rebuild with the `ffmpeg` feature to process files");
    let backend = spatial_bus::memory::MemoryBackend::new();
    backend.set_capabilities(spatial_bus::Capabilities {
        multiview_decode: false,
        multiview_encode: false,
    });
    Arc::new(backend)
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let config = config::config();
    let mut options = config
        .run_options()
        .remove_partial_output(cli.remove_partial_output);
    if let Some(secs) = cli.wait_ceiling_secs {
        options = options.wait_ceiling(Duration::from_secs(secs));
    }
    if let Some(policy) = cli.timeout_policy {
        options = options.timeout_policy(policy);
    }
    log::debug!(
        "wait ceiling {}s, timeout policy {:?}",
        options.wait_ceiling.as_secs(),
        options.timeout_policy
    );

    let mut prompt: Box<dyn OverwritePrompt> = if cli.yes {
        Box::new(AssumeAnswer(true))
    } else {
        Box::new(StdinPrompt)
    };
    let backend = backend();

    let summary = match cli.command {
        Command::Split {
            input_file,
            output_dir,
        } => {
            let request = SplitRequest {
                input: input_file,
                output_dir,
            };
            SpatialVideoSplitter::new(backend, options)
                .run(&request, prompt.as_mut())
                .await?
        }
        Command::Merge {
            left_file,
            right_file,
            quality,
            left_is_primary,
            right_is_primary,
            horizontal_field_of_view,
            horizontal_disparity_adjustment,
            output_file,
            color_primaries,
            transfer_function,
            color_matrix,
        } => {
            let request = MergeRequest {
                left: left_file,
                right: right_file,
                output: output_file,
                quality_percent: quality,
                left_is_primary,
                right_is_primary,
                horizontal_field_of_view,
                horizontal_disparity_adjustment,
                color: cli::color_overrides(color_primaries, transfer_function, color_matrix),
            };
            SpatialVideoMerger::new(backend, options)
                .run(&request, prompt.as_mut())
                .await?
        }
        Command::Extract {
            input_file,
            eye,
            output_file,
        } => {
            let request = ExtractRequest {
                input: input_file,
                eye: eye.into(),
                output: output_file,
            };
            SingleEyeExtractor::new(backend, options)
                .run(&request, prompt.as_mut())
                .await?
        }
    };
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = spatial_bus::init() {
        log::error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(summary) => {
            if !summary.drained {
                log::warn!("encoding ran past the wait limit before the outputs were finalized");
            }
            if summary.skipped_frames > 0 {
                log::warn!("skipped {} incomplete frames", summary.skipped_frames);
            }
            for output in &summary.outputs {
                println!("{}", output.display());
            }
            log::info!("done, {} frames written", summary.completed_frames);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<MediaError>() {
                Some(err) if err.is_preflight() => eprintln!("{}", err),
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "ffmpeg")]
    #[test]
    fn default_build_processes_files_with_ffmpeg() {
        let backend: Arc<spatial_bus::av::FfmpegBackend> = backend();
        assert!(!spatial_bus::MediaBackend::capabilities(&*backend).multiview_encode);
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn build_without_ffmpeg_reports_no_capabilities() {
        let backend = backend();
        let caps = spatial_bus::MediaBackend::capabilities(&*backend);
        assert!(!caps.multiview_decode);
        assert!(!caps.multiview_encode);
    }
}
