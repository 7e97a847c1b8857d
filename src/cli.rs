use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use spatial_bus::TimeoutPolicy;
use spatial_bus::frame::Eye;
use spatial_bus::metadata::{ColorMatrix, ColorOverrides, ColorPrimaries, TransferFunction};

#[derive(Debug, Parser)]
#[command(
    name = "spatial-media-kit",
    version,
    about = "Split and merge stereoscopic MV-HEVC video"
)]
pub struct Cli {
    /// Answer yes to every overwrite question
    #[arg(long, global = true)]
    pub yes: bool,

    /// Delete outputs of a run that failed part way
    #[arg(long, global = true)]
    pub remove_partial_output: bool,

    /// Upper bound in seconds for loading, encoding and writing
    #[arg(long, global = true)]
    pub wait_ceiling_secs: Option<u64>,

    /// strict or lenient
    #[arg(long, global = true)]
    pub timeout_policy: Option<TimeoutPolicy>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split an MV-HEVC file into one ProRes file per eye
    Split {
        #[arg(long)]
        input_file: PathBuf,
        /// Defaults to the current directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Merge a left and a right file into one MV-HEVC file
    Merge {
        #[arg(long)]
        left_file: PathBuf,
        #[arg(long)]
        right_file: PathBuf,
        /// 0 to 100
        #[arg(long, allow_hyphen_values = true)]
        quality: i32,
        #[arg(long)]
        left_is_primary: bool,
        #[arg(long)]
        right_is_primary: bool,
        /// Degrees
        #[arg(long)]
        horizontal_field_of_view: f32,
        /// -10000 to 10000
        #[arg(long, allow_hyphen_values = true)]
        horizontal_disparity_adjustment: Option<i32>,
        #[arg(long)]
        output_file: PathBuf,
        /// e.g. ITU_R_709_2, P3_D65, ITU_R_2020
        #[arg(long)]
        color_primaries: Option<ColorPrimaries>,
        /// e.g. ITU_R_709_2, SMPTE_ST_2084_PQ, ITU_R_2100_HLG
        #[arg(long)]
        transfer_function: Option<TransferFunction>,
        /// e.g. ITU_R_709_2, ITU_R_601_4, ITU_R_2020
        #[arg(long)]
        color_matrix: Option<ColorMatrix>,
    },
    /// Copy one eye of an MV-HEVC file into a ProRes file
    Extract {
        #[arg(long)]
        input_file: PathBuf,
        #[arg(long, value_enum)]
        eye: EyeArg,
        /// Defaults to output_<eye>.mov in the current directory
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EyeArg {
    Left,
    Right,
}

impl From<EyeArg> for Eye {
    fn from(eye: EyeArg) -> Self {
        match eye {
            EyeArg::Left => Eye::Left,
            EyeArg::Right => Eye::Right,
        }
    }
}

pub fn color_overrides(
    color_primaries: Option<ColorPrimaries>,
    transfer_function: Option<TransferFunction>,
    color_matrix: Option<ColorMatrix>,
) -> ColorOverrides {
    ColorOverrides {
        color_primaries,
        transfer_function,
        color_matrix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_merge_arguments() {
        let cli = Cli::try_parse_from([
            "spatial-media-kit",
            "merge",
            "--left-file",
            "l.mov",
            "--right-file",
            "r.mov",
            "--quality",
            "50",
            "--right-is-primary",
            "--horizontal-field-of-view",
            "63.4",
            "--horizontal-disparity-adjustment",
            "-200",
            "--output-file",
            "out.mov",
            "--transfer-function",
            "ITU_R_2100_HLG",
            "--yes",
        ])
        .unwrap();
        assert!(cli.yes);
        match cli.command {
            Command::Merge {
                quality,
                left_is_primary,
                right_is_primary,
                horizontal_disparity_adjustment,
                transfer_function,
                color_primaries,
                ..
            } => {
                assert_eq!(quality, 50);
                assert!(!left_is_primary);
                assert!(right_is_primary);
                assert_eq!(horizontal_disparity_adjustment, Some(-200));
                assert_eq!(transfer_function, Some(TransferFunction::Itu2100Hlg));
                assert_eq!(color_primaries, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_split_and_extract() {
        let cli =
            Cli::try_parse_from(["spatial-media-kit", "split", "--input-file", "in.mov", "-v"])
                .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Split { output_dir: None, .. }));

        let cli = Cli::try_parse_from([
            "spatial-media-kit",
            "extract",
            "--input-file",
            "in.mov",
            "--eye",
            "right",
            "--timeout-policy",
            "lenient",
        ])
        .unwrap();
        assert_eq!(cli.timeout_policy, Some(TimeoutPolicy::Lenient));
        assert!(matches!(cli.command, Command::Extract { eye: EyeArg::Right, .. }));
    }

    #[test]
    fn rejects_unknown_colour_names() {
        let parsed = Cli::try_parse_from([
            "spatial-media-kit",
            "merge",
            "--left-file",
            "l.mov",
            "--right-file",
            "r.mov",
            "--quality",
            "50",
            "--left-is-primary",
            "--horizontal-field-of-view",
            "60",
            "--output-file",
            "out.mov",
            "--color-primaries",
            "DCI",
        ]);
        assert!(parsed.is_err());
    }
}
