//! Track metadata resolved once at pipeline start.

use std::fmt;
use std::str::FromStr;

use crate::error::{MediaError, Result};
use crate::frame::Rational;

macro_rules! color_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s),+
                }
            }
        }

        impl FromStr for $name {
            type Err = MediaError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($s => Ok($name::$variant),)+
                    other => Err(MediaError::invalid(format!(
                        "unknown {} {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

color_enum!(
    /// Colour primaries identifiers understood by the encoder.
    ColorPrimaries {
        Itu709 => "ITU_R_709_2",
        Ebu3213 => "EBU_3213",
        SmpteC => "SMPTE_C",
        P3D65 => "P3_D65",
        Itu2020 => "ITU_R_2020",
    }
);

color_enum!(
    TransferFunction {
        Itu709 => "ITU_R_709_2",
        Smpte240M => "SMPTE_240M_1995",
        SmpteSt2084Pq => "SMPTE_ST_2084_PQ",
        Itu2100Hlg => "ITU_R_2100_HLG",
        Linear => "Linear",
        Srgb => "IEC_sRGB",
    }
);

color_enum!(
    ColorMatrix {
        Itu709 => "ITU_R_709_2",
        Itu601 => "ITU_R_601_4",
        Smpte240M => "SMPTE_240M_1995",
        Itu2020 => "ITU_R_2020",
    }
);

/// Raw colour extensions as read from a track's format description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatExtensions {
    pub color_primaries: Option<String>,
    pub transfer_function: Option<String>,
    pub color_matrix: Option<String>,
}

/// Explicit per-field replacements supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorOverrides {
    pub color_primaries: Option<ColorPrimaries>,
    pub transfer_function: Option<TransferFunction>,
    pub color_matrix: Option<ColorMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorProperties {
    pub color_primaries: ColorPrimaries,
    pub transfer_function: TransferFunction,
    pub color_matrix: ColorMatrix,
}

impl Default for ColorProperties {
    fn default() -> Self {
        Self {
            color_primaries: ColorPrimaries::Itu709,
            transfer_function: TransferFunction::Itu709,
            color_matrix: ColorMatrix::Itu709,
        }
    }
}

impl ColorProperties {
    /// Resolves each field independently: override, else extension, else BT.709.
    pub fn resolve(extensions: &FormatExtensions, overrides: &ColorOverrides) -> Self {
        let defaults = Self::default();
        Self {
            color_primaries: overrides
                .color_primaries
                .or_else(|| parse_extension(extensions.color_primaries.as_deref()))
                .unwrap_or(defaults.color_primaries),
            transfer_function: overrides
                .transfer_function
                .or_else(|| parse_extension(extensions.transfer_function.as_deref()))
                .unwrap_or(defaults.transfer_function),
            color_matrix: overrides
                .color_matrix
                .or_else(|| parse_extension(extensions.color_matrix.as_deref()))
                .unwrap_or(defaults.color_matrix),
        }
    }
}

fn parse_extension<T: FromStr<Err = MediaError>>(value: Option<&str>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("ignoring colour extension: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Horizontal field of view in thousandths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOfView(u32);

impl FieldOfView {
    pub fn from_degrees(degrees: f32) -> Result<Self> {
        if !degrees.is_finite() || degrees <= 0.0 || degrees > 360.0 {
            return Err(MediaError::invalid(format!(
                "horizontal field of view must be in (0, 360] degrees, got {}",
                degrees
            )));
        }
        Ok(Self((degrees * 1000.0).round() as u32))
    }

    pub fn millidegrees(&self) -> u32 {
        self.0
    }
}

/// Signed horizontal disparity adjustment, within [-10000, 10000].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisparityAdjustment(i32);

impl DisparityAdjustment {
    pub const MIN: i32 = -10_000;
    pub const MAX: i32 = 10_000;

    pub fn new(value: i32) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(MediaError::invalid(format!(
                "horizontal disparity adjustment must be in [{}, {}], got {}",
                Self::MIN,
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

/// Encoder quality, given as a percentage and handed to the codec as [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    pub fn from_percent(percent: i32) -> Result<Self> {
        if !(0..=100).contains(&percent) {
            return Err(MediaError::invalid(format!(
                "quality must be in [0, 100], got {}",
                percent
            )));
        }
        Ok(Self(percent as f32 / 100.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

/// What a source reports about its single resolved video track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    /// Codec name, e.g. "hevc"
    pub codec_name: String,
    /// None if the format description carried no usable size.
    pub dimensions: Option<Dimensions>,
    pub time_base: Rational,
    /// Nominal frame rate, e.g. 30/1
    pub frame_rate: Rational,
    pub extensions: FormatExtensions,
    /// True when the track decodes to two tagged views.
    pub multiview: bool,
}

impl TrackMetadata {
    pub fn new(codec_name: &str, dimensions: Dimensions) -> Self {
        Self {
            codec_name: codec_name.to_string(),
            dimensions: Some(dimensions),
            time_base: Rational::default(),
            frame_rate: Rational::new(30, 1),
            extensions: FormatExtensions::default(),
            multiview: false,
        }
    }

    pub fn multiview(mut self, multiview: bool) -> Self {
        self.multiview = multiview;
        self
    }

    pub fn with_extensions(mut self, extensions: FormatExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_timing(mut self, time_base: Rational, frame_rate: Rational) -> Self {
        self.time_base = time_base;
        self.frame_rate = frame_rate;
        self
    }

    /// Pixel size of the track, or `CouldNotParse` when it is missing.
    pub fn require_dimensions(&self, path: &std::path::Path) -> Result<Dimensions> {
        match self.dimensions {
            Some(d) if !d.is_empty() => Ok(d),
            _ => Err(MediaError::CouldNotParse {
                path: path.to_path_buf(),
                reason: "format description has no pixel dimensions".to_string(),
            }),
        }
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[TRACK]")?;
        writeln!(f, "codec_name={}", self.codec_name)?;
        match self.dimensions {
            Some(d) => writeln!(f, "size={}", d)?,
            None => writeln!(f, "size=N/A")?,
        }
        writeln!(f, "time_base={}", self.time_base)?;
        writeln!(f, "rate={}", self.frame_rate)?;
        writeln!(f, "multiview={}", self.multiview)?;
        if let Some(p) = &self.extensions.color_primaries {
            writeln!(f, "color_primaries={}", p)?;
        }
        if let Some(t) = &self.extensions.transfer_function {
            writeln!(f, "transfer_function={}", t)?;
        }
        if let Some(m) = &self.extensions.color_matrix {
            writeln!(f, "color_matrix={}", m)?;
        }
        write!(f, "[/TRACK]")
    }
}
