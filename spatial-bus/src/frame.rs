use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Exact fraction used as a time base, e.g. 1/600 or 1001/30000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i32,
    den: i32,
}

impl Rational {
    /// Builds a time base with a strictly positive denominator.
    ///
    /// A zero denominator is replaced by 1 so comparisons stay defined.
    pub fn new(num: i32, den: i32) -> Self {
        match den.cmp(&0) {
            Ordering::Greater => Self { num, den },
            Ordering::Less => Self {
                num: -num,
                den: -den,
            },
            Ordering::Equal => Self { num, den: 1 },
        }
    }

    pub fn numerator(&self) -> i32 {
        self.num
    }

    pub fn denominator(&self) -> i32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(1, 600)
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Presentation timestamp: `value * time_base` seconds.
///
/// Two timestamps in different time bases compare by the instant they denote,
/// so `1 @ 1/30` equals `20 @ 1/600`. Comparison is exact integer arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    value: i64,
    time_base: Rational,
}

impl Timestamp {
    pub fn new(value: i64, time_base: Rational) -> Self {
        Self { value, time_base }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn seconds(&self) -> f64 {
        self.value as f64 * self.time_base.as_f64()
    }

    /// Numerator of the instant over the common denominator of both operands.
    fn scaled(&self, other: &Timestamp) -> i128 {
        self.value as i128 * self.time_base.num as i128 * other.time_base.den as i128
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.scaled(other) == other.scaled(self)
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scaled(other).cmp(&other.scaled(self))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} ({:.6}s)", self.value, self.time_base, self.seconds())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn other(self) -> Eye {
        match self {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

impl Display for Eye {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    StereoView,
    VideoLayerId,
}

/// A `(category, value)` classification attached to a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    StereoView(Eye),
    VideoLayerId(i64),
}

impl Tag {
    pub fn category(&self) -> TagCategory {
        match self {
            Tag::StereoView(_) => TagCategory::StereoView,
            Tag::VideoLayerId(_) => TagCategory::VideoLayerId,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Yuv420p,
    Yuv420p10,
    Yuv422p10,
    Yuv422p16,
    Nv12,
    P010,
    /// Backend specific format id that has no named variant.
    Other(i32),
}

/// Decoded image planes. Cloning is cheap, planes are reference counted.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Bytes>,
    pub strides: Vec<usize>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            planes: Vec::new(),
            strides: Vec::new(),
        }
    }

    pub fn with_plane(mut self, data: Bytes, stride: usize) -> Self {
        self.planes.push(data);
        self.strides.push(stride);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TaggedBuffer {
    pub tags: Vec<Tag>,
    pub buffer: PixelBuffer,
}

impl TaggedBuffer {
    pub fn new(tags: Vec<Tag>, buffer: PixelBuffer) -> Self {
        Self { tags, buffer }
    }

    /// Buffer routed into a multiplexed track: one eye tag plus one layer tag.
    pub fn stereo(eye: Eye, layer_id: i64, buffer: PixelBuffer) -> Self {
        Self::new(vec![Tag::StereoView(eye), Tag::VideoLayerId(layer_id)], buffer)
    }

    pub fn first_matching(&self, category: TagCategory) -> Option<Tag> {
        self.tags.iter().copied().find(|t| t.category() == category)
    }

    pub fn eye(&self) -> Option<Eye> {
        match self.first_matching(TagCategory::StereoView) {
            Some(Tag::StereoView(eye)) => Some(eye),
            _ => None,
        }
    }

    pub fn layer_id(&self) -> Option<i64> {
        match self.first_matching(TagCategory::VideoLayerId) {
            Some(Tag::VideoLayerId(id)) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FrameContent {
    /// Single-view decode output.
    Image(PixelBuffer),
    /// Multi-view decode output, one buffer per view.
    Tagged(Vec<TaggedBuffer>),
}

/// One decoded sample pulled from a [`FrameSource`](crate::source::FrameSource).
#[derive(Debug, Clone)]
pub struct Frame {
    pub pts: Timestamp,
    pub content: FrameContent,
}

impl Frame {
    pub fn image(pts: Timestamp, buffer: PixelBuffer) -> Self {
        Self {
            pts,
            content: FrameContent::Image(buffer),
        }
    }

    pub fn tagged(pts: Timestamp, buffers: Vec<TaggedBuffer>) -> Self {
        Self {
            pts,
            content: FrameContent::Tagged(buffers),
        }
    }

    pub fn image_buffer(&self) -> Option<&PixelBuffer> {
        match &self.content {
            FrameContent::Image(buffer) => Some(buffer),
            FrameContent::Tagged(_) => None,
        }
    }

    pub fn tagged_buffers(&self) -> Option<&[TaggedBuffer]> {
        match &self.content {
            FrameContent::Image(_) => None,
            FrameContent::Tagged(buffers) => Some(buffers),
        }
    }

    /// First buffer tagged with `eye`, if the frame is multiplexed and carries one.
    pub fn eye_buffer(&self, eye: Eye) -> Option<&PixelBuffer> {
        self.tagged_buffers()?
            .iter()
            .find(|b| b.eye() == Some(eye))
            .map(|b| &b.buffer)
    }
}
