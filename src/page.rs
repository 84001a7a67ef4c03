//! Page model for document composition.
//!
//! A [`Page`] describes one page of the output document and where its content
//! comes from: either a page of an existing PDF file or a standalone raster
//! image. Entries are immutable once constructed; rotation is normalized and
//! zoom power validated at construction time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A width/height pair in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True if both dimensions are zero (an "unknown" size).
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

/// Normalize a rotation angle into `[0, 360)` degrees.
pub fn normalize_rotation(degrees: i32) -> i32 {
    ((degrees % 360) + 360) % 360
}

fn sanitize_power(power: f64) -> f64 {
    if power > 0.0 { power } else { 1.0 }
}

/// Rotation- and zoom-adjusted bounding box.
///
/// The result is `(w·|cos θ| + h·|sin θ|, w·|sin θ| + h·|cos θ|)` scaled by
/// `power` and truncated to whole points. Valid for arbitrary angles, though
/// PDF page dictionaries only ever carry right-angle rotations.
pub fn view_size(size: Size, rotation: i32, power: f64) -> (u32, u32) {
    let theta = f64::from(normalize_rotation(rotation)).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let width = size.width * cos + size.height * sin;
    let height = size.width * sin + size.height * cos;
    ((width * power) as u32, (height * power) as u32)
}

/// A reference to one page of an existing PDF file.
///
/// Equality compares the source path only: two `PdfPage` values pointing at
/// different pages of the same file are considered equal. This is a
/// source-file identity used for reader caching and deduplication, not a
/// logical-page identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    path: PathBuf,
    password: String,
    number: u32,
    rotation: i32,
    power: f64,
    original_size: Size,
}

impl PdfPage {
    /// Create a page entry for `number` (1-based) of the PDF at `path`.
    ///
    /// Rotation defaults to 0 and power to 1.0.
    pub fn new(path: impl Into<PathBuf>, number: u32) -> Self {
        Self {
            path: path.into(),
            password: String::new(),
            number: number.max(1),
            rotation: 0,
            power: 1.0,
            original_size: Size::default(),
        }
    }

    /// Set the password used to open the source document.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the display rotation. The value is normalized into `[0, 360)`.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = normalize_rotation(degrees);
        self
    }

    /// Set the zoom power. Non-positive values fall back to 1.0.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = sanitize_power(power);
        self
    }

    /// Set the page's original (unrotated) size in points.
    pub fn with_original_size(mut self, size: Size) -> Self {
        self.original_size = size;
        self
    }

    /// Source file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Password supplied for the source document (may be empty).
    pub fn password(&self) -> &str {
        &self.password
    }

    /// 1-based page number within the source document.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Display rotation in degrees, normalized to `[0, 360)`.
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    /// Zoom power, always positive.
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Original (unrotated) page size in points.
    pub fn original_size(&self) -> Size {
        self.original_size
    }

    /// Rotation- and zoom-adjusted display size.
    pub fn view_size(&self) -> (u32, u32) {
        view_size(self.original_size, self.rotation, self.power)
    }
}

impl PartialEq for PdfPage {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// A reference to a standalone raster image used as page content.
///
/// Like [`PdfPage`], equality compares the source path only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePage {
    path: PathBuf,
    size: Option<Size>,
    rotation: i32,
    power: f64,
}

impl ImagePage {
    /// Create an image page entry for the image at `path`.
    ///
    /// With no declared size, the image's own pixel dimensions (scaled to
    /// 72-DPI points) are used when the page is synthesized.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            rotation: 0,
            power: 1.0,
        }
    }

    /// Declare an explicit page size in points.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the display rotation. The value is normalized into `[0, 360)`.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = normalize_rotation(degrees);
        self
    }

    /// Set the zoom power. Non-positive values fall back to 1.0.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = sanitize_power(power);
        self
    }

    /// Source image path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared page size, if any.
    pub fn size(&self) -> Option<Size> {
        self.size
    }

    /// Display rotation in degrees, normalized to `[0, 360)`.
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    /// Zoom power, always positive.
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Rotation- and zoom-adjusted display size of the declared size.
    ///
    /// Returns `(0, 0)` when no size has been declared; the real size is
    /// only known once the image file is decoded at save time.
    pub fn view_size(&self) -> (u32, u32) {
        view_size(self.size.unwrap_or_default(), self.rotation, self.power)
    }
}

impl PartialEq for ImagePage {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

/// One page of the output document.
///
/// The composer dispatches on this union at a single point; new source kinds
/// are added by extending the union and that match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Page {
    /// A page imported from an existing PDF.
    Pdf(PdfPage),
    /// A page synthesized from a raster image.
    Image(ImagePage),
}

impl Page {
    /// Source file path of either variant.
    pub fn path(&self) -> &Path {
        match self {
            Page::Pdf(page) => page.path(),
            Page::Image(page) => page.path(),
        }
    }

    /// Display rotation of either variant.
    pub fn rotation(&self) -> i32 {
        match self {
            Page::Pdf(page) => page.rotation(),
            Page::Image(page) => page.rotation(),
        }
    }

    /// Zoom power of either variant.
    pub fn power(&self) -> f64 {
        match self {
            Page::Pdf(page) => page.power(),
            Page::Image(page) => page.power(),
        }
    }

    /// Rotation- and zoom-adjusted display size of either variant.
    pub fn view_size(&self) -> (u32, u32) {
        match self {
            Page::Pdf(page) => page.view_size(),
            Page::Image(page) => page.view_size(),
        }
    }
}

impl From<PdfPage> for Page {
    fn from(page: PdfPage) -> Self {
        Page::Pdf(page)
    }
}

impl From<ImagePage> for Page {
    fn from(page: ImagePage) -> Self {
        Page::Image(page)
    }
}
