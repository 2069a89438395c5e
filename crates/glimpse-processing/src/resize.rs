use glimpse_core::{SizingDefaults, SizingSpec};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Width used when neither the request nor the configuration size the preview
pub const DEFAULT_PREVIEW_WIDTH: u32 = 300;

/// Target geometry of a preview, written `Wx`, `xH` or `WxH`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// Fixed width, height follows the aspect ratio
    Width(u32),
    /// Fixed height, width follows the aspect ratio
    Height(u32),
    /// Both sides fixed; the aspect ratio may change
    Exact { width: u32, height: u32 },
}

impl Geometry {
    /// Pixel dimensions for a source of `orig_width` x `orig_height`
    pub fn to_pixels(&self, orig_width: u32, orig_height: u32) -> (u32, u32) {
        match *self {
            Geometry::Exact { width, height } => (width, height),
            Geometry::Width(width) => (width, proportional(orig_height, width, orig_width)),
            Geometry::Height(height) => (proportional(orig_width, height, orig_height), height),
        }
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Geometry::Width(width) => write!(f, "{}x", width),
            Geometry::Height(height) => write!(f, "x{}", height),
            Geometry::Exact { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

/// `round(other * target / side)`, never below one pixel
fn proportional(other: u32, target: u32, side: u32) -> u32 {
    if side == 0 {
        return target.max(1);
    }
    let scaled = (other as f64 * target as f64 / side as f64).round();
    (scaled as u32).max(1)
}

/// Sizing inputs in precedence order, shared by the request and the defaults
fn select(
    original: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    bounding_box: Option<u32>,
) -> Option<Geometry> {
    let (orig_width, orig_height) = original;

    if let Some(bound) = bounding_box {
        return Some(if orig_width >= orig_height {
            Geometry::Width(bound)
        } else {
            Geometry::Height(bound)
        });
    }

    match (width, height) {
        (Some(width), Some(height)) => Some(Geometry::Exact { width, height }),
        (Some(width), None) => Some(Geometry::Width(width)),
        (None, Some(height)) => Some(Geometry::Height(height)),
        (None, None) => None,
    }
}

/// Decide the preview geometry for an original of the given dimensions.
///
/// Request sizing wins over configured defaults. Within each source a bounding
/// box comes first (constraining the longer side), then explicit width and
/// height, then a single side. With nothing set the preview is `300x`.
pub fn resolve_dimensions(
    original: (u32, u32),
    spec: &SizingSpec,
    defaults: &SizingDefaults,
) -> Geometry {
    select(original, spec.width, spec.height, spec.bounding_box)
        .or_else(|| {
            select(
                original,
                defaults.width,
                defaults.height,
                defaults.bounding_box,
            )
        })
        .unwrap_or(Geometry::Width(DEFAULT_PREVIEW_WIDTH))
}

/// Select appropriate filter type based on resize ratio
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width.max(1) as f32;
    let height_ratio = orig_height as f32 / new_height.max(1) as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// Resample `img` to the geometry, distorting only for exact geometries
pub fn resize_image(img: &DynamicImage, geometry: Geometry) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    let (width, height) = geometry.to_pixels(orig_width, orig_height);
    if (width, height) == (orig_width, orig_height) {
        return img.clone();
    }
    let filter = select_filter(orig_width, orig_height, width, height);
    img.resize_exact(width, height, filter)
}
