//! Image-to-page synthesis.
//!
//! Every frame of a raster image becomes one output page: the decoded pixels
//! are embedded as an uncompressed RGB image XObject and drawn at the page
//! origin at the image's native resolution, shrunk uniformly when the axes
//! disagree. Resolution comes from the JFIF density fields or the PNG `pHYs`
//! chunk, with 72 DPI assumed when the file declares none. Rotation is
//! approximated by pre-rotating the raster to the nearest quarter turn.

use std::io::Cursor;
use std::path::Path;

use image::{AnimationDecoder, DynamicImage, ImageFormat};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::{PdfBindError, Result};
use crate::page::{ImagePage, Size};

/// Append one page per frame of `entry`'s image to the page tree node
/// `pages_id`, returning the new page object ids in frame order.
///
/// The caller is responsible for pushing the ids into the node's `Kids`
/// array and updating its `Count`.
pub(crate) fn append_image_pages(
    doc: &mut Document,
    pages_id: ObjectId,
    entry: &ImagePage,
) -> Result<Vec<ObjectId>> {
    let bytes = std::fs::read(entry.path()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PdfBindError::file_not_found(entry.path().to_path_buf())
        } else {
            PdfBindError::failed_to_load_image(entry.path().to_path_buf(), e.to_string())
        }
    })?;

    let frames = load_frames(entry.path(), &bytes)?;
    let quarter_turns = nearest_quarter_turns(entry.rotation());

    // The density axes follow the pixels through odd quarter turns.
    let (dpi_x, dpi_y) = read_density(&bytes);
    let density = if quarter_turns % 2 == 1 {
        (dpi_y, dpi_x)
    } else {
        (dpi_x, dpi_y)
    };

    let mut page_ids = Vec::with_capacity(frames.len());
    for frame in frames {
        let rotated = apply_quarter_turns(frame, quarter_turns);
        page_ids.push(synthesize_page(doc, pages_id, &rotated, entry.size(), density));
    }
    Ok(page_ids)
}

/// Round a normalized rotation to the closest multiple of 90 degrees,
/// expressed as quarter turns.
fn nearest_quarter_turns(rotation: i32) -> u32 {
    (((rotation + 45) / 90) % 4) as u32
}

fn apply_quarter_turns(image: DynamicImage, quarter_turns: u32) -> DynamicImage {
    match quarter_turns {
        1 => image.rotate90(),
        2 => image.rotate180(),
        3 => image.rotate270(),
        _ => image,
    }
}

fn load_frames(path: &Path, bytes: &[u8]) -> Result<Vec<DynamicImage>> {
    // GIF is the one multi-frame format in the supported set.
    if matches!(ImageFormat::from_path(path), Ok(ImageFormat::Gif)) {
        let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
            .map_err(|e| PdfBindError::failed_to_load_image(path.to_path_buf(), e.to_string()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| PdfBindError::failed_to_load_image(path.to_path_buf(), e.to_string()))?;
        if !frames.is_empty() {
            return Ok(frames
                .into_iter()
                .map(|frame| DynamicImage::ImageRgba8(frame.into_buffer()))
                .collect());
        }
    }

    let single = image::load_from_memory(bytes)
        .map_err(|e| PdfBindError::failed_to_load_image(path.to_path_buf(), e.to_string()))?;
    Ok(vec![single])
}

/// Native resolution in dots per inch.
///
/// JFIF and PNG can declare a physical pixel density; files that declare
/// none (or only a pixel aspect ratio) are treated as 72 DPI, which maps
/// one pixel to one point.
fn read_density(bytes: &[u8]) -> (f64, f64) {
    jpeg_density(bytes)
        .or_else(|| png_density(bytes))
        .unwrap_or((72.0, 72.0))
}

/// Density from the JFIF APP0 segment: a unit byte followed by two
/// big-endian u16 fields.
fn jpeg_density(bytes: &[u8]) -> Option<(f64, f64)> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let at = bytes.windows(5).position(|window| window == b"JFIF\0")?;
    // Identifier, two version bytes, then units/Xdensity/Ydensity.
    let fields = bytes.get(at + 7..at + 12)?;
    let x = f64::from(u16::from_be_bytes([fields[1], fields[2]]));
    let y = f64::from(u16::from_be_bytes([fields[3], fields[4]]));
    if x == 0.0 || y == 0.0 {
        return None;
    }
    match fields[0] {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}

/// Density from the PNG `pHYs` chunk: pixels per metre on each axis.
fn png_density(bytes: &[u8]) -> Option<(f64, f64)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
    if !bytes.starts_with(&SIGNATURE) {
        return None;
    }
    let mut pos = SIGNATURE.len();
    while pos + 8 <= bytes.len() {
        let length = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &bytes[pos + 4..pos + 8];
        if kind == b"pHYs" {
            let payload = bytes.get(pos + 8..pos + 17)?;
            if payload[8] != 1 {
                return None;
            }
            let x = u32::from_be_bytes(payload[0..4].try_into().ok()?);
            let y = u32::from_be_bytes(payload[4..8].try_into().ok()?);
            if x == 0 || y == 0 {
                return None;
            }
            return Some((f64::from(x) * 0.0254, f64::from(y) * 0.0254));
        }
        if kind == b"IDAT" || kind == b"IEND" {
            return None;
        }
        pos += 12 + length;
    }
    None
}

/// Build one page around an image.
///
/// The page box is the declared size when one is set; otherwise the pixel
/// dimensions scaled to 72-DPI-equivalent points on each axis. The image is
/// drawn at the origin scaled by 72 over its density, taking the smaller of
/// the two axis factors so the raster is never stretched.
fn synthesize_page(
    doc: &mut Document,
    pages_id: ObjectId,
    image: &DynamicImage,
    declared: Option<Size>,
    (dpi_x, dpi_y): (f64, f64),
) -> ObjectId {
    let rgb = image.to_rgb8();
    let (pixel_width, pixel_height) = rgb.dimensions();
    let native = Size::new(f64::from(pixel_width), f64::from(pixel_height));

    let scale_x = 72.0 / dpi_x;
    let scale_y = 72.0 / dpi_y;
    let page = match declared {
        Some(size) if !size.is_empty() => size,
        _ => Size::new(native.width * scale_x, native.height * scale_y),
    };

    let scale = scale_x.min(scale_y);
    let drawn_width = native.width * scale;
    let drawn_height = native.height * scale;

    let xobject_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(pixel_width),
            "Height" => i64::from(pixel_height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    )));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => Object::Reference(xobject_id) },
    });

    let content = format!("q {drawn_width:.4} 0 0 {drawn_height:.4} 0 0 cm /Im0 Do Q");
    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.into_bytes(),
    )));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page.width as f32),
            Object::Real(page.height as f32),
        ],
        "Resources" => Object::Reference(resources_id),
        "Contents" => Object::Reference(content_id),
    })
}
