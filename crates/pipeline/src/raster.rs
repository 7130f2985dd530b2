//! Raster plumbing shared across the inpainting stages and the erase path:
//! PNG/base64 codecs, binary masks, and solid-color fills.

use std::io::Cursor;

use geometry::{clip_to_bounds, BBox};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use models::TextRegion;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("invalid base64 image payload")]
    Base64(#[from] base64::DecodeError),
    #[error("image could not be decoded")]
    Decode(#[from] image::ImageError),
    #[error("unsupported mask layout: {0}")]
    UnsupportedMask(String),
}

pub fn rgb_png_bytes(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

pub fn gray_png_bytes(mask: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    mask.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

pub fn rgb_to_base64_png(image: &RgbImage) -> Result<String, image::ImageError> {
    Ok(base64::encode(rgb_png_bytes(image)?))
}

pub fn gray_to_base64_png(mask: &GrayImage) -> Result<String, image::ImageError> {
    Ok(base64::encode(gray_png_bytes(mask)?))
}

pub fn decode_base64_image(payload: &str) -> Result<DynamicImage, RasterError> {
    let bytes = base64::decode(payload)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Binary mask over the full image: 255 inside each region's erase area,
/// 0 elsewhere.
pub fn mask_for_regions(width: u32, height: u32, regions: &[TextRegion]) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([0]));
    for region in regions {
        let area = region.inpaint_bbox.unwrap_or(region.text_bbox);
        fill_gray_rect(&mut mask, &area, Luma([255]));
    }
    mask
}

/// Reduces any accepted mask layout to a single channel and binarizes it:
/// everything brighter than 1 becomes 255.
pub fn normalize_mask(mask: &DynamicImage) -> Result<GrayImage, RasterError> {
    let mut gray = match mask {
        DynamicImage::ImageLuma8(m) => m.clone(),
        DynamicImage::ImageLumaA8(m) => {
            GrayImage::from_fn(m.width(), m.height(), |x, y| Luma([m.get_pixel(x, y)[0]]))
        }
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => mask.to_luma8(),
        other => {
            return Err(RasterError::UnsupportedMask(format!(
                "{:?}",
                other.color()
            )))
        }
    };
    for pixel in gray.pixels_mut() {
        pixel[0] = if pixel[0] > 1 { 255 } else { 0 };
    }
    Ok(gray)
}

pub fn resize_mask_nearest(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    image::imageops::resize(mask, width, height, image::imageops::FilterType::Nearest)
}

fn rect_range(bbox: &BBox, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clipped = clip_to_bounds(bbox, width, height);
    let (x1, y1, x2, y2) = clipped.to_tuple();
    let (x1, y1, x2, y2) = (x1 as u32, y1 as u32, (x2 as u32).min(width), (y2 as u32).min(height));
    if x1 >= x2 || y1 >= y2 {
        return None;
    }
    Some((x1, y1, x2, y2))
}

pub fn fill_rect(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let Some((x1, y1, x2, y2)) = rect_range(bbox, image.width(), image.height()) else {
        return;
    };
    for y in y1..y2 {
        for x in x1..x2 {
            image.put_pixel(x, y, color);
        }
    }
}

fn fill_gray_rect(mask: &mut GrayImage, bbox: &BBox, value: Luma<u8>) {
    let Some((x1, y1, x2, y2)) = rect_range(bbox, mask.width(), mask.height()) else {
        return;
    };
    for y in y1..y2 {
        for x in x1..x2 {
            mask.put_pixel(x, y, value);
        }
    }
}

fn channel_median(mut values: Vec<u8>) -> u8 {
    values.sort_unstable();
    let n = values.len();
    if n == 0 {
        return 255;
    }
    if n % 2 == 1 {
        values[n / 2]
    } else {
        ((u16::from(values[n / 2 - 1]) + u16::from(values[n / 2])) / 2) as u8
    }
}

/// Background color of an erase area, sampled from a strip along its four
/// edges. Prefers "paper" pixels (mean brightness above 180) and falls back
/// to the median of the whole strip; degenerate areas read as white.
pub fn sample_edge_color(image: &RgbImage, bbox: &BBox) -> Rgb<u8> {
    let white = Rgb([255, 255, 255]);
    let Some((x1, y1, x2, y2)) = rect_range(bbox, image.width(), image.height()) else {
        return white;
    };

    let w = x2 - x1;
    let h = y2 - y1;
    let border = 5.min(h / 4).min(w / 4);
    if border < 1 {
        return white;
    }

    let mut edges: Vec<Rgb<u8>> = Vec::new();
    for y in y1..y2 {
        let on_band = y < y1 + border || y >= y2 - border;
        for x in x1..x2 {
            if on_band || x < x1 + border || x >= x2 - border {
                edges.push(*image.get_pixel(x, y));
            }
        }
    }

    let bright: Vec<Rgb<u8>> = edges
        .iter()
        .copied()
        .filter(|p| {
            let sum = u16::from(p[0]) + u16::from(p[1]) + u16::from(p[2]);
            f64::from(sum) / 3.0 > 180.0
        })
        .collect();

    let pool = if bright.len() >= 10 { &bright } else { &edges };
    Rgb([
        channel_median(pool.iter().map(|p| p[0]).collect()),
        channel_median(pool.iter().map(|p| p[1]).collect()),
        channel_median(pool.iter().map(|p| p[2]).collect()),
    ])
}

/// Bounding rectangle of all non-zero mask pixels.
pub fn mask_bounds(mask: &GrayImage) -> Option<BBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut any = false;

    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] > 0 {
            any = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if !any {
        return None;
    }
    Some(BBox::new(
        f64::from(min_x),
        f64::from(min_y),
        f64::from(max_x + 1),
        f64::from(max_y + 1),
    ))
}
