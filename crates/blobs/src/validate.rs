use std::io::Cursor;

use crate::{BlobError, MAX_ASPECT_RATIO, MAX_PIXEL_AREA, MAX_UPLOAD_BYTES, MIN_WIDTH};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const JPEG_SIGNATURE: [u8; 3] = [0xff, 0xd8, 0xff];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
        }
    }
}

/// Outcome of a successful ingest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
}

fn sniff(bytes: &[u8]) -> Option<ImageKind> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        Some(ImageKind::Png)
    } else if bytes.starts_with(&JPEG_SIGNATURE) {
        Some(ImageKind::Jpeg)
    } else {
        None
    }
}

/// Full ingest check: declared type allow-list, magic-byte agreement, size
/// cutoff, and decoded-header dimension limits. Runs before the blob is
/// persisted or any record is written.
pub fn validate_upload(bytes: &[u8], content_type: &str) -> Result<ValidatedUpload, BlobError> {
    let declared = ImageKind::from_content_type(content_type)
        .ok_or_else(|| BlobError::UnsupportedType(content_type.to_string()))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(BlobError::TooLarge);
    }

    match sniff(bytes) {
        Some(kind) if kind == declared => {}
        _ => return Err(BlobError::MagicMismatch),
    }

    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BlobError::Io)?
        .into_dimensions()?;

    if width < MIN_WIDTH {
        return Err(BlobError::TooNarrow(width));
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXEL_AREA {
        return Err(BlobError::TooManyPixels(pixels));
    }
    let aspect = f64::from(width.max(height)) / f64::from(width.min(height).max(1));
    if aspect > MAX_ASPECT_RATIO {
        return Err(BlobError::ExtremeAspect(aspect));
    }

    Ok(ValidatedUpload {
        kind: declared,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn accepts_a_reasonable_png() {
        let bytes = png_bytes(800, 1200);
        let v = validate_upload(&bytes, "image/png").unwrap();
        assert_eq!(v.kind, ImageKind::Png);
        assert_eq!((v.width, v.height), (800, 1200));
    }

    #[test]
    fn rejects_disallowed_content_types() {
        let bytes = png_bytes(800, 800);
        assert!(matches!(
            validate_upload(&bytes, "image/gif"),
            Err(BlobError::UnsupportedType(_))
        ));
        assert!(matches!(
            validate_upload(&bytes, "application/octet-stream"),
            Err(BlobError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_type_spoofing() {
        // PNG bytes declared as JPEG.
        let bytes = png_bytes(800, 800);
        assert!(matches!(
            validate_upload(&bytes, "image/jpeg"),
            Err(BlobError::MagicMismatch)
        ));
        // Arbitrary bytes declared as PNG.
        assert!(matches!(
            validate_upload(b"plain text", "image/png"),
            Err(BlobError::MagicMismatch)
        ));
    }

    #[test]
    fn rejects_narrow_images() {
        let bytes = png_bytes(MIN_WIDTH - 1, 500);
        assert!(matches!(
            validate_upload(&bytes, "image/png"),
            Err(BlobError::TooNarrow(_))
        ));
    }

    #[test]
    fn rejects_extreme_aspect_ratios() {
        let bytes = png_bytes(100, 5100);
        assert!(matches!(
            validate_upload(&bytes, "image/png"),
            Err(BlobError::ExtremeAspect(_))
        ));
    }
}
