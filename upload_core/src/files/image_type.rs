//! Signature-based image classification.
//!
//! Codes follow the conventional `IMAGETYPE_*` numbering so that callers
//! and logs can refer to a format by the same integer everywhere.

use serde::Serialize;

/// Extensions that claim to be an image and therefore must pass the
/// signature check.
pub const IMAGE_LIKE_EXTENSIONS: [&str; 6] = ["gif", "jpg", "jpeg", "bmp", "png", "swf"];

/// Image type codes an image-like upload may decode to.
pub const ACCEPTED_IMAGE_CODES: [u8; 5] = [1, 2, 3, 4, 6];

/// Bytes needed to classify every supported signature.
pub const SIGNATURE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Gif,
    Jpeg,
    Png,
    Swf,
    Psd,
    Bmp,
    TiffIntel,
    TiffMotorola,
    Jpc,
    Jp2,
    Swc,
    Iff,
    Ico,
    Webp,
    Avif,
}

impl ImageType {
    pub fn code(self) -> u8 {
        match self {
            ImageType::Gif => 1,
            ImageType::Jpeg => 2,
            ImageType::Png => 3,
            ImageType::Swf => 4,
            ImageType::Psd => 5,
            ImageType::Bmp => 6,
            ImageType::TiffIntel => 7,
            ImageType::TiffMotorola => 8,
            ImageType::Jpc => 9,
            ImageType::Jp2 => 10,
            ImageType::Swc => 13,
            ImageType::Iff => 14,
            ImageType::Ico => 17,
            ImageType::Webp => 18,
            ImageType::Avif => 19,
        }
    }

    pub fn is_accepted(self) -> bool {
        ACCEPTED_IMAGE_CODES.contains(&self.code())
    }

    /// Classify the leading bytes of a file. Returns `None` when no known
    /// signature matches.
    pub fn detect(head: &[u8]) -> Option<Self> {
        const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        const JP2: [u8; 12] = [
            0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
        ];

        if head.starts_with(b"GIF") {
            return Some(ImageType::Gif);
        }
        if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageType::Jpeg);
        }
        if head.starts_with(&PNG) {
            return Some(ImageType::Png);
        }
        if head.starts_with(b"FWS") {
            return Some(ImageType::Swf);
        }
        if head.starts_with(b"CWS") {
            return Some(ImageType::Swc);
        }
        if head.starts_with(b"8BPS") {
            return Some(ImageType::Psd);
        }
        if head.starts_with(b"BM") {
            return Some(ImageType::Bmp);
        }
        if head.starts_with(&[0xFF, 0x4F, 0xFF]) {
            return Some(ImageType::Jpc);
        }
        if head.starts_with(b"II\x2A\x00") {
            return Some(ImageType::TiffIntel);
        }
        if head.starts_with(b"MM\x00\x2A") {
            return Some(ImageType::TiffMotorola);
        }
        if head.starts_with(b"FORM") {
            return Some(ImageType::Iff);
        }
        if head.starts_with(&JP2) {
            return Some(ImageType::Jp2);
        }
        if head.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
            return Some(ImageType::Ico);
        }
        if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP" {
            return Some(ImageType::Webp);
        }
        if head.len() >= 12 && &head[4..8] == b"ftyp" && &head[8..12] == b"avif" {
            return Some(ImageType::Avif);
        }

        None
    }
}

/// Whether an extension (already lowercased, no dot) claims an image format.
pub fn is_image_like(ext: &str) -> bool {
    IMAGE_LIKE_EXTENSIONS.contains(&ext)
}
