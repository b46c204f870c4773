use std::io::Cursor;
use std::path::Path;

use image::DynamicImage;

use crate::error::InferenceError;

/// EXIF orientation (tag 0x0112), values 1–8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Maps an EXIF value to an orientation; out-of-range values mean
    /// "no correction".
    pub fn from_exif(value: u32) -> Orientation {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn exif_value(&self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::FlipHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::FlipVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// Reads the orientation tag from an encoded image. Files without EXIF,
    /// or with an unreadable EXIF block, are treated as upright.
    pub fn read(bytes: &[u8]) -> Orientation {
        let mut cursor = Cursor::new(bytes);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(_) => return Orientation::Normal,
        };
        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from_exif)
            .unwrap_or_default()
    }

    /// Re-orients pixel data so the image displays upright.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => image.clone(),
            Orientation::FlipHorizontal => image.fliph(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::FlipVertical => image.flipv(),
            Orientation::Transpose => image.rotate90().fliph(),
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Transverse => image.rotate270().fliph(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }
}

/// A decoded raster plus the orientation recorded in its metadata.
///
/// `DynamicImage` carries no metadata, so the EXIF orientation read at decode
/// time travels alongside the pixels until preprocessing applies it.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    pub orientation: Orientation,
}

impl PageImage {
    pub fn new(image: DynamicImage) -> PageImage {
        PageImage { image, orientation: Orientation::Normal }
    }

    pub fn with_orientation(image: DynamicImage, orientation: Orientation) -> PageImage {
        PageImage { image, orientation }
    }

    /// Decodes PNG/JPEG/BMP/GIF/TIFF/WebP bytes and reads their orientation.
    pub fn decode(bytes: &[u8]) -> Result<PageImage, InferenceError> {
        let image = image::load_from_memory(bytes).map_err(|e| InferenceError::ImageDecode(e.to_string()))?;
        Ok(PageImage { image, orientation: Orientation::read(bytes) })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<PageImage, InferenceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| InferenceError::ImageDecode(format!("{}: {}", path.display(), e)))?;
        PageImage::decode(&bytes)
    }

    /// The pixels with orientation correction applied.
    pub fn upright(&self) -> DynamicImage {
        self.orientation.apply(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageOutputFormat, Rgb, RgbImage};

    /// JPEG bytes for `image` with an EXIF APP1 segment carrying `orientation`.
    fn jpeg_with_orientation(image: &DynamicImage, orientation: u16) -> Vec<u8> {
        let mut jpeg = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(95))
            .unwrap();

        // Little-endian TIFF header with one IFD entry: Orientation, SHORT, 1 value.
        let mut tiff = b"II*\0".to_vec();
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0112u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&orientation.to_le_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_le_bytes());

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);
        let mut app1 = vec![0xFF, 0xE1];
        app1.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        app1.extend_from_slice(&payload);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn marker_image() -> DynamicImage {
        // 3×2 with a single red pixel in the top-left corner.
        let mut img = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    fn red_at(img: &DynamicImage) -> (u32, u32) {
        img.pixels()
            .find(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn every_orientation_moves_the_corner_where_exif_says() {
        let img = marker_image();
        let cases = [
            (1, (3, 2), (0, 0)),
            (2, (3, 2), (2, 0)),
            (3, (3, 2), (2, 1)),
            (4, (3, 2), (0, 1)),
            (5, (2, 3), (0, 0)),
            (6, (2, 3), (1, 0)),
            (7, (2, 3), (1, 2)),
            (8, (2, 3), (0, 2)),
        ];
        for (value, dims, corner) in cases {
            let out = Orientation::from_exif(value).apply(&img);
            assert_eq!(out.dimensions(), dims, "orientation {value}");
            assert_eq!(red_at(&out), corner, "orientation {value}");
            assert_eq!(Orientation::from_exif(value).exif_value() as u32, value);
        }
    }

    #[test]
    fn reads_orientation_from_jpeg_exif() {
        let bytes = jpeg_with_orientation(&marker_image(), 6);
        let page = PageImage::decode(&bytes).unwrap();
        assert_eq!(page.orientation, Orientation::Rotate90);
        assert_eq!(page.upright().dimensions(), (2, 3));
    }

    #[test]
    fn images_without_exif_are_upright() {
        let mut png = Vec::new();
        marker_image().write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png).unwrap();
        assert_eq!(PageImage::decode(&png).unwrap().orientation, Orientation::Normal);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = PageImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::ImageDecode(_)));
    }
}
