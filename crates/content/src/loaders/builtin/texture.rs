//! Encoded images.
//!
//! Decoding is left to the renderer; this loader only checks the file
//! signature and reads the dimensions from the header.

use anyhow::{bail, ensure};

use crate::error::RegistrationError;
use crate::loaders::{LoadResult, Loader};
use crate::registry::{LoaderRegistration, Registrar};
use crate::scan::FileRecord;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// An image kept in its encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub format: ImageFormat,
    /// Width and height, when the header carries them at a fixed offset.
    pub dimensions: Option<(u32, u32)>,
    pub bytes: Vec<u8>,
}

/// Loads `*.png` and `*.jpg` files.
#[derive(Debug, Default)]
pub struct TextureLoader;

impl Loader for TextureLoader {
    type Object = Texture;

    fn name(&self) -> &str {
        "TextureLoader"
    }

    fn extension(&self) -> &str {
        "png"
    }

    fn extra_extensions(&self) -> &[&str] {
        &["jpg", "jpeg"]
    }

    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<Texture> {
        let format = if data.starts_with(PNG_SIGNATURE) {
            ImageFormat::Png
        } else if data.starts_with(JPEG_SIGNATURE) {
            ImageFormat::Jpeg
        } else {
            bail!("{} is not a PNG or JPEG image", file.relative);
        };

        let dimensions = match format {
            ImageFormat::Png => Some(png_dimensions(data)?),
            ImageFormat::Jpeg => None,
        };

        Ok(Texture {
            format,
            dimensions,
            bytes: data.to_vec(),
        })
    }
}

/// Reads width and height from the IHDR chunk, which must come first.
fn png_dimensions(data: &[u8]) -> LoadResult<(u32, u32)> {
    ensure!(data.len() >= 24, "PNG header is truncated");
    ensure!(&data[12..16] == b"IHDR", "PNG is missing its IHDR chunk");

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Ok((width, height))
}

fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.loader::<TextureLoader>()
}

inventory::submit! {
    LoaderRegistration::new("texture", register)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(relative: &str) -> FileRecord {
        let root = Path::new("/data");
        FileRecord::new(0, root, root.join(relative))
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn test_reads_png_dimensions() {
        let texture = TextureLoader
            .load_object(&record("ui/icon.png"), &png(32, 16))
            .unwrap();
        assert_eq!(texture.format, ImageFormat::Png);
        assert_eq!(texture.dimensions, Some((32, 16)));
    }

    #[test]
    fn test_accepts_jpeg() {
        let texture = TextureLoader
            .load_object(&record("ui/photo.jpg"), &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0])
            .unwrap();
        assert_eq!(texture.format, ImageFormat::Jpeg);
        assert_eq!(texture.dimensions, None);
    }

    #[test]
    fn test_rejects_unknown_signature() {
        let err = TextureLoader
            .load_object(&record("ui/fake.png"), b"not an image")
            .unwrap_err();
        assert!(err.to_string().contains("ui/fake.png"));
    }

    #[test]
    fn test_rejects_truncated_png() {
        assert!(
            TextureLoader
                .load_object(&record("ui/short.png"), PNG_SIGNATURE)
                .is_err()
        );
    }
}
