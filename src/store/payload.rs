/// Self-describing skin payloads
///
/// A payload is the bytes of a `data:<mime>;base64,<data>` URL. The store
/// never looks inside it; the viewport and the download path decode it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use image::ImageFormat;

use crate::error::PayloadError;

/// Every skin is 64 pixels wide
pub const SKIN_WIDTH: u32 = 64;
/// Modern skins are square; legacy ones are half height
pub const SKIN_HEIGHTS: [u32; 2] = [64, 32];

const DATA_PREFIX: &[u8] = b"data:";
const BASE64_MARKER: &[u8] = b";base64";

/// Immutable, cheaply clonable image payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SkinPayload(Arc<[u8]>);

impl SkinPayload {
    /// Wrap bytes exactly as they were stored. No validation.
    pub fn from_stored(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    /// Validate raw image file contents and encode them as a data URL.
    ///
    /// The image must decode and be 64x64 (or legacy 64x32).
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        let format =
            image::guess_format(bytes).map_err(|e| PayloadError::NotAnImage(e.to_string()))?;
        let mime = format.to_mime_type();
        if !mime.starts_with("image/") {
            return Err(PayloadError::NotAnImage(mime.to_string()));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| PayloadError::NotAnImage(e.to_string()))?;
        check_dimensions(decoded.width(), decoded.height())?;

        let url = format!("data:{};base64,{}", mime, BASE64_STANDARD.encode(bytes));
        Ok(Self::from_stored(url.into_bytes()))
    }

    /// Read and validate a user-picked file
    pub async fn read_file(path: impl AsRef<Path>) -> Result<Self, PayloadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PayloadError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_image_bytes(&bytes)
    }

    /// Raw stored bytes (the data URL)
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// MIME type from the data URL header, if the header is well formed
    pub fn mime(&self) -> Option<&str> {
        let (header, _) = self.split()?;
        let header = std::str::from_utf8(header).ok()?;
        header.split(';').next().filter(|mime| !mime.is_empty())
    }

    /// Decode back to the original image file bytes
    pub fn decode(&self) -> Result<Vec<u8>, PayloadError> {
        let (header, data) = self
            .split()
            .ok_or_else(|| PayloadError::Malformed("missing data URL header".to_string()))?;
        if !header.ends_with(BASE64_MARKER) {
            return Err(PayloadError::Malformed(
                "only base64 data URLs are supported".to_string(),
            ));
        }
        BASE64_STANDARD
            .decode(data)
            .map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// File name offered when downloading, e.g. `skin.png`
    pub fn suggested_file_name(&self) -> String {
        let extension = self
            .mime()
            .and_then(ImageFormat::from_mime_type)
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("png");
        format!("skin.{}", extension)
    }

    /// Write the decoded image to `path`
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<(), PayloadError> {
        let path = path.as_ref();
        let bytes = self.decode()?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| PayloadError::Io(format!("{}: {}", path.display(), e)))?;
        log::info!("💾 Exported skin to {}", path.display());
        Ok(())
    }

    /// Split `data:<header>,<data>` into its two halves
    fn split(&self) -> Option<(&[u8], &[u8])> {
        let rest = self.0.strip_prefix(DATA_PREFIX)?;
        let comma = rest.iter().position(|&b| b == b',')?;
        Some((&rest[..comma], &rest[comma + 1..]))
    }
}

// Payloads can be large; never dump the bytes into logs
impl fmt::Debug for SkinPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkinPayload")
            .field("mime", &self.mime())
            .field("len", &self.len())
            .finish()
    }
}

/// Check whether `width`x`height` is a skin layout we can render
pub fn is_skin_size(width: u32, height: u32) -> bool {
    width == SKIN_WIDTH && SKIN_HEIGHTS.contains(&height)
}

fn check_dimensions(width: u32, height: u32) -> Result<(), PayloadError> {
    if is_skin_size(width, height) {
        Ok(())
    } else {
        Err(PayloadError::UnsupportedDimensions { width, height })
    }
}

/// Encode a generated `64 x height` PNG whose pixels depend on `seed`
#[cfg(test)]
pub(crate) fn sample_png(seed: u8, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(SKIN_WIDTH, height, |x, y| {
        image::Rgba([seed, x as u8, y as u8, 255])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// A valid 64x64 payload, distinct per `seed`
#[cfg(test)]
pub(crate) fn sample_skin(seed: u8) -> SkinPayload {
    SkinPayload::from_image_bytes(&sample_png(seed, 64)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_is_encoded_as_data_url() {
        let png = sample_png(7, 64);
        let payload = SkinPayload::from_image_bytes(&png).unwrap();

        assert!(payload.as_bytes().starts_with(b"data:image/png;base64,"));
        assert_eq!(payload.mime(), Some("image/png"));
        assert_eq!(payload.decode().unwrap(), png);
        assert_eq!(payload.suggested_file_name(), "skin.png");
    }

    #[test]
    fn test_legacy_layout_is_accepted() {
        let payload = SkinPayload::from_image_bytes(&sample_png(1, 32)).unwrap();
        assert_eq!(payload.mime(), Some("image/png"));
    }

    #[test]
    fn test_wrong_dimensions_are_rejected() {
        let img = image::RgbaImage::new(32, 32);
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();

        let err = SkinPayload::from_image_bytes(out.get_ref()).unwrap_err();
        assert_eq!(
            err,
            PayloadError::UnsupportedDimensions {
                width: 32,
                height: 32
            }
        );
    }

    #[test]
    fn test_non_images_are_rejected() {
        let err = SkinPayload::from_image_bytes(b"definitely not a png").unwrap_err();
        assert!(matches!(err, PayloadError::NotAnImage(_)));
    }

    #[test]
    fn test_malformed_stored_payload() {
        let missing_header = SkinPayload::from_stored(b"hello".to_vec());
        assert_eq!(missing_header.mime(), None);
        assert!(matches!(
            missing_header.decode(),
            Err(PayloadError::Malformed(_))
        ));

        let not_base64 = SkinPayload::from_stored(b"data:image/png,rawbytes".to_vec());
        assert_eq!(not_base64.mime(), Some("image/png"));
        assert!(matches!(not_base64.decode(), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let payload = sample_skin(3);
        let debug = format!("{:?}", payload);
        assert!(debug.contains("image/png"));
        assert!(!debug.contains("base64"));
    }

    #[tokio::test]
    async fn test_read_file_and_export() {
        let dir = std::env::temp_dir().join(format!("skin-shelf-payload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let source = dir.join("upload.png");
        let target = dir.join("download.png");
        let png = sample_png(9, 64);
        std::fs::write(&source, &png).unwrap();

        let payload = SkinPayload::read_file(&source).await.unwrap();
        payload.export(&target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), png);

        let missing = SkinPayload::read_file(dir.join("missing.png")).await;
        assert!(matches!(missing, Err(PayloadError::Io(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
