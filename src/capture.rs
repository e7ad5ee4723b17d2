//! Element capture and PNG output.
//!
//! The engine returns the element's pixels; this module guarantees the file
//! that lands on disk is an opaque PNG and that it appears atomically, so a
//! failed run never leaves a truncated image behind.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat, Rgb, RgbImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::browser::RenderSession;
use crate::locator::TargetElement;
use crate::{OgpError, Result};

/// Canvas that translucent pixels are composited onto.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// A PNG written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Captures `target` and writes it to `output`, replacing any existing file.
pub async fn capture<S>(session: &mut S, target: &TargetElement, output: &Path) -> Result<CaptureResult>
where
    S: RenderSession + ?Sized,
{
    if target.bounds.is_empty() {
        return Err(OgpError::CaptureFailed(format!(
            "Element '{}' has zero area ({}x{}); is it hidden?",
            target.selector, target.bounds.width, target.bounds.height
        )));
    }

    let raw = session.capture_png(&target.bounds).await?;
    let decoded = image::load_from_memory_with_format(&raw, ImageFormat::Png)
        .map_err(|e| OgpError::CaptureFailed(format!("Engine returned an unreadable PNG: {e}")))?;

    let (width, height) = decoded.dimensions();
    let expected = target.bounds.pixel_size();
    if (width, height) != expected {
        warn!(
            width,
            height,
            expected_width = expected.0,
            expected_height = expected.1,
            "captured size differs from element bounds"
        );
    }

    let encoded = encode_png(&flatten_opaque(&decoded, BACKGROUND))?;
    let bytes = write_atomically(output, &encoded)?;
    debug!(path = %output.display(), width, height, bytes, "capture written");

    Ok(CaptureResult {
        path: output.to_path_buf(),
        width,
        height,
        bytes,
    })
}

/// Composites every pixel onto `background`, dropping the alpha channel.
pub fn flatten_opaque(img: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = u32::from(px[3]);
        let blend = |c: u8, bg: u8| -> u8 {
            let mixed = u32::from(c) * alpha + u32::from(bg) * (255 - alpha);
            ((mixed + 127) / 255) as u8
        };
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(px[0], background[0]),
                blend(px[1], background[1]),
                blend(px[2], background[2]),
            ]),
        );
    }
    out
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| OgpError::CaptureFailed(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Writes `contents` next to `path` and renames it into place.
///
/// Missing parent directories are created.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<u64> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| OgpError::write_failed(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            OgpError::write_failed(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "output has no file name"),
            )
        })?;
    let staging = parent.join(format!(".{file_name}.{}.tmp", std::process::id()));

    if let Err(err) = fs::write(&staging, contents) {
        let _ = fs::remove_file(&staging);
        return Err(OgpError::write_failed(path, err));
    }
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(OgpError::write_failed(path, err));
    }
    Ok(contents.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakeEngine, Fault};
    use crate::browser::{BoundingBox, RenderEngine};
    use crate::Viewport;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn target(width: f64, height: f64) -> TargetElement {
        TargetElement {
            selector: ".og-image".to_string(),
            matches: 1,
            bounds: BoundingBox {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
        }
    }

    #[test]
    fn flatten_composites_translucent_pixels_onto_background() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 128])
            }
        });
        let flat = flatten_opaque(&DynamicImage::ImageRgba8(img), BACKGROUND);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn flatten_keeps_opaque_pixels() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([12, 34, 56, 255]));
        let flat = flatten_opaque(&DynamicImage::ImageRgba8(img), BACKGROUND);
        assert!(flat.pixels().all(|p| *p == Rgb([12, 34, 56])));
    }

    #[test]
    fn write_atomically_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("public").join("og-image.png");

        write_atomically(&path, b"first").unwrap();
        write_atomically(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomically_reports_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("public");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = write_atomically(&blocker.join("og-image.png"), b"png").unwrap_err();
        assert!(matches!(err, OgpError::WriteFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn zero_area_element_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("og.png");
        let engine = FakeEngine::default();
        let mut session = engine.open(Viewport::default()).await.unwrap();

        let err = capture(&mut session, &target(0.0, 630.0), &out)
            .await
            .unwrap_err();

        assert!(matches!(err, OgpError::CaptureFailed(_)));
        assert!(!out.exists());
        assert!(!engine.calls.log().contains(&"capture".to_string()));
    }

    #[tokio::test]
    async fn capture_writes_opaque_png_of_element_size() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("og.png");
        let engine = FakeEngine::with_elements(vec![FakeElement::new(
            ".og-image",
            640.0,
            320.0,
            [200, 30, 30, 90],
        )]);
        let mut session = engine.open(Viewport::default()).await.unwrap();

        let result = capture(&mut session, &target(640.0, 320.0), &out)
            .await
            .unwrap();

        assert_eq!((result.width, result.height), (640, 320));
        let written = image::open(&out).unwrap();
        assert_eq!(written.dimensions(), (640, 320));
        assert!(!written.color().has_alpha());
        assert_eq!(result.bytes, fs::metadata(&out).unwrap().len());
    }

    #[tokio::test]
    async fn engine_capture_failure_leaves_existing_file_untouched() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("og.png");
        fs::write(&out, b"previous").unwrap();
        let engine = FakeEngine::default().failing(Fault::Capture);
        let mut session = engine.open(Viewport::default()).await.unwrap();

        let err = capture(&mut session, &target(100.0, 100.0), &out)
            .await
            .unwrap_err();

        assert!(matches!(err, OgpError::CaptureFailed(_)));
        assert_eq!(fs::read(&out).unwrap(), b"previous");
    }
}
