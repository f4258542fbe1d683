//! Upload normalization: image passthrough and PDF rasterization.
//!
//! Images are forwarded untouched. PDFs are rasterized one JPEG per page
//! with poppler's pdftoppm into a caller-owned scratch directory. Anything
//! else is reported as unsupported.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::DocumentConfig;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

const PAGE_PREFIX: &str = "page";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rasterization failed: {0}")]
    Rasterize(String),
}

/// Normalize an uploaded file to a list of image paths.
///
/// A known image extension returns the path itself; a PDF is rasterized
/// into `scratch_dir` and the generated page images are returned in page
/// order. The caller owns `scratch_dir` and its lifetime.
pub async fn normalize(
    path: &Path,
    scratch_dir: &Path,
    config: &DocumentConfig,
) -> Result<Vec<PathBuf>, DocumentError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(vec![path.to_path_buf()]);
    }

    if extension == "pdf" {
        return rasterize_pdf(path, scratch_dir, config).await;
    }

    Err(DocumentError::UnsupportedFormat(extension))
}

/// Rasterize a PDF to per-page JPEGs via pdftoppm, the same poppler utility
/// the usual pdf2image stack wraps.
async fn rasterize_pdf(
    path: &Path,
    scratch_dir: &Path,
    config: &DocumentConfig,
) -> Result<Vec<PathBuf>, DocumentError> {
    let prefix = scratch_dir.join(PAGE_PREFIX);

    let mut command = Command::new("pdftoppm");
    command.arg("-jpeg").arg("-r").arg(config.dpi.to_string());
    if config.max_pages > 0 {
        command.arg("-l").arg(config.max_pages.to_string());
    }
    command.arg(path).arg(&prefix);

    let output = command
        .output()
        .await
        .map_err(|e| DocumentError::Rasterize(format!("failed to run pdftoppm: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let snippet: String = stderr.chars().take(200).collect();
        return Err(DocumentError::Rasterize(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            snippet.trim()
        )));
    }

    let pages = collect_page_images(scratch_dir)?;
    debug!("Rasterized {} to {} page image(s)", path.display(), pages.len());
    Ok(pages)
}

/// Collect generated page images from the scratch directory, sorted by page
/// number. pdftoppm zero-pads page numbers based on the page count, so the
/// sort is numeric on the suffix rather than lexicographic.
fn collect_page_images(scratch_dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let entries = std::fs::read_dir(scratch_dir).map_err(|e| DocumentError::Io {
        path: scratch_dir.to_path_buf(),
        source: e,
    })?;

    let mut pages: Vec<(u32, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let number = name
                .strip_prefix(PAGE_PREFIX)?
                .strip_prefix('-')?
                .strip_suffix(".jpg")?
                .parse::<u32>()
                .ok()?;
            Some((number, e.path()))
        })
        .collect();

    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// Base64-encode an image file for an inline multimodal payload.
/// The image bytes are not validated or resized.
pub fn encode_image(path: &Path) -> Result<String, DocumentError> {
    let bytes = std::fs::read(path).map_err(|e| DocumentError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(BASE64.encode(bytes))
}

/// Wrap a base64 payload as the data URL the chat API expects.
pub fn data_url(base64_payload: &str) -> String {
    format!("data:image/jpeg;base64,{base64_payload}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentConfig;

    #[tokio::test]
    async fn image_extension_passes_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("scan.png");
        std::fs::write(&image, b"not really a png").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let result = normalize(&image, scratch.path(), &DocumentConfig::default())
            .await
            .unwrap();
        assert_eq!(result, vec![image]);
    }

    #[tokio::test]
    async fn image_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("report.JPG");
        std::fs::write(&image, b"jpeg bytes").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let result = normalize(&image, scratch.path(), &DocumentConfig::default())
            .await
            .unwrap();
        assert_eq!(result, vec![image]);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"plain text").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let err = normalize(&file, scratch.path(), &DocumentConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(ext) if ext == "txt"));
        // Nothing was generated for the rejected file.
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn page_images_sort_numerically() {
        let scratch = tempfile::tempdir().unwrap();
        for name in ["page-10.jpg", "page-2.jpg", "page-1.jpg"] {
            std::fs::write(scratch.path().join(name), b"jpeg").unwrap();
        }
        // A stray non-page file is ignored.
        std::fs::write(scratch.path().join("other.jpg"), b"jpeg").unwrap();

        let pages = collect_page_images(scratch.path()).unwrap();
        let names: Vec<String> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.jpg", "page-2.jpg", "page-10.jpg"]);
    }

    #[test]
    fn encode_image_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("pixel.jpg");
        std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let encoded = encode_image(&image).unwrap();
        assert_eq!(BASE64.decode(&encoded).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn encode_missing_file_is_io_error() {
        let err = encode_image(Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }

    #[test]
    fn data_url_has_inline_jpeg_prefix() {
        assert_eq!(data_url("QUJD"), "data:image/jpeg;base64,QUJD");
    }
}
