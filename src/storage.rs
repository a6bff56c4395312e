// SPDX-License-Identifier: GPL-3.0-only

//! Image encoding and storage for detection results

use crate::backends::camera::types::ColorImage;
use crate::constants::{app_info, detection, file_formats};
use crate::errors::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where annotated result images go
///
/// Called from blocking context; implementations may do synchronous I/O.
pub trait ImageStore: Send + Sync {
    /// Write `image` under `name`, returns the full path written
    fn write_image(&self, name: &str, image: &ColorImage) -> StorageResult<PathBuf>;
}

/// Image store backed by a directory on disk
///
/// The format follows the file extension: `.jpg`/`.jpeg` or `.png`.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    dir: PathBuf,
    jpeg_quality: u8,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            jpeg_quality: crate::constants::server::RESULT_JPEG_QUALITY,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageStore for DiskImageStore {
    fn write_image(&self, name: &str, image: &ColorImage) -> StorageResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::CreateDir(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.dir.join(name);
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !file_formats::is_image_extension(&ext) {
            return Err(StorageError::Encode(format!(
                "unsupported image extension '{}'",
                ext
            )));
        }

        let data = if ext == "png" {
            encode_png(image)?
        } else {
            encode_jpeg(image, self.jpeg_quality)?
        };

        std::fs::write(&path, &data)
            .map_err(|e| StorageError::Write(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = data.len(), "Image written");
        Ok(path)
    }
}

/// Encode image as JPEG
pub fn encode_jpeg(image: &ColorImage, quality: u8) -> StorageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(buffer)
}

/// Encode image as PNG
pub fn encode_png(image: &ColorImage) -> StorageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut buffer),
        image::ImageFormat::Png,
    )?;
    Ok(buffer)
}

/// Result filename: `result_YYYYmmdd_HHMMSS_mmm_<request>.jpg`
///
/// `request` separates results written within the same millisecond.
pub fn result_filename(request: u64) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    format!("{}_{}_{}.jpg", detection::RESULT_PREFIX, timestamp, request)
}

/// Default folder for result images
pub fn default_output_dir() -> PathBuf {
    let dir = dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(app_info::NAME);
    info!(dir = %dir.display(), "Using default output directory");
    dir
}
