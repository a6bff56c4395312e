// SPDX-License-Identifier: GPL-3.0-only

//! Recorded-session depth sensor
//!
//! Plays back a directory laid out as:
//!
//! ```text
//! calibration.json
//! color_0000.png   depth_0000.png   (16-bit grayscale, Z16 units)
//! color_0001.png   depth_0001.png
//! ...
//! ```
//!
//! Pairs are matched by their shared suffix and played in name order.

use super::DepthSensor;
use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contents of `calibration.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    pub depth_scale: f32,
    pub color: Intrinsics,
    pub depth: Intrinsics,
    #[serde(default)]
    pub depth_to_color: Extrinsics,
    #[serde(default)]
    pub baseline_m: Option<f32>,
}

impl Calibration {
    pub fn load(path: &Path) -> SensorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| SensorError::InvalidFrame(format!("{}: {}", path.display(), e)))
    }
}

struct Session {
    calibration: Calibration,
    pairs: Vec<(PathBuf, PathBuf)>,
    next: usize,
    fps: u32,
}

pub struct ReplaySensor {
    dir: PathBuf,
    looping: bool,
    session: Option<Session>,
}

impl ReplaySensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            looping: true,
            session: None,
        }
    }

    /// Restart from the first pair when the recording is exhausted
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn session(&self) -> SensorResult<&Session> {
        self.session.as_ref().ok_or(SensorError::NotOpen)
    }

    /// Matching `color_*.png` / `depth_*.png` pairs in name order
    fn scan_pairs(dir: &Path) -> SensorResult<Vec<(PathBuf, PathBuf)>> {
        let mut suffixes: Vec<String> = std::fs::read_dir(dir)?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_prefix("color_")
                    .filter(|rest| rest.to_lowercase().ends_with(".png"))
                    .map(str::to_string)
            })
            .filter(|suffix| dir.join(format!("depth_{}", suffix)).is_file())
            .collect();
        suffixes.sort();

        Ok(suffixes
            .into_iter()
            .map(|s| (dir.join(format!("color_{}", s)), dir.join(format!("depth_{}", s))))
            .collect())
    }

    fn load_pair(
        calibration: &Calibration,
        color_path: &Path,
        depth_path: &Path,
    ) -> SensorResult<(ColorImage, DepthFrame)> {
        let color = image::open(color_path)
            .map_err(|e| SensorError::IoError(format!("{}: {}", color_path.display(), e)))?
            .to_rgb8();
        let depth_img = image::open(depth_path)
            .map_err(|e| SensorError::IoError(format!("{}: {}", depth_path.display(), e)))?
            .into_luma16();

        let (w, h) = depth_img.dimensions();
        let intr = calibration.depth;
        if (w, h) != (intr.width, intr.height) {
            return Err(SensorError::InvalidFrame(format!(
                "{} is {}x{}, calibration says {}x{}",
                depth_path.display(),
                w,
                h,
                intr.width,
                intr.height
            )));
        }
        let depth = DepthFrame::z16(w, h, depth_img.into_raw(), intr, calibration.depth_scale)?;
        Ok((color, depth))
    }
}

impl DepthSensor for ReplaySensor {
    fn open(&mut self, profile: &StreamProfile) -> SensorResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let calibration = Calibration::load(&self.dir.join("calibration.json"))?;
        let pairs = Self::scan_pairs(&self.dir)?;
        if pairs.is_empty() {
            return Err(SensorError::IoError(format!(
                "no color/depth pairs in {}",
                self.dir.display()
            )));
        }
        if (calibration.color.width, calibration.color.height)
            != (profile.color_width, profile.color_height)
        {
            warn!(
                recorded_width = calibration.color.width,
                recorded_height = calibration.color.height,
                requested = %profile,
                "Recording resolution differs from requested profile, using recording"
            );
        }
        info!(dir = %self.dir.display(), frames = pairs.len(), "Replay sensor opened");
        self.session = Some(Session {
            calibration,
            pairs,
            next: 0,
            fps: profile.fps.max(1),
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            debug!(dir = %self.dir.display(), "Replay sensor closed");
        }
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn depth_scale(&self) -> SensorResult<f32> {
        Ok(self.session()?.calibration.depth_scale)
    }

    fn intrinsics(&self, stream: StreamKind) -> SensorResult<Intrinsics> {
        let calibration = &self.session()?.calibration;
        Ok(match stream {
            StreamKind::Color => calibration.color,
            StreamKind::Depth => calibration.depth,
        })
    }

    fn depth_to_color(&self) -> SensorResult<Extrinsics> {
        Ok(self.session()?.calibration.depth_to_color)
    }

    fn stereo_baseline(&self) -> f32 {
        self.session
            .as_ref()
            .and_then(|s| s.calibration.baseline_m)
            .unwrap_or(crate::constants::stream::STEREO_BASELINE_M)
    }

    fn wait_for_frames(&mut self, timeout: Duration) -> SensorResult<RawFramePair> {
        let looping = self.looping;
        let session = self.session.as_mut().ok_or(SensorError::NotOpen)?;

        if session.next >= session.pairs.len() {
            if !looping {
                return Err(SensorError::Disconnected("end of recording".to_string()));
            }
            session.next = 0;
        }

        let period = Duration::from_secs_f64(1.0 / session.fps as f64);
        std::thread::sleep(period.min(timeout));

        let index = session.next;
        session.next += 1;
        let (color_path, depth_path) = &session.pairs[index];
        let timestamp_ms = index as f64 * 1000.0 / session.fps as f64;
        let (color, depth) = Self::load_pair(&session.calibration, color_path, depth_path)?;

        Ok(RawFramePair {
            color: Some(color),
            depth: Some(depth.with_timestamp(timestamp_ms)),
            timestamp_ms,
        })
    }

    fn name(&self) -> &str {
        "replay"
    }
}
