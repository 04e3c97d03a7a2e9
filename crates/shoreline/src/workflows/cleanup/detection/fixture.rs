use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use serde::Deserialize;

use super::{BackendLoader, DetectionBackend, DetectorError};
use crate::workflows::cleanup::domain::{BoundingBox, Detection};

/// Detection with a box expressed as fractions of the image size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureDetection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// Replays a fixed set of detections against any image.
#[derive(Debug, Clone)]
pub struct FixtureBackend {
    detections: Vec<FixtureDetection>,
}

impl FixtureBackend {
    pub fn new(detections: Vec<FixtureDetection>) -> Self {
        Self { detections }
    }

    /// Beach scene sample: fourteen plastic items, six cans and a net laid out on a grid.
    pub fn sample() -> Self {
        let classes = [("plastic", 14usize, 0.82f32), ("can", 6, 0.74), ("net", 1, 0.61)];
        let columns = 6usize;
        let cell = 1.0 / columns as f32;
        let detections = classes
            .iter()
            .flat_map(|(class_name, count, confidence)| {
                std::iter::repeat((*class_name, *confidence)).take(*count)
            })
            .enumerate()
            .map(|(index, (class_name, confidence))| {
                let column = (index % columns) as f32;
                let row = (index / columns) as f32;
                FixtureDetection {
                    class_name: class_name.to_string(),
                    confidence,
                    bbox: [
                        column * cell + 0.02,
                        row * cell + 0.02,
                        (column + 1.0) * cell - 0.02,
                        (row + 1.0) * cell - 0.02,
                    ],
                }
            })
            .collect();
        Self::new(detections)
    }

    pub fn from_path(path: &Path) -> Result<Self, DetectorError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DetectorError::Unavailable(format!("cannot read {}: {err}", path.display()))
        })?;
        let detections: Vec<FixtureDetection> = serde_json::from_str(&raw).map_err(|err| {
            DetectorError::Unavailable(format!("invalid fixture {}: {err}", path.display()))
        })?;
        Ok(Self::new(detections))
    }
}

impl DetectionBackend for FixtureBackend {
    fn predict(
        &self,
        image: &DynamicImage,
        confidence: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = image.dimensions();
        let (width, height) = (width as f32, height as f32);
        Ok(self
            .detections
            .iter()
            .filter(|entry| entry.confidence >= confidence)
            .map(|entry| {
                let [x1, y1, x2, y2] = entry.bbox;
                Detection {
                    class_name: entry.class_name.clone(),
                    confidence: entry.confidence,
                    bbox: BoundingBox::new(x1 * width, y1 * height, x2 * width, y2 * height),
                }
            })
            .collect())
    }
}

/// Loads a [`FixtureBackend`] from a JSON file, or the built-in sample without one.
#[derive(Debug, Clone, Default)]
pub struct FixtureLoader {
    path: Option<PathBuf>,
}

impl FixtureLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl BackendLoader for FixtureLoader {
    fn load(&self) -> Result<Arc<dyn DetectionBackend>, DetectorError> {
        let backend = match &self.path {
            Some(path) => FixtureBackend::from_path(path)?,
            None => FixtureBackend::sample(),
        };
        Ok(Arc::new(backend))
    }
}
