//! Object detection over uploaded images.
//!
//! The backend is expensive to build, so [`Detector`] constructs it at most once for its whole
//! lifetime. Concurrent first callers block on the same initialization; later calls only read
//! the stored instance. A failed initialization is remembered and every call reports
//! [`DetectorError::Unavailable`] without retrying.

mod annotate;
mod fixture;

use std::sync::{Arc, OnceLock};

use image::DynamicImage;
use tracing::{error, info};

use super::domain::Detection;

pub use annotate::render_annotations;
pub use fixture::{FixtureBackend, FixtureDetection, FixtureLoader};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectorError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("image could not be decoded: {0}")]
    InvalidImage(String),
    #[error("annotated image could not be encoded: {0}")]
    Encode(String),
}

/// A constructed detection model. Assumed safe for concurrent inference.
pub trait DetectionBackend: Send + Sync {
    /// Detections at or above `confidence`; filtering is the backend's job.
    fn predict(
        &self,
        image: &DynamicImage,
        confidence: f32,
    ) -> Result<Vec<Detection>, DetectorError>;
}

/// Builds the backend on first use.
pub trait BackendLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn DetectionBackend>, DetectorError>;
}

type BackendSlot = Result<Arc<dyn DetectionBackend>, String>;

pub struct Detector {
    loader: Box<dyn BackendLoader>,
    backend: OnceLock<BackendSlot>,
    confidence: f32,
}

impl Detector {
    pub fn new<L>(loader: L, confidence: f32) -> Self
    where
        L: BackendLoader + 'static,
    {
        Self {
            loader: Box::new(loader),
            backend: OnceLock::new(),
            confidence,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Initialize eagerly, e.g. at process start.
    pub fn warm_up(&self) -> Result<(), DetectorError> {
        self.backend().map(|_| ())
    }

    fn backend(&self) -> Result<&Arc<dyn DetectionBackend>, DetectorError> {
        let slot = self.backend.get_or_init(|| {
            info!(confidence = self.confidence, "initializing detection backend");
            self.loader.load().map_err(|err| {
                error!(error = %err, "detection backend failed to initialize");
                match err {
                    DetectorError::Unavailable(reason) => reason,
                    other => other.to_string(),
                }
            })
        });

        slot.as_ref()
            .map_err(|reason| DetectorError::Unavailable(reason.clone()))
    }

    pub fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectorError> {
        let decoded = decode(image)?;
        self.detect_decoded(&decoded)
    }

    pub fn detect_decoded(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        self.backend()?.predict(image, self.confidence)
    }

    /// PNG rendering of the image with detection boxes drawn over it.
    pub fn annotate(&self, image: &[u8]) -> Result<Vec<u8>, DetectorError> {
        let decoded = decode(image)?;
        let detections = self.detect_decoded(&decoded)?;
        render_annotations(&decoded, &detections)
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("confidence", &self.confidence)
            .field("initialized", &self.backend.get().is_some())
            .finish_non_exhaustive()
    }
}

pub fn decode(image: &[u8]) -> Result<DynamicImage, DetectorError> {
    image::load_from_memory(image).map_err(|err| DetectorError::InvalidImage(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::cleanup::domain::BoundingBox;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct StaticBackend;

    impl DetectionBackend for StaticBackend {
        fn predict(
            &self,
            _image: &DynamicImage,
            confidence: f32,
        ) -> Result<Vec<Detection>, DetectorError> {
            Ok([("plastic", 0.9), ("plastic", 0.6), ("can", 0.2)]
                .into_iter()
                .filter(|(_, score)| *score >= confidence)
                .map(|(class_name, score)| Detection {
                    class_name: class_name.to_string(),
                    confidence: score,
                    bbox: BoundingBox::new(1.0, 1.0, 6.0, 6.0),
                })
                .collect())
        }
    }

    struct CountingLoader {
        constructions: Arc<AtomicUsize>,
        fail: bool,
    }

    impl BackendLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn DetectionBackend>, DetectorError> {
            self.constructions.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            if self.fail {
                return Err(DetectorError::Unavailable("weights missing".to_string()));
            }
            Ok(Arc::new(StaticBackend))
        }
    }

    fn detector(fail: bool) -> (Detector, Arc<AtomicUsize>) {
        let constructions = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            constructions: constructions.clone(),
            fail,
        };
        (Detector::new(loader, 0.25), constructions)
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("encode png");
        buffer.into_inner()
    }

    #[test]
    fn concurrent_first_calls_construct_backend_once() {
        let (detector, constructions) = detector(false);
        let detector = Arc::new(detector);
        let image = Arc::new(DynamicImage::ImageRgb8(RgbImage::new(8, 8)));
        let callers = 16;
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let detector = detector.clone();
                let image = image.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    detector.detect_decoded(&image).expect("detection succeeds")
                })
            })
            .collect();

        for handle in handles {
            let detections = handle.join().expect("caller thread");
            assert_eq!(detections.len(), 2);
        }
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_initialization_is_not_retried() {
        let (detector, constructions) = detector(true);
        let bytes = png_bytes();

        for _ in 0..3 {
            match detector.detect(&bytes) {
                Err(DetectorError::Unavailable(reason)) => assert!(reason.contains("weights")),
                other => panic!("expected unavailable detector, got {other:?}"),
            }
        }
        assert!(detector.warm_up().is_err());
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undecodable_bytes_are_invalid_images() {
        let (detector, constructions) = detector(false);
        assert!(matches!(
            detector.detect(b"not an image"),
            Err(DetectorError::InvalidImage(_))
        ));
        assert_eq!(constructions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn annotate_returns_png() {
        let (detector, _) = detector(false);
        let annotated = detector.annotate(&png_bytes()).expect("annotation renders");
        assert_eq!(
            image::guess_format(&annotated).expect("format detected"),
            ImageFormat::Png
        );
    }
}
