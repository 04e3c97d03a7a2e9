use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::workflows::cleanup::assist::{AssistClient, AssistError, AssistRequest};
use crate::workflows::cleanup::blob::{BlobError, BlobStore};
use crate::workflows::cleanup::detection::{
    BackendLoader, DetectionBackend, Detector, DetectorError, FixtureBackend, FixtureDetection,
};
use crate::workflows::cleanup::domain::{AnalysisId, BlobRef, EventDetails};
use crate::workflows::cleanup::lifecycle::record::{AnalysisRecord, NewAnalysis, TransitionError};
use crate::workflows::cleanup::lifecycle::repository::{
    AnalysisRepository, RecruitmentQuery, RepositoryError,
};
use crate::workflows::cleanup::lifecycle::service::{CleanupService, ImageUpload};

pub(super) type TestService = CleanupService<MemoryRepository, MemoryBlobs>;

/// Answers each kind of assist request from its own script entry.
pub(super) struct ScriptedAssist {
    pub(super) correction: Result<String, AssistError>,
    pub(super) recommendation: Result<String, AssistError>,
    pub(super) composition: Result<String, AssistError>,
}

impl ScriptedAssist {
    pub(super) fn offline() -> Self {
        let offline = || Err(AssistError::Unavailable("connection refused".to_string()));
        Self {
            correction: offline(),
            recommendation: offline(),
            composition: offline(),
        }
    }

    pub(super) fn with_correction(mut self, answer: &str) -> Self {
        self.correction = Ok(answer.to_string());
        self
    }

    pub(super) fn with_recommendation(mut self, answer: &str) -> Self {
        self.recommendation = Ok(answer.to_string());
        self
    }

    pub(super) fn with_composition(mut self, answer: Result<&str, AssistError>) -> Self {
        self.composition = answer.map(str::to_string);
        self
    }
}

impl AssistClient for ScriptedAssist {
    fn generate(&self, request: &AssistRequest<'_>) -> Result<String, AssistError> {
        let instructions = request.instructions.as_str();
        if instructions.contains("Produce the final trash inventory") {
            self.correction.clone()
        } else if instructions.contains("Recommend the cleanup resources") {
            self.recommendation.clone()
        } else {
            self.composition.clone()
        }
    }
}

/// Holds composition at a barrier and then stalls, leaving a window for other writers.
pub(super) struct GatedComposition {
    pub(super) gate: Arc<Barrier>,
    pub(super) stall: Duration,
}

impl AssistClient for GatedComposition {
    fn generate(&self, request: &AssistRequest<'_>) -> Result<String, AssistError> {
        let instructions = request.instructions.as_str();
        if instructions.contains("Produce the final trash inventory")
            || instructions.contains("Recommend the cleanup resources")
        {
            return Err(AssistError::Unavailable("connection refused".to_string()));
        }
        self.gate.wait();
        thread::sleep(self.stall);
        Ok("송정 해변에서 함께 줍깅해요.".to_string())
    }
}

/// Hands out a fixed list of detections and counts how often it was built.
pub(super) struct StaticLoader {
    pub(super) detections: Vec<FixtureDetection>,
    pub(super) constructions: Arc<AtomicUsize>,
}

impl BackendLoader for StaticLoader {
    fn load(&self) -> Result<Arc<dyn DetectionBackend>, DetectorError> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixtureBackend::new(self.detections.clone())))
    }
}

pub(super) struct BrokenLoader;

impl BackendLoader for BrokenLoader {
    fn load(&self) -> Result<Arc<dyn DetectionBackend>, DetectorError> {
        Err(DetectorError::Unavailable("model weights missing".to_string()))
    }
}

pub(super) fn fixture(classes: &[&str]) -> Vec<FixtureDetection> {
    classes
        .iter()
        .enumerate()
        .map(|(index, class_name)| {
            let offset = index as f32 * 0.1;
            FixtureDetection {
                class_name: class_name.to_string(),
                confidence: 0.8,
                bbox: [offset, offset, offset + 0.1, offset + 0.1],
            }
        })
        .collect()
}

pub(super) fn detector(classes: &[&str]) -> (Arc<Detector>, Arc<AtomicUsize>) {
    let constructions = Arc::new(AtomicUsize::new(0));
    let loader = StaticLoader {
        detections: fixture(classes),
        constructions: constructions.clone(),
    };
    (Arc::new(Detector::new(loader, 0.25)), constructions)
}

pub(super) fn build_service_with(
    classes: &[&str],
    assist: impl AssistClient + 'static,
) -> (TestService, Arc<MemoryRepository>, Arc<MemoryBlobs>) {
    let (detector, _) = detector(classes);
    let repository = Arc::new(MemoryRepository::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let service = CleanupService::new(
        detector,
        Arc::new(assist),
        PipelineConfig::default(),
        repository.clone(),
        blobs.clone(),
    );
    (service, repository, blobs)
}

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryBlobs>) {
    build_service_with(&["plastic", "plastic", "can"], ScriptedAssist::offline())
}

pub(super) fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode png");
    buffer.into_inner()
}

pub(super) fn upload() -> ImageUpload {
    ImageUpload {
        file_name: "beach.png".to_string(),
        bytes: png_bytes(),
    }
}

pub(super) fn event(note: Option<&str>) -> EventDetails {
    EventDetails {
        activity_date: "2025-08-16 09:00".to_string(),
        meeting_place: "송정 해수욕장 관리사무소 앞".to_string(),
        additional_note: note.map(str::to_string),
    }
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    next_id: AtomicU64,
    pub(super) records: Mutex<BTreeMap<AnalysisId, AnalysisRecord>>,
}

impl MemoryRepository {
    /// Overwrite a stored record directly, bypassing the service.
    pub(super) fn force(&self, record: AnalysisRecord) {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(record.id, record);
    }
}

impl AnalysisRepository for MemoryRepository {
    fn insert(&self, analysis: NewAnalysis) -> Result<AnalysisRecord, RepositoryError> {
        let id = AnalysisId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = analysis.into_record(id);
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(id, record.clone());
        Ok(record)
    }

    fn modify(
        &self,
        id: AnalysisId,
        change: &mut dyn FnMut(&mut AnalysisRecord) -> Result<(), TransitionError>,
    ) -> Result<AnalysisRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let mut next = stored.clone();
        change(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    fn fetch(&self, id: AnalysisId) -> Result<Option<AnalysisRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn recruitments(&self, query: RecruitmentQuery) -> Result<Vec<AnalysisRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRepository;

impl AnalysisRepository for UnavailableRepository {
    fn insert(&self, _analysis: NewAnalysis) -> Result<AnalysisRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn modify(
        &self,
        _id: AnalysisId,
        _change: &mut dyn FnMut(&mut AnalysisRecord) -> Result<(), TransitionError>,
    ) -> Result<AnalysisRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: AnalysisId) -> Result<Option<AnalysisRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn recruitments(&self, _query: RecruitmentQuery) -> Result<Vec<AnalysisRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryBlobs {
    counter: AtomicU64,
    pub(super) blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl BlobStore for MemoryBlobs {
    fn put(&self, extension: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        let key = format!(
            "2025-08-01/blob{}{}",
            self.counter.fetch_add(1, Ordering::SeqCst),
            extension
        );
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .insert(key.clone(), bytes.to_vec());
        Ok(BlobRef(key))
    }

    fn read(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .expect("blob mutex poisoned")
            .get(&blob.0)
            .cloned()
            .ok_or_else(|| BlobError::InvalidKey(blob.0.clone()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
