use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::record::{
    AnalysisRecord, LifecycleAction, NewAnalysis, RecruitmentContent, TransitionError,
};
use super::repository::{AnalysisRepository, RecruitmentQuery, RepositoryError};
use crate::config::PipelineConfig;
use crate::workflows::cleanup::assist::{AssistClient, ImagePart, Outcome};
use crate::workflows::cleanup::blob::{extension_of, BlobError, BlobStore};
use crate::workflows::cleanup::compose::{CompositionFacts, RecruitmentComposer};
use crate::workflows::cleanup::detection::{self, render_annotations, Detector, DetectorError};
use crate::workflows::cleanup::domain::{
    AnalysisId, AnalysisStatus, EventDetails, RecruitmentText, TrashInventory,
};
use crate::workflows::cleanup::recommend::ResourceRecommender;
use crate::workflows::cleanup::reconcile::Reconciler;

pub const MAX_LOCATION_LEN: usize = 255;
const MAX_EVENT_FIELD_LEN: usize = 255;
const ANNOTATED_EXTENSION: &str = ".png";

/// Uploaded photograph as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Composition result together with the record it was written for.
///
/// When `text` is degraded the record was left untouched.
#[derive(Debug, Clone)]
pub struct RecruitmentDraft {
    pub record: AnalysisRecord,
    pub event: EventDetails,
    pub text: Outcome<RecruitmentText>,
}

/// Runs the photo pipeline and owns the analysis lifecycle.
pub struct CleanupService<R, B> {
    detector: Arc<Detector>,
    reconciler: Reconciler,
    recommender: ResourceRecommender,
    composer: RecruitmentComposer,
    repository: Arc<R>,
    blobs: Arc<B>,
}

impl<R, B> CleanupService<R, B>
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    pub fn new(
        detector: Arc<Detector>,
        assist: Arc<dyn AssistClient>,
        pipeline: PipelineConfig,
        repository: Arc<R>,
        blobs: Arc<B>,
    ) -> Self {
        Self {
            detector,
            reconciler: Reconciler::new(assist.clone()),
            recommender: ResourceRecommender::new(assist.clone(), pipeline.recommendation),
            composer: RecruitmentComposer::new(assist, pipeline.recruitment),
            repository,
            blobs,
        }
    }

    /// Detect, reconcile and recommend for one photograph, then persist the result.
    pub fn analyze(
        &self,
        upload: ImageUpload,
        location: Option<String>,
    ) -> Result<AnalysisRecord, CleanupServiceError> {
        if upload.bytes.is_empty() {
            return Err(CleanupServiceError::Validation(
                "image file is required".to_string(),
            ));
        }
        let location = normalize_location(location)?;

        let decoded = detection::decode(&upload.bytes)?;
        let detections = self.detector.detect_decoded(&decoded)?;
        let raw = TrashInventory::from_detections(&detections);

        let original = self
            .blobs
            .put(&extension_of(&upload.file_name), &upload.bytes)?;
        let annotated = match render_annotations(&decoded, &detections)
            .map_err(CleanupServiceError::from)
            .and_then(|png| {
                self.blobs
                    .put(ANNOTATED_EXTENSION, &png)
                    .map_err(CleanupServiceError::from)
            })
        {
            Ok(blob) => blob,
            Err(err) => {
                warn!(error = %err, image = %original.0, "annotation failed; keeping original image");
                original.clone()
            }
        };

        let image = ImagePart::from_upload(&upload.file_name, upload.bytes);
        let reconciliation = self.reconciler.reconcile(&raw, &image).into_value();
        let recommendation = self
            .recommender
            .recommend(&reconciliation.inventory, &reconciliation.labels, &image)
            .into_value();

        let record = self.repository.insert(NewAnalysis {
            image: annotated,
            original_image: original,
            image_name: upload.file_name,
            location,
            trash_summary: reconciliation.inventory,
            display_names: reconciliation.labels,
            recommendation,
            created_at: Utc::now(),
        })?;

        info!(
            analysis_id = %record.id,
            detections = detections.len(),
            items = record.trash_summary.total(),
            people = record.required_people,
            "analysis stored"
        );
        Ok(record)
    }

    pub fn get(&self, id: AnalysisId) -> Result<AnalysisRecord, CleanupServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(CleanupServiceError::NotFound(id))
    }

    /// Compose a recruitment post. Accepted text replaces all four generated fields at
    /// once; degraded text is returned to the caller only.
    ///
    /// Composition runs outside the store; the content is attached afterwards to the
    /// record as it stands at commit time.
    pub fn generate_recruitment(
        &self,
        id: AnalysisId,
        event: EventDetails,
    ) -> Result<RecruitmentDraft, CleanupServiceError> {
        validate_event(&event)?;
        let record = self.get(id)?;
        if !record.status.accepts_content() {
            let refusal = TransitionError {
                status: record.status,
                action: LifecycleAction::AttachContent,
            };
            return Err(CleanupServiceError::transition(id, refusal));
        }

        let recommendation = record.recommendation();
        let text = self.composer.compose(&CompositionFacts {
            inventory: &record.trash_summary,
            labels: &record.display_names,
            recommendation: &recommendation,
            location: record.location.as_deref(),
            event: &event,
        });

        let record = if let Some(reason) = text.reason() {
            warn!(analysis_id = %id, %reason, "recruitment composition degraded; not saved");
            record
        } else {
            let content = RecruitmentContent::new(text.value().clone(), &event);
            let record = self.commit(id, &mut |record: &mut AnalysisRecord| {
                record.attach_recruitment(content.clone())
            })?;
            info!(analysis_id = %id, "recruitment content attached");
            record
        };

        Ok(RecruitmentDraft {
            record,
            event,
            text,
        })
    }

    /// Move to `uploaded`. Publishing again only refreshes `published_at`.
    pub fn publish(&self, id: AnalysisId) -> Result<AnalysisRecord, CleanupServiceError> {
        let at = Utc::now();
        let record = self.commit(id, &mut |record: &mut AnalysisRecord| record.publish(at))?;
        info!(analysis_id = %id, "recruitment published");
        Ok(record)
    }

    /// Records with generated content, newest first.
    pub fn recruitments(
        &self,
        status: Option<AnalysisStatus>,
    ) -> Result<Vec<AnalysisRecord>, CleanupServiceError> {
        let query = RecruitmentQuery { status };
        let mut records: Vec<_> = self
            .repository
            .recruitments(query)?
            .into_iter()
            .filter(|record| query.matches(record))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    /// A single recruitment post; records without generated content are not found.
    pub fn recruitment(&self, id: AnalysisId) -> Result<AnalysisRecord, CleanupServiceError> {
        let record = self.get(id)?;
        if !record.is_recruitment() {
            return Err(CleanupServiceError::NotFound(id));
        }
        Ok(record)
    }

    fn commit(
        &self,
        id: AnalysisId,
        change: &mut dyn FnMut(&mut AnalysisRecord) -> Result<(), TransitionError>,
    ) -> Result<AnalysisRecord, CleanupServiceError> {
        self.repository.modify(id, change).map_err(|err| match err {
            RepositoryError::NotFound => CleanupServiceError::NotFound(id),
            RepositoryError::Rejected(source) => CleanupServiceError::transition(id, source),
            other => CleanupServiceError::Repository(other),
        })
    }
}

fn normalize_location(location: Option<String>) -> Result<Option<String>, CleanupServiceError> {
    let location = location
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    match location {
        Some(value) if value.chars().count() > MAX_LOCATION_LEN => {
            Err(CleanupServiceError::Validation(format!(
                "location must be at most {MAX_LOCATION_LEN} characters"
            )))
        }
        other => Ok(other),
    }
}

fn validate_event(event: &EventDetails) -> Result<(), CleanupServiceError> {
    for (field, value) in [
        ("activity_date", &event.activity_date),
        ("meeting_place", &event.meeting_place),
    ] {
        let value = value.trim();
        if value.is_empty() {
            return Err(CleanupServiceError::Validation(format!("{field} is required")));
        }
        if value.chars().count() > MAX_EVENT_FIELD_LEN {
            return Err(CleanupServiceError::Validation(format!(
                "{field} must be at most {MAX_EVENT_FIELD_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Error raised by the cleanup service.
#[derive(Debug, thiserror::Error)]
pub enum CleanupServiceError {
    #[error("analysis {0} not found")]
    NotFound(AnalysisId),
    #[error("{0}")]
    Validation(String),
    #[error("analysis {id}: {source}")]
    InvalidTransition {
        id: AnalysisId,
        source: TransitionError,
    },
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CleanupServiceError {
    fn transition(id: AnalysisId, source: TransitionError) -> Self {
        Self::InvalidTransition { id, source }
    }
}
