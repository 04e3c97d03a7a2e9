//! Beach litter photo analysis and volunteer recruitment.

pub mod assist;
pub mod blob;
pub mod compose;
pub mod detection;
pub mod domain;
pub mod lifecycle;
pub mod recommend;
pub mod reconcile;

pub use assist::{AssistClient, DegradedReason, HttpAssistClient, OfflineAssist, Outcome};
pub use blob::{BlobStore, LocalBlobStore};
pub use detection::{Detector, DetectorError, FixtureLoader};
pub use domain::{AnalysisId, AnalysisStatus, EventDetails, Recommendation, TrashInventory};
pub use lifecycle::{
    cleanup_router, AnalysisRecord, AnalysisRepository, CleanupService, CleanupServiceError,
    ImageUpload, RepositoryError,
};
