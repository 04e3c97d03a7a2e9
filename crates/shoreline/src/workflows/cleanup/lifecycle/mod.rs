//! Stored analyses and their recruitment posts.
//!
//! A record starts `analyzed`, moves to `uploaded` when published and never leaves
//! `expired`. Generated content is attached or replaced as one unit.

pub mod record;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use record::{
    AnalysisRecord, LifecycleAction, NewAnalysis, RecruitmentContent, TransitionError,
};
pub use repository::{AnalysisRepository, RecruitmentQuery, RepositoryError};
pub use router::cleanup_router;
pub use service::{CleanupService, CleanupServiceError, ImageUpload, RecruitmentDraft};
pub use views::{
    AnalysisDetailView, AnalysisSummaryView, RecommendedResources, RecruitmentDetailView,
    RecruitmentDraftView, RecruitmentListItem, RecruitmentListView,
};
