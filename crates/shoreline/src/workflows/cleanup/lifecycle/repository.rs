use super::record::{AnalysisRecord, NewAnalysis, TransitionError};
use crate::workflows::cleanup::domain::{AnalysisId, AnalysisStatus};

/// Storage abstraction; every call commits all-or-nothing.
pub trait AnalysisRepository: Send + Sync {
    fn insert(&self, analysis: NewAnalysis) -> Result<AnalysisRecord, RepositoryError>;
    /// Apply `change` to the stored record under the store's lock and return the committed
    /// copy. A refused change leaves the stored record untouched.
    fn modify(
        &self,
        id: AnalysisId,
        change: &mut dyn FnMut(&mut AnalysisRecord) -> Result<(), TransitionError>,
    ) -> Result<AnalysisRecord, RepositoryError>;
    fn fetch(&self, id: AnalysisId) -> Result<Option<AnalysisRecord>, RepositoryError>;
    /// Records matching `query`, in no particular order.
    fn recruitments(&self, query: RecruitmentQuery) -> Result<Vec<AnalysisRecord>, RepositoryError>;
}

/// Listing filter for recruitment posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecruitmentQuery {
    pub status: Option<AnalysisStatus>,
}

impl RecruitmentQuery {
    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        record.is_recruitment() && self.status.map_or(true, |status| record.status == status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
