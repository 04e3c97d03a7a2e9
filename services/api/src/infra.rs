use metrics_exporter_prometheus::PrometheusHandle;
use shoreline::config::{AppConfig, AssistConfig, DetectorConfig};
use shoreline::workflows::cleanup::lifecycle::{NewAnalysis, RecruitmentQuery, TransitionError};
use shoreline::workflows::cleanup::{
    AnalysisId, AnalysisRecord, AnalysisRepository, AssistClient, CleanupService, Detector,
    FixtureLoader, HttpAssistClient, LocalBlobStore, OfflineAssist, RepositoryError,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type AppService = CleanupService<InMemoryAnalysisRepository, LocalBlobStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAnalysisRepository {
    next_id: Arc<AtomicU64>,
    records: Arc<Mutex<BTreeMap<AnalysisId, AnalysisRecord>>>,
}

impl AnalysisRepository for InMemoryAnalysisRepository {
    fn insert(&self, analysis: NewAnalysis) -> Result<AnalysisRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let id = AnalysisId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = analysis.into_record(id);
        guard.insert(id, record.clone());
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

pub(crate) fn detector(config: &DetectorConfig) -> Arc<Detector> {
    let loader = FixtureLoader::new(config.fixture.clone());
    Arc::new(Detector::new(loader, config.confidence))
}

pub(crate) fn assist_client(config: &AssistConfig) -> Arc<dyn AssistClient> {
    match &config.endpoint {
        Some(endpoint) => {
            info!(%endpoint, "using remote assist gateway");
            Arc::new(HttpAssistClient::new(endpoint.clone(), config.api_key.clone()))
        }
        None => {
            info!("no assist endpoint configured; corrections and compositions will degrade");
            Arc::new(OfflineAssist)
        }
    }
}

pub(crate) fn build_service(
    config: &AppConfig,
    detector: Arc<Detector>,
    repository: Arc<InMemoryAnalysisRepository>,
) -> AppService {
    CleanupService::new(
        detector,
        assist_client(&config.assist),
        config.pipeline,
        repository,
        Arc::new(LocalBlobStore::new(config.storage.upload_dir.clone())),
    )
}
