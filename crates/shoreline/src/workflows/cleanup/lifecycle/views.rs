use serde::Serialize;

use super::record::AnalysisRecord;
use crate::workflows::cleanup::domain::{
    AnalysisId, AnalysisStatus, DisplayNames, EventDetails, RecruitmentText, Timestamp, ToolSet,
    TrashInventory,
};

const AREA_TYPE: &str = "beach";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendedResources {
    pub people: u32,
    pub tools: ToolSet,
    pub estimated_time_min: u32,
}

impl RecommendedResources {
    fn of(record: &AnalysisRecord) -> Self {
        Self {
            people: record.required_people,
            tools: record.tools.clone(),
            estimated_time_min: record.estimated_time_min,
        }
    }
}

/// Response body for a fresh upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummaryView {
    pub analysis_id: AnalysisId,
    pub image_name: String,
    pub image_url: String,
    pub trash_summary: TrashInventory,
    pub display_names: DisplayNames,
    pub recommended_resources: RecommendedResources,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisDetailView {
    pub analysis_id: AnalysisId,
    pub image_url: String,
    pub original_image_url: String,
    pub location: Option<String>,
    pub area_type: &'static str,
    pub trash_summary: TrashInventory,
    pub display_names: DisplayNames,
    pub recommended_resources: RecommendedResources,
    pub status: AnalysisStatus,
    pub created_at: Timestamp,
}

/// Composition result; `degraded` marks a placeholder that was not saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitmentDraftView {
    pub analysis_id: AnalysisId,
    pub title: String,
    pub content: String,
    pub required_people: u32,
    pub recommended_tools: ToolSet,
    pub activity_date: String,
    pub meeting_place: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitmentListItem {
    pub id: AnalysisId,
    pub title: String,
    pub location: Option<String>,
    pub required_people: u32,
    pub estimated_time_min: u32,
    pub activity_date: String,
    pub status: AnalysisStatus,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitmentListView {
    pub recruitments: Vec<RecruitmentListItem>,
}

/// Content fields stay empty for a record published before anything was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitmentDetailView {
    pub id: AnalysisId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub image_url: String,
    pub trash_summary: TrashInventory,
    pub required_people: u32,
    pub recommended_tools: ToolSet,
    pub estimated_time_min: u32,
    pub activity_date: Option<String>,
    pub meeting_place: Option<String>,
    pub status: AnalysisStatus,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl AnalysisRecord {
    pub fn summary_view(&self) -> AnalysisSummaryView {
        AnalysisSummaryView {
            analysis_id: self.id,
            image_name: self.image_name.clone(),
            image_url: self.image.public_url(),
            trash_summary: self.trash_summary.clone(),
            display_names: self.display_names.clone(),
            recommended_resources: RecommendedResources::of(self),
            created_at: self.created_at,
        }
    }

    pub fn detail_view(&self) -> AnalysisDetailView {
        AnalysisDetailView {
            analysis_id: self.id,
            image_url: self.image.public_url(),
            original_image_url: self.original_image.public_url(),
            location: self.location.clone(),
            area_type: AREA_TYPE,
            trash_summary: self.trash_summary.clone(),
            display_names: self.display_names.clone(),
            recommended_resources: RecommendedResources::of(self),
            status: self.status,
            created_at: self.created_at,
        }
    }

    pub fn draft_view(
        &self,
        text: &RecruitmentText,
        event: &EventDetails,
        degraded: bool,
    ) -> RecruitmentDraftView {
        RecruitmentDraftView {
            analysis_id: self.id,
            title: text.title.clone(),
            content: text.content.clone(),
            required_people: self.required_people,
            recommended_tools: self.tools.clone(),
            activity_date: event.activity_date.trim().to_string(),
            meeting_place: event.meeting_place.trim().to_string(),
            degraded,
        }
    }

    /// `None` until recruitment content has been generated.
    pub fn list_item(&self) -> Option<RecruitmentListItem> {
        let content = self.recruitment.as_ref()?;
        Some(RecruitmentListItem {
            id: self.id,
            title: content.title.clone(),
            location: self.location.clone(),
            required_people: self.required_people,
            estimated_time_min: self.estimated_time_min,
            activity_date: content.activity_date.clone(),
            status: self.status,
            created_at: self.created_at,
        })
    }

    pub fn recruitment_view(&self) -> RecruitmentDetailView {
        let content = self.recruitment.as_ref();
        RecruitmentDetailView {
            id: self.id,
            title: content.map(|content| content.title.clone()),
            content: content.map(|content| content.content.clone()),
            location: self.location.clone(),
            image_url: self.image.public_url(),
            trash_summary: self.trash_summary.clone(),
            required_people: self.required_people,
            recommended_tools: self.tools.clone(),
            estimated_time_min: self.estimated_time_min,
            activity_date: content.map(|content| content.activity_date.clone()),
            meeting_place: content.map(|content| content.meeting_place.clone()),
            status: self.status,
            published_at: self.published_at,
            created_at: self.created_at,
        }
    }
}
