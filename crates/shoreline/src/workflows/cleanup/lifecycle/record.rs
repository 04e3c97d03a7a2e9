use serde::{Deserialize, Serialize};

use crate::workflows::cleanup::domain::{
    AnalysisId, AnalysisStatus, BlobRef, DisplayNames, EventDetails, Recommendation,
    RecruitmentText, Timestamp, ToolSet, TrashInventory,
};

/// Generated recruitment fields. Only ever stored or replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitmentContent {
    pub title: String,
    pub content: String,
    pub activity_date: String,
    pub meeting_place: String,
}

impl RecruitmentContent {
    pub fn new(text: RecruitmentText, event: &EventDetails) -> Self {
        Self {
            title: text.title,
            content: text.content,
            activity_date: event.activity_date.trim().to_string(),
            meeting_place: event.meeting_place.trim().to_string(),
        }
    }
}

/// Fields of an analysis before the repository assigns its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnalysis {
    pub image: BlobRef,
    pub original_image: BlobRef,
    pub image_name: String,
    pub location: Option<String>,
    pub trash_summary: TrashInventory,
    pub display_names: DisplayNames,
    pub recommendation: Recommendation,
    pub created_at: Timestamp,
}

impl NewAnalysis {
    pub fn into_record(self, id: AnalysisId) -> AnalysisRecord {
        AnalysisRecord {
            id,
            image: self.image,
            original_image: self.original_image,
            image_name: self.image_name,
            location: self.location,
            trash_summary: self.trash_summary,
            display_names: self.display_names,
            required_people: self.recommendation.people,
            estimated_time_min: self.recommendation.estimated_time_min,
            tools: self.recommendation.tools,
            recruitment: None,
            published_at: None,
            created_at: self.created_at,
            status: AnalysisStatus::Analyzed,
        }
    }
}

/// Persisted analysis plus its optional recruitment post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    /// Annotated rendering, or the upload itself when annotation failed.
    pub image: BlobRef,
    pub original_image: BlobRef,
    pub image_name: String,
    pub location: Option<String>,
    pub trash_summary: TrashInventory,
    pub display_names: DisplayNames,
    pub required_people: u32,
    pub estimated_time_min: u32,
    pub tools: ToolSet,
    pub recruitment: Option<RecruitmentContent>,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub status: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    AttachContent,
    Publish,
}

impl LifecycleAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AttachContent => "accept recruitment content",
            Self::Publish => "be published",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("record in status '{status}' cannot {}", action.label())]
pub struct TransitionError {
    pub status: AnalysisStatus,
    pub action: LifecycleAction,
}

impl AnalysisRecord {
    pub fn recommendation(&self) -> Recommendation {
        Recommendation {
            people: self.required_people,
            tools: self.tools.clone(),
            estimated_time_min: self.estimated_time_min,
        }
    }

    /// Listed as a recruitment only once generated content exists.
    pub fn is_recruitment(&self) -> bool {
        self.recruitment.is_some()
    }

    pub fn title(&self) -> Option<&str> {
        self.recruitment.as_ref().map(|content| content.title.as_str())
    }

    /// Replace all generated fields; status is left untouched.
    pub fn attach_recruitment(&mut self, content: RecruitmentContent) -> Result<(), TransitionError> {
        if !self.status.accepts_content() {
            return Err(TransitionError {
                status: self.status,
                action: LifecycleAction::AttachContent,
            });
        }
        self.recruitment = Some(content);
        Ok(())
    }

    /// Mark as publicly listed. Re-publishing refreshes the timestamp.
    pub fn publish(&mut self, at: Timestamp) -> Result<(), TransitionError> {
        if !self.status.can_publish() {
            return Err(TransitionError {
                status: self.status,
                action: LifecycleAction::Publish,
            });
        }
        self.status = AnalysisStatus::Uploaded;
        self.published_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record() -> AnalysisRecord {
        NewAnalysis {
            image: BlobRef("2025-07-01/a.png".to_string()),
            original_image: BlobRef("2025-07-01/a.jpg".to_string()),
            image_name: "beach.jpg".to_string(),
            location: Some("송정".to_string()),
            trash_summary: [("can".to_string(), 2)].into_iter().collect(),
            display_names: DisplayNames::new(),
            recommendation: Recommendation {
                people: 3,
                tools: [("tongs".to_string(), 3)].into_iter().collect(),
                estimated_time_min: 40,
            },
            created_at: Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
        }
        .into_record(AnalysisId(1))
    }

    fn content(title: &str) -> RecruitmentContent {
        RecruitmentContent {
            title: title.to_string(),
            content: "body".to_string(),
            activity_date: "2025-07-05".to_string(),
            meeting_place: "송정 해변".to_string(),
        }
    }

    #[test]
    fn new_records_start_analyzed_without_content() {
        let record = record();
        assert_eq!(record.status, AnalysisStatus::Analyzed);
        assert!(!record.is_recruitment());
        assert_eq!(record.recommendation().people, 3);
    }

    #[test]
    fn attaching_content_keeps_status() {
        let mut record = record();
        record.attach_recruitment(content("first")).expect("analyzed accepts content");
        assert_eq!(record.status, AnalysisStatus::Analyzed);
        assert_eq!(record.title(), Some("first"));

        record.publish(Utc::now()).expect("publishes");
        record.attach_recruitment(content("second")).expect("uploaded accepts content");
        assert_eq!(record.status, AnalysisStatus::Uploaded);
        assert_eq!(record.title(), Some("second"));
    }

    #[test]
    fn republishing_refreshes_timestamp() {
        let mut record = record();
        let first = Utc.with_ymd_and_hms(2025, 7, 2, 8, 0, 0).unwrap();
        let second = first + Duration::minutes(5);

        record.publish(first).expect("first publish");
        record.publish(second).expect("second publish");
        assert_eq!(record.status, AnalysisStatus::Uploaded);
        assert_eq!(record.published_at, Some(second));
    }

    #[test]
    fn expired_records_reject_transitions() {
        let mut record = record();
        record.status = AnalysisStatus::Expired;

        let err = record.publish(Utc::now()).expect_err("expired cannot publish");
        assert_eq!(err.action, LifecycleAction::Publish);
        assert!(record.published_at.is_none());

        let err = record
            .attach_recruitment(content("late"))
            .expect_err("expired rejects content");
        assert_eq!(err.to_string(), "record in status 'expired' cannot accept recruitment content");
        assert!(record.recruitment.is_none());
    }
}
