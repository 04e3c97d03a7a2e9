use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a stored analysis by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub u64);

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Corner coordinates `[x1, y1, x2, y2]` in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [f32; 4]);

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self([x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)])
    }

    pub fn x1(&self) -> f32 {
        self.0[0]
    }

    pub fn y1(&self) -> f32 {
        self.0[1]
    }

    pub fn x2(&self) -> f32 {
        self.0[2]
    }

    pub fn y2(&self) -> f32 {
        self.0[3]
    }
}

/// One object reported by the detection backend. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Category name to observed count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrashInventory(BTreeMap<String, u32>);

impl TrashInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiset count of detections grouped by class name.
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut inventory = Self::new();
        for detection in detections {
            inventory.add(&detection.class_name, 1);
        }
        inventory
    }

    pub fn add(&mut self, category: &str, count: u32) {
        let entry = self.0.entry(category.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn insert(&mut self, category: impl Into<String>, count: u32) -> Option<u32> {
        self.0.insert(category.into(), count)
    }

    pub fn get(&self, category: &str) -> Option<u32> {
        self.0.get(category).copied()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.contains_key(category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|count| u64::from(*count)).sum()
    }

    /// True when every category of `baseline` is present here with at least the same count.
    pub fn covers(&self, baseline: &TrashInventory) -> bool {
        baseline
            .iter()
            .all(|(category, count)| self.get(category).is_some_and(|kept| kept >= count))
    }

    pub fn has_net_or_rope(&self) -> bool {
        self.categories().any(is_net_or_rope)
    }
}

impl FromIterator<(String, u32)> for TrashInventory {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Display-language labels keyed by inventory category.
pub type DisplayNames = BTreeMap<String, String>;

/// Tool name to quantity.
pub type ToolSet = BTreeMap<String, u32>;

const NET_TOKENS: [&str; 5] = ["net", "nets", "rope", "ropes", "fishnet"];
const NET_FRAGMENTS: [&str; 4] = ["그물", "로프", "밧줄", "어망"];
const CUTTER_TOKENS: [&str; 6] = ["cutter", "cutters", "knife", "knives", "scissors", "shears"];
const CUTTER_FRAGMENTS: [&str; 4] = ["커터", "칼", "가위", "절단"];

fn matches_keywords(name: &str, tokens: &[&str], fragments: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| tokens.contains(&token))
        || fragments.iter().any(|fragment| lowered.contains(fragment))
}

/// Fishing nets, ropes and similar tangled material.
pub fn is_net_or_rope(category: &str) -> bool {
    matches_keywords(category, &NET_TOKENS, &NET_FRAGMENTS)
}

pub fn is_cutting_tool(tool: &str) -> bool {
    matches_keywords(tool, &CUTTER_TOKENS, &CUTTER_FRAGMENTS)
}

/// Workforce, tool and time budget for one cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub people: u32,
    pub tools: ToolSet,
    pub estimated_time_min: u32,
}

impl Recommendation {
    /// Checks the tool invariants against the inventory the recommendation was made for.
    pub fn check(&self, inventory: &TrashInventory) -> Result<(), RecommendationViolation> {
        if let Some((tool, quantity)) = self
            .tools
            .iter()
            .find(|(_, quantity)| **quantity < self.people)
        {
            return Err(RecommendationViolation::ToolBelowPeople {
                tool: tool.clone(),
                quantity: *quantity,
                people: self.people,
            });
        }

        if !inventory.has_net_or_rope() {
            if let Some((tool, _)) = self
                .tools
                .iter()
                .find(|(tool, quantity)| **quantity > 0 && is_cutting_tool(tool))
            {
                return Err(RecommendationViolation::CutterWithoutNet { tool: tool.clone() });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendationViolation {
    #[error("tool '{tool}' has {quantity}, fewer than the {people} people required")]
    ToolBelowPeople {
        tool: String,
        quantity: u32,
        people: u32,
    },
    #[error("cutting tool '{tool}' requested but no net or rope was found")]
    CutterWithoutNet { tool: String },
    #[error("recommendation requires at least one person")]
    NoPeople,
    #[error("estimated time of {0} minutes is not plausible")]
    ImplausibleTime(u32),
}

/// Lifecycle of a stored analysis and its recruitment post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Analyzed,
    Uploaded,
    /// Terminal. Nothing transitions into it yet; records may arrive here from storage.
    Expired,
}

impl AnalysisStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Analyzed => "analyzed",
            Self::Uploaded => "uploaded",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "analyzed" => Some(Self::Analyzed),
            "uploaded" => Some(Self::Uploaded),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub const fn accepts_content(self) -> bool {
        match self {
            Self::Analyzed | Self::Uploaded => true,
            Self::Expired => false,
        }
    }

    pub const fn can_publish(self) -> bool {
        match self {
            Self::Analyzed | Self::Uploaded => true,
            Self::Expired => false,
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Organizer supplied details for the cleanup event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub activity_date: String,
    pub meeting_place: String,
    #[serde(default)]
    pub additional_note: Option<String>,
}

impl EventDetails {
    /// First whitespace-delimited token of the meeting place.
    pub fn meeting_tag(&self) -> Option<&str> {
        self.meeting_place.split_whitespace().next()
    }

    pub fn note(&self) -> Option<&str> {
        self.additional_note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
    }
}

/// Human readable recruitment post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitmentText {
    pub title: String,
    pub content: String,
}

/// Reference to an image held by the blob store, relative to its base directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn public_url(&self) -> String {
        format!("/uploads/{}", self.0.trim_start_matches('/'))
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

pub type Timestamp = DateTime<Utc>;
