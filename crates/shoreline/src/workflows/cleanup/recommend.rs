use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::assist::{
    parse_structured, AssistClient, AssistRequest, DegradedReason, ImagePart, Outcome,
};
use super::domain::{
    DisplayNames, Recommendation, RecommendationViolation, ToolSet, TrashInventory,
};

pub const DEFAULT_PEOPLE: u32 = 5;
pub const DEFAULT_ESTIMATED_TIME_MIN: u32 = 60;
const DEFAULT_TOOLS: [&str; 3] = ["tongs", "bags", "gloves"];
const CUTTER: &str = "cutter";
/// Longest cleanup an assisted estimate may propose.
pub const MAX_ESTIMATED_TIME_MIN: u32 = 12 * 60;

/// How the pipeline derives a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationStrategy {
    /// Ask the assist capability, validate locally, fall back to the default.
    Assisted,
    /// Always use the fixed conservative default.
    Default,
}

impl RecommendationStrategy {
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assisted" | "ai" => Some(Self::Assisted),
            "default" | "fixed" => Some(Self::Default),
            _ => None,
        }
    }
}

/// Fixed fallback: five people for an hour, one of each basic tool per person, plus cutters
/// when nets or ropes were found.
pub fn default_recommendation(inventory: &TrashInventory) -> Recommendation {
    let mut tools: ToolSet = DEFAULT_TOOLS
        .iter()
        .map(|tool| (tool.to_string(), DEFAULT_PEOPLE))
        .collect();
    if inventory.has_net_or_rope() {
        tools.insert(CUTTER.to_string(), DEFAULT_PEOPLE);
    }

    Recommendation {
        people: DEFAULT_PEOPLE,
        tools,
        estimated_time_min: DEFAULT_ESTIMATED_TIME_MIN,
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecommendationPayload {
    Wrapped {
        recommended_resources: RawRecommendation,
    },
    Bare(RawRecommendation),
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    people: u32,
    tools: ToolSet,
    estimated_time_min: u32,
}

impl From<RecommendationPayload> for Recommendation {
    fn from(payload: RecommendationPayload) -> Self {
        let raw = match payload {
            RecommendationPayload::Wrapped {
                recommended_resources,
            } => recommended_resources,
            RecommendationPayload::Bare(raw) => raw,
        };
        Recommendation {
            people: raw.people,
            tools: raw.tools,
            estimated_time_min: raw.estimated_time_min,
        }
    }
}

pub struct ResourceRecommender {
    assist: Arc<dyn AssistClient>,
    strategy: RecommendationStrategy,
}

impl ResourceRecommender {
    pub fn new(assist: Arc<dyn AssistClient>, strategy: RecommendationStrategy) -> Self {
        Self { assist, strategy }
    }

    pub fn recommend(
        &self,
        inventory: &TrashInventory,
        labels: &DisplayNames,
        image: &ImagePart,
    ) -> Outcome<Recommendation> {
        if self.strategy == RecommendationStrategy::Default {
            return Outcome::Accepted(default_recommendation(inventory));
        }

        let request =
            AssistRequest::with_image(recommendation_instructions(inventory, labels), image);
        let recommended = self
            .assist
            .generate(&request)
            .map_err(DegradedReason::from)
            .and_then(|text| parse_structured::<RecommendationPayload>(&text))
            .and_then(|payload| {
                validate(Recommendation::from(payload), inventory)
                    .map_err(|violation| DegradedReason::Rejected(violation.to_string()))
            });

        match recommended {
            Ok(recommendation) => Outcome::Accepted(recommendation),
            Err(reason) => {
                warn!(%reason, "resource recommendation degraded; using default plan");
                Outcome::degraded(default_recommendation(inventory), reason)
            }
        }
    }
}

fn validate(
    recommendation: Recommendation,
    inventory: &TrashInventory,
) -> Result<Recommendation, RecommendationViolation> {
    if recommendation.people == 0 {
        return Err(RecommendationViolation::NoPeople);
    }
    if recommendation.estimated_time_min == 0
        || recommendation.estimated_time_min > MAX_ESTIMATED_TIME_MIN
    {
        return Err(RecommendationViolation::ImplausibleTime(
            recommendation.estimated_time_min,
        ));
    }
    recommendation.check(inventory)?;
    Ok(recommendation)
}

fn recommendation_instructions(inventory: &TrashInventory, labels: &DisplayNames) -> String {
    let summary = serde_json::to_string(inventory).unwrap_or_else(|_| "{}".to_string());
    let labels = serde_json::to_string(labels).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"You are a decision-support assistant for beach cleanup operations.

Final trash inventory for the attached photograph:
{summary}
Display labels for these categories:
{labels}

Recommend the cleanup resources:
- "people" is the number of volunteers needed and must be at least 1.
- The quantity of every tool must be greater than or equal to "people".
- Include "{CUTTER}" only when fishing nets, ropes or tangled material are in the inventory.
- "estimated_time_min" must be a realistic duration in minutes for typical cleanup speed.

Respond with JSON only, no explanations or markdown:
{{"people": <integer>, "tools": {{"<tool name>": <integer>}}, "estimated_time_min": <integer>}}"#
    )
}
