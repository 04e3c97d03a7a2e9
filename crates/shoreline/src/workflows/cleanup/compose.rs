use std::fmt::Write as _;
use std::sync::Arc;

use tracing::warn;

use super::assist::{AssistClient, AssistRequest, DegradedReason, Outcome};
use super::domain::{DisplayNames, EventDetails, Recommendation, RecruitmentText, TrashInventory};

const TRASH_NAMES: [(&str, &str); 4] = [
    ("plastic", "플라스틱"),
    ("can", "캔"),
    ("net", "폐그물"),
    ("glass", "유리"),
];
const TOOL_NAMES: [(&str, &str); 4] = [
    ("tongs", "집게"),
    ("bags", "마대"),
    ("gloves", "장갑"),
    ("cutter", "절단용 칼"),
];

const FALLBACK_PEOPLE: u32 = 5;
const FALLBACK_TIME_MIN: u32 = 80;

pub const RETRY_TITLE: &str = "잠시 후 다시 시도해주세요";
pub const RATE_LIMITED_MESSAGE: &str = "AI 사용량이 초과되었습니다. 1분 뒤에 다시 시도해주세요!";
/// Prefix of the degraded body; the failure detail follows after a colon.
pub const DEGRADED_PREFIX: &str = "서비스 점검 중입니다";

/// How recruitment content is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecruitmentStrategy {
    Assisted,
    Template,
}

impl RecruitmentStrategy {
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assisted" | "ai" => Some(Self::Assisted),
            "template" => Some(Self::Template),
            _ => None,
        }
    }
}

/// Everything a recruitment post is written from.
#[derive(Debug, Clone, Copy)]
pub struct CompositionFacts<'a> {
    pub inventory: &'a TrashInventory,
    pub labels: &'a DisplayNames,
    pub recommendation: &'a Recommendation,
    pub location: Option<&'a str>,
    pub event: &'a EventDetails,
}

impl CompositionFacts<'_> {
    pub fn display_name<'n>(&'n self, category: &'n str) -> &'n str {
        if let Some(label) = self.labels.get(category) {
            return label;
        }
        lookup(&TRASH_NAMES, category).unwrap_or(category)
    }

    fn trash_text(&self) -> String {
        if self.inventory.is_empty() {
            return "쓰레기".to_string();
        }
        self.inventory
            .categories()
            .map(|category| self.display_name(category))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn tools_text(&self) -> String {
        if self.recommendation.tools.is_empty() {
            return "기본 정화 도구".to_string();
        }
        self.recommendation
            .tools
            .keys()
            .map(|tool| lookup(&TOOL_NAMES, tool).unwrap_or(tool))
            .collect::<Vec<_>>()
            .join("·")
    }

    fn location(&self) -> &str {
        self.location
            .map(str::trim)
            .filter(|location| !location.is_empty())
            .unwrap_or("해당 구역")
    }

    fn people(&self) -> u32 {
        match self.recommendation.people {
            0 => FALLBACK_PEOPLE,
            people => people,
        }
    }

    fn time_min(&self) -> u32 {
        match self.recommendation.estimated_time_min {
            0 => FALLBACK_TIME_MIN,
            minutes => minutes,
        }
    }
}

fn lookup<'t>(table: &'t [(&'static str, &'static str)], key: &str) -> Option<&'t str> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, label)| *label)
}

pub struct RecruitmentComposer {
    assist: Arc<dyn AssistClient>,
    strategy: RecruitmentStrategy,
}

impl RecruitmentComposer {
    pub fn new(assist: Arc<dyn AssistClient>, strategy: RecruitmentStrategy) -> Self {
        Self { assist, strategy }
    }

    /// Always yields a title/content pair; capability failures become user-facing messages.
    pub fn compose(&self, facts: &CompositionFacts<'_>) -> Outcome<RecruitmentText> {
        let title = title_for(facts);

        let body = match self.strategy {
            RecruitmentStrategy::Template => Ok(template_body(facts)),
            RecruitmentStrategy::Assisted => {
                let request = AssistRequest::text(composition_instructions(facts));
                self.assist
                    .generate(&request)
                    .map(|text| text.trim().to_string())
                    .map_err(DegradedReason::from)
                    .and_then(|text| {
                        if text.is_empty() {
                            Err(DegradedReason::Unavailable("empty composition".to_string()))
                        } else {
                            Ok(text)
                        }
                    })
            }
        };

        match body {
            Ok(mut content) => {
                if let Some(note) = facts.event.note() {
                    write!(content, "\n\n※ {note}").ok();
                }
                Outcome::Accepted(RecruitmentText { title, content })
            }
            Err(reason) => {
                warn!(%reason, "recruitment composition degraded");
                let content = match reason {
                    DegradedReason::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
                    DegradedReason::Unavailable(_) | DegradedReason::Rejected(_) => {
                        format!("{DEGRADED_PREFIX}: {reason}")
                    }
                };
                Outcome::degraded(
                    RecruitmentText {
                        title: RETRY_TITLE.to_string(),
                        content,
                    },
                    reason,
                )
            }
        }
    }
}

fn title_for(facts: &CompositionFacts<'_>) -> String {
    let tag = facts.event.meeting_tag().unwrap_or_else(|| facts.location());
    format!("[자원봉사 모집] {tag} 환경 정화 활동")
}

fn template_body(facts: &CompositionFacts<'_>) -> String {
    let mut content = String::new();
    write!(
        content,
        "{}에서 {} 쓰레기가 다수 발견되었습니다.\n\n",
        facts.location(),
        facts.trash_text()
    )
    .ok();
    write!(
        content,
        "현재 분석 결과 기준으로 약 {}명의 봉사 인원이 필요하며, {}이 제공될 예정입니다.\n\n",
        facts.people(),
        facts.tools_text()
    )
    .ok();
    write!(
        content,
        "예상 소요 시간은 약 {}분이며, 안전한 환경 정화를 위해 많은 참여 부탁드립니다.\n\n",
        facts.time_min()
    )
    .ok();
    write!(
        content,
        "활동 일시: {}\n집결 장소: {}",
        facts.event.activity_date.trim(),
        facts.event.meeting_place.trim()
    )
    .ok();
    content
}

fn composition_instructions(facts: &CompositionFacts<'_>) -> String {
    let inventory = facts
        .inventory
        .iter()
        .map(|(category, count)| format!("{} {count}개", facts.display_name(category)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Write a short, energetic Korean social-media post (about 150 characters) recruiting \
         volunteers for a beach cleanup. Mix in a few emoji and put a blank line after every \
         sentence. Do not invent facts.\n\n\
         Location: {location}\n\
         Trash found: {inventory}\n\
         Volunteers needed: {people}\n\
         Tools provided: {tools}\n\
         Expected duration: {time} minutes\n\
         Activity date: {date}\n\
         Meeting place: {place}",
        location = facts.location(),
        inventory = if inventory.is_empty() { facts.trash_text() } else { inventory },
        people = facts.people(),
        tools = facts.tools_text(),
        time = facts.time_min(),
        date = facts.event.activity_date.trim(),
        place = facts.event.meeting_place.trim(),
    )
}
