use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::assist::{
    parse_structured, AssistClient, AssistRequest, DegradedReason, ImagePart, Outcome,
};
use super::domain::{DisplayNames, TrashInventory};

/// Final inventory plus the display labels learned while correcting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub inventory: TrashInventory,
    pub labels: DisplayNames,
}

impl Reconciliation {
    pub fn unchanged(raw: &TrashInventory) -> Self {
        Self {
            inventory: raw.clone(),
            labels: DisplayNames::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CorrectionResponse {
    items: Vec<CorrectionItem>,
}

#[derive(Debug, Deserialize)]
struct CorrectionItem {
    #[serde(default)]
    class: Option<String>,
    label: String,
    count: u32,
}

/// Merges detector counts with an AI-assisted correction pass.
///
/// Corrections may translate, add and increase but never remove or shrink; an answer that
/// tries either is discarded in favor of the raw counts.
pub struct Reconciler {
    assist: Arc<dyn AssistClient>,
}

impl Reconciler {
    pub fn new(assist: Arc<dyn AssistClient>) -> Self {
        Self { assist }
    }

    pub fn reconcile(&self, raw: &TrashInventory, image: &ImagePart) -> Outcome<Reconciliation> {
        let request = AssistRequest::with_image(correction_instructions(raw), image);

        let corrected = self
            .assist
            .generate(&request)
            .map_err(DegradedReason::from)
            .and_then(|text| parse_structured::<CorrectionResponse>(&text))
            .and_then(|response| apply_correction(raw, response).map_err(DegradedReason::Rejected));

        match corrected {
            Ok(reconciliation) => Outcome::Accepted(reconciliation),
            Err(reason) => {
                warn!(%reason, "inventory correction degraded; keeping detector counts");
                Outcome::degraded(Reconciliation::unchanged(raw), reason)
            }
        }
    }
}

fn apply_correction(
    raw: &TrashInventory,
    response: CorrectionResponse,
) -> Result<Reconciliation, String> {
    let mut inventory = TrashInventory::new();
    let mut labels = DisplayNames::new();
    let mut seen = BTreeSet::new();

    for item in response.items {
        let label = item.label.trim().to_string();
        let key = match item.class.as_deref().map(str::trim) {
            Some(class) if raw.contains(class) => class.to_string(),
            _ if label.is_empty() => return Err("new item without a label".to_string()),
            _ => label.clone(),
        };

        if !seen.insert(key.clone()) {
            return Err(format!("category '{key}' listed more than once"));
        }
        if !raw.contains(&key) && item.count == 0 {
            continue;
        }

        if !label.is_empty() && label != key {
            labels.insert(key.clone(), label);
        }
        inventory.insert(key, item.count);
    }

    if !inventory.covers(raw) {
        return Err("correction removed or reduced a detected category".to_string());
    }

    Ok(Reconciliation { inventory, labels })
}

fn correction_instructions(raw: &TrashInventory) -> String {
    let summary = serde_json::to_string(raw).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"You are a decision-support assistant for beach cleanup operations.

You receive an on-site photograph and a preliminary trash count produced by an object detector:
{summary}

Produce the final trash inventory:
- Give every category a Korean display label.
- Keep every detected category. Never remove one and never lower its count.
- You may raise a count conservatively when obvious items were missed.
- You may add a category only when it is clearly visible in the photograph.

Respond with JSON only, no explanations or markdown:
{{"items": [{{"class": "<detected class or null for a new item>", "label": "<Korean name>", "count": <integer>}}]}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::cleanup::assist::AssistError;
    use std::sync::Mutex;

    struct ScriptedAssist {
        answer: Result<String, AssistError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAssist {
        fn answering(answer: Result<&str, AssistError>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl AssistClient for ScriptedAssist {
        fn generate(&self, request: &AssistRequest<'_>) -> Result<String, AssistError> {
            assert!(request.image.is_some(), "correction always sends the image");
            self.prompts
                .lock()
                .expect("prompt mutex poisoned")
                .push(request.instructions.clone());
            self.answer.clone()
        }
    }

    fn raw() -> TrashInventory {
        [("plastic".to_string(), 2), ("can".to_string(), 1)]
            .into_iter()
            .collect()
    }

    fn image() -> ImagePart {
        ImagePart::new("image/jpeg", vec![0u8; 4])
    }

    #[test]
    fn accepts_additive_correction_with_labels() {
        let assist = ScriptedAssist::answering(Ok(r#"```json
{"items": [
  {"class": "plastic", "label": "플라스틱", "count": 3},
  {"class": "can", "label": "캔", "count": 1},
  {"class": null, "label": "밧줄", "count": 2}
]}
```"#));
        let reconciler = Reconciler::new(assist.clone());

        let outcome = reconciler.reconcile(&raw(), &image());
        assert!(!outcome.is_degraded());
        let result = outcome.into_value();
        assert_eq!(result.inventory.get("plastic"), Some(3));
        assert_eq!(result.inventory.get("can"), Some(1));
        assert_eq!(result.inventory.get("밧줄"), Some(2));
        assert_eq!(result.labels.get("plastic").map(String::as_str), Some("플라스틱"));
        assert!(!result.labels.contains_key("밧줄"));
        assert!(result.inventory.covers(&raw()));

        let prompts = assist.prompts.lock().expect("prompt mutex poisoned");
        assert!(prompts[0].contains(r#""plastic":2"#));
    }

    #[test]
    fn falls_back_when_counts_shrink() {
        let assist = ScriptedAssist::answering(Ok(
            r#"{"items": [{"class": "plastic", "label": "플라스틱", "count": 1}, {"class": "can", "label": "캔", "count": 1}]}"#,
        ));
        let outcome = Reconciler::new(assist).reconcile(&raw(), &image());
        assert!(matches!(
            outcome.reason(),
            Some(DegradedReason::Rejected(_))
        ));
        assert_eq!(outcome.into_value().inventory, raw());
    }

    #[test]
    fn falls_back_when_category_dropped() {
        let assist = ScriptedAssist::answering(Ok(
            r#"{"items": [{"class": "plastic", "label": "플라스틱", "count": 5}]}"#,
        ));
        let outcome = Reconciler::new(assist).reconcile(&raw(), &image());
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value().inventory, raw());
    }

    #[test]
    fn falls_back_on_duplicates_and_garbage() {
        let duplicate = ScriptedAssist::answering(Ok(
            r#"{"items": [{"class": "plastic", "label": "a", "count": 2}, {"class": "plastic", "label": "b", "count": 2}, {"class": "can", "label": "캔", "count": 1}]}"#,
        ));
        assert!(Reconciler::new(duplicate)
            .reconcile(&raw(), &image())
            .is_degraded());

        let garbage = ScriptedAssist::answering(Ok("I count two plastic bottles."));
        let outcome = Reconciler::new(garbage).reconcile(&raw(), &image());
        assert!(matches!(outcome.reason(), Some(DegradedReason::Rejected(_))));
    }

    #[test]
    fn unavailable_capability_keeps_raw_inventory() {
        let assist = ScriptedAssist::answering(Err(AssistError::Unavailable(
            "connection refused".to_string(),
        )));
        let outcome = Reconciler::new(assist).reconcile(&raw(), &image());
        assert_eq!(
            outcome.reason(),
            Some(&DegradedReason::Unavailable("connection refused".to_string()))
        );
        assert_eq!(outcome.into_value(), Reconciliation::unchanged(&raw()));
    }
}
