//! Field-level unification of duplicate entries

use super::merge::{merge_field_values, FieldValues};
use crate::llm::StructuredGenerator;
use crate::model::Field;
use crate::retry::RetryPolicy;
use tracing::{debug, warn};

/// Merges the field values of one drug's group members.
///
/// With a generator attached the merge is delegated to the model under a
/// strict non-fabrication contract and its answer is checked against the
/// members. Without one, or when the model fails or answers empty after
/// the retry budget, the deterministic rules in [`merge`](super::merge) apply.
#[derive(Clone)]
pub struct Unifier {
    generator: Option<StructuredGenerator>,
    retry: RetryPolicy,
}

impl Unifier {
    pub fn new(generator: StructuredGenerator, retry: RetryPolicy) -> Self {
        Self {
            generator: Some(generator),
            retry,
        }
    }

    pub fn deterministic() -> Self {
        Self {
            generator: None,
            retry: RetryPolicy::immediate(1),
        }
    }

    pub(crate) fn generator(&self) -> Option<&StructuredGenerator> {
        self.generator.as_ref()
    }

    pub(crate) fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn unify_fields(&self, drug: &str, members: &[FieldValues]) -> FieldValues {
        let fallback = merge_field_values(members);
        if members.len() < 2 {
            return fallback;
        }
        let Some(generator) = &self.generator else {
            return fallback;
        };

        let prompt = build_unify_prompt(drug, members);
        match generator
            .generate_with_retry::<FieldValues>("unify_fields", &prompt, &self.retry)
            .await
        {
            Ok(Some(unified)) => {
                debug!(drug, members = members.len(), "Unified group fields");
                fill_gaps(unified.cleaned().guarded_by(members), &fallback)
            }
            Ok(None) => {
                warn!(drug, "Unification returned nothing, using deterministic merge");
                fallback
            }
            Err(e) => {
                warn!(drug, error = %e, "Unification failed, using deterministic merge");
                fallback
            }
        }
    }
}

/// Fields the model dropped although some member stated them come from the
/// deterministic merge, which only ever draws on member values.
fn fill_gaps(mut unified: FieldValues, fallback: &FieldValues) -> FieldValues {
    if unified.coverage_for.is_none() {
        unified.coverage_for = fallback.coverage_for.clone();
    }
    if unified.route_of_administration.is_none() {
        unified.route_of_administration = fallback.route_of_administration.clone();
    }
    if unified.dose_duration.is_none() {
        unified.dose_duration = fallback.dose_duration.clone();
    }
    if unified.renal_adjustment.is_none() {
        unified.renal_adjustment = fallback.renal_adjustment.clone();
    }
    if unified.general_considerations.is_none() {
        unified.general_considerations = fallback.general_considerations.clone();
    }
    unified
}

fn build_unify_prompt(drug: &str, members: &[FieldValues]) -> String {
    let sources: Vec<String> = members
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let lines: Vec<String> = Field::ALL
                .iter()
                .map(|f| format!("- {}: {}", f.as_str(), m.get(*f).unwrap_or("null")))
                .collect();
            format!("Source {}:\n{}", i + 1, lines.join("\n"))
        })
        .collect();

    format!(
        r#"TASK: unify duplicate therapy entries for {drug}

The same antibiotic appears in {count} sources. Merge their fields into ONE record.

{sources}

Rules:
- Use ONLY values that appear in the sources above. Do not invent, infer, or complete anything from outside knowledge.
- If a field is null in ALL sources it MUST stay null.
- route_of_administration: union of the stated routes; use "IV/PO" when both IV and PO appear.
- dose_duration: choose the single most complete regimen (dose, frequency and duration together from one source). Do not stitch pieces from different sources.
- renal_adjustment: "No Renal Adjustment" only if every source says so; otherwise the most specific CrCl threshold statement.
- general_considerations: combine the distinct notes separated by semicolons, without duplicates.
- coverage_for: the most specific stated indication.
"#,
        drug = drug,
        count = members.len(),
        sources = sources.join("\n\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, MockLLMClient, MockResponse};
    use serde_json::json;
    use std::sync::Arc;

    fn members() -> Vec<FieldValues> {
        vec![
            FieldValues {
                route_of_administration: Some("IV".into()),
                dose_duration: Some("15 mg/kg,IV,q12h,7 days".into()),
                ..Default::default()
            },
            FieldValues {
                route_of_administration: Some("PO".into()),
                ..Default::default()
            },
        ]
    }

    fn unifier(mock: &Arc<MockLLMClient>) -> Unifier {
        Unifier::new(
            StructuredGenerator::new(mock.clone()),
            RetryPolicy::immediate(2),
        )
    }

    #[tokio::test]
    async fn test_deterministic_unifier() {
        let unified = Unifier::deterministic().unify_fields("Vancomycin", &members()).await;
        assert_eq!(unified.route_of_administration.as_deref(), Some("IV/PO"));
        assert_eq!(unified.dose_duration.as_deref(), Some("15 mg/kg,IV,q12h,7 days"));
    }

    #[tokio::test]
    async fn test_llm_answer_is_guarded() {
        let mock = Arc::new(MockLLMClient::new());
        mock.add_response(MockResponse::json(json!({
            "coverage_for": "MRSA bacteremia",
            "route_of_administration": "IV/PO",
            "dose_duration": "15 mg/kg,IV,q12h,7 days",
            "renal_adjustment": "CrCl < 50: extend interval",
            "general_considerations": null
        })));

        let unified = unifier(&mock).unify_fields("Vancomycin", &members()).await;

        assert_eq!(unified.route_of_administration.as_deref(), Some("IV/PO"));
        assert!(unified.coverage_for.is_none());
        assert!(unified.renal_adjustment.is_none());
        assert_eq!(mock.calls_containing("TASK: unify duplicate therapy entries"), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let mock = Arc::new(MockLLMClient::new());
        mock.add_responses([
            MockResponse::error(BackendError::TimeoutError { seconds: 1 }),
            MockResponse::text("null"),
        ]);

        let unified = unifier(&mock).unify_fields("Vancomycin", &members()).await;

        assert_eq!(unified.route_of_administration.as_deref(), Some("IV/PO"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_singleton_skips_llm() {
        let mock = Arc::new(MockLLMClient::new());
        let single = vec![members().remove(0)];

        let unified = unifier(&mock).unify_fields("Vancomycin", &single).await;

        assert_eq!(unified, single[0]);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_prompt_lists_every_source_field() {
        let prompt = build_unify_prompt("Vancomycin", &members());
        assert!(prompt.contains("Source 1:\n- coverage_for: null"));
        assert!(prompt.contains("Source 2:"));
        assert!(prompt.contains("- dose_duration: 15 mg/kg,IV,q12h,7 days"));
    }
}
