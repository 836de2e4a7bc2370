//! Enrichment of incomplete plan entries from an external reference site
//!
//! First- and second-choice entries are enriched unconditionally and removed
//! when no usable data comes back. Alternative entries are quota-bounded:
//! complete ones are kept up to the target, all incomplete ones are scraped,
//! and only the `target - complete` cheapest by estimated chunk count are
//! processed. The others are reported as over quota. An alternative that
//! fails processing is removed and its slot is not refilled.

mod chunking;
mod fields;
mod mock;
mod reference;
mod session;

pub use chunking::{chunk_text, estimate_chunks, estimate_tokens, tail, ChunkConfig, CHARS_PER_TOKEN};
pub use fields::{duration_days, FieldAccumulator, DEFAULT_CONSIDERATIONS_CAP, DEFAULT_SAFETY_NOTE};
pub use mock::{ScriptedPage, ScriptedSessionFactory};
pub use reference::{
    validate_reference, ReferenceSite, ScrapedPage, DEFAULT_REFERENCE_DOMAIN,
    DEFAULT_SEARCH_ENGINE_URL,
};
pub use session::{
    collapse_whitespace, html_to_text, visible_text, BrowserSession,
    HttpSession, HttpSessionFactory, SessionError, SessionFactory,
};

use crate::llm::StructuredGenerator;
use crate::model::{Field, InputParameters, TherapyPlan, Tier, UnifiedEntry};
use crate::progress::{Stage, StageReporter};
use crate::retry::RetryPolicy;
use crate::synthesis::{FieldValues, NO_RENAL_ADJUSTMENT};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_ENRICH_WORKERS: usize = 3;
pub const DEFAULT_ALTERNATIVE_TARGET: usize = 5;

/// Characters of the previous chunk carried into the next prompt.
const CARRY_OVER_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub workers: usize,
    pub alternative_target: usize,
    pub chunk: ChunkConfig,
    pub considerations_cap: usize,
    pub reference: ReferenceSite,
    pub retry: RetryPolicy,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_ENRICH_WORKERS,
            alternative_target: DEFAULT_ALTERNATIVE_TARGET,
            chunk: ChunkConfig::default(),
            considerations_cap: DEFAULT_CONSIDERATIONS_CAP,
            reference: ReferenceSite::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to each entry the engine looked at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub enriched: Vec<String>,
    pub removed: Vec<String>,
    pub over_quota: Vec<String>,
}

pub struct EnrichmentEngine {
    generator: StructuredGenerator,
    sessions: Arc<dyn SessionFactory>,
    config: EnrichmentConfig,
}

impl EnrichmentEngine {
    pub fn new(
        generator: StructuredGenerator,
        sessions: Arc<dyn SessionFactory>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            generator,
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub async fn enrich(
        &self,
        plan: &mut TherapyPlan,
        input: &InputParameters,
        progress: &StageReporter,
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();

        let mandatory_total: usize = [Tier::FirstChoice, Tier::SecondChoice]
            .iter()
            .map(|t| plan.tier(*t).iter().filter(|e| !e.is_complete).count())
            .sum();
        info!(
            mandatory = mandatory_total,
            alternatives = plan.alternative_antibiotic.len(),
            target = self.config.alternative_target,
            "Starting enrichment"
        );

        let mut done = 0usize;
        for tier in [Tier::FirstChoice, Tier::SecondChoice] {
            let entries = std::mem::take(plan.tier_mut(tier));
            *plan.tier_mut(tier) = self
                .enrich_mandatory(entries, input, progress, &mut done, mandatory_total, &mut report)
                .await;
        }
        progress.report(Stage::Enrich, 50.0, "Mandatory tiers enriched");

        let alternatives = std::mem::take(&mut plan.alternative_antibiotic);
        plan.alternative_antibiotic = self
            .enrich_alternatives(alternatives, input, progress, &mut report)
            .await;

        for entry in plan
            .first_choice
            .iter_mut()
            .chain(plan.second_choice.iter_mut())
            .chain(plan.alternative_antibiotic.iter_mut())
        {
            apply_soft_defaults(entry);
        }
        report.removed.extend(plan.enforce_integrity());

        progress.report(Stage::Enrich, 100.0, "Enrichment complete");
        info!(
            enriched = report.enriched.len(),
            removed = report.removed.len(),
            over_quota = report.over_quota.len(),
            "Enrichment finished"
        );
        report
    }

    async fn enrich_mandatory(
        &self,
        entries: Vec<UnifiedEntry>,
        input: &InputParameters,
        progress: &StageReporter,
        done: &mut usize,
        total: usize,
        report: &mut EnrichmentReport,
    ) -> Vec<UnifiedEntry> {
        let (complete, incomplete): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .enumerate()
            .partition(|(_, e)| e.is_complete);

        let mut results: Vec<(usize, UnifiedEntry, Option<UnifiedEntry>)> = stream::iter(incomplete)
            .map(|(idx, entry)| async move {
                let enriched = self.enrich_entry(entry.clone(), input).await;
                (idx, entry, enriched)
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut kept: Vec<(usize, UnifiedEntry)> = complete;
        results.sort_by_key(|(idx, _, _)| *idx);
        for (idx, original, enriched) in results {
            *done += 1;
            progress.report(
                Stage::Enrich,
                50.0 * *done as f32 / total.max(1) as f32,
                format!("Enriched {}", original.medical_name),
            );
            match enriched {
                Some(entry) => {
                    report.enriched.push(entry.medical_name.clone());
                    kept.push((idx, entry));
                }
                None => {
                    warn!(drug = %original.medical_name, tier = %original.final_category, "No usable reference data, removing entry");
                    report.removed.push(original.medical_name);
                }
            }
        }

        kept.sort_by_key(|(idx, _)| *idx);
        kept.into_iter().map(|(_, e)| e).collect()
    }

    async fn enrich_alternatives(
        &self,
        entries: Vec<UnifiedEntry>,
        input: &InputParameters,
        progress: &StageReporter,
        report: &mut EnrichmentReport,
    ) -> Vec<UnifiedEntry> {
        let target = self.config.alternative_target;
        let (complete, incomplete): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .enumerate()
            .partition(|(_, e)| e.is_complete);

        let mut kept: Vec<(usize, UnifiedEntry)> = Vec::new();
        for (idx, entry) in complete {
            if kept.len() < target {
                kept.push((idx, entry));
            } else {
                report.over_quota.push(entry.medical_name);
            }
        }

        let needed = target.saturating_sub(kept.len());
        debug!(complete = kept.len(), incomplete = incomplete.len(), needed, "Alternative quota");

        if needed == 0 {
            report
                .over_quota
                .extend(incomplete.into_iter().map(|(_, e)| e.medical_name));
        } else if !incomplete.is_empty() {
            let mut scraped: Vec<(usize, UnifiedEntry, ScrapedPage, usize)> = Vec::new();
            let pages: Vec<(usize, UnifiedEntry, Option<ScrapedPage>)> = stream::iter(incomplete)
                .map(|(idx, entry)| async move {
                    let page = self.fetch_page(&entry.medical_name).await;
                    (idx, entry, page)
                })
                .buffer_unordered(self.config.workers.max(1))
                .collect()
                .await;

            for (idx, entry, page) in pages {
                match page {
                    Some(page) => {
                        let chunks = estimate_chunks(&page.text, &self.config.chunk);
                        scraped.push((idx, entry, page, chunks));
                    }
                    None => report.removed.push(entry.medical_name),
                }
            }
            progress.report(Stage::Enrich, 75.0, format!("Scraped {} alternatives", scraped.len()));

            scraped.sort_by(|a, b| a.3.cmp(&b.3).then_with(|| a.1.medical_name.cmp(&b.1.medical_name)));
            let overflow = scraped.split_off(needed.min(scraped.len()));
            for (_, entry, _, chunks) in overflow {
                debug!(drug = %entry.medical_name, chunks, "Alternative outside quota");
                report.over_quota.push(entry.medical_name);
            }

            let selected: Vec<(usize, UnifiedEntry, Option<UnifiedEntry>)> = stream::iter(scraped)
                .map(|(idx, entry, page, chunks)| async move {
                    info!(drug = %entry.medical_name, chunks, "Processing alternative");
                    let enriched = self.apply_page(entry.clone(), &page, input).await;
                    (idx, entry, enriched)
                })
                .buffer_unordered(self.config.workers.max(1))
                .collect()
                .await;

            for (idx, original, enriched) in selected {
                match enriched {
                    Some(entry) => {
                        report.enriched.push(entry.medical_name.clone());
                        kept.push((idx, entry));
                    }
                    None => report.removed.push(original.medical_name),
                }
            }
        }

        kept.sort_by_key(|(idx, _)| *idx);
        kept.into_iter().map(|(_, e)| e).collect()
    }

    /// Fetch, validate, extract and merge for one entry. `None` when nothing usable came back.
    pub async fn enrich_entry(&self, entry: UnifiedEntry, input: &InputParameters) -> Option<UnifiedEntry> {
        let page = self.fetch_page(&entry.medical_name).await?;
        self.apply_page(entry, &page, input).await
    }

    async fn apply_page(
        &self,
        mut entry: UnifiedEntry,
        page: &ScrapedPage,
        input: &InputParameters,
    ) -> Option<UnifiedEntry> {
        let values = self.extract_missing(&entry, page, input).await?;
        for field in entry.missing_fields() {
            if let Some(value) = values.get(field) {
                entry.set(field, Some(value.to_string()));
            }
        }
        apply_soft_defaults(&mut entry);
        debug!(
            drug = %entry.medical_name,
            complete = entry.is_complete,
            missing = ?entry.missing_fields(),
            "Applied reference data"
        );
        Some(entry)
    }

    /// Locates, scrapes and validates the reference page in a session of its own.
    pub async fn fetch_page(&self, drug: &str) -> Option<ScrapedPage> {
        let mut session = match self.sessions.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(drug, error = %e, "Could not open session");
                return None;
            }
        };
        let outcome = self.fetch_with(session.as_mut(), drug).await;
        session.close().await;

        match outcome {
            Ok(Some(page)) => {
                if validate_reference(&self.generator, drug, page.title.as_deref()).await {
                    Some(page)
                } else {
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(drug, error = %e, "Reference scrape failed");
                None
            }
        }
    }

    async fn fetch_with(
        &self,
        session: &mut dyn BrowserSession,
        drug: &str,
    ) -> Result<Option<ScrapedPage>, SessionError> {
        let reference = &self.config.reference;
        let Some(url) = reference.find_reference(session, drug, &self.config.retry).await? else {
            return Ok(None);
        };
        let page = reference.scrape(session, &url, &self.config.retry).await?;
        if page.text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Chunk-by-chunk extraction of the entry's missing fields.
    async fn extract_missing(
        &self,
        entry: &UnifiedEntry,
        page: &ScrapedPage,
        input: &InputParameters,
    ) -> Option<FieldValues> {
        let missing = entry.missing_fields();
        if missing.is_empty() {
            return Some(FieldValues::from_entry(entry));
        }

        let chunks = chunk_text(&page.text, &self.config.chunk);
        let mut acc = FieldAccumulator::new(missing, self.config.considerations_cap);

        for (i, chunk) in chunks.iter().enumerate() {
            let request = acc.to_request();
            if request.is_empty() {
                break;
            }
            let previous_tail = i
                .checked_sub(1)
                .map(|p| tail(&chunks[p], CARRY_OVER_CHARS))
                .unwrap_or("");
            let prompt = build_chunk_prompt(
                &entry.medical_name,
                input,
                &request,
                &acc.summary(),
                previous_tail,
                chunk,
                i + 1,
                chunks.len(),
            );

            match self
                .generator
                .generate_with_retry::<FieldValues>("enrich_chunk", &prompt, &self.config.retry)
                .await
            {
                Ok(Some(values)) => acc.absorb(values),
                Ok(None) => debug!(drug = %entry.medical_name, chunk = i + 1, "Chunk yielded nothing"),
                Err(e) => warn!(drug = %entry.medical_name, chunk = i + 1, error = %e, "Chunk extraction failed"),
            }
        }

        acc.found_any().then(|| acc.into_values())
    }
}

/// Fills renal adjustment and considerations when still empty. The mandatory
/// fields are never defaulted.
pub fn apply_soft_defaults(entry: &mut UnifiedEntry) {
    if entry.renal_adjustment.is_none() {
        entry.renal_adjustment = Some(NO_RENAL_ADJUSTMENT.to_string());
    }
    if entry.general_considerations.is_none() {
        entry.general_considerations = Some(DEFAULT_SAFETY_NOTE.to_string());
    }
    entry.refresh_completeness();
}

#[allow(clippy::too_many_arguments)]
fn build_chunk_prompt(
    drug: &str,
    input: &InputParameters,
    request: &[Field],
    summary: &str,
    previous_tail: &str,
    chunk: &str,
    index: usize,
    total: usize,
) -> String {
    let fields: Vec<&str> = request.iter().map(|f| f.as_str()).collect();
    let carry = if previous_tail.is_empty() {
        String::new()
    } else {
        format!("\nPrevious chunk ended with:\n\"...{}\"\n", previous_tail)
    };

    format!(
        r#"TASK: extract missing dosing fields for {drug}

Patient context:
{context}

Fields to extract: {fields}
Already extracted: {summary}
{carry}
Reference page content (chunk {index} of {total}):
{chunk}

Rules:
- Extract ONLY the listed fields and only from the page content above; return null for anything else.
- dose_duration: "dose,route,frequency,duration" (e.g. "15 mg/kg,IV,q12h,7 days"), chosen for this patient's infection; null unless all four parts are stated.
- route_of_administration: one of IV, PO, IM, IV/PO.
- renal_adjustment: the specific CrCl threshold adjustment, or "No Renal Adjustment" when the page says none is needed.
- general_considerations: brief plain-text clinical notes separated by semicolons, at most 200 characters.
- coverage_for: the indication matching this patient's infection.
"#,
        drug = drug,
        context = input.prompt_context(),
        fields = fields.join(", "),
        summary = summary,
        carry = carry,
        index = index,
        total = total,
        chunk = chunk,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::model::{Category, TherapyCandidate};
    use serde_json::json;

    fn engine(mock: &Arc<MockLLMClient>, sessions: ScriptedSessionFactory) -> EnrichmentEngine {
        EnrichmentEngine::new(
            StructuredGenerator::new(mock.clone()),
            Arc::new(sessions),
            EnrichmentConfig {
                retry: RetryPolicy::immediate(1),
                chunk: ChunkConfig::new(50, 5),
                ..EnrichmentConfig::default()
            },
        )
    }

    fn incomplete(name: &str, tier: Tier) -> UnifiedEntry {
        UnifiedEntry::from_candidate(
            &TherapyCandidate::new(name, tier.as_category(), 1).with_route("IV"),
            tier,
        )
    }

    fn complete(name: &str, tier: Tier) -> UnifiedEntry {
        UnifiedEntry::from_candidate(
            &TherapyCandidate::new(name, Category::AlternativeAntibiotic, 1)
                .with_route("IV")
                .with_coverage("MRSA")
                .with_dose("1 g,IV,q24h,7 days")
                .with_renal("No Renal Adjustment")
                .with_considerations("Take with food"),
            tier,
        )
    }

    #[test]
    fn test_soft_defaults_never_touch_mandatory_fields() {
        let mut entry = incomplete("Tigecycline", Tier::AlternativeAntibiotic);
        apply_soft_defaults(&mut entry);

        assert_eq!(entry.renal_adjustment.as_deref(), Some(NO_RENAL_ADJUSTMENT));
        assert_eq!(entry.general_considerations.as_deref(), Some(DEFAULT_SAFETY_NOTE));
        assert!(entry.dose_duration.is_none());
        assert!(!entry.is_complete);
    }

    #[tokio::test]
    async fn test_mandatory_entry_enriched() {
        let mock = Arc::new(MockLLMClient::new());
        mock.when("TASK: confirm reference page", MockResponse::json(json!({"is_match": true})));
        mock.when(
            "TASK: extract missing dosing fields",
            MockResponse::json(json!({
                "coverage_for": "MRSA bacteremia",
                "dose_duration": "15 mg/kg,IV,q12h,14 days"
            })),
        );
        let sessions = ScriptedSessionFactory::new()
            .with_page("Vancomycin", "Vancomycin Dosage", "Usual adult dose: 15 mg/kg IV every 12 hours.");
        let engine = engine(&mock, sessions);

        let mut plan = TherapyPlan {
            first_choice: vec![incomplete("Vancomycin", Tier::FirstChoice)],
            ..Default::default()
        };
        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert_eq!(report.enriched, vec!["Vancomycin"]);
        let entry = &plan.first_choice[0];
        assert!(entry.is_complete);
        assert_eq!(entry.dose_duration.as_deref(), Some("15 mg/kg,IV,q12h,14 days"));
        assert_eq!(entry.renal_adjustment.as_deref(), Some(NO_RENAL_ADJUSTMENT));
    }

    #[tokio::test]
    async fn test_mandatory_entry_without_page_is_removed() {
        let mock = Arc::new(MockLLMClient::new());
        let engine = engine(&mock, ScriptedSessionFactory::new());

        let mut plan = TherapyPlan {
            second_choice: vec![incomplete("Obscuramycin", Tier::SecondChoice)],
            ..Default::default()
        };
        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert!(plan.second_choice.is_empty());
        assert_eq!(report.removed, vec!["Obscuramycin"]);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_page_removes_entry() {
        let mock = Arc::new(MockLLMClient::new());
        mock.when("TASK: confirm reference page", MockResponse::json(json!({"is_match": false})));
        let sessions = ScriptedSessionFactory::new().with_page("Cefazolin", "Ceftriaxone Dosage", "text.");
        let engine = engine(&mock, sessions);

        let mut plan = TherapyPlan {
            first_choice: vec![incomplete("Cefazolin", Tier::FirstChoice)],
            ..Default::default()
        };
        engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert!(plan.first_choice.is_empty());
        assert_eq!(mock.calls_containing("TASK: extract missing dosing fields"), 0);
    }

    #[tokio::test]
    async fn test_complete_entries_are_untouched_and_sessions_closed() {
        let mock = Arc::new(MockLLMClient::new());
        let sessions = ScriptedSessionFactory::new();
        let counter = sessions.clone();
        let engine = engine(&mock, sessions);

        let mut plan = TherapyPlan {
            first_choice: vec![complete("Linezolid", Tier::FirstChoice)],
            second_choice: vec![incomplete("Unknownomycin", Tier::SecondChoice)],
            ..Default::default()
        };
        engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert_eq!(plan.first_choice.len(), 1);
        assert_eq!(counter.opened(), 1);
        assert_eq!(counter.closed(), 1);
    }

    #[tokio::test]
    async fn test_alternative_quota_prefers_short_pages() {
        let mock = Arc::new(MockLLMClient::new());
        mock.when("TASK: confirm reference page", MockResponse::json(json!({"is_match": true})));
        mock.when(
            "TASK: extract missing dosing fields",
            MockResponse::json(json!({
                "coverage_for": "Skin infection",
                "dose_duration": "1 g,IV,q12h,7 days"
            })),
        );

        let names = ["Drug F", "Drug B", "Drug H", "Drug A", "Drug E", "Drug C", "Drug G", "Drug D"];
        // Page length grows with the position in this list.
        let by_length = ["Drug A", "Drug B", "Drug C", "Drug D", "Drug E", "Drug F", "Drug G", "Drug H"];
        let mut sessions = ScriptedSessionFactory::new();
        for (i, name) in by_length.iter().enumerate() {
            let text = "Dose info. ".repeat(20 * (i + 1));
            sessions = sessions.with_page(name, &format!("{} Dosage", name), &text);
        }
        let counter = sessions.clone();
        let engine = engine(&mock, sessions);

        let mut alternatives = vec![
            complete("Complete One", Tier::AlternativeAntibiotic),
            complete("Complete Two", Tier::AlternativeAntibiotic),
        ];
        alternatives.extend(names.iter().map(|n| incomplete(n, Tier::AlternativeAntibiotic)));
        let mut plan = TherapyPlan {
            alternative_antibiotic: alternatives,
            ..Default::default()
        };

        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        let kept: Vec<&str> = plan
            .alternative_antibiotic
            .iter()
            .map(|e| e.medical_name.as_str())
            .collect();
        assert_eq!(kept, vec!["Complete One", "Complete Two", "Drug B", "Drug A", "Drug C"]);
        assert_eq!(report.over_quota.len(), 5);
        assert_eq!(counter.visited().len(), 8);
        assert_eq!(counter.opened(), counter.closed());
    }

    #[tokio::test]
    async fn test_complete_alternatives_at_target_skip_scraping() {
        let mock = Arc::new(MockLLMClient::new());
        let sessions = ScriptedSessionFactory::new().with_page("Drug X", "Drug X Dosage", "text.");
        let counter = sessions.clone();
        let engine = engine(&mock, sessions);

        let mut alternatives: Vec<UnifiedEntry> = (0..6)
            .map(|i| complete(&format!("Complete {}", i), Tier::AlternativeAntibiotic))
            .collect();
        alternatives.push(incomplete("Drug X", Tier::AlternativeAntibiotic));
        let mut plan = TherapyPlan {
            alternative_antibiotic: alternatives,
            ..Default::default()
        };

        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert_eq!(plan.alternative_antibiotic.len(), 5);
        assert_eq!(report.over_quota, vec!["Complete 5", "Drug X"]);
        assert_eq!(counter.opened(), 0);
    }

    #[tokio::test]
    async fn test_failed_alternative_leaves_its_slot_empty() {
        let mock = Arc::new(MockLLMClient::new());
        mock.when("TASK: confirm reference page", MockResponse::json(json!({"is_match": true})));
        let sessions = ScriptedSessionFactory::new()
            .with_page("Drug Short", "Drug Short Dosage", &"Dose info. ".repeat(2))
            .with_page("Drug Long", "Drug Long Dosage", &"Dose info. ".repeat(40));
        let engine = engine(&mock, sessions);

        let mut alternatives: Vec<UnifiedEntry> = (0..4)
            .map(|i| complete(&format!("Complete {}", i), Tier::AlternativeAntibiotic))
            .collect();
        alternatives.push(incomplete("Drug Long", Tier::AlternativeAntibiotic));
        alternatives.push(incomplete("Drug Short", Tier::AlternativeAntibiotic));
        let mut plan = TherapyPlan {
            alternative_antibiotic: alternatives,
            ..Default::default()
        };

        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert_eq!(plan.alternative_antibiotic.len(), 4);
        assert_eq!(report.removed, vec!["Drug Short"]);
        assert_eq!(report.over_quota, vec!["Drug Long"]);
        assert!(mock
            .requests()
            .iter()
            .filter(|r| r.user_text().contains("TASK: extract missing dosing fields"))
            .all(|r| !r.user_text().contains("Drug Long")));
    }

    #[tokio::test]
    async fn test_failed_alternative_scrape_is_removed() {
        let mock = Arc::new(MockLLMClient::new());
        let sessions = ScriptedSessionFactory::new().with_broken_page("Drug Y");
        let engine = engine(&mock, sessions);

        let mut plan = TherapyPlan {
            alternative_antibiotic: vec![incomplete("Drug Y", Tier::AlternativeAntibiotic)],
            ..Default::default()
        };
        let report = engine
            .enrich(&mut plan, &InputParameters::default(), &StageReporter::silent())
            .await;

        assert!(plan.alternative_antibiotic.is_empty());
        assert_eq!(report.removed, vec!["Drug Y"]);
    }

    #[test]
    fn test_chunk_prompt_carries_context() {
        let prompt = build_chunk_prompt(
            "Vancomycin",
            &InputParameters::default(),
            &[Field::DoseDuration, Field::RenalAdjustment],
            "coverage_for: MRSA",
            "end of previous",
            "chunk body",
            2,
            3,
        );
        assert!(prompt.contains("Fields to extract: dose_duration, renal_adjustment"));
        assert!(prompt.contains("Already extracted: coverage_for: MRSA"));
        assert!(prompt.contains("\"...end of previous\""));
        assert!(prompt.contains("(chunk 2 of 3)"));
    }
}
