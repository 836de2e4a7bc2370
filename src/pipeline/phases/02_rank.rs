use crate::llm::StructuredGenerator;
use crate::model::{
    is_systemic_route, normalize_name, Category, InputParameters, TherapyCandidate,
};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::rank_memory::RankMemory;
use crate::pipeline::services::PipelineServices;
use crate::progress::Stage;
use crate::retry::RetryPolicy;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const RANK_HEADING: &str = "TASK: rank therapy candidates";
const RERANK_HEADING: &str = "TASK: re-rank omitted candidates";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RankedCandidate {
    /// exactly as listed in the input
    pub medical_name: String,
    /// first_choice, second_choice, alternative_antibiotic, not_known or remove
    pub ranked_category: String,
    pub is_relevant: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RankingOutput {
    #[serde(default)]
    pub rankings: Vec<RankedCandidate>,
}

fn build_prompt(
    heading: &str,
    input: &InputParameters,
    candidates: &[(usize, TherapyCandidate)],
    memory: &RankMemory,
) -> String {
    let lines: Vec<String> = candidates
        .iter()
        .map(|(_, c)| {
            let hint = memory
                .get(&c.medical_name)
                .map(|cat| format!(" (previously ranked as {})", cat))
                .unwrap_or_default();
            format!("- {}{}", c.context_line(), hint)
        })
        .collect();

    format!(
        r#"{heading}

Patient context:
{context}

Candidates:
{candidates}

For EVERY candidate above return one ranking with the medical_name exactly as listed.
- ranked_category: first_choice, second_choice or alternative_antibiotic for this patient; not_known only if you cannot decide; remove if it should not be used.
- is_relevant: false when the drug does not treat the pathogen(s), is excluded by the allergies or route requirement, or is otherwise inappropriate.
- Judge using the dose, route and renal information shown, not the name alone.
- reason: one short sentence.
"#,
        heading = heading,
        context = input.prompt_context(),
        candidates = lines.join("\n"),
    )
}

type Matched = Vec<(usize, TherapyCandidate, RankedCandidate)>;

/// Pairs candidates with rankings by exact name, then by normalised name.
fn match_rankings(
    candidates: Vec<(usize, TherapyCandidate)>,
    rankings: &[RankedCandidate],
) -> (Matched, Vec<(usize, TherapyCandidate)>) {
    let mut exact: HashMap<&str, &RankedCandidate> = HashMap::new();
    let mut normalized: HashMap<String, &RankedCandidate> = HashMap::new();
    for ranking in rankings {
        exact.entry(ranking.medical_name.as_str()).or_insert(ranking);
        normalized
            .entry(normalize_name(&ranking.medical_name))
            .or_insert(ranking);
    }

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for (pos, candidate) in candidates {
        let found = exact
            .get(candidate.medical_name.as_str())
            .or_else(|| normalized.get(&normalize_name(&candidate.medical_name)));
        match found {
            Some(ranking) => matched.push((pos, candidate, (*ranking).clone())),
            None => unmatched.push((pos, candidate)),
        }
    }
    (matched, unmatched)
}

async fn request_rankings(
    generator: &StructuredGenerator,
    retry: &RetryPolicy,
    prompt: &str,
) -> Result<Vec<RankedCandidate>, crate::retry::RetryError<crate::llm::BackendError>> {
    Ok(generator
        .generate_with_retry::<RankingOutput>("rank", prompt, retry)
        .await?
        .map(|output| output.rankings)
        .unwrap_or_default())
}

/// Ranks one source's candidates against the patient context.
///
/// Candidates the ranker omits get one more call restricted to them; any still
/// missing afterwards are dropped. If the first call fails outright the
/// source's candidates are returned unranked.
pub async fn rank_source(
    generator: &StructuredGenerator,
    retry: &RetryPolicy,
    input: &InputParameters,
    memory: &mut RankMemory,
    source_index: usize,
    candidates: Vec<TherapyCandidate>,
) -> Vec<TherapyCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let indexed: Vec<(usize, TherapyCandidate)> = candidates.into_iter().enumerate().collect();
    let prompt = build_prompt(RANK_HEADING, input, &indexed, memory);
    let rankings = match request_rankings(generator, retry, &prompt).await {
        Ok(rankings) => rankings,
        Err(e) => {
            warn!(source = source_index, error = %e, "Ranking failed, keeping source unranked");
            return indexed.into_iter().map(|(_, c)| c).collect();
        }
    };

    let (mut matched, unmatched) = match_rankings(indexed, &rankings);

    if !unmatched.is_empty() {
        info!(
            source = source_index,
            omitted = unmatched.len(),
            "Ranking omitted candidates, retrying for them"
        );
        let prompt = build_prompt(RERANK_HEADING, input, &unmatched, memory);
        let retried = match request_rankings(generator, retry, &prompt).await {
            Ok(rankings) => rankings,
            Err(e) => {
                warn!(source = source_index, error = %e, "Re-ranking failed");
                Vec::new()
            }
        };
        let (more, still_unmatched) = match_rankings(unmatched, &retried);
        matched.extend(more);
        for (_, candidate) in still_unmatched {
            warn!(
                source = source_index,
                drug = %candidate.medical_name,
                "Candidate never ranked, dropping"
            );
        }
    }

    matched.sort_by_key(|(pos, _, _)| *pos);

    let mut kept = Vec::with_capacity(matched.len());
    for (_, mut candidate, ranking) in matched {
        let category = Category::parse_loose(&ranking.ranked_category);
        if category == Category::Remove || !ranking.is_relevant {
            debug!(
                source = source_index,
                drug = %candidate.medical_name,
                reason = ?ranking.reason,
                "Ranker removed candidate"
            );
            continue;
        }
        candidate.category = category;
        if category != Category::NotKnown {
            memory.put(&candidate.medical_name, category);
        }
        kept.push(candidate);
    }
    kept
}

/// Route filter for the systemic flag. Candidates without a stated route pass.
pub fn passes_route_filter(candidate: &TherapyCandidate, systemic: Option<bool>) -> bool {
    match (systemic, candidate.route_of_administration.as_deref()) {
        (None, _) | (_, None) => true,
        (Some(wanted), Some(route)) => is_systemic_route(route) == wanted,
    }
}

pub struct RankPhase;

#[async_trait]
impl WorkflowPhase for RankPhase {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()> {
        let PipelineContext {
            input,
            extractions,
            candidates,
            genes,
            rank_memory,
            reporter,
            ..
        } = context;

        let total = extractions.len();
        for (done, extraction) in extractions.iter().enumerate() {
            let submitted = extraction.candidates.len();
            let ranked = rank_source(
                &services.generator,
                &services.config.retry,
                input,
                rank_memory,
                extraction.source_index,
                extraction.candidates.clone(),
            )
            .await;

            let before_filter = ranked.len();
            candidates.extend(
                ranked
                    .into_iter()
                    .filter(|c| passes_route_filter(c, input.systemic)),
            );
            genes.extend(extraction.genes.iter().cloned());

            debug!(
                source = extraction.source_index,
                submitted,
                ranked = before_filter,
                "Ranked source"
            );
            reporter.report_fraction(
                Stage::Rank,
                done + 1,
                total,
                format!("Ranked source {}/{}", done + 1, total),
            );
        }

        info!(
            candidates = candidates.len(),
            memory = rank_memory.len(),
            "Ranking complete"
        );
        Ok(())
    }
}
