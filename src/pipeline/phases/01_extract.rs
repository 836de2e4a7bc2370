use crate::llm::StructuredGenerator;
use crate::model::{
    canonical_medical_name, clean_null, is_combination, normalize_frequency, normalize_route,
    Category, InputParameters, ResistanceGeneObservation, SourceDocument, TherapyCandidate,
};
use crate::pipeline::context::{PipelineContext, SourceExtraction};
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::services::PipelineServices;
use crate::progress::Stage;
use crate::retry::RetryPolicy;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// A therapy recommendation as the model reports it.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractedTherapy {
    pub medical_name: String,
    /// first_choice, second_choice, alternative_antibiotic, or the wording the source uses
    pub category: String,
    pub coverage_for: Option<String>,
    /// IV, PO, IM or IV/PO
    pub route_of_administration: Option<String>,
    /// "dose,route,frequency,duration"; null unless all four are stated
    pub dose_duration: Option<String>,
    pub renal_adjustment: Option<String>,
    pub general_considerations: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ExtractionOutput {
    #[serde(default)]
    pub therapies: Vec<ExtractedTherapy>,
    #[serde(default)]
    pub resistance_genes: Vec<ResistanceGeneObservation>,
}

fn build_prompt(input: &InputParameters, source: &SourceDocument) -> String {
    format!(
        r#"TASK: extract antibiotic therapy recommendations from one source

Patient context:
{context}

Source:
{source}

Extract every antibiotic this source recommends for the patient context above.

Rules:
- Use only information stated in the source; return null for anything it does not state.
- medical_name: generic drug name; write combinations as "Drug1 plus Drug2".
- category: first_choice, second_choice or alternative_antibiotic as the source ranks it; use not_known when the source does not say.
- Skip drugs the patient is allergic to, and drugs of the same class.
- route_of_administration: IV, PO, IM or IV/PO.
- dose_duration: "dose,route,frequency,duration" (e.g. "1 g,IV,q8h,7 days"); null if any part is missing.
- renal_adjustment: the specific CrCl threshold adjustment, or "No Renal Adjustment" when the source says none is needed.
- resistance_genes: each resistance gene the source discusses, with the antibiotic classes it affects and brief clinical considerations.
"#,
        context = input.prompt_context(),
        source = source.render(),
    )
}

/// Deterministic clean-up applied to every extracted recommendation.
pub fn normalize_extracted(raw: ExtractedTherapy, source_index: usize) -> Option<TherapyCandidate> {
    let name = canonical_medical_name(&raw.medical_name);
    if clean_null(Some(name.clone())).is_none() {
        return None;
    }

    let mut candidate = TherapyCandidate::new(name, Category::parse_loose(&raw.category), source_index);
    candidate.is_combined = is_combination(&candidate.medical_name);
    candidate.coverage_for = clean_null(raw.coverage_for);
    candidate.route_of_administration =
        clean_null(raw.route_of_administration).map(|r| normalize_route(&r));
    candidate.dose_duration = clean_null(raw.dose_duration).map(|d| normalize_frequency(&d));
    candidate.renal_adjustment = clean_null(raw.renal_adjustment);
    candidate.general_considerations = clean_null(raw.general_considerations);
    Some(candidate)
}

fn normalize_gene(mut gene: ResistanceGeneObservation, source_index: usize) -> Option<ResistanceGeneObservation> {
    gene.gene_name = clean_null(Some(gene.gene_name))?;
    gene.affected_classes = clean_null(gene.affected_classes);
    gene.considerations = clean_null(gene.considerations);
    gene.source_index = source_index;
    Some(gene)
}

/// One structured call for one source. Never fails: a source that yields
/// nothing contributes empty lists.
pub async fn extract_source(
    generator: &StructuredGenerator,
    retry: &RetryPolicy,
    input: &InputParameters,
    source: &SourceDocument,
    source_index: usize,
) -> SourceExtraction {
    let prompt = build_prompt(input, source);
    let output = match generator
        .generate_with_retry::<ExtractionOutput>("extract", &prompt, retry)
        .await
    {
        Ok(Some(output)) => output,
        Ok(None) => {
            warn!(source = source_index, "Extraction returned nothing");
            ExtractionOutput::default()
        }
        Err(e) => {
            warn!(source = source_index, error = %e, "Extraction failed, skipping source");
            ExtractionOutput::default()
        }
    };

    let candidates: Vec<TherapyCandidate> = output
        .therapies
        .into_iter()
        .filter_map(|t| normalize_extracted(t, source_index))
        .collect();
    let genes: Vec<ResistanceGeneObservation> = output
        .resistance_genes
        .into_iter()
        .filter_map(|g| normalize_gene(g, source_index))
        .collect();

    debug!(
        source = source_index,
        candidates = candidates.len(),
        genes = genes.len(),
        "Extracted source"
    );
    SourceExtraction {
        source_index,
        candidates,
        genes,
    }
}

pub struct ExtractPhase;

#[async_trait]
impl WorkflowPhase for ExtractPhase {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()> {
        let total = context.sources.len();
        let workers = services.config.extract_workers.max(1);
        let retry = services.config.retry;
        let generator = services.generator.clone();
        let input = context.input.clone();
        let reporter = &context.reporter;

        // Each task owns its source so the stream holds no borrows of the context.
        let sources: Vec<(usize, SourceDocument)> =
            context.sources.iter().cloned().enumerate().collect();
        let mut pending = stream::iter(sources)
            .map(move |(i, source)| {
                let generator = generator.clone();
                let input = input.clone();
                async move { extract_source(&generator, &retry, &input, &source, i + 1).await }
            })
            .buffer_unordered(workers);

        let mut extractions = Vec::with_capacity(total);
        while let Some(extraction) = pending.next().await {
            extractions.push(extraction);
            reporter.report_fraction(
                Stage::Extract,
                extractions.len(),
                total,
                format!("Extracted {}/{} sources", extractions.len(), total),
            );
        }
        drop(pending);

        // Completion order is arbitrary; provenance needs source order.
        extractions.sort_by_key(|e: &SourceExtraction| e.source_index);

        info!(
            sources = total,
            candidates = extractions.iter().map(|e| e.candidates.len()).sum::<usize>(),
            "Extraction complete"
        );
        context.extractions = extractions;
        Ok(())
    }
}
