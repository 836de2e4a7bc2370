//! End-to-end pipeline runs against a scripted model and reference site

mod support;

use abxplan::enrichment::{
    ChunkConfig, EnrichmentConfig, EnrichmentEngine, ScriptedSessionFactory, DEFAULT_ALTERNATIVE_TARGET,
};
use abxplan::jobs::{InMemoryJobStore, JobRunner, JobStatus};
use abxplan::llm::{MockLLMClient, MockResponse, StructuredGenerator};
use abxplan::model::{Category, Field, TherapyCandidate, TherapyPlan, Tier, UnifiedEntry};
use abxplan::pipeline::phases::rank::rank_source;
use abxplan::pipeline::{PipelineContext, PipelineOrchestrator, RankMemory};
use abxplan::progress::{ProgressEvent, ProgressHandler, StageReporter};
use abxplan::retry::RetryPolicy;
use abxplan::search::{SearchHit, StaticSearchClient};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use support::{linezolid_pages, mrsa_input, mrsa_llm, mrsa_sources, services};

#[derive(Default)]
struct EventLog {
    phases: Mutex<Vec<String>>,
    percents: Mutex<Vec<f32>>,
}

impl ProgressHandler for EventLog {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseComplete { phase, .. } => {
                self.phases.lock().unwrap().push(phase.clone());
            }
            ProgressEvent::Stage { percent, .. } => self.percents.lock().unwrap().push(*percent),
            _ => {}
        }
    }
}

fn assert_plan_integrity(plan: &TherapyPlan) {
    for entry in plan.entries() {
        for field in Field::MANDATORY {
            assert!(
                entry.get(field).is_some(),
                "{} is missing {}",
                entry.medical_name,
                field.as_str()
            );
        }
        if entry.is_complete {
            assert!(entry.missing_fields().is_empty(), "{} marked complete", entry.medical_name);
        }
    }
}

#[tokio::test]
async fn test_full_run_produces_tiered_plan() {
    let mock = mrsa_llm();
    let sessions = linezolid_pages();
    let orchestrator = PipelineOrchestrator::new(services(&mock, sessions.clone()));
    let events = Arc::new(EventLog::default());
    let mut context = PipelineContext::new(mrsa_input())
        .with_sources(mrsa_sources())
        .with_reporter(StageReporter::new(events.clone()));

    let runner = JobRunner::new(Arc::new(InMemoryJobStore::new()));
    let outcome = runner.run(&orchestrator, &mut context).await.unwrap();

    assert_eq!(outcome.status, JobStatus::Completed, "errors: {:?}", outcome.output.errors);
    let plan = &outcome.output.result;

    let first: Vec<&str> = plan.first_choice.iter().map(|e| e.medical_name.as_str()).collect();
    let second: Vec<&str> = plan.second_choice.iter().map(|e| e.medical_name.as_str()).collect();
    let alternative: Vec<&str> =
        plan.alternative_antibiotic.iter().map(|e| e.medical_name.as_str()).collect();
    assert_eq!(first, vec!["Vancomycin"]);
    assert_eq!(second, vec!["Trimethoprim plus Sulfamethoxazole"]);
    assert_eq!(alternative, vec!["Linezolid"]);

    let vancomycin = &plan.first_choice[0];
    assert_eq!(vancomycin.route_of_administration.as_deref(), Some("IV/PO"));
    assert_eq!(vancomycin.dose_duration.as_deref(), Some("15 mg/kg,IV,q12h,7 days"));
    assert_eq!(vancomycin.mentioned_in_sources, BTreeSet::from([1, 2]));
    assert!(plan.second_choice[0].is_combined);

    let linezolid = &plan.alternative_antibiotic[0];
    assert!(linezolid.is_complete);
    assert_eq!(linezolid.dose_duration.as_deref(), Some("600 mg,IV/PO,q12h,14 days"));
    assert_eq!(sessions.visited().len(), 1);
    assert_eq!(sessions.opened(), sessions.closed());

    assert_eq!(plan.resistance_genes.len(), 1);
    assert_eq!(plan.resistance_genes[0].gene_name, "mecA");
    assert_eq!(plan.sources.len(), 2);
    assert_eq!(plan.sources[0].index, 1);
    assert_plan_integrity(plan);

    // Passthrough payloads reach the envelope untouched.
    assert_eq!(outcome.output.negative_organisms, vec!["Escherichia coli"]);
    assert_eq!(outcome.output.negative_resistance_genes, vec!["vanA"]);
    assert!(outcome.output.icd_transformation.is_some());

    let record = runner.store().get(&outcome.job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100.0);
    let stored = record.result.unwrap();
    assert_eq!(stored["result"]["first_choice"][0]["medical_name"], "Vancomycin");

    assert_eq!(
        *events.phases.lock().unwrap(),
        vec!["SearchPhase", "ExtractPhase", "RankPhase", "SynthesizePhase", "EnrichPhase"]
    );
    let percents = events.percents.lock().unwrap();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", percents);
}

#[tokio::test]
async fn test_search_client_supplies_sources() {
    let mock = mrsa_llm();
    let hits: Vec<SearchHit> = mrsa_sources()
        .into_iter()
        .map(|s| SearchHit {
            title: s.title,
            url: s.url,
            snippet: s.raw_text,
        })
        .collect();
    let services = services(&mock, linezolid_pages())
        .with_search(Arc::new(StaticSearchClient::new(hits)));
    let mut context = PipelineContext::new(mrsa_input());

    let plan = PipelineOrchestrator::new(services)
        .execute(&mut context)
        .await
        .unwrap();

    assert_eq!(context.sources.len(), 2);
    let query = context.search_query.unwrap();
    assert!(query.contains("Staphylococcus aureus"));
    assert_eq!(plan.len(), 3);
    assert!(context.errors.is_empty());
}

#[tokio::test]
async fn test_every_source_failing_yields_empty_plan_not_error() {
    let mock = Arc::new(MockLLMClient::new());
    let orchestrator = PipelineOrchestrator::new(services(&mock, ScriptedSessionFactory::new()));
    let mut context = PipelineContext::new(mrsa_input()).with_sources(mrsa_sources());

    let plan = orchestrator.execute(&mut context).await.unwrap();

    assert!(plan.is_empty());
    assert!(context.errors.is_empty());
    assert_eq!(context.extractions.len(), 2);
}

#[tokio::test]
async fn test_ranking_omission_triggers_one_scoped_retry() {
    let mock = Arc::new(MockLLMClient::new());
    mock.when(
        "TASK: re-rank omitted candidates",
        MockResponse::json(json!({"rankings": []})),
    );
    mock.when(
        "TASK: rank therapy candidates",
        MockResponse::json(json!({"rankings": [
            {"medical_name": "Vancomycin", "ranked_category": "first_choice", "is_relevant": true},
            {"medical_name": "Daptomycin", "ranked_category": "second_choice", "is_relevant": true},
            {"medical_name": "Linezolid", "ranked_category": "alternative_antibiotic", "is_relevant": true},
            {"medical_name": "Ceftaroline", "ranked_category": "alternative_antibiotic", "is_relevant": true}
        ]})),
    );
    let candidates: Vec<TherapyCandidate> =
        ["Vancomycin", "Daptomycin", "Linezolid", "Ceftaroline", "Tedizolid"]
            .iter()
            .map(|n| TherapyCandidate::new(*n, Category::NotKnown, 1))
            .collect();
    let mut memory = RankMemory::new();

    let kept = rank_source(
        &StructuredGenerator::new(mock.clone()),
        &RetryPolicy::immediate(1),
        &mrsa_input(),
        &mut memory,
        1,
        candidates,
    )
    .await;

    assert_eq!(kept.len(), 4);
    assert!(kept.iter().all(|c| c.medical_name != "Tedizolid"));
    assert_eq!(mock.calls_containing("TASK: re-rank omitted candidates"), 1);
    assert_eq!(mock.calls_containing("- Tedizolid"), 2);
    assert_eq!(memory.get("vancomycin"), Some(Category::FirstChoice));
}

fn entry(name: &str, complete: bool) -> UnifiedEntry {
    let mut candidate = TherapyCandidate::new(name, Category::AlternativeAntibiotic, 1)
        .with_route("IV")
        .with_coverage("MRSA");
    if complete {
        candidate = candidate
            .with_dose("1 g,IV,q24h,7 days")
            .with_renal("No Renal Adjustment")
            .with_considerations("Monitor CK");
    }
    UnifiedEntry::from_candidate(&candidate, Tier::AlternativeAntibiotic)
}

#[tokio::test]
async fn test_alternative_quota_prefers_cheapest_pages() {
    let mock = Arc::new(MockLLMClient::new());
    mock.when(
        "TASK: confirm reference page",
        MockResponse::json(json!({"is_match": true})),
    );
    mock.when(
        "TASK: extract missing dosing fields",
        MockResponse::json(json!({"dose_duration": "1 g,IV,q24h,7 days"})),
    );

    let drugs = ["Drug A", "Drug B", "Drug C", "Drug D", "Drug E", "Drug F", "Drug G", "Drug H"];
    let mut sessions = ScriptedSessionFactory::new();
    for (i, drug) in drugs.iter().enumerate() {
        // Drug H gets the shortest page, Drug A the longest.
        let text = "Usual adult dose: 1 g IV once daily. ".repeat(6 * (drugs.len() - i));
        sessions = sessions.with_page(drug, &format!("{} Dosage", drug), &text);
    }

    let engine = EnrichmentEngine::new(
        StructuredGenerator::new(mock.clone()),
        Arc::new(sessions.clone()),
        EnrichmentConfig {
            retry: RetryPolicy::immediate(1),
            chunk: ChunkConfig::new(50, 5),
            ..EnrichmentConfig::default()
        },
    );

    let mut alternatives = vec![entry("Complete One", true), entry("Complete Two", true)];
    alternatives.extend(drugs.iter().map(|d| entry(d, false)));
    let mut plan = TherapyPlan {
        alternative_antibiotic: alternatives,
        ..Default::default()
    };

    let report = engine
        .enrich(&mut plan, &mrsa_input(), &StageReporter::silent())
        .await;

    assert_eq!(plan.alternative_antibiotic.len(), DEFAULT_ALTERNATIVE_TARGET);
    let kept: BTreeSet<&str> = plan
        .alternative_antibiotic
        .iter()
        .map(|e| e.medical_name.as_str())
        .collect();
    assert_eq!(
        kept,
        BTreeSet::from(["Complete One", "Complete Two", "Drug F", "Drug G", "Drug H"])
    );
    assert_eq!(report.over_quota.len(), 5);
    assert!(plan.alternative_antibiotic.iter().all(|e| e.is_complete));
    assert_eq!(mock.calls_containing("TASK: extract missing dosing fields for Drug A"), 0);
}
