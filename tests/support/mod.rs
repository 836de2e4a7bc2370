//! Shared fixtures for the integration tests

#![allow(dead_code)]

use abxplan::enrichment::ScriptedSessionFactory;
use abxplan::llm::{BackendError, MockLLMClient, MockResponse, StructuredGenerator};
use abxplan::model::{InputParameters, SourceDocument};
use abxplan::pipeline::{PipelineConfig, PipelineServices};
use abxplan::retry::RetryPolicy;
use abxplan::search::SearchCache;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn mrsa_input() -> InputParameters {
    let text = std::fs::read_to_string(fixture_path("params/mrsa_bacteremia.json")).unwrap();
    let mut input: InputParameters = serde_json::from_str(&text).unwrap();
    // Oral vancomycin stays in play for these scenarios.
    input.systemic = None;
    input
}

pub fn mrsa_sources() -> Vec<SourceDocument> {
    SearchCache::load(&fixture_path("search/mrsa_sources.json"))
        .unwrap()
        .search_results
        .into_iter()
        .map(Into::into)
        .collect()
}

pub fn therapy(name: &str, category: &str) -> serde_json::Value {
    json!({
        "medical_name": name,
        "category": category,
        "coverage_for": null,
        "route_of_administration": null,
        "dose_duration": null,
        "renal_adjustment": null,
        "general_considerations": null
    })
}

/// Scripted model for the two-source MRSA scenario.
///
/// Source 1 recommends IV vancomycin with a full regimen and TMP/SMX;
/// source 2 mentions oral vancomycin and linezolid without a dose.
pub fn mrsa_llm() -> Arc<MockLLMClient> {
    let mock = Arc::new(MockLLMClient::new());

    let mut vanco_iv = therapy("Vancomycin", "first-line");
    vanco_iv["coverage_for"] = json!("MRSA bacteremia");
    vanco_iv["route_of_administration"] = json!("intravenous");
    vanco_iv["dose_duration"] = json!("15 mg/kg,IV,twice daily,7 days");
    vanco_iv["renal_adjustment"] = json!("CrCl < 50: dose by trough levels");
    vanco_iv["general_considerations"] = json!("Monitor trough levels");

    let mut tmp_smx = therapy("TMP/SMX", "first-line");
    tmp_smx["coverage_for"] = json!("MRSA bacteremia step-down");
    tmp_smx["route_of_administration"] = json!("PO");
    tmp_smx["dose_duration"] = json!("160/800 mg,PO,q12h,14 days");
    tmp_smx["renal_adjustment"] = json!("CrCl 15-30: reduce dose by 50%");
    tmp_smx["general_considerations"] = json!("Monitor potassium");

    let mut vanco_po = therapy("Vancomycin", "first_choice");
    vanco_po["coverage_for"] = json!("MRSA");
    vanco_po["route_of_administration"] = json!("oral");

    let mut linezolid = therapy("Linezolid", "alternative");
    linezolid["coverage_for"] = json!("MRSA bacteremia");
    linezolid["route_of_administration"] = json!("IV/PO");

    mock.when(
        "[src-1]",
        MockResponse::json(json!({
            "therapies": [vanco_iv, tmp_smx],
            "resistance_genes": [{
                "gene_name": "mecA",
                "affected_classes": "Beta-lactams",
                "considerations": "Avoid beta-lactams"
            }]
        })),
    );
    mock.when(
        "[src-2]",
        MockResponse::json(json!({"therapies": [vanco_po, linezolid]})),
    );
    mock.when(
        "TASK: re-rank omitted candidates",
        MockResponse::json(json!({"rankings": []})),
    );
    mock.when(
        "TASK: rank therapy candidates",
        MockResponse::json(json!({"rankings": [
            {"medical_name": "Vancomycin", "ranked_category": "first_choice", "is_relevant": true},
            {"medical_name": "Trimethoprim plus Sulfamethoxazole", "ranked_category": "second_choice", "is_relevant": true},
            {"medical_name": "Linezolid", "ranked_category": "alternative_antibiotic", "is_relevant": true}
        ]})),
    );
    // Unification falls back to the deterministic merge.
    mock.when(
        "TASK: unify",
        MockResponse::error(BackendError::TimeoutError { seconds: 1 }),
    );
    mock.when(
        "TASK: confirm reference page",
        MockResponse::json(json!({"is_match": true})),
    );
    mock.when(
        "TASK: extract missing dosing fields",
        MockResponse::json(json!({
            "dose_duration": "600 mg,IV/PO,q12h,14 days",
            "renal_adjustment": "No Renal Adjustment",
            "general_considerations": "Monitor platelets weekly"
        })),
    );

    mock
}

pub fn linezolid_pages() -> ScriptedSessionFactory {
    ScriptedSessionFactory::new().with_page(
        "Linezolid",
        "Linezolid Dosage Guide",
        "Usual adult dose for bacteremia: 600 mg IV or orally every 12 hours for 14 days.",
    )
}

pub fn services(mock: &Arc<MockLLMClient>, sessions: ScriptedSessionFactory) -> PipelineServices {
    PipelineServices::new(
        StructuredGenerator::new(mock.clone()),
        Arc::new(sessions),
        PipelineConfig::default().with_retry(RetryPolicy::immediate(1)),
    )
}
