//! Resistance gene unification

use super::grouping::group_by_name;
use super::unifier::Unifier;
use crate::model::{clean_null, ResistanceGeneObservation};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, JsonSchema)]
struct UnifiedGene {
    /// Gene name exactly as given
    gene_name: Option<String>,
    /// Antibiotic classes affected, comma separated
    affected_classes: Option<String>,
    /// Clinical implications, semicolon separated
    considerations: Option<String>,
}

/// Merges gene observations that share a normalised gene name.
pub async fn unify_genes(
    unifier: &Unifier,
    observations: Vec<ResistanceGeneObservation>,
) -> Vec<ResistanceGeneObservation> {
    let groups = group_by_name(observations, |o| o.gene_name.as_str());
    let mut unified = Vec::with_capacity(groups.len());

    for group in groups {
        if group.is_singleton() {
            unified.extend(group.members);
            continue;
        }
        unified.push(unify_gene_group(unifier, &group.members).await);
    }

    unified
}

async fn unify_gene_group(
    unifier: &Unifier,
    members: &[ResistanceGeneObservation],
) -> ResistanceGeneObservation {
    let fallback = merge_gene_observations(members);
    let Some(generator) = unifier.generator() else {
        return fallback;
    };

    let prompt = build_gene_prompt(&fallback.gene_name, members);
    let answer = generator
        .generate_with_retry::<UnifiedGene>("unify_gene", &prompt, unifier.retry())
        .await;

    match answer {
        Ok(Some(gene)) => {
            debug!(gene = %fallback.gene_name, "Unified gene observations");
            let any_classes = members.iter().any(|m| m.affected_classes.is_some());
            let any_notes = members.iter().any(|m| m.considerations.is_some());
            ResistanceGeneObservation {
                gene_name: fallback.gene_name.clone(),
                affected_classes: clean_null(gene.affected_classes)
                    .filter(|_| any_classes)
                    .or(fallback.affected_classes),
                considerations: clean_null(gene.considerations)
                    .filter(|_| any_notes)
                    .or(fallback.considerations),
                source_index: fallback.source_index,
            }
        }
        Ok(None) => fallback,
        Err(e) => {
            warn!(gene = %fallback.gene_name, error = %e, "Gene unification failed, using deterministic merge");
            fallback
        }
    }
}

/// Union of affected classes and distinct considerations, first member's name.
pub fn merge_gene_observations(members: &[ResistanceGeneObservation]) -> ResistanceGeneObservation {
    let mut classes: Vec<&str> = Vec::new();
    let mut notes: Vec<&str> = Vec::new();

    for member in members {
        if let Some(value) = member.affected_classes.as_deref() {
            for class in value.split([',', ';']).map(str::trim).filter(|c| !c.is_empty()) {
                if !classes.iter().any(|c| c.eq_ignore_ascii_case(class)) {
                    classes.push(class);
                }
            }
        }
        if let Some(value) = member.considerations.as_deref() {
            for note in value.split(';').map(str::trim).filter(|n| !n.is_empty()) {
                if !notes.contains(&note) {
                    notes.push(note);
                }
            }
        }
    }

    let first = members.first();
    ResistanceGeneObservation {
        gene_name: first.map(|m| m.gene_name.trim().to_string()).unwrap_or_default(),
        affected_classes: (!classes.is_empty()).then(|| classes.join(", ")),
        considerations: (!notes.is_empty()).then(|| notes.join("; ")),
        source_index: first.map(|m| m.source_index).unwrap_or_default(),
    }
}

fn build_gene_prompt(gene: &str, members: &[ResistanceGeneObservation]) -> String {
    let sources: Vec<String> = members
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "Source {}:\n- affected_classes: {}\n- considerations: {}",
                i + 1,
                m.affected_classes.as_deref().unwrap_or("null"),
                m.considerations.as_deref().unwrap_or("null"),
            )
        })
        .collect();

    format!(
        r#"TASK: unify resistance gene information for {gene}

{sources}

Rules:
- Combine the affected antibiotic classes from all sources without duplicates.
- Combine the distinct clinical considerations, separated by semicolons.
- Use ONLY information present above. A field null in every source stays null.
"#,
        gene = gene,
        sources = sources.join("\n\n"),
    )
}
