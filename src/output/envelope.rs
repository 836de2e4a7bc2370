//! The JSON document a run produces

use crate::model::{IcdTransformation, InputParameters, Tier, TherapyPlan};
use crate::pipeline::PipelineContext;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Plan plus the inputs and passthrough payloads it was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub input_parameters: InputParameters,
    /// RFC 3339 timestamp of the run
    pub extraction_date: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub result: TherapyPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icd_transformation: Option<IcdTransformation>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub negative_organisms: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub negative_resistance_genes: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub errors: Vec<String>,
}

impl PipelineOutput {
    /// Envelope for a finished (or failed) run; a failed run carries an empty plan.
    pub fn from_context(context: &PipelineContext) -> Self {
        let input = context.input.clone();
        Self {
            icd_transformation: input.icd_transformation.clone(),
            negative_organisms: input.negative_organisms.clone(),
            negative_resistance_genes: input.negative_resistance_genes.clone(),
            input_parameters: input,
            extraction_date: chrono::Utc::now().to_rfc3339(),
            result: context.plan.clone().unwrap_or_default(),
            errors: context.errors.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize pipeline output to JSON")
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("Failed to serialize pipeline output")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write output to {}", path.display()))
    }
}

impl fmt::Display for PipelineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Therapy plan for {} ({})",
            self.input_parameters.pathogen_display(),
            self.extraction_date
        )?;
        writeln!(f, "Resistance genes: {}", self.input_parameters.genes_display())?;

        for tier in Tier::ALL {
            let entries = self.result.tier(tier);
            writeln!(f)?;
            writeln!(f, "{} ({})", tier, entries.len())?;
            for entry in entries {
                let marker = if entry.is_complete { "" } else { " [incomplete]" };
                writeln!(f, "  - {}{}", entry.medical_name, marker)?;
                if let Some(dose) = &entry.dose_duration {
                    writeln!(f, "      dose: {}", dose)?;
                }
                if let Some(renal) = &entry.renal_adjustment {
                    writeln!(f, "      renal: {}", renal)?;
                }
                let sources: Vec<String> =
                    entry.mentioned_in_sources.iter().map(|s| s.to_string()).collect();
                writeln!(f, "      sources: {}", sources.join(", "))?;
            }
        }

        if !self.result.resistance_genes.is_empty() {
            writeln!(f)?;
            writeln!(f, "Resistance genes")?;
            for gene in &self.result.resistance_genes {
                writeln!(
                    f,
                    "  - {}: {}",
                    gene.gene_name,
                    gene.affected_classes.as_deref().unwrap_or("unknown classes")
                )?;
            }
        }

        for error in &self.errors {
            writeln!(f, "error: {}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, IcdCodeName, TherapyCandidate, UnifiedEntry};
    use tempfile::TempDir;

    fn context() -> PipelineContext {
        let input = InputParameters {
            negative_organisms: vec!["Escherichia coli".to_string()],
            icd_transformation: Some(IcdTransformation {
                code_names: vec![IcdCodeName {
                    code: "A41.9".to_string(),
                    name: Some("Sepsis, unspecified organism".to_string()),
                }],
                severity_codes_transformed: None,
            }),
            ..Default::default()
        };
        let mut context = PipelineContext::new(input);
        let candidate = TherapyCandidate::new("Vancomycin", Category::FirstChoice, 1)
            .with_dose("15 mg/kg,IV,q12h,7 days");
        context.plan = Some(TherapyPlan {
            first_choice: vec![UnifiedEntry::from_candidate(&candidate, Tier::FirstChoice)],
            ..Default::default()
        });
        context
    }

    #[test]
    fn test_envelope_threads_passthrough_payloads() {
        let output = PipelineOutput::from_context(&context());

        assert!(output.is_success());
        assert_eq!(output.negative_organisms, vec!["Escherichia coli"]);
        assert_eq!(
            output.icd_transformation.as_ref().map(|t| t.code_names[0].code.as_str()),
            Some("A41.9")
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&output.extraction_date).is_ok());

        let value = output.to_value().unwrap();
        assert_eq!(value["result"]["first_choice"][0]["medical_name"], "Vancomycin");
        assert!(value["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_null_lists_deserialize_as_empty() {
        let json = r#"{
            "input_parameters": {},
            "extraction_date": "2026-01-01T00:00:00Z",
            "result": null,
            "negative_organisms": null,
            "negative_resistance_genes": null,
            "errors": null
        }"#;
        let output: PipelineOutput = serde_json::from_str(json).unwrap();
        assert!(output.result.is_empty());
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_write_and_display() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("plan.json");
        let output = PipelineOutput::from_context(&context());

        output.write_to(&path).unwrap();
        let read: PipelineOutput =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.result, output.result);

        let text = output.to_string();
        assert!(text.contains("first_choice (1)"));
        assert!(text.contains("  - Vancomycin [incomplete]"));
        assert!(text.contains("dose: 15 mg/kg,IV,q12h,7 days"));
    }
}
