use super::commands::RunArgs;
use crate::audit::ExchangeLogger;
use crate::config::AbxplanConfig;
use crate::enrichment::HttpSessionFactory;
use crate::jobs::{InMemoryJobStore, JobRunner};
use crate::llm::StructuredGenerator;
use crate::model::{InputParameters, SourceDocument};
use crate::pipeline::{PipelineContext, PipelineOrchestrator, PipelineServices};
use crate::progress::{LoggingHandler, ProgressBarHandler, ProgressHandler, StageReporter};
use crate::search::{SearchCache, SearchHit};
use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

pub async fn handle_run(args: &RunArgs, quiet: bool) -> i32 {
    let (orchestrator, mut context) = match prepare_run(args, quiet) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_USAGE;
        }
    };

    let runner = JobRunner::new(Arc::new(InMemoryJobStore::new()));
    let outcome = match runner.run(&orchestrator, &mut context).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };
    info!(job_id = %outcome.job_id, status = ?outcome.status, "Run finished");

    if let Some(path) = &args.save_search {
        if let Err(e) = search_cache_from(&context).save(path) {
            eprintln!("Warning: {:#}", e);
        }
    }

    let written = match &args.output {
        Some(path) => outcome.output.write_to(path).map(|_| {
            if !quiet {
                print!("{}", outcome.output);
            }
        }),
        None => outcome.output.to_json().map(|json| println!("{}", json)),
    };
    if let Err(e) = written {
        eprintln!("Error: {:#}", e);
        return EXIT_FAILURE;
    }

    if outcome.is_success() {
        EXIT_SUCCESS
    } else {
        for error in &outcome.output.errors {
            eprintln!("Error: {}", error);
        }
        EXIT_FAILURE
    }
}

/// Everything that can fail before the job starts: input, config, clients.
fn prepare_run(args: &RunArgs, quiet: bool) -> Result<(PipelineOrchestrator, PipelineContext)> {
    let input = load_input(&args.input)?;

    let mut config = AbxplanConfig::default();
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);

    let generator = StructuredGenerator::new(config.create_llm_client()?)
        .with_temperature(config.temperature)
        .with_logger(ExchangeLogger::new(config.exchange_log.clone()));
    let sessions = HttpSessionFactory::new(Duration::from_secs(config.request_timeout_secs))
        .context("Failed to create reference-site session factory")?;
    let pipeline_config = config.pipeline_config().with_enrich(!args.no_enrich);
    let mut services = PipelineServices::new(generator, Arc::new(sessions), pipeline_config);

    let mut context = PipelineContext::new(input).with_reporter(StageReporter::new(progress_handler(quiet)));
    match &args.sources {
        Some(path) => {
            let cache = SearchCache::load(path)?;
            info!(results = cache.search_results.len(), "Loaded cached search results");
            if !cache.search_query.is_empty() {
                context.search_query = Some(cache.search_query.clone());
            }
            context = context.with_sources(cache.search_results.into_iter().map(Into::into).collect());
        }
        None => {
            let search = config
                .create_search_client()
                .context("A search backend is required when --sources is not given")?;
            services = services.with_search(Arc::new(search));
        }
    }

    Ok((PipelineOrchestrator::new(services), context))
}

fn progress_handler(quiet: bool) -> Arc<dyn ProgressHandler> {
    if !quiet && std::io::stderr().is_terminal() {
        Arc::new(ProgressBarHandler::new())
    } else {
        Arc::new(LoggingHandler::new())
    }
}

pub fn load_input(path: &Path) -> Result<InputParameters> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input parameters {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse input parameters {}", path.display()))
}

pub fn apply_overrides(config: &mut AbxplanConfig, args: &RunArgs) {
    if let Some(provider) = &args.provider {
        config.provider = provider.trim().to_lowercase();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
}

/// Sources actually used by a run, in the cache format `--sources` reads.
pub fn search_cache_from(context: &PipelineContext) -> SearchCache {
    let hits = context
        .sources
        .iter()
        .map(|source: &SourceDocument| SearchHit {
            title: source.title.clone(),
            url: source.url.clone(),
            snippet: source.raw_text.clone(),
        })
        .collect();
    SearchCache::new(context.search_query.clone().unwrap_or_default(), hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn run_args(input: PathBuf) -> RunArgs {
        RunArgs {
            input,
            sources: None,
            output: None,
            save_search: None,
            provider: None,
            model: None,
            no_enrich: false,
        }
    }

    #[test]
    fn test_load_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(
            &path,
            r#"{"pathogens":[{"pathogen_name":"Staphylococcus aureus","pathogen_count":"10^5 CFU/ml"}],
                "resistant_genes":["mecA"],"systemic":true}"#,
        )
        .unwrap();

        let input = load_input(&path).unwrap();
        assert_eq!(input.pathogens[0].pathogen_name, "Staphylococcus aureus");
        assert_eq!(input.resistant_genes, vec!["mecA"]);
        assert_eq!(input.systemic, Some(true));
    }

    #[test]
    fn test_load_input_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_input(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
        assert!(load_input(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AbxplanConfig::default();
        let mut args = run_args(PathBuf::from("p.json"));
        args.provider = Some(" OpenAI ".to_string());
        args.model = Some("gpt-4o".to_string());

        apply_overrides(&mut config, &args);
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_search_cache_from_context() {
        let mut context = PipelineContext::new(InputParameters::default())
            .with_sources(vec![SourceDocument::new("https://a", "A", "text a")]);
        context.search_query = Some("query".to_string());

        let cache = search_cache_from(&context);
        assert_eq!(cache.search_query, "query");
        assert_eq!(cache.search_results.len(), 1);
        assert_eq!(cache.search_results[0].snippet, "text a");
    }

    #[tokio::test]
    async fn test_unreadable_input_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        let args = run_args(dir.path().join("missing.json"));
        assert_eq!(handle_run(&args, true).await, EXIT_USAGE);
    }
}
