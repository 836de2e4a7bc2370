use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::services::PipelineServices;
use crate::progress::Stage;
use crate::search::build_search_query;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// Fills `context.sources` from the search client unless sources were supplied.
pub struct SearchPhase;

#[async_trait]
impl WorkflowPhase for SearchPhase {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()> {
        let max_results = services.config.search_max_results;

        if !context.sources.is_empty() {
            context.sources.truncate(max_results);
            info!(sources = context.sources.len(), "Using supplied sources");
            context
                .reporter
                .report(Stage::Search, 100.0, format!("Using {} supplied sources", context.sources.len()));
            return Ok(());
        }

        let query = build_search_query(&context.input);
        context.search_query = Some(query.clone());

        match &services.search {
            Some(client) => {
                context
                    .reporter
                    .report(Stage::Search, 10.0, format!("Searching via {}", client.name()));
                match client.search(&query, max_results).await {
                    Ok(hits) => {
                        context.sources = hits
                            .into_iter()
                            .take(max_results)
                            .map(Into::into)
                            .collect();
                        info!(sources = context.sources.len(), "Search returned sources");
                    }
                    Err(e) => warn!(error = %e, "Search failed"),
                }
            }
            None => warn!("No search client configured and no sources supplied"),
        }

        if context.sources.is_empty() {
            bail!("No sources found for query: {}", query);
        }

        context
            .reporter
            .report(Stage::Search, 100.0, format!("Found {} sources", context.sources.len()));
        Ok(())
    }
}
