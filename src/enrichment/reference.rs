//! Reference page discovery, validation and scraping

use super::session::{collapse_whitespace, BrowserSession, SessionError};
use crate::llm::StructuredGenerator;
use crate::retry::{RetryError, RetryPolicy};
use reqwest::Url;
use schemars::JsonSchema;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_REFERENCE_DOMAIN: &str = "drugs.com";
pub const DEFAULT_SEARCH_ENGINE_URL: &str = "https://html.duckduckgo.com/html/";

/// Where reference pages are looked up and which parts of them are read.
#[derive(Debug, Clone)]
pub struct ReferenceSite {
    pub domain: String,
    pub search_engine_url: String,
    pub content_selector: String,
    pub references_selector: String,
    pub wait_timeout: Duration,
}

impl Default for ReferenceSite {
    fn default() -> Self {
        Self {
            domain: DEFAULT_REFERENCE_DOMAIN.to_string(),
            search_engine_url: DEFAULT_SEARCH_ENGINE_URL.to_string(),
            content_selector: "#content".to_string(),
            references_selector: ".ddc-reference-list".to_string(),
            wait_timeout: Duration::from_secs(10),
        }
    }
}

/// Text scraped from one reference page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PageMatch {
    /// true when the page is about the named drug
    is_match: bool,
    reason: Option<String>,
}

impl ReferenceSite {
    pub fn search_url(&self, drug: &str) -> Result<String, SessionError> {
        let query = format!("{} dosage {}", drug, self.domain);
        Url::parse_with_params(&self.search_engine_url, &[("q", query.as_str())])
            .map(|u| u.to_string())
            .map_err(|e| SessionError::Navigation {
                url: self.search_engine_url.clone(),
                message: e.to_string(),
            })
    }

    /// First result on the reference domain whose path mentions "dosage", query stripped.
    pub fn pick_reference_link(&self, links: &[String]) -> Option<String> {
        links.iter().find_map(|link| {
            let mut url = unwrap_redirect(link)?;
            let host = url.host_str()?.to_ascii_lowercase();
            let on_domain = host == self.domain || host.ends_with(&format!(".{}", self.domain));
            if !on_domain || !url.path().to_ascii_lowercase().contains("dosage") {
                return None;
            }
            url.set_query(None);
            url.set_fragment(None);
            Some(url.to_string())
        })
    }

    /// Searches for the drug's reference page through the session.
    pub async fn find_reference(
        &self,
        session: &mut dyn BrowserSession,
        drug: &str,
        retry: &RetryPolicy,
    ) -> Result<Option<String>, SessionError> {
        let search_url = self.search_url(drug)?;

        // The session is shared across attempts; each attempt holds it exclusively.
        let cell = Mutex::new(session);
        let links = retry
            .run("reference_search", |_| {
                let (cell, search_url) = (&cell, search_url.as_str());
                async move {
                    let mut session = cell.lock().await;
                    session.navigate(search_url).await?;
                    let links = session.find_links("a").await?;
                    Ok::<_, SessionError>((!links.is_empty()).then_some(links))
                }
            })
            .await
            .map_err(RetryError::into_inner)?
            .unwrap_or_default();

        let found = self.pick_reference_link(&links);
        match &found {
            Some(url) => info!(drug, url = %url, "Found reference page"),
            None => warn!(drug, links = links.len(), "No reference page among search results"),
        }
        Ok(found)
    }

    /// Loads `url` and returns its main text, with the references block appended when present.
    pub async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        retry: &RetryPolicy,
    ) -> Result<ScrapedPage, SessionError> {
        navigate_with_retry(session, url, retry).await?;

        let selector = match session
            .wait_for(&self.content_selector, self.wait_timeout)
            .await
        {
            Ok(()) => Some(self.content_selector.as_str()),
            Err(e) => {
                debug!(url, error = %e, "Content element missing, reading whole page");
                None
            }
        };

        let mut text = collapse_whitespace(&session.extract_text(selector).await?);

        if session
            .wait_for(&self.references_selector, Duration::ZERO)
            .await
            .is_ok()
        {
            match session.extract_text(Some(&self.references_selector)).await {
                Ok(refs) if !refs.trim().is_empty() => {
                    text.push_str("\n\nReferences:\n");
                    text.push_str(&collapse_whitespace(&refs));
                }
                Ok(_) => {}
                Err(e) => debug!(url, error = %e, "Could not read references block"),
            }
        }

        let title = session.page_title().await.unwrap_or(None);
        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Asks the model whether a page title belongs to `drug`. Fails open.
pub async fn validate_reference(
    generator: &StructuredGenerator,
    drug: &str,
    title: Option<&str>,
) -> bool {
    let Some(title) = title.filter(|t| !t.trim().is_empty()) else {
        return true;
    };

    let prompt = format!(
        r#"TASK: confirm reference page

Does this web page title describe dosing for the antibiotic "{drug}"?
Page title: "{title}"

Answer is_match=false only when the page is clearly about a different drug.
Brand names, salts and combination products containing {drug} count as a match."#,
    );

    match generator.generate::<PageMatch>("validate_reference", &prompt).await {
        Ok(Some(answer)) => {
            if !answer.is_match {
                warn!(drug, title, reason = ?answer.reason, "Reference page rejected");
            }
            answer.is_match
        }
        Ok(None) => true,
        Err(e) => {
            warn!(drug, error = %e, "Reference validation failed, accepting page");
            true
        }
    }
}

async fn navigate_with_retry(
    session: &mut dyn BrowserSession,
    url: &str,
    retry: &RetryPolicy,
) -> Result<(), SessionError> {
    let cell = Mutex::new(session);
    retry
        .run("reference_navigate", |_| {
            let cell = &cell;
            async move { cell.lock().await.navigate(url).await.map(Some) }
        })
        .await
        .map_err(RetryError::into_inner)?;
    Ok(())
}

/// Resolves search-engine redirect links (`/l/?uddg=<target>`) to their target.
fn unwrap_redirect(link: &str) -> Option<Url> {
    let url = Url::parse(link).ok()?;
    let target = url
        .query_pairs()
        .find(|(k, _)| k == "uddg" || k == "u" || k == "url")
        .and_then(|(_, v)| Url::parse(&v).ok());
    Some(target.unwrap_or(url))
}
