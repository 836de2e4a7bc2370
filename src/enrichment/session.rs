//! Browser-style session capability and its HTTP implementation
//!
//! A session is owned by exactly one enrichment task. [`SessionFactory::open`]
//! creates it and the task must call [`BrowserSession::close`] when done,
//! whether or not the work succeeded.

use crate::llm::BackendError;
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {}s waiting for '{selector}'", .timeout.as_secs())]
    Timeout { selector: String, timeout: Duration },

    #[error("No page loaded")]
    NoPage,

    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("Session unavailable: {0}")]
    Unavailable(String),
}

impl From<BackendError> for SessionError {
    fn from(e: BackendError) -> Self {
        SessionError::Unavailable(e.to_string())
    }
}

/// Navigation and extraction on one isolated page context.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Waits until `selector` is present on the current page.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Visible text of the element matching `selector`, or of the whole page.
    async fn extract_text(&mut self, selector: Option<&str>) -> Result<String, SessionError>;

    /// Absolute link targets inside the elements matching `selector`.
    async fn find_links(&mut self, selector: &str) -> Result<Vec<String>, SessionError>;

    async fn page_title(&mut self) -> Result<Option<String>, SessionError>;

    async fn close(&mut self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError>;

    fn name(&self) -> &str;
}

/// Plain HTTP session: fetches pages with reqwest and reads them with
/// `scraper`. No script execution.
///
/// The page is kept as source text and parsed per call; a parsed document is
/// not `Send` and must not live across an await.
pub struct HttpSession {
    http: reqwest::Client,
    current_url: Option<Url>,
    html: Option<String>,
}

impl HttpSession {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            current_url: None,
            html: None,
        }
    }

    fn page(&self) -> Result<&str, SessionError> {
        self.html.as_deref().ok_or(SessionError::NoPage)
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let nav_err = |message: String| SessionError::Navigation {
            url: url.to_string(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| nav_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(nav_err(format!("HTTP {}", status.as_u16())));
        }

        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(|e| nav_err(e.to_string()))?;
        debug!(url = %final_url, bytes = body.len(), "Page loaded");

        self.current_url = Some(final_url);
        self.html = Some(body);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        let parsed = parse_selector(selector)?;
        // Static HTML: the element is either in the document or never will be.
        if Html::parse_document(self.page()?).select(&parsed).next().is_some() {
            Ok(())
        } else {
            Err(SessionError::Timeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    async fn extract_text(&mut self, selector: Option<&str>) -> Result<String, SessionError> {
        let document = Html::parse_document(self.page()?);
        let scoped = match selector {
            Some(sel) => document.select(&parse_selector(sel)?).next(),
            None => None,
        };
        Ok(visible_text(scoped.unwrap_or_else(|| document.root_element())))
    }

    async fn find_links(&mut self, selector: &str) -> Result<Vec<String>, SessionError> {
        let scope = parse_selector(selector)?;
        let anchors = parse_selector("a[href]")?;
        let document = Html::parse_document(self.page()?);
        let base = self.current_url.as_ref();

        let mut links = Vec::new();
        for element in document.select(&scope) {
            let own = element.value().attr("href").map(|_| element);
            for anchor in own.into_iter().chain(element.select(&anchors)) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let resolved = match base {
                    Some(base) => base.join(href.trim()).ok(),
                    None => Url::parse(href.trim()).ok(),
                };
                if let Some(url) = resolved.map(|u| u.to_string()) {
                    if !links.contains(&url) {
                        links.push(url);
                    }
                }
            }
        }
        Ok(links)
    }

    async fn page_title(&mut self) -> Result<Option<String>, SessionError> {
        let title = parse_selector("title")?;
        let document = Html::parse_document(self.page()?);
        Ok(document
            .select(&title)
            .next()
            .map(visible_text)
            .filter(|t| !t.is_empty()))
    }

    async fn close(&mut self) {
        self.current_url = None;
        self.html = None;
    }
}

/// Hands out one [`HttpSession`] per task.
pub struct HttpSessionFactory {
    http: reqwest::Client,
}

impl HttpSessionFactory {
    pub fn new(timeout: Duration) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; abxplan/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        Ok(Box::new(HttpSession::new(self.http.clone())))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Elements whose text never renders.
const INVISIBLE: &[&str] = &["script", "style", "noscript", "svg", "template", "head"];

fn parse_selector(selector: &str) -> Result<Selector, SessionError> {
    Selector::parse(selector.trim()).map_err(|_| SessionError::InvalidSelector(selector.to_string()))
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    if INVISIBLE.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        } else if let Some(text) = child.value().as_text() {
            out.push(&**text);
        }
    }
}

/// Rendered text under `element` with whitespace collapsed. Entities come
/// out decoded.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    collect_text(element, &mut pieces);
    collapse_whitespace(&pieces.join(" "))
}

/// Rendered text of a whole HTML document or fragment.
pub fn html_to_text(html: &str) -> String {
    visible_text(Html::parse_document(html).root_element())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
