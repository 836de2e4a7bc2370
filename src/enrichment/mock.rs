//! Scripted browser sessions for tests
//!
//! Search navigations resolve to the scripted reference page for the drug in
//! the query. Page navigations serve the scripted text under `#content`.

use super::session::{BrowserSession, SessionError, SessionFactory};
use crate::model::normalize_name;
use async_trait::async_trait;
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

#[derive(Default)]
struct Script {
    pages: Mutex<HashMap<String, ScriptedPage>>,
    broken: Mutex<HashSet<String>>,
    visited: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Cloneable factory; clones share pages and counters.
#[derive(Clone, Default)]
pub struct ScriptedSessionFactory {
    script: Arc<Script>,
}

impl ScriptedSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, drug: &str, title: &str, text: &str) -> Self {
        let key = normalize_name(drug);
        let page = ScriptedPage {
            url: page_url(&key),
            title: title.to_string(),
            text: text.to_string(),
        };
        lock(&self.script.pages).insert(key, page);
        self
    }

    /// The search finds a page for `drug` but loading it fails.
    pub fn with_broken_page(self, drug: &str) -> Self {
        let key = normalize_name(drug);
        let page = ScriptedPage {
            url: page_url(&key),
            title: String::new(),
            text: String::new(),
        };
        lock(&self.script.pages).insert(key.clone(), page);
        lock(&self.script.broken).insert(key);
        self
    }

    pub fn opened(&self) -> usize {
        self.script.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.script.closed.load(Ordering::SeqCst)
    }

    /// Reference pages (not searches) that were loaded, in order.
    pub fn visited(&self) -> Vec<String> {
        lock(&self.script.visited).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

fn page_url(key: &str) -> String {
    format!("https://www.drugs.com/dosage/{}.html", key.replace(' ', "-"))
}

enum Loaded {
    Nothing,
    Search(Vec<String>),
    Page(ScriptedPage),
}

struct ScriptedSession {
    script: Arc<Script>,
    loaded: Loaded,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let parsed = Url::parse(url).map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if let Some((_, query)) = parsed.query_pairs().find(|(k, _)| k == "q") {
            let drug = query.split(" dosage ").next().unwrap_or_default();
            let links = lock(&self.script.pages)
                .get(&normalize_name(drug))
                .map(|p| vec![p.url.clone()])
                .unwrap_or_default();
            self.loaded = Loaded::Search(links);
            return Ok(());
        }

        let found = lock(&self.script.pages)
            .iter()
            .find(|(_, page)| page.url == url)
            .map(|(key, page)| (key.clone(), page.clone()));
        match found {
            Some((key, _)) if lock(&self.script.broken).contains(&key) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            Some((_, page)) => {
                lock(&self.script.visited).push(url.to_string());
                self.loaded = Loaded::Page(page);
                Ok(())
            }
            None => Err(SessionError::Navigation {
                url: url.to_string(),
                message: "404 Not Found".to_string(),
            }),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        match &self.loaded {
            Loaded::Page(_) if selector == "#content" => Ok(()),
            Loaded::Nothing => Err(SessionError::NoPage),
            _ => Err(SessionError::Timeout {
                selector: selector.to_string(),
                timeout,
            }),
        }
    }

    async fn extract_text(&mut self, _selector: Option<&str>) -> Result<String, SessionError> {
        match &self.loaded {
            Loaded::Page(page) => Ok(page.text.clone()),
            Loaded::Search(_) => Ok(String::new()),
            Loaded::Nothing => Err(SessionError::NoPage),
        }
    }

    async fn find_links(&mut self, _selector: &str) -> Result<Vec<String>, SessionError> {
        match &self.loaded {
            Loaded::Search(links) => Ok(links.clone()),
            Loaded::Page(_) => Ok(Vec::new()),
            Loaded::Nothing => Err(SessionError::NoPage),
        }
    }

    async fn page_title(&mut self) -> Result<Option<String>, SessionError> {
        match &self.loaded {
            Loaded::Page(page) => Ok(Some(page.title.clone())),
            _ => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.loaded = Loaded::Nothing;
        self.script.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, SessionError> {
        self.script.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            loaded: Loaded::Nothing,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
