//! In-memory catalog and store used by the unit tests.
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::{index_url, record_url, CatalogFetch};
use super::models::Character;
use crate::database_ops::db::CharacterStore;
use crate::errors::IngestError;

pub const BASE_URL: &str = "https://swapi.test/api/people";
pub const PLANET_URL: &str = "https://swapi.test/api/planets/1/";
pub const FILM_URL: &str = "https://swapi.test/api/films/1/";

/// Ordered record of fetch/persist activity shared between fakes.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == event)
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    docs: HashMap<String, Value>,
    delays_ms: HashMap<String, u64>,
    failing: HashSet<String>,
    hits: AtomicUsize,
    events: Option<EventLog>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` people, each referencing one planet and one film.
    pub fn people(count: u64) -> Self {
        let mut catalog = Self::new()
            .with_doc(&index_url(BASE_URL), json!({ "count": count }))
            .with_doc(PLANET_URL, json!({ "name": "Tatooine" }))
            .with_doc(FILM_URL, json!({ "title": "A New Hope" }));
        for id in 1..=count {
            catalog = catalog.with_doc(
                &record_url(BASE_URL, id),
                json!({
                    "name": format!("person {id}"),
                    "height": "172",
                    "homeworld": PLANET_URL,
                    "films": [FILM_URL],
                    "species": [],
                }),
            );
        }
        catalog
    }

    pub fn with_doc(mut self, url: &str, doc: Value) -> Self {
        self.docs.insert(url.to_string(), doc);
        self
    }

    pub fn with_delay(mut self, url: &str, ms: u64) -> Self {
        self.delays_ms.insert(url.to_string(), ms);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Logs `fetch start <url>` / `fetch end <url>` around every fetch.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogFetch for FakeCatalog {
    async fn fetch_json(&self, url: &str) -> Result<Value, IngestError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.push(format!("fetch start {url}"));
        }
        if let Some(ms) = self.delays_ms.get(url) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        let out = if self.failing.contains(url) {
            Err(IngestError::transport(url, "connection reset"))
        } else {
            self.docs
                .get(url)
                .cloned()
                .ok_or_else(|| IngestError::transport(url, "HTTP status 404 Not Found"))
        };
        if let Some(events) = &self.events {
            events.push(format!("fetch end {url}"));
        }
        out
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Character>>,
    commits: AtomicUsize,
    fail_writes: bool,
    write_delay_ms: u64,
    events: Option<EventLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Every write sleeps `ms` and logs `persist start <first name>` /
    /// `persist end <first name>`.
    pub fn slow(ms: u64, events: EventLog) -> Self {
        Self {
            write_delay_ms: ms,
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Character> {
        self.rows.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn initialize_storage(&self) -> Result<(), IngestError> {
        Ok(())
    }

    async fn persist_batch(&self, batch: &[Character]) -> Result<u64, IngestError> {
        let label = batch.first().map(|c| c.name.as_str()).unwrap_or_default();
        if let Some(events) = &self.events {
            events.push(format!("persist start {label}"));
        }
        if self.write_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.write_delay_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
        if self.fail_writes {
            return Err(IngestError::Storage("connection refused".into()));
        }
        self.rows.lock().unwrap().extend_from_slice(batch);
        self.commits.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.push(format!("persist end {label}"));
        }
        Ok(batch.len() as u64)
    }

    async fn shutdown_storage(&self) {}
}
