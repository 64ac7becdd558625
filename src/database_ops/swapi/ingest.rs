use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use itertools::Itertools;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, instrument, warn};

use super::client::{fetch_count, fetch_record, CatalogFetch};
use super::models::{Character, RawRecord, REFERENCE_FIELDS};
use super::resolve::{resolve, ReferenceField};
use crate::database_ops::db::CharacterStore;
use crate::errors::IngestError;
use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_BASE_URL: &str = "https://swapi.py4e.com/api/people/";
pub const DEFAULT_CHUNK_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub base_url: String,
    pub chunk_size: usize,
}

impl IngestConfig {
    pub fn new(base_url: impl Into<String>, chunk_size: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::Config("chunk size must be at least 1".into()));
        }
        Ok(Self {
            base_url: base_url.into(),
            chunk_size,
        })
    }

    /// SWAPI_BASE_URL and INGEST_CHUNK_SIZE, with defaults.
    pub fn from_env() -> Result<Self, IngestError> {
        let base_url = env_opt("SWAPI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, env_parse("INGEST_CHUNK_SIZE", DEFAULT_CHUNK_SIZE))
    }
}

/// Consecutive id groups covering `1..=count`; only the last may be short.
pub fn chunk_ids(count: u64, chunk_size: usize) -> Vec<Vec<u64>> {
    if chunk_size == 0 {
        return Vec::new();
    }
    (1..=count)
        .chunks(chunk_size)
        .into_iter()
        .map(|chunk| chunk.collect())
        .collect()
}

/// Position of a chunk in the id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub first_id: u64,
    pub last_id: u64,
}

impl ChunkSpan {
    pub fn new(index: usize, ids: &[u64]) -> Self {
        Self {
            index,
            first_id: ids.first().copied().unwrap_or_default(),
            last_id: ids.last().copied().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Persist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub chunk: ChunkSpan,
    pub stage: Stage,
    pub reason: String,
}

/// Terminal state of one detached persistence unit.
#[derive(Debug)]
pub struct BatchOutcome {
    pub chunk: ChunkSpan,
    pub result: Result<u64, String>,
}

impl BatchOutcome {
    fn from_join(chunk: ChunkSpan, joined: Result<Result<u64, IngestError>, JoinError>) -> Self {
        let result = match joined {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(err)) => Err(err.to_string()),
            Err(join_err) => Err(format!("persistence unit aborted: {join_err}")),
        };
        Self { chunk, result }
    }
}

struct TrackedUnit {
    chunk: ChunkSpan,
    handle: JoinHandle<Result<u64, IngestError>>,
}

/// Starts detached persistence units and registers them with the paired
/// [`PersistTracker`]. Clones may be moved into units that spawn more work.
#[derive(Clone)]
pub struct BatchSpawner {
    tx: mpsc::UnboundedSender<TrackedUnit>,
}

impl BatchSpawner {
    pub fn spawn<Fut>(&self, chunk: ChunkSpan, unit: Fut)
    where
        Fut: Future<Output = Result<u64, IngestError>> + Send + 'static,
    {
        let handle = tokio::spawn(unit);
        if self.tx.send(TrackedUnit { chunk, handle }).is_err() {
            warn!(chunk = chunk.index, "persist tracker dropped; unit runs untracked");
        }
    }
}

/// Completion barrier for detached persistence units.
pub struct PersistTracker {
    rx: mpsc::UnboundedReceiver<TrackedUnit>,
}

pub fn persist_tracker() -> (BatchSpawner, PersistTracker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BatchSpawner { tx }, PersistTracker { rx })
}

impl PersistTracker {
    /// Waits until every spawner is dropped and every registered unit is
    /// terminal, including units registered while this is already waiting.
    pub async fn wait_all(mut self) -> Vec<BatchOutcome> {
        let mut pending = FuturesUnordered::new();
        let mut outcomes = Vec::new();
        let mut open = true;
        loop {
            tokio::select! {
                next = self.rx.recv(), if open => match next {
                    Some(TrackedUnit { chunk, handle }) => {
                        pending.push(async move { (chunk, handle.await) });
                    }
                    None => open = false,
                },
                Some((chunk, joined)) = pending.next(), if !pending.is_empty() => {
                    outcomes.push(BatchOutcome::from_join(chunk, joined));
                }
                else => break,
            }
        }
        outcomes
    }
}

/// Resolves every reference field of one record and builds its row.
pub async fn build_character<F>(fetch: &F, raw: &RawRecord) -> Result<Character, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    let record_url = raw.get("url").and_then(Value::as_str).unwrap_or("<record>");
    let fields = REFERENCE_FIELDS
        .iter()
        .map(|key| ReferenceField::from_value(record_url, key, raw.get(*key)))
        .collect::<Result<Vec<_>, _>>()?;
    let resolved = try_join_all(fields.iter().map(|field| resolve(fetch, field))).await?;
    let resolved: [String; 5] = resolved
        .try_into()
        .map_err(|_| IngestError::Config("reference field count mismatch".into()))?;
    Ok(Character::from_record(raw, resolved))
}

/// Resolves a chunk's records in order and writes them as one transaction.
/// Any resolution failure aborts the batch before the store is touched.
pub async fn persist_batch<F, S>(
    fetch: &F,
    store: &S,
    records: &[RawRecord],
) -> Result<u64, IngestError>
where
    F: CatalogFetch + ?Sized,
    S: CharacterStore + ?Sized,
{
    let mut batch = Vec::with_capacity(records.len());
    for raw in records {
        batch.push(build_character(fetch, raw).await?);
    }
    store.persist_batch(&batch).await
}

/// Fan-out/fan-in over one chunk. Records come back in id order.
async fn fetch_chunk<F>(
    fetch: &F,
    base_url: &str,
    ids: &[u64],
) -> Result<Vec<RawRecord>, IngestError>
where
    F: CatalogFetch + ?Sized,
{
    try_join_all(ids.iter().map(|id| fetch_record(fetch, base_url, *id))).await
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_count: u64,
    pub chunks: usize,
    pub records_fetched: usize,
    pub batches_persisted: usize,
    /// Chunks dropped because a record fetch failed.
    pub fetch_failed: usize,
    /// Batches whose resolution or write failed.
    pub persist_failed: usize,
    pub entities_written: u64,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, outcome: BatchOutcome) {
        match outcome.result {
            Ok(written) => {
                self.batches_persisted += 1;
                self.entities_written += written;
            }
            Err(reason) => {
                self.persist_failed += 1;
                self.failures.push(Failure {
                    chunk: outcome.chunk,
                    stage: Stage::Persist,
                    reason,
                });
            }
        }
    }

    pub fn log(&self, elapsed: Duration) {
        info!(
            total = self.total_count,
            chunks = self.chunks,
            records_fetched = self.records_fetched,
            batches_persisted = self.batches_persisted,
            fetch_failed = self.fetch_failed,
            persist_failed = self.persist_failed,
            entities_written = self.entities_written,
            elapsed_ms = elapsed.as_millis() as u64,
            "swapi ingest complete"
        );
        for f in &self.failures {
            warn!(
                chunk = f.chunk.index,
                first_id = f.chunk.first_id,
                last_id = f.chunk.last_id,
                stage = ?f.stage,
                reason = %f.reason,
                "chunk not persisted"
            );
        }
    }
}

/// Drives the whole ingest: index, chunked fetches, detached persistence, barrier.
///
/// Chunks are fetched strictly one after another; persistence of a chunk runs
/// detached and never blocks the next fetch. A failed chunk is recorded and
/// skipped. Only a failed index fetch aborts the run.
#[instrument(skip_all, fields(base_url = %config.base_url, chunk_size = config.chunk_size))]
pub async fn run<F, S>(
    fetch: Arc<F>,
    store: Arc<S>,
    config: &IngestConfig,
) -> Result<RunSummary, IngestError>
where
    F: CatalogFetch + 'static,
    S: CharacterStore + 'static,
{
    let total = fetch_count(fetch.as_ref(), &config.base_url).await?;
    info!(total, "catalog index fetched");

    let chunks = chunk_ids(total, config.chunk_size);
    let mut summary = RunSummary {
        total_count: total,
        chunks: chunks.len(),
        ..RunSummary::default()
    };

    let (spawner, tracker) = persist_tracker();
    for (index, ids) in chunks.iter().enumerate() {
        let span = ChunkSpan::new(index, ids);
        let records = match fetch_chunk(fetch.as_ref(), &config.base_url, ids).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    chunk = index,
                    first_id = span.first_id,
                    error = %err,
                    "chunk fetch failed; skipping"
                );
                summary.fetch_failed += 1;
                summary.failures.push(Failure {
                    chunk: span,
                    stage: Stage::Fetch,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        summary.records_fetched += records.len();
        debug!(chunk = index, records = records.len(), "chunk fetched; dispatching persist");

        let fetch = Arc::clone(&fetch);
        let store = Arc::clone(&store);
        spawner.spawn(span, async move {
            persist_batch(fetch.as_ref(), store.as_ref(), &records).await
        });
    }
    drop(spawner);

    for outcome in tracker.wait_all().await {
        summary.record(outcome);
    }
    summary.failures.sort_by_key(|f| f.chunk.index);
    Ok(summary)
}
