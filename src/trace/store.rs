//! Trace Store (C2): a minimal `save` contract plus two bundled
//! implementations — bounded in-memory, and append-only JSON-lines files
//! with size-based rotation.

use super::entry::TraceEntry;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Minimal trace persistence contract. Implementations MUST NOT let a save
/// failure propagate into the orchestrator (§4.2) — callers that need that
/// guarantee should route through [`crate::trace::logger::TraceLogger`],
/// which swallows and logs store errors itself.
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn save(&self, entry: TraceEntry) -> crate::Result<()>;

    /// All entries sharing `trace_id`, in insertion order, if retained.
    async fn get(&self, trace_id: &str) -> crate::Result<Vec<TraceEntry>>;

    async fn count(&self) -> crate::Result<usize>;
}

/// Holds up to `max_traces` distinct trace_ids in insertion order; on
/// overflow evicts the oldest trace and all of its entries. A single
/// mutex guards both save and read — throughput is not the goal (§4.2).
pub struct InMemoryTraceStore {
    max_traces: usize,
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    order: VecDeque<String>,
    entries: std::collections::HashMap<String, Vec<TraceEntry>>,
}

impl InMemoryTraceStore {
    pub fn new(max_traces: usize) -> Self {
        Self {
            max_traces: max_traces.max(1),
            inner: Mutex::new(InMemoryState::default()),
        }
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn save(&self, entry: TraceEntry) -> crate::Result<()> {
        let mut state = self.inner.lock().await;
        if !state.entries.contains_key(&entry.trace_id) {
            state.order.push_back(entry.trace_id.clone());
            if state.order.len() > self.max_traces {
                if let Some(evicted) = state.order.pop_front() {
                    state.entries.remove(&evicted);
                }
            }
        }
        state
            .entries
            .entry(entry.trace_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn get(&self, trace_id: &str) -> crate::Result<Vec<TraceEntry>> {
        let state = self.inner.lock().await;
        Ok(state.entries.get(trace_id).cloned().unwrap_or_default())
    }

    async fn count(&self) -> crate::Result<usize> {
        let state = self.inner.lock().await;
        Ok(state.order.len())
    }
}

/// Appends one JSON object per line under `directory`, named
/// `traces_YYYY-MM-DD.jsonl`, rotating to `traces_YYYY-MM-DD_HHMMSS.jsonl`
/// when the active file exceeds `max_file_bytes` (default 100 MB, §6).
pub struct FileTraceStore {
    directory: PathBuf,
    max_file_bytes: u64,
    state: Mutex<FileState>,
}

struct FileState {
    current_path: Option<PathBuf>,
}

pub const DEFAULT_ROTATION_BYTES: u64 = 100 * 1024 * 1024;

impl FileTraceStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_rotation(directory, DEFAULT_ROTATION_BYTES)
    }

    pub fn with_rotation(directory: impl Into<PathBuf>, max_file_bytes: u64) -> Self {
        Self {
            directory: directory.into(),
            max_file_bytes,
            state: Mutex::new(FileState { current_path: None }),
        }
    }

    fn dated_file_name() -> String {
        format!("traces_{}.jsonl", chrono::Utc::now().format("%Y-%m-%d"))
    }

    fn rotated_file_name() -> String {
        format!(
            "traces_{}.jsonl",
            chrono::Utc::now().format("%Y-%m-%d_%H%M%S")
        )
    }

    async fn active_path(&self, state: &mut FileState) -> crate::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Error::other(format!("failed to create trace directory: {e}")))?;

        if let Some(path) = &state.current_path {
            if let Ok(meta) = tokio::fs::metadata(path).await {
                if meta.len() < self.max_file_bytes {
                    return Ok(path.clone());
                }
            }
            let rotated = self.directory.join(Self::rotated_file_name());
            state.current_path = Some(rotated.clone());
            return Ok(rotated);
        }

        let path = self.directory.join(Self::dated_file_name());
        state.current_path = Some(path.clone());
        Ok(path)
    }
}

use crate::Error;

#[async_trait]
impl TraceStore for FileTraceStore {
    async fn save(&self, entry: TraceEntry) -> crate::Result<()> {
        let mut state = self.state.lock().await;
        let path = self.active_path(&mut state).await?;
        drop(state);

        let line = serde_json::to_string(&entry)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::other(format!("failed to open trace file: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::other(format!("failed to write trace entry: {e}")))?;
        file.write_all(b"\n")
            .await
            .map_err(|e| Error::other(format!("failed to write trace entry: {e}")))?;
        Ok(())
    }

    async fn get(&self, trace_id: &str) -> crate::Result<Vec<TraceEntry>> {
        let mut found = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(d) => d,
            Err(_) => return Ok(found),
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Ok(contents) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            for line in contents.lines() {
                if line.is_empty() {
                    continue;
                }
                // A trailing partial line from a concurrent writer is tolerated.
                if let Ok(parsed) = serde_json::from_str::<TraceEntry>(line) {
                    if parsed.trace_id == trace_id {
                        found.push(parsed);
                    }
                }
            }
        }
        Ok(found)
    }

    async fn count(&self) -> crate::Result<usize> {
        let mut ids = std::collections::HashSet::new();
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(d) => d,
            Err(_) => return Ok(0),
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Ok(contents) = tokio::fs::read_to_string(&path).await {
                for line in contents.lines() {
                    if let Ok(parsed) = serde_json::from_str::<TraceEntry>(line) {
                        ids.insert(parsed.trace_id);
                    }
                }
            }
        }
        Ok(ids.len())
    }
}
