//! Trace persistence: bounded in-memory retention, the append-only file
//! store, and the logger's redaction and swallow-on-failure behavior.

use agent_runtime::trace::{
    FileTraceStore, InMemoryTraceStore, RunType, TraceContext, TraceEntry, TraceEvent, TraceLogger,
    TraceStore,
};
use serde_json::json;
use std::sync::Arc;

fn root(operation: &str) -> TraceContext {
    TraceContext::create_root(RunType::Chat, operation, None, None, None)
}

#[tokio::test]
async fn in_memory_store_retains_entries_for_a_trace() {
    let store = InMemoryTraceStore::new(10);
    let ctx = root("chat");
    store
        .save(TraceEntry::new(&ctx, TraceEvent::TraceStart))
        .await
        .unwrap();
    store
        .save(TraceEntry::new(&ctx, TraceEvent::TraceEnd))
        .await
        .unwrap();
    let entries = store.get(&ctx.trace_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn in_memory_store_evicts_oldest_trace_once_full() {
    let store = InMemoryTraceStore::new(1);
    let first = root("first");
    let second = root("second");
    store.save(TraceEntry::new(&first, TraceEvent::TraceStart)).await.unwrap();
    store.save(TraceEntry::new(&second, TraceEvent::TraceStart)).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store.get(&first.trace_id).await.unwrap().is_empty());
    assert!(!store.get(&second.trace_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_writes_one_json_line_per_entry() {
    let dir = std::env::temp_dir().join(format!("agent-runtime-trace-test-{}", uuid::Uuid::new_v4()));
    let store = FileTraceStore::new(&dir);
    let ctx = root("chat");
    store.save(TraceEntry::new(&ctx, TraceEvent::TraceStart)).await.unwrap();
    store.save(TraceEntry::new(&ctx, TraceEvent::TraceEnd)).await.unwrap();

    let mut read_dir = tokio::fs::read_dir(&dir).await.unwrap();
    let mut found = false;
    while let Some(entry) = read_dir.next_entry().await.unwrap() {
        let contents = tokio::fs::read_to_string(entry.path()).await.unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["trace_id"], json!(ctx.trace_id));
        }
        found = true;
    }
    assert!(found, "expected a trace file to have been written");

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn logger_swallows_errors_from_a_failing_store() {
    struct AlwaysFails;

    #[async_trait::async_trait]
    impl TraceStore for AlwaysFails {
        async fn save(&self, _entry: TraceEntry) -> agent_runtime::Result<()> {
            Err(agent_runtime::Error::other("disk is on fire"))
        }
        async fn get(&self, _trace_id: &str) -> agent_runtime::Result<Vec<TraceEntry>> {
            Ok(Vec::new())
        }
        async fn count(&self) -> agent_runtime::Result<usize> {
            Ok(0)
        }
    }

    let logger = TraceLogger::new(Arc::new(AlwaysFails));
    let ctx = root("chat");
    // Must not panic even though every save fails.
    logger.trace_start(&ctx, Some(json!({"user_message": "hi"}))).await;
    logger.trace_end(&ctx, Some(json!({"response_preview": "hi there"})), 12, None).await;
}
