//! Storage Module Tests
//!
//! Validates the shared table and the worker/primary store protocol.
//!
//! ## Test Scopes
//! - **SharedTable**: Local get/set/delete semantics and the atomic collection operations.
//! - **Framing**: Length-prefixed frames and the JSON shape of protocol messages.
//! - **RemoteStore**: Request correlation, fire-and-forget ordering, timeouts, closed channels
//!   and concurrent workers sharing one table (over in-memory duplex channels).

#[cfg(test)]
mod tests {
    use crate::storage::protocol::{
        MAX_FRAME_SIZE, StoreRequest, StoreResponse, read_frame, write_frame,
    };
    use crate::storage::{LocalStore, RemoteStore, SharedStore, SharedTable, StoreError, serve_channel};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Wires a `RemoteStore` to a primary serving `table` through an in-memory channel.
    fn connect_worker(table: Arc<SharedTable>, worker: usize, timeout: Duration) -> RemoteStore {
        let (worker_end, primary_end) = tokio::io::duplex(64 * 1024);

        let (primary_read, primary_write) = tokio::io::split(primary_end);
        tokio::spawn(serve_channel(primary_read, primary_write, table, worker));

        let (worker_read, worker_write) = tokio::io::split(worker_end);
        RemoteStore::connect(worker_read, worker_write, timeout)
    }

    // ============================================================
    // SHARED TABLE TESTS
    // ============================================================

    #[test]
    fn test_table_get_missing_key_returns_none() {
        let table = SharedTable::new();

        assert_eq!(table.get("users"), None);
    }

    #[test]
    fn test_table_set_then_get() {
        let table = SharedTable::new();

        table.set("greeting", json!("hello"));

        assert_eq!(table.get("greeting"), Some(json!("hello")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_delete_missing_key_is_noop() {
        let table = SharedTable::new();
        table.set("kept", json!(1));

        table.delete("missing");

        assert_eq!(table.get("kept"), Some(json!(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_append_creates_collection() {
        let table = SharedTable::new();

        table.append("users", json!({"id": "a"}));
        table.append("users", json!({"id": "b"}));

        assert_eq!(table.get("users"), Some(json!([{"id": "a"}, {"id": "b"}])));
    }

    #[test]
    fn test_table_append_replaces_non_collection() {
        let table = SharedTable::new();
        table.set("users", json!("not a list"));

        table.append("users", json!({"id": "a"}));

        assert_eq!(table.get("users"), Some(json!([{"id": "a"}])));
    }

    #[test]
    fn test_table_merge_by_id_keeps_unspecified_fields_and_id() {
        let table = SharedTable::new();
        table.append("users", json!({"id": "a", "username": "ann", "age": 30}));

        let merged = table.merge_by_id("users", "a", &json!({"age": 31, "id": "hijacked"}));

        assert_eq!(merged, Some(json!({"id": "a", "username": "ann", "age": 31})));
        assert_eq!(
            table.get("users"),
            Some(json!([{"id": "a", "username": "ann", "age": 31}]))
        );
    }

    #[test]
    fn test_table_merge_by_id_unknown_id_returns_none() {
        let table = SharedTable::new();
        table.append("users", json!({"id": "a"}));

        assert_eq!(table.merge_by_id("users", "b", &json!({"age": 1})), None);
        assert_eq!(table.merge_by_id("missing", "a", &json!({"age": 1})), None);
    }

    #[test]
    fn test_table_merge_by_id_rejects_non_object_patch() {
        let table = SharedTable::new();
        table.append("users", json!({"id": "a", "age": 30}));

        assert_eq!(table.merge_by_id("users", "a", &json!([1, 2])), None);
        assert_eq!(table.merge_by_id("users", "a", &json!("age=31")), None);
        assert_eq!(table.get("users"), Some(json!([{"id": "a", "age": 30}])));
    }

    #[test]
    fn test_table_remove_by_id() {
        let table = SharedTable::new();
        table.append("users", json!({"id": "a"}));
        table.append("users", json!({"id": "b"}));

        assert!(table.remove_by_id("users", "a"));
        assert!(!table.remove_by_id("users", "a"));
        assert!(!table.remove_by_id("missing", "b"));

        assert_eq!(table.get("users"), Some(json!([{"id": "b"}])));
    }

    #[test]
    fn test_table_apply_maps_requests_to_responses() {
        let table = SharedTable::new();

        let missing = table.apply(StoreRequest::Get {
            key: "users".to_string(),
        });
        assert_eq!(missing, StoreResponse::Value { value: None });

        let ack = table.apply(StoreRequest::Append {
            key: "users".to_string(),
            item: json!({"id": "a"}),
        });
        assert_eq!(ack, StoreResponse::Ack);

        let removed = table.apply(StoreRequest::RemoveById {
            key: "users".to_string(),
            id: "a".to_string(),
        });
        assert_eq!(removed, StoreResponse::Removed { found: true });
    }

    #[tokio::test]
    async fn test_local_store_delegates_to_table() {
        let table = Arc::new(SharedTable::new());
        let store = LocalStore::new(table.clone());

        store.set("k", json!([1, 2])).await.unwrap();
        store.delete("other").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!([1, 2])));
        assert_eq!(table.get("k"), Some(json!([1, 2])));
    }

    // ============================================================
    // FRAMING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_frame_read_empty_stream_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());

        let frame = read_frame(&mut cursor).await.unwrap();

        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_frame_read_oversized_returns_error() {
        let huge_len = (MAX_FRAME_SIZE + 1) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&huge_len.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        let result = read_frame(&mut cursor).await;

        assert!(matches!(result, Err(StoreError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_frame_carries_payload_intact() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"{\"op\":\"get\"}").await.unwrap();

        assert_eq!(&buf[..4], &12u32.to_be_bytes());

        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.as_deref(), Some(&b"{\"op\":\"get\"}"[..]));
    }

    #[test]
    fn test_request_wire_shape_is_tagged() {
        let request = StoreRequest::MergeById {
            key: "users".to_string(),
            id: "a".to_string(),
            patch: json!({"age": 2}),
        };

        let value: Value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["op"], "merge_by_id");
        assert_eq!(value["id"], "a");
        assert_eq!(value["patch"]["age"], 2);
    }

    // ============================================================
    // REMOTE STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_remote_get_missing_key_returns_none() {
        let table = Arc::new(SharedTable::new());
        let store = connect_worker(table, 1, TIMEOUT);

        assert_eq!(store.get("users").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remote_fire_and_forget_writes_are_ordered_before_later_reads() {
        // ARRANGE
        let table = Arc::new(SharedTable::new());
        let store = connect_worker(table.clone(), 1, TIMEOUT);

        // ACT: set/delete are not acknowledged, but travel on the same FIFO channel
        store.set("a", json!("one")).await.unwrap();
        store.set("b", json!("two")).await.unwrap();
        store.delete("b").await.unwrap();

        // ASSERT
        assert_eq!(store.get("a").await.unwrap(), Some(json!("one")));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(table.get("a"), Some(json!("one")));
    }

    #[tokio::test]
    async fn test_remote_atomic_operations_round_trip() {
        let table = Arc::new(SharedTable::new());
        let store = connect_worker(table.clone(), 1, TIMEOUT);

        store.append("users", json!({"id": "a", "age": 1})).await.unwrap();

        let merged = store.merge_by_id("users", "a", json!({"age": 2})).await.unwrap();
        assert_eq!(merged, Some(json!({"id": "a", "age": 2})));

        assert!(store.remove_by_id("users", "a").await.unwrap());
        assert!(!store.remove_by_id("users", "a").await.unwrap());
        assert_eq!(table.get("users"), Some(json!([])));
    }

    #[tokio::test]
    async fn test_remote_concurrent_gets_are_correlated_by_request_id() {
        // ARRANGE: distinct values under distinct keys
        let table = Arc::new(SharedTable::new());
        for i in 0..50 {
            table.set(&format!("key_{}", i), json!(i));
        }
        let store = Arc::new(connect_worker(table, 1, TIMEOUT));

        // ACT: many gets outstanding on the same channel at once
        let mut calls = tokio::task::JoinSet::new();
        for i in 0..50 {
            let store = store.clone();
            calls.spawn(async move { (i, store.get(&format!("key_{}", i)).await) });
        }

        // ASSERT: each caller receives its own reply
        while let Some(joined) = calls.join_next().await {
            let (i, result) = joined.unwrap();
            assert_eq!(result.unwrap(), Some(json!(i)));
        }
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_get_times_out_when_primary_never_replies() {
        // ARRANGE: keep the primary end open but never read from it
        let (worker_end, primary_end) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        let store = RemoteStore::connect(worker_read, worker_write, Duration::from_millis(50));

        // ACT
        let result = store.get("users").await;

        // ASSERT
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert!(result.unwrap_err().is_unavailable());
        assert_eq!(store.pending_count(), 0);

        drop(primary_end);
    }

    #[tokio::test]
    async fn test_remote_fails_fast_when_channel_is_closed() {
        // ARRANGE
        let (worker_end, primary_end) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        let store = RemoteStore::connect(worker_read, worker_write, Duration::from_secs(30));

        // ACT: the primary goes away
        drop(primary_end);
        tokio::time::timeout(Duration::from_secs(2), store.closed())
            .await
            .expect("link should be marked closed");

        // ASSERT
        assert!(store.is_closed());
        assert!(matches!(store.get("users").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.set("users", json!([])).await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_remote_cancelled_call_deregisters_pending_entry() {
        let (worker_end, primary_end) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        let store = RemoteStore::connect(worker_read, worker_write, Duration::from_secs(30));

        // The outer timeout drops the in-flight call before any reply can arrive
        let outcome = tokio::time::timeout(Duration::from_millis(50), store.get("users")).await;

        assert!(outcome.is_err());
        assert_eq!(store.pending_count(), 0);

        drop(primary_end);
    }

    #[tokio::test]
    async fn test_remote_oversized_reply_fails_only_that_call() {
        // ARRANGE: an entry whose encoded reply exceeds one frame
        let table = Arc::new(SharedTable::new());
        let chunk = "x".repeat(1024 * 1024);
        let blocks = MAX_FRAME_SIZE / chunk.len() + 1;
        table.set("users", Value::Array(vec![json!(chunk); blocks]));
        table.set("small", json!(1));
        let store = connect_worker(table, 1, TIMEOUT);

        // ACT
        let oversized = store.get("users").await;
        let small = store.get("small").await;

        // ASSERT: the failing call is a plain error and the channel keeps working
        assert!(matches!(oversized, Err(StoreError::Protocol(_))));
        assert!(!oversized.unwrap_err().is_unavailable());
        assert_eq!(small.unwrap(), Some(json!(1)));
        assert!(!store.is_closed());
    }

    #[tokio::test]
    async fn test_remote_oversized_request_fails_only_that_call() {
        let table = Arc::new(SharedTable::new());
        let store = connect_worker(table.clone(), 1, TIMEOUT);

        let oversized = store
            .append("users", json!("x".repeat(MAX_FRAME_SIZE + 1)))
            .await;
        store.append("users", json!({"id": "a"})).await.unwrap();

        assert!(matches!(oversized, Err(StoreError::Protocol(_))));
        assert_eq!(store.get("users").await.unwrap(), Some(json!([{"id": "a"}])));
        assert_eq!(store.pending_count(), 0);
        assert!(!store.is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_workers_do_not_lose_appends() {
        // ARRANGE: several workers sharing one authoritative table
        let table = Arc::new(SharedTable::new());
        let workers: Vec<Arc<RemoteStore>> = (1..=4)
            .map(|ordinal| Arc::new(connect_worker(table.clone(), ordinal, TIMEOUT)))
            .collect();

        // ACT: 100 appends spread across the workers, all in flight together
        let mut appends = tokio::task::JoinSet::new();
        for i in 0..100 {
            let store = workers[i % workers.len()].clone();
            appends.spawn(async move { store.append("users", json!({ "id": i.to_string() })).await });
        }
        while let Some(joined) = appends.join_next().await {
            joined.unwrap().unwrap();
        }

        // ASSERT: every append survived
        let users = workers[0].get("users").await.unwrap().unwrap();
        assert_eq!(users.as_array().map(Vec::len), Some(100));
    }
}
