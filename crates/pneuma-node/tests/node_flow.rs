//! End-to-end node flow over the in-memory collaborators: pending file in,
//! anchored record out, payload retrievable through the read side.

use std::sync::Arc;

use serde_json::json;

use pneuma_ledger::MockLedger;
use pneuma_node::config::{StorageSettings, WatcherSettings};
use pneuma_node::watcher::DirectoryWatcher;
use pneuma_node::workflow::AnchoringWorkflow;
use pneuma_store::MemoryContentStore;

struct Node {
    _dir: tempfile::TempDir,
    storage: StorageSettings,
    store: Arc<MemoryContentStore>,
    ledger: Arc<MockLedger>,
    workflow: Arc<AnchoringWorkflow>,
    watcher: DirectoryWatcher,
}

fn node() -> Node {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageSettings {
        base_dir: dir.path().to_path_buf(),
    };
    let store = Arc::new(MemoryContentStore::new());
    let ledger = Arc::new(MockLedger::new());
    let workflow = Arc::new(AnchoringWorkflow::new(store.clone(), ledger.clone()));
    let watcher = DirectoryWatcher::new(workflow.clone(), &storage, &WatcherSettings::default());
    std::fs::create_dir_all(storage.pending_dir()).unwrap();
    Node {
        _dir: dir,
        storage,
        store,
        ledger,
        workflow,
        watcher,
    }
}

fn write_pending(node: &Node, name: &str, value: &serde_json::Value) {
    std::fs::write(
        node.storage.pending_dir().join(name),
        serde_json::to_string(value).unwrap(),
    )
    .unwrap();
}

fn record(device: &str, rate: f64) -> serde_json::Value {
    json!({
        "metadata": {"device_id": device, "firmware": "2.4.1"},
        "breathing_rate": rate,
        "samples": [0.42, 0.57, 0.61]
    })
}

#[tokio::test]
async fn pending_file_lands_on_ledger_and_reads_back() {
    let mut node = node();
    write_pending(&node, "a.json", &record("dev-1", 16.2));

    assert_eq!(node.watcher.tick().await, 1);
    assert_eq!(node.workflow.count().await, 1);

    // The anchored payload round-trips: input plus the stamped timestamp.
    let anchored = node.workflow.get(0).await.expect("record readable");
    assert_eq!(anchored.entry.device_id, "dev-1");
    assert_eq!(anchored.payload["metadata"]["device_id"], json!("dev-1"));
    assert_eq!(anchored.payload["breathing_rate"], json!(16.2));
    let stamped = anchored.payload["blockchain_timestamp"]
        .as_u64()
        .expect("timestamp stamped");
    assert_eq!(stamped, anchored.entry.timestamp);

    // JSON-equality with the input holds once the injected field is removed.
    let mut payload = anchored.payload.clone();
    payload.as_object_mut().unwrap().remove("blockchain_timestamp");
    assert_eq!(payload, record("dev-1", 16.2));
}

#[tokio::test]
async fn duplicate_file_contents_anchor_once() {
    let node = node();
    // Serial processing: the fingerprint check dedups the second file
    // against the anchor the first one just wrote.
    let settings = WatcherSettings {
        max_concurrency: 1,
        ..WatcherSettings::default()
    };
    let mut watcher = DirectoryWatcher::new(node.workflow.clone(), &node.storage, &settings);
    write_pending(&node, "a.json", &record("dev-1", 16.2));
    write_pending(&node, "b.json", &record("dev-1", 16.2));

    assert_eq!(watcher.tick().await, 2);

    // Both files archived, but only one store write and one ledger write.
    assert_eq!(node.store.put_count(), 1);
    assert_eq!(node.ledger.submit_count(), 1);
    assert_eq!(node.workflow.count().await, 1);

    let processed: Vec<_> = std::fs::read_dir(node.storage.processed_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(processed.len(), 2);
}

#[tokio::test]
async fn mixed_batch_processes_good_files_and_keeps_bad_ones() {
    let mut node = node();
    write_pending(&node, "a.json", &record("dev-1", 16.2));
    std::fs::write(node.storage.pending_dir().join("bad.json"), "{not json").unwrap();
    write_pending(&node, "z.json", &record("dev-2", 14.9));

    assert_eq!(node.watcher.tick().await, 2);
    assert_eq!(node.workflow.count().await, 2);

    let pending: Vec<_> = std::fs::read_dir(node.storage.pending_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(pending, vec!["bad.json".to_string()]);
}

#[tokio::test]
async fn list_all_hydrates_every_anchor() {
    let mut node = node();
    write_pending(&node, "a.json", &record("dev-1", 16.2));
    write_pending(&node, "b.json", &record("dev-2", 14.9));
    node.watcher.tick().await;

    let all = node.workflow.list_all().await;
    assert_eq!(all.len(), 2);
    for anchored in &all {
        assert!(anchored.payload["blockchain_timestamp"].is_u64());
    }
}
