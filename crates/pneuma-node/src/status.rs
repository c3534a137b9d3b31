//! # Ledger Status
//!
//! Periodic observability snapshot: total anchored records plus node
//! identity. Printed as JSON by the CLI `test` mode and logged by the
//! status poller task while monitoring.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::NodeIdentity;
use crate::workflow::AnchoringWorkflow;

/// A point-in-time view of the ledger from this node.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    /// Total anchored records (0 if the ledger is unreadable).
    pub total_records: u64,
    /// Operator-assigned node id.
    pub node_id: String,
    /// Network name from configuration.
    pub network: String,
    /// Snapshot time, RFC 3339 UTC.
    pub last_updated: String,
}

impl LedgerStatus {
    /// Take a snapshot via the workflow's advisory counter.
    pub async fn snapshot(workflow: &AnchoringWorkflow, identity: &NodeIdentity) -> Self {
        Self {
            total_records: workflow.count().await,
            node_id: identity.id.clone(),
            network: identity.network.clone(),
            last_updated: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Log a ledger status snapshot on a fixed interval, forever.
///
/// Runs as its own tokio task so an in-flight anchor cannot stall it.
pub async fn run_status_poller(
    workflow: Arc<AnchoringWorkflow>,
    identity: NodeIdentity,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let status = LedgerStatus::snapshot(&workflow, &identity).await;
        tracing::info!(
            total_records = status.total_records,
            node_id = %status.node_id,
            network = %status.network,
            "ledger status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pneuma_ledger::MockLedger;
    use pneuma_store::MemoryContentStore;

    #[tokio::test]
    async fn snapshot_reports_identity_and_count() {
        let store = Arc::new(MemoryContentStore::new());
        let ledger = Arc::new(MockLedger::new());
        let workflow = AnchoringWorkflow::new(store, ledger);
        let identity = NodeIdentity {
            id: "pc2-node-01".to_string(),
            network: "mock".to_string(),
        };

        let status = LedgerStatus::snapshot(&workflow, &identity).await;
        assert_eq!(status.total_records, 0);
        assert_eq!(status.node_id, "pc2-node-01");
        assert_eq!(status.network, "mock");
        assert!(!status.last_updated.is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_ledger_outage() {
        let store = Arc::new(MemoryContentStore::new());
        let ledger = Arc::new(MockLedger::new());
        ledger.set_failing(true);
        let workflow = AnchoringWorkflow::new(store, ledger);
        let identity = NodeIdentity {
            id: "pc2-node-01".to_string(),
            network: "mock".to_string(),
        };

        let status = LedgerStatus::snapshot(&workflow, &identity).await;
        assert_eq!(status.total_records, 0);
    }
}
