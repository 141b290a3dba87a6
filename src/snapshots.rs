// CRM object snapshots: one POST with a batch of object references, the
// raw JSON answer is handed back for display.

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{SnapshotBatch, SnapshotRequest};
use serde_json::Value;

const SNAPSHOTS_PATH: &str = "/webhooks/v4/snapshots/crm";

#[derive(Clone)]
pub struct SnapshotsClient {
    api: ApiClient,
}

impl SnapshotsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Request point-in-time snapshots. The response is returned as raw
    /// JSON for display.
    pub fn create(&self, requests: &[SnapshotRequest]) -> Result<Value> {
        self.api.post(
            SNAPSHOTS_PATH,
            &SnapshotBatch {
                snapshot_requests: requests,
            },
        )
    }
}
