//! Snapshot builder: one filtered read of windows, outputs and focus.

use hyprdock_core::{Snapshot, SnapshotFilter};

use crate::{HyprClient, HyprError};

/// Fetches full snapshots on demand.
///
/// The three queries are separate round trips, so the active window may come
/// from a slightly later instant than the window list.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    client: HyprClient,
    filter: SnapshotFilter,
}

impl SnapshotBuilder {
    pub fn new(client: HyprClient, filter: SnapshotFilter) -> Self {
        Self { client, filter }
    }

    /// The underlying control client.
    pub fn client(&self) -> &HyprClient {
        &self.client
    }

    pub fn filter(&self) -> &SnapshotFilter {
        &self.filter
    }

    /// Replace the workspace filter (config reload).
    pub fn set_filter(&mut self, filter: SnapshotFilter) {
        self.filter = filter;
    }

    /// Fetch windows, outputs and the active window.
    ///
    /// Windows with an empty class or on an ignored workspace are dropped
    /// here; they are not an error.
    pub async fn build(&self) -> Result<Snapshot, HyprError> {
        let windows = self.client.clients().await?;
        let outputs = self.client.monitors().await?;
        let active = self.client.active_window().await?;

        let fetched = windows.len();
        let windows = self.filter.apply(windows);
        tracing::debug!(
            "Snapshot: {} windows ({} filtered), {} outputs, active {:?}",
            windows.len(),
            fetched - windows.len(),
            outputs.len(),
            active.as_ref().map(|a| a.address.as_str())
        );

        Ok(Snapshot {
            windows,
            outputs,
            active,
        })
    }
}
