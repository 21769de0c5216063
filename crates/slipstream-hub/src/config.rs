//! Hub configuration.

/// Configuration for hub behavior.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each connection's outbound frame queue.
    ///
    /// Broadcast enqueues never block: a recipient whose queue is full
    /// is treated exactly like one whose socket died, and is removed
    /// from the session. Size this for the burst a healthy client may
    /// lag behind, not for a permanently slow one.
    pub outbound_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
        }
    }
}
