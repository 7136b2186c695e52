//! Swappable handle to the current node.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::blockchain::client::NodeRpc;

/// Shared, replaceable reference to the node every component talks to.
///
/// Clones share the slot, so a [`NodeEndpoint::replace`] is observed by the
/// next call of every holder. Calls already in flight finish on the old node.
#[derive(Clone)]
pub struct NodeEndpoint {
    current: Arc<ArcSwap<Arc<dyn NodeRpc>>>,
}

impl NodeEndpoint {
    pub fn new(rpc: Arc<dyn NodeRpc>) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(rpc)),
        }
    }

    /// The node to use for the next call.
    pub fn rpc(&self) -> Arc<dyn NodeRpc> {
        let guard = self.current.load();
        Arc::clone(&**guard)
    }

    /// Point every holder at a different node.
    pub fn replace(&self, rpc: Arc<dyn NodeRpc>) {
        self.current.store(Arc::new(rpc));
    }
}

impl std::fmt::Debug for NodeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEndpoint").finish_non_exhaustive()
    }
}
