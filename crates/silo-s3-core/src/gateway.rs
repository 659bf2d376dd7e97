//! The gateway provider tying the coordinators to their collaborators.
//!
//! One [`Gateway`] is built at startup and shared across handler tasks;
//! the individual S3 operations are implemented in the [`crate::ops`]
//! submodules.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::layer::SharedObjectLayer;
use crate::notifications::Notifier;

/// The request coordinator set, one method per S3 operation.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) layer: SharedObjectLayer,
    pub(crate) notifier: Notifier,
    pub(crate) config: Arc<GatewayConfig>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway over the given object layer.
    #[must_use]
    pub fn new(layer: SharedObjectLayer, notifier: Notifier, config: GatewayConfig) -> Self {
        Self {
            layer,
            notifier,
            config: Arc::new(config),
        }
    }

    /// The gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
