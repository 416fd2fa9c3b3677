//! Agent plugin boundary.
//!
//! - [`Plugin`]: what the agent-facing output layer needs from a metrics source
//! - [`PingPlugin`]: ICMP RTT plugin over resolved endpoints
//! - [`PluginHelper`]: renders values or graph definitions for the agent

mod output;

use std::collections::BTreeMap;

use crate::endpoint::{Endpoint, HostResolver, resolve};
use crate::error::Result;
use crate::graph::{GraphDescriptor, graph_definition};
use crate::probe::EchoProber;
use crate::sampler::Sampler;

pub use output::{PLUGIN_META_ENV, PluginHelper, default_tempfile, definitions_requested};

/// A metrics source the agent output layer can drive.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Collect one set of metric values keyed by metric key.
    async fn fetch_metrics(&self) -> Result<BTreeMap<String, f64>>;

    /// Static graph metadata keyed by graph name.
    fn graph_definition(&self) -> BTreeMap<String, GraphDescriptor>;
}

/// ICMP round-trip time plugin.
pub struct PingPlugin<P> {
    endpoints: Vec<Endpoint>,
    sampler: Sampler<P>,
}

impl<P> std::fmt::Debug for PingPlugin<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PingPlugin")
            .field("endpoints", &self.endpoints)
            .field("sampler", &self.sampler)
            .finish()
    }
}

impl<P: EchoProber> PingPlugin<P> {
    /// Create a plugin over already resolved endpoints.
    pub fn new(endpoints: Vec<Endpoint>, sampler: Sampler<P>) -> Self {
        Self { endpoints, sampler }
    }

    /// Resolve `hosts` and create a plugin over the result.
    ///
    /// # Errors
    /// Propagates resolution errors in strict mode.
    pub async fn from_host_spec(
        hosts: &str,
        strict: bool,
        resolver: &dyn HostResolver,
        sampler: Sampler<P>,
    ) -> Result<Self> {
        let endpoints = resolve(hosts, strict, resolver).await?;
        tracing::debug!(hosts = %hosts, endpoints = endpoints.len(), "Resolved endpoints");
        Ok(Self::new(endpoints, sampler))
    }

    /// Resolved endpoints in probe order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[async_trait::async_trait]
impl<P: EchoProber> Plugin for PingPlugin<P> {
    async fn fetch_metrics(&self) -> Result<BTreeMap<String, f64>> {
        self.sampler.fetch(&self.endpoints).await
    }

    fn graph_definition(&self) -> BTreeMap<String, GraphDescriptor> {
        graph_definition(&self.endpoints)
    }
}
