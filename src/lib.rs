//! Ping RTT - ICMP Round-Trip Time Metrics
//!
//! This crate probes a configured set of IPv4 endpoints with ICMP echo
//! requests and reports the average round-trip time per endpoint as agent
//! plugin metrics. It can be used as a library, or run as the `ping-rtt`
//! executable invoked by a monitoring agent.
//!
//! # Architecture
//!
//! - **Endpoints**: host specification parsing and hostname resolution
//! - **Probe**: ICMP echo rounds over a shared socket (`surge-ping`)
//! - **Sampler**: multi-round accumulation with loss tolerance
//! - **Graph**: static graph metadata, one series per endpoint
//! - **Plugin**: value and definition output for the agent
//!
//! # Example
//!
//! ```rust,no_run
//! use ping_rtt::{PingPlugin, PluginHelper, Sampler, SamplingConfig, SurgeProber, SystemResolver};
//!
//! #[tokio::main]
//! async fn main() -> ping_rtt::Result<()> {
//!     let sampler = Sampler::new(SurgeProber::new(), SamplingConfig::default())?;
//!     let plugin = PingPlugin::from_host_spec("8.8.8.8:google", false, &SystemResolver, sampler).await?;
//!     let helper = PluginHelper::new(plugin, "/tmp/mackerel-plugin-ping");
//!     helper.run(&mut std::io::stdout()).await
//! }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod graph;
pub mod naming;
pub mod plugin;
pub mod probe;
pub mod sampler;

pub use config::{AppConfig, ConfigError};
pub use endpoint::{Endpoint, HostResolver, SystemResolver, is_ipv4_literal, resolve};
pub use error::{PingError, Result};
pub use graph::{GraphDescriptor, SeriesDescriptor, build_graph};
pub use naming::metric_key;
pub use plugin::{PingPlugin, Plugin, PluginHelper};
pub use probe::{EchoProber, ProbeError, Reply, SurgeProber};
pub use sampler::{Accumulator, Sampler, SamplingConfig};
