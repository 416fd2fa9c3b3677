//! Graph descriptor building.
//!
//! The descriptor is static metadata the agent uses to render the RTT graph:
//! one non-stacked series per resolved endpoint, in endpoint order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::naming::metric_key;

/// Graph name the RTT metrics are published under.
pub const GRAPH_NAME: &str = "ping.rtt";

/// Graph title.
pub const GRAPH_TITLE: &str = "Ping Round Trip Times";

/// Graph unit.
pub const GRAPH_UNIT: &str = "float";

/// One time series in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    /// Metric key (see [`metric_key`]).
    pub key: String,
    /// Display label.
    pub label: String,
    /// Whether the series is stacked on the others.
    pub stacked: bool,
}

/// Static graph metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    /// Graph title shown by the agent.
    pub title: String,
    /// Value unit.
    pub unit: String,
    /// One series per endpoint, in endpoint order.
    pub series: Vec<SeriesDescriptor>,
}

/// Build the RTT graph for `endpoints`.
pub fn build_graph(endpoints: &[Endpoint]) -> GraphDescriptor {
    let series = endpoints
        .iter()
        .map(|endpoint| SeriesDescriptor {
            key: metric_key(&endpoint.address),
            label: endpoint.label.clone(),
            stacked: false,
        })
        .collect();

    GraphDescriptor {
        title: GRAPH_TITLE.to_string(),
        unit: GRAPH_UNIT.to_string(),
        series,
    }
}

/// Graph definitions keyed by graph name.
pub fn graph_definition(endpoints: &[Endpoint]) -> BTreeMap<String, GraphDescriptor> {
    BTreeMap::from([(GRAPH_NAME.to_string(), build_graph(endpoints))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_graph_metadata() {
        let graph = build_graph(&[Endpoint::new("127.0.0.1", "localhost")]);

        assert_eq!(graph.title, "Ping Round Trip Times");
        assert_eq!(graph.unit, "float");
        assert_eq!(
            graph.series,
            vec![SeriesDescriptor {
                key: "127_0_0_1".to_string(),
                label: "localhost".to_string(),
                stacked: false,
            }]
        );
    }

    #[test]
    fn test_build_graph_preserves_order_and_is_deterministic() {
        let endpoints = vec![
            Endpoint::new("8.8.8.8", "google-public-dns-a"),
            Endpoint::new("1.1.1.1", "cloudflare"),
            Endpoint::new("8.8.4.4", "google-public-dns-b"),
        ];

        let first = build_graph(&endpoints);
        let second = build_graph(&endpoints);
        assert_eq!(first, second);

        let keys: Vec<_> = first.series.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["8_8_8_8", "1_1_1_1", "8_8_4_4"]);
        assert!(first.series.iter().all(|s| !s.stacked));
    }

    #[test]
    fn test_build_graph_empty() {
        assert!(build_graph(&[]).series.is_empty());
    }

    #[test]
    fn test_graph_definition_single_graph() {
        let definition = graph_definition(&[Endpoint::new("10.0.0.1", "a")]);
        assert_eq!(definition.len(), 1);
        assert_eq!(definition[GRAPH_NAME].series.len(), 1);
    }
}
