//! Agent output rendering.
//!
//! Values are written one per line as `<graph>.<key>\t<value>\t<epoch>`.
//! Definitions are a `# mackerel-agent-plugin` header followed by a JSON
//! document describing every graph.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::Plugin;
use crate::error::Result;
use crate::graph::GraphDescriptor;

/// Environment toggle selecting definition output.
pub const PLUGIN_META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

const DEFINITIONS_HEADER: &str = "# mackerel-agent-plugin";

/// Whether the agent asked for graph definitions instead of values.
pub fn definitions_requested() -> bool {
    std::env::var_os(PLUGIN_META_ENV).is_some_and(|v| !v.is_empty())
}

/// Default temp file path for a host specification.
pub fn default_tempfile(hosts: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mackerel-plugin-ping-{hosts}"))
}

#[derive(Serialize)]
struct DefinitionsOutput<'a> {
    graphs: BTreeMap<&'a str, GraphOutput<'a>>,
}

#[derive(Serialize)]
struct GraphOutput<'a> {
    label: &'a str,
    unit: &'a str,
    metrics: Vec<MetricOutput<'a>>,
}

#[derive(Serialize)]
struct MetricOutput<'a> {
    name: &'a str,
    label: &'a str,
    diff: bool,
    stacked: bool,
}

/// Drives a [`Plugin`] and renders its output.
#[derive(Debug)]
pub struct PluginHelper<P> {
    plugin: P,
    tempfile: PathBuf,
}

impl<P: Plugin> PluginHelper<P> {
    /// Wrap `plugin`, recording `tempfile` for differential metrics.
    pub fn new(plugin: P, tempfile: impl Into<PathBuf>) -> Self {
        Self {
            plugin,
            tempfile: tempfile.into(),
        }
    }

    /// Temp file path. RTT metrics are not differential, so it is never written.
    pub fn tempfile(&self) -> &Path {
        &self.tempfile
    }

    /// Wrapped plugin.
    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Write definitions or values depending on [`PLUGIN_META_ENV`].
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<()> {
        if definitions_requested() {
            self.output_definitions(out)
        } else {
            self.output_values(out).await
        }
    }

    /// Fetch metrics and write them as value lines.
    pub async fn output_values<W: Write>(&self, out: &mut W) -> Result<()> {
        let stats = self.plugin.fetch_metrics().await?;
        let graphs = self.plugin.graph_definition();
        write_values(out, &graphs, &stats, Utc::now().timestamp())
    }

    /// Write graph definitions.
    pub fn output_definitions<W: Write>(&self, out: &mut W) -> Result<()> {
        write_definitions(out, &self.plugin.graph_definition())
    }
}

/// Write one line per defined series that has a value.
///
/// Keys without a series in any graph are not printed. Endpoints sharing an
/// address share a key, which is printed once.
fn write_values<W: Write>(
    out: &mut W,
    graphs: &BTreeMap<String, GraphDescriptor>,
    stats: &BTreeMap<String, f64>,
    now: i64,
) -> Result<()> {
    for (name, graph) in graphs {
        let mut printed = HashSet::new();
        for series in &graph.series {
            if !printed.insert(series.key.as_str()) {
                continue;
            }
            if let Some(value) = stats.get(&series.key) {
                writeln!(out, "{name}.{}\t{value:.6}\t{now}", series.key)?;
            }
        }
    }

    for key in stats.keys() {
        let defined = graphs
            .values()
            .any(|g| g.series.iter().any(|s| &s.key == key));
        if !defined {
            tracing::debug!(key = %key, "Metric has no graph series, not printed");
        }
    }

    Ok(())
}

fn write_definitions<W: Write>(
    out: &mut W,
    graphs: &BTreeMap<String, GraphDescriptor>,
) -> Result<()> {
    let output = DefinitionsOutput {
        graphs: graphs
            .iter()
            .map(|(name, graph)| {
                // First label wins for endpoints sharing an address.
                let mut seen = HashSet::new();
                let metrics = graph
                    .series
                    .iter()
                    .filter(|s| seen.insert(s.key.as_str()))
                    .map(|s| MetricOutput {
                        name: &s.key,
                        label: &s.label,
                        diff: false,
                        stacked: s.stacked,
                    })
                    .collect();
                (
                    name.as_str(),
                    GraphOutput {
                        label: &graph.title,
                        unit: &graph.unit,
                        metrics,
                    },
                )
            })
            .collect(),
    };

    writeln!(out, "{DEFINITIONS_HEADER}")?;
    serde_json::to_writer(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
