//! Ping RTT Binary Entry Point
//!
//! Invoked by the monitoring agent on every collection cycle. Prints metric
//! values, or graph definitions when the agent sets the meta toggle.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ping_rtt::{
    AppConfig, PingPlugin, PluginHelper, Sampler, SurgeProber, SystemResolver,
    plugin::definitions_requested,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ping RTT - ICMP round-trip time metrics plugin
#[derive(Parser, Debug)]
#[command(name = "ping-rtt", version, about, long_about = None)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, env = "PING_RTT_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated IPv4 addresses or hostnames, each optionally `:label`
    #[arg(long, env = "PING_RTT_HOST")]
    host: Option<String>,

    /// Temp file name
    #[arg(long, env = "PING_RTT_TEMPFILE")]
    tempfile: Option<PathBuf>,

    /// Echo rounds per collection
    #[arg(long, env = "PING_RTT_COUNT", allow_negative_numbers = true)]
    count: Option<i64>,

    /// Wait time per round in milliseconds
    #[arg(long, env = "PING_RTT_WAIT_TIME")]
    wait_time: Option<u64>,

    /// Rounds an endpoint may miss and still be reported
    #[arg(long, env = "PING_RTT_ACCEPTABLE_MISSES")]
    acceptable_misses: Option<u32>,

    /// Fail when a hostname cannot be resolved instead of skipping it
    #[arg(long, env = "PING_RTT_STRICT")]
    strict: bool,
}

impl Cli {
    /// Load the config file (if any) and apply overrides (CLI > ENV > file).
    fn into_config(self) -> ping_rtt::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(tempfile) = self.tempfile {
            config.tempfile = Some(tempfile);
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(wait_ms) = self.wait_time {
            config.wait = Duration::from_millis(wait_ms);
        }
        if let Some(misses) = self.acceptable_misses {
            config.acceptable_misses = misses;
        }
        if self.strict {
            config.strict = true;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Stdout belongs to the agent; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ping_rtt=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ping_rtt::Result<()> {
    let config = cli.into_config()?;
    let sampling = config.sampling()?;

    tracing::debug!(
        host = %config.host,
        rounds = sampling.rounds,
        wait_ms = sampling.round_timeout.as_millis(),
        acceptable_misses = sampling.acceptable_misses,
        strict = config.strict,
        definitions = definitions_requested(),
        "Starting"
    );

    let sampler = Sampler::new(SurgeProber::new(), sampling)?;
    let plugin =
        PingPlugin::from_host_spec(&config.host, config.strict, &SystemResolver, sampler).await?;
    let helper = PluginHelper::new(plugin, config.tempfile_path());

    let mut stdout = std::io::stdout();
    helper.run(&mut stdout).await
}
