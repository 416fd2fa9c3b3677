//! Multi-round sampling engine.
//!
//! Drives an [`EchoProber`] for a configured number of rounds, accumulates
//! per-key RTT sums and counts, and reduces them under a loss-tolerance
//! policy. Rounds run strictly one after another; each round's replies are
//! drained from a channel into a single [`Accumulator`] owned by the fetch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::{PingError, Result};
use crate::naming::metric_key;
use crate::probe::{EchoProber, Reply};

/// Default number of rounds per fetch.
pub const DEFAULT_ROUNDS: u32 = 1;

/// Default per-round wait (1 second).
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(1);

/// Sampling parameters for one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Rounds per fetch (must be positive).
    pub rounds: u32,
    /// Deadline for each round.
    pub round_timeout: Duration,
    /// Rounds an endpoint may miss and still report a value.
    pub acceptable_misses: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            acceptable_misses: 0,
        }
    }
}

impl SamplingConfig {
    /// Build a config from a signed round count.
    ///
    /// # Errors
    /// Returns `PingError::InvalidConfig` when `rounds` is zero or negative.
    pub fn new(rounds: i64, round_timeout: Duration, acceptable_misses: u32) -> Result<Self> {
        let rounds = u32::try_from(rounds)
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| {
                PingError::InvalidConfig(format!("round count must be positive, got {rounds}"))
            })?;

        let config = Self {
            rounds,
            round_timeout,
            acceptable_misses,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the sampling parameters.
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(PingError::InvalidConfig(
                "round count must be positive".to_string(),
            ));
        }
        if self.round_timeout.is_zero() {
            return Err(PingError::InvalidConfig(
                "round timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Minimum number of replies an endpoint needs to be reported.
    pub fn required_replies(&self) -> u32 {
        self.rounds.saturating_sub(self.acceptable_misses)
    }
}

/// Per-key RTT sums and reply counts for one fetch cycle.
#[derive(Debug, Default)]
pub struct Accumulator {
    sums: HashMap<String, f64>,
    counts: HashMap<String, u32>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reply, in fractional milliseconds.
    ///
    /// Replies from addresses outside the target set are recorded under
    /// their own key.
    pub fn record(&mut self, reply: &Reply) {
        let key = metric_key(&reply.address.to_string());
        let rtt_ms = reply.rtt.as_nanos() as f64 / 1_000_000.0;

        *self.sums.entry(key.clone()).or_insert(0.0) += rtt_ms;
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Number of replies recorded for `key`.
    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Average RTT per key for keys with at least `required` replies.
    pub fn reduce(&self, required: u32) -> BTreeMap<String, f64> {
        self.counts
            .iter()
            .filter(|&(_, &count)| count > 0 && count >= required)
            .filter_map(|(key, &count)| {
                self.sums
                    .get(key)
                    .map(|sum| (key.clone(), sum / f64::from(count)))
            })
            .collect()
    }
}

/// Sampling engine bound to one echo prober.
pub struct Sampler<P> {
    prober: P,
    config: SamplingConfig,
}

impl<P> std::fmt::Debug for Sampler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: EchoProber> Sampler<P> {
    /// Create a sampler.
    ///
    /// # Errors
    /// Returns `PingError::InvalidConfig` if `config` does not validate.
    pub fn new(prober: P, config: SamplingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { prober, config })
    }

    /// Sampling parameters in use.
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Run all rounds against `endpoints` and reduce to averaged RTTs.
    ///
    /// # Errors
    /// Returns `PingError::ProbeDispatch` if any round cannot be dispatched;
    /// no partial result is produced in that case.
    pub async fn fetch(&self, endpoints: &[Endpoint]) -> Result<BTreeMap<String, f64>> {
        let targets = probe_targets(endpoints);
        let mut acc = Accumulator::new();

        for round in 0..self.config.rounds {
            self.run_round(&targets, round, &mut acc).await?;
        }

        let required = self.config.required_replies();
        let stats = acc.reduce(required);

        for endpoint in endpoints {
            let key = metric_key(&endpoint.address);
            if !stats.contains_key(&key) {
                tracing::warn!(
                    address = %endpoint.address,
                    label = %endpoint.label,
                    replies = acc.count(&key),
                    required,
                    "Omitting endpoint below reply threshold"
                );
            }
        }

        Ok(stats)
    }

    async fn run_round(&self, targets: &[Ipv4Addr], round: u32, acc: &mut Accumulator) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Sequence numbers wrap at u16.
        let probe = self
            .prober
            .run_round(targets, self.config.round_timeout, round as u16, tx);
        let collect = async {
            let mut received = 0usize;
            while let Some(reply) = rx.recv().await {
                tracing::debug!(address = %reply.address, rtt = ?reply.rtt, round, "Echo reply");
                acc.record(&reply);
                received += 1;
            }
            received
        };

        let (result, received) = tokio::join!(probe, collect);
        result?;

        tracing::debug!(round, targets = targets.len(), received, "Round complete");
        Ok(())
    }
}

/// Distinct probe addresses in endpoint order.
///
/// Addresses that pass the literal check but are not valid IPv4 (e.g.
/// `999.0.0.1`) cannot be probed and are left out, so they never reply.
fn probe_targets(endpoints: &[Endpoint]) -> Vec<Ipv4Addr> {
    let mut seen = HashSet::new();
    endpoints
        .iter()
        .filter_map(|endpoint| match endpoint.address.parse::<Ipv4Addr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(address = %endpoint.address, "Address cannot be probed");
                None
            }
        })
        .filter(|ip| seen.insert(*ip))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc::UnboundedSender;

    use super::*;
    use crate::probe::ProbeError;

    fn reply(address: [u8; 4], ms: u64) -> Reply {
        Reply {
            address: Ipv4Addr::from(address),
            rtt: Duration::from_millis(ms),
        }
    }

    /// Prober replaying a fixed list of replies per round.
    ///
    /// Replies are sent from a spawned task to mimic delivery from another
    /// execution context.
    struct ScriptedProber {
        rounds: Mutex<VecDeque<Vec<Reply>>>,
        fail_on_round: Option<u16>,
        calls: AtomicUsize,
        seen_targets: Mutex<Vec<Vec<Ipv4Addr>>>,
    }

    impl ScriptedProber {
        fn new(rounds: Vec<Vec<Reply>>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into()),
                fail_on_round: None,
                calls: AtomicUsize::new(0),
                seen_targets: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, round: u16) -> Self {
            self.fail_on_round = Some(round);
            self
        }
    }

    #[async_trait::async_trait]
    impl EchoProber for ScriptedProber {
        async fn run_round(
            &self,
            targets: &[Ipv4Addr],
            _deadline: Duration,
            round: u16,
            replies: UnboundedSender<Reply>,
        ) -> Result<(), ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_targets.lock().unwrap().push(targets.to_vec());

            if self.fail_on_round == Some(round) {
                return Err(ProbeError::Socket(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "operation not permitted",
                )));
            }

            let batch = self.rounds.lock().unwrap().pop_front().unwrap_or_default();
            tokio::spawn(async move {
                for r in batch {
                    replies.send(r).unwrap();
                }
            })
            .await
            .unwrap();
            Ok(())
        }
    }

    fn config(rounds: u32, acceptable_misses: u32) -> SamplingConfig {
        SamplingConfig {
            rounds,
            round_timeout: Duration::from_millis(100),
            acceptable_misses,
        }
    }

    fn endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("10.0.0.1", "first"),
            Endpoint::new("10.0.0.2", "second"),
        ]
    }

    #[test]
    fn test_sampling_config_rejects_non_positive_rounds() {
        for rounds in [0, -1, -100] {
            let result = SamplingConfig::new(rounds, Duration::from_secs(1), 0);
            assert!(matches!(result, Err(PingError::InvalidConfig(_))));
        }
        assert!(SamplingConfig::new(3, Duration::from_secs(1), 1).is_ok());
    }

    #[test]
    fn test_sampling_config_rejects_zero_timeout() {
        let result = SamplingConfig::new(1, Duration::ZERO, 0);
        assert!(matches!(result, Err(PingError::InvalidConfig(_))));
    }

    #[test]
    fn test_required_replies() {
        assert_eq!(config(3, 0).required_replies(), 3);
        assert_eq!(config(3, 1).required_replies(), 2);
        assert_eq!(config(3, 3).required_replies(), 0);
        assert_eq!(config(3, 10).required_replies(), 0);
    }

    #[test]
    fn test_accumulator_fractional_milliseconds() {
        let mut acc = Accumulator::new();
        acc.record(&Reply {
            address: Ipv4Addr::new(127, 0, 0, 1),
            rtt: Duration::from_nanos(1_234_567),
        });
        let stats = acc.reduce(1);
        assert_eq!(acc.count("127_0_0_1"), 1);
        assert!((stats["127_0_0_1"] - 1.234567).abs() < 1e-12);
    }

    #[test]
    fn test_accumulator_reduce_threshold() {
        let mut acc = Accumulator::new();
        acc.record(&reply([10, 0, 0, 1], 10));
        acc.record(&reply([10, 0, 0, 1], 20));
        acc.record(&reply([10, 0, 0, 2], 50));

        let stats = acc.reduce(2);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["10_0_0_1"], 15.0);
    }

    #[test]
    fn test_accumulator_reduce_zero_threshold_needs_one_reply() {
        let acc = Accumulator::new();
        assert!(acc.reduce(0).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_applies_loss_tolerance() {
        let prober = ScriptedProber::new(vec![
            vec![reply([10, 0, 0, 1], 10), reply([10, 0, 0, 2], 5)],
            vec![reply([10, 0, 0, 1], 20)],
            vec![],
        ]);
        let sampler = Sampler::new(prober, config(3, 1)).unwrap();

        let stats = sampler.fetch(&endpoints()).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["10_0_0_1"], 15.0);
        assert!(!stats.contains_key("10_0_0_2"));
        assert_eq!(sampler.prober.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_zero_misses_requires_every_round() {
        let prober = ScriptedProber::new(vec![
            vec![reply([10, 0, 0, 1], 4), reply([10, 0, 0, 2], 8)],
            vec![reply([10, 0, 0, 1], 6)],
        ]);
        let sampler = Sampler::new(prober, config(2, 0)).unwrap();

        let stats = sampler.fetch(&endpoints()).await.unwrap();
        assert_eq!(stats, BTreeMap::from([("10_0_0_1".to_string(), 5.0)]));
    }

    #[tokio::test]
    async fn test_fetch_misses_at_least_rounds_accepts_single_reply() {
        let prober = ScriptedProber::new(vec![vec![], vec![], vec![reply([10, 0, 0, 2], 9)]]);
        let sampler = Sampler::new(prober, config(3, 3)).unwrap();

        let stats = sampler.fetch(&endpoints()).await.unwrap();
        assert_eq!(stats, BTreeMap::from([("10_0_0_2".to_string(), 9.0)]));
    }

    #[tokio::test]
    async fn test_fetch_records_unsolicited_replies() {
        let prober = ScriptedProber::new(vec![vec![
            reply([10, 0, 0, 1], 3),
            reply([192, 168, 1, 1], 7),
        ]]);
        let sampler = Sampler::new(prober, config(1, 0)).unwrap();

        let stats = sampler.fetch(&endpoints()).await.unwrap();
        assert_eq!(stats["10_0_0_1"], 3.0);
        assert_eq!(stats["192_168_1_1"], 7.0);
    }

    #[tokio::test]
    async fn test_fetch_dispatch_failure_aborts_cycle() {
        let prober = ScriptedProber::new(vec![vec![reply([10, 0, 0, 1], 3)]]).failing_on(1);
        let sampler = Sampler::new(prober, config(3, 2)).unwrap();

        let result = sampler.fetch(&endpoints()).await;
        assert!(matches!(result, Err(PingError::ProbeDispatch(_))));
        assert_eq!(sampler.prober.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_dedupes_and_skips_unprobeable_targets() {
        let prober = ScriptedProber::new(vec![vec![]]);
        let sampler = Sampler::new(prober, config(1, 0)).unwrap();
        let endpoints = vec![
            Endpoint::new("10.0.0.1", "a"),
            Endpoint::new("999.0.0.1", "bogus"),
            Endpoint::new("10.0.0.1", "a-again"),
            Endpoint::new("10.0.0.2", "b"),
        ];

        let stats = sampler.fetch(&endpoints).await.unwrap();
        assert!(stats.is_empty());
        assert_eq!(
            *sampler.prober.seen_targets.lock().unwrap(),
            vec![vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]]
        );
    }

    #[tokio::test]
    async fn test_fetch_state_does_not_leak_between_cycles() {
        let prober = ScriptedProber::new(vec![vec![reply([10, 0, 0, 1], 10)], vec![]]);
        let sampler = Sampler::new(prober, config(1, 0)).unwrap();

        let first = sampler.fetch(&endpoints()).await.unwrap();
        let second = sampler.fetch(&endpoints()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
