//! ICMP echo prober backed by `surge-ping`.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError};
use tokio::sync::OnceCell;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::{EchoProber, ProbeError, Reply};

/// Echo payload size, matching the classic `ping` default.
const PAYLOAD_SIZE: usize = 56;

const PAYLOAD: [u8; PAYLOAD_SIZE] = [0; PAYLOAD_SIZE];

/// Prober sharing one ICMP socket across all rounds.
///
/// The socket is opened on the first round, so building a prober never
/// needs raw-socket privilege by itself. The client is shared through an
/// `Arc`: dropping any `Client` clone shuts the socket down for all of them.
#[derive(Default)]
pub struct SurgeProber {
    client: OnceCell<Arc<Client>>,
}

impl SurgeProber {
    /// Create a prober; the socket is opened lazily.
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<&Arc<Client>, ProbeError> {
        let client = self
            .client
            .get_or_try_init(|| async { Client::new(&Config::default()).map(Arc::new) })
            .await?;
        Ok(client)
    }
}

impl std::fmt::Debug for SurgeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurgeProber")
            .field("socket_open", &self.client.initialized())
            .finish()
    }
}

#[async_trait::async_trait]
impl EchoProber for SurgeProber {
    async fn run_round(
        &self,
        targets: &[Ipv4Addr],
        deadline: Duration,
        round: u16,
        replies: UnboundedSender<Reply>,
    ) -> Result<(), ProbeError> {
        let client = self.client().await?;
        let mut tasks = JoinSet::new();

        for &address in targets {
            let client = Arc::clone(client);
            let replies = replies.clone();
            tasks.spawn(async move {
                let mut pinger = client
                    .pinger(IpAddr::V4(address), PingIdentifier(rand::random()))
                    .await;
                pinger.timeout(deadline);

                match pinger.ping(PingSequence(round), &PAYLOAD).await {
                    Ok((_, rtt)) => {
                        // Receiver only goes away once the round is abandoned.
                        let _ = replies.send(Reply { address, rtt });
                        Ok(())
                    }
                    Err(SurgeError::ClientDestroyed) => Err(ProbeError::SocketClosed),
                    Err(SurgeError::IOError(e)) => {
                        // Send errors are per destination (e.g. broadcast, REJECT rules).
                        tracing::warn!(address = %address, round, error = %e, "Echo request not sent");
                        Ok(())
                    }
                    Err(e) => {
                        tracing::debug!(address = %address, round, error = %e, "No echo reply");
                        Ok(())
                    }
                }
            });
        }
        drop(replies);

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => tracing::warn!(round, error = %e, "Echo task failed"),
                }
            }
            Ok(())
        };

        match timeout(deadline, drain).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(round, deadline_ms = deadline.as_millis(), "Round deadline elapsed");
                Ok(())
            }
        }
    }
}
