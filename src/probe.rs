//! Echo prober capability.
//!
//! - [`EchoProber`]: sends one round of ICMP echo requests and streams replies
//! - [`SurgeProber`]: implementation over a shared `surge-ping` client
//!
//! Replies are handed to the caller through an unbounded channel. A round is
//! over once `run_round` returns and every sender clone has been dropped.

mod surge;

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

pub use surge::SurgeProber;

/// Errors that prevent a round from being probed at all.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The ICMP socket could not be opened.
    #[error("failed to open icmp socket: {0}")]
    Socket(#[from] std::io::Error),

    /// The ICMP socket was shut down and can no longer send.
    #[error("icmp socket is closed")]
    SocketClosed,
}

/// One echo reply observed within a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reply {
    /// Address the reply came from.
    pub address: Ipv4Addr,
    /// Measured round-trip time.
    pub rtt: Duration,
}

/// Sends ICMP echo requests and reports replies received before a deadline.
#[async_trait::async_trait]
pub trait EchoProber: Send + Sync {
    /// Probe every target once.
    ///
    /// Must return no later than `deadline` after being called. Lost or late
    /// replies and per-target send errors are not errors; only losing the
    /// socket itself is.
    async fn run_round(
        &self,
        targets: &[Ipv4Addr],
        deadline: Duration,
        round: u16,
        replies: UnboundedSender<Reply>,
    ) -> Result<(), ProbeError>;
}
