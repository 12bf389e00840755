//! Waiting for peer endpoints before communicator setup.
//!
//! Rank 0 generates every communicator id, so it must not emit setup until
//! all other workers are listening.

use std::time::Instant;

use futures::future::join_all;
use tokio::net::TcpStream;

use crate::config::ReadinessConfig;
use crate::error::{Result, TranspileError};

/// Blocks until a set of `host:port` endpoints is reachable.
pub trait PeerReadiness {
    fn wait_until_reachable(&self, peers: &[String]) -> Result<()>;
}

/// Returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWait;

impl PeerReadiness for NoWait {
    fn wait_until_reachable(&self, _peers: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Polls peers with TCP connects until all of them accept.
///
/// The blocking entry point builds its own current-thread tokio runtime.
/// Called from inside a runtime it does so on a scoped helper thread, parking
/// the caller until the wait ends; prefer [`wait_async`](Self::wait_async)
/// there.
#[derive(Debug, Default, Clone)]
pub struct TcpReadiness {
    config: ReadinessConfig,
}

impl TcpReadiness {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Tuned from `RINGPASS_*` environment variables, see
    /// [`ReadinessConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(ReadinessConfig::from_env())
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Probe every peer once, concurrently. Returns the endpoints that did
    /// not accept within `probe_timeout`.
    pub async fn probe(&self, peers: &[String]) -> Vec<String> {
        let timeout = self.config.probe_timeout;
        let attempts = peers.iter().map(|ep| async move {
            match tokio::time::timeout(timeout, TcpStream::connect(ep.as_str())).await {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => {
                    tracing::debug!(endpoint = %ep, error = %e, "peer probe failed");
                    Some(ep.clone())
                }
                Err(_) => {
                    tracing::debug!(endpoint = %ep, "peer probe timed out");
                    Some(ep.clone())
                }
            }
        });
        join_all(attempts).await.into_iter().flatten().collect()
    }

    pub async fn wait_async(&self, peers: &[String]) -> Result<()> {
        let started = Instant::now();
        loop {
            let not_ready = self.probe(peers).await;
            if not_ready.is_empty() {
                tracing::info!(peers = peers.len(), "all peers reachable");
                return Ok(());
            }
            if let Some(deadline) = self.config.deadline
                && started.elapsed() >= deadline
            {
                return Err(TranspileError::PeersUnreachable {
                    endpoints: not_ready,
                });
            }
            tracing::warn!(
                not_ready = ?not_ready,
                retry_in_ms = self.config.retry_interval.as_millis() as u64,
                "peers not ready"
            );
            tokio::time::sleep(self.config.retry_interval).await;
        }
    }

    fn block_on_wait(&self, peers: &[String]) -> Result<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.wait_async(peers))
    }
}

impl PeerReadiness for TcpReadiness {
    fn wait_until_reachable(&self, peers: &[String]) -> Result<()> {
        if peers.is_empty() {
            return Ok(());
        }
        // A runtime cannot be blocked on from one of its own threads.
        if tokio::runtime::Handle::try_current().is_ok() {
            return std::thread::scope(|s| {
                s.spawn(|| self.block_on_wait(peers))
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            });
        }
        self.block_on_wait(peers)
    }
}
