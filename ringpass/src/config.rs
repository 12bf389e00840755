//! Cluster and rewrite configuration.
//!
//! All values can be set in code or loaded from environment variables
//! (prefixed `RINGPASS_`).

use std::time::Duration;

use crate::error::{Result, TranspileError};
use crate::strategy::StrategyKind;
use crate::types::Rank;

/// Default number of communication rings.
pub const DEFAULT_NRINGS: u32 = 2;

/// Where this worker sits in the cluster and how its programs are rewritten.
#[derive(Debug, Clone)]
pub struct TranspileConfig {
    /// This worker's rank.
    pub rank: Rank,

    /// Every worker's `host:port`, indexed by rank.
    pub endpoints: Vec<String>,

    /// This worker's own entry in `endpoints`.
    pub current_endpoint: String,

    /// Number of parallel communication rings.
    pub nrings: u32,

    /// Rank 0 waits for every peer endpoint to accept connections before
    /// emitting communicator setup.
    pub wait_for_peers: bool,

    pub strategy: StrategyKind,
}

impl TranspileConfig {
    /// Build a config with default ring count and strategy.
    ///
    /// `endpoints` may be a list or a single comma-joined string.
    pub fn new(rank: Rank, endpoints: impl Into<Endpoints>, current_endpoint: &str) -> Self {
        Self {
            rank,
            endpoints: endpoints.into().0,
            current_endpoint: current_endpoint.to_string(),
            nrings: DEFAULT_NRINGS,
            wait_for_peers: false,
            strategy: StrategyKind::default(),
        }
    }

    pub fn nranks(&self) -> usize {
        self.endpoints.len()
    }

    /// Every endpoint except this worker's own, in rank order.
    pub fn other_endpoints(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|ep| **ep != self.current_endpoint)
            .cloned()
            .collect()
    }

    /// Check the cluster description before anything is rewritten.
    pub fn validate(&self) -> Result<()> {
        let nranks = self.nranks();
        if nranks <= 1 {
            return Err(TranspileError::TooFewEndpoints { nranks });
        }
        if self.rank as usize >= nranks {
            return Err(TranspileError::RankOutOfRange {
                rank: self.rank,
                nranks,
            });
        }
        if !self.endpoints.contains(&self.current_endpoint) {
            return Err(TranspileError::UnknownEndpoint {
                endpoint: self.current_endpoint.clone(),
                endpoints: self.endpoints.clone(),
            });
        }
        if self.nrings == 0 {
            return Err(TranspileError::ZeroRings);
        }
        Ok(())
    }

    /// Load config from environment variables.
    ///
    /// Recognized variables:
    /// - `RINGPASS_RANK` (required)
    /// - `RINGPASS_ENDPOINTS` (required, comma-joined)
    /// - `RINGPASS_CURRENT_ENDPOINT` (required)
    /// - `RINGPASS_NRINGS`
    /// - `RINGPASS_WAIT_FOR_PEERS`
    /// - `RINGPASS_STRATEGY` (`grad_allreduce` or `local_sgd`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |var: &'static str| lookup(var).ok_or(TranspileError::MissingEnv(var));

        let rank = parse_rank(&required("RINGPASS_RANK")?)?;
        let endpoints = parse_endpoints(&required("RINGPASS_ENDPOINTS")?);
        let current_endpoint = required("RINGPASS_CURRENT_ENDPOINT")?;

        let mut cfg = Self::new(rank, endpoints, current_endpoint.trim());

        if let Some(v) = lookup("RINGPASS_NRINGS") {
            cfg.nrings = v.trim().parse().map_err(|_| TranspileError::InvalidEnv {
                var: "RINGPASS_NRINGS",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("RINGPASS_WAIT_FOR_PEERS") {
            cfg.wait_for_peers = parse_flag("RINGPASS_WAIT_FOR_PEERS", &v)?;
        }
        if let Some(v) = lookup("RINGPASS_STRATEGY") {
            cfg.strategy = v.parse()?;
        }

        Ok(cfg)
    }
}

/// Endpoint list accepted either as a sequence or as `"a:1,b:2"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints(pub Vec<String>);

impl From<Vec<String>> for Endpoints {
    fn from(v: Vec<String>) -> Self {
        Endpoints(v)
    }
}

impl From<&[&str]> for Endpoints {
    fn from(v: &[&str]) -> Self {
        Endpoints(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Endpoints {
    fn from(v: [&str; N]) -> Self {
        Endpoints(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&str> for Endpoints {
    fn from(joined: &str) -> Self {
        Endpoints(parse_endpoints(joined))
    }
}

/// Split a comma-joined endpoint list, dropping blanks.
pub fn parse_endpoints(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a rank, rejecting negative values explicitly.
pub fn parse_rank(value: &str) -> Result<Rank> {
    let raw: i64 = value
        .trim()
        .parse()
        .map_err(|_| TranspileError::InvalidEnv {
            var: "RINGPASS_RANK",
            value: value.to_string(),
        })?;
    if raw < 0 {
        return Err(TranspileError::NegativeRank { rank: raw });
    }
    Rank::try_from(raw).map_err(|_| TranspileError::InvalidEnv {
        var: "RINGPASS_RANK",
        value: value.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(TranspileError::InvalidEnv {
            var,
            value: value.to_string(),
        }),
    }
}

/// Tuning for the rank-0 wait on peer endpoints.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Upper bound on a single connection attempt.
    pub probe_timeout: Duration,

    /// Pause between probing rounds.
    pub retry_interval: Duration,

    /// Give up after this long. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_secs(3),
            deadline: None,
        }
    }
}

impl ReadinessConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `RINGPASS_PROBE_TIMEOUT_MS`
    /// - `RINGPASS_RETRY_INTERVAL_MS`
    /// - `RINGPASS_WAIT_DEADLINE_SECS`
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(ms) = number("RINGPASS_PROBE_TIMEOUT_MS") {
            cfg.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = number("RINGPASS_RETRY_INTERVAL_MS") {
            cfg.retry_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = number("RINGPASS_WAIT_DEADLINE_SECS") {
            cfg.deadline = Some(Duration::from_secs(secs));
        }

        cfg
    }
}
