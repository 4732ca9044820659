//! Environment-driven configuration for tgsyncd.
//!
//! Every flag is backed by an environment variable; deployments normally
//! configure the process through the environment alone.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tgsyncd",
    about = "Keeps load-balancer target group membership in sync with DNS"
)]
pub struct Config {
    /// Daemon HTTP bind address.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Debug/introspection bind address. Empty or "-" disables it.
    #[arg(long, env = "DEBUG_ADDR", default_value = "0.0.0.0:6060")]
    pub debug_addr: String,

    /// Path of the redb database holding durable sync state.
    #[arg(long, env = "STATE_DB")]
    pub state_db: PathBuf,

    /// Base URL of the load-balancer control plane API.
    #[arg(long, env = "CONTROL_PLANE_URL")]
    pub control_plane_url: String,

    /// Bearer token for the control plane API.
    #[arg(long, env = "CONTROL_PLANE_TOKEN")]
    pub control_plane_token: Option<String>,

    /// Target group to keep in sync. Overridden by --tg-from-tag-key.
    #[arg(long, env = "ELB_TG_ARN")]
    pub elb_tg_arn: Option<String>,

    /// Hostname resolved into the fixed target group. Overridden by
    /// --tg-from-tag-key.
    #[arg(long, env = "TARGET_FQDN")]
    pub target_fqdn: Option<String>,

    /// Discover target groups carrying this tag key; the tag value is the
    /// hostname to sync them with.
    #[arg(long, env = "TG_FROM_TAG_KEY")]
    pub tg_from_tag_key: Option<String>,

    /// Namespace suffix for the durable discovery cache key.
    #[arg(long, env = "TAG_CACHE_PREFIX", default_value = "")]
    pub tag_cache_prefix: String,

    /// How long a tag discovery result is cached.
    #[arg(long, env = "TAG_SEARCH_INTERVAL", default_value = "30s", value_parser = humantime::parse_duration)]
    pub tag_search_interval: Duration,

    /// Comma-separated DNS servers (host:port). Empty uses the system
    /// resolver.
    #[arg(long, env = "DNS_SERVERS", default_value = "")]
    pub dns_servers: String,

    /// Consecutive misses before an IP is deregistered.
    #[arg(long, env = "INVOCATIONS_BEFORE_DEREGISTRATION", default_value_t = 3)]
    pub invocations_before_deregistration: u32,

    /// Also remove registered IPs that were never tracked by this system.
    #[arg(long, env = "REMOVE_UNKNOWN_TG_IP", default_value_t = true, action = clap::ArgAction::Set)]
    pub remove_unknown_tg_ip: bool,

    /// Run continuously, syncing every --dns-refresh-interval.
    #[arg(long, env = "DAEMON_MODE", default_value_t = false, action = clap::ArgAction::Set)]
    pub daemon_mode: bool,

    /// Serverless single-invocation mode: one sync, JSON result on stdout.
    /// Wins over --daemon-mode.
    #[arg(long, env = "LAMBDA_MODE", default_value_t = false, action = clap::ArgAction::Set)]
    pub lambda_mode: bool,

    /// Interval between sync passes in daemon mode.
    #[arg(long, env = "DNS_REFRESH_INTERVAL", default_value = "5s", value_parser = humantime::parse_duration)]
    pub dns_refresh_interval: Duration,

    /// Default log filter. RUST_LOG overrides it.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Which execution shell the process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    /// One sync pass per process invocation, result on stdout.
    SingleInvocation,
    /// Long-lived process with the HTTP API and the sync ticker.
    Daemon,
    /// One sync pass, then exit with its outcome.
    Once,
}

impl Config {
    /// Single-invocation mode wins over daemon mode; neither means one-shot.
    pub fn running_mode(&self) -> RunningMode {
        if self.lambda_mode {
            RunningMode::SingleInvocation
        } else if self.daemon_mode {
            RunningMode::Daemon
        } else {
            RunningMode::Once
        }
    }

    /// The configured DNS servers, parsed. Empty means "use the system
    /// resolver".
    pub fn dns_server_addrs(&self) -> anyhow::Result<Vec<SocketAddr>> {
        self.dns_servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse()
                    .with_context(|| format!("invalid DNS server address {s:?}"))
            })
            .collect()
    }

    /// Debug bind address, or `None` when disabled.
    pub fn debug_bind(&self) -> anyhow::Result<Option<SocketAddr>> {
        if self.debug_addr.is_empty() || self.debug_addr == "-" {
            return Ok(None);
        }
        let addr = self
            .debug_addr
            .parse()
            .with_context(|| format!("invalid debug address {:?}", self.debug_addr))?;
        Ok(Some(addr))
    }

    /// The fixed finder requires both halves of the pair unless tag
    /// discovery is configured.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tg_from_tag_key.is_none() {
            anyhow::ensure!(
                self.elb_tg_arn.is_some(),
                "expected ELB_TG_ARN or TG_FROM_TAG_KEY to be set"
            );
            anyhow::ensure!(
                self.target_fqdn.is_some(),
                "expected TARGET_FQDN or TG_FROM_TAG_KEY to be set"
            );
        }
        Ok(())
    }

    /// Redacted snapshot served by the debug endpoint.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "listen_addr": self.listen_addr.to_string(),
            "debug_addr": self.debug_addr,
            "state_db": self.state_db.display().to_string(),
            "control_plane_url": self.control_plane_url,
            "control_plane_token": self.control_plane_token.as_ref().map(|_| "<REDACTED>"),
            "elb_tg_arn": self.elb_tg_arn,
            "target_fqdn": self.target_fqdn,
            "tg_from_tag_key": self.tg_from_tag_key,
            "tag_cache_prefix": self.tag_cache_prefix,
            "tag_search_interval": format!("{:?}", self.tag_search_interval),
            "dns_servers": self.dns_servers,
            "invocations_before_deregistration": self.invocations_before_deregistration,
            "remove_unknown_tg_ip": self.remove_unknown_tg_ip,
            "daemon_mode": self.daemon_mode,
            "lambda_mode": self.lambda_mode,
            "dns_refresh_interval": format!("{:?}", self.dns_refresh_interval),
            "log_level": self.log_level,
        })
    }
}
