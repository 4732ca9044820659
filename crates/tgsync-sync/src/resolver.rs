//! DNS resolution with multi-upstream failover.
//!
//! Each configured DNS server gets its own resolver that contacts the server
//! directly (no OS resolver, no caching). [`MultiResolver`] fans a lookup
//! across them: a uniformly random starting server spreads query load, and
//! sequential fallback keeps lookups working while any one server is alive.

use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use rand::Rng;
use tracing::{debug, warn};

/// Hostname to IP lookup.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup_ips(&self, host: &str) -> anyhow::Result<Vec<IpAddr>>;
}

/// Resolver pinned to a single upstream DNS server.
pub struct DnsServerResolver {
    dns: TokioResolver,
    server: SocketAddr,
}

impl DnsServerResolver {
    pub fn new(server: SocketAddr) -> Self {
        let upstream =
            NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let config = ResolverConfig::from_parts(None, Vec::new(), upstream);
        let mut builder =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default());
        // Every sync pass wants a fresh answer.
        builder.options_mut().cache_size = 0;
        Self {
            dns: builder.build(),
            server,
        }
    }
}

#[async_trait]
impl Resolver for DnsServerResolver {
    async fn lookup_ips(&self, host: &str) -> anyhow::Result<Vec<IpAddr>> {
        let lookup = self
            .dns
            .lookup_ip(host)
            .await
            .with_context(|| format!("lookup against {} failed", self.server))?;
        Ok(lookup.iter().collect())
    }
}

/// Resolver built from system configuration (`resolv.conf`), used when no
/// explicit DNS servers are configured.
pub struct SystemResolver {
    dns: TokioResolver,
}

impl SystemResolver {
    pub fn from_system_config() -> anyhow::Result<Self> {
        let mut builder = TokioResolver::builder_tokio()?;
        builder.options_mut().cache_size = 0;
        Ok(Self {
            dns: builder.build(),
        })
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_ips(&self, host: &str) -> anyhow::Result<Vec<IpAddr>> {
        let lookup = self.dns.lookup_ip(host).await?;
        Ok(lookup.iter().collect())
    }
}

/// DNS lookup across an ordered list of upstream resolvers.
///
/// Lookups start at a random index and fall through the list, returning the
/// first success. When every resolver fails, the last error is returned.
pub struct MultiResolver {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl MultiResolver {
    /// Build from per-server resolvers. At least one is required.
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !resolvers.is_empty(),
            "at least one DNS resolver is required"
        );
        Ok(Self { resolvers })
    }

    /// Build one pinned resolver per `host:port` server address.
    pub fn from_servers(servers: &[SocketAddr]) -> anyhow::Result<Self> {
        Self::new(
            servers
                .iter()
                .map(|s| Box::new(DnsServerResolver::new(*s)) as Box<dyn Resolver>)
                .collect(),
        )
    }
}

#[async_trait]
impl Resolver for MultiResolver {
    async fn lookup_ips(&self, host: &str) -> anyhow::Result<Vec<IpAddr>> {
        let start = rand::thread_rng().gen_range(0..self.resolvers.len());
        let mut last_err = None;
        for i in 0..self.resolvers.len() {
            let idx = (start + i) % self.resolvers.len();
            match self.resolvers[idx].lookup_ips(host).await {
                Ok(ips) => {
                    debug!(host, resolver_index = idx, "lookup succeeded");
                    return Ok(ips);
                }
                Err(e) => {
                    warn!(host, resolver_index = idx, error = %e, "unable to look up host");
                    last_err = Some(e);
                }
            }
        }
        // The list is non-empty by construction, so at least one error was
        // recorded.
        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("no resolution for {host}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticResolver(Vec<IpAddr>);

    #[async_trait]
    impl Resolver for StaticResolver {
        async fn lookup_ips(&self, _host: &str) -> anyhow::Result<Vec<IpAddr>> {
            Ok(self.0.clone())
        }
    }

    struct FailingResolver {
        calls: Arc<AtomicUsize>,
        message: &'static str,
    }

    impl FailingResolver {
        fn new(message: &'static str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                message,
            }
        }
    }

    #[async_trait]
    impl Resolver for FailingResolver {
        async fn lookup_ips(&self, _host: &str) -> anyhow::Result<Vec<IpAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!(self.message))
        }
    }

    fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn empty_server_list_is_rejected() {
        assert!(MultiResolver::new(Vec::new()).is_err());
        assert!(MultiResolver::from_servers(&[]).is_err());
    }

    #[tokio::test]
    async fn failover_skips_a_dead_resolver() {
        let multi = MultiResolver::new(vec![
            Box::new(FailingResolver::new("dead upstream")),
            Box::new(StaticResolver(vec![ip(1, 2, 3, 4)])),
        ])
        .unwrap();

        // Whichever index the random start picks, the dead resolver is
        // skipped and the live one answers.
        for _ in 0..8 {
            let ips = multi.lookup_ips("web.internal").await.unwrap();
            assert_eq!(ips, vec![ip(1, 2, 3, 4)]);
        }
    }

    #[tokio::test]
    async fn all_resolvers_failing_returns_the_last_error() {
        let multi = MultiResolver::new(vec![
            Box::new(FailingResolver::new("first down")),
            Box::new(FailingResolver::new("second down")),
        ])
        .unwrap();

        let err = multi.lookup_ips("web.internal").await.unwrap_err();
        assert!(err.to_string().contains("down"));
    }

    #[tokio::test]
    async fn every_resolver_is_tried_exactly_once_on_total_failure() {
        let first = FailingResolver::new("down");
        let second = FailingResolver::new("down");
        let first_calls = first.calls.clone();
        let second_calls = second.calls.clone();
        let multi = MultiResolver::new(vec![Box::new(first), Box::new(second)]).unwrap();

        multi.lookup_ips("web.internal").await.unwrap_err();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}
