//! DNS lookups for list queries.

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{Resolver, TokioResolver};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Error from a lookup. Never escapes the list evaluator.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("DNS error: {0}")]
    Dns(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves a query name to textual addresses.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Look up `name`. An empty vector means the name exists but has no
    /// address records.
    async fn lookup(&self, name: &str) -> Result<Vec<String>, LookupError>;
}

/// [`LookupService`] backed by hickory's tokio resolver.
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Build a resolver from the system configuration, falling back to
    /// hickory's default upstreams if it cannot be read.
    pub fn from_system_conf() -> Self {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                warn!(error = %e, "Failed to read system resolver configuration, using defaults");
                Resolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        };

        Self { resolver }
    }
}

#[async_trait]
impl LookupService for HickoryLookup {
    async fn lookup(&self, name: &str) -> Result<Vec<String>, LookupError> {
        debug!(name = %name, "Resolving");

        let lookup = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| LookupError::Dns(e.to_string()))?;

        Ok(lookup.iter().map(|ip| ip.to_string()).collect())
    }
}

/// Bounds every lookup of the wrapped service.
pub struct TimeoutLookup<L> {
    inner: L,
    timeout: Duration,
}

impl<L: LookupService> TimeoutLookup<L> {
    pub fn new(inner: L, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<L: LookupService> LookupService for TimeoutLookup<L> {
    async fn lookup(&self, name: &str) -> Result<Vec<String>, LookupError> {
        tokio::time::timeout(self.timeout, self.inner.lookup(name))
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))?
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedLookup;
    use super::*;

    #[tokio::test]
    async fn test_scripted_lookup() {
        let lookup = ScriptedLookup::new().answer("4.3.2.1.bl.test", &["127.0.0.2"]);

        let records = lookup.lookup("4.3.2.1.bl.test").await.unwrap();
        assert_eq!(records, vec!["127.0.0.2".to_string()]);

        assert!(lookup.lookup("5.3.2.1.bl.test").await.is_err());
        assert_eq!(lookup.queries().len(), 2);
    }

    /// Answers correctly, but only after `delay`.
    struct SlowLookup {
        inner: ScriptedLookup,
        delay: Duration,
    }

    #[async_trait]
    impl LookupService for SlowLookup {
        async fn lookup(&self, name: &str) -> Result<Vec<String>, LookupError> {
            tokio::time::sleep(self.delay).await;
            self.inner.lookup(name).await
        }
    }

    fn slow(delay: Duration) -> SlowLookup {
        SlowLookup {
            inner: ScriptedLookup::new().answer("4.3.2.1.bl.test", &["127.0.0.2"]),
            delay,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_lookup_expires() {
        let lookup = TimeoutLookup::new(slow(Duration::from_secs(30)), Duration::from_millis(500));
        let err = lookup.lookup("4.3.2.1.bl.test").await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout(d) if d == Duration::from_millis(500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_lookup_passes_fast_answers() {
        let lookup = TimeoutLookup::new(slow(Duration::from_millis(10)), Duration::from_secs(5));
        let records = lookup.lookup("4.3.2.1.bl.test").await.unwrap();
        assert_eq!(records, vec!["127.0.0.2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_list_accepts() {
        use crate::config::{Action, AddressFilter, ListConfig};
        use crate::evaluator::{evaluate_list, Verdict};
        use crate::reverse::ReversedIp;

        let list = ListConfig {
            host: "bl.test".to_string(),
            addresses: AddressFilter::Any,
            action: Action::Banned,
            reason: "Banned: {ip}".to_string(),
            replies: vec![],
        };
        let lookup = TimeoutLookup::new(slow(Duration::from_secs(30)), Duration::from_millis(500));
        let reversed = ReversedIp::new("1.2.3.4".parse().unwrap());

        assert_eq!(evaluate_list(&list, &reversed, &lookup).await, Verdict::accept());
    }

    #[test]
    fn test_lookup_error_display() {
        let err = LookupError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "lookup timed out after 250ms");
    }
}
