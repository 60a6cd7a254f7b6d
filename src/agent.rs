//! DNSBL agent: runs every configured list and settles on one decision.

use crate::config::{Action, Config};
use crate::evaluator::{evaluate_list, Verdict};
use crate::resolver::{HickoryLookup, LookupService, TimeoutLookup};
use crate::reverse::ReversedIp;
use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Token in list reasons that is replaced by the client IP.
pub const IP_PLACEHOLDER: &str = "{ip}";

/// DNSBL agent.
pub struct DnsblAgent {
    config: Arc<Config>,
    lookup: Box<dyn LookupService>,
    short_circuit: bool,
}

impl DnsblAgent {
    /// Create an agent that resolves through the system resolver.
    pub fn new(config: Config) -> Self {
        let lookup = TimeoutLookup::new(
            HickoryLookup::from_system_conf(),
            config.settings.lookup_timeout(),
        );
        Self::with_lookup(config, Box::new(lookup))
    }

    /// Create an agent with a custom resolver.
    pub fn with_lookup(config: Config, lookup: Box<dyn LookupService>) -> Self {
        info!(
            lists = config.lists.len(),
            precedence = ?config.precedence,
            "DNSBL agent initialized"
        );

        Self {
            config: Arc::new(config),
            lookup,
            short_circuit: true,
        }
    }

    /// Toggle the early return on a top-precedence verdict. Decisions are the
    /// same either way; disabling it only costs extra lookups.
    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    /// Evaluate a client address against all lists.
    ///
    /// The message still carries [`IP_PLACEHOLDER`]; see [`Decision::finalize`].
    pub async fn evaluate(&self, ip: IpAddr) -> Decision {
        let reversed = ReversedIp::new(ip);
        let top = self.config.precedence.first().copied();

        let mut verdicts = Vec::with_capacity(self.config.lists.len());
        for list in &self.config.lists {
            let verdict = evaluate_list(list, &reversed, self.lookup.as_ref()).await;
            debug!(
                ip = %ip,
                list = %list.host,
                action = %verdict.action,
                "List evaluated"
            );

            // Nothing can outrank the top precedence, stop querying.
            if self.short_circuit && Some(verdict.action) == top {
                return Decision::from(verdict);
            }
            verdicts.push(verdict);
        }

        Decision::from(reduce(&self.config.precedence, &verdicts))
    }
}

/// Pick the verdict of the first list holding the highest-ranked action.
///
/// Ties at one precedence level go to the earliest list. If no verdict's
/// action is ranked at all, the result is an empty accept.
pub fn reduce(precedence: &[Action], verdicts: &[Verdict]) -> Verdict {
    precedence
        .iter()
        .find_map(|action| verdicts.iter().find(|v| v.action == *action))
        .cloned()
        .unwrap_or_else(Verdict::accept)
}

/// Scope the host may cache a decision for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHint {
    pub network: IpNet,
    pub ttl: Duration,
}

/// Final outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub message: String,
    pub cache: Option<CacheHint>,
    pub error: Option<String>,
}

impl Decision {
    /// Accept, carrying the error text as both message and error.
    pub fn fail_open(error: &dyn std::error::Error) -> Self {
        let text = error.to_string();
        Self {
            action: Action::Accepted,
            message: text.clone(),
            cache: None,
            error: Some(text),
        }
    }

    /// Attach a cache scope. Reserved for hosts that cache decisions; list
    /// evaluation never sets one.
    pub fn with_cache_hint(mut self, network: IpNet, ttl: Duration) -> Self {
        self.cache = Some(CacheHint { network, ttl });
        self
    }

    /// Replace every [`IP_PLACEHOLDER`] in the message with the client IP.
    /// Call once, as the last step of a run.
    pub fn finalize(mut self, client_ip: &str) -> Self {
        self.message = self.message.replace(IP_PLACEHOLDER, client_ip);
        self
    }

    /// Whether this is a fail-open answer to an error. Part of the
    /// host-facing API; the binary reports errors through [`Response`].
    ///
    /// [`Response`]: crate::protocol::Response
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<Verdict> for Decision {
    fn from(verdict: Verdict) -> Self {
        Self {
            action: verdict.action,
            message: verdict.reason,
            cache: None,
            error: None,
        }
    }
}
