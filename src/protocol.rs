//! Line-oriented JSON request/response exchanged with the host.

use crate::agent::{Decision, DnsblAgent};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::warn;

/// Request read from the host: a single client address.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub ip: String,
}

impl Request {
    /// Parse one request line.
    pub fn from_line(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::Request("empty request".to_string()));
        }
        Ok(serde_json::from_str(line)?)
    }

    /// Client address, with IPv4-mapped IPv6 folded down to IPv4.
    pub fn ip_addr(&self) -> Result<IpAddr> {
        self.ip
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| Error::CorruptIp(self.ip.clone()))
    }
}

/// Response written back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// 1 = accept, 2 = ban, 3 = require SASL.
    pub result: u8,
    pub ban_message: String,
    /// Network the result applies to, empty if not cacheable.
    pub cache_net: String,
    pub cache_seconds: u64,
    pub error: String,
}

impl From<Decision> for Response {
    fn from(decision: Decision) -> Self {
        let (cache_net, cache_seconds) = decision
            .cache
            .map(|hint| (hint.network.to_string(), hint.ttl.as_secs()))
            .unwrap_or_default();

        Self {
            result: decision.action.code(),
            ban_message: decision.message,
            cache_net,
            cache_seconds,
            error: decision.error.unwrap_or_default(),
        }
    }
}

impl Response {
    /// Serialize as a single newline-terminated line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Answer one request line. Bad requests fail open.
pub async fn answer(agent: &DnsblAgent, line: &str) -> Decision {
    let request = match Request::from_line(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting request, accepting client");
            return Decision::fail_open(&e).finalize("");
        }
    };

    let (decision, client_ip) = match request.ip_addr() {
        Ok(ip) => (agent.evaluate(ip).await, ip.to_string()),
        Err(e) => {
            warn!(error = %e, "Rejecting request, accepting client");
            (Decision::fail_open(&e), request.ip.clone())
        }
    };

    decision.finalize(&client_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Action, Config};
    use crate::resolver::testing::ScriptedLookup;
    use std::time::Duration;

    const CONFIG: &str = r#"
precedence: [require-sasl, block]
lists:
  - host: bl.example.com
    action: block
    reason: "Banned: {ip}"
    replies:
      - codes: [2]
        action: require-sasl
        reason: "SASL required: {ip}"
  - host: v6.example.com
    addresses: 6
    action: block
    reason: "{ip} is listed on v6"
"#;

    fn agent(lookup: ScriptedLookup) -> DnsblAgent {
        DnsblAgent::with_lookup(Config::from_yaml(CONFIG).unwrap(), Box::new(lookup))
    }

    #[test]
    fn test_request_parsing() {
        let request = Request::from_line("{\"ip\": \"1.2.3.4\"}\n").unwrap();
        assert_eq!(request.ip_addr().unwrap(), "1.2.3.4".parse::<IpAddr>().unwrap());

        let mapped = Request::from_line(r#"{"ip": "::ffff:1.2.3.4"}"#).unwrap();
        assert_eq!(mapped.ip_addr().unwrap(), "1.2.3.4".parse::<IpAddr>().unwrap());

        assert!(matches!(Request::from_line(""), Err(Error::Request(_))));
        assert!(matches!(Request::from_line("not json"), Err(Error::Request(_))));
        assert!(matches!(Request::from_line("{}"), Err(Error::Request(_))));

        let bad = Request::from_line(r#"{"ip": "1.2.3"}"#).unwrap();
        assert!(matches!(bad.ip_addr(), Err(Error::CorruptIp(_))));

        let padded = Request::from_line(r#"{"ip": " 1.2.3.4 "}"#).unwrap();
        assert!(matches!(padded.ip_addr(), Err(Error::CorruptIp(_))));
    }

    #[test]
    fn test_response_json() {
        let decision = Decision::from(crate::evaluator::Verdict::new(Action::Banned, "go away"));
        let line = Response::from(decision).to_line().unwrap();
        assert_eq!(
            line,
            "{\"result\":2,\"banMessage\":\"go away\",\"cacheNet\":\"\",\"cacheSeconds\":0,\"error\":\"\"}\n"
        );
    }

    #[test]
    fn test_response_cache_hint() {
        let decision = Decision::from(crate::evaluator::Verdict::accept())
            .with_cache_hint("2001:db8::/64".parse().unwrap(), Duration::from_secs(3600));
        let response = Response::from(decision);
        assert_eq!(response.result, 1);
        assert_eq!(response.cache_net, "2001:db8::/64");
        assert_eq!(response.cache_seconds, 3600);
    }

    #[tokio::test]
    async fn test_answer_substitutes_ip() {
        let lookup = ScriptedLookup::new().answer("4.3.2.1.bl.example.com", &["127.0.0.2"]);
        let decision = answer(&agent(lookup), r#"{"ip": "1.2.3.4"}"#).await;
        assert_eq!(decision.action, Action::RequireAuth);
        assert_eq!(decision.message, "SASL required: 1.2.3.4");
        assert!(decision.error.is_none());
    }

    #[tokio::test]
    async fn test_answer_ban_message() {
        let lookup = ScriptedLookup::new().answer("4.3.2.1.bl.example.com", &["127.0.0.4"]);
        let response = Response::from(answer(&agent(lookup), r#"{"ip": "1.2.3.4"}"#).await);
        assert_eq!(response.result, 2);
        assert_eq!(response.ban_message, "Banned: 1.2.3.4");
        assert_eq!(response.error, "");
    }

    #[tokio::test]
    async fn test_answer_ipv6_uses_canonical_text() {
        let name = "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.v6.example.com";
        let lookup = ScriptedLookup::new().answer(name, &["127.0.0.2"]);
        let decision = answer(&agent(lookup), r#"{"ip": "2001:0db8:0::1"}"#).await;
        assert_eq!(decision.action, Action::Banned);
        assert_eq!(decision.message, "2001:db8::1 is listed on v6");
    }

    #[tokio::test]
    async fn test_answer_lookup_failure_accepts() {
        let lookup = ScriptedLookup::new();
        let decision = answer(&agent(lookup), r#"{"ip": "1.2.3.4"}"#).await;
        assert_eq!(decision.action, Action::Accepted);
        assert_eq!(decision.message, "");
        assert!(decision.error.is_none());
    }

    #[tokio::test]
    async fn test_answer_corrupt_ip_fails_open() {
        let lookup = ScriptedLookup::new();
        let agent = agent(lookup);
        let decision = answer(&agent, r#"{"ip": "999.1.1.1"}"#).await;
        assert_eq!(decision.action, Action::Accepted);
        assert_eq!(decision.error.as_deref(), Some("corrupt ip address 999.1.1.1"));
    }

    #[tokio::test]
    async fn test_answer_malformed_request_fails_open() {
        let decision = answer(&agent(ScriptedLookup::new()), "{\"address\": 1}").await;
        assert_eq!(decision.action, Action::Accepted);
        assert!(decision.is_error());
    }
}
