//! Configuration types for the DNSBL agent.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Root configuration for the DNSBL agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// Actions ranked most authoritative first.
    #[serde(default)]
    pub precedence: Vec<Action>,

    /// DNSBLs to query, in order.
    #[serde(default)]
    pub lists: Vec<ListConfig>,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Per-lookup timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
        }
    }
}

impl Settings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout() -> u64 {
    5000
}

/// Outcome a list (or the whole evaluation) can produce.
///
/// Ranking between actions comes only from [`Config::precedence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    /// Let the client in.
    Accepted,
    /// Refuse the client.
    Banned,
    /// Let the client in only after SASL authentication.
    RequireAuth,
}

impl Action {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Action::Accepted => 1,
            Action::Banned => 2,
            Action::RequireAuth => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Action::Accepted => "accept",
            Action::Banned => "block",
            Action::RequireAuth => "require-sasl",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "allow" | "accept" => Ok(Action::Accepted),
            "block" | "deny" => Ok(Action::Banned),
            "require-sasl" => Ok(Action::RequireAuth),
            _ => Err(Error::Config(format!("invalid action: {}", s))),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// Address families a list is willing to answer for.
///
/// Written as `4` or `6` in the config; any other number (or none) means both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "i64", into = "i64")]
pub enum AddressFilter {
    #[default]
    Any,
    V4Only,
    V6Only,
}

impl AddressFilter {
    /// Whether a lookup should be made for an address of this family.
    pub fn admits(self, ipv4: bool) -> bool {
        match self {
            AddressFilter::Any => true,
            AddressFilter::V4Only => ipv4,
            AddressFilter::V6Only => !ipv4,
        }
    }
}

impl From<i64> for AddressFilter {
    fn from(n: i64) -> Self {
        match n {
            4 => AddressFilter::V4Only,
            6 => AddressFilter::V6Only,
            _ => AddressFilter::Any,
        }
    }
}

impl From<AddressFilter> for i64 {
    fn from(filter: AddressFilter) -> Self {
        match filter {
            AddressFilter::Any => 0,
            AddressFilter::V4Only => 4,
            AddressFilter::V6Only => 6,
        }
    }
}

/// One DNSBL service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListConfig {
    /// Domain suffix appended to the reversed address.
    pub host: String,

    /// Address families to query this list for.
    #[serde(default)]
    pub addresses: AddressFilter,

    /// Action when the list answers with a code no reply rule covers.
    pub action: Action,

    /// Message for the default action; `{ip}` is replaced by the client IP.
    #[serde(default)]
    pub reason: String,

    /// Special-cased response codes, checked in order.
    #[serde(default)]
    pub replies: Vec<ReplyRule>,
}

/// Maps a set of response codes onto an action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyRule {
    /// Fourth-octet values this rule matches.
    pub codes: Vec<u32>,

    pub action: Action,

    #[serde(default)]
    pub reason: String,
}

impl ReplyRule {
    pub fn matches(&self, code: u32) -> bool {
        self.codes.contains(&code)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` references.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let mut config: Config = serde_yaml::from_str(&expanded)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Substitute the default precedence when fewer than two distinct
    /// actions were configured.
    pub fn apply_defaults(&mut self) {
        let first = self.precedence.first().copied();
        let distinct = self.precedence.iter().any(|a| Some(*a) != first);
        if !distinct {
            self.precedence = default_precedence();
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.precedence.len() < 2 {
            return Err(Error::Config(format!(
                "precedence needs at least 2 actions, got {}",
                self.precedence.len()
            )));
        }

        if self.settings.timeout_ms == 0 {
            return Err(Error::Config("settings.timeout_ms must be greater than 0".to_string()));
        }

        for (i, list) in self.lists.iter().enumerate() {
            if list.host.trim().is_empty() {
                return Err(Error::Config(format!("list {} has an empty host", i)));
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# DNSBL Agent Configuration

settings:
  timeout_ms: 5000             # Per-lookup DNS timeout

# Which action wins when lists disagree, most authoritative first.
# Defaults to [require-sasl, block] when fewer than two actions are given.
precedence:
  - require-sasl
  - block

lists:
  - host: "rbl.efnetrbl.org"
    addresses: 4               # 4, 6, or omit for both
    action: require-sasl       # allow/accept, block/deny, require-sasl
    reason: "{ip} is listed in the EFnet RBL"
    replies:
      - codes: [1]
        action: block
        reason: "{ip} is an open proxy"
      - codes: [5]
        action: allow

  - host: "dnsbl.dronebl.org"
    action: block
    reason: "{ip} is listed in DroneBL"
"#
        .to_string()
    }
}

fn default_precedence() -> Vec<Action> {
    vec![Action::RequireAuth, Action::Banned]
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    re.replace_all(content, |cap: &Captures| {
        std::env::var(&cap[1]).unwrap_or_default()
    })
    .into_owned()
}
