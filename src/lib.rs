//! DNSBL Agent for Zentinel.
//!
//! Checks a client IP against DNS-based block and allow lists and reduces
//! their answers to a single accept / block / require-SASL decision.
//!
//! # Features
//!
//! - **IPv4 and IPv6** - Reversed-octet and reversed-nibble query names
//! - **Reply Rules** - Map list response codes onto actions per list
//! - **Precedence** - Configurable ranking settles disagreements between lists
//! - **Fail-Open** - Lookup failures and bad input never block a client
//!
//! # Example Configuration
//!
//! ```yaml
//! precedence:
//!   - require-sasl
//!   - block
//!
//! lists:
//!   - host: "rbl.efnetrbl.org"
//!     addresses: 4
//!     action: require-sasl
//!     reason: "{ip} is listed in the EFnet RBL"
//!     replies:
//!       - codes: [1]
//!         action: block
//!         reason: "{ip} is an open proxy"
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod protocol;
pub mod resolver;
pub mod reverse;

pub use agent::{Decision, DnsblAgent};
pub use config::{Action, Config};
pub use error::Error;
