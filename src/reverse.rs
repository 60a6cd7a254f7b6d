//! Reversed-label form of client addresses, as DNSBL queries expect it.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// An address rewritten as a DNSBL query prefix, trailing dot included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversedIp {
    labels: String,
    ipv4: bool,
}

impl ReversedIp {
    /// Reverse an address. IPv4-mapped IPv6 addresses are treated as IPv4.
    pub fn new(ip: IpAddr) -> Self {
        match ip.to_canonical() {
            IpAddr::V4(v4) => Self {
                labels: reverse_v4(v4),
                ipv4: true,
            },
            IpAddr::V6(v6) => Self {
                labels: reverse_v6(v6),
                ipv4: false,
            },
        }
    }

    pub fn labels(&self) -> &str {
        &self.labels
    }

    pub fn is_ipv4(&self) -> bool {
        self.ipv4
    }

    /// Fully-qualified query name for a list.
    pub fn query_name(&self, host: &str) -> String {
        format!("{}{}", self.labels, host)
    }
}

/// `1.2.3.4` -> `4.3.2.1.`
fn reverse_v4(ip: Ipv4Addr) -> String {
    ip.octets().iter().rev().map(|octet| format!("{}.", octet)).collect()
}

/// One label per nibble, least significant nibble of the last byte first.
fn reverse_v6(ip: Ipv6Addr) -> String {
    let mut out = String::with_capacity(64);
    for byte in ip.octets().iter().rev() {
        for nibble in [byte & 0x0f, byte >> 4] {
            out.push(HEX_DIGITS[nibble as usize] as char);
            out.push('.');
        }
    }
    out
}
