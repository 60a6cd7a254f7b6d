//! Querying a single list and interpreting its answer.

use crate::config::{Action, ListConfig};
use crate::resolver::LookupService;
use crate::reverse::ReversedIp;
use tracing::debug;

/// What one list says about the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    pub reason: String,
}

impl Verdict {
    pub fn new(action: Action, reason: &str) -> Self {
        Self {
            action,
            reason: reason.to_string(),
        }
    }

    /// Accept with no message: the answer for "not listed" and every failure.
    pub fn accept() -> Self {
        Self::new(Action::Accepted, "")
    }
}

/// Query `list` for the client and map its response code onto an action.
///
/// Lookup failures, empty answers and malformed records all come back as
/// [`Verdict::accept`]; nothing here is fatal.
pub async fn evaluate_list(
    list: &ListConfig,
    reversed: &ReversedIp,
    lookup: &dyn LookupService,
) -> Verdict {
    if !list.addresses.admits(reversed.is_ipv4()) {
        return Verdict::accept();
    }

    let name = reversed.query_name(&list.host);
    let records = match lookup.lookup(&name).await {
        Ok(records) => records,
        Err(e) => {
            debug!(name = %name, error = %e, "Lookup returned no results");
            return Verdict::accept();
        }
    };

    let Some(record) = records.first() else {
        debug!(name = %name, "Lookup returned no results");
        return Verdict::accept();
    };
    debug!(name = %name, record = %record, "Lookup returned");

    let Some(code) = response_code(record) else {
        debug!(name = %name, record = %record, "Corrupt response");
        return Verdict::accept();
    };

    match_code(list, code)
}

/// Fourth octet of a dotted-quad record.
fn response_code(record: &str) -> Option<u32> {
    let octets: Vec<&str> = record.split('.').collect();
    if octets.len() != 4 {
        return None;
    }
    octets[3].parse().ok()
}

/// First reply rule covering `code` wins, otherwise the list default.
fn match_code(list: &ListConfig, code: u32) -> Verdict {
    list.replies
        .iter()
        .find(|rule| rule.matches(code))
        .map(|rule| Verdict::new(rule.action, &rule.reason))
        .unwrap_or_else(|| Verdict::new(list.action, &list.reason))
}
