//! Shared HTTP client construction and error mapping.

use std::time::Duration;

use bizproposal_shared::{ProposalError, Result};
use reqwest::Client;

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("bizproposal/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Build a reqwest client with a bounded per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProposalError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a transport failure, keeping timeouts distinguishable.
pub(crate) fn transport_error(operation: &str, timeout_secs: u64, err: reqwest::Error) -> ProposalError {
    if err.is_timeout() {
        ProposalError::Timeout {
            operation: operation.to_string(),
            elapsed: Duration::from_secs(timeout_secs),
        }
    } else {
        ProposalError::Network(format!("{operation}: {err}"))
    }
}

/// Truncate a response body for inclusion in error messages.
pub(crate) fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
