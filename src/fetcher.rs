//! Timeout-bounded HTTP retrieval
//!
//! Fetch failures are soft: connection errors, timeouts and non-success
//! statuses all come back as `None` so callers can degrade instead of
//! aborting. There are no retries here.

use crate::Result;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("plugpm/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fetch `url`, giving up after `timeout`
    pub fn fetch(&self, url: &str, timeout: Duration) -> Option<Vec<u8>> {
        debug!(url, timeout_secs = timeout.as_secs(), "Fetching");

        let response = match self.client.get(url).timeout(timeout).send() {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    warn!(url, "Request timed out after {}s", timeout.as_secs());
                } else if e.is_connect() {
                    warn!(url, "Cannot connect: {}", e);
                } else {
                    warn!(url, "Request failed: {}", e);
                }
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Unsuccessful response");
            return None;
        }

        match response.bytes() {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url, "Failed to read response body: {}", e);
                None
            }
        }
    }
}
