//! Fetcher — HTTP GET with cookies/user-agent, SSRF-safe URL validation,
//! HTML-to-text normalization, and an optional page-dump side effect.

mod html;
mod ssrf;

pub use html::{html_to_text, safe_dump_name};
pub use ssrf::validate_url;

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::monitor::query::QueryStatus;

/// Outcome of a single fetch attempt.
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub text: String,
    pub status: QueryStatus,
}

/// Abstracts the fetch step so `Monitor::scan` can be exercised against
/// a scripted fake instead of real network I/O.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, cookie_header: Option<&str>) -> FetchOutcome;
}

pub struct Fetcher {
    client: Client,
    max_bytes: usize,
    max_text_chars: usize,
    dump_dir: Option<std::path::PathBuf>,
}

impl Fetcher {
    pub fn new(
        timeout_ms: u64,
        user_agent: &str,
        max_bytes: usize,
        max_text_chars: usize,
        dump_dir: Option<std::path::PathBuf>,
    ) -> Result<Self, vg_domain::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| vg_domain::Error::Other(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            max_bytes,
            max_text_chars,
            dump_dir,
        })
    }

    fn dump_page(&self, dir: &Path, url: &str, body: &str) {
        let name = safe_dump_name(url);
        let path = dir.join(format!("{name}.html"));
        if let Err(e) = std::fs::write(&path, body) {
            warn!(path = %path.display(), error = %e, "page dump failed");
        }
    }
}

#[async_trait::async_trait]
impl Fetch for Fetcher {
    /// Fetch `url`, optionally attaching a raw `Cookie` header, and
    /// return normalized text plus a status. Any network-level failure
    /// (DNS, connection refused/reset, timeout) is reported as
    /// `ConnectionLost` rather than propagated as an `Err` — a
    /// transient network blip is a scan outcome, not a caller error.
    async fn fetch(&self, url: &str, cookie_header: Option<&str>) -> FetchOutcome {
        if let Err(e) = validate_url(url).await {
            warn!(url, error = %e, "url failed ssrf validation");
            return FetchOutcome {
                text: String::new(),
                status: QueryStatus::ConnectionLost,
            };
        }

        let mut request = self.client.get(url);
        if let Some(cookies) = cookie_header {
            request = request.header(reqwest::header::COOKIE, cookies);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "fetch failed");
                return FetchOutcome {
                    text: String::new(),
                    status: QueryStatus::ConnectionLost,
                };
            }
        };

        let bytes = match read_capped(response, self.max_bytes).await {
            Ok(b) => b,
            Err(e) => {
                debug!(url, error = %e, "reading response body failed");
                return FetchOutcome {
                    text: String::new(),
                    status: QueryStatus::ConnectionLost,
                };
            }
        };

        let body = String::from_utf8_lossy(&bytes);
        let text = html_to_text(&body, self.max_text_chars);

        if let Some(dir) = &self.dump_dir {
            self.dump_page(dir, url, &body);
        }

        FetchOutcome {
            text,
            status: QueryStatus::Ok,
        }
    }
}

async fn read_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    use futures_util::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() >= max_bytes {
            buf.truncate(max_bytes);
            break;
        }
    }
    Ok(buf)
}

/// True if `addr` is a loopback/private/link-local/CGNAT address that
/// should never be reachable from an outbound fetch. Shared between the
/// DNS-resolution check in [`ssrf`] and any future direct-IP callers.
pub(crate) fn is_blocked_ip(addr: IpAddr) -> bool {
    ssrf::is_blocked_addr(addr)
}

/// A scripted [`Fetch`] implementation for scan/scheduler tests: each
/// call pops the next queued outcome, repeating the last one once the
/// queue is drained.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeFetcher {
    outcomes: parking_lot::Mutex<std::collections::VecDeque<FetchOutcome>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeFetcher {
    pub fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self {
            outcomes: parking_lot::Mutex::new(outcomes.into()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl Fetch for FakeFetcher {
    async fn fetch(&self, _url: &str, _cookie_header: Option<&str>) -> FetchOutcome {
        let mut queue = self.outcomes.lock();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(FetchOutcome {
                text: String::new(),
                status: QueryStatus::ConnectionLost,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_fetcher_repeats_last_outcome() {
        let fake = FakeFetcher::new(vec![
            FetchOutcome { text: "one".into(), status: QueryStatus::Ok },
            FetchOutcome { text: "two".into(), status: QueryStatus::Ok },
        ]);
        assert_eq!(fake.fetch("http://x", None).await.text, "one");
        assert_eq!(fake.fetch("http://x", None).await.text, "two");
        assert_eq!(fake.fetch("http://x", None).await.text, "two");
    }
}
