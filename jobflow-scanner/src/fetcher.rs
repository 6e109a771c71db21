use crate::error::{BlockReason, FetchError, Result, ScanError};
use crate::identity::{Identity, redact_proxy};
use crate::result::FetchedPage;
use crate::site::SiteProfile;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Fetches search result pages, one pooled client per upstream proxy.
pub struct PageFetcher {
    site: SiteProfile,
    request_timeout: Duration,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl PageFetcher {
    /// Builds the direct (proxy-less) client up front so a broken TLS or
    /// header setup fails the run before any page is requested.
    pub fn new(site: SiteProfile, request_timeout: Duration) -> Result<Self> {
        let direct = build_client(None, request_timeout)?;
        let mut clients = HashMap::new();
        clients.insert(None, direct);

        Ok(Self {
            site,
            request_timeout,
            clients: Mutex::new(clients),
        })
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client> {
        let key = proxy.map(str::to_string);
        let mut clients = match self.clients.lock() {
            Ok(clients) => clients,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(proxy, self.request_timeout)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Fetch one page under the given identity.
    ///
    /// Responses that land on a challenge path or carry a status >= 400 come
    /// back as [`FetchError::Blocked`] rather than as a page.
    pub async fn fetch(&self, url: &str, identity: &Identity) -> std::result::Result<FetchedPage, FetchError> {
        let client = self
            .client_for(identity.proxy.as_deref())
            .map_err(|e| FetchError::Client {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "Fetching {} via {}",
            url,
            identity
                .proxy
                .as_deref()
                .map(redact_proxy)
                .unwrap_or_else(|| "direct".to_string())
        );

        let start = Instant::now();
        let response = client
            .get(url)
            .header(header::USER_AGENT, identity.user_agent.as_str())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if self.site.is_challenge(&final_url) {
            warn!("{} redirected to challenge page {}", url, final_url);
            return Err(FetchError::Blocked {
                url: url.to_string(),
                reason: BlockReason::ChallengeRedirect(final_url),
            });
        }

        if status_code >= 400 {
            warn!("{} answered with HTTP {}", url, status_code);
            return Err(FetchError::Blocked {
                url: url.to_string(),
                reason: BlockReason::Status(status_code),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let mut page = FetchedPage::new(url.to_string());
        page.final_url = final_url;
        page.status_code = status_code;
        page.content_type = content_type;
        page.response_time = start.elapsed();
        page.body = body;

        Ok(page)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

fn build_client(proxy: Option<&str>, timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder()
        .default_headers(default_headers())
        .cookie_store(true)
        .gzip(true)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5));

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| ScanError::InvalidProxy {
            proxy: redact_proxy(proxy),
            reason: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}
