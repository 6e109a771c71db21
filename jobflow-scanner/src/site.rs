use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use url::Url;

/// URL conventions of the job board being scraped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub base_url: String,
    pub search_path: String,
    pub view_job_path: String,
    /// Step of the `start` query parameter between consecutive result pages.
    pub results_per_page_offset: usize,
    /// Path prefixes that mean the site bounced us to a login or bot challenge.
    pub block_paths: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://www.indeed.com".to_string(),
            search_path: "/jobs".to_string(),
            view_job_path: "/viewjob".to_string(),
            results_per_page_offset: 10,
            block_paths: vec![
                "/account/login".to_string(),
                "/auth".to_string(),
                "/cdn-cgi/challenge-platform".to_string(),
            ],
        }
    }
}

impl SiteProfile {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    /// Build the URL of the zero-based results page `page`.
    pub fn search_url(
        &self,
        query: &str,
        location: &str,
        radius: Option<u32>,
        page: usize,
    ) -> Result<String> {
        let mut url = self
            .base()?
            .join(&self.search_path)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", self.search_path, e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("l", location);
            if let Some(radius) = radius {
                pairs.append_pair("radius", &radius.to_string());
            }
            pairs.append_pair("start", &(page * self.results_per_page_offset).to_string());
        }

        Ok(url.to_string())
    }

    /// Canonical listing URL for a site-assigned job id.
    pub fn view_job_url(&self, external_id: &str) -> Option<String> {
        let mut url = self.base().ok()?.join(&self.view_job_path).ok()?;
        url.query_pairs_mut().append_pair("jk", external_id);
        Some(url.to_string())
    }

    /// Resolve a card link against the site root, absolute links pass through.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with('#')
        {
            return None;
        }

        if let Ok(absolute) = Url::parse(href) {
            return Some(absolute.to_string());
        }

        let base = self.base().ok()?;
        let resolved = if href.starts_with('/') {
            base.join(href).ok()?
        } else {
            base.join(&format!("/{}", href)).ok()?
        };
        Some(resolved.to_string())
    }

    pub fn is_challenge(&self, final_url: &str) -> bool {
        match Url::parse(final_url) {
            Ok(url) => {
                let path = url.path();
                self.block_paths
                    .iter()
                    .any(|prefix| path.starts_with(prefix.as_str()))
            }
            Err(_) => false,
        }
    }
}
