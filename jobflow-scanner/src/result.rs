use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A search results page as it came back from the site.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    pub body: String,
}

impl FetchedPage {
    pub fn new(url: String) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status_code: 0,
            content_type: None,
            response_time: Duration::from_secs(0),
            body: String::new(),
        }
    }
}

/// A listing extracted from one card, ready for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub external_id: String,
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub job_type: String,
    pub salary: Option<String>,
    pub benefits: Option<String>,
    pub description: Option<String>,
    pub url: String,
}

impl NormalizedJob {
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        company_name: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            company_name: company_name.into(),
            location: String::new(),
            job_type: String::new(),
            salary: None,
            benefits: None,
            description: None,
            url: String::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn with_salary(mut self, salary: impl Into<String>) -> Self {
        self.salary = Some(salary.into());
        self
    }

    pub fn with_benefits(mut self, benefits: impl Into<String>) -> Self {
        self.benefits = Some(benefits.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}
