// Search preferences, parsed eagerly from a loosely typed payload

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_RESULT_BUDGET: usize = 50;

pub const MISSING_REQUIRED_MESSAGE: &str =
    "Missing required preferences: title and location must be provided";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreferenceError {
    #[error("{}", MISSING_REQUIRED_MESSAGE)]
    MissingRequired,

    #[error("Invalid preference '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PreferenceError>;

/// Lower-cased, trimmed, de-duplicated search terms in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermSet(Vec<String>);

impl TermSet {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for term in terms {
            let term = term.as_ref().trim().to_lowercase();
            if !term.is_empty() && !normalized.contains(&term) {
                normalized.push(term);
            }
        }
        Self(normalized)
    }

    /// Split a comma-separated string.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// True when any term is a substring of `haystack`, ignoring case.
    pub fn matches_any(&self, haystack: &str) -> bool {
        let haystack = haystack.trim().to_lowercase();
        self.0.iter().any(|term| haystack.contains(term.as_str()))
    }

    fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

/// A user's search criteria. Titles and locations are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceSet {
    titles: TermSet,
    locations: TermSet,
    company_names: Option<TermSet>,
    job_types: Option<TermSet>,
    salary_terms: Option<TermSet>,
    description_keywords: Option<TermSet>,
    benefits_terms: Option<TermSet>,
    radius: Option<u32>,
    result_budget: usize,
}

impl PreferenceSet {
    pub fn new(titles: TermSet, locations: TermSet) -> Result<Self> {
        if titles.is_empty() || locations.is_empty() {
            return Err(PreferenceError::MissingRequired);
        }
        Ok(Self {
            titles,
            locations,
            company_names: None,
            job_types: None,
            salary_terms: None,
            description_keywords: None,
            benefits_terms: None,
            radius: None,
            result_budget: DEFAULT_RESULT_BUDGET,
        })
    }

    pub fn with_company_names(mut self, terms: TermSet) -> Self {
        self.company_names = terms.non_empty();
        self
    }

    pub fn with_job_types(mut self, terms: TermSet) -> Self {
        self.job_types = terms.non_empty();
        self
    }

    pub fn with_salary_terms(mut self, terms: TermSet) -> Self {
        self.salary_terms = terms.non_empty();
        self
    }

    pub fn with_description_keywords(mut self, terms: TermSet) -> Self {
        self.description_keywords = terms.non_empty();
        self
    }

    pub fn with_benefits_terms(mut self, terms: TermSet) -> Self {
        self.benefits_terms = terms.non_empty();
        self
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_result_budget(mut self, budget: usize) -> Self {
        self.result_budget = budget;
        self
    }

    /// Parse an invocation payload.
    ///
    /// Field names accept snake_case and camelCase aliases. Multi-valued
    /// fields may be comma-separated strings or arrays, and numbers may be
    /// sent as strings.
    pub fn from_value(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| PreferenceError::InvalidField {
            field: "payload".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let titles = terms_field(object, &["title", "titles"])?.unwrap_or_default();
        let locations = terms_field(object, &["location", "locations"])?.unwrap_or_default();
        let mut prefs = Self::new(titles, locations)?;

        prefs.company_names = terms_field(object, &["company_name", "companyName", "company_names"])?;
        prefs.job_types = terms_field(object, &["job_type", "jobType", "job_types"])?;
        prefs.salary_terms = terms_field(object, &["salary"])?;
        prefs.description_keywords = terms_field(object, &["description"])?;
        prefs.benefits_terms = terms_field(object, &["benefits"])?;

        if let Some((field, value)) = lookup(object, &["radius"]) {
            let radius = number_field(field, value)?;
            prefs.radius = radius
                .map(|r| {
                    u32::try_from(r).map_err(|_| PreferenceError::InvalidField {
                        field: field.to_string(),
                        reason: format!("{} is out of range", r),
                    })
                })
                .transpose()?;
        }

        if let Some((field, value)) =
            lookup(object, &["result_budget", "resultBudget", "scrape_length"])
        {
            if let Some(budget) = number_field(field, value)? {
                if budget == 0 {
                    return Err(PreferenceError::InvalidField {
                        field: field.to_string(),
                        reason: "must be a positive integer".to_string(),
                    });
                }
                prefs.result_budget = usize::try_from(budget).unwrap_or(usize::MAX);
            }
        }

        Ok(prefs)
    }

    pub fn titles(&self) -> &TermSet {
        &self.titles
    }

    pub fn locations(&self) -> &TermSet {
        &self.locations
    }

    pub fn company_names(&self) -> Option<&TermSet> {
        self.company_names.as_ref()
    }

    pub fn job_types(&self) -> Option<&TermSet> {
        self.job_types.as_ref()
    }

    pub fn salary_terms(&self) -> Option<&TermSet> {
        self.salary_terms.as_ref()
    }

    pub fn description_keywords(&self) -> Option<&TermSet> {
        self.description_keywords.as_ref()
    }

    pub fn benefits_terms(&self) -> Option<&TermSet> {
        self.benefits_terms.as_ref()
    }

    pub fn radius(&self) -> Option<u32> {
        self.radius
    }

    pub fn result_budget(&self) -> usize {
        self.result_budget
    }

    /// The site query: every title, OR-ed.
    pub fn search_query(&self) -> String {
        self.titles.terms().join(" OR ")
    }

    /// The site accepts one location per search, the filter still checks all of them.
    pub fn search_location(&self) -> &str {
        self.locations.first().unwrap_or_default()
    }
}

/// First alias carrying a value. Nulls and blank strings fall through to the next alias.
fn lookup<'a>(object: &'a Map<String, Value>, names: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    names.iter().find_map(|name| {
        object
            .get(*name)
            .filter(|value| !is_blank(value))
            .map(|value| (*name, value))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn terms_field(object: &Map<String, Value>, names: &[&'static str]) -> Result<Option<TermSet>> {
    let Some((field, value)) = lookup(object, names) else {
        return Ok(None);
    };

    let terms = match value {
        Value::String(raw) => TermSet::parse(raw),
        Value::Array(items) => {
            let mut raw = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => raw.extend(s.split(',').map(str::to_string)),
                    Value::Number(n) => raw.push(n.to_string()),
                    Value::Null => {}
                    other => {
                        return Err(PreferenceError::InvalidField {
                            field: field.to_string(),
                            reason: format!("unexpected list item {}", other),
                        });
                    }
                }
            }
            TermSet::new(raw)
        }
        Value::Number(n) => TermSet::new([n.to_string()]),
        other => {
            return Err(PreferenceError::InvalidField {
                field: field.to_string(),
                reason: format!("expected a string or list, got {}", other),
            });
        }
    };

    Ok(terms.non_empty())
}

fn number_field(field: &str, value: &Value) -> Result<Option<u64>> {
    let invalid = |reason: String| PreferenceError::InvalidField {
        field: field.to_string(),
        reason,
    };

    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(format!("{} is not a non-negative integer", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| invalid(format!("'{}': {}", s, e))),
        other => Err(invalid(format!("expected a number, got {}", other))),
    }
}
