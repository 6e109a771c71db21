use crate::preferences::{PreferenceSet, TermSet};
use jobflow_scanner::NormalizedJob;
use std::fmt;

/// A preference criterion, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Title,
    Location,
    Company,
    JobType,
    Description,
    Salary,
    Benefits,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Title => "title",
            Criterion::Location => "location",
            Criterion::Company => "company",
            Criterion::JobType => "job_type",
            Criterion::Description => "description",
            Criterion::Salary => "salary",
            Criterion::Benefits => "benefits",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Criterion),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Check a job against every criterion and report the first one that fails.
pub fn evaluate(job: &NormalizedJob, prefs: &PreferenceSet) -> Verdict {
    if !prefs.titles().matches_any(&job.title) {
        return Verdict::Rejected(Criterion::Title);
    }
    if !prefs.locations().matches_any(&job.location) {
        return Verdict::Rejected(Criterion::Location);
    }
    if !optional(prefs.company_names(), &[&job.company_name]) {
        return Verdict::Rejected(Criterion::Company);
    }
    // type and description are often missing from cards, the title is a second chance
    if !optional(prefs.job_types(), &[&job.job_type, &job.title]) {
        return Verdict::Rejected(Criterion::JobType);
    }
    let description = job.description.as_deref().unwrap_or_default();
    if !optional(prefs.description_keywords(), &[description, &job.title]) {
        return Verdict::Rejected(Criterion::Description);
    }
    if !optional(prefs.salary_terms(), &[job.salary.as_deref().unwrap_or_default()]) {
        return Verdict::Rejected(Criterion::Salary);
    }
    if !optional(prefs.benefits_terms(), &[job.benefits.as_deref().unwrap_or_default()]) {
        return Verdict::Rejected(Criterion::Benefits);
    }
    Verdict::Accepted
}

pub fn matches(job: &NormalizedJob, prefs: &PreferenceSet) -> bool {
    evaluate(job, prefs).is_accepted()
}

fn optional(terms: Option<&TermSet>, fields: &[&str]) -> bool {
    match terms {
        None => true,
        Some(terms) => fields.iter().any(|field| terms.matches_any(field)),
    }
}
