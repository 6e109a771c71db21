// Tests for the preference filter

use jobflow_core::filter::{Criterion, Verdict, evaluate, matches};
use jobflow_core::preferences::{PreferenceSet, TermSet};
use jobflow_scanner::NormalizedJob;

fn prefs(titles: &str, locations: &str) -> PreferenceSet {
    PreferenceSet::new(TermSet::parse(titles), TermSet::parse(locations)).unwrap()
}

fn senior_python_developer() -> NormalizedJob {
    NormalizedJob::new("abc123", "Senior Python Developer", "Acme Corp").with_location("New York, NY")
}

// ============================================================================
// Core Scenarios
// ============================================================================

#[test]
fn test_absent_salary_filter_is_vacuous() {
    let prefs = prefs("python,developer", "new york");
    let job = senior_python_developer();

    assert!(job.salary.is_none());
    assert!(matches(&job, &prefs));
}

#[test]
fn test_salary_filter_rejects_job_without_salary() {
    let prefs = prefs("python,developer", "new york").with_salary_terms(TermSet::parse("$100k"));
    let job = senior_python_developer();

    assert!(!matches(&job, &prefs));
    assert_eq!(evaluate(&job, &prefs), Verdict::Rejected(Criterion::Salary));
}

// ============================================================================
// Criterion Semantics
// ============================================================================

#[test]
fn test_terms_within_a_criterion_are_ored() {
    let prefs = prefs("golang,python", "boston,new york");
    assert!(matches(&senior_python_developer(), &prefs));
}

#[test]
fn test_criteria_are_anded() {
    let prefs = prefs("python", "new york").with_company_names(TermSet::parse("Initech"));
    assert_eq!(
        evaluate(&senior_python_developer(), &prefs),
        Verdict::Rejected(Criterion::Company)
    );
}

#[test]
fn test_title_and_location_are_always_checked() {
    let job = senior_python_developer();
    assert_eq!(evaluate(&job, &prefs("java", "new york")), Verdict::Rejected(Criterion::Title));
    assert_eq!(evaluate(&job, &prefs("python", "london")), Verdict::Rejected(Criterion::Location));
}

#[test]
fn test_first_failing_criterion_is_reported() {
    // both company and salary fail, company comes first
    let prefs = prefs("python", "new york")
        .with_company_names(TermSet::parse("Initech"))
        .with_salary_terms(TermSet::parse("$200"));
    assert_eq!(
        evaluate(&senior_python_developer(), &prefs),
        Verdict::Rejected(Criterion::Company)
    );
}

#[test]
fn test_job_type_also_matches_title() {
    let prefs = prefs("engineer", "remote").with_job_types(TermSet::parse("remote"));
    let job = NormalizedJob::new("r1", "Remote Backend Engineer", "Acme").with_location("Remote");

    assert_eq!(job.job_type, "");
    assert!(matches(&job, &prefs));
}

#[test]
fn test_job_type_matches_field() {
    let prefs = prefs("engineer", "remote").with_job_types(TermSet::parse("contract,part-time"));
    let full_time = NormalizedJob::new("j1", "Engineer", "Acme")
        .with_location("Remote")
        .with_job_type("Full-time");
    let contract = full_time.clone().with_job_type("Contract, Temporary");

    assert_eq!(evaluate(&full_time, &prefs), Verdict::Rejected(Criterion::JobType));
    assert!(matches(&contract, &prefs));
}

#[test]
fn test_description_keywords_match_description_or_title() {
    let prefs = prefs("developer", "austin").with_description_keywords(TermSet::parse("django"));

    let in_description = NormalizedJob::new("d1", "Web Developer", "Acme")
        .with_location("Austin, TX")
        .with_description("Build APIs with Django and Postgres");
    let in_title = NormalizedJob::new("d2", "Django Developer", "Acme").with_location("Austin, TX");
    let nowhere = NormalizedJob::new("d3", "Web Developer", "Acme")
        .with_location("Austin, TX")
        .with_description("React frontends");

    assert!(matches(&in_description, &prefs));
    assert!(matches(&in_title, &prefs));
    assert_eq!(evaluate(&nowhere, &prefs), Verdict::Rejected(Criterion::Description));
}

#[test]
fn test_salary_and_benefits_substrings() {
    let prefs = prefs("developer", "new york")
        .with_salary_terms(TermSet::parse("a year"))
        .with_benefits_terms(TermSet::parse("dental,401(k)"));

    let job = NormalizedJob::new("s1", "Developer", "Acme")
        .with_location("New York, NY")
        .with_salary("$120,000 - $150,000 a year")
        .with_benefits("Health insurance, 401(k)");
    assert!(matches(&job, &prefs));

    let no_benefits = NormalizedJob::new("s2", "Developer", "Acme")
        .with_location("New York, NY")
        .with_salary("$60 an hour");
    assert_eq!(evaluate(&no_benefits, &prefs), Verdict::Rejected(Criterion::Salary));
}

#[test]
fn test_empty_optional_criterion_never_rejects() {
    let prefs = prefs("python", "new york")
        .with_company_names(TermSet::parse(" , "))
        .with_benefits_terms(TermSet::new(Vec::<String>::new()));

    assert!(prefs.company_names().is_none());
    assert!(prefs.benefits_terms().is_none());
    assert!(matches(&senior_python_developer(), &prefs));
}
