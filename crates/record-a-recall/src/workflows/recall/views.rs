use std::collections::BTreeMap;

use chrono::NaiveDate;
use minijinja::Environment;
use serde::Serialize;

use super::dates::{long_date, DateInput};
use super::domain::{JourneyId, PrisonerId, Recall, RecallType};
use super::eligibility::{CaseEligibility, EligibilitySummary, RecallRoute, SentenceEligibility};
use super::journey::{JourneyStep, RecallJourney};
use super::validation::FieldError;

const TEMPLATES: [(&str, &str); 12] = [
    ("layout.html", include_str!("templates/layout.html")),
    ("macros.html", include_str!("templates/macros.html")),
    ("error.html", include_str!("templates/error.html")),
    ("person.html", include_str!("templates/person.html")),
    ("revocation_date.html", include_str!("templates/revocation_date.html")),
    ("return_to_custody.html", include_str!("templates/return_to_custody.html")),
    ("check_sentences.html", include_str!("templates/check_sentences.html")),
    ("select_court_cases.html", include_str!("templates/select_court_cases.html")),
    ("recall_type.html", include_str!("templates/recall_type.html")),
    ("check_answers.html", include_str!("templates/check_answers.html")),
    ("confirmation.html", include_str!("templates/confirmation.html")),
    ("not_possible.html", include_str!("templates/not_possible.html")),
];

/// Template environment for every page of the journey, compiled into the binary.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        env.add_filter("long_date", long_date_filter);
        Ok(Self { env })
    }

    pub fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String, minijinja::Error> {
        self.env.get_template(template)?.render(context)
    }
}

/// Accepts ISO dates as serialized by chrono; anything else passes through untouched.
fn long_date_filter(value: String) -> String {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map(long_date)
        .unwrap_or(value)
}

pub fn person_url(prisoner_id: &PrisonerId) -> String {
    format!("/person/{prisoner_id}")
}

pub fn create_url(prisoner_id: &PrisonerId) -> String {
    format!("/person/{prisoner_id}/create-recall")
}

pub fn edit_url(prisoner_id: &PrisonerId, recall: &Recall) -> String {
    format!("/person/{prisoner_id}/edit-recall/{}", recall.recall_id)
}

pub fn step_url(prisoner_id: &PrisonerId, journey_id: &JourneyId, step: JourneyStep) -> String {
    format!("/person/{prisoner_id}/recall/{journey_id}/{}", step.slug())
}

pub const fn template_for(step: JourneyStep) -> &'static str {
    match step {
        JourneyStep::RevocationDate => "revocation_date.html",
        JourneyStep::ReturnToCustody => "return_to_custody.html",
        JourneyStep::CheckSentences => "check_sentences.html",
        JourneyStep::SelectCourtCases => "select_court_cases.html",
        JourneyStep::RecallType => "recall_type.html",
        JourneyStep::CheckYourAnswers => "check_answers.html",
        JourneyStep::Confirmation => "confirmation.html",
        JourneyStep::NotPossible => "not_possible.html",
    }
}

/// Fields every page shares, with the page-specific body flattened alongside.
#[derive(Debug, Serialize)]
pub struct Page<'a, T> {
    pub title: &'a str,
    pub caption: &'a str,
    pub back_link: Option<String>,
    pub action: Option<String>,
    pub errors: &'a [FieldError],
    /// First message per field, for inline error text.
    pub field_errors: BTreeMap<&'a str, &'a str>,
    #[serde(flatten)]
    pub body: T,
}

impl<'a, T> Page<'a, T> {
    pub fn new(title: &'a str, caption: &'a str, errors: &'a [FieldError], body: T) -> Self {
        let mut field_errors = BTreeMap::new();
        for error in errors {
            field_errors
                .entry(error.field.as_str())
                .or_insert(error.message.as_str());
        }
        Self {
            title,
            caption,
            back_link: None,
            action: None,
            errors,
            field_errors,
            body,
        }
    }

    pub fn back_link(mut self, link: Option<String>) -> Self {
        self.back_link = link;
        self
    }

    pub fn action(mut self, action: String) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RecallRow {
    pub recall_id: String,
    pub revocation_date: NaiveDate,
    pub return_to_custody_date: Option<NaiveDate>,
    pub recall_type: &'static str,
    pub sentence_count: usize,
    pub edit_link: String,
}

#[derive(Debug, Serialize)]
pub struct PersonView {
    pub prisoner_id: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub prison_name: Option<String>,
    pub create_link: String,
    pub recalls: Vec<RecallRow>,
}

#[derive(Debug, Serialize)]
pub struct DateStepView<'a> {
    pub date: &'a DateInput,
}

#[derive(Debug, Serialize)]
pub struct ReturnToCustodyView<'a> {
    pub in_prison: Option<&'a str>,
    pub arrest_date: &'a DateInput,
}

#[derive(Debug, Serialize)]
pub struct SentenceRow {
    pub sentence_id: String,
    pub offence: String,
    pub sentence_date: Option<NaiveDate>,
    pub sentence_type: String,
    pub term: String,
    pub status: &'static str,
    pub recallable: bool,
    pub reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CaseGroup {
    pub case_id: String,
    pub heading: String,
    pub court_name: String,
    pub appearance_date: NaiveDate,
    pub sentences: Vec<SentenceRow>,
}

impl From<&CaseEligibility> for CaseGroup {
    fn from(case: &CaseEligibility) -> Self {
        Self {
            case_id: case.case_id.clone(),
            heading: case_heading(case),
            court_name: case.court_name.clone(),
            appearance_date: case.appearance_date,
            sentences: case
                .sentences
                .iter()
                .map(|assessed| {
                    let sentence = &assessed.sentence;
                    SentenceRow {
                        sentence_id: sentence.sentence_id.clone(),
                        offence: offence_text(&sentence.offence_code, &sentence.offence_description),
                        sentence_date: sentence.sentence_date,
                        sentence_type: sentence
                            .sentence_type_description
                            .clone()
                            .unwrap_or_else(|| sentence.classification.label().to_string()),
                        term: sentence
                            .term
                            .map(|term| term.describe())
                            .unwrap_or_else(|| "No term recorded".to_string()),
                        status: assessed.eligibility.label(),
                        recallable: assessed.eligibility.is_recallable(),
                        reason: assessed.eligibility.reason().map(|reason| reason.description()),
                    }
                })
                .collect(),
        }
    }
}

fn case_heading(case: &CaseEligibility) -> String {
    match &case.reference {
        Some(reference) if !reference.trim().is_empty() => {
            format!("{} at {}", reference, case.court_name)
        }
        _ => case.court_name.clone(),
    }
}

fn offence_text(code: &str, description: &str) -> String {
    match (code.trim(), description.trim()) {
        ("", "") => "Offence not recorded".to_string(),
        ("", description) => description.to_string(),
        (code, "") => code.to_string(),
        (code, description) => format!("{code} {description}"),
    }
}

#[derive(Debug, Serialize)]
pub struct SentencesView {
    pub revocation_date: NaiveDate,
    pub route: RecallRoute,
    pub manual: bool,
    pub cases: Vec<CaseGroup>,
    pub eligible_count: usize,
    pub review_count: usize,
    pub ineligible_count: usize,
}

impl From<&EligibilitySummary> for SentencesView {
    fn from(summary: &EligibilitySummary) -> Self {
        Self {
            revocation_date: summary.revocation_date,
            route: summary.route,
            manual: summary.route == RecallRoute::Manual,
            cases: summary.cases.iter().map(CaseGroup::from).collect(),
            eligible_count: summary.count(|e| e == SentenceEligibility::Eligible),
            review_count: summary.count(|e| matches!(e, SentenceEligibility::ManualReview(_))),
            ineligible_count: summary.count(|e| !e.is_recallable()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaseOption {
    pub case_id: String,
    pub heading: String,
    pub appearance_date: NaiveDate,
    pub recallable_sentences: usize,
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct CourtCasesView {
    pub revocation_date: NaiveDate,
    pub cases: Vec<CaseOption>,
}

impl CourtCasesView {
    pub fn new(summary: &EligibilitySummary, selected: &[String]) -> Self {
        let cases = summary
            .candidate_cases()
            .into_iter()
            .map(|case| CaseOption {
                case_id: case.case_id.clone(),
                heading: case_heading(case),
                appearance_date: case.appearance_date,
                recallable_sentences: case
                    .sentences
                    .iter()
                    .filter(|assessed| assessed.eligibility.is_recallable())
                    .count(),
                checked: selected.iter().any(|id| *id == case.case_id),
            })
            .collect();
        Self {
            revocation_date: summary.revocation_date,
            cases,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecallTypeOption {
    pub code: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct RecallTypeView {
    pub options: Vec<RecallTypeOption>,
}

impl RecallTypeView {
    pub fn new(allowed: &[RecallType], chosen: Option<&str>) -> Self {
        let options = allowed
            .iter()
            .map(|recall_type| RecallTypeOption {
                code: recall_type.code(),
                label: recall_type.label(),
                checked: chosen.is_some_and(|code| recall_type.code().eq_ignore_ascii_case(code.trim())),
            })
            .collect();
        Self { options }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub key: &'static str,
    pub value: String,
    pub change_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckAnswersView {
    pub rows: Vec<SummaryRow>,
    pub submit_label: &'static str,
}

impl CheckAnswersView {
    pub fn new(journey: &RecallJourney, summary: &EligibilitySummary) -> Self {
        let link = |step| Some(step_url(&journey.prisoner_id, &journey.id, step));
        let mut rows = Vec::new();

        if let Some(date) = journey.revocation_date {
            rows.push(SummaryRow {
                key: "Revocation date",
                value: long_date(date),
                change_link: link(JourneyStep::RevocationDate),
            });
        }

        let in_prison = journey.in_prison_at_recall.unwrap_or(false);
        rows.push(SummaryRow {
            key: "In prison when the recall was made",
            value: if in_prison { "Yes" } else { "No" }.to_string(),
            change_link: link(JourneyStep::ReturnToCustody),
        });
        if let Some(date) = journey.return_to_custody_date {
            rows.push(SummaryRow {
                key: "Arrest date",
                value: long_date(date),
                change_link: link(JourneyStep::ReturnToCustody),
            });
        }

        if journey.route == Some(RecallRoute::Manual) {
            let headings: Vec<String> = summary
                .cases
                .iter()
                .filter(|case| journey.selected_case_ids.contains(&case.case_id))
                .map(case_heading)
                .collect();
            rows.push(SummaryRow {
                key: "Court cases",
                value: headings.join(", "),
                change_link: link(JourneyStep::SelectCourtCases),
            });
        }

        let sentences = journey.sentence_ids.len();
        rows.push(SummaryRow {
            key: "Sentences",
            value: if sentences == 1 {
                "1 sentence".to_string()
            } else {
                format!("{sentences} sentences")
            },
            change_link: link(JourneyStep::CheckSentences),
        });

        if let Some(recall_type) = journey.recall_type {
            rows.push(SummaryRow {
                key: "Recall type",
                value: recall_type.label().to_string(),
                change_link: link(JourneyStep::RecallType),
            });
        }

        Self {
            rows,
            submit_label: if journey.mode.is_edit() {
                "Save changes"
            } else {
                "Confirm and save"
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmationView {
    pub recall_id: String,
    pub edited: bool,
    pub person_link: String,
}

#[derive(Debug, Serialize)]
pub struct NotPossibleView {
    pub revocation_date: NaiveDate,
    pub no_sentences: bool,
    pub cases: Vec<CaseGroup>,
    pub change_link: String,
    pub person_link: String,
}

impl NotPossibleView {
    pub fn new(journey: &RecallJourney, summary: &EligibilitySummary) -> Self {
        Self {
            revocation_date: summary.revocation_date,
            no_sentences: summary.route == RecallRoute::NoSentences,
            cases: summary.cases.iter().map(CaseGroup::from).collect(),
            change_link: step_url(&journey.prisoner_id, &journey.id, JourneyStep::RevocationDate),
            person_link: person_url(&journey.prisoner_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_renders_inside_layout() {
        let views = Views::new().expect("templates compile");
        let page = Page::new(
            "Page not found",
            "Record a recall",
            &[],
            ErrorView {
                status: 404,
                message: "journey not found".to_string(),
            },
        );
        let html = views.render("error.html", &page).expect("error page renders");
        assert!(html.contains("Page not found"));
        assert!(html.contains("journey not found"));
        assert!(html.contains("Record a recall"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let views = Views::new().expect("templates compile");
        let page = Page::new("x", "y", &[], ErrorView { status: 500, message: String::new() });
        assert!(views.render("missing.html", &page).is_err());
    }

    #[test]
    fn long_date_filter_formats_iso_dates_only() {
        assert_eq!(long_date_filter("2024-03-03".to_string()), "3 March 2024");
        assert_eq!(long_date_filter("unknown".to_string()), "unknown");
    }

    #[test]
    fn error_summary_links_to_fields_and_echoes_input() {
        let views = Views::new().expect("templates compile");
        let date = DateInput::new("31", "2", "2024");
        let errors = [
            FieldError::new("revocationDate", "Revocation date must be a real date"),
            FieldError::new("revocationDate", "second message is not shown inline"),
        ];
        let page = Page::new(
            JourneyStep::RevocationDate.title(),
            "Record a recall",
            &errors,
            DateStepView { date: &date },
        )
        .back_link(Some("/person/A1234BC".to_string()))
        .action("/person/A1234BC/recall/x/revocation-date".to_string());
        assert_eq!(page.field_errors.len(), 1);

        let html = views.render("revocation_date.html", &page).expect("page renders");
        assert!(html.contains("There is a problem"));
        assert!(html.contains("href=\"#revocationDate\""));
        assert!(html.contains("value=\"31\""));
        assert!(html.contains("<title>Error: "));
        assert!(html.contains("govuk-error-message"));
    }

    #[test]
    fn recall_type_options_mark_the_chosen_code() {
        let view = RecallTypeView::new(
            &[RecallType::Standard, RecallType::FixedTerm28],
            Some("ftr_28"),
        );
        let checked: Vec<&str> = view
            .options
            .iter()
            .filter(|option| option.checked)
            .map(|option| option.code)
            .collect();
        assert_eq!(checked, vec!["FTR_28"]);
    }
}
