use chrono::NaiveDate;

use super::super::dates::{long_date, DateField, DateInput};
use super::super::domain::{CourtCase, Recall, RecallId, RecallType};
use super::super::eligibility::{allowed_recall_types, summarise, CaseEligibility, RecallRoute};
use super::super::journey::{JourneyStep, RecallJourney};
use super::{FieldError, ValidationErrors};

const IN_PRISON_FIELD: &str = "inPrisonAtRecall";
const COURT_CASES_FIELD: &str = "courtCases";
const RECALL_TYPE_FIELD: &str = "recallType";
const SENTENCES_FIELD: &str = "sentences";

/// Data the revocation date is checked against.
#[derive(Debug, Clone, Copy)]
pub struct RevocationContext<'a> {
    pub today: NaiveDate,
    pub court_cases: &'a [CourtCase],
    pub existing_recalls: &'a [Recall],
    /// Recall being edited; it never conflicts with itself.
    pub editing: Option<&'a RecallId>,
}

pub fn earliest_sentence_date(court_cases: &[CourtCase]) -> Option<NaiveDate> {
    court_cases
        .iter()
        .filter(|case| case.active)
        .flat_map(|case| case.sentences.iter())
        .filter_map(|sentence| sentence.sentence_date)
        .min()
}

/// Business rules for an already parsed revocation date.
pub fn check_revocation_date(
    date: NaiveDate,
    ctx: &RevocationContext<'_>,
) -> Result<(), FieldError> {
    let field = DateField::REVOCATION.name;

    if let Some(earliest) = earliest_sentence_date(ctx.court_cases) {
        if date <= earliest {
            return Err(FieldError::new(
                field,
                format!(
                    "Revocation date must be after the earliest sentence date of {}",
                    long_date(earliest)
                ),
            ));
        }
    }

    let others = ctx
        .existing_recalls
        .iter()
        .filter(|recall| Some(&recall.recall_id) != ctx.editing);

    for recall in others {
        if recall.revocation_date == date {
            return Err(FieldError::new(
                field,
                "A recall has already been recorded with this revocation date",
            ));
        }

        if let Some(window) = recall.fixed_term_window() {
            if window.contains(date) {
                let last_day = window.end.pred_opt().unwrap_or(window.end);
                return Err(FieldError::new(
                    field,
                    format!(
                        "Revocation date overlaps with a {}-day fixed term recall from {} to {}",
                        window.days,
                        long_date(window.start),
                        long_date(last_day)
                    ),
                ));
            }
        }
    }

    Ok(())
}

pub fn validate_revocation_date(
    input: &DateInput,
    ctx: &RevocationContext<'_>,
) -> Result<NaiveDate, ValidationErrors> {
    let date = input.parse(DateField::REVOCATION, ctx.today)?;
    check_revocation_date(date, ctx)?;
    Ok(date)
}

/// Raw answers from the return-to-custody step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnToCustodyInput {
    pub in_prison_at_recall: Option<String>,
    pub arrest_date: DateInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnToCustody {
    pub in_prison_at_recall: bool,
    pub return_to_custody_date: Option<NaiveDate>,
}

pub fn check_return_to_custody(
    return_to_custody_date: NaiveDate,
    revocation_date: NaiveDate,
) -> Result<(), FieldError> {
    if return_to_custody_date < revocation_date {
        return Err(FieldError::new(
            DateField::ARREST.name,
            "Arrest date must be on or after the revocation date",
        ));
    }
    Ok(())
}

pub fn validate_return_to_custody(
    input: &ReturnToCustodyInput,
    revocation_date: NaiveDate,
    today: NaiveDate,
) -> Result<ReturnToCustody, ValidationErrors> {
    let answer = input
        .in_prison_at_recall
        .as_deref()
        .map(|value| value.trim().to_ascii_lowercase());

    match answer.as_deref() {
        Some("true") | Some("yes") => Ok(ReturnToCustody {
            in_prison_at_recall: true,
            return_to_custody_date: None,
        }),
        Some("false") | Some("no") => {
            let date = input.arrest_date.parse(DateField::ARREST, today)?;
            check_return_to_custody(date, revocation_date)?;
            Ok(ReturnToCustody {
                in_prison_at_recall: false,
                return_to_custody_date: Some(date),
            })
        }
        _ => Err(ValidationErrors::single(
            IN_PRISON_FIELD,
            "Select whether the person was in prison when the recall was made",
        )),
    }
}

/// Keeps the submitted order, drops blanks and duplicates.
pub fn validate_court_case_selection(
    case_ids: &[String],
    candidates: &[&CaseEligibility],
) -> Result<Vec<String>, ValidationErrors> {
    let mut selected: Vec<String> = Vec::new();

    for id in case_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !candidates.iter().any(|case| case.case_id == id) {
            return Err(ValidationErrors::single(
                COURT_CASES_FIELD,
                "Select a court case from the list",
            ));
        }
        if !selected.iter().any(|existing| existing == id) {
            selected.push(id.to_string());
        }
    }

    if selected.is_empty() {
        return Err(ValidationErrors::single(
            COURT_CASES_FIELD,
            "Select at least one court case",
        ));
    }

    Ok(selected)
}

pub fn validate_recall_type(
    code: Option<&str>,
    allowed: &[RecallType],
) -> Result<RecallType, ValidationErrors> {
    let Some(code) = code.map(str::trim).filter(|code| !code.is_empty()) else {
        return Err(ValidationErrors::single(
            RECALL_TYPE_FIELD,
            "Select a recall type",
        ));
    };

    let Some(recall_type) = RecallType::from_code(code) else {
        return Err(ValidationErrors::single(
            RECALL_TYPE_FIELD,
            "Select a recall type from the list",
        ));
    };

    if !allowed.contains(&recall_type) {
        return Err(ValidationErrors::single(
            RECALL_TYPE_FIELD,
            format!(
                "{} is not available for the sentences on this recall",
                recall_type.label()
            ),
        ));
    }

    Ok(recall_type)
}

/// Current API data a stored journey is re-checked against before submission.
#[derive(Debug, Clone, Copy)]
pub struct JourneyContext<'a> {
    pub today: NaiveDate,
    pub court_cases: &'a [CourtCase],
    pub existing_recalls: &'a [Recall],
}

/// First step whose stored answers no longer hold, with the reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyFailure {
    pub step: JourneyStep,
    pub errors: ValidationErrors,
}

impl JourneyFailure {
    fn at(step: JourneyStep, errors: impl Into<ValidationErrors>) -> Self {
        Self {
            step,
            errors: errors.into(),
        }
    }

    fn message(step: JourneyStep, field: &str, message: impl Into<String>) -> Self {
        Self::at(step, ValidationErrors::single(field, message))
    }
}

/// Re-runs every step rule over the stored answers.
///
/// Returns the ids of the sentences the recall covers, recomputed from the
/// current court cases.
pub fn validate_journey(
    journey: &RecallJourney,
    ctx: &JourneyContext<'_>,
) -> Result<Vec<String>, JourneyFailure> {
    let revocation_date = journey.revocation_date.ok_or_else(|| {
        JourneyFailure::message(
            JourneyStep::RevocationDate,
            DateField::REVOCATION.name,
            "Enter the revocation date",
        )
    })?;

    if revocation_date > ctx.today {
        return Err(JourneyFailure::message(
            JourneyStep::RevocationDate,
            DateField::REVOCATION.name,
            "Revocation date must be today or in the past",
        ));
    }

    let revocation_ctx = RevocationContext {
        today: ctx.today,
        court_cases: ctx.court_cases,
        existing_recalls: ctx.existing_recalls,
        editing: journey.mode.recall_id(),
    };
    check_revocation_date(revocation_date, &revocation_ctx)
        .map_err(|error| JourneyFailure::at(JourneyStep::RevocationDate, error))?;

    match journey.in_prison_at_recall {
        None => {
            return Err(JourneyFailure::message(
                JourneyStep::ReturnToCustody,
                IN_PRISON_FIELD,
                "Select whether the person was in prison when the recall was made",
            ))
        }
        Some(true) => {}
        Some(false) => {
            let arrest_date = journey.return_to_custody_date.ok_or_else(|| {
                JourneyFailure::message(
                    JourneyStep::ReturnToCustody,
                    DateField::ARREST.name,
                    "Enter the arrest date",
                )
            })?;
            if arrest_date > ctx.today {
                return Err(JourneyFailure::message(
                    JourneyStep::ReturnToCustody,
                    DateField::ARREST.name,
                    "Arrest date must be today or in the past",
                ));
            }
            check_return_to_custody(arrest_date, revocation_date)
                .map_err(|error| JourneyFailure::at(JourneyStep::ReturnToCustody, error))?;
        }
    }

    let summary = summarise(ctx.court_cases, revocation_date);
    if !summary.route.can_proceed() {
        return Err(JourneyFailure::message(
            JourneyStep::CheckSentences,
            SENTENCES_FIELD,
            "No sentences on this record can be recalled for this revocation date",
        ));
    }
    if journey.route != Some(summary.route) {
        return Err(JourneyFailure::message(
            JourneyStep::CheckSentences,
            SENTENCES_FIELD,
            "Sentence information has changed since it was checked. Check the sentences again",
        ));
    }

    let selection = match summary.route {
        RecallRoute::Manual => {
            let candidates = summary.candidate_cases();
            let selected = validate_court_case_selection(&journey.selected_case_ids, &candidates)
                .map_err(|errors| JourneyFailure::at(JourneyStep::SelectCourtCases, errors))?;
            Some(selected)
        }
        _ => None,
    };

    let sentences = summary.recallable_sentences(selection.as_deref());
    if sentences.is_empty() {
        return Err(JourneyFailure::message(
            JourneyStep::CheckSentences,
            SENTENCES_FIELD,
            "No sentences on this record can be recalled for this revocation date",
        ));
    }

    let allowed = allowed_recall_types(&sentences);
    validate_recall_type(journey.recall_type.map(RecallType::code), &allowed)
        .map_err(|errors| JourneyFailure::at(JourneyStep::RecallType, errors))?;

    Ok(sentences
        .into_iter()
        .map(|sentence| sentence.sentence_id.clone())
        .collect())
}
