use super::common::*;

use crate::workflows::recall::dates::DateInput;
use crate::workflows::recall::domain::{Recall, RecallType};
use crate::workflows::recall::eligibility::summarise;
use crate::workflows::recall::journey::{JourneyStep, RecallJourney};
use crate::workflows::recall::validation::{
    earliest_sentence_date, validate_court_case_selection, validate_journey,
    validate_recall_type, validate_return_to_custody, validate_revocation_date, JourneyContext,
    ReturnToCustodyInput, RevocationContext, ValidationErrors,
};

fn message(errors: ValidationErrors) -> String {
    errors.errors()[0].message.clone()
}

fn revocation_errors(
    input: DateInput,
    recalls: &[Recall],
    editing: Option<&crate::workflows::recall::domain::RecallId>,
) -> Result<chrono::NaiveDate, ValidationErrors> {
    let cases = vec![long_case(), short_case()];
    let ctx = RevocationContext {
        today: today(),
        court_cases: &cases,
        existing_recalls: recalls,
        editing,
    };
    validate_revocation_date(&input, &ctx)
}

#[test]
fn revocation_date_must_be_entered_and_not_in_the_future() {
    let blank = revocation_errors(DateInput::default(), &[], None).expect_err("blank rejected");
    assert_eq!(message(blank), "Enter the revocation date");
    assert_eq!(
        revocation_errors(DateInput::default(), &[], None)
            .expect_err("blank rejected")
            .errors()[0]
            .field,
        "revocationDate"
    );

    let future = revocation_errors(DateInput::new("16", "6", "2024"), &[], None)
        .expect_err("future rejected");
    assert_eq!(message(future), "Revocation date must be today or in the past");

    assert_eq!(
        revocation_errors(DateInput::new("15", "6", "2024"), &[], None).expect("today accepted"),
        today()
    );
}

#[test]
fn revocation_date_must_follow_the_earliest_sentence() {
    assert_eq!(
        earliest_sentence_date(&[long_case(), short_case()]),
        Some(date(2023, 1, 10))
    );

    let same_day = revocation_errors(DateInput::new("10", "1", "2023"), &[], None)
        .expect_err("earliest sentence date rejected");
    assert_eq!(
        message(same_day),
        "Revocation date must be after the earliest sentence date of 10 January 2023"
    );

    assert!(revocation_errors(DateInput::new("11", "1", "2023"), &[], None).is_ok());
}

#[test]
fn revocation_date_cannot_repeat_an_existing_recall_unless_editing_it() {
    let existing = vec![recall("r-1", date(2024, 2, 1), RecallType::Standard)];

    let duplicate = revocation_errors(DateInput::new("1", "2", "2024"), &existing, None)
        .expect_err("duplicate rejected");
    assert_eq!(
        message(duplicate),
        "A recall has already been recorded with this revocation date"
    );

    let editing = existing[0].recall_id.clone();
    assert!(revocation_errors(DateInput::new("1", "2", "2024"), &existing, Some(&editing)).is_ok());
}

#[test]
fn revocation_date_cannot_fall_inside_a_fixed_term_window() {
    let mut ftr = recall("r-ftr", date(2024, 1, 10), RecallType::FixedTerm14);
    ftr.return_to_custody_date = Some(date(2024, 1, 12));
    let existing = vec![ftr, recall("r-lr", date(2023, 6, 1), RecallType::Standard)];

    let overlap = revocation_errors(DateInput::new("25", "1", "2024"), &existing, None)
        .expect_err("overlap rejected");
    assert_eq!(
        message(overlap),
        "Revocation date overlaps with a 14-day fixed term recall from 10 January 2024 to 25 January 2024"
    );

    assert!(revocation_errors(DateInput::new("26", "1", "2024"), &existing, None).is_ok());
    assert!(revocation_errors(DateInput::new("2", "6", "2023"), &existing, None).is_ok());
}

#[test]
fn return_to_custody_requires_an_answer_and_a_valid_arrest_date() {
    let revocation = date(2024, 3, 1);
    let answer = |in_prison: Option<&str>, arrest: DateInput| {
        validate_return_to_custody(
            &ReturnToCustodyInput {
                in_prison_at_recall: in_prison.map(str::to_string),
                arrest_date: arrest,
            },
            revocation,
            today(),
        )
    };

    let missing = answer(None, DateInput::default()).expect_err("answer required");
    assert_eq!(missing.errors()[0].field, "inPrisonAtRecall");

    let in_prison = answer(Some("true"), DateInput::new("1", "1", "2020")).expect("yes accepted");
    assert!(in_prison.in_prison_at_recall);
    assert_eq!(in_prison.return_to_custody_date, None);

    let blank = answer(Some("false"), DateInput::default()).expect_err("arrest date required");
    assert_eq!(message(blank), "Enter the arrest date");

    let early = answer(Some("no"), DateInput::new("29", "2", "2024")).expect_err("early rejected");
    assert_eq!(
        message(early),
        "Arrest date must be on or after the revocation date"
    );

    let same_day = answer(Some("false"), DateInput::new("1", "3", "2024")).expect("same day ok");
    assert_eq!(same_day.return_to_custody_date, Some(revocation));
}

#[test]
fn court_case_selection_must_come_from_the_candidates() {
    let summary = summarise(&[long_case(), unknown_case()], date(2024, 3, 1));
    let candidates = summary.candidate_cases();

    let none = validate_court_case_selection(&[], &candidates).expect_err("empty rejected");
    assert_eq!(message(none), "Select at least one court case");

    let unknown = validate_court_case_selection(&["case-missing".to_string()], &candidates)
        .expect_err("unknown case rejected");
    assert_eq!(message(unknown), "Select a court case from the list");

    let selected = validate_court_case_selection(
        &[
            "case-unknown".to_string(),
            " ".to_string(),
            "case-unknown".to_string(),
            "case-long".to_string(),
        ],
        &candidates,
    )
    .expect("selection accepted");
    assert_eq!(selected, vec!["case-unknown".to_string(), "case-long".to_string()]);
}

#[test]
fn recall_type_must_be_allowed() {
    let allowed = [RecallType::Standard, RecallType::FixedTerm28];

    assert_eq!(
        message(validate_recall_type(None, &allowed).expect_err("missing rejected")),
        "Select a recall type"
    );
    assert_eq!(
        message(validate_recall_type(Some("FTR_56"), &allowed).expect_err("unknown rejected")),
        "Select a recall type from the list"
    );
    assert_eq!(
        message(validate_recall_type(Some("FTR_14"), &allowed).expect_err("not allowed")),
        "14-day fixed-term is not available for the sentences on this recall"
    );
    assert_eq!(
        validate_recall_type(Some("ftr_28"), &allowed).expect("allowed"),
        RecallType::FixedTerm28
    );
}

fn complete_journey() -> RecallJourney {
    let revocation = date(2024, 3, 1);
    let mut journey = RecallJourney::create(prisoner_id());
    journey.set_revocation_date(revocation);
    journey.set_return_to_custody(true, None);
    journey.set_route(&summarise(&[long_case()], revocation));
    journey.set_recall_type(RecallType::FixedTerm28);
    journey
}

#[test]
fn whole_journey_passes_against_unchanged_data() {
    let cases = vec![long_case()];
    let ctx = JourneyContext {
        today: today(),
        court_cases: &cases,
        existing_recalls: &[],
    };

    let sentence_ids = validate_journey(&complete_journey(), &ctx).expect("journey valid");
    assert_eq!(sentence_ids, vec!["s-long".to_string()]);
}

#[test]
fn whole_journey_reports_the_first_step_that_no_longer_holds() {
    let cases = vec![long_case()];
    let clash = vec![recall("r-other", date(2024, 3, 1), RecallType::Standard)];
    let ctx = JourneyContext {
        today: today(),
        court_cases: &cases,
        existing_recalls: &clash,
    };
    let failure = validate_journey(&complete_journey(), &ctx).expect_err("clash detected");
    assert_eq!(failure.step, JourneyStep::RevocationDate);

    let changed = vec![long_case(), unknown_case()];
    let ctx = JourneyContext {
        today: today(),
        court_cases: &changed,
        existing_recalls: &[],
    };
    let failure = validate_journey(&complete_journey(), &ctx).expect_err("route changed");
    assert_eq!(failure.step, JourneyStep::CheckSentences);
    assert!(failure.errors.errors()[0]
        .message
        .starts_with("Sentence information has changed"));

    let short_only = vec![short_case()];
    let ctx = JourneyContext {
        today: today(),
        court_cases: &short_only,
        existing_recalls: &[],
    };
    let mut journey = complete_journey();
    journey.set_route(&summarise(&short_only, date(2024, 3, 1)));
    let failure = validate_journey(&journey, &ctx).expect_err("type no longer allowed");
    assert_eq!(failure.step, JourneyStep::RecallType);
}
