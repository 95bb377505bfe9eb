use crate::infra::{describe_types, parse_date};
use chrono::NaiveDate;
use clap::Args;
use record_a_recall::error::AppError;
use record_a_recall::workflows::recall::{
    allowed_recall_types, long_date, summarise, CourtCase, EligibilitySummary, RecallRoute,
};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    /// JSON export of the person's court cases, as returned by the case-management API
    #[arg(long)]
    pub(crate) court_cases: PathBuf,
    /// Revocation date to assess against (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) revocation_date: NaiveDate,
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let raw = fs::read_to_string(&args.court_cases)?;
    let court_cases: Vec<CourtCase> = serde_json::from_str(&raw)?;
    let summary = summarise(&court_cases, args.revocation_date);
    print!("{}", render_summary(&summary));
    Ok(())
}

fn route_description(route: RecallRoute) -> &'static str {
    match route {
        RecallRoute::Automatic => "automatic: every eligible sentence is recalled",
        RecallRoute::Manual => "manual: the caseworker selects court cases",
        RecallRoute::NotPossible => "not possible: no sentence can be recalled",
        RecallRoute::NoSentences => "not possible: no active sentences",
    }
}

fn render_summary(summary: &EligibilitySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Sentence eligibility for revocation date {}",
        long_date(summary.revocation_date)
    );

    for case in &summary.cases {
        let _ = writeln!(
            out,
            "\n{} at {} ({})",
            case.reference.as_deref().unwrap_or(&case.case_id),
            case.court_name,
            long_date(case.appearance_date)
        );
        for assessed in &case.sentences {
            let reason = assessed
                .eligibility
                .reason()
                .map(|reason| format!(": {}", reason.description()))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  - {} [{}] {}{}",
                assessed.sentence.sentence_id,
                assessed.sentence.classification.label(),
                assessed.eligibility.label(),
                reason
            );
        }
    }

    let _ = writeln!(out, "\nRoute: {}", route_description(summary.route));
    if summary.route.can_proceed() {
        let selection = match summary.route {
            RecallRoute::Manual => {
                let ids: Vec<String> = summary
                    .candidate_cases()
                    .iter()
                    .map(|case| case.case_id.clone())
                    .collect();
                Some(ids)
            }
            _ => None,
        };
        let allowed = allowed_recall_types(&summary.recallable_sentences(selection.as_deref()));
        let scope = if selection.is_some() {
            "if every candidate case is selected"
        } else {
            "for the eligible sentences"
        };
        let _ = writeln!(out, "Allowed recall types {scope}: {}", describe_types(&allowed));
    }
    out
}
