//! Sentence eligibility: which sentences on a person's court cases can be
//! recalled against a given revocation date, and which recall types those
//! sentences permit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{CourtCase, RecallType, Sentence, SentenceClassification};

/// Why a sentence cannot be recalled automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    NonCustodial,
    Indeterminate,
    SentencedAfterRevocation,
    UnknownSentenceType,
    MissingSentenceDate,
}

impl EligibilityReason {
    pub const fn description(self) -> &'static str {
        match self {
            EligibilityReason::NonCustodial => "Non-custodial sentences cannot be recalled",
            EligibilityReason::Indeterminate => {
                "Indeterminate sentences are recalled through a separate process"
            }
            EligibilityReason::SentencedAfterRevocation => {
                "Sentenced on or after the revocation date"
            }
            EligibilityReason::UnknownSentenceType => {
                "Sentence type is not recognised and needs checking"
            }
            EligibilityReason::MissingSentenceDate => "Sentence date is missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SentenceEligibility {
    Eligible,
    ManualReview(EligibilityReason),
    Ineligible(EligibilityReason),
}

impl SentenceEligibility {
    pub const fn is_recallable(self) -> bool {
        !matches!(self, SentenceEligibility::Ineligible(_))
    }

    pub const fn label(self) -> &'static str {
        match self {
            SentenceEligibility::Eligible => "Eligible",
            SentenceEligibility::ManualReview(_) => "Needs review",
            SentenceEligibility::Ineligible(_) => "Not eligible",
        }
    }

    pub const fn reason(self) -> Option<EligibilityReason> {
        match self {
            SentenceEligibility::Eligible => None,
            SentenceEligibility::ManualReview(reason) | SentenceEligibility::Ineligible(reason) => {
                Some(reason)
            }
        }
    }
}

/// How the journey proceeds once sentences have been assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallRoute {
    Automatic,
    Manual,
    NotPossible,
    NoSentences,
}

impl RecallRoute {
    pub const fn can_proceed(self) -> bool {
        matches!(self, RecallRoute::Automatic | RecallRoute::Manual)
    }
}

pub fn assess_sentence(sentence: &Sentence, revocation_date: NaiveDate) -> SentenceEligibility {
    match sentence.classification {
        SentenceClassification::NonCustodial => {
            return SentenceEligibility::Ineligible(EligibilityReason::NonCustodial)
        }
        SentenceClassification::Indeterminate => {
            return SentenceEligibility::Ineligible(EligibilityReason::Indeterminate)
        }
        _ => {}
    }

    if matches!(sentence.sentence_date, Some(date) if date >= revocation_date) {
        return SentenceEligibility::Ineligible(EligibilityReason::SentencedAfterRevocation);
    }

    if matches!(
        sentence.classification,
        SentenceClassification::Legacy | SentenceClassification::Unknown
    ) {
        return SentenceEligibility::ManualReview(EligibilityReason::UnknownSentenceType);
    }

    if sentence.sentence_date.is_none() {
        return SentenceEligibility::ManualReview(EligibilityReason::MissingSentenceDate);
    }

    SentenceEligibility::Eligible
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessedSentence {
    pub sentence: Sentence,
    pub eligibility: SentenceEligibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseEligibility {
    pub case_id: String,
    pub reference: Option<String>,
    pub court_name: String,
    pub appearance_date: NaiveDate,
    pub sentences: Vec<AssessedSentence>,
}

impl CaseEligibility {
    pub fn has_recallable_sentence(&self) -> bool {
        self.sentences
            .iter()
            .any(|assessed| assessed.eligibility.is_recallable())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilitySummary {
    pub revocation_date: NaiveDate,
    pub cases: Vec<CaseEligibility>,
    pub route: RecallRoute,
}

impl EligibilitySummary {
    /// Cases offered for manual selection, newest appearance first.
    pub fn candidate_cases(&self) -> Vec<&CaseEligibility> {
        let mut candidates: Vec<&CaseEligibility> = self
            .cases
            .iter()
            .filter(|case| case.has_recallable_sentence())
            .collect();
        candidates.sort_by(|a, b| b.appearance_date.cmp(&a.appearance_date));
        candidates
    }

    pub fn is_candidate(&self, case_id: &str) -> bool {
        self.cases
            .iter()
            .any(|case| case.case_id == case_id && case.has_recallable_sentence())
    }

    /// Sentences the recall will cover.
    ///
    /// With no selection every eligible sentence is used; with a selection the
    /// eligible and manually reviewed sentences of the selected cases are used.
    pub fn recallable_sentences(&self, selected_cases: Option<&[String]>) -> Vec<&Sentence> {
        self.cases
            .iter()
            .filter(|case| match selected_cases {
                Some(selected) => selected.iter().any(|id| *id == case.case_id),
                None => true,
            })
            .flat_map(|case| case.sentences.iter())
            .filter(|assessed| match selected_cases {
                Some(_) => assessed.eligibility.is_recallable(),
                None => assessed.eligibility == SentenceEligibility::Eligible,
            })
            .map(|assessed| &assessed.sentence)
            .collect()
    }

    pub fn recallable_sentence_ids(&self, selected_cases: Option<&[String]>) -> Vec<String> {
        self.recallable_sentences(selected_cases)
            .into_iter()
            .map(|sentence| sentence.sentence_id.clone())
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(SentenceEligibility) -> bool) -> usize {
        self.cases
            .iter()
            .flat_map(|case| case.sentences.iter())
            .filter(|assessed| predicate(assessed.eligibility))
            .count()
    }
}

pub fn summarise(court_cases: &[CourtCase], revocation_date: NaiveDate) -> EligibilitySummary {
    let cases: Vec<CaseEligibility> = court_cases
        .iter()
        .filter(|case| case.active)
        .map(|case| CaseEligibility {
            case_id: case.case_id.clone(),
            reference: case.reference.clone(),
            court_name: case.court_name.clone(),
            appearance_date: case.appearance_date,
            sentences: case
                .sentences
                .iter()
                .map(|sentence| AssessedSentence {
                    sentence: sentence.clone(),
                    eligibility: assess_sentence(sentence, revocation_date),
                })
                .collect(),
        })
        .collect();

    let assessed = || cases.iter().flat_map(|case| case.sentences.iter());
    let route = if assessed().next().is_none() {
        RecallRoute::NoSentences
    } else if assessed().all(|s| !s.eligibility.is_recallable()) {
        RecallRoute::NotPossible
    } else if assessed().any(|s| matches!(s.eligibility, SentenceEligibility::ManualReview(_))) {
        RecallRoute::Manual
    } else {
        RecallRoute::Automatic
    };

    EligibilitySummary {
        revocation_date,
        cases,
        route,
    }
}

/// Recall types the given sentences permit, in `RecallType::ALL` order.
pub fn allowed_recall_types(sentences: &[&Sentence]) -> Vec<RecallType> {
    let standard_only = sentences.is_empty()
        || sentences.iter().any(|sentence| {
            matches!(
                sentence.classification,
                SentenceClassification::Extended
                    | SentenceClassification::Sopc
                    | SentenceClassification::Botus
            )
        });
    if standard_only {
        return vec![RecallType::Standard];
    }

    let lengths: Vec<Option<bool>> = sentences
        .iter()
        .map(|sentence| match (sentence.term, sentence.sentence_date) {
            (Some(term), Some(start)) => Some(term.is_twelve_months_or_more(start)),
            _ => None,
        })
        .collect();
    let all_under = lengths.iter().all(|length| *length == Some(false));
    let all_over = lengths.iter().all(|length| *length == Some(true));

    RecallType::ALL
        .into_iter()
        .filter(|recall_type| match recall_type.fixed_term_days() {
            None => true,
            Some(14) => !all_over,
            Some(_) => !all_under,
        })
        .collect()
}
