use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Caseworker, JourneyId, PrisonerId, Recall, RecallId, RecallPayload, RecallType,
};
use super::eligibility::{EligibilitySummary, RecallRoute};

/// Whether the journey records a new recall or amends an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JourneyMode {
    Create,
    Edit { recall_id: RecallId },
}

impl JourneyMode {
    pub fn recall_id(&self) -> Option<&RecallId> {
        match self {
            JourneyMode::Create => None,
            JourneyMode::Edit { recall_id } => Some(recall_id),
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, JourneyMode::Edit { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStep {
    RevocationDate,
    ReturnToCustody,
    CheckSentences,
    SelectCourtCases,
    RecallType,
    CheckYourAnswers,
    Confirmation,
    NotPossible,
}

impl JourneyStep {
    pub const ALL: [JourneyStep; 8] = [
        JourneyStep::RevocationDate,
        JourneyStep::ReturnToCustody,
        JourneyStep::CheckSentences,
        JourneyStep::SelectCourtCases,
        JourneyStep::RecallType,
        JourneyStep::CheckYourAnswers,
        JourneyStep::Confirmation,
        JourneyStep::NotPossible,
    ];

    pub const fn slug(self) -> &'static str {
        match self {
            JourneyStep::RevocationDate => "revocation-date",
            JourneyStep::ReturnToCustody => "return-to-custody",
            JourneyStep::CheckSentences => "check-sentences",
            JourneyStep::SelectCourtCases => "select-court-cases",
            JourneyStep::RecallType => "recall-type",
            JourneyStep::CheckYourAnswers => "check-your-answers",
            JourneyStep::Confirmation => "confirmation",
            JourneyStep::NotPossible => "not-possible",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.slug() == slug)
    }

    pub const fn title(self) -> &'static str {
        match self {
            JourneyStep::RevocationDate => "Enter the date of revocation",
            JourneyStep::ReturnToCustody => "Was this person in prison when the recall was made?",
            JourneyStep::CheckSentences => "Check the sentences for this recall",
            JourneyStep::SelectCourtCases => "Select the court cases relevant to this recall",
            JourneyStep::RecallType => "Select the type of recall",
            JourneyStep::CheckYourAnswers => "Check your answers",
            JourneyStep::Confirmation => "Recall recorded",
            JourneyStep::NotPossible => "This recall cannot be recorded",
        }
    }

    /// Position in the wizard; `NotPossible` sits level with the sentence check it replaces.
    const fn position(self) -> u8 {
        match self {
            JourneyStep::RevocationDate => 0,
            JourneyStep::ReturnToCustody => 1,
            JourneyStep::CheckSentences => 2,
            JourneyStep::NotPossible => 3,
            JourneyStep::SelectCourtCases => 3,
            JourneyStep::RecallType => 4,
            JourneyStep::CheckYourAnswers => 5,
            JourneyStep::Confirmation => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JourneyError {
    #[error("this recall has already been submitted")]
    AlreadySubmitted,
    #[error("journey is incomplete, continue from '{}'", .0.slug())]
    Incomplete(JourneyStep),
}

/// Session-held answers for one recall being created or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallJourney {
    pub id: JourneyId,
    pub prisoner_id: PrisonerId,
    pub mode: JourneyMode,
    pub revocation_date: Option<NaiveDate>,
    pub in_prison_at_recall: Option<bool>,
    pub return_to_custody_date: Option<NaiveDate>,
    pub route: Option<RecallRoute>,
    pub selected_case_ids: Vec<String>,
    pub sentence_ids: Vec<String>,
    pub recall_type: Option<RecallType>,
    pub submitted_recall_id: Option<RecallId>,
    pub return_to_check_answers: bool,
    pub created_at: DateTime<Utc>,
}

impl RecallJourney {
    pub fn create(prisoner_id: PrisonerId) -> Self {
        Self {
            id: JourneyId::new(),
            prisoner_id,
            mode: JourneyMode::Create,
            revocation_date: None,
            in_prison_at_recall: None,
            return_to_custody_date: None,
            route: None,
            selected_case_ids: Vec::new(),
            sentence_ids: Vec::new(),
            recall_type: None,
            submitted_recall_id: None,
            return_to_check_answers: false,
            created_at: Utc::now(),
        }
    }

    /// Starts an edit journey pre-populated from a recorded recall.
    pub fn edit(recall: &Recall) -> Self {
        let mut journey = Self::create(recall.prisoner_id.clone());
        journey.mode = JourneyMode::Edit {
            recall_id: recall.recall_id.clone(),
        };
        journey.revocation_date = Some(recall.revocation_date);
        journey.in_prison_at_recall = Some(recall.return_to_custody_date.is_none());
        journey.return_to_custody_date = recall.return_to_custody_date;
        journey.recall_type = Some(recall.recall_type);
        journey.return_to_check_answers = true;
        journey
    }

    pub fn ensure_open(&self) -> Result<(), JourneyError> {
        if self.submitted_recall_id.is_some() {
            return Err(JourneyError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Records the revocation date; a different date invalidates everything derived from it.
    pub fn set_revocation_date(&mut self, date: NaiveDate) {
        if self.revocation_date != Some(date) {
            self.route = None;
            self.selected_case_ids.clear();
            self.sentence_ids.clear();
            self.recall_type = None;
            if let Some(arrest) = self.return_to_custody_date {
                if arrest < date {
                    self.return_to_custody_date = None;
                    self.in_prison_at_recall = None;
                }
            }
        }
        self.revocation_date = Some(date);
    }

    pub fn set_return_to_custody(&mut self, in_prison: bool, arrest_date: Option<NaiveDate>) {
        self.in_prison_at_recall = Some(in_prison);
        self.return_to_custody_date = if in_prison { None } else { arrest_date };
    }

    /// Stores the outcome of the sentence check.
    ///
    /// A manual selection survives only while the route stays manual and the
    /// selected cases are still candidates.
    pub fn set_route(&mut self, summary: &EligibilitySummary) {
        let route = summary.route;
        match route {
            RecallRoute::Automatic => {
                self.selected_case_ids.clear();
                self.sentence_ids = summary.recallable_sentence_ids(None);
            }
            RecallRoute::Manual => {
                self.selected_case_ids
                    .retain(|case_id| summary.is_candidate(case_id));
                self.sentence_ids = if self.selected_case_ids.is_empty() {
                    Vec::new()
                } else {
                    summary.recallable_sentence_ids(Some(self.selected_case_ids.as_slice()))
                };
            }
            RecallRoute::NotPossible | RecallRoute::NoSentences => {
                self.selected_case_ids.clear();
                self.sentence_ids.clear();
                self.recall_type = None;
            }
        }
        self.route = Some(route);
    }

    /// Re-derives the manual selection for an edit journey from the recall's sentences.
    pub fn restore_selection(&mut self, summary: &EligibilitySummary, recalled: &[String]) {
        if summary.route == RecallRoute::Manual {
            self.selected_case_ids = summary
                .candidate_cases()
                .into_iter()
                .filter(|case| {
                    case.sentences
                        .iter()
                        .any(|assessed| recalled.contains(&assessed.sentence.sentence_id))
                })
                .map(|case| case.case_id.clone())
                .collect();
        }
        self.set_route(summary);
    }

    pub fn set_court_cases(&mut self, case_ids: Vec<String>, sentence_ids: Vec<String>) {
        self.selected_case_ids = case_ids;
        self.sentence_ids = sentence_ids;
    }

    pub fn set_recall_type(&mut self, recall_type: RecallType) {
        self.recall_type = Some(recall_type);
    }

    /// Earliest step still missing an answer, or `None` when ready to submit.
    pub fn first_incomplete_step(&self) -> Option<JourneyStep> {
        if self.revocation_date.is_none() {
            return Some(JourneyStep::RevocationDate);
        }
        match self.in_prison_at_recall {
            None => return Some(JourneyStep::ReturnToCustody),
            Some(false) if self.return_to_custody_date.is_none() => {
                return Some(JourneyStep::ReturnToCustody)
            }
            _ => {}
        }
        match self.route {
            None => return Some(JourneyStep::CheckSentences),
            Some(RecallRoute::NotPossible) | Some(RecallRoute::NoSentences) => {
                return Some(JourneyStep::NotPossible)
            }
            Some(RecallRoute::Manual) if self.selected_case_ids.is_empty() => {
                return Some(JourneyStep::SelectCourtCases)
            }
            _ => {}
        }
        if self.sentence_ids.is_empty() {
            return Some(JourneyStep::CheckSentences);
        }
        if self.recall_type.is_none() {
            return Some(JourneyStep::RecallType);
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.first_incomplete_step().is_none()
    }

    /// Step to show when `requested` is asked for; a later step than the data
    /// supports sends the caseworker back to the first gap.
    pub fn resolve_step(&self, requested: JourneyStep) -> JourneyStep {
        if self.submitted_recall_id.is_some() {
            return JourneyStep::Confirmation;
        }

        let frontier = self
            .first_incomplete_step()
            .unwrap_or(JourneyStep::CheckYourAnswers);

        match requested {
            JourneyStep::Confirmation => frontier,
            JourneyStep::NotPossible => {
                if frontier == JourneyStep::NotPossible {
                    JourneyStep::NotPossible
                } else {
                    frontier
                }
            }
            JourneyStep::SelectCourtCases if self.route != Some(RecallRoute::Manual) => {
                if frontier.position() <= JourneyStep::CheckSentences.position() {
                    frontier
                } else {
                    JourneyStep::CheckSentences
                }
            }
            _ if frontier == JourneyStep::NotPossible
                && requested.position() > JourneyStep::CheckSentences.position() =>
            {
                JourneyStep::NotPossible
            }
            _ if requested.position() <= frontier.position() => requested,
            _ => frontier,
        }
    }

    /// Where a successful submission of `current` leads.
    pub fn next_step(&self, current: JourneyStep) -> JourneyStep {
        if self.return_to_check_answers
            && self.is_complete()
            && !matches!(
                current,
                JourneyStep::CheckYourAnswers | JourneyStep::Confirmation
            )
        {
            return JourneyStep::CheckYourAnswers;
        }

        match current {
            JourneyStep::RevocationDate => JourneyStep::ReturnToCustody,
            JourneyStep::ReturnToCustody => JourneyStep::CheckSentences,
            JourneyStep::CheckSentences => match self.route {
                Some(RecallRoute::Automatic) => JourneyStep::RecallType,
                Some(RecallRoute::Manual) => JourneyStep::SelectCourtCases,
                Some(RecallRoute::NotPossible) | Some(RecallRoute::NoSentences) => {
                    JourneyStep::NotPossible
                }
                None => JourneyStep::CheckSentences,
            },
            JourneyStep::SelectCourtCases => JourneyStep::RecallType,
            JourneyStep::RecallType => JourneyStep::CheckYourAnswers,
            JourneyStep::CheckYourAnswers | JourneyStep::Confirmation => JourneyStep::Confirmation,
            JourneyStep::NotPossible => JourneyStep::NotPossible,
        }
    }

    /// Back-link target; `None` means the person overview page.
    pub fn previous_step(&self, current: JourneyStep) -> Option<JourneyStep> {
        match current {
            JourneyStep::RevocationDate => None,
            JourneyStep::ReturnToCustody => Some(JourneyStep::RevocationDate),
            JourneyStep::CheckSentences => Some(JourneyStep::ReturnToCustody),
            JourneyStep::SelectCourtCases | JourneyStep::NotPossible => {
                Some(JourneyStep::CheckSentences)
            }
            JourneyStep::RecallType => {
                if self.route == Some(RecallRoute::Manual) {
                    Some(JourneyStep::SelectCourtCases)
                } else {
                    Some(JourneyStep::CheckSentences)
                }
            }
            JourneyStep::CheckYourAnswers => Some(JourneyStep::RecallType),
            JourneyStep::Confirmation => None,
        }
    }

    pub fn payload(&self, caseworker: &Caseworker) -> Result<RecallPayload, JourneyError> {
        if let Some(step) = self.first_incomplete_step() {
            return Err(JourneyError::Incomplete(step));
        }
        let (Some(revocation_date), Some(recall_type)) = (self.revocation_date, self.recall_type)
        else {
            return Err(JourneyError::Incomplete(JourneyStep::RevocationDate));
        };

        Ok(RecallPayload {
            prisoner_id: self.prisoner_id.clone(),
            revocation_date,
            return_to_custody_date: self.return_to_custody_date,
            recall_type_code: recall_type,
            sentence_ids: self.sentence_ids.clone(),
            created_by_username: caseworker.username.clone(),
            created_by_prison: caseworker.active_caseload.clone(),
        })
    }
}
