use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use super::api::{ApiError, RecallApi};
use super::dates::DateInput;
use super::domain::{
    Caseworker, JourneyId, Prisoner, PrisonerId, Recall, RecallId, RecallType, SessionId,
};
use super::eligibility::{allowed_recall_types, summarise, EligibilitySummary, RecallRoute};
use super::journey::{JourneyError, JourneyMode, JourneyStep, RecallJourney};
use super::session::{JourneyStore, StoreError};
use super::validation::{
    validate_court_case_selection, validate_journey, validate_recall_type,
    validate_return_to_custody, validate_revocation_date, JourneyContext, JourneyFailure,
    ReturnToCustodyInput, RevocationContext, ValidationErrors,
};

/// Person overview page data.
#[derive(Debug, Clone)]
pub struct PersonOverview {
    pub prisoner: Prisoner,
    pub recalls: Vec<Recall>,
}

/// Service composing the journey store, the case-management API and the step rules.
pub struct RecallJourneyService<S, C> {
    store: Arc<S>,
    api: Arc<C>,
    today: Option<NaiveDate>,
}

impl<S, C> RecallJourneyService<S, C>
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    pub fn new(store: Arc<S>, api: Arc<C>) -> Self {
        Self {
            store,
            api,
            today: None,
        }
    }

    /// Pins the date used for "not in the future" checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub async fn person_overview(
        &self,
        prisoner_id: &PrisonerId,
    ) -> Result<PersonOverview, ServiceError> {
        let (prisoner, mut recalls) = tokio::try_join!(
            self.api.prisoner(prisoner_id),
            self.api.recalls(prisoner_id)
        )?;
        recalls.sort_by(|a, b| b.revocation_date.cmp(&a.revocation_date));
        Ok(PersonOverview { prisoner, recalls })
    }

    pub fn start_create(
        &self,
        session: &SessionId,
        prisoner_id: &PrisonerId,
    ) -> Result<RecallJourney, ServiceError> {
        let journey = self
            .store
            .insert(session, RecallJourney::create(prisoner_id.clone()))?;
        info!(prisoner = %prisoner_id, journey = %journey.id, "started create recall journey");
        Ok(journey)
    }

    pub async fn start_edit(
        &self,
        session: &SessionId,
        prisoner_id: &PrisonerId,
        recall_id: &RecallId,
    ) -> Result<RecallJourney, ServiceError> {
        let recall = match self.api.recall(recall_id).await {
            Ok(recall) => recall,
            Err(ApiError::NotFound(_)) => return Err(ServiceError::RecallNotFound),
            Err(other) => return Err(other.into()),
        };
        if recall.prisoner_id != *prisoner_id {
            return Err(ServiceError::RecallNotFound);
        }

        let court_cases = self.api.court_cases(prisoner_id).await?;
        let summary = summarise(&court_cases, recall.revocation_date);

        let mut journey = RecallJourney::edit(&recall);
        journey.restore_selection(&summary, &recall.sentence_ids);

        let journey = self.store.insert(session, journey)?;
        info!(prisoner = %prisoner_id, recall = %recall_id, journey = %journey.id, "started edit recall journey");
        Ok(journey)
    }

    pub fn journey(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<RecallJourney, ServiceError> {
        self.store
            .fetch(session, journey_id)?
            .ok_or(ServiceError::JourneyNotFound)
    }

    fn open_journey(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<RecallJourney, ServiceError> {
        let journey = self.journey(session, journey_id)?;
        journey.ensure_open()?;
        Ok(journey)
    }

    fn save(&self, session: &SessionId, journey: RecallJourney) -> Result<(), ServiceError> {
        self.store.update(session, journey)?;
        Ok(())
    }

    pub async fn submit_revocation_date(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
        input: &DateInput,
    ) -> Result<JourneyStep, ServiceError> {
        let mut journey = self.open_journey(session, journey_id)?;
        let (court_cases, recalls) = tokio::try_join!(
            self.api.court_cases(&journey.prisoner_id),
            self.api.recalls(&journey.prisoner_id)
        )?;

        let ctx = RevocationContext {
            today: self.today(),
            court_cases: &court_cases,
            existing_recalls: &recalls,
            editing: journey.mode.recall_id(),
        };
        let date = validate_revocation_date(input, &ctx)?;

        journey.set_revocation_date(date);
        let next = journey.next_step(JourneyStep::RevocationDate);
        self.save(session, journey)?;
        Ok(next)
    }

    pub fn submit_return_to_custody(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
        input: &ReturnToCustodyInput,
    ) -> Result<JourneyStep, ServiceError> {
        let mut journey = self.open_journey(session, journey_id)?;
        let revocation_date = journey
            .revocation_date
            .ok_or(ServiceError::Incomplete(JourneyStep::RevocationDate))?;

        let answer = validate_return_to_custody(input, revocation_date, self.today())?;
        journey.set_return_to_custody(answer.in_prison_at_recall, answer.return_to_custody_date);

        let next = journey.next_step(JourneyStep::ReturnToCustody);
        self.save(session, journey)?;
        Ok(next)
    }

    /// Journey plus the eligibility of every sentence against its revocation date.
    pub async fn sentence_summary(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<(RecallJourney, EligibilitySummary), ServiceError> {
        let journey = self.journey(session, journey_id)?;
        let revocation_date = journey
            .revocation_date
            .ok_or(ServiceError::Incomplete(JourneyStep::RevocationDate))?;
        let court_cases = self.api.court_cases(&journey.prisoner_id).await?;
        let summary = summarise(&court_cases, revocation_date);
        Ok((journey, summary))
    }

    pub async fn confirm_sentences(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<JourneyStep, ServiceError> {
        let (mut journey, summary) = self.sentence_summary(session, journey_id).await?;
        journey.ensure_open()?;

        journey.set_route(&summary);
        if !summary.route.can_proceed() {
            info!(prisoner = %journey.prisoner_id, route = ?summary.route, "no recallable sentences");
        }

        let next = journey.next_step(JourneyStep::CheckSentences);
        self.save(session, journey)?;
        Ok(next)
    }

    pub async fn submit_court_cases(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
        case_ids: &[String],
    ) -> Result<JourneyStep, ServiceError> {
        let (mut journey, summary) = self.sentence_summary(session, journey_id).await?;
        journey.ensure_open()?;
        if summary.route != RecallRoute::Manual || journey.route != Some(RecallRoute::Manual) {
            return Err(ServiceError::Incomplete(JourneyStep::CheckSentences));
        }

        let candidates = summary.candidate_cases();
        let selected = validate_court_case_selection(case_ids, &candidates)?;
        let sentence_ids = summary.recallable_sentence_ids(Some(selected.as_slice()));
        journey.set_court_cases(selected, sentence_ids);

        let next = journey.next_step(JourneyStep::SelectCourtCases);
        self.save(session, journey)?;
        Ok(next)
    }

    /// Journey plus the recall types its sentences allow.
    pub async fn recall_type_options(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<(RecallJourney, Vec<RecallType>), ServiceError> {
        let (journey, summary) = self.sentence_summary(session, journey_id).await?;
        let selection = match journey.route {
            Some(RecallRoute::Manual) => Some(journey.selected_case_ids.as_slice()),
            Some(RecallRoute::Automatic) => None,
            _ => return Err(ServiceError::Incomplete(JourneyStep::CheckSentences)),
        };
        let allowed = allowed_recall_types(&summary.recallable_sentences(selection));
        Ok((journey, allowed))
    }

    pub async fn submit_recall_type(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
        code: Option<&str>,
    ) -> Result<JourneyStep, ServiceError> {
        let (mut journey, allowed) = self.recall_type_options(session, journey_id).await?;
        journey.ensure_open()?;

        let recall_type = validate_recall_type(code, &allowed)?;
        journey.set_recall_type(recall_type);

        let next = journey.next_step(JourneyStep::RecallType);
        self.save(session, journey)?;
        Ok(next)
    }

    /// Data for the check-your-answers page.
    ///
    /// Viewing it marks the journey so that later step changes come back here.
    pub async fn review(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
    ) -> Result<(RecallJourney, EligibilitySummary), ServiceError> {
        let (mut journey, summary) = self.sentence_summary(session, journey_id).await?;
        journey.ensure_open()?;
        if let Some(step) = journey.first_incomplete_step() {
            return Err(ServiceError::Incomplete(step));
        }
        if !journey.return_to_check_answers {
            journey.return_to_check_answers = true;
            self.save(session, journey.clone())?;
        }
        Ok((journey, summary))
    }

    /// Re-validates the whole journey and records it with the case-management API.
    ///
    /// The journey is claimed in the store before anything is awaited, so a
    /// second submit racing this one fails with `SubmissionInProgress`.
    pub async fn submit(
        &self,
        session: &SessionId,
        journey_id: &JourneyId,
        caseworker: &Caseworker,
    ) -> Result<RecallId, ServiceError> {
        let mut journey = match self.store.claim_submission(session, journey_id) {
            Ok(journey) => journey,
            Err(StoreError::NotFound) => return Err(ServiceError::JourneyNotFound),
            Err(err) => return Err(err.into()),
        };

        match self.record(&mut journey, caseworker).await {
            Ok(recall_id) => {
                journey.submitted_recall_id = Some(recall_id.clone());
                self.store.finish_submission(session, journey)?;
                Ok(recall_id)
            }
            Err(err) => {
                if let Err(release) = self.store.release_submission(session, journey_id) {
                    warn!(journey = %journey_id, error = %release, "failed to release submission");
                }
                Err(err)
            }
        }
    }

    async fn record(
        &self,
        journey: &mut RecallJourney,
        caseworker: &Caseworker,
    ) -> Result<RecallId, ServiceError> {
        journey.ensure_open()?;
        if let Some(step) = journey.first_incomplete_step() {
            return Err(ServiceError::Incomplete(step));
        }

        let (court_cases, recalls) = tokio::try_join!(
            self.api.court_cases(&journey.prisoner_id),
            self.api.recalls(&journey.prisoner_id)
        )?;
        let ctx = JourneyContext {
            today: self.today(),
            court_cases: &court_cases,
            existing_recalls: &recalls,
        };
        journey.sentence_ids = match validate_journey(journey, &ctx) {
            Ok(sentence_ids) => sentence_ids,
            Err(failure) => {
                warn!(
                    prisoner = %journey.prisoner_id,
                    step = failure.step.slug(),
                    "recall failed final validation"
                );
                return Err(ServiceError::JourneyInvalid(failure));
            }
        };

        let payload = journey.payload(caseworker)?;
        let recall_id = match &journey.mode {
            JourneyMode::Create => self.api.create_recall(&payload).await?,
            JourneyMode::Edit { recall_id } => {
                self.api.update_recall(recall_id, &payload).await?;
                recall_id.clone()
            }
        };

        info!(
            prisoner = %journey.prisoner_id,
            recall = %recall_id,
            recall_type = payload.recall_type_code.code(),
            sentences = payload.sentence_ids.len(),
            edit = journey.mode.is_edit(),
            caseworker = %caseworker.username,
            "recall recorded"
        );
        Ok(recall_id)
    }
}

/// Error raised by the journey service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("journey failed validation at '{}': {}", .0.step.slug(), .0.errors)]
    JourneyInvalid(JourneyFailure),
    #[error("journey not found")]
    JourneyNotFound,
    #[error("recall not found")]
    RecallNotFound,
    #[error("this recall has already been submitted")]
    AlreadySubmitted,
    #[error("journey is incomplete, continue from '{}'", .0.slug())]
    Incomplete(JourneyStep),
    #[error("this recall is already being saved")]
    SubmissionInProgress,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Busy => ServiceError::SubmissionInProgress,
            other => ServiceError::Store(other),
        }
    }
}

impl From<JourneyError> for ServiceError {
    fn from(value: JourneyError) -> Self {
        match value {
            JourneyError::AlreadySubmitted => ServiceError::AlreadySubmitted,
            JourneyError::Incomplete(step) => ServiceError::Incomplete(step),
        }
    }
}
