use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use record_a_recall::workflows::recall::{
    ApiError, CourtCase, Prisoner, PrisonerId, Recall, RecallApi, RecallId, RecallPayload,
    RecallType, Sentence, SentenceClassification, SentenceTerm,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory case-management API for local runs without the downstream service.
pub(crate) struct StubRecallApi {
    prisoners: Vec<Prisoner>,
    court_cases: Vec<(PrisonerId, CourtCase)>,
    recalls: Mutex<Vec<Recall>>,
}

impl StubRecallApi {
    pub(crate) fn seeded() -> Self {
        let prisoner_id = PrisonerId("A1234BC".to_string());
        let prisoner = Prisoner {
            prisoner_id: prisoner_id.clone(),
            first_name: "Jordan".to_string(),
            last_name: "Ellis".to_string(),
            date_of_birth: stub_date(1988, 11, 23),
            prison_name: Some("Leeds (HMP)".to_string()),
        };

        let burglary = CourtCase {
            case_id: "stub-case-1".to_string(),
            reference: Some("T20227741".to_string()),
            court_name: "Leeds Crown Court".to_string(),
            appearance_date: stub_date(2022, 6, 14).unwrap_or_default(),
            active: true,
            sentences: vec![stub_sentence(
                "stub-sentence-1",
                "Burglary dwelling",
                stub_date(2022, 6, 14),
                SentenceClassification::Standard,
                SentenceTerm {
                    years: 2,
                    ..SentenceTerm::default()
                },
            )],
        };
        let theft = CourtCase {
            case_id: "stub-case-2".to_string(),
            reference: Some("B23LE0192".to_string()),
            court_name: "Leeds Magistrates Court".to_string(),
            appearance_date: stub_date(2023, 2, 3).unwrap_or_default(),
            active: true,
            sentences: vec![stub_sentence(
                "stub-sentence-2",
                "Theft from a shop",
                stub_date(2023, 2, 3),
                SentenceClassification::Standard,
                SentenceTerm {
                    months: 4,
                    ..SentenceTerm::default()
                },
            )],
        };

        Self {
            prisoners: vec![prisoner],
            court_cases: vec![(prisoner_id.clone(), burglary), (prisoner_id, theft)],
            recalls: Mutex::new(Vec::new()),
        }
    }

    fn recalls_guard(&self) -> Result<MutexGuard<'_, Vec<Recall>>, ApiError> {
        self.recalls
            .lock()
            .map_err(|_| ApiError::Unavailable("stub recall store poisoned".to_string()))
    }

    fn known(&self, prisoner_id: &PrisonerId) -> Result<(), ApiError> {
        if self
            .prisoners
            .iter()
            .any(|prisoner| prisoner.prisoner_id == *prisoner_id)
        {
            Ok(())
        } else {
            Err(ApiError::NotFound("prisoner".to_string()))
        }
    }
}

fn stub_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn stub_sentence(
    id: &str,
    offence: &str,
    sentence_date: Option<NaiveDate>,
    classification: SentenceClassification,
    term: SentenceTerm,
) -> Sentence {
    Sentence {
        sentence_id: id.to_string(),
        offence_code: String::new(),
        offence_description: offence.to_string(),
        sentence_date,
        classification,
        term: Some(term),
        sentence_type_description: Some("SDS (Standard Determinate Sentence)".to_string()),
    }
}

fn recall_from(recall_id: RecallId, payload: &RecallPayload) -> Recall {
    Recall {
        recall_id,
        prisoner_id: payload.prisoner_id.clone(),
        revocation_date: payload.revocation_date,
        return_to_custody_date: payload.return_to_custody_date,
        recall_type: payload.recall_type_code,
        sentence_ids: payload.sentence_ids.clone(),
        created_by_username: Some(payload.created_by_username.clone()),
        created_at: Some(Utc::now()),
    }
}

#[async_trait]
impl RecallApi for StubRecallApi {
    async fn prisoner(&self, prisoner_id: &PrisonerId) -> Result<Prisoner, ApiError> {
        self.prisoners
            .iter()
            .find(|prisoner| prisoner.prisoner_id == *prisoner_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("prisoner".to_string()))
    }

    async fn recalls(&self, prisoner_id: &PrisonerId) -> Result<Vec<Recall>, ApiError> {
        self.known(prisoner_id)?;
        Ok(self
            .recalls_guard()?
            .iter()
            .filter(|recall| recall.prisoner_id == *prisoner_id)
            .cloned()
            .collect())
    }

    async fn recall(&self, recall_id: &RecallId) -> Result<Recall, ApiError> {
        self.recalls_guard()?
            .iter()
            .find(|recall| recall.recall_id == *recall_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("recall".to_string()))
    }

    async fn court_cases(&self, prisoner_id: &PrisonerId) -> Result<Vec<CourtCase>, ApiError> {
        self.known(prisoner_id)?;
        Ok(self
            .court_cases
            .iter()
            .filter(|(owner, _)| owner == prisoner_id)
            .map(|(_, case)| case.clone())
            .collect())
    }

    async fn create_recall(&self, payload: &RecallPayload) -> Result<RecallId, ApiError> {
        self.known(&payload.prisoner_id)?;
        let mut recalls = self.recalls_guard()?;
        let recall_id = RecallId(format!("stub-recall-{}", recalls.len() + 1));
        recalls.push(recall_from(recall_id.clone(), payload));
        info!(recall = %recall_id, "stub recall created");
        Ok(recall_id)
    }

    async fn update_recall(
        &self,
        recall_id: &RecallId,
        payload: &RecallPayload,
    ) -> Result<(), ApiError> {
        let mut recalls = self.recalls_guard()?;
        let existing = recalls
            .iter_mut()
            .find(|recall| recall.recall_id == *recall_id)
            .ok_or_else(|| ApiError::NotFound("recall".to_string()))?;
        *existing = recall_from(recall_id.clone(), payload);
        info!(recall = %recall_id, "stub recall updated");
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Labels and API codes, comma separated.
pub(crate) fn describe_types(types: &[RecallType]) -> String {
    types
        .iter()
        .map(|recall_type| format!("{} ({})", recall_type.label(), recall_type.code()))
        .collect::<Vec<_>>()
        .join(", ")
}
