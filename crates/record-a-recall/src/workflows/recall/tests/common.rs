use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;

use crate::workflows::recall::api::{ApiError, RecallApi};
use crate::workflows::recall::domain::{
    Caseworker, CourtCase, Prisoner, PrisonerId, Recall, RecallId, RecallPayload, RecallType,
    Sentence, SentenceClassification, SentenceTerm, SessionId,
};
use crate::workflows::recall::{InMemoryJourneyStore, RecallJourneyService};

pub(super) const PRISONER: &str = "A1234BC";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    date(2024, 6, 15)
}

pub(super) fn prisoner_id() -> PrisonerId {
    PrisonerId(PRISONER.to_string())
}

pub(super) fn session() -> SessionId {
    SessionId("session-1".to_string())
}

pub(super) fn caseworker() -> Caseworker {
    Caseworker {
        username: "CASEWORKER_1".to_string(),
        active_caseload: Some("MDI".to_string()),
    }
}

pub(super) fn prisoner() -> Prisoner {
    Prisoner {
        prisoner_id: prisoner_id(),
        first_name: "Alex".to_string(),
        last_name: "Morgan".to_string(),
        date_of_birth: Some(date(1990, 4, 2)),
        prison_name: Some("Moorland (HMP & YOI)".to_string()),
    }
}

pub(super) fn term(years: u32, months: u32) -> Option<SentenceTerm> {
    Some(SentenceTerm {
        years,
        months,
        ..SentenceTerm::default()
    })
}

pub(super) fn sentence(
    id: &str,
    classification: SentenceClassification,
    sentence_date: Option<NaiveDate>,
    term: Option<SentenceTerm>,
) -> Sentence {
    Sentence {
        sentence_id: id.to_string(),
        offence_code: "TH68010".to_string(),
        offence_description: "Theft from a shop".to_string(),
        sentence_date,
        classification,
        term,
        sentence_type_description: None,
    }
}

pub(super) fn court_case(id: &str, appearance: NaiveDate, sentences: Vec<Sentence>) -> CourtCase {
    CourtCase {
        case_id: id.to_string(),
        reference: Some(format!("T2023{}", id.len())),
        court_name: "Leeds Crown Court".to_string(),
        appearance_date: appearance,
        active: true,
        sentences,
    }
}

/// Two-year standard determinate sentence from January 2023.
pub(super) fn long_case() -> CourtCase {
    court_case(
        "case-long",
        date(2023, 1, 10),
        vec![sentence(
            "s-long",
            SentenceClassification::Standard,
            Some(date(2023, 1, 10)),
            term(2, 0),
        )],
    )
}

/// Six-month standard determinate sentence from May 2023.
pub(super) fn short_case() -> CourtCase {
    court_case(
        "case-short",
        date(2023, 5, 1),
        vec![sentence(
            "s-short",
            SentenceClassification::Standard,
            Some(date(2023, 5, 1)),
            term(0, 6),
        )],
    )
}

/// Sentence whose type the API could not classify.
pub(super) fn unknown_case() -> CourtCase {
    court_case(
        "case-unknown",
        date(2022, 11, 1),
        vec![sentence(
            "s-unknown",
            SentenceClassification::Unknown,
            Some(date(2022, 11, 1)),
            term(1, 0),
        )],
    )
}

pub(super) fn recall(id: &str, revocation: NaiveDate, recall_type: RecallType) -> Recall {
    Recall {
        recall_id: RecallId(id.to_string()),
        prisoner_id: prisoner_id(),
        revocation_date: revocation,
        return_to_custody_date: None,
        recall_type,
        sentence_ids: vec!["s-long".to_string()],
        created_by_username: Some("CASEWORKER_0".to_string()),
        created_at: None,
    }
}

/// In-memory stand-in for the case-management API.
#[derive(Default)]
pub(super) struct MemoryRecallApi {
    prisoners: Mutex<HashMap<String, Prisoner>>,
    court_cases: Mutex<HashMap<String, Vec<CourtCase>>>,
    recalls: Mutex<Vec<Recall>>,
    created: Mutex<Vec<RecallPayload>>,
    updated: Mutex<Vec<(RecallId, RecallPayload)>>,
    unavailable: AtomicBool,
}

impl MemoryRecallApi {
    pub(super) fn with_cases(court_cases: Vec<CourtCase>) -> Self {
        let api = Self::default();
        api.prisoners
            .lock()
            .expect("prisoners mutex poisoned")
            .insert(PRISONER.to_string(), prisoner());
        api.set_court_cases(court_cases);
        api
    }

    pub(super) fn with_recall(self, recall: Recall) -> Self {
        self.recalls
            .lock()
            .expect("recalls mutex poisoned")
            .push(recall);
        self
    }

    pub(super) fn set_court_cases(&self, court_cases: Vec<CourtCase>) {
        self.court_cases
            .lock()
            .expect("court cases mutex poisoned")
            .insert(PRISONER.to_string(), court_cases);
    }

    pub(super) fn add_recall(&self, recall: Recall) {
        self.recalls
            .lock()
            .expect("recalls mutex poisoned")
            .push(recall);
    }

    pub(super) fn go_down(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub(super) fn come_back(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
    }

    pub(super) fn created(&self) -> Vec<RecallPayload> {
        self.created.lock().expect("created mutex poisoned").clone()
    }

    pub(super) fn updated(&self) -> Vec<(RecallId, RecallPayload)> {
        self.updated.lock().expect("updated mutex poisoned").clone()
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecallApi for MemoryRecallApi {
    async fn prisoner(&self, prisoner_id: &PrisonerId) -> Result<Prisoner, ApiError> {
        self.check_available()?;
        self.prisoners
            .lock()
            .expect("prisoners mutex poisoned")
            .get(&prisoner_id.0)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("prisoner".to_string()))
    }

    async fn recalls(&self, prisoner_id: &PrisonerId) -> Result<Vec<Recall>, ApiError> {
        self.check_available()?;
        Ok(self
            .recalls
            .lock()
            .expect("recalls mutex poisoned")
            .iter()
            .filter(|recall| recall.prisoner_id == *prisoner_id)
            .cloned()
            .collect())
    }

    async fn recall(&self, recall_id: &RecallId) -> Result<Recall, ApiError> {
        self.check_available()?;
        self.recalls
            .lock()
            .expect("recalls mutex poisoned")
            .iter()
            .find(|recall| recall.recall_id == *recall_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("recall".to_string()))
    }

    async fn court_cases(&self, prisoner_id: &PrisonerId) -> Result<Vec<CourtCase>, ApiError> {
        self.check_available()?;
        Ok(self
            .court_cases
            .lock()
            .expect("court cases mutex poisoned")
            .get(&prisoner_id.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_recall(&self, payload: &RecallPayload) -> Result<RecallId, ApiError> {
        self.check_available()?;
        let mut recalls = self.recalls.lock().expect("recalls mutex poisoned");
        let recall_id = RecallId(format!("recall-{}", recalls.len() + 1));
        recalls.push(Recall {
            recall_id: recall_id.clone(),
            prisoner_id: payload.prisoner_id.clone(),
            revocation_date: payload.revocation_date,
            return_to_custody_date: payload.return_to_custody_date,
            recall_type: payload.recall_type_code,
            sentence_ids: payload.sentence_ids.clone(),
            created_by_username: Some(payload.created_by_username.clone()),
            created_at: None,
        });
        self.created
            .lock()
            .expect("created mutex poisoned")
            .push(payload.clone());
        Ok(recall_id)
    }

    async fn update_recall(
        &self,
        recall_id: &RecallId,
        payload: &RecallPayload,
    ) -> Result<(), ApiError> {
        self.check_available()?;
        let mut recalls = self.recalls.lock().expect("recalls mutex poisoned");
        let recall = recalls
            .iter_mut()
            .find(|recall| recall.recall_id == *recall_id)
            .ok_or_else(|| ApiError::NotFound("recall".to_string()))?;
        recall.revocation_date = payload.revocation_date;
        recall.return_to_custody_date = payload.return_to_custody_date;
        recall.recall_type = payload.recall_type_code;
        recall.sentence_ids = payload.sentence_ids.clone();
        self.updated
            .lock()
            .expect("updated mutex poisoned")
            .push((recall_id.clone(), payload.clone()));
        Ok(())
    }
}

pub(super) type TestService = RecallJourneyService<InMemoryJourneyStore, MemoryRecallApi>;

pub(super) fn build_service(api: MemoryRecallApi) -> (Arc<TestService>, Arc<MemoryRecallApi>) {
    let api = Arc::new(api);
    let service = RecallJourneyService::new(Arc::new(InMemoryJourneyStore::default()), api.clone())
        .with_today(today());
    (Arc::new(service), api)
}

pub(super) async fn read_body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub(super) fn assert_redirect(response: &Response, location: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(axum::http::header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some(location)
    );
}
