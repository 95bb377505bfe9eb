//! Recording and editing a recall: the step-by-step journey a caseworker
//! follows, the rules each step enforces, and the sentence eligibility
//! checks that decide which court cases a recall can cover.

pub mod api;
pub mod dates;
pub mod domain;
pub mod eligibility;
pub mod journey;
pub mod router;
pub mod service;
pub mod session;
pub mod validation;
pub mod views;

#[cfg(test)]
mod tests;

pub use api::{ApiError, HttpRecallApi, RecallApi};
pub use dates::{long_date, DateField, DateInput};
pub use domain::{
    Caseworker, CourtCase, FixedTermWindow, JourneyId, Prisoner, PrisonerId, Recall, RecallId,
    RecallPayload, RecallType, Sentence, SentenceClassification, SentenceTerm, SessionId,
};
pub use eligibility::{
    allowed_recall_types, assess_sentence, summarise, AssessedSentence, CaseEligibility,
    EligibilityReason, EligibilitySummary, RecallRoute, SentenceEligibility,
};
pub use journey::{JourneyError, JourneyMode, JourneyStep, RecallJourney};
pub use router::{journey_router, CurrentCaseworker, CASELOAD_HEADER, USER_HEADER};
pub use service::{PersonOverview, RecallJourneyService, ServiceError};
pub use session::{InMemoryJourneyStore, JourneyStore, StoreError, SESSION_COOKIE};
pub use validation::{FieldError, ValidationErrors};
pub use views::Views;
