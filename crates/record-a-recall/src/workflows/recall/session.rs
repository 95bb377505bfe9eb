use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

use super::domain::{JourneyId, SessionId};
use super::journey::RecallJourney;

pub const SESSION_COOKIE: &str = "recall_session";

/// Storage abstraction for in-progress journeys, scoped by browser session.
pub trait JourneyStore: Send + Sync {
    fn insert(&self, session: &SessionId, journey: RecallJourney)
        -> Result<RecallJourney, StoreError>;
    fn fetch(&self, session: &SessionId, id: &JourneyId)
        -> Result<Option<RecallJourney>, StoreError>;
    /// Replaces the stored journey; fails with `Busy` while a submission holds it.
    fn update(&self, session: &SessionId, journey: RecallJourney) -> Result<(), StoreError>;
    fn remove(&self, session: &SessionId, id: &JourneyId) -> Result<(), StoreError>;

    /// Marks the journey as being submitted and returns it. Only one caller
    /// holds the mark at a time; others get `Busy` until it is finished or released.
    fn claim_submission(&self, session: &SessionId, id: &JourneyId)
        -> Result<RecallJourney, StoreError>;
    /// Stores the submitted journey and drops the mark.
    fn finish_submission(&self, session: &SessionId, journey: RecallJourney)
        -> Result<(), StoreError>;
    /// Drops the mark without changing the journey.
    fn release_submission(&self, session: &SessionId, id: &JourneyId) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("journey already exists")]
    Conflict,
    #[error("journey not found")]
    NotFound,
    #[error("journey is being submitted")]
    Busy,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

struct StoredJourney {
    journey: RecallJourney,
    touched: Instant,
    submitting: bool,
}

/// Process-local journey store; entries expire after `ttl` without access.
pub struct InMemoryJourneyStore {
    entries: Mutex<HashMap<(SessionId, JourneyId), StoredJourney>>,
    ttl: Duration,
}

impl InMemoryJourneyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn with_ttl_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(SessionId, JourneyId), StoredJourney>>, StoreError>
    {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("session store lock poisoned".to_string()))?;
        let ttl = self.ttl;
        guard.retain(|_, stored| stored.touched.elapsed() < ttl);
        Ok(guard)
    }
}

impl Default for InMemoryJourneyStore {
    fn default() -> Self {
        Self::with_ttl_minutes(120)
    }
}

impl JourneyStore for InMemoryJourneyStore {
    fn insert(
        &self,
        session: &SessionId,
        journey: RecallJourney,
    ) -> Result<RecallJourney, StoreError> {
        let mut guard = self.lock()?;
        let key = (session.clone(), journey.id);
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(
            key,
            StoredJourney {
                journey: journey.clone(),
                touched: Instant::now(),
                submitting: false,
            },
        );
        Ok(journey)
    }

    fn fetch(
        &self,
        session: &SessionId,
        id: &JourneyId,
    ) -> Result<Option<RecallJourney>, StoreError> {
        let mut guard = self.lock()?;
        Ok(guard.get_mut(&(session.clone(), *id)).map(|stored| {
            stored.touched = Instant::now();
            stored.journey.clone()
        }))
    }

    fn update(&self, session: &SessionId, journey: RecallJourney) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        match guard.get_mut(&(session.clone(), journey.id)) {
            Some(stored) if stored.submitting => Err(StoreError::Busy),
            Some(stored) => {
                stored.journey = journey;
                stored.touched = Instant::now();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn remove(&self, session: &SessionId, id: &JourneyId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.remove(&(session.clone(), *id));
        Ok(())
    }

    fn claim_submission(
        &self,
        session: &SessionId,
        id: &JourneyId,
    ) -> Result<RecallJourney, StoreError> {
        let mut guard = self.lock()?;
        let stored = guard
            .get_mut(&(session.clone(), *id))
            .ok_or(StoreError::NotFound)?;
        if stored.submitting {
            return Err(StoreError::Busy);
        }
        stored.submitting = true;
        stored.touched = Instant::now();
        Ok(stored.journey.clone())
    }

    fn finish_submission(
        &self,
        session: &SessionId,
        journey: RecallJourney,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let stored = guard
            .get_mut(&(session.clone(), journey.id))
            .ok_or(StoreError::NotFound)?;
        stored.journey = journey;
        stored.touched = Instant::now();
        stored.submitting = false;
        Ok(())
    }

    fn release_submission(&self, session: &SessionId, id: &JourneyId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if let Some(stored) = guard.get_mut(&(session.clone(), *id)) {
            stored.submitting = false;
        }
        Ok(())
    }
}

/// Reads the session id from the request's `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| SessionId(value.trim().to_string()))
}

pub fn session_cookie(session: &SessionId) -> String {
    format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::recall::domain::PrisonerId;
    use axum::http::HeaderValue;

    fn journey() -> RecallJourney {
        RecallJourney::create(PrisonerId("A1234BC".to_string()))
    }

    #[test]
    fn journeys_are_scoped_to_their_session() {
        let store = InMemoryJourneyStore::default();
        let owner = SessionId("owner".to_string());
        let other = SessionId("other".to_string());
        let journey = store.insert(&owner, journey()).expect("insert succeeds");

        assert!(store
            .fetch(&owner, &journey.id)
            .expect("fetch succeeds")
            .is_some());
        assert!(store
            .fetch(&other, &journey.id)
            .expect("fetch succeeds")
            .is_none());
        assert!(matches!(
            store.update(&other, journey.clone()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let store = InMemoryJourneyStore::default();
        let session = SessionId("s".to_string());
        let journey = store.insert(&session, journey()).expect("insert succeeds");
        assert!(matches!(
            store.insert(&session, journey),
            Err(StoreError::Conflict)
        ));
    }

    #[test]
    fn expired_journeys_are_evicted() {
        let store = InMemoryJourneyStore::new(Duration::ZERO);
        let session = SessionId("s".to_string());
        let journey = store.insert(&session, journey()).expect("insert succeeds");

        assert!(store
            .fetch(&session, &journey.id)
            .expect("fetch succeeds")
            .is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_drops_the_journey() {
        let store = InMemoryJourneyStore::default();
        let session = SessionId("s".to_string());
        let journey = store.insert(&session, journey()).expect("insert succeeds");
        store.remove(&session, &journey.id).expect("remove succeeds");
        assert!(store
            .fetch(&session, &journey.id)
            .expect("fetch succeeds")
            .is_none());
    }

    #[test]
    fn submission_claim_is_exclusive_until_released() {
        let store = InMemoryJourneyStore::default();
        let session = SessionId("s".to_string());
        let journey = store.insert(&session, journey()).expect("insert succeeds");

        store
            .claim_submission(&session, &journey.id)
            .expect("first claim succeeds");
        assert!(matches!(
            store.claim_submission(&session, &journey.id),
            Err(StoreError::Busy)
        ));
        assert!(matches!(
            store.update(&session, journey.clone()),
            Err(StoreError::Busy)
        ));

        store
            .release_submission(&session, &journey.id)
            .expect("release succeeds");
        store
            .claim_submission(&session, &journey.id)
            .expect("claim after release succeeds");
        store
            .finish_submission(&session, journey.clone())
            .expect("finish succeeds");
        store
            .update(&session, journey)
            .expect("update allowed once finished");
    }

    #[test]
    fn reads_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; recall_session=abc-123"),
        );
        assert_eq!(
            session_from_headers(&headers),
            Some(SessionId("abc-123".to_string()))
        );

        let empty = HeaderMap::new();
        assert!(session_from_headers(&empty).is_none());
        assert_eq!(
            session_cookie(&SessionId("abc".to_string())),
            "recall_session=abc; Path=/; HttpOnly; SameSite=Lax"
        );
    }
}
