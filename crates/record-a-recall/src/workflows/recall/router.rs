use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::api::{ApiError, RecallApi};
use crate::error::AppError;
use super::dates::{DateField, DateInput};
use super::domain::{Caseworker, JourneyId, PrisonerId, RecallId, RecallType, SessionId};
use super::journey::{JourneyStep, RecallJourney};
use super::service::{RecallJourneyService, ServiceError};
use super::session::{session_cookie, session_from_headers, JourneyStore};
use super::validation::{ReturnToCustodyInput, ValidationErrors};
use super::views::{
    create_url, edit_url, person_url, step_url, template_for, CheckAnswersView, ConfirmationView,
    CourtCasesView, DateStepView, ErrorView, NotPossibleView, Page, PersonView, RecallRow,
    RecallTypeView, ReturnToCustodyView, SentencesView, Views,
};

pub const USER_HEADER: &str = "x-user-name";
pub const CASELOAD_HEADER: &str = "x-active-caseload";

/// Shared handler state: the journey service plus the compiled templates.
pub struct JourneyState<S, C> {
    service: Arc<RecallJourneyService<S, C>>,
    views: Arc<Views>,
}

impl<S, C> JourneyState<S, C> {
    pub fn new(service: Arc<RecallJourneyService<S, C>>, views: Arc<Views>) -> Self {
        Self { service, views }
    }
}

impl<S, C> Clone for JourneyState<S, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            views: Arc::clone(&self.views),
        }
    }
}

/// Router builder exposing the person page and every step of the recall journey.
pub fn journey_router<S, C>(service: Arc<RecallJourneyService<S, C>>, views: Arc<Views>) -> Router
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    Router::new()
        .route("/person/:prisoner_id", get(person_handler::<S, C>))
        .route(
            "/person/:prisoner_id/create-recall",
            get(start_create_handler::<S, C>),
        )
        .route(
            "/person/:prisoner_id/edit-recall/:recall_id",
            get(start_edit_handler::<S, C>),
        )
        .route(
            "/person/:prisoner_id/recall/:journey_id/:step",
            get(show_step_handler::<S, C>).post(submit_step_handler::<S, C>),
        )
        .with_state(JourneyState::new(service, views))
}

/// Caseworker identity forwarded by the authenticating proxy in front of the service.
#[derive(Debug, Clone)]
pub struct CurrentCaseworker(pub Caseworker);

#[async_trait]
impl<T> FromRequestParts<T> for CurrentCaseworker
where
    T: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &T) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let username = header(USER_HEADER)
            .ok_or((StatusCode::UNAUTHORIZED, "caseworker identity missing"))?;
        Ok(Self(Caseworker {
            username,
            active_caseload: header(CASELOAD_HEADER),
        }))
    }
}

/// Where a step request points: the owning session, person and journey.
#[derive(Debug, Clone)]
struct StepLocation {
    session: SessionId,
    prisoner_id: PrisonerId,
    journey_id: JourneyId,
}

impl StepLocation {
    fn url(&self, step: JourneyStep) -> String {
        step_url(&self.prisoner_id, &self.journey_id, step)
    }
}

fn locate(
    headers: &HeaderMap,
    prisoner_id: &str,
    journey_id: &str,
    slug: &str,
) -> Option<(StepLocation, JourneyStep)> {
    let step = JourneyStep::from_slug(slug)?;
    let location = StepLocation {
        session: session_from_headers(headers)?,
        prisoner_id: PrisonerId::parse(prisoner_id)?,
        journey_id: JourneyId::parse(journey_id)?,
    };
    Some((location, step))
}

/// Form values echoed back when a submission fails validation.
#[derive(Debug)]
enum Submitted {
    Date(DateInput),
    ReturnToCustody(ReturnToCustodyInput),
    CourtCases(Vec<String>),
    RecallType(Option<String>),
}

impl<S, C> JourneyState<S, C> {
    pub(crate) fn html<T: Serialize>(&self, status: StatusCode, template: &str, page: &T) -> Response {
        match self.views.render(template, page) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(err) => {
                error!(template, error = %err, "failed to render page");
                AppError::from(err).into_response()
            }
        }
    }

    fn error_page(&self, status: StatusCode, title: &str, message: String) -> Response {
        let page = Page::new(
            title,
            "Record a recall",
            &[],
            ErrorView {
                status: status.as_u16(),
                message,
            },
        );
        self.html(status, "error.html", &page)
    }

    fn not_found(&self) -> Response {
        self.error_page(
            StatusCode::NOT_FOUND,
            "Page not found",
            "The page or recall journey could not be found. Start again from the person's recalls."
                .to_string(),
        )
    }

    fn failure(&self, err: ServiceError, location: Option<&StepLocation>) -> Response {
        match (err, location) {
            (
                ServiceError::JourneyNotFound
                | ServiceError::RecallNotFound
                | ServiceError::Api(ApiError::NotFound(_)),
                _,
            ) => self.not_found(),
            (ServiceError::AlreadySubmitted, Some(location)) => {
                see_other(&location.url(JourneyStep::Confirmation))
            }
            (ServiceError::Incomplete(step), Some(location)) => {
                see_other(&location.url(step))
            }
            (ServiceError::SubmissionInProgress, _) => self.error_page(
                StatusCode::CONFLICT,
                "Your recall is already being saved",
                "Wait a moment, then check the person's recalls before trying again.".to_string(),
            ),
            (err @ ServiceError::Api(_), _) => {
                error!(error = %err, "case-management API call failed");
                self.error_page(
                    StatusCode::BAD_GATEWAY,
                    "Sorry, there is a problem with the service",
                    "Recall information could not be loaded or saved. Try again later.".to_string(),
                )
            }
            (err @ ServiceError::Store(_), _) => {
                error!(error = %err, "journey store failed");
                self.error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sorry, there is a problem with the service",
                    "Your answers could not be saved. Try again later.".to_string(),
                )
            }
            (err, _) => {
                warn!(error = %err, "journey request rejected");
                self.error_page(StatusCode::BAD_REQUEST, "There is a problem", err.to_string())
            }
        }
    }
}

fn caption(journey: &RecallJourney) -> &'static str {
    if journey.mode.is_edit() {
        "Edit a recall"
    } else {
        "Record a recall"
    }
}

fn back_link(location: &StepLocation, journey: &RecallJourney, step: JourneyStep) -> Option<String> {
    if step == JourneyStep::Confirmation {
        return None;
    }
    if journey.return_to_check_answers
        && journey.is_complete()
        && step != JourneyStep::CheckYourAnswers
    {
        return Some(location.url(JourneyStep::CheckYourAnswers));
    }
    Some(
        journey
            .previous_step(step)
            .map(|previous| location.url(previous))
            .unwrap_or_else(|| person_url(&location.prisoner_id)),
    )
}

fn form_value<'a>(form: &'a [(String, String)], name: &str) -> Option<&'a str> {
    form.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn form_values(form: &[(String, String)], name: &str) -> Vec<String> {
    form.iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
        .collect()
}

fn date_field(form: &[(String, String)], name: &str) -> DateInput {
    let part = |suffix: &str| {
        form_value(form, &format!("{name}-{suffix}"))
            .unwrap_or_default()
            .to_string()
    };
    DateInput::new(part("day"), part("month"), part("year"))
}

/// 303 to `location`, refusing values that cannot travel in a header.
fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            error!(location, "refusing to redirect to an invalid location");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn started(session: &SessionId, fresh: bool, location: &str) -> Response {
    let mut response = see_other(location);
    if fresh {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(session)) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

fn session_or_new(headers: &HeaderMap) -> (SessionId, bool) {
    match session_from_headers(headers) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    }
}

pub(crate) async fn person_handler<S, C>(
    State(state): State<JourneyState<S, C>>,
    CurrentCaseworker(_): CurrentCaseworker,
    Path(prisoner_id): Path<String>,
) -> Response
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let Some(prisoner_id) = PrisonerId::parse(&prisoner_id) else {
        return state.not_found();
    };
    let overview = match state.service.person_overview(&prisoner_id).await {
        Ok(overview) => overview,
        Err(err) => return state.failure(err, None),
    };

    let name = overview.prisoner.full_name();
    let view = PersonView {
        prisoner_id: prisoner_id.to_string(),
        name: name.clone(),
        date_of_birth: overview.prisoner.date_of_birth,
        prison_name: overview.prisoner.prison_name.clone(),
        create_link: create_url(&prisoner_id),
        recalls: overview
            .recalls
            .iter()
            .map(|recall| RecallRow {
                recall_id: recall.recall_id.to_string(),
                revocation_date: recall.revocation_date,
                return_to_custody_date: recall.return_to_custody_date,
                recall_type: recall.recall_type.label(),
                sentence_count: recall.sentence_ids.len(),
                edit_link: edit_url(&prisoner_id, recall),
            })
            .collect(),
    };
    state.html(
        StatusCode::OK,
        "person.html",
        &Page::new(&name, "Recalls", &[], view),
    )
}

pub(crate) async fn start_create_handler<S, C>(
    State(state): State<JourneyState<S, C>>,
    CurrentCaseworker(_): CurrentCaseworker,
    Path(prisoner_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let Some(prisoner_id) = PrisonerId::parse(&prisoner_id) else {
        return state.not_found();
    };
    let (session, fresh) = session_or_new(&headers);
    match state.service.start_create(&session, &prisoner_id) {
        Ok(journey) => started(
            &session,
            fresh,
            &step_url(&prisoner_id, &journey.id, JourneyStep::RevocationDate),
        ),
        Err(err) => state.failure(err, None),
    }
}

pub(crate) async fn start_edit_handler<S, C>(
    State(state): State<JourneyState<S, C>>,
    CurrentCaseworker(_): CurrentCaseworker,
    Path((prisoner_id, recall_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let (Some(prisoner_id), Some(recall_id)) =
        (PrisonerId::parse(&prisoner_id), RecallId::parse(&recall_id))
    else {
        return state.not_found();
    };
    let (session, fresh) = session_or_new(&headers);
    match state
        .service
        .start_edit(&session, &prisoner_id, &recall_id)
        .await
    {
        Ok(journey) => started(
            &session,
            fresh,
            &step_url(&prisoner_id, &journey.id, JourneyStep::CheckYourAnswers),
        ),
        Err(err) => state.failure(err, None),
    }
}

/// Loads the journey behind a step request, checking it belongs to the person in the URL.
fn load<S, C>(state: &JourneyState<S, C>, location: &StepLocation) -> Result<RecallJourney, Response>
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    match state.service.journey(&location.session, &location.journey_id) {
        Ok(journey) if journey.prisoner_id == location.prisoner_id => Ok(journey),
        Ok(_) => Err(state.not_found()),
        Err(err) => Err(state.failure(err, Some(location))),
    }
}

pub(crate) async fn show_step_handler<S, C>(
    State(state): State<JourneyState<S, C>>,
    CurrentCaseworker(_): CurrentCaseworker,
    Path((prisoner_id, journey_id, slug)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let Some((location, step)) = locate(&headers, &prisoner_id, &journey_id, &slug) else {
        return state.not_found();
    };
    let journey = match load(&state, &location) {
        Ok(journey) => journey,
        Err(response) => return response,
    };

    let target = journey.resolve_step(step);
    if target != step {
        debug!(requested = step.slug(), target = target.slug(), "redirecting to journey frontier");
        return see_other(&location.url(target));
    }

    render_step(&state, &location, step, StatusCode::OK, &ValidationErrors::new(), None)
        .await
        .unwrap_or_else(|err| state.failure(err, Some(&location)))
}

pub(crate) async fn submit_step_handler<S, C>(
    State(state): State<JourneyState<S, C>>,
    CurrentCaseworker(caseworker): CurrentCaseworker,
    Path((prisoner_id, journey_id, slug)): Path<(String, String, String)>,
    headers: HeaderMap,
    Form(form): Form<Vec<(String, String)>>,
) -> Response
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let Some((location, step)) = locate(&headers, &prisoner_id, &journey_id, &slug) else {
        return state.not_found();
    };
    let journey = match load(&state, &location) {
        Ok(journey) => journey,
        Err(response) => return response,
    };

    let target = journey.resolve_step(step);
    if target != step {
        return see_other(&location.url(target));
    }

    let service = &state.service;
    let (session, id) = (&location.session, &location.journey_id);
    let outcome = match step {
        JourneyStep::RevocationDate => {
            let input = date_field(&form, DateField::REVOCATION.name);
            service
                .submit_revocation_date(session, id, &input)
                .await
                .map_err(|err| (err, Some(Submitted::Date(input))))
        }
        JourneyStep::ReturnToCustody => {
            let input = ReturnToCustodyInput {
                in_prison_at_recall: form_value(&form, "inPrisonAtRecall").map(str::to_string),
                arrest_date: date_field(&form, DateField::ARREST.name),
            };
            service
                .submit_return_to_custody(session, id, &input)
                .map_err(|err| (err, Some(Submitted::ReturnToCustody(input))))
        }
        JourneyStep::CheckSentences => service
            .confirm_sentences(session, id)
            .await
            .map_err(|err| (err, None)),
        JourneyStep::SelectCourtCases => {
            let case_ids = form_values(&form, "courtCases");
            service
                .submit_court_cases(session, id, &case_ids)
                .await
                .map_err(|err| (err, Some(Submitted::CourtCases(case_ids))))
        }
        JourneyStep::RecallType => {
            let code = form_value(&form, "recallType").map(str::to_string);
            service
                .submit_recall_type(session, id, code.as_deref())
                .await
                .map_err(|err| (err, Some(Submitted::RecallType(code))))
        }
        JourneyStep::CheckYourAnswers => service
            .submit(session, id, &caseworker)
            .await
            .map(|_| JourneyStep::Confirmation)
            .map_err(|err| (err, None)),
        JourneyStep::Confirmation | JourneyStep::NotPossible => {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET")],
                "method not allowed",
            )
                .into_response();
        }
    };

    let rendered = match outcome {
        Ok(next) => return see_other(&location.url(next)),
        Err((ServiceError::Invalid(errors), submitted)) => {
            debug!(step = step.slug(), errors = %errors, "step failed validation");
            render_step(
                &state,
                &location,
                step,
                StatusCode::BAD_REQUEST,
                &errors,
                submitted.as_ref(),
            )
            .await
        }
        Err((ServiceError::JourneyInvalid(failure), _)) => {
            render_step(
                &state,
                &location,
                failure.step,
                StatusCode::BAD_REQUEST,
                &failure.errors,
                None,
            )
            .await
        }
        Err((err, _)) => Err(err),
    };
    rendered.unwrap_or_else(|err| state.failure(err, Some(&location)))
}

async fn render_step<S, C>(
    state: &JourneyState<S, C>,
    location: &StepLocation,
    step: JourneyStep,
    status: StatusCode,
    errors: &ValidationErrors,
    submitted: Option<&Submitted>,
) -> Result<Response, ServiceError>
where
    S: JourneyStore + 'static,
    C: RecallApi + 'static,
{
    let service = &state.service;
    let (session, id) = (&location.session, &location.journey_id);
    let errors = errors.errors();
    let title = step.title();
    let template = template_for(step);
    let action = location.url(step);

    let response = match step {
        JourneyStep::RevocationDate => {
            let journey = service.journey(session, id)?;
            let stored;
            let date = match submitted {
                Some(Submitted::Date(input)) => input,
                _ => {
                    stored = journey
                        .revocation_date
                        .map(DateInput::from_date)
                        .unwrap_or_default();
                    &stored
                }
            };
            let page = Page::new(title, caption(&journey), errors, DateStepView { date })
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::ReturnToCustody => {
            let journey = service.journey(session, id)?;
            let stored;
            let input = match submitted {
                Some(Submitted::ReturnToCustody(input)) => input,
                _ => {
                    stored = ReturnToCustodyInput {
                        in_prison_at_recall: journey.in_prison_at_recall.map(|value| value.to_string()),
                        arrest_date: journey
                            .return_to_custody_date
                            .map(DateInput::from_date)
                            .unwrap_or_default(),
                    };
                    &stored
                }
            };
            let view = ReturnToCustodyView {
                in_prison: input.in_prison_at_recall.as_deref(),
                arrest_date: &input.arrest_date,
            };
            let page = Page::new(title, caption(&journey), errors, view)
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::CheckSentences => {
            let (journey, summary) = service.sentence_summary(session, id).await?;
            let page = Page::new(title, caption(&journey), errors, SentencesView::from(&summary))
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::SelectCourtCases => {
            let (journey, summary) = service.sentence_summary(session, id).await?;
            let selected = match submitted {
                Some(Submitted::CourtCases(case_ids)) => case_ids.as_slice(),
                _ => journey.selected_case_ids.as_slice(),
            };
            let view = CourtCasesView::new(&summary, selected);
            let page = Page::new(title, caption(&journey), errors, view)
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::RecallType => {
            let (journey, allowed) = service.recall_type_options(session, id).await?;
            let chosen = match submitted {
                Some(Submitted::RecallType(code)) => code.as_deref(),
                _ => journey.recall_type.map(RecallType::code),
            };
            let page = Page::new(title, caption(&journey), errors, RecallTypeView::new(&allowed, chosen))
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::CheckYourAnswers => {
            let (journey, summary) = service.review(session, id).await?;
            let view = CheckAnswersView::new(&journey, &summary);
            let page = Page::new(title, caption(&journey), errors, view)
                .back_link(back_link(location, &journey, step))
                .action(action);
            state.html(status, template, &page)
        }
        JourneyStep::Confirmation => {
            let journey = service.journey(session, id)?;
            let recall_id = journey
                .submitted_recall_id
                .clone()
                .ok_or(ServiceError::Incomplete(JourneyStep::CheckYourAnswers))?;
            let view = ConfirmationView {
                recall_id: recall_id.to_string(),
                edited: journey.mode.is_edit(),
                person_link: person_url(&location.prisoner_id),
            };
            state.html(status, template, &Page::new(title, caption(&journey), errors, view))
        }
        JourneyStep::NotPossible => {
            let (journey, summary) = service.sentence_summary(session, id).await?;
            let view = NotPossibleView::new(&journey, &summary);
            let page = Page::new(title, caption(&journey), errors, view)
                .back_link(back_link(location, &journey, step));
            state.html(status, template, &page)
        }
    };
    Ok(response)
}
