//! Router for the events API

use agenda_core::error::CoreError;
use agenda_core::models::{MasterEvent, NewEventData, NewEventException};
use agenda_core::repository::{EventRepository, ExceptionRepository};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use http::{HeaderName, HeaderValue, StatusCode};
use uuid::Uuid;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::{AppState, SharedState};

/// Set on window listings when some event was truncated or fell back
pub const PARTIAL_RESULT_HEADER: HeaderName = HeaderName::from_static("x-partial-result");

fn parse_instant(name: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::bad_request(format!(
                "invalid {} '{}': expected an ISO 8601 instant such as 2024-01-03T00:00:00Z",
                name, value
            ))
        })
}

async fn load_event(state: &AppState, id: Uuid) -> Result<MasterEvent, ApiError> {
    state
        .repo
        .find_event_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("event {}", id)).into())
}

async fn list_events(
    State(state): State<SharedState>,
    Query(params): Query<public::EventsQuery>,
) -> Result<Response, ApiError> {
    let start = parse_instant("start", &params.start)?;
    let end = parse_instant("end", &params.end)?;
    // Reject bad windows before touching storage
    let window = state.engine.window(start, end)?;

    let events = state.repo.find_events_for_window(start, end).await?;
    let expansion = state.engine.expand(&events, &window);

    let body: Vec<public::EventInstance> = expansion.instances.iter().map(Into::into).collect();
    let mut response = Json(body).into_response();
    if expansion.is_partial() {
        response
            .headers_mut()
            .insert(PARTIAL_RESULT_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

async fn create_event(
    State(state): State<SharedState>,
    Json(body): Json<public::NewEventRequest>,
) -> Result<(StatusCode, Json<public::EventResponse>), ApiError> {
    let event = state
        .repo
        .add_event(NewEventData {
            title: body.title,
            description: body.description,
            location: body.location,
            starts_at: body.start,
            ends_at: body.end,
            recurrence_rule: body.recurrence_rule,
            timezone: body.timezone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(event.into())))
}

async fn get_event(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<public::EventResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    Ok(Json(event.into()))
}

async fn delete_event(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repo.delete_event(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_exception(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(body): Json<public::ExceptionRequest>,
) -> Result<Json<public::ExceptionResponse>, ApiError> {
    let event = load_event(&state, id).await?;
    if !event.is_recurring() {
        return Err(ApiError::bad_request(format!("event {} does not recur", id)));
    }

    let occurrence_at = state
        .engine
        .locate_occurrence(&event, body.occurrence_at)?
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "event {} has no occurrence at {}",
                id, body.occurrence_at
            ))
        })?;

    let exception = state
        .repo
        .upsert_exception(NewEventException {
            event_id: id,
            occurrence_at,
            skipped: body.skipped,
            note: body.note,
        })
        .await?;

    Ok(Json(exception.into()))
}

async fn list_exceptions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<public::ExceptionResponse>>, ApiError> {
    load_event(&state, id).await?;
    let exceptions = state.repo.find_exceptions(id).await?;
    Ok(Json(exceptions.into_iter().map(Into::into).collect()))
}

/// Create the events router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{id}", get(get_event).delete(delete_event))
        .route("/{id}/exceptions", get(list_exceptions).put(put_exception))
}
