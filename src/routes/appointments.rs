use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::auth::guards;
use crate::db::appointments;
use crate::db::models::{Appointment, AppointmentStatus};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::validation::{clean, nullable};

const STORED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a booking time (RFC 3339, or a naive timestamp taken as UTC) into
/// the stored format. Times in the past are rejected.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> AppResult<String> {
    let input = input.trim();
    let parsed = DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .ok_or_else(|| AppError::field("scheduled_at", "The scheduled at is not a valid date."))?;

    if parsed <= now {
        return Err(AppError::field(
            "scheduled_at",
            "The scheduled at must be a date in the future.",
        ));
    }
    Ok(parsed.format(STORED_FORMAT).to_string())
}

/// Owners may confirm or cancel a pending booking; nothing else moves.
fn check_transition(from: AppointmentStatus, to: AppointmentStatus) -> AppResult<()> {
    use AppointmentStatus::*;
    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Pending, Confirmed) | (Pending, Cancelled) => Ok(()),
        _ => Err(AppError::field(
            "status",
            format!("A {} appointment cannot be marked {}.", from, to),
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub scheduled_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 2000, message = "The notes may not be greater than 2000 characters."))]
    pub notes: Option<Option<String>>,
}

/// GET /appointments
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Appointment>>> {
    let conn = state.db.get()?;
    Ok(Json(appointments::list_for_user(&conn, current.id(), query.status)?))
}

/// GET /appointments/{id}
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    let conn = state.db.get()?;
    Ok(Json(guards::owned_appointment(&conn, &current, &id)?))
}

/// PUT /appointments/{id}
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AppointmentRequest>,
) -> AppResult<Json<Appointment>> {
    let conn = state.db.get()?;
    let appointment = guards::owned_appointment(&conn, &current, &id)?;
    req.validate()?;

    let status = req.status.unwrap_or(appointment.status);
    check_transition(appointment.status, status)?;
    let scheduled_at = match req.scheduled_at.as_deref() {
        Some(value) if value.trim() != appointment.scheduled_at => parse_schedule(value, Utc::now())?,
        _ => appointment.scheduled_at.clone(),
    };
    let notes = match req.notes {
        Some(notes) => clean(notes),
        None => appointment.notes.clone(),
    };

    let updated = appointments::update(&conn, &appointment.id, status, &scheduled_at, notes.as_deref())?;
    if updated.status != appointment.status {
        tracing::info!("Appointment {} marked {}", updated.id, updated.status);
    }
    Ok(Json(updated))
}

/// DELETE /appointments/{id}
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let appointment = guards::owned_appointment(&conn, &current, &id)?;
    appointments::delete(&conn, &appointment.id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(index))
        .route("/appointments/{id}", get(show).put(update).delete(destroy))
}
