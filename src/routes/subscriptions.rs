use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::guards;
use crate::db::models::{Role, Subscription, SubscriptionStatus};
use crate::db::subscriptions;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::plans::{self, Plan, PLANS};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubscribeRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResource {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan_details: Option<&'static Plan>,
}

impl From<Subscription> for SubscriptionResource {
    fn from(subscription: Subscription) -> Self {
        Self {
            plan_details: plans::find(&subscription.plan),
            subscription,
        }
    }
}

/// GET /plans (public)
pub async fn plans_index() -> Json<&'static [Plan]> {
    Json(PLANS)
}

/// GET /subscriptions
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<SubscriptionResource>>> {
    let conn = state.db.get()?;
    let list = subscriptions::list_for_user(&conn, current.id())?;
    Ok(Json(list.into_iter().map(SubscriptionResource::from).collect()))
}

/// POST /subscriptions: switch to a paid plan. No payment is taken.
pub async fn store(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionResource>)> {
    let plan = plans::find(req.plan.trim())
        .filter(|p| p.role != Role::Free)
        .ok_or_else(|| AppError::field("plan", "The selected plan is invalid."))?;

    let mut conn = state.db.get()?;
    let subscription = subscriptions::subscribe(&mut conn, current.id(), plan)?;
    tracing::info!("User {} subscribed to {}", current.id(), plan.slug);
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

/// DELETE /subscriptions/{id}
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<SubscriptionResource>> {
    let mut conn = state.db.get()?;
    let subscription = subscriptions::find(&conn, &id)?.ok_or(AppError::NotFound)?;
    guards::ensure_owner(&current, &subscription.user_id)?;
    if subscription.status != SubscriptionStatus::Active {
        return Err(AppError::field("subscription", "The subscription is already cancelled."));
    }

    let subscription = subscriptions::cancel(&mut conn, &subscription.id)?;
    tracing::info!("User {} cancelled {} subscription", current.id(), subscription.plan);
    Ok(Json(subscription.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(plans_index))
        .route("/subscriptions", get(index).post(store))
        .route("/subscriptions/{id}", delete(destroy))
}
