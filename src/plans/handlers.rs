use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    CreateMealPlanRequest, MealPlanDetails, MealPlanListItem, PlanQuery, UpdateMealPlanRequest,
};
use super::services;
use crate::{auth::AuthUser, error::AppError, state::AppState};

type Created = (StatusCode, [(header::HeaderName, String); 1], Json<MealPlanDetails>);

fn created(plan: MealPlanDetails) -> Created {
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/meal-plans/{}", plan.plan.id))],
        Json(plan),
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meal-plans", get(list_plans).post(create_plan))
        .route(
            "/meal-plans/:id",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
        .route("/meal-plans/:id/copy", post(copy_plan))
}

#[instrument(skip(state))]
pub async fn list_plans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<PlanQuery>,
) -> Result<Json<Vec<MealPlanListItem>>, AppError> {
    let plans =
        services::list_plans(&state.db, user_id, q.limit.clamp(1, 100), q.offset.max(0)).await?;
    Ok(Json(plans))
}

#[instrument(skip(state))]
pub async fn get_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealPlanDetails>, AppError> {
    Ok(Json(services::plan_details(&state.db, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealPlanRequest>,
) -> Result<Created, AppError> {
    let plan =
        services::create_meal_plan(&state.db, state.config.reconcile_mode, user_id, body).await?;
    Ok(created(plan))
}

#[instrument(skip(state, body))]
pub async fn update_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealPlanRequest>,
) -> Result<Json<MealPlanDetails>, AppError> {
    let mode = state.config.reconcile_mode;
    let plan = services::update_meal_plan(&state.db, mode, user_id, id, body).await?;
    Ok(Json(plan))
}

#[instrument(skip(state))]
pub async fn delete_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_meal_plan(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn copy_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Created, AppError> {
    let plan = services::copy_meal_plan(&state.db, user_id, id).await?;
    Ok(created(plan))
}
